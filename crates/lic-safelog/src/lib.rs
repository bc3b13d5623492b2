//! Conditionally suppress confidential material (fingerprints, HMAC keys,
//! registry tokens) from logs and `Display`/`Debug` output.
//!
//! Certificates, bundles, and heartbeat traffic all carry values that should
//! never land in a log file by accident: the machine fingerprint, the
//! HMAC key embedded in a certificate's `security` block, and the Docker
//! registry token. [`Sensitive`] wraps such a value so that its `Display`
//! and `Debug` impls redact by default; call [`Sensitive::reveal_in_log`]
//! around a scope where unredacted logging is explicitly wanted (for
//! example, a `--debug-show-secrets` diagnostic flag).

#![deny(missing_docs)]
#![warn(clippy::all)]

use std::fmt;

use fluid_let::fluid_let;

fluid_let!(static DISPLAY_REDACTED: bool);

/// A value that should not appear in logs unless explicitly revealed.
#[derive(Clone, Copy, Default, Eq, PartialEq, Hash)]
pub struct Sensitive<T>(pub T);

impl<T> Sensitive<T> {
    /// Wrap `value` as sensitive.
    pub fn new(value: T) -> Self {
        Sensitive(value)
    }

    /// Consume this wrapper, returning the inner value.
    pub fn into_inner(self) -> T {
        self.0
    }

    /// Borrow the inner value directly, bypassing redaction.
    ///
    /// Use this when you need the real value (e.g. to compute a hash or
    /// send it over the wire) rather than to print it.
    pub fn as_inner(&self) -> &T {
        &self.0
    }

    /// Run `func` with logging in this thread configured to reveal
    /// [`Sensitive`] values rather than redact them.
    pub fn reveal_in_log<F, R>(func: F) -> R
    where
        F: FnOnce() -> R,
    {
        DISPLAY_REDACTED.set(false, func)
    }
}

/// Return true if the current thread is configured to redact [`Sensitive`]
/// values (the default).
fn redacting() -> bool {
    DISPLAY_REDACTED.get(|v| v.copied()).flatten().unwrap_or(true)
}

impl<T: fmt::Display> fmt::Display for Sensitive<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if redacting() {
            write!(f, "[scrubbed]")
        } else {
            self.0.fmt(f)
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Sensitive<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if redacting() {
            write!(f, "Sensitive([scrubbed])")
        } else {
            write!(f, "Sensitive({:?})", self.0)
        }
    }
}

impl<T> From<T> for Sensitive<T> {
    fn from(value: T) -> Self {
        Sensitive(value)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn redacted_by_default() {
        let s = Sensitive::new("top-secret-fingerprint");
        assert_eq!(format!("{}", s), "[scrubbed]");
        assert_eq!(format!("{:?}", s), "Sensitive([scrubbed])");
    }

    #[test]
    #[serial]
    fn revealed_inside_scope() {
        let s = Sensitive::new("top-secret-fingerprint");
        let shown = Sensitive::reveal_in_log(|| format!("{}", s));
        assert_eq!(shown, "top-secret-fingerprint");
        // Outside the scope, still redacted.
        assert_eq!(format!("{}", s), "[scrubbed]");
    }
}
