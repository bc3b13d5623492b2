//! Unified type-erased error type for the licensing service's infrastructure
//! failures.
//!
//! spec.md §7 draws a hard line between two kinds of outcome:
//!
//! * **business-rule rejections** (`product_key_not_found`,
//!   `machine_limit_exceeded`, `expired`, ...) are *values*, not errors —
//!   they travel as plain data (see the reason-code enums in `lic-wire` and
//!   `lic-issuer`, built with [`caret`]) and never unwind a `Result::Err`.
//! * **infrastructure failures** (the persistent store is unreachable, a
//!   signature could not even be attempted because the key failed to load,
//!   an internal invariant broke) use this crate's [`Error`]/[`ErrorKind`],
//!   and are the only case that should ever become an HTTP 5xx.
//!
//! This crate exists so every layer of the workspace reports infrastructure
//! failures the same way, the same role `tor-error` plays for `arti`.

#![deny(missing_docs)]
#![warn(clippy::all)]

use std::fmt;

/// A high-level category for an infrastructure failure.
///
/// Kept small and closed deliberately: this is consulted by callers
/// deciding how to *react* (retry? 500? log and crash?), not to explain
/// *what* went wrong — that's the job of the [`Error`]'s `Display` text.
#[derive(Clone, Copy, Eq, PartialEq, Hash, strum::Display, strum::EnumIter)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The persistent store (customer/machine/bundle records) could not be
    /// read from or written to.
    Persistence,
    /// A filesystem operation (reading a key, writing a bundle file) failed.
    Io,
    /// A cryptographic operation failed for a reason that should not be
    /// possible given valid inputs (e.g. a key that fails to parse after we
    /// ourselves generated and persisted it).
    Crypto,
    /// The network peer (Issuer or Enforcer) could not be reached, or
    /// returned a response we could not parse.
    Network,
    /// Configuration was invalid or incomplete.
    Config,
    /// An internal invariant was violated. If this occurs, it is a bug in
    /// this codebase, not a bad input.
    Internal,
}

impl ErrorKind {
    /// Return true if this kind of failure should be reported to an HTTP
    /// caller as a server error (5xx) rather than business-rule data.
    pub fn is_server_fault(&self) -> bool {
        true
    }
}

/// A trait for errors that know their own [`ErrorKind`].
pub trait HasKind {
    /// Return the kind of this error.
    fn kind(&self) -> ErrorKind;
}

/// The unified error type returned by the licensing service's
/// infrastructure-facing APIs.
#[derive(thiserror::Error, Debug)]
#[error("{kind}: {message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Error {
    /// Construct a new error of the given kind, with a human-readable
    /// `message` and no further source.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Construct a new error wrapping an underlying `source` error.
    pub fn wrap(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Error {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Construct an [`ErrorKind::Internal`] error reporting a broken
    /// invariant. Use this (rather than `panic!`) for conditions that
    /// "cannot happen" but that we'd still rather surface as a 500 than
    /// crash the process on.
    pub fn internal(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::Internal, message)
    }
}

impl HasKind for Error {
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::wrap(ErrorKind::Io, "I/O failure", e)
    }
}

/// A `Result` alias using this crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Construct an [`Error::internal`] with a `format!`-style message, tagging
/// the call site.
#[macro_export]
macro_rules! internal {
    ($($arg:tt)*) => {
        $crate::Error::internal(format!($($arg)*))
    };
}

impl fmt::Debug for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn internal_macro_formats() {
        let e = internal!("unexpected {} machines for customer {}", 3, "acme");
        assert_eq!(e.kind(), ErrorKind::Internal);
        assert!(e.to_string().contains("unexpected 3 machines"));
    }

    #[test]
    fn wraps_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let e: Error = io_err.into();
        assert_eq!(e.kind(), ErrorKind::Io);
        assert!(std::error::Error::source(&e).is_some());
    }
}
