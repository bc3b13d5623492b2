//! Traits for objects that must be checked before they can be trusted.
//!
//! This crate exists so that "I have bytes that claim to be a valid
//! certificate" and "I have a certificate I have actually verified" are
//! different Rust types — the same discipline `tor-checkable` gives
//! `arti`'s directory documents, applied here to the licensing
//! certificate's two independent checks (spec.md §4.5's verifier: a
//! signature check, then a time-validity check).
//!
//! A type implementing [`SelfSigned`] can convert itself into its checked
//! form only by actually verifying a signature; a type implementing
//! [`Timebound`] can report whether "now" falls inside its validity
//! window without the caller having to remember to ask. `lic-cert` builds
//! both atop its `Certificate` document type.

#![deny(missing_docs)]
#![warn(clippy::all)]

use std::time::SystemTime;

/// An error produced by [`Timebound::is_valid_at`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum TimeValidityError {
    /// The object is not yet valid: `now` precedes its validity window.
    #[error("not yet valid")]
    NotYetValid,
    /// The object's validity window has already ended.
    #[error("already expired")]
    Expired,
}

/// A trait for an object that is valid only during a particular time
/// range.
pub trait Timebound<T> {
    /// The error returned when this object is invalid at a requested time,
    /// other than a plain time-boundary violation (if any).
    type Error;

    /// Return `Ok(())` if this object is valid at `when`, or an error
    /// otherwise.
    fn is_valid_at(&self, when: SystemTime) -> Result<(), Self::Error>;

    /// Unwrap this object into its inner value without checking validity.
    ///
    /// Name chosen to read loudly at every call site, matching
    /// `tor-checkable`'s own naming for the equivalent escape hatch.
    fn dangerously_assume_timely(self) -> T;

    /// Check that this object is valid at `when`, and if so, unwrap it.
    fn check_valid_at(self, when: SystemTime) -> Result<T, Self::Error>
    where
        Self: Sized,
    {
        self.is_valid_at(when)?;
        Ok(self.dangerously_assume_timely())
    }

    /// Check that this object is valid right now, and if so, unwrap it.
    fn check_valid_now(self) -> Result<T, Self::Error>
    where
        Self: Sized,
    {
        self.check_valid_at(SystemTime::now())
    }
}

/// A trait for objects that can verify their own signature (and any
/// dependent integrity check, such as the certificate's keyed HMAC) and
/// unwrap into a checked, typed value.
pub trait SelfSigned<T> {
    /// The error type produced when the signature (or dependent check)
    /// does not verify.
    type Error;

    /// Check that this object's signature (and any dependent checks) are
    /// valid, without inspecting expiry.
    fn is_well_signed(&self) -> Result<(), Self::Error>;

    /// Unwrap this object into its inner value without checking its
    /// signature.
    fn dangerously_assume_wellsigned(self) -> T;

    /// Check this object's signature, and if valid, unwrap it.
    fn check_signature(self) -> Result<T, Self::Error>
    where
        Self: Sized,
    {
        self.is_well_signed()?;
        Ok(self.dangerously_assume_wellsigned())
    }
}

/// A wrapper pairing an unchecked value with an explicit `[start, end)`
/// validity window, implementing [`Timebound`] generically so individual
/// document types don't each reimplement the boundary comparison.
#[derive(Clone, Copy, Debug)]
pub struct TimerangeBound<T> {
    obj: T,
    start: Option<SystemTime>,
    end: Option<SystemTime>,
}

impl<T> TimerangeBound<T> {
    /// Wrap `obj`, valid from `start` (inclusive) through `end`
    /// (exclusive). Either bound may be omitted for "always valid in that
    /// direction".
    pub fn new(obj: T, start: Option<SystemTime>, end: Option<SystemTime>) -> Self {
        TimerangeBound { obj, start, end }
    }
}

impl<T> Timebound<T> for TimerangeBound<T> {
    type Error = TimeValidityError;

    fn is_valid_at(&self, when: SystemTime) -> Result<(), Self::Error> {
        if let Some(start) = self.start {
            if when < start {
                return Err(TimeValidityError::NotYetValid);
            }
        }
        if let Some(end) = self.end {
            if when >= end {
                return Err(TimeValidityError::Expired);
            }
        }
        Ok(())
    }

    fn dangerously_assume_timely(self) -> T {
        self.obj
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Duration;

    #[test]
    fn within_window_is_valid() {
        let now = SystemTime::now();
        let start = now - Duration::from_secs(10);
        let end = now + Duration::from_secs(10);
        let bound = TimerangeBound::new(42, Some(start), Some(end));
        assert_eq!(bound.check_valid_at(now), Ok(42));
    }

    #[test]
    fn before_start_is_not_yet_valid() {
        let now = SystemTime::now();
        let start = now + Duration::from_secs(10);
        let bound = TimerangeBound::new(42, Some(start), None);
        assert_eq!(bound.is_valid_at(now), Err(TimeValidityError::NotYetValid));
    }

    #[test]
    fn after_end_is_expired() {
        let now = SystemTime::now();
        let end = now - Duration::from_secs(1);
        let bound = TimerangeBound::new(42, None, Some(end));
        assert_eq!(bound.is_valid_at(now), Err(TimeValidityError::Expired));
    }

    #[test]
    fn unbounded_sides_never_fail() {
        let bound: TimerangeBound<i32> = TimerangeBound::new(7, None, None);
        assert!(bound.is_valid_at(SystemTime::now()).is_ok());
    }
}
