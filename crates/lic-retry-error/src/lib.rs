//! An error type for an operation that can fail more than once.
//!
//! The Enforcer retries its outbound heartbeat/validate calls to the
//! Issuer a bounded number of times before treating the server as
//! unreachable (spec.md §5's "bounded timeout... offline operation is the
//! expected degraded mode"). [`RetryError`] accumulates one error per
//! attempt so the final failure reports the whole history instead of just
//! the last attempt's error.

#![deny(missing_docs)]
#![warn(clippy::all)]

use std::fmt::{self, Debug, Display};

/// An error that represents a number of times that an operation failed.
#[derive(Clone, Debug)]
pub struct RetryError<E> {
    /// The name of the operation we were trying to do.
    doing: String,
    /// The errors from each attempt, in order.
    errors: Vec<(Attempt, E)>,
}

/// Which attempt (1-indexed) an error came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct Attempt(usize);

impl Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attempt {}", self.0)
    }
}

impl<E> RetryError<E> {
    /// Create a new `RetryError`, with no contents, that explains its
    /// operation with the string `doing`.
    pub fn in_attempt_to<T: Into<String>>(doing: T) -> Self {
        RetryError {
            doing: doing.into(),
            errors: Vec::new(),
        }
    }

    /// Add an error to this `RetryError`, representing a failed attempt.
    pub fn push(&mut self, err: E) {
        let attempt = Attempt(self.errors.len() + 1);
        self.errors.push((attempt, err));
    }

    /// Return the number of recorded failed attempts.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Return true if no attempts have been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Consume this error, returning the last attempt's error, if any.
    pub fn into_last(mut self) -> Option<E> {
        self.errors.pop().map(|(_, e)| e)
    }
}

impl<E: Display> Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.len() {
            0 => write!(f, "unable to {}: no attempts were made", self.doing),
            1 => write!(
                f,
                "unable to {}: {}",
                self.doing,
                self.errors[0].1
            ),
            n => {
                write!(f, "unable to {} after {} attempts:", self.doing, n)?;
                for (attempt, err) in &self.errors {
                    write!(f, " [{attempt}: {err}]")?;
                }
                Ok(())
            }
        }
    }
}

impl<E: Debug + Display> std::error::Error for RetryError<E> {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_message() {
        let e: RetryError<String> = RetryError::in_attempt_to("reach the issuer");
        assert_eq!(
            e.to_string(),
            "unable to reach the issuer: no attempts were made"
        );
    }

    #[test]
    fn accumulates_attempts() {
        let mut e: RetryError<String> = RetryError::in_attempt_to("send heartbeat");
        e.push("timed out".to_string());
        e.push("connection refused".to_string());
        assert_eq!(e.len(), 2);
        assert!(e.to_string().contains("2 attempts"));
        assert!(e.to_string().contains("timed out"));
        assert!(e.to_string().contains("connection refused"));
    }
}
