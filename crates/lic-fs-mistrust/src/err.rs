//! Declare an Error type for fs-mistrust

use std::path::PathBuf;
use std::sync::Arc;

/// An error returned while checking file permissions.
#[derive(Clone, Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// We encountered an IO error during one of our checks.
    #[error("IO error while inspecting {0}", .1)]
    Io(PathBuf, #[source] Arc<std::io::Error>),

    /// We found a file or directory that was of the wrong type (for example,
    /// a file where we expected a directory, or vice versa).
    #[error("{0} had an invalid type")]
    BadType(PathBuf),

    /// We found a file or directory that was owned by the wrong user.
    #[error("{0} was owned by a trusted uid {1}")]
    BadOwner(PathBuf, u32),

    /// We found a file or directory with bad permission bits set.
    #[error("{0} had forbidden permission bits {1:o} set")]
    BadPermission(PathBuf, u32),

    /// Multiple errors occurred during a single check.
    #[error("Multiple errors: {0:?}")]
    Multiple(Vec<Error>),
}

impl Error {
    /// Construct an error from an IO error that occurred while looking at `path`.
    pub(crate) fn inspecting<P: Into<PathBuf>>(err: std::io::Error, path: P) -> Self {
        Error::Io(path.into(), Arc::new(err))
    }

    /// Return an iterator over all the underlying errors in this Error.
    ///
    /// If this is a single error, the iterator contains only that one error.
    /// If this is [`Error::Multiple`], the iterator yields each of its
    /// elements in turn.
    pub fn errors(&self) -> Box<dyn Iterator<Item = &Error> + '_> {
        match self {
            Error::Multiple(errors) => Box::new(errors.iter()),
            other => Box::new(std::iter::once(other)),
        }
    }
}

/// Collect an iterator of [`Error`]s into a single `Option<Error>`: `None`
/// if there were no errors, `Some(err)` if there was exactly one, or
/// `Some(Error::Multiple(...))` if there was more than one.
impl std::iter::FromIterator<Error> for Option<Error> {
    fn from_iter<I: IntoIterator<Item = Error>>(iter: I) -> Self {
        let mut all_errors: Vec<Error> = iter.into_iter().collect();
        match all_errors.len() {
            0 => None,
            1 => all_errors.pop(),
            _ => Some(Error::Multiple(all_errors)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn collects_zero_errors_into_none() {
        let errors: Vec<Error> = Vec::new();
        let collected: Option<Error> = errors.into_iter().collect();
        assert!(collected.is_none());
    }

    #[test]
    fn collects_one_error_without_wrapping() {
        let errors = vec![Error::BadType(PathBuf::from("/tmp/x"))];
        let collected: Option<Error> = errors.into_iter().collect();
        assert!(matches!(collected, Some(Error::BadType(_))));
    }

    #[test]
    fn collects_many_errors_into_multiple() {
        let errors = vec![
            Error::BadType(PathBuf::from("/tmp/x")),
            Error::BadOwner(PathBuf::from("/tmp/x"), 1000),
        ];
        let collected: Option<Error> = errors.into_iter().collect();
        match collected {
            Some(Error::Multiple(v)) => assert_eq!(v.len(), 2),
            _ => panic!("expected Error::Multiple"),
        }
    }
}
