//! Persistent-store adapter trait used by the Issuer engine (spec.md §4.4)
//! and the file-backed implementation it runs on outside of tests.
//!
//! The trait is deliberately narrow: a key-value store of serializable
//! documents, locked for exclusive write access by a single process at a
//! time. `lic-issuer` builds its customer/machine/activation tables on top
//! of this the same way `arti`'s higher-level managers build typed state on
//! top of `tor-persist::StateMgr`, rather than this crate knowing anything
//! about licensing domain types itself.
//!
//! A real deployment's "relational store" (spec.md §1's Non-goals name a
//! real RDBMS as an external collaborator) is out of scope for the core;
//! this crate's [`FsStateMgr`] is the reference implementation used by the
//! `licentia-issuer` binary and by the test suite.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod fs;

use serde::{de::DeserializeOwned, Serialize};

/// An error arising while loading or storing persistent state.
#[derive(Clone, Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Tried to store data without holding the write lock.
    #[error("no lock held for storage")]
    NoLock,
    /// An IO error occurred while loading or storing data.
    #[error("IO error: {0}")]
    IoError(#[from] std::sync::Arc<std::io::Error>),
    /// Tried to alter a key that we weren't allowed to use.
    #[error("invalid key: {0}")]
    BadKeyName(String),
    /// Unable to serialize or deserialize a stored document.
    #[error("(de)serialization error: {0}")]
    Serde(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IoError(std::sync::Arc::new(e))
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::Serde(e.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Serde(e.to_string())
    }
}

impl From<fslock::Error> for Error {
    fn from(e: fslock::Error) -> Self {
        Error::IoError(std::sync::Arc::new(std::io::Error::new(
            std::io::ErrorKind::Other,
            e.to_string(),
        )))
    }
}

impl From<Error> for lic_error::Error {
    fn from(e: Error) -> Self {
        lic_error::Error::wrap(lic_error::ErrorKind::Persistence, "persistent store", e)
    }
}

/// A `Result` alias using this crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// A store for persistent data, built out of key-value pairs.
///
/// Each key is a short ASCII identifier (a customer id, a machine id, an
/// internal table name); each value is any `Serialize`/`DeserializeOwned`
/// document. Implementations need not support concurrent writers across
/// processes beyond refusing to write without the lock (see
/// [`StateMgr::try_lock`]) — concurrent *readers* are always fine.
pub trait StateMgr {
    /// Return true if this manager is capable of storing data.
    ///
    /// The result of this function may change over time, as an instance
    /// gains or loses the lock.
    fn can_store(&self) -> bool;

    /// Try to lock this manager for writing, returning true if the lock
    /// was successfully acquired (or already held).
    fn try_lock(&self) -> Result<bool>;

    /// Return the value associated with `key`, if any is stored.
    fn load<D>(&self, key: &str) -> Result<Option<D>>
    where
        D: DeserializeOwned;

    /// Store `val` under `key`, replacing any previous value.
    ///
    /// Returns [`Error::NoLock`] if this manager does not presently hold
    /// the write lock.
    fn store<S>(&self, key: &str, val: &S) -> Result<()>
    where
        S: Serialize;
}

pub use fs::FsStateMgr;
