//! A small tokio-backed scheduler for periodic background work.
//!
//! The Enforcer's revalidation loop (spec.md §4.6/§5) needs a sleep that
//! can be rescheduled or suspended from the outside — after a successful
//! `validate` call the next wakeup moves out to the full revalidation
//! interval, after a failure it moves closer in, and on shutdown it needs
//! to stop cleanly rather than leaving an orphaned `tokio::time::sleep`
//! future. A plain `loop { sleep(...).await; ... }` can't be nudged like
//! that from another task, so this crate keeps the arti runtime
//! compatibility layer's cancellable-task [`scheduler`] instead of
//! hand-rolling a new one.
//!
//! Unlike its ancestor, this crate targets tokio only: the licensing
//! service's HTTP layers (`axum`, `reqwest`) already commit the binaries to
//! a tokio runtime, so the multi-backend `Runtime`/`SleepProvider`
//! abstraction that existed to support both tokio and async-std has no
//! remaining reason to exist here.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod scheduler;

pub use scheduler::{Scheduler, Task, TaskType};
