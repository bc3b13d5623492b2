//! A cancellable scheduler for periodic background tasks.

use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tracing::{debug, error, trace, warn};

/// Size of the control command buffer between the reactor and its spawned tasks.
const CONTROL_BUFFER_SIZE: usize = 16;

/// A type of task that the scheduler can run.
///
/// This type exists in order to reference the task when asking the scheduler to do things
/// like suspend it.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
#[non_exhaustive]
pub enum TaskType {
    /// Re-check the active certificate against the Issuer (spec.md §4.6's
    /// periodic revalidation).
    Revalidation,
    /// Send a liveness heartbeat to the Issuer.
    Heartbeat,
    /// Flush the activation bundle to its on-disk store.
    BundlePersist,
    /// Probe whether the degraded-offline grace window has expired.
    GraceExpiry,
}

/// An asynchronous function that the scheduler can run periodically.
///
/// The return value indicates how long to wait before next running the function; if `None`, the
/// task becomes suspended.
pub type Task = Box<dyn FnMut() -> Pin<Box<dyn Future<Output = Option<Duration>> + Send>> + Send>;

/// Bookkeeping the reactor keeps for one registered task.
struct TaskEntry {
    /// The task function itself.
    task: Task,
    /// When the task is next due to run, if at all.
    next_due: Option<Instant>,
    /// Whether the task is currently suspended.
    suspended: bool,
    /// Bumped every time the task is run, to detect stale reschedule requests.
    epoch: u64,
}

/// A command sent to the scheduler reactor.
enum SchedulerCommand {
    /// Schedule a task to be executed at the given instant.
    ScheduleTask {
        /// The task type to schedule.
        task: TaskType,
        /// The time at which the task should run.
        due: Instant,
        /// If provided, compared to the `epoch` in the `TaskEntry` before
        /// scheduling the task. If the values differ, the task is not scheduled.
        ///
        /// This exists so a request to schedule a task does not race with a task
        /// informing the scheduler of its completion internally.
        epoch: Option<u64>,
    },
    /// Register a task.
    RegisterTask {
        /// The task type to register the task as.
        ty: TaskType,
        /// The task function.
        task: Task,
        /// Whether the task should start suspended.
        suspended: bool,
        /// When to schedule the new task initially.
        due: Option<Instant>,
    },
    /// Make a task suspend or unsuspend.
    SuspendTask {
        /// The task type to change the suspend status of.
        task: TaskType,
        /// Whether the task should be suspended.
        suspended: bool,
    },
}

/// A handle that lets callers register, reschedule, and suspend periodic
/// tasks running on a backing tokio runtime.
///
/// Dropping every clone of the handle's sender stops the reactor: there is
/// no blocking `sleep` left running anywhere once the last `Scheduler` goes
/// away.
#[derive(Clone)]
pub struct Scheduler {
    ctl_tx: mpsc::UnboundedSender<SchedulerCommand>,
}

impl Scheduler {
    /// Create a new scheduler, spawning its reactor task onto the current
    /// tokio runtime.
    pub fn new() -> Self {
        let (ctl_tx, ctl_rx) = mpsc::unbounded();
        let (internal_tx, internal_rx) = mpsc::channel(CONTROL_BUFFER_SIZE);
        let reactor = SchedulerReactor {
            tasks: Default::default(),
            sleeper: None,
            ctl_rx,
            internal_rx,
            internal_tx,
        };
        tokio::spawn(reactor);
        Self { ctl_tx }
    }

    /// Register `task` under `ty`, to run first at `due` (or immediately,
    /// if `due` is `None` and `suspended` is false).
    pub fn register_task(&self, ty: TaskType, task: Task, suspended: bool, due: Option<Instant>) {
        let _ = self.ctl_tx.unbounded_send(SchedulerCommand::RegisterTask {
            ty,
            task,
            suspended,
            due,
        });
    }

    /// Register `task` under `ty`, running it immediately.
    pub fn register_task_now(&self, ty: TaskType, task: Task) {
        self.register_task(ty, task, false, Some(Instant::now()));
    }

    /// Suspend or resume the task registered as `ty`.
    pub fn suspend_task(&self, ty: TaskType, suspended: bool) {
        let _ = self.ctl_tx.unbounded_send(SchedulerCommand::SuspendTask {
            task: ty,
            suspended,
        });
    }

    /// Reschedule the task registered as `ty` to next run at `when`.
    pub fn schedule_task(&self, ty: TaskType, when: Instant) {
        let _ = self.ctl_tx.unbounded_send(SchedulerCommand::ScheduleTask {
            task: ty,
            due: when,
            epoch: None,
        });
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// The reactor task backing a [`Scheduler`]: owns every registered task and
/// drives whichever one is next due.
struct SchedulerReactor {
    /// Every task currently registered, keyed by its [`TaskType`].
    tasks: HashMap<TaskType, TaskEntry>,
    /// A sleep future for the next due task, if any are pending.
    sleeper: Option<Pin<Box<tokio::time::Sleep>>>,
    /// Commands from [`Scheduler`] handles.
    ctl_rx: mpsc::UnboundedReceiver<SchedulerCommand>,
    /// Commands a running task sends itself (to reschedule on completion).
    internal_rx: mpsc::Receiver<SchedulerCommand>,
    /// The sending half of `internal_rx`, cloned into spawned task futures.
    internal_tx: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerReactor {
    /// Recompute `self.sleeper` from the earliest due, non-suspended task.
    fn regenerate_sleeper(&mut self) {
        let now = Instant::now();
        let next_deadline = self
            .tasks
            .values()
            .filter(|x| !x.suspended)
            .flat_map(|x| x.next_due)
            .min();
        self.sleeper = next_deadline.map(|time| {
            // Saturating duration; we'll sleep for zero seconds if a task is immediately due.
            let duration = time.saturating_duration_since(now);
            trace!("waiting {}s until next deadline", duration.as_secs_f64());
            Box::pin(tokio::time::sleep(duration))
        });
    }

    /// Run every task whose deadline has passed, and regenerate the sleeper.
    fn run_due_tasks(&mut self) {
        let now = Instant::now();
        for (ty, ent) in self.tasks.iter_mut() {
            // Is this task due?
            if !ent.suspended && ent.next_due.map(|time| time <= now).unwrap_or(false) {
                // It is, so run it, and mark it no longer due.
                trace!("launching task {:?}", ty);
                let future = (ent.task)();
                let mut tx = self.internal_tx.clone();
                ent.epoch += 1;
                let epoch = ent.epoch;
                let ty = *ty;
                tokio::spawn(async move {
                    if let Some(next_dur) = future.await {
                        let _ = tx
                            .send(SchedulerCommand::ScheduleTask {
                                task: ty,
                                due: Instant::now() + next_dur,
                                epoch: Some(epoch),
                            })
                            .await;
                    } else {
                        trace!("task {:?} completed running and did not reschedule", ty);
                    }
                });
                ent.next_due = None;
            }
        }
        self.regenerate_sleeper();
    }

    /// Apply a single scheduler command.
    fn handle_command(&mut self, cmd: SchedulerCommand) {
        match cmd {
            SchedulerCommand::ScheduleTask { task, due, epoch } => {
                if let Some(entry) = self.tasks.get_mut(&task) {
                    // Check the epoch matches.
                    if !epoch.map(|ep| ep == entry.epoch).unwrap_or(false) {
                        debug!(
                            "discarding mismatched epoch for {:?} task: want {} got {:?}",
                            task, entry.epoch, epoch
                        );
                        return;
                    }
                    trace!(
                        "task {:?} rescheduled to run in {}s",
                        task,
                        due.saturating_duration_since(Instant::now()).as_secs_f64()
                    );
                    entry.next_due = Some(due);
                    self.regenerate_sleeper();
                } else {
                    warn!(
                        "attempted to schedule a {:?} task, but none registered",
                        task
                    );
                }
            }
            SchedulerCommand::RegisterTask {
                ty,
                task,
                suspended,
                due,
            } => {
                let entry = TaskEntry {
                    task,
                    next_due: due,
                    suspended,
                    epoch: 0,
                };
                debug!("registered a {:?} task", ty);
                self.tasks.insert(ty, entry);
                self.regenerate_sleeper();
            }
            SchedulerCommand::SuspendTask { task, suspended } => {
                if let Some(entry) = self.tasks.get_mut(&task) {
                    trace!("task {:?} suspended = {}", task, suspended);
                    entry.suspended = suspended;
                    self.regenerate_sleeper();
                } else {
                    warn!(
                        "attempted to (un)suspend a {:?} task, but none registered",
                        task
                    );
                }
            }
        }
    }
}

impl Future for SchedulerReactor {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        while let Poll::Ready(rxr) = self.ctl_rx.poll_next_unpin(cx) {
            if let Some(msg) = rxr {
                self.handle_command(msg);
            } else {
                debug!("scheduler exiting: control handle dropped");
                return Poll::Ready(());
            }
        }
        // can't ever be `None` because the reactor owns the `internal_tx`, too
        while let Poll::Ready(Some(msg)) = self.internal_rx.poll_next_unpin(cx) {
            self.handle_command(msg);
        }
        let mut should_rerun = true;
        while should_rerun {
            should_rerun = false;
            if let Some(ref mut sleeper) = self.sleeper {
                if sleeper.as_mut().poll(cx).is_ready() {
                    trace!("sleeper fired, running due tasks");
                    self.run_due_tasks();
                    should_rerun = true;
                }
            }
        }
        Poll::Pending
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn runs_and_reschedules() {
        let scheduler = Scheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        scheduler.register_task_now(
            TaskType::Heartbeat,
            Box::new(move || {
                let count = Arc::clone(&count_clone);
                Box::pin(async move {
                    let n = count.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Some(Duration::from_millis(5))
                    } else {
                        None
                    }
                })
            }),
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(count.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn suspend_prevents_execution() {
        let scheduler = Scheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        scheduler.register_task(
            TaskType::Revalidation,
            Box::new(move || {
                let count = Arc::clone(&count_clone);
                Box::pin(async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    None
                })
            }),
            true,
            Some(Instant::now()),
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
