//! Heartbeat-supervised execution with deadline extension.
//!
//! Long-running work (RL training) cannot get a single useful deadline up
//! front. Instead the worker stamps a heartbeat around every unit of
//! progress. When the deadline passes, the supervisor checks for a recent
//! heartbeat: live work gets its window extended by the policy's backoff
//! factor, stalled work gets a cancellation request and a stalled-timeout
//! error. Extension repeats as long as heartbeats keep arriving, so a healthy
//! run is never killed for being slow.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use sumo_core::PolicyTable;

use crate::classifier::{estimate_timeout, OperationParams};
use crate::error::SuperviseError;

/// Heartbeats within this multiple of the configured interval count as alive.
const HEARTBEAT_TOLERANCE: f64 = 3.0;

type CancelCallback = Box<dyn FnOnce() + Send>;

struct Shared {
    last_heartbeat: Mutex<Instant>,
    cancel_requested: AtomicBool,
    cancel_callback: Mutex<Option<CancelCallback>>,
}

/// Handle passed to supervised work. Cloning shares the underlying session.
#[derive(Clone)]
pub struct SupervisedContext {
    inner: Arc<Shared>,
}

impl SupervisedContext {
    fn new() -> Self {
        Self {
            inner: Arc::new(Shared {
                last_heartbeat: Mutex::new(Instant::now()),
                cancel_requested: AtomicBool::new(false),
                cancel_callback: Mutex::new(None),
            }),
        }
    }

    /// A context with no supervising poll loop. Heartbeats are recorded but
    /// never checked, so the work can only stop via [`Self::request_cancel`].
    pub fn detached() -> Self {
        Self::new()
    }

    /// Stamp a heartbeat, marking the work as making progress.
    pub fn heartbeat(&self) {
        let mut last = self
            .inner
            .last_heartbeat
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *last = Instant::now();
    }

    /// Whether the supervisor has asked this work to stop. Workers should
    /// check this at natural stopping points and wind down cleanly.
    pub fn cancel_requested(&self) -> bool {
        self.inner.cancel_requested.load(Ordering::SeqCst)
    }

    /// Register cleanup to run when cancellation is requested (e.g. closing
    /// a simulator connection). The callback runs at most once, on the
    /// supervising thread. A later registration replaces an unfired one.
    pub fn register_cancel_callback<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut slot = self
            .inner
            .cancel_callback
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(Box::new(callback));
    }

    fn is_alive(&self, heartbeat_interval_secs: f64) -> bool {
        let last = self
            .inner
            .last_heartbeat
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        last.elapsed().as_secs_f64() < heartbeat_interval_secs * HEARTBEAT_TOLERANCE
    }

    /// Ask the work to stop: sets the cancellation flag, then runs the
    /// registered cleanup callback (if any) on the calling thread.
    pub fn request_cancel(&self) {
        self.inner.cancel_requested.store(true, Ordering::SeqCst);
        let callback = {
            let mut slot = self
                .inner
                .cancel_callback
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            slot.take()
        };
        if let Some(callback) = callback {
            if catch_unwind(AssertUnwindSafe(callback)).is_err() {
                eprintln!("[supervise] cancel callback panicked");
            }
        }
    }
}

/// Run `work` under heartbeat supervision.
///
/// The initial deadline comes from the classifier. While heartbeats arrive,
/// the deadline window grows by the policy's backoff factor (clamped to the
/// policy maximum) each time it elapses, and `on_progress` is told about the
/// extension. When the window elapses with no recent heartbeat, cancellation
/// is requested and [`SuperviseError::StalledTimeout`] is returned; the
/// worker thread is left to observe the cancellation flag and wind down.
pub fn run_supervised<T, F>(
    operation: &str,
    params: &OperationParams,
    table: &PolicyTable,
    on_progress: Option<&dyn Fn(&str)>,
    work: F,
) -> Result<T, SuperviseError>
where
    T: Send + 'static,
    F: FnOnce(SupervisedContext) -> T + Send + 'static,
{
    let policy = table.policy_for(operation);
    let mut current_timeout = estimate_timeout(operation, params, table);

    let context = SupervisedContext::new();
    let worker_context = context.clone();
    let (tx, rx) = mpsc::channel();

    thread::Builder::new()
        .name(format!("supervised-{operation}"))
        .spawn(move || {
            let _ = tx.send(work(worker_context));
        })
        .map_err(|source| SuperviseError::Spawn {
            program: std::path::PathBuf::from(format!("thread:supervised-{operation}")),
            source,
        })?;

    let poll_interval =
        Duration::from_secs_f64((policy.heartbeat_interval_secs / 10.0).clamp(0.1, 1.0));
    let started = Instant::now();

    loop {
        match rx.recv_timeout(poll_interval) {
            Ok(value) => return Ok(value),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Err(SuperviseError::WorkerPanicked {
                    operation: operation.to_string(),
                })
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
        }

        let elapsed = started.elapsed().as_secs_f64();
        if elapsed <= current_timeout {
            continue;
        }

        if context.is_alive(policy.heartbeat_interval_secs) {
            current_timeout = (current_timeout * policy.backoff_factor).min(policy.max_timeout_secs);
            if let Some(on_progress) = on_progress {
                on_progress(&format!(
                    "Operation still running, extended timeout to {current_timeout:.0}s"
                ));
            }
        } else {
            context.request_cancel();
            return Err(SuperviseError::StalledTimeout {
                operation: operation.to_string(),
                waited_secs: elapsed,
            });
        }
    }
}
