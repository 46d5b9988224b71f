//! Single-deadline execution for in-process work.
//!
//! The work runs on its own thread and the caller blocks on a channel with a
//! deadline computed by the classifier. On timeout the worker thread is
//! leaked; it keeps running until natural completion and its result is
//! discarded. There is no way to preempt an arbitrary closure, and leaking is
//! preferable to tearing down the server.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use sumo_core::PolicyTable;

use crate::classifier::{estimate_timeout, OperationParams};
use crate::error::SuperviseError;

/// Run `work` with a parameter-adaptive deadline.
///
/// Work-level failures travel inside `T` (typically a `Result`); the error
/// here covers only supervision outcomes.
pub fn run_bounded<T, F>(
    operation: &str,
    params: &OperationParams,
    table: &PolicyTable,
    work: F,
) -> Result<T, SuperviseError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let timeout_secs = estimate_timeout(operation, params, table);
    let (tx, rx) = mpsc::channel();

    thread::Builder::new()
        .name(format!("bounded-{operation}"))
        .spawn(move || {
            let _ = tx.send(work());
        })
        .map_err(|source| SuperviseError::Spawn {
            program: std::path::PathBuf::from(format!("thread:bounded-{operation}")),
            source,
        })?;

    match rx.recv_timeout(Duration::from_secs_f64(timeout_secs)) {
        Ok(value) => Ok(value),
        Err(mpsc::RecvTimeoutError::Timeout) => Err(SuperviseError::Timeout {
            operation: operation.to_string(),
            waited_secs: timeout_secs,
        }),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(SuperviseError::WorkerPanicked {
            operation: operation.to_string(),
        }),
    }
}
