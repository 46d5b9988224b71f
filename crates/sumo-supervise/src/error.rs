use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SuperviseError {
    /// The work exceeded its computed deadline and no heartbeat supervision
    /// was in effect.
    #[error("operation '{operation}' timed out after {waited_secs:.0}s")]
    Timeout { operation: String, waited_secs: f64 },

    /// The work was heartbeat-supervised, the deadline passed, and no
    /// heartbeat arrived within the tolerance window. Cancellation was
    /// requested before this error was returned.
    #[error("operation '{operation}' timed out after {waited_secs:.0}s with no activity")]
    StalledTimeout { operation: String, waited_secs: f64 },

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The worker thread exited without producing a result.
    #[error("operation '{operation}' worker panicked before producing a result")]
    WorkerPanicked { operation: String },
}
