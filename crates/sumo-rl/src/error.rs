/// Failure reported by an environment backend (simulator crash, lost
/// connection, malformed state).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct EnvError(pub String);

#[derive(Debug, thiserror::Error)]
pub enum RlError {
    #[error(
        "No traffic lights found in the provided network.\n\
         Hint: RL training requires a network with traffic lights (tlLogic).\n\
         If you generated/converted the network yourself, try enabling TLS guessing \
         (e.g. netgenerate/netconvert with `--tls.guess true`)."
    )]
    NoTrafficLights,

    /// The environment violated the training contract (wrong observation
    /// shape, missing entity, etc.).
    #[error("unexpected environment behavior: {message}")]
    Protocol { message: String },

    #[error("environment error: {0}")]
    Env(#[from] EnvError),

    /// The supervisor asked the run to stop before it finished.
    #[error("training cancelled before completion")]
    Cancelled,
}
