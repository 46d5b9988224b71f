//! Adaptive supervision for SUMO tool runs.
//!
//! Three layers, matched to how predictable the workload is:
//! 1. static deadlines for fast tools,
//! 2. parameter-adaptive deadlines for tools that scale with input size,
//! 3. heartbeat supervision with backoff extension for open-ended work.

pub mod bounded;
pub mod classifier;
pub mod error;
pub mod heartbeat;
pub mod process;

pub use bounded::run_bounded;
pub use classifier::{estimate_timeout, OperationParams};
pub use error::SuperviseError;
pub use heartbeat::{run_supervised, SupervisedContext};
pub use process::{run_process, ProcessCommand, ProcessOutput};
