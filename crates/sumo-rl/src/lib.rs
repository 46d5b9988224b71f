//! Multi-agent Q-learning for traffic signal control.
//!
//! The training loop runs against the [`TrafficEnv`] trait so the simulator
//! backend stays pluggable; the loop itself is designed to live under
//! heartbeat supervision (see `sumo-supervise`).

pub mod agent;
pub mod env;
pub mod error;
pub mod factory;
pub mod scenario;
pub mod trainer;

pub use agent::QlAgent;
pub use env::{Observations, StepOutcome, TrafficEnv};
pub use error::{EnvError, RlError};
pub use factory::{resolve_environment_factory, set_environment_factory, EnvConfig, EnvFactory};
pub use scenario::{
    default_nets_dir, find_scenario_files, list_scenarios, scenario_candidates, ScenarioError,
    ScenarioFiles,
};
pub use trainer::{run_training, TrainingRun};
