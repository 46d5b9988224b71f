//! Pluggable environment backends.
//!
//! The trainer only needs a [`TrafficEnv`]; how one gets built depends on the
//! deployment (TraCI link, libsumo bindings, a test double). Deployments
//! install a factory at startup; until one is installed, training reports
//! what is missing along with SUMO resolution diagnostics.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};

use crate::env::TrafficEnv;
use crate::error::{EnvError, RlError};

/// Everything a backend needs to bring up a simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvConfig {
    pub net_file: PathBuf,
    pub route_file: PathBuf,
    /// Stem for per-episode metrics files.
    pub out_csv_name: PathBuf,
    pub use_gui: bool,
    /// Simulated seconds per episode.
    pub num_seconds: u32,
    pub reward_fn: String,
}

pub type EnvFactory = Arc<dyn Fn(&EnvConfig) -> Result<Arc<dyn TrafficEnv>, RlError> + Send + Sync>;

fn factory_slot() -> &'static Mutex<Option<EnvFactory>> {
    static SLOT: OnceLock<Mutex<Option<EnvFactory>>> = OnceLock::new();
    SLOT.get_or_init(|| Mutex::new(None))
}

/// Install the backend used by subsequent training runs.
pub fn set_environment_factory(factory: EnvFactory) {
    let mut slot = factory_slot()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *slot = Some(factory);
}

/// The installed backend factory, or one that explains its absence.
pub fn resolve_environment_factory() -> EnvFactory {
    let slot = factory_slot()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    match slot.as_ref() {
        Some(factory) => factory.clone(),
        None => Arc::new(|_config: &EnvConfig| {
            Err(RlError::Env(EnvError(format!(
                "no RL simulation backend is installed on this server.\n{}",
                sumo_core::sumo_diagnostics("sumo")
            ))))
        }),
    }
}
