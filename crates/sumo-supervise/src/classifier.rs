//! Parameter-aware timeout estimation.
//!
//! Fast tools get their static base timeout. Tools whose runtime scales with
//! input size get a linear adjustment from the relevant parameter. RL training
//! is estimated from episode count and length with a safety margin, since the
//! base timeout is meaningless for large runs.

use serde::{Deserialize, Serialize};
use sumo_core::PolicyTable;

const DEFAULT_END_TIME_SECS: f64 = 3_600.0;
const DEFAULT_ESTIMATED_ROUTES: f64 = 1_000.0;
const DEFAULT_SIMULATION_STEPS: f64 = 1_000.0;
const DEFAULT_EPISODES: f64 = 1.0;
const DEFAULT_STEPS_PER_EPISODE: f64 = 1_000.0;

/// Workload hints supplied by the caller. Every field is optional; estimation
/// uses conservative defaults for anything missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationParams {
    /// Simulated end time in seconds (trip generation).
    pub end_time: Option<f64>,
    /// Expected number of routes (routing).
    pub estimated_routes: Option<f64>,
    /// Simulation step count.
    pub steps: Option<u64>,
    /// Training episode count.
    pub episodes: Option<u32>,
    /// Steps per training episode.
    pub steps_per_episode: Option<u32>,
}

/// Estimate a timeout in seconds for one run of `operation`.
///
/// The result never exceeds the policy's `max_timeout_secs`.
pub fn estimate_timeout(operation: &str, params: &OperationParams, table: &PolicyTable) -> f64 {
    let policy = table.policy_for(operation);
    let mut timeout = policy.base_timeout_secs;

    match operation {
        "random_trips" => {
            // Every 100s of simulated time adds one second of timeout.
            let end_time = params.end_time.unwrap_or(DEFAULT_END_TIME_SECS);
            timeout += end_time / 100.0;
        }
        "duarouter" => {
            let routes = params.estimated_routes.unwrap_or(DEFAULT_ESTIMATED_ROUTES);
            timeout += routes * 0.05;
        }
        "simulation" => {
            let steps = params
                .steps
                .map(|steps| steps as f64)
                .unwrap_or(DEFAULT_SIMULATION_STEPS);
            timeout += steps * 0.01;
        }
        "rl_training" => {
            let episodes = params
                .episodes
                .map(f64::from)
                .unwrap_or(DEFAULT_EPISODES);
            let steps_per_episode = params
                .steps_per_episode
                .map(f64::from)
                .unwrap_or(DEFAULT_STEPS_PER_EPISODE);
            // Rough throughput of 50 steps/s, with a 1.5x margin.
            let estimated = episodes * (steps_per_episode / 50.0);
            timeout = policy.base_timeout_secs.max(estimated * 1.5);
        }
        _ => {}
    }

    timeout.min(policy.max_timeout_secs)
}
