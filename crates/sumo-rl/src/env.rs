//! The contract between the training loop and a simulation backend.

use std::collections::HashMap;

use crate::error::{EnvError, RlError};

/// Observations returned by a backend. Multi-agent backends key them by
/// traffic light id; single-agent backends return one unkeyed vector.
#[derive(Debug, Clone, PartialEq)]
pub enum Observations {
    PerEntity(HashMap<String, Vec<f64>>),
    Single(Vec<f64>),
}

impl Observations {
    /// Normalize to per-entity form. A `Single` observation maps to the sole
    /// entity; with any other entity count it is a contract violation.
    pub fn normalize(self, entity_ids: &[String]) -> Result<HashMap<String, Vec<f64>>, RlError> {
        match self {
            Observations::PerEntity(map) => Ok(map),
            Observations::Single(values) => {
                if let [only] = entity_ids {
                    Ok(HashMap::from([(only.clone(), values)]))
                } else {
                    Err(RlError::Protocol {
                        message: format!(
                            "backend returned a single observation for {} traffic lights",
                            entity_ids.len()
                        ),
                    })
                }
            }
        }
    }
}

/// One environment step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub observations: Observations,
    /// Rewards for entities that were ready to act this step.
    pub rewards: HashMap<String, f64>,
    pub dones: HashMap<String, bool>,
    /// The episode is over (horizon reached or simulation ended).
    pub all_done: bool,
}

/// A traffic simulation exposed for reinforcement learning.
///
/// Methods take `&self`: backends wrap a connection and serialize access
/// internally, and the trainer shares the handle with the cancellation
/// callback.
pub trait TrafficEnv: Send + Sync {
    /// Ids of the controlled traffic lights. Empty means the network has no
    /// signals and training cannot proceed.
    fn entity_ids(&self) -> Vec<String>;

    /// Start a new episode and return initial observations. The backend
    /// flushes metrics of the previous episode here.
    fn reset(&self) -> Result<Observations, EnvError>;

    fn step(&self, actions: &HashMap<String, usize>) -> Result<StepOutcome, EnvError>;

    /// Discretize an observation vector into a state key for tabular agents.
    fn encode(&self, observation: &[f64], entity_id: &str) -> String;

    /// Number of discrete actions available to one traffic light.
    fn action_count(&self, entity_id: &str) -> usize;

    /// Simulated seconds consumed per step.
    fn delta_time(&self) -> u32 {
        5
    }

    /// Index of the current episode, starting at 0 before the first reset.
    fn episode(&self) -> u32;

    /// Persist metrics for the given episode. The trainer calls this once at
    /// the end of a run; resets cover the earlier episodes.
    fn save_metrics(&self, episode: u32);

    /// Tear down the simulation. Must be safe to call more than once.
    fn close(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_entity_observations_normalize_to_themselves() {
        let map = HashMap::from([("tl0".to_string(), vec![1.0, 2.0])]);
        let normalized = Observations::PerEntity(map.clone())
            .normalize(&["tl0".to_string()])
            .expect("per-entity form is already normalized");
        assert_eq!(normalized, map);
    }

    #[test]
    fn single_observation_maps_to_sole_entity() {
        let normalized = Observations::Single(vec![0.5])
            .normalize(&["tl0".to_string()])
            .expect("single entity accepts single observation");
        assert_eq!(normalized, HashMap::from([("tl0".to_string(), vec![0.5])]));
    }

    #[test]
    fn single_observation_with_many_entities_is_a_protocol_error() {
        let err = Observations::Single(vec![0.5])
            .normalize(&["a".to_string(), "b".to_string()])
            .expect_err("shape mismatch must be rejected");
        assert!(matches!(err, RlError::Protocol { .. }));
    }
}
