//! The training loop driver.
//!
//! Runs multi-agent Q-learning against a [`TrafficEnv`] under heartbeat
//! supervision: a heartbeat is stamped around every environment call, the
//! cancellation flag is checked before every call, and environment teardown
//! is registered as the cancel callback so a stalled simulator still gets
//! closed.

use std::collections::HashMap;
use std::sync::Arc;

use sumo_supervise::SupervisedContext;

use crate::agent::QlAgent;
use crate::env::TrafficEnv;
use crate::error::RlError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingRun {
    pub episodes: u32,
    pub steps_per_episode: u32,
}

impl Default for TrainingRun {
    fn default() -> Self {
        Self {
            episodes: 1,
            steps_per_episode: 1_000,
        }
    }
}

/// Run training to completion and return the per-episode report.
///
/// Episodes are bounded: even if the backend never reports completion, an
/// episode ends after `steps_per_episode / delta_time` steps plus a small
/// margin, so a miscounting backend cannot hang the loop.
pub fn run_training(
    env: Arc<dyn TrafficEnv>,
    run: &TrainingRun,
    context: &SupervisedContext,
) -> Result<String, RlError> {
    let entity_ids = env.entity_ids();
    if entity_ids.is_empty() {
        return Err(RlError::NoTrafficLights);
    }

    {
        let env = env.clone();
        context.register_cancel_callback(move || env.close());
    }

    let steps_bound = (run.steps_per_episode / env.delta_time().max(1)).max(1) + 10;

    let mut agents: HashMap<String, QlAgent> = HashMap::new();
    let mut report = Vec::with_capacity(run.episodes as usize);

    for episode in 1..=run.episodes {
        if context.cancel_requested() {
            return Err(RlError::Cancelled);
        }

        context.heartbeat();
        let observations = env.reset()?;
        context.heartbeat();
        let mut ready = observations.normalize(&entity_ids)?;

        for (entity_id, observation) in &ready {
            let state = env.encode(observation, entity_id);
            match agents.get_mut(entity_id) {
                Some(agent) => agent.reset_to(state),
                None => {
                    let agent = QlAgent::new(state, env.action_count(entity_id));
                    agents.insert(entity_id.clone(), agent);
                }
            }
        }

        let mut episode_reward = 0.0;
        for _ in 0..steps_bound {
            if context.cancel_requested() {
                return Err(RlError::Cancelled);
            }

            let actions: HashMap<String, usize> = ready
                .keys()
                .filter_map(|entity_id| {
                    agents
                        .get_mut(entity_id)
                        .map(|agent| (entity_id.clone(), agent.act()))
                })
                .collect();

            context.heartbeat();
            let outcome = env.step(&actions)?;
            context.heartbeat();
            let next = outcome.observations.normalize(&entity_ids)?;

            for (entity_id, reward) in &outcome.rewards {
                let Some(agent) = agents.get_mut(entity_id) else {
                    continue;
                };
                let Some(observation) = next.get(entity_id) else {
                    continue;
                };
                let done = outcome.dones.get(entity_id).copied().unwrap_or(false);
                agent.learn(env.encode(observation, entity_id), *reward, done);
                episode_reward += reward;
            }

            ready = next;
            if outcome.all_done {
                break;
            }
        }

        report.push(format!(
            "Episode {episode}/{}: Total Reward = {episode_reward:.2}",
            run.episodes
        ));
    }

    // Resets flush metrics for earlier episodes; the last one is explicit.
    env.save_metrics(env.episode());

    Ok(report.join("\n"))
}
