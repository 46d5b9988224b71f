//! Tabular Q-learning agent, one per controlled traffic light.

use std::collections::HashMap;

const ALPHA: f64 = 0.1;
const GAMMA: f64 = 0.99;

#[derive(Debug, Clone)]
pub struct QlAgent {
    q_table: HashMap<String, Vec<f64>>,
    state: String,
    action: Option<usize>,
    action_count: usize,
    acc_reward: f64,
}

impl QlAgent {
    pub fn new(starting_state: String, action_count: usize) -> Self {
        let mut q_table = HashMap::new();
        q_table.insert(starting_state.clone(), vec![0.0; action_count]);
        Self {
            q_table,
            state: starting_state,
            action: None,
            action_count,
            acc_reward: 0.0,
        }
    }

    /// Re-align for a new episode start. The learned table survives.
    pub fn reset_to(&mut self, state: String) {
        self.ensure_row(&state);
        self.state = state;
        self.action = None;
        self.acc_reward = 0.0;
    }

    /// Pick the greedy action for the current state and remember it.
    pub fn act(&mut self) -> usize {
        let row = self
            .q_table
            .get(&self.state)
            .expect("current state always has a q-table row");
        let action = argmax(row);
        self.action = Some(action);
        action
    }

    /// Standard Q-learning update, then advance to `next_state`.
    ///
    /// A no-op when no action is pending (e.g. the backend rewarded an agent
    /// that was not asked to act this step).
    pub fn learn(&mut self, next_state: String, reward: f64, done: bool) {
        let Some(action) = self.action else {
            return;
        };

        self.ensure_row(&next_state);
        let next_best = self.q_table[&next_state]
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        let continuation = if done { 0.0 } else { GAMMA * next_best };

        let row = self
            .q_table
            .get_mut(&self.state)
            .expect("current state always has a q-table row");
        row[action] += ALPHA * (reward + continuation - row[action]);

        self.state = next_state;
        self.action = None;
        self.acc_reward += reward;
    }

    pub fn accumulated_reward(&self) -> f64 {
        self.acc_reward
    }

    fn ensure_row(&mut self, state: &str) {
        if !self.q_table.contains_key(state) {
            self.q_table
                .insert(state.to_string(), vec![0.0; self.action_count]);
        }
    }
}

fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (index, value) in values.iter().enumerate().skip(1) {
        if *value > values[best] {
            best = index;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_agent_acts_greedily_with_first_action_on_ties() {
        let mut agent = QlAgent::new("s0".to_string(), 3);
        assert_eq!(agent.act(), 0);
    }

    #[test]
    fn learn_applies_q_update_and_advances_state() {
        let mut agent = QlAgent::new("s0".to_string(), 2);
        agent.act();
        agent.learn("s1".to_string(), 10.0, false);

        // q[s0][0] = 0 + 0.1 * (10 + 0.99 * 0 - 0) = 1.0
        assert_eq!(agent.q_table["s0"][0], 1.0);
        assert_eq!(agent.state, "s1");
        assert_eq!(agent.accumulated_reward(), 10.0);

        // The higher-valued action is preferred next time s0 comes around.
        agent.reset_to("s0".to_string());
        assert_eq!(agent.act(), 0);
    }

    #[test]
    fn terminal_update_ignores_future_value() {
        let mut agent = QlAgent::new("s0".to_string(), 2);
        agent.q_table.insert("s1".to_string(), vec![100.0, 100.0]);
        agent.act();
        agent.learn("s1".to_string(), 1.0, true);

        // Done: continuation value is dropped. q[s0][0] = 0.1 * 1.0
        assert!((agent.q_table["s0"][0] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn learn_without_pending_action_is_a_no_op() {
        let mut agent = QlAgent::new("s0".to_string(), 2);
        agent.learn("s1".to_string(), 5.0, false);
        assert_eq!(agent.state, "s0");
        assert_eq!(agent.accumulated_reward(), 0.0);
    }

    #[test]
    fn reset_preserves_learned_values() {
        let mut agent = QlAgent::new("s0".to_string(), 2);
        agent.act();
        agent.learn("s1".to_string(), 10.0, false);
        agent.reset_to("s0".to_string());

        assert_eq!(agent.q_table["s0"][0], 1.0);
        assert_eq!(agent.accumulated_reward(), 0.0);
        assert!(agent.action.is_none());
    }
}
