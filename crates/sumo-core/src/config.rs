//! Configuration types for the SUMO MCP server.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Per-operation-class timeout configuration.
///
/// Invariants checked by [`ServerConfig::validate`]:
/// `base_timeout_secs <= max_timeout_secs` and `backoff_factor >= 1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeoutPolicy {
    pub base_timeout_secs: f64,
    pub max_timeout_secs: f64,
    pub backoff_factor: f64,
    pub heartbeat_interval_secs: f64,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            base_timeout_secs: 60.0,
            max_timeout_secs: 3_600.0,
            backoff_factor: 2.0,
            heartbeat_interval_secs: 10.0,
        }
    }
}

impl TimeoutPolicy {
    fn simple(base_timeout_secs: f64, max_timeout_secs: f64) -> Self {
        Self {
            base_timeout_secs,
            max_timeout_secs,
            ..Self::default()
        }
    }
}

/// Table of named operation classes to timeout policies.
///
/// Unknown operation names fall back to [`TimeoutPolicy::default`].
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyTable {
    entries: HashMap<String, TimeoutPolicy>,
}

impl PolicyTable {
    /// The built-in table matching the stock SUMO tool set.
    pub fn builtin() -> Self {
        let mut entries = HashMap::new();
        entries.insert("netconvert".to_string(), TimeoutPolicy::simple(300.0, 600.0));
        entries.insert("netgenerate".to_string(), TimeoutPolicy::simple(120.0, 300.0));
        entries.insert("osm_get".to_string(), TimeoutPolicy::simple(120.0, 300.0));
        entries.insert("random_trips".to_string(), TimeoutPolicy::simple(60.0, 600.0));
        entries.insert("duarouter".to_string(), TimeoutPolicy::simple(120.0, 1_800.0));
        entries.insert("od2trips".to_string(), TimeoutPolicy::simple(120.0, 1_800.0));
        entries.insert("simulation".to_string(), TimeoutPolicy::simple(60.0, 1_800.0));
        entries.insert(
            "tls_cycle_adaptation".to_string(),
            TimeoutPolicy::simple(120.0, 600.0),
        );
        entries.insert(
            "tls_coordinator".to_string(),
            TimeoutPolicy::simple(120.0, 600.0),
        );
        entries.insert(
            "rl_training".to_string(),
            TimeoutPolicy {
                base_timeout_secs: 300.0,
                max_timeout_secs: 7_200.0,
                backoff_factor: 1.5,
                heartbeat_interval_secs: 30.0,
            },
        );
        Self { entries }
    }

    pub fn policy_for(&self, operation: &str) -> TimeoutPolicy {
        self.entries
            .get(operation)
            .copied()
            .unwrap_or_default()
    }

    pub fn contains(&self, operation: &str) -> bool {
        self.entries.contains_key(operation)
    }

    /// Install or replace the policy for one operation class.
    pub fn set(&mut self, operation: impl Into<String>, policy: TimeoutPolicy) {
        self.entries.insert(operation.into(), policy);
    }

    pub fn operation_names(&self) -> Vec<String> {
        let mut names = self.entries.keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Partial policy override as it appears in the config file.
///
/// Missing fields keep the built-in value for that operation class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeoutPolicyOverride {
    pub base_timeout_secs: Option<f64>,
    pub max_timeout_secs: Option<f64>,
    pub backoff_factor: Option<f64>,
    pub heartbeat_interval_secs: Option<f64>,
}

impl TimeoutPolicyOverride {
    fn apply(&self, base: TimeoutPolicy) -> TimeoutPolicy {
        TimeoutPolicy {
            base_timeout_secs: self.base_timeout_secs.unwrap_or(base.base_timeout_secs),
            max_timeout_secs: self.max_timeout_secs.unwrap_or(base.max_timeout_secs),
            backoff_factor: self.backoff_factor.unwrap_or(base.backoff_factor),
            heartbeat_interval_secs: self
                .heartbeat_interval_secs
                .unwrap_or(base.heartbeat_interval_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub max_chars: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            max_chars: crate::output::DEFAULT_MAX_OUTPUT_CHARS,
        }
    }
}

/// Server-wide configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub output: OutputConfig,
    /// Per-operation timeout policy overrides, merged over the built-in table.
    #[serde(default)]
    pub timeouts: HashMap<String, TimeoutPolicyOverride>,
}

/// A single problem found while validating a config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub code: String,
    pub message: String,
}

impl ServerConfig {
    /// The effective policy table: built-in defaults with file overrides applied.
    pub fn policy_table(&self) -> PolicyTable {
        let mut table = PolicyTable::builtin();
        for (operation, patch) in &self.timeouts {
            let base = table.policy_for(operation);
            table.set(operation.clone(), patch.apply(base));
        }
        table
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        let table = self.policy_table();
        for name in table.operation_names() {
            let policy = table.policy_for(&name);
            if policy.base_timeout_secs > policy.max_timeout_secs {
                issues.push(ConfigIssue {
                    code: format!("timeouts.{name}.base_exceeds_max"),
                    message: format!(
                        "operation '{name}': base timeout {:.1}s exceeds max {:.1}s",
                        policy.base_timeout_secs, policy.max_timeout_secs
                    ),
                });
            }
            if policy.backoff_factor < 1.0 {
                issues.push(ConfigIssue {
                    code: format!("timeouts.{name}.backoff_below_one"),
                    message: format!(
                        "operation '{name}': backoff factor {:.2} must be >= 1.0",
                        policy.backoff_factor
                    ),
                });
            }
            if policy.heartbeat_interval_secs <= 0.0 {
                issues.push(ConfigIssue {
                    code: format!("timeouts.{name}.heartbeat_not_positive"),
                    message: format!("operation '{name}': heartbeat interval must be positive"),
                });
            }
        }
        issues
    }
}

pub fn parse_server_config(contents: &str) -> Result<ServerConfig, toml::de::Error> {
    toml::from_str(contents)
}

pub fn load_server_config(path: impl AsRef<Path>) -> Result<ServerConfig, ConfigError> {
    let path_ref = path.as_ref();
    let body = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
        path: path_ref.to_path_buf(),
        source,
    })?;
    parse_server_config(&body).map_err(|source| ConfigError::Parse {
        path: path_ref.to_path_buf(),
        source,
    })
}
