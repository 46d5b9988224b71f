//! Built-in scenario discovery.
//!
//! Scenarios are directories under a nets root, each holding a `.net.xml`
//! network and a `.rou.xml` route file. The root comes from the
//! `SUMO_RL_NETS_DIR` environment variable.

use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("scenario name is required")]
    EmptyName,

    #[error("could not find .net.xml or .rou.xml in {dir}")]
    IncompleteScenario { dir: PathBuf },

    #[error("scenario '{name}' not found. Available: {available:?}")]
    NotFound { name: String, available: Vec<String> },

    #[error("failed to list scenarios in {dir}: {source}")]
    List {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioFiles {
    pub net_file: PathBuf,
    pub route_file: PathBuf,
}

/// The configured nets root, if set and present.
pub fn default_nets_dir() -> Option<PathBuf> {
    std::env::var_os("SUMO_RL_NETS_DIR")
        .map(PathBuf::from)
        .filter(|dir| dir.is_dir())
}

/// Directory name candidates for a user-supplied scenario name, in priority
/// order. Underscores are a common misspelling of the dashed names, and
/// `single-intersection` historically meant the two-way variant.
pub fn scenario_candidates(scenario_name: &str) -> Vec<String> {
    let raw = scenario_name.trim();
    if raw.is_empty() {
        return Vec::new();
    }

    let mut candidates = vec![raw.to_string()];

    let dashed = raw.replace('_', "-");
    if dashed != raw {
        candidates.push(dashed);
    }

    if raw == "single-intersection" {
        candidates.push("2way-single-intersection".to_string());
    }

    candidates.dedup();
    candidates
}

/// Sorted names of the scenario directories under `nets_dir`.
pub fn list_scenarios(nets_dir: &Path) -> Result<Vec<String>, ScenarioError> {
    let entries = std::fs::read_dir(nets_dir).map_err(|source| ScenarioError::List {
        dir: nets_dir.to_path_buf(),
        source,
    })?;

    let mut names = Vec::new();
    for entry in entries.flatten() {
        if entry.path().is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Resolve a scenario name to its network and route files.
pub fn find_scenario_files(
    nets_dir: &Path,
    scenario_name: &str,
) -> Result<ScenarioFiles, ScenarioError> {
    let candidates = scenario_candidates(scenario_name);
    if candidates.is_empty() {
        return Err(ScenarioError::EmptyName);
    }

    for candidate in candidates {
        let scenario_dir = nets_dir.join(&candidate);
        if !scenario_dir.is_dir() {
            continue;
        }

        let net_file = first_with_suffix(&scenario_dir, ".net.xml");
        let route_file = first_with_suffix(&scenario_dir, ".rou.xml");
        return match (net_file, route_file) {
            (Some(net_file), Some(route_file)) => Ok(ScenarioFiles {
                net_file,
                route_file,
            }),
            _ => Err(ScenarioError::IncompleteScenario { dir: scenario_dir }),
        };
    }

    Err(ScenarioError::NotFound {
        name: scenario_name.to_string(),
        available: list_scenarios(nets_dir).unwrap_or_default(),
    })
}

/// Lexicographically first file in `dir` ending with `suffix`.
fn first_with_suffix(dir: &Path, suffix: &str) -> Option<PathBuf> {
    let mut matches: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.ends_with(suffix))
        })
        .collect();
    matches.sort();
    matches.into_iter().next()
}
