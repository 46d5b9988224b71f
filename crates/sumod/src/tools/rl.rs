//! RL task management: scenario discovery and supervised training runs.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use sumo_rl::{find_scenario_files, EnvConfig, TrainingRun};
use sumo_supervise::{run_supervised, OperationParams};

use super::{param_str, ToolCtx};

pub(crate) const MISSING_NETS_DIR: &str =
    "Error: RL scenario directory not found. Set `SUMO_RL_NETS_DIR` to a directory of scenario folders.";

pub fn list_scenarios(ctx: &ToolCtx) -> String {
    let Some(nets_dir) = &ctx.nets_dir else {
        return MISSING_NETS_DIR.to_string();
    };

    match sumo_rl::list_scenarios(nets_dir) {
        Ok(names) if names.is_empty() => {
            format!("No RL scenarios found in {}", nets_dir.display())
        }
        Ok(names) => {
            let mut lines = vec!["Available RL scenarios:".to_string()];
            lines.extend(names.into_iter().map(|name| format!("- {name}")));
            lines.join("\n")
        }
        Err(err) => format!("Error listing scenarios: {err}"),
    }
}

/// Train on either a built-in scenario or explicit net/route files.
pub fn train_custom(ctx: &ToolCtx, params: Option<&Map<String, Value>>) -> String {
    let scenario_name = param_str(params, "scenario")
        .or_else(|| param_str(params, "scenario_name"))
        .filter(|name| !name.trim().is_empty());

    let files = if let Some(name) = scenario_name {
        let Some(nets_dir) = &ctx.nets_dir else {
            return MISSING_NETS_DIR.to_string();
        };
        match find_scenario_files(nets_dir, name) {
            Ok(files) => Some((files.net_file, files.route_file)),
            Err(err) => return format!("Error: {err}"),
        }
    } else {
        match (param_str(params, "net_file"), param_str(params, "route_file")) {
            (Some(net), Some(route)) => Some((PathBuf::from(net), PathBuf::from(route))),
            _ => None,
        }
    };

    let Some((net_file, route_file)) = files else {
        return "Error: train_custom requires either:\n  - scenario/scenario_name (built-in scenario), OR\n  - net_file + route_file (custom files)\nHint: Use manage_rl_task(list_scenarios) to see available built-in scenarios.".to_string();
    };

    let out_dir = param_str(params, "out_dir")
        .or_else(|| param_str(params, "output_dir"))
        .map(PathBuf::from)
        .unwrap_or_else(|| ctx.output_dir.clone());

    let episodes = match int_param(params, "episodes", "num_episodes", 1) {
        Ok(value) => value,
        Err(message) => return message,
    };
    let steps_per_episode = match int_param(params, "steps", "steps_per_episode", 1_000) {
        Ok(value) => value,
        Err(message) => return message,
    };
    if episodes <= 0 {
        return "Error: episodes must be > 0".to_string();
    }
    if steps_per_episode <= 0 {
        return "Error: steps must be > 0".to_string();
    }
    let Ok(episodes) = u32::try_from(episodes) else {
        return format!("Error: episodes must be <= {}", u32::MAX);
    };
    let Ok(steps_per_episode) = u32::try_from(steps_per_episode) else {
        return format!("Error: steps must be <= {}", u32::MAX);
    };

    let algorithm = param_str(params, "algorithm").unwrap_or("ql");
    if algorithm != "ql" {
        return format!("Algorithm {algorithm} not yet implemented in this tool wrapper.");
    }
    let reward_type = param_str(params, "reward_type").unwrap_or("diff-waiting-time");

    run_training(
        ctx,
        &net_file,
        &route_file,
        &out_dir,
        episodes,
        steps_per_episode,
        reward_type,
    )
}

/// Resolve an integer parameter that may arrive under two names, rejecting
/// non-integer values with a readable message.
fn int_param(
    params: Option<&Map<String, Value>>,
    key: &str,
    alias: &str,
    default: i64,
) -> Result<i64, String> {
    let Some(raw) = params
        .and_then(|map| map.get(key))
        .or_else(|| params.and_then(|map| map.get(alias)))
    else {
        return Ok(default);
    };

    raw.as_i64()
        .ok_or_else(|| format!("Error: {key} must be an integer, got {raw}"))
}

/// Build the environment and drive the training loop under heartbeat
/// supervision. Slow-but-alive runs get their window extended; a stalled
/// simulator gets a cancellation request (which closes the environment) and
/// a timeout report.
pub fn run_training(
    ctx: &ToolCtx,
    net_file: &Path,
    route_file: &Path,
    out_dir: &Path,
    episodes: u32,
    steps_per_episode: u32,
    reward_type: &str,
) -> String {
    if !net_file.exists() {
        return format!("Error: Network file not found at {}", net_file.display());
    }
    if !route_file.exists() {
        return format!("Error: Route file not found at {}", route_file.display());
    }
    if let Err(err) = std::fs::create_dir_all(out_dir) {
        return format!(
            "Training failed: could not create output directory {}: {err}",
            out_dir.display()
        );
    }

    let config = EnvConfig {
        net_file: net_file.to_path_buf(),
        route_file: route_file.to_path_buf(),
        out_csv_name: out_dir.join("train_results"),
        use_gui: false,
        num_seconds: steps_per_episode,
        reward_fn: reward_type.to_string(),
    };
    let run = TrainingRun {
        episodes,
        steps_per_episode,
    };
    let factory = ctx.env_factory.clone();

    let params = OperationParams {
        episodes: Some(episodes),
        steps_per_episode: Some(steps_per_episode),
        ..OperationParams::default()
    };
    let on_progress = |message: &str| eprintln!("[sumo-mcp] rl_training: {message}");

    let outcome = run_supervised(
        "rl_training",
        &params,
        &ctx.policy_table,
        Some(&on_progress),
        move |context| {
            let env = factory(&config)?;
            sumo_rl::run_training(env, &run, &context)
        },
    );

    match outcome {
        Ok(Ok(report)) => report,
        Ok(Err(err)) => format!("Training failed: {err}"),
        Err(err) => format!("Training failed: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::fake_ctx;
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;
    use sumo_rl::{EnvError, Observations, StepOutcome, TrafficEnv};

    fn params_of(value: Value) -> Map<String, Value> {
        value.as_object().expect("params object").clone()
    }

    fn make_scenario(root: &Path, name: &str) {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).expect("create scenario dir");
        std::fs::write(dir.join("net.net.xml"), "<net/>").expect("write net");
        std::fs::write(dir.join("routes.rou.xml"), "<routes/>").expect("write routes");
    }

    /// One entity, episodes finish on the first step with a fixed reward.
    struct TinyEnv;

    impl TrafficEnv for TinyEnv {
        fn entity_ids(&self) -> Vec<String> {
            vec!["tls0".to_string()]
        }
        fn reset(&self) -> Result<Observations, EnvError> {
            Ok(Observations::PerEntity(HashMap::from([(
                "tls0".to_string(),
                vec![0.0],
            )])))
        }
        fn step(&self, _actions: &HashMap<String, usize>) -> Result<StepOutcome, EnvError> {
            Ok(StepOutcome {
                observations: Observations::PerEntity(HashMap::from([(
                    "tls0".to_string(),
                    vec![1.0],
                )])),
                rewards: HashMap::from([("tls0".to_string(), 4.0)]),
                dones: HashMap::from([("tls0".to_string(), true)]),
                all_done: true,
            })
        }
        fn encode(&self, observation: &[f64], _entity_id: &str) -> String {
            format!("{observation:?}")
        }
        fn action_count(&self, _entity_id: &str) -> usize {
            2
        }
        fn episode(&self) -> u32 {
            1
        }
        fn save_metrics(&self, _episode: u32) {}
        fn close(&self) {}
    }

    #[test]
    fn list_scenarios_formats_directory_names() {
        let dir = tempfile::tempdir().expect("temp dir");
        let nets = tempfile::tempdir().expect("nets dir");
        make_scenario(nets.path(), "grid4x4");
        make_scenario(nets.path(), "arterial");
        let ctx = fake_ctx(dir.path(), dir.path(), Some(nets.path()));

        let report = list_scenarios(&ctx);
        assert_eq!(report, "Available RL scenarios:\n- arterial\n- grid4x4");
    }

    #[test]
    fn list_scenarios_without_nets_dir_explains_setup() {
        let dir = tempfile::tempdir().expect("temp dir");
        let ctx = fake_ctx(dir.path(), dir.path(), None);
        assert!(list_scenarios(&ctx).contains("SUMO_RL_NETS_DIR"));
    }

    #[test]
    fn train_custom_requires_scenario_or_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        let ctx = fake_ctx(dir.path(), dir.path(), None);

        let report = train_custom(&ctx, Some(&params_of(json!({}))));
        assert!(report.starts_with("Error: train_custom requires either:"), "{report}");
        assert!(report.contains("list_scenarios"), "{report}");
    }

    #[test]
    fn train_custom_rejects_non_integer_and_non_positive_counts() {
        let dir = tempfile::tempdir().expect("temp dir");
        let ctx = fake_ctx(dir.path(), dir.path(), None);
        let base = json!({"net_file": "n.net.xml", "route_file": "r.rou.xml"});

        let mut params = params_of(base.clone());
        params.insert("episodes".to_string(), json!("three"));
        assert_eq!(
            train_custom(&ctx, Some(&params)),
            "Error: episodes must be an integer, got \"three\""
        );

        let mut params = params_of(base.clone());
        params.insert("episodes".to_string(), json!(0));
        assert_eq!(train_custom(&ctx, Some(&params)), "Error: episodes must be > 0");

        let mut params = params_of(base);
        params.insert("steps".to_string(), json!(-5));
        assert_eq!(train_custom(&ctx, Some(&params)), "Error: steps must be > 0");
    }

    #[test]
    fn train_custom_rejects_counts_beyond_u32_range() {
        let dir = tempfile::tempdir().expect("temp dir");
        let ctx = fake_ctx(dir.path(), dir.path(), None);
        let base = json!({"net_file": "n.net.xml", "route_file": "r.rou.xml"});

        let mut params = params_of(base.clone());
        params.insert("episodes".to_string(), json!(5_000_000_000i64));
        assert_eq!(
            train_custom(&ctx, Some(&params)),
            format!("Error: episodes must be <= {}", u32::MAX)
        );

        let mut params = params_of(base);
        params.insert("steps".to_string(), json!(5_000_000_000i64));
        assert_eq!(
            train_custom(&ctx, Some(&params)),
            format!("Error: steps must be <= {}", u32::MAX)
        );
    }

    #[test]
    fn train_custom_rejects_unknown_algorithm() {
        let dir = tempfile::tempdir().expect("temp dir");
        let ctx = fake_ctx(dir.path(), dir.path(), None);
        let params = params_of(json!({
            "net_file": "n.net.xml",
            "route_file": "r.rou.xml",
            "algorithm": "dqn"
        }));
        assert_eq!(
            train_custom(&ctx, Some(&params)),
            "Algorithm dqn not yet implemented in this tool wrapper."
        );
    }

    #[test]
    fn train_custom_reports_missing_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        let ctx = fake_ctx(dir.path(), dir.path(), None);
        let params = params_of(json!({
            "net_file": "/no/such/n.net.xml",
            "route_file": "/no/such/r.rou.xml"
        }));
        assert_eq!(
            train_custom(&ctx, Some(&params)),
            "Error: Network file not found at /no/such/n.net.xml"
        );
    }

    #[test]
    fn train_custom_reports_unknown_scenario_with_alternatives() {
        let dir = tempfile::tempdir().expect("temp dir");
        let nets = tempfile::tempdir().expect("nets dir");
        make_scenario(nets.path(), "grid4x4");
        let ctx = fake_ctx(dir.path(), dir.path(), Some(nets.path()));

        let params = params_of(json!({"scenario": "nope"}));
        let report = train_custom(&ctx, Some(&params));
        assert!(report.starts_with("Error: scenario 'nope' not found."), "{report}");
        assert!(report.contains("grid4x4"), "{report}");
    }

    #[test]
    fn training_runs_to_completion_with_installed_backend() {
        let dir = tempfile::tempdir().expect("temp dir");
        let nets = tempfile::tempdir().expect("nets dir");
        make_scenario(nets.path(), "grid4x4");
        let out = tempfile::tempdir().expect("out dir");

        let mut ctx = fake_ctx(dir.path(), dir.path(), Some(nets.path()));
        ctx.env_factory = Arc::new(|_config| Ok(Arc::new(TinyEnv) as Arc<dyn TrafficEnv>));

        let params = params_of(json!({
            "scenario": "grid4x4",
            "out_dir": out.path().to_str().expect("utf8"),
            "episodes": 2,
            "steps": 50
        }));
        let report = train_custom(&ctx, Some(&params));
        assert_eq!(
            report,
            "Episode 1/2: Total Reward = 4.00\nEpisode 2/2: Total Reward = 4.00"
        );
    }

    #[test]
    fn backendless_training_is_reported_as_failure() {
        let dir = tempfile::tempdir().expect("temp dir");
        let net = dir.path().join("n.net.xml");
        let route = dir.path().join("r.rou.xml");
        std::fs::write(&net, "<net/>").expect("write net");
        std::fs::write(&route, "<routes/>").expect("write routes");
        let ctx = fake_ctx(dir.path(), dir.path(), None);

        let out = tempfile::tempdir().expect("out dir");
        let params = params_of(json!({
            "net_file": net.to_str().expect("utf8"),
            "route_file": route.to_str().expect("utf8"),
            "out_dir": out.path().to_str().expect("utf8")
        }));
        let report = train_custom(&ctx, Some(&params));
        assert!(report.starts_with("Training failed:"), "{report}");
        assert!(report.contains("no backend in tests"), "{report}");
    }
}
