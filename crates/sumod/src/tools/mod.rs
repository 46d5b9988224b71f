//! Tool registry and shared execution context.
//!
//! Each tool handler receives raw JSON arguments and returns a plain-text
//! report; failures are phrased as text rather than JSON-RPC errors so the
//! calling agent can read them. All subprocess work goes through
//! `sumo-supervise` for deadlines and output capture.

pub mod analysis;
pub mod demand;
pub mod info;
pub mod network;
pub mod rl;
pub mod signal;
pub mod simulation;

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use sumo_core::{
    find_sumo_binary, find_sumo_tool_script, sumo_diagnostics, truncate_text, PolicyTable,
    ServerConfig,
};
use sumo_rl::{resolve_environment_factory, EnvFactory};
use sumo_supervise::{ProcessOutput, SuperviseError};

use crate::mcp::{McpServer, ToolSpec};

/// Shared context threaded through every tool handler.
///
/// The directory overrides exist so tests can point tool execution at fake
/// binaries and scripts; in production they stay `None` and resolution falls
/// through to the SUMO installation.
pub struct ToolCtx {
    pub policy_table: PolicyTable,
    pub output_dir: PathBuf,
    pub max_output_chars: usize,
    /// Interpreter used for SUMO python tool scripts.
    pub python: PathBuf,
    /// Override directory for SUMO binaries.
    pub bin_dir: Option<PathBuf>,
    /// Override directory for SUMO tool scripts.
    pub tools_dir: Option<PathBuf>,
    /// Root of built-in RL scenario directories.
    pub nets_dir: Option<PathBuf>,
    pub env_factory: EnvFactory,
}

impl ToolCtx {
    pub fn from_config(config: &ServerConfig) -> Self {
        let max_output_chars = if std::env::var_os("SUMO_MCP_MAX_OUTPUT_CHARS").is_some() {
            sumo_core::max_output_chars()
        } else {
            config.output.max_chars
        };
        Self {
            policy_table: config.policy_table(),
            output_dir: config.output.dir.clone(),
            max_output_chars,
            python: PathBuf::from("python3"),
            bin_dir: None,
            tools_dir: None,
            nets_dir: sumo_rl::default_nets_dir(),
            env_factory: resolve_environment_factory(),
        }
    }

    pub fn resolve_binary(&self, name: &str) -> PathBuf {
        if let Some(dir) = &self.bin_dir {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return candidate;
            }
        }
        find_sumo_binary(name)
    }

    /// Locate a SUMO python tool script. When an override directory is set it
    /// is authoritative, so tests can exercise the missing-script path.
    pub fn resolve_tool_script(&self, name: &str) -> Option<PathBuf> {
        if let Some(dir) = &self.tools_dir {
            let candidate = dir.join(name);
            return candidate.is_file().then_some(candidate);
        }
        find_sumo_tool_script(name)
    }

    pub fn truncate(&self, text: &str) -> String {
        truncate_text(text, self.max_output_chars)
    }

    pub fn missing_script_message(&self, script_name: &str) -> String {
        format!(
            "Error: Could not locate SUMO tool script `{script_name}`.\n{}\nPlease set `SUMO_HOME` to your SUMO installation directory (so that `$SUMO_HOME/tools/{script_name}` exists).",
            sumo_diagnostics("sumo")
        )
    }
}

/// Standard report for one SUMO tool invocation.
pub(crate) fn report_run(
    ctx: &ToolCtx,
    label: &str,
    outcome: Result<ProcessOutput, SuperviseError>,
) -> String {
    match outcome {
        Ok(output) if output.success() => {
            format!("{label} successful.\nStdout: {}", ctx.truncate(&output.stdout))
        }
        Ok(output) => format!(
            "{label} failed.\nStderr: {}\nStdout: {}",
            ctx.truncate(&output.stderr),
            ctx.truncate(&output.stdout)
        ),
        Err(err) => format!("{label} execution error: {err}"),
    }
}

pub(crate) fn arg_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

pub(crate) fn arg_params<'a>(args: &'a Value) -> Option<&'a Map<String, Value>> {
    args.get("params").and_then(Value::as_object)
}

pub(crate) fn param_str<'a>(params: Option<&'a Map<String, Value>>, key: &str) -> Option<&'a str> {
    params?.get(key).and_then(Value::as_str)
}

pub(crate) fn param_f64(params: Option<&Map<String, Value>>, key: &str) -> Option<f64> {
    params?.get(key).and_then(Value::as_f64)
}

pub(crate) fn param_u64(params: Option<&Map<String, Value>>, key: &str) -> Option<u64> {
    params?.get(key).and_then(Value::as_u64)
}

pub(crate) fn param_bool(params: Option<&Map<String, Value>>, key: &str, default: bool) -> bool {
    params
        .and_then(|map| map.get(key))
        .and_then(Value::as_bool)
        .unwrap_or(default)
}

/// Extra command-line options, passed through verbatim.
pub(crate) fn param_options(params: Option<&Map<String, Value>>) -> Vec<String> {
    params
        .and_then(|map| map.get("options"))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Render a numeric argument the way SUMO tools expect (no trailing `.0`).
pub(crate) fn num_arg(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}

pub fn manage_network(ctx: &ToolCtx, args: &Value) -> String {
    let Some(action) = arg_str(args, "action") else {
        return "Error: action required".to_string();
    };
    let Some(output_file) = arg_str(args, "output_file") else {
        return "Error: output_file required".to_string();
    };
    let params = arg_params(args);
    let mut options = param_options(params);

    match action {
        "generate" => {
            let spider = param_bool(params, "spider", false);
            // A spider layout overrides any grid settings.
            let grid = param_bool(params, "grid", true) && !spider;
            let grid_number = param_u64(params, "grid_number").unwrap_or(3) as u32;
            if spider && !options.iter().any(|option| option == "--spider") {
                options.insert(0, "--spider".to_string());
            }
            network::netgenerate(ctx, output_file, grid, grid_number, &options)
        }
        "convert" | "convert_osm" => match param_str(params, "osm_file") {
            Some(osm_file) => network::netconvert(ctx, osm_file, output_file, &options),
            None => "Error: osm_file required for convert action".to_string(),
        },
        "download_osm" => {
            // output_file acts as the download directory here.
            let Some(bbox) = param_str(params, "bbox") else {
                return "Error: bbox required for download_osm action".to_string();
            };
            let prefix = param_str(params, "prefix").unwrap_or("osm");
            network::osm_get(ctx, bbox, output_file, prefix, &options)
        }
        other => format!("Unknown action: {other}"),
    }
}

pub fn manage_demand(ctx: &ToolCtx, args: &Value) -> String {
    let Some(action) = arg_str(args, "action") else {
        return "Error: action required".to_string();
    };
    let Some(net_file) = arg_str(args, "net_file") else {
        return "Error: net_file required".to_string();
    };
    let Some(output_file) = arg_str(args, "output_file") else {
        return "Error: output_file required".to_string();
    };
    let params = arg_params(args);
    let options = param_options(params);

    match action {
        "generate_random" | "random_trips" => {
            let end_time = param_f64(params, "end_time").unwrap_or(3_600.0);
            let period = param_f64(params, "period").unwrap_or(1.0);
            demand::random_trips(ctx, net_file, output_file, end_time, period, &options)
        }
        "convert_od" | "od_matrix" => match param_str(params, "od_file") {
            Some(od_file) => demand::od2trips(ctx, od_file, output_file, &options),
            None => "Error: od_file required for convert_od".to_string(),
        },
        "compute_routes" | "routing" => match param_str(params, "route_files") {
            Some(route_files) => demand::duarouter(ctx, net_file, route_files, output_file, &options),
            None => "Error: route_files required for compute_routes".to_string(),
        },
        other => format!("Unknown action: {other}"),
    }
}

pub fn optimize_traffic_signals(ctx: &ToolCtx, args: &Value) -> String {
    let Some(method) = arg_str(args, "method") else {
        return "Error: method required".to_string();
    };
    let (Some(net_file), Some(route_file), Some(output_file)) = (
        arg_str(args, "net_file"),
        arg_str(args, "route_file"),
        arg_str(args, "output_file"),
    ) else {
        return "Error: net_file, route_file and output_file required".to_string();
    };
    let options = param_options(arg_params(args));

    match method {
        "cycle_adaptation" | "Websters" => {
            signal::tls_cycle_adaptation(ctx, net_file, route_file, output_file)
        }
        "coordination" => signal::tls_coordinator(ctx, net_file, route_file, output_file, &options),
        other => format!("Unknown method: {other}"),
    }
}

pub fn run_workflow(ctx: &ToolCtx, args: &Value) -> String {
    let Some(workflow_name) = arg_str(args, "workflow_name") else {
        return "Error: workflow_name required".to_string();
    };
    let params = arg_params(args);

    match workflow_name {
        "sim_gen_eval" | "sim_gen_workflow" | "sim_gen" => crate::workflows::sim_gen_workflow(
            ctx,
            param_str(params, "output_dir").unwrap_or("output"),
            param_u64(params, "grid_number").unwrap_or(3) as u32,
            param_u64(params, "steps").unwrap_or(100),
        ),
        "signal_opt" | "signal_opt_workflow" => crate::workflows::signal_opt_workflow(
            ctx,
            param_str(params, "net_file").unwrap_or(""),
            param_str(params, "route_file").unwrap_or(""),
            param_str(params, "output_dir").unwrap_or("output"),
            param_u64(params, "steps").unwrap_or(3_600),
            param_bool(params, "use_coordinator", false),
        ),
        "rl_train" => crate::workflows::rl_train_workflow(
            ctx,
            param_str(params, "scenario_name").unwrap_or(""),
            param_str(params, "output_dir").unwrap_or("output"),
            param_u64(params, "episodes").unwrap_or(5),
            param_u64(params, "steps").unwrap_or(1_000),
        ),
        other => format!("Unknown workflow: {other}"),
    }
}

pub fn manage_rl_task(ctx: &ToolCtx, args: &Value) -> String {
    let Some(action) = arg_str(args, "action") else {
        return "Error: action required".to_string();
    };
    let params = arg_params(args);

    match action {
        "list_scenarios" => rl::list_scenarios(ctx),
        "train_custom" => rl::train_custom(ctx, params),
        other => format!("Unknown action: {other}"),
    }
}

pub fn run_simple_simulation(ctx: &ToolCtx, args: &Value) -> String {
    let Some(config_path) = arg_str(args, "config_path") else {
        return "Error: config_path required".to_string();
    };
    let steps = args.get("steps").and_then(Value::as_u64).unwrap_or(100);
    simulation::run_simple_simulation(ctx, config_path, steps)
}

pub fn run_analysis(args: &Value) -> String {
    let Some(fcd_file) = arg_str(args, "fcd_file") else {
        return "Error: fcd_file required".to_string();
    };
    analysis::analyze_fcd(std::path::Path::new(fcd_file))
}

/// Register the full SUMO tool surface on an MCP server.
pub fn register_all(server: &mut McpServer, ctx: Arc<ToolCtx>) {
    let tool_ctx = ctx.clone();
    server.register_tool(
        ToolSpec {
            name: "manage_network",
            description: "Manage SUMO network (generate, convert, or download OSM).",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "action": {
                        "type": "string",
                        "enum": ["generate", "convert", "download_osm"],
                        "description": "Network operation to perform"
                    },
                    "output_file": {
                        "type": "string",
                        "description": "Output path (a directory for download_osm)"
                    },
                    "params": {
                        "type": "object",
                        "description": "generate: grid/grid_number/spider; convert: osm_file; download_osm: bbox/prefix"
                    }
                },
                "required": ["action", "output_file"]
            }),
        },
        Box::new(move |args| manage_network(&tool_ctx, args)),
    );

    let tool_ctx = ctx.clone();
    server.register_tool(
        ToolSpec {
            name: "manage_demand",
            description: "Manage traffic demand (random trips, OD matrix, routing).",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "action": {
                        "type": "string",
                        "enum": ["generate_random", "convert_od", "compute_routes"]
                    },
                    "net_file": {"type": "string"},
                    "output_file": {"type": "string"},
                    "params": {
                        "type": "object",
                        "description": "generate_random: end_time/period; convert_od: od_file; compute_routes: route_files"
                    }
                },
                "required": ["action", "net_file", "output_file"]
            }),
        },
        Box::new(move |args| manage_demand(&tool_ctx, args)),
    );

    let tool_ctx = ctx.clone();
    server.register_tool(
        ToolSpec {
            name: "optimize_traffic_signals",
            description: "Optimize traffic signals (cycle adaptation or coordination).",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "method": {
                        "type": "string",
                        "enum": ["cycle_adaptation", "coordination"]
                    },
                    "net_file": {"type": "string"},
                    "route_file": {"type": "string"},
                    "output_file": {"type": "string"},
                    "params": {"type": "object"}
                },
                "required": ["method", "net_file", "route_file", "output_file"]
            }),
        },
        Box::new(move |args| optimize_traffic_signals(&tool_ctx, args)),
    );

    let tool_ctx = ctx.clone();
    server.register_tool(
        ToolSpec {
            name: "run_workflow",
            description: "Run high-level workflows (sim_gen_eval, signal_opt, rl_train).",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "workflow_name": {
                        "type": "string",
                        "enum": ["sim_gen_eval", "signal_opt", "rl_train"]
                    },
                    "params": {
                        "type": "object",
                        "description": "sim_gen_eval: output_dir/grid_number/steps; signal_opt: net_file/route_file/output_dir/steps/use_coordinator; rl_train: scenario_name/output_dir/episodes/steps"
                    }
                },
                "required": ["workflow_name", "params"]
            }),
        },
        Box::new(move |args| run_workflow(&tool_ctx, args)),
    );

    let tool_ctx = ctx.clone();
    server.register_tool(
        ToolSpec {
            name: "manage_rl_task",
            description: "Manage RL tasks (list scenarios, custom training).",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "action": {
                        "type": "string",
                        "enum": ["list_scenarios", "train_custom"]
                    },
                    "params": {
                        "type": "object",
                        "description": "train_custom: scenario or net_file+route_file, out_dir, episodes, steps, algorithm, reward_type"
                    }
                },
                "required": ["action"]
            }),
        },
        Box::new(move |args| manage_rl_task(&tool_ctx, args)),
    );

    let tool_ctx = ctx.clone();
    server.register_tool(
        ToolSpec {
            name: "get_sumo_info",
            description: "Get the version and path of the installed SUMO.",
            input_schema: json!({"type": "object", "properties": {}}),
        },
        Box::new(move |_args| info::get_sumo_info(&tool_ctx)),
    );

    let tool_ctx = ctx.clone();
    server.register_tool(
        ToolSpec {
            name: "run_simple_simulation",
            description: "Run a SUMO simulation using a config file.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "config_path": {"type": "string"},
                    "steps": {"type": "integer", "default": 100}
                },
                "required": ["config_path"]
            }),
        },
        Box::new(move |args| run_simple_simulation(&tool_ctx, args)),
    );

    server.register_tool(
        ToolSpec {
            name: "run_analysis",
            description: "Analyze FCD output.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "fcd_file": {"type": "string"}
                },
                "required": ["fcd_file"]
            }),
        },
        Box::new(move |args| run_analysis(args)),
    );
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::path::Path;
    use sumo_rl::{EnvConfig, RlError};

    /// Context wired to a directory of fake tool binaries and scripts.
    pub(crate) fn fake_ctx(bin_dir: &Path, tools_dir: &Path, nets_dir: Option<&Path>) -> ToolCtx {
        ToolCtx {
            policy_table: PolicyTable::builtin(),
            output_dir: PathBuf::from("output"),
            max_output_chars: 8_000,
            python: PathBuf::from("sh"),
            bin_dir: Some(bin_dir.to_path_buf()),
            tools_dir: Some(tools_dir.to_path_buf()),
            nets_dir: nets_dir.map(Path::to_path_buf),
            env_factory: Arc::new(|_config: &EnvConfig| {
                Err(RlError::Env(sumo_rl::EnvError(
                    "no backend in tests".to_string(),
                )))
            }),
        }
    }

    /// A shell script that echoes its arguments and exits 0.
    #[cfg(unix)]
    pub(crate) fn write_fake_tool(dir: &Path, name: &str) {
        write_fake_script(dir, name, "#!/bin/sh\necho \"args: $@\"\n")
    }

    #[cfg(unix)]
    pub(crate) fn write_failing_tool(dir: &Path, name: &str) {
        write_fake_script(dir, name, "#!/bin/sh\necho boom >&2\nexit 2\n")
    }

    #[cfg(unix)]
    pub(crate) fn write_fake_script(dir: &Path, name: &str, body: &str) {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, body).expect("write fake tool");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("mark fake tool executable");
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{fake_ctx, write_fake_tool};
    use super::*;

    #[test]
    fn manage_network_rejects_missing_required_args() {
        let dir = tempfile::tempdir().expect("temp dir");
        let ctx = fake_ctx(dir.path(), dir.path(), None);

        assert_eq!(manage_network(&ctx, &json!({})), "Error: action required");
        assert_eq!(
            manage_network(&ctx, &json!({"action": "generate"})),
            "Error: output_file required"
        );
        assert_eq!(
            manage_network(&ctx, &json!({"action": "teleport", "output_file": "x"})),
            "Unknown action: teleport"
        );
    }

    #[cfg(unix)]
    #[test]
    fn manage_network_generate_passes_grid_flags() {
        let dir = tempfile::tempdir().expect("temp dir");
        write_fake_tool(dir.path(), "netgenerate");
        let ctx = fake_ctx(dir.path(), dir.path(), None);

        let report = manage_network(
            &ctx,
            &json!({
                "action": "generate",
                "output_file": "grid.net.xml",
                "params": {"grid_number": 5}
            }),
        );
        assert!(report.starts_with("Netgenerate successful."), "{report}");
        assert!(report.contains("--grid --grid.number 5"), "{report}");
    }

    #[cfg(unix)]
    #[test]
    fn manage_network_spider_overrides_grid() {
        let dir = tempfile::tempdir().expect("temp dir");
        write_fake_tool(dir.path(), "netgenerate");
        let ctx = fake_ctx(dir.path(), dir.path(), None);

        let report = manage_network(
            &ctx,
            &json!({
                "action": "generate",
                "output_file": "spider.net.xml",
                "params": {"spider": true}
            }),
        );
        assert!(report.contains("--spider"), "{report}");
        assert!(!report.contains("--grid"), "{report}");
    }

    #[test]
    fn manage_network_convert_requires_osm_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let ctx = fake_ctx(dir.path(), dir.path(), None);
        assert_eq!(
            manage_network(&ctx, &json!({"action": "convert", "output_file": "net.xml"})),
            "Error: osm_file required for convert action"
        );
    }

    #[test]
    fn manage_demand_validates_per_action_params() {
        let dir = tempfile::tempdir().expect("temp dir");
        let ctx = fake_ctx(dir.path(), dir.path(), None);

        let base = json!({"action": "convert_od", "net_file": "n", "output_file": "o"});
        assert_eq!(
            manage_demand(&ctx, &base),
            "Error: od_file required for convert_od"
        );

        let base = json!({"action": "compute_routes", "net_file": "n", "output_file": "o"});
        assert_eq!(
            manage_demand(&ctx, &base),
            "Error: route_files required for compute_routes"
        );
    }

    #[test]
    fn optimize_traffic_signals_rejects_unknown_method() {
        let dir = tempfile::tempdir().expect("temp dir");
        let ctx = fake_ctx(dir.path(), dir.path(), None);
        let report = optimize_traffic_signals(
            &ctx,
            &json!({
                "method": "magic",
                "net_file": "n",
                "route_file": "r",
                "output_file": "o"
            }),
        );
        assert_eq!(report, "Unknown method: magic");
    }

    #[test]
    fn run_workflow_rejects_unknown_workflow() {
        let dir = tempfile::tempdir().expect("temp dir");
        let ctx = fake_ctx(dir.path(), dir.path(), None);
        assert_eq!(
            run_workflow(&ctx, &json!({"workflow_name": "nope", "params": {}})),
            "Unknown workflow: nope"
        );
    }

    #[test]
    fn manage_rl_task_rejects_unknown_action() {
        let dir = tempfile::tempdir().expect("temp dir");
        let ctx = fake_ctx(dir.path(), dir.path(), None);
        assert_eq!(
            manage_rl_task(&ctx, &json!({"action": "dance"})),
            "Unknown action: dance"
        );
    }

    #[test]
    fn register_all_exposes_the_full_tool_surface() {
        let dir = tempfile::tempdir().expect("temp dir");
        let ctx = Arc::new(fake_ctx(dir.path(), dir.path(), None));
        let mut server = McpServer::new();
        register_all(&mut server, ctx);

        let names = server.tool_names();
        for expected in [
            "manage_network",
            "manage_demand",
            "optimize_traffic_signals",
            "run_workflow",
            "manage_rl_task",
            "get_sumo_info",
            "run_simple_simulation",
            "run_analysis",
        ] {
            assert!(names.iter().any(|name| *name == expected), "missing {expected}");
        }
    }

    #[test]
    fn num_arg_drops_trailing_zero_fraction() {
        assert_eq!(num_arg(3_600.0), "3600");
        assert_eq!(num_arg(0.5), "0.5");
    }
}
