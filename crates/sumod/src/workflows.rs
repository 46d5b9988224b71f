//! Multi-step workflows composed from the tool wrappers.
//!
//! Each workflow chains tools, checks every intermediate report for failure,
//! and returns one combined text report. Inputs are copied into the output
//! directory first so the generated `.sumocfg` files reference everything by
//! relative path and stay portable.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::tools::{analysis, demand, network, rl, signal, simulation, ToolCtx};

/// Tool reports phrase failures as text; this is the shared check the
/// workflows use before chaining the next step. Only the status text before
/// the quoted output is inspected, since stdout may legitimately mention
/// flags like `--ignore-errors`.
fn step_failed(report: &str) -> bool {
    let status = report
        .split_once("Stdout:")
        .map_or(report, |(head, _)| head);
    let lower = status.to_lowercase();
    lower.contains("failed") || lower.contains("error")
}

fn copy_to_dir(src: &Path, dst_dir: &Path) -> io::Result<PathBuf> {
    let name = src.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("no file name in {}", src.display()),
        )
    })?;
    let dst = dst_dir.join(name);
    if let (Ok(src_canon), Ok(dst_canon)) = (fs::canonicalize(src), fs::canonicalize(&dst)) {
        if src_canon == dst_canon {
            return Ok(dst);
        }
    }
    fs::copy(src, &dst)?;
    Ok(dst)
}

/// Render a path the way a `.sumocfg` should reference it: relative to the
/// config directory when the file lives under it, bare file name otherwise.
fn config_value(path: &Path, cfg_dir: &Path) -> String {
    match path.strip_prefix(cfg_dir) {
        Ok(rel) => rel.display().to_string(),
        Err(_) => path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string()),
    }
}

pub(crate) fn write_sumo_config(
    cfg_path: &Path,
    net_file: &Path,
    route_file: &Path,
    fcd_file: &Path,
    steps: u64,
    additional_files: &[PathBuf],
) -> io::Result<()> {
    let cfg_dir = cfg_path.parent().unwrap_or_else(|| Path::new("."));

    let additional_line = if additional_files.is_empty() {
        String::new()
    } else {
        let values: Vec<String> = additional_files
            .iter()
            .map(|file| config_value(file, cfg_dir))
            .collect();
        format!("<additional-files value=\"{}\"/>", values.join(","))
    };

    let body = format!(
        r#"<configuration>
    <input>
        <net-file value="{net}"/>
        <route-files value="{route}"/>
        {additional_line}
    </input>
    <time>
        <begin value="0"/>
        <end value="{steps}"/>
    </time>
    <output>
        <fcd-output value="{fcd}"/>
    </output>
</configuration>"#,
        net = config_value(net_file, cfg_dir),
        route = config_value(route_file, cfg_dir),
        fcd = config_value(fcd_file, cfg_dir),
    );
    fs::write(cfg_path, body)
}

/// Optimizer scripts emit either a full network or an additional file with
/// new TLS programs; the root element in the head of the file tells which.
fn is_additional_file(path: &Path) -> bool {
    let Ok(bytes) = fs::read(path) else {
        return false;
    };
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(1_000)]);
    head.contains("<additional")
}

/// Signal optimization: baseline simulation, TLS optimization, optimized
/// simulation, then a side-by-side report.
pub fn signal_opt_workflow(
    ctx: &ToolCtx,
    net_file: &str,
    route_file: &str,
    output_dir: &str,
    steps: u64,
    use_coordinator: bool,
) -> String {
    if net_file.is_empty() || route_file.is_empty() {
        return "Error: signal_opt workflow requires net_file and route_file".to_string();
    }

    let out_dir = Path::new(output_dir);
    if let Err(err) = fs::create_dir_all(out_dir) {
        return format!("Error: could not create output directory {output_dir}: {err}");
    }

    let local_net = match copy_to_dir(Path::new(net_file), out_dir) {
        Ok(path) => path,
        Err(err) => return format!("Error: could not copy {net_file} into {output_dir}: {err}"),
    };
    let local_route = match copy_to_dir(Path::new(route_file), out_dir) {
        Ok(path) => path,
        Err(err) => return format!("Error: could not copy {route_file} into {output_dir}: {err}"),
    };

    let baseline_cfg = out_dir.join("baseline.sumocfg");
    let baseline_fcd = out_dir.join("baseline_fcd.xml");
    let opt_net = out_dir.join("optimized.net.xml");
    let opt_cfg = out_dir.join("optimized.sumocfg");
    let opt_fcd = out_dir.join("optimized_fcd.xml");

    if let Err(err) = write_sumo_config(&baseline_cfg, &local_net, &local_route, &baseline_fcd, steps, &[])
    {
        return format!("Error: could not write {}: {err}", baseline_cfg.display());
    }
    let res_baseline =
        simulation::run_simple_simulation(ctx, &baseline_cfg.to_string_lossy(), steps);
    if step_failed(&res_baseline) {
        return format!("Baseline Simulation Failed: {res_baseline}");
    }
    let analysis_baseline = analysis::analyze_fcd(&baseline_fcd);

    let res_opt = if use_coordinator {
        signal::tls_coordinator(
            ctx,
            &local_net.to_string_lossy(),
            &local_route.to_string_lossy(),
            &opt_net.to_string_lossy(),
            &[],
        )
    } else {
        signal::tls_cycle_adaptation(
            ctx,
            &local_net.to_string_lossy(),
            &local_route.to_string_lossy(),
            &opt_net.to_string_lossy(),
        )
    };
    if step_failed(&res_opt) {
        return format!("Optimization Failed: {res_opt}");
    }

    let write_result = if is_additional_file(&opt_net) {
        // New TLS programs ride alongside the original network.
        write_sumo_config(
            &opt_cfg,
            &local_net,
            &local_route,
            &opt_fcd,
            steps,
            &[opt_net.clone()],
        )
    } else {
        write_sumo_config(&opt_cfg, &opt_net, &local_route, &opt_fcd, steps, &[])
    };
    if let Err(err) = write_result {
        return format!("Error: could not write {}: {err}", opt_cfg.display());
    }

    let res_optimized = simulation::run_simple_simulation(ctx, &opt_cfg.to_string_lossy(), steps);
    if step_failed(&res_optimized) {
        return format!("Optimized Simulation Failed: {res_optimized}");
    }
    let analysis_optimized = analysis::analyze_fcd(&opt_fcd);

    format!(
        "Signal Optimization Workflow Completed.\n\n--- Baseline Results ---\n{res_baseline}\n{analysis_baseline}\n\n--- Optimization Step ---\n{res_opt}\n\n--- Optimized Results ---\n{res_optimized}\n{analysis_optimized}"
    )
}

/// Scenario generation and evaluation: grid network, random demand, routing,
/// simulation, FCD analysis.
pub fn sim_gen_workflow(ctx: &ToolCtx, output_dir: &str, grid_number: u32, steps: u64) -> String {
    let out_dir = Path::new(output_dir);
    if let Err(err) = fs::create_dir_all(out_dir) {
        return format!("Error: could not create output directory {output_dir}: {err}");
    }

    let net_file = out_dir.join("grid.net.xml");
    let trips_file = out_dir.join("trips.trips.xml");
    let route_file = out_dir.join("routes.rou.xml");
    let cfg_file = out_dir.join("scenario.sumocfg");
    let fcd_file = out_dir.join("fcd.xml");

    let res_net = network::netgenerate(ctx, &net_file.to_string_lossy(), true, grid_number, &[]);
    if step_failed(&res_net) {
        return format!("Network Generation Failed: {res_net}");
    }

    let res_trips = demand::random_trips(
        ctx,
        &net_file.to_string_lossy(),
        &trips_file.to_string_lossy(),
        steps as f64,
        1.0,
        &[],
    );
    if step_failed(&res_trips) {
        return format!("Trip Generation Failed: {res_trips}");
    }

    let res_routes = demand::duarouter(
        ctx,
        &net_file.to_string_lossy(),
        &trips_file.to_string_lossy(),
        &route_file.to_string_lossy(),
        &[],
    );
    if step_failed(&res_routes) {
        return format!("Routing Failed: {res_routes}");
    }

    if let Err(err) = write_sumo_config(&cfg_file, &net_file, &route_file, &fcd_file, steps, &[]) {
        return format!("Error: could not write {}: {err}", cfg_file.display());
    }
    let res_sim = simulation::run_simple_simulation(ctx, &cfg_file.to_string_lossy(), steps);
    if step_failed(&res_sim) {
        return format!("Simulation Failed: {res_sim}");
    }
    let analysis_report = analysis::analyze_fcd(&fcd_file);

    format!(
        "Simulation Generation Workflow Completed.\n\n--- Network ---\n{res_net}\n\n--- Demand ---\n{res_trips}\n{res_routes}\n\n--- Simulation ---\n{res_sim}\n{analysis_report}"
    )
}

/// Train a Q-learning agent on a built-in scenario.
pub fn rl_train_workflow(
    ctx: &ToolCtx,
    scenario_name: &str,
    output_dir: &str,
    episodes: u64,
    steps: u64,
) -> String {
    if scenario_name.is_empty() {
        return "Error: rl_train workflow requires scenario_name.\nHint: Use manage_rl_task(list_scenarios) to list built-in scenarios, or use manage_rl_task(train_custom) for custom net/route files.".to_string();
    }
    let Ok(episodes) = u32::try_from(episodes) else {
        return format!("Error: episodes must be <= {}", u32::MAX);
    };
    let Ok(steps) = u32::try_from(steps) else {
        return format!("Error: steps must be <= {}", u32::MAX);
    };

    let Some(nets_dir) = &ctx.nets_dir else {
        return rl::MISSING_NETS_DIR.to_string();
    };
    let files = match sumo_rl::find_scenario_files(nets_dir, scenario_name) {
        Ok(files) => files,
        Err(err) => return format!("Error: {err}"),
    };

    rl::run_training(
        ctx,
        &files.net_file,
        &files.route_file,
        Path::new(output_dir),
        episodes,
        steps,
        "diff-waiting-time",
    )
}
