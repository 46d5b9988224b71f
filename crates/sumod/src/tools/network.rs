//! Network tools: `netconvert`, `netgenerate`, and the `osmGet.py` downloader.

use std::fs;

use sumo_supervise::{run_process, OperationParams, ProcessCommand};

use super::{report_run, ToolCtx};

/// Convert an OSM extract into a SUMO network.
pub fn netconvert(ctx: &ToolCtx, osm_file: &str, output_file: &str, options: &[String]) -> String {
    let command = ProcessCommand::new(ctx.resolve_binary("netconvert"))
        .arg("--osm-files")
        .arg(osm_file)
        .arg("-o")
        .arg(output_file)
        .args(options.iter().cloned());

    report_run(
        ctx,
        "Netconvert",
        run_process(
            &command,
            "netconvert",
            &OperationParams::default(),
            &ctx.policy_table,
        ),
    )
}

/// Generate an abstract network. With `grid` set, a square grid of
/// `grid_number` junctions per side; otherwise the layout comes from
/// `options` (e.g. `--spider`).
pub fn netgenerate(
    ctx: &ToolCtx,
    output_file: &str,
    grid: bool,
    grid_number: u32,
    options: &[String],
) -> String {
    let mut command = ProcessCommand::new(ctx.resolve_binary("netgenerate"))
        .arg("-o")
        .arg(output_file);
    if grid {
        command = command
            .arg("--grid")
            .arg("--grid.number")
            .arg(grid_number.to_string());
    }
    command = command.args(options.iter().cloned());

    report_run(
        ctx,
        "Netgenerate",
        run_process(
            &command,
            "netgenerate",
            &OperationParams::default(),
            &ctx.policy_table,
        ),
    )
}

/// Download an OSM extract for a bounding box into `output_dir`.
///
/// `osmGet.py` writes into its working directory, so the command runs with
/// `output_dir` as cwd.
pub fn osm_get(
    ctx: &ToolCtx,
    bbox: &str,
    output_dir: &str,
    prefix: &str,
    options: &[String],
) -> String {
    let Some(script) = ctx.resolve_tool_script("osmGet.py") else {
        return ctx.missing_script_message("osmGet.py");
    };

    if let Err(err) = fs::create_dir_all(output_dir) {
        return format!("osmGet execution error: failed to create {output_dir}: {err}");
    }

    let command = ProcessCommand::new(&ctx.python)
        .arg(script.display().to_string())
        .arg("--bbox")
        .arg(bbox)
        .arg("--prefix")
        .arg(prefix)
        .args(options.iter().cloned())
        .current_dir(output_dir);

    report_run(
        ctx,
        "osmGet",
        run_process(
            &command,
            "osm_get",
            &OperationParams::default(),
            &ctx.policy_table,
        ),
    )
}
