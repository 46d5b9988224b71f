//! Demand tools: trip generation, OD matrix conversion, and routing.

use sumo_supervise::{run_process, OperationParams, ProcessCommand};

use super::{num_arg, report_run, ToolCtx};

/// Generate random trips with `randomTrips.py` up to `end_time` simulated
/// seconds, one departure every `period` seconds.
pub fn random_trips(
    ctx: &ToolCtx,
    net_file: &str,
    output_file: &str,
    end_time: f64,
    period: f64,
    options: &[String],
) -> String {
    let Some(script) = ctx.resolve_tool_script("randomTrips.py") else {
        return ctx.missing_script_message("randomTrips.py");
    };

    let command = ProcessCommand::new(&ctx.python)
        .arg(script.display().to_string())
        .arg("-n")
        .arg(net_file)
        .arg("-o")
        .arg(output_file)
        .arg("-e")
        .arg(num_arg(end_time))
        .arg("-p")
        .arg(num_arg(period))
        .args(options.iter().cloned());

    let params = OperationParams {
        end_time: Some(end_time),
        ..OperationParams::default()
    };
    report_run(
        ctx,
        "randomTrips",
        run_process(&command, "random_trips", &params, &ctx.policy_table),
    )
}

/// Compute routes from trips with `duarouter`. Broken trips are skipped
/// rather than aborting the whole run.
pub fn duarouter(
    ctx: &ToolCtx,
    net_file: &str,
    trips_file: &str,
    output_file: &str,
    options: &[String],
) -> String {
    let command = ProcessCommand::new(ctx.resolve_binary("duarouter"))
        .arg("-n")
        .arg(net_file)
        .arg("--route-files")
        .arg(trips_file)
        .arg("-o")
        .arg(output_file)
        .arg("--ignore-errors")
        .args(options.iter().cloned());

    report_run(
        ctx,
        "duarouter",
        run_process(
            &command,
            "duarouter",
            &OperationParams::default(),
            &ctx.policy_table,
        ),
    )
}

/// Convert an OD matrix into individual trips with `od2trips`.
pub fn od2trips(ctx: &ToolCtx, od_file: &str, output_file: &str, options: &[String]) -> String {
    let command = ProcessCommand::new(ctx.resolve_binary("od2trips"))
        .arg("--od-matrix-files")
        .arg(od_file)
        .arg("-o")
        .arg(output_file)
        .args(options.iter().cloned());

    report_run(
        ctx,
        "od2trips",
        run_process(
            &command,
            "od2trips",
            &OperationParams::default(),
            &ctx.policy_table,
        ),
    )
}
