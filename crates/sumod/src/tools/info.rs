//! Installation report: where SUMO lives and which version answers.

use sumo_core::{find_sumo_home, find_sumo_tools_dir};
use sumo_supervise::{run_process, OperationParams, ProcessCommand};

use super::ToolCtx;

pub fn get_sumo_info(ctx: &ToolCtx) -> String {
    let binary = ctx.resolve_binary("sumo");
    let command = ProcessCommand::new(&binary).arg("--version");

    match run_process(
        &command,
        "sumo_version",
        &OperationParams::default(),
        &ctx.policy_table,
    ) {
        Ok(output) if output.success() => {
            let version = output.stdout.lines().next().unwrap_or("Unknown");
            let home = find_sumo_home()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "Not Set".to_string());
            let tools = find_sumo_tools_dir()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "Not Found".to_string());
            format!(
                "SUMO Binary: {}\nSUMO Version: {version}\nSUMO_HOME: {home}\nSUMO Tools Dir: {tools}",
                binary.display()
            )
        }
        Ok(output) => format!(
            "Error checking SUMO: `sumo --version` exited with code {}.\nStderr: {}",
            output
                .exit_code
                .map(|code| code.to_string())
                .unwrap_or_else(|| "killed".to_string()),
            ctx.truncate(&output.stderr)
        ),
        Err(err) => format!("Error checking SUMO: {err}"),
    }
}
