//! Batch simulation runs.
//!
//! The simulation runs as a plain `sumo` subprocess bounded by `--end`; all
//! results come from the files the config asks for (e.g. FCD output) plus the
//! process streams. The server's own stdout carries JSON-RPC, so SUMO output
//! is captured and only quoted back in the tool report.

use std::path::Path;

use sumo_supervise::{run_process, OperationParams, ProcessCommand};

use super::ToolCtx;

/// Run a simulation from a `.sumocfg` for `steps` simulated seconds.
pub fn run_simple_simulation(ctx: &ToolCtx, config_path: &str, steps: u64) -> String {
    if !Path::new(config_path).exists() {
        return format!("Error: Config file not found at {config_path}");
    }

    let binary = ctx.resolve_binary("sumo");
    let command = ProcessCommand::new(&binary)
        .arg("-c")
        .arg(config_path)
        .arg("--no-step-log")
        .arg("true")
        .arg("--end")
        .arg(steps.to_string());

    let params = OperationParams {
        steps: Some(steps),
        ..OperationParams::default()
    };
    match run_process(&command, "simulation", &params, &ctx.policy_table) {
        Ok(output) if output.success() => format!(
            "Simulation finished successfully.\nSteps run: {steps}\nWall time: {:.1}s\nStdout: {}",
            output.duration_secs(),
            ctx.truncate(&output.stdout)
        ),
        Ok(output) => format!(
            "Simulation error: sumo exited with code {}.\n- config_path: {config_path}\n- steps: {steps}\n- sumo_binary: {}\n- SUMO_HOME: {}\nStderr: {}",
            output
                .exit_code
                .map(|code| code.to_string())
                .unwrap_or_else(|| "killed".to_string()),
            binary.display(),
            sumo_home_env(),
            ctx.truncate(&output.stderr)
        ),
        Err(err) => format!(
            "Simulation error: {err}\n- config_path: {config_path}\n- steps: {steps}\n- sumo_binary: {}\n- SUMO_HOME: {}",
            binary.display(),
            sumo_home_env()
        ),
    }
}

fn sumo_home_env() -> String {
    std::env::var("SUMO_HOME").unwrap_or_else(|_| "Not Set".to_string())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{fake_ctx, write_fake_script, write_fake_tool};
    use super::*;

    #[test]
    fn missing_config_is_reported_before_launching() {
        let dir = tempfile::tempdir().expect("temp dir");
        let ctx = fake_ctx(dir.path(), dir.path(), None);

        let report = run_simple_simulation(&ctx, "/no/such/file.sumocfg", 100);
        assert_eq!(report, "Error: Config file not found at /no/such/file.sumocfg");
    }

    #[cfg(unix)]
    #[test]
    fn successful_run_reports_steps_and_output() {
        let dir = tempfile::tempdir().expect("temp dir");
        write_fake_tool(dir.path(), "sumo");
        let cfg = dir.path().join("sim.sumocfg");
        std::fs::write(&cfg, "<configuration/>").expect("write config");
        let ctx = fake_ctx(dir.path(), dir.path(), None);

        let report = run_simple_simulation(&ctx, cfg.to_str().expect("utf8"), 250);
        assert!(report.starts_with("Simulation finished successfully.\nSteps run: 250"), "{report}");
        assert!(report.contains("--no-step-log true --end 250"), "{report}");
    }

    #[cfg(unix)]
    #[test]
    fn failing_run_includes_exit_code_and_stderr() {
        let dir = tempfile::tempdir().expect("temp dir");
        write_fake_script(dir.path(), "sumo", "#!/bin/sh\necho \"Loading failed\" >&2\nexit 1\n");
        let cfg = dir.path().join("sim.sumocfg");
        std::fs::write(&cfg, "<configuration/>").expect("write config");
        let ctx = fake_ctx(dir.path(), dir.path(), None);

        let report = run_simple_simulation(&ctx, cfg.to_str().expect("utf8"), 100);
        assert!(report.starts_with("Simulation error: sumo exited with code 1."), "{report}");
        assert!(report.contains("Loading failed"), "{report}");
        assert!(report.contains("- steps: 100"), "{report}");
    }
}
