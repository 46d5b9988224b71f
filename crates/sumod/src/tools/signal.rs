//! Traffic-signal optimization via SUMO tool scripts.

use sumo_supervise::{run_process, OperationParams, ProcessCommand};

use super::{report_run, ToolCtx};

/// Adapt traffic light cycle times to demand with `tlsCycleAdaptation.py`.
pub fn tls_cycle_adaptation(
    ctx: &ToolCtx,
    net_file: &str,
    route_files: &str,
    output_file: &str,
) -> String {
    run_tls_script(
        ctx,
        "tlsCycleAdaptation.py",
        "tlsCycleAdaptation",
        "tls_cycle_adaptation",
        net_file,
        route_files,
        output_file,
        &[],
    )
}

/// Coordinate traffic lights along routes with `tlsCoordinator.py`.
pub fn tls_coordinator(
    ctx: &ToolCtx,
    net_file: &str,
    route_files: &str,
    output_file: &str,
    options: &[String],
) -> String {
    run_tls_script(
        ctx,
        "tlsCoordinator.py",
        "tlsCoordinator",
        "tls_coordinator",
        net_file,
        route_files,
        output_file,
        options,
    )
}

// Both scripts share the -n/-r/-o calling convention.
#[allow(clippy::too_many_arguments)]
fn run_tls_script(
    ctx: &ToolCtx,
    script_name: &str,
    label: &str,
    operation: &str,
    net_file: &str,
    route_files: &str,
    output_file: &str,
    options: &[String],
) -> String {
    let Some(script) = ctx.resolve_tool_script(script_name) else {
        return ctx.missing_script_message(script_name);
    };

    let command = ProcessCommand::new(&ctx.python)
        .arg(script.display().to_string())
        .arg("-n")
        .arg(net_file)
        .arg("-r")
        .arg(route_files)
        .arg("-o")
        .arg(output_file)
        .args(options.iter().cloned());

    report_run(
        ctx,
        label,
        run_process(
            &command,
            operation,
            &OperationParams::default(),
            &ctx.policy_table,
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{fake_ctx, write_fake_tool};
    use super::*;

    #[cfg(unix)]
    #[test]
    fn cycle_adaptation_runs_script_with_net_route_output() {
        let dir = tempfile::tempdir().expect("temp dir");
        write_fake_tool(dir.path(), "tlsCycleAdaptation.py");
        let ctx = fake_ctx(dir.path(), dir.path(), None);

        let report = tls_cycle_adaptation(&ctx, "net.xml", "routes.xml", "tls.add.xml");
        assert!(report.starts_with("tlsCycleAdaptation successful."), "{report}");
        assert!(report.contains("-n net.xml -r routes.xml -o tls.add.xml"), "{report}");
    }

    #[cfg(unix)]
    #[test]
    fn coordinator_appends_extra_options() {
        let dir = tempfile::tempdir().expect("temp dir");
        write_fake_tool(dir.path(), "tlsCoordinator.py");
        let ctx = fake_ctx(dir.path(), dir.path(), None);

        let report = tls_coordinator(
            &ctx,
            "net.xml",
            "routes.xml",
            "coordinated.net.xml",
            &["--speed-factor".to_string(), "0.9".to_string()],
        );
        assert!(report.starts_with("tlsCoordinator successful."), "{report}");
        assert!(report.contains("--speed-factor 0.9"), "{report}");
    }

    #[test]
    fn missing_scripts_are_reported_with_setup_hint() {
        let dir = tempfile::tempdir().expect("temp dir");
        let ctx = fake_ctx(dir.path(), dir.path(), None);

        let report = tls_coordinator(&ctx, "n", "r", "o", &[]);
        assert!(
            report.starts_with("Error: Could not locate SUMO tool script `tlsCoordinator.py`."),
            "{report}"
        );
        assert!(report.contains("$SUMO_HOME/tools/tlsCoordinator.py"), "{report}");
    }
}
