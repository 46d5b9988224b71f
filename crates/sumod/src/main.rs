//! `sumo-mcp`: SUMO tooling served over MCP stdio.
//!
//! stdout carries JSON-RPC frames only; all logging goes to stderr.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use signal_hook::consts::{SIGINT, SIGTERM};
use sumo_core::{load_server_config, ConfigError, ServerConfig};
use sumod::mcp::McpServer;
use sumod::tools::{self, ToolCtx};

const DEFAULT_CONFIG_PATH: &str = "config/sumo-mcp.toml";

const USAGE: &str = "\
Usage: sumo-mcp [COMMAND] [OPTIONS]

Commands:
  serve    Serve MCP over stdio (default)
  info     Print SUMO installation info and exit

Options:
  --config <PATH>   Config file (default: config/sumo-mcp.toml)
  -h, --help        Show this help";

#[derive(Debug, thiserror::Error)]
enum MainError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("{0}\n\n{USAGE}")]
    Usage(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Serve,
    Info,
    Help,
}

#[derive(Debug)]
struct Cli {
    command: Command,
    config_path: PathBuf,
    /// Whether `--config` was given explicitly; a missing default config is
    /// fine, a missing explicit one is an error.
    config_explicit: bool,
}

fn parse_cli(args: &[String]) -> Result<Cli, MainError> {
    let mut command = Command::Serve;
    let mut config_path = PathBuf::from(DEFAULT_CONFIG_PATH);
    let mut config_explicit = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "serve" => command = Command::Serve,
            "info" => command = Command::Info,
            "-h" | "--help" => command = Command::Help,
            "--config" => {
                let Some(value) = iter.next() else {
                    return Err(MainError::Usage("--config requires a path".to_string()));
                };
                config_path = PathBuf::from(value);
                config_explicit = true;
            }
            other => {
                return Err(MainError::Usage(format!("unknown argument: {other}")));
            }
        }
    }

    Ok(Cli {
        command,
        config_path,
        config_explicit,
    })
}

fn load_config(cli: &Cli) -> Result<ServerConfig, MainError> {
    if !cli.config_explicit && !cli.config_path.exists() {
        return Ok(ServerConfig::default());
    }
    Ok(load_server_config(&cli.config_path)?)
}

fn serve(server: &mut McpServer) -> Result<(), MainError> {
    let shutdown = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGINT, shutdown.clone())?;
    signal_hook::flag::register(SIGTERM, shutdown.clone())?;

    // stdin is read on its own thread so the main loop can keep checking the
    // shutdown flag while no requests arrive.
    let (tx, rx) = mpsc::channel::<String>();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    let stdout = io::stdout();
    loop {
        if shutdown.load(Ordering::SeqCst) {
            eprintln!("[sumo-mcp] received shutdown signal, exiting");
            return Ok(());
        }
        match rx.recv_timeout(Duration::from_millis(250)) {
            Ok(line) => {
                if let Some(response) = server.process_line(&line) {
                    let mut out = stdout.lock();
                    out.write_all(response.as_bytes())?;
                    out.write_all(b"\n")?;
                    out.flush()?;
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            // stdin closed: the client is gone.
            Err(mpsc::RecvTimeoutError::Disconnected) => return Ok(()),
        }
    }
}

fn run() -> Result<(), MainError> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_cli(&args)?;

    if cli.command == Command::Help {
        println!("{USAGE}");
        return Ok(());
    }

    let config = load_config(&cli)?;
    for issue in config.validate() {
        eprintln!("[sumo-mcp] config warning ({}): {}", issue.code, issue.message);
    }

    let ctx = Arc::new(ToolCtx::from_config(&config));

    match cli.command {
        Command::Info => {
            println!("{}", tools::info::get_sumo_info(&ctx));
            Ok(())
        }
        Command::Serve => {
            let mut server = McpServer::new();
            tools::register_all(&mut server, ctx);
            eprintln!(
                "[sumo-mcp] serving MCP over stdio ({} tools registered)",
                server.tool_names().len()
            );
            serve(&mut server)
        }
        Command::Help => unreachable!("handled above"),
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("[sumo-mcp] fatal: {err}");
        std::process::exit(1);
    }
}
