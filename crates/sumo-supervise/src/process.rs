//! External process execution with captured output and an adaptive deadline.
//!
//! SUMO tools write progress to stdout/stderr; both streams are captured so
//! tool responses can quote them, and because the server's own stdout carries
//! the JSON-RPC transport and must stay clean.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use sumo_core::PolicyTable;

use crate::classifier::{estimate_timeout, OperationParams};
use crate::error::SuperviseError;

const WAIT_POLL: Duration = Duration::from_millis(50);

/// A command line to run, built up before execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl ProcessCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Rendering for error messages and logs.
    pub fn display_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn duration_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1_000.0
    }
}

fn drain_stream<R: Read + Send + 'static>(stream: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buffer = String::new();
        if let Some(mut stream) = stream {
            let _ = stream.read_to_string(&mut buffer);
        }
        buffer
    })
}

/// Run an external tool, capturing output, with a classifier-derived deadline.
///
/// A non-zero exit is not an error here; callers inspect
/// [`ProcessOutput::success`] and decide how to phrase the failure. Past the
/// deadline the process is killed and [`SuperviseError::Timeout`] is
/// returned.
pub fn run_process(
    command: &ProcessCommand,
    operation: &str,
    params: &OperationParams,
    table: &PolicyTable,
) -> Result<ProcessOutput, SuperviseError> {
    let timeout_secs = estimate_timeout(operation, params, table);
    let started_at = Utc::now();

    let mut builder = Command::new(&command.program);
    builder
        .args(&command.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(cwd) = &command.cwd {
        builder.current_dir(cwd);
    }

    let mut child = builder.spawn().map_err(|source| SuperviseError::Spawn {
        program: command.program.clone(),
        source,
    })?;

    let stdout_handle = drain_stream(child.stdout.take());
    let stderr_handle = drain_stream(child.stderr.take());

    let deadline = Instant::now() + Duration::from_secs_f64(timeout_secs);
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => {}
            Err(_) => break None,
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            // Let the reader threads observe EOF before dropping them.
            let _ = stdout_handle.join();
            let _ = stderr_handle.join();
            return Err(SuperviseError::Timeout {
                operation: operation.to_string(),
                waited_secs: timeout_secs,
            });
        }
        thread::sleep(WAIT_POLL);
    };

    let stdout = stdout_handle.join().unwrap_or_default();
    let stderr = stderr_handle.join().unwrap_or_default();

    Ok(ProcessOutput {
        exit_code: status.and_then(|status| status.code()),
        stdout,
        stderr,
        started_at,
        finished_at: Utc::now(),
    })
}
