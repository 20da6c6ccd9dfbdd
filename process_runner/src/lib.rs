// Copyright 2026 action-engine contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! Spawns a single external process: environment assembly, output capture, response-file
//! argument swapping, and a hook for file-access tracing.
//!
//! Actual IO-detouring (intercepting the child's own read/write/exec syscalls) is an external
//! collaborator this workspace assumes exists on supporting platforms; what lives here is the
//! [`FileAccessSink`] seam it would report through, plus everything else a process invocation
//! needs regardless of whether detouring is available.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use action_model::{CommandRules, Filename};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AccessKind {
    Read,
    Write,
    Execute,
}

#[derive(Clone, Debug)]
pub struct FileAccessRecord {
    pub path: PathBuf,
    pub access: AccessKind,
}

/// Receives one [`FileAccessRecord`] per observed read/write/execute, when a detouring backend
/// is available and wired up. Responses to a response-file's temp path are filtered out before
/// reaching this sink.
pub trait FileAccessSink: Send + Sync {
    fn record(&self, access: FileAccessRecord);
}

/// Where a child process's stdout/stderr should go.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CaptureMode {
    /// Buffer everything; only surface it (to the progress sink) if the process exits non-zero.
    BufferOnFailure,
    /// Stream each line to the progress sink as it arrives.
    LineStreamed,
}

/// Receives process output lines, under either capture mode.
pub trait ProgressSink: Send + Sync {
    fn line(&self, stream: OutputStream, line: &str);
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

pub struct ProcessSpec {
    pub command: CommandRules,
    pub capture: CaptureMode,
    pub response_file: bool,
    pub inherit_ambient_environment: bool,
    pub file_access_sink: Option<Arc<dyn FileAccessSink>>,
    pub progress_sink: Option<Arc<dyn ProgressSink>>,
}

impl ProcessSpec {
    pub fn new(command: CommandRules) -> ProcessSpec {
        ProcessSpec {
            command,
            capture: CaptureMode::BufferOnFailure,
            response_file: false,
            inherit_ambient_environment: false,
            file_access_sink: None,
            progress_sink: None,
        }
    }
}

#[derive(Debug)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

#[derive(Debug)]
pub enum ProcessError {
    ProcessFailed { exit_code: i32 },
    SpawnFailed { cause: String },
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessError::ProcessFailed { exit_code } => {
                write!(f, "process exited with code {exit_code}")
            }
            ProcessError::SpawnFailed { cause } => write!(f, "failed to spawn process: {cause}"),
        }
    }
}

impl std::error::Error for ProcessError {}

/// The maximum combined argument length (bytes) before `ALLOW_RESPONSEFILE` kicks in and the
/// command line is rewritten to a single `@<path>` argument. Conservative relative to any one
/// platform's real ARG_MAX so the same threshold behaves sanely everywhere.
pub const RESPONSE_FILE_THRESHOLD_BYTES: usize = 30_000;

pub async fn run(spec: ProcessSpec) -> Result<ProcessOutput, ProcessError> {
    let response_file_guard = if spec.response_file {
        Some(write_response_file(&spec.command.arguments)?)
    } else {
        None
    };

    let arguments: Vec<String> = match &response_file_guard {
        Some(guard) => vec![format!("@{}", guard.path().display())],
        None => spec.command.arguments.clone(),
    };

    let mut command = Command::new(spec.command.executable.as_path());
    command
        .args(&arguments)
        .current_dir(spec.command.working_dir.as_path())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    if !spec.inherit_ambient_environment {
        command.env_clear();
    }
    let environment: HashMap<String, String> = spec.command.export_environment().into_iter().collect();
    command.envs(&environment);

    log::debug!(
        "spawning {} with {} argument(s)",
        spec.command.executable,
        spec.command.arguments.len()
    );

    let mut child = command.spawn().map_err(|e| ProcessError::SpawnFailed {
        cause: e.to_string(),
    })?;

    if let Some(sink) = &spec.file_access_sink {
        sink.record(FileAccessRecord {
            path: spec.command.executable.as_path().to_path_buf(),
            access: AccessKind::Execute,
        });
    }

    let stdout_pipe = child.stdout.take().expect("piped stdout");
    let stderr_pipe = child.stderr.take().expect("piped stderr");

    let (stdout, stderr) = match spec.capture {
        CaptureMode::LineStreamed => {
            let sink = spec.progress_sink.clone();
            tokio::try_join!(
                stream_lines(stdout_pipe, OutputStream::Stdout, sink.clone()),
                stream_lines(stderr_pipe, OutputStream::Stderr, sink),
            )
            .map_err(|e: std::io::Error| ProcessError::SpawnFailed { cause: e.to_string() })?
        }
        CaptureMode::BufferOnFailure => {
            use tokio::io::AsyncReadExt;
            let mut stdout_pipe = stdout_pipe;
            let mut stderr_pipe = stderr_pipe;
            let mut stdout = Vec::new();
            let mut stderr = Vec::new();
            tokio::try_join!(
                stdout_pipe.read_to_end(&mut stdout),
                stderr_pipe.read_to_end(&mut stderr),
            )
            .map_err(|e| ProcessError::SpawnFailed { cause: e.to_string() })?;
            (stdout, stderr)
        }
    };

    let status = child.wait().await.map_err(|e| ProcessError::SpawnFailed {
        cause: e.to_string(),
    })?;

    drop(response_file_guard);

    let exit_code = status.code().unwrap_or(-1);
    if let CaptureMode::BufferOnFailure = spec.capture {
        if exit_code != 0 {
            if let Some(sink) = &spec.progress_sink {
                for line in String::from_utf8_lossy(&stdout).lines() {
                    sink.line(OutputStream::Stdout, line);
                }
                for line in String::from_utf8_lossy(&stderr).lines() {
                    sink.line(OutputStream::Stderr, line);
                }
            }
        }
    }

    if exit_code != 0 {
        return Err(ProcessError::ProcessFailed { exit_code });
    }

    Ok(ProcessOutput {
        exit_code,
        stdout,
        stderr,
    })
}

async fn stream_lines(
    pipe: impl tokio::io::AsyncRead + Unpin,
    stream: OutputStream,
    sink: Option<Arc<dyn ProgressSink>>,
) -> std::io::Result<Vec<u8>> {
    let mut reader = BufReader::new(pipe);
    let mut collected = Vec::new();
    let mut line = String::new();
    loop {
        line.clear();
        let read = reader.read_line(&mut line).await?;
        if read == 0 {
            break;
        }
        if let Some(sink) = &sink {
            sink.line(stream, line.trim_end_matches('\n'));
        }
        collected.extend_from_slice(line.as_bytes());
    }
    Ok(collected)
}

fn write_response_file(arguments: &[String]) -> Result<tempfile::NamedTempFile, ProcessError> {
    use std::io::Write;
    let mut file = tempfile::NamedTempFile::new().map_err(|e| ProcessError::SpawnFailed {
        cause: format!("could not create response file: {e}"),
    })?;
    for arg in arguments {
        writeln!(file, "{arg}").map_err(|e| ProcessError::SpawnFailed {
            cause: format!("could not write response file: {e}"),
        })?;
    }
    file.flush().map_err(|e| ProcessError::SpawnFailed {
        cause: e.to_string(),
    })?;
    Ok(file)
}

/// True once the rendered command line would exceed [`RESPONSE_FILE_THRESHOLD_BYTES`].
pub fn exceeds_response_file_threshold(command: &CommandRules) -> bool {
    let total: usize = command.arguments.iter().map(|a| a.len() + 1).sum();
    total > RESPONSE_FILE_THRESHOLD_BYTES
}

/// Rewrite argument values that are absolute paths under `source_root` to be relative to it,
/// for `ALLOW_RELATIVEPATH` actions.
pub fn relativize_arguments(arguments: &[String], source_root: &Path) -> Vec<String> {
    arguments
        .iter()
        .map(|arg| {
            let path = Path::new(arg);
            if path.is_absolute() {
                if let Ok(relative) = path.strip_prefix(source_root) {
                    return relative.to_string_lossy().into_owned();
                }
            }
            arg.clone()
        })
        .collect()
}

/// `Filename` values of every path named on the command line, for dispatch's "known files"
/// mutex-set.
pub fn command_line_paths(command: &CommandRules) -> Vec<Filename> {
    command
        .arguments
        .iter()
        .filter_map(|arg| {
            let path = Path::new(arg);
            path.is_absolute().then(|| Filename::new(path).ok()).flatten()
        })
        .collect()
}
