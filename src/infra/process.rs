//! Child process execution with forwarded output streams.
//!
//! The child's stdout and stderr are piped into two copy futures that forward
//! bytes to this process's own streams while the child runs. Both copies are
//! joined with the child's exit, so a call only returns once all output has
//! been drained.

use std::{
    ffi::OsString,
    io,
    path::Path,
    process::{ExitStatus, Stdio},
    time::Instant,
};

use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    process::Command,
};
use tracing::debug;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("command line is empty")]
    EmptyCommand,
    #[error("failed to launch `{program}`: {source}")]
    Launch { program: String, source: io::Error },
    #[error("failed to wait for `{program}`: {source}")]
    Wait { program: String, source: io::Error },
    #[error("failed to forward {stream} of `{program}`: {source}")]
    Forward {
        program: String,
        stream: &'static str,
        source: io::Error,
    },
    #[error("`{program}` exited with {}", describe_exit(.code))]
    Exit { program: String, code: Option<i32> },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}

/// Where the child's standard input comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdinMode {
    Inherit,
    Null,
}

impl From<StdinMode> for Stdio {
    fn from(mode: StdinMode) -> Self {
        match mode {
            StdinMode::Inherit => Stdio::inherit(),
            StdinMode::Null => Stdio::null(),
        }
    }
}

/// A program name plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: String,
    args: Vec<OsString>,
}

impl CommandLine {
    /// A command for `program` exactly as given, with no arguments yet.
    pub fn new(program: impl Into<String>) -> Result<Self, ProcessError> {
        let program = program.into();
        if program.trim().is_empty() {
            return Err(ProcessError::EmptyCommand);
        }
        Ok(Self {
            program,
            args: Vec::new(),
        })
    }

    /// Split `text` on whitespace into a program and its arguments.
    pub fn parse(text: &str) -> Result<Self, ProcessError> {
        let mut parts = text.split_whitespace();
        let program = parts.next().ok_or(ProcessError::EmptyCommand)?.to_string();
        let args = parts.map(OsString::from).collect();
        Ok(Self { program, args })
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }
}

/// Run `command_text` in `directory` with stdin inherited from this process.
pub async fn execute(directory: &Path, command_text: &str) -> Result<(), ProcessError> {
    let line = CommandLine::parse(command_text)?;
    run(&line, directory, StdinMode::Inherit).await
}

/// Run `line` in `directory`, forwarding its output, and fail on a non-zero exit.
///
/// The child is killed if the returned future is dropped before it exits.
pub async fn run(
    line: &CommandLine,
    directory: &Path,
    stdin: StdinMode,
) -> Result<(), ProcessError> {
    let started_at = Instant::now();
    let program = line.program().to_string();

    let mut child = Command::new(&program)
        .args(line.args())
        .current_dir(directory)
        .stdin(Stdio::from(stdin))
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ProcessError::Launch {
            program: program.clone(),
            source,
        })?;

    debug!(
        target = "infra::process",
        op = "process::run",
        program = %program,
        directory = %directory.display(),
        pid = child.id().unwrap_or_default(),
        "Child process started"
    );

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let wait = async {
        child.wait().await.map_err(|source| ProcessError::Wait {
            program: program.clone(),
            source,
        })
    };

    let (status, _, _) = tokio::try_join!(
        wait,
        forward(stdout, tokio::io::stdout(), &program, "stdout"),
        forward(stderr, tokio::io::stderr(), &program, "stderr"),
    )?;

    debug!(
        target = "infra::process",
        op = "process::run",
        program = %program,
        elapsed_ms = started_at.elapsed().as_millis() as u64,
        exit_code = status.code().map(i64::from).unwrap_or(-1),
        "Child process exited"
    );

    check_status(&program, status)
}

async fn forward<R, W>(
    source: Option<R>,
    mut sink: W,
    program: &str,
    stream: &'static str,
) -> Result<u64, ProcessError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let Some(mut source) = source else {
        return Ok(0);
    };

    let to_error = |source| ProcessError::Forward {
        program: program.to_string(),
        stream,
        source,
    };

    let copied = tokio::io::copy(&mut source, &mut sink)
        .await
        .map_err(to_error)?;
    sink.flush().await.map_err(to_error)?;
    Ok(copied)
}

fn check_status(program: &str, status: ExitStatus) -> Result<(), ProcessError> {
    if status.success() {
        Ok(())
    } else {
        Err(ProcessError::Exit {
            program: program.to_string(),
            code: status.code(),
        })
    }
}
