use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use thiserror::Error;
use tracing::{info, warn};

use crate::infra::process::{self, CommandLine, ProcessError, StdinMode};

#[derive(Debug, Error)]
pub enum ConverterError {
    #[error("converter could not be started")]
    Launch(#[source] ProcessError),
    #[error("converter failed")]
    Exit(#[source] ProcessError),
    #[error("converter timed out after {}s", .0.as_secs())]
    TimedOut(Duration),
    #[error("converter output could not be forwarded")]
    Forward(#[source] ProcessError),
}

impl ConverterError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Launch(_) => "converter_launch",
            Self::Exit(_) => "converter_exit",
            Self::TimedOut(_) => "converter_timeout",
            Self::Forward(_) => "converter_forward",
        }
    }
}

impl From<ProcessError> for ConverterError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::EmptyCommand | ProcessError::Launch { .. } => Self::Launch(err),
            ProcessError::Wait { .. } | ProcessError::Exit { .. } => Self::Exit(err),
            ProcessError::Forward { .. } => Self::Forward(err),
        }
    }
}

/// One configured external converter: `<tool> [args…] -s <input> -o <output>`.
#[derive(Debug, Clone)]
pub struct ExternalConverter {
    command: CommandLine,
    working_dir: PathBuf,
    timeout: Duration,
}

impl ExternalConverter {
    /// `tool` is the program path as configured; `args` go before the `-s`/`-o` pair.
    pub fn new(
        tool: &str,
        args: &[String],
        working_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Result<Self, ConverterError> {
        let command = args.iter().fold(
            CommandLine::new(tool).map_err(ConverterError::Launch)?,
            |line, arg| line.arg(arg),
        );
        Ok(Self {
            command,
            working_dir: working_dir.into(),
            timeout,
        })
    }

    /// Full command line for one conversion.
    pub fn invocation(&self, input: &Path, output: &Path) -> CommandLine {
        self.command
            .clone()
            .arg("-s")
            .arg(input)
            .arg("-o")
            .arg(output)
    }

    /// Run the converter and wait for it; a run exceeding the timeout is killed.
    pub async fn convert(&self, input: &Path, output: &Path) -> Result<(), ConverterError> {
        let started_at = Instant::now();
        let line = self.invocation(input, output);

        let result = match tokio::time::timeout(
            self.timeout,
            process::run(&line, &self.working_dir, StdinMode::Null),
        )
        .await
        {
            Ok(outcome) => outcome.map_err(ConverterError::from),
            Err(_) => Err(ConverterError::TimedOut(self.timeout)),
        };

        match &result {
            Ok(()) => info!(
                target = "application::conversion::converter",
                op = "converter::convert",
                result = "ok",
                program = line.program(),
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                input = %input.display(),
                output = %output.display(),
                "Converter finished"
            ),
            Err(err) => warn!(
                target = "application::conversion::converter",
                op = "converter::convert",
                result = "error",
                program = line.program(),
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                error_code = err.error_code(),
                error = %err,
                "Converter invocation failed"
            ),
        }

        result
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::{ffi::OsString, fs, os::unix::fs::PermissionsExt};
    use tempfile::TempDir;

    fn make_executable(path: &Path) {
        let mut perms = fs::metadata(path).expect("metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms).expect("set perms");
    }

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).expect("write script");
        make_executable(&path);
        path
    }

    #[test]
    fn invocation_appends_source_and_output() {
        let converter =
            ExternalConverter::new(
                "pandoc",
                &["--from".to_string(), "html".to_string()],
                "/tmp",
                Duration::from_secs(1),
            )
            .expect("converter");
        let line = converter.invocation(Path::new("/s/in.html"), Path::new("/s/out.rtf"));

        assert_eq!(line.program(), "pandoc");
        assert_eq!(
            line.args(),
            &[
                OsString::from("--from"),
                OsString::from("html"),
                OsString::from("-s"),
                OsString::from("/s/in.html"),
                OsString::from("-o"),
                OsString::from("/s/out.rtf"),
            ]
        );
    }

    #[tokio::test]
    async fn copies_input_with_fake_converter() {
        let dir = TempDir::new().expect("temp dir");
        let args_path = dir.path().join("args.log");
        let script = format!(
            r#"#!/bin/sh
set -eu
echo "$@" > "{args_file}"
while [ "$#" -gt 0 ]; do
  case "$1" in
    -s) shift; src="$1" ;;
    -o) shift; out="$1" ;;
  esac
  shift
done
cp "$src" "$out"
"#,
            args_file = args_path.display()
        );
        let tool = write_script(dir.path(), "fake-converter", &script);

        let input = dir.path().join("in.html");
        let output = dir.path().join("out.rtf");
        fs::write(&input, "<p>hello</p>").expect("write input");

        let converter = ExternalConverter::new(
            &tool.display().to_string(),
            &["--standalone".to_string()],
            dir.path(),
            Duration::from_secs(10),
        )
        .expect("converter");
        converter.convert(&input, &output).await.expect("converted");

        assert_eq!(fs::read_to_string(&output).expect("output"), "<p>hello</p>");
        let args = fs::read_to_string(&args_path).expect("args");
        assert!(args.starts_with("--standalone -s "), "unexpected args: {args}");
        assert!(args.contains(" -o "), "unexpected args: {args}");
    }

    #[tokio::test]
    async fn tool_path_with_spaces_is_launched_as_is() {
        let dir = TempDir::new().expect("temp dir");
        let tools = dir.path().join("My Tools");
        fs::create_dir_all(&tools).expect("tools dir");
        let tool = write_script(
            &tools,
            "conv",
            "#!/bin/sh\nset -eu\nwhile [ \"$#\" -gt 0 ]; do\n  case \"$1\" in\n    -s) shift; src=\"$1\" ;;\n    -o) shift; out=\"$1\" ;;\n  esac\n  shift\ndone\ncp \"$src\" \"$out\"\n",
        );

        let input = dir.path().join("in.html");
        let output = dir.path().join("out.rtf");
        fs::write(&input, "<p>spaced</p>").expect("write input");

        let converter = ExternalConverter::new(
            &tool.display().to_string(),
            &[],
            dir.path(),
            Duration::from_secs(10),
        )
        .expect("converter");
        assert_eq!(
            converter.invocation(&input, &output).program(),
            tool.display().to_string()
        );
        converter.convert(&input, &output).await.expect("converted");

        assert_eq!(fs::read_to_string(&output).expect("output"), "<p>spaced</p>");
    }

    #[tokio::test]
    async fn surfaces_non_zero_exit() {
        let dir = TempDir::new().expect("temp dir");
        let tool = write_script(
            dir.path(),
            "failing-converter",
            "#!/bin/sh\necho \"boom\" >&2\nexit 42\n",
        );

        let converter = ExternalConverter::new(
            &tool.display().to_string(),
            &[],
            dir.path(),
            Duration::from_secs(10),
        )
        .expect("converter");
        let err = converter
            .convert(&dir.path().join("in.html"), &dir.path().join("out.rtf"))
            .await
            .expect_err("expected failure");

        match err {
            ConverterError::Exit(ProcessError::Exit { code, .. }) => assert_eq!(code, Some(42)),
            other => panic!("unexpected error variant: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_tool_fails_to_launch() {
        let dir = TempDir::new().expect("temp dir");
        let converter = ExternalConverter::new(
            "folio-test-missing-converter",
            &[],
            dir.path(),
            Duration::from_secs(10),
        )
        .expect("converter");

        let err = converter
            .convert(&dir.path().join("in.html"), &dir.path().join("out.rtf"))
            .await
            .expect_err("expected launch failure");
        assert!(matches!(err, ConverterError::Launch(_)), "{err:?}");
    }

    #[tokio::test]
    async fn hung_converter_is_timed_out() {
        let dir = TempDir::new().expect("temp dir");
        let tool = write_script(dir.path(), "slow-converter", "#!/bin/sh\nexec sleep 30\n");

        let converter = ExternalConverter::new(
            &tool.display().to_string(),
            &[],
            dir.path(),
            Duration::from_millis(200),
        )
        .expect("converter");

        let started = Instant::now();
        let err = converter
            .convert(&dir.path().join("in.html"), &dir.path().join("out.rtf"))
            .await
            .expect_err("expected timeout");

        assert!(matches!(err, ConverterError::TimedOut(_)), "{err:?}");
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn blank_tool_is_rejected() {
        let err = ExternalConverter::new(" ", &[], "/tmp", Duration::from_secs(1))
            .expect_err("blank tool");
        assert!(matches!(err, ConverterError::Launch(ProcessError::EmptyCommand)));
    }
}
