//! Thin async wrapper around the external media tools (ffmpeg, ffprobe, yt-dlp)

use std::ffi::OsStr;
use std::process::{ExitStatus, Stdio};
use tracing::debug;

/// Captured result of one external tool invocation
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Last `lines` non-empty lines of stderr, for error messages
    pub fn stderr_tail(&self, lines: usize) -> String {
        let tail: Vec<&str> = self
            .stderr
            .lines()
            .filter(|line| !line.trim().is_empty())
            .collect();
        let start = tail.len().saturating_sub(lines);
        tail[start..].join("\n")
    }
}

/// Run `program` to completion and capture its output.
///
/// Only a failure to spawn or wait on the process is an error here; a
/// non-zero exit is reported through `ToolOutput::status`.
pub async fn run_tool<I, S>(program: &str, args: I) -> std::io::Result<ToolOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<S> = args.into_iter().collect();
    debug!(
        "Running {} {}",
        program,
        args.iter()
            .map(|a| a.as_ref().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    );

    let output = tokio::process::Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await?;

    Ok(ToolOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_tool_captures_output() {
        let output = run_tool("sh", ["-c", "echo out; echo err >&2; exit 3"]).await.unwrap();
        assert!(!output.success());
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr_tail(5), "err");
    }

    #[tokio::test]
    async fn test_run_tool_missing_program() {
        let result = run_tool("definitely-not-a-real-binary-4821", ["--version"]).await;
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stderr_tail_limits_lines() {
        let output = run_tool("sh", ["-c", "printf 'a\\n\\nb\\nc\\n' >&2"]).await.unwrap();
        assert_eq!(output.stderr_tail(2), "b\nc");
    }
}
