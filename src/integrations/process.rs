//! Subprocess plumbing shared by the command line integrations

use std::process::Stdio;
use tokio::process::Command;

use crate::core::{BridgeError, BridgeResult};

/// `program arg1 arg2 ...`, as shown in logs and error messages
pub fn command_line<S: AsRef<str>>(program: &str, args: &[S]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(AsRef::as_ref))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run `program` to completion and return its trimmed standard output.
///
/// Failing to spawn and a non-zero exit are both `ExternalTool` errors; the
/// latter carries the exit code and standard error text. The child is killed
/// if the returned future is dropped.
pub async fn run_captured<S: AsRef<str>>(program: &str, args: &[S]) -> BridgeResult<String> {
    let line = command_line(program, args);
    tracing::debug!("[Process] Running: {}", line);

    let output = Command::new(program)
        .args(args.iter().map(AsRef::as_ref))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| BridgeError::external(&line, e.to_string()))?;

    if !output.status.success() {
        let code = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::warn!("[Process] {} exited with {}", line, code);
        return Err(BridgeError::external(
            line,
            format!("exit {}: {}", code, stderr.trim()),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line() {
        assert_eq!(command_line("qmd", &["get", "#a1"]), "qmd get #a1");
        assert_eq!(command_line::<&str>("qmd", &[]), "qmd");
    }

    #[tokio::test]
    async fn test_stdout_is_trimmed() {
        let out = run_captured("sh", &["-c", "echo '  hello  '"]).await.unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn test_exit_code_and_stderr_reported() {
        let err = run_captured("sh", &["-c", "echo broken >&2; exit 3"])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "sh -c echo broken >&2; exit 3 failed: exit 3: broken");
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let err = run_captured::<&str>("no-such-binary-here", &[]).await.unwrap_err();
        assert!(matches!(err, BridgeError::ExternalTool { .. }));
    }
}
