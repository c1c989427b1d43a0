use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::error::{ActionError, ActionResult};
use crate::{template, Params};

/// Characters that chain, redirect or substitute in `sh`.
const DISALLOWED: &[char] = &['&', ';', '|', '$', '>', '<', '`', '\\', '\n', '\r'];

/// Most stderr kept for the error message.
const MAX_STDERR: usize = 4096;

/// Reject commands that are empty or contain shell metacharacters.
pub fn sanitize_command(cmd: &str) -> ActionResult<()> {
    if cmd.trim().is_empty() {
        return Err(ActionError::UnsafeCommand("exec command is empty after templating"));
    }
    if cmd.contains('\0') {
        return Err(ActionError::UnsafeCommand("exec command contains null byte"));
    }
    if cmd.contains(DISALLOWED) {
        return Err(ActionError::UnsafeCommand(
            "exec command contains disallowed shell characters",
        ));
    }
    Ok(())
}

pub(crate) async fn run(
    template_cmd: &str,
    params: &Params,
    working_dir: &Path,
    timeout: Duration,
) -> ActionResult<()> {
    let cmd = template::expand(template_cmd, params).map_err(|reason| ActionError::Template {
        field: "command",
        reason,
    })?;
    sanitize_command(&cmd)?;
    let cmd = cmd.trim();

    let mut child = Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        // the child dies with the future if the caller goes away
        .kill_on_drop(true)
        .spawn()?;

    let mut stderr = child.stderr.take();
    let stderr_future = async {
        let mut buf = Vec::new();
        if let Some(stderr) = stderr.as_mut() {
            let mut chunk = [0u8; 1024];
            loop {
                match stderr.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let room = MAX_STDERR.saturating_sub(buf.len());
                        buf.extend_from_slice(&chunk[..n.min(room)]);
                    }
                }
            }
        }
        buf
    };

    let outcome = tokio::time::timeout(timeout, async {
        let (status, stderr) = tokio::join!(child.wait(), stderr_future);
        (status, stderr)
    })
    .await;

    let (status, stderr) = match outcome {
        Ok(result) => result,
        Err(_) => {
            let _ = child.kill().await;
            return Err(ActionError::Timeout {
                what: "command",
                secs: timeout.as_secs(),
            });
        }
    };

    let status = status?;
    if status.success() {
        tracing::debug!("exec action completed");
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&stderr).trim().to_string();
    let mut message = match status.code() {
        Some(code) => format!("exit status {}", code),
        None => "terminated by signal".to_string(),
    };
    if !stderr.is_empty() {
        message.push_str(": ");
        message.push_str(&stderr);
    }
    Err(ActionError::CommandFailed(message))
}
