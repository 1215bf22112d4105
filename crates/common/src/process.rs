//! Helpers for the external media tools (ffmpeg/ffprobe) Snapreel shells out to.

use std::process::{Command, Stdio};

use tokio::io::AsyncReadExt;
use tokio::process::ChildStderr;
use tokio::task::JoinHandle;

/// Whether `binary` resolves on `PATH`.
pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Read a child's stderr to completion in the background so the child never
/// blocks on a full pipe. Resolves to the collected text.
pub fn drain_stderr(stderr: ChildStderr) -> JoinHandle<String> {
    tokio::spawn(async move {
        let mut reader = stderr;
        let mut output = String::new();
        match reader.read_to_string(&mut output).await {
            Ok(_) => output,
            Err(err) => format!("<failed to read stderr: {err}>"),
        }
    })
}

/// Last non-empty line of a tool's stderr, for compact error messages.
pub fn last_line(output: &str) -> &str {
    output
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
}
