//! Utilities for running external commands.

use anyhow::{Context, Result, bail};
use tokio::process::Command;

pub struct Output {
    pub stdout: String,
    pub stderr: String,
}

/// Runs a program to completion, failing on a non-zero exit status.
pub async fn run(program: &str, args: &[&str]) -> Result<Output> {
    tracing::debug!(program, ?args, "running command");

    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .with_context(|| format!("failed to launch {program}"))?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    if !output.status.success() {
        tracing::debug!(status = ?output.status, %stderr, "command returned non-zero status");
        bail!(
            "{program} {} failed with {}: {}",
            args.join(" "),
            output.status,
            stderr.trim()
        );
    }

    Ok(Output { stdout, stderr })
}
