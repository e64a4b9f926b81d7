use anyhow::{Context, Result};
use std::{
    path::Path,
    process::{Command, ExitStatus},
};

/// Output of a subprocess run without inheriting the terminal.
#[derive(Debug)]
pub struct Captured {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

/// Run a command capturing stdout/stderr. A spawn failure is an `Err`;
/// a non-zero exit is reported through `Captured::success`.
pub fn run_captured(program: &str, args: &[&str], cwd: Option<&Path>) -> Result<Captured> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    let output = cmd
        .output()
        .with_context(|| format!("failed to run {program}"))?;

    Ok(Captured {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        success: output.status.success(),
    })
}

/// Run a command attached to the terminal (stdio inherited), for setup and
/// teardown scripts and the resume tool.
pub fn run_attached(
    program: &str,
    args: &[&str],
    cwd: &Path,
    envs: &[(&str, &str)],
) -> Result<ExitStatus> {
    let mut cmd = Command::new(program);
    cmd.args(args).current_dir(cwd);
    for (key, value) in envs {
        cmd.env(key, value);
    }
    cmd.status()
        .with_context(|| format!("failed to run {program}"))
}
