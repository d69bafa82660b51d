//! Runs the `strata` binary built for this test target

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

/// Invocation of the binary against one repository
pub struct StrataCommand {
    cwd: PathBuf,
    argv: Vec<OsString>,
    vars: Vec<(String, String)>,
}

impl StrataCommand {
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        Self {
            cwd: cwd.as_ref().to_path_buf(),
            argv: Vec::new(),
            vars: Vec::new(),
        }
    }

    pub fn args(&mut self, args: &[&str]) -> &mut Self {
        self.argv.extend(args.iter().map(OsString::from));
        self
    }

    pub fn env(&mut self, key: &str, value: &str) -> &mut Self {
        self.vars.push((key.to_string(), value.to_string()));
        self
    }

    /// Run to completion; the environment carries no repository or log filter
    /// unless set with `env`
    pub fn execute(&self) -> Result<CommandResult> {
        let started = Instant::now();
        let output = Command::new(env!("CARGO_BIN_EXE_strata"))
            .current_dir(&self.cwd)
            .args(&self.argv)
            .env_remove("STRATA_REPOSITORY")
            .env_remove("RUST_LOG")
            .envs(self.vars.iter().map(|(k, v)| (k, v)))
            .output()
            .with_context(|| format!("Failed to run strata {:?}", self.argv))?;

        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
            duration: started.elapsed(),
        })
    }

    pub fn assert_success(&self) -> Result<CommandResult> {
        let result = self.execute()?;
        anyhow::ensure!(
            result.success(),
            "strata {:?} exited with {}\nstdout: {}\nstderr: {}",
            self.argv,
            result.exit_code,
            result.stdout,
            result.stderr
        );
        Ok(result)
    }

    pub fn assert_failure(&self) -> Result<CommandResult> {
        let result = self.execute()?;
        anyhow::ensure!(
            !result.success(),
            "strata {:?} unexpectedly succeeded\nstdout: {}",
            self.argv,
            result.stdout
        );
        Ok(result)
    }
}

/// Captured output of one run
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: Duration,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn contains_stdout(&self, text: &str) -> bool {
        self.stdout.contains(text)
    }

    pub fn contains_stderr(&self, text: &str) -> bool {
        self.stderr.contains(text)
    }

    /// First full snapshot id printed on stdout
    pub fn parse_snapshot_id(&self) -> Option<String> {
        self.stdout.lines().find_map(extract_object_id)
    }
}

/// A run of exactly 64 lowercase hex digits within `line`
pub fn extract_object_id(line: &str) -> Option<String> {
    line.split(|c: char| !matches!(c, '0'..='9' | 'a'..='f'))
        .find(|run| run.len() == 64)
        .map(str::to_string)
}
