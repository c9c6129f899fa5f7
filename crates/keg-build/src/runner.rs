//! Step execution.
//!
//! A thin wrapper around `std::process::Command` so the pipeline never
//! builds processes itself. Shell steps run through `sh -c`; argv steps are
//! executed directly without a shell.

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use keg_core::formula::Step;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur when running a step.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The program could not be found or spawned.
    #[error("failed to execute `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// The step exited unsuccessfully.
    #[error("`{command}` failed ({})", describe_exit(*code))]
    Failed {
        command: String,
        /// The exit code, or `None` if the process was killed by a signal.
        code: Option<i32>,
        /// Combined stdout and stderr.
        output: String,
    },
}

impl CommandError {
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Spawn { .. } => None,
            Self::Failed { code, .. } => *code,
        }
    }

    /// Whatever the step printed before failing.
    pub fn output(&self) -> &str {
        match self {
            Self::Spawn { .. } => "",
            Self::Failed { output, .. } => output,
        }
    }
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "killed by signal".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Output of a successful step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutput {
    pub command: String,
    pub output: String,
}

/// Runs steps in a fixed directory with extra environment variables.
#[derive(Debug, Clone)]
pub struct StepRunner {
    cwd: PathBuf,
    env: Vec<(String, OsString)>,
}

impl StepRunner {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            env: Vec::new(),
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Runs one (already expanded) step to completion.
    ///
    /// # Errors
    ///
    /// [`CommandError::Spawn`] if the program cannot be started,
    /// [`CommandError::Failed`] on a non-zero exit.
    pub fn run(&self, step: &Step) -> Result<StepOutput, CommandError> {
        let command = step.to_string();
        let mut cmd = match step {
            Step::Shell(script) => {
                let mut cmd = Command::new("sh");
                cmd.arg("-c").arg(script);
                cmd
            }
            Step::Exec(argv) => {
                let Some((program, args)) = argv.split_first() else {
                    return Err(CommandError::Spawn {
                        command,
                        source: io::Error::new(io::ErrorKind::InvalidInput, "empty command"),
                    });
                };
                let mut cmd = Command::new(program);
                cmd.args(args);
                cmd
            }
        };
        cmd.current_dir(&self.cwd)
            .stdin(Stdio::null())
            .envs(self.env.iter().map(|(k, v)| (k, v)));

        tracing::debug!(cwd = %self.cwd.display(), %command, "running step");
        let out = cmd.output().map_err(|source| CommandError::Spawn {
            command: command.clone(),
            source,
        })?;

        let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&out.stderr));
        if !out.status.success() {
            return Err(CommandError::Failed {
                command,
                code: out.status.code(),
                output,
            });
        }
        Ok(StepOutput { command, output })
    }
}

/// The last `n` lines of `text`.
pub fn tail_lines(text: &str, n: usize) -> &str {
    let trimmed = text.trim_end();
    match trimmed.rmatch_indices('\n').nth(n.saturating_sub(1)) {
        Some((idx, _)) if n > 0 => &trimmed[idx + 1..],
        _ if n == 0 => "",
        _ => trimmed,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
