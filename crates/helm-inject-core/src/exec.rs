//! Running external tools
//!
//! Every wrapped command (fetch, template, inject, upgrade) goes through a
//! [`CommandExecutor`]. The [`SystemExecutor`] resolves the program on the
//! search path before spawning anything and captures stdout and stderr in
//! full. Stages then decide what a non-empty stderr means through a
//! [`StderrPolicy`].

use std::fmt;
use std::process::{Command, Stdio};

use crate::error::{CoreError, Result};

/// A program plus its argument vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Parse a user-supplied command line such as `istioctl kube-inject`
    ///
    /// The first word is the program, the rest become leading arguments.
    pub fn from_command_line(line: &str) -> Result<Self> {
        let mut words = shell_words::split(line)
            .map_err(|e| CoreError::config(format!("cannot parse command '{}': {}", line, e)))?
            .into_iter();
        let program = words
            .next()
            .ok_or_else(|| CoreError::config("command line is empty"))?;
        Ok(Self {
            program,
            args: words.collect(),
        })
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// What a stage does with stderr output from a successful command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StderrPolicy {
    /// Any stderr output fails the stage
    #[default]
    Fail,
    /// Stderr output is logged as a warning
    Warn,
}

/// Output of a command that exited successfully
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CapturedOutput {
    pub fn stdout(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            stdout: bytes.into(),
            stderr: Vec::new(),
        }
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }

    /// Take stdout, applying `policy` to whatever was written to stderr
    pub fn into_stdout(self, invocation: &Invocation, policy: StderrPolicy) -> Result<Vec<u8>> {
        if !self.stderr.is_empty() {
            let stderr = self.stderr_text();
            match policy {
                StderrPolicy::Fail => {
                    return Err(CoreError::StderrOutput {
                        command: invocation.to_string(),
                        stderr,
                    });
                }
                StderrPolicy::Warn => {
                    tracing::warn!(command = %invocation, %stderr, "command wrote to stderr");
                }
            }
        }
        Ok(self.stdout)
    }
}

/// Runs an [`Invocation`] to completion
pub trait CommandExecutor {
    /// Run the command and capture its output
    ///
    /// Returns an error if the program cannot be found, fails to start, or
    /// exits unsuccessfully.
    fn execute(&self, invocation: &Invocation) -> Result<CapturedOutput>;
}

/// Executor backed by real child processes
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl CommandExecutor for SystemExecutor {
    fn execute(&self, invocation: &Invocation) -> Result<CapturedOutput> {
        let binary =
            which::which(invocation.program()).map_err(|source| CoreError::CommandNotFound {
                program: invocation.program().to_string(),
                source,
            })?;

        tracing::debug!(command = %invocation, binary = %binary.display(), "running");

        let output = Command::new(&binary)
            .args(invocation.arguments())
            .stdin(Stdio::null())
            .output()
            .map_err(|e| CoreError::ExternalTool {
                command: invocation.to_string(),
                status: "failed to start".to_string(),
                stderr: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(CoreError::ExternalTool {
                command: invocation.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(CapturedOutput {
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
