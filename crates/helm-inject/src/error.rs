//! CLI error types with exit code handling

use helm_inject_core::{CoreError, ErrorKind};
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// Invalid flag combination
    #[error("Configuration error: {message}")]
    #[diagnostic(code(helm_inject::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// The chart could not be staged
    #[error("Chart error: {message}")]
    #[diagnostic(code(helm_inject::cli::chart))]
    Chart {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Walking the staged chart failed
    #[error("Discovery error: {message}")]
    #[diagnostic(code(helm_inject::cli::discovery))]
    Discovery { message: String },

    /// helm or the injector failed
    #[error("Command failed: {message}")]
    #[diagnostic(code(helm_inject::cli::command))]
    Command {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// IO error (permissions, disk full, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(helm_inject::cli::io))]
    Io { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Chart { .. } => exit_codes::RESOLUTION_ERROR,
            CliError::Discovery { .. } => exit_codes::DISCOVERY_ERROR,
            CliError::Command { .. } => exit_codes::EXTERNAL_TOOL_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::Configuration => {
                let help = matches!(err, CoreError::MalformedInjectFlag { .. }).then(|| {
                    "pass injector flags without the leading dashes, e.g. --inject-flags tls=optional,skip-inbound-ports=25".to_string()
                });
                CliError::Config { message, help }
            }
            ErrorKind::Resolution => CliError::Chart {
                message,
                help: Some(
                    "CHART must be a chart directory, a .tgz archive, or a name `helm fetch` can resolve"
                        .to_string(),
                ),
            },
            ErrorKind::Discovery => CliError::Discovery { message },
            ErrorKind::ExternalTool => {
                let help = match &err {
                    CoreError::CommandNotFound { program, .. } => {
                        Some(format!("make sure '{}' is installed and on your PATH", program))
                    }
                    CoreError::StderrOutput { .. } => Some(
                        "any stderr output aborts the run; use --allow-injector-stderr if your injector reports progress on stderr"
                            .to_string(),
                    ),
                    _ => None,
                };
                CliError::Command { message, help }
            }
            ErrorKind::Io => CliError::Io { message },
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
