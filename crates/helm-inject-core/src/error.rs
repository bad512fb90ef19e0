//! Core error types

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    #[error("Malformed inject flag '{flag}': inject flags must be in the form key1=value1[,key2=value2,...]")]
    MalformedInjectFlag { flag: String },

    #[error("Failed to stage chart '{chart}': {message}")]
    Resolution { chart: String, message: String },

    #[error("Expected exactly one entry in {} after unpacking the chart, found {count}", .dir.display())]
    UnexpectedLayout { dir: PathBuf, count: usize },

    #[error("Failed to walk {}: {source}", .root.display())]
    Discovery {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Command not found: {program}")]
    CommandNotFound {
        program: String,
        #[source]
        source: which::Error,
    },

    #[error("`{command}` failed ({status}): {stderr}")]
    ExternalTool {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("`{command}` wrote to stderr: {stderr}")]
    StderrOutput { command: String, stderr: String },

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Coarse classification of a [`CoreError`], used to pick an exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid flags, detected before any external process runs
    Configuration,
    /// The chart reference could not be staged
    Resolution,
    /// Walking the workspace failed
    Discovery,
    /// A spawned tool failed or wrote to stderr
    ExternalTool,
    /// Writing or renaming intermediate files failed
    Io,
}

impl CoreError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn resolution(chart: impl Into<String>, message: impl ToString) -> Self {
        Self::Resolution {
            chart: chart.into(),
            message: message.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config { .. } | Self::MalformedInjectFlag { .. } => ErrorKind::Configuration,
            Self::Resolution { .. } | Self::UnexpectedLayout { .. } => ErrorKind::Resolution,
            Self::Discovery { .. } => ErrorKind::Discovery,
            Self::CommandNotFound { .. } | Self::ExternalTool { .. } | Self::StderrOutput { .. } => {
                ErrorKind::ExternalTool
            }
            Self::Io { .. } => ErrorKind::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
