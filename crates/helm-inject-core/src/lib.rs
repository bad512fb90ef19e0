//! helm-inject core - chart staging and the render/inject/upgrade pipeline
//!
//! This crate provides everything the `helm-inject` CLI runs:
//! - `Workspace`: an isolated, scoped copy of a chart (local path, archive or fetched)
//! - `discover`: locating the template manifests inside a workspace
//! - `FlagChain`: building flag arguments for the wrapped commands
//! - `CommandExecutor`: running external tools and capturing their output
//! - `stages`: the template, inject and upgrade steps
//! - `Pipeline`: the fail-fast composition of all of the above

pub mod discovery;
pub mod error;
pub mod exec;
pub mod flags;
pub mod pipeline;
pub mod stages;
pub mod workspace;

#[cfg(test)]
pub(crate) mod testing;

pub use discovery::{FileFilter, FileSet, discover};
pub use error::{CoreError, ErrorKind, Result};
pub use exec::{CapturedOutput, CommandExecutor, Invocation, StderrPolicy, SystemExecutor};
pub use flags::FlagChain;
pub use pipeline::{Pipeline, PipelineConfig, PipelineResult};
pub use stages::{InjectOptions, TemplateOptions, UpgradeOptions};
pub use workspace::{ChartFetcher, ChartReference, Workspace};
