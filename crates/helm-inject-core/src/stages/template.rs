//! Template stage - render each manifest with `helm template`

use std::path::Path;

use super::StagedWrites;
use crate::discovery::FileSet;
use crate::error::Result;
use crate::exec::{CommandExecutor, Invocation, StderrPolicy};
use crate::flags::FlagChain;

/// Default values file shipped inside a chart
const DEFAULT_VALUES_FILE: &str = "values.yaml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateOptions {
    /// Renderer binary
    pub helm: String,
    pub release: String,
    /// `--set` overrides
    pub values: Vec<String>,
    /// `-f` values files or URLs
    pub values_files: Vec<String>,
    pub namespace: Option<String>,
}

impl TemplateOptions {
    /// Flags shared by every render call
    ///
    /// The chart's own `values.yaml` is only passed when it exists.
    pub fn flags(&self, chart_root: &Path) -> FlagChain {
        let default_values = chart_root.join(DEFAULT_VALUES_FILE);
        let defaults: Vec<String> = if default_values.exists() {
            vec![default_values.display().to_string()]
        } else {
            Vec::new()
        };

        FlagChain::new()
            .flag("set", &self.values)
            .flag("f", defaults)
            .flag("f", &self.values_files)
            .optional("namespace", self.namespace.as_deref())
    }

    pub fn invocation(&self, chart_root: &Path, file: &Path, flags: &FlagChain) -> Invocation {
        Invocation::new(&self.helm)
            .args(["template", "--debug=false"])
            .arg(chart_root.display().to_string())
            .args(["--name", self.release.as_str(), "-x"])
            .arg(file.display().to_string())
            .args(flags.args().iter().cloned())
    }
}

/// Render every file in `files`, replacing them only once all renders succeed
///
/// A failed render leaves all originals untouched and removes any
/// `<file>.tmp` output already written.
pub fn run(
    options: TemplateOptions,
    chart_root: &Path,
    files: &FileSet,
    executor: &dyn CommandExecutor,
) -> Result<()> {
    let flags = options.flags(chart_root);
    let mut writes = StagedWrites::new();

    for file in files {
        let invocation = options.invocation(chart_root, file, &flags);
        let rendered = executor
            .execute(&invocation)?
            .into_stdout(&invocation, StderrPolicy::Fail)?;
        writes.stage(file, &rendered)?;
    }

    writes.commit()?;
    tracing::info!(files = files.len(), "rendered templates");
    Ok(())
}
