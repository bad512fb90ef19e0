//! The render → inject → upgrade pipeline
//!
//! [`PipelineConfig`] is built once at the CLI boundary and never mutated.
//! [`Pipeline::run`] splits it into per-stage options and executes:
//!
//! 1. stage the chart into a fresh [`Workspace`]
//! 2. discover `templates/**/*.yaml`
//! 3. render every template (two-phase)
//! 4. inject every rendered manifest (two-phase)
//! 5. `helm upgrade` the workspace
//!
//! The first error aborts the run. The workspace is removed afterwards,
//! whether the run succeeded or not, unless `keep_workspace` is set.

use std::path::PathBuf;

use crate::discovery::{FileFilter, discover};
use crate::error::{CoreError, Result};
use crate::exec::{CommandExecutor, Invocation, StderrPolicy, SystemExecutor};
use crate::stages::{self, InjectOptions, TemplateOptions, UpgradeOptions, inject, upgrade};
use crate::workspace::{ChartFetcher, ChartReference, Workspace};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub release: String,
    /// Local chart directory, chart archive, or remote chart name
    pub chart: String,
    /// Version passed to `helm fetch` for remote charts
    pub chart_version: Option<String>,
    /// Binary used for fetch, template and upgrade
    pub helm: String,

    /// Injector command line (program plus optional leading arguments)
    pub injector: String,
    pub inject_command: String,
    /// `key=value` pairs forwarded to the injector as `--key value`
    pub inject_flags: Vec<String>,
    pub allow_injector_stderr: bool,

    pub values: Vec<String>,
    pub values_files: Vec<String>,
    pub namespace: Option<String>,
    pub kube_context: Option<String>,
    pub timeout: u64,
    pub install: bool,
    pub dry_run: bool,
    pub debug: bool,
    pub tls: bool,
    pub tls_cert: Option<String>,
    pub tls_key: Option<String>,
    pub reset_values: bool,
    pub force: bool,

    pub keep_workspace: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            release: String::new(),
            chart: String::new(),
            chart_version: None,
            helm: "helm".to_string(),
            injector: "linkerd".to_string(),
            inject_command: "inject".to_string(),
            inject_flags: Vec::new(),
            allow_injector_stderr: false,
            values: Vec::new(),
            values_files: Vec::new(),
            namespace: None,
            kube_context: None,
            timeout: upgrade::DEFAULT_TIMEOUT_SECS,
            install: false,
            dry_run: false,
            debug: false,
            tls: false,
            tls_cert: None,
            tls_key: None,
            reset_values: false,
            force: false,
            keep_workspace: false,
        }
    }
}

impl PipelineConfig {
    pub fn new(release: impl Into<String>, chart: impl Into<String>) -> Self {
        Self {
            release: release.into(),
            chart: chart.into(),
            ..Self::default()
        }
    }

    /// Check everything that can be checked before running a process
    pub fn validate(&self) -> Result<()> {
        if self.release.trim().is_empty() {
            return Err(CoreError::config("release name must not be empty"));
        }
        if self.chart.trim().is_empty() {
            return Err(CoreError::config("chart reference must not be empty"));
        }
        let injector = Invocation::from_command_line(&self.injector)?;
        if injector.program() == "helm" || injector.program() == self.helm {
            return Err(CoreError::config(format!(
                "injector '{}' cannot be the helm binary itself",
                self.injector
            )));
        }
        inject::parse_inject_flags(&self.inject_flags)?;
        Ok(())
    }

    pub fn fetcher(&self) -> ChartFetcher {
        ChartFetcher {
            helm: self.helm.clone(),
            version: self.chart_version.clone(),
        }
    }

    pub fn template_options(&self) -> TemplateOptions {
        TemplateOptions {
            helm: self.helm.clone(),
            release: self.release.clone(),
            values: self.values.clone(),
            values_files: self.values_files.clone(),
            namespace: self.namespace.clone(),
        }
    }

    pub fn inject_options(&self) -> Result<InjectOptions> {
        Ok(InjectOptions {
            injector: Invocation::from_command_line(&self.injector)?,
            command: self.inject_command.clone(),
            flags: self.inject_flags.clone(),
            stderr_policy: if self.allow_injector_stderr {
                StderrPolicy::Warn
            } else {
                StderrPolicy::Fail
            },
        })
    }

    pub fn upgrade_options(&self) -> UpgradeOptions {
        UpgradeOptions {
            values: self.values.clone(),
            values_files: self.values_files.clone(),
            timeout: self.timeout,
            namespace: self.namespace.clone(),
            kube_context: self.kube_context.clone(),
            install: self.install,
            dry_run: self.dry_run,
            debug: self.debug,
            tls: self.tls,
            tls_cert: self.tls_cert.clone(),
            tls_key: self.tls_key.clone(),
            reset_values: self.reset_values,
            force: self.force,
            ..UpgradeOptions::new(&self.helm, &self.release)
        }
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineResult {
    /// Captured stdout of `helm upgrade`
    pub output: String,
    /// Chart root of the persisted workspace, when it was kept
    pub kept_workspace: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Validate `config` and build a pipeline from it
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run against real processes
    pub fn run(&self) -> Result<PipelineResult> {
        self.run_with(&SystemExecutor)
    }

    pub fn run_with(&self, executor: &dyn CommandExecutor) -> Result<PipelineResult> {
        let config = &self.config;
        let span = tracing::info_span!("pipeline", release = %config.release, chart = %config.chart);
        let _guard = span.enter();

        let inject_options = config.inject_options()?;
        let chart = ChartReference::parse(&config.chart)?;
        let workspace = Workspace::stage(&chart, &config.fetcher(), executor)?;

        let outcome = self.run_stages(&workspace, inject_options, executor);
        if !config.keep_workspace {
            return outcome.map(|output| PipelineResult {
                output,
                kept_workspace: None,
            });
        }

        let kept = workspace.keep();
        if outcome.is_err() {
            tracing::warn!(path = %kept.display(), "workspace kept after failure");
        }
        outcome.map(|output| PipelineResult {
            output,
            kept_workspace: Some(kept),
        })
    }

    /// Discover, render, inject and upgrade inside an already staged workspace
    fn run_stages(
        &self,
        workspace: &Workspace,
        inject_options: InjectOptions,
        executor: &dyn CommandExecutor,
    ) -> Result<String> {
        let config = &self.config;
        let files = discover(workspace.root(), &FileFilter::templates())?;
        if files.is_empty() {
            tracing::warn!(workspace = %workspace.root().display(), "no templates found");
        }

        stages::template::run(config.template_options(), workspace.root(), &files, executor)?;
        stages::inject::run(inject_options, &files, executor)?;
        stages::upgrade::run(config.upgrade_options(), workspace.root(), executor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::exec::CapturedOutput;
    use crate::testing::{RecordingExecutor, write_file};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn chart(dir: &Path) -> String {
        write_file(dir, "Chart.yaml", "name: web\nversion: 0.1.0");
        write_file(dir, "values.yaml", "replicas: 1");
        write_file(dir, "templates/deployment.yaml", "kind: Deployment");
        write_file(dir, "templates/NOTES.txt", "thanks");
        dir.display().to_string()
    }

    #[test]
    fn test_validate() {
        assert!(PipelineConfig::new("web", "./chart").validate().is_ok());

        let cases = [
            PipelineConfig::new("", "./chart"),
            PipelineConfig::new("web", " "),
            PipelineConfig {
                injector: "helm".to_string(),
                ..PipelineConfig::new("web", "./chart")
            },
            PipelineConfig {
                inject_flags: vec!["tls".to_string()],
                ..PipelineConfig::new("web", "./chart")
            },
            PipelineConfig {
                injector: "'unterminated".to_string(),
                ..PipelineConfig::new("web", "./chart")
            },
        ];
        for config in cases {
            assert_eq!(config.validate().unwrap_err().kind(), ErrorKind::Configuration);
        }
    }

    #[test]
    fn test_stage_options_from_config() {
        let config = PipelineConfig {
            namespace: Some("apps".to_string()),
            values: vec!["a=1".to_string()],
            install: true,
            timeout: 42,
            allow_injector_stderr: true,
            ..PipelineConfig::new("web", "./chart")
        };

        let template = config.template_options();
        assert_eq!(template.release, "web");
        assert_eq!(template.namespace.as_deref(), Some("apps"));

        let upgrade = config.upgrade_options();
        assert!(upgrade.install);
        assert_eq!(upgrade.timeout, 42);
        assert_eq!(upgrade.values, ["a=1"]);

        let inject = config.inject_options().unwrap();
        assert_eq!(inject.injector.program(), "linkerd");
        assert_eq!(inject.stderr_policy, StderrPolicy::Warn);
    }

    #[test]
    fn test_stages_run_in_order() {
        let src = TempDir::new().unwrap();
        let config = PipelineConfig::new("web", chart(src.path()));
        let executor = RecordingExecutor::new(|inv| {
            let out = match inv.arguments().first().map(String::as_str) {
                Some("template") => "kind: Deployment\nrendered: true",
                Some("upgrade") => "Release \"web\" has been upgraded.",
                _ => "kind: Deployment\nrendered: true\ninjected: true",
            };
            Ok(CapturedOutput::stdout(out))
        });

        let result = Pipeline::new(config).unwrap().run_with(&executor).unwrap();
        assert_eq!(result.output, "Release \"web\" has been upgraded.");
        assert!(result.kept_workspace.is_none());

        let calls = executor.calls();
        let order: Vec<(&str, &str)> = calls
            .iter()
            .map(|c| (c.program(), c.arguments()[0].as_str()))
            .collect();
        assert_eq!(
            order,
            [("helm", "template"), ("linkerd", "inject"), ("helm", "upgrade")]
        );

        // the user's chart is never modified
        assert_eq!(
            fs::read_to_string(src.path().join("templates/deployment.yaml")).unwrap(),
            "kind: Deployment"
        );
    }

    #[test]
    fn test_render_failure_stops_pipeline() {
        let src = TempDir::new().unwrap();
        let config = PipelineConfig::new("web", chart(src.path()));
        let executor = RecordingExecutor::new(|inv| {
            Err(CoreError::ExternalTool {
                command: inv.to_string(),
                status: "exit status: 1".to_string(),
                stderr: "Error: render error".to_string(),
            })
        });

        let err = Pipeline::new(config).unwrap().run_with(&executor).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalTool);
        assert_eq!(executor.calls().len(), 1);
    }

    #[test]
    fn test_keep_workspace() {
        let src = TempDir::new().unwrap();
        let config = PipelineConfig {
            keep_workspace: true,
            ..PipelineConfig::new("web", chart(src.path()))
        };
        let executor = RecordingExecutor::replying("kind: Deployment\ninjected: true");

        let result = Pipeline::new(config).unwrap().run_with(&executor).unwrap();
        let kept = result.kept_workspace.expect("workspace kept");
        assert_eq!(
            fs::read_to_string(kept.join("templates/deployment.yaml")).unwrap(),
            "kind: Deployment\ninjected: true"
        );
        fs::remove_dir_all(&kept).unwrap();
    }

    /// Responder whose `helm upgrade` reports a failure on stderr
    fn failing_upgrade(inv: &Invocation) -> Result<CapturedOutput> {
        match inv.arguments().first().map(String::as_str) {
            Some("upgrade") => Ok(CapturedOutput {
                stdout: Vec::new(),
                stderr: b"Error: UPGRADE FAILED: another operation is in progress".to_vec(),
            }),
            _ => Ok(CapturedOutput::stdout("kind: Deployment\ninjected: true")),
        }
    }

    fn upgraded_chart_root(executor: &RecordingExecutor) -> PathBuf {
        let calls = executor.calls();
        let upgrade = calls.last().expect("upgrade call");
        assert_eq!(upgrade.arguments()[0], "upgrade");
        PathBuf::from(&upgrade.arguments()[2])
    }

    #[test]
    fn test_keep_workspace_after_failed_upgrade() {
        let src = TempDir::new().unwrap();
        let config = PipelineConfig {
            keep_workspace: true,
            ..PipelineConfig::new("web", chart(src.path()))
        };
        let executor = RecordingExecutor::new(failing_upgrade);

        let err = Pipeline::new(config).unwrap().run_with(&executor).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalTool);

        let kept = upgraded_chart_root(&executor);
        assert_eq!(
            fs::read_to_string(kept.join("templates/deployment.yaml")).unwrap(),
            "kind: Deployment\ninjected: true"
        );
        fs::remove_dir_all(&kept).unwrap();
    }

    #[test]
    fn test_workspace_removed_after_failed_upgrade() {
        let src = TempDir::new().unwrap();
        let config = PipelineConfig::new("web", chart(src.path()));
        let executor = RecordingExecutor::new(failing_upgrade);

        Pipeline::new(config).unwrap().run_with(&executor).unwrap_err();
        assert!(!upgraded_chart_root(&executor).exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_end_to_end_with_real_processes() {
        use crate::testing::fake_tool;

        let tools = TempDir::new().unwrap();
        let helm = fake_tool(
            tools.path(),
            "helm",
            r#"case "$1" in
  template)
    while [ $# -gt 0 ]; do
      if [ "$1" = "-x" ]; then cat "$2"; exit 0; fi
      shift
    done
    exit 1;;
  upgrade) echo "upgraded $*";;
  *) echo "unexpected $1" >&2; exit 1;;
esac"#,
        );
        let injector = fake_tool(tools.path(), "mesh", r#"for last; do :; done; cat "$last""#);

        let src = TempDir::new().unwrap();
        let config = PipelineConfig {
            helm: helm.display().to_string(),
            injector: injector.display().to_string(),
            inject_flags: vec!["proxy-cpu=100m".to_string()],
            keep_workspace: true,
            ..PipelineConfig::new("web", chart(src.path()))
        };

        let result = Pipeline::new(config).unwrap().run().unwrap();
        let kept = result.kept_workspace.expect("workspace kept");

        assert!(result.output.contains("upgrade web"));
        assert!(result.output.contains(&kept.display().to_string()));
        assert_eq!(
            fs::read_to_string(kept.join("templates/deployment.yaml")).unwrap(),
            "kind: Deployment"
        );
        fs::remove_dir_all(&kept).unwrap();
    }
}
