//! Upgrade stage - run `helm upgrade` against the staged chart

use std::path::Path;

use crate::error::Result;
use crate::exec::{CommandExecutor, Invocation, StderrPolicy};
use crate::flags::FlagChain;

pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeOptions {
    pub helm: String,
    pub release: String,
    pub values: Vec<String>,
    pub values_files: Vec<String>,
    /// Seconds to wait for any individual Kubernetes operation
    pub timeout: u64,
    pub namespace: Option<String>,
    pub kube_context: Option<String>,
    pub install: bool,
    pub dry_run: bool,
    pub debug: bool,
    pub tls: bool,
    pub tls_cert: Option<String>,
    pub tls_key: Option<String>,
    pub reset_values: bool,
    pub force: bool,
}

impl UpgradeOptions {
    pub fn new(helm: impl Into<String>, release: impl Into<String>) -> Self {
        Self {
            helm: helm.into(),
            release: release.into(),
            values: Vec::new(),
            values_files: Vec::new(),
            timeout: DEFAULT_TIMEOUT_SECS,
            namespace: None,
            kube_context: None,
            install: false,
            dry_run: false,
            debug: false,
            tls: false,
            tls_cert: None,
            tls_key: None,
            reset_values: false,
            force: false,
        }
    }

    pub fn flags(&self) -> FlagChain {
        FlagChain::new()
            .flag("set", &self.values)
            .flag("f", &self.values_files)
            .flag("timeout", [self.timeout.to_string()])
            .optional("namespace", self.namespace.as_deref())
            .optional("kube-context", self.kube_context.as_deref())
            .switch("i", self.install)
            .switch("dry-run", self.dry_run)
            .switch("debug", self.debug)
            .switch("tls", self.tls)
            .optional("tls-cert", self.tls_cert.as_deref())
            .optional("tls-key", self.tls_key.as_deref())
            .switch("reset-values", self.reset_values)
            .switch("force", self.force)
    }

    pub fn invocation(&self, chart_root: &Path) -> Invocation {
        Invocation::new(&self.helm)
            .args(["upgrade", self.release.as_str()])
            .arg(chart_root.display().to_string())
            .args(self.flags().into_args())
    }
}

/// Upgrade the release from `chart_root`, returning helm's output
pub fn run(
    options: UpgradeOptions,
    chart_root: &Path,
    executor: &dyn CommandExecutor,
) -> Result<String> {
    let invocation = options.invocation(chart_root);
    let stdout = executor
        .execute(&invocation)?
        .into_stdout(&invocation, StderrPolicy::Fail)?;

    tracing::info!(release = %options.release, "upgraded release");
    Ok(String::from_utf8_lossy(&stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::exec::CapturedOutput;
    use crate::testing::RecordingExecutor;

    #[test]
    fn test_minimal_flags() {
        let options = UpgradeOptions::new("helm", "web");
        insta::assert_snapshot!(
            options.invocation(Path::new("/tmp/ws/web")).to_string(),
            @"helm upgrade web /tmp/ws/web --timeout 300"
        );
    }

    #[test]
    fn test_full_flag_order() {
        let options = UpgradeOptions {
            values: vec!["a=1".to_string(), "b=2".to_string()],
            values_files: vec!["prod.yaml".to_string()],
            timeout: 60,
            namespace: Some("apps".to_string()),
            kube_context: Some("staging".to_string()),
            install: true,
            dry_run: true,
            debug: true,
            tls: true,
            tls_cert: Some("cert.pem".to_string()),
            tls_key: Some("key.pem".to_string()),
            reset_values: true,
            force: true,
            ..UpgradeOptions::new("helm", "web")
        };
        insta::assert_snapshot!(
            options.flags().args().join(" "),
            @"--set a=1 --set b=2 -f prod.yaml --timeout 60 --namespace apps --kube-context staging -i --dry-run --debug --tls --tls-cert cert.pem --tls-key key.pem --reset-values --force"
        );
    }

    #[test]
    fn test_returns_stdout() {
        let executor = RecordingExecutor::replying("Release \"web\" has been upgraded.\n");
        let output = run(
            UpgradeOptions::new("helm", "web"),
            Path::new("/tmp/ws/web"),
            &executor,
        )
        .unwrap();

        assert_eq!(output, "Release \"web\" has been upgraded.\n");
        assert_eq!(executor.calls().len(), 1);
    }

    #[test]
    fn test_stderr_fails_upgrade() {
        let executor = RecordingExecutor::new(|_| {
            Ok(CapturedOutput {
                stdout: b"partial".to_vec(),
                stderr: b"Error: UPGRADE FAILED".to_vec(),
            })
        });

        let err = run(
            UpgradeOptions::new("helm", "web"),
            Path::new("/tmp/ws/web"),
            &executor,
        )
        .unwrap_err();
        match err {
            CoreError::StderrOutput { stderr, .. } => assert_eq!(stderr, "Error: UPGRADE FAILED"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
