//! Inject stage - pass each rendered manifest through the sidecar injector

use super::StagedWrites;
use crate::discovery::FileSet;
use crate::error::{CoreError, Result};
use crate::exec::{CommandExecutor, Invocation, StderrPolicy};
use crate::flags::FlagChain;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectOptions {
    /// Injector program, possibly with leading arguments (`istioctl`)
    pub injector: Invocation,
    /// Injector sub-command (`inject`, `kube-inject`)
    pub command: String,
    /// Raw `key=value` flags, passed as `--key value`
    pub flags: Vec<String>,
    pub stderr_policy: StderrPolicy,
}

/// Turn `key=value` pairs into a flag chain
///
/// Every entry must split into exactly two parts on `=`.
pub fn parse_inject_flags(flags: &[String]) -> Result<FlagChain> {
    flags.iter().try_fold(FlagChain::new(), |chain, flag| {
        match flag.split('=').collect::<Vec<_>>().as_slice() {
            [key, value] => Ok(chain.flag(key, [value])),
            _ => Err(CoreError::MalformedInjectFlag { flag: flag.clone() }),
        }
    })
}

impl InjectOptions {
    pub fn invocation(&self, flags: &FlagChain, file: &std::path::Path) -> Invocation {
        self.injector
            .clone()
            .arg(&self.command)
            .args(flags.args().iter().cloned())
            .arg(file.display().to_string())
    }
}

/// Inject every file in `files`, replacing them only once all injections succeed
///
/// Flags are validated before the injector runs for any file.
pub fn run(options: InjectOptions, files: &FileSet, executor: &dyn CommandExecutor) -> Result<()> {
    let flags = parse_inject_flags(&options.flags)?;
    let mut writes = StagedWrites::new();

    for file in files {
        let invocation = options.invocation(&flags, file);
        let injected = executor
            .execute(&invocation)?
            .into_stdout(&invocation, options.stderr_policy)?;
        writes.stage(file, &injected)?;
    }

    writes.commit()?;
    tracing::info!(files = files.len(), injector = %options.injector, "injected manifests");
    Ok(())
}
