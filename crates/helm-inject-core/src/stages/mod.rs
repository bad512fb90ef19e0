//! Pipeline stages
//!
//! - `template`: render each manifest with `helm template`
//! - `inject`: pass each rendered manifest through the sidecar injector
//! - `upgrade`: run `helm upgrade` against the whole workspace
//!
//! The two stages that rewrite files share [`StagedWrites`]: output is
//! written next to each target as `<file>.tmp` and only renamed over the
//! originals once every file in the set has succeeded.

pub mod inject;
pub mod template;
pub mod upgrade;

pub use inject::InjectOptions;
pub use template::TemplateOptions;
pub use upgrade::UpgradeOptions;

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};

/// Pending `<file>.tmp` writes awaiting a commit
///
/// Dropping without [`commit`](Self::commit) removes every staged file.
#[derive(Debug, Default)]
pub(crate) struct StagedWrites {
    pending: Vec<(PathBuf, PathBuf)>,
}

pub(crate) fn tmp_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

impl StagedWrites {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Write `contents` to the sibling temp file of `target`
    pub(crate) fn stage(&mut self, target: &Path, contents: &[u8]) -> Result<()> {
        let tmp = tmp_path(target);
        fs::write(&tmp, contents).map_err(|e| CoreError::io(&tmp, e))?;
        self.pending.push((tmp, target.to_path_buf()));
        Ok(())
    }

    /// Rename every staged file onto its target, in staging order
    pub(crate) fn commit(mut self) -> Result<()> {
        let mut pending = std::mem::take(&mut self.pending).into_iter();
        while let Some((tmp, target)) = pending.next() {
            if let Err(e) = fs::rename(&tmp, &target) {
                self.pending.push((tmp, target.clone()));
                self.pending.extend(pending);
                return Err(CoreError::io(target, e));
            }
        }
        Ok(())
    }
}

impl Drop for StagedWrites {
    fn drop(&mut self) {
        for (tmp, _) in self.pending.drain(..) {
            if let Err(e) = fs::remove_file(&tmp) {
                tracing::warn!(path = %tmp.display(), error = %e, "failed to remove staged file");
            }
        }
    }
}
