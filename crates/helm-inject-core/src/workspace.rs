//! Staging a chart into an isolated workspace
//!
//! Every pipeline run works on a private copy of the chart so that the
//! in-place rewrites of the template and inject stages never touch the
//! user's files. The copy lives in a fresh temporary directory which is
//! removed when the [`Workspace`] is dropped, unless [`Workspace::keep`]
//! is called.
//!
//! A chart reference is resolved in this order:
//! 1. an existing directory is copied recursively
//! 2. an existing `.tgz` / `.tar.gz` archive is unpacked
//! 3. anything else is fetched with `helm fetch --untar`
//!
//! Unpacked and fetched charts must produce exactly one top-level entry,
//! which becomes the workspace root.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use tempfile::TempDir;

use crate::error::{CoreError, Result};
use crate::exec::{CommandExecutor, Invocation, StderrPolicy};

const STAGING_PREFIX: &str = "helm-inject-";

/// Where a chart comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChartReference {
    /// A chart directory on disk
    Directory(PathBuf),
    /// A packaged chart archive on disk
    Archive(PathBuf),
    /// A chart name resolved by `helm fetch` (e.g. `stable/nginx`)
    Remote(String),
}

impl ChartReference {
    /// Classify a user-supplied chart reference
    pub fn parse(reference: &str) -> Result<Self> {
        let path = Path::new(reference);
        match fs::metadata(path) {
            Ok(meta) if meta.is_dir() => Ok(Self::Directory(path.to_path_buf())),
            Ok(_) if is_archive(path) => Ok(Self::Archive(path.to_path_buf())),
            Ok(_) => Err(CoreError::resolution(
                reference,
                "path is neither a chart directory nor a .tgz archive",
            )),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::Remote(reference.to_string()))
            }
            Err(e) => Err(CoreError::resolution(reference, e)),
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            Self::Directory(p) | Self::Archive(p) => p.display().to_string(),
            Self::Remote(name) => name.clone(),
        }
    }
}

fn is_archive(path: &Path) -> bool {
    let name = path.to_string_lossy();
    name.ends_with(".tgz") || name.ends_with(".tar.gz")
}

/// Builds the `helm fetch` invocation for remote charts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartFetcher {
    pub helm: String,
    pub version: Option<String>,
}

impl Default for ChartFetcher {
    fn default() -> Self {
        Self {
            helm: "helm".to_string(),
            version: None,
        }
    }
}

impl ChartFetcher {
    pub fn invocation(&self, chart: &str, dest: &Path) -> Invocation {
        let mut invocation = Invocation::new(&self.helm)
            .args(["fetch", chart, "--untar", "-d"])
            .arg(dest.display().to_string());
        if let Some(version) = &self.version {
            invocation = invocation.args(["--version", version.as_str()]);
        }
        invocation
    }
}

/// An exclusively-owned staged copy of a chart
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    staging: TempDir,
}

impl Workspace {
    /// Stage `chart` into a fresh temporary directory
    pub fn stage(
        chart: &ChartReference,
        fetcher: &ChartFetcher,
        executor: &dyn CommandExecutor,
    ) -> Result<Self> {
        let reference = chart.as_display();
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir()
            .map_err(|e| CoreError::resolution(&reference, format!("cannot create temp dir: {}", e)))?;

        let root = match chart {
            ChartReference::Directory(src) => {
                copy_dir(src, staging.path()).map_err(|e| CoreError::resolution(&reference, e))?;
                staging.path().to_path_buf()
            }
            ChartReference::Archive(src) => {
                extract_archive(src, staging.path())
                    .map_err(|e| CoreError::resolution(&reference, e))?;
                single_entry(staging.path())?
            }
            ChartReference::Remote(name) => {
                let invocation = fetcher.invocation(name, staging.path());
                executor
                    .execute(&invocation)
                    .and_then(|output| output.into_stdout(&invocation, StderrPolicy::Fail))
                    .map_err(|e| CoreError::resolution(name, e))?;
                single_entry(staging.path())?
            }
        };

        tracing::info!(chart = %reference, workspace = %root.display(), "staged chart");
        Ok(Self { root, staging })
    }

    /// Chart root inside the workspace
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Temporary directory that holds the chart
    pub fn staging_dir(&self) -> &Path {
        self.staging.path()
    }

    /// Persist the workspace instead of removing it, returning the chart root
    pub fn keep(self) -> PathBuf {
        let staging = self.staging.keep();
        tracing::info!(path = %staging.display(), "keeping workspace");
        self.root
    }
}

/// Recursively copy the contents of `src` into the existing `dest`
fn copy_dir(src: &Path, dest: &Path) -> std::io::Result<()> {
    for entry in walkdir::WalkDir::new(src).follow_links(true) {
        let entry = entry?;
        let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn extract_archive(archive: &Path, dest: &Path) -> std::io::Result<()> {
    let file = File::open(archive)?;
    Archive::new(GzDecoder::new(file)).unpack(dest)
}

/// The only entry of `dir`, or an error naming how many were found
fn single_entry(dir: &Path) -> Result<PathBuf> {
    let entries = fs::read_dir(dir)
        .and_then(|entries| entries.map(|e| e.map(|e| e.path())).collect::<std::io::Result<Vec<_>>>())
        .map_err(|e| CoreError::io(dir, e))?;

    match entries.as_slice() {
        [only] => Ok(only.clone()),
        _ => Err(CoreError::UnexpectedLayout {
            dir: dir.to_path_buf(),
            count: entries.len(),
        }),
    }
}
