//! Locating the manifests a pipeline run operates on

use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};

/// Which files under a workspace to act on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFilter {
    /// Directory name that must appear in the path (matched as `"<sub_path>/"`)
    pub sub_path: String,
    /// Required file name suffix
    pub extension: String,
}

impl FileFilter {
    pub fn new(sub_path: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            sub_path: sub_path.into(),
            extension: extension.into(),
        }
    }

    /// YAML files under a chart's `templates/` directory
    pub fn templates() -> Self {
        Self::new("templates", "yaml")
    }

    /// Check a path relative to the workspace root
    fn matches(&self, relative: &Path) -> bool {
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        relative.contains(&format!("{}/", self.sub_path)) && relative.ends_with(&self.extension)
    }
}

impl Default for FileFilter {
    fn default() -> Self {
        Self::templates()
    }
}

/// Ordered list of files rooted in a workspace
///
/// Stages rewrite these files in place; entries are never renamed or removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSet {
    files: Vec<PathBuf>,
}

impl FileSet {
    pub fn iter(&self) -> std::slice::Iter<'_, PathBuf> {
        self.files.iter()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn as_slice(&self) -> &[PathBuf] {
        &self.files
    }
}

impl From<Vec<PathBuf>> for FileSet {
    fn from(files: Vec<PathBuf>) -> Self {
        Self { files }
    }
}

impl<'a> IntoIterator for &'a FileSet {
    type Item = &'a PathBuf;
    type IntoIter = std::slice::Iter<'a, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}

/// Walk `root` and collect the files accepted by `filter`
///
/// Entries are visited in lexicographic order per directory. No match
/// yields an empty set; traversal errors are returned.
pub fn discover(root: &Path, filter: &FileFilter) -> Result<FileSet> {
    let mut files = Vec::new();

    for entry in walkdir::WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|source| CoreError::Discovery {
            root: root.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if filter.matches(relative) {
            files.push(path.to_path_buf());
        }
    }

    tracing::debug!(root = %root.display(), count = files.len(), "discovered files");
    Ok(FileSet { files })
}
