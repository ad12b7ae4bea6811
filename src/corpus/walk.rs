//! Filesystem side of indexing: finds eligible files under a root and reads them.
use std::fs;
use std::path::{Path, PathBuf};

use globset::GlobSet;
use ignore::WalkBuilder;

use super::IndexingError;
use super::headings::Markup;

/// A file read from disk, before any outline work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the walk root, `/`-separated.
    pub path: String,
    pub content: String,
}

/// Recursively list every regular file under `root` whose extension is in the
/// allow-list, reading its full text.
///
/// Respects `.gitignore` rules but includes hidden files. Paths matching
/// `exclude` (relative to `root`) are skipped. The first unreadable entry aborts
/// the walk. Output is sorted by path.
pub fn list_files(root: &Path, exclude: &GlobSet) -> Result<Vec<SourceFile>, IndexingError> {
    if !root.is_dir() {
        return Err(IndexingError::NotADirectory(root.to_path_buf()));
    }

    let mut files = Vec::new();
    let walker = WalkBuilder::new(root).hidden(false).build();

    for entry in walker {
        let entry = entry.map_err(|source| IndexingError::Walk {
            root: root.to_path_buf(),
            source,
        })?;

        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }

        let path = entry.path();
        if Markup::from_path(path).is_none() {
            continue;
        }

        let rel_path = relative_path(root, path);
        if exclude.is_match(&rel_path) {
            tracing::debug!("excluded {rel_path}");
            continue;
        }

        let content = fs::read_to_string(path).map_err(|source| IndexingError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        files.push(SourceFile {
            path: rel_path,
            content,
        });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

/// Path relative to `root` with forward slashes, so keys are stable across platforms.
fn relative_path(root: &Path, path: &Path) -> String {
    let rel: PathBuf = path
        .strip_prefix(root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf());
    rel.to_string_lossy().replace('\\', "/")
}
