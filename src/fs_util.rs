use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum CopyError {
    #[error("failed to read {path}: {message}")]
    Walk { path: PathBuf, message: String },

    #[error("failed to copy {path}: {source}")]
    Copy {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CopyError {
    pub fn path(&self) -> &Path {
        match self {
            CopyError::Walk { path, .. } | CopyError::Copy { path, .. } => path,
        }
    }
}

/// Recursively copy the contents of `src` into `dst`, overwriting existing files.
///
/// Stops at the first failure. Whatever was copied before it stays in place.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<usize, CopyError> {
    let mut copied = 0;

    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| CopyError::Walk {
            path: e.path().map(Path::to_path_buf).unwrap_or_else(|| src.to_path_buf()),
            message: e.to_string(),
        })?;

        let relative = entry.path().strip_prefix(src).map_err(|e| CopyError::Walk {
            path: entry.path().to_path_buf(),
            message: e.to_string(),
        })?;
        let target = dst.join(relative);

        let result = if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
        } else {
            copy_file(entry.path(), &target)
        };

        result.map_err(|source| CopyError::Copy {
            path: entry.path().to_path_buf(),
            source,
        })?;

        if entry.file_type().is_file() {
            copied += 1;
        }
    }

    debug!(from = %src.display(), to = %dst.display(), files = copied, "copied tree");
    Ok(copied)
}

fn copy_file(from: &Path, to: &Path) -> io::Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(from, to).map(|_| ())
}

/// Delete a directory tree. Returns `false` if it was already gone.
pub fn remove_dir_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Files below `root` as sorted, `/`-separated relative paths
pub fn relative_files(root: &Path) -> io::Result<Vec<String>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let name = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        files.push(name);
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_copy_tree_overwrites_and_nests() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");

        write(&src.join("H5P.EscapeRoom-0.5/library.json"), "{\"new\":true}");
        write(&src.join("H5P.EscapeRoom-0.5/language/de.json"), "{}");
        write(&dst.join("H5P.EscapeRoom-0.5/library.json"), "{\"old\":true}");
        write(&dst.join("content/content.json"), "{}");

        let copied = copy_tree(&src, &dst).unwrap();
        assert_eq!(copied, 2);
        assert_eq!(
            fs::read_to_string(dst.join("H5P.EscapeRoom-0.5/library.json")).unwrap(),
            "{\"new\":true}"
        );
        assert!(dst.join("H5P.EscapeRoom-0.5/language/de.json").is_file());
        assert!(dst.join("content/content.json").is_file());
    }

    #[test]
    fn test_copy_tree_missing_source_reports_path() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");

        let err = copy_tree(&missing, tmp.path()).unwrap_err();
        assert_eq!(err.path(), missing.as_path());
    }

    #[test]
    fn test_remove_dir_if_exists_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("work");
        write(&dir.join("a/b.txt"), "x");

        assert!(remove_dir_if_exists(&dir).unwrap());
        assert!(!dir.exists());
        assert!(!remove_dir_if_exists(&dir).unwrap());
    }

    #[test]
    fn test_relative_files_sorted_with_forward_slashes() {
        let tmp = TempDir::new().unwrap();
        write(&tmp.path().join("h5p.json"), "{}");
        write(&tmp.path().join("content/content.json"), "{}");
        write(&tmp.path().join("content/images/a.png"), "png");
        fs::create_dir_all(tmp.path().join("empty")).unwrap();

        let files = relative_files(tmp.path()).unwrap();
        assert_eq!(
            files,
            vec!["content/content.json", "content/images/a.png", "h5p.json"]
        );
    }
}
