//! Working-directory store for extracted H5P archives.
//!
//! Every archive is extracted into its own `<unixTimestamp>-<uuid>` directory
//! below the uploads root. The timestamp prefix lets [`ArchiveStore::purge_stale`]
//! sweep directories left behind by crashed or abandoned runs.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zip::write::SimpleFileOptions;

use crate::fs_util::{self, CopyError};

pub const MANIFEST_FILE: &str = "h5p.json";
pub const CONTENT_DIR: &str = "content";
pub const CONTENT_FILE: &str = "content.json";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Upload directory {0} is not writable.")]
    UploadsNotWritable(PathBuf),

    #[error("Could not create upload directory {0}.")]
    CreateWorkingDir(PathBuf),

    #[error("Error extracting H5P file ZIP archive.")]
    Extract(String),

    #[error("h5p.json file does not exist in the archive.")]
    MissingManifest,

    #[error("Error decoding h5p.json file.")]
    InvalidManifestJson(String),

    #[error("Could not write {path}.")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not copy content type files: {0}")]
    AssetCopy(#[from] CopyError),

    #[error("Error creating H5P file ZIP archive.")]
    Packaging(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Handle to one extracted archive. Release it with [`ArchiveStore::release`].
#[derive(Debug)]
pub struct WorkingDir {
    id: String,
    path: PathBuf,
}

impl WorkingDir {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn manifest_path(&self) -> PathBuf {
        self.path.join(MANIFEST_FILE)
    }

    fn content_path(&self) -> PathBuf {
        self.path.join(CONTENT_DIR).join(CONTENT_FILE)
    }
}

impl fmt::Display for WorkingDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

pub struct ArchiveStore {
    uploads_root: PathBuf,
    stale_after_secs: u64,
}

impl ArchiveStore {
    pub fn new(uploads_root: impl Into<PathBuf>, stale_after_secs: u64) -> Self {
        Self {
            uploads_root: uploads_root.into(),
            stale_after_secs,
        }
    }

    pub fn uploads_root(&self) -> &Path {
        &self.uploads_root
    }

    /// Extract a ZIP archive into a fresh working directory.
    ///
    /// On failure nothing is left behind. On success stale working directories
    /// of earlier runs are swept.
    pub fn extract(&self, zip_bytes: &[u8]) -> Result<WorkingDir, ArchiveError> {
        let id = format!("{}-{}", unix_now(), Uuid::new_v4());
        let path = self.uploads_root.join(&id);

        self.ensure_writable_root(&path)?;
        fs::create_dir(&path).map_err(|_| ArchiveError::CreateWorkingDir(path.clone()))?;

        let work = WorkingDir { id, path };
        if let Err(e) = unpack(zip_bytes, &work.path) {
            self.release(work);
            return Err(e);
        }

        info!(working_dir = %work, "extracted archive");

        match self.purge_stale_except(self.stale_after_secs, Some(&work.path)) {
            Ok(0) => {}
            Ok(removed) => debug!(removed, "purged stale working directories"),
            Err(e) => warn!(error = %e, "failed to purge stale working directories"),
        }

        Ok(work)
    }

    fn ensure_writable_root(&self, working_path: &Path) -> Result<(), ArchiveError> {
        if !self.uploads_root.is_dir() && fs::create_dir_all(&self.uploads_root).is_err() {
            return Err(ArchiveError::UploadsNotWritable(working_path.to_path_buf()));
        }

        let readonly = fs::metadata(&self.uploads_root)
            .map(|meta| meta.permissions().readonly())
            .unwrap_or(true);
        if readonly {
            return Err(ArchiveError::UploadsNotWritable(working_path.to_path_buf()));
        }
        Ok(())
    }

    pub fn read_manifest(&self, work: &WorkingDir) -> Result<Value, ArchiveError> {
        let contents = match fs::read_to_string(work.manifest_path()) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(ArchiveError::MissingManifest),
            Err(e) => return Err(ArchiveError::Io(e)),
        };

        serde_json::from_str(&contents).map_err(|e| ArchiveError::InvalidManifestJson(e.to_string()))
    }

    pub fn write_manifest(&self, work: &WorkingDir, manifest: &Value) -> Result<(), ArchiveError> {
        write_json(&work.manifest_path(), manifest)
    }

    /// Raw content document, or `None` when the archive has no `content/content.json`
    pub fn read_content_document(&self, work: &WorkingDir) -> Result<Option<String>, ArchiveError> {
        match fs::read_to_string(work.content_path()) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ArchiveError::Io(e)),
        }
    }

    pub fn write_content_document(&self, work: &WorkingDir, document: &Value) -> Result<(), ArchiveError> {
        let path = work.content_path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|source| ArchiveError::Write {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        write_json(&path, document)
    }

    /// Drop the legacy library folders and copy the bundled target libraries in
    pub fn replace_asset_tree(
        &self,
        work: &WorkingDir,
        legacy_dirs: &[String],
        asset_source_root: &Path,
    ) -> Result<usize, ArchiveError> {
        for dir in legacy_dirs {
            let legacy = work.path.join(dir);
            if fs_util::remove_dir_if_exists(&legacy)? {
                debug!(dir = %dir, "removed legacy library folder");
            }
        }

        let copied = fs_util::copy_tree(asset_source_root, &work.path).map_err(|e| {
            warn!(path = %e.path().display(), error = %e, "failed to copy content type files");
            e
        })?;
        info!(files = copied, "copied target content type files");
        Ok(copied)
    }

    /// Zip the working directory into `<uploads root>/<output_name>`.
    ///
    /// A partially written archive is removed again on failure.
    pub fn pack(&self, work: &WorkingDir, output_name: &str) -> Result<PathBuf, ArchiveError> {
        let destination = self.uploads_root.join(output_name);
        let file = File::create(&destination).map_err(|e| ArchiveError::Packaging(e.to_string()))?;

        match write_archive(file, &work.path) {
            Ok(files) => {
                info!(archive = %destination.display(), files, "packed archive");
                Ok(destination)
            }
            Err(e) => {
                if let Err(remove_error) = fs::remove_file(&destination) {
                    warn!(archive = %destination.display(), error = %remove_error, "failed to remove partial archive");
                }
                Err(e)
            }
        }
    }

    /// Delete a working directory. Already-deleted directories are fine.
    pub fn release(&self, work: WorkingDir) {
        match fs_util::remove_dir_if_exists(&work.path) {
            Ok(_) => debug!(working_dir = %work, "released working directory"),
            Err(e) => warn!(working_dir = %work, error = %e, "failed to remove working directory"),
        }
    }

    /// Remove working directories whose timestamp prefix is at least `max_age_secs` old.
    ///
    /// Names without a parsable timestamp are never purged.
    pub fn purge_stale(&self, max_age_secs: u64) -> io::Result<usize> {
        self.purge_stale_except(max_age_secs, None)
    }

    fn purge_stale_except(&self, max_age_secs: u64, keep: Option<&Path>) -> io::Result<usize> {
        let now = unix_now();
        let mut removed = 0;

        let entries = match fs::read_dir(&self.uploads_root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() || keep == Some(entry.path().as_path()) {
                continue;
            }

            let name = entry.file_name();
            let Some(created) = name
                .to_str()
                .and_then(|name| name.split('-').next())
                .and_then(|stamp| stamp.parse::<u64>().ok())
            else {
                continue;
            };

            if now.saturating_sub(created) >= max_age_secs {
                if fs_util::remove_dir_if_exists(&entry.path())? {
                    debug!(dir = %entry.path().display(), "purged stale working directory");
                    removed += 1;
                }
            }
        }

        Ok(removed)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

fn unpack(zip_bytes: &[u8], dest: &Path) -> Result<(), ArchiveError> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(zip_bytes)).map_err(|e| ArchiveError::Extract(e.to_string()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| ArchiveError::Extract(e.to_string()))?;

        let relative = entry
            .enclosed_name()
            .ok_or_else(|| ArchiveError::Extract(format!("unsafe entry name {}", entry.name())))?;
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out).map_err(|e| ArchiveError::Extract(e.to_string()))?;
    }

    Ok(())
}

fn write_archive(file: File, root: &Path) -> Result<usize, ArchiveError> {
    let mut zip = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let entries = fs_util::relative_files(root)?;
    for relative_path in &entries {
        let contents = fs::read(root.join(relative_path))?;
        zip.start_file(relative_path.as_str(), options)
            .map_err(|e| ArchiveError::Packaging(e.to_string()))?;
        zip.write_all(&contents)?;
    }

    zip.finish().map_err(|e| ArchiveError::Packaging(e.to_string()))?;
    Ok(entries.len())
}

fn write_json(path: &Path, value: &Value) -> Result<(), ArchiveError> {
    let pretty = serde_json::to_string_pretty(value).map_err(|e| ArchiveError::Write {
        path: path.to_path_buf(),
        source: io::Error::other(e),
    })?;

    fs::write(path, pretty).map_err(|source| ArchiveError::Write {
        path: path.to_path_buf(),
        source,
    })
}
