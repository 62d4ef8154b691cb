//! One-shot migration of a Virtual Tour archive into an Escape Room archive.
//!
//! Input checks run before any working directory exists. Once extraction has
//! succeeded the working directory is released on every exit path.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, info_span, warn};

use crate::archive::{ArchiveError, ArchiveStore, WorkingDir};
use crate::config::MigratorConfig;
use crate::content::{ContentError, ContentMigrator};
use crate::l10n::Localizer;
use crate::manifest::{ManifestError, ManifestMigrator};
use crate::profile::MigrationProfile;
use crate::reporter::{count_target, MigrationReport, TransformationReporter};
use crate::transformation_rule::RuleTarget;
use crate::validation::{ValidationWarning, ValidationWarningType};

pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong, but I dunno what, sorry!";

const ZIP_MAGIC: &[&[u8]] = &[b"PK\x03\x04", b"PK\x05\x06"];

#[derive(Debug, Error)]
pub enum InputError {
    #[error("The file is empty.")]
    Empty,

    #[error("The file is larger than the limit of {limit} bytes.")]
    TooLarge { size: u64, limit: u64 },

    #[error("The file is not a valid H5P file / ZIP archive.")]
    NotZip,
}

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Content(#[from] ContentError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl MigrationError {
    /// Message safe to show to whoever submitted the archive.
    ///
    /// Failures carrying server paths or OS error text map to the generic message.
    pub fn user_message(&self) -> String {
        match self {
            MigrationError::Io(_)
            | MigrationError::Archive(ArchiveError::Io(_))
            | MigrationError::Archive(ArchiveError::Write { .. })
            | MigrationError::Archive(ArchiveError::AssetCopy(_)) => {
                warn!(error = %self, "internal migration failure");
                GENERIC_ERROR_MESSAGE.to_string()
            }
            other => other.to_string(),
        }
    }
}

/// A built archive and the report describing how it was made
#[derive(Debug, Clone)]
pub struct MigrationOutcome {
    pub archive_path: PathBuf,
    pub report: MigrationReport,
}

pub struct MigrationPipeline {
    config: MigratorConfig,
    profile: MigrationProfile,
    store: ArchiveStore,
}

impl MigrationPipeline {
    pub fn new(config: MigratorConfig, profile: MigrationProfile) -> Self {
        let store = ArchiveStore::new(config.uploads_path.clone(), config.stale_after_secs);
        Self {
            config,
            profile,
            store,
        }
    }

    pub fn config(&self) -> &MigratorConfig {
        &self.config
    }

    pub fn profile(&self) -> &MigrationProfile {
        &self.profile
    }

    pub fn store(&self) -> &ArchiveStore {
        &self.store
    }

    /// Migrate an uploaded temp file. `original_name` is the name the user gave it.
    pub fn migrate_file(&self, path: &Path, original_name: &str) -> Result<MigrationOutcome, MigrationError> {
        let size = fs::metadata(path)?.len();
        self.check_size(size)?;
        let bytes = fs::read(path)?;
        self.migrate_bytes(&bytes, original_name)
    }

    pub fn migrate_bytes(&self, bytes: &[u8], original_name: &str) -> Result<MigrationOutcome, MigrationError> {
        self.validate_input(bytes)?;

        let work = self.store.extract(bytes)?;
        let span = info_span!("migration", working_dir = %work, file = original_name);
        let _guard = span.enter();

        let result = self.run(&work, original_name);
        self.store.release(work);

        match &result {
            Ok(outcome) => info!(archive = %outcome.archive_path.display(), "migration finished"),
            Err(e) => warn!(error = %e, "migration failed"),
        }
        result
    }

    fn check_size(&self, size: u64) -> Result<(), InputError> {
        if size == 0 {
            return Err(InputError::Empty);
        }
        match self.config.file_size_limit {
            Some(limit) if size > limit => Err(InputError::TooLarge { size, limit }),
            _ => Ok(()),
        }
    }

    fn validate_input(&self, bytes: &[u8]) -> Result<(), InputError> {
        self.check_size(bytes.len() as u64)?;
        if !ZIP_MAGIC.iter().any(|magic| bytes.starts_with(magic)) {
            return Err(InputError::NotZip);
        }
        Ok(())
    }

    fn run(&self, work: &WorkingDir, original_name: &str) -> Result<MigrationOutcome, MigrationError> {
        let manifest = self.store.read_manifest(work)?;
        let mut manifest = ManifestMigrator::new(&self.profile).migrate(manifest)?;
        self.store.write_manifest(work, &manifest.manifest)?;

        self.store
            .replace_asset_tree(work, &self.profile.legacy_asset_dirs, &self.config.assets_path)?;

        let main_library = manifest
            .main_library()
            .unwrap_or(self.profile.target_library.as_str())
            .to_string();
        let language = manifest.language().unwrap_or(self.config.locale.as_str()).to_string();
        let localizer = Localizer::from_library_assets(work.path(), &main_library, &language);

        let raw_content = self.store.read_content_document(work)?;
        let document = ContentMigrator::parse(raw_content.as_deref())?;
        let content = ContentMigrator::new(&self.profile).migrate(document, &main_library, &localizer);
        self.store.write_content_document(work, &content.document)?;
        info!(
            scenes = content.scenes,
            interactions = content.interactions,
            field_changes = content.applied.len() - count_target(&content.applied, RuleTarget::Localization),
            l10n_filled = count_target(&content.applied, RuleTarget::Localization),
            "migrated content"
        );

        let output_name = format!(
            "{}.{}",
            self.profile.output_file_stem(original_name),
            self.profile.archive_extension
        );
        let archive_path = self.store.pack(work, &output_name)?;

        for component in content.components.iter().filter(|component| !component.bundled) {
            manifest.validation.add_warning(ValidationWarning::new(
                component.path.clone(),
                ValidationWarningType::UnknownComponent,
                format!("{} is not bundled with {}", component.library, self.profile.target_library),
            ));
        }

        let mut report =
            TransformationReporter::new().generate_report(&self.profile, &manifest, &content, localizer.language());
        report.archive_path = Some(archive_path.clone());

        Ok(MigrationOutcome {
            archive_path,
            report,
        })
    }
}
