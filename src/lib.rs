// Virtual Tour to Escape Room content migration
pub mod archive;
pub mod config;
pub mod content;
pub mod fs_util;
pub mod json_path;
pub mod l10n;
pub mod library_version;
pub mod manifest;
pub mod pipeline;
pub mod profile;
pub mod reporter;
pub mod transformation_rule;
pub mod validation;

// Re-export core types for convenience
pub use archive::{ArchiveError, ArchiveStore, WorkingDir};
pub use config::{ConfigError, MigratorConfig};
pub use content::{ContentError, ContentMigration, ContentMigrator};
pub use l10n::Localizer;
pub use library_version::LibraryVersion;
pub use manifest::{ManifestError, ManifestMigration, ManifestMigrator};
pub use pipeline::{InputError, MigrationError, MigrationOutcome, MigrationPipeline};
pub use profile::{Dependency, MigrationProfile};
pub use reporter::{MigrationReport, ReportFormat, TransformationReporter};
pub use transformation_rule::{AppliedTransformation, TransformationRule, TransformationType};
pub use validation::{ValidationError, ValidationReport, ValidationWarning};
