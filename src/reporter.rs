use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::{
    content::{ComponentRef, ContentMigration},
    library_version::LibraryVersion,
    manifest::ManifestMigration,
    profile::MigrationProfile,
    transformation_rule::{AppliedTransformation, RuleTarget},
    validation::ValidationReport,
};

/// Reporter for rendering migration reports in various formats
pub struct TransformationReporter {
    output_format: ReportFormat,
}

/// Available output formats for migration reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Console,
    Json,
    Yaml,
}

impl FromStr for ReportFormat {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "console" | "text" => Ok(ReportFormat::Console),
            "json" => Ok(ReportFormat::Json),
            "yaml" | "yml" => Ok(ReportFormat::Yaml),
            other => Err(ReportError::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReportFormat::Console => "console",
            ReportFormat::Json => "json",
            ReportFormat::Yaml => "yaml",
        };
        f.write_str(name)
    }
}

/// Everything one migration changed, plus where the result went
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub source_library: String,
    pub source_version: LibraryVersion,
    pub target_library: String,
    pub target_version: Option<LibraryVersion>,
    pub dependency_count: usize,
    pub language: String,
    pub content_summary: ContentSummary,
    pub components: Vec<ComponentRef>,
    pub validation_summary: ValidationSummary,
    pub applied_transformations: Vec<AppliedTransformation>,
    pub archive_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSummary {
    pub scenes_updated: usize,
    pub interactions_updated: usize,
    pub fields_changed: usize,
    pub l10n_keys_filled: usize,
    pub l10n_keys_kept: usize,
    pub unbundled_components: usize,
}

/// Summary of validation results
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub total_errors: usize,
    pub total_warnings: usize,
    pub is_valid: bool,
    pub warnings: Vec<String>,
}

impl TransformationReporter {
    pub fn new() -> Self {
        Self {
            output_format: ReportFormat::Console,
        }
    }

    pub fn with_format(mut self, format: ReportFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn format(&self) -> ReportFormat {
        self.output_format
    }

    /// Build the report for one finished migration
    pub fn generate_report(
        &self,
        profile: &MigrationProfile,
        manifest: &ManifestMigration,
        content: &ContentMigration,
        language: &str,
    ) -> MigrationReport {
        MigrationReport {
            source_library: profile.source_library.clone(),
            source_version: manifest.source_version,
            target_library: profile.target_library.clone(),
            target_version: profile.target_version(),
            dependency_count: profile.target_dependencies.len(),
            language: language.to_string(),
            content_summary: self.create_content_summary(content),
            components: content.components.clone(),
            validation_summary: self.create_validation_summary(&manifest.validation),
            applied_transformations: content.applied.clone(),
            archive_path: None,
        }
    }

    fn create_content_summary(&self, content: &ContentMigration) -> ContentSummary {
        let l10n_keys_filled = content.filled_l10n_keys().len();
        let l10n_keys_total = content
            .document
            .get("l10n")
            .and_then(|l10n| l10n.as_object())
            .map(|l10n| l10n.len())
            .unwrap_or(0);

        ContentSummary {
            scenes_updated: content.scenes,
            interactions_updated: content.interactions,
            fields_changed: content
                .applied
                .iter()
                .filter(|change| change.target != RuleTarget::Localization)
                .count(),
            l10n_keys_filled,
            l10n_keys_kept: l10n_keys_total.saturating_sub(l10n_keys_filled),
            unbundled_components: content.components.iter().filter(|c| !c.bundled).count(),
        }
    }

    fn create_validation_summary(&self, report: &ValidationReport) -> ValidationSummary {
        ValidationSummary {
            total_errors: report.errors.len(),
            total_warnings: report.warnings.len(),
            is_valid: report.is_valid,
            warnings: report.warnings.iter().map(|w| w.message.clone()).collect(),
        }
    }

    /// Format the report according to the configured output format
    pub fn format_report(&self, report: &MigrationReport) -> Result<String, ReportError> {
        match self.output_format {
            ReportFormat::Console => self.format_console_report(report),
            ReportFormat::Json => self.format_json_report(report),
            ReportFormat::Yaml => self.format_yaml_report(report),
        }
    }

    fn format_console_report(&self, report: &MigrationReport) -> Result<String, ReportError> {
        let mut output = String::new();
        let summary = &report.content_summary;

        output.push_str("=== Migration Report ===\n\n");
        output.push_str(&format!("Source: {} {}\n", report.source_library, report.source_version));
        match report.target_version {
            Some(version) => output.push_str(&format!("Target: {} {}\n", report.target_library, version)),
            None => output.push_str(&format!("Target: {}\n", report.target_library)),
        }
        output.push_str(&format!("Dependencies: {}\n", report.dependency_count));
        output.push_str(&format!("Language: {}\n\n", report.language));

        output.push_str(&format!("Scenes updated: {}\n", summary.scenes_updated));
        output.push_str(&format!("Interactions updated: {}\n", summary.interactions_updated));
        output.push_str(&format!("Fields changed: {}\n", summary.fields_changed));
        output.push_str(&format!(
            "Localization: {} filled, {} kept\n",
            summary.l10n_keys_filled, summary.l10n_keys_kept
        ));
        output.push_str(&format!(
            "Validation Status: {}\n",
            if report.validation_summary.is_valid { "VALID" } else { "INVALID" }
        ));

        let unbundled: Vec<&ComponentRef> = report.components.iter().filter(|c| !c.bundled).collect();
        if !unbundled.is_empty() {
            output.push_str("\nComponents not bundled with the target:\n");
            for component in unbundled {
                output.push_str(&format!("  • {} at {}\n", component.library, component.path));
            }
        }

        if !report.validation_summary.warnings.is_empty() {
            output.push_str("\nWarnings:\n");
            for warning in &report.validation_summary.warnings {
                output.push_str(&format!("  • {}\n", warning));
            }
        }

        if let Some(path) = &report.archive_path {
            output.push_str(&format!("\nOutput: {}\n", path.display()));
        }

        Ok(output)
    }

    fn format_json_report(&self, report: &MigrationReport) -> Result<String, ReportError> {
        serde_json::to_string_pretty(report).map_err(|e| ReportError::SerializationError(e.to_string()))
    }

    fn format_yaml_report(&self, report: &MigrationReport) -> Result<String, ReportError> {
        serde_yaml::to_string(report).map_err(|e| ReportError::SerializationError(e.to_string()))
    }
}

impl Default for TransformationReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Count the applied changes of one rule target
pub fn count_target(applied: &[AppliedTransformation], target: RuleTarget) -> usize {
    applied.iter().filter(|change| change.target == target).count()
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Unknown report format: {0} (expected console, json or yaml)")]
    UnknownFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentMigrator;
    use crate::l10n::Localizer;
    use crate::manifest::ManifestMigrator;
    use crate::transformation_rule::L10N_DEFAULTS;
    use serde_json::json;

    fn sample_report() -> MigrationReport {
        let profile = MigrationProfile::default();
        let manifest = ManifestMigrator::new(&profile)
            .migrate(json!({
                "title": "Tour",
                "language": "en",
                "mainLibrary": "H5P.ThreeImage",
                "preloadedDependencies": [
                    { "machineName": "H5P.ThreeImage", "majorVersion": 0, "minorVersion": 5 }
                ]
            }))
            .unwrap();
        let content = ContentMigrator::new(&profile).migrate(
            json!({
                "threeImage": {
                    "scenes": [{
                        "interactions": [{
                            "action": { "library": "H5P.Unknown 1.0", "params": {} }
                        }]
                    }]
                },
                "l10n": { "title": "Titel" }
            }),
            &profile.target_library,
            &Localizer::new("en"),
        );

        TransformationReporter::new().generate_report(&profile, &manifest, &content, "en")
    }

    #[test]
    fn test_transformation_reporter_creation() {
        let reporter = TransformationReporter::new();
        assert_eq!(reporter.format(), ReportFormat::Console);
    }

    #[test]
    fn test_reporter_with_format() {
        let reporter = TransformationReporter::new().with_format(ReportFormat::Json);
        assert_eq!(reporter.format(), ReportFormat::Json);
    }

    #[test]
    fn test_report_format_from_str() {
        assert_eq!("JSON".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert_eq!("yml".parse::<ReportFormat>().unwrap(), ReportFormat::Yaml);
        assert_eq!("console".parse::<ReportFormat>().unwrap(), ReportFormat::Console);
        assert!("html".parse::<ReportFormat>().is_err());
    }

    #[test]
    fn test_generate_report() {
        let report = sample_report();

        assert_eq!(report.source_version, LibraryVersion::new(0, 5));
        assert_eq!(report.target_version, Some(LibraryVersion::new(0, 5)));
        assert_eq!(report.dependency_count, 20);
        assert_eq!(report.content_summary.scenes_updated, 1);
        assert_eq!(report.content_summary.interactions_updated, 1);
        assert_eq!(report.content_summary.fields_changed, 4);
        assert_eq!(report.content_summary.l10n_keys_filled, L10N_DEFAULTS.len() - 1);
        assert_eq!(report.content_summary.l10n_keys_kept, 1);
        assert_eq!(report.content_summary.unbundled_components, 1);
        assert!(report.validation_summary.is_valid);
    }

    #[test]
    fn test_format_console_report() {
        let mut report = sample_report();
        report.archive_path = Some(PathBuf::from("uploads/escape-room-tour.h5p"));

        let formatted = TransformationReporter::new().format_report(&report).unwrap();
        assert!(formatted.contains("Migration Report"));
        assert!(formatted.contains("Source: H5P.ThreeImage 0.5"));
        assert!(formatted.contains("Target: H5P.EscapeRoom 0.5"));
        assert!(formatted.contains("H5P.Unknown 1.0"));
        assert!(formatted.contains("escape-room-tour.h5p"));
    }

    #[test]
    fn test_format_json_and_yaml_reports() {
        let report = sample_report();

        let json = TransformationReporter::new()
            .with_format(ReportFormat::Json)
            .format_report(&report)
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["targetLibrary"], json!("H5P.EscapeRoom"));
        assert_eq!(parsed["contentSummary"]["interactionsUpdated"], json!(1));

        let yaml = TransformationReporter::new()
            .with_format(ReportFormat::Yaml)
            .format_report(&report)
            .unwrap();
        let parsed: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed["sourceLibrary"].as_str(), Some("H5P.ThreeImage"));
    }

    #[test]
    fn test_count_target() {
        let report = sample_report();
        assert_eq!(count_target(&report.applied_transformations, RuleTarget::Interaction), 3);
        assert_eq!(count_target(&report.applied_transformations, RuleTarget::Scene), 1);
    }

    #[test]
    fn test_count_target_ignores_rule_naming() {
        let applied = vec![AppliedTransformation {
            rule_id: "l10n_looking_but_scene".to_string(),
            target: RuleTarget::Scene,
            path: "threeImage.scenes[0].enableZoom".to_string(),
            old_value: None,
            new_value: json!(false),
        }];

        assert_eq!(count_target(&applied, RuleTarget::Scene), 1);
        assert_eq!(count_target(&applied, RuleTarget::Localization), 0);
    }
}
