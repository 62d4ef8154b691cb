use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::library_version::LibraryVersion;
use crate::profile::MigrationProfile;
use crate::validation::{validate_manifest, ValidationReport};

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("The content type is not a {0}.")]
    WrongContentType(String),

    #[error("There is no version information for the {0} library.")]
    MissingVersionInfo(String),

    #[error("Please upgrade your {label} content to version {supported}.")]
    UnsupportedOldVersion {
        label: String,
        found: LibraryVersion,
        supported: LibraryVersion,
    },

    #[error("The version of the {label} content is not supported yet.")]
    UnsupportedNewVersion { label: String, found: LibraryVersion },

    #[error("The migrated manifest is invalid: {0}")]
    SchemaViolation(String),
}

/// Rewritten manifest plus what was learned while rewriting it
#[derive(Debug, Clone)]
pub struct ManifestMigration {
    pub manifest: Value,
    pub source_version: LibraryVersion,
    pub validation: ValidationReport,
}

impl ManifestMigration {
    pub fn language(&self) -> Option<&str> {
        self.manifest.get("language").and_then(Value::as_str)
    }

    pub fn main_library(&self) -> Option<&str> {
        self.manifest.get("mainLibrary").and_then(Value::as_str)
    }
}

pub struct ManifestMigrator<'a> {
    profile: &'a MigrationProfile,
}

impl<'a> ManifestMigrator<'a> {
    pub fn new(profile: &'a MigrationProfile) -> Self {
        Self { profile }
    }

    /// Check the source identity and version, then swap in the target identity
    /// and dependency table. Every other manifest field is kept as is.
    pub fn migrate(&self, mut manifest: Value) -> Result<ManifestMigration, ManifestError> {
        self.check_identity(&manifest)?;
        let source_version = self.source_version(&manifest)?;
        self.check_version(source_version)?;

        let dependencies = serde_json::to_value(&self.profile.target_dependencies)
            .map_err(|e| ManifestError::SchemaViolation(e.to_string()))?;

        if let Some(fields) = manifest.as_object_mut() {
            fields.insert(
                "mainLibrary".to_string(),
                Value::String(self.profile.target_library.clone()),
            );
            fields.insert("preloadedDependencies".to_string(), dependencies);
        }

        let validation = validate_manifest(&manifest, self.profile);
        if validation.has_errors() {
            return Err(ManifestError::SchemaViolation(validation.error_summary()));
        }
        for warning in &validation.warnings {
            debug!(field = %warning.field_path, "{}", warning.message);
        }

        info!(
            from = %format!("{} {}", self.profile.source_library, source_version),
            to = %self.profile.target_library,
            dependencies = self.profile.target_dependencies.len(),
            "migrated manifest"
        );

        Ok(ManifestMigration {
            manifest,
            source_version,
            validation,
        })
    }

    fn check_identity(&self, manifest: &Value) -> Result<(), ManifestError> {
        match manifest.get("mainLibrary").and_then(Value::as_str) {
            Some(library) if library == self.profile.source_library => Ok(()),
            _ => Err(ManifestError::WrongContentType(self.profile.source_label.clone())),
        }
    }

    fn source_version(&self, manifest: &Value) -> Result<LibraryVersion, ManifestError> {
        manifest
            .get("preloadedDependencies")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .find(|dependency| {
                dependency.get("machineName").and_then(Value::as_str) == Some(self.profile.source_library.as_str())
            })
            .and_then(|dependency| {
                LibraryVersion::from_json(
                    dependency.get("majorVersion").unwrap_or(&Value::Null),
                    dependency.get("minorVersion").unwrap_or(&Value::Null),
                )
            })
            .ok_or_else(|| ManifestError::MissingVersionInfo(self.profile.source_label.clone()))
    }

    fn check_version(&self, found: LibraryVersion) -> Result<(), ManifestError> {
        let supported = self.profile.supported_version;
        if found == supported {
            return Ok(());
        }

        if found.major == supported.major && found.minor < supported.minor {
            Err(ManifestError::UnsupportedOldVersion {
                label: self.profile.source_label.clone(),
                found,
                supported,
            })
        } else {
            Err(ManifestError::UnsupportedNewVersion {
                label: self.profile.source_label.clone(),
                found,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source_manifest(major: Value, minor: Value) -> Value {
        json!({
            "title": "My tour",
            "language": "de",
            "license": "CC BY",
            "authors": [{ "name": "Jane", "role": "Author" }],
            "mainLibrary": "H5P.ThreeImage",
            "embedTypes": ["iframe"],
            "preloadedDependencies": [
                { "machineName": "H5P.ThreeSixty", "majorVersion": 0, "minorVersion": 3 },
                { "machineName": "H5P.ThreeImage", "majorVersion": major, "minorVersion": minor },
                { "machineName": "FontAwesome", "majorVersion": 4, "minorVersion": 5 }
            ]
        })
    }

    fn migrate(manifest: Value) -> Result<ManifestMigration, ManifestError> {
        let profile = MigrationProfile::default();
        ManifestMigrator::new(&profile).migrate(manifest)
    }

    #[test]
    fn test_supported_version_is_rewritten() {
        let result = migrate(source_manifest(json!(0), json!(5))).unwrap();
        let profile = MigrationProfile::default();

        assert_eq!(result.main_library(), Some("H5P.EscapeRoom"));
        assert_eq!(
            result.manifest["preloadedDependencies"],
            serde_json::to_value(&profile.target_dependencies).unwrap()
        );
        assert_eq!(result.manifest["preloadedDependencies"].as_array().unwrap().len(), 20);
        assert_eq!(result.source_version, LibraryVersion::new(0, 5));
        assert!(!result.validation.has_warnings());
    }

    #[test]
    fn test_other_fields_pass_through() {
        let result = migrate(source_manifest(json!(0), json!(5))).unwrap();

        assert_eq!(result.manifest["title"], json!("My tour"));
        assert_eq!(result.language(), Some("de"));
        assert_eq!(result.manifest["license"], json!("CC BY"));
        assert_eq!(result.manifest["authors"], json!([{ "name": "Jane", "role": "Author" }]));
        assert_eq!(result.manifest["embedTypes"], json!(["iframe"]));
    }

    #[test]
    fn test_dependency_order_does_not_matter() {
        let mut manifest = source_manifest(json!(0), json!(5));
        manifest["preloadedDependencies"]
            .as_array_mut()
            .unwrap()
            .reverse();

        let result = migrate(manifest).unwrap();
        let names: Vec<&str> = result.manifest["preloadedDependencies"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["machineName"].as_str().unwrap())
            .collect();
        assert_eq!(names.first(), Some(&"FontAwesome"));
        assert_eq!(names.last(), Some(&"H5P.EscapeRoom"));
    }

    #[test]
    fn test_string_versions_are_accepted() {
        let result = migrate(source_manifest(json!("0"), json!("5"))).unwrap();
        assert_eq!(result.source_version, LibraryVersion::new(0, 5));
    }

    #[test]
    fn test_older_minor_asks_for_upgrade() {
        for minor in 0..5 {
            let err = migrate(source_manifest(json!(0), json!(minor))).unwrap_err();
            assert!(matches!(err, ManifestError::UnsupportedOldVersion { .. }));
            assert_eq!(err.to_string(), "Please upgrade your Virtual Tour content to version 0.5.");
        }
    }

    #[test]
    fn test_newer_versions_are_not_supported() {
        for (major, minor) in [(0, 6), (0, 12), (1, 0), (1, 5), (2, 3)] {
            let err = migrate(source_manifest(json!(major), json!(minor))).unwrap_err();
            assert!(matches!(err, ManifestError::UnsupportedNewVersion { .. }));
            assert_eq!(err.to_string(), "The version of the Virtual Tour content is not supported yet.");
        }
    }

    #[test]
    fn test_wrong_content_type() {
        let mut manifest = source_manifest(json!(0), json!(5));
        manifest["mainLibrary"] = json!("Other.Type");

        let err = migrate(manifest).unwrap_err();
        assert_eq!(err.to_string(), "The content type is not a Virtual Tour.");

        let err = migrate(json!({ "title": "no library" })).unwrap_err();
        assert!(matches!(err, ManifestError::WrongContentType(_)));
        assert!(matches!(migrate(json!([])), Err(ManifestError::WrongContentType(_))));
    }

    #[test]
    fn test_missing_version_info() {
        let expected = "There is no version information for the Virtual Tour library.";

        let err = migrate(json!({ "mainLibrary": "H5P.ThreeImage" })).unwrap_err();
        assert_eq!(err.to_string(), expected);

        let err = migrate(source_manifest(json!("zero"), json!(5))).unwrap_err();
        assert_eq!(err.to_string(), expected);

        let err = migrate(json!({
            "mainLibrary": "H5P.ThreeImage",
            "preloadedDependencies": [{ "machineName": "H5P.ThreeImage", "majorVersion": 0 }]
        }))
        .unwrap_err();
        assert!(matches!(err, ManifestError::MissingVersionInfo(_)));
    }

    #[test]
    fn test_missing_descriptive_fields_only_warn() {
        let result = migrate(json!({
            "mainLibrary": "H5P.ThreeImage",
            "preloadedDependencies": [
                { "machineName": "H5P.ThreeImage", "majorVersion": 0, "minorVersion": 5 }
            ]
        }))
        .unwrap();

        assert!(result.validation.is_valid);
        assert_eq!(result.validation.warnings.len(), 2);
        assert_eq!(result.language(), None);
    }
}
