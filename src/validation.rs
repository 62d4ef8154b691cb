use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::profile::MigrationProfile;

/// Validation report for a rewritten manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.is_valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// All error messages joined into one line
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|error| format!("{}: {}", error.field_path, error.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationError {
    pub field_path: String,
    pub error_type: ValidationErrorType,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationErrorType {
    SchemaViolation,
    InvalidSchema,
    UnexpectedValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub field_path: String,
    pub warning_type: ValidationWarningType,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationWarningType {
    MissingOptionalField,
    UnknownComponent,
}

impl ValidationError {
    pub fn new(field_path: String, error_type: ValidationErrorType, message: String) -> Self {
        Self {
            field_path,
            error_type,
            message,
        }
    }
}

impl ValidationWarning {
    pub fn new(field_path: String, warning_type: ValidationWarningType, message: String) -> Self {
        Self {
            field_path,
            warning_type,
            message,
        }
    }
}

/// Shape of the manifest fields the migration rewrites
fn manifest_schema() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "required": ["mainLibrary", "preloadedDependencies"],
        "properties": {
            "mainLibrary": { "type": "string", "minLength": 1 },
            "preloadedDependencies": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["machineName", "majorVersion", "minorVersion"],
                    "properties": {
                        "machineName": { "type": "string", "minLength": 1 },
                        "majorVersion": { "type": "integer", "minimum": 0 },
                        "minorVersion": { "type": "integer", "minimum": 0 }
                    }
                }
            }
        }
    })
}

const DESCRIPTIVE_FIELDS: &[&str] = &["title", "language"];

/// Check a migrated manifest before it is written back
pub fn validate_manifest(manifest: &Value, profile: &MigrationProfile) -> ValidationReport {
    let mut report = ValidationReport::new();
    let schema = manifest_schema();

    match jsonschema::JSONSchema::compile(&schema) {
        Ok(compiled) => {
            if let Err(errors) = compiled.validate(manifest) {
                for error in errors {
                    report.add_error(ValidationError::new(
                        error.instance_path.to_string(),
                        ValidationErrorType::SchemaViolation,
                        error.to_string(),
                    ));
                }
            }
        }
        Err(error) => {
            report.add_error(ValidationError::new(
                String::new(),
                ValidationErrorType::InvalidSchema,
                format!("Failed to compile manifest schema: {}", error),
            ));
        }
    }

    if let Some(main_library) = manifest.get("mainLibrary").and_then(Value::as_str) {
        if main_library != profile.target_library {
            report.add_error(ValidationError::new(
                "/mainLibrary".to_string(),
                ValidationErrorType::UnexpectedValue,
                format!("expected {}, found {}", profile.target_library, main_library),
            ));
        }
    }

    for field in DESCRIPTIVE_FIELDS {
        if manifest.get(*field).is_none() {
            report.add_warning(ValidationWarning::new(
                format!("/{}", field),
                ValidationWarningType::MissingOptionalField,
                format!("manifest has no {} field", field),
            ));
        }
    }

    report
}
