use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::library_version::LibraryVersion;

/// Library dependency as listed in `preloadedDependencies`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub machine_name: String,
    pub major_version: u32,
    pub minor_version: u32,
}

impl Dependency {
    pub fn new(machine_name: &str, major_version: u32, minor_version: u32) -> Self {
        Self {
            machine_name: machine_name.to_string(),
            major_version,
            minor_version,
        }
    }

    pub fn version(&self) -> LibraryVersion {
        LibraryVersion::new(self.major_version, self.minor_version)
    }
}

/// Fixed facts describing one source-to-target content type migration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationProfile {
    pub source_library: String,
    pub source_label: String,
    pub supported_version: LibraryVersion,
    pub target_library: String,
    pub target_dependencies: Vec<Dependency>,
    pub legacy_asset_dirs: Vec<String>,
    pub output_prefix: String,
    pub archive_extension: String,
}

/// Runtime dependencies of Escape Room 0.5. Update together with the bundled assets.
const ESCAPE_ROOM_DEPENDENCIES: &[(&str, u32, u32)] = &[
    ("FontAwesome", 4, 5),
    ("H5P.Transition", 1, 0),
    ("H5P.FontIcons", 1, 0),
    ("H5P.JoubelUI", 1, 3),
    ("H5P.ThreeJS", 1, 0),
    ("H5P.Question", 1, 5),
    ("H5P.TextUtilities", 1, 3),
    ("H5P.Image", 1, 1),
    ("H5P.MaterialDesignIcons", 1, 0),
    ("H5P.NDLAThreeSixty", 0, 5),
    ("H5PEditor.TableList", 1, 0),
    ("H5P.AdvancedText", 1, 1),
    ("H5P.Audio", 1, 5),
    ("H5P.Video", 1, 6),
    ("H5P.Summary", 1, 10),
    ("H5P.SingleChoiceSet", 1, 11),
    ("H5P.MultiChoice", 1, 16),
    ("H5P.Blanks", 1, 14),
    ("H5P.Crossword", 0, 5),
    ("H5P.EscapeRoom", 0, 5),
];

impl MigrationProfile {
    /// Virtual Tour (H5P.ThreeImage 0.5) to Escape Room (H5P.EscapeRoom 0.5)
    pub fn virtual_tour_to_escape_room() -> Self {
        Self {
            source_library: "H5P.ThreeImage".to_string(),
            source_label: "Virtual Tour".to_string(),
            supported_version: LibraryVersion::new(0, 5),
            target_library: "H5P.EscapeRoom".to_string(),
            target_dependencies: ESCAPE_ROOM_DEPENDENCIES
                .iter()
                .map(|(name, major, minor)| Dependency::new(name, *major, *minor))
                .collect(),
            legacy_asset_dirs: vec![
                "H5P.ThreeImage-0.5".to_string(),
                "H5PEditor.ThreeImage-0.5".to_string(),
                "H5P.ThreeSixty-0.3".to_string(),
            ],
            output_prefix: "escape-room-".to_string(),
            archive_extension: "h5p".to_string(),
        }
    }

    /// Output archive name without extension, derived from the uploaded file name
    pub fn output_file_stem(&self, original_filename: &str) -> String {
        let base = Path::new(original_filename)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("");

        let suffix = format!(".{}", self.archive_extension);
        let stem = if base.len() > suffix.len()
            && base.is_char_boundary(base.len() - suffix.len())
            && base[base.len() - suffix.len()..].eq_ignore_ascii_case(&suffix)
        {
            &base[..base.len() - suffix.len()]
        } else {
            base
        };

        let stem = if stem.is_empty() { "content" } else { stem };
        format!("{}{}", self.output_prefix, stem)
    }

    pub fn is_target_dependency(&self, machine_name: &str) -> bool {
        self.target_dependencies
            .iter()
            .any(|dependency| dependency.machine_name == machine_name)
    }

    pub fn target_version(&self) -> Option<LibraryVersion> {
        self.target_dependencies
            .iter()
            .find(|dependency| dependency.machine_name == self.target_library)
            .map(Dependency::version)
    }
}

impl Default for MigrationProfile {
    fn default() -> Self {
        Self::virtual_tour_to_escape_room()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_room_dependency_table() {
        let profile = MigrationProfile::virtual_tour_to_escape_room();
        assert_eq!(profile.target_dependencies.len(), 20);
        assert_eq!(profile.target_dependencies[0], Dependency::new("FontAwesome", 4, 5));
        assert_eq!(profile.target_dependencies[19], Dependency::new("H5P.EscapeRoom", 0, 5));
        assert_eq!(profile.target_version(), Some(LibraryVersion::new(0, 5)));
    }

    #[test]
    fn test_dependency_serializes_camel_case() {
        let json = serde_json::to_value(Dependency::new("H5P.Image", 1, 1)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "machineName": "H5P.Image", "majorVersion": 1, "minorVersion": 1 })
        );
    }

    #[test]
    fn test_output_file_stem() {
        let profile = MigrationProfile::default();
        assert_eq!(profile.output_file_stem("tour.h5p"), "escape-room-tour");
        assert_eq!(profile.output_file_stem("Tour.H5P"), "escape-room-Tour");
        assert_eq!(profile.output_file_stem("tour.zip"), "escape-room-tour.zip");
        assert_eq!(profile.output_file_stem("../../etc/tour.h5p"), "escape-room-tour");
        assert_eq!(profile.output_file_stem(".h5p"), "escape-room-.h5p");
        assert_eq!(profile.output_file_stem(""), "escape-room-content");
    }

    #[test]
    fn test_is_target_dependency() {
        let profile = MigrationProfile::default();
        assert!(profile.is_target_dependency("H5P.MultiChoice"));
        assert!(!profile.is_target_dependency("H5P.ThreeImage"));
    }
}
