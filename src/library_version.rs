use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

/// Major/minor version of an H5P library, as used in manifests and folder names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LibraryVersion {
    pub major: u32,
    pub minor: u32,
}

impl LibraryVersion {
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Build a version from manifest fields, which may be integers or numeric strings
    pub fn from_json(major: &Value, minor: &Value) -> Option<Self> {
        Some(Self::new(json_to_u32(major)?, json_to_u32(minor)?))
    }
}

fn json_to_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl fmt::Display for LibraryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for LibraryVersion {
    type Err = LibraryVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major, minor) = s
            .split_once('.')
            .ok_or_else(|| LibraryVersionError::InvalidFormat(s.to_string()))?;

        let major = major.parse().map_err(|_| LibraryVersionError::InvalidFormat(s.to_string()))?;
        let minor = minor.parse().map_err(|_| LibraryVersionError::InvalidFormat(s.to_string()))?;

        Ok(LibraryVersion::new(major, minor))
    }
}

impl PartialOrd for LibraryVersion {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LibraryVersion {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.major.cmp(&other.major)
            .then_with(|| self.minor.cmp(&other.minor))
    }
}

#[derive(Debug, Error)]
pub enum LibraryVersionError {
    #[error("Invalid library version format: {0}")]
    InvalidFormat(String),
}

fn library_string_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(H5P(?:Editor)?\.[^\s]+) (\d+)\.(\d+)$").expect("library pattern is valid")
    })
}

/// Split a typed component's `library` value such as `H5P.Image 1.1`
pub fn parse_library_string(library: &str) -> Option<(String, LibraryVersion)> {
    let captures = library_string_pattern().captures(library.trim())?;
    let version = LibraryVersion::new(captures[2].parse().ok()?, captures[3].parse().ok()?);
    Some((captures[1].to_string(), version))
}

/// Split an extracted library folder name such as `H5P.EscapeRoom-0.5`
pub fn parse_library_dir_name(dir_name: &str) -> Option<(String, LibraryVersion)> {
    let (machine_name, version) = dir_name.rsplit_once('-')?;
    if machine_name.is_empty() {
        return None;
    }
    Some((machine_name.to_string(), version.parse().ok()?))
}
