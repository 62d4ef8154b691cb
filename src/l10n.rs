use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::json_path::{self, Predicate};
use crate::library_version::{parse_library_dir_name, LibraryVersion};

pub const DEFAULT_LANGUAGE: &str = "en";

/// Translation context for default `l10n` phrases.
///
/// The catalog maps `l10n` keys to the translated default phrases shipped with
/// the target library. Keys without a translation fall back to the built-in
/// English phrase.
#[derive(Debug, Clone, Default)]
pub struct Localizer {
    language: String,
    phrases: HashMap<String, String>,
}

impl Localizer {
    pub fn new(language: &str) -> Self {
        Self {
            language: normalize_language(language),
            phrases: HashMap::new(),
        }
    }

    pub fn with_phrases(language: &str, phrases: HashMap<String, String>) -> Self {
        Self {
            language: normalize_language(language),
            phrases,
        }
    }

    /// Load the translated `l10n` defaults of `machine_name` from an extracted archive.
    ///
    /// Pairs the field names of the `l10n` group in `semantics.json` with the
    /// positionally aligned `default` values of `language/<lang>.json`. Any
    /// missing or unreadable file yields an empty catalog.
    pub fn from_library_assets(work_dir: &Path, machine_name: &str, language: &str) -> Self {
        let mut localizer = Self::new(language);
        if localizer.language == DEFAULT_LANGUAGE {
            return localizer;
        }

        let Some(library_dir) = find_library_dir(work_dir, machine_name) else {
            debug!(machine_name, "no library folder for translations");
            return localizer;
        };

        let semantics = read_json(&library_dir.join("semantics.json"));
        let translation = read_json(
            &library_dir
                .join("language")
                .join(format!("{}.json", localizer.language)),
        );

        match (semantics, translation) {
            (Some(semantics), Some(translation)) => {
                localizer.phrases = l10n_phrases(&semantics, &translation);
                debug!(
                    language = %localizer.language,
                    phrases = localizer.phrases.len(),
                    "loaded translated l10n defaults"
                );
            }
            _ => debug!(language = %localizer.language, "no translation files for language"),
        }

        localizer
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Translated default for `key`, or `default` if there is none
    pub fn phrase(&self, key: &str, default: &str) -> String {
        self.phrases
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }
}

fn language_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?i)([a-z]{2}|fil)(?:[_-][a-z]{2,4})?$").expect("language pattern is valid")
    })
}

/// Lower-case primary language subtag, or `en` for unrecognized codes
pub fn normalize_language(code: &str) -> String {
    language_pattern()
        .captures(code.trim())
        .map(|captures| captures[1].to_lowercase())
        .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string())
}

/// Highest-versioned `<machine_name>-<major>.<minor>` folder in `work_dir`
fn find_library_dir(work_dir: &Path, machine_name: &str) -> Option<PathBuf> {
    let entries = fs::read_dir(work_dir).ok()?;

    entries
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?.to_string();
            let (name, version) = parse_library_dir_name(&name)?;
            (name == machine_name).then_some((version, entry.path()))
        })
        .max_by_key(|(version, _): &(LibraryVersion, PathBuf)| *version)
        .map(|(_, path)| path)
}

fn read_json(path: &Path) -> Option<Value> {
    let contents = fs::read_to_string(path).ok()?;
    serde_json::from_str(&contents).ok()
}

fn l10n_phrases(semantics: &Value, translation: &Value) -> HashMap<String, String> {
    let mut phrases = HashMap::new();

    let Ok(predicate) = Predicate::new("name", "^l10n$") else {
        return phrases;
    };
    let predicates = [predicate];
    let Some(group) = json_path::find(semantics, &predicates).next() else {
        return phrases;
    };

    let translated_path = if group.path.starts_with('[') {
        format!("semantics{}", group.path)
    } else {
        format!("semantics.{}", group.path)
    };

    let names = group.node.get("fields").and_then(Value::as_array);
    let defaults = json_path::resolve(translation, &translated_path)
        .and_then(|node| node.get("fields"))
        .and_then(Value::as_array);

    if let (Some(names), Some(defaults)) = (names, defaults) {
        for (field, translated) in names.iter().zip(defaults) {
            let name = field.get("name").and_then(Value::as_str);
            let default = translated.get("default").and_then(Value::as_str);
            if let (Some(name), Some(default)) = (name, default) {
                phrases.insert(name.to_string(), default.to_string());
            }
        }
    }

    phrases
}
