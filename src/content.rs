use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::json_path::{self, Predicate};
use crate::l10n::Localizer;
use crate::library_version::parse_library_string;
use crate::profile::MigrationProfile;
use crate::transformation_rule::{content_rules, AppliedTransformation, RuleTarget, TransformationRule};

pub const SCENES_PATH: &str = "threeImage.scenes";
pub const L10N_KEY: &str = "l10n";

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("The content parameters could not be read: {0}")]
    InvalidJson(String),
}

/// A typed component found in the content document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRef {
    pub path: String,
    pub library: String,
    pub machine_name: String,
    /// Library of the nearest enclosing component, if any
    pub parent_library: Option<String>,
    pub bundled: bool,
}

/// Outcome of [`ContentMigrator::migrate`]
#[derive(Debug, Clone)]
pub struct ContentMigration {
    pub document: Value,
    pub applied: Vec<AppliedTransformation>,
    pub components: Vec<ComponentRef>,
    pub scenes: usize,
    pub interactions: usize,
}

impl ContentMigration {
    pub fn filled_l10n_keys(&self) -> Vec<String> {
        self.applied
            .iter()
            .filter(|change| change.target == RuleTarget::Localization)
            .filter_map(|change| change.path.strip_prefix("l10n."))
            .map(str::to_string)
            .collect()
    }
}

pub struct ContentMigrator<'a> {
    profile: &'a MigrationProfile,
}

impl<'a> ContentMigrator<'a> {
    pub fn new(profile: &'a MigrationProfile) -> Self {
        Self { profile }
    }

    /// Decode a raw content document; an absent document migrates as `{}`
    pub fn parse(raw: Option<&str>) -> Result<Value, ContentError> {
        match raw {
            Some(raw) => serde_json::from_str(raw).map_err(|e| ContentError::InvalidJson(e.to_string())),
            None => {
                warn!("archive has no content parameters, starting from an empty document");
                Ok(Value::Object(Map::new()))
            }
        }
    }

    /// Apply the Escape Room field transforms to a Virtual Tour content document.
    ///
    /// Only the fields named by the rule table are touched; everything else,
    /// including unknown keys and nested components, passes through unchanged.
    pub fn migrate(&self, mut document: Value, target_library: &str, localizer: &Localizer) -> ContentMigration {
        let rules = content_rules(localizer);
        let mut applied = Vec::new();

        let (scenes, interactions) = apply_scene_rules(&mut document, &rules, &mut applied);
        apply_l10n_rules(&mut document, &rules, &mut applied);

        let components = self.inventory_components(&document);
        debug!(
            target = target_library,
            language = localizer.language(),
            scenes,
            interactions,
            changes = applied.len(),
            "migrated content parameters"
        );

        ContentMigration {
            document,
            applied,
            components,
            scenes,
            interactions,
        }
    }

    /// All typed components in the document, with their enclosing component
    pub fn inventory_components(&self, document: &Value) -> Vec<ComponentRef> {
        let Ok(predicate) = Predicate::new("library", r"\S") else {
            return Vec::new();
        };
        let predicates = [predicate];

        json_path::find(document, &predicates)
            .filter_map(|found| {
                let library = found.node.get("library")?.as_str()?.to_string();
                let (machine_name, _) = parse_library_string(&library)?;

                let parent_path = json_path::parent_path(&found.path);
                let parent_library = if parent_path == found.path {
                    None
                } else {
                    json_path::closest_typed_component(document, parent_path)
                        .and_then(|parent| parent.node.get("library")?.as_str().map(str::to_string))
                };

                let bundled = self.profile.is_target_dependency(&machine_name);
                if !bundled {
                    warn!(path = %found.path, library = %library, "component is not bundled with the target content type");
                }

                Some(ComponentRef {
                    path: found.path,
                    library,
                    machine_name,
                    parent_library,
                    bundled,
                })
            })
            .collect()
    }
}

fn rules_for(rules: &[TransformationRule], target: RuleTarget) -> impl Iterator<Item = &TransformationRule> {
    rules.iter().filter(move |rule| rule.target == target)
}

fn apply_scene_rules(
    document: &mut Value,
    rules: &[TransformationRule],
    applied: &mut Vec<AppliedTransformation>,
) -> (usize, usize) {
    let Some(scenes) = json_path::resolve_mut(document, SCENES_PATH).and_then(Value::as_array_mut) else {
        return (0, 0);
    };

    let mut scene_count = 0;
    let mut interaction_count = 0;

    for (i, scene) in scenes.iter_mut().enumerate() {
        let Some(scene) = scene.as_object_mut() else {
            continue;
        };
        let scene_path = format!("{}[{}]", SCENES_PATH, i);
        scene_count += 1;

        for rule in rules_for(rules, RuleTarget::Scene) {
            applied.extend(rule.apply(scene, &scene_path));
        }

        let Some(interactions) = scene.get_mut("interactions").and_then(Value::as_array_mut) else {
            continue;
        };

        for (j, interaction) in interactions.iter_mut().enumerate() {
            let Some(interaction) = interaction.as_object_mut() else {
                continue;
            };
            let interaction_path = format!("{}.interactions[{}]", scene_path, j);
            interaction_count += 1;

            for rule in rules_for(rules, RuleTarget::Interaction) {
                applied.extend(rule.apply(interaction, &interaction_path));
            }
        }
    }

    (scene_count, interaction_count)
}

fn apply_l10n_rules(document: &mut Value, rules: &[TransformationRule], applied: &mut Vec<AppliedTransformation>) {
    let Some(root) = document.as_object_mut() else {
        warn!("content parameters are not an object, skipping l10n defaults");
        return;
    };

    let l10n = root
        .entry(L10N_KEY)
        .or_insert_with(|| Value::Object(Map::new()));
    let Some(l10n) = l10n.as_object_mut() else {
        warn!("l10n is not an object, skipping l10n defaults");
        return;
    };

    for rule in rules_for(rules, RuleTarget::Localization) {
        applied.extend(rule.apply(l10n, L10N_KEY));
    }
}
