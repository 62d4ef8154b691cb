use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::l10n::Localizer;

/// A field transformation applied to every node of one kind in the content document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformationRule {
    pub rule_id: String,
    pub target: RuleTarget,
    pub field: String,
    pub transformation_type: TransformationType,
}

/// Which nodes of the content document a rule applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleTarget {
    /// Each entry of `threeImage.scenes`
    Scene,
    /// Each entry of a scene's `interactions`
    Interaction,
    /// The top-level `l10n` map
    Localization,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransformationType {
    /// Replace whatever value the field has
    Overwrite(Value),
    /// Set the field only if it is absent
    FillMissing(Value),
}

/// A change that was actually made to the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedTransformation {
    pub rule_id: String,
    pub target: RuleTarget,
    pub path: String,
    pub old_value: Option<Value>,
    pub new_value: Value,
}

/// Default `l10n` phrases of Escape Room, in the order they are filled in
pub const L10N_DEFAULTS: &[(&str, &str)] = &[
    ("title", "Title"),
    ("playAudioTrack", "Play audio track"),
    ("pauseAudioTrack", "Pause audio track"),
    ("sceneDescription", "Scene description"),
    ("resetCamera", "Reset camera"),
    ("submitDialog", "Submit dialog"),
    ("closeDialog", "Close dialog"),
    ("expandButtonAriaLabel", "Expand the visual label"),
    ("backgroundLoading", "Loading background image ..."),
    ("noContent", "No content"),
    ("goToScene", "Go to scene"),
    ("edit", "Edit"),
    ("delete", "Delete"),
    ("score", "Score"),
    ("assignment", "Assignment"),
    ("total", "Total"),
    ("scoreSummary", "Show score summary"),
    ("scene", "Scene"),
    ("untitled", "Untitled"),
    ("userIsAtStartScene", "You are at the start scene"),
    ("unlocked", "Unlocked"),
    ("locked", "Locked"),
    ("searchRoomForCode", "Search the room until you find the code"),
    ("wrongCode", "The code was wrong, try again."),
    ("contentUnlocked", "The content has been unlocked!"),
    ("code", "Code"),
    ("lockedStateAction", "Unlock"),
    ("hotspotDragHorizAlt", "Drag horizontally to scale"),
    ("hotspotDragVertiAlt", "Drag vertically to scale"),
    ("hint", "Hint"),
    ("lockedContent", "Locked content"),
    ("back", "Back"),
    ("buttonFullscreenEnter", "Enter fullscreen mode"),
    ("buttonFullscreenExit", "Exit fullscreen mode"),
    ("mainToolbar", "Main toolbar"),
    ("noValidSceneSet", "No valid scenes have been set."),
    ("buttonZoomIn", "Zoom in"),
    ("buttonZoomOut", "Zoom out"),
    ("zoomToolbar", "Zoom toolbar"),
    ("zoomAriaLabel", "num% zoomed in"),
];

impl TransformationRule {
    pub fn new(
        rule_id: &str,
        target: RuleTarget,
        field: &str,
        transformation_type: TransformationType,
    ) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            target,
            field: field.to_string(),
            transformation_type,
        }
    }

    /// Apply the rule to one node. `node_path` is used for the change record.
    pub fn apply(&self, node: &mut Map<String, Value>, node_path: &str) -> Option<AppliedTransformation> {
        let path = if node_path.is_empty() {
            self.field.clone()
        } else {
            format!("{}.{}", node_path, self.field)
        };

        match &self.transformation_type {
            TransformationType::Overwrite(value) => {
                let old_value = node.insert(self.field.clone(), value.clone());
                if old_value.as_ref() == Some(value) {
                    return None;
                }
                Some(AppliedTransformation {
                    rule_id: self.rule_id.clone(),
                    target: self.target,
                    path,
                    old_value,
                    new_value: value.clone(),
                })
            }
            TransformationType::FillMissing(value) => {
                if node.contains_key(&self.field) {
                    return None;
                }
                node.insert(self.field.clone(), value.clone());
                Some(AppliedTransformation {
                    rule_id: self.rule_id.clone(),
                    target: self.target,
                    path,
                    old_value: None,
                    new_value: value.clone(),
                })
            }
        }
    }
}

/// Escape Room rule table, with `l10n` defaults resolved through `localizer`
pub fn content_rules(localizer: &Localizer) -> Vec<TransformationRule> {
    let mut rules = vec![
        TransformationRule::new(
            "scene_disable_zoom",
            RuleTarget::Scene,
            "enableZoom",
            TransformationType::Overwrite(Value::Bool(false)),
        ),
        TransformationRule::new(
            "interaction_text_icon",
            RuleTarget::Interaction,
            "iconTypeTextBox",
            TransformationType::Overwrite(Value::String("text-icon".to_string())),
        ),
        TransformationRule::new(
            "interaction_hide_hotspot",
            RuleTarget::Interaction,
            "showAsHotspot",
            TransformationType::Overwrite(Value::Bool(false)),
        ),
        TransformationRule::new(
            "interaction_hide_open_scene_content",
            RuleTarget::Interaction,
            "showAsOpenSceneContent",
            TransformationType::Overwrite(Value::Bool(false)),
        ),
    ];

    rules.extend(L10N_DEFAULTS.iter().map(|(key, default)| {
        TransformationRule::new(
            &format!("l10n_{}", key),
            RuleTarget::Localization,
            key,
            TransformationType::FillMissing(Value::String(localizer.phrase(key, default))),
        )
    }));

    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_overwrite_replaces_and_records() {
        let rule = TransformationRule::new(
            "hide",
            RuleTarget::Interaction,
            "showAsHotspot",
            TransformationType::Overwrite(json!(false)),
        );
        let mut node = object(json!({ "showAsHotspot": true }));

        let applied = rule.apply(&mut node, "scenes[0].interactions[1]").unwrap();
        assert_eq!(node["showAsHotspot"], json!(false));
        assert_eq!(applied.path, "scenes[0].interactions[1].showAsHotspot");
        assert_eq!(applied.target, RuleTarget::Interaction);
        assert_eq!(applied.old_value, Some(json!(true)));
    }

    #[test]
    fn test_overwrite_with_same_value_is_not_recorded() {
        let rule = TransformationRule::new(
            "hide",
            RuleTarget::Interaction,
            "showAsHotspot",
            TransformationType::Overwrite(json!(false)),
        );
        let mut node = object(json!({ "showAsHotspot": false }));
        assert!(rule.apply(&mut node, "").is_none());
    }

    #[test]
    fn test_fill_missing_never_overwrites() {
        let rule = TransformationRule::new(
            "l10n_title",
            RuleTarget::Localization,
            "title",
            TransformationType::FillMissing(json!("Title")),
        );

        let mut filled = object(json!({}));
        let applied = rule.apply(&mut filled, "l10n").unwrap();
        assert_eq!(filled["title"], json!("Title"));
        assert_eq!(applied.path, "l10n.title");

        let mut kept = object(json!({ "title": "Mein Titel" }));
        assert!(rule.apply(&mut kept, "l10n").is_none());
        assert_eq!(kept["title"], json!("Mein Titel"));
    }

    #[test]
    fn test_content_rules_table() {
        let rules = content_rules(&Localizer::new("en"));
        assert_eq!(rules.len(), 4 + L10N_DEFAULTS.len());
        assert_eq!(rules.iter().filter(|r| r.target == RuleTarget::Interaction).count(), 3);
        assert_eq!(rules.iter().filter(|r| r.target == RuleTarget::Scene).count(), 1);
    }

    #[test]
    fn test_content_rules_use_localizer() {
        let mut phrases = HashMap::new();
        phrases.insert("hint".to_string(), "Hinweis".to_string());
        let rules = content_rules(&Localizer::with_phrases("de", phrases));

        let hint = rules.iter().find(|r| r.field == "hint").unwrap();
        assert_eq!(hint.transformation_type, TransformationType::FillMissing(json!("Hinweis")));
        let back = rules.iter().find(|r| r.field == "back").unwrap();
        assert_eq!(back.transformation_type, TransformationType::FillMissing(json!("Back")));
    }
}
