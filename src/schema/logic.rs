/// Logic graph: the language-neutral skeleton of a scenario.
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::action::Action;
use super::predicate::Predicate;
use super::{ron_options, ContentError};

/// Reserved next-scene id meaning "end the scenario".
pub const END_SCENE: &str = "END";

/// Pack id assigned when a logic graph does not name one.
pub const DEFAULT_PACK_ID: &str = "default";

/// How the host should present the scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentationMode {
    #[default]
    Overlay,
    Fullscreen,
}

/// Presentation-only category tag for a choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChoiceKind {
    Action,
    Inquiry,
    Flavor,
}

/// One outcome of a skill check: where to go and what to apply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckBranch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_scene_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
}

/// A player-triggered check of a named voice/stat against a fixed difficulty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillCheck {
    pub id: String,
    pub voice_id: String,
    pub difficulty: i32,
    #[serde(default)]
    pub on_success: CheckBranch,
    #[serde(default)]
    pub on_fail: CheckBranch,
}

/// A check auto-resolved when its scene is entered.
///
/// The text fields are placeholders carried by the logic graph; content
/// packs override them per locale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassiveCheck {
    pub id: String,
    pub voice_id: String,
    pub difficulty: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passive_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passive_fail_text: Option<String>,
    #[serde(default)]
    pub on_success: CheckBranch,
    #[serde(default)]
    pub on_fail: CheckBranch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceLogic {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_scene_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ChoiceKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Predicate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_check: Option<SkillCheck>,
    /// Shorthand for an `add_tension` action applied when the choice is taken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tension_delta: Option<i32>,
}

impl ChoiceLogic {
    /// A plain choice leading to `next_scene_id`.
    pub fn to(id: &str, next_scene_id: &str) -> Self {
        Self {
            id: id.to_string(),
            next_scene_id: Some(next_scene_id.to_string()),
            kind: None,
            actions: Vec::new(),
            condition: None,
            skill_check: None,
            tension_delta: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneLogic {
    /// Filled from the scene map key when left empty.
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_url: Option<String>,
    /// Auto-advance target used when the scene offers no choices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_scene_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preconditions: Vec<Predicate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_enter: Vec<Action>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub passive_checks: Vec<PassiveCheck>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<ChoiceLogic>,
}

impl SceneLogic {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Self::default()
        }
    }
}

/// The logic graph for one scenario, authored once for all locales.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioLogic {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pack_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_background_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music_url: Option<String>,
    #[serde(default)]
    pub initial_scene_id: String,
    #[serde(default)]
    pub mode: PresentationMode,
    #[serde(default)]
    pub scenes: IndexMap<String, SceneLogic>,
}

impl ScenarioLogic {
    /// Load a logic graph from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<ScenarioLogic, ContentError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a logic graph from a RON string.
    pub fn parse_ron(input: &str) -> Result<ScenarioLogic, ContentError> {
        let mut logic: ScenarioLogic = ron_options().from_str(input)?;
        logic.normalize_scene_ids();
        Ok(logic)
    }

    /// True when the id is usable as a registry key.
    pub fn has_valid_id(&self) -> bool {
        !self.id.trim().is_empty()
    }

    fn normalize_scene_ids(&mut self) {
        for (key, scene) in self.scenes.iter_mut() {
            if scene.id.is_empty() {
                scene.id = key.clone();
            } else if scene.id != *key {
                log::warn!(
                    "scenario '{}': scene keyed '{}' declares id '{}'; using the key",
                    self.id,
                    key,
                    scene.id
                );
                scene.id = key.clone();
            }
        }
    }
}
