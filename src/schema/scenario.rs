/// Playable scenario: logic with display text resolved for one locale.
use indexmap::IndexMap;
use serde::Serialize;

use super::action::Action;
use super::logic::{ChoiceKind, PassiveCheck, PresentationMode, SkillCheck};
use super::predicate::Predicate;

#[derive(Debug, Clone, Serialize)]
pub struct Choice {
    pub id: String,
    pub text: String,
    /// Never empty; `END` when the logic left it unset.
    pub next_scene_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ChoiceKind>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<Predicate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_check: Option<SkillCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tension_delta: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Scene {
    pub id: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_scene_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub preconditions: Vec<Predicate>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub on_enter: Vec<Action>,
    /// Passive checks with their texts already localized.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub passive_checks: Vec<PassiveCheck>,
    pub choices: Vec<Choice>,
}

impl Scene {
    pub fn choice(&self, choice_id: &str) -> Option<&Choice> {
        self.choices.iter().find(|c| c.id == choice_id)
    }

    /// Where the scene goes when it offers no choices.
    pub fn continue_target(&self) -> &str {
        self.next_scene_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .unwrap_or(super::logic::END_SCENE)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Scenario {
    pub id: String,
    pub pack_id: String,
    pub title: String,
    /// Locale of the content pack the text came from.
    pub locale: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_background_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub music_url: Option<String>,
    pub initial_scene_id: String,
    pub mode: PresentationMode,
    pub scenes: IndexMap<String, Scene>,
}

impl Scenario {
    pub fn scene(&self, scene_id: &str) -> Option<&Scene> {
        self.scenes.get(scene_id)
    }
}
