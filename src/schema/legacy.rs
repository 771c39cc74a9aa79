/// Single-file scenarios with display text written inline.
///
/// Older content predates the logic/content split. These files are
/// already playable in exactly one language and skip merging entirely.
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::action::Action;
use super::logic::{ChoiceKind, PresentationMode, SkillCheck, DEFAULT_PACK_ID, END_SCENE};
use super::predicate::Predicate;
use super::scenario::{Choice, Scenario, Scene};
use super::{ron_options, ContentError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyChoice {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub next_scene_id: Option<String>,
    #[serde(default)]
    pub kind: Option<ChoiceKind>,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub condition: Option<Predicate>,
    #[serde(default)]
    pub skill_check: Option<SkillCheck>,
    #[serde(default)]
    pub tension_delta: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LegacyScene {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub character_id: Option<String>,
    #[serde(default)]
    pub background_url: Option<String>,
    #[serde(default)]
    pub next_scene_id: Option<String>,
    #[serde(default)]
    pub preconditions: Vec<Predicate>,
    #[serde(default)]
    pub on_enter: Vec<Action>,
    #[serde(default)]
    pub choices: Vec<LegacyChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyScenario {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub default_background_url: Option<String>,
    #[serde(default)]
    pub music_url: Option<String>,
    pub initial_scene_id: String,
    #[serde(default)]
    pub mode: PresentationMode,
    #[serde(default)]
    pub scenes: IndexMap<String, LegacyScene>,
}

impl LegacyScenario {
    pub fn load_from_ron(path: &Path) -> Result<LegacyScenario, ContentError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<LegacyScenario, ContentError> {
        let legacy: LegacyScenario = ron_options().from_str(input)?;
        if legacy.id.trim().is_empty() {
            return Err(ContentError::Invalid(
                "legacy scenario has an empty id".to_string(),
            ));
        }
        Ok(legacy)
    }

    /// Convert into the runtime shape, keyed scenes keeping their order.
    pub fn into_scenario(self) -> Scenario {
        let scenes = self
            .scenes
            .into_iter()
            .map(|(id, scene)| {
                let choices = scene
                    .choices
                    .into_iter()
                    .map(|c| Choice {
                        id: c.id,
                        text: c.text,
                        next_scene_id: c
                            .next_scene_id
                            .filter(|n| !n.is_empty())
                            .unwrap_or_else(|| END_SCENE.to_string()),
                        kind: c.kind,
                        actions: c.actions,
                        condition: c.condition,
                        skill_check: c.skill_check,
                        tension_delta: c.tension_delta,
                    })
                    .collect();
                let scene = Scene {
                    id: id.clone(),
                    text: scene.text,
                    character_id: scene.character_id,
                    background_url: scene.background_url,
                    next_scene_id: scene.next_scene_id,
                    preconditions: scene.preconditions,
                    on_enter: scene.on_enter,
                    passive_checks: Vec::new(),
                    choices,
                };
                (id, scene)
            })
            .collect();

        Scenario {
            id: self.id,
            pack_id: DEFAULT_PACK_ID.to_string(),
            title: self.title,
            locale: self.locale.unwrap_or_else(|| "en".to_string()),
            default_background_url: self.default_background_url,
            music_url: self.music_url,
            initial_scene_id: self.initial_scene_id,
            mode: self.mode,
            scenes,
        }
    }
}
