//! WASM bindings for scenario-engine: drives the browser playthrough demo.

use std::sync::Arc;
use wasm_bindgen::prelude::*;

use scenario_engine::core::actions::{FlagStore, InMemoryWorld, StatsStore};
use scenario_engine::core::registry::{Locale, ScenarioRegistry};
use scenario_engine::core::traversal::{Transition, Traversal, TraversalSnapshot};
use scenario_engine::schema::content::ContentPack;
use scenario_engine::schema::legacy::LegacyScenario;
use scenario_engine::schema::logic::ScenarioLogic;

// ---------------------------------------------------------------------------
// Embedded content, compiled into the WASM binary
// ---------------------------------------------------------------------------
mod data {
    pub const BANK_LOGIC: &str = include_str!("../../tests/fixtures/content/case/bank.logic.ron");
    pub const BANK_EN: &str = include_str!("../../tests/fixtures/content/case/bank.en.ron");
    pub const BANK_DE: &str = include_str!("../../tests/fixtures/content/case/bank.de.ron");
    pub const BANK_RU: &str = include_str!("../../tests/fixtures/content/case/bank.ru.ron");

    pub const PUB_LEGACY: &str =
        include_str!("../../tests/fixtures/content/legacy/pub.scenario.ron");
}

// ---------------------------------------------------------------------------
// JSON helper types for communication across the WASM boundary
// ---------------------------------------------------------------------------
#[derive(serde::Serialize)]
struct ChoiceView {
    id: String,
    text: String,
    kind: Option<String>,
    check: Option<String>,
}

#[derive(serde::Serialize)]
struct PassiveView {
    voice_id: String,
    success: bool,
    text: String,
}

#[derive(serde::Serialize)]
struct CheckView {
    voice_id: String,
    roll: u32,
    total: i32,
    difficulty: i32,
    success: bool,
}

#[derive(serde::Serialize)]
struct SceneView {
    scenario_id: Option<String>,
    scene_id: Option<String>,
    locale: String,
    text: String,
    character_id: Option<String>,
    background_url: Option<String>,
    choices: Vec<ChoiceView>,
    passives: Vec<PassiveView>,
    check: Option<CheckView>,
    ended: Option<String>,
}

fn js_err(context: &str, e: impl std::fmt::Display) -> JsError {
    JsError::new(&format!("{context}: {e}"))
}

fn build_registry() -> Result<ScenarioRegistry, JsError> {
    let logic = ScenarioLogic::parse_ron(data::BANK_LOGIC).map_err(|e| js_err("Logic parse error", e))?;
    let mut packs = Vec::new();
    for src in [data::BANK_EN, data::BANK_DE, data::BANK_RU] {
        packs.push(ContentPack::parse_ron(src).map_err(|e| js_err("Pack parse error", e))?);
    }
    let legacy = LegacyScenario::parse_ron(data::PUB_LEGACY)
        .map_err(|e| js_err("Legacy parse error", e))?
        .into_scenario();

    ScenarioRegistry::builder()
        .with_scenario(logic, packs)
        .with_legacy(legacy)
        .build()
        .map_err(|e| js_err("Registry build error", e))
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------
#[wasm_bindgen]
pub struct ScenarioSession {
    traversal: Traversal,
    world: InMemoryWorld,
}

#[wasm_bindgen]
impl ScenarioSession {
    /// Create a session over the embedded content.
    #[wasm_bindgen(constructor)]
    pub fn new(locale: &str, seed: u64) -> Result<ScenarioSession, JsError> {
        let registry = Arc::new(build_registry()?);
        let traversal = Traversal::new(registry).with_seed(seed).with_locale(locale);
        Ok(ScenarioSession {
            traversal,
            world: InMemoryWorld::new(),
        })
    }

    /// Start a scenario with a fresh world. Returns the scene view as JSON.
    pub fn start(&mut self, scenario_id: &str) -> Result<String, JsError> {
        self.world = InMemoryWorld::new();
        let transition = self.traversal.start(scenario_id, &mut self.world);
        self.view(&transition, None)
    }

    /// Take a choice by id.
    pub fn choose(&mut self, choice_id: &str) -> Result<String, JsError> {
        let outcome = self.traversal.choose(choice_id, &mut self.world);
        let check = outcome.check.map(|c| CheckView {
            voice_id: c.voice_id,
            roll: c.roll.roll,
            total: c.roll.total,
            difficulty: c.difficulty,
            success: c.roll.success,
        });
        self.view(&outcome.transition, check)
    }

    /// Follow the auto-advance of a scene without choices.
    pub fn continue_scene(&mut self) -> Result<String, JsError> {
        let transition = self.traversal.continue_scene(&mut self.world);
        self.view(&transition, None)
    }

    /// Switch language in place; the current scene is re-rendered.
    pub fn set_locale(&mut self, locale: &str) -> Result<String, JsError> {
        let transition = self.traversal.set_locale(locale, &self.world);
        self.view(&transition, None)
    }

    pub fn set_flag(&mut self, key: &str, value: bool) {
        self.world.set_flag(key, value);
    }

    pub fn set_stat(&mut self, voice_id: &str, level: i32) {
        self.world.set_stat(voice_id, level);
    }

    /// Current traversal state as RON.
    pub fn save(&self) -> Result<String, JsError> {
        self.traversal
            .snapshot()
            .to_ron()
            .map_err(|e| js_err("Snapshot error", e))
    }

    /// Resume from a RON snapshot produced by [`ScenarioSession::save`].
    pub fn load(&mut self, snapshot: &str) -> Result<String, JsError> {
        let snapshot =
            TraversalSnapshot::parse_ron(snapshot).map_err(|e| js_err("Invalid snapshot", e))?;
        let transition = self.traversal.restore(snapshot, &self.world);
        self.view(&transition, None)
    }

    /// Return JSON array of playable scenario ids.
    pub fn scenarios(&self) -> String {
        let ids: Vec<&str> = self.traversal.registry().ids().collect();
        serde_json::to_string(&ids).unwrap_or_else(|_| "[]".to_string())
    }

    /// Return JSON array of supported locale codes.
    pub fn locales() -> String {
        let codes: Vec<&str> = Locale::ALL.iter().map(|l| l.as_str()).collect();
        serde_json::to_string(&codes).unwrap_or_else(|_| "[]".to_string())
    }
}

// Private helpers
impl ScenarioSession {
    fn view(&self, transition: &Transition, check: Option<CheckView>) -> Result<String, JsError> {
        let passives = match transition {
            Transition::Entered(entry) => entry
                .passives
                .iter()
                .filter_map(|p| {
                    p.text.as_ref().map(|text| PassiveView {
                        voice_id: p.voice_id.clone(),
                        success: p.success,
                        text: text.clone(),
                    })
                })
                .collect(),
            _ => Vec::new(),
        };
        let ended = match transition {
            Transition::Ended(reason) => Some(format!("{reason:?}")),
            _ => None,
        };

        let scene = self.traversal.current_scene(&self.world);
        let choices = self
            .traversal
            .available_choices(&self.world)
            .into_iter()
            .map(|c| ChoiceView {
                id: c.id.clone(),
                text: c.text.clone(),
                kind: c.kind.as_ref().map(|k| format!("{k:?}").to_lowercase()),
                check: c
                    .skill_check
                    .as_ref()
                    .map(|s| format!("{} {}", s.voice_id, s.difficulty)),
            })
            .collect();

        let view = SceneView {
            scenario_id: self.traversal.active_scenario_id().map(str::to_string),
            scene_id: scene.map(|s| s.id.clone()),
            locale: self.traversal.locale().to_string(),
            text: scene.map(|s| s.text.clone()).unwrap_or_default(),
            character_id: scene.and_then(|s| s.character_id.clone()),
            background_url: scene.and_then(|s| {
                s.background_url.clone().or_else(|| {
                    self.traversal
                        .scenario()
                        .and_then(|sc| sc.default_background_url.clone())
                })
            }),
            choices,
            passives,
            check,
            ended,
        };
        serde_json::to_string(&view).map_err(|e| js_err("Serialization error", e))
    }
}
