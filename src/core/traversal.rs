/// The traversal state machine: one active scenario, one current scene.
///
/// `Traversal` owns only the cursor `(active scenario, current scene)` plus
/// bookkeeping (history, visited choices). Player state lives in the host's
/// [`World`], passed into every call that reads or mutates it.
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

use crate::core::actions::{ActionExecutor, BattleHandoff, CheckResult, ExecutionReport, World};
use crate::core::condition::{ConditionContext, PredicateLibrary};
use crate::core::config::EngineConfig;
use crate::core::dice::{CheckRoll, D20Resolver, SkillResolver};
use crate::core::registry::ScenarioRegistry;
use crate::core::runtime::{filter_available_choices, resolve_accessible_scene_id};
use crate::schema::action::Action;
use crate::schema::logic::END_SCENE;
use crate::schema::scenario::{Choice, Scenario, Scene};

/// The persistent part of a traversal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    active_scenario_id: Option<String>,
    current_scene_id: Option<String>,
}

impl Cursor {
    pub fn begin(&mut self, scenario_id: &str, scene_id: &str) {
        self.active_scenario_id = Some(scenario_id.to_string());
        self.current_scene_id = Some(scene_id.to_string());
    }

    pub fn move_to(&mut self, scene_id: &str) {
        self.current_scene_id = Some(scene_id.to_string());
    }

    pub fn end(&mut self) {
        self.active_scenario_id = None;
        self.current_scene_id = None;
    }

    pub fn is_active(&self) -> bool {
        self.active_scenario_id.is_some()
    }

    pub fn scenario_id(&self) -> Option<&str> {
        self.active_scenario_id.as_deref()
    }

    pub fn scene_id(&self) -> Option<&str> {
        self.current_scene_id.as_deref()
    }
}

/// Everything needed to resume a traversal later.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalSnapshot {
    pub locale: String,
    pub active_scenario_id: Option<String>,
    pub current_scene_id: Option<String>,
    #[serde(default)]
    pub history: Vec<String>,
}

impl TraversalSnapshot {
    pub fn to_ron(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
    }

    pub fn parse_ron(input: &str) -> Result<TraversalSnapshot, ron::error::SpannedError> {
        ron::from_str(input)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// Reached `END`.
    Terminal,
    /// The host called `end_scenario`.
    Manual,
    /// A `start_battle` action handed off to the battle subsystem.
    Battle(BattleHandoff),
    /// No scene of the scenario is reachable under current state.
    NoAccessibleScene,
    /// The scenario vanished from the registry (locale switch or restore).
    ScenarioNotFound,
}

/// One passive check resolved on scene entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassiveOutcome {
    pub check_id: String,
    pub voice_id: String,
    pub success: bool,
    /// Localized success or failure text, whichever applies.
    pub text: Option<String>,
}

/// One player-triggered skill check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub check_id: String,
    pub voice_id: String,
    pub difficulty: i32,
    pub level: i32,
    pub roll: CheckRoll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneEntry {
    /// The scene the player ended up in.
    pub scene_id: String,
    /// Passive checks in resolution order, across redirects.
    pub passives: Vec<PassiveOutcome>,
    /// Scenes left through a passive-check redirect before landing here.
    pub redirected_from: Vec<String>,
}

impl SceneEntry {
    /// The first successful passive check that has something to say.
    pub fn intervention(&self) -> Option<&PassiveOutcome> {
        self.passives
            .iter()
            .find(|p| p.success && p.text.as_deref().is_some_and(|t| !t.is_empty()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Entered(SceneEntry),
    /// A failed check without a failure scene; the player may retry.
    Stayed { scene_id: String },
    /// State re-derived without running entry effects.
    Resumed { scene_id: String },
    Ended(EndReason),
    /// The call did not apply to the current state.
    Ignored,
}

impl Transition {
    pub fn is_ended(&self) -> bool {
        matches!(self, Transition::Ended(_))
    }

    /// The scene the traversal rests on after this transition.
    pub fn scene_id(&self) -> Option<&str> {
        match self {
            Transition::Entered(entry) => Some(&entry.scene_id),
            Transition::Stayed { scene_id } | Transition::Resumed { scene_id } => Some(scene_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceOutcome {
    pub choice_id: String,
    pub check: Option<CheckOutcome>,
    pub transition: Transition,
}

impl ChoiceOutcome {
    fn ignored(choice_id: &str) -> Self {
        Self {
            choice_id: choice_id.to_string(),
            check: None,
            transition: Transition::Ignored,
        }
    }
}

type VisitKey = (String, String, String);

pub struct Traversal {
    registry: Arc<ScenarioRegistry>,
    config: EngineConfig,
    resolver: Box<dyn SkillResolver>,
    predicates: PredicateLibrary,
    locale: String,
    cursor: Cursor,
    scenario: Option<Scenario>,
    history: VecDeque<String>,
    visited: FxHashSet<VisitKey>,
}

impl Traversal {
    /// A traversal using the registry's config and an entropy-seeded d20.
    pub fn new(registry: Arc<ScenarioRegistry>) -> Self {
        let config = registry.config().clone();
        Self {
            locale: config.default_locale.as_str().to_string(),
            registry,
            config,
            resolver: Box::new(D20Resolver::from_entropy()),
            predicates: PredicateLibrary::new(),
            cursor: Cursor::default(),
            scenario: None,
            history: VecDeque::new(),
            visited: FxHashSet::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_seed(self, seed: u64) -> Self {
        self.with_resolver(D20Resolver::new(seed))
    }

    pub fn with_resolver(mut self, resolver: impl SkillResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn with_predicates(mut self, predicates: PredicateLibrary) -> Self {
        self.predicates = predicates;
        self
    }

    pub fn with_locale(mut self, locale: &str) -> Self {
        self.locale = locale.to_string();
        self
    }

    pub fn registry(&self) -> &ScenarioRegistry {
        &self.registry
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn is_active(&self) -> bool {
        self.cursor.is_active()
    }

    pub fn active_scenario_id(&self) -> Option<&str> {
        self.cursor.scenario_id()
    }

    /// The stored scene id, before recovery is applied.
    pub fn stored_scene_id(&self) -> Option<&str> {
        self.cursor.scene_id()
    }

    /// The merged scenario currently being played.
    pub fn scenario(&self) -> Option<&Scenario> {
        self.scenario.as_ref()
    }

    /// Entered scene ids, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &str> + '_ {
        self.history.iter().map(|s| s.as_str())
    }

    pub fn is_choice_visited(&self, scenario_id: &str, scene_id: &str, choice_id: &str) -> bool {
        self.visited.contains(&(
            scenario_id.to_string(),
            scene_id.to_string(),
            choice_id.to_string(),
        ))
    }

    /// Build the predicate context from the world's current state.
    pub fn condition_context(&self, world: &dyn World) -> ConditionContext {
        ConditionContext::new()
            .with_evidence(world.evidence_ids())
            .with_quest_stages(world.quest_stages())
            .with_quest_orders(self.config.quest_stages.clone())
            .with_library(self.predicates.clone())
    }

    /// The current scene with recovery applied.
    pub fn current_scene(&self, world: &dyn World) -> Option<&Scene> {
        let scenario = self.scenario.as_ref()?;
        let stored = self.cursor.scene_id()?;
        let context = self.condition_context(world);
        let id = resolve_accessible_scene_id(scenario, stored, world.flags(), &context)?;
        scenario.scene(id)
    }

    /// Choices of the current scene the player may pick right now.
    pub fn available_choices(&self, world: &dyn World) -> Vec<&Choice> {
        let Some(scene) = self.current_scene(world) else {
            return Vec::new();
        };
        let context = self.condition_context(world);
        filter_available_choices(&scene.choices, world.flags(), &context)
    }

    /// Begin `scenario_id` at its initial scene.
    ///
    /// An unknown scenario leaves the traversal untouched.
    pub fn start(&mut self, scenario_id: &str, world: &mut dyn World) -> Transition {
        let Some(scenario) = self.registry.get_scenario_by_id(scenario_id, &self.locale) else {
            log::warn!(
                "cannot start scenario '{}' [{}]: not found",
                scenario_id,
                self.locale
            );
            return Transition::Ignored;
        };

        let initial = scenario.initial_scene_id.clone();
        log::info!("starting scenario '{}' [{}]", scenario_id, scenario.locale);
        self.history.clear();
        self.cursor.begin(scenario_id, &initial);
        self.scenario = Some(scenario);
        self.enter(&initial, world)
    }

    /// Move to `next_scene_id`, or end on `END`.
    pub fn advance(&mut self, next_scene_id: &str, world: &mut dyn World) -> Transition {
        if !self.cursor.is_active() {
            log::warn!("advance to '{}' with no active scenario", next_scene_id);
            return Transition::Ignored;
        }
        if next_scene_id.is_empty() || next_scene_id == END_SCENE {
            return self.finish(EndReason::Terminal);
        }
        self.enter(next_scene_id, world)
    }

    /// Take the available choice `choice_id` of the current scene.
    pub fn choose(&mut self, choice_id: &str, world: &mut dyn World) -> ChoiceOutcome {
        let Some(scene_id) = self.recover_scene(world) else {
            log::warn!("choose '{}' with no current scene", choice_id);
            return ChoiceOutcome::ignored(choice_id);
        };
        let choice = {
            let context = self.condition_context(world);
            self.scenario
                .as_ref()
                .and_then(|s| s.scene(&scene_id))
                .and_then(|scene| {
                    filter_available_choices(&scene.choices, world.flags(), &context)
                        .into_iter()
                        .find(|c| c.id == choice_id)
                        .cloned()
                })
        };
        let Some(choice) = choice else {
            log::warn!(
                "choice '{}' is not available in scene '{}'",
                choice_id,
                scene_id
            );
            return ChoiceOutcome::ignored(choice_id);
        };

        let scenario_id = self.cursor.scenario_id().unwrap_or_default().to_string();
        self.visited
            .insert((scenario_id, scene_id.clone(), choice.id.clone()));
        log::debug!("choice '{}' taken in scene '{}'", choice.id, scene_id);

        if let Some(delta) = choice.tension_delta {
            self.execute(&[Action::AddTension(delta)], world);
        }

        let Some(check) = &choice.skill_check else {
            let report = self.execute(&choice.actions, world);
            let transition = match report.battle {
                Some(handoff) => self.finish(EndReason::Battle(handoff)),
                None => self.advance(&choice.next_scene_id, world),
            };
            return ChoiceOutcome {
                choice_id: choice.id.clone(),
                check: None,
                transition,
            };
        };

        let level = world.voice_level(&check.voice_id);
        let roll = self.resolver.resolve(level, check.difficulty);
        self.record_check(world, &check.id, &check.voice_id, roll.success);
        log::debug!(
            "check '{}' ({} {} vs {}): {}",
            check.id,
            check.voice_id,
            level,
            check.difficulty,
            if roll.success { "passed" } else { "failed" }
        );

        let transition = if roll.success {
            let report = self.execute(&check.on_success.actions, world);
            match report.battle {
                Some(handoff) => self.finish(EndReason::Battle(handoff)),
                None => {
                    let next = check
                        .on_success
                        .next_scene_id
                        .as_deref()
                        .filter(|n| !n.is_empty())
                        .unwrap_or(&choice.next_scene_id);
                    self.advance(next, world)
                }
            }
        } else {
            let report = self.execute(&check.on_fail.actions, world);
            match (report.battle, check.on_fail.next_scene_id.as_deref()) {
                (Some(handoff), _) => self.finish(EndReason::Battle(handoff)),
                (None, Some(next)) if !next.is_empty() => self.advance(next, world),
                (None, _) => Transition::Stayed { scene_id },
            }
        };

        ChoiceOutcome {
            choice_id: choice.id.clone(),
            check: Some(CheckOutcome {
                check_id: check.id.clone(),
                voice_id: check.voice_id.clone(),
                difficulty: check.difficulty,
                level,
                roll,
            }),
            transition,
        }
    }

    /// Follow the current scene's auto-advance target.
    ///
    /// Only applies when the scene offers no available choice.
    pub fn continue_scene(&mut self, world: &mut dyn World) -> Transition {
        let target = {
            let Some(scene) = self.current_scene(world) else {
                return Transition::Ignored;
            };
            if !self.available_choices(world).is_empty() {
                log::warn!("continue requested on scene '{}' which has choices", scene.id);
                return Transition::Ignored;
            }
            scene.continue_target().to_string()
        };
        self.recover_scene(world);
        self.advance(&target, world)
    }

    /// Leave the active scenario. Safe to call at any time.
    pub fn end_scenario(&mut self) -> Transition {
        if !self.cursor.is_active() {
            return Transition::Ignored;
        }
        self.finish(EndReason::Manual)
    }

    /// Switch language. The active scenario is re-merged for the new locale
    /// and its current scene re-resolved; no entry effects run.
    pub fn set_locale(&mut self, locale: &str, world: &dyn World) -> Transition {
        if locale == self.locale {
            return Transition::Ignored;
        }
        log::info!("locale '{}' -> '{}'", self.locale, locale);
        self.locale = locale.to_string();

        let Some(scenario_id) = self.cursor.scenario_id().map(str::to_string) else {
            return Transition::Ignored;
        };
        match self.registry.get_scenario_by_id(&scenario_id, &self.locale) {
            Some(scenario) => {
                self.scenario = Some(scenario);
                self.resume(world)
            }
            None => self.finish(EndReason::ScenarioNotFound),
        }
    }

    pub fn snapshot(&self) -> TraversalSnapshot {
        TraversalSnapshot {
            locale: self.locale.clone(),
            active_scenario_id: self.cursor.active_scenario_id.clone(),
            current_scene_id: self.cursor.current_scene_id.clone(),
            history: self.history.iter().cloned().collect(),
        }
    }

    /// Resume from a snapshot. The stored scene goes through recovery; no
    /// entry effects run.
    pub fn restore(&mut self, snapshot: TraversalSnapshot, world: &dyn World) -> Transition {
        let TraversalSnapshot {
            locale,
            active_scenario_id,
            current_scene_id,
            history,
        } = snapshot;

        if !locale.is_empty() {
            self.locale = locale;
        }
        self.cursor.end();
        self.scenario = None;
        self.history = history.into_iter().collect();
        self.trim_history();

        let Some(scenario_id) = active_scenario_id else {
            return Transition::Ignored;
        };
        let Some(scenario) = self.registry.get_scenario_by_id(&scenario_id, &self.locale) else {
            log::warn!("cannot restore scenario '{}': not found", scenario_id);
            return Transition::Ended(EndReason::ScenarioNotFound);
        };
        let scene_id = current_scene_id.unwrap_or_else(|| scenario.initial_scene_id.clone());
        self.cursor.begin(&scenario_id, &scene_id);
        self.scenario = Some(scenario);
        self.resume(world)
    }

    fn resume(&mut self, world: &dyn World) -> Transition {
        match self.recover_scene(world) {
            Some(scene_id) => Transition::Resumed { scene_id },
            None => self.finish(EndReason::NoAccessibleScene),
        }
    }

    /// Re-resolve the stored scene and write the result back.
    fn recover_scene(&mut self, world: &dyn World) -> Option<String> {
        let resolved = self.current_scene(world).map(|s| s.id.clone())?;
        if self.cursor.scene_id() != Some(resolved.as_str()) {
            self.cursor.move_to(&resolved);
        }
        Some(resolved)
    }

    fn enter(&mut self, target: &str, world: &mut dyn World) -> Transition {
        let mut passives = Vec::new();
        let mut redirected_from = Vec::new();
        let mut target = target.to_string();

        loop {
            let resolved = {
                let context = self.condition_context(world);
                self.scenario.as_ref().and_then(|s| {
                    resolve_accessible_scene_id(s, &target, world.flags(), &context)
                        .map(str::to_string)
                })
            };
            let Some(scene_id) = resolved else {
                return self.finish(EndReason::NoAccessibleScene);
            };
            let Some(scene) = self
                .scenario
                .as_ref()
                .and_then(|s| s.scene(&scene_id))
                .cloned()
            else {
                return self.finish(EndReason::NoAccessibleScene);
            };

            self.cursor.move_to(&scene_id);
            self.push_history(&scene_id);
            log::debug!("entered scene '{}'", scene_id);

            let mut redirect = None;
            for check in &scene.passive_checks {
                let level = world.voice_level(&check.voice_id);
                let roll = self.resolver.resolve(level, check.difficulty);
                self.record_check(world, &check.id, &check.voice_id, roll.success);
                let (branch, text) = if roll.success {
                    (&check.on_success, check.passive_text.clone())
                } else {
                    (&check.on_fail, check.passive_fail_text.clone())
                };
                passives.push(PassiveOutcome {
                    check_id: check.id.clone(),
                    voice_id: check.voice_id.clone(),
                    success: roll.success,
                    text,
                });

                let report = self.execute(&branch.actions, world);
                if let Some(handoff) = report.battle {
                    return self.finish(EndReason::Battle(handoff));
                }
                if let Some(next) = branch.next_scene_id.as_deref().filter(|n| !n.is_empty()) {
                    redirect = Some(next.to_string());
                    break;
                }
            }

            match redirect {
                Some(next) if next == END_SCENE => return self.finish(EndReason::Terminal),
                Some(next) if redirected_from.len() < self.config.max_redirect_depth => {
                    log::debug!("passive check redirects '{}' -> '{}'", scene_id, next);
                    redirected_from.push(scene_id);
                    target = next;
                    continue;
                }
                Some(next) => log::warn!(
                    "redirect limit reached in scene '{}'; staying instead of going to '{}'",
                    scene_id,
                    next
                ),
                None => {}
            }

            let report = self.execute(&scene.on_enter, world);
            if let Some(handoff) = report.battle {
                return self.finish(EndReason::Battle(handoff));
            }

            return Transition::Entered(SceneEntry {
                scene_id,
                passives,
                redirected_from,
            });
        }
    }

    fn execute(&mut self, actions: &[Action], world: &mut dyn World) -> ExecutionReport {
        if actions.is_empty() {
            return ExecutionReport::default();
        }
        ActionExecutor::new(&mut self.cursor, world).execute(actions)
    }

    fn record_check(&self, world: &mut dyn World, check_id: &str, voice_id: &str, success: bool) {
        let (result, xp) = if success {
            (CheckResult::Passed, self.config.xp_on_success)
        } else {
            (CheckResult::Failed, self.config.xp_on_failure)
        };
        world.record_check_result(check_id, result);
        world.gain_voice_xp(voice_id, xp);
    }

    fn push_history(&mut self, scene_id: &str) {
        self.history.push_back(scene_id.to_string());
        self.trim_history();
    }

    fn trim_history(&mut self) {
        let limit = self.config.history_limit.max(1);
        while self.history.len() > limit {
            self.history.pop_front();
        }
    }

    fn finish(&mut self, reason: EndReason) -> Transition {
        log::info!(
            "scenario '{}' ended: {:?}",
            self.cursor.scenario_id().unwrap_or("-"),
            reason
        );
        self.cursor.end();
        self.scenario = None;
        Transition::Ended(reason)
    }
}
