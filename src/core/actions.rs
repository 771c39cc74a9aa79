/// Store contracts the engine mutates and the executor that dispatches
/// actions to them.
///
/// The engine owns none of this state. Hosts implement [`World`] over their
/// own stores; [`InMemoryWorld`] is a complete implementation for tools and
/// tests.
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::core::condition::Flags;
use crate::core::traversal::Cursor;
use crate::schema::action::{Action, CharacterStatus};

/// Discovery state of a map location. Ordered: unlocking never demotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointState {
    #[default]
    Locked,
    Discovered,
    Visited,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckResult {
    Passed,
    Failed,
}

/// Named counters touched by the counter actions.
pub mod counters {
    pub const HEAT: &str = "heat";
    pub const TENSION: &str = "tension";
    pub const INFLUENCE: &str = "influence";
}

/// What the battle subsystem receives when a scenario hands off to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleHandoff {
    pub scenario_id: String,
    pub deck_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterrogationSession {
    pub character_id: String,
    pub topic_id: String,
    pub lockout_scene_id: Option<String>,
}

pub trait EvidenceStore {
    fn add_evidence(&mut self, evidence_id: &str);
    fn has_evidence(&self, evidence_id: &str) -> bool;
    fn evidence_ids(&self) -> Vec<String>;
}

pub trait FlagStore {
    fn set_flag(&mut self, key: &str, value: bool);
    fn flags(&self) -> &Flags;
}

pub trait CharacterStore {
    fn modify_relationship(&mut self, character_id: &str, delta: i32);
    fn set_character_status(&mut self, character_id: &str, status: CharacterStatus);
}

pub trait QuestStore {
    fn set_quest_stage(&mut self, quest_id: &str, stage: &str);
    fn quest_stages(&self) -> Vec<(String, String)>;
}

pub trait MapStore {
    fn set_point_state(&mut self, point_id: &str, state: PointState);
    /// Mark every location of a group discovered.
    fn unlock_group(&mut self, group_id: &str);
}

pub trait StatsStore {
    fn set_stat(&mut self, stat_id: &str, value: i32);
    fn add_to_counter(&mut self, counter: &str, delta: i32);
    /// Current level of a voice. Unknown voices are level 0.
    fn voice_level(&self, voice_id: &str) -> i32;
    fn gain_voice_xp(&mut self, voice_id: &str, amount: u32);
    fn record_check_result(&mut self, check_id: &str, result: CheckResult);
    fn check_result(&self, check_id: &str) -> Option<CheckResult>;
}

pub trait BattleLauncher {
    fn launch_battle(&mut self, handoff: &BattleHandoff);
}

pub trait InterrogationStore {
    fn start_interrogation(&mut self, session: InterrogationSession);
    fn end_interrogation(&mut self);
}

/// Everything a traversal reads and writes outside itself.
pub trait World:
    EvidenceStore
    + FlagStore
    + CharacterStore
    + QuestStore
    + MapStore
    + StatsStore
    + BattleLauncher
    + InterrogationStore
{
}

impl<T> World for T where
    T: EvidenceStore
        + FlagStore
        + CharacterStore
        + QuestStore
        + MapStore
        + StatsStore
        + BattleLauncher
        + InterrogationStore
{
}

/// Summary of one [`ActionExecutor::execute`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    pub applied: usize,
    /// Unknown actions passed over.
    pub skipped: usize,
    /// Set when a `start_battle` ended the scenario.
    pub battle: Option<BattleHandoff>,
}

impl ExecutionReport {
    pub fn ended_scenario(&self) -> bool {
        self.battle.is_some()
    }
}

/// Applies action lists against a [`World`].
///
/// Actions run strictly in order. Unknown actions are skipped with a
/// warning. A `start_battle` ends the traversal cursor before handing off;
/// actions after it in the same list still apply to the world.
pub struct ActionExecutor<'a> {
    cursor: &'a mut Cursor,
    world: &'a mut dyn World,
}

impl<'a> ActionExecutor<'a> {
    pub fn new(cursor: &'a mut Cursor, world: &'a mut dyn World) -> Self {
        Self { cursor, world }
    }

    pub fn execute(&mut self, actions: &[Action]) -> ExecutionReport {
        let mut report = ExecutionReport::default();
        for action in actions {
            if self.apply(action, &mut report) {
                report.applied += 1;
            } else {
                report.skipped += 1;
            }
        }
        report
    }

    fn apply(&mut self, action: &Action, report: &mut ExecutionReport) -> bool {
        log::debug!("executing action '{}'", action.kind());
        match action {
            Action::GrantEvidence(id) => self.world.add_evidence(id),
            Action::AddFlag(flags) => {
                for (key, value) in flags {
                    self.world.set_flag(key, *value);
                }
            }
            Action::ModifyRelationship {
                character_id,
                amount,
            } => self.world.modify_relationship(character_id, *amount),
            Action::SetCharacterStatus {
                character_id,
                status,
            } => self.world.set_character_status(character_id, *status),
            Action::SetQuestStage { quest_id, stage } => {
                self.world.set_quest_stage(quest_id, stage)
            }
            Action::UnlockPoint(point_id) => {
                self.world.set_point_state(point_id, PointState::Discovered)
            }
            Action::UnlockGroup(group_id) => self.world.unlock_group(group_id),
            Action::SetStat { id, value } => self.world.set_stat(id, *value),
            Action::AddHeat(delta) => self.world.add_to_counter(counters::HEAT, *delta),
            Action::AddTension(delta) => self.world.add_to_counter(counters::TENSION, *delta),
            Action::GrantInfluencePoint(delta) => {
                self.world.add_to_counter(counters::INFLUENCE, *delta)
            }
            Action::StartBattle {
                scenario_id,
                deck_id,
            } => {
                let handoff = BattleHandoff {
                    scenario_id: scenario_id.clone(),
                    deck_id: deck_id.clone(),
                };
                self.cursor.end();
                self.world.launch_battle(&handoff);
                report.battle = Some(handoff);
            }
            Action::StartInterrogation {
                character_id,
                topic_id,
                lockout_scene_id,
            } => self.world.start_interrogation(InterrogationSession {
                character_id: character_id.clone(),
                topic_id: topic_id.clone(),
                lockout_scene_id: if lockout_scene_id.is_empty() {
                    None
                } else {
                    Some(lockout_scene_id.clone())
                },
            }),
            Action::EndInterrogation => self.world.end_interrogation(),
            Action::Unknown { kind } => {
                log::warn!("skipping unknown action '{}'", kind);
                return false;
            }
        }
        true
    }
}

/// A self-contained [`World`] backed by hash maps.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWorld {
    pub flags: Flags,
    pub evidence: FxHashSet<String>,
    pub relationships: FxHashMap<String, i32>,
    pub statuses: FxHashMap<String, CharacterStatus>,
    pub quest_stages: FxHashMap<String, String>,
    pub points: FxHashMap<String, PointState>,
    pub groups: FxHashMap<String, Vec<String>>,
    pub stats: FxHashMap<String, i32>,
    pub counters: FxHashMap<String, i32>,
    pub voice_xp: FxHashMap<String, u32>,
    pub check_results: FxHashMap<String, CheckResult>,
    pub battles: Vec<BattleHandoff>,
    pub interrogation: Option<InterrogationSession>,
}

impl InMemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flag(mut self, key: &str, value: bool) -> Self {
        self.flags.insert(key.to_string(), value);
        self
    }

    pub fn with_stat(mut self, stat_id: &str, value: i32) -> Self {
        self.stats.insert(stat_id.to_string(), value);
        self
    }

    pub fn with_evidence(mut self, evidence_id: &str) -> Self {
        self.evidence.insert(evidence_id.to_string());
        self
    }

    /// Declare the map locations a group unlocks.
    pub fn with_group(mut self, group_id: &str, points: &[&str]) -> Self {
        self.groups.insert(
            group_id.to_string(),
            points.iter().map(|p| p.to_string()).collect(),
        );
        self
    }

    pub fn flag(&self, key: &str) -> bool {
        self.flags.get(key).copied().unwrap_or(false)
    }

    pub fn counter(&self, counter: &str) -> i32 {
        self.counters.get(counter).copied().unwrap_or(0)
    }

    pub fn relationship(&self, character_id: &str) -> i32 {
        self.relationships.get(character_id).copied().unwrap_or(0)
    }

    pub fn point_state(&self, point_id: &str) -> PointState {
        self.points.get(point_id).copied().unwrap_or_default()
    }

    pub fn xp(&self, voice_id: &str) -> u32 {
        self.voice_xp.get(voice_id).copied().unwrap_or(0)
    }

    fn raise_point(&mut self, point_id: &str, state: PointState) {
        let entry = self.points.entry(point_id.to_string()).or_default();
        if state > *entry {
            *entry = state;
        }
    }
}

impl EvidenceStore for InMemoryWorld {
    fn add_evidence(&mut self, evidence_id: &str) {
        self.evidence.insert(evidence_id.to_string());
    }

    fn has_evidence(&self, evidence_id: &str) -> bool {
        self.evidence.contains(evidence_id)
    }

    fn evidence_ids(&self) -> Vec<String> {
        self.evidence.iter().cloned().collect()
    }
}

impl FlagStore for InMemoryWorld {
    fn set_flag(&mut self, key: &str, value: bool) {
        self.flags.insert(key.to_string(), value);
    }

    fn flags(&self) -> &Flags {
        &self.flags
    }
}

impl CharacterStore for InMemoryWorld {
    fn modify_relationship(&mut self, character_id: &str, delta: i32) {
        let value = self
            .relationships
            .entry(character_id.to_string())
            .or_insert(0);
        *value = value.saturating_add(delta);
    }

    fn set_character_status(&mut self, character_id: &str, status: CharacterStatus) {
        self.statuses.insert(character_id.to_string(), status);
    }
}

impl QuestStore for InMemoryWorld {
    fn set_quest_stage(&mut self, quest_id: &str, stage: &str) {
        self.quest_stages
            .insert(quest_id.to_string(), stage.to_string());
    }

    fn quest_stages(&self) -> Vec<(String, String)> {
        self.quest_stages
            .iter()
            .map(|(q, s)| (q.clone(), s.clone()))
            .collect()
    }
}

impl MapStore for InMemoryWorld {
    fn set_point_state(&mut self, point_id: &str, state: PointState) {
        self.raise_point(point_id, state);
    }

    fn unlock_group(&mut self, group_id: &str) {
        let Some(points) = self.groups.get(group_id).cloned() else {
            log::warn!("unlock_group: unknown group '{}'", group_id);
            return;
        };
        for point in points {
            self.raise_point(&point, PointState::Discovered);
        }
    }
}

impl StatsStore for InMemoryWorld {
    fn set_stat(&mut self, stat_id: &str, value: i32) {
        self.stats.insert(stat_id.to_string(), value);
    }

    fn add_to_counter(&mut self, counter: &str, delta: i32) {
        let value = self.counters.entry(counter.to_string()).or_insert(0);
        *value = value.saturating_add(delta);
    }

    fn voice_level(&self, voice_id: &str) -> i32 {
        self.stats.get(voice_id).copied().unwrap_or(0)
    }

    fn gain_voice_xp(&mut self, voice_id: &str, amount: u32) {
        let xp = self.voice_xp.entry(voice_id.to_string()).or_insert(0);
        *xp = xp.saturating_add(amount);
    }

    fn record_check_result(&mut self, check_id: &str, result: CheckResult) {
        self.check_results.insert(check_id.to_string(), result);
    }

    fn check_result(&self, check_id: &str) -> Option<CheckResult> {
        self.check_results.get(check_id).copied()
    }
}

impl BattleLauncher for InMemoryWorld {
    fn launch_battle(&mut self, handoff: &BattleHandoff) {
        self.battles.push(handoff.clone());
    }
}

impl InterrogationStore for InMemoryWorld {
    fn start_interrogation(&mut self, session: InterrogationSession) {
        self.interrogation = Some(session);
    }

    fn end_interrogation(&mut self) {
        self.interrogation = None;
    }
}
