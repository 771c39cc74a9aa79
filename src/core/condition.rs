/// Read-only player state handed to predicates.
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::schema::predicate::PredicateFn;

/// Boolean flags keyed by name. Absent means false.
pub type Flags = FxHashMap<String, bool>;

/// Raised by a predicate that cannot produce an answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("predicate fault: {0}")]
pub struct PredicateFault(pub String);

impl PredicateFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Named host predicates referenced by `Predicate::Custom`.
#[derive(Debug, Clone, Default)]
pub struct PredicateLibrary {
    entries: FxHashMap<String, PredicateFn>,
}

impl PredicateLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&Flags, &ConditionContext) -> Result<bool, PredicateFault> + Send + Sync + 'static,
    {
        self.entries.insert(name.to_string(), PredicateFn::new(f));
    }

    pub fn with<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&Flags, &ConditionContext) -> Result<bool, PredicateFault> + Send + Sync + 'static,
    {
        self.register(name, f);
        self
    }

    pub fn get(&self, name: &str) -> Option<&PredicateFn> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Snapshot of evidence, quest progress and the predicate library.
///
/// Built fresh before each evaluation pass; predicates never see live
/// stores.
#[derive(Debug, Clone, Default)]
pub struct ConditionContext {
    evidence: FxHashSet<String>,
    quest_stages: FxHashMap<String, String>,
    quest_order: FxHashMap<String, Vec<String>>,
    library: PredicateLibrary,
}

impl ConditionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_evidence<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.evidence.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_quest_stage(mut self, quest_id: &str, stage: &str) -> Self {
        self.quest_stages
            .insert(quest_id.to_string(), stage.to_string());
        self
    }

    pub fn with_quest_stages<I>(mut self, stages: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.quest_stages.extend(stages);
        self
    }

    /// Declare the ordered stage list of a quest.
    pub fn with_quest_order(mut self, quest_id: &str, stages: &[&str]) -> Self {
        self.quest_order.insert(
            quest_id.to_string(),
            stages.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    pub fn with_quest_orders<I>(mut self, orders: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<String>)>,
    {
        self.quest_order.extend(orders);
        self
    }

    pub fn with_library(mut self, library: PredicateLibrary) -> Self {
        self.library = library;
        self
    }

    pub fn has_evidence(&self, evidence_id: &str) -> bool {
        self.evidence.contains(evidence_id)
    }

    pub fn quest_stage(&self, quest_id: &str) -> Option<&str> {
        self.quest_stages.get(quest_id).map(|s| s.as_str())
    }

    fn stage_index(&self, quest_id: &str, stage: &str) -> Option<usize> {
        self.quest_order
            .get(quest_id)?
            .iter()
            .position(|s| s == stage)
    }

    /// The quest is exactly at `stage`, and `stage` is a known stage.
    pub fn is_quest_at_stage(&self, quest_id: &str, stage: &str) -> bool {
        match self.quest_stage(quest_id) {
            Some(current) => current == stage && self.stage_index(quest_id, stage).is_some(),
            None => false,
        }
    }

    /// The quest has reached or passed `stage` in its declared order.
    ///
    /// False when the quest has no current stage or either stage is
    /// unknown.
    pub fn is_quest_past_stage(&self, quest_id: &str, stage: &str) -> bool {
        let Some(current) = self.quest_stage(quest_id) else {
            return false;
        };
        match (
            self.stage_index(quest_id, current),
            self.stage_index(quest_id, stage),
        ) {
            (Some(current_idx), Some(target_idx)) => current_idx >= target_idx,
            _ => false,
        }
    }

    pub fn custom(&self, name: &str) -> Option<&PredicateFn> {
        self.library.get(name)
    }
}
