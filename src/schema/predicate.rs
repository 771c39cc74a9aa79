/// Declarative conditions over flags, evidence and quest progress.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::core::condition::{ConditionContext, Flags, PredicateFault};

/// Signature of a host-supplied predicate.
pub type PredicateCallback =
    dyn Fn(&Flags, &ConditionContext) -> Result<bool, PredicateFault> + Send + Sync;

/// A shareable host predicate.
#[derive(Clone)]
pub struct PredicateFn(pub Arc<PredicateCallback>);

impl PredicateFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Flags, &ConditionContext) -> Result<bool, PredicateFault> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, flags: &Flags, context: &ConditionContext) -> Result<bool, PredicateFault> {
        (self.0)(flags, context)
    }
}

/// Closures have no data form; they serialize as an opaque marker so a
/// scenario carrying one still renders deterministically.
impl Serialize for PredicateFn {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_unit_struct("PredicateFn")
    }
}

impl fmt::Debug for PredicateFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PredicateFn(..)")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Predicate {
    Always,
    Never,
    /// The flag is present and true.
    FlagSet(String),
    /// The flag is absent or false.
    FlagUnset(String),
    FlagEquals {
        key: String,
        value: bool,
    },
    HasEvidence(String),
    QuestAtStage {
        quest_id: String,
        stage: String,
    },
    QuestPastStage {
        quest_id: String,
        stage: String,
    },
    /// At least `min` of `keys` are set.
    FlagsAtLeast {
        keys: Vec<String>,
        min: usize,
    },
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
    Not(Box<Predicate>),
    /// Named predicate looked up in the context's library at evaluation time.
    Custom(String),
    #[serde(skip_deserializing)]
    Closure(PredicateFn),
}

impl Predicate {
    /// Wrap a closure as a predicate.
    pub fn closure<F>(f: F) -> Self
    where
        F: Fn(&Flags, &ConditionContext) -> Result<bool, PredicateFault> + Send + Sync + 'static,
    {
        Predicate::Closure(PredicateFn::new(f))
    }

    pub fn flag(key: &str) -> Self {
        Predicate::FlagSet(key.to_string())
    }

    pub fn not_flag(key: &str) -> Self {
        Predicate::FlagUnset(key.to_string())
    }
}
