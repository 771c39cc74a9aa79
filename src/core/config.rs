/// Engine-wide tunables, loadable from RON.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::core::registry::Locale;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Locale whose pack backs every other locale.
    pub default_locale: Locale,
    /// Log an error for every merge that leaves keys missing.
    pub strict_localization: bool,
    /// Scene ids kept in the traversal history.
    pub history_limit: usize,
    pub xp_on_success: u32,
    pub xp_on_failure: u32,
    /// Chained passive-check redirects followed on a single scene entry.
    pub max_redirect_depth: usize,
    /// Ordered stage lists per quest, used by quest predicates.
    pub quest_stages: BTreeMap<String, Vec<String>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_locale: Locale::En,
            strict_localization: cfg!(debug_assertions),
            history_limit: 200,
            xp_on_success: 20,
            xp_on_failure: 10,
            max_redirect_depth: 16,
            quest_stages: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    pub fn load_from_ron(path: &Path) -> Result<EngineConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<EngineConfig, ConfigError> {
        let config: EngineConfig = ron::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.history_limit == 0 {
            return Err(ConfigError::Invalid(
                "history_limit must be at least 1".to_string(),
            ));
        }
        for (quest, stages) in &self.quest_stages {
            let mut seen = rustc_hash::FxHashSet::default();
            for stage in stages {
                if !seen.insert(stage.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "quest '{}' lists stage '{}' twice",
                        quest, stage
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn with_quest_stages(mut self, quest_id: &str, stages: &[&str]) -> Self {
        self.quest_stages.insert(
            quest_id.to_string(),
            stages.iter().map(|s| s.to_string()).collect(),
        );
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.default_locale, Locale::En);
        assert_eq!(config.history_limit, 200);
        assert_eq!(config.xp_on_success, 20);
        assert_eq!(config.xp_on_failure, 10);
    }

    #[test]
    fn partial_ron_keeps_defaults() {
        let config = EngineConfig::parse_ron(
            r#"(
                default_locale: de,
                history_limit: 50,
                quest_stages: { "case": ["briefing", "bank", "finale"] },
            )"#,
        )
        .unwrap();
        assert_eq!(config.default_locale, Locale::De);
        assert_eq!(config.history_limit, 50);
        assert_eq!(config.xp_on_success, 20);
        assert_eq!(config.quest_stages["case"].len(), 3);
    }

    #[test]
    fn zero_history_is_rejected() {
        let result = EngineConfig::parse_ron("(history_limit: 0)");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn duplicate_stage_is_rejected() {
        let result = EngineConfig::parse_ron(r#"(quest_stages: { "q": ["a", "a"] })"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
