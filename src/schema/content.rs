/// Per-language display text for one scenario.
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{ron_options, ContentError};

/// Localized overrides for one passive check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassiveCheckContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passive_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passive_fail_text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneContent {
    /// Empty text counts as missing.
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub choices: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub passive_checks: IndexMap<String, PassiveCheckContent>,
}

impl SceneContent {
    /// Scene text, if present and non-empty.
    pub fn text(&self) -> Option<&str> {
        non_empty(&self.text)
    }

    /// Choice label, if present and non-empty.
    pub fn choice(&self, choice_id: &str) -> Option<&str> {
        self.choices.get(choice_id).and_then(|t| non_empty(t))
    }

    pub fn passive_text(&self, check_id: &str) -> Option<&str> {
        self.passive_checks
            .get(check_id)
            .and_then(|c| c.passive_text.as_deref())
            .and_then(non_empty)
    }

    pub fn passive_fail_text(&self, check_id: &str) -> Option<&str> {
        self.passive_checks
            .get(check_id)
            .and_then(|c| c.passive_fail_text.as_deref())
            .and_then(non_empty)
    }
}

fn non_empty(text: &str) -> Option<&str> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// All display strings of one scenario in one language.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPack {
    pub locale: String,
    #[serde(default)]
    pub scenes: IndexMap<String, SceneContent>,
}

impl ContentPack {
    /// A pack with no strings at all.
    pub fn empty(locale: &str) -> Self {
        Self {
            locale: locale.to_string(),
            scenes: IndexMap::new(),
        }
    }

    pub fn scene(&self, scene_id: &str) -> Option<&SceneContent> {
        self.scenes.get(scene_id)
    }

    /// Load a content pack from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<ContentPack, ContentError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a content pack from a RON string.
    pub fn parse_ron(input: &str) -> Result<ContentPack, ContentError> {
        let pack = ron_options().from_str(input)?;
        Ok(pack)
    }
}
