/// Merging a logic graph with a content pack into a playable scenario.
///
/// Text resolution runs primary pack, then fallback pack, then a visible
/// sentinel. Merging is total: it always produces a scenario, and every
/// gap it papers over is written to the [`MergeReport`].
use indexmap::IndexMap;

use crate::schema::content::{ContentPack, SceneContent};
use crate::schema::logic::{PassiveCheck, ScenarioLogic, SceneLogic, DEFAULT_PACK_ID, END_SCENE};
use crate::schema::scenario::{Choice, Scenario, Scene};

#[derive(Debug, Clone, Copy)]
pub struct MergeOptions {
    /// Log an error listing every missing key after the merge.
    pub strict: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            strict: cfg!(debug_assertions),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Keys absent from both primary and fallback packs.
    pub missing_keys: Vec<String>,
    /// Keys served from the fallback pack.
    pub fallback_keys: Vec<String>,
}

impl MergeReport {
    pub fn is_complete(&self) -> bool {
        self.missing_keys.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct MergedScenario {
    pub scenario: Scenario,
    pub report: MergeReport,
}

pub fn missing_text(scene_id: &str) -> String {
    format!("[MISSING TEXT: {}]", scene_id)
}

pub fn missing_choice(choice_id: &str) -> String {
    format!("[MISSING CHOICE: {}]", choice_id)
}

/// Merge with default options.
pub fn merge(
    logic: &ScenarioLogic,
    content: &ContentPack,
    fallback: Option<&ContentPack>,
) -> MergedScenario {
    merge_with(logic, content, fallback, &MergeOptions::default())
}

pub fn merge_with(
    logic: &ScenarioLogic,
    content: &ContentPack,
    fallback: Option<&ContentPack>,
    options: &MergeOptions,
) -> MergedScenario {
    let mut report = MergeReport::default();
    let mut scenes = IndexMap::with_capacity(logic.scenes.len());

    for (scene_id, scene_logic) in &logic.scenes {
        let primary = content.scene(scene_id);
        let secondary = fallback.and_then(|pack| pack.scene(scene_id));
        let scene = merge_scene(
            scene_id,
            scene_logic,
            primary,
            secondary,
            &content.locale,
            &mut report,
        );
        scenes.insert(scene_id.clone(), scene);
    }

    if options.strict && !report.missing_keys.is_empty() {
        log::error!(
            "scenario '{}' [{}] is missing {} key(s): {}",
            logic.id,
            content.locale,
            report.missing_keys.len(),
            report.missing_keys.join(", ")
        );
    }

    let scenario = Scenario {
        id: logic.id.clone(),
        pack_id: logic
            .pack_id
            .clone()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_PACK_ID.to_string()),
        title: logic.title.clone(),
        locale: content.locale.clone(),
        default_background_url: logic.default_background_url.clone(),
        music_url: logic.music_url.clone(),
        initial_scene_id: logic.initial_scene_id.clone(),
        mode: logic.mode,
        scenes,
    };

    MergedScenario { scenario, report }
}

fn merge_scene(
    scene_id: &str,
    logic: &SceneLogic,
    primary: Option<&SceneContent>,
    fallback: Option<&SceneContent>,
    locale: &str,
    report: &mut MergeReport,
) -> Scene {
    let text_key = format!("Scene '{}' text", scene_id);
    let text = resolve(
        primary.and_then(|c| c.text()),
        fallback.and_then(|c| c.text()),
        &text_key,
        report,
    )
    .unwrap_or_else(|| {
        log::warn!(
            "missing body for scene '{}' in '{}'; showing placeholder",
            scene_id,
            locale
        );
        missing_text(scene_id)
    });

    let choices = logic
        .choices
        .iter()
        .map(|choice| {
            let key = format!("Scene '{}' choice '{}'", scene_id, choice.id);
            let text = resolve(
                primary.and_then(|c| c.choice(&choice.id)),
                fallback.and_then(|c| c.choice(&choice.id)),
                &key,
                report,
            )
            .unwrap_or_else(|| missing_choice(&choice.id));

            Choice {
                id: choice.id.clone(),
                text,
                next_scene_id: choice
                    .next_scene_id
                    .clone()
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| END_SCENE.to_string()),
                kind: choice.kind,
                actions: choice.actions.clone(),
                condition: choice.condition.clone(),
                skill_check: choice.skill_check.clone(),
                tension_delta: choice.tension_delta,
            }
        })
        .collect();

    let passive_checks = logic
        .passive_checks
        .iter()
        .map(|check| merge_passive(scene_id, check, primary, fallback, report))
        .collect();

    Scene {
        id: scene_id.to_string(),
        text,
        character_id: logic.character_id.clone(),
        background_url: logic.background_url.clone(),
        next_scene_id: logic.next_scene_id.clone(),
        preconditions: logic.preconditions.clone(),
        on_enter: logic.on_enter.clone(),
        passive_checks,
        choices,
    }
}

/// Passive texts fall back to whatever the logic graph carries, so they
/// are never reported missing.
fn merge_passive(
    scene_id: &str,
    check: &PassiveCheck,
    primary: Option<&SceneContent>,
    fallback: Option<&SceneContent>,
    report: &mut MergeReport,
) -> PassiveCheck {
    let mut merged = check.clone();

    let key = format!("Scene '{}' passive '{}' text", scene_id, check.id);
    if let Some(text) = resolve_optional(
        primary.and_then(|c| c.passive_text(&check.id)),
        fallback.and_then(|c| c.passive_text(&check.id)),
        &key,
        report,
    ) {
        merged.passive_text = Some(text);
    }

    let key = format!("Scene '{}' passive '{}' fail text", scene_id, check.id);
    if let Some(text) = resolve_optional(
        primary.and_then(|c| c.passive_fail_text(&check.id)),
        fallback.and_then(|c| c.passive_fail_text(&check.id)),
        &key,
        report,
    ) {
        merged.passive_fail_text = Some(text);
    }

    merged
}

fn resolve(
    primary: Option<&str>,
    fallback: Option<&str>,
    key: &str,
    report: &mut MergeReport,
) -> Option<String> {
    let found = resolve_optional(primary, fallback, key, report);
    if found.is_none() {
        report.missing_keys.push(key.to_string());
    }
    found
}

fn resolve_optional(
    primary: Option<&str>,
    fallback: Option<&str>,
    key: &str,
    report: &mut MergeReport,
) -> Option<String> {
    if let Some(text) = primary {
        return Some(text.to_string());
    }
    let text = fallback?;
    log::warn!("missing {}; using fallback text", key);
    report.fallback_keys.push(key.to_string());
    Some(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::content::PassiveCheckContent;
    use crate::schema::logic::{CheckBranch, ChoiceLogic};

    fn make_logic() -> ScenarioLogic {
        let mut a = SceneLogic::new("a");
        a.choices = vec![ChoiceLogic::to("c1", "b")];
        let b = SceneLogic::new("b");
        let mut scenes = IndexMap::new();
        scenes.insert("a".to_string(), a);
        scenes.insert("b".to_string(), b);
        ScenarioLogic {
            id: "s".to_string(),
            initial_scene_id: "a".to_string(),
            scenes,
            ..ScenarioLogic::default()
        }
    }

    /// `scenes` holds (scene, text); `choices` holds (scene, choice, label).
    fn make_pack(locale: &str, scenes: &[(&str, &str)], choices: &[(&str, &str, &str)]) -> ContentPack {
        let mut pack = ContentPack::empty(locale);
        for (id, text) in scenes {
            let content = SceneContent {
                text: text.to_string(),
                ..SceneContent::default()
            };
            pack.scenes.insert(id.to_string(), content);
        }
        for (scene, choice, label) in choices {
            if let Some(content) = pack.scenes.get_mut(*scene) {
                content.choices.insert(choice.to_string(), label.to_string());
            }
        }
        pack
    }

    #[test]
    fn complete_pack_merges_cleanly() {
        let pack = make_pack("en", &[("a", "Hello"), ("b", "Bye")], &[("a", "c1", "Go")]);
        let merged = merge(&make_logic(), &pack, None);
        let scenario = &merged.scenario;
        assert_eq!(scenario.scene("a").unwrap().text, "Hello");
        assert_eq!(scenario.scene("a").unwrap().choices[0].text, "Go");
        assert_eq!(scenario.scene("a").unwrap().choices[0].next_scene_id, "b");
        assert_eq!(scenario.scene("b").unwrap().text, "Bye");
        assert_eq!(scenario.pack_id, "default");
        assert!(merged.report.missing_keys.is_empty());
        assert!(merged.report.fallback_keys.is_empty());
    }

    #[test]
    fn fallback_fills_gaps() {
        let de = make_pack("de", &[("a", "Hallo")], &[("a", "c1", "Los")]);
        let en = make_pack("en", &[("a", "Hello"), ("b", "Bye")], &[("a", "c1", "Go")]);
        let merged = merge(&make_logic(), &de, Some(&en));
        assert_eq!(merged.scenario.scene("a").unwrap().text, "Hallo");
        assert_eq!(merged.scenario.scene("b").unwrap().text, "Bye");
        assert_eq!(merged.scenario.locale, "de");
        assert_eq!(merged.report.fallback_keys, vec!["Scene 'b' text".to_string()]);
        assert!(merged.report.missing_keys.is_empty());
    }

    #[test]
    fn sentinels_when_both_missing() {
        let pack = make_pack("fr", &[], &[]);
        let merged = merge_with(
            &make_logic(),
            &pack,
            None,
            &MergeOptions { strict: true },
        );
        let a = merged.scenario.scene("a").unwrap();
        assert_eq!(a.text, "[MISSING TEXT: a]");
        assert_eq!(a.choices[0].text, "[MISSING CHOICE: c1]");
        assert_eq!(
            merged.report.missing_keys,
            vec![
                "Scene 'a' text".to_string(),
                "Scene 'a' choice 'c1'".to_string(),
                "Scene 'b' text".to_string(),
            ]
        );
    }

    #[test]
    fn unset_next_scene_becomes_end() {
        let mut logic = make_logic();
        logic.scenes["a"].choices[0].next_scene_id = None;
        let merged = merge(&logic, &ContentPack::empty("en"), None);
        assert_eq!(merged.scenario.scene("a").unwrap().choices[0].next_scene_id, "END");
    }

    #[test]
    fn passive_text_resolution_order() {
        let mut logic = make_logic();
        logic.scenes["a"].passive_checks = vec![PassiveCheck {
            id: "chk".to_string(),
            voice_id: "perception".to_string(),
            difficulty: 8,
            passive_text: Some("logic default".to_string()),
            passive_fail_text: Some("logic fail".to_string()),
            on_success: CheckBranch::default(),
            on_fail: CheckBranch::default(),
        }];

        let mut en = make_pack("en", &[("a", "Hello")], &[("a", "c1", "Go")]);
        en.scenes["a"].passive_checks.insert(
            "chk".to_string(),
            PassiveCheckContent {
                passive_text: Some("english".to_string()),
                passive_fail_text: None,
            },
        );
        let de = make_pack("de", &[("a", "Hallo")], &[("a", "c1", "Los")]);

        let merged = merge(&logic, &de, Some(&en));
        let check = &merged.scenario.scene("a").unwrap().passive_checks[0];
        assert_eq!(check.passive_text.as_deref(), Some("english"));
        assert_eq!(check.passive_fail_text.as_deref(), Some("logic fail"));
        assert!(merged
            .report
            .fallback_keys
            .contains(&"Scene 'a' passive 'chk' text".to_string()));
    }

    #[test]
    fn merge_is_deterministic() {
        let pack = make_pack("en", &[("a", "Hello"), ("b", "Bye")], &[("a", "c1", "Go")]);
        let first = merge(&make_logic(), &pack, None);
        let second = merge(&make_logic(), &pack, None);
        assert_eq!(
            ron::to_string(&first.scenario).unwrap(),
            ron::to_string(&second.scenario).unwrap()
        );
        assert_eq!(first.report, second.report);
    }
}
