/// Static checks over loaded content: broken scene references and
/// translation gaps between locales.
use std::collections::BTreeSet;
use std::fmt;

use crate::core::registry::{Locale, ScenarioBundle, ScenarioRegistry};
use crate::schema::content::ContentPack;
use crate::schema::logic::{ScenarioLogic, END_SCENE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditIssue {
    UnknownInitialScene {
        scenario_id: String,
        scene_id: String,
    },
    DanglingReference {
        scenario_id: String,
        /// Where the reference lives, e.g. `intro/choice:ask`.
        origin: String,
        target: String,
    },
    MissingPack {
        scenario_id: String,
        locale: Locale,
    },
    /// Present in the reference locale, absent here.
    MissingKey {
        scenario_id: String,
        locale: Locale,
        key: String,
    },
    /// Present here, absent in the reference locale.
    ExtraKey {
        scenario_id: String,
        locale: Locale,
        key: String,
    },
}

impl AuditIssue {
    /// Errors break play; everything else is a translation gap.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            AuditIssue::UnknownInitialScene { .. } | AuditIssue::DanglingReference { .. }
        )
    }
}

impl fmt::Display for AuditIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditIssue::UnknownInitialScene {
                scenario_id,
                scene_id,
            } => write!(f, "[{}] initial scene '{}' does not exist", scenario_id, scene_id),
            AuditIssue::DanglingReference {
                scenario_id,
                origin,
                target,
            } => write!(f, "[{}] {} points to unknown scene '{}'", scenario_id, origin, target),
            AuditIssue::MissingPack {
                scenario_id,
                locale,
            } => write!(f, "[{}] no '{}' content pack", scenario_id, locale),
            AuditIssue::MissingKey {
                scenario_id,
                locale,
                key,
            } => write!(f, "[{}] '{}' is missing {}", scenario_id, locale, key),
            AuditIssue::ExtraKey {
                scenario_id,
                locale,
                key,
            } => write!(f, "[{}] '{}' has extra {}", scenario_id, locale, key),
        }
    }
}

/// Scene references that point nowhere. `END` is always valid.
pub fn dangling_references(logic: &ScenarioLogic) -> Vec<AuditIssue> {
    let mut issues = Vec::new();
    if !logic.scenes.contains_key(&logic.initial_scene_id) {
        issues.push(AuditIssue::UnknownInitialScene {
            scenario_id: logic.id.clone(),
            scene_id: logic.initial_scene_id.clone(),
        });
    }

    let mut check = |origin: String, target: Option<&str>| {
        let Some(target) = target.filter(|t| !t.is_empty()) else {
            return;
        };
        if target != END_SCENE && !logic.scenes.contains_key(target) {
            issues.push(AuditIssue::DanglingReference {
                scenario_id: logic.id.clone(),
                origin,
                target: target.to_string(),
            });
        }
    };

    for (scene_id, scene) in &logic.scenes {
        check(format!("{}/next", scene_id), scene.next_scene_id.as_deref());
        for choice in &scene.choices {
            let origin = format!("{}/choice:{}", scene_id, choice.id);
            check(origin.clone(), choice.next_scene_id.as_deref());
            if let Some(skill) = &choice.skill_check {
                check(
                    format!("{}/success", origin),
                    skill.on_success.next_scene_id.as_deref(),
                );
                check(
                    format!("{}/fail", origin),
                    skill.on_fail.next_scene_id.as_deref(),
                );
            }
        }
        for passive in &scene.passive_checks {
            let origin = format!("{}/passive:{}", scene_id, passive.id);
            check(
                format!("{}/success", origin),
                passive.on_success.next_scene_id.as_deref(),
            );
            check(
                format!("{}/fail", origin),
                passive.on_fail.next_scene_id.as_deref(),
            );
        }
    }
    issues
}

/// Translatable keys a pack provides, as `scene.text`, `scene.choice.<id>`
/// and `scene.passive.<id>[.fail]`.
pub fn pack_keys(pack: &ContentPack) -> BTreeSet<String> {
    let mut keys = BTreeSet::new();
    for (scene_id, scene) in &pack.scenes {
        if scene.text().is_some() {
            keys.insert(format!("{}.text", scene_id));
        }
        for choice_id in scene.choices.keys() {
            if scene.choice(choice_id).is_some() {
                keys.insert(format!("{}.choice.{}", scene_id, choice_id));
            }
        }
        for check_id in scene.passive_checks.keys() {
            if scene.passive_text(check_id).is_some() {
                keys.insert(format!("{}.passive.{}", scene_id, check_id));
            }
            if scene.passive_fail_text(check_id).is_some() {
                keys.insert(format!("{}.passive.{}.fail", scene_id, check_id));
            }
        }
    }
    keys
}

/// Compare every other locale's pack against `reference`.
pub fn locale_parity(bundle: &ScenarioBundle, reference: Locale) -> Vec<AuditIssue> {
    let scenario_id = &bundle.logic.id;
    let Some(reference_pack) = bundle.pack(reference) else {
        return vec![AuditIssue::MissingPack {
            scenario_id: scenario_id.clone(),
            locale: reference,
        }];
    };
    let expected = pack_keys(reference_pack);

    let mut issues = Vec::new();
    for locale in Locale::ALL.into_iter().filter(|l| *l != reference) {
        let Some(pack) = bundle.pack(locale) else {
            issues.push(AuditIssue::MissingPack {
                scenario_id: scenario_id.clone(),
                locale,
            });
            continue;
        };
        let actual = pack_keys(pack);
        for key in expected.difference(&actual) {
            issues.push(AuditIssue::MissingKey {
                scenario_id: scenario_id.clone(),
                locale,
                key: key.clone(),
            });
        }
        for key in actual.difference(&expected) {
            issues.push(AuditIssue::ExtraKey {
                scenario_id: scenario_id.clone(),
                locale,
                key: key.clone(),
            });
        }
    }
    issues
}

/// Every issue across the registry, scenario by scenario.
pub fn audit_registry(registry: &ScenarioRegistry, parity: bool) -> Vec<AuditIssue> {
    let reference = registry.config().default_locale;
    let mut issues = Vec::new();
    for bundle in registry.bundles() {
        issues.extend(dangling_references(&bundle.logic));
        if parity {
            issues.extend(locale_parity(bundle, reference));
        }
    }
    issues
}
