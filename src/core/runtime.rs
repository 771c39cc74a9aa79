/// Predicate evaluation and scene/choice gating.
///
/// A predicate that faults (unknown custom name, host closure returning an
/// error or panicking) is logged and treated as `false`. Gating never
/// fails loudly.
use std::panic::{self, AssertUnwindSafe};

use crate::core::condition::{ConditionContext, Flags, PredicateFault};
use crate::schema::predicate::{Predicate, PredicateFn};
use crate::schema::scenario::{Choice, Scenario, Scene};

/// Evaluate a predicate. Faults yield `false`.
pub fn evaluate(predicate: &Predicate, flags: &Flags, context: &ConditionContext) -> bool {
    match try_evaluate(predicate, flags, context) {
        Ok(result) => result,
        Err(fault) => {
            log::warn!("condition evaluation failed: {}", fault);
            false
        }
    }
}

/// Evaluate a predicate, surfacing faults to the caller.
pub fn try_evaluate(
    predicate: &Predicate,
    flags: &Flags,
    context: &ConditionContext,
) -> Result<bool, PredicateFault> {
    match predicate {
        Predicate::Always => Ok(true),
        Predicate::Never => Ok(false),
        Predicate::FlagSet(key) => Ok(flag(flags, key)),
        Predicate::FlagUnset(key) => Ok(!flag(flags, key)),
        Predicate::FlagEquals { key, value } => Ok(flag(flags, key) == *value),
        Predicate::HasEvidence(id) => Ok(context.has_evidence(id)),
        Predicate::QuestAtStage { quest_id, stage } => {
            Ok(context.is_quest_at_stage(quest_id, stage))
        }
        Predicate::QuestPastStage { quest_id, stage } => {
            Ok(context.is_quest_past_stage(quest_id, stage))
        }
        Predicate::FlagsAtLeast { keys, min } => {
            let set = keys.iter().filter(|k| flag(flags, k)).count();
            Ok(set >= *min)
        }
        Predicate::All(parts) => {
            for part in parts {
                if !try_evaluate(part, flags, context)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Predicate::Any(parts) => {
            for part in parts {
                if try_evaluate(part, flags, context)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Predicate::Not(inner) => Ok(!try_evaluate(inner, flags, context)?),
        Predicate::Custom(name) => {
            let f = context
                .custom(name)
                .ok_or_else(|| PredicateFault::new(format!("unknown predicate '{}'", name)))?;
            call_guarded(f, flags, context)
        }
        Predicate::Closure(f) => call_guarded(f, flags, context),
    }
}

fn flag(flags: &Flags, key: &str) -> bool {
    flags.get(key).copied().unwrap_or(false)
}

fn call_guarded(
    f: &PredicateFn,
    flags: &Flags,
    context: &ConditionContext,
) -> Result<bool, PredicateFault> {
    match panic::catch_unwind(AssertUnwindSafe(|| f.call(flags, context))) {
        Ok(result) => result,
        Err(_) => Err(PredicateFault::new("predicate panicked")),
    }
}

/// True when every precondition of the scene holds. No preconditions means
/// reachable.
pub fn scene_reachable(scene: &Scene, flags: &Flags, context: &ConditionContext) -> bool {
    scene
        .preconditions
        .iter()
        .all(|p| evaluate(p, flags, context))
}

pub fn choice_available(choice: &Choice, flags: &Flags, context: &ConditionContext) -> bool {
    match &choice.condition {
        Some(condition) => evaluate(condition, flags, context),
        None => true,
    }
}

/// Available choices in their original order.
pub fn filter_available_choices<'a>(
    choices: &'a [Choice],
    flags: &Flags,
    context: &ConditionContext,
) -> Vec<&'a Choice> {
    choices
        .iter()
        .filter(|c| choice_available(c, flags, context))
        .collect()
}

/// Pick the scene to show for `candidate`.
///
/// Tries the candidate, then the scenario's initial scene, then the first
/// reachable scene in authoring order. `None` when nothing is reachable.
pub fn resolve_accessible_scene_id<'a>(
    scenario: &'a Scenario,
    candidate: &str,
    flags: &Flags,
    context: &ConditionContext,
) -> Option<&'a str> {
    if let Some((id, scene)) = scenario.scenes.get_key_value(candidate) {
        if scene_reachable(scene, flags, context) {
            return Some(id.as_str());
        }
    }

    if let Some((id, scene)) = scenario.scenes.get_key_value(&scenario.initial_scene_id) {
        if scene_reachable(scene, flags, context) {
            log::warn!(
                "scene '{}' in '{}' is not accessible; recovering to initial scene '{}'",
                candidate,
                scenario.id,
                id
            );
            return Some(id.as_str());
        }
    }

    let fallback = scenario
        .scenes
        .iter()
        .find(|(_, scene)| scene_reachable(scene, flags, context))
        .map(|(id, _)| id.as_str());

    match fallback {
        Some(id) => log::warn!(
            "scene '{}' in '{}' is not accessible; recovering to first reachable scene '{}'",
            candidate,
            scenario.id,
            id
        ),
        None => log::warn!("scenario '{}' has no accessible scene", scenario.id),
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::condition::PredicateLibrary;
    use crate::schema::logic::PresentationMode;
    use indexmap::IndexMap;

    fn make_scene(id: &str, preconditions: Vec<Predicate>) -> Scene {
        Scene {
            id: id.to_string(),
            text: format!("text of {}", id),
            character_id: None,
            background_url: None,
            next_scene_id: None,
            preconditions,
            on_enter: Vec::new(),
            passive_checks: Vec::new(),
            choices: Vec::new(),
        }
    }

    fn make_choice(id: &str, condition: Option<Predicate>) -> Choice {
        Choice {
            id: id.to_string(),
            text: id.to_string(),
            next_scene_id: "END".to_string(),
            kind: None,
            actions: Vec::new(),
            condition,
            skill_check: None,
            tension_delta: None,
        }
    }

    fn make_scenario(scenes: Vec<Scene>, initial: &str) -> Scenario {
        let mut map = IndexMap::new();
        for scene in scenes {
            map.insert(scene.id.clone(), scene);
        }
        Scenario {
            id: "test".to_string(),
            pack_id: "default".to_string(),
            title: "Test".to_string(),
            locale: "en".to_string(),
            default_background_url: None,
            music_url: None,
            initial_scene_id: initial.to_string(),
            mode: PresentationMode::Overlay,
            scenes: map,
        }
    }

    fn flags(pairs: &[(&str, bool)]) -> Flags {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn flag_predicates() {
        let ctx = ConditionContext::new();
        let f = flags(&[("met", true), ("angry", false)]);
        assert!(evaluate(&Predicate::flag("met"), &f, &ctx));
        assert!(!evaluate(&Predicate::flag("angry"), &f, &ctx));
        assert!(!evaluate(&Predicate::flag("absent"), &f, &ctx));
        assert!(evaluate(&Predicate::not_flag("absent"), &f, &ctx));
        assert!(evaluate(
            &Predicate::FlagEquals {
                key: "angry".to_string(),
                value: false
            },
            &f,
            &ctx
        ));
    }

    #[test]
    fn flags_at_least_counts_set_keys() {
        let ctx = ConditionContext::new();
        let f = flags(&[("a", true), ("b", true), ("c", false)]);
        let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert!(evaluate(
            &Predicate::FlagsAtLeast {
                keys: keys.clone(),
                min: 2
            },
            &f,
            &ctx
        ));
        assert!(!evaluate(&Predicate::FlagsAtLeast { keys, min: 3 }, &f, &ctx));
    }

    #[test]
    fn combinators() {
        let ctx = ConditionContext::new().with_evidence(["ledger"]);
        let f = flags(&[("met", true)]);
        let p = Predicate::All(vec![
            Predicate::flag("met"),
            Predicate::HasEvidence("ledger".to_string()),
            Predicate::Not(Box::new(Predicate::Never)),
        ]);
        assert!(evaluate(&p, &f, &ctx));
        let q = Predicate::Any(vec![Predicate::Never, Predicate::flag("nope")]);
        assert!(!evaluate(&q, &f, &ctx));
        assert!(evaluate(&Predicate::All(vec![]), &f, &ctx));
        assert!(!evaluate(&Predicate::Any(vec![]), &f, &ctx));
    }

    #[test]
    fn erroring_closure_is_false() {
        let ctx = ConditionContext::new();
        let p = Predicate::closure(|_, _| Err(PredicateFault::new("boom")));
        assert!(!evaluate(&p, &Flags::default(), &ctx));
        let negated = Predicate::Not(Box::new(Predicate::closure(|_, _| {
            Err(PredicateFault::new("boom"))
        })));
        assert!(!evaluate(&negated, &Flags::default(), &ctx));
    }

    #[test]
    fn panicking_closure_is_false() {
        let ctx = ConditionContext::new();
        let p = Predicate::closure(|_, _| panic!("host bug"));
        assert!(!evaluate(&p, &Flags::default(), &ctx));
    }

    #[test]
    fn custom_predicates_resolve_through_library() {
        let library = PredicateLibrary::new().with("two_flags", |flags, _| {
            Ok(flags.values().filter(|v| **v).count() >= 2)
        });
        let ctx = ConditionContext::new().with_library(library);
        let f = flags(&[("a", true), ("b", true)]);
        assert!(evaluate(&Predicate::Custom("two_flags".to_string()), &f, &ctx));
        assert!(!evaluate(&Predicate::Custom("unknown".to_string()), &f, &ctx));
    }

    #[test]
    fn scene_without_preconditions_is_reachable() {
        let scene = make_scene("a", vec![]);
        assert!(scene_reachable(&scene, &Flags::default(), &ConditionContext::new()));
    }

    #[test]
    fn choice_filter_keeps_order() {
        let choices = vec![
            make_choice("one", None),
            make_choice("two", Some(Predicate::flag("x"))),
            make_choice("three", Some(Predicate::not_flag("x"))),
        ];
        let ctx = ConditionContext::new();
        let ids: Vec<&str> = filter_available_choices(&choices, &Flags::default(), &ctx)
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(ids, vec!["one", "three"]);
        assert!(filter_available_choices(&[], &Flags::default(), &ctx).is_empty());
    }

    #[test]
    fn resolve_prefers_candidate() {
        let scenario = make_scenario(vec![make_scene("a", vec![]), make_scene("b", vec![])], "a");
        let ctx = ConditionContext::new();
        assert_eq!(
            resolve_accessible_scene_id(&scenario, "b", &Flags::default(), &ctx),
            Some("b")
        );
    }

    #[test]
    fn resolve_falls_back_to_initial() {
        let scenario = make_scenario(
            vec![
                make_scene("a", vec![]),
                make_scene("b", vec![Predicate::flag("k")]),
            ],
            "a",
        );
        let ctx = ConditionContext::new();
        assert_eq!(
            resolve_accessible_scene_id(&scenario, "b", &Flags::default(), &ctx),
            Some("a")
        );
        assert_eq!(
            resolve_accessible_scene_id(&scenario, "ghost", &Flags::default(), &ctx),
            Some("a")
        );
    }

    #[test]
    fn resolve_falls_back_to_first_reachable() {
        let scenario = make_scenario(
            vec![
                make_scene("locked", vec![Predicate::Never]),
                make_scene("side", vec![Predicate::flag("k")]),
                make_scene("open", vec![]),
            ],
            "locked",
        );
        let ctx = ConditionContext::new();
        assert_eq!(
            resolve_accessible_scene_id(&scenario, "side", &Flags::default(), &ctx),
            Some("open")
        );
    }

    #[test]
    fn resolve_none_when_nothing_reachable() {
        let scenario = make_scenario(vec![make_scene("a", vec![Predicate::Never])], "a");
        assert_eq!(
            resolve_accessible_scene_id(&scenario, "a", &Flags::default(), &ConditionContext::new()),
            None
        );
    }

    #[test]
    fn any_failing_precondition_blocks_scene() {
        let ctx = ConditionContext::new();
        let scene = make_scene(
            "vault",
            vec![Predicate::Always, Predicate::flag("x"), Predicate::Always],
        );
        assert!(!scene_reachable(&scene, &Flags::default(), &ctx));
        assert!(scene_reachable(&scene, &flags(&[("x", true)]), &ctx));
    }
}
