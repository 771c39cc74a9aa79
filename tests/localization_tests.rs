/// Merger integration tests over RON-authored logic and packs.
use scenario_engine::core::localization::{merge, merge_with, MergeOptions};
use scenario_engine::schema::content::ContentPack;
use scenario_engine::schema::logic::ScenarioLogic;
use scenario_engine::schema::predicate::Predicate;

fn two_scene_logic() -> ScenarioLogic {
    ScenarioLogic::parse_ron(
        r#"(
            id: "s",
            initial_scene_id: "a",
            scenes: {
                "a": (choices: [(id: "c1", next_scene_id: "b")]),
                "b": (),
            },
        )"#,
    )
    .unwrap()
}

fn single_scene_logic() -> ScenarioLogic {
    ScenarioLogic::parse_ron(
        r#"(
            id: "s",
            initial_scene_id: "a",
            scenes: {
                "a": (choices: [(id: "c1", next_scene_id: "b")]),
            },
        )"#,
    )
    .unwrap()
}

#[test]
fn complete_pack_supplies_all_text() {
    let content = ContentPack::parse_ron(
        r#"(locale: "en", scenes: { "a": (text: "Hi", choices: { "c1": "Go" }) })"#,
    )
    .unwrap();
    let merged = merge(&single_scene_logic(), &content, None);
    let a = merged.scenario.scene("a").unwrap();
    assert_eq!(a.text, "Hi");
    assert_eq!(a.choices[0].text, "Go");
    assert_eq!(a.choices[0].next_scene_id, "b");
    assert!(merged.report.is_complete());
}

#[test]
fn empty_primary_text_uses_fallback() {
    let content = ContentPack::parse_ron(r#"(locale: "de", scenes: { "a": (text: "") })"#).unwrap();
    let fallback = ContentPack::parse_ron(r#"(locale: "en", scenes: { "a": (text: "Hi") })"#).unwrap();
    let merged = merge(&single_scene_logic(), &content, Some(&fallback));
    assert_eq!(merged.scenario.scene("a").unwrap().text, "Hi");
    assert_eq!(merged.report.fallback_keys, vec!["Scene 'a' text".to_string()]);
}

#[test]
fn fallback_choice_text_is_recorded() {
    let _ = env_logger::builder().is_test(true).try_init();
    let content = ContentPack::parse_ron(r#"(locale: "ru", scenes: { "a": (text: "Privet") })"#).unwrap();
    let fallback = ContentPack::parse_ron(
        r#"(locale: "en", scenes: { "a": (text: "Hi", choices: { "c1": "Go" }) })"#,
    )
    .unwrap();
    let merged = merge(&single_scene_logic(), &content, Some(&fallback));
    let a = merged.scenario.scene("a").unwrap();
    assert_eq!(a.text, "Privet");
    assert_eq!(a.choices[0].text, "Go");
    assert_eq!(
        merged.report.fallback_keys,
        vec!["Scene 'a' choice 'c1'".to_string()]
    );
    assert!(merged.report.missing_keys.is_empty());
}

#[test]
fn no_text_anywhere_yields_sentinel() {
    let content = ContentPack::parse_ron(r#"(locale: "fr", scenes: {})"#).unwrap();
    let merged = merge_with(
        &single_scene_logic(),
        &content,
        None,
        &MergeOptions { strict: false },
    );
    let a = merged.scenario.scene("a").unwrap();
    assert!(a.text.contains("[MISSING TEXT: a]"));
    assert_eq!(a.choices[0].text, "[MISSING CHOICE: c1]");
    assert!(!merged.report.is_complete());
}

#[test]
fn merge_output_is_byte_identical_across_calls() {
    let logic = two_scene_logic();
    let content = ContentPack::parse_ron(
        r#"(locale: "de", scenes: { "a": (text: "Hallo", choices: { "c1": "Los" }) })"#,
    )
    .unwrap();
    let fallback = ContentPack::parse_ron(
        r#"(locale: "en", scenes: { "a": (text: "Hi"), "b": (text: "Bye") })"#,
    )
    .unwrap();

    let first = merge(&logic, &content, Some(&fallback));
    let second = merge(&logic, &content, Some(&fallback));
    assert_eq!(
        ron::to_string(&first.scenario).unwrap(),
        ron::to_string(&second.scenario).unwrap()
    );
    assert_eq!(first.report, second.report);
}

#[test]
fn scene_order_survives_merge() {
    let logic = ScenarioLogic::parse_ron(
        r#"(id: "s", initial_scene_id: "z", scenes: { "z": (), "m": (), "a": () })"#,
    )
    .unwrap();
    let merged = merge(&logic, &ContentPack::empty("en"), None);
    let order: Vec<&str> = merged.scenario.scenes.keys().map(|k| k.as_str()).collect();
    assert_eq!(order, vec!["z", "m", "a"]);
}

#[test]
fn closure_conditions_still_render_deterministically() {
    let mut logic = two_scene_logic();
    logic.scenes["a"].choices[0].condition = Some(Predicate::closure(|_, _| Ok(true)));
    let content = ContentPack::empty("en");

    let first = ron::to_string(&merge(&logic, &content, None).scenario).unwrap();
    let second = ron::to_string(&merge(&logic, &content, None).scenario).unwrap();
    assert_eq!(first, second);
}
