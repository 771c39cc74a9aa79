/// World-mutating actions attached to scenes, choices and check branches.
///
/// Authored as `(type: "add_flag", payload: { "met_clerk": true })`. The
/// payload is decoded per kind; an unknown kind or a payload of the wrong
/// shape degrades to [`Action::Unknown`] so a bad action never blocks
/// loading the rest of the scenario.
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Where a character stands with the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterStatus {
    #[default]
    Unknown,
    Met,
    Ally,
    Enemy,
    Deceased,
}

impl CharacterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CharacterStatus::Unknown => "unknown",
            CharacterStatus::Met => "met",
            CharacterStatus::Ally => "ally",
            CharacterStatus::Enemy => "enemy",
            CharacterStatus::Deceased => "deceased",
        }
    }
}

impl std::str::FromStr for CharacterStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(CharacterStatus::Unknown),
            "met" => Ok(CharacterStatus::Met),
            "ally" => Ok(CharacterStatus::Ally),
            "enemy" => Ok(CharacterStatus::Enemy),
            "deceased" => Ok(CharacterStatus::Deceased),
            other => Err(format!("unknown character status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Action {
    GrantEvidence(String),
    AddFlag(BTreeMap<String, bool>),
    ModifyRelationship {
        character_id: String,
        amount: i32,
    },
    SetCharacterStatus {
        character_id: String,
        status: CharacterStatus,
    },
    SetQuestStage {
        quest_id: String,
        stage: String,
    },
    UnlockPoint(String),
    UnlockGroup(String),
    SetStat {
        id: String,
        value: i32,
    },
    AddHeat(i32),
    AddTension(i32),
    GrantInfluencePoint(i32),
    StartBattle {
        scenario_id: String,
        deck_id: String,
    },
    StartInterrogation {
        character_id: String,
        topic_id: String,
        /// Empty when the interrogation has no lockout scene.
        lockout_scene_id: String,
    },
    EndInterrogation,
    /// Anything the engine does not understand; executing it is a no-op.
    Unknown {
        kind: String,
    },
}

impl Action {
    /// The authored `type` tag of this action.
    pub fn kind(&self) -> &str {
        match self {
            Action::GrantEvidence(_) => "grant_evidence",
            Action::AddFlag(_) => "add_flag",
            Action::ModifyRelationship { .. } => "modify_relationship",
            Action::SetCharacterStatus { .. } => "set_character_status",
            Action::SetQuestStage { .. } => "set_quest_stage",
            Action::UnlockPoint(_) => "unlock_point",
            Action::UnlockGroup(_) => "unlock_group",
            Action::SetStat { .. } => "set_stat",
            Action::AddHeat(_) => "add_heat",
            Action::AddTension(_) => "add_tension",
            Action::GrantInfluencePoint(_) => "grant_influence_point",
            Action::StartBattle { .. } => "start_battle",
            Action::StartInterrogation { .. } => "start_interrogation",
            Action::EndInterrogation => "end_interrogation",
            Action::Unknown { kind } => kind,
        }
    }

    /// Convenience for a single `add_flag` entry.
    pub fn flag(key: &str, value: bool) -> Self {
        let mut flags = BTreeMap::new();
        flags.insert(key.to_string(), value);
        Action::AddFlag(flags)
    }
}

/// The on-disk shape before the payload is decoded.
#[derive(Debug, Clone, Deserialize)]
struct RawAction {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default = "unit_payload")]
    payload: ron::Value,
}

fn unit_payload() -> ron::Value {
    ron::Value::Unit
}

#[derive(Deserialize)]
struct CharacterAmount {
    character_id: String,
    amount: i32,
}

#[derive(Deserialize)]
struct CharacterStatusChange {
    character_id: String,
    status: String,
}

#[derive(Deserialize)]
struct QuestStage {
    quest_id: String,
    stage: String,
}

#[derive(Deserialize)]
struct StatValue {
    id: String,
    value: i32,
}

#[derive(Deserialize)]
struct Battle {
    scenario_id: String,
    #[serde(alias = "deck_type")]
    deck_id: String,
}

#[derive(Deserialize)]
struct Interrogation {
    character_id: String,
    topic_id: String,
    #[serde(default)]
    lockout_scene_id: String,
}

impl From<RawAction> for Action {
    fn from(raw: RawAction) -> Self {
        let RawAction { kind, payload } = raw;
        let decoded = match kind.as_str() {
            "grant_evidence" => payload.into_rust::<String>().map(Action::GrantEvidence),
            "add_flag" => payload
                .into_rust::<BTreeMap<String, bool>>()
                .map(Action::AddFlag),
            "modify_relationship" => payload.into_rust::<CharacterAmount>().map(|p| {
                Action::ModifyRelationship {
                    character_id: p.character_id,
                    amount: p.amount,
                }
            }),
            "set_character_status" => match payload.into_rust::<CharacterStatusChange>() {
                Ok(p) => match p.status.parse::<CharacterStatus>() {
                    Ok(status) => Ok(Action::SetCharacterStatus {
                        character_id: p.character_id,
                        status,
                    }),
                    Err(reason) => {
                        log::warn!("action '{}': {}", kind, reason);
                        return Action::Unknown { kind };
                    }
                },
                Err(e) => Err(e),
            },
            "set_quest_stage" => payload
                .into_rust::<QuestStage>()
                .map(|p| Action::SetQuestStage {
                    quest_id: p.quest_id,
                    stage: p.stage,
                }),
            "unlock_point" => payload.into_rust::<String>().map(Action::UnlockPoint),
            "unlock_group" => payload.into_rust::<String>().map(Action::UnlockGroup),
            "set_stat" => payload.into_rust::<StatValue>().map(|p| Action::SetStat {
                id: p.id,
                value: p.value,
            }),
            "add_heat" => payload.into_rust::<i32>().map(Action::AddHeat),
            "add_tension" => payload.into_rust::<i32>().map(Action::AddTension),
            "grant_influence_point" => match payload {
                ron::Value::Unit => Ok(Action::GrantInfluencePoint(1)),
                other => other.into_rust::<i32>().map(Action::GrantInfluencePoint),
            },
            "start_battle" => payload.into_rust::<Battle>().map(|p| Action::StartBattle {
                scenario_id: p.scenario_id,
                deck_id: p.deck_id,
            }),
            "start_interrogation" => {
                payload
                    .into_rust::<Interrogation>()
                    .map(|p| Action::StartInterrogation {
                        character_id: p.character_id,
                        topic_id: p.topic_id,
                        lockout_scene_id: p.lockout_scene_id,
                    })
            }
            "end_interrogation" => Ok(Action::EndInterrogation),
            _ => return Action::Unknown { kind },
        };

        match decoded {
            Ok(action) => action,
            Err(e) => {
                log::warn!("action '{}' has an unreadable payload: {}", kind, e);
                Action::Unknown { kind }
            }
        }
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawAction::deserialize(deserializer).map(Action::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Action {
        crate::schema::ron_options().from_str(input).unwrap()
    }

    #[test]
    fn decode_flag_map() {
        let action = parse(r#"(type: "add_flag", payload: { "met_clerk": true, "angry": false })"#);
        match action {
            Action::AddFlag(flags) => {
                assert_eq!(flags.get("met_clerk"), Some(&true));
                assert_eq!(flags.get("angry"), Some(&false));
            }
            other => panic!("expected AddFlag, got {:?}", other),
        }
    }

    #[test]
    fn decode_struct_payloads() {
        assert_eq!(
            parse(r#"(type: "set_quest_stage", payload: (quest_id: "case", stage: "talked"))"#),
            Action::SetQuestStage {
                quest_id: "case".to_string(),
                stage: "talked".to_string(),
            }
        );
        assert_eq!(
            parse(r#"(type: "start_battle", payload: (scenario_id: "duel", deck_type: "brawler"))"#),
            Action::StartBattle {
                scenario_id: "duel".to_string(),
                deck_id: "brawler".to_string(),
            }
        );
    }

    #[test]
    fn decode_character_status() {
        assert_eq!(
            parse(r#"(type: "set_character_status", payload: (character_id: "clerk", status: "ally"))"#),
            Action::SetCharacterStatus {
                character_id: "clerk".to_string(),
                status: CharacterStatus::Ally,
            }
        );
        assert!(matches!(
            parse(r#"(type: "set_character_status", payload: (character_id: "clerk", status: "bestie"))"#),
            Action::Unknown { .. }
        ));
    }

    #[test]
    fn decode_scalar_payloads() {
        assert_eq!(parse(r#"(type: "add_heat", payload: 2)"#), Action::AddHeat(2));
        assert_eq!(
            parse(r#"(type: "unlock_point", payload: "harbor")"#),
            Action::UnlockPoint("harbor".to_string())
        );
        assert_eq!(
            parse(r#"(type: "grant_influence_point")"#),
            Action::GrantInfluencePoint(1)
        );
        assert_eq!(parse(r#"(type: "end_interrogation")"#), Action::EndInterrogation);
    }

    #[test]
    fn unknown_kind_degrades() {
        let action = parse(r#"(type: "summon_dragon", payload: "big")"#);
        assert_eq!(
            action,
            Action::Unknown {
                kind: "summon_dragon".to_string()
            }
        );
        assert_eq!(action.kind(), "summon_dragon");
    }

    #[test]
    fn malformed_payload_degrades() {
        let action = parse(r#"(type: "add_heat", payload: "lots")"#);
        assert_eq!(
            action,
            Action::Unknown {
                kind: "add_heat".to_string()
            }
        );
    }

    #[test]
    fn interrogation_lockout_is_optional() {
        let action = parse(
            r#"(type: "start_interrogation", payload: (character_id: "clerk", topic_id: "alibi"))"#,
        );
        match action {
            Action::StartInterrogation {
                lockout_scene_id, ..
            } => assert!(lockout_scene_id.is_empty()),
            other => panic!("expected StartInterrogation, got {:?}", other),
        }
    }
}
