use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::repo_types::{CharacterChanges, CharacterRow, SpellSlots};
use crate::error::AppError;

pub const MAX_NAME_LEN: usize = 255;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateCharacterRequest {
    pub name: String,
    pub character_class_id: i64,
    #[serde(default)]
    pub spell_slots: Option<SpellSlots>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateCharacterRequest {
    pub name: Option<String>,
    pub character_class_id: Option<i64>,
    pub spell_slots: Option<SpellSlots>,
}

fn check_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::validation("name must not be empty"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::validation(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

fn check_class(id: i64) -> Result<i64, AppError> {
    if id < 1 {
        return Err(AppError::validation("characterClassId must be a positive integer"));
    }
    Ok(id)
}

fn check_slots(slots: SpellSlots) -> Result<SpellSlots, AppError> {
    if slots.has_negative() {
        return Err(AppError::validation("spellSlots must not be negative"));
    }
    Ok(slots)
}

impl CreateCharacterRequest {
    /// Trimmed name, class id and slots, or a 400.
    pub fn validate(self) -> Result<(String, i64, SpellSlots), AppError> {
        Ok((
            check_name(&self.name)?,
            check_class(self.character_class_id)?,
            check_slots(self.spell_slots.unwrap_or_default())?,
        ))
    }
}

impl UpdateCharacterRequest {
    pub fn validate(self) -> Result<CharacterChanges, AppError> {
        Ok(CharacterChanges {
            name: self.name.as_deref().map(check_name).transpose()?,
            character_class_id: self.character_class_id.map(check_class).transpose()?,
            spell_slots: self.spell_slots.map(check_slots).transpose()?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterView {
    pub id: i64,
    pub name: String,
    pub character_class_id: i64,
    pub spell_slots: SpellSlots,
    pub spells: Vec<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl CharacterView {
    pub fn new(row: CharacterRow, spells: Vec<i64>) -> Self {
        Self {
            id: row.id,
            name: row.name,
            character_class_id: row.character_class_id,
            spell_slots: row.spell_slots.0,
            spells,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Character fields with a `message` alongside them, as create and update
/// return it.
#[derive(Debug, Serialize)]
pub struct CharacterWithMessage {
    #[serde(flatten)]
    pub character: CharacterView,
    pub message: &'static str,
}

/// `{message, character}`, as learn and forget return it.
#[derive(Debug, Serialize)]
pub struct CharacterResponse {
    pub message: &'static str,
    pub character: CharacterView,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_trims_and_defaults_slots() {
        let req: CreateCharacterRequest =
            serde_json::from_str(r#"{"name": "  Elminster ", "characterClassId": 9}"#).unwrap();
        let (name, class_id, slots) = req.validate().unwrap();
        assert_eq!(name, "Elminster");
        assert_eq!(class_id, 9);
        assert_eq!(slots, SpellSlots::default());
    }

    #[test]
    fn create_rejects_bad_input() {
        for body in [
            r#"{"name": "   ", "characterClassId": 9}"#,
            r#"{"name": "A", "characterClassId": 0}"#,
            r#"{"name": "A", "characterClassId": 9, "spellSlots": {"1": -1}}"#,
        ] {
            let req: CreateCharacterRequest = serde_json::from_str(body).unwrap();
            assert!(req.validate().is_err(), "{body}");
        }
        assert!(serde_json::from_str::<CreateCharacterRequest>(
            r#"{"name": "A", "characterClassId": 9, "userId": 2}"#
        )
        .is_err());
    }

    #[test]
    fn update_keeps_absent_fields() {
        let req: UpdateCharacterRequest =
            serde_json::from_str(r#"{"spellSlots": {"1": 4}}"#).unwrap();
        let changes = req.validate().unwrap();
        assert!(changes.name.is_none());
        assert!(changes.character_class_id.is_none());
        assert_eq!(changes.spell_slots.unwrap().0["1"], 4);
    }

    fn view() -> CharacterView {
        let now = OffsetDateTime::now_utc();
        CharacterView {
            id: 1,
            name: "Elminster".into(),
            character_class_id: 9,
            spell_slots: SpellSlots::default(),
            spells: vec![3],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn create_and_update_responses_are_flat() {
        let json = serde_json::to_value(CharacterWithMessage {
            character: view(),
            message: "Персонаж успешно создан",
        })
        .unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["characterClassId"], 9);
        assert_eq!(json["message"], "Персонаж успешно создан");
        assert!(json.get("character").is_none());
    }

    #[test]
    fn spell_responses_nest_the_character() {
        let json = serde_json::to_value(CharacterResponse {
            message: "Заклинание успешно изучено",
            character: view(),
        })
        .unwrap();
        assert_eq!(json["character"]["spells"], serde_json::json!([3]));
        assert!(json.get("id").is_none());
    }

    #[test]
    fn update_validates_present_fields() {
        let req = UpdateCharacterRequest {
            name: Some("".into()),
            ..Default::default()
        };
        assert!(req.validate().is_err());
    }
}
