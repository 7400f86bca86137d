use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;

/// Remaining spell slots keyed by spell level (`"1"`..`"9"`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpellSlots(pub BTreeMap<String, i32>);

impl SpellSlots {
    pub fn has_slot(&self, level: &str) -> bool {
        self.0.get(level).is_some_and(|n| *n > 0)
    }

    /// Spends one slot. Returns false when none are left at that level.
    pub fn use_slot(&mut self, level: &str) -> bool {
        if !self.has_slot(level) {
            return false;
        }
        self.0.entry(level.to_string()).and_modify(|n| *n -= 1);
        true
    }

    /// Gives one slot back. Levels the character never had stay absent.
    pub fn restore_slot(&mut self, level: &str) -> bool {
        match self.0.get_mut(level) {
            Some(n) => {
                *n = n.saturating_add(1);
                true
            }
            None => false,
        }
    }

    pub fn has_negative(&self) -> bool {
        self.0.values().any(|n| *n < 0)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct CharacterRow {
    pub id: i64,
    pub name: String,
    pub user_id: i64,
    pub character_class_id: i64,
    pub spell_slots: Json<SpellSlots>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewCharacter {
    pub name: String,
    pub user_id: i64,
    pub character_class_id: i64,
    pub spell_slots: SpellSlots,
}

/// Fields left as `None` keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct CharacterChanges {
    pub name: Option<String>,
    pub character_class_id: Option<i64>,
    pub spell_slots: Option<SpellSlots>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots() -> SpellSlots {
        SpellSlots(BTreeMap::from([("1".to_string(), 2), ("2".to_string(), 0)]))
    }

    #[test]
    fn use_slot_decrements_until_empty() {
        let mut s = slots();
        assert!(s.has_slot("1"));
        assert!(s.use_slot("1"));
        assert!(s.use_slot("1"));
        assert!(!s.use_slot("1"));
        assert!(!s.has_slot("1"));
        assert_eq!(s.0["1"], 0);
    }

    #[test]
    fn empty_and_unknown_levels_have_no_slot() {
        let mut s = slots();
        assert!(!s.has_slot("2"));
        assert!(!s.has_slot("9"));
        assert!(!s.use_slot("9"));
    }

    #[test]
    fn restore_only_known_levels() {
        let mut s = slots();
        assert!(s.restore_slot("2"));
        assert_eq!(s.0["2"], 1);
        assert!(!s.restore_slot("5"));
        assert!(!s.0.contains_key("5"));
    }

    #[test]
    fn restore_saturates() {
        let mut s = SpellSlots(BTreeMap::from([("1".to_string(), i32::MAX)]));
        assert!(s.restore_slot("1"));
        assert_eq!(s.0["1"], i32::MAX);
    }

    #[test]
    fn serializes_as_plain_map() {
        let json = serde_json::to_value(slots()).unwrap();
        assert_eq!(json, serde_json::json!({"1": 2, "2": 0}));
    }
}
