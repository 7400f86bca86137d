use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{types::Json, PgPool};

use super::repo_types::{CharacterChanges, CharacterRow, NewCharacter, SpellSlots};
use crate::spells::{self, dto::Language, repo_types::SpellRow};

/// Persistence of characters, their learned spells, and the catalog lookups
/// character operations depend on. Every character query is scoped to its
/// owner.
#[async_trait]
pub trait CharacterStore: Send + Sync {
    async fn class_exists(&self, class_id: i64) -> anyhow::Result<bool>;

    async fn spell_exists(&self, spell_id: i64) -> anyhow::Result<bool>;

    async fn insert(&self, new: NewCharacter) -> anyhow::Result<CharacterRow>;

    async fn list_by_user(&self, user_id: i64) -> anyhow::Result<Vec<CharacterRow>>;

    /// A character, only if `user_id` owns it.
    async fn find_owned(
        &self,
        character_id: i64,
        user_id: i64,
    ) -> anyhow::Result<Option<CharacterRow>>;

    async fn update_owned(
        &self,
        character_id: i64,
        user_id: i64,
        changes: CharacterChanges,
    ) -> anyhow::Result<Option<CharacterRow>>;

    /// Writes `new` only if the stored slots still equal `expected`.
    async fn swap_slots(
        &self,
        character_id: i64,
        user_id: i64,
        expected: &SpellSlots,
        new: &SpellSlots,
    ) -> anyhow::Result<Option<CharacterRow>>;

    async fn delete_owned(&self, character_id: i64, user_id: i64) -> anyhow::Result<bool>;

    /// Learned spell ids per character, each list ascending.
    async fn spell_ids(&self, character_ids: &[i64]) -> anyhow::Result<HashMap<i64, Vec<i64>>>;

    /// No-op when already learned.
    async fn learn(&self, character_id: i64, spell_id: i64) -> anyhow::Result<()>;

    /// No-op when not learned.
    async fn forget(&self, character_id: i64, spell_id: i64) -> anyhow::Result<()>;

    /// Learned spells in one language, sorted by name.
    async fn learned_spells(
        &self,
        character_id: i64,
        language: Language,
    ) -> anyhow::Result<Vec<SpellRow>>;
}

const CHARACTER_COLUMNS: &str =
    "id, name, user_id, character_class_id, spell_slots, created_at, updated_at";

#[derive(Clone)]
pub struct PgCharacterStore {
    db: PgPool,
}

impl PgCharacterStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CharacterStore for PgCharacterStore {
    async fn class_exists(&self, class_id: i64) -> anyhow::Result<bool> {
        spells::repo::class_exists(&self.db, class_id).await
    }

    async fn spell_exists(&self, spell_id: i64) -> anyhow::Result<bool> {
        spells::repo::exists(&self.db, spell_id).await
    }

    async fn insert(&self, new: NewCharacter) -> anyhow::Result<CharacterRow> {
        let row = sqlx::query_as::<_, CharacterRow>(&format!(
            r#"
            INSERT INTO characters (name, user_id, character_class_id, spell_slots)
            VALUES ($1, $2, $3, $4)
            RETURNING {CHARACTER_COLUMNS}
            "#
        ))
        .bind(&new.name)
        .bind(new.user_id)
        .bind(new.character_class_id)
        .bind(Json(&new.spell_slots))
        .fetch_one(&self.db)
        .await
        .context("insert character")?;
        Ok(row)
    }

    async fn list_by_user(&self, user_id: i64) -> anyhow::Result<Vec<CharacterRow>> {
        let rows = sqlx::query_as::<_, CharacterRow>(&format!(
            r#"
            SELECT {CHARACTER_COLUMNS}
              FROM characters
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .context("list characters")?;
        Ok(rows)
    }

    async fn find_owned(
        &self,
        character_id: i64,
        user_id: i64,
    ) -> anyhow::Result<Option<CharacterRow>> {
        let row = sqlx::query_as::<_, CharacterRow>(&format!(
            "SELECT {CHARACTER_COLUMNS} FROM characters WHERE id = $1 AND user_id = $2"
        ))
        .bind(character_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .context("find character")?;
        Ok(row)
    }

    async fn update_owned(
        &self,
        character_id: i64,
        user_id: i64,
        changes: CharacterChanges,
    ) -> anyhow::Result<Option<CharacterRow>> {
        let row = sqlx::query_as::<_, CharacterRow>(&format!(
            r#"
            UPDATE characters
               SET name               = COALESCE($3, name),
                   character_class_id = COALESCE($4, character_class_id),
                   spell_slots        = COALESCE($5, spell_slots),
                   updated_at         = now()
             WHERE id = $1 AND user_id = $2
            RETURNING {CHARACTER_COLUMNS}
            "#
        ))
        .bind(character_id)
        .bind(user_id)
        .bind(changes.name)
        .bind(changes.character_class_id)
        .bind(changes.spell_slots.map(Json))
        .fetch_optional(&self.db)
        .await
        .context("update character")?;
        Ok(row)
    }

    async fn swap_slots(
        &self,
        character_id: i64,
        user_id: i64,
        expected: &SpellSlots,
        new: &SpellSlots,
    ) -> anyhow::Result<Option<CharacterRow>> {
        let row = sqlx::query_as::<_, CharacterRow>(&format!(
            r#"
            UPDATE characters
               SET spell_slots = $4, updated_at = now()
             WHERE id = $1 AND user_id = $2 AND spell_slots = $3
            RETURNING {CHARACTER_COLUMNS}
            "#
        ))
        .bind(character_id)
        .bind(user_id)
        .bind(Json(expected))
        .bind(Json(new))
        .fetch_optional(&self.db)
        .await
        .context("swap spell slots")?;
        Ok(row)
    }

    async fn delete_owned(&self, character_id: i64, user_id: i64) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM characters WHERE id = $1 AND user_id = $2")
            .bind(character_id)
            .bind(user_id)
            .execute(&self.db)
            .await
            .context("delete character")?;
        Ok(res.rows_affected() == 1)
    }

    async fn spell_ids(&self, character_ids: &[i64]) -> anyhow::Result<HashMap<i64, Vec<i64>>> {
        if character_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let pairs = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT character_id, spell_id
              FROM character_spells
             WHERE character_id = ANY($1)
             ORDER BY character_id, spell_id
            "#,
        )
        .bind(character_ids)
        .fetch_all(&self.db)
        .await
        .context("character spell ids")?;

        let mut out: HashMap<i64, Vec<i64>> = HashMap::new();
        for (character_id, spell_id) in pairs {
            out.entry(character_id).or_default().push(spell_id);
        }
        Ok(out)
    }

    async fn learn(&self, character_id: i64, spell_id: i64) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO character_spells (character_id, spell_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(character_id)
        .bind(spell_id)
        .execute(&self.db)
        .await
        .context("learn spell")?;
        Ok(())
    }

    async fn forget(&self, character_id: i64, spell_id: i64) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM character_spells WHERE character_id = $1 AND spell_id = $2")
            .bind(character_id)
            .bind(spell_id)
            .execute(&self.db)
            .await
            .context("forget spell")?;
        Ok(())
    }

    async fn learned_spells(
        &self,
        character_id: i64,
        language: Language,
    ) -> anyhow::Result<Vec<SpellRow>> {
        spells::repo::learned_by_character(&self.db, character_id, language).await
    }
}
