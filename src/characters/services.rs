use std::sync::Arc;

use axum::extract::FromRef;
use tracing::{info, warn};

use super::{
    dto::CharacterView,
    repo::CharacterStore,
    repo_types::{CharacterChanges, CharacterRow, NewCharacter, SpellSlots},
};
use crate::{
    error::{AppError, AppResult},
    spells::{
        dto::{Language, LocalizedSpell},
        handlers::SPELL_NOT_FOUND,
    },
    state::AppState,
};

pub const CHARACTER_NOT_FOUND: &str = "Персонаж не найден";
pub const CLASS_NOT_FOUND: &str = "Класс персонажа не найден";
pub const NO_SLOT_LEFT: &str = "Нет доступных ячеек заклинаний этого уровня";
pub const NO_SLOT_LEVEL: &str = "У персонажа нет ячеек заклинаний этого уровня";

const SLOT_SWAP_ATTEMPTS: usize = 3;

/// Character operations for one authenticated owner at a time. A character
/// that belongs to someone else is reported exactly like a missing one.
#[derive(Clone)]
pub struct CharacterService {
    store: Arc<dyn CharacterStore>,
}

impl FromRef<AppState> for CharacterService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.characters.clone())
    }
}

/// Which way a slot operation moves the counter.
#[derive(Debug, Clone, Copy)]
pub enum SlotChange {
    Use,
    Restore,
}

impl CharacterService {
    pub fn new(store: Arc<dyn CharacterStore>) -> Self {
        Self { store }
    }

    async fn ensure_class(&self, class_id: i64) -> AppResult<()> {
        if self.store.class_exists(class_id).await? {
            Ok(())
        } else {
            Err(AppError::not_found(CLASS_NOT_FOUND))
        }
    }

    async fn owned(&self, user_id: i64, character_id: i64) -> AppResult<CharacterRow> {
        self.store
            .find_owned(character_id, user_id)
            .await?
            .ok_or_else(|| AppError::not_found(CHARACTER_NOT_FOUND))
    }

    async fn view(&self, row: CharacterRow) -> AppResult<CharacterView> {
        let mut ids = self.store.spell_ids(&[row.id]).await?;
        let spells = ids.remove(&row.id).unwrap_or_default();
        Ok(CharacterView::new(row, spells))
    }

    pub async fn create(
        &self,
        user_id: i64,
        name: String,
        character_class_id: i64,
        spell_slots: SpellSlots,
    ) -> AppResult<CharacterView> {
        self.ensure_class(character_class_id).await?;
        let row = self
            .store
            .insert(NewCharacter {
                name,
                user_id,
                character_class_id,
                spell_slots,
            })
            .await?;
        info!(character_id = row.id, user_id, "character created");
        Ok(CharacterView::new(row, Vec::new()))
    }

    pub async fn list(&self, user_id: i64) -> AppResult<Vec<CharacterView>> {
        let rows = self.store.list_by_user(user_id).await?;
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut spells = self.store.spell_ids(&ids).await?;
        Ok(rows
            .into_iter()
            .map(|r| {
                let learned = spells.remove(&r.id).unwrap_or_default();
                CharacterView::new(r, learned)
            })
            .collect())
    }

    pub async fn get(&self, user_id: i64, character_id: i64) -> AppResult<CharacterView> {
        let row = self.owned(user_id, character_id).await?;
        self.view(row).await
    }

    pub async fn update(
        &self,
        user_id: i64,
        character_id: i64,
        changes: CharacterChanges,
    ) -> AppResult<CharacterView> {
        if let Some(class_id) = changes.character_class_id {
            self.owned(user_id, character_id).await?;
            self.ensure_class(class_id).await?;
        }
        let row = self
            .store
            .update_owned(character_id, user_id, changes)
            .await?
            .ok_or_else(|| AppError::not_found(CHARACTER_NOT_FOUND))?;
        self.view(row).await
    }

    pub async fn delete(&self, user_id: i64, character_id: i64) -> AppResult<()> {
        if !self.store.delete_owned(character_id, user_id).await? {
            return Err(AppError::not_found(CHARACTER_NOT_FOUND));
        }
        info!(character_id, user_id, "character deleted");
        Ok(())
    }

    pub async fn learned_spells(
        &self,
        user_id: i64,
        character_id: i64,
        language: Language,
    ) -> AppResult<Vec<LocalizedSpell>> {
        self.owned(user_id, character_id).await?;
        let rows = self.store.learned_spells(character_id, language).await?;
        Ok(rows.into_iter().map(LocalizedSpell::from).collect())
    }

    pub async fn learn_spell(
        &self,
        user_id: i64,
        character_id: i64,
        spell_id: i64,
    ) -> AppResult<CharacterView> {
        let row = self.owned(user_id, character_id).await?;
        if !self.store.spell_exists(spell_id).await? {
            return Err(AppError::not_found(SPELL_NOT_FOUND));
        }
        self.store.learn(character_id, spell_id).await?;
        self.view(row).await
    }

    pub async fn forget_spell(
        &self,
        user_id: i64,
        character_id: i64,
        spell_id: i64,
    ) -> AppResult<CharacterView> {
        let row = self.owned(user_id, character_id).await?;
        self.store.forget(character_id, spell_id).await?;
        self.view(row).await
    }

    /// Spends or gives back one slot of `level`. The write is a
    /// compare-and-set on the slot map, retried if another request changed
    /// it in between.
    pub async fn change_slot(
        &self,
        user_id: i64,
        character_id: i64,
        level: &str,
        change: SlotChange,
    ) -> AppResult<CharacterView> {
        for _ in 0..SLOT_SWAP_ATTEMPTS {
            let row = self.owned(user_id, character_id).await?;
            let current = row.spell_slots.0;
            let mut next = current.clone();
            let changed = match change {
                SlotChange::Use => next.use_slot(level),
                SlotChange::Restore => next.restore_slot(level),
            };
            if !changed {
                return Err(AppError::validation(match change {
                    SlotChange::Use if next.0.contains_key(level) => NO_SLOT_LEFT,
                    _ => NO_SLOT_LEVEL,
                }));
            }
            if let Some(row) = self
                .store
                .swap_slots(character_id, user_id, &current, &next)
                .await?
            {
                info!(character_id, level, ?change, "spell slot changed");
                return self.view(row).await;
            }
            warn!(character_id, level, "spell slots changed concurrently, retrying");
        }
        Err(AppError::Internal(anyhow::anyhow!(
            "spell slots of character {character_id} kept changing"
        )))
    }
}
