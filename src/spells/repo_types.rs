use sqlx::FromRow;
use time::OffsetDateTime;

/// A spell joined with one of its translations.
#[derive(Debug, Clone, FromRow)]
pub struct SpellRow {
    pub id: i64,
    pub level: String,
    pub language: String,
    pub name: String,
    pub text: String,
    pub school: String,
    pub casting_time: String,
    pub range: String,
    pub materials: Option<String>,
    pub components: String,
    pub duration: String,
    pub source: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub struct CharacterClassRow {
    pub id: i64,
    pub title_en: String,
    pub title_ru: String,
    pub has_spells: bool,
}
