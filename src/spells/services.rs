use sqlx::PgPool;

use super::{
    dto::{
        CharacterClassView, ClassSpellStats, Language, LocalizedSpell, Paginated, PaginationMeta,
        SpellFilter,
    },
    repo,
    repo_types::{CharacterClassRow, SpellRow},
};

impl From<SpellRow> for LocalizedSpell {
    fn from(r: SpellRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            level: r.level,
            text: r.text,
            school: r.school,
            casting_time: r.casting_time,
            range: r.range,
            materials: r.materials.unwrap_or_default(),
            components: r.components,
            duration: r.duration,
            source: r.source,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

impl CharacterClassView {
    pub fn localized(row: CharacterClassRow, language: Language) -> Self {
        let title = match language {
            Language::En => row.title_en.clone(),
            Language::Ru => row.title_ru.clone(),
        };
        Self {
            id: row.id,
            title,
            title_en: row.title_en,
            title_ru: row.title_ru,
            has_spells: row.has_spells,
        }
    }
}

pub fn pagination_meta(page: i64, limit: i64, total: i64) -> PaginationMeta {
    let total_pages = if limit > 0 { (total + limit - 1) / limit } else { 0 };
    PaginationMeta {
        page,
        limit,
        total,
        total_pages,
        has_next: page < total_pages,
        has_prev: page > 1,
    }
}

/// Requested language first, then English, then whatever exists.
pub fn pick_translation(rows: Vec<SpellRow>, language: Language) -> Option<SpellRow> {
    let pos = rows
        .iter()
        .position(|r| r.language == language.code())
        .or_else(|| rows.iter().position(|r| r.language == Language::En.code()))
        .or_else(|| (!rows.is_empty()).then_some(0))?;
    rows.into_iter().nth(pos)
}

pub fn spell_stats<I>(rows: I) -> ClassSpellStats
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut stats = ClassSpellStats::default();
    for (level, school) in rows {
        stats.total += 1;
        *stats.by_level.entry(level).or_default() += 1;
        if !school.is_empty() {
            *stats.by_school.entry(school).or_default() += 1;
        }
    }
    stats
}

pub async fn list_spells(db: &PgPool, filter: &SpellFilter) -> anyhow::Result<Paginated<LocalizedSpell>> {
    let (rows, total) = repo::list(db, filter).await?;
    Ok(Paginated {
        data: rows.into_iter().map(LocalizedSpell::from).collect(),
        pagination: pagination_meta(filter.page, filter.limit, total),
    })
}

pub async fn find_spell(
    db: &PgPool,
    spell_id: i64,
    language: Language,
) -> anyhow::Result<Option<LocalizedSpell>> {
    let rows = repo::translations(db, spell_id).await?;
    Ok(pick_translation(rows, language).map(LocalizedSpell::from))
}

pub async fn list_classes(db: &PgPool, language: Language) -> anyhow::Result<Vec<CharacterClassView>> {
    let rows = repo::list_classes(db).await?;
    Ok(rows
        .into_iter()
        .map(|r| CharacterClassView::localized(r, language))
        .collect())
}

pub async fn class_stats(db: &PgPool, class_id: i64) -> anyhow::Result<Option<ClassSpellStats>> {
    if !repo::class_exists(db, class_id).await? {
        return Ok(None);
    }
    let rows = repo::class_spell_levels_and_schools(db, class_id).await?;
    Ok(Some(spell_stats(rows)))
}
