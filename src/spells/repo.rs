use anyhow::Context;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::{
    dto::{Language, SpellFilter},
    repo_types::{CharacterClassRow, SpellRow},
};

const SPELL_COLUMNS: &str = r#"
    s.id, s.level, t.language, t.name, t.text, t.school, t.casting_time, t.range,
    t.materials, t.components, t.duration, t.source, t.created_at, t.updated_at
"#;

/// Escapes LIKE metacharacters and wraps the term for a substring match.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

/// FROM/JOIN/WHERE shared by the page query and the count query.
fn push_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, f: &'a SpellFilter) {
    qb.push(" FROM spells s JOIN spell_translations t ON t.spell_id = s.id AND t.language = ");
    qb.push_bind(f.language.code());

    if let Some(class_id) = f.character_class {
        qb.push(" JOIN character_class_spells ccs ON ccs.spell_id = s.id AND ccs.character_class_id = ");
        qb.push_bind(class_id);
    }

    qb.push(" WHERE TRUE");
    if let Some(level) = &f.level {
        qb.push(" AND s.level = ").push_bind(level);
    }
    if let Some(school) = &f.school {
        qb.push(" AND t.school = ").push_bind(school);
    }
    if let Some(source) = &f.source {
        qb.push(" AND t.source = ").push_bind(source);
    }
    if let Some(search) = &f.search {
        let pattern = like_pattern(search);
        qb.push(" AND (t.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR t.text ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

/// One page of localized spells plus the total number of matches.
pub async fn list(db: &PgPool, f: &SpellFilter) -> anyhow::Result<(Vec<SpellRow>, i64)> {
    let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
    qb.push(SPELL_COLUMNS);
    push_filters(&mut qb, f);
    qb.push(" ORDER BY t.name ASC, s.id ASC LIMIT ")
        .push_bind(f.limit)
        .push(" OFFSET ")
        .push_bind(f.offset());
    let rows = qb
        .build_query_as::<SpellRow>()
        .fetch_all(db)
        .await
        .context("list spells")?;

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
    push_filters(&mut count, f);
    let total: i64 = count
        .build_query_scalar::<i64>()
        .fetch_one(db)
        .await
        .context("count spells")?;

    Ok((rows, total))
}

/// Every translation of one spell.
pub async fn translations(db: &PgPool, spell_id: i64) -> anyhow::Result<Vec<SpellRow>> {
    let rows = sqlx::query_as::<_, SpellRow>(&format!(
        r#"
        SELECT {SPELL_COLUMNS}
          FROM spells s
          JOIN spell_translations t ON t.spell_id = s.id
         WHERE s.id = $1
         ORDER BY t.language
        "#
    ))
    .bind(spell_id)
    .fetch_all(db)
    .await
    .context("spell translations")?;
    Ok(rows)
}

pub async fn exists(db: &PgPool, spell_id: i64) -> anyhow::Result<bool> {
    let found: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM spells WHERE id = $1)")
        .bind(spell_id)
        .fetch_one(db)
        .await
        .context("spell exists")?;
    Ok(found)
}

pub async fn list_classes(db: &PgPool) -> anyhow::Result<Vec<CharacterClassRow>> {
    let rows = sqlx::query_as::<_, CharacterClassRow>(
        r#"
        SELECT id, title_en, title_ru, has_spells
          FROM character_classes
         ORDER BY id ASC
        "#,
    )
    .fetch_all(db)
    .await
    .context("list character classes")?;
    Ok(rows)
}

pub async fn class_exists(db: &PgPool, class_id: i64) -> anyhow::Result<bool> {
    let found: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM character_classes WHERE id = $1)")
            .bind(class_id)
            .fetch_one(db)
            .await
            .context("class exists")?;
    Ok(found)
}

/// `(level, english school)` for every spell on a class list.
pub async fn class_spell_levels_and_schools(
    db: &PgPool,
    class_id: i64,
) -> anyhow::Result<Vec<(String, String)>> {
    let rows = sqlx::query_as::<_, (String, String)>(
        r#"
        SELECT s.level, t.school
          FROM spells s
          JOIN character_class_spells ccs ON ccs.spell_id = s.id
          JOIN spell_translations t ON t.spell_id = s.id AND t.language = 'en'
         WHERE ccs.character_class_id = $1
        "#,
    )
    .bind(class_id)
    .fetch_all(db)
    .await
    .context("class spell stats")?;
    Ok(rows)
}

/// Spells a character has learned, in one language, sorted by name.
pub async fn learned_by_character(
    db: &PgPool,
    character_id: i64,
    language: Language,
) -> anyhow::Result<Vec<SpellRow>> {
    let rows = sqlx::query_as::<_, SpellRow>(&format!(
        r#"
        SELECT {SPELL_COLUMNS}
          FROM spells s
          JOIN spell_translations t ON t.spell_id = s.id AND t.language = $2
          JOIN character_spells cs ON cs.spell_id = s.id
         WHERE cs.character_id = $1
         ORDER BY t.name ASC
        "#
    ))
    .bind(character_id)
    .bind(language.code())
    .fetch_all(db)
    .await
    .context("character spells")?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("fire"), "%fire%");
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    #[test]
    fn filters_render_expected_sql() {
        let f = SpellFilter {
            page: 2,
            limit: 10,
            level: Some("3".into()),
            school: None,
            search: Some("fire".into()),
            character_class: Some(9),
            language: Language::Ru,
            source: Some("PHB".into()),
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
        push_filters(&mut qb, &f);
        let sql = qb.sql();
        assert!(sql.contains("t.language = $1"));
        assert!(sql.contains("ccs.character_class_id = $2"));
        assert!(sql.contains("s.level = $3"));
        assert!(sql.contains("t.source = $4"));
        assert!(sql.contains("t.name ILIKE $5 OR t.text ILIKE $6"));
        assert!(!sql.contains("t.school"));
    }
}
