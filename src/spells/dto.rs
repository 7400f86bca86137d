use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::AppError;

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ru,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ru => "ru",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LanguageQuery {
    #[serde(default)]
    pub language: Option<Language>,
}

impl LanguageQuery {
    pub fn language(&self) -> Language {
        self.language.unwrap_or_default()
    }
}

/// Raw `GET /spells` query string.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpellQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub level: Option<String>,
    pub school: Option<String>,
    pub search: Option<String>,
    pub character_class: Option<i64>,
    pub language: Option<Language>,
    pub source: Option<String>,
}

/// Validated catalog filter.
#[derive(Debug, Clone, PartialEq)]
pub struct SpellFilter {
    pub page: i64,
    pub limit: i64,
    pub level: Option<String>,
    pub school: Option<String>,
    pub search: Option<String>,
    pub character_class: Option<i64>,
    pub language: Language,
    pub source: Option<String>,
}

impl SpellFilter {
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl TryFrom<SpellQuery> for SpellFilter {
    type Error = AppError;

    fn try_from(q: SpellQuery) -> Result<Self, Self::Error> {
        let page = q.page.unwrap_or(1);
        if page < 1 {
            return Err(AppError::validation("page must not be less than 1"));
        }
        let limit = q.limit.unwrap_or(DEFAULT_LIMIT);
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(AppError::validation(format!(
                "limit must be between 1 and {MAX_LIMIT}"
            )));
        }
        if (page - 1).checked_mul(limit).is_none() {
            return Err(AppError::validation("page is out of range"));
        }
        Ok(Self {
            page,
            limit,
            level: non_empty(q.level),
            school: non_empty(q.school),
            search: non_empty(q.search),
            character_class: q.character_class,
            language: q.language.unwrap_or_default(),
            source: non_empty(q.source),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalizedSpell {
    pub id: i64,
    pub name: String,
    pub level: String,
    pub text: String,
    pub school: String,
    pub casting_time: String,
    pub range: String,
    pub materials: String,
    pub components: String,
    pub duration: String,
    pub source: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterClassView {
    pub id: i64,
    pub title: String,
    pub title_en: String,
    pub title_ru: String,
    pub has_spells: bool,
}

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSpellStats {
    pub total: i64,
    pub by_level: BTreeMap<String, i64>,
    pub by_school: BTreeMap<String, i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let f = SpellFilter::try_from(SpellQuery::default()).unwrap();
        assert_eq!(f.page, 1);
        assert_eq!(f.limit, DEFAULT_LIMIT);
        assert_eq!(f.language, Language::En);
        assert_eq!(f.offset(), 0);
    }

    #[test]
    fn offset_follows_page() {
        let f = SpellFilter::try_from(SpellQuery {
            page: Some(3),
            limit: Some(10),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(f.offset(), 20);
    }

    #[test]
    fn rejects_out_of_range_paging() {
        for (page, limit) in [(Some(0), None), (None, Some(0)), (None, Some(101))] {
            let q = SpellQuery {
                page,
                limit,
                ..Default::default()
            };
            assert!(SpellFilter::try_from(q).is_err());
        }
    }

    #[test]
    fn rejects_page_whose_offset_overflows() {
        let q = SpellQuery {
            page: Some(i64::MAX / 10),
            limit: Some(100),
            ..Default::default()
        };
        assert!(SpellFilter::try_from(q).is_err());

        let last = SpellFilter::try_from(SpellQuery {
            page: Some(i64::MAX / 100),
            limit: Some(100),
            ..Default::default()
        })
        .unwrap();
        assert!(last.offset() > 0);
    }

    #[test]
    fn blank_filters_are_dropped() {
        let f = SpellFilter::try_from(SpellQuery {
            search: Some("   ".into()),
            school: Some(" Evocation ".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(f.search, None);
        assert_eq!(f.school.as_deref(), Some("Evocation"));
    }

    #[test]
    fn parses_camel_case_query() {
        let q: SpellQuery =
            serde_json::from_str(r#"{"characterClass": 9, "language": "ru"}"#).unwrap();
        assert_eq!(q.character_class, Some(9));
        assert_eq!(q.language, Some(Language::Ru));
        assert!(serde_json::from_str::<SpellQuery>(r#"{"language": "de"}"#).is_err());
    }
}
