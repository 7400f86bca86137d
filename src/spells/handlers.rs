use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{
        CharacterClassView, ClassSpellStats, LanguageQuery, LocalizedSpell, Paginated, SpellFilter,
        SpellQuery,
    },
    services,
};
use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

pub const SPELL_NOT_FOUND: &str = "Заклинание не найдено";

pub fn spell_routes() -> Router<AppState> {
    Router::new()
        .route("/spells", get(list_spells))
        .route("/spells/classes", get(list_classes))
        .route("/spells/class/:class_id/stats", get(class_stats))
        .route("/spells/:id", get(get_spell))
}

#[instrument(skip(state))]
pub async fn list_spells(
    State(state): State<AppState>,
    query: Result<Query<SpellQuery>, QueryRejection>,
) -> AppResult<Json<Paginated<LocalizedSpell>>> {
    let Query(query) = query?;
    let filter = SpellFilter::try_from(query)?;
    Ok(Json(services::list_spells(&state.db, &filter).await?))
}

#[instrument(skip(state))]
pub async fn get_spell(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    query: Result<Query<LanguageQuery>, QueryRejection>,
) -> AppResult<Json<LocalizedSpell>> {
    let Path(id) = id?;
    let Query(query) = query?;
    services::find_spell(&state.db, id, query.language())
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(SPELL_NOT_FOUND))
}

#[instrument(skip(state))]
pub async fn list_classes(
    State(state): State<AppState>,
    query: Result<Query<LanguageQuery>, QueryRejection>,
) -> AppResult<Json<Vec<CharacterClassView>>> {
    let Query(query) = query?;
    Ok(Json(services::list_classes(&state.db, query.language()).await?))
}

#[instrument(skip(state))]
pub async fn class_stats(
    State(state): State<AppState>,
    class_id: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<ClassSpellStats>> {
    let Path(class_id) = class_id?;
    services::class_stats(&state.db, class_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Класс персонажа не найден"))
}
