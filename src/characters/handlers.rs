use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{
        CharacterResponse, CharacterView, CharacterWithMessage, CreateCharacterRequest,
        UpdateCharacterRequest,
    },
    services::{CharacterService, SlotChange},
};
use crate::{
    auth::{dto::MessageResponse, extractors::AuthUser},
    error::AppResult,
    spells::dto::{LanguageQuery, LocalizedSpell},
    state::AppState,
};

pub fn character_routes() -> Router<AppState> {
    Router::new()
        .route("/characters", post(create_character).get(list_characters))
        .route(
            "/characters/:id",
            get(get_character)
                .put(update_character)
                .delete(delete_character),
        )
        .route("/characters/:id/spells", get(character_spells))
        .route(
            "/characters/:id/spells/:spell_id",
            post(learn_spell).delete(forget_spell),
        )
        .route("/characters/:id/slots/:level/use", post(use_slot))
        .route("/characters/:id/slots/:level/restore", post(restore_slot))
}

#[instrument(skip(characters, payload), fields(user_id = user.user_id))]
pub async fn create_character(
    State(characters): State<CharacterService>,
    AuthUser(user): AuthUser,
    payload: Result<Json<CreateCharacterRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<CharacterWithMessage>)> {
    let Json(payload) = payload?;
    let (name, class_id, slots) = payload.validate()?;
    let character = characters.create(user.user_id, name, class_id, slots).await?;
    Ok((
        StatusCode::CREATED,
        Json(CharacterWithMessage {
            character,
            message: "Персонаж успешно создан",
        }),
    ))
}

#[instrument(skip(characters), fields(user_id = user.user_id))]
pub async fn list_characters(
    State(characters): State<CharacterService>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Vec<CharacterView>>> {
    Ok(Json(characters.list(user.user_id).await?))
}

#[instrument(skip(characters), fields(user_id = user.user_id))]
pub async fn get_character(
    State(characters): State<CharacterService>,
    AuthUser(user): AuthUser,
    id: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<CharacterView>> {
    let Path(id) = id?;
    Ok(Json(characters.get(user.user_id, id).await?))
}

#[instrument(skip(characters, payload), fields(user_id = user.user_id))]
pub async fn update_character(
    State(characters): State<CharacterService>,
    AuthUser(user): AuthUser,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateCharacterRequest>, JsonRejection>,
) -> AppResult<Json<CharacterWithMessage>> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    let changes = payload.validate()?;
    let character = characters.update(user.user_id, id, changes).await?;
    Ok(Json(CharacterWithMessage {
        character,
        message: "Персонаж успешно обновлен",
    }))
}

#[instrument(skip(characters), fields(user_id = user.user_id))]
pub async fn delete_character(
    State(characters): State<CharacterService>,
    AuthUser(user): AuthUser,
    id: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<MessageResponse>> {
    let Path(id) = id?;
    characters.delete(user.user_id, id).await?;
    Ok(Json(MessageResponse {
        message: "Персонаж успешно удален".into(),
    }))
}

#[instrument(skip(characters), fields(user_id = user.user_id))]
pub async fn character_spells(
    State(characters): State<CharacterService>,
    AuthUser(user): AuthUser,
    id: Result<Path<i64>, PathRejection>,
    query: Result<Query<LanguageQuery>, QueryRejection>,
) -> AppResult<Json<Vec<LocalizedSpell>>> {
    let Path(id) = id?;
    let Query(query) = query?;
    let spells = characters
        .learned_spells(user.user_id, id, query.language())
        .await?;
    Ok(Json(spells))
}

#[instrument(skip(characters), fields(user_id = user.user_id))]
pub async fn learn_spell(
    State(characters): State<CharacterService>,
    AuthUser(user): AuthUser,
    ids: Result<Path<(i64, i64)>, PathRejection>,
) -> AppResult<Json<CharacterResponse>> {
    let Path((id, spell_id)) = ids?;
    let character = characters.learn_spell(user.user_id, id, spell_id).await?;
    Ok(Json(CharacterResponse {
        message: "Заклинание успешно изучено",
        character,
    }))
}

#[instrument(skip(characters), fields(user_id = user.user_id))]
pub async fn forget_spell(
    State(characters): State<CharacterService>,
    AuthUser(user): AuthUser,
    ids: Result<Path<(i64, i64)>, PathRejection>,
) -> AppResult<Json<CharacterResponse>> {
    let Path((id, spell_id)) = ids?;
    let character = characters.forget_spell(user.user_id, id, spell_id).await?;
    Ok(Json(CharacterResponse {
        message: "Заклинание успешно забыто",
        character,
    }))
}

#[instrument(skip(characters), fields(user_id = user.user_id))]
pub async fn use_slot(
    State(characters): State<CharacterService>,
    AuthUser(user): AuthUser,
    ids: Result<Path<(i64, String)>, PathRejection>,
) -> AppResult<Json<CharacterWithMessage>> {
    let Path((id, level)) = ids?;
    let character = characters
        .change_slot(user.user_id, id, &level, SlotChange::Use)
        .await?;
    Ok(Json(CharacterWithMessage {
        character,
        message: "Ячейка заклинания использована",
    }))
}

#[instrument(skip(characters), fields(user_id = user.user_id))]
pub async fn restore_slot(
    State(characters): State<CharacterService>,
    AuthUser(user): AuthUser,
    ids: Result<Path<(i64, String)>, PathRejection>,
) -> AppResult<Json<CharacterWithMessage>> {
    let Path((id, level)) = ids?;
    let character = characters
        .change_slot(user.user_id, id, &level, SlotChange::Restore)
        .await?;
    Ok(Json(CharacterWithMessage {
        character,
        message: "Ячейка заклинания восстановлена",
    }))
}
