use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::{
        dto::{
            LoginRequest, LoginResponse, MessageResponse, RegisterRequest, RegisterResponse,
            RegisteredUser, TokenPair,
        },
        extractors::{AuthUser, RefreshUser},
        services::{is_valid_email, AuthService},
    },
    error::{AppError, AppResult},
    state::AppState,
};

pub const MIN_PASSWORD_LEN: usize = 6;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
}

#[instrument(skip(auth, payload))]
pub async fn register(
    State(auth): State<AuthService>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    let Json(payload) = payload?;

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AppError::validation("email must be an email"));
    }
    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(AppError::validation(format!(
            "password must be longer than or equal to {MIN_PASSWORD_LEN} characters"
        )));
    }

    let user = auth
        .register(payload.email, payload.password, payload.name)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Пользователь успешно зарегистрирован".into(),
            user: RegisteredUser {
                id: user.id,
                email: user.email,
                name: user.name,
            },
        }),
    ))
}

#[instrument(skip(auth, payload))]
pub async fn login(
    State(auth): State<AuthService>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<LoginResponse>> {
    let Json(payload) = payload?;

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AppError::validation("email must be an email"));
    }

    Ok(Json(auth.login(&payload.email, &payload.password).await?))
}

#[instrument(skip(auth, user), fields(user_id = user.subject.user_id))]
pub async fn refresh(
    State(auth): State<AuthService>,
    user: RefreshUser,
) -> AppResult<Json<TokenPair>> {
    Ok(Json(auth.refresh_tokens(user.subject.user_id, &user.token).await?))
}

#[instrument(skip(auth, user), fields(user_id = user.user_id))]
pub async fn logout(
    State(auth): State<AuthService>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<MessageResponse>> {
    Ok(Json(auth.logout(user.user_id).await?))
}
