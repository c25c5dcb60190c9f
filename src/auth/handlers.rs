use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::auth::{hash_password, verify_password};
use crate::error::{AppError, AppResult};
use crate::extractors::{ApiJson, CurrentUser};
use crate::mapper::{LoginRequest, LoginResponse, RegisterRequest, UpdateProfileRequest, UserView};
use crate::models::{self, Role, User};
use crate::state::AppState;

pub async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> AppResult<impl IntoResponse> {
    let new_user = body.validate()?;

    if state
        .stores
        .users
        .exists_by_field("email", &new_user.email)
        .await?
    {
        return Err(AppError::DuplicateKey("Email already registered".into()));
    }

    let hash = hash_password(&new_user.password, state.config.auth.bcrypt_cost)?;
    let mut user = User::new(new_user.email, hash, new_user.name, models::now());
    if state.config.auth.is_admin_email(&user.email) {
        user.role = Role::Admin;
    }
    // A concurrent registration can still lose the race at the unique index
    let user = state.stores.users.create(user).await?;

    tracing::info!(user_id = %user.id, role = %user.role, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User registered successfully",
            "user": UserView::from(&user),
        })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let email = body.validate()?;

    let mut user = state
        .stores
        .users
        .find_by_field("email", &email)
        .await?
        .into_iter()
        .next()
        .ok_or(AppError::Unauthorized)?;

    if !verify_password(&body.password, &user.password_hash) {
        tracing::debug!(user_id = %user.id, "Password mismatch");
        return Err(AppError::Unauthorized);
    }

    // Accounts listed in config after they registered are promoted here
    if user.role != Role::Admin && state.config.auth.is_admin_email(&user.email) {
        user.role = Role::Admin;
        user = state.stores.users.update(user).await?;
        tracing::info!(user_id = %user.id, "Promoted to admin");
    }

    let token = state.tokens.issue(&user)?;
    Ok(Json(LoginResponse {
        token,
        user: UserView::from(&user),
    }))
}

pub async fn me(CurrentUser(user): CurrentUser) -> Json<UserView> {
    Json(UserView::from(&user))
}

pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(mut user): CurrentUser,
    ApiJson(body): ApiJson<UpdateProfileRequest>,
) -> AppResult<Json<UserView>> {
    user.name = body.validate()?;
    let user = state.stores.users.update(user).await?;
    Ok(Json(UserView::from(&user)))
}
