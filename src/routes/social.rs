use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::extractors::{ApiJson, CurrentUser};
use crate::mapper::{ConnectAccountRequest, SocialAccountView};
use crate::models::{self, AccountStatus, SocialAccount};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/social/accounts", get(list_accounts))
        .route("/social/accounts/{platform}/connect", post(connect_account))
        .route("/social/accounts/{id}", delete(revoke_account))
}

async fn list_accounts(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<serde_json::Value>> {
    let accounts: Vec<SocialAccountView> = state
        .stores
        .social_accounts
        .list_by_owner(&user.id)
        .await?
        .iter()
        .map(SocialAccountView::from)
        .collect();
    Ok(Json(json!({ "accounts": accounts })))
}

/// Connecting a platform the user already has refreshes that account in place.
async fn connect_account(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(platform): Path<String>,
    ApiJson(body): ApiJson<ConnectAccountRequest>,
) -> AppResult<impl IntoResponse> {
    let new = body.validate(&platform)?;
    let repo = &state.stores.social_accounts;

    let existing = repo
        .list_by_owner(&user.id)
        .await?
        .into_iter()
        .find(|a| a.platform == new.platform);

    let (status, account) = match existing {
        Some(mut account) => {
            account.account_name = new.account_name;
            account.access_token = new.access_token;
            account.refresh_token = new.refresh_token;
            account.status = AccountStatus::Active;
            (StatusCode::OK, repo.update(account).await?)
        }
        None => {
            let now = models::now();
            let account = SocialAccount {
                id: String::new(),
                user_id: user.id.clone(),
                platform: new.platform,
                access_token: new.access_token,
                refresh_token: new.refresh_token,
                account_name: new.account_name,
                status: AccountStatus::Active,
                created_at: now,
                updated_at: now,
            };
            (StatusCode::CREATED, repo.create(account).await?)
        }
    };

    tracing::info!(account_id = %account.id, platform = %account.platform, "Social account connected");
    Ok((status, Json(SocialAccountView::from(&account))))
}

async fn revoke_account(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let repo = &state.stores.social_accounts;
    let mut account = repo.get_by_id(&id).await?;
    if account.user_id != user.id {
        return Err(AppError::NotFound);
    }

    account.status = AccountStatus::Revoked;
    let account = repo.update(account).await?;
    Ok(Json(json!({
        "message": "Social account disconnected",
        "account": SocialAccountView::from(&account),
    })))
}
