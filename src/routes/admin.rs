use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::error::AppResult;
use crate::extractors::AdminUser;
use crate::mapper::UserView;
use crate::models::Role;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/admin/users", get(list_users))
}

/// Every live account, newest first.
async fn list_users(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> AppResult<Json<serde_json::Value>> {
    let mut users = Vec::new();
    for role in [Role::User, Role::Admin] {
        users.extend(state.stores.users.find_by_field("role", role.as_str()).await?);
    }
    users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));

    tracing::debug!(admin_id = %admin.id, count = users.len(), "Listed users");
    let users: Vec<UserView> = users.iter().map(UserView::from).collect();
    Ok(Json(json!({ "users": users })))
}
