use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::error::AppResult;
use crate::extractors::{ApiJson, CurrentUser};
use crate::mapper::RecordAnalyticsRequest;
use crate::models::{self, Analytics};
use crate::posts::PostService;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/posts/{id}/analytics",
        get(list_analytics).post(record_analytics),
    )
}

async fn list_analytics(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(post_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let post = PostService::new(&state.stores).get(&user, &post_id).await?;
    let rows = state.stores.analytics.list_by_owner(&post.id).await?;
    Ok(Json(json!({ "analytics": rows })))
}

async fn record_analytics(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(post_id): Path<String>,
    ApiJson(body): ApiJson<RecordAnalyticsRequest>,
) -> AppResult<impl IntoResponse> {
    let sample = body.validate()?;
    let post = PostService::new(&state.stores).get(&user, &post_id).await?;

    let row = Analytics::record(
        post.id,
        sample.platform,
        sample.likes,
        sample.comments,
        sample.shares,
        sample.reach,
        models::now(),
    );
    let row = state.stores.analytics.create(row).await?;
    Ok((StatusCode::CREATED, Json(row)))
}
