use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::mapper::ValidationError;
use crate::state::AppState;
use crate::store::StoreError;
use crate::uploads::MultipartForm;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/media", get(list_media))
        .route("/media/upload", post(upload_media))
        .route("/media/{id}", delete(delete_media))
}

async fn upload_media(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let form = MultipartForm::read(multipart).await?;
    let upload = form
        .files
        .first()
        .ok_or_else(|| ValidationError::single("file", "is required"))?;

    let media = state.uploads.store(&user.id, upload).await?;
    let media = state.stores.media.create(media).await?;

    tracing::info!(media_id = %media.id, user_id = %user.id, kind = %media.kind, "Media uploaded");
    Ok((StatusCode::CREATED, Json(media)))
}

async fn list_media(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<serde_json::Value>> {
    let media = state.stores.media.list_by_owner(&user.id).await?;
    Ok(Json(json!({ "media": media })))
}

async fn delete_media(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let media = state.stores.media.get_by_id(&id).await?;
    if media.user_id != user.id && !user.is_admin() {
        return Err(AppError::NotFound);
    }
    if let Some(post_id) = &media.post_id {
        // A link to a post that no longer exists does not hold the media
        match state.stores.posts.get_by_id(post_id).await {
            Ok(_) => {
                return Err(AppError::InvalidReference(format!(
                    "Media {} is attached to a post",
                    media.id
                )));
            }
            Err(StoreError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }
    }

    state.stores.media.delete(&media.id).await?;
    if let Err(e) = state.uploads.remove(&media).await {
        tracing::warn!(media_id = %media.id, "Failed to remove stored file: {}", e);
    }

    Ok(Json(json!({ "message": "Media deleted successfully" })))
}
