use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::extractors::{ApiJson, CurrentUser};
use crate::mapper::{CreatePostRequest, ScheduleRequest, UpdatePostRequest, ValidationError};
use crate::models::Post;
use crate::posts::PostService;
use crate::state::AppState;
use crate::uploads::MultipartForm;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route(
            "/posts/{id}",
            get(get_post).put(update_post).delete(delete_post),
        )
        .route("/posts/{id}/publish", post(publish_post))
        .route("/posts/{id}/schedule", post(schedule_post))
}

/// Post creation accepts either a JSON body or a multipart form with files.
pub enum CreatePostBody {
    Json(CreatePostRequest),
    Form(MultipartForm),
}

impl FromRequest<AppState> for CreatePostBody {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.to_ascii_lowercase().starts_with("multipart/form-data"))
            .unwrap_or(false);

        if is_multipart {
            let multipart = Multipart::from_request(req, state).await.map_err(|e| {
                AppError::Validation(ValidationError::single("body", e.body_text()))
            })?;
            Ok(CreatePostBody::Form(MultipartForm::read(multipart).await?))
        } else {
            let ApiJson(body) = ApiJson::<CreatePostRequest>::from_request(req, state).await?;
            Ok(CreatePostBody::Json(body))
        }
    }
}

impl From<&MultipartForm> for CreatePostRequest {
    fn from(form: &MultipartForm) -> Self {
        let owned = |name: &str| form.text(name).map(str::to_string);
        CreatePostRequest {
            title: owned("title"),
            content: owned("content").unwrap_or_default(),
            platforms: form.list("platforms"),
            links: form.list("links"),
            media_ids: form.list("media_ids"),
            status: owned("status"),
            scheduled_for: owned("scheduled_for").or_else(|| owned("scheduled_time")),
        }
    }
}

async fn list_posts(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<serde_json::Value>> {
    let posts = PostService::new(&state.stores).list(&user).await?;
    Ok(Json(json!({ "posts": posts })))
}

async fn create_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    body: CreatePostBody,
) -> AppResult<impl IntoResponse> {
    let post = match body {
        CreatePostBody::Json(req) => {
            let draft = req.validate()?;
            PostService::new(&state.stores).create(&user, draft).await?
        }
        CreatePostBody::Form(form) => {
            let mut draft = CreatePostRequest::from(&form).validate()?;
            // Files are stored before the post exists; a failed create leaves them unattached
            for upload in &form.files {
                let media = state.uploads.store(&user.id, upload).await?;
                let media = state.stores.media.create(media).await?;
                draft.media_ids.push(media.id);
            }
            PostService::new(&state.stores).create(&user, draft).await?
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Post created successfully", "post": post })),
    ))
}

async fn get_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Post>> {
    let post = PostService::new(&state.stores).get(&user, &id).await?;
    Ok(Json(post))
}

async fn update_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<UpdatePostRequest>,
) -> AppResult<Json<Post>> {
    let patch = body.validate()?;
    let post = PostService::new(&state.stores)
        .update(&user, &id, patch)
        .await?;
    Ok(Json(post))
}

async fn publish_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Post>> {
    let post = PostService::new(&state.stores).publish(&user, &id).await?;
    Ok(Json(post))
}

async fn schedule_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ScheduleRequest>,
) -> AppResult<Json<Post>> {
    let at = body.validate()?;
    let post = PostService::new(&state.stores)
        .schedule(&user, &id, at)
        .await?;
    Ok(Json(post))
}

async fn delete_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    PostService::new(&state.stores).delete(&user, &id).await?;
    Ok(Json(json!({ "message": "Post deleted successfully" })))
}
