// Multipart parsing and on-disk storage for uploaded media
use axum::extract::multipart::MultipartError;
use axum::extract::Multipart;
use bytes::Bytes;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, AppResult};
use crate::mapper::ValidationError;
use crate::models::{self, Media, MediaKind};

const MAX_NAME_ATTEMPTS: u32 = 8;

#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// A fully read multipart body: repeated text fields plus every file part.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, Vec<String>>,
    pub files: Vec<Upload>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = MultipartForm::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or("").to_string();

            if let Some(file_name) = field.file_name().map(str::to_string) {
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(multipart_error)?;
                if data.is_empty() && file_name.is_empty() {
                    // Browsers send an empty part for an untouched file input
                    continue;
                }
                form.files.push(Upload {
                    file_name,
                    content_type,
                    data,
                });
            } else {
                let value = field.text().await.map_err(multipart_error)?;
                form.fields.entry(name).or_default().push(value);
            }
        }

        Ok(form)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Every value sent under `name`. A single value holding commas is split.
    pub fn list(&self, name: &str) -> Vec<String> {
        let values = self
            .fields
            .get(name)
            .or_else(|| self.fields.get(&format!("{}[]", name)));
        match values {
            Some(values) if values.len() == 1 => values[0]
                .split(',')
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect(),
            Some(values) => values.clone(),
            None => Vec::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_fields(pairs: &[(&str, &str)]) -> Self {
        let mut form = MultipartForm::default();
        for (name, value) in pairs {
            form.fields
                .entry(name.to_string())
                .or_default()
                .push(value.to_string());
        }
        form
    }
}

fn multipart_error(err: MultipartError) -> AppError {
    tracing::debug!(status = %err.status(), "Multipart rejected: {}", err.body_text());
    AppError::Validation(ValidationError::single("file", err.body_text()))
}

/// Strip directories and anything outside `[A-Za-z0-9._-]`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Declared content type wins; a generic or missing one falls back to the extension.
pub fn infer_kind(file_name: &str, content_type: Option<&str>) -> MediaKind {
    match content_type {
        Some(ct) if !ct.is_empty() && ct != "application/octet-stream" => {
            MediaKind::from_content_type(ct)
        }
        _ => {
            let guessed = mime_guess::from_path(file_name).first_or_octet_stream();
            MediaKind::from_content_type(guessed.essence_str())
        }
    }
}

/// Mount point for served uploads: one leading slash, no trailing one.
pub fn public_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        "/uploads".to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Where uploads are written and the URL prefix they are served under.
#[derive(Debug, Clone)]
pub struct UploadDir {
    root: PathBuf,
    public_prefix: String,
}

impl UploadDir {
    pub fn new(root: PathBuf, prefix: &str) -> Self {
        Self {
            root,
            public_prefix: public_prefix(prefix),
        }
    }

    /// Write the upload to disk and describe it as an unsaved media entity.
    pub async fn store(&self, owner_id: &str, upload: &Upload) -> AppResult<Media> {
        tokio::fs::create_dir_all(&self.root).await?;

        let safe_name = sanitize_file_name(&upload.file_name);
        let mut nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();

        for _ in 0..MAX_NAME_ATTEMPTS {
            let stored_name = format!("{}_{}", nanos, safe_name);
            let path = self.root.join(&stored_name);

            let mut file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    nanos += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            file.write_all(&upload.data).await?;
            file.flush().await?;

            tracing::info!(file = %stored_name, size = upload.data.len(), "Stored upload");

            let now = models::now();
            return Ok(Media {
                id: String::new(),
                user_id: owner_id.to_string(),
                post_id: None,
                url: format!("{}/{}", self.public_prefix, stored_name),
                kind: infer_kind(&upload.file_name, upload.content_type.as_deref()),
                file_name: upload.file_name.clone(),
                size: upload.data.len() as i64,
                created_at: now,
                updated_at: now,
            });
        }

        Err(AppError::Internal(format!(
            "Could not find a free file name for {}",
            safe_name
        )))
    }

    /// Remove the stored file behind `media`. A file that is already gone is fine.
    pub async fn remove(&self, media: &Media) -> AppResult<()> {
        let Some(stored_name) = media.url.rsplit('/').next() else {
            return Ok(());
        };
        let path = self.root.join(sanitize_file_name(stored_name));
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
