//! Request payloads, their validation, and the views sent back to clients.
//!
//! Every `validate` collects all offending fields before returning, and
//! nothing domain-side is constructed unless the whole payload is valid.

use chrono::{DateTime, SubsecRound, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{AccountStatus, PostStatus, Role, SocialAccount, User};
use crate::posts::{PostDraft, PostPatch};

pub const MIN_PASSWORD_LEN: usize = 6;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub fields: Vec<FieldError>,
}

impl ValidationError {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            fields: vec![FieldError::new(field, message)],
        }
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f.field == field)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "Validation failed ({})", parts.join("; "))
    }
}

impl std::error::Error for ValidationError {}

/// Accumulates field errors across one payload.
#[derive(Default)]
struct Checks {
    fields: Vec<FieldError>,
}

impl Checks {
    fn fail(&mut self, field: &str, message: impl Into<String>) {
        self.fields.push(FieldError::new(field, message));
    }

    fn required(&mut self, field: &str, value: &str) -> String {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            self.fail(field, "is required");
        }
        trimmed.to_string()
    }

    fn email(&mut self, field: &str, value: &str) -> String {
        let email = value.trim().to_ascii_lowercase();
        if email.is_empty() {
            self.fail(field, "is required");
        } else if !EMAIL_RE.is_match(&email) {
            self.fail(field, "must be a valid email address");
        }
        email
    }

    fn list(&mut self, field: &str, values: &[String], non_empty: bool) -> Vec<String> {
        if non_empty && values.is_empty() {
            self.fail(field, "must contain at least one entry");
        }
        if values.iter().any(|v| v.trim().is_empty()) {
            self.fail(field, "must not contain blank entries");
        }
        values.iter().map(|v| v.trim().to_string()).collect()
    }

    fn status(&mut self, field: &str, value: Option<&str>) -> Option<PostStatus> {
        let value = value.map(str::trim).filter(|v| !v.is_empty())?;
        match value.parse::<PostStatus>() {
            Ok(status) => Some(status),
            Err(_) => {
                self.fail(field, "must be one of draft, scheduled, published");
                None
            }
        }
    }

    fn timestamp(&mut self, field: &str, value: Option<&str>) -> Option<DateTime<Utc>> {
        let value = value.map(str::trim).filter(|v| !v.is_empty())?;
        match DateTime::parse_from_rfc3339(value) {
            Ok(at) => Some(at.with_timezone(&Utc).trunc_subsecs(6)),
            Err(_) => {
                self.fail(field, "must be an RFC 3339 timestamp");
                None
            }
        }
    }

    fn non_negative(&mut self, field: &str, value: i64) -> i64 {
        if value < 0 {
            self.fail(field, "must not be negative");
        }
        value
    }

    fn finish<T>(self, value: T) -> Result<T, ValidationError> {
        if self.fields.is_empty() {
            Ok(value)
        } else {
            Err(ValidationError {
                fields: self.fields,
            })
        }
    }
}

fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// -- Auth --

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<NewUser, ValidationError> {
        let mut checks = Checks::default();
        let name = checks.required("name", &self.name);
        let email = checks.email("email", &self.email);
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            checks.fail(
                "password",
                format!("must be at least {} characters", MIN_PASSWORD_LEN),
            );
        }
        checks.finish(NewUser {
            name,
            email,
            password: self.password.clone(),
        })
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    /// Returns the normalized email.
    pub fn validate(&self) -> Result<String, ValidationError> {
        let mut checks = Checks::default();
        let email = checks.email("email", &self.email);
        if self.password.is_empty() {
            checks.fail("password", "is required");
        }
        checks.finish(email)
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct UpdateProfileRequest {
    pub name: String,
}

impl UpdateProfileRequest {
    pub fn validate(&self) -> Result<String, ValidationError> {
        let mut checks = Checks::default();
        let name = checks.required("name", &self.name);
        checks.finish(name)
    }
}

/// Public face of a user; never carries the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserView,
}

// -- Posts --

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct CreatePostRequest {
    pub title: Option<String>,
    pub content: String,
    pub platforms: Vec<String>,
    pub links: Vec<String>,
    pub media_ids: Vec<String>,
    pub status: Option<String>,
    #[serde(alias = "scheduled_time")]
    pub scheduled_for: Option<String>,
}

impl CreatePostRequest {
    pub fn validate(&self) -> Result<PostDraft, ValidationError> {
        let mut checks = Checks::default();
        let content = checks.required("content", &self.content);
        let platforms = checks.list("platforms", &self.platforms, true);
        let links = checks.list("links", &self.links, false);
        let media_ids = checks.list("media_ids", &self.media_ids, false);
        let status = checks.status("status", self.status.as_deref());
        let scheduled_for = checks.timestamp("scheduled_for", self.scheduled_for.as_deref());

        checks.finish(PostDraft {
            title: optional_text(self.title.as_deref()),
            content,
            platforms,
            links,
            media_ids,
            status: status.unwrap_or(PostStatus::Draft),
            scheduled_for,
        })
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub platforms: Option<Vec<String>>,
    pub links: Option<Vec<String>>,
    pub status: Option<String>,
    #[serde(alias = "scheduled_time")]
    pub scheduled_for: Option<String>,
}

impl UpdatePostRequest {
    pub fn validate(&self) -> Result<PostPatch, ValidationError> {
        let mut checks = Checks::default();
        let content = self
            .content
            .as_deref()
            .map(|c| checks.required("content", c));
        let platforms = self
            .platforms
            .as_deref()
            .map(|p| checks.list("platforms", p, true));
        let links = self
            .links
            .as_deref()
            .map(|l| checks.list("links", l, false));
        let status = checks.status("status", self.status.as_deref());
        let scheduled_for = checks.timestamp("scheduled_for", self.scheduled_for.as_deref());

        checks.finish(PostPatch {
            // An explicit empty title clears it
            title: self.title.as_deref().map(|t| optional_text(Some(t))),
            content,
            platforms,
            links,
            status,
            scheduled_for,
        })
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ScheduleRequest {
    #[serde(alias = "scheduled_time")]
    pub scheduled_for: String,
}

impl ScheduleRequest {
    pub fn validate(&self) -> Result<DateTime<Utc>, ValidationError> {
        if self.scheduled_for.trim().is_empty() {
            return Err(ValidationError::single("scheduled_for", "is required"));
        }
        let mut checks = Checks::default();
        match checks.timestamp("scheduled_for", Some(&self.scheduled_for)) {
            Some(at) => Ok(at),
            None => Err(ValidationError {
                fields: checks.fields,
            }),
        }
    }
}

// -- Social accounts --

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ConnectAccountRequest {
    pub account_name: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSocialAccount {
    pub platform: String,
    pub account_name: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl ConnectAccountRequest {
    pub fn validate(&self, platform: &str) -> Result<NewSocialAccount, ValidationError> {
        let mut checks = Checks::default();
        let platform = checks.required("platform", platform).to_ascii_lowercase();
        let account_name = checks.required("account_name", &self.account_name);
        let access_token = checks.required("access_token", &self.access_token);
        checks.finish(NewSocialAccount {
            platform,
            account_name,
            access_token,
            refresh_token: optional_text(self.refresh_token.as_deref()),
        })
    }
}

/// Public face of a connected account; tokens stay server-side.
#[derive(Debug, Clone, Serialize)]
pub struct SocialAccountView {
    pub id: String,
    pub platform: String,
    pub account_name: String,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&SocialAccount> for SocialAccountView {
    fn from(account: &SocialAccount) -> Self {
        Self {
            id: account.id.clone(),
            platform: account.platform.clone(),
            account_name: account.account_name.clone(),
            status: account.status,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

// -- Analytics --

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct RecordAnalyticsRequest {
    pub platform: String,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    pub reach: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsSample {
    pub platform: String,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    pub reach: i64,
}

impl RecordAnalyticsRequest {
    pub fn validate(&self) -> Result<AnalyticsSample, ValidationError> {
        let mut checks = Checks::default();
        let platform = checks.required("platform", &self.platform);
        let likes = checks.non_negative("likes", self.likes);
        let comments = checks.non_negative("comments", self.comments);
        let shares = checks.non_negative("shares", self.shares);
        let reach = checks.non_negative("reach", self.reach);
        checks.finish(AnalyticsSample {
            platform,
            likes,
            comments,
            shares,
            reach,
        })
    }
}
