use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Current time at the precision every store keeps (microseconds).
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Common behaviour every persisted entity exposes to the storage adapters.
pub trait Entity:
    Clone + Send + Sync + Serialize + serde::de::DeserializeOwned + 'static
{
    /// Table / index name.
    const COLLECTION: &'static str;
    /// Field that `list_by_owner` filters on.
    const OWNER_FIELD: &'static str;
    /// Fields accepted by `exists_by_field` and `find_by_field`.
    const QUERYABLE: &'static [&'static str];

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn created_at(&self) -> DateTime<Utc>;
    fn set_created_at(&mut self, at: DateTime<Utc>);
    fn set_updated_at(&mut self, at: DateTime<Utc>);
}

macro_rules! impl_entity {
    ($ty:ty, $collection:expr, $owner:expr, [$($field:expr),* $(,)?]) => {
        impl Entity for $ty {
            const COLLECTION: &'static str = $collection;
            const OWNER_FIELD: &'static str = $owner;
            const QUERYABLE: &'static [&'static str] = &[$($field),*];

            fn id(&self) -> &str {
                &self.id
            }

            fn set_id(&mut self, id: String) {
                self.id = id;
            }

            fn created_at(&self) -> DateTime<Utc> {
                self.created_at
            }

            fn set_created_at(&mut self, at: DateTime<Utc>) {
                self.created_at = at;
            }

            fn set_updated_at(&mut self, at: DateTime<Utc>) {
                self.updated_at = at;
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Scheduled,
    Published,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Revoked,
}

/// Error returned when a stored enum column holds an unknown value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    ($ty:ident, $kind:expr, { $($variant:ident => $text:literal),* $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),*
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)*
                    other => Err(ParseEnumError {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

string_enum!(Role, "role", { User => "user", Admin => "admin" });
string_enum!(PostStatus, "status", {
    Draft => "draft",
    Scheduled => "scheduled",
    Published => "published",
});
string_enum!(MediaKind, "media type", { Image => "image", Video => "video" });
string_enum!(AccountStatus, "account status", { Active => "active", Revoked => "revoked" });

impl MediaKind {
    /// Anything that is not declared as video is treated as an image.
    pub fn from_content_type(content_type: &str) -> Self {
        if content_type.trim().to_ascii_lowercase().starts_with("video/") {
            Self::Video
        } else {
            Self::Image
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: String, password_hash: String, name: String, now: DateTime<Utc>) -> Self {
        Self {
            id: String::new(),
            email,
            password_hash,
            name,
            role: Role::User,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl_entity!(User, "users", "id", ["id", "email", "role"]);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub title: Option<String>,
    pub content: String,
    pub platforms: Vec<String>,
    pub media_ids: Vec<String>,
    pub links: Vec<String>,
    pub status: PostStatus,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_entity!(Post, "posts", "user_id", ["id", "user_id", "status"]);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Media {
    pub id: String,
    pub user_id: String,
    pub post_id: Option<String>,
    pub url: String,
    pub kind: MediaKind,
    pub file_name: String,
    pub size: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Media {
    pub fn is_attached(&self) -> bool {
        self.post_id.is_some()
    }
}

impl_entity!(Media, "media", "user_id", ["id", "user_id", "post_id"]);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialAccount {
    pub id: String,
    pub user_id: String,
    pub platform: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub account_name: String,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl_entity!(
    SocialAccount,
    "social_accounts",
    "user_id",
    ["id", "user_id", "platform", "status"]
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analytics {
    pub id: String,
    pub post_id: String,
    pub platform: String,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    pub reach: i64,
    pub engagement: f64,
    pub recorded_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Analytics {
    pub fn record(
        post_id: String,
        platform: String,
        likes: i64,
        comments: i64,
        shares: i64,
        reach: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: String::new(),
            post_id,
            platform,
            likes,
            comments,
            shares,
            reach,
            engagement: engagement_ratio(likes, comments, shares, reach),
            recorded_at: now,
            created_at: now,
            updated_at: now,
        }
    }
}

impl_entity!(Analytics, "analytics", "post_id", ["id", "post_id", "platform"]);

/// Interactions per reached account. Zero reach yields zero.
pub fn engagement_ratio(likes: i64, comments: i64, shares: i64, reach: i64) -> f64 {
    if reach <= 0 {
        return 0.0;
    }
    // Summed as floats; counters near i64::MAX would overflow an integer sum
    (likes as f64 + comments as f64 + shares as f64) / reach as f64
}
