// Relational adapter - SQLite tables with soft delete
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, ErrorCode, Row};
use std::marker::PhantomData;

use crate::models::{
    self, AccountStatus, Analytics, Entity, Media, MediaKind, Post, PostStatus, Role, SocialAccount,
    User,
};
use crate::state::DbPool;
use crate::store::{check_queryable, new_id, Repository, StoreError};

/// Row mapping for an entity. `COLUMNS[0]` must be `id`.
pub trait SqlRow: Entity {
    const COLUMNS: &'static [&'static str];

    fn to_values(&self) -> Result<Vec<Value>, StoreError>;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

pub struct SqliteRepository<E> {
    pool: DbPool,
    _entity: PhantomData<fn() -> E>,
}

impl<E: SqlRow> SqliteRepository<E> {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }

    fn select_sql(filter: &str) -> String {
        format!(
            "SELECT {} FROM {} WHERE {} = ?1 AND deleted_at IS NULL ORDER BY created_at DESC, id DESC",
            E::COLUMNS.join(", "),
            E::COLLECTION,
            filter
        )
    }

    fn query_many(&self, field: &str, value: &str) -> Result<Vec<E>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&Self::select_sql(field)).map_err(map_sql_error)?;
        let rows = stmt
            .query_map(params![value], |row| E::from_row(row))
            .map_err(map_sql_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sql_error)?;
        Ok(rows)
    }
}

#[async_trait]
impl<E: SqlRow> Repository<E> for SqliteRepository<E> {
    async fn create(&self, mut entity: E) -> Result<E, StoreError> {
        if entity.id().is_empty() {
            entity.set_id(new_id());
        }
        let now = models::now();
        entity.set_created_at(now);
        entity.set_updated_at(now);

        let placeholders = (1..=E::COLUMNS.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            E::COLLECTION,
            E::COLUMNS.join(", "),
            placeholders
        );

        let values = entity.to_values()?;
        let conn = self.pool.get()?;
        conn.execute(&sql, params_from_iter(values.iter()))
            .map_err(map_sql_error)?;

        tracing::debug!(table = E::COLLECTION, id = entity.id(), "row created");
        Ok(entity)
    }

    async fn get_by_id(&self, id: &str) -> Result<E, StoreError> {
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ?1 AND deleted_at IS NULL",
            E::COLUMNS.join(", "),
            E::COLLECTION
        );
        conn.query_row(&sql, params![id], |row| E::from_row(row))
            .map_err(map_sql_error)
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<E>, StoreError> {
        self.query_many(E::OWNER_FIELD, owner_id)
    }

    async fn update(&self, mut entity: E) -> Result<E, StoreError> {
        entity.set_updated_at(models::now());

        // created_at is never rewritten; its placeholder is bound but unused
        let assignments = E::COLUMNS
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, col)| **col != "created_at")
            .map(|(i, col)| format!("{} = ?{}", col, i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?1 AND deleted_at IS NULL",
            E::COLLECTION,
            assignments
        );

        let values = entity.to_values()?;
        let conn = self.pool.get()?;
        let changed = conn
            .execute(&sql, params_from_iter(values.iter()))
            .map_err(map_sql_error)?;
        if changed == 0 {
            return Err(StoreError::NotFound);
        }

        // Report what is actually stored, including the original created_at
        let created_at: String = conn
            .query_row(
                &format!("SELECT created_at FROM {} WHERE id = ?1", E::COLLECTION),
                params![entity.id()],
                |row| row.get(0),
            )
            .map_err(map_sql_error)?;
        entity.set_created_at(parse_timestamp(&created_at).map_err(map_sql_error)?);

        Ok(entity)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        let sql = format!(
            "UPDATE {} SET deleted_at = ?2 WHERE id = ?1 AND deleted_at IS NULL",
            E::COLLECTION
        );
        let changed = conn
            .execute(&sql, params![id, format_timestamp(models::now())])
            .map_err(map_sql_error)?;
        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        tracing::debug!(table = E::COLLECTION, id, "row soft-deleted");
        Ok(())
    }

    async fn exists_by_field(&self, field: &str, value: &str) -> Result<bool, StoreError> {
        check_queryable::<E>(field)?;
        let conn = self.pool.get()?;
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?1 AND deleted_at IS NULL)",
            E::COLLECTION,
            field
        );
        conn.query_row(&sql, params![value], |row| row.get(0))
            .map_err(map_sql_error)
    }

    async fn find_by_field(&self, field: &str, value: &str) -> Result<Vec<E>, StoreError> {
        check_queryable::<E>(field)?;
        self.query_many(field, value)
    }
}

/// Translate SQLite failures into the storage taxonomy.
pub(crate) fn map_sql_error(err: rusqlite::Error) -> StoreError {
    match err {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        rusqlite::Error::SqliteFailure(ref failure, ref msg) => {
            let detail = msg.clone().unwrap_or_else(|| failure.to_string());
            match failure.code {
                ErrorCode::ConstraintViolation => match failure.extended_code {
                    rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                        StoreError::DuplicateKey(detail)
                    }
                    _ => StoreError::Conflict(detail),
                },
                ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::CannotOpen
                | ErrorCode::SystemIoFailure => StoreError::Unavailable(detail),
                _ => StoreError::Backend(detail),
            }
        }
        other => StoreError::Backend(other.to_string()),
    }
}

fn parse_timestamp(text: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    parse_timestamp(&text)
        .map_err(|_| conversion_error(idx, format!("invalid timestamp: {}", text)))
}

fn optional_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| {
        parse_timestamp(&t).map_err(|_| conversion_error(idx, format!("invalid timestamp: {}", t)))
    })
    .transpose()
}

fn parsed<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let text: String = row.get(idx)?;
    text.parse::<T>()
        .map_err(|e| conversion_error(idx, e.to_string()))
}

fn string_list(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text).map_err(|e| conversion_error(idx, e.to_string()))
}

fn conversion_error(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, msg.into())
}

/// Fixed-width UTC text so that lexical order matches time order.
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn ts(at: DateTime<Utc>) -> Value {
    Value::Text(format_timestamp(at))
}

fn opt_text(text: Option<String>) -> Value {
    text.map(Value::Text).unwrap_or(Value::Null)
}

fn opt_ts(at: Option<DateTime<Utc>>) -> Value {
    at.map(ts).unwrap_or(Value::Null)
}

fn json_list(items: &[String]) -> Result<Value, StoreError> {
    Ok(Value::Text(serde_json::to_string(items)?))
}

impl SqlRow for User {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "created_at",
        "updated_at",
        "email",
        "password_hash",
        "name",
        "role",
    ];

    fn to_values(&self) -> Result<Vec<Value>, StoreError> {
        Ok(vec![
            Value::Text(self.id.clone()),
            ts(self.created_at),
            ts(self.updated_at),
            Value::Text(self.email.clone()),
            Value::Text(self.password_hash.clone()),
            Value::Text(self.name.clone()),
            Value::Text(self.role.as_str().to_string()),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            created_at: timestamp(row, 1)?,
            updated_at: timestamp(row, 2)?,
            email: row.get(3)?,
            password_hash: row.get(4)?,
            name: row.get(5)?,
            role: parsed::<Role>(row, 6)?,
        })
    }
}

impl SqlRow for Post {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "created_at",
        "updated_at",
        "user_id",
        "title",
        "content",
        "platforms",
        "media_ids",
        "links",
        "status",
        "scheduled_for",
        "published_at",
    ];

    fn to_values(&self) -> Result<Vec<Value>, StoreError> {
        Ok(vec![
            Value::Text(self.id.clone()),
            ts(self.created_at),
            ts(self.updated_at),
            Value::Text(self.user_id.clone()),
            opt_text(self.title.clone()),
            Value::Text(self.content.clone()),
            json_list(&self.platforms)?,
            json_list(&self.media_ids)?,
            json_list(&self.links)?,
            Value::Text(self.status.as_str().to_string()),
            opt_ts(self.scheduled_for),
            opt_ts(self.published_at),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Post {
            id: row.get(0)?,
            created_at: timestamp(row, 1)?,
            updated_at: timestamp(row, 2)?,
            user_id: row.get(3)?,
            title: row.get(4)?,
            content: row.get(5)?,
            platforms: string_list(row, 6)?,
            media_ids: string_list(row, 7)?,
            links: string_list(row, 8)?,
            status: parsed::<PostStatus>(row, 9)?,
            scheduled_for: optional_timestamp(row, 10)?,
            published_at: optional_timestamp(row, 11)?,
        })
    }
}

impl SqlRow for Media {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "created_at",
        "updated_at",
        "user_id",
        "post_id",
        "url",
        "kind",
        "file_name",
        "size",
    ];

    fn to_values(&self) -> Result<Vec<Value>, StoreError> {
        Ok(vec![
            Value::Text(self.id.clone()),
            ts(self.created_at),
            ts(self.updated_at),
            Value::Text(self.user_id.clone()),
            opt_text(self.post_id.clone()),
            Value::Text(self.url.clone()),
            Value::Text(self.kind.as_str().to_string()),
            Value::Text(self.file_name.clone()),
            Value::Integer(self.size),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Media {
            id: row.get(0)?,
            created_at: timestamp(row, 1)?,
            updated_at: timestamp(row, 2)?,
            user_id: row.get(3)?,
            post_id: row.get(4)?,
            url: row.get(5)?,
            kind: parsed::<MediaKind>(row, 6)?,
            file_name: row.get(7)?,
            size: row.get(8)?,
        })
    }
}

impl SqlRow for SocialAccount {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "created_at",
        "updated_at",
        "user_id",
        "platform",
        "access_token",
        "refresh_token",
        "account_name",
        "status",
    ];

    fn to_values(&self) -> Result<Vec<Value>, StoreError> {
        Ok(vec![
            Value::Text(self.id.clone()),
            ts(self.created_at),
            ts(self.updated_at),
            Value::Text(self.user_id.clone()),
            Value::Text(self.platform.clone()),
            Value::Text(self.access_token.clone()),
            opt_text(self.refresh_token.clone()),
            Value::Text(self.account_name.clone()),
            Value::Text(self.status.as_str().to_string()),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(SocialAccount {
            id: row.get(0)?,
            created_at: timestamp(row, 1)?,
            updated_at: timestamp(row, 2)?,
            user_id: row.get(3)?,
            platform: row.get(4)?,
            access_token: row.get(5)?,
            refresh_token: row.get(6)?,
            account_name: row.get(7)?,
            status: parsed::<AccountStatus>(row, 8)?,
        })
    }
}

impl SqlRow for Analytics {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "created_at",
        "updated_at",
        "post_id",
        "platform",
        "likes",
        "comments",
        "shares",
        "reach",
        "engagement",
        "recorded_at",
    ];

    fn to_values(&self) -> Result<Vec<Value>, StoreError> {
        Ok(vec![
            Value::Text(self.id.clone()),
            ts(self.created_at),
            ts(self.updated_at),
            Value::Text(self.post_id.clone()),
            Value::Text(self.platform.clone()),
            Value::Integer(self.likes),
            Value::Integer(self.comments),
            Value::Integer(self.shares),
            Value::Integer(self.reach),
            Value::Real(self.engagement),
            ts(self.recorded_at),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Analytics {
            id: row.get(0)?,
            created_at: timestamp(row, 1)?,
            updated_at: timestamp(row, 2)?,
            post_id: row.get(3)?,
            platform: row.get(4)?,
            likes: row.get(5)?,
            comments: row.get(6)?,
            shares: row.get(7)?,
            reach: row.get(8)?,
            engagement: row.get(9)?,
            recorded_at: timestamp(row, 10)?,
        })
    }
}
