// Storage port - every backend implements the same per-entity repository
pub mod document;
pub mod mappings;
pub mod sqlite;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::models::{Analytics, Entity, Media, Post, SocialAccount, User};
use crate::state::DbPool;

pub use document::{DocumentClient, DocumentRepository};
pub use sqlite::SqliteRepository;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found")]
    NotFound,

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<r2d2::Error> for StoreError {
    fn from(err: r2d2::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Operations the post engine needs from a backing store, per entity type.
///
/// Every call is a single independent request against the store. Nothing is
/// cached and no call spans more than one entity.
#[async_trait]
pub trait Repository<E: Entity>: Send + Sync {
    /// Persist a new entity. Assigns an id when the entity has none and stamps
    /// both timestamps. Returns the stored entity.
    async fn create(&self, entity: E) -> Result<E, StoreError>;

    async fn get_by_id(&self, id: &str) -> Result<E, StoreError>;

    /// All live entities whose `E::OWNER_FIELD` equals `owner_id`, newest first.
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<E>, StoreError>;

    /// Replace the stored entity with the same id, re-stamping `updated_at`.
    async fn update(&self, entity: E) -> Result<E, StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    async fn exists_by_field(&self, field: &str, value: &str) -> Result<bool, StoreError>;

    async fn find_by_field(&self, field: &str, value: &str) -> Result<Vec<E>, StoreError>;
}

/// Reject field names the entity does not declare as queryable.
pub(crate) fn check_queryable<E: Entity>(field: &str) -> Result<(), StoreError> {
    if E::QUERYABLE.contains(&field) {
        Ok(())
    } else {
        Err(StoreError::UnknownField(format!(
            "{}.{}",
            E::COLLECTION,
            field
        )))
    }
}

/// Fresh server-side identifier.
pub(crate) fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// One repository per entity, all backed by the same store.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn Repository<User>>,
    pub posts: Arc<dyn Repository<Post>>,
    pub media: Arc<dyn Repository<Media>>,
    pub social_accounts: Arc<dyn Repository<SocialAccount>>,
    pub analytics: Arc<dyn Repository<Analytics>>,
}

impl Stores {
    pub fn sqlite(pool: DbPool) -> Self {
        Self {
            users: Arc::new(SqliteRepository::<User>::new(pool.clone())),
            posts: Arc::new(SqliteRepository::<Post>::new(pool.clone())),
            media: Arc::new(SqliteRepository::<Media>::new(pool.clone())),
            social_accounts: Arc::new(SqliteRepository::<SocialAccount>::new(pool.clone())),
            analytics: Arc::new(SqliteRepository::<Analytics>::new(pool)),
        }
    }

    pub fn document(client: DocumentClient) -> Self {
        Self {
            users: Arc::new(DocumentRepository::<User>::new(client.clone())),
            posts: Arc::new(DocumentRepository::<Post>::new(client.clone())),
            media: Arc::new(DocumentRepository::<Media>::new(client.clone())),
            social_accounts: Arc::new(DocumentRepository::<SocialAccount>::new(client.clone())),
            analytics: Arc::new(DocumentRepository::<Analytics>::new(client)),
        }
    }
}
