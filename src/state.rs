use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::TokenKeys;
use crate::config::Config;
use crate::store::Stores;
use crate::uploads::UploadDir;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Immutable per-process state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    pub config: Arc<Config>,
    pub tokens: TokenKeys,
    pub uploads: UploadDir,
}

impl AppState {
    pub fn new(stores: Stores, config: Config) -> Self {
        let tokens = TokenKeys::new(&config.auth.jwt_secret, config.auth.token_hours);
        let uploads = UploadDir::new(config.uploads_path(), &config.storage.public_prefix);
        Self {
            stores,
            config: Arc::new(config),
            tokens,
            uploads,
        }
    }
}
