use chrono::Duration;

use crate::auth::jwt::{TokenIssuer, DEFAULT_TTL_MINUTES};
use crate::auth::password::CredentialStore;
use crate::config::Config;
use crate::db::DbPool;
use crate::documents::DocumentStore;
use crate::users::UserDirectory;

/// Shared application state passed to all handlers via axum State extractor.
/// Every component is built around the same injected store handle.
#[derive(Clone)]
pub struct AppState {
    pub users: UserDirectory,
    pub documents: DocumentStore,
    pub tokens: TokenIssuer,
    pub credentials: CredentialStore,
    /// Body limit for POST /upload
    pub max_upload_bytes: usize,
    /// Attach a permissive CORS layer
    pub cors_allow_any: bool,
}

impl AppState {
    pub fn new(db: DbPool, jwt_secret: Vec<u8>, config: &Config) -> Self {
        // Config::validate bounds the lifetime; fall back for unchecked configs
        let ttl = Duration::try_minutes(config.token_ttl_minutes)
            .unwrap_or_else(|| Duration::minutes(DEFAULT_TTL_MINUTES));

        Self {
            users: UserDirectory::new(db.clone()),
            documents: DocumentStore::new(db),
            tokens: TokenIssuer::new(jwt_secret, ttl),
            credentials: CredentialStore::new(config.bcrypt_cost),
            max_upload_bytes: config.max_upload_bytes(),
            cors_allow_any: config.cors_allow_any,
        }
    }
}
