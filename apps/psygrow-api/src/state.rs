use std::sync::Arc;

use psygrow_db::Repositories;
use sqlx::SqlitePool;

use crate::auth::TokenService;

/// Estado compartilhado entre os handlers
#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
    pub tokens: Arc<TokenService>,
    /// Usado apenas pelo health check
    pub pool: SqlitePool,
}

impl AppState {
    pub fn new(pool: SqlitePool, tokens: TokenService) -> Self {
        Self {
            repos: Repositories::sqlite(pool.clone()),
            tokens: Arc::new(tokens),
            pool,
        }
    }
}
