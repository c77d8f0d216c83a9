//! PsyGrow API - Serviço HTTP de gestão clínica e financeira
//!
//! Expõe os repositórios de `psygrow-db` como uma API REST versionada,
//! com autenticação por token e isolamento de dados por profissional.

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod seed;
pub mod state;

/// Metadados gerados em tempo de build
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub use config::AppConfig;
pub use error::{ApiError, ApiResult};
pub use router::build_router;
pub use state::AppState;
