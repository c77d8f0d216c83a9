//! Configuração do serviço via variáveis de ambiente

use psygrow_db::models::DEFAULT_ROLE;
use psygrow_db::DbConfig;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Variável de ambiente obrigatória ausente: {0}")]
    Missing(&'static str),

    #[error("Valor inválido para {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Conta administrativa criada na primeira execução
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Limite de requisições simultâneas em processamento
    pub max_concurrency: usize,
    pub db: DbConfig,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub default_admin: Option<AdminSeed>,
}

impl AppConfig {
    /// Lê a configuração do ambiente do processo
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Monta a configuração a partir de uma função de consulta de variáveis
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = var("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let default_admin = match (var("DEFAULT_ADMIN_EMAIL"), var("DEFAULT_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminSeed {
                email,
                password,
                name: var("DEFAULT_ADMIN_NAME").unwrap_or_else(|| "Administrador".to_string()),
                role: var("DEFAULT_ADMIN_ROLE").unwrap_or_else(|| DEFAULT_ROLE.to_string()),
            }),
            _ => None,
        };

        let db_defaults = DbConfig::default();

        Ok(Self {
            host: var("APP_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(var("APP_PORT"), "APP_PORT", 8080)?,
            max_concurrency: parse_or(var("APP_MAX_CONCURRENCY"), "APP_MAX_CONCURRENCY", 256)?,
            db: DbConfig {
                db_path: var("DATABASE_PATH").unwrap_or(db_defaults.db_path),
                max_connections: parse_or(
                    var("DB_MAX_CONNECTIONS"),
                    "DB_MAX_CONNECTIONS",
                    db_defaults.max_connections,
                )?,
            },
            jwt_secret,
            jwt_ttl_hours: parse_or(var("JWT_TTL_HOURS"), "JWT_TTL_HOURS", 24)?,
            default_admin,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: std::str::FromStr>(
    raw: Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
