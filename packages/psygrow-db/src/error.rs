//! Definições de erro para a biblioteca psygrow-db
//!
//! Este módulo define os tipos de erro usados pelos repositórios

use thiserror::Error;

/// Erros específicos para operações de banco de dados
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Erro de conexão com banco de dados: {0}")]
    ConnectionError(String),

    #[error("Erro de migração: {0}")]
    MigrationError(String),

    #[error("Erro de consulta: {0}")]
    QueryError(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Violação de restrição: {0}")]
    ConstraintViolation(String),

    /// Regra de negócio violada dentro de uma operação composta
    #[error("Dados inválidos: {0}")]
    Validation(String),

    #[error("Erro interno: {0}")]
    InternalError(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Códigos estendidos do SQLite para violações de restrição
/// (UNIQUE, PRIMARY KEY, FOREIGN KEY, NOT NULL, CHECK)
const SQLITE_CONSTRAINT_CODES: &[&str] = &["19", "2067", "1555", "787", "1299", "275"];

/// Conversão de erros específicos do SQLx para nossos tipos de erro
impl From<sqlx::Error> for DbError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => DbError::NotFound("Registro não encontrado".to_string()),
            sqlx::Error::Database(dbe) => {
                if let Some(code) = dbe.code() {
                    if SQLITE_CONSTRAINT_CODES.contains(&code.as_ref()) {
                        return DbError::ConstraintViolation(dbe.message().to_string());
                    }
                }
                DbError::QueryError(dbe.message().to_string())
            }
            sqlx::Error::ColumnNotFound(col) => {
                DbError::QueryError(format!("Coluna não encontrada: {}", col))
            }
            sqlx::Error::TypeNotFound { type_name } => {
                DbError::QueryError(format!("Tipo não encontrado: {}", type_name))
            }
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::QueryError(format!("Erro ao decodificar coluna {}: {}", index, source))
            }
            sqlx::Error::Io(io_err) => DbError::ConnectionError(io_err.to_string()),
            sqlx::Error::Configuration(conf_err) => DbError::ConnectionError(conf_err.to_string()),
            sqlx::Error::PoolClosed => {
                DbError::ConnectionError("Pool de conexões fechado".to_string())
            }
            sqlx::Error::PoolTimedOut => {
                DbError::ConnectionError("Timeout no pool de conexões".to_string())
            }
            sqlx::Error::WorkerCrashed => {
                DbError::InternalError("Worker do banco de dados falhou".to_string())
            }
            _ => DbError::InternalError(format!("Erro inesperado: {:?}", error)),
        }
    }
}

impl From<validator::ValidationErrors> for DbError {
    fn from(errors: validator::ValidationErrors) -> Self {
        DbError::Validation(errors.to_string())
    }
}

impl DbError {
    /// Erro de "não encontrado" com a mensagem exibida ao cliente
    pub fn not_found(message: &str) -> Self {
        DbError::NotFound(message.to_string())
    }
}
