//! Paginação por limit/offset usada nas listagens

use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: i64 = 10;
pub const DEFAULT_OFFSET: i64 = 0;

/// Janela de paginação já normalizada.
///
/// Limites não positivos e offsets negativos voltam silenciosamente aos
/// valores padrão; nunca geram erro.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: DEFAULT_OFFSET,
        }
    }
}

impl Page {
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        let limit = match limit {
            Some(l) if l > 0 => l,
            _ => DEFAULT_LIMIT,
        };
        let offset = match offset {
            Some(o) if o >= 0 => o,
            _ => DEFAULT_OFFSET,
        };
        Self { limit, offset }
    }

    /// Interpreta os parâmetros crus da query string; valores ilegíveis
    /// recebem o padrão
    pub fn parse(limit: Option<&str>, offset: Option<&str>) -> Self {
        Self::new(
            limit.and_then(|l| l.trim().parse().ok()),
            offset.and_then(|o| o.trim().parse().ok()),
        )
    }
}

/// Resposta paginada: `{data, total, limit, offset}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, total: i64, page: Page) -> Self {
        Self {
            data,
            total,
            limit: page.limit,
            offset: page.offset,
        }
    }
}
