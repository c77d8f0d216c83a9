//! Extratores e conversores de parâmetros compartilhados pelos handlers

use std::collections::HashMap;

use axum::async_trait;
use axum::body::HttpBody;
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::request::Parts;
use axum::http::Request;
use axum::{BoxError, Json};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use psygrow_db::Page;
use serde::de::DeserializeOwned;
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiError;

/// Usuário autenticado, injetado pelo middleware de autenticação
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub role: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("Usuário não autenticado".to_string()))
    }
}

/// Corpo JSON desserializado e validado
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S, B> FromRequest<S, B> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
    B: HttpBody + Send + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request<B>, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

/// Converte um parâmetro de rota em UUID; formato inválido vira 400
pub fn parse_id(raw: &str, name: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::BadRequest(format!("{} inválido", name)))
}

/// Parâmetros de query crus. Filtros com formato inválido viram 400;
/// paginação inválida volta ao padrão.
#[derive(Debug, Default)]
pub struct QueryParams(HashMap<String, String>);

impl QueryParams {
    pub fn new(params: HashMap<String, String>) -> Self {
        Self(params)
    }

    fn raw(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn page(&self) -> Page {
        Page::parse(self.raw("limit"), self.raw("offset"))
    }

    pub fn text(&self, key: &str) -> Option<String> {
        self.raw(key).map(str::to_string)
    }

    pub fn uuid(&self, key: &str) -> Result<Option<Uuid>, ApiError> {
        self.raw(key).map(|v| parse_id(v, key)).transpose()
    }

    pub fn boolean(&self, key: &str) -> Result<Option<bool>, ApiError> {
        self.raw(key)
            .map(|v| match v.to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                _ => Err(invalid(key)),
            })
            .transpose()
    }

    /// Aceita RFC 3339 ou apenas a data (início do dia em UTC)
    pub fn datetime(&self, key: &str) -> Result<Option<DateTime<Utc>>, ApiError> {
        self.raw(key)
            .map(|v| {
                if let Ok(dt) = DateTime::parse_from_rfc3339(v) {
                    return Ok(dt.with_timezone(&Utc));
                }
                NaiveDate::parse_from_str(v, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|dt| Utc.from_utc_datetime(&dt))
                    .ok_or_else(|| invalid(key))
            })
            .transpose()
    }

    /// Enums em snake_case, como aparecem no JSON
    pub fn variant<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ApiError> {
        self.raw(key)
            .map(|v| {
                serde_json::from_value(serde_json::Value::String(v.to_string()))
                    .map_err(|_| invalid(key))
            })
            .transpose()
    }
}

fn invalid(key: &str) -> ApiError {
    ApiError::BadRequest(format!("Filtro inválido: {}", key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use psygrow_db::models::LeadStatus;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        QueryParams::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_pagination_falls_back_to_defaults() {
        assert_eq!(params(&[("limit", "0")]).page(), Page::default());
        assert_eq!(params(&[("limit", "-5"), ("offset", "-1")]).page(), Page::default());
        assert_eq!(params(&[("limit", "abc")]).page(), Page::default());
        assert_eq!(params(&[("limit", "25"), ("offset", "5")]).page(), Page::new(Some(25), Some(5)));
    }

    #[test]
    fn test_filters() {
        let q = params(&[
            ("status", "in_analysis"),
            ("was_attended", "true"),
            ("contact_from", "2024-03-01"),
            ("origin", "  "),
        ]);
        assert_eq!(q.variant::<LeadStatus>("status").unwrap(), Some(LeadStatus::InAnalysis));
        assert_eq!(q.boolean("was_attended").unwrap(), Some(true));
        assert_eq!(
            q.datetime("contact_from").unwrap().unwrap().to_rfc3339(),
            "2024-03-01T00:00:00+00:00"
        );
        assert_eq!(q.text("origin"), None);
    }

    #[test]
    fn test_bad_filters_are_rejected() {
        let q = params(&[("status", "archived"), ("patient_id", "123"), ("active", "talvez")]);
        assert!(q.variant::<LeadStatus>("status").is_err());
        assert!(q.uuid("patient_id").is_err());
        assert!(q.boolean("active").is_err());
    }
}
