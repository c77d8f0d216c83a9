//! Leads: pré-cadastro de possíveis pacientes

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    InAnalysis,
    /// Só alcançado pela operação de conversão
    Converted,
    Lost,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Lead {
    pub id: Uuid,
    pub user_id: Uuid,
    pub full_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub birth_date: Option<NaiveDate>,
    /// Data do primeiro contato
    pub contact_date: DateTime<Utc>,
    pub status: LeadStatus,
    pub was_attended: bool,
    pub converted_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    /// Canal de origem (Instagram, indicação...)
    pub origin: Option<String>,
    /// Lead pediu para não ser contatado (LGPD)
    pub gdpr_block_contact: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LeadRequest {
    #[validate(length(min = 2, max = 100))]
    pub full_name: String,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub contact_date: DateTime<Utc>,
    #[validate(custom = "validate_manual_status")]
    pub status: Option<LeadStatus>,
    #[serde(default)]
    pub was_attended: bool,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    #[validate(length(max = 100))]
    pub origin: Option<String>,
    #[serde(default)]
    pub gdpr_block_contact: bool,
}

fn validate_manual_status(status: &LeadStatus) -> Result<(), ValidationError> {
    if *status == LeadStatus::Converted {
        let mut error = ValidationError::new("converted_requires_conversion");
        error.message = Some("use a conversão para marcar o lead como convertido".into());
        return Err(error);
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ConvertLeadRequest {
    pub cost_center_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadConversion {
    pub message: String,
    pub patient_id: Uuid,
}

/// Filtros da listagem de leads
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeadFilter {
    pub status: Option<LeadStatus>,
    pub origin: Option<String>,
    pub was_attended: Option<bool>,
    pub contact_from: Option<DateTime<Utc>>,
    pub contact_to: Option<DateTime<Utc>>,
}
