//! Pacientes e familiares

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::{default_true, RepasseRule, RepasseType};
use crate::validation::check_repasse_pair;

/// Paciente de um profissional, vinculado a um centro de custo
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Patient {
    pub id: Uuid,
    pub user_id: Uuid,
    pub cost_center_id: Uuid,
    /// Nome do centro de custo (preenchido via JOIN nas consultas)
    pub cost_center_name: Option<String>,
    pub full_name: String,
    /// Nome social, quando diferente do civil
    pub social_name: Option<String>,
    pub birth_date: NaiveDate,
    /// CPF ou outro documento
    pub document: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub gender: Option<String>,
    pub address: Option<String>,
    /// Com quem o paciente mora
    pub resides_with: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub observation: Option<String>,
    /// Sobrescrita padrão do repasse para os atendimentos deste paciente
    pub default_repasse_type: Option<RepasseType>,
    pub default_repasse_value: Option<i64>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    pub fn repasse_rule(&self) -> Option<RepasseRule> {
        RepasseRule::from_pair(self.default_repasse_type, self.default_repasse_value)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_patient_request"))]
pub struct PatientRequest {
    pub cost_center_id: Uuid,
    #[validate(length(min = 2, max = 100))]
    pub full_name: String,
    #[validate(length(max = 100))]
    pub social_name: Option<String>,
    pub birth_date: NaiveDate,
    #[validate(length(max = 20))]
    pub document: Option<String>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 20))]
    pub gender: Option<String>,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    #[validate(length(max = 100))]
    pub resides_with: Option<String>,
    #[validate(length(max = 100))]
    pub emergency_contact_name: Option<String>,
    #[validate(length(max = 20))]
    pub emergency_contact_phone: Option<String>,
    #[validate(length(max = 1000))]
    pub observation: Option<String>,
    pub default_repasse_type: Option<RepasseType>,
    pub default_repasse_value: Option<i64>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn validate_patient_request(req: &PatientRequest) -> Result<(), ValidationError> {
    check_repasse_pair(req.default_repasse_type, req.default_repasse_value)
}

impl PatientRequest {
    /// Cadastro mínimo usado na conversão de lead
    pub fn minimal(cost_center_id: Uuid, full_name: String, birth_date: NaiveDate) -> Self {
        Self {
            cost_center_id,
            full_name,
            social_name: None,
            birth_date,
            document: None,
            phone: None,
            email: None,
            gender: None,
            address: None,
            resides_with: None,
            emergency_contact_name: None,
            emergency_contact_phone: None,
            observation: None,
            default_repasse_type: None,
            default_repasse_value: None,
            active: true,
        }
    }
}

/// Filtros da listagem de pacientes
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientFilter {
    /// Busca parcial, sem diferenciar maiúsculas
    pub name: Option<String>,
    pub cost_center_id: Option<Uuid>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Relationship {
    Father,
    Mother,
    Spouse,
    Child,
    Guardian,
    Grandparent,
    Sibling,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PatientFamily {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub relationship: Relationship,
    pub name: String,
    pub birth_date: Option<NaiveDate>,
    pub schooling: Option<String>,
    pub occupation: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PatientFamilyRequest {
    pub relationship: Relationship,
    #[validate(length(min = 2, max = 100))]
    pub name: String,
    pub birth_date: Option<NaiveDate>,
    #[validate(length(max = 100))]
    pub schooling: Option<String>,
    #[validate(length(max = 100))]
    pub occupation: Option<String>,
}
