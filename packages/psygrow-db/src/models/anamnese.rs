//! Modelos de anamnese: templates, campos, opções e respostas de pacientes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::default_true;

/// Tipos de campo suportados no questionário
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum FieldType {
    Date,
    Datetime,
    Text,
    Number,
    Checkbox,
    Select,
    Multiselect,
}

impl FieldType {
    /// Apenas campos de seleção possuem lista de opções
    pub fn has_options(&self) -> bool {
        matches!(self, FieldType::Select | FieldType::Multiselect)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnamneseTemplate {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TemplateRequest {
    #[validate(length(min = 1, max = 100))]
    pub title: String,
}

/// Campo de um template, com suas opções já ordenadas
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnamneseField {
    pub id: Uuid,
    /// Template ao qual o campo pertence
    pub anamnese_id: Uuid,
    pub user_id: Uuid,
    /// Posição do campo no questionário
    pub field_number: i32,
    pub field_type: FieldType,
    pub field_title: String,
    pub field_required: bool,
    pub field_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    #[serde(default)]
    pub options: Vec<FieldOption>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AnamneseFieldRequest {
    #[validate(range(min = 1))]
    pub field_number: i32,
    pub field_type: FieldType,
    #[validate(length(min = 1, max = 255))]
    pub field_title: String,
    #[serde(default)]
    pub field_required: bool,
    #[serde(default = "default_true")]
    pub field_active: bool,
    /// Ignoradas quando o tipo não é de seleção
    #[serde(default)]
    #[validate]
    pub options: Vec<FieldOptionRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FieldOption {
    pub id: Uuid,
    pub anamnese_field_id: Uuid,
    pub option_value: String,
    pub option_order: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct FieldOptionRequest {
    #[validate(length(min = 1, max = 255))]
    pub option_value: String,
    #[serde(default)]
    pub option_order: i32,
}

/// Substituição completa das opções de um campo
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BulkOptionsRequest {
    #[validate]
    pub options: Vec<FieldOptionRequest>,
}

/// Anamnese respondida por um paciente
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PatientAnamnese {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub anamnese_id: Uuid,
    pub user_id: Uuid,
    pub answered_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PatientAnamneseRequest {
    pub patient_id: Uuid,
    pub anamnese_id: Uuid,
    #[serde(default)]
    #[validate]
    pub answers: Vec<AnswerRequest>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AnswerRequest {
    pub field_id: Uuid,
    #[validate(length(max = 5000))]
    pub value: String,
}

/// Resposta a um campo
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PatientAnamneseField {
    pub id: Uuid,
    pub patient_anamnese_id: Uuid,
    pub field_id: Uuid,
    pub value: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientAnamneseDetails {
    #[serde(flatten)]
    pub anamnese: PatientAnamnese,
    pub template_title: String,
    pub answers: Vec<PatientAnamneseField>,
}
