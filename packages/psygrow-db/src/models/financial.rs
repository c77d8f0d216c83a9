//! Centros de custo, pagamentos e repasses

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::default_true;
use crate::validation::{check_repasse_pair, MAX_PERCENT_BASIS_POINTS};

/// Quem paga o repasse no centro de custo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum RepasseModel {
    /// A clínica paga o profissional
    ClinicPays,
    /// O profissional paga a clínica
    ProfessionalPays,
}

impl RepasseModel {
    /// Sentido do repasse: a clínica recebe quando o profissional paga
    pub fn clinic_receives(&self) -> bool {
        matches!(self, RepasseModel::ProfessionalPays)
    }
}

/// Forma de cálculo do repasse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum RepasseType {
    /// Valor em pontos-base (10000 = 100%)
    Percent,
    /// Valor em centavos
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PaymentMethod {
    Pix,
    Cash,
    Card,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum RepasseStatus {
    Pending,
    Paid,
    /// Apenas registro, sem cobrança
    Informational,
}

impl std::fmt::Display for RepasseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepasseStatus::Pending => write!(f, "pending"),
            RepasseStatus::Paid => write!(f, "paid"),
            RepasseStatus::Informational => write!(f, "informational"),
        }
    }
}

/// Regra efetiva de repasse (tipo + valor)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepasseRule {
    pub kind: RepasseType,
    pub value: i64,
}

impl RepasseRule {
    pub fn new(kind: RepasseType, value: i64) -> Self {
        Self { kind, value }
    }

    /// Monta a regra a partir de um par opcional; só existe se ambos estiverem preenchidos
    pub fn from_pair(kind: Option<RepasseType>, value: Option<i64>) -> Option<Self> {
        match (kind, value) {
            (Some(kind), Some(value)) => Some(Self { kind, value }),
            _ => None,
        }
    }

    /// Precedência: sobrescrita do atendimento > padrão do paciente > centro de custo
    pub fn effective(
        appointment: Option<RepasseRule>,
        patient: Option<RepasseRule>,
        cost_center: RepasseRule,
    ) -> RepasseRule {
        appointment.or(patient).unwrap_or(cost_center)
    }

    /// Valor do repasse em centavos sobre um montante base.
    /// Percentual arredonda para baixo.
    pub fn amount_for(&self, base_amount: i64) -> i64 {
        match self.kind {
            RepasseType::Percent => {
                let amount = i128::from(base_amount) * i128::from(self.value)
                    / i128::from(MAX_PERCENT_BASIS_POINTS);
                i64::try_from(amount).unwrap_or(i64::MAX)
            }
            RepasseType::Fixed => self.value,
        }
    }
}

/// Centro de custo: local de atendimento e sua regra de repasse
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Validate)]
#[validate(schema(function = "validate_cost_center"))]
pub struct CostCenter {
    pub id: Uuid,
    pub user_id: Uuid,
    #[validate(length(min = 2, max = 100))]
    pub name: String,
    pub repasse_model: RepasseModel,
    pub repasse_type: RepasseType,
    pub repasse_value: i64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CostCenter {
    pub fn rule(&self) -> RepasseRule {
        RepasseRule::new(self.repasse_type, self.repasse_value)
    }

    /// Aplica uma atualização parcial; a validação deve ser refeita depois
    pub fn apply(&mut self, changes: CostCenterUpdate) {
        if let Some(name) = changes.name {
            self.name = name;
        }
        if let Some(model) = changes.repasse_model {
            self.repasse_model = model;
        }
        if let Some(kind) = changes.repasse_type {
            self.repasse_type = kind;
        }
        if let Some(value) = changes.repasse_value {
            self.repasse_value = value;
        }
        if let Some(active) = changes.active {
            self.active = active;
        }
    }
}

fn validate_cost_center(cc: &CostCenter) -> Result<(), ValidationError> {
    check_repasse_pair(Some(cc.repasse_type), Some(cc.repasse_value))
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_cost_center_request"))]
pub struct CostCenterRequest {
    #[validate(length(min = 2, max = 100))]
    pub name: String,
    pub repasse_model: RepasseModel,
    pub repasse_type: RepasseType,
    pub repasse_value: i64,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn validate_cost_center_request(req: &CostCenterRequest) -> Result<(), ValidationError> {
    check_repasse_pair(Some(req.repasse_type), Some(req.repasse_value))
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CostCenterUpdate {
    #[validate(length(min = 2, max = 100))]
    pub name: Option<String>,
    pub repasse_model: Option<RepasseModel>,
    pub repasse_type: Option<RepasseType>,
    pub repasse_value: Option<i64>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub patient_id: Option<Uuid>,
    pub cost_center_id: Uuid,
    pub payment_date: DateTime<Utc>,
    /// Valor em centavos
    pub amount: i64,
    pub method: PaymentMethod,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Pagamento com os atendimentos que ele quita
#[derive(Debug, Clone, Validate, Deserialize)]
pub struct PaymentRequest {
    pub patient_id: Option<Uuid>,
    pub cost_center_id: Uuid,
    pub payment_date: DateTime<Utc>,
    #[validate(range(min = 1))]
    pub amount: i64,
    pub method: PaymentMethod,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    /// IDs crus; são interpretados dentro da transação
    #[serde(default)]
    pub appointment_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentAppointment {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub appointment_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentDetails {
    #[serde(flatten)]
    pub payment: Payment,
    pub appointment_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentFilter {
    pub patient_id: Option<Uuid>,
    pub cost_center_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Repasse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub appointment_id: Uuid,
    pub cost_center_id: Uuid,
    /// Valor em centavos
    pub value: i64,
    pub does_clinic_receive: bool,
    pub status: RepasseStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Criação de repasse. Sem `value`, o valor é calculado sobre `base_amount`
/// com a regra efetiva do atendimento.
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_repasse_request"))]
pub struct RepasseRequest {
    pub appointment_id: Uuid,
    pub cost_center_id: Uuid,
    #[validate(range(min = 0))]
    pub value: Option<i64>,
    #[validate(range(min = 0))]
    pub base_amount: Option<i64>,
    pub does_clinic_receive: Option<bool>,
    pub status: Option<RepasseStatus>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

fn validate_repasse_request(req: &RepasseRequest) -> Result<(), ValidationError> {
    if req.value.is_none() && req.base_amount.is_none() {
        let mut error = ValidationError::new("repasse_value_missing");
        error.message = Some("informe o valor do repasse ou o valor base para cálculo".into());
        return Err(error);
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RepasseStatusUpdate {
    pub status: RepasseStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepasseFilter {
    pub status: Option<RepasseStatus>,
    pub appointment_id: Option<Uuid>,
}
