//! Atendimentos, sessões e evoluções clínicas

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::{RepasseRule, RepasseType};
use crate::validation::{check_not_blank, check_repasse_pair, check_time_window};

/// Status possíveis de um atendimento
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum AppointmentStatus {
    /// Agendado, ainda não realizado
    Scheduled,
    /// Realizado; gera a sessão
    Done,
    Canceled,
    /// Paciente não compareceu
    NoShow,
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Done => write!(f, "done"),
            AppointmentStatus::Canceled => write!(f, "canceled"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
        }
    }
}

/// Atendimento agendado
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Validate)]
#[validate(schema(function = "validate_appointment"))]
pub struct Appointment {
    /// Identificador único do atendimento
    pub id: Uuid,
    /// Tenant dono do registro
    pub user_id: Uuid,
    pub patient_id: Uuid,
    /// Profissional que realiza o atendimento
    pub professional_id: Uuid,
    pub cost_center_id: Uuid,
    /// Descrição do serviço (psicoterapia, avaliação...)
    #[validate(length(min = 2, max = 100))]
    pub service_title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    /// Sobrescrita do repasse apenas para este atendimento
    pub custom_repasse_type: Option<RepasseType>,
    pub custom_repasse_value: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn validate_appointment(appointment: &Appointment) -> Result<(), ValidationError> {
    check_time_window(&appointment.start_time, &appointment.end_time)?;
    check_repasse_pair(appointment.custom_repasse_type, appointment.custom_repasse_value)
}

impl Appointment {
    pub fn repasse_rule(&self) -> Option<RepasseRule> {
        RepasseRule::from_pair(self.custom_repasse_type, self.custom_repasse_value)
    }

    /// Aplica uma atualização parcial. A validação deve ser refeita depois.
    pub fn apply(&mut self, changes: AppointmentUpdate) {
        if let Some(patient_id) = changes.patient_id {
            self.patient_id = patient_id;
        }
        if let Some(professional_id) = changes.professional_id {
            self.professional_id = professional_id;
        }
        if let Some(cost_center_id) = changes.cost_center_id {
            self.cost_center_id = cost_center_id;
        }
        if let Some(title) = changes.service_title {
            self.service_title = title;
        }
        if let Some(start) = changes.start_time {
            self.start_time = start;
        }
        if let Some(end) = changes.end_time {
            self.end_time = end;
        }
        if let Some(status) = changes.status {
            self.status = status;
        }
        if let Some(notes) = changes.notes {
            self.notes = Some(notes);
        }
        if let Some(kind) = changes.custom_repasse_type {
            self.custom_repasse_type = Some(kind);
        }
        if let Some(value) = changes.custom_repasse_value {
            self.custom_repasse_value = Some(value);
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_appointment_request"))]
pub struct AppointmentRequest {
    pub patient_id: Uuid,
    /// Quando ausente, o próprio usuário autenticado
    pub professional_id: Option<Uuid>,
    pub cost_center_id: Uuid,
    #[validate(length(min = 2, max = 100))]
    pub service_title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    pub custom_repasse_type: Option<RepasseType>,
    pub custom_repasse_value: Option<i64>,
}

fn validate_appointment_request(req: &AppointmentRequest) -> Result<(), ValidationError> {
    check_time_window(&req.start_time, &req.end_time)?;
    check_repasse_pair(req.custom_repasse_type, req.custom_repasse_value)
}

/// Atualização parcial de atendimento
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct AppointmentUpdate {
    pub patient_id: Option<Uuid>,
    pub professional_id: Option<Uuid>,
    pub cost_center_id: Option<Uuid>,
    #[validate(length(min = 2, max = 100))]
    pub service_title: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: Option<AppointmentStatus>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    pub custom_repasse_type: Option<RepasseType>,
    pub custom_repasse_value: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentFilter {
    pub patient_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Sessão realizada; existe uma por atendimento concluído
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Validate)]
#[validate(schema(function = "validate_session"))]
pub struct Session {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub user_id: Uuid,
    pub patient_id: Uuid,
    pub professional_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub was_attended: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn validate_session(session: &Session) -> Result<(), ValidationError> {
    check_time_window(&session.start_time, &session.end_time)
}

impl Session {
    /// Sessão gerada ao concluir um atendimento: mesma janela, presença confirmada
    pub fn from_appointment(appointment: &Appointment) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            appointment_id: appointment.id,
            user_id: appointment.user_id,
            patient_id: appointment.patient_id,
            professional_id: appointment.professional_id,
            start_time: appointment.start_time,
            end_time: appointment.end_time,
            was_attended: true,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionFilter {
    pub patient_id: Option<Uuid>,
}

/// Evolução clínica; uma por sessão
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Evolution {
    pub id: Uuid,
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub professional_id: Uuid,
    pub patient_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EvolutionRequest {
    #[validate(length(min = 1, max = 20000), custom = "check_not_blank")]
    pub content: String,
}
