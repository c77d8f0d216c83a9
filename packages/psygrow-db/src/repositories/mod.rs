//! Repositórios de acesso a dados
//!
//! Cada agregado expõe um trait assíncrono e uma implementação sobre SQLite.
//! Toda busca de registro de tenant filtra por `id` e `user_id` na mesma
//! consulta; registros de outro tenant simplesmente não existem.

use std::sync::Arc;

use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::error::{DbError, DbResult};

mod anamnese;
mod appointment;
mod financial;
mod lead;
mod patient;
mod user;

pub use anamnese::*;
pub use appointment::*;
pub use financial::*;
pub use lead::*;
pub use patient::*;
pub use user::*;

/// Conjunto de repositórios ligados a um mesmo pool
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub cost_centers: Arc<dyn CostCenterRepository>,
    pub patients: Arc<dyn PatientRepository>,
    pub families: Arc<dyn PatientFamilyRepository>,
    pub leads: Arc<dyn LeadRepository>,
    pub templates: Arc<dyn AnamneseTemplateRepository>,
    pub fields: Arc<dyn AnamneseFieldRepository>,
    pub options: Arc<dyn FieldOptionRepository>,
    pub patient_anamneses: Arc<dyn PatientAnamneseRepository>,
    pub appointments: Arc<dyn AppointmentRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub evolutions: Arc<dyn EvolutionRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub repasses: Arc<dyn RepasseRepository>,
}

impl Repositories {
    pub fn sqlite(pool: SqlitePool) -> Self {
        Self {
            users: Arc::new(SqliteUserRepository::new(pool.clone())),
            cost_centers: Arc::new(SqliteCostCenterRepository::new(pool.clone())),
            patients: Arc::new(SqlitePatientRepository::new(pool.clone())),
            families: Arc::new(SqlitePatientFamilyRepository::new(pool.clone())),
            leads: Arc::new(SqliteLeadRepository::new(pool.clone())),
            templates: Arc::new(SqliteAnamneseTemplateRepository::new(pool.clone())),
            fields: Arc::new(SqliteAnamneseFieldRepository::new(pool.clone())),
            options: Arc::new(SqliteFieldOptionRepository::new(pool.clone())),
            patient_anamneses: Arc::new(SqlitePatientAnamneseRepository::new(pool.clone())),
            appointments: Arc::new(SqliteAppointmentRepository::new(pool.clone())),
            sessions: Arc::new(SqliteSessionRepository::new(pool.clone())),
            evolutions: Arc::new(SqliteEvolutionRepository::new(pool.clone())),
            payments: Arc::new(SqlitePaymentRepository::new(pool.clone())),
            repasses: Arc::new(SqliteRepasseRepository::new(pool)),
        }
    }
}

/// Tabelas de tenant verificáveis por `ensure_owned`
#[derive(Debug, Clone, Copy)]
pub(crate) enum Owned {
    CostCenter,
    Patient,
    Appointment,
    Template,
}

impl Owned {
    fn table(&self) -> &'static str {
        match self {
            Owned::CostCenter => "cost_centers",
            Owned::Patient => "patients",
            Owned::Appointment => "appointments",
            Owned::Template => "anamnese_templates",
        }
    }

    fn not_found(&self) -> DbError {
        DbError::not_found(match self {
            Owned::CostCenter => "Centro de custo não encontrado",
            Owned::Patient => "Paciente não encontrado",
            Owned::Appointment => "Atendimento não encontrado",
            Owned::Template => "Template não encontrado",
        })
    }
}

/// Garante que o registro referenciado existe e pertence ao tenant
pub(crate) async fn ensure_owned(
    conn: &mut SqliteConnection,
    kind: Owned,
    id: Uuid,
    user_id: Uuid,
) -> DbResult<()> {
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE id = ? AND user_id = ?",
        kind.table()
    );
    let count: i64 = sqlx::query_scalar(&sql)
        .bind(id)
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;

    if count == 0 {
        return Err(kind.not_found());
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Banco temporário e registros mínimos para os testes de repositório

    use chrono::{NaiveDate, Utc};
    use sqlx::SqlitePool;
    use tempfile::TempDir;
    use uuid::Uuid;

    use crate::models::*;
    use crate::{init_db_pool, DbConfig};

    pub async fn test_pool() -> (TempDir, SqlitePool) {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = DbConfig {
            db_path: temp_dir.path().join("test.db").to_str().unwrap().to_string(),
            max_connections: 2,
        };
        let pool = init_db_pool(&config).await.unwrap();
        (temp_dir, pool)
    }

    pub async fn user(pool: &SqlitePool, email: &str) -> Uuid {
        let now = Utc::now();
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, role, is_active, created_at, updated_at)
             VALUES (?, 'Profissional', ?, 'hash', 'professional', 1, ?, ?)",
        )
        .bind(id)
        .bind(email)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .unwrap();
        id
    }

    pub fn cost_center_request() -> CostCenterRequest {
        CostCenterRequest {
            name: "Consultório Paulista".into(),
            repasse_model: RepasseModel::ProfessionalPays,
            repasse_type: RepasseType::Percent,
            repasse_value: 3000,
            active: true,
        }
    }

    pub fn patient_request(cost_center_id: Uuid, name: &str) -> PatientRequest {
        PatientRequest::minimal(
            cost_center_id,
            name.to_string(),
            NaiveDate::from_ymd_opt(1990, 1, 15).unwrap(),
        )
    }
}
