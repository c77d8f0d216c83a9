use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use super::{ensure_owned, Owned};
use crate::error::{DbError, DbResult};
use crate::models::{
    Appointment, CostCenter, CostCenterRequest, Payment, PaymentAppointment, PaymentDetails,
    PaymentFilter, PaymentRequest, Repasse, RepasseFilter, RepasseRequest, RepasseRule, RepasseStatus,
    RepasseType,
};
use crate::pagination::{Page, Paginated};

#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait CostCenterRepository: Send + Sync {
    async fn create(&self, user_id: Uuid, req: &CostCenterRequest) -> DbResult<CostCenter>;
    async fn find_by_id(&self, id: Uuid, user_id: Uuid) -> DbResult<CostCenter>;
    async fn list(&self, user_id: Uuid) -> DbResult<Vec<CostCenter>>;
    /// Persiste o centro de custo já mesclado e validado
    async fn update(&self, cost_center: &CostCenter) -> DbResult<CostCenter>;
    async fn delete(&self, id: Uuid, user_id: Uuid) -> DbResult<()>;
}

pub struct SqliteCostCenterRepository {
    pool: SqlitePool,
}

impl SqliteCostCenterRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CostCenterRepository for SqliteCostCenterRepository {
    async fn create(&self, user_id: Uuid, req: &CostCenterRequest) -> DbResult<CostCenter> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO cost_centers
                (id, user_id, name, repasse_model, repasse_type, repasse_value, active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(user_id)
        .bind(&req.name)
        .bind(req.repasse_model)
        .bind(req.repasse_type)
        .bind(req.repasse_value)
        .bind(req.active)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(cost_center_id = %id, "centro de custo criado");
        self.find_by_id(id, user_id).await
    }

    async fn find_by_id(&self, id: Uuid, user_id: Uuid) -> DbResult<CostCenter> {
        sqlx::query_as::<_, CostCenter>("SELECT * FROM cost_centers WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Centro de custo não encontrado"))
    }

    async fn list(&self, user_id: Uuid) -> DbResult<Vec<CostCenter>> {
        let centers = sqlx::query_as::<_, CostCenter>(
            "SELECT * FROM cost_centers WHERE user_id = ? ORDER BY name ASC, id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(centers)
    }

    async fn update(&self, cost_center: &CostCenter) -> DbResult<CostCenter> {
        let result = sqlx::query(
            "UPDATE cost_centers
             SET name = ?, repasse_model = ?, repasse_type = ?, repasse_value = ?, active = ?, updated_at = ?
             WHERE id = ? AND user_id = ?",
        )
        .bind(&cost_center.name)
        .bind(cost_center.repasse_model)
        .bind(cost_center.repasse_type)
        .bind(cost_center.repasse_value)
        .bind(cost_center.active)
        .bind(Utc::now())
        .bind(cost_center.id)
        .bind(cost_center.user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Centro de custo não encontrado"));
        }
        self.find_by_id(cost_center.id, cost_center.user_id).await
    }

    async fn delete(&self, id: Uuid, user_id: Uuid) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM cost_centers WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Centro de custo não encontrado"));
        }
        Ok(())
    }
}

#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Cria o pagamento e seus vínculos com atendimentos numa única transação
    async fn create(&self, user_id: Uuid, req: &PaymentRequest) -> DbResult<PaymentDetails>;
    async fn find_by_id(&self, id: Uuid, user_id: Uuid) -> DbResult<PaymentDetails>;
    async fn list(
        &self,
        user_id: Uuid,
        filter: &PaymentFilter,
        page: Page,
    ) -> DbResult<Paginated<Payment>>;
}

pub struct SqlitePaymentRepository {
    pool: SqlitePool,
}

impl SqlitePaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn push_payment_filters(qb: &mut QueryBuilder<'_, Sqlite>, user_id: Uuid, filter: &PaymentFilter) {
    qb.push(" WHERE user_id = ").push_bind(user_id);
    if let Some(patient_id) = filter.patient_id {
        qb.push(" AND patient_id = ").push_bind(patient_id);
    }
    if let Some(cost_center_id) = filter.cost_center_id {
        qb.push(" AND cost_center_id = ").push_bind(cost_center_id);
    }
}

#[async_trait]
impl PaymentRepository for SqlitePaymentRepository {
    async fn create(&self, user_id: Uuid, req: &PaymentRequest) -> DbResult<PaymentDetails> {
        // Pagamento validado antes de qualquer escrita
        req.validate()?;

        let mut tx = self.pool.begin().await?;
        ensure_owned(&mut tx, Owned::CostCenter, req.cost_center_id, user_id).await?;
        if let Some(patient_id) = req.patient_id {
            ensure_owned(&mut tx, Owned::Patient, patient_id, user_id).await?;
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO payments
                (id, user_id, patient_id, cost_center_id, payment_date, amount, method, notes, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(user_id)
        .bind(req.patient_id)
        .bind(req.cost_center_id)
        .bind(req.payment_date)
        .bind(req.amount)
        .bind(req.method)
        .bind(&req.notes)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        // Qualquer falha aqui descarta a transação inteira (rollback no drop)
        for raw_id in &req.appointment_ids {
            let appointment_id = Uuid::parse_str(raw_id.trim()).map_err(|_| {
                DbError::Validation(format!("ID de atendimento inválido: {}", raw_id))
            })?;
            ensure_owned(&mut tx, Owned::Appointment, appointment_id, user_id).await?;

            sqlx::query(
                "INSERT INTO payment_appointments (id, payment_id, appointment_id, created_at)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4())
            .bind(id)
            .bind(appointment_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(
            payment_id = %id,
            links = req.appointment_ids.len(),
            "pagamento registrado"
        );

        self.find_by_id(id, user_id).await
    }

    async fn find_by_id(&self, id: Uuid, user_id: Uuid) -> DbResult<PaymentDetails> {
        let payment =
            sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = ? AND user_id = ?")
                .bind(id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| DbError::not_found("Pagamento não encontrado"))?;

        let links = sqlx::query_as::<_, PaymentAppointment>(
            "SELECT * FROM payment_appointments WHERE payment_id = ? ORDER BY created_at, id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(PaymentDetails {
            payment,
            appointment_ids: links.into_iter().map(|link| link.appointment_id).collect(),
        })
    }

    async fn list(
        &self,
        user_id: Uuid,
        filter: &PaymentFilter,
        page: Page,
    ) -> DbResult<Paginated<Payment>> {
        let mut count_qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM payments");
        push_payment_filters(&mut count_qb, user_id, filter);
        let total = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM payments");
        push_payment_filters(&mut qb, user_id, filter);
        qb.push(" ORDER BY payment_date DESC, id DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);
        let payments = qb.build_query_as::<Payment>().fetch_all(&self.pool).await?;

        Ok(Paginated::new(payments, total, page))
    }
}

#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait RepasseRepository: Send + Sync {
    async fn create(&self, user_id: Uuid, req: &RepasseRequest) -> DbResult<Repasse>;
    async fn find_by_id(&self, id: Uuid, user_id: Uuid) -> DbResult<Repasse>;
    async fn list(&self, user_id: Uuid, filter: &RepasseFilter) -> DbResult<Vec<Repasse>>;
    /// Ao marcar como pago, registra `paid_at`; ao sair de pago, limpa
    async fn update_status(
        &self,
        id: Uuid,
        user_id: Uuid,
        status: RepasseStatus,
    ) -> DbResult<Repasse>;
}

pub struct SqliteRepasseRepository {
    pool: SqlitePool,
}

impl SqliteRepasseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RepasseRepository for SqliteRepasseRepository {
    async fn create(&self, user_id: Uuid, req: &RepasseRequest) -> DbResult<Repasse> {
        let mut tx = self.pool.begin().await?;

        let appointment = sqlx::query_as::<_, Appointment>(
            "SELECT * FROM appointments WHERE id = ? AND user_id = ?",
        )
        .bind(req.appointment_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("Atendimento não encontrado"))?;

        let cost_center = sqlx::query_as::<_, CostCenter>(
            "SELECT * FROM cost_centers WHERE id = ? AND user_id = ?",
        )
        .bind(req.cost_center_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("Centro de custo não encontrado"))?;

        let value = match (req.value, req.base_amount) {
            (Some(value), _) => value,
            (None, Some(base_amount)) => {
                let patient_rule = sqlx::query_as::<_, (Option<RepasseType>, Option<i64>)>(
                    "SELECT default_repasse_type, default_repasse_value FROM patients WHERE id = ? AND user_id = ?",
                )
                .bind(appointment.patient_id)
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?
                .and_then(|(kind, value)| RepasseRule::from_pair(kind, value));

                RepasseRule::effective(appointment.repasse_rule(), patient_rule, cost_center.rule())
                    .amount_for(base_amount)
            }
            (None, None) => {
                return Err(DbError::Validation(
                    "informe o valor do repasse ou o valor base para cálculo".to_string(),
                ))
            }
        };

        let does_clinic_receive = req
            .does_clinic_receive
            .unwrap_or_else(|| cost_center.repasse_model.clinic_receives());
        let status = req.status.unwrap_or(RepasseStatus::Pending);
        let now = Utc::now();
        let paid_at = (status == RepasseStatus::Paid).then_some(now);

        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO repasses
                (id, user_id, appointment_id, cost_center_id, value, does_clinic_receive, status, paid_at, notes, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(user_id)
        .bind(appointment.id)
        .bind(cost_center.id)
        .bind(value)
        .bind(does_clinic_receive)
        .bind(status)
        .bind(paid_at)
        .bind(&req.notes)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(repasse_id = %id, value, "repasse criado");
        self.find_by_id(id, user_id).await
    }

    async fn find_by_id(&self, id: Uuid, user_id: Uuid) -> DbResult<Repasse> {
        sqlx::query_as::<_, Repasse>("SELECT * FROM repasses WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Repasse não encontrado"))
    }

    async fn list(&self, user_id: Uuid, filter: &RepasseFilter) -> DbResult<Vec<Repasse>> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM repasses WHERE user_id = ");
        qb.push_bind(user_id);
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(appointment_id) = filter.appointment_id {
            qb.push(" AND appointment_id = ").push_bind(appointment_id);
        }
        qb.push(" ORDER BY created_at DESC, id DESC");

        let repasses = qb.build_query_as::<Repasse>().fetch_all(&self.pool).await?;
        Ok(repasses)
    }

    async fn update_status(
        &self,
        id: Uuid,
        user_id: Uuid,
        status: RepasseStatus,
    ) -> DbResult<Repasse> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE repasses
             SET status = ?,
                 paid_at = CASE WHEN ? THEN COALESCE(paid_at, ?) ELSE NULL END,
                 updated_at = ?
             WHERE id = ? AND user_id = ?",
        )
        .bind(status)
        .bind(status == RepasseStatus::Paid)
        .bind(now)
        .bind(now)
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Repasse não encontrado"));
        }
        info!(repasse_id = %id, %status, "status do repasse atualizado");
        self.find_by_id(id, user_id).await
    }
}
