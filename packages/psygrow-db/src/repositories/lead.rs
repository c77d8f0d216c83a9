use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::info;
use uuid::Uuid;

use super::patient::insert_patient;
use super::{ensure_owned, Owned};
use crate::error::{DbError, DbResult};
use crate::models::{Lead, LeadFilter, LeadRequest, LeadStatus, PatientRequest};
use crate::pagination::{Page, Paginated};

#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait LeadRepository: Send + Sync {
    async fn create(&self, user_id: Uuid, req: &LeadRequest) -> DbResult<Lead>;
    async fn find_by_id(&self, id: Uuid, user_id: Uuid) -> DbResult<Lead>;
    async fn list(&self, user_id: Uuid, filter: &LeadFilter, page: Page)
        -> DbResult<Paginated<Lead>>;
    async fn update(&self, id: Uuid, user_id: Uuid, req: &LeadRequest) -> DbResult<Lead>;
    async fn delete(&self, id: Uuid, user_id: Uuid) -> DbResult<()>;
    /// Cria o paciente a partir do lead e marca o lead como convertido,
    /// tudo na mesma transação. Retorna o ID do novo paciente.
    async fn convert_to_patient(
        &self,
        id: Uuid,
        user_id: Uuid,
        cost_center_id: Uuid,
    ) -> DbResult<Uuid>;
}

pub struct SqliteLeadRepository {
    pool: SqlitePool,
}

impl SqliteLeadRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn push_lead_filters(qb: &mut QueryBuilder<'_, Sqlite>, user_id: Uuid, filter: &LeadFilter) {
    qb.push(" WHERE user_id = ").push_bind(user_id);
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(origin) = filter.origin.as_deref().map(str::trim).filter(|o| !o.is_empty()) {
        qb.push(" AND origin = ").push_bind(origin.to_string());
    }
    if let Some(was_attended) = filter.was_attended {
        qb.push(" AND was_attended = ").push_bind(was_attended);
    }
    if let Some(from) = filter.contact_from {
        qb.push(" AND contact_date >= ").push_bind(from);
    }
    if let Some(to) = filter.contact_to {
        qb.push(" AND contact_date <= ").push_bind(to);
    }
}

#[async_trait]
impl LeadRepository for SqliteLeadRepository {
    async fn create(&self, user_id: Uuid, req: &LeadRequest) -> DbResult<Lead> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO leads (
                id, user_id, full_name, phone, email, birth_date, contact_date, status,
                was_attended, notes, origin, gdpr_block_contact, created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(user_id)
        .bind(&req.full_name)
        .bind(&req.phone)
        .bind(&req.email)
        .bind(req.birth_date)
        .bind(req.contact_date)
        .bind(req.status.unwrap_or(LeadStatus::New))
        .bind(req.was_attended)
        .bind(&req.notes)
        .bind(&req.origin)
        .bind(req.gdpr_block_contact)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_id(id, user_id).await
    }

    async fn find_by_id(&self, id: Uuid, user_id: Uuid) -> DbResult<Lead> {
        sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Lead não encontrado"))
    }

    async fn list(
        &self,
        user_id: Uuid,
        filter: &LeadFilter,
        page: Page,
    ) -> DbResult<Paginated<Lead>> {
        let mut count_qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM leads");
        push_lead_filters(&mut count_qb, user_id, filter);
        let total = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM leads");
        push_lead_filters(&mut qb, user_id, filter);
        // Filtro por período de contato ordena pela data do contato
        if filter.contact_from.is_some() || filter.contact_to.is_some() {
            qb.push(" ORDER BY contact_date DESC, id DESC");
        } else {
            qb.push(" ORDER BY created_at DESC, id DESC");
        }
        qb.push(" LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);
        let leads = qb.build_query_as::<Lead>().fetch_all(&self.pool).await?;

        Ok(Paginated::new(leads, total, page))
    }

    async fn update(&self, id: Uuid, user_id: Uuid, req: &LeadRequest) -> DbResult<Lead> {
        let mut tx = self.pool.begin().await?;
        let current: LeadStatus =
            sqlx::query_scalar("SELECT status FROM leads WHERE id = ? AND user_id = ?")
                .bind(id)
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| DbError::not_found("Lead não encontrado"))?;

        // Lead convertido tem status definitivo
        if current == LeadStatus::Converted && req.status.is_some() {
            return Err(DbError::Validation(
                "status de lead convertido não pode ser alterado".to_string(),
            ));
        }

        sqlx::query(
            "UPDATE leads SET
                full_name = ?, phone = ?, email = ?, birth_date = ?, contact_date = ?,
                status = COALESCE(?, status), was_attended = ?, notes = ?, origin = ?,
                gdpr_block_contact = ?, updated_at = ?
             WHERE id = ? AND user_id = ?",
        )
        .bind(&req.full_name)
        .bind(&req.phone)
        .bind(&req.email)
        .bind(req.birth_date)
        .bind(req.contact_date)
        .bind(req.status)
        .bind(req.was_attended)
        .bind(&req.notes)
        .bind(&req.origin)
        .bind(req.gdpr_block_contact)
        .bind(Utc::now())
        .bind(id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        self.find_by_id(id, user_id).await
    }

    async fn delete(&self, id: Uuid, user_id: Uuid) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM leads WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Lead não encontrado"));
        }
        Ok(())
    }

    async fn convert_to_patient(
        &self,
        id: Uuid,
        user_id: Uuid,
        cost_center_id: Uuid,
    ) -> DbResult<Uuid> {
        let mut tx = self.pool.begin().await?;

        let lead = sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Lead não encontrado"))?;

        if lead.status == LeadStatus::Converted {
            return Err(DbError::Validation("Lead já convertido".to_string()));
        }
        ensure_owned(&mut tx, Owned::CostCenter, cost_center_id, user_id).await?;

        let now = Utc::now();
        // Sem data de nascimento no lead, usa a data de hoje
        let birth_date = lead.birth_date.unwrap_or_else(|| now.date_naive());
        let mut patient = PatientRequest::minimal(cost_center_id, lead.full_name.clone(), birth_date);
        patient.phone = lead.phone.clone();
        patient.email = lead.email.clone();
        let patient_id = insert_patient(&mut tx, user_id, &patient).await?;

        sqlx::query(
            "UPDATE leads SET status = ?, converted_at = ?, updated_at = ? WHERE id = ? AND user_id = ?",
        )
        .bind(LeadStatus::Converted)
        .bind(now)
        .bind(now)
        .bind(id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(lead_id = %id, patient_id = %patient_id, "lead convertido em paciente");
        Ok(patient_id)
    }
}
