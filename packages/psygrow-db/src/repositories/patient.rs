use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use super::{ensure_owned, Owned};
use crate::error::{DbError, DbResult};
use crate::models::{
    Patient, PatientFamily, PatientFamilyRequest, PatientFilter, PatientRequest, Relationship,
};
use crate::pagination::{Page, Paginated};

const SELECT_PATIENT: &str = "SELECT p.*, c.name AS cost_center_name
     FROM patients p
     LEFT JOIN cost_centers c ON c.id = p.cost_center_id";

#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait PatientRepository: Send + Sync {
    async fn create(&self, user_id: Uuid, req: &PatientRequest) -> DbResult<Patient>;
    async fn find_by_id(&self, id: Uuid, user_id: Uuid) -> DbResult<Patient>;
    /// Lista ordenada por nome
    async fn list(
        &self,
        user_id: Uuid,
        filter: &PatientFilter,
        page: Page,
    ) -> DbResult<Paginated<Patient>>;
    async fn update(&self, id: Uuid, user_id: Uuid, req: &PatientRequest) -> DbResult<Patient>;
    async fn delete(&self, id: Uuid, user_id: Uuid) -> DbResult<()>;
}

pub struct SqlitePatientRepository {
    pool: SqlitePool,
}

impl SqlitePatientRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Insere um paciente usando a conexão informada (pool ou transação).
/// O centro de custo já deve ter sido verificado.
pub(crate) async fn insert_patient(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    req: &PatientRequest,
) -> DbResult<Uuid> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        "INSERT INTO patients (
            id, user_id, cost_center_id, full_name, full_name_search, social_name, birth_date,
            document, phone, email, gender, address, resides_with, emergency_contact_name,
            emergency_contact_phone, observation, default_repasse_type, default_repasse_value,
            active, created_at, updated_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(user_id)
    .bind(req.cost_center_id)
    .bind(&req.full_name)
    .bind(req.full_name.to_lowercase())
    .bind(&req.social_name)
    .bind(req.birth_date)
    .bind(&req.document)
    .bind(&req.phone)
    .bind(&req.email)
    .bind(&req.gender)
    .bind(&req.address)
    .bind(&req.resides_with)
    .bind(&req.emergency_contact_name)
    .bind(&req.emergency_contact_phone)
    .bind(&req.observation)
    .bind(req.default_repasse_type)
    .bind(req.default_repasse_value)
    .bind(req.active)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    debug!(patient_id = %id, "paciente criado");
    Ok(id)
}

/// Escapa os curingas do LIKE para que o termo seja buscado literalmente.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn push_patient_filters(qb: &mut QueryBuilder<'_, Sqlite>, user_id: Uuid, filter: &PatientFilter) {
    qb.push(" WHERE p.user_id = ").push_bind(user_id);
    if let Some(name) = filter.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        // lower() e LIKE do SQLite só tratam ASCII; a coluna já vem em minúsculas
        qb.push(" AND p.full_name_search LIKE ")
            .push_bind(format!("%{}%", escape_like(&name.to_lowercase())))
            .push(" ESCAPE '\\'");
    }
    if let Some(cost_center_id) = filter.cost_center_id {
        qb.push(" AND p.cost_center_id = ").push_bind(cost_center_id);
    }
    if let Some(active) = filter.active {
        qb.push(" AND p.active = ").push_bind(active);
    }
}

#[async_trait]
impl PatientRepository for SqlitePatientRepository {
    async fn create(&self, user_id: Uuid, req: &PatientRequest) -> DbResult<Patient> {
        let mut tx = self.pool.begin().await?;
        ensure_owned(&mut tx, Owned::CostCenter, req.cost_center_id, user_id).await?;
        let id = insert_patient(&mut tx, user_id, req).await?;
        tx.commit().await?;

        self.find_by_id(id, user_id).await
    }

    async fn find_by_id(&self, id: Uuid, user_id: Uuid) -> DbResult<Patient> {
        let sql = format!("{} WHERE p.id = ? AND p.user_id = ?", SELECT_PATIENT);
        sqlx::query_as::<_, Patient>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Paciente não encontrado"))
    }

    async fn list(
        &self,
        user_id: Uuid,
        filter: &PatientFilter,
        page: Page,
    ) -> DbResult<Paginated<Patient>> {
        let mut count_qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM patients p");
        push_patient_filters(&mut count_qb, user_id, filter);
        let total: i64 = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut qb = QueryBuilder::<Sqlite>::new(SELECT_PATIENT);
        push_patient_filters(&mut qb, user_id, filter);
        qb.push(" ORDER BY p.full_name ASC, p.id ASC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);
        let patients = qb
            .build_query_as::<Patient>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Paginated::new(patients, total, page))
    }

    async fn update(&self, id: Uuid, user_id: Uuid, req: &PatientRequest) -> DbResult<Patient> {
        let mut tx = self.pool.begin().await?;
        ensure_owned(&mut tx, Owned::Patient, id, user_id).await?;
        ensure_owned(&mut tx, Owned::CostCenter, req.cost_center_id, user_id).await?;

        sqlx::query(
            "UPDATE patients SET
                cost_center_id = ?, full_name = ?, full_name_search = ?, social_name = ?,
                birth_date = ?, document = ?, phone = ?, email = ?, gender = ?, address = ?,
                resides_with = ?, emergency_contact_name = ?, emergency_contact_phone = ?,
                observation = ?, default_repasse_type = ?, default_repasse_value = ?, active = ?,
                updated_at = ?
             WHERE id = ? AND user_id = ?",
        )
        .bind(req.cost_center_id)
        .bind(&req.full_name)
        .bind(req.full_name.to_lowercase())
        .bind(&req.social_name)
        .bind(req.birth_date)
        .bind(&req.document)
        .bind(&req.phone)
        .bind(&req.email)
        .bind(&req.gender)
        .bind(&req.address)
        .bind(&req.resides_with)
        .bind(&req.emergency_contact_name)
        .bind(&req.emergency_contact_phone)
        .bind(&req.observation)
        .bind(req.default_repasse_type)
        .bind(req.default_repasse_value)
        .bind(req.active)
        .bind(Utc::now())
        .bind(id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        self.find_by_id(id, user_id).await
    }

    async fn delete(&self, id: Uuid, user_id: Uuid) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM patients WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Paciente não encontrado"));
        }
        Ok(())
    }
}

#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait PatientFamilyRepository: Send + Sync {
    async fn create(
        &self,
        patient_id: Uuid,
        user_id: Uuid,
        req: &PatientFamilyRequest,
    ) -> DbResult<PatientFamily>;
    async fn find_by_id(&self, id: Uuid, patient_id: Uuid, user_id: Uuid)
        -> DbResult<PatientFamily>;
    async fn list(
        &self,
        patient_id: Uuid,
        user_id: Uuid,
        relationship: Option<Relationship>,
    ) -> DbResult<Vec<PatientFamily>>;
    async fn update(
        &self,
        id: Uuid,
        patient_id: Uuid,
        user_id: Uuid,
        req: &PatientFamilyRequest,
    ) -> DbResult<PatientFamily>;
    async fn delete(&self, id: Uuid, patient_id: Uuid, user_id: Uuid) -> DbResult<()>;
}

pub struct SqlitePatientFamilyRepository {
    pool: SqlitePool,
}

impl SqlitePatientFamilyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Familiar do paciente, com o paciente restrito ao tenant
const FAMILY_SCOPE: &str =
    "patient_id = ? AND patient_id IN (SELECT id FROM patients WHERE user_id = ?)";

#[async_trait]
impl PatientFamilyRepository for SqlitePatientFamilyRepository {
    async fn create(
        &self,
        patient_id: Uuid,
        user_id: Uuid,
        req: &PatientFamilyRequest,
    ) -> DbResult<PatientFamily> {
        let mut conn = self.pool.acquire().await?;
        ensure_owned(&mut conn, Owned::Patient, patient_id, user_id).await?;

        let id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO patient_families
                (id, patient_id, relationship, name, birth_date, schooling, occupation, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(patient_id)
        .bind(req.relationship)
        .bind(&req.name)
        .bind(req.birth_date)
        .bind(&req.schooling)
        .bind(&req.occupation)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        self.find_by_id(id, patient_id, user_id).await
    }

    async fn find_by_id(
        &self,
        id: Uuid,
        patient_id: Uuid,
        user_id: Uuid,
    ) -> DbResult<PatientFamily> {
        let sql = format!("SELECT * FROM patient_families WHERE id = ? AND {}", FAMILY_SCOPE);
        sqlx::query_as::<_, PatientFamily>(&sql)
            .bind(id)
            .bind(patient_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Familiar não encontrado"))
    }

    async fn list(
        &self,
        patient_id: Uuid,
        user_id: Uuid,
        relationship: Option<Relationship>,
    ) -> DbResult<Vec<PatientFamily>> {
        let mut conn = self.pool.acquire().await?;
        ensure_owned(&mut conn, Owned::Patient, patient_id, user_id).await?;

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM patient_families WHERE patient_id = ");
        qb.push_bind(patient_id);
        if let Some(relationship) = relationship {
            qb.push(" AND relationship = ").push_bind(relationship);
        }
        qb.push(" ORDER BY name ASC, id ASC");

        let families = qb
            .build_query_as::<PatientFamily>()
            .fetch_all(&mut *conn)
            .await?;
        Ok(families)
    }

    async fn update(
        &self,
        id: Uuid,
        patient_id: Uuid,
        user_id: Uuid,
        req: &PatientFamilyRequest,
    ) -> DbResult<PatientFamily> {
        let sql = format!(
            "UPDATE patient_families
             SET relationship = ?, name = ?, birth_date = ?, schooling = ?, occupation = ?, updated_at = ?
             WHERE id = ? AND {}",
            FAMILY_SCOPE
        );
        let result = sqlx::query(&sql)
            .bind(req.relationship)
            .bind(&req.name)
            .bind(req.birth_date)
            .bind(&req.schooling)
            .bind(&req.occupation)
            .bind(Utc::now())
            .bind(id)
            .bind(patient_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Familiar não encontrado"));
        }
        self.find_by_id(id, patient_id, user_id).await
    }

    async fn delete(&self, id: Uuid, patient_id: Uuid, user_id: Uuid) -> DbResult<()> {
        let sql = format!("DELETE FROM patient_families WHERE id = ? AND {}", FAMILY_SCOPE);
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(patient_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Familiar não encontrado"));
        }
        Ok(())
    }
}
