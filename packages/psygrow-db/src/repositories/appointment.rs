use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use super::{ensure_owned, Owned};
use crate::error::{DbError, DbResult};
use crate::models::{
    Appointment, AppointmentFilter, AppointmentRequest, AppointmentStatus, Evolution,
    EvolutionRequest, Session, SessionFilter,
};
use crate::pagination::{Page, Paginated};

#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    async fn create(&self, user_id: Uuid, req: &AppointmentRequest) -> DbResult<Appointment>;
    async fn find_by_id(&self, id: Uuid, user_id: Uuid) -> DbResult<Appointment>;
    async fn list(
        &self,
        user_id: Uuid,
        filter: &AppointmentFilter,
        page: Page,
    ) -> DbResult<Paginated<Appointment>>;
    /// Persiste o atendimento já mesclado e validado. A passagem para
    /// `done` cria a sessão na mesma transação.
    async fn update(&self, appointment: &Appointment) -> DbResult<Appointment>;
    async fn delete(&self, id: Uuid, user_id: Uuid) -> DbResult<()>;
}

pub struct SqliteAppointmentRepository {
    pool: SqlitePool,
}

impl SqliteAppointmentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

async fn ensure_professional(conn: &mut SqliteConnection, professional_id: Uuid) -> DbResult<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE id = ? AND is_active = 1")
        .bind(professional_id)
        .fetch_one(&mut *conn)
        .await?;
    if count == 0 {
        return Err(DbError::not_found("Profissional não encontrado"));
    }
    Ok(())
}

/// Cria (ou reabre) a sessão de um atendimento concluído
async fn upsert_session(conn: &mut SqliteConnection, session: &Session) -> DbResult<()> {
    session.validate()?;
    sqlx::query(
        "INSERT INTO sessions
            (id, appointment_id, user_id, patient_id, professional_id, start_time, end_time, was_attended, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (appointment_id) DO UPDATE SET
            patient_id = excluded.patient_id,
            professional_id = excluded.professional_id,
            start_time = excluded.start_time,
            end_time = excluded.end_time,
            was_attended = excluded.was_attended,
            updated_at = excluded.updated_at",
    )
    .bind(session.id)
    .bind(session.appointment_id)
    .bind(session.user_id)
    .bind(session.patient_id)
    .bind(session.professional_id)
    .bind(session.start_time)
    .bind(session.end_time)
    .bind(session.was_attended)
    .bind(session.created_at)
    .bind(session.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

fn push_appointment_filters(
    qb: &mut QueryBuilder<'_, Sqlite>,
    user_id: Uuid,
    filter: &AppointmentFilter,
) {
    qb.push(" WHERE user_id = ").push_bind(user_id);
    if let Some(patient_id) = filter.patient_id {
        qb.push(" AND patient_id = ").push_bind(patient_id);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(from) = filter.from {
        qb.push(" AND start_time >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        qb.push(" AND start_time <= ").push_bind(to);
    }
}

#[async_trait]
impl AppointmentRepository for SqliteAppointmentRepository {
    async fn create(&self, user_id: Uuid, req: &AppointmentRequest) -> DbResult<Appointment> {
        let professional_id = req.professional_id.unwrap_or(user_id);

        let mut tx = self.pool.begin().await?;
        ensure_owned(&mut tx, Owned::Patient, req.patient_id, user_id).await?;
        ensure_owned(&mut tx, Owned::CostCenter, req.cost_center_id, user_id).await?;
        ensure_professional(&mut tx, professional_id).await?;

        let id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO appointments (
                id, user_id, patient_id, professional_id, cost_center_id, service_title,
                start_time, end_time, status, notes, custom_repasse_type, custom_repasse_value,
                created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(user_id)
        .bind(req.patient_id)
        .bind(professional_id)
        .bind(req.cost_center_id)
        .bind(&req.service_title)
        .bind(req.start_time)
        .bind(req.end_time)
        .bind(AppointmentStatus::Scheduled)
        .bind(&req.notes)
        .bind(req.custom_repasse_type)
        .bind(req.custom_repasse_value)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(appointment_id = %id, "atendimento agendado");
        self.find_by_id(id, user_id).await
    }

    async fn find_by_id(&self, id: Uuid, user_id: Uuid) -> DbResult<Appointment> {
        sqlx::query_as::<_, Appointment>("SELECT * FROM appointments WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Atendimento não encontrado"))
    }

    async fn list(
        &self,
        user_id: Uuid,
        filter: &AppointmentFilter,
        page: Page,
    ) -> DbResult<Paginated<Appointment>> {
        let mut count_qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM appointments");
        push_appointment_filters(&mut count_qb, user_id, filter);
        let total = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM appointments");
        push_appointment_filters(&mut qb, user_id, filter);
        qb.push(" ORDER BY start_time DESC, id DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);
        let appointments = qb
            .build_query_as::<Appointment>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Paginated::new(appointments, total, page))
    }

    async fn update(&self, appointment: &Appointment) -> DbResult<Appointment> {
        appointment.validate()?;
        let user_id = appointment.user_id;

        let mut tx = self.pool.begin().await?;
        let previous: AppointmentStatus = sqlx::query_scalar(
            "SELECT status FROM appointments WHERE id = ? AND user_id = ?",
        )
        .bind(appointment.id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("Atendimento não encontrado"))?;

        ensure_owned(&mut tx, Owned::Patient, appointment.patient_id, user_id).await?;
        ensure_owned(&mut tx, Owned::CostCenter, appointment.cost_center_id, user_id).await?;
        ensure_professional(&mut tx, appointment.professional_id).await?;

        sqlx::query(
            "UPDATE appointments SET
                patient_id = ?, professional_id = ?, cost_center_id = ?, service_title = ?,
                start_time = ?, end_time = ?, status = ?, notes = ?,
                custom_repasse_type = ?, custom_repasse_value = ?, updated_at = ?
             WHERE id = ? AND user_id = ?",
        )
        .bind(appointment.patient_id)
        .bind(appointment.professional_id)
        .bind(appointment.cost_center_id)
        .bind(&appointment.service_title)
        .bind(appointment.start_time)
        .bind(appointment.end_time)
        .bind(appointment.status)
        .bind(&appointment.notes)
        .bind(appointment.custom_repasse_type)
        .bind(appointment.custom_repasse_value)
        .bind(Utc::now())
        .bind(appointment.id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if appointment.status == AppointmentStatus::Done && previous != AppointmentStatus::Done {
            upsert_session(&mut tx, &Session::from_appointment(appointment)).await?;
            info!(appointment_id = %appointment.id, "atendimento concluído, sessão registrada");
        }

        tx.commit().await?;
        self.find_by_id(appointment.id, user_id).await
    }

    async fn delete(&self, id: Uuid, user_id: Uuid) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM appointments WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Atendimento não encontrado"));
        }
        Ok(())
    }
}

/// Sessões são somente leitura: nascem da conclusão de um atendimento
#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid, user_id: Uuid) -> DbResult<Session>;
    async fn find_by_appointment(&self, appointment_id: Uuid, user_id: Uuid) -> DbResult<Session>;
    async fn list(
        &self,
        user_id: Uuid,
        filter: &SessionFilter,
        page: Page,
    ) -> DbResult<Paginated<Session>>;
}

pub struct SqliteSessionRepository {
    pool: SqlitePool,
}

impl SqliteSessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for SqliteSessionRepository {
    async fn find_by_id(&self, id: Uuid, user_id: Uuid) -> DbResult<Session> {
        sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Sessão não encontrada"))
    }

    async fn find_by_appointment(&self, appointment_id: Uuid, user_id: Uuid) -> DbResult<Session> {
        sqlx::query_as::<_, Session>(
            "SELECT * FROM sessions WHERE appointment_id = ? AND user_id = ?",
        )
        .bind(appointment_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Sessão não encontrada"))
    }

    async fn list(
        &self,
        user_id: Uuid,
        filter: &SessionFilter,
        page: Page,
    ) -> DbResult<Paginated<Session>> {
        let mut count_qb =
            QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM sessions WHERE user_id = ");
        count_qb.push_bind(user_id);
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM sessions WHERE user_id = ");
        qb.push_bind(user_id);
        if let Some(patient_id) = filter.patient_id {
            count_qb.push(" AND patient_id = ").push_bind(patient_id);
            qb.push(" AND patient_id = ").push_bind(patient_id);
        }

        let total = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        qb.push(" ORDER BY start_time DESC, id DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);
        let sessions = qb.build_query_as::<Session>().fetch_all(&self.pool).await?;

        Ok(Paginated::new(sessions, total, page))
    }
}

#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait EvolutionRepository: Send + Sync {
    /// Registra a evolução de uma sessão; cada sessão aceita apenas uma
    async fn create(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        req: &EvolutionRequest,
    ) -> DbResult<Evolution>;
    async fn find_by_id(&self, id: Uuid, session_id: Uuid, user_id: Uuid) -> DbResult<Evolution>;
    /// Evoluções do paciente, mais recentes primeiro
    async fn list_by_patient(&self, patient_id: Uuid, user_id: Uuid) -> DbResult<Vec<Evolution>>;
}

pub struct SqliteEvolutionRepository {
    pool: SqlitePool,
}

impl SqliteEvolutionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EvolutionRepository for SqliteEvolutionRepository {
    async fn create(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        req: &EvolutionRequest,
    ) -> DbResult<Evolution> {
        let mut tx = self.pool.begin().await?;

        let session =
            sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = ? AND user_id = ?")
                .bind(session_id)
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| DbError::not_found("Sessão não encontrada"))?;

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM evolutions WHERE session_id = ?")
            .bind(session_id)
            .fetch_one(&mut *tx)
            .await?;
        if existing > 0 {
            return Err(DbError::Validation(
                "a sessão já possui evolução registrada".to_string(),
            ));
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO evolutions
                (id, session_id, user_id, professional_id, patient_id, content, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(session.id)
        .bind(user_id)
        .bind(session.professional_id)
        .bind(session.patient_id)
        .bind(&req.content)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        self.find_by_id(id, session_id, user_id).await
    }

    async fn find_by_id(&self, id: Uuid, session_id: Uuid, user_id: Uuid) -> DbResult<Evolution> {
        sqlx::query_as::<_, Evolution>(
            "SELECT * FROM evolutions WHERE id = ? AND session_id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Evolução não encontrada"))
    }

    async fn list_by_patient(&self, patient_id: Uuid, user_id: Uuid) -> DbResult<Vec<Evolution>> {
        let mut conn = self.pool.acquire().await?;
        ensure_owned(&mut conn, Owned::Patient, patient_id, user_id).await?;

        let evolutions = sqlx::query_as::<_, Evolution>(
            "SELECT * FROM evolutions WHERE patient_id = ? AND user_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(patient_id)
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(evolutions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppointmentUpdate;
    use crate::repositories::fixtures::{cost_center_request, patient_request, test_pool, user};
    use crate::repositories::{
        CostCenterRepository, PatientRepository, SqliteCostCenterRepository,
        SqlitePatientRepository,
    };
    use chrono::Duration;

    struct Ctx {
        _dir: tempfile::TempDir,
        pool: SqlitePool,
        owner: Uuid,
        stranger: Uuid,
        patient_id: Uuid,
        cost_center_id: Uuid,
    }

    async fn setup() -> Ctx {
        let (dir, pool) = test_pool().await;
        let owner = user(&pool, "owner@psygrow.com.br").await;
        let stranger = user(&pool, "stranger@psygrow.com.br").await;
        let cost_center = SqliteCostCenterRepository::new(pool.clone())
            .create(owner, &cost_center_request())
            .await
            .unwrap();
        let patient = SqlitePatientRepository::new(pool.clone())
            .create(owner, &patient_request(cost_center.id, "Rafael Nunes"))
            .await
            .unwrap();
        Ctx {
            _dir: dir,
            pool,
            owner,
            stranger,
            patient_id: patient.id,
            cost_center_id: cost_center.id,
        }
    }

    fn request(ctx: &Ctx) -> AppointmentRequest {
        let start = Utc::now() + Duration::hours(2);
        AppointmentRequest {
            patient_id: ctx.patient_id,
            professional_id: None,
            cost_center_id: ctx.cost_center_id,
            service_title: "Psicoterapia individual".into(),
            start_time: start,
            end_time: start + Duration::minutes(50),
            notes: None,
            custom_repasse_type: None,
            custom_repasse_value: None,
        }
    }

    async fn session_count(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_defaults_to_scheduled_and_caller_as_professional() {
        let ctx = setup().await;
        let repo = SqliteAppointmentRepository::new(ctx.pool.clone());

        let appt = repo.create(ctx.owner, &request(&ctx)).await.unwrap();
        assert_eq!(appt.status, AppointmentStatus::Scheduled);
        assert_eq!(appt.professional_id, ctx.owner);
    }

    #[tokio::test]
    async fn test_create_rejects_foreign_patient() {
        let ctx = setup().await;
        let repo = SqliteAppointmentRepository::new(ctx.pool.clone());

        let err = repo.create(ctx.stranger, &request(&ctx)).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_marking_done_creates_session_with_same_window() {
        let ctx = setup().await;
        let repo = SqliteAppointmentRepository::new(ctx.pool.clone());
        let sessions = SqliteSessionRepository::new(ctx.pool.clone());

        let mut appt = repo.create(ctx.owner, &request(&ctx)).await.unwrap();
        appt.apply(AppointmentUpdate {
            status: Some(AppointmentStatus::Done),
            ..Default::default()
        });
        let updated = repo.update(&appt).await.unwrap();
        assert_eq!(updated.status, AppointmentStatus::Done);

        let session = sessions.find_by_appointment(appt.id, ctx.owner).await.unwrap();
        assert_eq!(session.start_time, appt.start_time);
        assert_eq!(session.end_time, appt.end_time);
        assert!(session.was_attended);

        // Atualizar de novo um atendimento já concluído não duplica a sessão
        repo.update(&updated).await.unwrap();
        assert_eq!(session_count(&ctx.pool).await, 1);
    }

    #[tokio::test]
    async fn test_failed_update_creates_no_session() {
        let ctx = setup().await;
        let repo = SqliteAppointmentRepository::new(ctx.pool.clone());

        let mut appt = repo.create(ctx.owner, &request(&ctx)).await.unwrap();
        appt.status = AppointmentStatus::Done;
        appt.end_time = appt.start_time;

        assert!(matches!(repo.update(&appt).await, Err(DbError::Validation(_))));
        assert_eq!(session_count(&ctx.pool).await, 0);
        let stored = repo.find_by_id(appt.id, ctx.owner).await.unwrap();
        assert_eq!(stored.status, AppointmentStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_update_by_other_tenant_is_not_found() {
        let ctx = setup().await;
        let repo = SqliteAppointmentRepository::new(ctx.pool.clone());

        let mut appt = repo.create(ctx.owner, &request(&ctx)).await.unwrap();
        appt.user_id = ctx.stranger;
        appt.status = AppointmentStatus::Done;
        assert!(matches!(repo.update(&appt).await, Err(DbError::NotFound(_))));
        assert_eq!(session_count(&ctx.pool).await, 0);
    }

    #[tokio::test]
    async fn test_evolution_once_per_session() {
        let ctx = setup().await;
        let repo = SqliteAppointmentRepository::new(ctx.pool.clone());
        let sessions = SqliteSessionRepository::new(ctx.pool.clone());
        let evolutions = SqliteEvolutionRepository::new(ctx.pool.clone());

        let mut appt = repo.create(ctx.owner, &request(&ctx)).await.unwrap();
        appt.status = AppointmentStatus::Done;
        repo.update(&appt).await.unwrap();
        let session = sessions.find_by_appointment(appt.id, ctx.owner).await.unwrap();

        let req = EvolutionRequest {
            content: "Paciente relatou melhora no sono.".into(),
        };
        let evolution = evolutions.create(session.id, ctx.owner, &req).await.unwrap();
        assert_eq!(evolution.patient_id, ctx.patient_id);

        assert!(matches!(
            evolutions.create(session.id, ctx.owner, &req).await,
            Err(DbError::Validation(_))
        ));
        assert!(matches!(
            evolutions.create(session.id, ctx.stranger, &req).await,
            Err(DbError::NotFound(_))
        ));

        let by_patient = evolutions.list_by_patient(ctx.patient_id, ctx.owner).await.unwrap();
        assert_eq!(by_patient.len(), 1);
        assert!(matches!(
            evolutions.list_by_patient(ctx.patient_id, ctx.stranger).await,
            Err(DbError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_session_list_is_tenant_scoped() {
        let ctx = setup().await;
        let repo = SqliteAppointmentRepository::new(ctx.pool.clone());
        let sessions = SqliteSessionRepository::new(ctx.pool.clone());

        let mut appt = repo.create(ctx.owner, &request(&ctx)).await.unwrap();
        appt.status = AppointmentStatus::Done;
        repo.update(&appt).await.unwrap();

        let own = sessions
            .list(ctx.owner, &SessionFilter::default(), Page::default())
            .await
            .unwrap();
        assert_eq!(own.total, 1);
        let foreign = sessions
            .list(ctx.stranger, &SessionFilter::default(), Page::default())
            .await
            .unwrap();
        assert_eq!(foreign.total, 0);
    }
}
