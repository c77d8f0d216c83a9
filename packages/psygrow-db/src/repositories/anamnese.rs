use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use super::{ensure_owned, Owned};
use crate::error::{DbError, DbResult};
use crate::models::{
    AnamneseField, AnamneseFieldRequest, AnamneseTemplate, FieldOption, FieldOptionRequest,
    PatientAnamnese, PatientAnamneseDetails, PatientAnamneseField, PatientAnamneseRequest,
    TemplateRequest,
};

#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait AnamneseTemplateRepository: Send + Sync {
    async fn create(&self, user_id: Uuid, req: &TemplateRequest) -> DbResult<AnamneseTemplate>;
    async fn find_by_id(&self, id: Uuid, user_id: Uuid) -> DbResult<AnamneseTemplate>;
    async fn list(&self, user_id: Uuid) -> DbResult<Vec<AnamneseTemplate>>;
    async fn update(
        &self,
        id: Uuid,
        user_id: Uuid,
        req: &TemplateRequest,
    ) -> DbResult<AnamneseTemplate>;
    async fn delete(&self, id: Uuid, user_id: Uuid) -> DbResult<()>;
}

pub struct SqliteAnamneseTemplateRepository {
    pool: SqlitePool,
}

impl SqliteAnamneseTemplateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnamneseTemplateRepository for SqliteAnamneseTemplateRepository {
    async fn create(&self, user_id: Uuid, req: &TemplateRequest) -> DbResult<AnamneseTemplate> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO anamnese_templates (id, user_id, title, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(user_id)
        .bind(&req.title)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_id(id, user_id).await
    }

    async fn find_by_id(&self, id: Uuid, user_id: Uuid) -> DbResult<AnamneseTemplate> {
        sqlx::query_as::<_, AnamneseTemplate>(
            "SELECT * FROM anamnese_templates WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Template não encontrado"))
    }

    async fn list(&self, user_id: Uuid) -> DbResult<Vec<AnamneseTemplate>> {
        let templates = sqlx::query_as::<_, AnamneseTemplate>(
            "SELECT * FROM anamnese_templates WHERE user_id = ? ORDER BY title ASC, id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(templates)
    }

    async fn update(
        &self,
        id: Uuid,
        user_id: Uuid,
        req: &TemplateRequest,
    ) -> DbResult<AnamneseTemplate> {
        let result = sqlx::query(
            "UPDATE anamnese_templates SET title = ?, updated_at = ? WHERE id = ? AND user_id = ?",
        )
        .bind(&req.title)
        .bind(Utc::now())
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Template não encontrado"));
        }
        self.find_by_id(id, user_id).await
    }

    async fn delete(&self, id: Uuid, user_id: Uuid) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM anamnese_templates WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Template não encontrado"));
        }
        Ok(())
    }
}

#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait AnamneseFieldRepository: Send + Sync {
    async fn create(
        &self,
        template_id: Uuid,
        user_id: Uuid,
        req: &AnamneseFieldRequest,
    ) -> DbResult<AnamneseField>;
    async fn find_by_id(&self, id: Uuid, template_id: Uuid, user_id: Uuid)
        -> DbResult<AnamneseField>;
    /// Campos do template por `field_number`, cada um com suas opções
    async fn list_by_template(&self, template_id: Uuid, user_id: Uuid)
        -> DbResult<Vec<AnamneseField>>;
    async fn update(
        &self,
        id: Uuid,
        template_id: Uuid,
        user_id: Uuid,
        req: &AnamneseFieldRequest,
    ) -> DbResult<AnamneseField>;
    /// Remove o campo e, em cascata, suas opções
    async fn delete(&self, id: Uuid, template_id: Uuid, user_id: Uuid) -> DbResult<()>;
}

pub struct SqliteAnamneseFieldRepository {
    pool: SqlitePool,
}

impl SqliteAnamneseFieldRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

async fn fetch_field(
    conn: &mut SqliteConnection,
    id: Uuid,
    template_id: Uuid,
    user_id: Uuid,
) -> DbResult<AnamneseField> {
    let mut field = sqlx::query_as::<_, AnamneseField>(
        "SELECT * FROM anamnese_fields WHERE id = ? AND anamnese_id = ? AND user_id = ?",
    )
    .bind(id)
    .bind(template_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Campo não encontrado"))?;

    field.options = fetch_options(conn, id).await?;
    Ok(field)
}

async fn fetch_options(conn: &mut SqliteConnection, field_id: Uuid) -> DbResult<Vec<FieldOption>> {
    let options = sqlx::query_as::<_, FieldOption>(
        "SELECT * FROM anamnese_field_options WHERE anamnese_field_id = ? ORDER BY option_order ASC, id ASC",
    )
    .bind(field_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(options)
}

async fn insert_options(
    conn: &mut SqliteConnection,
    field_id: Uuid,
    options: &[FieldOptionRequest],
) -> DbResult<()> {
    let now = Utc::now();
    for option in options {
        sqlx::query(
            "INSERT INTO anamnese_field_options (id, anamnese_field_id, option_value, option_order, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4())
        .bind(field_id)
        .bind(&option.option_value)
        .bind(option.option_order)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn delete_options(conn: &mut SqliteConnection, field_id: Uuid) -> DbResult<()> {
    sqlx::query("DELETE FROM anamnese_field_options WHERE anamnese_field_id = ?")
        .bind(field_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

#[async_trait]
impl AnamneseFieldRepository for SqliteAnamneseFieldRepository {
    async fn create(
        &self,
        template_id: Uuid,
        user_id: Uuid,
        req: &AnamneseFieldRequest,
    ) -> DbResult<AnamneseField> {
        let mut tx = self.pool.begin().await?;
        ensure_owned(&mut tx, Owned::Template, template_id, user_id).await?;

        let id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO anamnese_fields (
                id, anamnese_id, user_id, field_number, field_type, field_title,
                field_required, field_active, created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(template_id)
        .bind(user_id)
        .bind(req.field_number)
        .bind(req.field_type)
        .bind(&req.field_title)
        .bind(req.field_required)
        .bind(req.field_active)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if req.field_type.has_options() {
            insert_options(&mut tx, id, &req.options).await?;
        }

        let field = fetch_field(&mut tx, id, template_id, user_id).await?;
        tx.commit().await?;
        debug!(field_id = %id, options = field.options.len(), "campo de anamnese criado");
        Ok(field)
    }

    async fn find_by_id(
        &self,
        id: Uuid,
        template_id: Uuid,
        user_id: Uuid,
    ) -> DbResult<AnamneseField> {
        let mut conn = self.pool.acquire().await?;
        fetch_field(&mut conn, id, template_id, user_id).await
    }

    async fn list_by_template(
        &self,
        template_id: Uuid,
        user_id: Uuid,
    ) -> DbResult<Vec<AnamneseField>> {
        let mut conn = self.pool.acquire().await?;
        ensure_owned(&mut conn, Owned::Template, template_id, user_id).await?;

        let mut fields = sqlx::query_as::<_, AnamneseField>(
            "SELECT * FROM anamnese_fields WHERE anamnese_id = ? AND user_id = ?
             ORDER BY field_number ASC, id ASC",
        )
        .bind(template_id)
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

        let options = sqlx::query_as::<_, FieldOption>(
            "SELECT o.* FROM anamnese_field_options o
             JOIN anamnese_fields f ON f.id = o.anamnese_field_id
             WHERE f.anamnese_id = ?
             ORDER BY o.option_order ASC, o.id ASC",
        )
        .bind(template_id)
        .fetch_all(&mut *conn)
        .await?;

        let mut by_field: HashMap<Uuid, Vec<FieldOption>> = HashMap::new();
        for option in options {
            by_field.entry(option.anamnese_field_id).or_default().push(option);
        }
        for field in &mut fields {
            field.options = by_field.remove(&field.id).unwrap_or_default();
        }
        Ok(fields)
    }

    async fn update(
        &self,
        id: Uuid,
        template_id: Uuid,
        user_id: Uuid,
        req: &AnamneseFieldRequest,
    ) -> DbResult<AnamneseField> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE anamnese_fields SET
                field_number = ?, field_type = ?, field_title = ?, field_required = ?,
                field_active = ?, updated_at = ?
             WHERE id = ? AND anamnese_id = ? AND user_id = ?",
        )
        .bind(req.field_number)
        .bind(req.field_type)
        .bind(&req.field_title)
        .bind(req.field_required)
        .bind(req.field_active)
        .bind(Utc::now())
        .bind(id)
        .bind(template_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Campo não encontrado"));
        }

        // Campo que deixou de ser de seleção perde as opções; campo de seleção
        // só tem as opções trocadas quando uma nova lista é enviada
        if !req.field_type.has_options() {
            delete_options(&mut tx, id).await?;
        } else if !req.options.is_empty() {
            delete_options(&mut tx, id).await?;
            insert_options(&mut tx, id, &req.options).await?;
        }

        let field = fetch_field(&mut tx, id, template_id, user_id).await?;
        tx.commit().await?;
        Ok(field)
    }

    async fn delete(&self, id: Uuid, template_id: Uuid, user_id: Uuid) -> DbResult<()> {
        let result = sqlx::query(
            "DELETE FROM anamnese_fields WHERE id = ? AND anamnese_id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(template_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Campo não encontrado"));
        }
        Ok(())
    }
}

#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait FieldOptionRepository: Send + Sync {
    async fn create(
        &self,
        field_id: Uuid,
        template_id: Uuid,
        user_id: Uuid,
        req: &FieldOptionRequest,
    ) -> DbResult<FieldOption>;
    async fn list(&self, field_id: Uuid, template_id: Uuid, user_id: Uuid)
        -> DbResult<Vec<FieldOption>>;
    /// Apaga todas as opções do campo e insere a nova lista; IDs antigos deixam de existir
    async fn replace_all(
        &self,
        field_id: Uuid,
        template_id: Uuid,
        user_id: Uuid,
        options: &[FieldOptionRequest],
    ) -> DbResult<Vec<FieldOption>>;
}

pub struct SqliteFieldOptionRepository {
    pool: SqlitePool,
}

impl SqliteFieldOptionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Confirma que o campo pertence ao template do tenant e aceita opções
async fn ensure_selection_field(
    conn: &mut SqliteConnection,
    field_id: Uuid,
    template_id: Uuid,
    user_id: Uuid,
) -> DbResult<()> {
    let field = fetch_field(conn, field_id, template_id, user_id).await?;
    if !field.field_type.has_options() {
        return Err(DbError::Validation(
            "apenas campos select e multiselect aceitam opções".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
impl FieldOptionRepository for SqliteFieldOptionRepository {
    async fn create(
        &self,
        field_id: Uuid,
        template_id: Uuid,
        user_id: Uuid,
        req: &FieldOptionRequest,
    ) -> DbResult<FieldOption> {
        let mut conn = self.pool.acquire().await?;
        ensure_selection_field(&mut conn, field_id, template_id, user_id).await?;

        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO anamnese_field_options (id, anamnese_field_id, option_value, option_order, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(field_id)
        .bind(&req.option_value)
        .bind(req.option_order)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        let option =
            sqlx::query_as::<_, FieldOption>("SELECT * FROM anamnese_field_options WHERE id = ?")
                .bind(id)
                .fetch_one(&mut *conn)
                .await?;
        Ok(option)
    }

    async fn list(
        &self,
        field_id: Uuid,
        template_id: Uuid,
        user_id: Uuid,
    ) -> DbResult<Vec<FieldOption>> {
        let mut conn = self.pool.acquire().await?;
        let field = fetch_field(&mut conn, field_id, template_id, user_id).await?;
        Ok(field.options)
    }

    async fn replace_all(
        &self,
        field_id: Uuid,
        template_id: Uuid,
        user_id: Uuid,
        options: &[FieldOptionRequest],
    ) -> DbResult<Vec<FieldOption>> {
        let mut tx = self.pool.begin().await?;
        ensure_selection_field(&mut tx, field_id, template_id, user_id).await?;

        delete_options(&mut tx, field_id).await?;
        insert_options(&mut tx, field_id, options).await?;
        let options = fetch_options(&mut tx, field_id).await?;

        tx.commit().await?;
        debug!(field_id = %field_id, count = options.len(), "opções substituídas");
        Ok(options)
    }
}

#[cfg_attr(feature = "test-utils", mockall::automock)]
#[async_trait]
pub trait PatientAnamneseRepository: Send + Sync {
    /// Grava a anamnese respondida e as respostas numa única transação
    async fn create(
        &self,
        user_id: Uuid,
        req: &PatientAnamneseRequest,
    ) -> DbResult<PatientAnamneseDetails>;
    async fn list_by_patient(&self, patient_id: Uuid, user_id: Uuid)
        -> DbResult<Vec<PatientAnamnese>>;
    async fn find_details(
        &self,
        id: Uuid,
        patient_id: Uuid,
        user_id: Uuid,
    ) -> DbResult<PatientAnamneseDetails>;
}

pub struct SqlitePatientAnamneseRepository {
    pool: SqlitePool,
}

impl SqlitePatientAnamneseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PatientAnamneseRepository for SqlitePatientAnamneseRepository {
    async fn create(
        &self,
        user_id: Uuid,
        req: &PatientAnamneseRequest,
    ) -> DbResult<PatientAnamneseDetails> {
        let mut tx = self.pool.begin().await?;
        ensure_owned(&mut tx, Owned::Patient, req.patient_id, user_id).await?;
        ensure_owned(&mut tx, Owned::Template, req.anamnese_id, user_id).await?;

        let id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO patient_anamneses (id, patient_id, anamnese_id, user_id, answered_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(req.patient_id)
        .bind(req.anamnese_id)
        .bind(user_id)
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for answer in &req.answers {
            let belongs: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM anamnese_fields WHERE id = ? AND anamnese_id = ?",
            )
            .bind(answer.field_id)
            .bind(req.anamnese_id)
            .fetch_one(&mut *tx)
            .await?;
            if belongs == 0 {
                return Err(DbError::Validation(format!(
                    "campo {} não pertence ao template",
                    answer.field_id
                )));
            }

            sqlx::query(
                "INSERT INTO patient_anamnese_fields (id, patient_anamnese_id, field_id, value, created_at)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4())
            .bind(id)
            .bind(answer.field_id)
            .bind(&answer.value)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(patient_anamnese_id = %id, answers = req.answers.len(), "anamnese registrada");
        self.find_details(id, req.patient_id, user_id).await
    }

    async fn list_by_patient(
        &self,
        patient_id: Uuid,
        user_id: Uuid,
    ) -> DbResult<Vec<PatientAnamnese>> {
        let mut conn = self.pool.acquire().await?;
        ensure_owned(&mut conn, Owned::Patient, patient_id, user_id).await?;

        let anamneses = sqlx::query_as::<_, PatientAnamnese>(
            "SELECT * FROM patient_anamneses WHERE patient_id = ? AND user_id = ?
             ORDER BY answered_at DESC, id DESC",
        )
        .bind(patient_id)
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(anamneses)
    }

    async fn find_details(
        &self,
        id: Uuid,
        patient_id: Uuid,
        user_id: Uuid,
    ) -> DbResult<PatientAnamneseDetails> {
        let anamnese = sqlx::query_as::<_, PatientAnamnese>(
            "SELECT * FROM patient_anamneses WHERE id = ? AND patient_id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(patient_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Anamnese não encontrada"))?;

        let template_title: String =
            sqlx::query_scalar("SELECT title FROM anamnese_templates WHERE id = ?")
                .bind(anamnese.anamnese_id)
                .fetch_one(&self.pool)
                .await?;

        let answers = sqlx::query_as::<_, PatientAnamneseField>(
            "SELECT a.* FROM patient_anamnese_fields a
             JOIN anamnese_fields f ON f.id = a.field_id
             WHERE a.patient_anamnese_id = ?
             ORDER BY f.field_number ASC, a.id ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(PatientAnamneseDetails {
            anamnese,
            template_title,
            answers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnswerRequest, FieldType};
    use crate::repositories::fixtures::{cost_center_request, patient_request, test_pool, user};
    use crate::repositories::{
        CostCenterRepository, PatientRepository, SqliteCostCenterRepository,
        SqlitePatientRepository,
    };

    fn option(value: &str, order: i32) -> FieldOptionRequest {
        FieldOptionRequest {
            option_value: value.into(),
            option_order: order,
        }
    }

    fn field(number: i32, kind: FieldType, options: Vec<FieldOptionRequest>) -> AnamneseFieldRequest {
        AnamneseFieldRequest {
            field_number: number,
            field_type: kind,
            field_title: format!("Pergunta {}", number),
            field_required: false,
            field_active: true,
            options,
        }
    }

    #[tokio::test]
    async fn test_fields_ordered_with_options() {
        let (_dir, pool) = test_pool().await;
        let owner = user(&pool, "owner@psygrow.com.br").await;
        let templates = SqliteAnamneseTemplateRepository::new(pool.clone());
        let fields = SqliteAnamneseFieldRepository::new(pool.clone());

        let template = templates
            .create(owner, &TemplateRequest { title: "Anamnese adulto".into() })
            .await
            .unwrap();

        fields
            .create(template.id, owner, &field(2, FieldType::Text, vec![option("ignorada", 1)]))
            .await
            .unwrap();
        fields
            .create(
                template.id,
                owner,
                &field(1, FieldType::Select, vec![option("Casado", 2), option("Solteiro", 1)]),
            )
            .await
            .unwrap();

        let listed = fields.list_by_template(template.id, owner).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].field_number, 1);
        let values: Vec<_> = listed[0].options.iter().map(|o| o.option_value.as_str()).collect();
        assert_eq!(values, vec!["Solteiro", "Casado"]);
        assert!(listed[1].options.is_empty());
    }

    #[tokio::test]
    async fn test_bulk_replace_is_destructive() {
        let (_dir, pool) = test_pool().await;
        let owner = user(&pool, "owner@psygrow.com.br").await;
        let template = SqliteAnamneseTemplateRepository::new(pool.clone())
            .create(owner, &TemplateRequest { title: "Infantil".into() })
            .await
            .unwrap();
        let created = SqliteAnamneseFieldRepository::new(pool.clone())
            .create(
                template.id,
                owner,
                &field(1, FieldType::Multiselect, vec![option("A", 1), option("B", 2)]),
            )
            .await
            .unwrap();
        let old_ids: Vec<Uuid> = created.options.iter().map(|o| o.id).collect();

        let options = SqliteFieldOptionRepository::new(pool.clone());
        let replaced = options
            .replace_all(created.id, template.id, owner, &[option("X", 1), option("Y", 2), option("Z", 3)])
            .await
            .unwrap();
        assert_eq!(replaced.len(), 3);

        let listed = options.list(created.id, template.id, owner).await.unwrap();
        let values: Vec<_> = listed.iter().map(|o| o.option_value.as_str()).collect();
        assert_eq!(values, vec!["X", "Y", "Z"]);
        assert!(listed.iter().all(|o| !old_ids.contains(&o.id)));

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM anamnese_field_options")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(remaining, 3);
    }

    #[tokio::test]
    async fn test_options_rejected_for_text_field_and_foreign_tenant() {
        let (_dir, pool) = test_pool().await;
        let owner = user(&pool, "owner@psygrow.com.br").await;
        let stranger = user(&pool, "stranger@psygrow.com.br").await;
        let template = SqliteAnamneseTemplateRepository::new(pool.clone())
            .create(owner, &TemplateRequest { title: "Triagem".into() })
            .await
            .unwrap();
        let text_field = SqliteAnamneseFieldRepository::new(pool.clone())
            .create(template.id, owner, &field(1, FieldType::Text, vec![]))
            .await
            .unwrap();

        let options = SqliteFieldOptionRepository::new(pool.clone());
        assert!(matches!(
            options.create(text_field.id, template.id, owner, &option("A", 1)).await,
            Err(DbError::Validation(_))
        ));
        assert!(matches!(
            options.list(text_field.id, template.id, stranger).await,
            Err(DbError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_deleting_field_removes_options() {
        let (_dir, pool) = test_pool().await;
        let owner = user(&pool, "owner@psygrow.com.br").await;
        let template = SqliteAnamneseTemplateRepository::new(pool.clone())
            .create(owner, &TemplateRequest { title: "Casal".into() })
            .await
            .unwrap();
        let fields = SqliteAnamneseFieldRepository::new(pool.clone());
        let select = fields
            .create(template.id, owner, &field(1, FieldType::Select, vec![option("Sim", 1)]))
            .await
            .unwrap();

        fields.delete(select.id, template.id, owner).await.unwrap();
        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM anamnese_field_options")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn test_patient_anamnese_with_answers() {
        let (_dir, pool) = test_pool().await;
        let owner = user(&pool, "owner@psygrow.com.br").await;
        let stranger = user(&pool, "stranger@psygrow.com.br").await;
        let cost_center = SqliteCostCenterRepository::new(pool.clone())
            .create(owner, &cost_center_request())
            .await
            .unwrap();
        let patient = SqlitePatientRepository::new(pool.clone())
            .create(owner, &patient_request(cost_center.id, "Sofia Ramos"))
            .await
            .unwrap();
        let template = SqliteAnamneseTemplateRepository::new(pool.clone())
            .create(owner, &TemplateRequest { title: "Adulto".into() })
            .await
            .unwrap();
        let question = SqliteAnamneseFieldRepository::new(pool.clone())
            .create(template.id, owner, &field(1, FieldType::Text, vec![]))
            .await
            .unwrap();

        let repo = SqlitePatientAnamneseRepository::new(pool.clone());
        let details = repo
            .create(
                owner,
                &PatientAnamneseRequest {
                    patient_id: patient.id,
                    anamnese_id: template.id,
                    answers: vec![AnswerRequest {
                        field_id: question.id,
                        value: "Ansiedade no trabalho".into(),
                    }],
                },
            )
            .await
            .unwrap();
        assert_eq!(details.template_title, "Adulto");
        assert_eq!(details.answers.len(), 1);

        let listed = repo.list_by_patient(patient.id, owner).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(matches!(
            repo.find_details(details.anamnese.id, patient.id, stranger).await,
            Err(DbError::NotFound(_))
        ));

        // Campo de outro template invalida a gravação inteira
        let err = repo
            .create(
                owner,
                &PatientAnamneseRequest {
                    patient_id: patient.id,
                    anamnese_id: template.id,
                    answers: vec![AnswerRequest {
                        field_id: Uuid::new_v4(),
                        value: "x".into(),
                    }],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
        assert_eq!(repo.list_by_patient(patient.id, owner).await.unwrap().len(), 1);
    }
}
