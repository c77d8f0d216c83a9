//! Templates de anamnese, seus campos e opções, e anamneses respondidas

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use psygrow_db::models::{
    AnamneseField, AnamneseFieldRequest, AnamneseTemplate, BulkOptionsRequest, FieldOption,
    FieldOptionRequest, PatientAnamnese, PatientAnamneseDetails, PatientAnamneseRequest,
    TemplateRequest,
};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::extract::{parse_id, CurrentUser, ValidatedJson};
use crate::state::AppState;

fn field_path(template_id: &str, field_id: &str) -> ApiResult<(Uuid, Uuid)> {
    Ok((
        parse_id(template_id, "template_id")?,
        parse_id(field_id, "field_id")?,
    ))
}

pub async fn create_template(
    State(state): State<AppState>,
    current: CurrentUser,
    ValidatedJson(req): ValidatedJson<TemplateRequest>,
) -> ApiResult<(StatusCode, Json<AnamneseTemplate>)> {
    let template = state.repos.templates.create(current.id, &req).await?;
    Ok((StatusCode::CREATED, Json(template)))
}

pub async fn list_templates(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Json<Vec<AnamneseTemplate>>> {
    Ok(Json(state.repos.templates.list(current.id).await?))
}

pub async fn get_template(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(template_id): Path<String>,
) -> ApiResult<Json<AnamneseTemplate>> {
    let id = parse_id(&template_id, "template_id")?;
    Ok(Json(state.repos.templates.find_by_id(id, current.id).await?))
}

pub async fn update_template(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(template_id): Path<String>,
    ValidatedJson(req): ValidatedJson<TemplateRequest>,
) -> ApiResult<Json<AnamneseTemplate>> {
    let id = parse_id(&template_id, "template_id")?;
    Ok(Json(state.repos.templates.update(id, current.id, &req).await?))
}

pub async fn delete_template(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(template_id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&template_id, "template_id")?;
    state.repos.templates.delete(id, current.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_field(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(template_id): Path<String>,
    ValidatedJson(req): ValidatedJson<AnamneseFieldRequest>,
) -> ApiResult<(StatusCode, Json<AnamneseField>)> {
    let template_id = parse_id(&template_id, "template_id")?;
    let field = state
        .repos
        .fields
        .create(template_id, current.id, &req)
        .await?;
    Ok((StatusCode::CREATED, Json(field)))
}

pub async fn list_fields(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(template_id): Path<String>,
) -> ApiResult<Json<Vec<AnamneseField>>> {
    let template_id = parse_id(&template_id, "template_id")?;
    Ok(Json(
        state
            .repos
            .fields
            .list_by_template(template_id, current.id)
            .await?,
    ))
}

pub async fn update_field(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((template_id, field_id)): Path<(String, String)>,
    ValidatedJson(req): ValidatedJson<AnamneseFieldRequest>,
) -> ApiResult<Json<AnamneseField>> {
    let (template_id, id) = field_path(&template_id, &field_id)?;
    Ok(Json(
        state
            .repos
            .fields
            .update(id, template_id, current.id, &req)
            .await?,
    ))
}

pub async fn delete_field(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((template_id, field_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let (template_id, id) = field_path(&template_id, &field_id)?;
    state
        .repos
        .fields
        .delete(id, template_id, current.id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_option(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((template_id, field_id)): Path<(String, String)>,
    ValidatedJson(req): ValidatedJson<FieldOptionRequest>,
) -> ApiResult<(StatusCode, Json<FieldOption>)> {
    let (template_id, field_id) = field_path(&template_id, &field_id)?;
    let option = state
        .repos
        .options
        .create(field_id, template_id, current.id, &req)
        .await?;
    Ok((StatusCode::CREATED, Json(option)))
}

pub async fn list_options(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((template_id, field_id)): Path<(String, String)>,
) -> ApiResult<Json<Vec<FieldOption>>> {
    let (template_id, field_id) = field_path(&template_id, &field_id)?;
    Ok(Json(
        state
            .repos
            .options
            .list(field_id, template_id, current.id)
            .await?,
    ))
}

/// Substitui todas as opções do campo pela lista enviada
pub async fn replace_options(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((template_id, field_id)): Path<(String, String)>,
    ValidatedJson(req): ValidatedJson<BulkOptionsRequest>,
) -> ApiResult<Json<Vec<FieldOption>>> {
    let (template_id, field_id) = field_path(&template_id, &field_id)?;
    Ok(Json(
        state
            .repos
            .options
            .replace_all(field_id, template_id, current.id, &req.options)
            .await?,
    ))
}

pub async fn create_patient_anamnese(
    State(state): State<AppState>,
    current: CurrentUser,
    ValidatedJson(req): ValidatedJson<PatientAnamneseRequest>,
) -> ApiResult<(StatusCode, Json<PatientAnamneseDetails>)> {
    let details = state
        .repos
        .patient_anamneses
        .create(current.id, &req)
        .await?;
    Ok((StatusCode::CREATED, Json(details)))
}

pub async fn list_patient_anamneses(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(patient_id): Path<String>,
) -> ApiResult<Json<Vec<PatientAnamnese>>> {
    let patient_id = parse_id(&patient_id, "patient_id")?;
    Ok(Json(
        state
            .repos
            .patient_anamneses
            .list_by_patient(patient_id, current.id)
            .await?,
    ))
}

pub async fn get_patient_anamnese(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((patient_id, record_id)): Path<(String, String)>,
) -> ApiResult<Json<PatientAnamneseDetails>> {
    let patient_id = parse_id(&patient_id, "patient_id")?;
    let id = parse_id(&record_id, "record_id")?;
    Ok(Json(
        state
            .repos
            .patient_anamneses
            .find_details(id, patient_id, current.id)
            .await?,
    ))
}
