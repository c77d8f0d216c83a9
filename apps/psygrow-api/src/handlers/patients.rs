use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use psygrow_db::models::{Evolution, Patient, PatientFilter, PatientRequest};
use psygrow_db::Paginated;

use crate::error::ApiResult;
use crate::extract::{parse_id, CurrentUser, QueryParams, ValidatedJson};
use crate::state::AppState;

pub async fn create(
    State(state): State<AppState>,
    current: CurrentUser,
    ValidatedJson(req): ValidatedJson<PatientRequest>,
) -> ApiResult<(StatusCode, Json<Patient>)> {
    let patient = state.repos.patients.create(current.id, &req).await?;
    Ok((StatusCode::CREATED, Json(patient)))
}

/// Filtros: `name`, `cost_center_id`, `active`, além de `limit`/`offset`
pub async fn list(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Paginated<Patient>>> {
    let params = QueryParams::new(params);
    let filter = PatientFilter {
        name: params.text("name"),
        cost_center_id: params.uuid("cost_center_id")?,
        active: params.boolean("active")?,
    };
    let page = state
        .repos
        .patients
        .list(current.id, &filter, params.page())
        .await?;
    Ok(Json(page))
}

pub async fn get(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(patient_id): Path<String>,
) -> ApiResult<Json<Patient>> {
    let id = parse_id(&patient_id, "patient_id")?;
    Ok(Json(state.repos.patients.find_by_id(id, current.id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(patient_id): Path<String>,
    ValidatedJson(req): ValidatedJson<PatientRequest>,
) -> ApiResult<Json<Patient>> {
    let id = parse_id(&patient_id, "patient_id")?;
    Ok(Json(state.repos.patients.update(id, current.id, &req).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(patient_id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&patient_id, "patient_id")?;
    state.repos.patients.delete(id, current.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Evoluções do paciente, mais recentes primeiro
pub async fn evolutions(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(patient_id): Path<String>,
) -> ApiResult<Json<Vec<Evolution>>> {
    let id = parse_id(&patient_id, "patient_id")?;
    Ok(Json(state.repos.evolutions.list_by_patient(id, current.id).await?))
}
