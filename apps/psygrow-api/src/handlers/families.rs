use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use psygrow_db::models::{PatientFamily, PatientFamilyRequest, Relationship};

use crate::error::ApiResult;
use crate::extract::{parse_id, CurrentUser, QueryParams, ValidatedJson};
use crate::state::AppState;

pub async fn create(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(patient_id): Path<String>,
    ValidatedJson(req): ValidatedJson<PatientFamilyRequest>,
) -> ApiResult<(StatusCode, Json<PatientFamily>)> {
    let patient_id = parse_id(&patient_id, "patient_id")?;
    let member = state
        .repos
        .families
        .create(patient_id, current.id, &req)
        .await?;
    Ok((StatusCode::CREATED, Json(member)))
}

/// Aceita `relationship` como filtro opcional
pub async fn list(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(patient_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Vec<PatientFamily>>> {
    let patient_id = parse_id(&patient_id, "patient_id")?;
    let relationship = QueryParams::new(params).variant::<Relationship>("relationship")?;
    let members = state
        .repos
        .families
        .list(patient_id, current.id, relationship)
        .await?;
    Ok(Json(members))
}

pub async fn get(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((patient_id, family_id)): Path<(String, String)>,
) -> ApiResult<Json<PatientFamily>> {
    let patient_id = parse_id(&patient_id, "patient_id")?;
    let id = parse_id(&family_id, "family_id")?;
    Ok(Json(
        state
            .repos
            .families
            .find_by_id(id, patient_id, current.id)
            .await?,
    ))
}

pub async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((patient_id, family_id)): Path<(String, String)>,
    ValidatedJson(req): ValidatedJson<PatientFamilyRequest>,
) -> ApiResult<Json<PatientFamily>> {
    let patient_id = parse_id(&patient_id, "patient_id")?;
    let id = parse_id(&family_id, "family_id")?;
    Ok(Json(
        state
            .repos
            .families
            .update(id, patient_id, current.id, &req)
            .await?,
    ))
}

pub async fn delete(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((patient_id, family_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let patient_id = parse_id(&patient_id, "patient_id")?;
    let id = parse_id(&family_id, "family_id")?;
    state
        .repos
        .families
        .delete(id, patient_id, current.id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
