use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use psygrow_db::models::{ConvertLeadRequest, Lead, LeadConversion, LeadFilter, LeadRequest, LeadStatus};
use psygrow_db::Paginated;
use tracing::info;

use crate::error::ApiResult;
use crate::extract::{parse_id, CurrentUser, QueryParams, ValidatedJson};
use crate::state::AppState;

pub async fn create(
    State(state): State<AppState>,
    current: CurrentUser,
    ValidatedJson(req): ValidatedJson<LeadRequest>,
) -> ApiResult<(StatusCode, Json<Lead>)> {
    let lead = state.repos.leads.create(current.id, &req).await?;
    Ok((StatusCode::CREATED, Json(lead)))
}

/// Filtros: `status`, `origin`, `was_attended`, `contact_from`, `contact_to`
pub async fn list(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Paginated<Lead>>> {
    let params = QueryParams::new(params);
    let filter = LeadFilter {
        status: params.variant::<LeadStatus>("status")?,
        origin: params.text("origin"),
        was_attended: params.boolean("was_attended")?,
        contact_from: params.datetime("contact_from")?,
        contact_to: params.datetime("contact_to")?,
    };
    let page = state
        .repos
        .leads
        .list(current.id, &filter, params.page())
        .await?;
    Ok(Json(page))
}

pub async fn get(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(lead_id): Path<String>,
) -> ApiResult<Json<Lead>> {
    let id = parse_id(&lead_id, "lead_id")?;
    Ok(Json(state.repos.leads.find_by_id(id, current.id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(lead_id): Path<String>,
    ValidatedJson(req): ValidatedJson<LeadRequest>,
) -> ApiResult<Json<Lead>> {
    let id = parse_id(&lead_id, "lead_id")?;
    Ok(Json(state.repos.leads.update(id, current.id, &req).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(lead_id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&lead_id, "lead_id")?;
    state.repos.leads.delete(id, current.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Converte o lead em paciente no centro de custo informado
pub async fn convert(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(lead_id): Path<String>,
    ValidatedJson(req): ValidatedJson<ConvertLeadRequest>,
) -> ApiResult<(StatusCode, Json<LeadConversion>)> {
    let id = parse_id(&lead_id, "lead_id")?;
    let patient_id = state
        .repos
        .leads
        .convert_to_patient(id, current.id, req.cost_center_id)
        .await?;

    info!(lead_id = %id, patient_id = %patient_id, "lead convertido em paciente");
    Ok((
        StatusCode::CREATED,
        Json(LeadConversion {
            message: "Lead convertido em paciente com sucesso".to_string(),
            patient_id,
        }),
    ))
}
