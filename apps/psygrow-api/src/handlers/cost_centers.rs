use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use psygrow_db::models::{CostCenter, CostCenterRequest, CostCenterUpdate};
use validator::Validate;

use crate::error::ApiResult;
use crate::extract::{parse_id, CurrentUser, ValidatedJson};
use crate::state::AppState;

pub async fn create(
    State(state): State<AppState>,
    current: CurrentUser,
    ValidatedJson(req): ValidatedJson<CostCenterRequest>,
) -> ApiResult<(StatusCode, Json<CostCenter>)> {
    let cost_center = state.repos.cost_centers.create(current.id, &req).await?;
    Ok((StatusCode::CREATED, Json(cost_center)))
}

pub async fn list(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Json<Vec<CostCenter>>> {
    Ok(Json(state.repos.cost_centers.list(current.id).await?))
}

pub async fn get(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<CostCenter>> {
    let id = parse_id(&id, "id")?;
    Ok(Json(state.repos.cost_centers.find_by_id(id, current.id).await?))
}

/// Atualização parcial: mescla, revalida a regra de repasse e persiste
pub async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    ValidatedJson(changes): ValidatedJson<CostCenterUpdate>,
) -> ApiResult<Json<CostCenter>> {
    let id = parse_id(&id, "id")?;
    let mut cost_center = state.repos.cost_centers.find_by_id(id, current.id).await?;
    cost_center.apply(changes);
    cost_center.validate()?;
    Ok(Json(state.repos.cost_centers.update(&cost_center).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&id, "id")?;
    state.repos.cost_centers.delete(id, current.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
