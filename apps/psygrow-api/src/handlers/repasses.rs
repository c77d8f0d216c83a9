use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use psygrow_db::models::{Repasse, RepasseFilter, RepasseRequest, RepasseStatus, RepasseStatusUpdate};

use crate::error::ApiResult;
use crate::extract::{parse_id, CurrentUser, QueryParams, ValidatedJson};
use crate::state::AppState;

/// Sem `value`, o repasse é calculado sobre `base_amount` pela regra vigente
pub async fn create(
    State(state): State<AppState>,
    current: CurrentUser,
    ValidatedJson(req): ValidatedJson<RepasseRequest>,
) -> ApiResult<(StatusCode, Json<Repasse>)> {
    let repasse = state.repos.repasses.create(current.id, &req).await?;
    Ok((StatusCode::CREATED, Json(repasse)))
}

pub async fn list(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Vec<Repasse>>> {
    let params = QueryParams::new(params);
    let filter = RepasseFilter {
        status: params.variant::<RepasseStatus>("status")?,
        appointment_id: params.uuid("appointment_id")?,
    };
    Ok(Json(state.repos.repasses.list(current.id, &filter).await?))
}

pub async fn update_status(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(repasse_id): Path<String>,
    ValidatedJson(req): ValidatedJson<RepasseStatusUpdate>,
) -> ApiResult<Json<Repasse>> {
    let id = parse_id(&repasse_id, "repasse_id")?;
    Ok(Json(
        state
            .repos
            .repasses
            .update_status(id, current.id, req.status)
            .await?,
    ))
}
