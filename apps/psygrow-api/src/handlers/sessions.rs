use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use psygrow_db::models::{Evolution, EvolutionRequest, Session, SessionFilter};
use psygrow_db::Paginated;

use crate::error::ApiResult;
use crate::extract::{parse_id, CurrentUser, QueryParams, ValidatedJson};
use crate::state::AppState;

pub async fn list(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Paginated<Session>>> {
    let params = QueryParams::new(params);
    let filter = SessionFilter {
        patient_id: params.uuid("patient_id")?,
    };
    let page = state
        .repos
        .sessions
        .list(current.id, &filter, params.page())
        .await?;
    Ok(Json(page))
}

pub async fn get(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Session>> {
    let id = parse_id(&session_id, "session_id")?;
    Ok(Json(state.repos.sessions.find_by_id(id, current.id).await?))
}

pub async fn create_evolution(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(session_id): Path<String>,
    ValidatedJson(req): ValidatedJson<EvolutionRequest>,
) -> ApiResult<(StatusCode, Json<Evolution>)> {
    let session_id = parse_id(&session_id, "session_id")?;
    let evolution = state
        .repos
        .evolutions
        .create(session_id, current.id, &req)
        .await?;
    Ok((StatusCode::CREATED, Json(evolution)))
}

pub async fn get_evolution(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((session_id, evolution_id)): Path<(String, String)>,
) -> ApiResult<Json<Evolution>> {
    let session_id = parse_id(&session_id, "session_id")?;
    let id = parse_id(&evolution_id, "evolution_id")?;
    Ok(Json(
        state
            .repos
            .evolutions
            .find_by_id(id, session_id, current.id)
            .await?,
    ))
}
