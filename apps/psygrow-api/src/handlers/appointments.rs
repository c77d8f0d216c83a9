use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use psygrow_db::models::{
    Appointment, AppointmentFilter, AppointmentRequest, AppointmentStatus, AppointmentUpdate,
};
use psygrow_db::Paginated;
use tracing::info;
use validator::Validate;

use crate::error::ApiResult;
use crate::extract::{parse_id, CurrentUser, QueryParams, ValidatedJson};
use crate::state::AppState;

/// Sem `professional_id`, o atendimento fica com o próprio usuário
pub async fn create(
    State(state): State<AppState>,
    current: CurrentUser,
    ValidatedJson(mut req): ValidatedJson<AppointmentRequest>,
) -> ApiResult<(StatusCode, Json<Appointment>)> {
    req.professional_id.get_or_insert(current.id);
    let appointment = state.repos.appointments.create(current.id, &req).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

/// Filtros: `patient_id`, `status`, `from`, `to`
pub async fn list(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Paginated<Appointment>>> {
    let params = QueryParams::new(params);
    let filter = AppointmentFilter {
        patient_id: params.uuid("patient_id")?,
        status: params.variant::<AppointmentStatus>("status")?,
        from: params.datetime("from")?,
        to: params.datetime("to")?,
    };
    let page = state
        .repos
        .appointments
        .list(current.id, &filter, params.page())
        .await?;
    Ok(Json(page))
}

pub async fn get(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(appointment_id): Path<String>,
) -> ApiResult<Json<Appointment>> {
    let id = parse_id(&appointment_id, "appointment_id")?;
    Ok(Json(state.repos.appointments.find_by_id(id, current.id).await?))
}

/// Atualização parcial; marcar como `done` gera a sessão
pub async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(appointment_id): Path<String>,
    ValidatedJson(changes): ValidatedJson<AppointmentUpdate>,
) -> ApiResult<Json<Appointment>> {
    let id = parse_id(&appointment_id, "appointment_id")?;
    let mut appointment = state.repos.appointments.find_by_id(id, current.id).await?;
    let previous = appointment.status;

    appointment.apply(changes);
    appointment.validate()?;
    let updated = state.repos.appointments.update(&appointment).await?;

    if previous != updated.status {
        info!(
            appointment_id = %id,
            from = %previous,
            to = %updated.status,
            "status do atendimento alterado"
        );
    }
    Ok(Json(updated))
}

pub async fn delete(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(appointment_id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&appointment_id, "appointment_id")?;
    state.repos.appointments.delete(id, current.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
