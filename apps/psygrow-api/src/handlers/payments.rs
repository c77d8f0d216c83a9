use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use psygrow_db::models::{Payment, PaymentDetails, PaymentFilter, PaymentRequest};
use psygrow_db::Paginated;
use tracing::info;

use crate::error::ApiResult;
use crate::extract::{parse_id, CurrentUser, QueryParams, ValidatedJson};
use crate::state::AppState;

/// Pagamento e vínculos com atendimentos são gravados juntos ou nada é gravado
pub async fn create(
    State(state): State<AppState>,
    current: CurrentUser,
    ValidatedJson(req): ValidatedJson<PaymentRequest>,
) -> ApiResult<(StatusCode, Json<PaymentDetails>)> {
    let details = state.repos.payments.create(current.id, &req).await?;
    info!(
        payment_id = %details.payment.id,
        appointments = details.appointment_ids.len(),
        "pagamento registrado"
    );
    Ok((StatusCode::CREATED, Json(details)))
}

pub async fn list(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Paginated<Payment>>> {
    let params = QueryParams::new(params);
    let filter = PaymentFilter {
        patient_id: params.uuid("patient_id")?,
        cost_center_id: params.uuid("cost_center_id")?,
    };
    let page = state
        .repos
        .payments
        .list(current.id, &filter, params.page())
        .await?;
    Ok(Json(page))
}

pub async fn get(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(payment_id): Path<String>,
) -> ApiResult<Json<PaymentDetails>> {
    let id = parse_id(&payment_id, "payment_id")?;
    Ok(Json(state.repos.payments.find_by_id(id, current.id).await?))
}
