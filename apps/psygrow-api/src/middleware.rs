//! Autenticação por bearer token nas rotas protegidas

use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::ApiError;
use crate::extract::CurrentUser;
use crate::state::AppState;

/// Valida `Authorization: Bearer <token>` e injeta o usuário na requisição
pub async fn require_auth<B>(
    State(state): State<AppState>,
    mut req: Request<B>,
    next: Next<B>,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthorized("Token de autenticação ausente".to_string()))?;

    let claims = state.tokens.verify(token.trim())?;

    req.extensions_mut().insert(CurrentUser {
        id: claims.sub,
        role: claims.role,
    });

    Ok(next.run(req).await)
}
