use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use psygrow_db::models::{LoginRequest, LoginResponse, NewUser, RegisterRequest, User, DEFAULT_ROLE};
use tracing::{info, warn};

use crate::auth::{hash_password, verify_dummy_password, verify_password};
use crate::error::{ApiError, ApiResult};
use crate::extract::{CurrentUser, ValidatedJson};
use crate::state::AppState;

const INVALID_CREDENTIALS: &str = "Usuário ou senha inválidos";

/// Cadastro público; toda conta nova recebe o papel padrão
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let email = req.email.trim().to_lowercase();
    if state.repos.users.find_by_email(&email).await?.is_some() {
        return Err(ApiError::BadRequest("E-mail já cadastrado".to_string()));
    }

    let password_hash = hash_password(req.password).await?;
    let user = state
        .repos
        .users
        .create(&NewUser {
            name: req.name,
            email,
            password_hash,
            role: DEFAULT_ROLE.to_string(),
            phone: req.phone,
        })
        .await?;

    info!(user_id = %user.id, "usuário cadastrado");
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let email = req.email.trim().to_lowercase();
    let user = match state.repos.users.find_by_email(&email).await? {
        Some(user) => user,
        None => {
            warn!("tentativa de login com e-mail desconhecido");
            verify_dummy_password(req.password).await?;
            return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }
    };

    if !verify_password(req.password, user.password_hash.clone()).await? {
        warn!(user_id = %user.id, "senha incorreta");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    if !user.is_active {
        warn!(user_id = %user.id, "login de conta inativa");
        return Err(ApiError::Unauthorized("Conta inativa".to_string()));
    }

    state.repos.users.record_login(user.id).await?;
    let token = state.tokens.issue(user.id, &user.role)?;
    Ok(Json(LoginResponse { token }))
}

/// Perfil do próprio usuário; e-mails de terceiros são recusados
pub async fn get_by_email(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(email): Path<String>,
) -> ApiResult<Json<User>> {
    let user = state.repos.users.find_by_id(current.id).await?;
    if !user.email.eq_ignore_ascii_case(email.trim()) {
        return Err(ApiError::Forbidden(
            "Sem permissão para acessar outro usuário".to_string(),
        ));
    }
    Ok(Json(user))
}
