//! Hash de senhas e emissão/verificação de tokens de acesso

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::warn;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// Gera o hash Argon2id da senha fora das threads do runtime
pub async fn hash_password(password: String) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ApiError::Internal(format!("Falha ao gerar hash da senha: {}", e)))
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))?
}

fn check_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!(error = %e, "hash de senha armazenado em formato inválido");
            false
        }
    }
}

/// Hash de referência gerado uma vez por processo, com os mesmos parâmetros das contas reais
fn dummy_hash() -> &'static str {
    static DUMMY_HASH: OnceLock<String> = OnceLock::new();
    DUMMY_HASH.get_or_init(|| {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(b"psygrow-dummy-password", &salt)
            .map(|hash| hash.to_string())
            .unwrap_or_default()
    })
}

/// Confere a senha contra o hash armazenado. Hash ilegível conta como senha errada.
pub async fn verify_password(password: String, hash: String) -> ApiResult<bool> {
    tokio::task::spawn_blocking(move || check_password(&password, &hash))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// Executa uma verificação Argon2 descartável, para que e-mails desconhecidos
/// custem o mesmo que senhas erradas.
pub async fn verify_dummy_password(password: String) -> ApiResult<()> {
    tokio::task::spawn_blocking(move || {
        check_password(&password, dummy_hash());
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))
}

/// Conteúdo do token de acesso
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// Assina e valida tokens HS256
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self::with_ttl(secret, Duration::hours(ttl_hours))
    }

    pub fn with_ttl(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(&self, user_id: Uuid, role: &str) -> ApiResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            role: role.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("Falha ao gerar token: {}", e)))
    }

    pub fn verify(&self, token: &str) -> ApiResult<Claims> {
        decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
            .map_err(|e| {
                warn!(error = %e, "token rejeitado");
                ApiError::Unauthorized("Token inválido ou expirado".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_password_roundtrip() {
        let hash = hash_password("senha-forte-123".into()).await.unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("senha-forte-123".into(), hash.clone()).await.unwrap());
        assert!(!verify_password("outra-senha".into(), hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_dummy_hash_is_real_argon2_and_never_matches() {
        assert!(dummy_hash().starts_with("$argon2id$"));
        assert!(PasswordHash::new(dummy_hash()).is_ok());
        assert!(!check_password("senha-forte-123", dummy_hash()));
        // Mesmo hash reaproveitado entre chamadas
        assert!(std::ptr::eq(dummy_hash(), dummy_hash()));
        verify_dummy_password("senha-forte-123".into()).await.unwrap();
    }

    #[tokio::test]
    async fn test_garbage_hash_does_not_verify() {
        assert!(!verify_password("x".into(), "não é hash".into()).await.unwrap());
    }

    #[test]
    fn test_token_carries_identity() {
        let tokens = TokenService::new("segredo", 24);
        let user_id = Uuid::new_v4();
        let claims = tokens.verify(&tokens.issue(user_id, "professional").unwrap()).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, "professional");
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
    }

    #[test]
    fn test_expired_and_foreign_tokens_rejected() {
        let expired = TokenService::with_ttl("segredo", Duration::hours(-2));
        let token = expired.issue(Uuid::new_v4(), "professional").unwrap();
        assert!(matches!(expired.verify(&token), Err(ApiError::Unauthorized(_))));

        let other = TokenService::new("outro-segredo", 24);
        let token = other.issue(Uuid::new_v4(), "professional").unwrap();
        assert!(TokenService::new("segredo", 24).verify(&token).is_err());
    }
}
