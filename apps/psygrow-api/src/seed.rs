//! Conta administrativa padrão criada na inicialização

use anyhow::{Context, Result};
use psygrow_db::models::NewUser;
use psygrow_db::Repositories;
use tracing::info;

use crate::auth::hash_password;
use crate::config::AdminSeed;

/// Cria o administrador se o e-mail ainda não existir. Retorna `true` quando cria.
pub async fn seed_default_admin(repos: &Repositories, seed: &AdminSeed) -> Result<bool> {
    let email = seed.email.trim().to_lowercase();
    if repos
        .users
        .find_by_email(&email)
        .await
        .context("Falha ao consultar administrador padrão")?
        .is_some()
    {
        info!(email = %email, "administrador padrão já existe");
        return Ok(false);
    }

    let password_hash = hash_password(seed.password.clone())
        .await
        .map_err(|e| anyhow::anyhow!("Falha ao gerar hash do administrador: {}", e))?;

    let user = repos
        .users
        .create(&NewUser {
            name: seed.name.clone(),
            email,
            password_hash,
            role: seed.role.clone(),
            phone: None,
        })
        .await
        .context("Falha ao criar administrador padrão")?;

    info!(user_id = %user.id, "administrador padrão criado");
    Ok(true)
}
