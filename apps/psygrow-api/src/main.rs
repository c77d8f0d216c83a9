use std::net::SocketAddr;

use anyhow::{Context, Result};
use psygrow_api::auth::TokenService;
use psygrow_api::{build_router, built_info, seed, AppConfig, AppState};
use psygrow_db::init_db_pool;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "psygrow_api=info,psygrow_db=info,tower_http=info";

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env().context("Configuração inválida")?;
    let pool = init_db_pool(&config.db).await?;

    let state = AppState::new(
        pool,
        TokenService::new(&config.jwt_secret, config.jwt_ttl_hours),
    );

    if let Some(admin) = &config.default_admin {
        seed::seed_default_admin(&state.repos, admin).await?;
    }

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .with_context(|| format!("Endereço inválido: {}", config.bind_address()))?;

    let app = build_router(state, config.max_concurrency);

    info!(%addr, version = built_info::PKG_VERSION, "PsyGrow API iniciada");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Servidor HTTP encerrou com erro")?;

    info!("PsyGrow API encerrada");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "falha ao aguardar sinal de encerramento");
    }
}
