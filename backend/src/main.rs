//! Service entry-point: configuration, migrations, adapter wiring, and the
//! HTTP server.

use std::sync::Arc;

use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::cookie::{Key, SameSite};
use actix_web::{App, HttpServer, web};
#[cfg(feature = "metrics")]
use actix_web_prom::PrometheusMetricsBuilder;
use diesel::Connection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

use backend::config::Settings;
use backend::domain::ledger::LedgerService;
use backend::inbound::http::configure_api;
use backend::inbound::http::health::{HealthState, live, ready};
use backend::inbound::http::state::{GatewayPorts, HttpState};
use backend::outbound::persistence::{DbPool, DieselBalanceStore, PoolConfig};
use backend::outbound::providers::{
    CardCheckoutClient, CardWebhookVerifier, GatewayClient, GatewaySignature,
};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

fn load_session_key(settings: &Settings) -> std::io::Result<Key> {
    match std::fs::read(&settings.session_key_file) {
        Ok(bytes) => Ok(Key::derive_from(&bytes)),
        Err(err) => {
            let allow_dev =
                std::env::var("SESSION_ALLOW_EPHEMERAL").ok().as_deref() == Some("1");
            if cfg!(debug_assertions) || allow_dev {
                warn!(
                    path = %settings.session_key_file,
                    error = %err,
                    "using temporary session key (dev only)"
                );
                Ok(Key::generate())
            } else {
                Err(std::io::Error::other(format!(
                    "failed to read session key at {}: {err}",
                    settings.session_key_file
                )))
            }
        }
    }
}

/// Apply pending migrations on a blocking connection before serving traffic.
async fn run_migrations(database_url: String) -> std::io::Result<()> {
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let mut conn =
            diesel::PgConnection::establish(&database_url).map_err(std::io::Error::other)?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|err| std::io::Error::other(err.to_string()))?;
        Ok(())
    })
    .await
    .map_err(std::io::Error::other)?
}

async fn build_state(settings: &Settings) -> std::io::Result<HttpState> {
    let pool = DbPool::new(PoolConfig::new(&settings.database_url))
        .await
        .map_err(std::io::Error::other)?;
    let store = Arc::new(DieselBalanceStore::new(pool));
    let ledger = Arc::new(LedgerService::new(store));
    let mut state = HttpState::new(ledger);

    if let Some(card) = &settings.card {
        let client = CardCheckoutClient::new(card.secret_key.clone(), card.api_base.clone())
            .map_err(std::io::Error::other)?;
        state = state.with_checkout(Arc::new(client));
    } else {
        warn!("card checkout disabled: CHECKOUT_SECRET_KEY unset");
    }

    if let Some(secret) = &settings.card_webhook_secret {
        state = state.with_webhook_verifier(Arc::new(CardWebhookVerifier::new(secret.as_bytes())));
    } else {
        warn!("card webhook disabled: CHECKOUT_WEBHOOK_SECRET unset");
    }

    if let Some(gateway) = &settings.gateway {
        let client = GatewayClient::new(
            gateway.key_id.clone(),
            gateway.key_secret.clone(),
            gateway.api_base.clone(),
        )
        .map_err(std::io::Error::other)?;
        state = state.with_gateway(GatewayPorts {
            orders: Arc::new(client),
            signature: Arc::new(GatewaySignature::new(gateway.key_secret.as_bytes())),
            public_key_id: gateway.key_id.clone(),
        });
    } else {
        warn!("gateway payments disabled: GATEWAY_KEY_ID/GATEWAY_KEY_SECRET unset");
    }

    Ok(state)
}

/// Application bootstrap.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(err) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %err, "tracing init failed");
    }

    let settings = Settings::from_env().map_err(std::io::Error::other)?;
    let key = load_session_key(&settings)?;
    run_migrations(settings.database_url.clone()).await?;
    let state = web::Data::new(build_state(&settings).await?);

    let health_state = web::Data::new(HealthState::new());
    let server_health = health_state.clone();
    let cookie_secure = settings.cookie_secure;

    let server = HttpServer::new(move || {
        let session = SessionMiddleware::builder(CookieSessionStore::default(), key.clone())
            .cookie_name("session".to_owned())
            .cookie_path("/".to_owned())
            .cookie_secure(cookie_secure)
            .cookie_http_only(true)
            .cookie_same_site(SameSite::Lax)
            .build();

        let api = web::scope("/api/v1").wrap(session).configure(configure_api);

        let app = App::new()
            .app_data(state.clone())
            .app_data(server_health.clone())
            .service(api)
            .service(ready)
            .service(live);

        #[cfg(debug_assertions)]
        let app = app.service(
            SwaggerUi::new("/docs/{_:.*}").url("/api-docs/openapi.json", backend::ApiDoc::openapi()),
        );

        #[cfg(feature = "metrics")]
        let app = app.wrap(make_metrics());

        app
    })
    .bind(settings.bind_addr.clone())?;

    health_state.mark_ready();
    server.run().await
}

#[cfg(feature = "metrics")]
#[expect(clippy::expect_used, reason = "static metrics configuration")]
fn make_metrics() -> actix_web_prom::PrometheusMetrics {
    PrometheusMetricsBuilder::new("coin_ledger")
        .endpoint("/metrics")
        .build()
        .expect("configure Prometheus metrics")
}
