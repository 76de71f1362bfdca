//! edubot-billing service binary.
//!
//! Wires configuration, the PostgreSQL pool, the webhook router and the
//! expiry sweeper together, then serves until SIGINT.

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use edubot_billing::adapters::http::{webhook_router, WebhookAppState};
use edubot_billing::adapters::postgres::{
    PostgresEventRecorder, PostgresIdempotencyLedger, PostgresNotificationOutbox,
    PostgresParentDirectory, PostgresPaymentRepository, PostgresSubscriptionRepository,
};
use edubot_billing::adapters::providers::{ClickAdapter, PaymeAdapter, StarsAdapter};
use edubot_billing::application::{ExpirySweeper, ReconcileWebhookHandler, SweeperConfig};
use edubot_billing::config::AppConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.clone())),
        )
        .init();

    tracing::info!(
        environment = ?config.server.environment,
        "Starting edubot-billing"
    );

    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .idle_timeout(config.database.idle_timeout())
        .connect(&config.database.url)
        .await?;

    if config.database.run_migrations {
        tracing::info!("Running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;
    }

    let subscriptions = Arc::new(PostgresSubscriptionRepository::new(pool.clone()));
    let payments = Arc::new(PostgresPaymentRepository::new(pool.clone()));
    let ledger = Arc::new(PostgresIdempotencyLedger::new(pool.clone()));
    let parents = Arc::new(PostgresParentDirectory::new(pool.clone()));
    let notifier = Arc::new(PostgresNotificationOutbox::new(pool.clone()));
    let recorder = Arc::new(PostgresEventRecorder::new(pool.clone()));

    let tariffs = config.billing.tariff_table()?;
    let reconciler = Arc::new(ReconcileWebhookHandler::new(
        subscriptions.clone(),
        payments.clone(),
        ledger.clone(),
        parents.clone(),
        notifier.clone(),
        recorder.clone(),
        tariffs,
        config.billing.reservation_ttl_secs,
    ));

    let sweeper = ExpirySweeper::new(
        subscriptions.clone(),
        ledger.clone(),
        notifier.clone(),
        recorder.clone(),
        SweeperConfig {
            interval: Duration::from_secs(config.billing.sweep_interval_secs),
            grace_window_days: config.billing.grace_window_days,
            ledger_retention_days: config.billing.ledger_retention_days,
        },
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper_handle = tokio::spawn(async move {
        sweeper.run(shutdown_rx).await;
    });

    let state = WebhookAppState {
        reconciler,
        stars: Arc::new(StarsAdapter::new(config.providers.stars.webhook_secret.clone())),
        payme: Arc::new(PaymeAdapter::new(config.providers.payme.secret_key.clone())),
        click: Arc::new(ClickAdapter::new(
            config.providers.click.service_id.clone(),
            config.providers.click.secret_key.clone(),
        )),
    };

    let app = webhook_router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )));

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Webhook server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    let _ = sweeper_handle.await;

    tracing::info!("edubot-billing stopped");
    Ok(())
}
