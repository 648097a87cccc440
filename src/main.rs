//! Showtime HTTP server.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use showtime::adapters::auth::JwtSessionValidator;
use showtime::adapters::http::reservation::ReservationAppState;
use showtime::adapters::http::router::app_router;
use showtime::adapters::postgres::{
    PostgresAuthTokenStore, PostgresCatalogReader, PostgresCheckoutSessionRepository,
    PostgresTicketReader, PostgresTicketRepository,
};
use showtime::adapters::stripe::{StripeConfig, StripeGatewayAdapter};
use showtime::adapters::workers::{
    LockExpiryReconciler, SessionExpiryReconciler, TokenExpiryReconciler, WorkerSupervisor,
};
use showtime::application::CheckoutSettings;
use showtime::config::{AppConfig, ServerConfig};
use showtime::ports::{Clock, SystemClock};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    info!(
        environment = ?config.server.environment,
        live_payments = config.payment.is_live_mode(),
        "Configuration loaded"
    );

    let db = &config.database;
    let pool = PgPoolOptions::new()
        .min_connections(db.min_connections)
        .max_connections(db.max_connections)
        .acquire_timeout(db.acquire_timeout())
        .idle_timeout(db.idle_timeout())
        .max_lifetime(db.max_lifetime())
        .connect(&db.url)
        .await?;
    info!(max_connections = db.max_connections, "Database pool ready");

    if db.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Migrations applied");
    }

    let op_timeout = db.operation_timeout();
    let tickets = Arc::new(PostgresTicketRepository::new(pool.clone(), op_timeout));
    let reader = Arc::new(PostgresTicketReader::new(pool.clone(), op_timeout));
    let sessions = Arc::new(PostgresCheckoutSessionRepository::new(pool.clone(), op_timeout));
    let catalog = Arc::new(PostgresCatalogReader::new(pool.clone(), op_timeout));
    let auth_tokens = Arc::new(PostgresAuthTokenStore::new(pool.clone(), op_timeout));
    let gateway = Arc::new(StripeGatewayAdapter::new(StripeConfig::from_payment_config(
        &config.payment,
    ))?);
    let validator = Arc::new(JwtSessionValidator::new(&config.auth));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let reservation = &config.reservation;
    let mut supervisor = WorkerSupervisor::new();
    supervisor.spawn(
        Arc::new(LockExpiryReconciler::new(
            tickets.clone(),
            clock.clone(),
            reservation.lock_batch_size,
        )),
        reservation.lock_expiry_interval(),
    );
    supervisor.spawn(
        Arc::new(SessionExpiryReconciler::new(
            sessions.clone(),
            gateway.clone(),
            clock.clone(),
            reservation.session_window(),
            reservation.async_payment_grace(),
            reservation.session_batch_size,
        )),
        reservation.session_expiry_interval(),
    );
    supervisor.spawn(
        Arc::new(TokenExpiryReconciler::new(auth_tokens, clock.clone())),
        reservation.token_expiry_interval(),
    );
    info!(workers = supervisor.len(), "Background reconcilers started");

    let state = ReservationAppState {
        tickets,
        reader,
        sessions,
        catalog,
        gateway,
        clock,
        checkout: CheckoutSettings::from_config(&config.payment, reservation),
        lock_window: reservation.lock_window(),
    };
    let app = app_router(state, validator, &config.server);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "Server listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    info!("HTTP server stopped; waiting for reconcilers");
    for exit in supervisor.shutdown().await {
        if let Err(e) = exit.result {
            error!(worker = exit.name, error = %e, "Reconciler did not exit cleanly");
        }
    }
    pool.close().await;

    served?;
    info!("Shutdown complete");
    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(server.log_level.clone()));

    let registry = tracing_subscriber::registry().with(filter);
    if server.json_logs() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
