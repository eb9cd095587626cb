//! Door Controller
//!
//! Answers the buzzer line on a dial-up modem for visitors holding a pending
//! authorization.
//!
//! # Startup
//!
//! 1. Load configuration (a bad dial sequence stops here, before the device
//!    is touched)
//! 2. Initialize Prometheus metrics recorder
//! 3. Connect to PostgreSQL and apply migrations
//! 4. Subscribe to the change feed, then seed the cache
//! 5. Start the expiry sweeper
//! 6. Open the serial device, initialize the modem, start the line reader
//! 7. Start the health HTTP server (liveness, readiness, metrics)
//! 8. Run the dispatch loop until the device closes, a fatal error, or
//!    SIGINT/SIGTERM
//!
//! Exit status is success for a graceful stop and failure otherwise.

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use common::secret::ExposeSecret;
use door_controller::admission::{AdmissionConfig, AdmissionController};
use door_controller::cache::AuthorizationCache;
use door_controller::change_feed::ChangeFeedHandler;
use door_controller::config::Config;
use door_controller::modem::{open_serial, spawn_line_reader, ModemLine};
use door_controller::notify::{Notifier, TwilioDispatcher};
use door_controller::observability::metrics::init_metrics_recorder;
use door_controller::observability::{health_router, DoorMetrics, HealthState};
use door_controller::service::{DoorService, ServiceChannels};
use door_controller::signal::AsyncSignal;
use door_controller::store::{spawn_expiry_sweeper, AuthorizationStore, PgAuthorizationStore};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Capacity of the modem event channel.
const MODEM_EVENT_CAPACITY: usize = 16;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "door_controller=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Door Controller");

    match run().await {
        Ok(()) => {
            info!("Door Controller stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Door Controller failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        location_id = %config.location_id,
        dial_sequence = %config.dial_sequence,
        tty_path = %config.tty_path,
        baud_rate = config.baud_rate,
        health_bind_address = %config.health_bind_address,
        authorization_ttl_seconds = config.authorization_ttl.as_secs(),
        "Configuration loaded successfully"
    );

    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;

    let health_state = Arc::new(HealthState::new());
    let metrics = DoorMetrics::new();
    let cancel_token = CancellationToken::new();

    // Store
    let store = PgAuthorizationStore::connect(
        config.database_url.expose_secret(),
        config.db_max_connections,
        config.authorization_ttl,
    )
    .await?;
    store.migrate().await?;

    // Subscribe before seeding so nothing inserted in between is lost.
    let change_feed = store.watch().await?;
    let cache = Arc::new(AuthorizationCache::new(Arc::clone(&metrics)));
    cache.seed(store.find_pending(&config.location_id).await?);
    info!(cached = cache.len(), "Pending authorizations loaded");

    let sweeper = spawn_expiry_sweeper(
        store.pool().clone(),
        config.authorization_ttl,
        config.expiry_sweep_interval,
        cancel_token.child_token(),
    );

    // Notifications
    let dispatcher = TwilioDispatcher::new(
        &config.twilio_api_url,
        config.twilio_account_sid.clone(),
        config.twilio_auth_token.clone(),
    )?;
    let notifier = Notifier::new(Arc::new(dispatcher), config.twilio_phone.clone());

    // Modem
    let device = open_serial(&config.tty_path, config.baud_rate)?;
    let (device_reader, device_writer) = tokio::io::split(device);
    let acknowledged = Arc::new(AsyncSignal::new());
    let (modem_tx, modem_rx) = mpsc::channel(MODEM_EVENT_CAPACITY);
    let reader = spawn_line_reader(
        device_reader,
        Arc::clone(&acknowledged),
        modem_tx,
        cancel_token.child_token(),
    );
    let mut modem = ModemLine::new(device_writer, acknowledged);
    modem.initialize().await?;

    let (fault_tx, fault_rx) = mpsc::channel(1);
    let store: Arc<dyn AuthorizationStore> = Arc::new(store);
    let controller = AdmissionController::new(
        AdmissionConfig {
            location_id: config.location_id.clone(),
            dial_sequence: config.dial_sequence.clone(),
        },
        store,
        notifier.clone(),
        Arc::clone(&cache),
        modem,
        Arc::clone(&metrics),
        fault_tx,
    );
    let feed_handler = ChangeFeedHandler::new(cache, notifier, Arc::clone(&metrics));

    // Health server (MUST succeed - fail startup if it doesn't)
    let health_addr: SocketAddr = config.health_bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.health_bind_address, "Invalid health bind address");
        format!("Invalid health bind address: {e}")
    })?;

    let metrics_router = Router::new().route(
        "/metrics",
        get(move || {
            let handle = prometheus_handle.clone();
            async move { handle.render() }
        }),
    );
    let app = health_router(Arc::clone(&health_state)).merge(metrics_router);

    let listener = tokio::net::TcpListener::bind(health_addr)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %health_addr, "Failed to bind health server");
            format!("Failed to bind health server to {health_addr}: {e}")
        })?;

    let health_cancel = cancel_token.child_token();
    let health_server = tokio::spawn(async move {
        info!(addr = %health_addr, "Health server starting");
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            health_cancel.cancelled().await;
            info!("Health server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "Health server failed");
        }
    });

    // Shutdown on SIGINT/SIGTERM
    let signal_token = cancel_token.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        signal_token.cancel();
    });

    let service = DoorService::new(
        controller,
        feed_handler,
        ServiceChannels {
            modem_events: modem_rx,
            change_feed,
            faults: fault_rx,
        },
        health_state,
        cancel_token.clone(),
    );
    let result = service.run().await;

    // Stop background tasks
    cancel_token.cancel();
    let _ = tokio::join!(sweeper, reader, health_server);

    result.map_err(Into::into)
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
