mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, extract::DefaultBodyLimit};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use calcchat_api::state::AppStateInner;
use calcchat_gateway::{Dispatcher, Hub, socket, typing};
use calcchat_push::fcm::{FcmSender, ServiceAccount};
use calcchat_push::{NoopSender, Notifier, PushSender};

use crate::config::Config;

const MAX_HTTP_BODY: usize = 50 * 1024 * 1024;
const TYPING_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    "calcchat=debug,calcchat_api=debug,calcchat_gateway=debug,calcchat_db=info,calcchat_push=info,tower_http=debug".into()
                }),
        )
        .init();

    let config = Config::from_env()?;

    let db = Arc::new(calcchat_db::Database::open(&config.db_path)?);

    let push_sender: Arc<dyn PushSender> = match &config.fcm_credentials {
        Some(path) => Arc::new(FcmSender::new(ServiceAccount::from_file(path)?)?),
        None => {
            warn!("CALCCHAT_FCM_CREDENTIALS not set, push notifications disabled");
            Arc::new(NoopSender)
        }
    };

    let dispatcher = Dispatcher::new(config.typing_ttl);
    let notifier = Notifier::new(db.clone(), push_sender, config.participants.clone());
    let hub = Hub::new(db, dispatcher.clone(), config.participants.clone(), notifier);

    tokio::spawn(typing::run_typing_sweeper(dispatcher, TYPING_SWEEP_INTERVAL));

    let api_routes = calcchat_api::router(Arc::new(AppStateInner {
        hub: hub.clone(),
        history_limit: config.history_limit,
    }));

    let app = Router::new()
        .merge(api_routes)
        .merge(socket::router(hub))
        .layer(DefaultBodyLimit::max(MAX_HTTP_BODY))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("calcchat relay listening on {}", addr);
    for p in config.participants.iter() {
        info!("Participant {} ({})", p.id, p.name);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
