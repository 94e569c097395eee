use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::{get, post, put},
};
use log::{error, info};
use tokio::net::TcpListener;

use crate::archive::{ArchiveEngine, TarGzCodec};
use crate::config::GatewayConfig;
use crate::error::StartupError;
use crate::middleware::log_request;
use crate::protocol::handlers;
use crate::server::state::AppState;

pub struct Server {
    listener: TcpListener,
    app: Router,
}

impl Server {
    pub async fn new(config: GatewayConfig) -> Result<Self, StartupError> {
        let root = config.prepare_root()?;
        info!("Allowed root: {}", root.display());

        let engine = ArchiveEngine::new(Box::new(TarGzCodec::with_level(config.compression_level)));
        let state = AppState::new(&root, engine);
        let app = build_router(state, config.max_body_bytes);

        let addr = config.listen_socket();
        let listener = match TcpListener::bind(&addr).await {
            Ok(listener) => {
                info!("Server bound to {}", addr);
                listener
            }
            Err(e) => {
                error!("Failed to bind to {}: {}", addr, e);
                return Err(StartupError::Bind { addr, source: e });
            }
        };

        Ok(Self { listener, app })
    }

    pub async fn start(self) -> Result<(), StartupError> {
        let addr = self.listener.local_addr()?;
        info!("Starting RAX file gateway on {}", addr);

        axum::serve(self.listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Server stopped");
        Ok(())
    }
}

/// Builds the router with every file route under `/files`
pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    let files = Router::new()
        .route("/contents", get(handlers::get_file_contents))
        .route("/list-directory", get(handlers::list_directory))
        .route("/rename", put(handlers::rename_file))
        .route("/copy", post(handlers::copy_file))
        .route("/write", post(handlers::write_file))
        .route("/delete", post(handlers::delete_file))
        .route("/compress", post(handlers::compress_files))
        .route("/decompress", post(handlers::decompress_file))
        .route("/chmod", post(handlers::chmod_file));

    Router::new()
        .route("/ping", get(handlers::ping))
        .nest("/files", files)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(from_fn(log_request))
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
