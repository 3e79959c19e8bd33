//! Web server module.

mod handlers;

pub use handlers::*;

use crate::config::ServerConfig;
use crate::db::Store;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub store: Arc<Store>,
}

/// HTTP API server for ventwatch.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(config: ServerConfig, store: Arc<Store>) -> Self {
        Self {
            state: AppState { config, store },
        }
    }

    /// Build the router with all routes.
    pub fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

        Router::new()
            .route("/healthz", get(handlers::handle_health))
            // Ward layout
            .route("/api/sectors", get(handlers::handle_get_sectors))
            .route("/api/sectors/{id}/beds", get(handlers::handle_get_sector_beds))
            .route("/api/sectors/{id}/patients", get(handlers::handle_get_sector_patients))
            // Patients
            .route(
                "/api/patients",
                get(handlers::handle_get_patients).post(handlers::handle_create_patient),
            )
            .route(
                "/api/patients/{id}",
                get(handlers::handle_get_patient)
                    .put(handlers::handle_update_patient)
                    .delete(handlers::handle_delete_patient),
            )
            // Stateless calculators
            .route("/api/calculate/hacor", post(handlers::handle_calculate_hacor))
            .route("/api/calculate/rox", post(handlers::handle_calculate_rox))
            .route("/api/calculate/vmi", post(handlers::handle_calculate_vmi))
            // Saved calculator scores
            .route(
                "/api/patients/{id}/scores",
                get(handlers::handle_get_scores).post(handlers::handle_create_score),
            )
            // Monitoring modules
            .route(
                "/api/patients/{id}/vmi",
                get(handlers::handle_get_vmi_records).post(handlers::handle_create_vmi_record),
            )
            .route("/api/patients/{id}/vmi/quality", get(handlers::handle_get_vmi_quality))
            .route("/api/vmi/{id}", get(handlers::handle_get_vmi_record))
            .route(
                "/api/patients/{id}/niv",
                get(handlers::handle_get_niv_records).post(handlers::handle_create_niv_record),
            )
            .route("/api/niv/{id}", get(handlers::handle_get_niv_record))
            .route(
                "/api/patients/{id}/hfnc",
                get(handlers::handle_get_hfnc_records).post(handlers::handle_create_hfnc_record),
            )
            .route("/api/hfnc/{id}", get(handlers::handle_get_hfnc_record))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB
            .with_state(self.state.clone())
    }

    /// Start the server on the configured port.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.http_port));
        let router = self.routes();

        tracing::info!("API server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
