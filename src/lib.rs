pub mod auth;
pub mod backend;
pub mod error;
pub mod handlers;
pub mod importer;
pub mod models;
pub mod occupancy;
pub mod openapi;
pub mod requests;
pub mod session;
pub mod settings;
pub mod validation;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use chrono::Duration;
use handlers::{
    create_import, create_room_request, discard_import, get_import, healthz_live, healthz_ready,
    list_classrooms, list_room_requests, root, submit_import, update_classroom_status,
};
use tower_http::LatencyUnit;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, info};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::backend::BackendClient;
use crate::openapi::ApiDoc;
use crate::session::ImportSessions;
use crate::settings::Settings;

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub backend: Arc<BackendClient>,
    pub sessions: Arc<ImportSessions>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let backend = BackendClient::new(
            settings.backend_url.clone(),
            settings.backend_api_key.as_str(),
        );
        let ttl = Duration::from_std(std::time::Duration::from_secs(
            settings.import_session_ttl_secs,
        ))
        .unwrap_or(Duration::MAX);
        Self {
            settings,
            backend: Arc::new(backend),
            sessions: Arc::new(ImportSessions::with_ttl(ttl)),
        }
    }
}

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;

    let env_filter = if settings.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .without_time()
        .init();

    let state = AppState::new(settings);
    let app = build_router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], state.settings.port));
    info!(backend = %state.settings.backend_url, "Starting Classroom Timetable API on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        );

    let mut router = Router::new()
        .route("/", get(root))
        .route("/healthz/live", get(healthz_live))
        .route("/healthz/ready", get(healthz_ready))
        .route("/classrooms", get(list_classrooms))
        .route("/classrooms/{id}/status", post(update_classroom_status))
        .route("/imports", post(create_import))
        .route("/imports/{id}", get(get_import).delete(discard_import))
        .route("/imports/{id}/submit", post(submit_import))
        .route(
            "/room-requests",
            get(list_room_requests).post(create_room_request),
        )
        .with_state(state.clone());

    if state.settings.enable_swagger {
        let openapi = ApiDoc::openapi();
        let swagger = SwaggerUi::new("/docs").url("/openapi.json", openapi);
        router = router.merge(swagger);
    }

    router.layer(CorsLayer::permissive()).layer(trace_layer)
}
