use axum::http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method};
use axum_login::{
    tower_sessions::{Expiry, SessionManagerLayer},
    AuthManagerLayerBuilder,
};
use domain::user::Backend;
use log::*;
use service::config::RustEnv;
use time::Duration;
use tower_http::cors::CorsLayer;
use tower_sessions_sqlx_store::PostgresStore;

pub use self::error::{Error, Result};
pub use service::AppState;

pub(crate) mod controller;
pub(crate) mod error;
pub(crate) mod extractors;
pub(crate) mod middleware;
pub(crate) mod params;
pub(crate) mod router;
pub(crate) mod sse;

pub async fn init_server(app_state: AppState) -> std::result::Result<(), std::io::Error> {
    // Sessions are stored alongside the application data so that a server
    // restart does not log every client out.
    let pool = app_state.db_conn_ref().get_postgres_connection_pool().clone();
    let session_store = PostgresStore::new(pool);
    session_store.migrate().await.map_err(std::io::Error::other)?;

    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(app_state.config.runtime_env == RustEnv::Production)
        .with_expiry(Expiry::OnInactivity(Duration::seconds(
            app_state.config.backend_session_expiry_seconds as i64,
        )));

    let backend = Backend::new(&app_state.database_connection);
    let auth_layer = AuthManagerLayerBuilder::new(backend, session_layer).build();

    let allowed_origins = app_state
        .config
        .allowed_origins
        .iter()
        .filter_map(|origin| {
            origin
                .parse::<HeaderValue>()
                .map_err(|e| warn!("Skipping invalid CORS origin {origin}: {e}"))
                .ok()
        })
        .collect::<Vec<HeaderValue>>();

    debug!("allowed_origins: {allowed_origins:?}");

    let cors_layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_credentials(true)
        .allow_headers([CONTENT_TYPE, HeaderName::from_static("x-version")])
        .allow_origin(allowed_origins);

    let listen_address = format!(
        "{}:{}",
        app_state.config.interface.as_deref().unwrap_or("127.0.0.1"),
        app_state.config.port
    );

    info!("Server starting... listening for connections on http://{listen_address}");

    let listener = tokio::net::TcpListener::bind(listen_address).await?;

    let router = router::define_routes(app_state)
        .layer(auth_layer)
        .layer(cors_layer);

    axum::serve(listener, router).await
}
