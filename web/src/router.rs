use crate::{
    controller::health_check_controller, middleware::auth::require_auth, params, AppState,
};
use axum::{
    middleware::from_fn,
    routing::{delete, get, post},
    Router,
};
use tower_http::services::ServeDir;

use crate::controller::{message_controller, user_session_controller};

use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_rapidoc::RapiDoc;

// This is the global definition of our OpenAPI spec. To be a part
// of the rendered spec, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "Relay Chat API"
        ),
        paths(
            health_check_controller::health_check,
            message_controller::index,
            message_controller::create,
            user_session_controller::login,
            user_session_controller::delete,
        ),
        components(
            schemas(
                domain::message::ChatMessage,
                domain::user::Credentials,
                params::message::CreateParams,
            )
        ),
        modifiers(&SecurityAddon),
        tags(
            (name = "relay_chat", description = "Relay real-time chat API")
        )
    )]
struct ApiDoc;

struct SecurityAddon;

// Defines our cookie session based authentication requirement for gaining access to our
// API endpoints for OpenAPI.
impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "cookie_auth",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "id",
                    "Session id value returned from successful login via Set-Cookie header",
                ))),
            )
        }
    }
}

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(message_routes(app_state.clone()))
        .merge(event_stream_routes(app_state.clone()))
        .merge(user_session_routes())
        .merge(user_session_protected_routes(app_state))
        .merge(RapiDoc::with_openapi("/api-docs/openapi2.json", ApiDoc::openapi()).path("/rapidoc"))
        .fallback_service(static_routes())
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn message_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/messages", get(message_controller::index))
        .route("/messages", post(message_controller::create))
        .route_layer(from_fn(require_auth))
        .with_state(app_state)
}

fn event_stream_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/events", get(crate::sse::handler::event_stream))
        .route_layer(from_fn(require_auth))
        .with_state(app_state)
}

pub fn user_session_routes() -> Router {
    Router::new().route("/login", post(user_session_controller::login))
}

pub fn user_session_protected_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/logout", delete(user_session_controller::delete))
        .route_layer(from_fn(require_auth))
        .with_state(app_state)
}

// This will serve static files that we can use as a "fallback" for when the server panics
pub fn static_routes() -> Router {
    Router::new().nest_service("/", ServeDir::new("./"))
}
