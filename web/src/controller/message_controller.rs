use crate::controller::ApiResponse;
use crate::extractors::{
    authenticated_user::AuthenticatedUser, compare_api_version::CompareApiVersion,
};
use crate::params::message::CreateParams;
use crate::{AppState, Error};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use domain::message as MessageApi;
use service::config::ApiVersion;

use log::*;

/// GET the full message history, oldest first.
#[utoipa::path(
    get,
    path = "/messages",
    params(ApiVersion),
    responses(
        (status = 200, description = "Successfully retrieved all chat messages", body = [domain::message::ChatMessage]),
        (status = 401, description = "Unauthorized"),
        (status = 405, description = "Method not allowed")
    ),
    security(
        ("cookie_auth" = [])
    )
)]
pub async fn index(
    CompareApiVersion(_v): CompareApiVersion,
    AuthenticatedUser(_user): AuthenticatedUser,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, Error> {
    debug!("GET all chat messages");

    let messages = MessageApi::list(app_state.db_conn_ref()).await?;

    Ok(Json(ApiResponse::new(StatusCode::OK.into(), messages)))
}

/// POST create a new chat message authored by the logged-in user.
///
/// The durable insert fires the storage-side notification trigger, which is
/// what pushes the message out to every open event stream. Nothing is
/// published here directly.
#[utoipa::path(
    post,
    path = "/messages",
    params(ApiVersion),
    request_body = CreateParams,
    responses(
        (status = 201, description = "Successfully created a new chat message", body = domain::message::ChatMessage),
        (status = 401, description = "Unauthorized"),
        (status = 405, description = "Method not allowed"),
        (status = 422, description = "Unprocessable Entity")
    ),
    security(
        ("cookie_auth" = [])
    )
)]
pub async fn create(
    CompareApiVersion(_v): CompareApiVersion,
    AuthenticatedUser(user): AuthenticatedUser,
    State(app_state): State<AppState>,
    Json(params): Json<CreateParams>,
) -> Result<impl IntoResponse, Error> {
    debug!("POST create a new chat message from user {}", user.id);

    if params.content.is_empty() {
        return Err(domain::error::Error::invalid("message content must not be empty").into());
    }
    let max_length = app_state.config.max_message_length;
    if params.content.chars().count() > max_length {
        return Err(domain::error::Error::invalid(format!(
            "message content exceeds {max_length} characters"
        ))
        .into());
    }

    let message = MessageApi::create(app_state.db_conn_ref(), user.id, params.content).await?;

    debug!("New chat message: {message:?}");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(StatusCode::CREATED.into(), message)),
    ))
}
