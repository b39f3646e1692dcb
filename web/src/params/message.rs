use serde::Deserialize;
use utoipa::ToSchema;

/// Body of a POST /messages request. Length and non-emptiness are validated
/// in the controller against the configured maximum.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateParams {
    pub content: String,
}
