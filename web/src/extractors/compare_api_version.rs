use crate::extractors::RejectionType;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use log::*;
use semver::Version;
use service::config::is_valid_api_version;

/// Name of the custom HTTP header that clients pass their expected API
/// version in with every request.
pub(crate) const API_VERSION_HEADER: &str = "x-version";

/// Rejects any request whose `x-version` header is missing, unparseable, or
/// names an API version this build does not expose.
pub(crate) struct CompareApiVersion(pub Version);

#[async_trait]
impl<S> FromRequestParts<S> for CompareApiVersion
where
    S: Send + Sync,
{
    type Rejection = RejectionType;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(API_VERSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                warn!("Request is missing the {API_VERSION_HEADER} header");
                (
                    StatusCode::BAD_REQUEST,
                    format!("Missing request header: {API_VERSION_HEADER}"),
                )
            })?;

        let version = Version::parse(header_value).map_err(|e| {
            warn!("Failed to parse {API_VERSION_HEADER} value '{header_value}': {e}");
            (
                StatusCode::BAD_REQUEST,
                format!("Invalid semantic version in {API_VERSION_HEADER} header"),
            )
        })?;

        if !is_valid_api_version(header_value) {
            warn!("Unsupported API version requested: {header_value}");
            return Err((
                StatusCode::BAD_REQUEST,
                format!("Unsupported API version: {header_value}"),
            ));
        }

        trace!("Request API version: {version}");

        Ok(CompareApiVersion(version))
    }
}
