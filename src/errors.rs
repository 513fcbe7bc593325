//! Gateway error types.
//!
//! Every variant maps to an S3-style error code and HTTP status. The enum
//! implements [`axum::response::IntoResponse`] so handlers can simply
//! return `Err(GateError::NoSuchKey { .. })`.
//!
//! Authentication problems always surface as 403-class responses, never as
//! internal errors; sync failures never appear here at all since the sync
//! cycle is decoupled from the request lifecycle.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::store::StoreError;
use crate::xml::render_error;

/// Generate a 16-character hex request ID.
pub fn generate_request_id() -> String {
    let bytes: [u8; 8] = rand::random();
    hex::encode(bytes).to_uppercase()
}

/// Errors surfaced on the HTTP boundary.
#[derive(Debug, Error)]
pub enum GateError {
    /// Authentication information is missing or malformed.
    #[error("Access Denied")]
    AccessDenied { message: String },

    /// The request signature does not match.
    #[error("The request signature we calculated does not match the signature you provided.")]
    SignatureDoesNotMatch,

    /// The access key ID is not the configured one.
    #[error("The AWS Access Key Id you provided does not exist in our records.")]
    InvalidAccessKeyId,

    /// The specified key does not exist.
    #[error("The resource you requested does not exist")]
    NoSuchKey { key: String },

    /// A request argument is invalid (including traversal attempts).
    #[error("{message}")]
    InvalidArgument { message: String },

    /// Request shape outside the supported surface.
    #[error("A header you provided implies functionality that is not implemented")]
    NotImplemented,

    /// Catch-all for unexpected internal errors.
    #[error("We encountered an internal error, please try again.")]
    InternalError(#[from] anyhow::Error),
}

impl GateError {
    /// Return the S3 XML error code string.
    pub fn code(&self) -> &'static str {
        match self {
            GateError::AccessDenied { .. } => "AccessDenied",
            GateError::SignatureDoesNotMatch => "SignatureDoesNotMatch",
            GateError::InvalidAccessKeyId => "InvalidAccessKeyId",
            GateError::NoSuchKey { .. } => "NoSuchKey",
            GateError::InvalidArgument { .. } => "InvalidArgument",
            GateError::NotImplemented => "NotImplemented",
            GateError::InternalError(_) => "InternalError",
        }
    }

    /// Return the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GateError::AccessDenied { .. } => StatusCode::FORBIDDEN,
            GateError::SignatureDoesNotMatch => StatusCode::FORBIDDEN,
            GateError::InvalidAccessKeyId => StatusCode::FORBIDDEN,
            GateError::NoSuchKey { .. } => StatusCode::NOT_FOUND,
            GateError::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
            GateError::NotImplemented => StatusCode::NOT_IMPLEMENTED,
            GateError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for GateError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(key) => GateError::NoSuchKey { key },
            StoreError::InvalidPath(path) => GateError::InvalidArgument {
                message: format!("Invalid object path: {path}"),
            },
            StoreError::Io(e) => GateError::InternalError(e.into()),
        }
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let request_id = generate_request_id();
        let status = self.status_code();
        let date = httpdate::fmt_http_date(std::time::SystemTime::now());

        let resource = match &self {
            GateError::NoSuchKey { key } => key.clone(),
            _ => String::new(),
        };
        let body = render_error(self.code(), &self.to_string(), &resource, &request_id);

        (
            status,
            [
                ("content-type", "application/xml".to_string()),
                ("x-amz-request-id", request_id),
                ("date", date),
                ("server", "DataGate".to_string()),
            ],
            body,
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_shape() {
        let id = generate_request_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn auth_errors_are_forbidden() {
        assert_eq!(
            GateError::SignatureDoesNotMatch.status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            GateError::InvalidAccessKeyId.status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            GateError::AccessDenied {
                message: "no".into()
            }
            .status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn store_errors_map_to_client_statuses() {
        let not_found: GateError = StoreError::NotFound("b/k".into()).into();
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);

        let traversal: GateError = StoreError::InvalidPath("../x".into()).into();
        assert_eq!(traversal.status_code(), StatusCode::BAD_REQUEST);
    }
}
