//! Catalog error type and its HTTP mapping.
//!
//! Every failure in the service funnels into [`CatalogError`]. Handlers return
//! it directly and actix-web renders it through [`ResponseError`] as a
//! `{"detail": ...}` JSON body with the matching status code.

use actix_web::http::header;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use log::error;
use serde::Serialize;

/// Error response body
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    pub detail: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Entity id is absent
    #[error("entity not found")]
    NotFound,
    /// Missing or malformed bearer token
    #[error("missing or malformed bearer token")]
    Unauthorized,
    /// Valid token without the required scope
    #[error("token lacks the required scope")]
    Forbidden,
    /// Malformed request input
    #[error("{0}")]
    Validation(String),
    /// Upload exceeds the configured limit
    #[error("upload exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },
    /// Token introspection could not be completed
    #[error("identity provider error: {0}")]
    IdentityProvider(String),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
    #[error("{0}")]
    Internal(String),
}

impl CatalogError {
    pub fn validation(message: impl Into<String>) -> Self {
        CatalogError::Validation(message.into())
    }

    fn detail(&self) -> String {
        match self {
            CatalogError::NotFound => "Not Found".to_string(),
            CatalogError::Unauthorized => "Not authenticated".to_string(),
            CatalogError::Forbidden => "Forbidden".to_string(),
            CatalogError::Validation(message) => message.clone(),
            CatalogError::PayloadTooLarge { .. } => "Payload Too Large".to_string(),
            CatalogError::IdentityProvider(_) => "Service Unavailable".to_string(),
            CatalogError::Database(_) | CatalogError::Storage(_) | CatalogError::Internal(_) => {
                "Internal Server Error".to_string()
            }
        }
    }
}

impl ResponseError for CatalogError {
    fn status_code(&self) -> StatusCode {
        match self {
            CatalogError::NotFound => StatusCode::NOT_FOUND,
            CatalogError::Unauthorized => StatusCode::UNAUTHORIZED,
            CatalogError::Forbidden => StatusCode::FORBIDDEN,
            CatalogError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CatalogError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            CatalogError::IdentityProvider(_) => StatusCode::SERVICE_UNAVAILABLE,
            CatalogError::Database(_) | CatalogError::Storage(_) | CatalogError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed with {}: {}", status, self);
        }

        let mut builder = HttpResponse::build(status);
        if let CatalogError::Unauthorized = self {
            builder.insert_header((header::WWW_AUTHENTICATE, "Bearer"));
        }
        builder.json(ErrorDetail {
            detail: self.detail(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn test_forbidden_body_is_fixed() {
        let resp = CatalogError::Forbidden.error_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({"detail": "Forbidden"}));
    }

    #[test]
    fn test_unauthorized_carries_bearer_challenge() {
        let resp = CatalogError::Unauthorized.error_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            resp.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(CatalogError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            CatalogError::validation("bad").status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            CatalogError::PayloadTooLarge { limit: 1 }.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            CatalogError::IdentityProvider("down".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            CatalogError::Internal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[actix_web::test]
    async fn test_internal_errors_do_not_leak_details() {
        let resp = CatalogError::Internal("secret path /var/db".into()).error_response();
        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["detail"], "Internal Server Error");
    }
}
