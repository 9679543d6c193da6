use std::io::Error as IoError;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use pingboard_service::ServiceError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0:#}")]
    Io(#[from] IoError),
    #[error("Address parsing error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),
    #[error("Config error: {0}")]
    Config(#[from] pingboard_service::config::Error),

    #[error("Unauthorized")]
    Unauthorized,
    #[error("{0}")]
    BadRequest(String),
    #[error("Endpoint not found")]
    NotFound,
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound | AppError::Service(ServiceError::NotFound) => StatusCode::NOT_FOUND,
            AppError::Service(ServiceError::Validation(_) | ServiceError::LimitReached(_)) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = if status.is_server_error() {
            error!("Request failed: {self}");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        HttpResponse::build(status).json(json!({ "error": message }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pingboard_service::validation::ValidationError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::Service(ServiceError::Validation(ValidationError::InvalidMethod)).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::Service(ServiceError::LimitReached(10)).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Service(ServiceError::NotFound).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Service(ServiceError::Store(anyhow::anyhow!("disk full"))).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
