//! Error handling for the application

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::pricing::responses::PricingErrorResponse;
use crate::pricing::PricingError;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Pricing(e) => match e {
                PricingError::BookingNotFound(_)
                | PricingError::OccurrenceNotFound { .. }
                | PricingError::SummaryNotFound(_) => StatusCode::NOT_FOUND,
                PricingError::BookingLocked { .. } => StatusCode::CONFLICT,
                PricingError::EditNotAllowed { .. } => StatusCode::FORBIDDEN,
                PricingError::Calculation(_) | PricingError::RateSheet(_) | PricingError::Validation(_) => {
                    StatusCode::BAD_REQUEST
                }
                PricingError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            AppError::Pricing(PricingError::Store(e)) => {
                tracing::error!("Store error: {}", e);
                PricingErrorResponse {
                    error_type: "store_error".to_string(),
                    message: "Database error".to_string(),
                    details: None,
                }
            }
            AppError::Pricing(PricingError::RateSheet(e)) => PricingErrorResponse {
                error_type: "invalid_rate_sheet".to_string(),
                message: "Rate sheet rejected".to_string(),
                details: Some(serde_json::json!({ "errors": e.errors })),
            },
            AppError::Pricing(e) => PricingErrorResponse {
                error_type: e.error_type().to_string(),
                message: e.to_string(),
                details: None,
            },
            AppError::BadRequest(msg) => PricingErrorResponse {
                error_type: "validation_error".to_string(),
                message: msg.clone(),
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
