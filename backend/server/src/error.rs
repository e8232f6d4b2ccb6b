use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use sheets::LedgerError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Login required")]
    LoginRequired,

    #[error("Unauthorized")]
    Forbidden,

    #[error("Invalid Credentials")]
    InvalidCredentials,

    #[error("{0}")]
    MissingParameter(&'static str),

    #[error("Session error: {0}")]
    Session(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::LoginRequired | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::MissingParameter(_) => StatusCode::BAD_REQUEST,
            AppError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Ledger(e) => match e {
                LedgerError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                LedgerError::RecordNotFound(_) => StatusCode::NOT_FOUND,
                LedgerError::ColumnNotFound(_) | LedgerError::EmptyLedger(_) => StatusCode::BAD_REQUEST,
                LedgerError::StoreNotFound(_)
                | LedgerError::StoreRejected(_)
                | LedgerError::PartialBatchFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

/// Read endpoints answer `{"error": ...}`.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Write endpoints answer `{"success": false, "message": ...}`.
#[derive(Debug)]
pub struct ActionError(pub AppError);

impl From<AppError> for ActionError {
    fn from(e: AppError) -> Self {
        ActionError(e)
    }
}

impl From<LedgerError> for ActionError {
    fn from(e: LedgerError) -> Self {
        ActionError(AppError::Ledger(e))
    }
}

impl IntoResponse for ActionError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        let mut body = json!({ "success": false, "message": self.0.to_string() });

        if let AppError::Ledger(LedgerError::PartialBatchFailure {
            applied,
            total,
            failed_at,
            ..
        }) = &self.0
        {
            body["partial"] = json!(true);
            body["applied"] = json!(applied);
            body["total"] = json!(total);
            body["failed_at"] = json!(failed_at);
        }

        (status, Json(body)).into_response()
    }
}
