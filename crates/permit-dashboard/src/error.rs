//! Request errors and their HTTP mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use permit_processing::PermitError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    /// Loading or profiling the dataset failed.
    #[error(transparent)]
    Dataset(#[from] PermitError),

    #[error(transparent)]
    Polars(#[from] polars::error::PolarsError),

    /// The cleaned dataset was requested but the server was started without one.
    #[error("No cleaned dataset configured; start the dashboard with --cleaned <path>")]
    CleanedUnavailable,

    #[error("Column '{0}' not found in dataset")]
    UnknownColumn(String),

    /// A query parameter is out of range or does not fit the selected columns.
    #[error("Invalid parameter '{name}': {reason}")]
    BadParameter { name: &'static str, reason: String },

    /// The blocking render task panicked or was cancelled.
    #[error("Render task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, DashboardError>;

/// Body of every failed API response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

impl DashboardError {
    pub fn bad_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::BadParameter {
            name,
            reason: reason.into(),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Dataset(err) => err.error_code(),
            Self::Polars(_) => "POLARS_ERROR",
            Self::CleanedUnavailable => "CLEANED_UNAVAILABLE",
            Self::UnknownColumn(_) => "COLUMN_NOT_FOUND",
            Self::BadParameter { .. } => "BAD_PARAMETER",
            Self::Task(_) => "RENDER_FAILED",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Dataset(PermitError::FileNotFound(_)) | Self::CleanedUnavailable => {
                StatusCode::NOT_FOUND
            }
            Self::Dataset(PermitError::ColumnNotFound(_))
            | Self::UnknownColumn(_)
            | Self::BadParameter { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::warn!("{}", self);
        }
        let body = ErrorBody {
            code: self.error_code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_status_mapping() {
        let missing = DashboardError::from(PermitError::FileNotFound(PathBuf::from("x.csv")));
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(missing.error_code(), "FILE_NOT_FOUND");

        let column = DashboardError::UnknownColumn("Nope".into());
        assert_eq!(column.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let param = DashboardError::bad_parameter("top_k", "must be between 3 and 100");
        assert_eq!(param.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            param.to_string(),
            "Invalid parameter 'top_k': must be between 3 and 100"
        );

        let parse = DashboardError::from(PermitError::Parse {
            path: PathBuf::from("x.csv"),
            reason: "bad quote".into(),
        });
        assert_eq!(parse.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
