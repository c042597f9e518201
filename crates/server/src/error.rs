use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use deployment::DeploymentError;
use services::services::{
    billing::BillingError, config::ConfigError, contracts::ContractError, customer::CustomerError,
    documents::DocumentError, pay_terms::PayTermError, project::ProjectError,
};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Customer(#[from] CustomerError),
    #[error(transparent)]
    Project(#[from] ProjectError),
    #[error(transparent)]
    Billing(#[from] BillingError),
    #[error(transparent)]
    PayTerm(#[from] PayTermError),
    #[error(transparent)]
    Contract(#[from] ContractError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Deployment(#[from] DeploymentError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    NotFound(String),
}

fn billing_status(err: &BillingError) -> StatusCode {
    match err {
        BillingError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        BillingError::Validation(_) => StatusCode::BAD_REQUEST,
        BillingError::ProjectNotFound(_) => StatusCode::NOT_FOUND,
        BillingError::Conflict(_) => StatusCode::CONFLICT,
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Customer(err) => match err {
                CustomerError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
                CustomerError::Validation(_) => StatusCode::BAD_REQUEST,
                CustomerError::HasProjects(_) => StatusCode::CONFLICT,
            },
            ApiError::Project(err) => match err {
                ProjectError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
                ProjectError::Validation(_) => StatusCode::BAD_REQUEST,
                ProjectError::CustomerNotFound(_) => StatusCode::NOT_FOUND,
                ProjectError::HasFinancialHistory => StatusCode::CONFLICT,
            },
            ApiError::Billing(err) => billing_status(err),
            ApiError::PayTerm(err) => match err {
                PayTermError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
                PayTermError::Validation(_) => StatusCode::BAD_REQUEST,
                PayTermError::ProjectNotFound(_) => StatusCode::NOT_FOUND,
                PayTermError::Conflict(_) => StatusCode::CONFLICT,
                PayTermError::Billing(err) => billing_status(err),
            },
            ApiError::Contract(err) => match err {
                ContractError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
                ContractError::Validation(_) => StatusCode::BAD_REQUEST,
                ContractError::ProjectNotFound(_) => StatusCode::NOT_FOUND,
                ContractError::Conflict(_) => StatusCode::CONFLICT,
            },
            ApiError::Document(err) => match err {
                DocumentError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
                DocumentError::Billing(err) => billing_status(err),
            },
            ApiError::Deployment(DeploymentError::Config(ConfigError::Invalid(_))) => StatusCode::BAD_REQUEST,
            ApiError::Deployment(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Database(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        if status_code.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(status = %status_code, error = %self, "Request rejected");
        }

        let message = if status_code.is_server_error() {
            "An internal error occurred. Check the server logs for details.".to_string()
        } else {
            self.to_string()
        };
        let response = ApiResponse::<()>::error(&message);
        (status_code, Json(response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use services::services::validation::ValidationError;

    use super::*;

    #[test]
    fn maps_service_errors_to_status_codes() {
        let validation = ApiError::from(BillingError::Validation(ValidationError::invalid("title is required")));
        assert_eq!(validation.status_code(), StatusCode::BAD_REQUEST);

        let conflict = ApiError::from(PayTermError::Billing(BillingError::Conflict("already billed".into())));
        assert_eq!(conflict.status_code(), StatusCode::CONFLICT);

        assert_eq!(ApiError::from(CustomerError::HasProjects(2)).status_code(), StatusCode::CONFLICT);
        assert_eq!(ApiError::from(ProjectError::CustomerNotFound(9)).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(sqlx::Error::PoolTimedOut).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
