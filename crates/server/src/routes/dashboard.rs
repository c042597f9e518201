use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use db::models::dashboard::DashboardStats;
use deployment::Deployment;
use services::services::dashboard;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

pub async fn get_dashboard(
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<DashboardStats>>, ApiError> {
    let stats = dashboard::load(deployment.db()).await?;
    Ok(ResponseJson(ApiResponse::success(stats)))
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new().route("/dashboard", get(get_dashboard))
}
