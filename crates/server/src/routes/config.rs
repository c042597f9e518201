use axum::{
    Json, Router,
    extract::State,
    response::Json as ResponseJson,
    routing::get,
};
use deployment::Deployment;
use services::services::config::Config;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

pub fn router() -> Router<DeploymentImpl> {
    Router::new().route("/config", get(get_config).put(update_config))
}

async fn get_config(State(deployment): State<DeploymentImpl>) -> ResponseJson<ApiResponse<Config>> {
    let config = deployment.config().read().await.clone();
    ResponseJson(ApiResponse::success(config))
}

async fn update_config(
    State(deployment): State<DeploymentImpl>,
    Json(new_config): Json<Config>,
) -> Result<ResponseJson<ApiResponse<Config>>, ApiError> {
    let config = deployment.update_config(new_config).await?;
    Ok(ResponseJson(ApiResponse::success(config)))
}
