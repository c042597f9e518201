use axum::{
    Extension, Json, Router,
    extract::State,
    middleware::from_fn_with_state,
    response::{Html, Json as ResponseJson},
    routing::{get, post},
};
use db::models::contract::{Contract, CreateContract, SignContract, UpdateContract};
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use services::services::{
    contracts::ContractService,
    documents::{DocumentService, EmailDraft},
};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, middleware::load_contract_middleware};

/// Source records for a contract body generated without saving it
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct PreviewContract {
    pub project_id: i64,
    pub estimate_id: Option<i64>,
}

pub async fn preview_contract(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<PreviewContract>,
) -> Result<ResponseJson<ApiResponse<String>>, ApiError> {
    let config = deployment.config().read().await.clone();
    let body = ContractService::preview(deployment.db(), &config, payload.project_id, payload.estimate_id).await?;
    Ok(ResponseJson(ApiResponse::success(body)))
}

pub async fn get_contract(Extension(contract): Extension<Contract>) -> ResponseJson<ApiResponse<Contract>> {
    ResponseJson(ApiResponse::success(contract))
}

pub async fn create_contract(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<CreateContract>,
) -> Result<ResponseJson<ApiResponse<Contract>>, ApiError> {
    let config = deployment.config().read().await.clone();
    let contract = ContractService::create(deployment.db(), &config, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(contract)))
}

pub async fn update_contract(
    Extension(contract): Extension<Contract>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<UpdateContract>,
) -> Result<ResponseJson<ApiResponse<Contract>>, ApiError> {
    let contract = ContractService::update(deployment.db(), &contract, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(contract)))
}

pub async fn delete_contract(
    Extension(contract): Extension<Contract>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    ContractService::delete(deployment.db(), &contract).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// POST /api/contracts/{contract_id}/sign
/// Capture the owner's signature from the signature pad
pub async fn sign_contract(
    Extension(contract): Extension<Contract>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<SignContract>,
) -> Result<ResponseJson<ApiResponse<Contract>>, ApiError> {
    let contract = ContractService::sign(deployment.db(), &contract, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(contract)))
}

pub async fn get_contract_document(
    Extension(contract): Extension<Contract>,
    State(deployment): State<DeploymentImpl>,
) -> Result<Html<String>, ApiError> {
    let config = deployment.config().read().await.clone();
    let html = DocumentService::contract_html(deployment.db(), &config, &contract).await?;
    Ok(Html(html))
}

pub async fn get_contract_email(
    Extension(contract): Extension<Contract>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<EmailDraft>>, ApiError> {
    let config = deployment.config().read().await.clone();
    let draft = DocumentService::contract_email(deployment.db(), &config, &contract).await?;
    Ok(ResponseJson(ApiResponse::success(draft)))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let contract_id_router = Router::new()
        .route("/", get(get_contract).put(update_contract).delete(delete_contract))
        .route("/sign", post(sign_contract))
        .route("/document", get(get_contract_document))
        .route("/email", get(get_contract_email))
        .layer(from_fn_with_state(deployment.clone(), load_contract_middleware));

    let contracts_router = Router::new()
        .route("/", post(create_contract))
        .route("/preview", post(preview_contract))
        .nest("/{contract_id}", contract_id_router);

    Router::new().nest("/contracts", contracts_router)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::routes::test_support::{TestApp, data};

    const SIGNATURE: &str = "data:image/png;base64,iVBORw0KGgo=";

    #[tokio::test]
    async fn contract_is_generated_signed_and_frozen() {
        let app = TestApp::new().await;
        let project_id = app.seed_project("Sunroom").await;

        let (status, body) = app.post("/api/contracts/preview", json!({ "project_id": project_id })).await;
        assert_eq!(status, StatusCode::OK);
        assert!(data(&body).as_str().unwrap().contains("Ada Quinn"));

        let (status, body) = app.post("/api/contracts", json!({ "project_id": project_id })).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(data(&body)["title"], "Construction Agreement: Sunroom");
        assert!(data(&body)["body"].as_str().unwrap().contains("$20,000.00"));
        let id = data(&body)["id"].as_i64().unwrap();

        let (status, _) = app
            .post(
                &format!("/api/contracts/{id}/sign"),
                json!({ "signer_name": "Ada Quinn", "signature": "data:image/jpeg;base64,AAAA" }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = app
            .post(
                &format!("/api/contracts/{id}/sign"),
                json!({ "signer_name": "Ada Quinn", "signature": SIGNATURE }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(data(&body)["status"], "signed");
        assert!(data(&body)["signed_at"].is_string());

        let (status, _) = app.put(&format!("/api/contracts/{id}"), json!({ "title": "Changed" })).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let (status, _) = app.delete(&format!("/api/contracts/{id}")).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let (status, _) = app.delete(&format!("/api/projects/{project_id}")).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, html) = app.get_text(&format!("/api/contracts/{id}/document")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("signed"));
    }
}
