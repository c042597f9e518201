use axum::{
    Extension, Json, Router,
    extract::State,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::pay_term::{CreatePayTerm, PayTerm, UpdatePayTerm};
use deployment::Deployment;
use services::services::{billing::InvoiceDetails, pay_terms::PayTermService};
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, middleware::load_pay_term_middleware};

pub async fn get_pay_term(Extension(term): Extension<PayTerm>) -> ResponseJson<ApiResponse<PayTerm>> {
    ResponseJson(ApiResponse::success(term))
}

pub async fn create_pay_term(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<CreatePayTerm>,
) -> Result<ResponseJson<ApiResponse<PayTerm>>, ApiError> {
    let term = PayTermService::create(deployment.db(), &payload).await?;
    Ok(ResponseJson(ApiResponse::success(term)))
}

pub async fn update_pay_term(
    Extension(term): Extension<PayTerm>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<UpdatePayTerm>,
) -> Result<ResponseJson<ApiResponse<PayTerm>>, ApiError> {
    let term = PayTermService::update(deployment.db(), &term, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(term)))
}

pub async fn delete_pay_term(
    Extension(term): Extension<PayTerm>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    PayTermService::delete(deployment.db(), &term).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// POST /api/pay-terms/{pay_term_id}/invoice
/// Bill the term on its own invoice
pub async fn invoice_pay_term(
    Extension(term): Extension<PayTerm>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<InvoiceDetails>>, ApiError> {
    let config = deployment.config().read().await.clone();
    let invoice = PayTermService::convert_to_invoice(deployment.db(), &config, &term).await?;
    Ok(ResponseJson(ApiResponse::success(invoice)))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let pay_term_id_router = Router::new()
        .route("/", get(get_pay_term).put(update_pay_term).delete(delete_pay_term))
        .route("/invoice", post(invoice_pay_term))
        .layer(from_fn_with_state(deployment.clone(), load_pay_term_middleware));

    Router::new().nest(
        "/pay-terms",
        Router::new()
            .route("/", post(create_pay_term))
            .nest("/{pay_term_id}", pay_term_id_router),
    )
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::routes::test_support::{TestApp, data};

    #[tokio::test]
    async fn deposit_term_bills_once() {
        let app = TestApp::new().await;
        let project_id = app.seed_project("Addition").await;

        let (status, body) = app
            .post(
                "/api/pay-terms",
                json!({
                    "project_id": project_id,
                    "description": "Deposit",
                    "kind": "percentage",
                    "percentage": 25.0
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        // 25% of the 2,000,000 cent budget
        assert_eq!(data(&body)["amount_cents"], 500_000);
        let id = data(&body)["id"].as_i64().unwrap();

        let (status, _) = app
            .post(
                "/api/pay-terms",
                json!({
                    "project_id": project_id,
                    "description": "Too much",
                    "kind": "percentage",
                    "percentage": 80.0
                }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = app.post(&format!("/api/pay-terms/{id}/invoice"), json!({})).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(data(&body)["total_cents"], 500_000);
        assert_eq!(data(&body)["title"], "Addition: Deposit");

        let (status, _) = app.post(&format!("/api/pay-terms/{id}/invoice"), json!({})).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let (status, _) = app.delete(&format!("/api/pay-terms/{id}")).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, body) = app.get(&format!("/api/projects/{project_id}/pay-terms")).await;
        assert_eq!(data(&body)[0]["status"], "invoiced");
    }
}
