use axum::{
    Extension, Json, Router,
    extract::State,
    middleware::from_fn_with_state,
    response::{Html, Json as ResponseJson},
    routing::{get, post},
};
use db::models::estimate::{CreateEstimate, Estimate, UpdateEstimate};
use deployment::Deployment;
use services::services::{
    billing::{EstimateDetails, EstimateService, InvoiceDetails},
    documents::{DocumentService, EmailDraft},
};
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, middleware::load_estimate_middleware};

pub async fn get_estimate(
    Extension(estimate): Extension<Estimate>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<EstimateDetails>>, ApiError> {
    let details = EstimateService::details(deployment.db(), &estimate).await?;
    Ok(ResponseJson(ApiResponse::success(details)))
}

pub async fn create_estimate(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<CreateEstimate>,
) -> Result<ResponseJson<ApiResponse<EstimateDetails>>, ApiError> {
    let config = deployment.config().read().await.clone();
    let details = EstimateService::create(deployment.db(), &config, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(details)))
}

pub async fn update_estimate(
    Extension(estimate): Extension<Estimate>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<UpdateEstimate>,
) -> Result<ResponseJson<ApiResponse<EstimateDetails>>, ApiError> {
    let details = EstimateService::update(deployment.db(), &estimate, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(details)))
}

pub async fn delete_estimate(
    Extension(estimate): Extension<Estimate>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    EstimateService::delete(deployment.db(), &estimate).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// POST /api/estimates/{estimate_id}/convert
/// Bill the whole estimate on a new draft invoice
pub async fn convert_estimate(
    Extension(estimate): Extension<Estimate>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<InvoiceDetails>>, ApiError> {
    let config = deployment.config().read().await.clone();
    let invoice = EstimateService::convert_to_invoice(deployment.db(), &config, &estimate).await?;
    Ok(ResponseJson(ApiResponse::success(invoice)))
}

pub async fn get_estimate_document(
    Extension(estimate): Extension<Estimate>,
    State(deployment): State<DeploymentImpl>,
) -> Result<Html<String>, ApiError> {
    let config = deployment.config().read().await.clone();
    let html = DocumentService::estimate_html(deployment.db(), &config, &estimate).await?;
    Ok(Html(html))
}

pub async fn get_estimate_email(
    Extension(estimate): Extension<Estimate>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<EmailDraft>>, ApiError> {
    let config = deployment.config().read().await.clone();
    let draft = DocumentService::estimate_email(deployment.db(), &config, &estimate).await?;
    Ok(ResponseJson(ApiResponse::success(draft)))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let estimate_id_router = Router::new()
        .route("/", get(get_estimate).put(update_estimate).delete(delete_estimate))
        .route("/convert", post(convert_estimate))
        .route("/document", get(get_estimate_document))
        .route("/email", get(get_estimate_email))
        .layer(from_fn_with_state(deployment.clone(), load_estimate_middleware));

    let estimates_router = Router::new()
        .route("/", post(create_estimate))
        .nest("/{estimate_id}", estimate_id_router);

    Router::new().nest("/estimates", estimates_router)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::routes::test_support::{TestApp, data};

    #[tokio::test]
    async fn estimate_converts_once() {
        let app = TestApp::new().await;
        let project_id = app.seed_project("Bathroom").await;

        let (status, body) = app
            .post(
                "/api/estimates",
                json!({
                    "project_id": project_id,
                    "title": "Bathroom remodel",
                    "issue_date": "2025-03-01",
                    "tax_rate": 10.0,
                    "notes": { "scope": "Demo and retile" },
                    "items": [
                        { "description": "Tile", "quantity": 2.0, "unit_price_cents": 15_000 },
                        { "description": "Labor", "quantity": 1.0, "unit_price_cents": 20_000 }
                    ]
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let estimate = data(&body);
        assert_eq!(estimate["total_cents"], 55_000);
        assert_eq!(estimate["sections"]["scope"], "Demo and retile");
        let id = estimate["id"].as_i64().unwrap();

        let (status, body) = app.post(&format!("/api/estimates/{id}/convert"), json!({})).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(data(&body)["total_cents"], 55_000);
        assert_eq!(data(&body)["status"], "draft");
        assert_eq!(data(&body)["items"].as_array().unwrap().len(), 2);

        let (status, _) = app.post(&format!("/api/estimates/{id}/convert"), json!({})).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let (status, _) = app.put(&format!("/api/estimates/{id}"), json!({ "tax_rate": 0.0 })).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let (status, _) = app
            .post(
                "/api/pay-terms",
                json!({
                    "project_id": project_id,
                    "estimate_id": id,
                    "description": "Deposit",
                    "kind": "percentage",
                    "percentage": 25.0
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, body) = app.get(&format!("/api/estimates/{id}")).await;
        assert_eq!(data(&body)["status"], "accepted");
    }

    #[tokio::test]
    async fn document_is_printable_html() {
        let app = TestApp::new().await;
        let project_id = app.seed_project("Deck <rebuild>").await;
        let (_, body) = app
            .post(
                "/api/estimates",
                json!({
                    "project_id": project_id,
                    "title": "Deck",
                    "items": [{ "description": "Cedar boards", "quantity": 40.0, "unit_price_cents": 1_250 }]
                }),
            )
            .await;
        let id = data(&body)["id"].as_i64().unwrap();

        let (status, html) = app.get_text(&format!("/api/estimates/{id}/document")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("Cedar boards"));
        assert!(html.contains("$500.00"));

        let (status, body) = app.get(&format!("/api/estimates/{id}/email")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(data(&body)["to"], "ada@example.test");
        assert!(data(&body)["mailto"].as_str().unwrap().starts_with("mailto:ada@example.test?"));
    }
}
