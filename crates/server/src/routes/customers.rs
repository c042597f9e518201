use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    customer::{CreateCustomer, Customer, UpdateCustomer},
    project::Project,
};
use deployment::Deployment;
use serde::Deserialize;
use services::services::customer::CustomerService;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, middleware::load_customer_middleware};

#[derive(Debug, Default, Deserialize)]
pub struct CustomerQuery {
    pub search: Option<String>,
}

pub async fn get_customers(
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<CustomerQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Customer>>>, ApiError> {
    let db = deployment.db();
    let customers = Customer::search(&db.pool, db.dialect, query.search.as_deref()).await?;
    Ok(ResponseJson(ApiResponse::success(customers)))
}

pub async fn get_customer(
    Extension(customer): Extension<Customer>,
) -> Result<ResponseJson<ApiResponse<Customer>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(customer)))
}

pub async fn create_customer(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<CreateCustomer>,
) -> Result<ResponseJson<ApiResponse<Customer>>, ApiError> {
    let customer = CustomerService::create(deployment.db(), &payload).await?;
    Ok(ResponseJson(ApiResponse::success(customer)))
}

pub async fn update_customer(
    Extension(customer): Extension<Customer>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<UpdateCustomer>,
) -> Result<ResponseJson<ApiResponse<Customer>>, ApiError> {
    let customer = CustomerService::update(deployment.db(), &customer, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(customer)))
}

pub async fn delete_customer(
    Extension(customer): Extension<Customer>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    CustomerService::delete(deployment.db(), &customer).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn get_customer_projects(
    Extension(customer): Extension<Customer>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<Project>>>, ApiError> {
    let projects = Project::find_by_customer_id(&deployment.db().pool, customer.id).await?;
    Ok(ResponseJson(ApiResponse::success(projects)))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let customer_id_router = Router::new()
        .route("/", get(get_customer).put(update_customer).delete(delete_customer))
        .route("/projects", get(get_customer_projects))
        .layer(from_fn_with_state(deployment.clone(), load_customer_middleware));

    let customers_router = Router::new()
        .route("/", get(get_customers).post(create_customer))
        .nest("/{customer_id}", customer_id_router);

    Router::new().nest("/customers", customers_router)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::routes::test_support::{TestApp, data};

    #[tokio::test]
    async fn customer_crud_round_trip() {
        let app = TestApp::new().await;

        let (status, body) = app
            .post("/api/customers", json!({ "name": "Rosa Marin", "email": "rosa@example.test" }))
            .await;
        assert_eq!(status, StatusCode::OK);
        let id = data(&body)["id"].as_i64().unwrap();

        let (status, body) = app.get("/api/customers?search=marin").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(data(&body).as_array().unwrap().len(), 1);

        let (status, body) = app.put(&format!("/api/customers/{id}"), json!({ "phone": "555-0100" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(data(&body)["phone"], "555-0100");
        assert_eq!(data(&body)["name"], "Rosa Marin");

        let (status, _) = app.delete(&format!("/api/customers/{id}")).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = app.get(&format!("/api/customers/{id}")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn invalid_email_is_a_bad_request() {
        let app = TestApp::new().await;
        let (status, body) = app
            .post("/api/customers", json!({ "name": "Rosa Marin", "email": "not-an-address" }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("email"));
    }
}
