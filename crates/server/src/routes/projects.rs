use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    contract::Contract,
    estimate::Estimate,
    invoice::{Invoice, InvoiceFilter, InvoiceSummary},
    pay_term::PayTerm,
    project::{CreateProject, Project, ProjectFilter, ProjectWithCustomer, UpdateProject},
};
use deployment::Deployment;
use services::services::project::ProjectService;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, middleware::load_project_middleware};

pub async fn get_projects(
    State(deployment): State<DeploymentImpl>,
    Query(filter): Query<ProjectFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<ProjectWithCustomer>>>, ApiError> {
    let db = deployment.db();
    let projects = Project::find_filtered(&db.pool, db.dialect, &filter).await?;
    Ok(ResponseJson(ApiResponse::success(projects)))
}

pub async fn get_project(
    Extension(project): Extension<Project>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<ProjectWithCustomer>>, ApiError> {
    let project = Project::find_with_customer(&deployment.db().pool, project.id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("project {} not found", project.id)))?;
    Ok(ResponseJson(ApiResponse::success(project)))
}

pub async fn create_project(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<CreateProject>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    let project = ProjectService::create(deployment.db(), &payload).await?;
    Ok(ResponseJson(ApiResponse::success(project)))
}

pub async fn update_project(
    Extension(project): Extension<Project>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<UpdateProject>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    let project = ProjectService::update(deployment.db(), &project, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(project)))
}

pub async fn delete_project(
    Extension(project): Extension<Project>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    ProjectService::delete(deployment.db(), &project).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn get_project_estimates(
    Extension(project): Extension<Project>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<Estimate>>>, ApiError> {
    let estimates = Estimate::find_by_project_id(&deployment.db().pool, project.id).await?;
    Ok(ResponseJson(ApiResponse::success(estimates)))
}

pub async fn get_project_invoices(
    Extension(project): Extension<Project>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<InvoiceSummary>>>, ApiError> {
    let db = deployment.db();
    let filter = InvoiceFilter {
        project_id: Some(project.id),
        ..Default::default()
    };
    let invoices = Invoice::find_filtered(&db.pool, db.dialect, &filter).await?;
    Ok(ResponseJson(ApiResponse::success(invoices)))
}

pub async fn get_project_pay_terms(
    Extension(project): Extension<Project>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<PayTerm>>>, ApiError> {
    let terms = PayTerm::find_by_project_id(&deployment.db().pool, project.id).await?;
    Ok(ResponseJson(ApiResponse::success(terms)))
}

pub async fn get_project_contracts(
    Extension(project): Extension<Project>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<Contract>>>, ApiError> {
    let contracts = Contract::find_by_project_id(&deployment.db().pool, project.id).await?;
    Ok(ResponseJson(ApiResponse::success(contracts)))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let project_id_router = Router::new()
        .route("/", get(get_project).put(update_project).delete(delete_project))
        .route("/estimates", get(get_project_estimates))
        .route("/invoices", get(get_project_invoices))
        .route("/pay-terms", get(get_project_pay_terms))
        .route("/contracts", get(get_project_contracts))
        .layer(from_fn_with_state(deployment.clone(), load_project_middleware));

    let projects_router = Router::new()
        .route("/", get(get_projects).post(create_project))
        .nest("/{project_id}", project_id_router);

    Router::new().nest("/projects", projects_router)
}
