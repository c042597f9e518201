use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};
use db::models::{
    contract::Contract, customer::Customer, estimate::Estimate, invoice::Invoice, pay_term::PayTerm,
    payment::Payment, project::Project,
};
use deployment::Deployment;

use crate::{DeploymentImpl, error::ApiError};

/// Put the loaded model in the request extensions, or 404 when the lookup
/// came back empty.
async fn attach<T: Clone + Send + Sync + 'static>(
    found: Option<T>,
    kind: &str,
    id: i64,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(model) = found else {
        tracing::warn!("{} {} not found", kind, id);
        return Err(ApiError::NotFound(format!("{kind} {id} not found")));
    };
    request.extensions_mut().insert(model);
    Ok(next.run(request).await)
}

pub async fn load_customer_middleware(
    State(deployment): State<DeploymentImpl>,
    Path(customer_id): Path<i64>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let customer = Customer::find_by_id(&deployment.db().pool, customer_id).await?;
    attach(customer, "customer", customer_id, request, next).await
}

pub async fn load_project_middleware(
    State(deployment): State<DeploymentImpl>,
    Path(project_id): Path<i64>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let project = Project::find_by_id(&deployment.db().pool, project_id).await?;
    attach(project, "project", project_id, request, next).await
}

pub async fn load_estimate_middleware(
    State(deployment): State<DeploymentImpl>,
    Path(estimate_id): Path<i64>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let estimate = Estimate::find_by_id(&deployment.db().pool, estimate_id).await?;
    attach(estimate, "estimate", estimate_id, request, next).await
}

pub async fn load_invoice_middleware(
    State(deployment): State<DeploymentImpl>,
    Path(invoice_id): Path<i64>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let invoice = Invoice::find_by_id(&deployment.db().pool, invoice_id).await?;
    attach(invoice, "invoice", invoice_id, request, next).await
}

pub async fn load_payment_middleware(
    State(deployment): State<DeploymentImpl>,
    Path(payment_id): Path<i64>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let payment = Payment::find_by_id(&deployment.db().pool, payment_id).await?;
    attach(payment, "payment", payment_id, request, next).await
}

pub async fn load_pay_term_middleware(
    State(deployment): State<DeploymentImpl>,
    Path(pay_term_id): Path<i64>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let term = PayTerm::find_by_id(&deployment.db().pool, pay_term_id).await?;
    attach(term, "pay term", pay_term_id, request, next).await
}

pub async fn load_contract_middleware(
    State(deployment): State<DeploymentImpl>,
    Path(contract_id): Path<i64>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let contract = Contract::find_by_id(&deployment.db().pool, contract_id).await?;
    attach(contract, "contract", contract_id, request, next).await
}
