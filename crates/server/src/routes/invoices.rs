use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    middleware::from_fn_with_state,
    response::{Html, Json as ResponseJson},
    routing::{get, post},
};
use db::models::{
    invoice::{CreateInvoice, Invoice, InvoiceFilter, InvoiceSummary, UpdateInvoice},
    payment::{CreatePayment, Payment},
};
use deployment::Deployment;
use services::services::{
    billing::{InvoiceDetails, InvoiceService},
    documents::{DocumentService, EmailDraft},
};
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, middleware::load_invoice_middleware};

pub async fn get_invoices(
    State(deployment): State<DeploymentImpl>,
    Query(filter): Query<InvoiceFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<InvoiceSummary>>>, ApiError> {
    let db = deployment.db();
    let invoices = Invoice::find_filtered(&db.pool, db.dialect, &filter).await?;
    Ok(ResponseJson(ApiResponse::success(invoices)))
}

pub async fn get_invoice(
    Extension(invoice): Extension<Invoice>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<InvoiceDetails>>, ApiError> {
    let details = InvoiceService::details(deployment.db(), &invoice).await?;
    Ok(ResponseJson(ApiResponse::success(details)))
}

pub async fn create_invoice(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<CreateInvoice>,
) -> Result<ResponseJson<ApiResponse<InvoiceDetails>>, ApiError> {
    let config = deployment.config().read().await.clone();
    let details = InvoiceService::create(deployment.db(), &config, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(details)))
}

pub async fn update_invoice(
    Extension(invoice): Extension<Invoice>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<UpdateInvoice>,
) -> Result<ResponseJson<ApiResponse<InvoiceDetails>>, ApiError> {
    let details = InvoiceService::update(deployment.db(), &invoice, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(details)))
}

pub async fn delete_invoice(
    Extension(invoice): Extension<Invoice>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    InvoiceService::delete(deployment.db(), &invoice).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn void_invoice(
    Extension(invoice): Extension<Invoice>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<InvoiceDetails>>, ApiError> {
    let details = InvoiceService::void(deployment.db(), &invoice).await?;
    Ok(ResponseJson(ApiResponse::success(details)))
}

pub async fn get_invoice_payments(
    Extension(invoice): Extension<Invoice>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<Payment>>>, ApiError> {
    let payments = Payment::find_by_invoice_id(&deployment.db().pool, invoice.id).await?;
    Ok(ResponseJson(ApiResponse::success(payments)))
}

pub async fn create_invoice_payment(
    Extension(invoice): Extension<Invoice>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<CreatePayment>,
) -> Result<ResponseJson<ApiResponse<Payment>>, ApiError> {
    let payment = InvoiceService::record_payment(deployment.db(), &invoice, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(payment)))
}

pub async fn get_invoice_document(
    Extension(invoice): Extension<Invoice>,
    State(deployment): State<DeploymentImpl>,
) -> Result<Html<String>, ApiError> {
    let config = deployment.config().read().await.clone();
    let html = DocumentService::invoice_html(deployment.db(), &config, &invoice).await?;
    Ok(Html(html))
}

pub async fn get_invoice_email(
    Extension(invoice): Extension<Invoice>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<EmailDraft>>, ApiError> {
    let config = deployment.config().read().await.clone();
    let draft = DocumentService::invoice_email(deployment.db(), &config, &invoice).await?;
    Ok(ResponseJson(ApiResponse::success(draft)))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let invoice_id_router = Router::new()
        .route("/", get(get_invoice).put(update_invoice).delete(delete_invoice))
        .route("/void", post(void_invoice))
        .route("/payments", get(get_invoice_payments).post(create_invoice_payment))
        .route("/document", get(get_invoice_document))
        .route("/email", get(get_invoice_email))
        .layer(from_fn_with_state(deployment.clone(), load_invoice_middleware));

    let invoices_router = Router::new()
        .route("/", get(get_invoices).post(create_invoice))
        .nest("/{invoice_id}", invoice_id_router);

    Router::new().nest("/invoices", invoices_router)
}
