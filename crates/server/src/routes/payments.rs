use axum::{
    Extension, Router,
    extract::State,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{delete, get},
};
use db::models::{
    invoice::Invoice,
    payment::{Payment, PaymentWithInvoice},
};
use deployment::Deployment;
use services::services::billing::InvoiceService;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, middleware::load_payment_middleware};

pub async fn get_payments(
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Vec<PaymentWithInvoice>>>, ApiError> {
    let payments = Payment::find_all(&deployment.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(payments)))
}

/// DELETE /api/payments/{payment_id}
/// Returns the invoice with its status recomputed
pub async fn delete_payment(
    Extension(payment): Extension<Payment>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Invoice>>, ApiError> {
    let invoice = InvoiceService::delete_payment(deployment.db(), &payment).await?;
    Ok(ResponseJson(ApiResponse::success(invoice)))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let payment_id_router = Router::new()
        .route("/", delete(delete_payment))
        .layer(from_fn_with_state(deployment.clone(), load_payment_middleware));

    Router::new().nest(
        "/payments",
        Router::new()
            .route("/", get(get_payments))
            .nest("/{payment_id}", payment_id_router),
    )
}
