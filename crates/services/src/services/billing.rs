//! Estimates, invoices and the payments recorded against them.

use db::{
    DBService,
    models::{
        Totals,
        estimate::{CreateEstimate, Estimate, EstimateFields, EstimateNotes, EstimateStatus, UpdateEstimate},
        invoice::{CreateInvoice, Invoice, InvoiceFields, InvoiceStatus, InvoiceSummary, UpdateInvoice},
        line_item::{DocumentRef, LineItem, LineItemInput},
        pay_term::{PayTerm, PayTermStatus},
        payment::{CreatePayment, Payment},
        project::Project,
    },
};
use serde::Serialize;
use sqlx::AnyConnection;
use thiserror::Error;
use tracing::{debug, info};
use ts_rs::TS;
use utils::{
    dates::{add_days, format_date, today},
    money::apply_rate,
};

use super::{
    config::Config,
    estimate_notes, pay_terms,
    validation::{self, ValidationError},
};

#[derive(Debug, Error)]
pub enum BillingError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("project {0} does not exist")]
    ProjectNotFound(i64),
    #[error("{0}")]
    Conflict(String),
}

impl BillingError {
    fn conflict(message: impl Into<String>) -> Self {
        BillingError::Conflict(message.into())
    }
}

/// Line amounts, subtotal, tax on the subtotal and grand total.
pub fn compute_totals(items: &[LineItemInput], tax_rate: f64) -> Totals {
    let subtotal_cents: i64 = items.iter().map(LineItemInput::amount_cents).sum();
    let tax_cents = apply_rate(subtotal_cents, tax_rate);
    Totals {
        subtotal_cents,
        tax_cents,
        total_cents: subtotal_cents + tax_cents,
    }
}

/// Status an invoice should have given what has been paid against it.
///
/// `due_date` and `today` are `YYYY-MM-DD`, so they compare as text.
pub fn derive_status(
    current: InvoiceStatus,
    total_cents: i64,
    paid_cents: i64,
    due_date: Option<&str>,
    today: &str,
) -> InvoiceStatus {
    if current == InvoiceStatus::Void {
        return InvoiceStatus::Void;
    }
    if paid_cents > 0 && paid_cents >= total_cents {
        return InvoiceStatus::Paid;
    }
    if current == InvoiceStatus::Draft && paid_cents == 0 {
        return InvoiceStatus::Draft;
    }
    if due_date.is_some_and(|due| due < today) {
        return InvoiceStatus::Overdue;
    }
    if paid_cents > 0 {
        InvoiceStatus::Partial
    } else {
        InvoiceStatus::Sent
    }
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct EstimateDetails {
    #[serde(flatten)]
    #[ts(flatten)]
    pub estimate: Estimate,
    pub sections: EstimateNotes,
    pub items: Vec<LineItem>,
    pub pay_terms: Vec<PayTerm>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct InvoiceDetails {
    #[serde(flatten)]
    #[ts(flatten)]
    pub summary: InvoiceSummary,
    pub items: Vec<LineItem>,
    pub payments: Vec<Payment>,
    pub pay_terms: Vec<PayTerm>,
}

async fn require_project(db: &DBService, project_id: i64) -> Result<Project, BillingError> {
    Project::find_by_id(&db.pool, project_id)
        .await?
        .ok_or(BillingError::ProjectNotFound(project_id))
}

pub struct EstimateService;

impl EstimateService {
    pub async fn details(db: &DBService, estimate: &Estimate) -> Result<EstimateDetails, BillingError> {
        let items = LineItem::find_for_document(&db.pool, DocumentRef::Estimate(estimate.id)).await?;
        let pay_terms = PayTerm::find_by_estimate_id(&db.pool, estimate.id).await?;
        Ok(EstimateDetails {
            estimate: estimate.clone(),
            sections: estimate_notes::parse(estimate.notes.as_deref()),
            items,
            pay_terms,
        })
    }

    pub async fn create(db: &DBService, config: &Config, data: &CreateEstimate) -> Result<EstimateDetails, BillingError> {
        require_project(db, data.project_id).await?;
        let title = validation::required_text("title", &data.title)?;
        let issue_date = validation::date_or("issue_date", data.issue_date.as_deref(), today())?;
        let valid_until = validation::date_or(
            "valid_until",
            data.valid_until.as_deref(),
            add_days(issue_date, config.estimate_valid_days),
        )?;
        validation::date_order("issue_date", issue_date, "valid_until", Some(valid_until))?;
        let tax_rate = validation::tax_rate(data.tax_rate.unwrap_or(config.default_tax_rate))?;
        validation::line_items(&data.items)?;

        let fields = EstimateFields {
            project_id: data.project_id,
            title,
            status: EstimateStatus::Draft,
            issue_date: format_date(issue_date),
            valid_until: Some(format_date(valid_until)),
            tax_rate,
            notes: data.notes.as_ref().and_then(estimate_notes::compose),
            totals: compute_totals(&data.items, tax_rate),
        };

        let mut tx = db.pool.begin().await?;
        let number = Estimate::next_number(&mut *tx).await?;
        let estimate = Estimate::create(&mut *tx, &number, &fields).await?;
        LineItem::replace_for_document(&mut *tx, DocumentRef::Estimate(estimate.id), &data.items).await?;
        tx.commit().await?;

        info!(
            estimate_id = estimate.id,
            project_id = estimate.project_id,
            number = %estimate.estimate_number,
            total_cents = estimate.total_cents,
            "Created estimate"
        );
        Self::details(db, &estimate).await
    }

    /// Apply `data` over `existing`. Replacing the items or changing the tax
    /// rate recomputes the totals and the amounts of pending percentage pay
    /// terms drawn from this estimate; the terms must still fit afterwards.
    ///
    /// Once an estimate is on a non-void invoice only its title, dates and
    /// notes can change.
    pub async fn update(db: &DBService, existing: &Estimate, data: &UpdateEstimate) -> Result<EstimateDetails, BillingError> {
        let current = EstimateFields::from(existing);
        let title = validation::required_text("title", data.title.as_deref().unwrap_or(&current.title))?;
        let (issue_date, valid_until) = validation::date_pair(
            "issue_date",
            data.issue_date.as_deref().unwrap_or(&current.issue_date),
            "valid_until",
            data.valid_until.as_deref().or(current.valid_until.as_deref()),
        )?;
        let tax_rate = validation::tax_rate(data.tax_rate.unwrap_or(current.tax_rate))?;

        let items: Vec<LineItemInput> = match &data.items {
            Some(items) => {
                validation::line_items(items)?;
                items.clone()
            }
            None => LineItem::find_for_document(&db.pool, DocumentRef::Estimate(existing.id))
                .await?
                .iter()
                .map(LineItemInput::from)
                .collect(),
        };

        let fields = EstimateFields {
            title,
            status: data.status.unwrap_or(current.status),
            issue_date: format_date(issue_date),
            valid_until: valid_until.map(format_date),
            tax_rate,
            notes: match &data.notes {
                Some(notes) => estimate_notes::compose(notes),
                None => current.notes.clone(),
            },
            totals: compute_totals(&items, tax_rate),
            ..current
        };

        let mut tx = db.pool.begin().await?;
        db.lock_for_write(&mut *tx, "invoices").await?;
        if let Some(invoice) = Invoice::find_open_for_estimate(&mut *tx, existing.id).await? {
            let status_changed = data.status.is_some_and(|status| status != existing.status);
            let tax_changed = data.tax_rate.is_some_and(|rate| rate != existing.tax_rate);
            if data.items.is_some() || tax_changed || status_changed {
                return Err(BillingError::conflict(format!(
                    "estimate {} has been billed on invoice {}; only its title, dates and notes can change",
                    existing.estimate_number, invoice.invoice_number
                )));
            }
        }
        let estimate = Estimate::update(&mut *tx, existing.id, &fields).await?;
        if let Some(items) = &data.items {
            LineItem::replace_for_document(&mut *tx, DocumentRef::Estimate(estimate.id), items).await?;
        }
        if estimate.total_cents != existing.total_cents {
            let changed = pay_terms::recalculate_for_estimate(&mut *tx, &estimate).await?;
            debug!(estimate_id = estimate.id, changed, "Recalculated pay terms");
            let terms = PayTerm::find_by_estimate_id(&mut *tx, estimate.id).await?;
            pay_terms::check_terms_fit(&terms, estimate.total_cents)?;
        }
        tx.commit().await?;

        Self::details(db, &estimate).await
    }

    pub async fn delete(db: &DBService, estimate: &Estimate) -> Result<(), BillingError> {
        if let Some(invoice) = Invoice::find_open_for_estimate(&db.pool, estimate.id).await? {
            return Err(BillingError::conflict(format!(
                "estimate {} has been billed on invoice {}",
                estimate.estimate_number, invoice.invoice_number
            )));
        }
        Estimate::delete(&db.pool, estimate.id).await?;
        info!(estimate_id = estimate.id, "Deleted estimate");
        Ok(())
    }

    /// Bill the whole estimate on a new draft invoice and mark it accepted.
    pub async fn convert_to_invoice(
        db: &DBService,
        config: &Config,
        estimate: &Estimate,
    ) -> Result<InvoiceDetails, BillingError> {
        let items: Vec<LineItemInput> = LineItem::find_for_document(&db.pool, DocumentRef::Estimate(estimate.id))
            .await?
            .iter()
            .map(LineItemInput::from)
            .collect();
        if items.is_empty() {
            return Err(ValidationError::invalid("estimate has no line items to invoice").into());
        }

        let issue_date = today();
        let fields = InvoiceFields {
            project_id: estimate.project_id,
            estimate_id: Some(estimate.id),
            title: estimate.title.clone(),
            status: InvoiceStatus::Draft,
            issue_date: format_date(issue_date),
            due_date: Some(format_date(add_days(issue_date, config.invoice_due_days))),
            tax_rate: estimate.tax_rate,
            notes: Some(format!("Per estimate {}", estimate.estimate_number)),
            totals: compute_totals(&items, estimate.tax_rate),
        };

        let mut tx = db.pool.begin().await?;
        db.lock_for_write(&mut *tx, "invoices").await?;
        if let Some(invoice) = Invoice::find_open_for_estimate(&mut *tx, estimate.id).await? {
            return Err(BillingError::conflict(format!(
                "estimate {} has already been billed on invoice {}",
                estimate.estimate_number, invoice.invoice_number
            )));
        }
        let number = Invoice::next_number(&mut *tx).await?;
        let invoice = Invoice::create(&mut *tx, &number, &fields).await?;
        LineItem::replace_for_document(&mut *tx, DocumentRef::Invoice(invoice.id), &items).await?;
        Estimate::update_status(&mut *tx, estimate.id, EstimateStatus::Accepted).await?;
        tx.commit().await?;

        info!(
            estimate_id = estimate.id,
            invoice_id = invoice.id,
            number = %invoice.invoice_number,
            "Converted estimate to invoice"
        );
        InvoiceService::details(db, &invoice).await
    }
}

pub struct InvoiceService;

impl InvoiceService {
    pub async fn details(db: &DBService, invoice: &Invoice) -> Result<InvoiceDetails, BillingError> {
        let summary = Invoice::find_summary(&db.pool, invoice.id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        let items = LineItem::find_for_document(&db.pool, DocumentRef::Invoice(invoice.id)).await?;
        let payments = Payment::find_by_invoice_id(&db.pool, invoice.id).await?;
        let pay_terms = PayTerm::find_by_invoice_id(&db.pool, invoice.id).await?;
        Ok(InvoiceDetails {
            summary,
            items,
            payments,
            pay_terms,
        })
    }

    pub async fn create(db: &DBService, config: &Config, data: &CreateInvoice) -> Result<InvoiceDetails, BillingError> {
        require_project(db, data.project_id).await?;
        let title = validation::required_text("title", &data.title)?;
        let issue_date = validation::date_or("issue_date", data.issue_date.as_deref(), today())?;
        let due_date = validation::date_or(
            "due_date",
            data.due_date.as_deref(),
            add_days(issue_date, config.invoice_due_days),
        )?;
        validation::date_order("issue_date", issue_date, "due_date", Some(due_date))?;
        let tax_rate = validation::tax_rate(data.tax_rate.unwrap_or(config.default_tax_rate))?;
        validation::line_items(&data.items)?;

        let fields = InvoiceFields {
            project_id: data.project_id,
            estimate_id: None,
            title,
            status: InvoiceStatus::Draft,
            issue_date: format_date(issue_date),
            due_date: Some(format_date(due_date)),
            tax_rate,
            notes: validation::optional_text(data.notes.clone()),
            totals: compute_totals(&data.items, tax_rate),
        };

        let mut tx = db.pool.begin().await?;
        let number = Invoice::next_number(&mut *tx).await?;
        let invoice = Invoice::create(&mut *tx, &number, &fields).await?;
        LineItem::replace_for_document(&mut *tx, DocumentRef::Invoice(invoice.id), &data.items).await?;
        tx.commit().await?;

        info!(
            invoice_id = invoice.id,
            project_id = invoice.project_id,
            number = %invoice.invoice_number,
            total_cents = invoice.total_cents,
            "Created invoice"
        );
        Self::details(db, &invoice).await
    }

    /// Only `draft` and `sent` can be chosen by hand; the other statuses
    /// follow from payments, the due date, or voiding.
    pub async fn update(db: &DBService, existing: &Invoice, data: &UpdateInvoice) -> Result<InvoiceDetails, BillingError> {
        if existing.status == InvoiceStatus::Void {
            return Err(BillingError::conflict("void invoices cannot be edited"));
        }
        let paid_cents = Invoice::amount_paid(&db.pool, existing.id).await?;
        let status = match data.status {
            None => existing.status,
            Some(InvoiceStatus::Draft) if paid_cents > 0 => {
                return Err(ValidationError::invalid("an invoice with payments cannot go back to draft").into());
            }
            Some(status @ (InvoiceStatus::Draft | InvoiceStatus::Sent)) => status,
            Some(other) => {
                return Err(ValidationError::invalid(format!("status '{other}' is set automatically")).into());
            }
        };

        let current = InvoiceFields::from(existing);
        let title = validation::required_text("title", data.title.as_deref().unwrap_or(&current.title))?;
        let (issue_date, due_date) = validation::date_pair(
            "issue_date",
            data.issue_date.as_deref().unwrap_or(&current.issue_date),
            "due_date",
            data.due_date.as_deref().or(current.due_date.as_deref()),
        )?;
        let tax_rate = validation::tax_rate(data.tax_rate.unwrap_or(current.tax_rate))?;
        let items: Vec<LineItemInput> = match &data.items {
            Some(items) => {
                validation::line_items(items)?;
                items.clone()
            }
            None => LineItem::find_for_document(&db.pool, DocumentRef::Invoice(existing.id))
                .await?
                .iter()
                .map(LineItemInput::from)
                .collect(),
        };
        let totals = compute_totals(&items, tax_rate);
        if totals.total_cents < paid_cents {
            return Err(ValidationError::invalid(format!(
                "total cannot be less than the {paid_cents} cents already paid"
            ))
            .into());
        }

        let fields = InvoiceFields {
            title,
            status,
            issue_date: format_date(issue_date),
            due_date: due_date.map(format_date),
            tax_rate,
            notes: match &data.notes {
                Some(notes) => validation::optional_text(Some(notes.clone())),
                None => current.notes.clone(),
            },
            totals,
            ..current
        };

        let mut tx = db.pool.begin().await?;
        let invoice = Invoice::update(&mut *tx, existing.id, &fields).await?;
        if let Some(items) = &data.items {
            LineItem::replace_for_document(&mut *tx, DocumentRef::Invoice(invoice.id), items).await?;
        }
        let invoice = Self::refresh_status(&mut *tx, invoice.id, &format_date(today())).await?;
        tx.commit().await?;

        Self::details(db, &invoice).await
    }

    pub async fn delete(db: &DBService, invoice: &Invoice) -> Result<(), BillingError> {
        let mut tx = db.pool.begin().await?;
        db.lock_for_write(&mut *tx, "payments").await?;
        if Invoice::amount_paid(&mut *tx, invoice.id).await? > 0 {
            return Err(BillingError::conflict(format!(
                "invoice {} has payments; void is not possible either, delete the payments first",
                invoice.invoice_number
            )));
        }
        let released = PayTerm::release_invoice(&mut *tx, invoice.id).await?;
        Invoice::delete(&mut *tx, invoice.id).await?;
        tx.commit().await?;

        info!(invoice_id = invoice.id, released_pay_terms = released, "Deleted invoice");
        Ok(())
    }

    /// Cancel an unpaid invoice. Pay terms billed on it become pending again.
    pub async fn void(db: &DBService, invoice: &Invoice) -> Result<InvoiceDetails, BillingError> {
        if invoice.status == InvoiceStatus::Void {
            return Err(BillingError::conflict(format!("invoice {} is already void", invoice.invoice_number)));
        }
        let mut tx = db.pool.begin().await?;
        db.lock_for_write(&mut *tx, "payments").await?;
        if Invoice::amount_paid(&mut *tx, invoice.id).await? > 0 {
            return Err(BillingError::conflict(format!(
                "invoice {} has payments and cannot be voided",
                invoice.invoice_number
            )));
        }
        Invoice::update_status(&mut *tx, invoice.id, InvoiceStatus::Void).await?;
        let released = PayTerm::release_invoice(&mut *tx, invoice.id).await?;
        tx.commit().await?;

        info!(invoice_id = invoice.id, released_pay_terms = released, "Voided invoice");
        let invoice = Invoice::find_by_id(&db.pool, invoice.id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        Self::details(db, &invoice).await
    }

    /// Record a payment of at most the outstanding balance. The balance is
    /// summed under the payments write lock, so concurrent payments cannot
    /// both fit into the same remainder.
    pub async fn record_payment(db: &DBService, invoice: &Invoice, data: &CreatePayment) -> Result<Payment, BillingError> {
        if data.amount_cents <= 0 {
            return Err(ValidationError::invalid("amount_cents must be greater than 0").into());
        }
        let paid_on = validation::date_or("paid_on", data.paid_on.as_deref(), today())?;
        let data = CreatePayment {
            reference: validation::optional_text(data.reference.clone()),
            notes: validation::optional_text(data.notes.clone()),
            ..data.clone()
        };

        let mut tx = db.pool.begin().await?;
        db.lock_for_write(&mut *tx, "payments").await?;
        let invoice = Invoice::find_by_id(&mut *tx, invoice.id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        if invoice.status == InvoiceStatus::Void {
            return Err(BillingError::conflict("void invoices cannot take payments"));
        }
        let paid_cents = Invoice::amount_paid(&mut *tx, invoice.id).await?;
        let balance_cents = invoice.total_cents - paid_cents;
        if data.amount_cents > balance_cents {
            return Err(ValidationError::invalid(format!(
                "payment of {} cents exceeds the outstanding balance of {balance_cents} cents",
                data.amount_cents
            ))
            .into());
        }
        if invoice.status == InvoiceStatus::Draft {
            Invoice::update_status(&mut *tx, invoice.id, InvoiceStatus::Sent).await?;
        }
        let payment = Payment::create(
            &mut *tx,
            invoice.id,
            &format_date(paid_on),
            data.method.unwrap_or_default(),
            &data,
        )
        .await?;
        let updated = Self::refresh_status(&mut *tx, invoice.id, &format_date(today())).await?;
        tx.commit().await?;

        info!(
            invoice_id = invoice.id,
            payment_id = payment.id,
            amount_cents = payment.amount_cents,
            status = %updated.status,
            "Recorded payment"
        );
        Ok(payment)
    }

    pub async fn delete_payment(db: &DBService, payment: &Payment) -> Result<Invoice, BillingError> {
        let mut tx = db.pool.begin().await?;
        Payment::delete(&mut *tx, payment.id).await?;
        let invoice = Self::refresh_status(&mut *tx, payment.invoice_id, &format_date(today())).await?;
        tx.commit().await?;

        info!(payment_id = payment.id, invoice_id = invoice.id, status = %invoice.status, "Deleted payment");
        Ok(invoice)
    }

    /// Recompute the invoice status from its payments and due date as of
    /// `today`, and carry paid/unpaid over to the pay terms billed on it.
    pub async fn refresh_status(conn: &mut AnyConnection, invoice_id: i64, today: &str) -> Result<Invoice, sqlx::Error> {
        let invoice = Invoice::find_by_id(&mut *conn, invoice_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        let paid_cents = Invoice::amount_paid(&mut *conn, invoice_id).await?;
        let status = derive_status(
            invoice.status,
            invoice.total_cents,
            paid_cents,
            invoice.due_date.as_deref(),
            today,
        );

        if status != InvoiceStatus::Void {
            let term_status = if status == InvoiceStatus::Paid {
                PayTermStatus::Paid
            } else {
                PayTermStatus::Invoiced
            };
            PayTerm::update_status_for_invoice(&mut *conn, invoice_id, term_status).await?;
        }

        if status == invoice.status {
            return Ok(invoice);
        }
        debug!(invoice_id, from = %invoice.status, to = %status, "Invoice status changed");
        Invoice::update_status(&mut *conn, invoice_id, status).await?;
        Ok(Invoice { status, ..invoice })
    }
}

#[cfg(test)]
mod tests {
    use db::models::payment::PaymentMethod;

    use super::*;
    use crate::services::test_support::{item, seed_customer, seed_project};

    fn payment(amount_cents: i64) -> CreatePayment {
        CreatePayment {
            amount_cents,
            paid_on: None,
            method: Some(PaymentMethod::Check),
            reference: Some("1001".to_string()),
            notes: None,
        }
    }

    async fn seed_invoice(db: &DBService, items: Vec<LineItemInput>) -> Invoice {
        let customer = seed_customer(db, "Hale").await;
        let project = seed_project(db, customer.id, "Deck").await;
        let details = InvoiceService::create(
            db,
            &Config::default(),
            &CreateInvoice {
                project_id: project.id,
                title: "Deck framing".to_string(),
                issue_date: None,
                due_date: None,
                tax_rate: Some(10.0),
                notes: None,
                items,
            },
        )
        .await
        .unwrap();
        details.summary.invoice
    }

    #[test]
    fn totals_round_each_line_then_tax() {
        let items = vec![item("Joists", 3.0, 1_999), item("Labor", 2.5, 4_500)];
        let totals = compute_totals(&items, 8.25);
        assert_eq!(totals.subtotal_cents, 5_997 + 11_250);
        assert_eq!(totals.tax_cents, 1_423);
        assert_eq!(totals.total_cents, 17_247 + 1_423);
        assert_eq!(compute_totals(&[], 8.25), Totals::default());
    }

    #[test]
    fn status_follows_payments_and_due_date() {
        use InvoiceStatus::*;
        let today = "2025-04-15";
        assert_eq!(derive_status(Draft, 1_000, 0, Some("2025-01-01"), today), Draft);
        assert_eq!(derive_status(Sent, 1_000, 0, Some("2025-05-01"), today), Sent);
        assert_eq!(derive_status(Sent, 1_000, 400, Some("2025-05-01"), today), Partial);
        assert_eq!(derive_status(Partial, 1_000, 1_000, Some("2025-01-01"), today), Paid);
        assert_eq!(derive_status(Partial, 1_000, 400, Some("2025-04-14"), today), Overdue);
        assert_eq!(derive_status(Overdue, 1_000, 0, Some("2025-04-15"), today), Sent);
        assert_eq!(derive_status(Paid, 1_000, 0, None, today), Sent);
        assert_eq!(derive_status(Void, 1_000, 1_000, None, today), Void);
    }

    #[tokio::test]
    async fn create_applies_defaults_and_numbers() {
        let db = DBService::new_in_memory().await.unwrap();
        let invoice = seed_invoice(&db, vec![item("Deck boards", 10.0, 1_000)]).await;
        assert_eq!(invoice.invoice_number, "INV-0001");
        assert_eq!(invoice.status, InvoiceStatus::Draft);
        assert_eq!(invoice.total_cents, 11_000);
        assert_eq!(
            invoice.due_date,
            Some(format_date(add_days(today(), Config::default().invoice_due_days)))
        );
    }

    #[tokio::test]
    async fn payments_move_invoice_to_partial_then_paid() {
        let db = DBService::new_in_memory().await.unwrap();
        let invoice = seed_invoice(&db, vec![item("Deck boards", 10.0, 1_000)]).await;

        InvoiceService::record_payment(&db, &invoice, &payment(5_000)).await.unwrap();
        let partial = Invoice::find_by_id(&db.pool, invoice.id).await.unwrap().unwrap();
        assert_eq!(partial.status, InvoiceStatus::Partial);

        let too_much = InvoiceService::record_payment(&db, &partial, &payment(6_001)).await.unwrap_err();
        assert!(matches!(too_much, BillingError::Validation(_)));

        let last = InvoiceService::record_payment(&db, &partial, &payment(6_000)).await.unwrap();
        let paid = Invoice::find_by_id(&db.pool, invoice.id).await.unwrap().unwrap();
        assert_eq!(paid.status, InvoiceStatus::Paid);

        let reopened = InvoiceService::delete_payment(&db, &last).await.unwrap();
        assert_eq!(reopened.status, InvoiceStatus::Partial);
    }

    #[tokio::test]
    async fn stale_invoice_copy_cannot_overpay() {
        let db = DBService::new_in_memory().await.unwrap();
        let invoice = seed_invoice(&db, vec![item("Deck boards", 10.0, 1_000)]).await;

        InvoiceService::record_payment(&db, &invoice, &payment(8_000)).await.unwrap();
        // `invoice` still reads as an unpaid draft
        let err = InvoiceService::record_payment(&db, &invoice, &payment(8_000)).await.unwrap_err();
        assert!(matches!(err, BillingError::Validation(_)));
        assert_eq!(Invoice::amount_paid(&db.pool, invoice.id).await.unwrap(), 8_000);
    }

    #[tokio::test]
    async fn invoices_with_payments_cannot_be_voided_or_deleted() {
        let db = DBService::new_in_memory().await.unwrap();
        let invoice = seed_invoice(&db, vec![item("Deck boards", 1.0, 1_000)]).await;
        InvoiceService::record_payment(&db, &invoice, &payment(100)).await.unwrap();

        assert!(matches!(
            InvoiceService::void(&db, &invoice).await.unwrap_err(),
            BillingError::Conflict(_)
        ));
        assert!(matches!(
            InvoiceService::delete(&db, &invoice).await.unwrap_err(),
            BillingError::Conflict(_)
        ));
        assert!(matches!(
            InvoiceService::record_payment(&db, &invoice, &payment(0)).await.unwrap_err(),
            BillingError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn void_invoice_rejects_payments_and_edits() {
        let db = DBService::new_in_memory().await.unwrap();
        let invoice = seed_invoice(&db, vec![item("Deck boards", 1.0, 1_000)]).await;
        let voided = InvoiceService::void(&db, &invoice).await.unwrap().summary.invoice;
        assert_eq!(voided.status, InvoiceStatus::Void);

        assert!(matches!(
            InvoiceService::record_payment(&db, &voided, &payment(100)).await.unwrap_err(),
            BillingError::Conflict(_)
        ));
        assert!(matches!(
            InvoiceService::update(&db, &voided, &UpdateInvoice::default()).await.unwrap_err(),
            BillingError::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn update_replaces_items_and_guards_status() {
        let db = DBService::new_in_memory().await.unwrap();
        let invoice = seed_invoice(&db, vec![item("Deck boards", 1.0, 1_000)]).await;

        let updated = InvoiceService::update(
            &db,
            &invoice,
            &UpdateInvoice {
                status: Some(InvoiceStatus::Sent),
                items: Some(vec![item("Stairs", 2.0, 2_000), item("Rail", 1.0, 500)]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.items.len(), 2);
        assert_eq!(updated.summary.invoice.subtotal_cents, 4_500);
        assert_eq!(updated.summary.invoice.status, InvoiceStatus::Sent);

        let err = InvoiceService::update(
            &db,
            &updated.summary.invoice,
            &UpdateInvoice {
                status: Some(InvoiceStatus::Paid),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, BillingError::Validation(_)));
    }

    #[tokio::test]
    async fn estimate_converts_once_and_is_accepted() {
        let db = DBService::new_in_memory().await.unwrap();
        let customer = seed_customer(&db, "Hale").await;
        let project = seed_project(&db, customer.id, "Deck").await;
        let config = Config {
            default_tax_rate: 5.0,
            ..Config::default()
        };

        let details = EstimateService::create(
            &db,
            &config,
            &CreateEstimate {
                project_id: project.id,
                title: "Deck rebuild".to_string(),
                issue_date: Some("2025-04-01".to_string()),
                valid_until: None,
                tax_rate: None,
                notes: Some(EstimateNotes {
                    scope: "Replace boards".to_string(),
                    ..Default::default()
                }),
                items: vec![item("Boards", 20.0, 1_500), item("Labor", 8.0, 6_000)],
            },
        )
        .await
        .unwrap();
        let estimate = details.estimate;
        assert_eq!(estimate.estimate_number, "EST-0001");
        assert_eq!(estimate.valid_until.as_deref(), Some("2025-05-01"));
        assert_eq!(estimate.total_cents, 78_000 + 3_900);
        assert_eq!(details.sections.scope, "Replace boards");

        let invoice = EstimateService::convert_to_invoice(&db, &config, &estimate).await.unwrap();
        assert_eq!(invoice.items.len(), 2);
        assert_eq!(invoice.summary.invoice.total_cents, estimate.total_cents);
        assert_eq!(invoice.summary.invoice.estimate_id, Some(estimate.id));

        let accepted = Estimate::find_by_id(&db.pool, estimate.id).await.unwrap().unwrap();
        assert_eq!(accepted.status, EstimateStatus::Accepted);

        assert!(matches!(
            EstimateService::convert_to_invoice(&db, &config, &accepted).await.unwrap_err(),
            BillingError::Conflict(_)
        ));
        assert!(matches!(
            EstimateService::delete(&db, &accepted).await.unwrap_err(),
            BillingError::Conflict(_)
        ));

        // billed estimates keep their items, tax and status
        for change in [
            UpdateEstimate {
                items: Some(vec![item("Boards", 1.0, 100)]),
                ..Default::default()
            },
            UpdateEstimate {
                tax_rate: Some(0.0),
                ..Default::default()
            },
            UpdateEstimate {
                status: Some(EstimateStatus::Draft),
                ..Default::default()
            },
        ] {
            assert!(matches!(
                EstimateService::update(&db, &accepted, &change).await.unwrap_err(),
                BillingError::Conflict(_)
            ));
        }
        let renamed = EstimateService::update(
            &db,
            &accepted,
            &UpdateEstimate {
                title: Some("Deck rebuild, phase 1".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(renamed.estimate.title, "Deck rebuild, phase 1");
        assert_eq!(renamed.estimate.total_cents, estimate.total_cents);
    }

    #[tokio::test]
    async fn estimate_without_items_cannot_convert() {
        let db = DBService::new_in_memory().await.unwrap();
        let customer = seed_customer(&db, "Hale").await;
        let project = seed_project(&db, customer.id, "Deck").await;
        let details = EstimateService::create(
            &db,
            &Config::default(),
            &CreateEstimate {
                project_id: project.id,
                title: "Placeholder".to_string(),
                issue_date: None,
                valid_until: None,
                tax_rate: None,
                notes: None,
                items: vec![],
            },
        )
        .await
        .unwrap();

        let err = EstimateService::convert_to_invoice(&db, &Config::default(), &details.estimate)
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::Validation(_)));
    }
}
