//! Scheduled partial payments and their conversion into invoices.

use db::{
    DBService,
    models::{
        Totals,
        estimate::Estimate,
        invoice::{Invoice, InvoiceFields, InvoiceStatus},
        line_item::{DocumentRef, LineItem, LineItemInput},
        pay_term::{CreatePayTerm, PayTerm, PayTermFields, PayTermKind, PayTermStatus, UpdatePayTerm},
        project::Project,
    },
};
use sqlx::AnyConnection;
use thiserror::Error;
use tracing::{debug, info};
use utils::{
    dates::{add_days, format_date, today},
    money::apply_rate,
};

use super::{
    billing::{InvoiceDetails, InvoiceService},
    config::Config,
    validation::{self, ValidationError},
};

#[derive(Debug, Error)]
pub enum PayTermError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("project {0} does not exist")]
    ProjectNotFound(i64),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Billing(#[from] super::billing::BillingError),
}

/// Percentage and amount of a term once resolved against its base.
fn resolve_amount(
    kind: PayTermKind,
    percentage: Option<f64>,
    amount_cents: Option<i64>,
    base_cents: i64,
) -> Result<(Option<f64>, i64), ValidationError> {
    match kind {
        PayTermKind::Percentage => {
            let percentage = percentage
                .ok_or_else(|| ValidationError::invalid("percentage is required for percentage terms"))?;
            let percentage = validation::percentage(percentage)?;
            Ok((Some(percentage), apply_rate(base_cents, percentage)))
        }
        PayTermKind::Fixed => {
            let amount_cents =
                amount_cents.ok_or_else(|| ValidationError::invalid("amount_cents is required for fixed terms"))?;
            if amount_cents <= 0 {
                return Err(ValidationError::invalid("amount_cents must be greater than 0"));
            }
            Ok((None, amount_cents))
        }
    }
}

fn check_totals(percent_total: f64, amount_total: i64, base_cents: i64) -> Result<(), ValidationError> {
    if percent_total > 100.0 + 1e-9 {
        return Err(ValidationError::invalid(format!(
            "pay terms would total {percent_total}% which is more than 100%"
        )));
    }
    if base_cents > 0 && amount_total > base_cents {
        return Err(ValidationError::invalid(format!(
            "pay terms would total {amount_total} cents which is more than the {base_cents} cents available"
        )));
    }
    Ok(())
}

/// The terms drawn from one estimate (or, without one, from one project's
/// budget) may not add up to more than the whole.
fn check_schedule_limits(siblings: &[PayTerm], candidate: &PayTermFields, base_cents: i64) -> Result<(), ValidationError> {
    let percent_total: f64 = siblings
        .iter()
        .filter_map(|term| term.percentage)
        .chain(candidate.percentage)
        .sum();
    let amount_total: i64 = siblings.iter().map(|term| term.amount_cents).sum::<i64>() + candidate.amount_cents;
    check_totals(percent_total, amount_total, base_cents)
}

/// Existing terms still fit inside an estimate whose total is now `total_cents`.
pub fn check_terms_fit(terms: &[PayTerm], total_cents: i64) -> Result<(), ValidationError> {
    let percent_total: f64 = terms.iter().filter_map(|term| term.percentage).sum();
    let amount_total: i64 = terms.iter().map(|term| term.amount_cents).sum();
    check_totals(percent_total, amount_total, total_cents)
}

/// Pending percentage terms of `estimate` re-resolved against its current
/// total. Returns how many changed.
pub async fn recalculate_for_estimate(conn: &mut AnyConnection, estimate: &Estimate) -> Result<u64, sqlx::Error> {
    let mut changed = 0;
    for term in PayTerm::find_by_estimate_id(&mut *conn, estimate.id).await? {
        let Some(percentage) = term.percentage else {
            continue;
        };
        if term.status != PayTermStatus::Pending {
            continue;
        }
        let amount_cents = apply_rate(estimate.total_cents, percentage);
        if amount_cents != term.amount_cents {
            let fields = PayTermFields {
                amount_cents,
                ..PayTermFields::from(&term)
            };
            PayTerm::update(&mut *conn, term.id, &fields).await?;
            changed += 1;
        }
    }
    Ok(changed)
}

pub struct PayTermService;

impl PayTermService {
    async fn base_cents(db: &DBService, project: &Project, estimate_id: Option<i64>) -> Result<i64, PayTermError> {
        match estimate_id {
            Some(estimate_id) => {
                let estimate = Estimate::find_by_id(&db.pool, estimate_id)
                    .await?
                    .filter(|estimate| estimate.project_id == project.id)
                    .ok_or_else(|| {
                        ValidationError::invalid(format!("estimate {estimate_id} does not belong to this project"))
                    })?;
                Ok(estimate.total_cents)
            }
            None => Ok(project.budget_cents),
        }
    }

    async fn siblings(
        db: &DBService,
        project_id: i64,
        estimate_id: Option<i64>,
        exclude: Option<i64>,
    ) -> Result<Vec<PayTerm>, sqlx::Error> {
        Ok(PayTerm::find_by_project_id(&db.pool, project_id)
            .await?
            .into_iter()
            .filter(|term| term.estimate_id == estimate_id && Some(term.id) != exclude)
            .collect())
    }

    /// An estimate billed whole on one invoice has nothing left to schedule.
    async fn ensure_not_billed_whole(conn: &mut AnyConnection, estimate_id: Option<i64>) -> Result<(), PayTermError> {
        let Some(estimate_id) = estimate_id else {
            return Ok(());
        };
        match Invoice::find_whole_for_estimate(&mut *conn, estimate_id).await? {
            Some(invoice) => Err(PayTermError::Conflict(format!(
                "the estimate has already been billed in full on invoice {}",
                invoice.invoice_number
            ))),
            None => Ok(()),
        }
    }

    pub async fn create(db: &DBService, data: &CreatePayTerm) -> Result<PayTerm, PayTermError> {
        let project = Project::find_by_id(&db.pool, data.project_id)
            .await?
            .ok_or(PayTermError::ProjectNotFound(data.project_id))?;
        let base_cents = Self::base_cents(db, &project, data.estimate_id).await?;
        {
            let mut conn = db.pool.acquire().await?;
            Self::ensure_not_billed_whole(&mut conn, data.estimate_id).await?;
        }
        let description = validation::required_text("description", &data.description)?;
        let due_date = validation::optional_date("due_date", data.due_date.as_deref())?;
        let (percentage, amount_cents) = resolve_amount(data.kind, data.percentage, data.amount_cents, base_cents)?;
        let position = match data.position {
            Some(position) => position,
            None => PayTerm::next_position(&db.pool, project.id).await?,
        };

        let fields = PayTermFields {
            project_id: project.id,
            estimate_id: data.estimate_id,
            position,
            description,
            kind: data.kind,
            percentage,
            amount_cents,
            due_date: due_date.map(format_date),
        };
        let siblings = Self::siblings(db, project.id, data.estimate_id, None).await?;
        check_schedule_limits(&siblings, &fields, base_cents)?;

        let term = PayTerm::create(&db.pool, &fields).await?;
        info!(
            pay_term_id = term.id,
            project_id = term.project_id,
            kind = %term.kind,
            amount_cents = term.amount_cents,
            "Created pay term"
        );
        Ok(term)
    }

    pub async fn update(db: &DBService, existing: &PayTerm, data: &UpdatePayTerm) -> Result<PayTerm, PayTermError> {
        if existing.status != PayTermStatus::Pending {
            return Err(PayTermError::Conflict(format!(
                "pay term '{}' has been invoiced and can no longer change",
                existing.description
            )));
        }
        let project = Project::find_by_id(&db.pool, existing.project_id)
            .await?
            .ok_or(PayTermError::ProjectNotFound(existing.project_id))?;
        let base_cents = Self::base_cents(db, &project, existing.estimate_id).await?;

        let kind = data.kind.unwrap_or(existing.kind);
        let (percentage, amount_cents) = resolve_amount(
            kind,
            data.percentage.or(existing.percentage),
            data.amount_cents.or(Some(existing.amount_cents)),
            base_cents,
        )?;
        let due_date =
            validation::optional_date("due_date", data.due_date.as_deref().or(existing.due_date.as_deref()))?;

        let fields = PayTermFields {
            position: data.position.unwrap_or(existing.position),
            description: validation::required_text(
                "description",
                data.description.as_deref().unwrap_or(&existing.description),
            )?,
            kind,
            percentage,
            amount_cents,
            due_date: due_date.map(format_date),
            ..PayTermFields::from(existing)
        };
        let siblings = Self::siblings(db, existing.project_id, existing.estimate_id, Some(existing.id)).await?;
        check_schedule_limits(&siblings, &fields, base_cents)?;

        Ok(PayTerm::update(&db.pool, existing.id, &fields).await?)
    }

    pub async fn delete(db: &DBService, term: &PayTerm) -> Result<(), PayTermError> {
        if term.status != PayTermStatus::Pending {
            return Err(PayTermError::Conflict(format!(
                "pay term '{}' has been invoiced; void or delete the invoice first",
                term.description
            )));
        }
        PayTerm::delete(&db.pool, term.id).await?;
        Ok(())
    }

    /// Bill the term on a new single-line draft invoice.
    ///
    /// `term` may be stale; its state is read again under the invoice write
    /// lock before anything is created.
    pub async fn convert_to_invoice(db: &DBService, config: &Config, term: &PayTerm) -> Result<InvoiceDetails, PayTermError> {
        let project = Project::find_by_id(&db.pool, term.project_id)
            .await?
            .ok_or(PayTermError::ProjectNotFound(term.project_id))?;

        let mut tx = db.pool.begin().await?;
        db.lock_for_write(&mut *tx, "invoices").await?;
        let term = PayTerm::find_by_id(&mut *tx, term.id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        if term.status != PayTermStatus::Pending || term.invoice_id.is_some() {
            return Err(PayTermError::Conflict(format!(
                "pay term '{}' has already been invoiced",
                term.description
            )));
        }
        if term.amount_cents <= 0 {
            return Err(ValidationError::invalid("pay term amount is zero; set an amount or budget first").into());
        }
        Self::ensure_not_billed_whole(&mut *tx, term.estimate_id).await?;

        let issue_date = today();
        let due_date = validation::optional_date("due_date", term.due_date.as_deref())?
            .filter(|due| *due >= issue_date)
            .unwrap_or_else(|| add_days(issue_date, config.invoice_due_days));
        let items = [LineItemInput {
            description: term.description.clone(),
            quantity: 1.0,
            unit_price_cents: term.amount_cents,
        }];
        let fields = InvoiceFields {
            project_id: project.id,
            estimate_id: term.estimate_id,
            title: format!("{}: {}", project.name, term.description),
            status: InvoiceStatus::Draft,
            issue_date: format_date(issue_date),
            due_date: Some(format_date(due_date)),
            tax_rate: 0.0,
            notes: None,
            totals: Totals {
                subtotal_cents: term.amount_cents,
                tax_cents: 0,
                total_cents: term.amount_cents,
            },
        };

        let number = Invoice::next_number(&mut *tx).await?;
        let invoice = Invoice::create(&mut *tx, &number, &fields).await?;
        LineItem::replace_for_document(&mut *tx, DocumentRef::Invoice(invoice.id), &items).await?;
        if PayTerm::mark_invoiced(&mut *tx, term.id, invoice.id).await? == 0 {
            return Err(PayTermError::Conflict(format!(
                "pay term '{}' has already been invoiced",
                term.description
            )));
        }
        tx.commit().await?;

        info!(
            pay_term_id = term.id,
            invoice_id = invoice.id,
            number = %invoice.invoice_number,
            amount_cents = invoice.total_cents,
            "Converted pay term to invoice"
        );
        debug!(project_id = project.id, due_date = ?invoice.due_date, "Pay term invoice due");
        Ok(InvoiceService::details(db, &invoice).await?)
    }
}

#[cfg(test)]
mod tests {
    use db::models::{
        estimate::{CreateEstimate, UpdateEstimate},
        payment::CreatePayment,
    };

    use super::*;
    use crate::services::{
        billing::{BillingError, EstimateService},
        test_support::{item, seed_customer, seed_project},
    };

    async fn seed_estimate(db: &DBService, project_id: i64) -> Estimate {
        EstimateService::create(
            db,
            &Config::default(),
            &CreateEstimate {
                project_id,
                title: "Deck".to_string(),
                issue_date: None,
                valid_until: None,
                tax_rate: Some(0.0),
                notes: None,
                items: vec![item("Deck", 1.0, 200_000)],
            },
        )
        .await
        .unwrap()
        .estimate
    }

    fn percentage_term(project_id: i64, estimate_id: Option<i64>, percentage: f64) -> CreatePayTerm {
        CreatePayTerm {
            project_id,
            estimate_id,
            description: format!("{percentage}% draw"),
            kind: PayTermKind::Percentage,
            percentage: Some(percentage),
            amount_cents: None,
            due_date: None,
            position: None,
        }
    }

    fn fixed_term(project_id: i64, estimate_id: Option<i64>, amount_cents: i64) -> CreatePayTerm {
        CreatePayTerm {
            project_id,
            estimate_id,
            description: "Fixed draw".to_string(),
            kind: PayTermKind::Fixed,
            percentage: None,
            amount_cents: Some(amount_cents),
            due_date: None,
            position: None,
        }
    }

    #[test]
    fn fixed_terms_need_a_positive_amount() {
        assert_eq!(resolve_amount(PayTermKind::Fixed, None, Some(5_000), 0).unwrap(), (None, 5_000));
        assert!(resolve_amount(PayTermKind::Fixed, None, Some(0), 0).is_err());
        assert!(resolve_amount(PayTermKind::Fixed, None, None, 0).is_err());
        assert_eq!(
            resolve_amount(PayTermKind::Percentage, Some(33.0), None, 10_000).unwrap(),
            (Some(33.0), 3_300)
        );
    }

    #[tokio::test]
    async fn percentage_terms_resolve_against_estimate_and_cap_at_100() {
        let db = DBService::new_in_memory().await.unwrap();
        let customer = seed_customer(&db, "Hale").await;
        let project = seed_project(&db, customer.id, "Deck").await;
        let estimate = seed_estimate(&db, project.id).await;

        let deposit = PayTermService::create(&db, &percentage_term(project.id, Some(estimate.id), 30.0))
            .await
            .unwrap();
        assert_eq!(deposit.amount_cents, 60_000);
        assert_eq!(deposit.position, 1);
        PayTermService::create(&db, &percentage_term(project.id, Some(estimate.id), 60.0))
            .await
            .unwrap();

        let err = PayTermService::create(&db, &percentage_term(project.id, Some(estimate.id), 20.0))
            .await
            .unwrap_err();
        assert!(matches!(err, PayTermError::Validation(_)));

        // without an estimate the project budget is the base
        let budget_term = PayTermService::create(&db, &percentage_term(project.id, None, 10.0))
            .await
            .unwrap();
        assert_eq!(budget_term.amount_cents, 100_000);
    }

    #[tokio::test]
    async fn fixed_terms_cap_at_estimate_total_and_budget() {
        let db = DBService::new_in_memory().await.unwrap();
        let customer = seed_customer(&db, "Hale").await;
        let project = seed_project(&db, customer.id, "Deck").await;
        let estimate = seed_estimate(&db, project.id).await;

        PayTermService::create(&db, &fixed_term(project.id, Some(estimate.id), 150_000))
            .await
            .unwrap();
        let err = PayTermService::create(&db, &fixed_term(project.id, Some(estimate.id), 60_000))
            .await
            .unwrap_err();
        assert!(matches!(err, PayTermError::Validation(_)));
        PayTermService::create(&db, &fixed_term(project.id, Some(estimate.id), 50_000))
            .await
            .unwrap();

        // budget of the seeded project is 1_000_000
        let err = PayTermService::create(&db, &fixed_term(project.id, None, 1_000_001))
            .await
            .unwrap_err();
        assert!(matches!(err, PayTermError::Validation(_)));
    }

    #[tokio::test]
    async fn estimate_total_cannot_drop_below_its_terms() {
        let db = DBService::new_in_memory().await.unwrap();
        let customer = seed_customer(&db, "Hale").await;
        let project = seed_project(&db, customer.id, "Deck").await;
        let estimate = seed_estimate(&db, project.id).await;
        let term = PayTermService::create(&db, &fixed_term(project.id, Some(estimate.id), 180_000))
            .await
            .unwrap();

        let err = EstimateService::update(
            &db,
            &estimate,
            &UpdateEstimate {
                items: Some(vec![item("Deck", 1.0, 100_000)]),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, BillingError::Validation(_)));

        let stored = Estimate::find_by_id(&db.pool, estimate.id).await.unwrap().unwrap();
        assert_eq!(stored.total_cents, 200_000);
        let items = LineItem::find_for_document(&db.pool, DocumentRef::Estimate(estimate.id))
            .await
            .unwrap();
        assert_eq!(items[0].unit_price_cents, 200_000);
        let term = PayTerm::find_by_id(&db.pool, term.id).await.unwrap().unwrap();
        assert_eq!(term.amount_cents, 180_000);
    }

    #[tokio::test]
    async fn estimate_billed_whole_has_no_schedule_left() {
        let db = DBService::new_in_memory().await.unwrap();
        let customer = seed_customer(&db, "Hale").await;
        let project = seed_project(&db, customer.id, "Deck").await;
        let estimate = seed_estimate(&db, project.id).await;
        let config = Config::default();
        let term = PayTermService::create(&db, &percentage_term(project.id, Some(estimate.id), 50.0))
            .await
            .unwrap();

        let whole = EstimateService::convert_to_invoice(&db, &config, &estimate)
            .await
            .unwrap()
            .summary
            .invoice;
        assert_eq!(whole.total_cents, 200_000);

        assert!(matches!(
            PayTermService::convert_to_invoice(&db, &config, &term).await.unwrap_err(),
            PayTermError::Conflict(_)
        ));
        assert!(matches!(
            PayTermService::create(&db, &percentage_term(project.id, Some(estimate.id), 10.0))
                .await
                .unwrap_err(),
            PayTermError::Conflict(_)
        ));
        let billed: i64 = Invoice::find_by_project_id(&db.pool, project.id)
            .await
            .unwrap()
            .iter()
            .map(|invoice| invoice.total_cents)
            .sum();
        assert_eq!(billed, 200_000);

        // voiding the whole-estimate invoice opens the schedule again
        InvoiceService::void(&db, &whole).await.unwrap();
        let partial = PayTermService::convert_to_invoice(&db, &config, &term).await.unwrap();
        assert_eq!(partial.summary.invoice.total_cents, 100_000);
    }

    #[tokio::test]
    async fn estimate_with_invoiced_term_cannot_be_billed_whole_or_repriced() {
        let db = DBService::new_in_memory().await.unwrap();
        let customer = seed_customer(&db, "Hale").await;
        let project = seed_project(&db, customer.id, "Deck").await;
        let estimate = seed_estimate(&db, project.id).await;
        let config = Config::default();
        let term = PayTermService::create(&db, &percentage_term(project.id, Some(estimate.id), 40.0))
            .await
            .unwrap();
        PayTermService::convert_to_invoice(&db, &config, &term).await.unwrap();

        assert!(matches!(
            EstimateService::convert_to_invoice(&db, &config, &estimate).await.unwrap_err(),
            BillingError::Conflict(_)
        ));
        assert!(matches!(
            EstimateService::update(
                &db,
                &estimate,
                &UpdateEstimate {
                    items: Some(vec![item("Deck", 1.0, 50_000)]),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err(),
            BillingError::Conflict(_)
        ));
        // a second conversion from the same stale copy is refused
        assert!(matches!(
            PayTermService::convert_to_invoice(&db, &config, &term).await.unwrap_err(),
            PayTermError::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn estimate_changes_flow_into_pending_terms() {
        let db = DBService::new_in_memory().await.unwrap();
        let customer = seed_customer(&db, "Hale").await;
        let project = seed_project(&db, customer.id, "Deck").await;
        let estimate = seed_estimate(&db, project.id).await;
        let term = PayTermService::create(&db, &percentage_term(project.id, Some(estimate.id), 50.0))
            .await
            .unwrap();

        EstimateService::update(
            &db,
            &estimate,
            &UpdateEstimate {
                items: Some(vec![item("Deck", 1.0, 300_000)]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let term = PayTerm::find_by_id(&db.pool, term.id).await.unwrap().unwrap();
        assert_eq!(term.amount_cents, 150_000);
    }

    #[tokio::test]
    async fn conversion_bills_once_and_tracks_payment() {
        let db = DBService::new_in_memory().await.unwrap();
        let customer = seed_customer(&db, "Hale").await;
        let project = seed_project(&db, customer.id, "Deck").await;
        let estimate = seed_estimate(&db, project.id).await;
        let term = PayTermService::create(&db, &percentage_term(project.id, Some(estimate.id), 25.0))
            .await
            .unwrap();

        let config = Config::default();
        let invoice = PayTermService::convert_to_invoice(&db, &config, &term).await.unwrap();
        let invoice = invoice.summary.invoice;
        assert_eq!(invoice.title, "Deck: 25% draw");
        assert_eq!(invoice.total_cents, 50_000);
        assert_eq!(invoice.estimate_id, Some(estimate.id));

        let term = PayTerm::find_by_id(&db.pool, term.id).await.unwrap().unwrap();
        assert_eq!(term.status, PayTermStatus::Invoiced);
        assert_eq!(term.invoice_id, Some(invoice.id));
        assert!(matches!(
            PayTermService::convert_to_invoice(&db, &config, &term).await.unwrap_err(),
            PayTermError::Conflict(_)
        ));
        assert!(matches!(
            PayTermService::delete(&db, &term).await.unwrap_err(),
            PayTermError::Conflict(_)
        ));

        InvoiceService::record_payment(
            &db,
            &invoice,
            &CreatePayment {
                amount_cents: 50_000,
                paid_on: None,
                method: None,
                reference: None,
                notes: None,
            },
        )
        .await
        .unwrap();
        let term = PayTerm::find_by_id(&db.pool, term.id).await.unwrap().unwrap();
        assert_eq!(term.status, PayTermStatus::Paid);
    }

    #[tokio::test]
    async fn voiding_the_invoice_frees_the_term() {
        let db = DBService::new_in_memory().await.unwrap();
        let customer = seed_customer(&db, "Hale").await;
        let project = seed_project(&db, customer.id, "Deck").await;
        let term = PayTermService::create(
            &db,
            &CreatePayTerm {
                project_id: project.id,
                estimate_id: None,
                description: "Mobilization".to_string(),
                kind: PayTermKind::Fixed,
                percentage: None,
                amount_cents: Some(75_000),
                due_date: Some("2020-01-01".to_string()),
                position: None,
            },
        )
        .await
        .unwrap();

        let invoice = PayTermService::convert_to_invoice(&db, &Config::default(), &term)
            .await
            .unwrap()
            .summary
            .invoice;
        // a past due date falls back to the configured terms
        assert!(invoice.due_date.as_deref() > Some(invoice.issue_date.as_str()));

        InvoiceService::void(&db, &invoice).await.unwrap();
        let term = PayTerm::find_by_id(&db.pool, term.id).await.unwrap().unwrap();
        assert_eq!(term.status, PayTermStatus::Pending);
        assert!(term.invoice_id.is_none());
    }
}
