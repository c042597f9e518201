//! Printable HTML documents and e-mail drafts for estimates, invoices and
//! contracts. The browser prints (or saves as PDF) the HTML and opens the
//! `mailto:` link; nothing is sent from the server.

use std::fmt::Write;

use db::{
    DBService,
    models::{
        Totals,
        contract::{Contract, ContractStatus},
        customer::Customer,
        estimate::Estimate,
        invoice::Invoice,
        line_item::LineItem,
        project::Project,
    },
};
use html_escape::{encode_double_quoted_attribute, encode_text};
use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;
use utils::{
    dates::{long_date, parse_date},
    money::format_cents,
};

use super::{
    billing::{BillingError, EstimateService, InvoiceService},
    config::{CompanyProfile, Config},
};

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Billing(#[from] BillingError),
}

#[derive(Debug, Clone, Serialize, TS, PartialEq)]
pub struct EmailDraft {
    pub to: Option<String>,
    pub subject: String,
    pub body: String,
    pub mailto: String,
}

/// Percent-encode both halves of an address, leaving the `@` readable.
fn encode_recipient(to: &str) -> String {
    match to.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", urlencoding::encode(local), urlencoding::encode(domain)),
        None => urlencoding::encode(to).into_owned(),
    }
}

impl EmailDraft {
    pub fn new(to: Option<String>, subject: String, body: String) -> Self {
        let mailto = format!(
            "mailto:{}?subject={}&body={}",
            to.as_deref().map(encode_recipient).unwrap_or_default(),
            urlencoding::encode(&subject),
            urlencoding::encode(&body)
        );
        Self {
            to,
            subject,
            body,
            mailto,
        }
    }
}

const STYLE: &str = r#"body{font-family:Helvetica,Arial,sans-serif;color:#222;margin:40px;}
header{display:flex;justify-content:space-between;border-bottom:2px solid #333;padding-bottom:12px;margin-bottom:24px;}
h1{margin:0;font-size:22px;}
table{width:100%;border-collapse:collapse;margin:16px 0;}
th,td{padding:6px 8px;border-bottom:1px solid #ddd;text-align:left;}
td.num,th.num{text-align:right;}
.totals td{border:none;}
.muted{color:#666;font-size:13px;}
section{margin-top:20px;white-space:pre-wrap;}
.signature img{max-height:80px;}
@media print{body{margin:0;}}"#;

fn esc(value: &str) -> String {
    encode_text(value).into_owned()
}

fn display_date(raw: &str) -> String {
    parse_date("date", raw).map(long_date).unwrap_or_else(|_| raw.to_string())
}

fn page(title: &str, company: &CompanyProfile, body: &str) -> String {
    let mut contact = Vec::new();
    for line in [&company.address, &company.phone, &company.email].into_iter().flatten() {
        contact.push(esc(line));
    }
    if let Some(license) = &company.license_number {
        contact.push(format!("License {}", esc(license)));
    }
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title><style>{STYLE}</style></head>\n<body>\n<header><div><h1>{company}</h1><div class=\"muted\">{contact}</div></div><div><h1>{title}</h1></div></header>\n{body}\n</body></html>\n",
        title = esc(title),
        company = esc(&company.name),
        contact = contact.join("<br>"),
    )
}

fn bill_to(customer: &Customer, project: &Project) -> String {
    let mut out = format!("<p><strong>{}</strong>", esc(&customer.name));
    for line in [&customer.address, &customer.email, &customer.phone].into_iter().flatten() {
        let _ = write!(out, "<br>{}", esc(line));
    }
    let _ = write!(out, "</p><p class=\"muted\">Project: {}", esc(&project.name));
    if let Some(site) = &project.site_address {
        let _ = write!(out, "<br>Site: {}", esc(site));
    }
    out.push_str("</p>");
    out
}

fn items_table(items: &[LineItem], totals: Totals, tax_rate: f64) -> String {
    let mut out = String::from(
        "<table><thead><tr><th>Description</th><th class=\"num\">Qty</th><th class=\"num\">Unit price</th><th class=\"num\">Amount</th></tr></thead><tbody>",
    );
    for item in items {
        let _ = write!(
            out,
            "<tr><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td></tr>",
            esc(&item.description),
            item.quantity,
            format_cents(item.unit_price_cents),
            format_cents(item.amount_cents)
        );
    }
    let _ = write!(
        out,
        "</tbody></table><table class=\"totals\"><tr><td class=\"num\">Subtotal</td><td class=\"num\">{}</td></tr><tr><td class=\"num\">Tax ({tax_rate}%)</td><td class=\"num\">{}</td></tr><tr><td class=\"num\"><strong>Total</strong></td><td class=\"num\"><strong>{}</strong></td></tr></table>",
        format_cents(totals.subtotal_cents),
        format_cents(totals.tax_cents),
        format_cents(totals.total_cents)
    );
    out
}

fn text_section(title: &str, text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }
    format!("<section><h3>{}</h3>{}</section>", esc(title), esc(text.trim()))
}

fn greeting(customer: &Customer) -> String {
    format!("Hello {},", customer.name)
}

fn sign_off(company: &CompanyProfile) -> String {
    let mut out = format!("Thank you,\n{}", company.name);
    if let Some(phone) = &company.phone {
        let _ = write!(out, "\n{phone}");
    }
    out
}

pub struct DocumentService;

impl DocumentService {
    async fn parties(db: &DBService, project_id: i64) -> Result<(Project, Customer), DocumentError> {
        let project = Project::find_by_id(&db.pool, project_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        let customer = Customer::find_by_id(&db.pool, project.customer_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        Ok((project, customer))
    }

    pub async fn estimate_html(db: &DBService, config: &Config, estimate: &Estimate) -> Result<String, DocumentError> {
        let (project, customer) = Self::parties(db, estimate.project_id).await?;
        let details = EstimateService::details(db, estimate).await?;

        let mut body = bill_to(&customer, &project);
        let _ = write!(
            body,
            "<p><strong>{}</strong><br>Estimate {} &middot; issued {}",
            esc(&estimate.title),
            esc(&estimate.estimate_number),
            display_date(&estimate.issue_date)
        );
        if let Some(valid_until) = &estimate.valid_until {
            let _ = write!(body, " &middot; valid until {}", display_date(valid_until));
        }
        body.push_str("</p>");
        body.push_str(&text_section("", &details.sections.general));
        body.push_str(&text_section("Scope of work", &details.sections.scope));
        body.push_str(&items_table(&details.items, estimate.totals(), estimate.tax_rate));
        body.push_str(&text_section("Exclusions", &details.sections.exclusions));
        body.push_str(&text_section("Terms", &details.sections.terms));
        if !details.pay_terms.is_empty() {
            body.push_str("<section><h3>Payment schedule</h3><table>");
            for term in &details.pay_terms {
                let _ = write!(
                    body,
                    "<tr><td>{}</td><td>{}</td><td class=\"num\">{}</td></tr>",
                    esc(&term.description),
                    term.due_date.as_deref().map(display_date).unwrap_or_default(),
                    format_cents(term.amount_cents)
                );
            }
            body.push_str("</table></section>");
        }

        Ok(page(&format!("Estimate {}", estimate.estimate_number), &config.company, &body))
    }

    pub async fn invoice_html(db: &DBService, config: &Config, invoice: &Invoice) -> Result<String, DocumentError> {
        let (project, customer) = Self::parties(db, invoice.project_id).await?;
        let details = InvoiceService::details(db, invoice).await?;

        let mut body = bill_to(&customer, &project);
        let _ = write!(
            body,
            "<p><strong>{}</strong><br>Invoice {} &middot; issued {}",
            esc(&invoice.title),
            esc(&invoice.invoice_number),
            display_date(&invoice.issue_date)
        );
        if let Some(due_date) = &invoice.due_date {
            let _ = write!(body, " &middot; due {}", display_date(due_date));
        }
        let _ = write!(body, " &middot; status {}</p>", invoice.status);
        body.push_str(&items_table(&details.items, invoice.totals(), invoice.tax_rate));

        if !details.payments.is_empty() {
            body.push_str("<section><h3>Payments received</h3><table>");
            for payment in &details.payments {
                let _ = write!(
                    body,
                    "<tr><td>{}</td><td>{}</td><td>{}</td><td class=\"num\">{}</td></tr>",
                    display_date(&payment.paid_on),
                    payment.method,
                    esc(payment.reference.as_deref().unwrap_or_default()),
                    format_cents(payment.amount_cents)
                );
            }
            body.push_str("</table></section>");
        }
        let _ = write!(
            body,
            "<p><strong>Balance due: {}</strong></p>",
            format_cents(details.summary.balance_cents)
        );
        if let Some(notes) = &invoice.notes {
            body.push_str(&text_section("Notes", notes));
        }

        Ok(page(&format!("Invoice {}", invoice.invoice_number), &config.company, &body))
    }

    pub async fn contract_html(db: &DBService, config: &Config, contract: &Contract) -> Result<String, DocumentError> {
        let (project, customer) = Self::parties(db, contract.project_id).await?;

        let mut body = bill_to(&customer, &project);
        let _ = write!(body, "<section>{}</section>", esc(&contract.body));
        body.push_str("<section class=\"signature\"><h3>Owner acceptance</h3>");
        match (contract.status, &contract.signature) {
            (ContractStatus::Signed, Some(signature)) => {
                let _ = write!(
                    body,
                    "<img src=\"{}\" alt=\"Signature\"><p>{} &middot; signed {}</p>",
                    encode_double_quoted_attribute(signature),
                    esc(contract.signer_name.as_deref().unwrap_or_default()),
                    esc(contract.signed_at.as_deref().unwrap_or_default())
                );
            }
            _ => body.push_str("<p>Signature: ______________________________ Date: ______________</p>"),
        }
        body.push_str("</section>");

        Ok(page(&contract.title, &config.company, &body))
    }

    pub async fn estimate_email(db: &DBService, config: &Config, estimate: &Estimate) -> Result<EmailDraft, DocumentError> {
        let (project, customer) = Self::parties(db, estimate.project_id).await?;
        let subject = format!(
            "Estimate {} for {} from {}",
            estimate.estimate_number, project.name, config.company.name
        );
        let mut body = format!(
            "{}\n\nPlease find our estimate {} for \"{}\" totaling {}.",
            greeting(&customer),
            estimate.estimate_number,
            estimate.title,
            format_cents(estimate.total_cents)
        );
        if let Some(valid_until) = &estimate.valid_until {
            let _ = write!(body, " The pricing is valid until {}.", display_date(valid_until));
        }
        let _ = write!(body, "\n\nLet us know if you have any questions.\n\n{}", sign_off(&config.company));
        Ok(EmailDraft::new(customer.email.clone(), subject, body))
    }

    pub async fn invoice_email(db: &DBService, config: &Config, invoice: &Invoice) -> Result<EmailDraft, DocumentError> {
        let (project, customer) = Self::parties(db, invoice.project_id).await?;
        let paid = Invoice::amount_paid(&db.pool, invoice.id).await?;
        let subject = format!(
            "Invoice {} for {} from {}",
            invoice.invoice_number, project.name, config.company.name
        );
        let mut body = format!(
            "{}\n\nPlease find invoice {} for \"{}\". Balance due: {}",
            greeting(&customer),
            invoice.invoice_number,
            invoice.title,
            format_cents(invoice.total_cents - paid)
        );
        match &invoice.due_date {
            Some(due_date) => {
                let _ = write!(body, ", payable by {}.", display_date(due_date));
            }
            None => body.push('.'),
        }
        let _ = write!(body, "\n\n{}", sign_off(&config.company));
        Ok(EmailDraft::new(customer.email.clone(), subject, body))
    }

    pub async fn contract_email(db: &DBService, config: &Config, contract: &Contract) -> Result<EmailDraft, DocumentError> {
        let (project, customer) = Self::parties(db, contract.project_id).await?;
        let subject = format!("{} ({})", contract.title, project.name);
        let action = if contract.status == ContractStatus::Signed {
            "Attached is your signed copy of"
        } else {
            "Please review and sign"
        };
        let body = format!(
            "{}\n\n{action} \"{}\" for {}.\n\n{}",
            greeting(&customer),
            contract.title,
            project.name,
            sign_off(&config.company)
        );
        Ok(EmailDraft::new(customer.email.clone(), subject, body))
    }
}
