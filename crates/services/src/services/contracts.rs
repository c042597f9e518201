use std::collections::HashMap;

use base64::{Engine, engine::general_purpose::STANDARD};
use db::{
    DBService,
    models::{
        contract::{Contract, ContractStatus, CreateContract, SignContract, UpdateContract},
        customer::Customer,
        estimate::Estimate,
        pay_term::{PayTerm, PayTermKind},
        project::Project,
    },
};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use thiserror::Error;
use tracing::info;
use utils::{
    dates::{long_date, now_timestamp, parse_date, today},
    money::format_cents,
};

use super::{
    config::Config,
    estimate_notes,
    validation::{self, ValidationError},
};

pub const SIGNATURE_PREFIX: &str = "data:image/png;base64,";
const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G'];

pub const DEFAULT_TEMPLATE: &str = r#"CONSTRUCTION AGREEMENT

This agreement is made on {{ contract_date }} between {{ company_name }} ("Contractor"), {{ company_address }}, license {{ company_license }}, and {{ customer_name }} ("Owner"), {{ customer_address }}.

1. PROJECT
The Contractor will perform the work for "{{ project_name }}" at {{ site_address }}.
{{ project_description }}

2. SCHEDULE
Work is expected to begin on {{ start_date }} and be substantially complete by {{ due_date }}.

3. SCOPE OF WORK
Per estimate {{ estimate_number }}:
{{ scope }}

4. EXCLUSIONS
{{ exclusions }}

5. CONTRACT PRICE
The Owner agrees to pay {{ contract_total }} for the work described above.

6. PAYMENT SCHEDULE
{{ pay_schedule }}

7. ADDITIONAL TERMS
{{ terms }}

Changes to the scope of work must be agreed in writing by both parties.

Contractor: {{ company_name }}   Phone: {{ company_phone }}   Email: {{ company_email }}
"#;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").expect("placeholder pattern"));

#[derive(Debug, Error)]
pub enum ContractError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("project {0} does not exist")]
    ProjectNotFound(i64),
    #[error("{0}")]
    Conflict(String),
}

/// Replace `{{ key }}` placeholders with values from `values`. Unknown keys
/// are left exactly as written.
pub fn render_template(template: &str, values: &HashMap<&str, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| match values.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Check a signature-pad capture: a PNG data URL whose payload decodes.
pub fn validate_signature(signature: &str) -> Result<(), ValidationError> {
    let payload = signature
        .trim()
        .strip_prefix(SIGNATURE_PREFIX)
        .ok_or_else(|| ValidationError::invalid("signature must be a PNG data URL"))?;
    let bytes = STANDARD
        .decode(payload)
        .map_err(|_| ValidationError::invalid("signature is not valid base64"))?;
    if !bytes.starts_with(PNG_MAGIC) {
        return Err(ValidationError::invalid("signature is not a PNG image"));
    }
    Ok(())
}

fn display_date(value: Option<&str>) -> String {
    value
        .and_then(|raw| parse_date("date", raw).ok())
        .map(long_date)
        .unwrap_or_else(|| "a date to be agreed".to_string())
}

fn or_blank(value: &Option<String>, fallback: &str) -> String {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

fn pay_schedule(terms: &[PayTerm]) -> String {
    if terms.is_empty() {
        return "Payment is due in full upon completion.".to_string();
    }
    terms
        .iter()
        .enumerate()
        .map(|(index, term)| {
            let share = match (term.kind, term.percentage) {
                (PayTermKind::Percentage, Some(pct)) => format!(" ({pct}%)"),
                _ => String::new(),
            };
            let due = term
                .due_date
                .as_deref()
                .map(|due| format!(", due {}", display_date(Some(due))))
                .unwrap_or_default();
            format!(
                "{}. {}: {}{share}{due}",
                index + 1,
                term.description,
                format_cents(term.amount_cents)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct ContractService;

impl ContractService {
    /// Contract text for `project`, filled from the configured template (or
    /// the built-in one) with company, customer, estimate and pay schedule.
    pub async fn generate(
        db: &DBService,
        config: &Config,
        project: &Project,
        estimate: Option<&Estimate>,
    ) -> Result<String, ContractError> {
        let customer = Customer::find_by_id(&db.pool, project.customer_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        let terms = match estimate {
            Some(estimate) => PayTerm::find_by_estimate_id(&db.pool, estimate.id).await?,
            None => PayTerm::find_by_project_id(&db.pool, project.id)
                .await?
                .into_iter()
                .filter(|term| term.estimate_id.is_none())
                .collect(),
        };
        let sections = estimate_notes::parse(estimate.and_then(|e| e.notes.as_deref()));
        let company = &config.company;
        let contract_total = estimate.map(|e| e.total_cents).unwrap_or(project.budget_cents);

        let values: HashMap<&str, String> = HashMap::from([
            ("contract_date", long_date(today())),
            ("company_name", company.name.clone()),
            ("company_address", or_blank(&company.address, "address on file")),
            ("company_phone", or_blank(&company.phone, "-")),
            ("company_email", or_blank(&company.email, "-")),
            ("company_license", or_blank(&company.license_number, "on file")),
            ("customer_name", customer.name.clone()),
            ("customer_address", or_blank(&customer.address, "address on file")),
            ("customer_email", or_blank(&customer.email, "-")),
            ("project_name", project.name.clone()),
            ("site_address", or_blank(&project.site_address, "the site agreed with the Owner")),
            ("project_description", or_blank(&project.description, "")),
            ("start_date", display_date(project.start_date.as_deref())),
            ("due_date", display_date(project.due_date.as_deref())),
            (
                "estimate_number",
                estimate.map(|e| e.estimate_number.clone()).unwrap_or_else(|| "(none)".to_string()),
            ),
            ("contract_total", format_cents(contract_total)),
            ("scope", or_blank(&Some(sections.scope), "As described in the estimate line items.")),
            ("exclusions", or_blank(&Some(sections.exclusions), "None.")),
            ("terms", or_blank(&Some(sections.terms), "None.")),
            ("pay_schedule", pay_schedule(&terms)),
        ]);

        let template = config
            .contract_template
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(DEFAULT_TEMPLATE);
        Ok(render_template(template, &values))
    }

    async fn load_sources(
        db: &DBService,
        project_id: i64,
        estimate_id: Option<i64>,
    ) -> Result<(Project, Option<Estimate>), ContractError> {
        let project = Project::find_by_id(&db.pool, project_id)
            .await?
            .ok_or(ContractError::ProjectNotFound(project_id))?;
        let estimate = match estimate_id {
            Some(estimate_id) => Some(
                Estimate::find_by_id(&db.pool, estimate_id)
                    .await?
                    .filter(|e| e.project_id == project.id)
                    .ok_or_else(|| {
                        ValidationError::invalid(format!("estimate {estimate_id} does not belong to this project"))
                    })?,
            ),
            None => None,
        };
        Ok((project, estimate))
    }

    /// Generated text for a contract that has not been saved yet.
    pub async fn preview(
        db: &DBService,
        config: &Config,
        project_id: i64,
        estimate_id: Option<i64>,
    ) -> Result<String, ContractError> {
        let (project, estimate) = Self::load_sources(db, project_id, estimate_id).await?;
        Self::generate(db, config, &project, estimate.as_ref()).await
    }

    pub async fn create(db: &DBService, config: &Config, data: &CreateContract) -> Result<Contract, ContractError> {
        let (project, estimate) = Self::load_sources(db, data.project_id, data.estimate_id).await?;

        let title = match validation::optional_text(data.title.clone()) {
            Some(title) => title,
            None => format!("Construction Agreement: {}", project.name),
        };
        let body = match validation::optional_text(data.body.clone()) {
            Some(body) => body,
            None => Self::generate(db, config, &project, estimate.as_ref()).await?,
        };

        let contract = Contract::create(&db.pool, project.id, data.estimate_id, &title, &body).await?;
        info!(contract_id = contract.id, project_id = project.id, "Created contract");
        Ok(contract)
    }

    pub async fn update(db: &DBService, existing: &Contract, data: &UpdateContract) -> Result<Contract, ContractError> {
        match existing.status {
            ContractStatus::Signed => return Err(ContractError::Conflict("signed contracts cannot be changed".to_string())),
            ContractStatus::Void => return Err(ContractError::Conflict("void contracts cannot be changed".to_string())),
            ContractStatus::Draft | ContractStatus::Sent => {}
        }
        let status = match data.status {
            Some(ContractStatus::Signed) => {
                return Err(ValidationError::invalid("contracts are signed through the signature endpoint").into());
            }
            Some(status) => status,
            None => existing.status,
        };
        let title = validation::required_text("title", data.title.as_deref().unwrap_or(&existing.title))?;
        let body = validation::required_text("body", data.body.as_deref().unwrap_or(&existing.body))?;

        Ok(Contract::update(&db.pool, existing.id, &title, &body, status).await?)
    }

    pub async fn sign(db: &DBService, existing: &Contract, data: &SignContract) -> Result<Contract, ContractError> {
        match existing.status {
            ContractStatus::Signed => return Err(ContractError::Conflict("contract is already signed".to_string())),
            ContractStatus::Void => return Err(ContractError::Conflict("void contracts cannot be signed".to_string())),
            ContractStatus::Draft | ContractStatus::Sent => {}
        }
        let signer_name = validation::required_text("signer_name", &data.signer_name)?;
        validate_signature(&data.signature)?;

        let contract = Contract::sign(&db.pool, existing.id, &signer_name, data.signature.trim(), &now_timestamp())
            .await?
            .ok_or_else(|| ContractError::Conflict("contract is no longer open for signing".to_string()))?;
        info!(contract_id = contract.id, signer = %signer_name, "Contract signed");
        Ok(contract)
    }

    pub async fn delete(db: &DBService, contract: &Contract) -> Result<(), ContractError> {
        if contract.status == ContractStatus::Signed {
            return Err(ContractError::Conflict("signed contracts cannot be deleted".to_string()));
        }
        Contract::delete(&db.pool, contract.id).await?;
        Ok(())
    }
}
