pub mod billing;
pub mod config;
pub mod contracts;
pub mod customer;
pub mod dashboard;
pub mod database_validator;
pub mod documents;
pub mod estimate_notes;
pub mod invoice_overdue;
pub mod pay_terms;
pub mod priority;
pub mod project;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;
