pub mod contract;
pub mod customer;
pub mod dashboard;
pub mod estimate;
pub mod invoice;
pub mod line_item;
pub mod pay_term;
pub mod payment;
pub mod project;

/// Enums are stored as their strum text form; this lets `FromRow` decode them
/// with `#[sqlx(try_from = "String")]`.
macro_rules! text_column_enum {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl TryFrom<String> for $ty {
                type Error = strum::ParseError;

                fn try_from(value: String) -> Result<Self, Self::Error> {
                    value.parse()
                }
            }
        )+
    };
}

text_column_enum!(
    project::ProjectStatus,
    estimate::EstimateStatus,
    invoice::InvoiceStatus,
    payment::PaymentMethod,
    pay_term::PayTermKind,
    pay_term::PayTermStatus,
    contract::ContractStatus,
);

/// Subtotal, tax and total of an estimate or invoice, in cents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize, ts_rs::TS)]
pub struct Totals {
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}
