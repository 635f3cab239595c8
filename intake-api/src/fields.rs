//! Field classification.
//!
//! List-typed fields are an explicit allow-list; everything else defaults
//! to scalar, except a small set of passthrough fields that are stored as
//! raw values without reconciliation.

/// Fields whose value is an ordered list of details.
const LIST_FIELDS: &[&str] = &[
    "contacts",
    "previous_addresses",
    "documents",
    "general.vehicles",
    "general-vehicles",
    "employment_income.income_employment_details",
    "employment_income-income_employment_details",
    "insurance_policies.insurance_policies_details",
    "insurance_policies-insurance_policies_details",
    "general.properties",
    "general-properties",
    "general.property_proceeds",
    "general-property_proceeds",
    "financials.account_details",
    "financials-account_details",
    "financials.life_insurance_stocks_details",
    "financials-life_insurance_stocks_details",
];

/// Fields written as-is, with no identity wrapping.
const RAW_FIELDS: &[&str] = &["submitted_date"];

/// The one list field managed through file upload rather than resubmission.
pub const DOCUMENTS_FIELD: &str = "documents";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldClass {
    Scalar,
    List,
    Raw,
}

pub fn classify(field: &str) -> FieldClass {
    if RAW_FIELDS.contains(&field) {
        FieldClass::Raw
    } else if LIST_FIELDS.contains(&field) {
        FieldClass::List
    } else {
        FieldClass::Scalar
    }
}
