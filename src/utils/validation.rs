//! Input validation utilities

use once_cell::sync::Lazy;
use regex::Regex;

/// Regex for validating KPI names
static KPI_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9._-]*$").unwrap());

/// Regex for validating tenant identifiers
static TENANT_ID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9._-]*$").unwrap());

/// Validate a KPI name
///
/// KPI names are dot-separated metric identifiers such as
/// `conversion_rate` or `checkout.cart_abandonment`.
pub fn validate_kpi_name(name: &str) -> bool {
    !name.is_empty() && name.len() <= 255 && KPI_NAME_REGEX.is_match(name)
}

/// Validate a tenant identifier
pub fn validate_tenant_id(tenant_id: &str) -> bool {
    !tenant_id.is_empty() && tenant_id.len() <= 255 && TENANT_ID_REGEX.is_match(tenant_id)
}

/// Validate an alert severity label
///
/// Severity is a free-form label, but it still has to be a short
/// non-blank string so it stays usable in dashboards.
pub fn validate_severity(severity: &str) -> bool {
    let trimmed = severity.trim();
    !trimmed.is_empty() && trimmed.len() <= 50
}
