use crate::error::{AppError, Result};

/// Validates a helpdesk record identifier before it is interpolated into an
/// upstream URL.
///
/// Helpdesk ids are long decimal numbers; anything else is rejected so no
/// crafted path segment ever reaches the upstream API.
///
/// # Arguments
///
/// * `label` - The parameter name used in the error message.
/// * `id` - The identifier to validate.
///
/// # Returns
///
/// A `Result<()>` indicating whether the identifier is usable.
pub fn validate_record_id(label: &str, id: &str) -> Result<()> {
    if id.is_empty() || id.len() > 32 {
        return Err(AppError::Validation(format!(
            "{} must be a numeric id",
            label
        )));
    }

    if !id.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::Validation(format!(
            "{} must be a numeric id",
            label
        )));
    }

    Ok(())
}

/// Validates the ticket listing page size.
///
/// # Arguments
///
/// * `limit` - The requested page size, when present.
///
/// # Returns
///
/// A `Result<()>` indicating whether the limit is within the helpdesk's
/// accepted 1..=100 range.
pub fn validate_limit(limit: Option<u32>) -> Result<()> {
    if let Some(limit) = limit {
        if limit < 1 || limit > 100 {
            return Err(AppError::Validation(
                "limit must be between 1 and 100".to_string(),
            ));
        }
    }

    Ok(())
}
