//! Request validation
//!
//! Identifiers end up inside quoted engine table names, so anything that
//! could break out of the quoting is rejected before it reaches the engine.
use bqlite_core::{Error, Result};

const MAX_QUERY_LENGTH: usize = 1024 * 1024; // 1 MB
const MAX_ID_LENGTH: usize = 1024;

/// Validates query text
///
/// # Errors
///
/// Returns Error::InvalidInput for empty or oversized (>1MB) queries
#[inline]
pub fn validate_query(query: &str) -> Result<()> {
    if query.trim().is_empty() {
        return Err(Error::InvalidInput("Query cannot be empty".to_string()));
    }

    if query.len() > MAX_QUERY_LENGTH {
        return Err(Error::InvalidInput(format!(
            "Query length {} exceeds maximum {}",
            query.len(),
            MAX_QUERY_LENGTH
        )));
    }

    Ok(())
}

fn validate_id(kind: &str, id: &str, allow_dash: bool) -> Result<()> {
    if id.is_empty() {
        return Err(Error::InvalidInput(format!("{} id cannot be empty", kind)));
    }

    if id.len() > MAX_ID_LENGTH {
        return Err(Error::InvalidInput(format!(
            "{} id length {} exceeds maximum {}",
            kind,
            id.len(),
            MAX_ID_LENGTH
        )));
    }

    let valid = id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || (allow_dash && c == '-'));
    if !valid {
        return Err(Error::InvalidInput(format!(
            "Invalid {} id '{}': only letters, digits and underscores are allowed",
            kind.to_ascii_lowercase(),
            id
        )));
    }

    Ok(())
}

/// Validates a project id (letters, digits, `_` and `-`)
#[inline]
pub fn validate_project_id(id: &str) -> Result<()> {
    validate_id("Project", id, true)
}

/// Validates a dataset id (letters, digits and `_`)
#[inline]
pub fn validate_dataset_id(id: &str) -> Result<()> {
    validate_id("Dataset", id, false)
}

/// Validates a table id (letters, digits, `_` and `-`)
#[inline]
pub fn validate_table_id(id: &str) -> Result<()> {
    validate_id("Table", id, true)
}

/// Validates a job id (letters, digits, `_` and `-`)
#[inline]
pub fn validate_job_id(id: &str) -> Result<()> {
    validate_id("Job", id, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_query() {
        assert!(validate_query("SELECT 1").is_ok());
        assert!(validate_query("   ").is_err());
        assert!(validate_query(&"x".repeat(MAX_QUERY_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_ids() {
        assert!(validate_dataset_id("my_dataset1").is_ok());
        assert!(validate_dataset_id("my-dataset").is_err());
        assert!(validate_dataset_id("").is_err());
        assert!(validate_table_id("events-2024").is_ok());
        assert!(validate_table_id("a.b").is_err());
        assert!(validate_table_id("t`; DROP TABLE x").is_err());
        assert!(validate_project_id("test-project").is_ok());
        assert!(validate_job_id("job_abc-123").is_ok());
    }

    #[test]
    fn test_validation_reason() {
        let err = validate_dataset_id("bad.id").unwrap_err();
        assert_eq!(err.reason(), "invalid");
    }
}
