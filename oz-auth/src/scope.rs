//! Scope validation

use crate::error::{OzError, Result};
use std::collections::HashSet;

/// Check scope shape: non-empty entries, no duplicates
pub fn validate(scope: &[String]) -> Result<()> {
    let mut seen = HashSet::with_capacity(scope.len());
    for entry in scope {
        if entry.is_empty() {
            return Err(OzError::InvalidScope("Empty scope entry".to_string()));
        }
        if !seen.insert(entry.as_str()) {
            return Err(OzError::InvalidScope(format!(
                "Duplicate scope entry: {}",
                entry
            )));
        }
    }
    Ok(())
}

/// Fail with [`OzError::InvalidScope`] naming the first entry missing from `of`
pub fn ensure_subset(scope: &[String], of: &[String]) -> Result<()> {
    match scope.iter().find(|entry| !of.contains(entry)) {
        Some(entry) => Err(OzError::InvalidScope(format!(
            "Scope entry not permitted: {}",
            entry
        ))),
        None => Ok(()),
    }
}
