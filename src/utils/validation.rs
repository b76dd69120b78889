//! Validation utilities
//!
//! Argument checks shared by every public entry point, mapped onto
//! `ModuleError::Validation`.

use std::sync::{LockResult, PoisonError};

use crate::module::traits::{ModuleError, ModuleResult};

/// Ensure a required string argument is present and not blank
///
/// Returns the trimmed value on success.
pub fn ensure_not_blank<'a>(value: &'a str, name: &str) -> ModuleResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ModuleError::Validation(format!("{} must not be empty", name)))
    } else {
        Ok(trimmed)
    }
}

/// Take a lock guard even if a previous holder panicked
///
/// The guarded tables only ever hold whole, immutable entries, so a panic
/// cannot leave a half-written value behind.
pub fn recover_lock<G>(result: LockResult<G>) -> G {
    result.unwrap_or_else(PoisonError::into_inner)
}
