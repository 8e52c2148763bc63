//! SQL Identifier Validation
//!
//! Table names come from configuration and are spliced into SQL text, since
//! identifiers cannot be bound as statement parameters. This module is the
//! single gate that keeps an unsafe configured name from ever reaching a
//! statement: every name is checked once at configuration-load time.
//!
//! A name is valid when every dot-separated segment starts with an ASCII
//! letter or underscore and continues with ASCII letters, digits, or
//! underscores. Empty names and empty segments (`"a..b"`, `"a."`) are
//! rejected.

use crate::error::{RadctlError, Result};

/// Check a single identifier segment (no dots)
fn is_safe_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validate a possibly dot-qualified SQL identifier
///
/// `what` names the configuration field being checked and appears in the
/// error message.
pub fn validate_identifier(name: &str, what: &str) -> Result<()> {
    if name.is_empty() || !name.split('.').all(is_safe_segment) {
        return Err(RadctlError::invalid_identifier(format!(
            "unsafe SQL identifier for {what}: {name:?}"
        )));
    }
    Ok(())
}
