use crate::error::{CoreError, Result};

/// Maximum length of a locally generated identifier.
pub const MAX_ID_LEN: usize = 64;

/// Column width reserved for control-plane identifiers.
pub const MAX_EXTERNAL_ID_LEN: usize = 256;

pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Rejects empty, oversized, or non-ASCII identifiers.
pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(CoreError::invalid_id("identifier must not be empty"));
    }
    if id.len() > MAX_ID_LEN {
        return Err(CoreError::invalid_id(format!(
            "identifier '{id}' exceeds {MAX_ID_LEN} characters"
        )));
    }
    if !id.is_ascii() || id.chars().any(|c| c.is_ascii_whitespace()) {
        return Err(CoreError::invalid_id(format!(
            "identifier '{id}' must be ASCII without whitespace"
        )));
    }
    Ok(())
}

/// Control-plane identifiers are opaque. Only emptiness and the column
/// width are checked.
pub fn validate_external_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(CoreError::invalid_id("external identifier must not be empty"));
    }
    if id.len() > MAX_EXTERNAL_ID_LEN {
        return Err(CoreError::invalid_id(format!(
            "external identifier exceeds {MAX_EXTERNAL_ID_LEN} bytes"
        )));
    }
    Ok(())
}
