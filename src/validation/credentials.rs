use super::{check_len, ValidationRules};

pub fn validate_credential_name(name: &str, rules: &ValidationRules) -> garde::Result {
    if name.trim().is_empty() {
        return Err(garde::Error::new("name cannot be blank"));
    }
    check_len("name", name, &rules.credential_name_len)
}

/// Validates one opaque identity field (uid, cid, seid, kid) or a QR handshake value.
pub fn validate_identity_field(value: &str, rules: &ValidationRules) -> garde::Result {
    check_len("value", value, &rules.identity_field_len)?;

    if value.chars().any(char::is_whitespace) {
        return Err(garde::Error::new("value must not contain whitespace"));
    }

    Ok(())
}
