use super::{check_len, ValidationRules};

/// Validates a username.
///
/// # Arguments
///
/// * `username` - The username to validate.
/// * `rules` - The active validation rules.
///
/// # Returns
///
/// A `garde::Result` indicating whether the username is valid.
pub fn validate_username(username: &str, rules: &ValidationRules) -> garde::Result {
    check_len("username", username, &rules.username_len)?;

    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(garde::Error::new(
            "username can only contain letters, numbers, underscores, and hyphens",
        ));
    }

    Ok(())
}

/// Validates a password.
///
/// # Arguments
///
/// * `password` - The password to validate.
/// * `rules` - The active validation rules.
///
/// # Returns
///
/// A `garde::Result` indicating whether the password is valid.
pub fn validate_password(password: &str, rules: &ValidationRules) -> garde::Result {
    check_len("password", password, &rules.password_len)
}

/// Login fields are only checked for presence.
pub fn validate_login_field(value: &str, _rules: &ValidationRules) -> garde::Result {
    if value.is_empty() {
        return Err(garde::Error::new("must not be empty"));
    }
    Ok(())
}
