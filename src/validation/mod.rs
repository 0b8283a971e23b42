pub mod auth;
pub mod credentials;
pub mod drive;

use std::ops::RangeInclusive;

use garde::Validate;

use crate::error::{AppError, Result};

/// Input limits handed to request validators as garde context.
#[derive(Clone, Debug)]
pub struct ValidationRules {
    pub username_len: RangeInclusive<usize>,
    pub password_len: RangeInclusive<usize>,
    pub credential_name_len: RangeInclusive<usize>,
    pub identity_field_len: RangeInclusive<usize>,
    pub offline_urls: RangeInclusive<usize>,
    pub task_hashes: RangeInclusive<usize>,
    pub page: RangeInclusive<u32>,
    pub clear_flag: RangeInclusive<u8>,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            username_len: 3..=50,
            password_len: 8..=128,
            credential_name_len: 1..=255,
            identity_field_len: 1..=100,
            offline_urls: 1..=50,
            task_hashes: 1..=100,
            page: 1..=1000,
            clear_flag: 0..=5,
        }
    }
}

/// Runs the garde validators of `value` against `rules`.
///
/// # Returns
///
/// `AppError::Validation` carrying the garde report when any rule fails.
pub fn validate_request<T>(value: &T, rules: &ValidationRules) -> Result<()>
where
    T: Validate<Context = ValidationRules>,
{
    value
        .validate_with(rules)
        .map_err(|report| AppError::Validation(report.to_string().trim().to_string()))
}

pub(crate) fn check_len(
    field: &str,
    value: &str,
    range: &RangeInclusive<usize>,
) -> garde::Result {
    let len = value.chars().count();
    if range.contains(&len) {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "{} must be between {} and {} characters",
            field,
            range.start(),
            range.end()
        )))
    }
}
