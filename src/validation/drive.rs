use super::ValidationRules;

const ALLOWED_URL_SCHEMES: [&str; 3] = ["http://", "https://", "magnet:"];

/// Validates the URL list of an offline download request.
pub fn validate_offline_urls(urls: &[String], rules: &ValidationRules) -> garde::Result {
    if !rules.offline_urls.contains(&urls.len()) {
        return Err(garde::Error::new(format!(
            "between {} and {} urls are required",
            rules.offline_urls.start(),
            rules.offline_urls.end()
        )));
    }

    for url in urls {
        let lower = url.trim().to_ascii_lowercase();
        if !ALLOWED_URL_SCHEMES
            .iter()
            .any(|scheme| lower.starts_with(scheme))
        {
            return Err(garde::Error::new(
                "urls must start with http://, https:// or magnet:",
            ));
        }
    }

    Ok(())
}

pub fn validate_task_hashes(hashes: &[String], rules: &ValidationRules) -> garde::Result {
    if !rules.task_hashes.contains(&hashes.len()) {
        return Err(garde::Error::new(format!(
            "between {} and {} task hashes are required",
            rules.task_hashes.start(),
            rules.task_hashes.end()
        )));
    }

    if hashes.iter().any(|hash| hash.trim().is_empty()) {
        return Err(garde::Error::new("task hashes must not be blank"));
    }

    Ok(())
}

pub fn validate_page(page: &Option<u32>, rules: &ValidationRules) -> garde::Result {
    match page {
        Some(page) if !rules.page.contains(page) => Err(garde::Error::new(format!(
            "page must be between {} and {}",
            rules.page.start(),
            rules.page.end()
        ))),
        _ => Ok(()),
    }
}

pub fn validate_clear_flag(flag: &u8, rules: &ValidationRules) -> garde::Result {
    if rules.clear_flag.contains(flag) {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "flag must be between {} and {}",
            rules.clear_flag.start(),
            rules.clear_flag.end()
        )))
    }
}

/// Directory, file and pick-code ids: optional, but never blank or padded when present.
pub fn validate_optional_id(id: &Option<String>, rules: &ValidationRules) -> garde::Result {
    match id {
        Some(id) => super::credentials::validate_identity_field(id, rules),
        None => Ok(()),
    }
}
