use regex::Regex;
use reqwest::Url;
use thiserror::Error;

const DOMAIN_PATTERN: &str =
    r"^(?:[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?\.)+[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?$";
const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

/// Input that is rejected before anything external is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("Empty list of domains provided")]
    EmptyDomains,
    #[error("invalid domain: {0}")]
    InvalidDomain(String),
    #[error("invalid email address: {0}")]
    InvalidEmail(String),
    #[error("invalid kong admin endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("{0} environment variable is required")]
    MissingVariable(&'static str),
}

/// Splits a comma separated domain list, dropping blank entries and repeats.
#[must_use]
pub fn parse_domains(raw: &str) -> Vec<String> {
    let mut domains: Vec<String> = Vec::new();

    for entry in raw.split(',') {
        let domain = entry.trim().to_ascii_lowercase();
        if domain.is_empty() || domains.contains(&domain) {
            continue;
        }

        domains.push(domain);
    }

    domains
}

/// # Errors
/// Returns an error if the list is empty or any entry is not a plain DNS name.
pub fn validate_domains(domains: &[String]) -> Result<(), InputError> {
    if domains.is_empty() {
        return Err(InputError::EmptyDomains);
    }

    let regex = Regex::new(DOMAIN_PATTERN)
        .map_err(|error| InputError::InvalidDomain(format!("domain validator: {error}")))?;

    for domain in domains {
        if domain.len() > 253 || !regex.is_match(domain) {
            return Err(InputError::InvalidDomain(domain.clone()));
        }
    }

    Ok(())
}

/// # Errors
/// Returns an error if `email` does not look like `local@host.tld`.
pub fn validate_email(email: &str) -> Result<String, InputError> {
    let email = email.trim();
    let regex = Regex::new(EMAIL_PATTERN)
        .map_err(|error| InputError::InvalidEmail(format!("email validator: {error}")))?;

    if !regex.is_match(email) {
        return Err(InputError::InvalidEmail(email.to_string()));
    }

    Ok(email.to_string())
}

/// Checks the admin API base URL and strips any trailing slash so paths can be appended.
///
/// # Errors
/// Returns an error if the value is not an absolute `http`/`https` URL with a host.
pub fn normalize_admin_endpoint(endpoint: &str) -> Result<String, InputError> {
    let trimmed = endpoint.trim();
    let invalid = |reason: String| InputError::InvalidEndpoint {
        endpoint: trimmed.to_string(),
        reason,
    };

    let url = Url::parse(trimmed).map_err(|error| invalid(error.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {}", url.scheme())));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }

    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("query strings and fragments are not allowed".to_string()));
    }

    Ok(trimmed.trim_end_matches('/').to_string())
}
