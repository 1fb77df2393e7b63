use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CertificateError {
    #[error("Empty cert")]
    EmptyCert,
    #[error("Empty key")]
    EmptyKey,
    #[error("Empty domains")]
    EmptyDomains,
}

/// A certificate chain and its private key, issued for one or more domains.
///
/// The first domain is the primary one: certbot names its output directory after it and the
/// gateway uses it as the lookup key. Values of this type are always valid; there is no way to
/// build one with blank material or without domains.
#[derive(Clone, PartialEq, Eq)]
pub struct Certificate {
    cert: String,
    key: String,
    domains: Vec<String>,
}

impl Certificate {
    /// # Errors
    /// Returns an error if `cert` or `key` is blank, or if `domains` is empty.
    pub fn new(
        cert: impl Into<String>,
        key: impl Into<String>,
        domains: Vec<String>,
    ) -> Result<Self, CertificateError> {
        let cert = cert.into();
        let key = key.into();

        if cert.trim().is_empty() {
            return Err(CertificateError::EmptyCert);
        }

        if key.trim().is_empty() {
            return Err(CertificateError::EmptyKey);
        }

        if domains.is_empty() {
            return Err(CertificateError::EmptyDomains);
        }

        Ok(Self { cert, key, domains })
    }

    #[must_use]
    pub fn cert(&self) -> &str {
        &self.cert
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    #[must_use]
    pub fn primary_domain(&self) -> &str {
        // non-empty by construction
        self.domains.first().map_or("", String::as_str)
    }
}

// Keeps private key material out of debug output and logs.
impl std::fmt::Debug for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Certificate")
            .field("cert_len", &self.cert.len())
            .field("key", &"<redacted>")
            .field("domains", &self.domains)
            .finish()
    }
}
