use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Deserialize;
use tracing::warn;

use crate::certbot::{DEFAULT_CERTBOT_BINARY, DEFAULT_CERTS_BASE_PATH};
use crate::domains::{self, InputError};
use crate::kong::StoreProtocol;

const DEFAULT_CONFIG_PATH: &str = "/etc/kong-certbot-agent/config.json";

const DEFAULT_CERTBOT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

const KONG_ADMIN_ENDPOINT_VAR: &str = "KONG_ADMIN_ENDPOINT";
const LETSENCRYPT_EMAIL_VAR: &str = "LETSENCRYPT_EMAIL";
const SUPPORTED_DOMAINS_VAR: &str = "SUPPORTED_DOMAINS";
const LETSENCRYPT_STAGING_VAR: &str = "LETSENCRYPT_STAGING";

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub certs_base_path: Option<String>,
    pub certbot_binary: Option<String>,
    pub certbot_timeout_secs: Option<u64>,
    pub http_timeout_secs: Option<u64>,
    pub protocol: Option<StoreProtocol>,
    pub accept_invalid_certs: Option<bool>,
}

impl AgentConfig {
    /// Reads the JSON config named by `KONG_CERTBOT_CONFIG_PATH`, or the default path.
    ///
    /// # Errors
    ///
    /// This function will return an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("KONG_CERTBOT_CONFIG_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

        let path = Path::new(&config_path);
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {config_path}"))?;

        let config = serde_json::from_str::<Self>(&raw)
            .with_context(|| format!("Failed to parse config JSON: {config_path}"))?;

        Ok(config)
    }

    #[must_use]
    pub fn certs_base_path(&self) -> String {
        self.certs_base_path
            .clone()
            .or_else(|| std::env::var("CERTBOT_CERTS_BASE_PATH").ok())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_CERTS_BASE_PATH.to_string())
    }

    #[must_use]
    pub fn certbot_binary(&self) -> String {
        self.certbot_binary
            .clone()
            .or_else(|| std::env::var("CERTBOT_BIN").ok())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_CERTBOT_BINARY.to_string())
    }

    #[must_use]
    pub fn certbot_timeout(&self) -> Duration {
        Duration::from_secs(
            self.certbot_timeout_secs
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_CERTBOT_TIMEOUT_SECS),
        )
    }

    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        let secs = self.http_timeout_secs.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);
        if secs == 0 {
            warn!("invalid http timeout value; using default");
            return Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS);
        }

        Duration::from_secs(secs)
    }

    #[must_use]
    pub fn protocol(&self) -> StoreProtocol {
        if let Some(protocol) = self.protocol {
            return protocol;
        }

        let Some(raw) = std::env::var("KONG_CERTIFICATE_PROTOCOL")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
        else {
            return StoreProtocol::default();
        };

        StoreProtocol::from_str(&raw, true).unwrap_or_else(|_| {
            warn!(value = %raw, "unknown KONG_CERTIFICATE_PROTOCOL; using upsert");
            StoreProtocol::default()
        })
    }

    #[must_use]
    pub fn accept_invalid_certs(&self) -> bool {
        self.accept_invalid_certs.unwrap_or(false)
    }
}

/// One run's worth of input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunRequest {
    pub admin_endpoint: String,
    pub email: String,
    pub domains: Vec<String>,
    pub staging: bool,
}

impl RunRequest {
    /// Validates command line input: the admin URL, an email and a comma separated domain list.
    ///
    /// # Errors
    /// Returns the first precondition that does not hold.
    pub fn new(
        admin_endpoint: &str,
        email: &str,
        raw_domains: &str,
        staging: bool,
    ) -> Result<Self, InputError> {
        let admin_endpoint = domains::normalize_admin_endpoint(admin_endpoint)?;
        let email = domains::validate_email(email)?;
        let domains = domains::parse_domains(raw_domains);
        domains::validate_domains(&domains)?;

        Ok(Self {
            admin_endpoint,
            email,
            domains,
            staging,
        })
    }

    /// Builds a request from `KONG_ADMIN_ENDPOINT`, `LETSENCRYPT_EMAIL`, `SUPPORTED_DOMAINS` and
    /// the optional `LETSENCRYPT_STAGING`.
    ///
    /// # Errors
    /// Returns an error naming the first required variable that is missing or blank, or the
    /// first value that fails validation.
    pub fn from_env() -> Result<Self, InputError> {
        let admin_endpoint = required_var(KONG_ADMIN_ENDPOINT_VAR)?;
        let email = required_var(LETSENCRYPT_EMAIL_VAR)?;
        let raw_domains = required_var(SUPPORTED_DOMAINS_VAR)?;
        let staging = std::env::var(LETSENCRYPT_STAGING_VAR)
            .ok()
            .is_some_and(|value| {
                value.trim().eq_ignore_ascii_case("true") || value.trim() == "1"
            });

        Self::new(&admin_endpoint, &email, &raw_domains, staging)
    }
}

fn required_var(name: &'static str) -> Result<String, InputError> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(InputError::MissingVariable(name))
}
