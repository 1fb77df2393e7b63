use std::io::{self, Write};

use thiserror::Error;
use tracing::{info, warn};

use crate::certbot::{AcquireError, AcquisitionError, CertbotHandler};
use crate::domains::{self, InputError};
use crate::kong::{GatewayError, KongHandler};

/// What a recorded failure looks like in the run report.
pub trait Reportable {
    /// Process exit status or HTTP status; `0` when Kong never answered.
    fn code(&self) -> i32;
    fn message(&self) -> String;
    fn domains(&self) -> &[String];
}

impl Reportable for AcquisitionError {
    fn code(&self) -> i32 {
        self.exit_status
    }

    fn message(&self) -> String {
        serde_json::to_string(&self.raw_output).unwrap_or_default()
    }

    fn domains(&self) -> &[String] {
        &self.domains
    }
}

impl Reportable for GatewayError {
    fn code(&self) -> i32 {
        i32::from(self.status_code)
    }

    fn message(&self) -> String {
        self.message.clone()
    }

    fn domains(&self) -> &[String] {
        &self.domains
    }
}

/// Anything recorded during a run, tagged with the stage that produced it.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Acquisition(AcquireError),
    #[error(transparent)]
    Gateway(GatewayError),
}

impl AgentError {
    /// One line for the run report.
    #[must_use]
    pub fn report_line(&self) -> String {
        match self {
            Self::Acquisition(AcquireError::Certbot(failure)) => format!(
                "Certbot error: exit status {}, output {}, domains [{}]",
                failure.code(),
                failure.message(),
                failure.domains().join(", ")
            ),
            Self::Acquisition(error) => format!("Certbot error: {error}"),
            Self::Gateway(error) => format!(
                "Kong error: status {}, message {}, domains [{}]",
                error.code(),
                error.message(),
                error.domains().join(", ")
            ),
        }
    }
}

/// Result of one pass over a domain group.
#[derive(Debug)]
pub struct RunReport {
    domains: Vec<String>,
    errors: Vec<AgentError>,
}

impl RunReport {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn errors(&self) -> &[AgentError] {
        &self.errors
    }

    /// Writes one line per recorded error followed by a summary line.
    ///
    /// # Errors
    /// Returns an error if writing to `out` fails.
    pub fn print(&self, out: &mut impl Write) -> io::Result<()> {
        if self.succeeded() {
            return writeln!(
                out,
                "Certificates for [{}] stored in Kong",
                self.domains.join(", ")
            );
        }

        for error in &self.errors {
            writeln!(out, "{}", error.report_line())?;
        }

        writeln!(out, "{} error(s) recorded", self.errors.len())
    }
}

/// Acquires a certificate for one domain group and publishes it to Kong.
pub struct CertbotAgent {
    certbot: CertbotHandler,
    kong: KongHandler,
    admin_uri: String,
}

impl CertbotAgent {
    /// # Errors
    /// Returns an error if `admin_endpoint` is not a usable admin API URL.
    pub fn new(
        certbot: CertbotHandler,
        kong: KongHandler,
        admin_endpoint: &str,
    ) -> Result<Self, InputError> {
        Ok(Self {
            certbot,
            kong,
            admin_uri: domains::normalize_admin_endpoint(admin_endpoint)?,
        })
    }

    /// Runs certbot, then stores the certificate in Kong.
    ///
    /// Certbot failures end the run before Kong is contacted. Kong failures are collected and
    /// never stop the remaining domains from being processed.
    ///
    /// # Errors
    /// Returns an error, before anything external runs, if `domains` is empty or malformed or
    /// `email` is not an address.
    pub async fn execute(
        &self,
        domains: &[String],
        email: &str,
        staging: bool,
    ) -> Result<RunReport, InputError> {
        domains::validate_domains(domains)?;
        let email = domains::validate_email(email)?;

        let mut report = RunReport {
            domains: domains.to_vec(),
            errors: Vec::new(),
        };

        let certificate = match self.certbot.acquire(domains, &email, staging).await {
            Ok(certificate) => certificate,
            Err(AcquireError::Input(error)) => return Err(error),
            Err(error) => {
                warn!(%error, "certificate acquisition failed, skipping kong");
                report.errors.push(AgentError::Acquisition(error));
                return Ok(report);
            }
        };

        let outcome = self.kong.store(&certificate, &self.admin_uri).await;
        report
            .errors
            .extend(outcome.into_errors().into_iter().map(AgentError::Gateway));

        info!(
            domains = ?domains,
            errors = report.errors.len(),
            "certificate run finished"
        );

        Ok(report)
    }
}
