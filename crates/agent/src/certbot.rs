use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::certificate::{Certificate, CertificateError};
use crate::domains::InputError;

mod args;
mod runner;

pub use runner::{CommandOutput, CommandRunner, ProcessRunner};

pub const DEFAULT_CERTS_BASE_PATH: &str = "/etc/letsencrypt/live";
pub const DEFAULT_CERTBOT_BINARY: &str = "certbot";

const FULLCHAIN_FILE: &str = "fullchain.pem";
const PRIVKEY_FILE: &str = "privkey.pem";

/// Certbot ran and reported failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("certbot exited with status {exit_status} for domains [{}]", .domains.join(", "))]
pub struct AcquisitionError {
    pub raw_output: Vec<String>,
    pub exit_status: i32,
    pub domains: Vec<String>,
}

#[derive(Debug, Error)]
pub enum AcquireError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("certbot invocation rejected: {0}")]
    RejectedInvocation(String),
    #[error("failed to run {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: io::Error,
    },
    #[error("{binary} was stopped for domains [{}]: {source}", .domains.join(", "))]
    TimedOut {
        binary: String,
        domains: Vec<String>,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Certbot(AcquisitionError),
    #[error("{} not found for domains [{}] - this should not happen without a previous certbot error", .path.display(), .domains.join(", "))]
    ArtifactNotFound { path: PathBuf, domains: Vec<String> },
    #[error("{} could not be read for domains [{}] - this should not happen without a previous certbot error", .path.display(), .domains.join(", "))]
    ArtifactUnreadable {
        path: PathBuf,
        domains: Vec<String>,
        #[source]
        source: io::Error,
    },
    #[error("certbot produced an unusable certificate for domains [{}]: {source}", .domains.join(", "))]
    InvalidCertificate {
        domains: Vec<String>,
        #[source]
        source: CertificateError,
    },
}

/// Obtains certificates by running certbot in standalone mode and reading its live lineage.
pub struct CertbotHandler {
    runner: Box<dyn CommandRunner>,
    certbot_binary: String,
    certs_base_path: PathBuf,
}

impl CertbotHandler {
    #[must_use]
    pub fn new(
        runner: Box<dyn CommandRunner>,
        certbot_binary: impl Into<String>,
        certs_base_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            certbot_binary: certbot_binary.into(),
            certs_base_path: certs_base_path.into(),
        }
    }

    /// Requests one certificate covering all `domains` and loads it from disk.
    ///
    /// Certbot stores the lineage in a directory named after the first domain, so that is where
    /// `fullchain.pem` and `privkey.pem` are read from.
    ///
    /// # Errors
    /// Returns [`AcquireError::Input`] for an empty domain list without running anything,
    /// [`AcquireError::Certbot`] when certbot exits nonzero, and the artifact variants when
    /// certbot claims success but its output files are missing or unreadable.
    pub async fn acquire(
        &self,
        domains: &[String],
        email: &str,
        staging: bool,
    ) -> Result<Certificate, AcquireError> {
        let Some(primary_domain) = domains.first() else {
            return Err(InputError::EmptyDomains.into());
        };

        let args = args::certonly_args(domains, email, staging);
        args::validate_certonly_args(&args)
            .map_err(|error| AcquireError::RejectedInvocation(format!("{error:#}")))?;

        info!(domains = ?domains, staging, "requesting certificate from certbot");

        let output = self
            .runner
            .run(&self.certbot_binary, &args)
            .await
            .map_err(|source| match source.kind() {
                io::ErrorKind::TimedOut => AcquireError::TimedOut {
                    binary: self.certbot_binary.clone(),
                    domains: domains.to_vec(),
                    source,
                },
                _ => AcquireError::Spawn {
                    binary: self.certbot_binary.clone(),
                    source,
                },
            })?;

        if !output.success() {
            warn!(
                status = output.status,
                domains = ?domains,
                "certbot failed"
            );
            return Err(AcquireError::Certbot(AcquisitionError {
                raw_output: output.lines,
                exit_status: output.status,
                domains: domains.to_vec(),
            }));
        }

        let lineage = self.certs_base_path.join(primary_domain);
        let cert = read_artifact(&lineage.join(FULLCHAIN_FILE), domains).await?;
        let key = read_artifact(&lineage.join(PRIVKEY_FILE), domains).await?;

        Certificate::new(cert, key, domains.to_vec()).map_err(|source| {
            AcquireError::InvalidCertificate {
                domains: domains.to_vec(),
                source,
            }
        })
    }
}

async fn read_artifact(path: &Path, domains: &[String]) -> Result<String, AcquireError> {
    let unreadable = |source| AcquireError::ArtifactUnreadable {
        path: path.to_path_buf(),
        domains: domains.to_vec(),
        source,
    };

    if !tokio::fs::try_exists(path).await.map_err(unreadable)? {
        return Err(AcquireError::ArtifactNotFound {
            path: path.to_path_buf(),
            domains: domains.to_vec(),
        });
    }

    tokio::fs::read_to_string(path).await.map_err(unreadable)
}
