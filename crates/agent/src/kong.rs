use std::time::Duration;

use clap::ValueEnum;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::certificate::Certificate;

mod diagnostics;
mod error;

use diagnostics::RequestSummary;
pub use error::GatewayError;

/// Kong answers a POST for an SNI that already belongs to another certificate with a 400 whose
/// message contains this text. Tied to Kong's current wording; recheck on Kong upgrades.
pub const ALREADY_ASSOCIATED_MESSAGE: &str = "already associated with existing certificate";

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

/// How certificates are written into Kong.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreProtocol {
    /// One `PUT /certificates/{sni}` per certificate.
    #[default]
    Upsert,
    /// `POST /certificates`, then `PATCH /certificates/{sni}` per domain on conflict, for
    /// admin APIs whose PUT does not create missing records.
    Legacy,
}

#[derive(Debug, Serialize)]
struct CertificatePayload<'a> {
    cert: &'a str,
    key: &'a str,
    snis: &'a [String],
}

#[derive(Debug, Serialize)]
struct CertificatePatch<'a> {
    cert: &'a str,
    key: &'a str,
}

/// Errors recorded by one [`KongHandler::store`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreOutcome {
    errors: Vec<GatewayError>,
}

impl StoreOutcome {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn errors(&self) -> &[GatewayError] {
        &self.errors
    }

    #[must_use]
    pub fn into_errors(self) -> Vec<GatewayError> {
        self.errors
    }
}

/// A call that did not succeed: either no response arrived, or a 4xx/5xx did.
#[derive(Debug)]
struct Failure {
    status: Option<StatusCode>,
    body: String,
    message: String,
    request: RequestSummary,
}

impl Failure {
    fn into_gateway_error(self, domains: Vec<String>) -> GatewayError {
        let status_code = self.status.map_or(0, |status| status.as_u16());
        let message = format!(
            "Kong error {status_code}: {}. {}",
            self.message,
            self.request.describe()
        );

        GatewayError::new(status_code, domains, message)
    }

    /// A 409, or a 400 whose JSON `message` says the SNI already belongs to a certificate.
    fn is_conflict(&self) -> bool {
        match self.status {
            Some(StatusCode::CONFLICT) => true,
            Some(StatusCode::BAD_REQUEST) => {
                serde_json::from_str::<serde_json::Value>(&self.body)
                    .ok()
                    .as_ref()
                    .and_then(|body| body.get("message"))
                    .and_then(serde_json::Value::as_str)
                    .is_some_and(|message| message.contains(ALREADY_ASSOCIATED_MESSAGE))
            }
            _ => false,
        }
    }
}

/// Publishes certificates into Kong's admin API.
#[derive(Debug, Clone)]
pub struct KongHandler {
    client: Client,
    protocol: StoreProtocol,
}

impl KongHandler {
    #[must_use]
    pub fn new(client: Client, protocol: StoreProtocol) -> Self {
        Self { client, protocol }
    }

    /// Builds the HTTP client used against the admin API.
    ///
    /// # Errors
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn build_client(
        timeout: Option<Duration>,
        accept_invalid_certs: bool,
    ) -> reqwest::Result<Client> {
        Client::builder()
            .timeout(timeout.unwrap_or(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS)))
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
    }

    /// Stores `certificate` under `admin_uri` (the admin API base URL, no trailing slash).
    ///
    /// Never fails outright: every unsuccessful call becomes a [`GatewayError`] in the outcome,
    /// and the outcome only holds errors from this call.
    pub async fn store(&self, certificate: &Certificate, admin_uri: &str) -> StoreOutcome {
        info!(
            domains = ?certificate.domains(),
            protocol = ?self.protocol,
            "storing certificate in kong"
        );

        let errors = match self.protocol {
            StoreProtocol::Upsert => self.upsert(certificate, admin_uri).await,
            StoreProtocol::Legacy => self.create_or_patch(certificate, admin_uri).await,
        };

        for error in &errors {
            warn!(
                status = error.status_code,
                domains = ?error.domains,
                "kong rejected certificate"
            );
        }

        StoreOutcome { errors }
    }

    async fn upsert(&self, certificate: &Certificate, admin_uri: &str) -> Vec<GatewayError> {
        // Kong aliases every SNI of a certificate, so any of them addresses the same record.
        let url = certificate_url(admin_uri, certificate.primary_domain());
        let payload = CertificatePayload {
            cert: certificate.cert(),
            key: certificate.key(),
            snis: certificate.domains(),
        };

        match self.send(Method::PUT, &url, &payload).await {
            Ok(()) => Vec::new(),
            Err(failure) => vec![failure.into_gateway_error(certificate.domains().to_vec())],
        }
    }

    async fn create_or_patch(
        &self,
        certificate: &Certificate,
        admin_uri: &str,
    ) -> Vec<GatewayError> {
        let url = format!("{admin_uri}/certificates");
        let payload = CertificatePayload {
            cert: certificate.cert(),
            key: certificate.key(),
            snis: certificate.domains(),
        };

        let failure = match self.send(Method::POST, &url, &payload).await {
            Ok(()) => return Vec::new(),
            Err(failure) => failure,
        };

        if !failure.is_conflict() {
            return vec![failure.into_gateway_error(certificate.domains().to_vec())];
        }

        info!(
            domains = ?certificate.domains(),
            "certificate already exists, patching each domain"
        );

        // snis stays out of the patch: each PATCH targets one existing record by its alias
        let patch = CertificatePatch {
            cert: certificate.cert(),
            key: certificate.key(),
        };

        let mut errors = Vec::new();
        for domain in certificate.domains() {
            let url = certificate_url(admin_uri, domain);
            if let Err(failure) = self.send(Method::PATCH, &url, &patch).await {
                errors.push(failure.into_gateway_error(vec![domain.clone()]));
            }
        }

        errors
    }

    async fn send<T: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        payload: &T,
    ) -> Result<(), Failure> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let request = RequestSummary {
            method: method.clone(),
            headers: headers.clone(),
            body: serde_json::to_vec(payload).unwrap_or_default(),
        };

        debug!(%method, url, "calling kong admin api");

        let response = self
            .client
            .request(method.clone(), url)
            .headers(headers)
            .json(payload)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(error) => {
                return Err(Failure {
                    status: None,
                    body: String::new(),
                    message: format!("empty response ({})", diagnostics::error_chain(&error)),
                    request,
                });
            }
        };

        let status = response.status();
        if !status.is_client_error() && !status.is_server_error() {
            debug!(%method, url, %status, "kong accepted request");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let message = diagnostics::bad_response_message(&method, url, status, &body);

        Err(Failure {
            status: Some(status),
            body,
            message,
            request,
        })
    }
}

fn certificate_url(admin_uri: &str, domain: &str) -> String {
    format!("{admin_uri}/certificates/{}", urlencoding::encode(domain))
}
