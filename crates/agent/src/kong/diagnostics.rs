use std::collections::BTreeMap;
use std::error::Error as StdError;

use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde_json::Value;

const SHORT_BODY_MAX_CHARS: usize = 160;
const REDACTED: &str = "<redacted>";

/// What was sent, kept so a failed call can be described without the response.
#[derive(Debug, Clone)]
pub(super) struct RequestSummary {
    pub(super) method: Method,
    pub(super) headers: HeaderMap,
    pub(super) body: Vec<u8>,
}

impl RequestSummary {
    /// `Request method `POST`, headers {...}, body "..."` with the private key blanked out.
    pub(super) fn describe(&self) -> String {
        let headers = self
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).to_string(),
                )
            })
            .collect::<BTreeMap<_, _>>();

        let headers = serde_json::to_string(&headers).unwrap_or_else(|_| "{}".to_string());
        let body = serde_json::to_string(&redact_body(&self.body))
            .unwrap_or_else(|_| "\"\"".to_string());

        format!(
            "Request method `{}`, headers {headers}, body {body}",
            self.method
        )
    }
}

/// Mirrors an HTTP client's bad-response wording, e.g.
/// ``Server error: `POST http://kong/certificates` resulted in a `500 Internal Server Error` response: oops``.
pub(super) fn bad_response_message(
    method: &Method,
    url: &str,
    status: StatusCode,
    body: &str,
) -> String {
    let kind = if status.is_client_error() {
        "Client error"
    } else {
        "Server error"
    };

    format!(
        "{kind}: `{method} {url}` resulted in a `{status}` response: {}",
        shorten_body(body)
    )
}

/// Flattens an error and its sources into one line.
pub(super) fn error_chain(error: &dyn StdError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();

    while let Some(cause) = source {
        let cause_message = cause.to_string();
        if !message.contains(&cause_message) {
            message.push_str(": ");
            message.push_str(&cause_message);
        }
        source = cause.source();
    }

    message
}

fn redact_body(body: &[u8]) -> String {
    let raw = String::from_utf8_lossy(body);

    let Ok(mut value) = serde_json::from_str::<Value>(&raw) else {
        return raw.to_string();
    };

    if let Some(key) = value.get_mut("key") {
        *key = Value::String(REDACTED.to_string());
    }

    value.to_string()
}

fn shorten_body(raw_body: &str) -> String {
    if raw_body.is_empty() {
        return "-".to_string();
    }

    let single_line = raw_body
        .replace(['\r', '\n', '\t'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if single_line.chars().count() <= SHORT_BODY_MAX_CHARS {
        return single_line;
    }

    let mut shortened = single_line
        .chars()
        .take(SHORT_BODY_MAX_CHARS)
        .collect::<String>();
    shortened.push_str("...");
    shortened
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderValue, ACCEPT};

    fn summary(body: &str) -> RequestSummary {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        RequestSummary {
            method: Method::POST,
            headers,
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn describe_includes_method_headers_and_body() {
        let described = summary(r#"["foo"]"#).describe();
        assert_eq!(
            described,
            r#"Request method `POST`, headers {"accept":"application/json"}, body "[\"foo\"]""#
        );
    }

    #[test]
    fn describe_redacts_private_key() {
        let described =
            summary(r#"{"cert":"CHAIN","key":"SECRET","snis":["foo.bar"]}"#).describe();
        assert!(!described.contains("SECRET"));
        assert!(described.contains(REDACTED));
        assert!(described.contains("CHAIN"));
        assert!(described.contains("foo.bar"));
    }

    #[test]
    fn bad_response_message_distinguishes_client_and_server_errors() {
        let message = bad_response_message(
            &Method::POST,
            "http://kong/certificates",
            StatusCode::INTERNAL_SERVER_ERROR,
            "{\n \"message\": \"oops\"\n}",
        );
        assert_eq!(
            message,
            "Server error: `POST http://kong/certificates` resulted in a `500 Internal Server Error` response: { \"message\": \"oops\" }"
        );

        let message = bad_response_message(
            &Method::PATCH,
            "http://kong/certificates/foo.bar",
            StatusCode::NOT_FOUND,
            "",
        );
        assert!(message.starts_with("Client error: `PATCH"));
        assert!(message.ends_with("response: -"));
    }

    #[test]
    fn shorten_body_truncates_and_appends_ellipsis() {
        let input = "a".repeat(SHORT_BODY_MAX_CHARS + 10);
        let shortened = shorten_body(&input);

        assert_eq!(shortened.chars().count(), SHORT_BODY_MAX_CHARS + 3);
        assert!(shortened.ends_with("..."));
    }

    #[test]
    fn error_chain_appends_distinct_sources() {
        let inner = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let outer = std::io::Error::new(std::io::ErrorKind::Other, inner);
        assert_eq!(error_chain(&outer), "refused");

        #[derive(Debug, thiserror::Error)]
        #[error("error sending request")]
        struct Outer(#[source] std::io::Error);

        let wrapped = Outer(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        ));
        assert_eq!(error_chain(&wrapped), "error sending request: connection refused");
    }
}
