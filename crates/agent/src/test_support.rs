//! Fakes for the two external systems: the certbot process and Kong's admin API.

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::Router;
use serde_json::Value;

use crate::certbot::{CommandOutput, CommandRunner};

#[derive(Clone, Default)]
pub(crate) struct ScriptedRunner {
    calls: Arc<Mutex<Vec<(String, Vec<String>)>>>,
    pub(crate) status: i32,
    pub(crate) lines: Vec<String>,
    pub(crate) spawn_error: Option<io::ErrorKind>,
}

impl ScriptedRunner {
    pub(crate) fn exiting(status: i32, lines: &[&str]) -> Self {
        Self {
            status,
            lines: lines.iter().map(ToString::to_string).collect(),
            ..Self::default()
        }
    }

    pub(crate) fn failing_to_spawn(kind: io::ErrorKind) -> Self {
        Self {
            spawn_error: Some(kind),
            ..Self::default()
        }
    }

    pub(crate) fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput> {
        self.calls
            .lock()
            .expect("calls lock")
            .push((program.to_string(), args.to_vec()));

        if let Some(kind) = self.spawn_error {
            return Err(io::Error::new(kind, "scripted spawn failure"));
        }

        Ok(CommandOutput {
            status: self.status,
            lines: self.lines.clone(),
        })
    }
}

/// Lays out `<base>/<primary>/{fullchain,privkey}.pem` the way certbot does.
pub(crate) fn write_lineage(base: &Path, primary: &str, cert: &str, key: &str) {
    let lineage = base.join(primary);
    std::fs::create_dir_all(&lineage).expect("lineage dir");
    std::fs::write(lineage.join("fullchain.pem"), cert).expect("write fullchain");
    std::fs::write(lineage.join("privkey.pem"), key).expect("write privkey");
}

#[derive(Clone, Debug)]
pub(crate) struct RecordedRequest {
    pub(crate) method: String,
    pub(crate) path: String,
    pub(crate) accept: Option<String>,
    pub(crate) content_type: Option<String>,
    pub(crate) body: Value,
}

/// A loopback HTTP server that records every request and answers from a script.
///
/// Unscripted requests get `201 {}`.
#[derive(Clone, Default)]
pub(crate) struct MockKong {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    responses: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
}

impl MockKong {
    pub(crate) fn respond(&self, method: &str, path: &str, status: u16, body: &str) {
        self.responses.lock().expect("responses lock").insert(
            (method.to_string(), path.to_string()),
            (status, body.to_string()),
        );
    }

    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    /// Starts serving and returns the admin base URL (with an `/admin` prefix).
    pub(crate) async fn serve(&self) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock kong");
        let address = listener.local_addr().expect("mock kong address");
        let app = Router::new().fallback(record).with_state(self.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve mock kong");
        });

        format!("http://{address}/admin")
    }
}

async fn record(
    State(kong): State<MockKong>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, String) {
    let method = method.as_str().to_string();
    let path = uri.path().to_string();

    kong.requests
        .lock()
        .expect("requests lock")
        .push(RecordedRequest {
            method: method.clone(),
            path: path.clone(),
            accept: header(&headers, "accept"),
            content_type: header(&headers, "content-type"),
            body: serde_json::from_slice(&body).unwrap_or(Value::Null),
        });

    let (status, body) = kong
        .responses
        .lock()
        .expect("responses lock")
        .get(&(method, path))
        .cloned()
        .unwrap_or((201, "{}".to_string()));

    (StatusCode::from_u16(status).expect("valid status"), body)
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
}

/// An address nothing listens on.
pub(crate) async fn unreachable_endpoint() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let address = listener.local_addr().expect("address");
    drop(listener);
    format!("http://{address}/admin")
}
