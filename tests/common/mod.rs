//! Shared fixtures: a minimal in-process HTTP server standing in for an
//! MLflow tracking server.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use serde_json::{json, Value};

/// One request as seen by the fake server.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Request {
    /// Decoded query parameter.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Header value (case-insensitive name).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Request body parsed as JSON (`null` when empty).
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

/// Handle to a running fake server.
pub struct FakeServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl FakeServer {
    /// Requests received so far.
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().expect("request log").clone()
    }

    /// Requests received for one endpoint path.
    pub fn requests_to(&self, path: &str) -> Vec<Request> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }
}

/// Start a server answering every request with `handler(request) -> (status, body)`.
pub fn serve<F>(handler: F) -> FakeServer
where
    F: Fn(&Request) -> (u16, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake server");
    let addr = listener.local_addr().expect("fake server address");
    let requests = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&requests);

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let Some(request) = read_request(&stream) else {
                continue;
            };
            let (status, body) = handler(&request);
            log.lock().expect("request log").push(request);

            let response = format!(
                "HTTP/1.1 {status} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                reason(status),
                body.len()
            );
            let _ = stream.write_all(response.as_bytes());
            let _ = stream.flush();
        }
    });

    FakeServer {
        base_url: format!("http://{addr}"),
        requests,
    }
}

/// An address nothing is listening on.
pub fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind free port");
    let addr = listener.local_addr().expect("free port address");
    drop(listener);
    format!("http://{addr}")
}

fn read_request(stream: &TcpStream) -> Option<Request> {
    let mut reader = BufReader::new(stream.try_clone().ok()?);

    let mut line = String::new();
    reader.read_line(&mut line).ok()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();

    let mut headers = Vec::new();
    let mut content_length = 0usize;
    loop {
        let mut header = String::new();
        reader.read_line(&mut header).ok()?;
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            let value = value.trim().to_string();
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.parse().unwrap_or(0);
            }
            headers.push((name.to_string(), value));
        }
    }

    let mut body = vec![0; content_length];
    reader.read_exact(&mut body).ok()?;

    let (path, raw_query) = target.split_once('?').unwrap_or((target.as_str(), ""));
    let query = url::form_urlencoded::parse(raw_query.as_bytes())
        .into_owned()
        .collect();

    Some(Request {
        method,
        path: path.to_string(),
        query,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Status",
    }
}

// =============================================================================
// MLflow fixture
// =============================================================================

pub const EXPERIMENTS_PATH: &str = "/api/2.0/mlflow/experiments/search";
pub const RUNS_PATH: &str = "/api/2.0/mlflow/runs/search";
pub const HISTORY_PATH: &str = "/api/2.0/mlflow/metrics/get-history";
pub const ARTIFACTS_PATH: &str = "/api/2.0/mlflow/artifacts/list";
pub const MODELS_PATH: &str = "/api/2.0/mlflow/registered-models/search";

pub const CPU_METRIC: &str = "system/cpu_utilization_percentage";

/// One experiment with two runs:
/// - `run-a`: FINISHED, `lr=0.01`, `accuracy=0.9`, two CPU samples, a `model` artifact
/// - `run-b`: FAILED, no metrics
pub fn mlflow_handler(request: &Request) -> (u16, String) {
    let body = match request.path.as_str() {
        EXPERIMENTS_PATH => json!({
            "experiments": [
                {"experiment_id": "1", "name": "churn-model", "creation_time": "1700000000000"}
            ]
        }),
        RUNS_PATH => {
            let ids = request.json()["experiment_ids"].clone();
            if ids != json!(["1"]) {
                return (200, "{}".to_string());
            }
            json!({"runs": [
                {
                    "info": {"run_id": "run-a", "experiment_id": "1", "run_name": "bright-owl",
                             "status": "FINISHED", "start_time": 1700000000000_i64,
                             "end_time": 1700000090000_i64},
                    "data": {
                        "metrics": [{"key": "accuracy", "value": 0.9, "timestamp": 1700000080000_i64, "step": 9}],
                        "params": [{"key": "lr", "value": "0.01"}],
                        "tags": [{"key": "mlflow.user", "value": "ada"}]
                    }
                },
                {
                    "info": {"run_id": "run-b", "experiment_id": "1", "status": "FAILED",
                             "start_time": 1700000100000_i64, "end_time": 1700000105000_i64},
                    "data": {}
                }
            ]})
        }
        HISTORY_PATH => {
            if request.param("run_id") == Some("run-a") && request.param("metric_key") == Some(CPU_METRIC) {
                json!({"metrics": [
                    {"key": CPU_METRIC, "value": 35.0, "timestamp": 1700000010000_i64, "step": 0},
                    {"key": CPU_METRIC, "value": 85.0, "timestamp": 1700000020000_i64, "step": 1}
                ]})
            } else {
                json!({})
            }
        }
        ARTIFACTS_PATH => {
            if request.param("run_id") == Some("run-a") {
                json!({"files": [{"path": "model", "is_dir": true}]})
            } else {
                json!({})
            }
        }
        MODELS_PATH => json!({"registered_models": [{
            "name": "churn",
            "latest_versions": [{"version": "1", "current_stage": "Production",
                                 "source": "runs:/run-a/model", "run_id": "run-a"}]
        }]}),
        _ => return (404, json!({"error_code": "ENDPOINT_NOT_FOUND", "message": "no such endpoint"}).to_string()),
    };
    (200, body.to_string())
}
