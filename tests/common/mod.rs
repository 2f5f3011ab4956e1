//! Shared test infrastructure for integration tests.
//!
//! `MockServer` is a one-connection-per-request HTTP/1.1 endpoint that replays
//! scripted responses and records what the binary sent.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tempfile::TempDir;

/// One request as received by the mock endpoint.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("request body is JSON")
    }
}

pub struct MockServer {
    pub url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: Option<JoinHandle<()>>,
}

impl MockServer {
    /// Serve `responses` in order, one connection each, then stop accepting.
    pub fn start(responses: Vec<(u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
        let addr = listener.local_addr().expect("local addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);
        let handle = std::thread::spawn(move || {
            for (status, body) in responses {
                let Ok((stream, _)) = listener.accept() else {
                    return;
                };
                if let Some(request) = serve_one(stream, status, &body) {
                    recorded.lock().expect("lock requests").push(request);
                }
            }
        });
        Self {
            url: format!("http://{addr}/euisw/euisb/api/caseQuery/query"),
            requests,
            handle: Some(handle),
        }
    }

    /// Wait for the scripted responses to drain and return what was received.
    pub fn finish(mut self) -> Vec<RecordedRequest> {
        if let Some(handle) = self.handle.take() {
            handle.join().expect("mock server thread");
        }
        let requests = self.requests.lock().expect("lock requests");
        requests.clone()
    }
}

fn serve_one(stream: TcpStream, status: u16, body: &str) -> Option<RecordedRequest> {
    let mut reader = BufReader::new(stream.try_clone().ok()?);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).ok()?;

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).ok()?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    let header = |name: &str| {
        headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    };
    let request_body = if header("transfer-encoding").is_some_and(|v| v.contains("chunked")) {
        read_chunked(&mut reader)?
    } else {
        let length: usize = header("content-length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let mut buf = vec![0; length];
        reader.read_exact(&mut buf).ok()?;
        buf
    };

    let reason = if (200..300).contains(&status) {
        "OK"
    } else {
        "Error"
    };
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let mut stream = stream;
    stream.write_all(response.as_bytes()).ok()?;
    stream.flush().ok()?;

    Some(RecordedRequest {
        request_line: request_line.trim_end().to_string(),
        headers,
        body: String::from_utf8_lossy(&request_body).into_owned(),
    })
}

fn read_chunked(reader: &mut BufReader<TcpStream>) -> Option<Vec<u8>> {
    let mut body = Vec::new();
    loop {
        let mut size_line = String::new();
        reader.read_line(&mut size_line).ok()?;
        let size = usize::from_str_radix(size_line.trim().split(';').next()?, 16).ok()?;
        if size == 0 {
            let mut trailer = String::new();
            reader.read_line(&mut trailer).ok()?;
            return Some(body);
        }
        let mut chunk = vec![0; size + 2];
        reader.read_exact(&mut chunk).ok()?;
        body.extend_from_slice(&chunk[..size]);
    }
}

/// Temporary key-value store directory for one test.
pub struct TestStore {
    pub dir: TempDir,
}

impl TestStore {
    pub fn empty() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn with_token(token: &str) -> Self {
        let store = Self::empty();
        store.write(&serde_json::json!({ "euisToken": token }));
        store
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().join("storage.json")
    }

    pub fn write(&self, value: &serde_json::Value) {
        std::fs::write(self.path(), value.to_string()).expect("write store");
    }

    pub fn read(&self) -> serde_json::Value {
        let text = std::fs::read_to_string(self.path()).expect("read store");
        serde_json::from_str(&text).expect("parse store")
    }
}

/// Run `cq` against `store`, pointing both environments at the given URLs.
pub fn run_cq(
    store: &Path,
    uat_url: &str,
    prod_url: &str,
    args: &[&str],
    stdin: &str,
) -> Output {
    let bin = env!("CARGO_BIN_EXE_cq");
    let mut child = Command::new(bin)
        .arg("--store")
        .arg(store)
        .args(args)
        .env("CASE_QUERY_UAT_URL", uat_url)
        .env("CASE_QUERY_PROD_URL", prod_url)
        .env_remove("CASE_QUERY_STORE")
        .env_remove("CASE_QUERY_LOG")
        .env_remove("HTTP_PROXY")
        .env_remove("http_proxy")
        .env_remove("HTTPS_PROXY")
        .env_remove("https_proxy")
        .env_remove("ALL_PROXY")
        .env_remove("all_proxy")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn cq");
    if let Some(mut input) = child.stdin.take() {
        // The binary may exit before reading stdin.
        let _ = input.write_all(stdin.as_bytes());
    }
    child.wait_with_output().expect("wait for cq")
}

pub fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

/// A URL nothing listens on, for environments a test must not reach.
pub const UNREACHABLE_URL: &str = "http://127.0.0.1:9/unreachable";
