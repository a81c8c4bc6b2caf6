//! Minimal HTTP/1.1 responder for exercising the control-plane client.
//!
//! Each connection receives the next scripted `(status, body)` pair and is
//! then closed. Once the script runs out every request gets a 500.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Request captured by [`HttpStub`].
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    /// Returns the first header named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Default)]
struct StubState {
    responses: VecDeque<(u16, String)>,
    requests: Vec<RecordedRequest>,
}

/// Scripted HTTP server bound to an ephemeral local port.
pub struct HttpStub {
    address: SocketAddr,
    state: Arc<Mutex<StubState>>,
    task: JoinHandle<()>,
}

impl HttpStub {
    /// Starts serving `responses` in order.
    pub async fn start(responses: Vec<(u16, &str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub listener");
        let address = listener.local_addr().expect("stub listener address");
        let state = Arc::new(Mutex::new(StubState {
            responses: responses
                .into_iter()
                .map(|(status, body)| (status, body.to_owned()))
                .collect(),
            requests: Vec::new(),
        }));

        let shared = Arc::clone(&state);
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let connection_state = Arc::clone(&shared);
                tokio::spawn(async move {
                    serve(stream, connection_state).await;
                });
            }
        });

        Self {
            address,
            state,
            task,
        }
    }

    /// Returns an API endpoint pointing at the stub.
    pub fn endpoint(&self) -> String {
        format!("http://{}/v1", self.address)
    }

    /// Returns the requests received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .requests
            .clone()
    }
}

impl Drop for HttpStub {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(stream: TcpStream, state: Arc<Mutex<StubState>>) {
    let mut reader = BufReader::new(stream);
    let Some(request) = read_request(&mut reader).await else {
        return;
    };

    let (status, body) = {
        let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
        guard.requests.push(request);
        guard
            .responses
            .pop_front()
            .unwrap_or_else(|| (500, String::from("{\"error\":\"unscripted\"}")))
    };

    let response = format!(
        "HTTP/1.1 {status} STUB\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let mut stream = reader.into_inner();
    stream.write_all(response.as_bytes()).await.ok();
    stream.shutdown().await.ok();
}

async fn read_request(reader: &mut BufReader<TcpStream>) -> Option<RecordedRequest> {
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await.ok()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_owned();
    let target = parts.next()?.to_owned();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).await.ok()?;
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            break;
        }
        if let Some((key, value)) = trimmed.split_once(':') {
            headers.push((key.trim().to_owned(), value.trim().to_owned()));
        }
    }

    let length = headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0; length];
    reader.read_exact(&mut body).await.ok()?;

    Some(RecordedRequest {
        method,
        target,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}
