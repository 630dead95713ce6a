//! Local network stubs and helpers shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use watchdog_service::database::MemoryStore;
use watchdog_service::monitoring::MonitorScheduler;
use watchdog_service::notifications::{NotificationDispatcher, NotificationTransport, TransportError};

/// HTTP server answering every request with a switchable status code
pub struct HttpStub {
    pub port: u16,
    status: Arc<AtomicU16>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl HttpStub {
    pub async fn start(status: u16) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let status = Arc::new(AtomicU16::new(status));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let (task_status, task_requests) = (status.clone(), requests.clone());
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let status = task_status.clone();
                let requests = task_requests.clone();
                tokio::spawn(async move { respond(socket, status, requests).await });
            }
        });

        Self { port, status, requests }
    }

    pub fn set_status(&self, status: u16) {
        self.status.store(status, Ordering::SeqCst);
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{path}", self.port)
    }

    /// Raw requests received so far
    pub async fn requests(&self) -> Vec<String> {
        self.requests.lock().await.clone()
    }
}

async fn respond(mut socket: TcpStream, status: Arc<AtomicU16>, requests: Arc<Mutex<Vec<String>>>) {
    let request = read_request(&mut socket).await;
    requests.lock().await.push(request);

    let code = status.load(Ordering::SeqCst);
    let response = format!("HTTP/1.1 {code} Stub\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Read headers and a `Content-Length` body
async fn read_request(socket: &mut TcpStream) -> String {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let Ok(read) = socket.read(&mut chunk).await else { break };
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);

        let text = String::from_utf8_lossy(&buffer);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buffer.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }

    String::from_utf8_lossy(&buffer).to_string()
}

/// Body of a raw HTTP request
pub fn request_body(request: &str) -> &str {
    request.split_once("\r\n\r\n").map(|(_, body)| body).unwrap_or("")
}

/// Accepts connections and never answers
pub struct HangingServer {
    pub port: u16,
    accepted: Arc<Mutex<Vec<TcpStream>>>,
}

impl HangingServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accepted = Arc::new(Mutex::new(Vec::new()));

        let held = accepted.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                held.lock().await.push(socket);
            }
        });

        Self { port, accepted }
    }

    pub async fn connections(&self) -> usize {
        self.accepted.lock().await.len()
    }
}

/// A port nothing listens on
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Transport that keeps messages in memory
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<SentMessage>>,
}

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
impl NotificationTransport for RecordingTransport {
    fn channel(&self) -> &'static str {
        "recording"
    }

    async fn deliver(&self, recipient: &str, subject: &str, body: &str) -> Result<(), TransportError> {
        self.sent.lock().await.push(SentMessage {
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

impl RecordingTransport {
    pub async fn subjects(&self) -> Vec<String> {
        self.sent.lock().await.iter().map(|m| m.subject.clone()).collect()
    }
}

/// Scheduler over a memory store with a recording transport
pub fn memory_scheduler(probe_timeout: Duration) -> (MonitorScheduler, Arc<MemoryStore>, Arc<RecordingTransport>) {
    let store = Arc::new(MemoryStore::new());
    let transport = Arc::new(RecordingTransport::default());
    let dispatcher = Arc::new(NotificationDispatcher::new(transport.clone(), store.clone()));
    let scheduler =
        MonitorScheduler::new(store.clone(), store.clone(), dispatcher).with_probe_timeout(probe_timeout);
    (scheduler, store, transport)
}

/// Poll `condition` until it holds or `limit` elapses
pub async fn wait_for<F, Fut>(limit: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if condition().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
