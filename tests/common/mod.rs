//! Shared utilities for relay integration tests.

#![allow(dead_code)]

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use image_relay::{RelayConfig, RelayServer, Shutdown};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A canned origin answer.
#[derive(Clone)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Send a `Content-Length` matching `body`.
    pub framed: bool,
}

impl MockResponse {
    pub fn ok(content_type: &str, body: Vec<u8>) -> Self {
        Self {
            status: 200,
            headers: vec![("Content-Type".into(), content_type.into())],
            body,
            framed: true,
        }
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".into(), "text/plain".into())],
            body: body.as_bytes().to_vec(),
            framed: true,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Read up to the end of the request head; returns the request path.
async fn read_request_path(socket: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
    String::from_utf8_lossy(&head)
        .split_whitespace()
        .nth(1)
        .unwrap_or("/")
        .to_string()
}

fn response_head(response: &MockResponse) -> String {
    let reason = StatusCode::from_u16(response.status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown");
    let mut head = format!("HTTP/1.1 {} {}\r\nConnection: close\r\n", response.status, reason);
    for (name, value) in &response.headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    if response.framed {
        head.push_str(&format!("Content-Length: {}\r\n", response.body.len()));
    }
    head.push_str("\r\n");
    head
}

/// Start an origin that answers every request via `f(path)`.
///
/// Returns the bound address and a counter of accepted connections.
pub async fn start_origin<F>(f: F) -> (SocketAddr, Arc<AtomicUsize>)
where
    F: Fn(&str) -> MockResponse + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            let f = f.clone();
            tokio::spawn(async move {
                let path = read_request_path(&mut socket).await;
                let response = f(&path);
                let _ = socket.write_all(response_head(&response).as_bytes()).await;
                let _ = socket.write_all(&response.body).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, hits)
}

/// Origin that promises `declared` bytes, sends `sent`, then hangs up.
pub async fn start_truncating_origin(content_type: &'static str, declared: usize, sent: Vec<u8>) -> SocketAddr {
    start_partial_origin(content_type, declared, sent, Duration::from_millis(50)).await
}

/// Origin that promises `declared` bytes, sends `sent`, then goes quiet
/// without closing the socket.
pub async fn start_stalling_origin(content_type: &'static str, declared: usize, sent: Vec<u8>) -> SocketAddr {
    start_partial_origin(content_type, declared, sent, Duration::from_secs(60)).await
}

async fn start_partial_origin(
    content_type: &'static str,
    declared: usize,
    sent: Vec<u8>,
    hold: Duration,
) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let sent = sent.clone();
            tokio::spawn(async move {
                read_request_path(&mut socket).await;
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    content_type, declared
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&sent).await;
                let _ = socket.flush().await;
                tokio::time::sleep(hold).await;
                drop(socket);
            });
        }
    });

    addr
}

/// How an endless origin frames its body.
#[derive(Clone)]
pub struct EndlessBody {
    pub content_type: &'static str,
    /// Declared `Content-Length`; unframed when `None`.
    pub declared: Option<u64>,
    /// Bytes sent before the filler starts.
    pub prefix: Vec<u8>,
}

impl EndlessBody {
    /// Opaque unframed stream; the relay pipes it through.
    pub fn opaque() -> Self {
        Self {
            content_type: "application/octet-stream",
            declared: None,
            prefix: Vec::new(),
        }
    }

    /// A huge "PNG" that sniffs as an image; the relay transcodes it.
    pub fn huge_png() -> Self {
        Self {
            content_type: "image/png",
            declared: Some(1 << 40),
            prefix: b"\x89PNG\r\n\x1a\n".to_vec(),
        }
    }
}

/// Origin that streams filler forever until its peer goes away.
///
/// The flag flips once a write fails, i.e. the relay released the socket.
pub async fn start_endless_origin(body: EndlessBody) -> (SocketAddr, Arc<AtomicBool>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let released = Arc::new(AtomicBool::new(false));
    let flag = released.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let flag = flag.clone();
            let body = body.clone();
            tokio::spawn(async move {
                read_request_path(&mut socket).await;
                let mut head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nConnection: close\r\n",
                    body.content_type
                );
                if let Some(declared) = body.declared {
                    head.push_str(&format!("Content-Length: {}\r\n", declared));
                }
                head.push_str("\r\n");

                let mut first = head.into_bytes();
                first.extend_from_slice(&body.prefix);
                if socket.write_all(&first).await.is_err() {
                    flag.store(true, Ordering::SeqCst);
                    return;
                }
                let chunk = vec![b'x'; 16 * 1024];
                loop {
                    if socket.write_all(&chunk).await.is_err() {
                        flag.store(true, Ordering::SeqCst);
                        return;
                    }
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            });
        }
    });

    (addr, released)
}

/// Poll `flag` until it is set or `within` elapses.
pub async fn wait_for_flag(flag: &AtomicBool, within: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while !flag.load(Ordering::SeqCst) {
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    true
}

/// Start the relay on an ephemeral port.
pub async fn start_relay(mut config: RelayConfig) -> (SocketAddr, Shutdown) {
    config.listener.bind_address = "127.0.0.1:0".into();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = RelayServer::new(config).unwrap();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, shutdown)
}

/// Client that neither follows redirects nor honours proxy env vars.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}

pub fn relay_url(relay: SocketAddr, query: &str) -> String {
    format!("http://{}/?{}", relay, query)
}

/// Noisy colour PNG; noise keeps it well above the compression thresholds.
pub fn noisy_png(width: u32, height: u32) -> Vec<u8> {
    let mut rng = fastrand::Rng::with_seed(7);
    let image = RgbImage::from_fn(width, height, |x, _| {
        Rgb([rng.u8(..), (x % 256) as u8, rng.u8(..)])
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}
