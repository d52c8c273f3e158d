//! Test fixtures: a minimal HTTP signaling server
//!
//! Accepts offer POSTs, records the raw request body, and replies with a
//! canned response, or with a real SDP answer negotiated by an in-process
//! peer. Just enough HTTP to exercise the signaling client without a real
//! pipeline server.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;

/// Install the test logger; repeated calls are no-ops
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Minimal SDP that the session-description parser accepts
pub const MINIMAL_ANSWER_SDP: &str = "v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n";

/// What the mock sends back for each request
#[derive(Clone)]
pub enum MockResponse {
    /// A complete HTTP response with the given status line and body
    Reply {
        status: &'static str,
        body: String,
    },
    /// Accept the connection and never respond
    Hang,
}

impl MockResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        MockResponse::Reply {
            status: "200 OK",
            body: body.into(),
        }
    }

    pub fn server_error() -> Self {
        MockResponse::Reply {
            status: "500 Internal Server Error",
            body: "pipeline worker unavailable".to_string(),
        }
    }

    /// A well-formed answer payload built from [`MINIMAL_ANSWER_SDP`]
    pub fn valid_answer() -> Self {
        let body = serde_json::json!({
            "sdp": MINIMAL_ANSWER_SDP,
            "type": "answer",
        });
        Self::ok(body.to_string())
    }

    fn to_http(&self) -> Option<String> {
        match self {
            MockResponse::Reply { status, body } => Some(format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            )),
            MockResponse::Hang => None,
        }
    }
}

/// One-endpoint signaling server bound to an ephemeral local port
pub struct MockSignalingServer {
    addr: SocketAddr,
    last_body: Arc<Mutex<Option<String>>>,
}

impl MockSignalingServer {
    pub async fn start(response: MockResponse) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("local addr");
        let last_body = Arc::new(Mutex::new(None));

        let captured = Arc::clone(&last_body);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let response = response.clone();
                let captured = Arc::clone(&captured);
                tokio::spawn(async move {
                    handle_request(stream, response, captured).await;
                });
            }
        });

        Self { addr, last_body }
    }

    /// Base URL to hand to the client under test
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Body of the most recent request, if one arrived
    pub fn last_request_body(&self) -> Option<String> {
        self.last_body.lock().clone()
    }
}

/// Signaling server that negotiates real answers with an in-process peer
///
/// Each offer POST gets its own answering `RTCPeerConnection` built with the
/// default codec set and host candidates only, so the client under test can
/// complete the full ICE/DTLS handshake without leaving the machine. The
/// answering peers stay alive for the lifetime of the fixture.
pub struct AnsweringServer {
    addr: SocketAddr,
    peers: Arc<Mutex<Vec<Arc<RTCPeerConnection>>>>,
}

impl AnsweringServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("local addr");
        let peers: Arc<Mutex<Vec<Arc<RTCPeerConnection>>>> = Arc::new(Mutex::new(Vec::new()));

        let held = Arc::clone(&peers);
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let held = Arc::clone(&held);
                tokio::spawn(async move {
                    let Some(body) = read_request_body(&mut stream).await else {
                        return;
                    };

                    let offer_sdp = serde_json::from_str::<serde_json::Value>(&body)
                        .ok()
                        .and_then(|value| value["offer"]["sdp"].as_str().map(str::to_string));

                    let response = match offer_sdp {
                        Some(sdp) => match answer_offer(sdp).await {
                            Some((peer, answer_sdp)) => {
                                held.lock().push(peer);
                                let body = serde_json::json!({
                                    "sdp": answer_sdp,
                                    "type": "answer",
                                });
                                MockResponse::ok(body.to_string())
                            }
                            None => MockResponse::server_error(),
                        },
                        None => MockResponse::server_error(),
                    };

                    if let Some(http) = response.to_http() {
                        let _ = stream.write_all(http.as_bytes()).await;
                        let _ = stream.shutdown().await;
                    }
                });
            }
        });

        Self { addr, peers }
    }

    /// Base URL to hand to the client under test
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

/// Build an answering peer for the given offer and run its own gathering to
/// completion; returns the peer (which must outlive the handshake) and the
/// complete answer SDP
async fn answer_offer(offer_sdp: String) -> Option<(Arc<RTCPeerConnection>, String)> {
    let mut media_engine = MediaEngine::default();
    media_engine.register_default_codecs().ok()?;
    let mut registry = Registry::new();
    registry = register_default_interceptors(registry, &mut media_engine).ok()?;
    let api = APIBuilder::new()
        .with_media_engine(media_engine)
        .with_interceptor_registry(registry)
        .build();

    let peer = Arc::new(
        api.new_peer_connection(RTCConfiguration::default())
            .await
            .ok()?,
    );

    let offer = RTCSessionDescription::offer(offer_sdp).ok()?;
    peer.set_remote_description(offer).await.ok()?;

    let answer = peer.create_answer(None).await.ok()?;
    let mut gathered = peer.gathering_complete_promise().await;
    peer.set_local_description(answer).await.ok()?;
    let _ = gathered.recv().await;

    let local = peer.local_description().await?;
    Some((peer, local.sdp))
}

async fn handle_request(
    mut stream: TcpStream,
    response: MockResponse,
    captured: Arc<Mutex<Option<String>>>,
) {
    let Some(body) = read_request_body(&mut stream).await else {
        return;
    };
    *captured.lock() = Some(body);

    match response.to_http() {
        Some(http) => {
            let _ = stream.write_all(http.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
        None => {
            // Hold the connection open until the client gives up.
            tokio::time::sleep(std::time::Duration::from_secs(120)).await;
        }
    }
}

/// Read one HTTP request (headers, then Content-Length body); returns the body
async fn read_request_body(stream: &mut TcpStream) -> Option<String> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];

    let header_end = loop {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return None,
            Ok(n) => data.extend_from_slice(&buf[..n]),
        }
        if let Some(pos) = find_subsequence(&data, b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&data[..header_end]).to_ascii_lowercase();
    let content_length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while data.len() < header_end + content_length {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => data.extend_from_slice(&buf[..n]),
        }
    }

    Some(String::from_utf8_lossy(&data[header_end..]).to_string())
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
