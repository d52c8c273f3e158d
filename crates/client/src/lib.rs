//! WebRTC client core for remote media-processing pipelines
//!
//! Establishes one peer connection to a pipeline server: builds a local
//! session description, waits for full ICE candidate gathering
//! (non-trickling), exchanges offer and answer in a single HTTP POST
//! alongside an opaque pipeline descriptor, opens a bidirectional control
//! channel, and streams raw video frames as fragmented RTP packets.
//!
//! # Example
//!
//! ```ignore
//! use framepipe_client::{ClientConfig, PipelineClient, VideoFrame};
//!
//! let client = PipelineClient::new(ClientConfig::with_server_url("http://127.0.0.1:8888"))?;
//! client.connect().await?;
//!
//! // Host render loop: frames before the transport is Connected are
//! // silently dropped.
//! let sent = client.send_frame(&VideoFrame::new(&buffer, 1280, 720, 1280 * 4)).await?;
//!
//! if let Some(processed) = client.receive_frame().await {
//!     // hand the processed frame back to the host
//! }
//!
//! client.close().await;
//! ```
//!
//! A failed connection attempt is terminal: the client tears down and the
//! caller creates a fresh instance. There is no retry, reconnection, or
//! renegotiation in this core.

pub mod channels;
pub mod client;
pub mod config;
pub mod error;
pub mod media;
pub mod peer;
pub mod pipeline;
pub mod signaling;

pub use channels::{ControlChannel, ControlChannelState};
pub use client::{PipelineClient, VideoFrame};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use peer::ConnectionState;
pub use pipeline::PipelineSpec;
pub use signaling::SignalingClient;
