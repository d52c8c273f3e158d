//! Bidirectional control channel over a WebRTC data channel

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::RTCDataChannel;
use webrtc::peer_connection::RTCPeerConnection;

use crate::{Error, Result};

/// Control channel lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlChannelState {
    /// Channel created, transport not yet negotiated
    Connecting,
    /// Open and ready for messages
    Open,
    /// Close requested
    Closing,
    /// Closed; never reopens
    Closed,
}

/// Message and byte counters for one channel
#[derive(Debug, Clone, Copy, Default)]
pub struct ControlChannelStats {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
}

/// Named bidirectional message pipe for non-media signaling
///
/// Surfaces only textual messages; binary payloads are logged and dropped
/// (parsing them is out of scope for this core).
pub struct ControlChannel {
    label: String,
    rtc_channel: Arc<RTCDataChannel>,
    state: Arc<RwLock<ControlChannelState>>,
    stats: Arc<RwLock<ControlChannelStats>>,
}

impl ControlChannel {
    /// Open a named channel on the peer connection and register the
    /// lifecycle observers
    pub async fn new(peer_connection: &RTCPeerConnection, label: &str) -> Result<Self> {
        let rtc_channel = peer_connection
            .create_data_channel(label, None)
            .await
            .map_err(|e| {
                Error::Negotiation(format!("Failed to create data channel '{}': {}", label, e))
            })?;

        let channel = Self {
            label: label.to_string(),
            rtc_channel,
            state: Arc::new(RwLock::new(ControlChannelState::Connecting)),
            stats: Arc::new(RwLock::new(ControlChannelStats::default())),
        };
        channel.setup_lifecycle_handlers();

        info!("Created control channel '{}'", label);
        Ok(channel)
    }

    fn setup_lifecycle_handlers(&self) {
        let state = Arc::clone(&self.state);
        let label = self.label.clone();
        self.rtc_channel.on_open(Box::new(move || {
            let state = Arc::clone(&state);
            let label = label.clone();
            Box::pin(async move {
                info!("Control channel '{}' opened", label);
                *state.write().await = ControlChannelState::Open;
            })
        }));

        let state = Arc::clone(&self.state);
        let label = self.label.clone();
        self.rtc_channel.on_close(Box::new(move || {
            let state = Arc::clone(&state);
            let label = label.clone();
            Box::pin(async move {
                info!("Control channel '{}' closed", label);
                *state.write().await = ControlChannelState::Closed;
            })
        }));

        let label = self.label.clone();
        self.rtc_channel.on_error(Box::new(move |err| {
            let label = label.clone();
            Box::pin(async move {
                error!("Control channel '{}' error: {}", label, err);
            })
        }));
    }

    /// Register the textual-message handler
    ///
    /// Binary payloads and non-UTF-8 text are logged at debug level and not
    /// delivered.
    pub fn on_text<F, Fut>(&self, handler: F)
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let stats = Arc::clone(&self.stats);
        let label = self.label.clone();
        let handler = Arc::new(handler);

        self.rtc_channel
            .on_message(Box::new(move |msg: DataChannelMessage| {
                let stats = Arc::clone(&stats);
                let label = label.clone();
                let handler = Arc::clone(&handler);
                Box::pin(async move {
                    let len = msg.data.len();
                    {
                        let mut stats = stats.write().await;
                        stats.bytes_received += len as u64;
                        stats.messages_received += 1;
                    }

                    if !msg.is_string {
                        debug!(
                            "Control channel '{}' received {} binary bytes (ignored)",
                            label, len
                        );
                        return;
                    }

                    match String::from_utf8(msg.data.to_vec()) {
                        Ok(text) => {
                            debug!("Control channel '{}' received: {}", label, text);
                            handler(text).await;
                        }
                        Err(e) => {
                            warn!(
                                "Control channel '{}' text message is not UTF-8: {}",
                                label, e
                            );
                        }
                    }
                })
            }));
    }

    /// Send a textual control message
    ///
    /// Fails with [`Error::TransportSend`] unless the channel is open.
    pub async fn send_text(&self, text: &str) -> Result<()> {
        let state = *self.state.read().await;
        if state != ControlChannelState::Open {
            return Err(Error::TransportSend(format!(
                "Control channel '{}' is not open (state: {:?})",
                self.label, state
            )));
        }

        self.rtc_channel
            .send_text(text.to_string())
            .await
            .map_err(|e| {
                Error::TransportSend(format!(
                    "Failed to send on control channel '{}': {}",
                    self.label, e
                ))
            })?;

        let mut stats = self.stats.write().await;
        stats.bytes_sent += text.len() as u64;
        stats.messages_sent += 1;

        Ok(())
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub async fn state(&self) -> ControlChannelState {
        *self.state.read().await
    }

    pub async fn is_open(&self) -> bool {
        *self.state.read().await == ControlChannelState::Open
    }

    pub async fn stats(&self) -> ControlChannelStats {
        *self.stats.read().await
    }

    /// Close the channel; repeated calls are no-ops
    pub async fn close(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if matches!(
                *state,
                ControlChannelState::Closing | ControlChannelState::Closed
            ) {
                return Ok(());
            }
            *state = ControlChannelState::Closing;
        }

        self.rtc_channel.close().await.map_err(|e| {
            Error::TransportSend(format!(
                "Failed to close control channel '{}': {}",
                self.label, e
            ))
        })?;

        *self.state.write().await = ControlChannelState::Closed;
        debug!("Control channel '{}' closed", self.label);
        Ok(())
    }
}
