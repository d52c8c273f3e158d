//! Client configuration

use std::time::Duration;

/// Default signaling server base URL (local pipeline server)
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8888";

/// Public STUN server used for ICE candidate gathering. No TURN fallback.
pub const DEFAULT_STUN_SERVER: &str = "stun:stun.l.google.com:19302";

/// Bounded wait for the single offer/answer HTTP exchange
pub const DEFAULT_SIGNALING_TIMEOUT: Duration = Duration::from_secs(60);

/// Label of the bidirectional control data channel
pub const CONTROL_CHANNEL_LABEL: &str = "control";

/// Configuration for one [`crate::PipelineClient`] instance
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the signaling server; the offer is POSTed to `{url}/offer`
    pub server_url: String,

    /// STUN servers for ICE gathering. Empty means host candidates only
    /// (useful for tests and same-host deployments).
    pub stun_servers: Vec<String>,

    /// Timeout applied to the signaling HTTP round trip
    pub signaling_timeout: Duration,

    /// Label for the control data channel
    pub control_channel_label: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            stun_servers: vec![DEFAULT_STUN_SERVER.to_string()],
            signaling_timeout: DEFAULT_SIGNALING_TIMEOUT,
            control_channel_label: CONTROL_CHANNEL_LABEL.to_string(),
        }
    }
}

impl ClientConfig {
    /// Configuration pointing at the given server, defaults elsewhere
    pub fn with_server_url(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Default::default()
        }
    }
}
