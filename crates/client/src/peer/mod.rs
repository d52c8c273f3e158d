//! Peer connection lifecycle: state machine, construction, observers
//!
//! The connection is modeled as an explicit state machine driven by discrete
//! events from the underlying WebRTC stack rather than by nested callbacks
//! holding mutable shared state. Observers write into a [`StateCell`] that
//! enforces the legal transition set; the rest of the crate only reads it.
//!
//! ICE is non-trickling: the client waits for candidate gathering to finish,
//! then performs the single signaling exchange. Individual candidates are
//! consumed only for logging.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_H264};
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::{
    RTCRtpCodecCapability, RTCRtpCodecParameters, RTPCodecType,
};

use crate::config::ClientConfig;
use crate::media::{VIDEO_CLOCK_RATE, VIDEO_FMTP_LINE, VIDEO_PAYLOAD_TYPE};
use crate::{Error, Result};

/// Lifecycle of one peer connection
///
/// `New → Gathering → Connecting → Connected`, with `Failed` on any
/// terminal error and `Closed` reachable from anywhere via explicit
/// teardown. No reconnection: a Failed connection is torn down and the
/// caller creates a fresh instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Constructed, no negotiation started
    New,
    /// Local description set, ICE candidate gathering in progress
    Gathering,
    /// Answer applied, transport handshake in progress
    Connecting,
    /// Media and data channels usable
    Connected,
    /// Transport lost connectivity; may still recover at the ICE layer
    Disconnected,
    /// Terminal failure for this attempt
    Failed,
    /// Explicitly torn down
    Closed,
}

impl ConnectionState {
    /// Whether the state machine accepts `next` as an event-driven transition
    ///
    /// `Closed` is excluded from `Failed` here so that a failure recorded
    /// just before teardown stays observable; explicit teardown uses
    /// [`StateCell::force`] instead.
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        match (self, next) {
            (Failed, _) | (Closed, _) => false,
            (_, Closed) => true,
            (New, Gathering) | (New, Failed) => true,
            (Gathering, Connecting) | (Gathering, Connected) | (Gathering, Failed) => true,
            (Connecting, Connected) | (Connecting, Disconnected) | (Connecting, Failed) => true,
            (Connected, Disconnected) | (Connected, Failed) => true,
            (Disconnected, Connecting) | (Disconnected, Connected) | (Disconnected, Failed) => {
                true
            }
            _ => false,
        }
    }

    /// Whether no further event-driven transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Failed | ConnectionState::Closed)
    }

    /// Map the library's connection state onto ours; `None` for states that
    /// carry no new information (`New`, `Unspecified`)
    fn from_rtc(state: RTCPeerConnectionState) -> Option<Self> {
        match state {
            RTCPeerConnectionState::Connecting => Some(ConnectionState::Connecting),
            RTCPeerConnectionState::Connected => Some(ConnectionState::Connected),
            RTCPeerConnectionState::Disconnected => Some(ConnectionState::Disconnected),
            RTCPeerConnectionState::Failed => Some(ConnectionState::Failed),
            RTCPeerConnectionState::Closed => Some(ConnectionState::Closed),
            RTCPeerConnectionState::New | RTCPeerConnectionState::Unspecified => None,
        }
    }
}

/// Shared, observer-writable connection state
///
/// Observers run on the WebRTC stack's own worker threads; the lock is
/// never held across an `.await`.
pub struct StateCell {
    current: RwLock<ConnectionState>,
}

impl StateCell {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(ConnectionState::New),
        }
    }

    pub fn get(&self) -> ConnectionState {
        *self.current.read()
    }

    /// Event-driven transition; rejected edges are logged and ignored
    pub fn transition(&self, next: ConnectionState) -> bool {
        let mut current = self.current.write();
        if current.can_transition_to(next) {
            info!("Connection state: {:?} -> {:?}", *current, next);
            *current = next;
            true
        } else {
            debug!("Ignoring state event {:?} in state {:?}", next, *current);
            false
        }
    }

    /// Unconditional transition, for explicit teardown and failure recording
    pub fn force(&self, next: ConnectionState) {
        let mut current = self.current.write();
        if *current != next {
            info!("Connection state: {:?} -> {:?} (forced)", *current, next);
            *current = next;
        }
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the peer connection with the single negotiated video profile
///
/// Registers one H.264 codec (payload type 102, 90 kHz) plus the default
/// interceptor chain, and configures the STUN servers from `config`.
pub async fn build_peer_connection(config: &ClientConfig) -> Result<Arc<RTCPeerConnection>> {
    let mut media_engine = MediaEngine::default();
    media_engine
        .register_codec(
            RTCRtpCodecParameters {
                capability: RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_H264.to_owned(),
                    clock_rate: VIDEO_CLOCK_RATE,
                    channels: 0,
                    sdp_fmtp_line: VIDEO_FMTP_LINE.to_owned(),
                    rtcp_feedback: vec![],
                },
                payload_type: VIDEO_PAYLOAD_TYPE,
                ..Default::default()
            },
            RTPCodecType::Video,
        )
        .map_err(|e| Error::Negotiation(format!("Failed to register H.264 codec: {}", e)))?;

    let mut registry = Registry::new();
    registry = register_default_interceptors(registry, &mut media_engine)
        .map_err(|e| Error::Negotiation(format!("Failed to register interceptors: {}", e)))?;

    let api = APIBuilder::new()
        .with_media_engine(media_engine)
        .with_interceptor_registry(registry)
        .build();

    let rtc_config = RTCConfiguration {
        ice_servers: if config.stun_servers.is_empty() {
            vec![]
        } else {
            vec![RTCIceServer {
                urls: config.stun_servers.clone(),
                ..Default::default()
            }]
        },
        ..Default::default()
    };

    let peer_connection = api
        .new_peer_connection(rtc_config)
        .await
        .map_err(|e| Error::Negotiation(format!("Failed to create peer connection: {}", e)))?;

    info!("Created WebRTC peer connection");
    Ok(Arc::new(peer_connection))
}

/// Wire the state/candidate observers onto a freshly built peer connection
///
/// `video_open` is flipped with the Connected/Disconnected edges so the
/// synchronous send path can check it without touching async state.
pub fn attach_observers(
    peer_connection: &Arc<RTCPeerConnection>,
    state: Arc<StateCell>,
    video_open: Arc<AtomicBool>,
) {
    let state_for_pc = Arc::clone(&state);
    peer_connection.on_peer_connection_state_change(Box::new(move |rtc_state| {
        let state = Arc::clone(&state_for_pc);
        let video_open = Arc::clone(&video_open);
        Box::pin(async move {
            debug!("Peer connection state event: {:?}", rtc_state);
            if let Some(next) = ConnectionState::from_rtc(rtc_state) {
                match next {
                    ConnectionState::Connected => video_open.store(true, Ordering::SeqCst),
                    ConnectionState::Disconnected
                    | ConnectionState::Failed
                    | ConnectionState::Closed => video_open.store(false, Ordering::SeqCst),
                    _ => {}
                }
                state.transition(next);
            }
        })
    }));

    peer_connection.on_ice_connection_state_change(Box::new(move |ice_state| {
        Box::pin(async move {
            debug!("ICE connection state: {:?}", ice_state);
        })
    }));

    peer_connection.on_ice_gathering_state_change(Box::new(move |gathering_state| {
        Box::pin(async move {
            debug!("ICE gathering state: {:?}", gathering_state);
        })
    }));

    // Non-trickling: candidates are informational, never sent individually.
    peer_connection.on_ice_candidate(Box::new(move |candidate| {
        Box::pin(async move {
            if let Some(candidate) = candidate {
                match candidate.to_json() {
                    Ok(json) => debug!("Gathered ICE candidate: {}", json.candidate),
                    Err(e) => warn!("Failed to serialize ICE candidate: {}", e),
                }
            }
        })
    }));
}
