//! Top-level pipeline client
//!
//! Owns one peer connection, its channels, and the packetizer. The
//! establishment sequence is strictly: build connection → add video track →
//! open control channel → create offer → wait for full ICE gathering →
//! single HTTP exchange → apply answer. Any failure along the way records
//! Failed and tears the attempt down; the caller creates a fresh instance
//! to try again.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use webrtc::peer_connection::RTCPeerConnection;

use crate::channels::ControlChannel;
use crate::config::ClientConfig;
use crate::media::{Packetizer, VideoChannel};
use crate::peer::{self, ConnectionState, StateCell};
use crate::pipeline::PipelineSpec;
use crate::signaling::SignalingClient;
use crate::{Error, Result};

/// One raw video frame borrowed from the host
///
/// The buffer is only touched for the duration of a [`PipelineClient::send_frame`]
/// call; the host keeps ownership and releases it afterwards.
#[derive(Debug, Clone, Copy)]
pub struct VideoFrame<'a> {
    /// Contiguous pixel data, at least `stride × height` bytes
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
    /// Row stride in bytes
    pub stride: u32,
}

impl<'a> VideoFrame<'a> {
    pub fn new(data: &'a [u8], width: u32, height: u32, stride: u32) -> Self {
        Self {
            data,
            width,
            height,
            stride,
        }
    }

    /// Bytes actually transmitted: `stride × height`
    pub fn len(&self) -> usize {
        self.stride as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The transmitted slice, validated before any transport activity
    fn payload(&self) -> Result<&'a [u8]> {
        let expected = self.len();
        if self.data.is_empty() || expected == 0 {
            return Err(Error::InvalidInput("empty frame buffer".to_string()));
        }
        if self.data.len() < expected {
            return Err(Error::InvalidInput(format!(
                "frame buffer is {} bytes, stride × height requires {}",
                self.data.len(),
                expected
            )));
        }
        Ok(&self.data[..expected])
    }
}

/// Live connection pieces, created by a successful `connect()`
struct Session {
    peer_connection: Arc<RTCPeerConnection>,
    video: VideoChannel,
    control: Arc<ControlChannel>,
    closed: AtomicBool,
}

impl Session {
    /// Close channels and connection; safe to call any number of times
    async fn teardown(&self) {
        // Converging failure paths may all request teardown; only the first
        // one acts.
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.video.mark_closed();
        if let Err(e) = self.control.close().await {
            debug!("Control channel close during teardown: {}", e);
        }
        if let Err(e) = self.peer_connection.close().await {
            warn!("Peer connection close during teardown: {}", e);
        }
        info!("Peer connection closed");
    }
}

/// WebRTC client for one connection to a remote processing pipeline
pub struct PipelineClient {
    config: ClientConfig,
    pipeline: PipelineSpec,
    signaling: SignalingClient,
    state: Arc<StateCell>,
    packetizer: Packetizer,
    session: RwLock<Option<Session>>,
    /// Processed frames received back from the server. The inbound reader
    /// does not reassemble frames yet, so this drains empty; `receive_frame`
    /// returning `None` is the normal steady state.
    inbound: Arc<Mutex<VecDeque<Vec<u8>>>>,
}

impl PipelineClient {
    /// Client with the default pass-through pipeline descriptor
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_pipeline(config, PipelineSpec::default())
    }

    /// Client forwarding the given descriptor verbatim to the server
    pub fn with_pipeline(config: ClientConfig, pipeline: PipelineSpec) -> Result<Self> {
        let signaling = SignalingClient::new(&config.server_url, config.signaling_timeout)?;
        Ok(Self {
            config,
            pipeline,
            signaling,
            state: Arc::new(StateCell::new()),
            packetizer: Packetizer::new(),
            session: RwLock::new(None),
            inbound: Arc::new(Mutex::new(VecDeque::new())),
        })
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Establish the connection: one signaling exchange, no retry
    ///
    /// Single-shot per client instance. On failure the state is Failed, the
    /// attempt is fully torn down, and the error is returned; create a fresh
    /// client to try again.
    pub async fn connect(&self) -> Result<()> {
        let current = self.state.get();
        if current != ConnectionState::New {
            return Err(Error::Negotiation(format!(
                "connect() already attempted (state: {:?}); create a fresh client",
                current
            )));
        }

        let peer_connection = match peer::build_peer_connection(&self.config).await {
            Ok(pc) => pc,
            Err(e) => {
                self.state.force(ConnectionState::Failed);
                return Err(e);
            }
        };

        let video = match VideoChannel::new(&peer_connection).await {
            Ok(video) => video,
            Err(e) => return Err(self.fail(&peer_connection, None, e).await),
        };
        peer::attach_observers(&peer_connection, Arc::clone(&self.state), video.open_flag());
        self.spawn_inbound_reader(&peer_connection);

        let control =
            match ControlChannel::new(&peer_connection, &self.config.control_channel_label).await {
                Ok(control) => Arc::new(control),
                Err(e) => return Err(self.fail(&peer_connection, None, e).await),
            };

        // Create the offer and wait for gathering to finish before signaling
        // (non-trickling ICE: one round trip instead of incremental
        // candidate exchange).
        let offer = match peer_connection.create_offer(None).await {
            Ok(offer) => offer,
            Err(e) => {
                let err = Error::Negotiation(format!("Failed to create offer: {}", e));
                return Err(self.fail(&peer_connection, Some(control.as_ref()), err).await);
            }
        };
        if let Err(e) = peer_connection.set_local_description(offer).await {
            let err = Error::Negotiation(format!("Failed to set local description: {}", e));
            return Err(self.fail(&peer_connection, Some(control.as_ref()), err).await);
        }
        self.state.transition(ConnectionState::Gathering);

        let mut gathering_done = peer_connection.gathering_complete_promise().await;
        let _ = gathering_done.recv().await;
        debug!("All ICE candidates have been gathered");

        let local_description = match peer_connection.local_description().await {
            Some(description) => description,
            None => {
                let err = Error::Negotiation("No local description after gathering".to_string());
                return Err(self.fail(&peer_connection, Some(control.as_ref()), err).await);
            }
        };
        debug!("Generated SDP offer:\n{}", local_description.sdp);

        let answer = match self
            .signaling
            .exchange(&local_description.sdp, &self.pipeline)
            .await
        {
            Ok(answer) => answer,
            Err(e) => return Err(self.fail(&peer_connection, Some(control.as_ref()), e).await),
        };

        if let Err(e) = peer_connection.set_remote_description(answer).await {
            let err = Error::Signaling(format!("Failed to apply remote description: {}", e));
            return Err(self.fail(&peer_connection, Some(control.as_ref()), err).await);
        }

        info!("Remote description applied; waiting for transport to connect");

        let mut session = self.session.write().await;
        *session = Some(Session {
            peer_connection,
            video,
            control,
            closed: AtomicBool::new(false),
        });

        Ok(())
    }

    /// Tear down a failed attempt and record the terminal state
    async fn fail(
        &self,
        peer_connection: &Arc<RTCPeerConnection>,
        control: Option<&ControlChannel>,
        err: Error,
    ) -> Error {
        warn!("Connection attempt failed: {}", err);
        if let Some(control) = control {
            if let Err(e) = control.close().await {
                debug!("Control channel close during teardown: {}", e);
            }
        }
        if let Err(e) = peer_connection.close().await {
            warn!("Peer connection close during teardown: {}", e);
        }
        self.state.force(ConnectionState::Failed);
        err
    }

    /// Log inbound RTP from the server's processed-video track
    ///
    /// Depacketization back into frames is not implemented; packets are
    /// drained so the receiver does not back up, and `receive_frame` keeps
    /// reporting no frame.
    fn spawn_inbound_reader(&self, peer_connection: &Arc<RTCPeerConnection>) {
        peer_connection.on_track(Box::new(move |track, _receiver, _transceiver| {
            Box::pin(async move {
                info!(
                    "Remote track added: kind={}, ssrc={}",
                    track.kind(),
                    track.ssrc()
                );
                tokio::spawn(async move {
                    loop {
                        match track.read_rtp().await {
                            Ok((packet, _)) => {
                                debug!("Received RTP packet: {} payload bytes", packet.payload.len());
                            }
                            Err(e) => {
                                debug!("Inbound RTP read ended: {}", e);
                                break;
                            }
                        }
                    }
                });
            })
        }));
    }

    /// Fragment and send one frame; returns the number of packets written
    ///
    /// A no-op returning `Ok(0)` while the connection is not yet Connected
    /// or the video channel is not open; normal during negotiation, not an
    /// error. An empty or undersized buffer is rejected with
    /// [`Error::InvalidInput`] before any transport activity. A mid-frame
    /// send failure aborts the remaining chunks of that frame only;
    /// already-sent chunks are not retracted.
    pub async fn send_frame(&self, frame: &VideoFrame<'_>) -> Result<usize> {
        let payload = frame.payload()?;

        let session_guard = self.session.read().await;
        let session = match session_guard.as_ref() {
            Some(session) => session,
            None => return Ok(0),
        };
        if self.state.get() != ConnectionState::Connected || !session.video.is_open() {
            return Ok(0);
        }

        let packets = self.packetizer.packetize(payload)?;
        let count = packets.len();
        for packet in &packets {
            if let Err(e) = session.video.write(packet).await {
                warn!("Aborting frame after send failure: {}", e);
                return Err(e);
            }
        }

        debug!("Sent frame as {} packets ({} bytes)", count, payload.len());
        Ok(count)
    }

    /// Pop the next processed frame received from the server, if any
    ///
    /// `None` is the normal steady condition (no video yet, or the receive
    /// path not implemented), not an error.
    pub async fn receive_frame(&self) -> Option<Vec<u8>> {
        self.inbound.lock().pop_front()
    }

    /// The control channel, once a connection attempt has succeeded
    pub async fn control(&self) -> Option<Arc<ControlChannel>> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|session| Arc::clone(&session.control))
    }

    /// Tear everything down; safe to call repeatedly and from any state
    pub async fn close(&self) {
        {
            let session = self.session.read().await;
            if let Some(session) = session.as_ref() {
                session.teardown().await;
            }
        }
        self.state.force(ConnectionState::Closed);
    }
}
