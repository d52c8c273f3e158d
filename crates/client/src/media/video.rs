//! Negotiated outbound video channel
//!
//! Wraps the RTP-level local track. The channel exists as soon as the track
//! is added to the peer connection, but accepts sends only after the
//! connection reports Connected; the open flag is owned by the connection
//! observers and checked by the synchronous send path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;
use webrtc::api::media_engine::MIME_TYPE_H264;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp::packet::Packet;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::{TrackLocal, TrackLocalWriter};

use super::{VIDEO_CLOCK_RATE, VIDEO_FMTP_LINE};
use crate::{Error, Result};

/// The single outbound video transport, fixed to one H.264 profile
pub struct VideoChannel {
    track: Arc<TrackLocalStaticRTP>,
    open: Arc<AtomicBool>,
}

impl VideoChannel {
    /// Add the video track to the peer connection
    ///
    /// Fails with [`Error::Negotiation`] if the connection rejects the
    /// track (e.g. called after close).
    pub async fn new(peer_connection: &RTCPeerConnection) -> Result<Self> {
        let track = Arc::new(TrackLocalStaticRTP::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_H264.to_owned(),
                clock_rate: VIDEO_CLOCK_RATE,
                channels: 0,
                sdp_fmtp_line: VIDEO_FMTP_LINE.to_owned(),
                rtcp_feedback: vec![],
            },
            "video".to_owned(),
            "framepipe".to_owned(),
        ));

        peer_connection
            .add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(|e| Error::Negotiation(format!("Failed to add video track: {}", e)))?;

        info!("Added video track to peer connection");

        Ok(Self {
            track,
            open: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Shared open flag, flipped by the connection-state observers
    pub fn open_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.open)
    }

    /// Whether the channel currently accepts sends
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Mark the channel unusable; it never reopens after teardown
    pub fn mark_closed(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    /// Write one RTP packet to the transport
    ///
    /// A failure aborts only the caller's current frame; the channel itself
    /// stays usable unless the underlying track closes.
    pub async fn write(&self, packet: &Packet) -> Result<()> {
        self.track
            .write_rtp(packet)
            .await
            .map(|_| ())
            .map_err(|e| Error::TransportSend(format!("Failed to write RTP packet: {}", e)))
    }
}
