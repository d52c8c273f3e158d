//! Frame packetization
//!
//! Fragments one contiguous frame buffer into transport-sized RTP packets.
//! Sequence and timestamp counters are owned by the packetizer instance and
//! reset at construction, so two client instances never interfere and a
//! reconnect starts counting from zero.

use bytes::Bytes;
use parking_lot::Mutex;
use webrtc::rtp::header::Header;
use webrtc::rtp::packet::Packet;

use super::{MAX_PACKET_PAYLOAD, VIDEO_PAYLOAD_TYPE, VIDEO_SSRC};
use crate::{Error, Result};

struct Counters {
    /// Monotonic per-channel sequence, wraps at the RTP 16-bit width
    sequence: u16,
    /// Advances by each chunk's byte length. An ordering aid, not a media
    /// clock; callers needing playback timing must not depend on it.
    timestamp: u32,
}

/// Fragments frames into RTP packets with sequencing metadata
pub struct Packetizer {
    payload_type: u8,
    ssrc: u32,
    max_payload: usize,
    counters: Mutex<Counters>,
}

impl Packetizer {
    /// Packetizer with the crate's fixed video profile and chunk bound
    pub fn new() -> Self {
        Self::with_limits(VIDEO_PAYLOAD_TYPE, VIDEO_SSRC, MAX_PACKET_PAYLOAD)
    }

    pub fn with_limits(payload_type: u8, ssrc: u32, max_payload: usize) -> Self {
        debug_assert!(max_payload > 0);
        Self {
            payload_type,
            ssrc,
            max_payload,
            counters: Mutex::new(Counters {
                sequence: 0,
                timestamp: 0,
            }),
        }
    }

    /// Fragment one frame into `ceil(len / max_payload)` packets
    ///
    /// Packets carry consecutive sequence numbers and non-decreasing
    /// cumulative timestamps; payload lengths sum to the frame length.
    /// Rejects empty buffers with [`Error::InvalidInput`] before touching
    /// the counters.
    pub fn packetize(&self, frame: &[u8]) -> Result<Vec<Packet>> {
        if frame.is_empty() {
            return Err(Error::InvalidInput("empty frame buffer".to_string()));
        }

        let mut counters = self.counters.lock();
        let mut packets = Vec::with_capacity(frame.len().div_ceil(self.max_payload));

        for chunk in frame.chunks(self.max_payload) {
            let header = Header {
                version: 2,
                payload_type: self.payload_type,
                sequence_number: counters.sequence,
                timestamp: counters.timestamp,
                ssrc: self.ssrc,
                ..Default::default()
            };
            counters.sequence = counters.sequence.wrapping_add(1);
            counters.timestamp = counters.timestamp.wrapping_add(chunk.len() as u32);

            packets.push(Packet {
                header,
                payload: Bytes::copy_from_slice(chunk),
            });
        }

        Ok(packets)
    }

    /// Current sequence counter (next packet's number)
    pub fn next_sequence(&self) -> u16 {
        self.counters.lock().sequence
    }
}

impl Default for Packetizer {
    fn default() -> Self {
        Self::new()
    }
}
