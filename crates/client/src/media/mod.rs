//! Outbound media transport: the negotiated video channel and the frame
//! packetizer that feeds it

pub mod packetizer;
pub mod video;

pub use packetizer::Packetizer;
pub use video::VideoChannel;

/// Fixed H.264 payload type, the only profile this core negotiates
pub const VIDEO_PAYLOAD_TYPE: u8 = 102;

/// fmtp line advertised for the H.264 profile
pub const VIDEO_FMTP_LINE: &str =
    "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42e01f";

/// Fixed synchronization source for the single outbound stream
pub const VIDEO_SSRC: u32 = 42;

/// RTP clock rate for video
pub const VIDEO_CLOCK_RATE: u32 = 90_000;

/// Payload bytes per packet; stays well under common transport MTUs after
/// header overhead
pub const MAX_PACKET_PAYLOAD: usize = 1024;
