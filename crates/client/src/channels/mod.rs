//! Control data channel management
//!
//! One named bidirectional channel carries textual signaling beyond SDP.
//! Only two event classes are surfaced upward: lifecycle (open/close/error)
//! and textual message receipt. There is no request/response correlation;
//! callers needing replies must carry correlation IDs inside the payload.

pub mod control;

pub use control::{ControlChannel, ControlChannelState};
