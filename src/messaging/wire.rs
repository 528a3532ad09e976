use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::actors::ActorError;

// ============================================================================
// Wire Format - Versioned JSON Lines
// ============================================================================
//
// One frame per line. Only the closed event enums of the message contracts
// are ever decoded; anything else is rejected at the boundary.
//
// ============================================================================

pub const PROTOCOL_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireFrame<E> {
    pub version: u32,
    pub sent_at: DateTime<Utc>,
    pub event: E,
}

impl<E> WireFrame<E> {
    pub fn new(event: E) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            sent_at: Utc::now(),
            event,
        }
    }
}

#[derive(Deserialize)]
struct FrameHeader {
    version: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("Unsupported protocol version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("Malformed frame")]
    Malformed(#[from] serde_json::Error),

    #[error("Connection I/O failed")]
    Io(#[from] std::io::Error),

    #[error("Actor runtime unavailable")]
    Runtime(#[from] ActorError),
}

/// Serialize `event` as one newline-terminated frame
pub fn encode_frame<E: Serialize>(event: &E) -> Result<String, WireError> {
    let mut line = serde_json::to_string(&WireFrame::new(event))?;
    line.push('\n');
    Ok(line)
}

/// Parse one frame, checking the protocol version before the payload
pub fn decode_frame<E: DeserializeOwned>(line: &str) -> Result<WireFrame<E>, WireError> {
    let header: FrameHeader = serde_json::from_str(line)?;
    if header.version != PROTOCOL_VERSION {
        return Err(WireError::UnsupportedVersion {
            found: header.version,
            expected: PROTOCOL_VERSION,
        });
    }
    Ok(serde_json::from_str(line)?)
}
