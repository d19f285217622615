//! Bridge error taxonomy
//!
//! Every error that can surface during a session is classified into one of
//! these kinds and turned into a `{type: "error", code, message}` frame for
//! the client. Only `UpstreamClosed` on the LLM leg is fatal to the session.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("malformed client message: {0}")]
    ClientProtocol(String),

    #[error("session not initialized (greeting required)")]
    NotInitialized,

    #[error("failed to connect to upstream: {0}")]
    UpstreamConnect(String),

    #[error("upstream socket closed: {0}")]
    UpstreamClosed(String),

    #[error("upstream rejected request: {code}: {message}")]
    UpstreamRejected { code: String, message: String },

    #[error("English enforcement rewrite failed: {0}")]
    EnforcementFailed(String),

    #[error("failed to decode audio: {0}")]
    CodecFailed(String),
}

impl BridgeError {
    /// Stable error code sent to the client in `{"type": "error", "code": ...}`.
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::ClientProtocol(_) => "client_protocol_error",
            BridgeError::NotInitialized => "not_initialized",
            BridgeError::UpstreamConnect(_) => "connection_lost",
            BridgeError::UpstreamClosed(_) => "connection_lost",
            BridgeError::UpstreamRejected { code, .. } => normalize_rejected_code(code),
            BridgeError::EnforcementFailed(_) => "greeting_error",
            BridgeError::CodecFailed(_) => "codec_failed",
        }
    }

    /// Whether this error must terminate the whole session rather than
    /// leaving it in a recoverable idle state. Only a dead LLM socket is
    /// fatal; TTS failures and rejected requests are recoverable.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BridgeError::UpstreamClosed(leg) if leg.starts_with("llm"))
    }
}

/// Maps a raw upstream error code onto the taxonomy in the wire contract.
/// Matching is exact, never case-insensitive (see REDESIGN FLAGS).
fn normalize_rejected_code(code: &str) -> &'static str {
    match code {
        "insufficient_audio" => "insufficient_audio",
        "response_in_progress" | "conversation_already_has_active_response" => "response_in_progress",
        "buffer_empty" | "input_audio_buffer_commit_empty" => "buffer_empty",
        _ => "upstream_rejected",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_initialized_code() {
        assert_eq!(BridgeError::NotInitialized.code(), "not_initialized");
    }

    #[test]
    fn upstream_closed_on_llm_is_fatal() {
        let err = BridgeError::UpstreamClosed(format!("llm: {}", "socket reset"));
        assert!(err.is_fatal());
        let err = BridgeError::UpstreamClosed(format!("tts: {}", "socket reset"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn rejected_maps_known_codes() {
        let err = BridgeError::UpstreamRejected {
            code: "insufficient_audio".to_string(),
            message: "not enough audio".to_string(),
        };
        assert_eq!(err.code(), "insufficient_audio");
    }
}
