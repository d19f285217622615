//! LLM Upstream Client: one trait, two wire-compatible implementations.
//!
//! Both `OpenAiRealtimeClient` (24 kHz) and `GeminiRealtimeClient` (16 kHz)
//! produce text-only output and differ only in URI, auth header shape, and
//! sample rate (see REDESIGN FLAGS).

pub mod gemini;
pub mod openai;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::bridge::modes::Mode;
use crate::error::BridgeError;

/// Normalized events emitted by the LLM receive loop, in delivery order.
#[derive(Debug, Clone)]
pub enum LlmEvent {
    SessionCreated,
    SessionUpdated,
    SpeechStarted,
    SpeechStopped,
    TextDelta(String),
    TextDone(Option<String>),
    ResponseDone,
    Error { code: String, message: String },
}

#[async_trait]
pub trait LlmUpstream: Send + Sync {
    /// Sample rate this implementation requires for `send_audio` PCM.
    fn sample_rate(&self) -> u32;

    /// Open the upstream WebSocket, send session configuration for `mode`,
    /// and spawn the receive task. Returns the event channel the
    /// orchestrator reads from.
    async fn connect(&mut self, mode: Mode) -> Result<mpsc::Receiver<LlmEvent>, BridgeError>;

    /// Update the system prompt for a new mode without reconnecting.
    async fn update_mode(&mut self, mode: Mode) -> Result<(), BridgeError>;

    /// Append PCM audio to the upstream's input buffer.
    async fn send_audio(&mut self, pcm: &[u8]) -> Result<(), BridgeError>;

    /// Commit the input buffer and request a text-only response.
    async fn commit_and_respond(&mut self) -> Result<(), BridgeError>;

    /// Cancel the receive task and close the socket.
    async fn close(&mut self);
}
