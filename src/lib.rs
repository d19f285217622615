//! Realtime English tutor bridge
//!
//! Bridges a student's browser WebSocket to a realtime LLM (OpenAI or
//! Gemini, selected per connection) and a streaming TTS upstream, enforcing
//! English-only replies and smoothing audio output for playback.
//!
//! # Example
//!
//! ```ignore
//! use tutor_bridge::config::Config;
//! use tutor_bridge::server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     server::start("0.0.0.0", 8080).await
//! }
//! ```

// Core modules (order matters for cross-module dependencies)
pub mod error;
pub mod config;
pub mod audio;
pub mod text;
pub mod llm;
pub mod tts;
pub mod bridge;
pub mod server;

pub use config::Config;
pub use error::BridgeError;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get the library info
pub fn info() -> String {
    format!("{} v{} - realtime English tutor bridge", NAME, VERSION)
}
