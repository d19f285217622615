//! Configuration management
//!
//! Loads bridge configuration from the environment (via `.env` + `std::env`),
//! with typed defaults so the server runs in a dev/test posture out of the box.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub elevenlabs: ElevenLabsConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub smoother: SmootherConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// OpenAI-realtime-shaped LLM upstream settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_openai_model")]
    pub realtime_model: String,
}

fn default_openai_model() -> String {
    "gpt-4o-realtime-preview-2024-12-17".to_string()
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            realtime_model: default_openai_model(),
        }
    }
}

/// Gemini-realtime-shaped LLM upstream settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_gemini_model")]
    pub realtime_model: String,
}

fn default_gemini_model() -> String {
    "gemini-2.0-flash-live-001".to_string()
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            realtime_model: default_gemini_model(),
        }
    }
}

/// Streaming TTS upstream settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElevenLabsConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_voice_id")]
    pub voice_id: String,
    #[serde(default = "default_tts_model")]
    pub model_id: String,
}

fn default_voice_id() -> String {
    "21m00Tcm4TlvDq8ikWAM".to_string()
}

fn default_tts_model() -> String {
    "eleven_flash_v2_5".to_string()
}

impl Default for ElevenLabsConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            voice_id: default_voice_id(),
            model_id: default_tts_model(),
        }
    }
}

/// Auth Gate settings. Mirrors only what the bridge actually consults — a
/// signing secret, nothing about roles or password flows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
}

fn default_jwt_secret() -> String {
    crate::server::auth::generate_jwt_secret()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
        }
    }
}

/// Output Smoother tuning (§4.7, §4.9). Defaults trade ~100ms extra latency
/// for fewer audible gaps on mobile playback.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SmootherConfig {
    #[serde(default = "default_min_flush_ms")]
    pub min_flush_ms: u64,
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
    #[serde(default = "default_hard_cap_ms")]
    pub hard_cap_ms: u64,
}

fn default_min_flush_ms() -> u64 {
    100
}

fn default_max_wait_ms() -> u64 {
    100
}

fn default_hard_cap_ms() -> u64 {
    500
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self {
            min_flush_ms: default_min_flush_ms(),
            max_wait_ms: default_max_wait_ms(),
            hard_cap_ms: default_hard_cap_ms(),
        }
    }
}

impl Config {
    /// Load configuration from `.env` (if present) and the process
    /// environment, falling back to defaults for anything unset.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut config = Config::default();

        if let Ok(host) = std::env::var("BRIDGE_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("BRIDGE_PORT") {
            config.server.port = port.parse().context("BRIDGE_PORT must be a u16")?;
        }

        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.openai.api_key = key;
        }
        if let Ok(model) = std::env::var("OPENAI_REALTIME_MODEL") {
            config.openai.realtime_model = model;
        }

        if let Ok(key) = std::env::var("GOOGLE_API_KEY") {
            config.gemini.api_key = key;
        }
        if let Ok(model) = std::env::var("GEMINI_REALTIME_MODEL") {
            config.gemini.realtime_model = model;
        }

        if let Ok(key) = std::env::var("ELEVENLABS_API_KEY") {
            config.elevenlabs.api_key = key;
        }
        if let Ok(voice) = std::env::var("ELEVENLABS_VOICE_ID") {
            config.elevenlabs.voice_id = voice;
        }
        if let Ok(model) = std::env::var("ELEVENLABS_MODEL_ID") {
            config.elevenlabs.model_id = model;
        }

        if let Ok(secret) = std::env::var("JWT_SECRET") {
            config.auth.jwt_secret = secret;
        }

        if let Ok(ms) = std::env::var("SMOOTHER_MIN_FLUSH_MS") {
            config.smoother.min_flush_ms =
                ms.parse().context("SMOOTHER_MIN_FLUSH_MS must be a u64")?;
        }
        if let Ok(ms) = std::env::var("SMOOTHER_MAX_WAIT_MS") {
            config.smoother.max_wait_ms =
                ms.parse().context("SMOOTHER_MAX_WAIT_MS must be a u64")?;
        }
        if let Ok(ms) = std::env::var("SMOOTHER_HARD_CAP_MS") {
            config.smoother.hard_cap_ms =
                ms.parse().context("SMOOTHER_HARD_CAP_MS must be a u64")?;
        }

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            openai: OpenAiConfig::default(),
            gemini: GeminiConfig::default(),
            elevenlabs: ElevenLabsConfig::default(),
            auth: AuthConfig::default(),
            smoother: SmootherConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.smoother.min_flush_ms, 100);
        assert_eq!(config.smoother.hard_cap_ms, 500);
    }
}
