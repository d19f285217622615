//! TTS Upstream Client: a single ElevenLabs-shaped streaming TTS session.
//!
//! Owns one WebSocket per utterance's worth of speech; the orchestrator
//! opens a fresh stream per response after finalizing the previous one.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, Message as WsMessage},
};
use tracing::{debug, warn};

use crate::error::BridgeError;

const ELEVENLABS_WS_BASE: &str = "wss://api.elevenlabs.io/v1";
const CHUNK_LENGTH_SCHEDULE: [u32; 1] = [50];
const OPTIMIZE_STREAMING_LATENCY: u32 = 4;

/// Voice tuning sent on stream init, mirroring the source's fixed defaults.
#[derive(Debug, Clone, Serialize)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
    pub style: f32,
    pub use_speaker_boost: bool,
    pub speed: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.7,
            similarity_boost: 0.8,
            style: 0.0,
            use_speaker_boost: true,
            speed: 0.90,
        }
    }
}

/// A single streaming TTS session. `None | Starting | Open | Finalizing |
/// Closed` in [`crate::bridge::state::TtsState`] tracks which of these
/// operations are currently legal from the orchestrator's side.
pub struct TtsStream {
    outbound: mpsc::Sender<WsMessage>,
    writer_task: tokio::task::JoinHandle<()>,
    receive_task: tokio::task::JoinHandle<()>,
    finalizing: bool,
}

impl TtsStream {
    /// Open a stream and spawn its receive loop. `on_audio` is invoked with
    /// each decoded raw-PCM chunk as it arrives.
    pub async fn start(
        api_key: &str,
        voice_id: &str,
        model_id: &str,
        voice_settings: VoiceSettings,
        output_format: &str,
        mut on_audio: mpsc::Sender<Vec<u8>>,
    ) -> Result<Self, BridgeError> {
        let uri = format!(
            "{ELEVENLABS_WS_BASE}/text-to-speech/{voice_id}/stream-input?model_id={model_id}&output_format={output_format}"
        );
        let mut request = uri
            .into_client_request()
            .map_err(|e| BridgeError::UpstreamConnect(format!("bad tts request: {e}")))?;
        request
            .headers_mut()
            .insert("xi-api-key", api_key.parse().map_err(|e| {
                BridgeError::UpstreamConnect(format!("bad tts api key header: {e}"))
            })?);

        let (ws_stream, _) = connect_async(request)
            .await
            .map_err(|e| BridgeError::UpstreamConnect(format!("tts connect failed: {e}")))?;
        let (mut sink, mut stream) = ws_stream.split();

        let init_payload = json!({
            "text": " ",
            "voice_settings": voice_settings,
            "generation_config": {
                "chunk_length_schedule": CHUNK_LENGTH_SCHEDULE,
                "optimize_streaming_latency": OPTIMIZE_STREAMING_LATENCY,
            },
            "try_trigger_generation": true,
        });
        sink.send(WsMessage::Text(init_payload.to_string().into()))
            .await
            .map_err(|e| BridgeError::UpstreamConnect(format!("tts init send failed: {e}")))?;

        let (out_tx, mut out_rx) = mpsc::channel::<WsMessage>(32);
        let writer_task = tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                if sink.send(msg).await.is_err() {
                    break;
                }
            }
        });

        let receive_task = tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                let text = match message {
                    Ok(WsMessage::Text(text)) => text.to_string(),
                    Ok(WsMessage::Close(_)) => break,
                    Err(e) => {
                        warn!(error = %e, "tts stream closed unexpectedly");
                        break;
                    }
                    _ => continue,
                };
                let Ok(data): Result<serde_json::Value, _> = serde_json::from_str(&text) else {
                    continue;
                };
                if data.get("error").is_some() {
                    warn!(?data, "tts upstream reported an error");
                    break;
                }
                if let Some(audio_b64) = data["audio"].as_str() {
                    if let Ok(chunk) = BASE64.decode(audio_b64) {
                        if on_audio.send(chunk).await.is_err() {
                            break;
                        }
                    }
                }
            }
            debug!("tts receive loop exited");
        });

        Ok(Self {
            outbound: out_tx,
            writer_task,
            receive_task,
            finalizing: false,
        })
    }

    /// Push an incremental text segment. The orchestrator always hands in
    /// text ending with a trailing space to help the TTS word-split.
    pub async fn send_text(&self, text: &str) -> Result<(), BridgeError> {
        let payload = json!({ "text": text, "try_trigger_generation": true });
        self.outbound
            .send(WsMessage::Text(payload.to_string().into()))
            .await
            .map_err(|e| BridgeError::UpstreamClosed(format!("tts: {e}")))
    }

    /// Send the end-of-input sentinel and wait for the receive loop to
    /// drain. Idempotent: a second call is a no-op.
    pub async fn finalize(mut self) {
        if !self.finalizing {
            self.finalizing = true;
            let payload = json!({ "text": "" });
            let _ = self.outbound.send(WsMessage::Text(payload.to_string().into())).await;
        }
        // Drop the sender so the writer task's recv loop drains and exits.
        drop(self.outbound);
        let _ = (&mut self.receive_task).await;
        let _ = (&mut self.writer_task).await;
    }

    /// Cancel both tasks immediately without draining.
    pub async fn abort(self) {
        self.receive_task.abort();
        self.writer_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_settings_default_matches_tutor_persona() {
        let settings = VoiceSettings::default();
        assert_eq!(settings.speed, 0.90);
        assert!(settings.use_speaker_boost);
    }
}
