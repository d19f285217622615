//! OpenAI-realtime-shaped LLM upstream client (24 kHz).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::client::IntoClientRequest, tungstenite::Message as WsMessage};
use tracing::debug;

use crate::bridge::modes::Mode;
use crate::error::BridgeError;
use crate::llm::{LlmEvent, LlmUpstream};

pub const SAMPLE_RATE: u32 = 24_000;
const MIN_AUDIO_BYTES: usize = 4_800; // ~100ms at 24kHz, 16-bit, mono
const SESSION_READY_TIMEOUT: Duration = Duration::from_secs(5);
const APPEND_ERROR_WINDOW: Duration = Duration::from_millis(100);

pub struct OpenAiRealtimeClient {
    api_key: String,
    model: String,
    outbound: Option<mpsc::Sender<WsMessage>>,
    session_ready: Arc<tokio::sync::Notify>,
    is_ready: Arc<std::sync::atomic::AtomicBool>,
    audio_bytes_sent: usize,
    recent_append_error: Arc<std::sync::atomic::AtomicBool>,
    writer_task: Option<tokio::task::JoinHandle<()>>,
    receive_task: Option<tokio::task::JoinHandle<()>>,
}

impl OpenAiRealtimeClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            outbound: None,
            session_ready: Arc::new(tokio::sync::Notify::new()),
            is_ready: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            audio_bytes_sent: 0,
            recent_append_error: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            writer_task: None,
            receive_task: None,
        }
    }

    async fn send_json(&self, value: serde_json::Value) -> Result<(), BridgeError> {
        let tx = self
            .outbound
            .as_ref()
            .ok_or_else(|| BridgeError::UpstreamConnect("llm socket not open".to_string()))?;
        tx.send(WsMessage::Text(value.to_string().into()))
            .await
            .map_err(|e| BridgeError::UpstreamClosed(format!("llm: {e}")))
    }
}

#[async_trait]
impl LlmUpstream for OpenAiRealtimeClient {
    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    async fn connect(&mut self, mode: Mode) -> Result<mpsc::Receiver<LlmEvent>, BridgeError> {
        let uri = format!("wss://api.openai.com/v1/realtime?model={}", self.model);
        let mut request = uri
            .into_client_request()
            .map_err(|e| BridgeError::UpstreamConnect(format!("bad request: {e}")))?;
        request.headers_mut().insert(
            "Authorization",
            format!("Bearer {}", self.api_key)
                .parse()
                .map_err(|e| BridgeError::UpstreamConnect(format!("bad auth header: {e}")))?,
        );
        request
            .headers_mut()
            .insert("OpenAI-Beta", "realtime=v1".parse().unwrap());

        let (ws_stream, _) = connect_async(request)
            .await
            .map_err(|e| BridgeError::UpstreamConnect(format!("llm connect failed: {e}")))?;
        let (mut sink, mut stream) = ws_stream.split();

        let (out_tx, mut out_rx) = mpsc::channel::<WsMessage>(64);
        let writer_task = tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                if sink.send(msg).await.is_err() {
                    break;
                }
            }
        });
        self.outbound = Some(out_tx);
        self.writer_task = Some(writer_task);

        let (tx, rx) = mpsc::channel(64);
        let is_ready = self.is_ready.clone();
        let session_ready = self.session_ready.clone();
        let recent_append_error = self.recent_append_error.clone();

        let handle = tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                let text = match message {
                    Ok(WsMessage::Text(text)) => text.to_string(),
                    Ok(WsMessage::Close(_)) | Err(_) => break,
                    _ => continue,
                };
                let Ok(event): Result<serde_json::Value, _> = serde_json::from_str(&text) else {
                    continue;
                };
                let event_type = event["type"].as_str().unwrap_or_default();
                let normalized = match event_type {
                    "session.created" => {
                        is_ready.store(true, std::sync::atomic::Ordering::SeqCst);
                        session_ready.notify_waiters();
                        Some(LlmEvent::SessionCreated)
                    }
                    "session.updated" => {
                        is_ready.store(true, std::sync::atomic::Ordering::SeqCst);
                        session_ready.notify_waiters();
                        Some(LlmEvent::SessionUpdated)
                    }
                    "input_audio_buffer.speech_started" => Some(LlmEvent::SpeechStarted),
                    "input_audio_buffer.speech_stopped" => Some(LlmEvent::SpeechStopped),
                    "response.text.delta" | "response.audio_transcript.delta" => {
                        extract_delta(&event).map(LlmEvent::TextDelta)
                    }
                    "response.text.done" | "response.audio_transcript.done" => {
                        Some(LlmEvent::TextDone(event["text"].as_str().map(str::to_string)))
                    }
                    "response.done" => Some(LlmEvent::ResponseDone),
                    "error" => {
                        recent_append_error.store(true, std::sync::atomic::Ordering::SeqCst);
                        let code = event["error"]["code"]
                            .as_str()
                            .unwrap_or("unknown")
                            .to_string();
                        let message = event["error"]["message"]
                            .as_str()
                            .unwrap_or_default()
                            .to_string();
                        Some(LlmEvent::Error { code, message })
                    }
                    _ => None,
                };
                if let Some(event) = normalized {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
            }
            debug!("openai realtime receive loop exited");
        });
        self.receive_task = Some(handle);

        self.send_json(json!({
            "type": "session.update",
            "session": {
                "modalities": ["audio", "text"],
                "input_audio_format": "pcm16",
                "output_audio_format": "pcm16",
                "instructions": mode.system_prompt(),
                "temperature": 0.8,
                "turn_detection": null,
            }
        }))
        .await?;

        Ok(rx)
    }

    async fn update_mode(&mut self, mode: Mode) -> Result<(), BridgeError> {
        self.send_json(json!({
            "type": "session.update",
            "session": {
                "modalities": ["audio", "text"],
                "input_audio_format": "pcm16",
                "output_audio_format": "pcm16",
                "instructions": mode.system_prompt(),
                "temperature": 0.8,
                "turn_detection": null,
            }
        }))
        .await
    }

    async fn send_audio(&mut self, pcm: &[u8]) -> Result<(), BridgeError> {
        if !self.is_ready.load(std::sync::atomic::Ordering::SeqCst) {
            let _ = timeout(SESSION_READY_TIMEOUT, self.session_ready.notified()).await;
        }

        self.recent_append_error.store(false, std::sync::atomic::Ordering::SeqCst);
        self.send_json(json!({
            "type": "input_audio_buffer.append",
            "audio": BASE64.encode(pcm),
        }))
        .await?;

        tokio::time::sleep(APPEND_ERROR_WINDOW).await;
        if self.recent_append_error.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(BridgeError::UpstreamRejected {
                code: "append_failed".to_string(),
                message: "upstream reported an error after audio append".to_string(),
            });
        }

        self.audio_bytes_sent += pcm.len();
        Ok(())
    }

    async fn commit_and_respond(&mut self) -> Result<(), BridgeError> {
        if self.audio_bytes_sent < MIN_AUDIO_BYTES {
            return Err(BridgeError::UpstreamRejected {
                code: "insufficient_audio".to_string(),
                message: "not enough audio buffered to commit".to_string(),
            });
        }

        self.send_json(json!({ "type": "input_audio_buffer.commit" })).await?;
        self.send_json(json!({
            "type": "response.create",
            "response": {
                "modalities": ["text"],
                "instructions": "Respond naturally and conversationally.",
            }
        }))
        .await?;

        self.audio_bytes_sent = 0;
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(handle) = self.receive_task.take() {
            handle.abort();
        }
        // Dropping the sender lets the writer task's recv loop drain and
        // exit on its own, closing the socket when the sink is dropped.
        self.outbound = None;
        if let Some(handle) = self.writer_task.take() {
            let _ = handle.await;
        }
    }
}

/// OpenAI text-delta payloads arrive shaped as a plain string, `{delta:
/// ...}`, or occasionally a list of segments; normalize all three.
fn extract_delta(event: &serde_json::Value) -> Option<String> {
    if let Some(text) = event["delta"].as_str() {
        return Some(text.to_string());
    }
    if let Some(text) = event["text"].as_str() {
        return Some(text.to_string());
    }
    if let Some(segments) = event["delta"].as_array() {
        let joined: String = segments
            .iter()
            .filter_map(|s| s.as_str().or_else(|| s["text"].as_str()))
            .collect();
        if !joined.is_empty() {
            return Some(joined);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_delta_handles_plain_string_field() {
        let event = json!({"delta": "hello"});
        assert_eq!(extract_delta(&event), Some("hello".to_string()));
    }

    #[test]
    fn extract_delta_handles_segment_list() {
        let event = json!({"delta": [{"text": "a"}, {"text": "b"}]});
        assert_eq!(extract_delta(&event), Some("ab".to_string()));
    }

    #[test]
    fn extract_delta_returns_none_for_unrelated_event() {
        let event = json!({"type": "response.done"});
        assert_eq!(extract_delta(&event), None);
    }
}
