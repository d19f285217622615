//! Gemini-realtime-shaped LLM upstream client (16 kHz).
//!
//! Same `LlmUpstream` contract as [`crate::llm::openai`], text-only output
//! per REDESIGN FLAGS, differing only in URI, auth placement (API key in
//! the WebSocket URI, not a header), wire message shape (`setup` /
//! `clientContent` / `serverContent`, camelCase fields), and sample rate.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::debug;

use crate::bridge::modes::Mode;
use crate::error::BridgeError;
use crate::llm::{LlmEvent, LlmUpstream};

pub const SAMPLE_RATE: u32 = 16_000;
const MIN_AUDIO_BYTES: usize = 3_200; // ~100ms at 16kHz, 16-bit, mono
const SESSION_READY_TIMEOUT: Duration = Duration::from_secs(5);
const APPEND_ERROR_WINDOW: Duration = Duration::from_millis(100);
const GEMINI_LIVE_URI_BASE: &str =
    "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateContent";

pub struct GeminiRealtimeClient {
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

impl GeminiRealtimeClient {
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

    fn setup_message(&self, mode: Mode) -> serde_json::Value {
        json!({
            "setup": {
                "model": format!("models/{}", self.model),
                "generationConfig": {
                    "temperature": 0.8,
                    "responseModalities": ["TEXT"],
                },
                "systemInstruction": {
                    "parts": [{ "text": mode.system_prompt() }],
                },
            }
        })
    }
}

#[async_trait]
impl LlmUpstream for GeminiRealtimeClient {
    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    async fn connect(&mut self, mode: Mode) -> Result<mpsc::Receiver<LlmEvent>, BridgeError> {
        let uri = format!("{GEMINI_LIVE_URI_BASE}?key={}", self.api_key);
        let (ws_stream, _) = connect_async(uri)
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

        let handle = tokio::spawn(async move {
            let mut response_text = String::new();
            while let Some(message) = stream.next().await {
                let text = match message {
                    Ok(WsMessage::Text(text)) => text.to_string(),
                    Ok(WsMessage::Close(_)) | Err(_) => break,
                    _ => continue,
                };
                let Ok(event): Result<serde_json::Value, _> = serde_json::from_str(&text) else {
                    continue;
                };

                if event.get("setupComplete").is_some() {
                    is_ready.store(true, std::sync::atomic::Ordering::SeqCst);
                    session_ready.notify_waiters();
                    let _ = tx.send(LlmEvent::SessionCreated).await;
                    continue;
                }
                if let Some(setup_error) = event.get("setupError") {
                    let message = setup_error["message"].as_str().unwrap_or("setup failed").to_string();
                    let _ = tx
                        .send(LlmEvent::Error {
                            code: "setup_error".to_string(),
                            message,
                        })
                        .await;
                    break;
                }
                if let Some(server_content) = event.get("serverContent") {
                    if let Some(model_turn) = server_content.get("modelTurn") {
                        if let Some(parts) = model_turn.get("parts").and_then(|p| p.as_array()) {
                            for part in parts {
                                if let Some(delta) = part.get("text").and_then(|t| t.as_str()) {
                                    response_text.push_str(delta);
                                    if tx.send(LlmEvent::TextDelta(delta.to_string())).await.is_err() {
                                        return;
                                    }
                                }
                            }
                        }
                    }
                    if server_content.get("turnComplete").is_some() {
                        let full = if response_text.is_empty() {
                            None
                        } else {
                            Some(std::mem::take(&mut response_text))
                        };
                        if tx.send(LlmEvent::TextDone(full)).await.is_err() {
                            return;
                        }
                        if tx.send(LlmEvent::ResponseDone).await.is_err() {
                            return;
                        }
                    }
                }
            }
            debug!("gemini realtime receive loop exited");
        });
        self.receive_task = Some(handle);

        self.send_json(self.setup_message(mode)).await?;
        Ok(rx)
    }

    async fn update_mode(&mut self, mode: Mode) -> Result<(), BridgeError> {
        let setup = self.setup_message(mode);
        self.send_json(setup).await
    }

    async fn send_audio(&mut self, pcm: &[u8]) -> Result<(), BridgeError> {
        if !self.is_ready.load(std::sync::atomic::Ordering::SeqCst) {
            let _ = timeout(SESSION_READY_TIMEOUT, self.session_ready.notified()).await;
        }

        self.recent_append_error.store(false, std::sync::atomic::Ordering::SeqCst);
        self.send_json(json!({
            "clientContent": {
                "turns": [{
                    "role": "user",
                    "parts": [{
                        "inlineData": {
                            "mimeType": "audio/pcm;rate=16000",
                            "data": BASE64.encode(pcm),
                        }
                    }]
                }],
                "turnComplete": false,
            }
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

        self.send_json(json!({
            "clientContent": {
                "turns": [],
                "turnComplete": true,
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
