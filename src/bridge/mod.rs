//! Bridge Orchestrator: owns one session end to end — client WebSocket,
//! one LLM client, at most one TTS stream — and routes frames between
//! them under the ordering and backpressure rules in the concurrency
//! model.

pub mod modes;
pub mod protocol;
pub mod state;

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use crate::audio::codec::decode_to_pcm;
use crate::audio::smoother::OutputSmoother;
use crate::config::Config;
use crate::error::BridgeError;
use crate::llm::gemini::GeminiRealtimeClient;
use crate::llm::openai::OpenAiRealtimeClient;
use crate::llm::{LlmEvent, LlmUpstream};
use crate::text::enforcement;
use crate::text::segment::SegmentFlusher;
use crate::tts::{TtsStream, VoiceSettings};

use modes::Mode;
use protocol::{ClientMessage, ServerMessage};
use state::{ResponseLifecycle, TtsState};

/// Which upstream LLM variant a session's endpoint selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmVariant {
    OpenAi,
    Gemini,
}

/// Frame queued for the dedicated client-socket writer task.
enum OutboundMessage {
    Text(String),
    Binary(Vec<u8>),
}

struct Session {
    id: Uuid,
    identity: String,
    mode: Mode,
    pending_mode: Option<Mode>,
    user_name: String,
    initialized: bool,
    llm_ready: bool,
    response_lifecycle: ResponseLifecycle,
    tts_state: TtsState,
    non_english_detected: bool,
    raw_accumulator: String,
    flusher: SegmentFlusher,
    client_tx: mpsc::Sender<OutboundMessage>,
    smoother: Arc<OutputSmoother>,
    config: Arc<Config>,
    variant: LlmVariant,
}

/// Accept one already-upgraded, already-authenticated client WebSocket and
/// run its session to completion.
pub async fn serve(socket: WebSocket, variant: LlmVariant, identity: String, config: Arc<Config>) {
    let session_id = Uuid::new_v4();
    let span = tracing::info_span!("bridge_session", session_id = %session_id, variant = ?variant, identity = %identity);
    async move {
        if let Err(e) = run_session(socket, variant, identity, config, session_id).await {
            error!(error = %e, "session ended with error");
        }
    }
    .instrument(span)
    .await;
}

async fn run_session(
    socket: WebSocket,
    variant: LlmVariant,
    identity: String,
    config: Arc<Config>,
    session_id: Uuid,
) -> Result<(), BridgeError> {
    let (mut client_sink, mut client_stream) = socket.split();
    let (client_tx, mut client_rx) = mpsc::channel::<OutboundMessage>(64);
    let sender_task = tokio::spawn(async move {
        while let Some(msg) = client_rx.recv().await {
            let result = match msg {
                OutboundMessage::Text(text) => client_sink.send(Message::Text(text.into())).await,
                OutboundMessage::Binary(bytes) => client_sink.send(Message::Binary(bytes.into())).await,
            };
            if result.is_err() {
                break;
            }
        }
    });

    let rate = match variant {
        LlmVariant::OpenAi => crate::llm::openai::SAMPLE_RATE,
        LlmVariant::Gemini => crate::llm::gemini::SAMPLE_RATE,
    };

    let mut session = Session {
        id: session_id,
        identity,
        mode: Mode::General,
        pending_mode: None,
        user_name: String::new(),
        initialized: false,
        llm_ready: false,
        response_lifecycle: ResponseLifecycle::default(),
        tts_state: TtsState::default(),
        non_english_detected: false,
        raw_accumulator: String::new(),
        flusher: SegmentFlusher::new(),
        client_tx,
        smoother: Arc::new(OutputSmoother::new(24_000, config.smoother)),
        config: config.clone(),
        variant,
    };

    info!(session_id = %session.id, variant = ?session.variant, "session starting");
    send_to_client(&session.client_tx, &ServerMessage::Connected).await;

    let mut llm: Box<dyn LlmUpstream> = match variant {
        LlmVariant::OpenAi => Box::new(OpenAiRealtimeClient::new(
            config.openai.api_key.clone(),
            config.openai.realtime_model.clone(),
        )),
        LlmVariant::Gemini => Box::new(GeminiRealtimeClient::new(
            config.gemini.api_key.clone(),
            config.gemini.realtime_model.clone(),
        )),
    };

    let mut llm_rx: Option<mpsc::Receiver<LlmEvent>> = None;
    let mut tts_stream: Option<TtsStream> = None;
    let mut tts_rx: Option<mpsc::Receiver<Vec<u8>>> = None;

    loop {
        tokio::select! {
            client_msg = client_stream.next() => {
                let Some(client_msg) = client_msg else { break };
                let client_msg = match client_msg {
                    Ok(m) => m,
                    Err(e) => {
                        warn!(error = %e, "client socket read error");
                        break;
                    }
                };
                match client_msg {
                    Message::Close(_) => break,
                    Message::Binary(bytes) => {
                        handle_audio_blob(&mut session, &bytes, llm.as_mut(), rate).await;
                    }
                    Message::Text(text) => {
                        let should_close = handle_client_text(
                            &mut session,
                            &text,
                            llm.as_mut(),
                            &mut llm_rx,
                            &mut tts_stream,
                            &mut tts_rx,
                            rate,
                        ).await;
                        if should_close {
                            break;
                        }
                    }
                    _ => {}
                }
            }
            maybe_event = recv_optional(&mut llm_rx) => {
                match maybe_event {
                    Some(event) => {
                        handle_llm_event(&mut session, event, &mut tts_stream, &mut tts_rx, rate).await;
                    }
                    None => {
                        warn!(session_id = %session.id, "llm upstream closed");
                        break;
                    }
                }
            }
            maybe_chunk = recv_optional(&mut tts_rx) => {
                match maybe_chunk {
                    Some(chunk) => {
                        if let Ok(Some(wav)) = session.smoother.push(&chunk).await {
                            send_binary_to_client(&session.client_tx, wav).await;
                        }
                    }
                    None => {
                        tts_rx = None;
                    }
                }
            }
            else => break,
        }
    }

    if let Some(stream) = tts_stream.take() {
        stream.abort().await;
    }
    llm.close().await;
    sender_task.abort();
    info!(session_id = %session.id, "session ended");
    Ok(())
}

/// Helper so `tokio::select!` can poll an `Option<Receiver<T>>` without a
/// branch that panics when the receiver hasn't been created yet.
async fn recv_optional<T>(rx: &mut Option<mpsc::Receiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn handle_audio_blob(session: &mut Session, bytes: &[u8], llm: &mut dyn LlmUpstream, rate: u32) {
    if !session.initialized {
        send_error(&session.client_tx, BridgeError::NotInitialized).await;
        return;
    }

    match decode_to_pcm(bytes, rate) {
        Ok(pcm) => {
            if let Err(e) = llm.send_audio(&pcm).await {
                send_error(&session.client_tx, e).await;
            }
        }
        Err(e) => {
            warn!(session_id = %session.id, error = %e, "dropping undecodable audio blob");
        }
    }
}

/// Returns `true` if the session should close.
async fn handle_client_text(
    session: &mut Session,
    text: &str,
    llm: &mut dyn LlmUpstream,
    llm_rx: &mut Option<mpsc::Receiver<LlmEvent>>,
    tts_stream: &mut Option<TtsStream>,
    tts_rx: &mut Option<mpsc::Receiver<Vec<u8>>>,
    rate: u32,
) -> bool {
    let parsed: Result<ClientMessage, _> = serde_json::from_str(text);
    let Ok(msg) = parsed else {
        send_error(
            &session.client_tx,
            BridgeError::ClientProtocol(format!("malformed frame: {text}")),
        )
        .await;
        return false;
    };

    match msg {
        ClientMessage::Ping => {
            send_to_client(&session.client_tx, &ServerMessage::Pong).await;
        }
        ClientMessage::Close => return true,
        ClientMessage::AudioCommit => {
            if session.response_lifecycle.is_in_flight() {
                send_error(
                    &session.client_tx,
                    BridgeError::UpstreamRejected {
                        code: "response_in_progress".to_string(),
                        message: "a response is already in flight".to_string(),
                    },
                )
                .await;
                return false;
            }
            session.flusher = SegmentFlusher::new();
            session.raw_accumulator.clear();
            session.non_english_detected = false;
            session.tts_state = TtsState::Closed;
            session.smoother.reset().await;
            match llm.commit_and_respond().await {
                Ok(()) => session.response_lifecycle.start(),
                Err(e) => send_error(&session.client_tx, e).await,
            }
        }
        ClientMessage::Greeting { user_name, mode } => {
            let mode = Mode::parse(&mode);
            session.user_name = user_name;
            info!(session_id = %session.id, identity = %session.identity, mode = ?mode, "greeting received");

            if !session.initialized {
                session.mode = mode;
                match llm.connect(mode).await {
                    Ok(rx) => *llm_rx = Some(rx),
                    Err(e) => {
                        send_error(&session.client_tx, e).await;
                        return false;
                    }
                }
                session.initialized = true;
            } else if session.llm_ready {
                session.mode = mode;
                if let Err(e) = llm.update_mode(mode).await {
                    send_error(&session.client_tx, e).await;
                }
            } else {
                session.pending_mode = Some(mode);
            }

            let greeting_text = session.mode.greeting_for(&session.user_name);
            if let Err(e) = open_tts_stream(session, tts_stream, tts_rx, rate).await {
                send_error(&session.client_tx, e).await;
                return false;
            }
            if let Some(stream) = tts_stream.as_ref() {
                let _ = stream.send_text(&format!("{greeting_text} ")).await;
            }
            finalize_tts(session, tts_stream, tts_rx).await;
            send_to_client(
                &session.client_tx,
                &ServerMessage::GreetingDone { text: greeting_text },
            )
            .await;
        }
    }
    false
}

async fn open_tts_stream(
    session: &mut Session,
    tts_stream: &mut Option<TtsStream>,
    tts_rx: &mut Option<mpsc::Receiver<Vec<u8>>>,
    _rate: u32,
) -> Result<(), BridgeError> {
    if let Some(stream) = tts_stream.take() {
        stream.abort().await;
    }
    session.tts_state = TtsState::Starting;

    let (tx, rx) = mpsc::channel(32);
    let stream = TtsStream::start(
        &session.config.elevenlabs.api_key,
        &session.config.elevenlabs.voice_id,
        &session.config.elevenlabs.model_id,
        VoiceSettings::default(),
        "pcm_24000",
        tx,
    )
    .await?;

    *tts_stream = Some(stream);
    *tts_rx = Some(rx);
    session.tts_state = TtsState::Open;
    Ok(())
}

async fn finalize_tts(
    session: &mut Session,
    tts_stream: &mut Option<TtsStream>,
    tts_rx: &mut Option<mpsc::Receiver<Vec<u8>>>,
) {
    if let Some(stream) = tts_stream.take() {
        session.tts_state = TtsState::Finalizing;
        stream.finalize().await;
    }
    *tts_rx = None;
    session.tts_state = TtsState::Closed;
}

async fn handle_llm_event(
    session: &mut Session,
    event: LlmEvent,
    tts_stream: &mut Option<TtsStream>,
    tts_rx: &mut Option<mpsc::Receiver<Vec<u8>>>,
    rate: u32,
) {
    match event {
        LlmEvent::SessionCreated | LlmEvent::SessionUpdated => {
            session.llm_ready = true;
            if let Some(mode) = session.pending_mode.take() {
                session.mode = mode;
            }
        }
        LlmEvent::SpeechStarted | LlmEvent::SpeechStopped => {}
        LlmEvent::TextDelta(delta) => {
            session.raw_accumulator.push_str(&delta);
            if enforcement::contains_non_english_script(&delta) {
                session.non_english_detected = true;
                return;
            }
            if session.non_english_detected {
                return;
            }
            session.flusher.push(&delta);
            send_to_client(
                &session.client_tx,
                &ServerMessage::TranscriptDelta {
                    text: session.raw_accumulator.clone(),
                },
            )
            .await;

            if let Some(segment) = session.flusher.try_flush() {
                flush_segment_to_tts(session, tts_stream, tts_rx, segment, rate).await;
            }
        }
        LlmEvent::TextDone(full_text) => {
            let mut final_text = full_text.unwrap_or_else(|| session.raw_accumulator.clone());

            if session.non_english_detected {
                final_text = enforcement::rewrite_to_english(&session.config.openai.api_key, &session.raw_accumulator).await;
                session.flusher = SegmentFlusher::new();
                session.flusher.push(&final_text);
            }

            send_to_client(
                &session.client_tx,
                &ServerMessage::TranscriptDone {
                    text: final_text.clone(),
                },
            )
            .await;

            if let Some(segment) = session.flusher.force_flush() {
                flush_segment_to_tts(session, tts_stream, tts_rx, segment, rate).await;
            }
        }
        LlmEvent::ResponseDone => {
            finalize_tts(session, tts_stream, tts_rx).await;
            if let Ok(Some(wav)) = session.smoother.force_flush().await {
                send_binary_to_client(&session.client_tx, wav).await;
            }
            send_to_client(&session.client_tx, &ServerMessage::ResponseDone).await;
            session.response_lifecycle.finish();
        }
        LlmEvent::Error { code, message } => {
            match code.as_str() {
                "insufficient_audio" | "buffer_empty" | "input_audio_buffer_commit_empty" => {
                    session.response_lifecycle.finish();
                }
                "response_in_progress" | "conversation_already_has_active_response" => {
                    session.response_lifecycle.start();
                }
                _ => {}
            }
            let mapped = BridgeError::UpstreamRejected { code, message };
            send_error(&session.client_tx, mapped).await;
        }
    }
}

async fn flush_segment_to_tts(
    session: &mut Session,
    tts_stream: &mut Option<TtsStream>,
    tts_rx: &mut Option<mpsc::Receiver<Vec<u8>>>,
    segment: String,
    rate: u32,
) {
    if tts_stream.is_none() {
        if let Err(e) = open_tts_stream(session, tts_stream, tts_rx, rate).await {
            warn!(session_id = %session.id, error = %e, "failed to open tts stream for response segment");
            return;
        }
    }
    if !session.tts_state.can_send_text() {
        return;
    }
    if let Some(stream) = tts_stream.as_ref() {
        if let Err(e) = stream.send_text(&format!("{segment} ")).await {
            warn!(session_id = %session.id, error = %e, "tts send_text failed");
        }
    }
}

async fn send_to_client(tx: &mpsc::Sender<OutboundMessage>, message: &ServerMessage) {
    let Ok(json) = serde_json::to_string(message) else {
        return;
    };
    let _ = tx.send(OutboundMessage::Text(json)).await;
}

async fn send_binary_to_client(tx: &mpsc::Sender<OutboundMessage>, payload: Vec<u8>) {
    let _ = tx.send(OutboundMessage::Binary(payload)).await;
}

async fn send_error(tx: &mpsc::Sender<OutboundMessage>, error: BridgeError) {
    let message = ServerMessage::Error {
        message: error.to_string(),
        code: error.code().to_string(),
    };
    send_to_client(tx, &message).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_variant_rates_match_spec() {
        assert_eq!(crate::llm::openai::SAMPLE_RATE, 24_000);
        assert_eq!(crate::llm::gemini::SAMPLE_RATE, 16_000);
    }
}
