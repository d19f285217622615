//! Client <-> Bridge WebSocket wire protocol.

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "greeting")]
    Greeting { user_name: String, mode: String },
    #[serde(rename = "audio_commit")]
    AudioCommit,
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "close")]
    Close,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "connected")]
    Connected,
    #[serde(rename = "greeting_done")]
    GreetingDone { text: String },
    #[serde(rename = "transcript_delta")]
    TranscriptDelta { text: String },
    #[serde(rename = "transcript_done")]
    TranscriptDone { text: String },
    #[serde(rename = "response_done")]
    ResponseDone,
    #[serde(rename = "pong")]
    Pong,
    #[serde(rename = "error")]
    Error { message: String, code: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_deserializes_from_json() {
        let raw = r#"{"type":"greeting","user_name":"Ayesha","mode":"general"}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        match msg {
            ClientMessage::Greeting { user_name, mode } => {
                assert_eq!(user_name, "Ayesha");
                assert_eq!(mode, "general");
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn error_message_serializes_with_code() {
        let msg = ServerMessage::Error {
            message: "boom".to_string(),
            code: "not_initialized".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"error\""));
        assert!(json.contains("\"code\":\"not_initialized\""));
    }
}
