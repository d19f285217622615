//! Explicit tagged-enum state for the two stateful protocols the
//! orchestrator drives: the LLM response lifecycle and the TTS stream
//! handle. Both replace a loose boolean flag with an allowed-transition
//! table, per the response-lifecycle design note.

/// At most one response may be in flight per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseLifecycle {
    Idle,
    InFlight,
}

impl ResponseLifecycle {
    pub fn start(&mut self) {
        *self = ResponseLifecycle::InFlight;
    }

    pub fn finish(&mut self) {
        *self = ResponseLifecycle::Idle;
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self, ResponseLifecycle::InFlight)
    }
}

impl Default for ResponseLifecycle {
    fn default() -> Self {
        ResponseLifecycle::Idle
    }
}

/// Lifecycle of the per-session TTS stream. `None` before the greeting
/// opens it the first time; a fresh stream opens per subsequent utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtsState {
    None,
    Starting,
    Open,
    Finalizing,
    Closed,
}

impl TtsState {
    /// Text may be pushed only while the stream is `Open`.
    pub fn can_send_text(&self) -> bool {
        matches!(self, TtsState::Open)
    }
}

impl Default for TtsState {
    fn default() -> Self {
        TtsState::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_lifecycle_round_trips() {
        let mut lifecycle = ResponseLifecycle::default();
        assert!(!lifecycle.is_in_flight());
        lifecycle.start();
        assert!(lifecycle.is_in_flight());
        lifecycle.finish();
        assert!(!lifecycle.is_in_flight());
    }

    #[test]
    fn tts_state_only_open_can_send() {
        assert!(!TtsState::None.can_send_text());
        assert!(!TtsState::Starting.can_send_text());
        assert!(TtsState::Open.can_send_text());
        assert!(!TtsState::Finalizing.can_send_text());
        assert!(!TtsState::Closed.can_send_text());
    }
}
