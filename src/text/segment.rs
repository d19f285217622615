//! Segment Flusher: splits the streaming LLM text channel into
//! sentence-sized segments suitable for incremental TTS.

const MIN_PARTIAL_CHARS: usize = 60;
const TERMINATORS: [char; 3] = ['.', '!', '?'];

/// Accumulates LLM text deltas and decides when a prefix is ready to hand
/// to the TTS client.
#[derive(Debug, Default)]
pub struct SegmentFlusher {
    buffer: String,
}

impl SegmentFlusher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, delta: &str) {
        self.buffer.push_str(delta);
    }

    /// Non-forced flush: only returns a segment once the buffer is at
    /// least [`MIN_PARTIAL_CHARS`] long and ends (somewhere) in terminal
    /// punctuation. Flushes up to and including the last terminator,
    /// keeping the remainder buffered.
    pub fn try_flush(&mut self) -> Option<String> {
        if self.buffer.len() < MIN_PARTIAL_CHARS {
            return None;
        }

        let last_terminator = self
            .buffer
            .char_indices()
            .filter(|(_, c)| TERMINATORS.contains(c))
            .last()?;
        let split_at = last_terminator.0 + last_terminator.1.len_utf8();

        let segment = self.buffer[..split_at].to_string();
        self.buffer = self.buffer[split_at..].to_string();
        Some(segment)
    }

    /// Forced flush: drains and returns the entire buffer, trimmed. Used at
    /// `text_done` and `response_done`.
    pub fn force_flush(&mut self) -> Option<String> {
        let trimmed = self.buffer.trim().to_string();
        self.buffer.clear();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn does_not_flush_below_minimum_length() {
        let mut flusher = SegmentFlusher::new();
        flusher.push("Short sentence.");
        assert!(flusher.try_flush().is_none());
    }

    #[test]
    fn flushes_up_to_last_terminator_once_long_enough() {
        let mut flusher = SegmentFlusher::new();
        flusher.push("This is a reasonably long first sentence that ends here. And a second");
        let segment = flusher.try_flush().unwrap();
        assert!(segment.ends_with('.'));
        assert!(!flusher.is_empty());
    }

    #[test]
    fn no_terminator_means_no_flush_even_if_long() {
        let mut flusher = SegmentFlusher::new();
        flusher.push("This buffer has no terminal punctuation at all even though it is long");
        assert!(flusher.try_flush().is_none());
    }

    #[test]
    fn force_flush_drains_and_trims_buffer() {
        let mut flusher = SegmentFlusher::new();
        flusher.push("  partial thought without a terminator  ");
        let segment = flusher.force_flush().unwrap();
        assert_eq!(segment, "partial thought without a terminator");
        assert!(flusher.is_empty());
        assert!(flusher.force_flush().is_none());
    }
}
