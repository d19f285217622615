//! Output Smoother: buffers raw TTS PCM and flushes well-sized WAV frames
//! to the client to reduce audible gaps on mobile playback.
//!
//! Guarded by a `tokio::sync::Mutex`; the async I/O (WAV wrap, socket send)
//! always happens after the lock is released.

use std::time::Instant;

use tokio::sync::Mutex;

use crate::audio::codec::pcm_to_wav;
use crate::config::SmootherConfig;
use crate::error::BridgeError;

struct Buffer {
    pcm: Vec<u8>,
    last_flush: Instant,
}

pub struct OutputSmoother {
    buffer: Mutex<Buffer>,
    rate: u32,
    min_flush_bytes: usize,
    max_wait_ms: u64,
    hard_cap_bytes: usize,
}

impl OutputSmoother {
    pub fn new(rate: u32, config: SmootherConfig) -> Self {
        let bytes_per_ms = (rate as f64 * 2.0 / 1000.0) as usize;
        Self {
            buffer: Mutex::new(Buffer {
                pcm: Vec::new(),
                last_flush: Instant::now(),
            }),
            rate,
            min_flush_bytes: bytes_per_ms * config.min_flush_ms as usize,
            max_wait_ms: config.max_wait_ms,
            hard_cap_bytes: bytes_per_ms * config.hard_cap_ms as usize,
        }
    }

    /// Append a PCM chunk, returning a WAV frame to send if a flush
    /// threshold (size, time, or hard cap) was crossed.
    pub async fn push(&self, chunk: &[u8]) -> Result<Option<Vec<u8>>, BridgeError> {
        let pcm_to_flush = {
            let mut buffer = self.buffer.lock().await;
            buffer.pcm.extend_from_slice(chunk);

            let size_ready = buffer.pcm.len() >= self.min_flush_bytes;
            let time_ready = !buffer.pcm.is_empty()
                && buffer.last_flush.elapsed().as_millis() as u64 >= self.max_wait_ms;
            let over_cap = buffer.pcm.len() >= self.hard_cap_bytes;

            if size_ready || time_ready || over_cap {
                let drained = std::mem::take(&mut buffer.pcm);
                buffer.last_flush = Instant::now();
                Some(drained)
            } else {
                None
            }
        };

        match pcm_to_flush {
            Some(pcm) if !pcm.is_empty() => Ok(Some(pcm_to_wav(&pcm, self.rate)?)),
            _ => Ok(None),
        }
    }

    /// Force-flush whatever is buffered, regardless of thresholds. Used on
    /// response completion and session end so audio from different
    /// responses never mixes.
    pub async fn force_flush(&self) -> Result<Option<Vec<u8>>, BridgeError> {
        let pcm = {
            let mut buffer = self.buffer.lock().await;
            let drained = std::mem::take(&mut buffer.pcm);
            buffer.last_flush = Instant::now();
            drained
        };

        if pcm.is_empty() {
            Ok(None)
        } else {
            Ok(Some(pcm_to_wav(&pcm, self.rate)?))
        }
    }

    /// Clear the buffer without producing a WAV frame, used when starting a
    /// new response so leftover bytes from a prior one are discarded.
    pub async fn reset(&self) {
        let mut buffer = self.buffer.lock().await;
        buffer.pcm.clear();
        buffer.last_flush = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SmootherConfig {
        SmootherConfig {
            min_flush_ms: 100,
            max_wait_ms: 100,
            hard_cap_ms: 500,
        }
    }

    #[tokio::test]
    async fn flushes_once_size_threshold_crossed() {
        let smoother = OutputSmoother::new(24000, config());
        // min_flush_bytes at 24kHz/100ms = 4800 bytes.
        let small_chunk = vec![0u8; 2000];
        assert!(smoother.push(&small_chunk).await.unwrap().is_none());
        let result = smoother.push(&vec![0u8; 3000]).await.unwrap();
        assert!(result.is_some());
    }

    #[tokio::test]
    async fn force_flush_drains_partial_buffer() {
        let smoother = OutputSmoother::new(24000, config());
        smoother.push(&vec![1u8; 10]).await.unwrap();
        let flushed = smoother.force_flush().await.unwrap();
        assert!(flushed.is_some());
        let flushed_again = smoother.force_flush().await.unwrap();
        assert!(flushed_again.is_none());
    }

    #[tokio::test]
    async fn hard_cap_forces_flush_regardless_of_time() {
        let smoother = OutputSmoother::new(24000, config());
        // hard_cap_bytes at 24kHz/500ms = 24000 bytes.
        let result = smoother.push(&vec![0u8; 25000]).await.unwrap();
        assert!(result.is_some());
    }
}
