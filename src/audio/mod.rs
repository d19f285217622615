//! Audio Codec and Output Smoother: pure PCM/WAV transforms plus the
//! buffering policy that turns a stream of TTS chunks into client-sized
//! WAV frames.

pub mod codec;
pub mod smoother;
