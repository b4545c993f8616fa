//! Voice I/O: audio validation plus the speech-to-text and text-to-speech
//! sidecar clients

pub mod audio;
pub mod stt;
pub mod tts;

pub use audio::{validate_audio, AudioFormat, MAX_AUDIO_SIZE};
pub use stt::SpeechToText;
pub use tts::{SpeechOptions, TextToSpeech, Voice};
