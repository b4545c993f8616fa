//! Speech-to-text through the Whisper sidecar

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::audio::AudioFormat;

const TRANSCRIBE_TIMEOUT: Duration = Duration::from_secs(60);

/// Transcript and quality signals for one clip
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transcription {
    pub text: String,
    pub language: String,
    pub language_probability: f64,
    pub confidence: f64,
    pub duration: f64,
    pub num_segments: usize,
}

#[derive(Debug, Deserialize)]
struct WhisperResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    language_probability: Option<f64>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    segments: Vec<WhisperSegment>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    #[serde(default)]
    avg_logprob: f64,
}

/// Mean segment log probability shifted into 0..=1, three decimals
pub fn confidence_from_logprobs(logprobs: &[f64]) -> f64 {
    let mean = if logprobs.is_empty() {
        0.0
    } else {
        logprobs.iter().sum::<f64>() / logprobs.len() as f64
    };
    ((mean + 1.0).clamp(0.0, 1.0) * 1000.0).round() / 1000.0
}

fn into_transcription(resp: WhisperResponse) -> Transcription {
    let logprobs: Vec<f64> = resp.segments.iter().map(|s| s.avg_logprob).collect();
    Transcription {
        text: resp.text.trim().to_string(),
        language: resp.language.unwrap_or_else(|| "unknown".to_string()),
        language_probability: resp.language_probability.unwrap_or(0.0),
        confidence: confidence_from_logprobs(&logprobs),
        duration: resp.duration.unwrap_or(0.0),
        num_segments: resp.segments.len(),
    }
}

pub struct SpeechToText {
    client: reqwest::Client,
    base_url: String,
}

impl SpeechToText {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Send a validated clip for transcription. `language` unset means
    /// auto-detect.
    pub async fn transcribe(
        &self,
        audio: Vec<u8>,
        filename: Option<String>,
        format: AudioFormat,
        language: Option<&str>,
    ) -> Result<Transcription, String> {
        let url = format!("{}/transcribe", self.base_url);
        let size = audio.len();
        let fname = filename.unwrap_or_else(|| format!("audio{}", format.extension()));

        let audio_part = reqwest::multipart::Part::bytes(audio)
            .file_name(fname)
            .mime_str(format.mime_type())
            .map_err(|e| format!("Invalid audio content type: {}", e))?;

        let mut form = reqwest::multipart::Form::new().part("audio", audio_part);
        if let Some(language) = language.filter(|l| !l.trim().is_empty()) {
            form = form.text("language", language.to_string());
        }

        log::info!("[STT] Transcribing {} bytes of {}", size, format.as_ref());

        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .timeout(TRANSCRIBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                log::error!("[STT] Failed to reach whisper server at {}: {}", url, e);
                format!("Cannot reach whisper server: {}", e)
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            log::error!("[STT] Whisper server returned {}: {}", status, body);
            return Err(format!("Whisper server error: {} {}", status, body));
        }

        let parsed: WhisperResponse = resp
            .json()
            .await
            .map_err(|e| format!("Invalid response from whisper server: {}", e))?;

        let transcription = into_transcription(parsed);
        log::info!(
            "[STT] Transcription complete: {} chars, language: {}, confidence: {}",
            transcription.text.len(),
            transcription.language,
            transcription.confidence
        );
        Ok(transcription)
    }
}
