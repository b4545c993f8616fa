//! Text-to-speech through the neural TTS sidecar
//!
//! The sidecar returns MP3 audio from `/synthesize` and its voice catalog
//! from `/voices`. The catalog rarely changes and is cached.

use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_VOICE: &str = "en-US-AriaNeural";
pub const MAX_CHUNK_CHARS: usize = 500;

const SYNTHESIZE_TIMEOUT: Duration = Duration::from_secs(60);
const VOICES_TIMEOUT: Duration = Duration::from_secs(15);
const VOICES_CACHE_TTL: Duration = Duration::from_secs(3600);
const VOICES_KEY: &str = "all";

/// Short keys for common voices
pub const POPULAR_VOICES: &[(&str, &str)] = &[
    ("en-US-female", "en-US-AriaNeural"),
    ("en-US-male", "en-US-GuyNeural"),
    ("en-GB-female", "en-GB-SoniaNeural"),
    ("en-GB-male", "en-GB-RyanNeural"),
    ("en-AU-female", "en-AU-NatashaNeural"),
    ("en-AU-male", "en-AU-WilliamNeural"),
    ("es-US-female", "es-US-PalomaNeural"),
    ("es-US-male", "es-US-AlonsoNeural"),
    ("fr-FR-female", "fr-FR-DeniseNeural"),
    ("fr-FR-male", "fr-FR-HenriNeural"),
    ("de-DE-female", "de-DE-KatjaNeural"),
    ("de-DE-male", "de-DE-ConradNeural"),
];

/// Catalog entry as reported by the sidecar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Voice {
    pub short_name: String,
    #[serde(default)]
    pub friendly_name: String,
    #[serde(default)]
    pub gender: String,
    pub locale: String,
}

/// Prosody settings in edge-tts notation
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechOptions {
    pub voice: Option<String>,
    pub rate: String,
    pub pitch: String,
    pub volume: String,
}

impl Default for SpeechOptions {
    fn default() -> Self {
        Self {
            voice: None,
            rate: "+0%".to_string(),
            pitch: "+0Hz".to_string(),
            volume: "+0%".to_string(),
        }
    }
}

impl SpeechOptions {
    pub fn with_voice(voice: Option<String>) -> Self {
        Self {
            voice,
            ..Self::default()
        }
    }
}

/// Split long text on sentence boundaries into chunks of about
/// `max_chars`. Each chunk ends with a period.
pub fn split_for_synthesis(text: &str, max_chars: usize) -> Vec<String> {
    let flattened = text.replace('\n', " ");
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0;

    for sentence in flattened.split(". ").map(str::trim).filter(|s| !s.is_empty()) {
        let len = sentence.chars().count();
        if current_len + len > max_chars && !current.is_empty() {
            chunks.push(format!("{}.", current.join(". ")));
            current.clear();
            current_len = 0;
        }
        current.push(sentence);
        current_len += len;
    }
    if !current.is_empty() {
        chunks.push(format!("{}.", current.join(". ")));
    }
    chunks
}

/// Voice id for a popular key such as `en-GB-male`
pub fn popular_voice(key: &str) -> Option<&'static str> {
    POPULAR_VOICES.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

/// Replies longer than one synthesis request are spoken chunk by chunk
pub fn needs_chunking(text: &str) -> bool {
    text.chars().count() > MAX_CHUNK_CHARS
}

pub struct TextToSpeech {
    client: reqwest::Client,
    base_url: String,
    default_voice: String,
    voices: Cache<String, Arc<Vec<Voice>>>,
}

impl TextToSpeech {
    pub fn new(base_url: &str) -> Self {
        Self::with_default_voice(base_url, DEFAULT_VOICE)
    }

    pub fn with_default_voice(base_url: &str, default_voice: &str) -> Self {
        log::info!("[TTS] Initializing TTS service with default voice: {}", default_voice);
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            default_voice: default_voice.to_string(),
            voices: Cache::builder()
                .max_capacity(1)
                .time_to_live(VOICES_CACHE_TTL)
                .build(),
        }
    }

    /// Popular keys map to their voice id, other names pass through,
    /// blank or missing falls back to the default voice
    pub fn resolve_voice<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        match requested.map(str::trim).filter(|v| !v.is_empty()) {
            Some(key) => popular_voice(key).unwrap_or(key),
            None => self.default_voice.as_str(),
        }
    }

    /// Render `text` to MP3 bytes
    pub async fn synthesize(&self, text: &str, options: &SpeechOptions) -> Result<Vec<u8>, String> {
        if text.trim().is_empty() {
            return Err("Text cannot be empty".to_string());
        }
        let voice = self.resolve_voice(options.voice.as_deref());

        log::info!(
            "[TTS] Synthesizing speech: {} chars with voice '{}'",
            text.chars().count(),
            voice
        );

        let url = format!("{}/synthesize", self.base_url);
        let resp = self
            .client
            .post(&url)
            .timeout(SYNTHESIZE_TIMEOUT)
            .json(&json!({
                "text": text,
                "voice": voice,
                "rate": options.rate,
                "pitch": options.pitch,
                "volume": options.volume,
            }))
            .send()
            .await
            .map_err(|e| {
                log::error!("[TTS] Failed to reach TTS server at {}: {}", url, e);
                format!("Cannot reach TTS server: {}", e)
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            log::error!("[TTS] TTS server returned {}: {}", status, body);
            return Err(format!("TTS server error: {} {}", status, body));
        }

        let audio = resp
            .bytes()
            .await
            .map_err(|e| format!("Failed to read synthesized audio: {}", e))?;
        log::info!("[TTS] Speech synthesized: {} bytes", audio.len());
        Ok(audio.to_vec())
    }

    /// Synthesize long text piecewise and concatenate the MP3 streams
    pub async fn synthesize_chunks(
        &self,
        text: &str,
        max_chunk_chars: usize,
        voice: Option<String>,
    ) -> Result<Vec<u8>, String> {
        let chunks = split_for_synthesis(text, max_chunk_chars);
        if chunks.is_empty() {
            return Err("Text cannot be empty".to_string());
        }
        log::info!("[TTS] Synthesizing {} chunks", chunks.len());

        let options = SpeechOptions::with_voice(voice);
        let mut audio = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            log::debug!("[TTS] Synthesizing chunk {}/{}", i + 1, chunks.len());
            audio.extend(self.synthesize(chunk, &options).await?);
        }
        Ok(audio)
    }

    /// Speak an agent reply, chunked when it is too long for one request
    pub async fn synthesize_reply(&self, text: &str, voice: Option<String>) -> Result<Vec<u8>, String> {
        if needs_chunking(text) {
            self.synthesize_chunks(text, MAX_CHUNK_CHARS, voice).await
        } else {
            self.synthesize(text, &SpeechOptions::with_voice(voice)).await
        }
    }

    /// Full voice catalog, cached
    pub async fn available_voices(&self) -> Result<Arc<Vec<Voice>>, String> {
        if let Some(voices) = self.voices.get(VOICES_KEY) {
            return Ok(voices);
        }

        log::info!("[TTS] Fetching available voices...");
        let url = format!("{}/voices", self.base_url);
        let resp = self
            .client
            .get(&url)
            .timeout(VOICES_TIMEOUT)
            .send()
            .await
            .map_err(|e| format!("Cannot reach TTS server: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("TTS server error: {}", resp.status()));
        }
        let voices: Vec<Voice> = resp
            .json()
            .await
            .map_err(|e| format!("Invalid voice list from TTS server: {}", e))?;

        log::info!("[TTS] Found {} voices", voices.len());
        let voices = Arc::new(voices);
        self.voices.insert(VOICES_KEY.to_string(), voices.clone());
        Ok(voices)
    }

    /// Voices whose locale starts with `language`, e.g. `en` or `es-ES`
    pub async fn voices_by_language(&self, language: &str) -> Result<Vec<Voice>, String> {
        let voices = self.available_voices().await?;
        Ok(filter_by_locale(&voices, language))
    }
}

pub fn filter_by_locale(voices: &[Voice], prefix: &str) -> Vec<Voice> {
    voices
        .iter()
        .filter(|v| v.locale.starts_with(prefix))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_groups_sentences() {
        let text = "First sentence. Second one. Third";
        assert_eq!(split_for_synthesis(text, 500), vec!["First sentence. Second one. Third."]);

        let chunks = split_for_synthesis(text, 20);
        assert_eq!(chunks, vec!["First sentence.", "Second one. Third."]);

        assert!(split_for_synthesis("   \n ", 500).is_empty());
    }

    #[test]
    fn test_split_respects_limit() {
        let sentence = "a".repeat(200);
        let text = vec![sentence.as_str(); 6].join(". ");
        let chunks = split_for_synthesis(&text, MAX_CHUNK_CHARS);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().filter(|ch| *ch == 'a').count() <= MAX_CHUNK_CHARS));
    }

    #[test]
    fn test_popular_voice_lookup() {
        assert_eq!(popular_voice("en-GB-male"), Some("en-GB-RyanNeural"));
        assert_eq!(popular_voice("xx-XX"), None);
    }

    #[test]
    fn test_resolve_voice() {
        let tts = TextToSpeech::new("http://localhost:1");
        assert_eq!(tts.resolve_voice(Some("de-DE-female")), "de-DE-KatjaNeural");
        assert_eq!(tts.resolve_voice(Some(" fr-FR-male ")), "fr-FR-HenriNeural");
        assert_eq!(tts.resolve_voice(Some("it-IT-ElsaNeural")), "it-IT-ElsaNeural");
        assert_eq!(tts.resolve_voice(Some("  ")), DEFAULT_VOICE);
        assert_eq!(tts.resolve_voice(None), DEFAULT_VOICE);

        let custom = TextToSpeech::with_default_voice("http://localhost:1", "en-GB-SoniaNeural");
        assert_eq!(custom.resolve_voice(None), "en-GB-SoniaNeural");
    }

    #[test]
    fn test_long_replies_are_chunked() {
        assert!(!needs_chunking("Short answer."));
        assert!(!needs_chunking(&"é".repeat(MAX_CHUNK_CHARS)));
        assert!(needs_chunking(&"a".repeat(MAX_CHUNK_CHARS + 1)));
    }

    #[test]
    fn test_voice_catalog_parsing_and_filter() {
        let voices: Vec<Voice> = serde_json::from_value(serde_json::json!([
            {"ShortName": "en-US-AriaNeural", "FriendlyName": "Aria", "Gender": "Female", "Locale": "en-US"},
            {"ShortName": "es-ES-AlvaroNeural", "FriendlyName": "Alvaro", "Gender": "Male", "Locale": "es-ES"},
            {"ShortName": "en-GB-RyanNeural", "Gender": "Male", "Locale": "en-GB"}
        ]))
        .unwrap();

        let english = filter_by_locale(&voices, "en");
        assert_eq!(english.len(), 2);
        assert_eq!(filter_by_locale(&voices, "es-ES")[0].friendly_name, "Alvaro");
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let tts = TextToSpeech::new("http://localhost:1");
        let err = tts.synthesize("  ", &SpeechOptions::default()).await.unwrap_err();
        assert_eq!(err, "Text cannot be empty");

        let err = tts.synthesize_reply("", None).await.unwrap_err();
        assert_eq!(err, "Text cannot be empty");
    }
}
