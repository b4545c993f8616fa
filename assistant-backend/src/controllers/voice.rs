//! Speech synthesis, spoken chat and the voice catalog

use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, Responder};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::chat::DEFAULT_SESSION_ID;
use super::multipart::read_form;
use crate::agent::run_chat_turn;
use crate::voice::{validate_audio, SpeechOptions, Voice, MAX_AUDIO_SIZE};
use crate::AppState;

#[derive(Debug, Deserialize)]
struct SpeakRequest {
    text: String,
    voice: Option<String>,
    rate: Option<String>,
    pitch: Option<String>,
    volume: Option<String>,
}

impl SpeakRequest {
    fn options(&self) -> SpeechOptions {
        let defaults = SpeechOptions::default();
        SpeechOptions {
            voice: self.voice.clone(),
            rate: self.rate.clone().unwrap_or(defaults.rate),
            pitch: self.pitch.clone().unwrap_or(defaults.pitch),
            volume: self.volume.clone().unwrap_or(defaults.volume),
        }
    }
}

#[derive(Debug, Serialize)]
struct VoiceChatResponse {
    transcript: String,
    response_text: String,
    response_audio_base64: String,
    tools_used: Vec<String>,
    session_id: String,
    language: String,
    confidence: f64,
}

#[derive(Debug, Deserialize)]
struct VoicesQuery {
    language: Option<String>,
}

#[derive(Debug, Serialize)]
struct VoiceEntry<'a> {
    id: &'a str,
    name: &'a str,
    gender: &'a str,
    locale: &'a str,
}

impl<'a> From<&'a Voice> for VoiceEntry<'a> {
    fn from(v: &'a Voice) -> Self {
        Self {
            id: &v.short_name,
            name: &v.friendly_name,
            gender: &v.gender,
            locale: &v.locale,
        }
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/speak").route(web::post().to(speak)));
    cfg.service(web::resource("/api/voice-chat").route(web::post().to(voice_chat)));
    cfg.service(web::resource("/api/voices").route(web::get().to(list_voices)));
}

async fn speak(state: web::Data<AppState>, body: web::Json<SpeakRequest>) -> impl Responder {
    let request = body.into_inner();
    if request.text.trim().is_empty() {
        return HttpResponse::BadRequest().json(json!({ "error": "Text cannot be empty" }));
    }

    match state.tts.synthesize(&request.text, &request.options()).await {
        Ok(audio) => HttpResponse::Ok()
            .content_type("audio/mpeg")
            .insert_header(("Content-Disposition", "attachment; filename=\"speech.mp3\""))
            .body(audio),
        Err(e) => {
            log::error!("[TTS] Speech synthesis failed: {}", e);
            HttpResponse::InternalServerError()
                .json(json!({ "error": format!("Speech synthesis failed: {}", e) }))
        }
    }
}

/// Transcribe, answer and speak the answer back
async fn voice_chat(state: web::Data<AppState>, payload: Multipart) -> impl Responder {
    let form = match read_form(payload, "audio_file", MAX_AUDIO_SIZE + 1).await {
        Ok(form) => form,
        Err(resp) => return resp,
    };
    let session_id = form
        .field("session_id")
        .unwrap_or(DEFAULT_SESSION_ID)
        .to_string();
    let voice = form.field("voice").map(|v| v.to_string());

    let file = match form.file {
        Some(file) if file.filename.as_deref().is_some_and(|n| !n.is_empty()) => file,
        _ => return HttpResponse::BadRequest().json(json!({ "error": "No audio file provided" })),
    };
    let format = match validate_audio(file.filename.as_deref(), &file.data) {
        Ok(format) => format,
        Err(e) => return HttpResponse::BadRequest().json(json!({ "error": e })),
    };

    log::info!("[VOICE] Voice chat request: {:?}, session: {}", file.filename, session_id);

    match run_voice_chat(&state, file.data, file.filename, format, &session_id, voice).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => {
            log::error!("[VOICE] Voice chat failed: {}", e);
            HttpResponse::InternalServerError().json(json!({ "error": format!("Voice chat failed: {}", e) }))
        }
    }
}

async fn run_voice_chat(
    state: &AppState,
    audio: Vec<u8>,
    filename: Option<String>,
    format: crate::voice::AudioFormat,
    session_id: &str,
    voice: Option<String>,
) -> Result<VoiceChatResponse, String> {
    log::info!("[VOICE] Step 1/3: Transcribing audio...");
    let transcription = state.stt.transcribe(audio, filename, format, None).await?;
    log::info!("[VOICE] Transcribed: '{}'", transcription.text);
    if transcription.text.is_empty() {
        return Err("No speech detected in audio".to_string());
    }

    log::info!("[VOICE] Step 2/3: Processing with agent...");
    let context = state.tool_context();
    let reply = run_chat_turn(
        &state.db,
        &state.agent,
        &state.session_locks,
        &context,
        session_id,
        &transcription.text,
    )
    .await?;

    log::info!("[VOICE] Step 3/3: Synthesizing speech...");
    let audio = state.tts.synthesize_reply(&reply.response, voice).await?;
    log::info!("[VOICE] Voice chat complete: {} bytes audio", audio.len());

    Ok(VoiceChatResponse {
        transcript: transcription.text,
        response_text: reply.response,
        response_audio_base64: STANDARD.encode(&audio),
        tools_used: reply.tools_used,
        session_id: reply.session_id,
        language: transcription.language,
        confidence: transcription.confidence,
    })
}

async fn list_voices(state: web::Data<AppState>, query: web::Query<VoicesQuery>) -> impl Responder {
    let voices = match query.language.as_deref().filter(|l| !l.trim().is_empty()) {
        Some(language) => state.tts.voices_by_language(language).await,
        None => state.tts.available_voices().await.map(|v| v.as_ref().clone()),
    };

    match voices {
        Ok(voices) => {
            let entries: Vec<VoiceEntry> = voices.iter().map(VoiceEntry::from).collect();
            HttpResponse::Ok().json(json!({
                "total": entries.len(),
                "voices": entries
            }))
        }
        Err(e) => {
            log::error!("[TTS] Failed to list voices: {}", e);
            HttpResponse::InternalServerError()
                .json(json!({ "error": format!("Failed to list voices: {}", e) }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speak_request_fills_prosody_defaults() {
        let request: SpeakRequest = serde_json::from_value(json!({
            "text": "Hello",
            "rate": "+10%"
        }))
        .unwrap();
        let options = request.options();
        assert_eq!(options.voice, None);
        assert_eq!(options.rate, "+10%");
        assert_eq!(options.pitch, "+0Hz");
        assert_eq!(options.volume, "+0%");
    }

    #[test]
    fn test_voice_entry_shape() {
        let voice = Voice {
            short_name: "en-GB-SoniaNeural".to_string(),
            friendly_name: "Sonia".to_string(),
            gender: "Female".to_string(),
            locale: "en-GB".to_string(),
        };
        let value = serde_json::to_value(VoiceEntry::from(&voice)).unwrap();
        assert_eq!(
            value,
            json!({"id": "en-GB-SoniaNeural", "name": "Sonia", "gender": "Female", "locale": "en-GB"})
        );
    }
}
