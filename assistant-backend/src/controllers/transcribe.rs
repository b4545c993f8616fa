use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, Responder};
use serde_json::json;

use super::multipart::read_form;
use crate::voice::{validate_audio, MAX_AUDIO_SIZE};
use crate::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/transcribe")
            .route("", web::post().to(transcribe)),
    );
}

async fn transcribe(state: web::Data<AppState>, payload: Multipart) -> impl Responder {
    // One byte over the limit so validation reports the real size
    let form = match read_form(payload, "audio_file", MAX_AUDIO_SIZE + 1).await {
        Ok(form) => form,
        Err(resp) => return resp,
    };
    let language = form.field("language").map(|l| l.to_string());

    let file = match form.file {
        Some(file) if file.filename.as_deref().is_some_and(|n| !n.is_empty()) => file,
        _ => return HttpResponse::BadRequest().json(json!({ "error": "No file provided" })),
    };

    let format = match validate_audio(file.filename.as_deref(), &file.data) {
        Ok(format) => format,
        Err(e) => return HttpResponse::BadRequest().json(json!({ "error": e })),
    };

    log::info!(
        "[STT] Transcription request: {:?} ({} bytes, {:?})",
        file.filename,
        file.data.len(),
        file.content_type
    );

    match state
        .stt
        .transcribe(file.data, file.filename, format, language.as_deref())
        .await
    {
        Ok(transcription) => HttpResponse::Ok().json(transcription),
        Err(e) => {
            log::error!("[STT] Transcription failed: {}", e);
            HttpResponse::InternalServerError().json(json!({ "error": format!("Transcription failed: {}", e) }))
        }
    }
}
