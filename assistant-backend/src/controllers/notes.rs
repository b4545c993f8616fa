//! Notes REST API for the web UI.
//!
//! Rows only; the agent's note tools also keep a text file per note.

use actix_web::{web, HttpResponse, Responder};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::models::Note;
use crate::AppState;

#[derive(Debug, Deserialize)]
struct CreateNoteRequest {
    filename: String,
    title: Option<String>,
    content: String,
}

#[derive(Debug, Serialize)]
struct NoteResponse {
    id: i64,
    filename: String,
    title: Option<String>,
    content: String,
    created_at: DateTime<Utc>,
}

impl From<Note> for NoteResponse {
    fn from(note: Note) -> Self {
        Self {
            id: note.id,
            filename: note.filename,
            title: note.title,
            content: note.content,
            created_at: note.created_at,
        }
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/notes")
            .route("", web::post().to(create_note))
            .route("", web::get().to(list_notes))
            .route("/{id}", web::get().to(get_note))
            .route("/{id}", web::delete().to(delete_note)),
    );
}

fn db_error(e: rusqlite::Error) -> HttpResponse {
    log::error!("[NOTES] Database error: {}", e);
    HttpResponse::InternalServerError().json(json!({ "error": format!("Database error: {}", e) }))
}

fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(json!({ "error": "Note not found" }))
}

async fn create_note(state: web::Data<AppState>, body: web::Json<CreateNoteRequest>) -> impl Responder {
    let request = body.into_inner();
    if request.filename.trim().is_empty() {
        return HttpResponse::BadRequest().json(json!({ "error": "Filename cannot be empty" }));
    }
    let title = request
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| request.filename.clone());

    match state.db.create_note(&request.filename, Some(title.as_str()), &request.content) {
        Ok(note) => {
            log::info!("[NOTES] Created note {} via API", note.id);
            HttpResponse::Ok().json(NoteResponse::from(note))
        }
        Err(e) => db_error(e),
    }
}

async fn list_notes(state: web::Data<AppState>) -> impl Responder {
    match state.db.list_notes() {
        Ok(notes) => {
            let notes: Vec<NoteResponse> = notes.into_iter().map(NoteResponse::from).collect();
            HttpResponse::Ok().json(notes)
        }
        Err(e) => db_error(e),
    }
}

async fn get_note(state: web::Data<AppState>, path: web::Path<i64>) -> impl Responder {
    match state.db.get_note(path.into_inner()) {
        Ok(Some(note)) => HttpResponse::Ok().json(NoteResponse::from(note)),
        Ok(None) => not_found(),
        Err(e) => db_error(e),
    }
}

async fn delete_note(state: web::Data<AppState>, path: web::Path<i64>) -> impl Responder {
    match state.db.delete_note(path.into_inner()) {
        Ok(true) => HttpResponse::Ok().json(json!({ "message": "Note deleted successfully" })),
        Ok(false) => not_found(),
        Err(e) => db_error(e),
    }
}
