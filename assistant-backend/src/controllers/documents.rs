//! Document upload and knowledge base management

use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::multipart::read_form;
use crate::config::documents_dir;
use crate::models::{Document, DocumentStatus, Role};
use crate::rag::loader::{is_supported, SUPPORTED_TYPES};
use crate::rag::IngestMetadata;
use crate::AppState;

const MAX_DOCUMENT_SIZE: usize = 50 * 1024 * 1024;

#[derive(Debug, Deserialize)]
struct UploadQuery {
    session_id: Option<String>,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/upload-document").route(web::post().to(upload_document)));
    cfg.service(
        web::scope("/api/documents")
            .route("", web::get().to(list_documents))
            .route("/stats", web::get().to(collection_stats))
            .route("/knowledge-base", web::delete().to(clear_knowledge_base))
            .route("/{id}", web::get().to(get_document)),
    );
}

/// Each upload gets its own directory so equal names never overwrite
/// each other and the stored file keeps its original name
fn upload_path(dir: &Path, filename: &str) -> PathBuf {
    dir.join(Uuid::new_v4().to_string()).join(filename)
}

async fn save_upload(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::write(path, data).await
}

/// Lowercase extension with its dot, `""` when there is none
fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

fn allowed_types_display() -> String {
    let quoted: Vec<String> = SUPPORTED_TYPES.iter().map(|t| format!("\".{}\"", t)).collect();
    format!("[{}]", quoted.join(", "))
}

fn upload_breadcrumb(filename: &str, chunks: usize) -> String {
    format!(
        "[SYSTEM] Document uploaded: '{}' ({} chunks). User can now ask questions about this document.",
        filename, chunks
    )
}

async fn upload_document(
    state: web::Data<AppState>,
    query: web::Query<UploadQuery>,
    payload: Multipart,
) -> impl Responder {
    let form = match read_form(payload, "file", MAX_DOCUMENT_SIZE).await {
        Ok(form) => form,
        Err(resp) => return resp,
    };

    let session_id = query
        .into_inner()
        .session_id
        .filter(|s| !s.trim().is_empty())
        .or_else(|| form.field("session_id").map(|s| s.to_string()));

    let file = match form.file {
        Some(file) => file,
        None => return HttpResponse::BadRequest().json(json!({ "error": "No file provided" })),
    };

    // Only the final path component, never a client supplied directory
    let filename = match file
        .filename
        .as_deref()
        .and_then(|name| Path::new(name).file_name())
        .and_then(|name| name.to_str())
    {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => return HttpResponse::BadRequest().json(json!({ "error": "No file provided" })),
    };

    let extension = extension_of(&filename);
    let file_type = extension.trim_start_matches('.').to_string();
    if !is_supported(&file_type) {
        return HttpResponse::BadRequest().json(json!({
            "error": format!(
                "File type {} not supported. Allowed: {}",
                extension,
                allowed_types_display()
            )
        }));
    }

    let file_path = upload_path(&documents_dir(), &filename);
    if let Err(e) = save_upload(&file_path, &file.data).await {
        log::error!("[RAG] Failed to save upload {}: {}", file_path.display(), e);
        return HttpResponse::InternalServerError()
            .json(json!({ "error": format!("Failed to save file: {}", e) }));
    }
    log::info!("[RAG] Saved upload {} ({} bytes)", file_path.display(), file.data.len());

    let document = match state.db.create_document(
        &filename,
        &file_path.to_string_lossy(),
        &file_type,
        DocumentStatus::Processing,
    ) {
        Ok(doc) => doc,
        Err(e) => {
            log::error!("[RAG] Failed to record document {}: {}", filename, e);
            return HttpResponse::InternalServerError()
                .json(json!({ "error": format!("Database error: {}", e) }));
        }
    };

    let metadata = IngestMetadata {
        session_id: session_id.clone(),
        document_id: Some(document.id),
    };
    let result = state
        .vector_store
        .ingest_document(&file_path, &file_type, metadata)
        .await;

    let (status, message) = if result.is_success() {
        (
            DocumentStatus::Processed,
            format!(
                "Document processed and added to knowledge base ({} chunks created)",
                result.chunks
            ),
        )
    } else {
        (
            DocumentStatus::Failed,
            format!("Document uploaded but processing failed: {}", result.message),
        )
    };

    if let Err(e) = state.db.set_document_status(document.id, status) {
        log::error!("[RAG] Failed to update status of document {}: {}", document.id, e);
    }

    if let Some(session) = session_id.as_deref() {
        if result.is_success() {
            match state.db.add_conversation_message(
                session,
                Role::System,
                &upload_breadcrumb(&filename, result.chunks),
            ) {
                Ok(_) => log::info!("[RAG] Added document upload notification to session: {}", session),
                Err(e) => log::warn!("[RAG] Failed to record upload in session {}: {}", session, e),
            }
        }
    }

    HttpResponse::Ok().json(json!({
        "message": message,
        "filename": filename,
        "status": status.as_str(),
        "document_id": document.id,
        "details": result,
        "session_id": session_id
    }))
}

async fn list_documents(state: web::Data<AppState>) -> impl Responder {
    match state.db.list_documents() {
        Ok(documents) => HttpResponse::Ok().json(documents),
        Err(e) => HttpResponse::InternalServerError()
            .json(json!({ "error": format!("Database error: {}", e) })),
    }
}

fn document_response(result: rusqlite::Result<Option<Document>>) -> HttpResponse {
    match result {
        Ok(Some(document)) => HttpResponse::Ok().json(document),
        Ok(None) => HttpResponse::NotFound().json(json!({ "error": "Document not found" })),
        Err(e) => HttpResponse::InternalServerError()
            .json(json!({ "error": format!("Database error: {}", e) })),
    }
}

async fn get_document(state: web::Data<AppState>, path: web::Path<i64>) -> impl Responder {
    document_response(state.db.get_document(path.into_inner()))
}

async fn collection_stats(state: web::Data<AppState>) -> impl Responder {
    match state.vector_store.stats() {
        Ok(stats) => HttpResponse::Ok().json(stats),
        Err(e) => HttpResponse::InternalServerError().json(json!({ "error": e })),
    }
}

async fn clear_knowledge_base(state: web::Data<AppState>) -> impl Responder {
    match state.vector_store.clear() {
        Ok(removed) => HttpResponse::Ok().json(json!({
            "message": "Knowledge base cleared successfully",
            "chunks_removed": removed
        })),
        Err(e) => HttpResponse::InternalServerError().json(json!({ "error": e })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("Report.PDF"), ".pdf");
        assert_eq!(extension_of("notes.txt"), ".txt");
        assert_eq!(extension_of("README"), "");
    }

    #[test]
    fn test_rejection_lists_allowed_types() {
        assert_eq!(allowed_types_display(), "[\".pdf\", \".txt\"]");
    }

    #[test]
    fn test_same_name_uploads_get_separate_paths() {
        let dir = Path::new("/data/documents");
        let first = upload_path(dir, "report.pdf");
        let second = upload_path(dir, "report.pdf");
        assert_ne!(first, second);
        for path in [&first, &second] {
            assert!(path.starts_with(dir));
            assert_eq!(path.file_name().unwrap(), "report.pdf");
        }
    }

    #[tokio::test]
    async fn test_save_upload_keeps_both_copies() {
        let dir = tempfile::tempdir().unwrap();
        let first = upload_path(dir.path(), "notes.txt");
        let second = upload_path(dir.path(), "notes.txt");
        save_upload(&first, b"first").await.unwrap();
        save_upload(&second, b"second").await.unwrap();
        assert_eq!(std::fs::read(&first).unwrap(), b"first");
        assert_eq!(std::fs::read(&second).unwrap(), b"second");
    }

    #[test]
    fn test_document_lookup_responses() {
        use actix_web::http::StatusCode;

        assert_eq!(document_response(Ok(None)).status(), StatusCode::NOT_FOUND);

        let db = crate::db::Database::in_memory().unwrap();
        let doc = db
            .create_document("guide.pdf", "/tmp/guide.pdf", "pdf", DocumentStatus::Processed)
            .unwrap();
        let found = db.get_document(doc.id);
        assert_eq!(document_response(found).status(), StatusCode::OK);
    }

    #[test]
    fn test_upload_breadcrumb_is_recognized_by_prompt() {
        use crate::agent::prompt::uploaded_documents;
        use crate::models::HistoryEntry;

        let entry = HistoryEntry::new(Role::System, upload_breadcrumb("guide.pdf", 4));
        assert_eq!(uploaded_documents(&[entry]), vec!["guide.pdf".to_string()]);
    }
}
