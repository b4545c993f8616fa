use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;

use crate::agent::run_chat_turn;
use crate::AppState;

pub const DEFAULT_SESSION_ID: &str = "default";

pub fn default_session_id() -> String {
    DEFAULT_SESSION_ID.to_string()
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default = "default_session_id")]
    session_id: String,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/chat").route(web::post().to(chat)));
}

async fn chat(state: web::Data<AppState>, body: web::Json<ChatRequest>) -> impl Responder {
    let request = body.into_inner();
    if request.message.trim().is_empty() {
        return HttpResponse::BadRequest().json(json!({ "error": "Message cannot be empty" }));
    }

    let context = state.tool_context();
    match run_chat_turn(
        &state.db,
        &state.agent,
        &state.session_locks,
        &context,
        &request.session_id,
        &request.message,
    )
    .await
    {
        Ok(reply) => HttpResponse::Ok().json(json!({
            "response": reply.response,
            "session_id": reply.session_id,
            "tools_used": reply.tools_used
        })),
        Err(e) => {
            log::error!("[AGENT] Chat turn failed for session {}: {}", request.session_id, e);
            HttpResponse::InternalServerError().json(json!({ "error": e }))
        }
    }
}
