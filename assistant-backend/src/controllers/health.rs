use actix_web::{web, HttpResponse, Responder};

use crate::AppState;

const SERVICES: &[&str] = &[
    "agent",
    "rag",
    "web_search",
    "notes",
    "speech_to_text",
    "text_to_speech",
    "voice_chat",
];

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(root)));
    cfg.service(web::resource("/health").route(web::get().to(health_check)));
}

async fn root(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "online",
        "app": state.assistant_config.app_name,
        "version": state.assistant_config.version,
        "message": "Voice Assistant API is running!"
    }))
}

async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let database = if state.db.ping() { "connected" } else { "disconnected" };

    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "database": database,
        "llm_configured": state.config.gemini_api_key.is_some(),
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "services": SERVICES
    }))
}
