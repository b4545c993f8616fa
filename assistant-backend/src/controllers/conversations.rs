use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;

use crate::AppState;

const DEFAULT_HISTORY_LIMIT: usize = 50;

fn default_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    #[serde(default = "default_limit")]
    limit: usize,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/conversations/{session_id}").route(web::get().to(get_conversation)));
}

async fn get_conversation(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<HistoryQuery>,
) -> impl Responder {
    let session_id = path.into_inner();

    match state.db.get_conversation(&session_id, query.limit) {
        Ok(messages) => {
            let messages: Vec<serde_json::Value> = messages
                .iter()
                .map(|m| {
                    json!({
                        "role": m.role.as_str(),
                        "message": m.message,
                        "timestamp": m.created_at
                    })
                })
                .collect();
            HttpResponse::Ok().json(json!({
                "session_id": session_id,
                "messages": messages
            }))
        }
        Err(e) => {
            log::error!("Failed to load conversation {}: {}", session_id, e);
            HttpResponse::InternalServerError().json(json!({ "error": format!("Database error: {}", e) }))
        }
    }
}
