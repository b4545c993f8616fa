use crate::db::{Database, SessionLocks};
use crate::models::Role;
use crate::tools::ToolContext;

use super::{AgentReply, VoiceAgent};

/// One persisted chat turn: load history, store the user message, run the
/// agent, store the answer. Turns on the same session run one at a time.
pub async fn run_chat_turn(
    db: &Database,
    agent: &VoiceAgent,
    locks: &SessionLocks,
    context: &ToolContext,
    session_id: &str,
    message: &str,
) -> Result<AgentReply, String> {
    let _guard = locks.acquire(session_id).await;

    let history = db
        .load_agent_history(session_id)
        .map_err(|e| format!("Failed to load conversation history: {}", e))?;

    db.add_conversation_message(session_id, Role::User, message)
        .map_err(|e| format!("Failed to save user message: {}", e))?;

    let reply = agent.chat(message, session_id, &history, context).await;

    db.add_conversation_message(session_id, Role::Assistant, &reply.response)
        .map_err(|e| format!("Failed to save assistant message: {}", e))?;

    Ok(reply)
}
