use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

mod agent;
mod ai;
mod config;
mod controllers;
mod db;
mod models;
mod notes;
mod rag;
mod tools;
mod voice;

use agent::VoiceAgent;
use ai::GeminiClient;
use config::Config;
use db::{Database, SessionLocks};
use models::AssistantConfig;
use notes::NoteStore;
use rag::{EmbeddingGenerator, RemoteEmbeddingGenerator, RemoteReranker, Reranker, VectorStore};
use tools::ToolContext;
use voice::{SpeechToText, TextToSpeech};

/// How long in-flight requests get to finish after Ctrl+C
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
const LOCK_PRUNE_INTERVAL: Duration = Duration::from_secs(600);

pub struct AppState {
    pub db: Arc<Database>,
    pub config: Config,
    pub assistant_config: AssistantConfig,
    pub agent: Arc<VoiceAgent>,
    pub vector_store: Arc<VectorStore>,
    pub notes: Arc<NoteStore>,
    pub stt: Arc<SpeechToText>,
    pub tts: Arc<TextToSpeech>,
    pub session_locks: Arc<SessionLocks>,
    pub workspace_dir: PathBuf,
    pub started_at: Instant,
}

impl AppState {
    /// Everything a tool may touch during a chat turn
    pub fn tool_context(&self) -> ToolContext {
        ToolContext::new()
            .with_database(Arc::clone(&self.db))
            .with_vector_store(Arc::clone(&self.vector_store))
            .with_notes(Arc::clone(&self.notes))
            .with_workspace_dir(self.workspace_dir.clone())
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env();
    log::info!("Assistant backend v{}", env!("CARGO_PKG_VERSION"));

    log::info!("Initializing workspace");
    if let Err(e) = config::initialize_workspace(&config) {
        log::error!("Failed to initialize workspace: {}", e);
    }

    let assistant_config = AssistantConfig::load();
    log::info!(
        "Loaded {} v{} (model: {}, search: {:?})",
        assistant_config.app_name,
        assistant_config.version,
        assistant_config.llm.model,
        assistant_config.web_search_provider
    );
    if config.gemini_api_key.is_none() {
        log::warn!("GEMINI_API_KEY is not set, chat requests will fail until it is configured");
    }

    log::info!("Initializing database at {}", config.database_url);
    let db = Database::new(&config.database_url)
        .map_err(|e| std::io::Error::other(format!("Failed to initialize database: {}", e)))?;
    let db = Arc::new(db);

    let services = &assistant_config.services;
    let embedder: Arc<dyn EmbeddingGenerator> = Arc::new(RemoteEmbeddingGenerator::new(
        &services.embeddings_url(),
        &assistant_config.rag.embedding_model,
        assistant_config.rag.embedding_dimension,
    ));
    let reranker: Option<Arc<dyn Reranker>> = services
        .rerank_server_url
        .as_deref()
        .map(|url| Arc::new(RemoteReranker::new(url)) as Arc<dyn Reranker>);
    let vector_store = Arc::new(VectorStore::new(
        Arc::clone(&db),
        embedder,
        reranker,
        assistant_config.rag.clone(),
    ));

    let notes = Arc::new(NoteStore::new(Arc::clone(&db), config::notes_dir()));

    let model = Arc::new(GeminiClient::new(config.gemini_api_key.clone(), &assistant_config.llm));
    let registry = Arc::new(tools::create_default_registry(&config, &assistant_config));
    let agent = Arc::new(VoiceAgent::new(
        model,
        registry,
        assistant_config.llm.max_tool_iterations,
    ));

    let stt = Arc::new(SpeechToText::new(&services.whisper_url()));
    let tts = Arc::new(TextToSpeech::new(&services.tts_url()));
    let session_locks = Arc::new(SessionLocks::new());
    let workspace_dir = config::data_dir();

    {
        let session_locks = Arc::clone(&session_locks);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(LOCK_PRUNE_INTERVAL);
            loop {
                interval.tick().await;
                let pruned = session_locks.prune();
                if pruned > 0 {
                    log::debug!("Pruned {} idle session locks ({} left)", pruned, session_locks.len());
                }
            }
        });
    }
    let started_at = Instant::now();

    let host = config.host.clone();
    let port = config.port;
    log::info!("Starting server on {}:{}", host, port);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(AppState {
                db: Arc::clone(&db),
                config: config.clone(),
                assistant_config: assistant_config.clone(),
                agent: Arc::clone(&agent),
                vector_store: Arc::clone(&vector_store),
                notes: Arc::clone(&notes),
                stt: Arc::clone(&stt),
                tts: Arc::clone(&tts),
                session_locks: Arc::clone(&session_locks),
                workspace_dir: workspace_dir.clone(),
                started_at,
            }))
            .wrap(Logger::default())
            .wrap(cors)
            .configure(controllers::health::config)
            .configure(controllers::chat::config)
            .configure(controllers::notes::config)
            .configure(controllers::documents::config)
            .configure(controllers::conversations::config)
            .configure(controllers::transcribe::config)
            .configure(controllers::voice::config)
    })
    .bind((host.as_str(), port))?
    .run();

    // Get server handle for graceful shutdown
    let server_handle = server.handle();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        log::info!("Received Ctrl+C, shutting down...");

        log::info!("Stopping HTTP server...");
        let server_stop = server_handle.stop(true);
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, server_stop).await.is_err() {
            log::warn!("Timeout waiting for HTTP server to stop, forcing exit...");
        }

        log::info!("Shutdown complete");
    });

    server.await
}
