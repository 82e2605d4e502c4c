/// MeritSim: exam preparation backend
///
/// This library provides the core of a quiz platform for Colombian
/// civil-service entrance exams: a question bank, timed simulacros and
/// practice sessions with XP and levels, a gated topic map, and
/// explanations from a hosted language model.
///
/// ### Modules
///
/// - `scoring`, `progression`: pure scoring and topic-unlock rules
/// - `models`, `schema`, `db`: persistent records and storage
/// - `repo`: data access functions over an explicit pool
/// - `handlers`: the HTTP API
/// - `explain`: explanation providers
/// - `indexer`, `seed`: batch jobs run by the CLI
///
/// ### Web API
///
/// See [`create_app`] for the full route table.

/// Password hashing, access tokens and the authenticated-user extractor
pub mod auth;

/// Configuration layering
pub mod config;

/// Database connection management
pub mod db;

/// Request and response bodies
pub mod dto;

/// API and domain error types
pub mod errors;

/// Explanation providers backed by hosted language models
pub mod explain;

/// HTTP handlers
pub mod handlers;

/// Study material indexer
pub mod indexer;

/// Data models module
pub mod models;

/// Topic progression map
pub mod progression;

/// Repository module for database operations
pub mod repo;

/// Database schema module
pub mod schema;

/// Scoring rules
pub mod scoring;

/// Reference data seeding
pub mod seed;

#[cfg(test)]
mod test_utils;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::TokenKeys;
use crate::config::Config;
use crate::explain::ExplanationProvider;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<db::DbPool>,
    pub tokens: Arc<TokenKeys>,
    pub explainer: Arc<dyn ExplanationProvider>,
    /// Percentage a map node needs before the next one unlocks
    pub unlock_threshold: i32,
    /// Reject simulacros submitted after their time limit
    pub enforce_time_limits: bool,
    pub materials_path: PathBuf,
}

impl AppState {
    /// Builds the state from a loaded configuration
    pub fn new(pool: Arc<db::DbPool>, config: &Config, explainer: Arc<dyn ExplanationProvider>) -> Self {
        Self {
            pool,
            tokens: Arc::new(TokenKeys::new(&config.jwt_secret, config.token_ttl_minutes)),
            explainer,
            unlock_threshold: config.unlock_threshold,
            enforce_time_limits: config.enforce_time_limits,
            materials_path: config.materials_path.clone(),
        }
    }
}

/// Creates the application router with all routes
///
/// ### Arguments
///
/// * `state` - The shared state: pool, token keys, explanation provider and
///   study settings
///
/// ### Returns
///
/// An Axum Router with CORS and request tracing layers applied
pub fn create_app(state: AppState) -> Router {
    use handlers::*;

    Router::new()
        .route("/health", get(health_handler))
        // Accounts
        .route("/auth/register", post(register_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/me", get(me_handler))
        // Catalog
        .route("/entities", get(list_entities_handler))
        .route("/entities/{id}/profiles", get(list_profiles_handler))
        .route("/topics", get(list_topics_handler))
        .route("/questions", get(list_questions_handler))
        // Study sessions
        .route("/study/simulacro/start", post(start_simulacro_handler))
        .route("/study/simulacro/submit", post(submit_simulacro_handler))
        .route("/study/advanced/start", post(start_advanced_handler))
        .route("/study/advanced/answer", post(answer_advanced_handler))
        .route("/study/advanced/finish", post(finish_advanced_handler))
        .route("/study/sessions", get(list_sessions_handler))
        .route("/study/sessions/{id}", get(get_session_handler))
        .route("/study/adventure/map", get(adventure_map_handler))
        // Explanations
        .route("/study/ai-explanation", post(ai_explanation_handler))
        .route("/study/ai-question-generate", post(generate_question_handler))
        .route("/chat", post(chat_handler))
        // Progress and materials
        .route("/users/me/progress", get(progress_handler))
        .route("/materials", get(list_materials_handler))
        .route("/materials/suggestions", get(material_suggestions_handler))
        .route("/materials/index", post(index_materials_handler))
        .route("/admin/stats", get(admin_stats_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Runs the embedded migrations
///
/// ### Errors
///
/// Returns an error if any pending migration fails to apply
pub fn run_migrations(conn: &mut diesel::SqliteConnection) -> anyhow::Result<()> {
    use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

    const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow::anyhow!("failed to run migrations: {e}"))?;
    Ok(())
}
