use axum::{extract::State, Json};
use axum_extra::extract::Query;
use tracing::{instrument, info};

use crate::auth::AuthUser;
use crate::dto::{MaterialDto, MaterialQuery, SuggestionQuery, SuggestionsDto};
use crate::errors::ApiError;
use crate::indexer::{self, IndexReport};
use crate::repo;
use crate::AppState;

const DEFAULT_SUGGESTIONS: i64 = 5;
const MAX_SUGGESTIONS: i64 = 50;

/// Handler for listing indexed study materials
///
/// This function handles GET requests to `/materials`.
#[instrument(skip(state, _auth))]
pub async fn list_materials_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<MaterialQuery>,
) -> Result<Json<Vec<MaterialDto>>, ApiError> {
    Ok(Json(repo::list_materials(&state.pool, query.entity_id.as_deref())?))
}

/// Handler for materials suggested from the caller's recent mistakes
///
/// This function handles GET requests to `/materials/suggestions`.
#[instrument(skip(state, auth), fields(user_id = %auth.id()))]
pub async fn material_suggestions_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<SuggestionQuery>,
) -> Result<Json<SuggestionsDto>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_SUGGESTIONS);
    if !(1..=MAX_SUGGESTIONS).contains(&limit) {
        return Err(ApiError::Validation(format!(
            "limit must be between 1 and {MAX_SUGGESTIONS}, got {limit}"
        )));
    }

    let suggestions = repo::suggest_materials(&state.pool, &auth.id(), limit)?;
    Ok(Json(SuggestionsDto { suggestions }))
}

/// Handler for re-scanning the materials folder
///
/// This function handles POST requests to `/materials/index`. Admin only.
/// The folder walk runs on the blocking thread pool.
#[instrument(skip(state, auth), fields(user_id = %auth.id()))]
pub async fn index_materials_handler(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<IndexReport>, ApiError> {
    auth.require_admin()?;

    let pool = state.pool.clone();
    let root = state.materials_path.clone();
    let report = tokio::task::spawn_blocking(move || indexer::index_materials(&pool, &root))
        .await
        .map_err(anyhow::Error::from)??;
    info!("Indexed {} new materials, skipped {}", report.indexed, report.skipped);
    Ok(Json(report))
}
