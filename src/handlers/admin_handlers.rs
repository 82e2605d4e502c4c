use axum::{extract::State, Json};
use tracing::instrument;

use crate::auth::AuthUser;
use crate::dto::AdminStatsDto;
use crate::errors::ApiError;
use crate::repo;
use crate::AppState;

/// Handler for platform-wide statistics
///
/// This function handles GET requests to `/admin/stats`. Admin only.
#[instrument(skip(state, auth), fields(user_id = %auth.id()))]
pub async fn admin_stats_handler(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<AdminStatsDto>, ApiError> {
    auth.require_admin()?;
    Ok(Json(repo::platform_stats(&state.pool)?))
}
