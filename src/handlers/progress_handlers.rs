use axum::{extract::State, Json};
use chrono::Utc;
use tracing::instrument;

use crate::auth::AuthUser;
use crate::dto::ProgressDto;
use crate::errors::ApiError;
use crate::repo;
use crate::AppState;

/// Handler for the caller's learning statistics
///
/// This function handles GET requests to `/users/me/progress`.
#[instrument(skip(state, auth), fields(user_id = %auth.id()))]
pub async fn progress_handler(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ProgressDto>, ApiError> {
    let progress = repo::user_progress(&state.pool, auth.user(), Utc::now().date_naive())?;
    Ok(Json(progress))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_progress_for_new_user() {
        let state = test_state();
        let user = insert_user(&state.pool, "ana@example.com", UserRole::User);
        insert_entity(&state.pool, "DIAN");

        let progress = progress_handler(State(state), AuthUser(user)).await.unwrap().0;

        assert_eq!(progress.level, 1);
        assert_eq!(progress.total_questions_answered, 0);
        assert_eq!(progress.entity_progress.len(), 1);
        assert_eq!(progress.entity_progress[0].entity_name, "DIAN");
    }
}
