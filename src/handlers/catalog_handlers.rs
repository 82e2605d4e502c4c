use axum::{
    extract::{Path, State},
    Json,
};
use axum_extra::extract::Query;
use chrono::Utc;
use tracing::{instrument, debug};

use crate::auth::AuthUser;
use crate::dto::{EntityDto, HealthDto, QuestionQuery, QuestionView, TopicDto, DEFAULT_NUM_QUESTIONS, MAX_NUM_QUESTIONS};
use crate::errors::ApiError;
use crate::models::Profile;
use crate::repo::{self, QuestionFilter};
use crate::AppState;

/// Checks that an optional difficulty lies in 1..=5
pub(crate) fn check_difficulty(difficulty: Option<i32>) -> Result<(), ApiError> {
    match difficulty {
        Some(d) if !(1..=5).contains(&d) => Err(ApiError::Validation(format!(
            "difficulty must be between 1 and 5, got {d}"
        ))),
        _ => Ok(()),
    }
}

/// Checks a requested question count against 1..=MAX_NUM_QUESTIONS
pub(crate) fn check_count(field: &str, count: i64) -> Result<usize, ApiError> {
    if !(1..=MAX_NUM_QUESTIONS).contains(&count) {
        return Err(ApiError::Validation(format!(
            "{field} must be between 1 and {MAX_NUM_QUESTIONS}, got {count}"
        )));
    }
    Ok(count as usize)
}

/// Handler for the liveness probe
///
/// This function handles GET requests to `/health`. It always answers 200;
/// the body says whether the database responded.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthDto> {
    let healthy = repo::database_is_healthy(&state.pool);
    Json(HealthDto {
        status: if healthy { "ok" } else { "error" }.to_string(),
        database: if healthy { "connected" } else { "disconnected" }.to_string(),
        timestamp: Utc::now(),
    })
}

/// Handler for listing entities with their question counts
///
/// This function handles GET requests to `/entities`.
#[instrument(skip(state))]
pub async fn list_entities_handler(State(state): State<AppState>) -> Result<Json<Vec<EntityDto>>, ApiError> {
    let entities = repo::list_entities_with_counts(&state.pool)?;
    debug!("Listing {} entities", entities.len());
    Ok(Json(entities.iter().map(|(e, count)| EntityDto::new(e, *count)).collect()))
}

/// Handler for listing the profiles of one entity
///
/// This function handles GET requests to `/entities/{id}/profiles`.
#[instrument(skip(state), fields(entity_id = %entity_id))]
pub async fn list_profiles_handler(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
) -> Result<Json<Vec<Profile>>, ApiError> {
    repo::get_entity(&state.pool, &entity_id)?
        .ok_or_else(|| ApiError::NotFound("Entity".to_string()))?;
    Ok(Json(repo::list_profiles(&state.pool, &entity_id)?))
}

/// Handler for listing topics with their question counts
///
/// This function handles GET requests to `/topics`.
#[instrument(skip(state))]
pub async fn list_topics_handler(State(state): State<AppState>) -> Result<Json<Vec<TopicDto>>, ApiError> {
    let topics = repo::list_topics_with_counts(&state.pool)?;
    Ok(Json(topics.iter().map(|(t, count)| TopicDto::new(t, *count)).collect()))
}

/// Handler for browsing questions in random order
///
/// This function handles GET requests to `/questions`. The correct option
/// is never included.
///
/// ### Arguments
///
/// * `state` - The application state
/// * `_auth` - The authenticated caller
/// * `query` - Entity, topic and difficulty filters plus a limit (default
///   20, at most 100)
#[instrument(skip(state, _auth))]
pub async fn list_questions_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<QuestionQuery>,
) -> Result<Json<Vec<QuestionView>>, ApiError> {
    check_difficulty(query.difficulty)?;
    let limit = check_count("limit", query.limit.unwrap_or(DEFAULT_NUM_QUESTIONS))?;

    let filter = QuestionFilter {
        entity_id: query.entity_id,
        profile_id: None,
        topic_id: query.topic_id,
        difficulty: query.difficulty,
    };
    let questions = repo::list_random_questions(&state.pool, &filter, limit)?;
    Ok(Json(questions.iter().map(QuestionView::from).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_health_reports_connected_database() {
        let state = test_state();
        let health = health_handler(State(state)).await.0;
        assert_eq!(health.status, "ok");
        assert_eq!(health.database, "connected");
    }

    #[tokio::test]
    async fn test_list_profiles_of_missing_entity_is_not_found() {
        let state = test_state();
        let result = list_profiles_handler(State(state), Path("missing".to_string())).await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_questions_hides_answers_and_filters() {
        let state = test_state();
        let user = insert_user(&state.pool, "ana@example.com", UserRole::User);
        let dian = insert_entity(&state.pool, "DIAN");
        insert_question(&state.pool, Some(&dian.get_id()), None, "A", 10);
        insert_question(&state.pool, None, None, "B", 10);

        let query = QuestionQuery { entity_id: Some(dian.get_id()), ..Default::default() };
        let questions = list_questions_handler(State(state.clone()), AuthUser(user), Query(query))
            .await
            .unwrap()
            .0;

        assert_eq!(questions.len(), 1);
        let json = serde_json::to_value(&questions[0]).unwrap();
        assert!(json.get("correct_answer").is_none());
    }

    #[tokio::test]
    async fn test_list_questions_validates_limit_and_difficulty() {
        let state = test_state();
        let user = insert_user(&state.pool, "ana@example.com", UserRole::User);

        let too_many = QuestionQuery { limit: Some(101), ..Default::default() };
        let result = list_questions_handler(State(state.clone()), AuthUser(user.clone()), Query(too_many)).await;
        assert!(matches!(result, Err(ApiError::Validation(_))));

        let too_hard = QuestionQuery { difficulty: Some(6), ..Default::default() };
        let result = list_questions_handler(State(state.clone()), AuthUser(user), Query(too_hard)).await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[test]
    fn test_check_count_bounds() {
        assert_eq!(check_count("num_questions", 1).unwrap(), 1);
        assert_eq!(check_count("num_questions", 100).unwrap(), 100);
        assert!(check_count("num_questions", 0).is_err());
        assert!(check_count("num_questions", -3).is_err());
    }
}
