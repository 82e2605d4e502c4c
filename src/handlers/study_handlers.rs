use axum::{
    extract::{Path, State},
    Json,
};
use axum_extra::extract::Query;
use chrono::Utc;
use tracing::{instrument, debug, info};

use super::catalog_handlers::{check_count, check_difficulty};
use crate::auth::AuthUser;
use crate::dto::{
    AdvancedAnswerResult, AdventureMapDto, AnswerDto, AnswerRecordDto, MapQuery, QuestionView, SessionDetailDto,
    SessionDto, SessionQuery, SimulacroResult, StartSessionDto, StartSessionResponse, SubmitSimulacroDto,
    MAX_NUM_QUESTIONS,
};
use crate::errors::ApiError;
use crate::explain::{self, ExplanationRequest};
use crate::models::StudyMode;
use crate::progression;
use crate::repo::{self, NewSession, QuestionFilter};
use crate::AppState;

/// Validates a start request and turns it into repository parameters
fn new_session(mode: StudyMode, payload: StartSessionDto) -> Result<NewSession, ApiError> {
    check_difficulty(payload.difficulty)?;
    let num_questions = check_count("num_questions", payload.num_questions)?;
    let time_limit_minutes = match mode {
        StudyMode::Simulacro => payload.time_limit_minutes,
        StudyMode::Advanced => None,
    };
    if matches!(time_limit_minutes, Some(minutes) if minutes <= 0) {
        return Err(ApiError::Validation("time_limit_minutes must be positive".to_string()));
    }

    Ok(NewSession {
        mode,
        filter: QuestionFilter {
            entity_id: payload.entity_id,
            profile_id: payload.profile_id,
            topic_id: payload.topic_id,
            difficulty: payload.difficulty,
        },
        num_questions,
        time_limit_minutes,
    })
}

fn start(
    state: &AppState,
    auth: &AuthUser,
    mode: StudyMode,
    payload: StartSessionDto,
) -> Result<Json<StartSessionResponse>, ApiError> {
    let request = new_session(mode, payload)?;
    let (session, questions) = repo::start_session(&state.pool, &auth.id(), &request)?;

    Ok(Json(StartSessionResponse {
        session_id: session.get_id(),
        mode: session.get_mode(),
        time_limit_minutes: session.get_time_limit_minutes(),
        total_questions: session.get_total_questions(),
        questions: questions.iter().map(QuestionView::from).collect(),
    }))
}

/// Handler for starting a timed simulacro
///
/// This function handles POST requests to `/study/simulacro/start`.
///
/// ### Arguments
///
/// * `state` - The application state
/// * `auth` - The learner starting the exam
/// * `payload` - Scope, number of questions (default 20) and time limit
///   (default 60 minutes)
///
/// ### Returns
///
/// The session id and the drawn questions, without their answers
#[instrument(skip(state, auth, payload), fields(user_id = %auth.id(), num_questions = payload.num_questions))]
pub async fn start_simulacro_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<StartSessionDto>,
) -> Result<Json<StartSessionResponse>, ApiError> {
    start(&state, &auth, StudyMode::Simulacro, payload)
}

/// Handler for submitting every answer of a simulacro at once
///
/// This function handles POST requests to `/study/simulacro/submit`.
///
/// ### Returns
///
/// The score over the submitted answers, the XP earned, the learner's new
/// level and one result per submitted item
///
/// ### Errors
///
/// - `Validation` if more than `MAX_NUM_QUESTIONS` answers are submitted
#[instrument(skip(state, auth, payload), fields(user_id = %auth.id(), session_id = %payload.session_id))]
pub async fn submit_simulacro_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<SubmitSimulacroDto>,
) -> Result<Json<SimulacroResult>, ApiError> {
    if payload.answers.len() as i64 > MAX_NUM_QUESTIONS {
        return Err(ApiError::Validation(format!(
            "answers cannot hold more than {MAX_NUM_QUESTIONS} items, got {}",
            payload.answers.len()
        )));
    }

    let submission = repo::submit_simulacro(
        &state.pool,
        &auth.id(),
        &payload.session_id,
        &payload.answers,
        state.enforce_time_limits,
        Utc::now(),
    )?;

    let session = &submission.session;
    info!(
        "Simulacro {} scored {:?} with {} XP",
        session.get_id(),
        session.get_score(),
        session.get_xp_earned()
    );
    Ok(Json(SimulacroResult {
        session_id: session.get_id(),
        total_questions: submission.submitted as i32,
        correct_answers: session.get_correct_answers(),
        score: session.get_score().unwrap_or(0.0),
        xp_earned: session.get_xp_earned(),
        new_level: submission.level,
        xp_points: submission.xp_points,
        results: submission.results,
    }))
}

/// Handler for starting a practice session with immediate feedback
///
/// This function handles POST requests to `/study/advanced/start`. Advanced
/// sessions have no time limit.
#[instrument(skip(state, auth, payload), fields(user_id = %auth.id(), num_questions = payload.num_questions))]
pub async fn start_advanced_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<StartSessionDto>,
) -> Result<Json<StartSessionResponse>, ApiError> {
    start(&state, &auth, StudyMode::Advanced, payload)
}

/// Handler for answering one question of an advanced session
///
/// This function handles POST requests to `/study/advanced/answer?session_id=`.
/// The question's stored explanation is returned when it has one; otherwise
/// the explanation provider is asked, falling back to a fixed message.
#[instrument(skip(state, auth, answer), fields(user_id = %auth.id(), session_id = %query.session_id))]
pub async fn answer_advanced_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<SessionQuery>,
    Json(answer): Json<AnswerDto>,
) -> Result<Json<AdvancedAnswerResult>, ApiError> {
    let outcome = repo::record_advanced_answer(&state.pool, &auth.id(), &query.session_id, &answer, Utc::now())?;
    let question = &outcome.question;

    let explanation = match question.get_explanation() {
        Some(stored) if !stored.trim().is_empty() => stored,
        _ => {
            debug!("No stored explanation, asking {}", state.explainer.name());
            let request = ExplanationRequest {
                question_text: question.get_text(),
                correct_answer: question.get_correct_answer(),
                user_answer: answer.selected_option.trim().to_uppercase(),
                topic: repo::get_question_topic_name(&state.pool, question)?,
                is_correct: outcome.grade.is_correct,
            };
            explain::explain_answer(state.explainer.as_ref(), &request).await
        }
    };

    Ok(Json(AdvancedAnswerResult {
        is_correct: outcome.grade.is_correct,
        correct_answer: question.get_correct_answer(),
        explanation,
        page_reference: question.get_page_reference(),
        xp_earned: outcome.grade.xp,
        new_level: outcome.level,
        answered: outcome.answered as i32,
        total_questions: outcome.total_questions,
        session_completed: outcome.session_completed,
    }))
}

/// Handler for ending an advanced session early
///
/// This function handles POST requests to `/study/advanced/finish?session_id=`.
#[instrument(skip(state, auth), fields(user_id = %auth.id()))]
pub async fn finish_advanced_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<SessionQuery>,
) -> Result<Json<SessionDto>, ApiError> {
    let session = repo::finish_session(&state.pool, &auth.id(), &query.session_id, Utc::now())?;
    Ok(Json(SessionDto::from(&session)))
}

/// Handler for listing the caller's sessions, newest first
///
/// This function handles GET requests to `/study/sessions`.
#[instrument(skip(state, auth), fields(user_id = %auth.id()))]
pub async fn list_sessions_handler(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<SessionDto>>, ApiError> {
    let sessions = repo::list_sessions(&state.pool, &auth.id())?;
    Ok(Json(sessions.iter().map(SessionDto::from).collect()))
}

/// Handler for one of the caller's sessions with its answers
///
/// This function handles GET requests to `/study/sessions/{id}`. Sessions
/// of other users are reported as not found.
#[instrument(skip(state, auth), fields(user_id = %auth.id(), session_id = %session_id))]
pub async fn get_session_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(session_id): Path<String>,
) -> Result<Json<SessionDetailDto>, ApiError> {
    let (session, answers) = repo::get_session_with_answers(&state.pool, &auth.id(), &session_id)?;
    Ok(Json(SessionDetailDto {
        session: SessionDto::from(&session),
        answers: answers.iter().map(AnswerRecordDto::from).collect(),
    }))
}

/// Handler for the adventure map
///
/// This function handles GET requests to `/study/adventure/map`, optionally
/// scoped to an entity and profile.
#[instrument(skip(state, auth), fields(user_id = %auth.id()))]
pub async fn adventure_map_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<MapQuery>,
) -> Result<Json<AdventureMapDto>, ApiError> {
    let tallies = repo::topic_tallies(
        &state.pool,
        &auth.id(),
        query.entity_id.as_deref(),
        query.profile_id.as_deref(),
    )?;
    let nodes = progression::build_adventure_map(tallies, state.unlock_threshold);
    debug!("Adventure map has {} nodes", nodes.len());
    Ok(Json(AdventureMapDto { nodes }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::ItemOutcome;
    use crate::explain::EXPLANATION_FALLBACK;
    use crate::models::{Question, User, UserRole};
    use crate::progression::NodeStatus;
    use crate::test_utils::*;
    use std::sync::Arc;

    fn start_dto(num_questions: i64) -> StartSessionDto {
        StartSessionDto {
            entity_id: None,
            profile_id: None,
            topic_id: None,
            num_questions,
            time_limit_minutes: Some(60),
            difficulty: None,
        }
    }

    fn answer(question_id: &str, selected: &str) -> AnswerDto {
        AnswerDto {
            question_id: question_id.to_string(),
            selected_option: selected.to_string(),
            time_spent_seconds: None,
        }
    }

    async fn begin(state: &AppState, user: &User, mode: StudyMode, n: i64) -> StartSessionResponse {
        let response = match mode {
            StudyMode::Simulacro => start_simulacro_handler(State(state.clone()), AuthUser(user.clone()), Json(start_dto(n))).await,
            StudyMode::Advanced => start_advanced_handler(State(state.clone()), AuthUser(user.clone()), Json(start_dto(n))).await,
        };
        response.unwrap().0
    }

    #[tokio::test]
    async fn test_start_validates_num_questions() {
        let state = test_state();
        let user = insert_user(&state.pool, "ana@example.com", UserRole::User);
        insert_question(&state.pool, None, None, "A", 10);

        for bad in [0, 101] {
            let result = start_simulacro_handler(State(state.clone()), AuthUser(user.clone()), Json(start_dto(bad))).await;
            assert!(matches!(result, Err(ApiError::Validation(_))));
        }
    }

    #[tokio::test]
    async fn test_start_without_questions_is_not_found() {
        let state = test_state();
        let user = insert_user(&state.pool, "ana@example.com", UserRole::User);

        let result = start_advanced_handler(State(state.clone()), AuthUser(user), Json(start_dto(5))).await;
        assert!(matches!(result, Err(ApiError::NotFound(ref what)) if what == "Matching questions"));
    }

    #[tokio::test]
    async fn test_advanced_start_drops_time_limit() {
        let state = test_state();
        let user = insert_user(&state.pool, "ana@example.com", UserRole::User);
        insert_question(&state.pool, None, None, "A", 10);

        let started = begin(&state, &user, StudyMode::Advanced, 5).await;
        assert_eq!(started.mode, StudyMode::Advanced);
        assert_eq!(started.time_limit_minutes, None);
        assert_eq!(started.total_questions, 1);
    }

    #[tokio::test]
    async fn test_simulacro_round_trip() {
        let state = test_state();
        let user = insert_user(&state.pool, "ana@example.com", UserRole::User);
        let q_a = insert_question(&state.pool, None, None, "A", 10);
        let q_b = insert_question(&state.pool, None, None, "B", 20);
        let started = begin(&state, &user, StudyMode::Simulacro, 2).await;

        let payload = SubmitSimulacroDto {
            session_id: started.session_id.clone(),
            answers: vec![answer(&q_a.get_id(), "A"), answer(&q_b.get_id(), "C")],
        };
        let result = submit_simulacro_handler(State(state.clone()), AuthUser(user.clone()), Json(payload))
            .await
            .unwrap()
            .0;

        assert_eq!(result.score, 50.0);
        assert_eq!(result.xp_earned, 10);
        assert_eq!(result.correct_answers, 1);
        assert_eq!(result.total_questions, 2);
        assert_eq!(result.new_level, 1);
        assert!(result.results.iter().all(|r| r.outcome == ItemOutcome::Scored));

        let again = SubmitSimulacroDto { session_id: started.session_id, answers: vec![] };
        let result = submit_simulacro_handler(State(state.clone()), AuthUser(user), Json(again)).await;
        assert!(matches!(result, Err(ApiError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_submit_rejects_oversized_batch() {
        let state = test_state();
        let user = insert_user(&state.pool, "ana@example.com", UserRole::User);
        let question = insert_question(&state.pool, None, None, "A", 10);
        let started = begin(&state, &user, StudyMode::Simulacro, 1).await;

        let mut answers = vec![answer(&question.get_id(), "A")];
        answers.extend((0..MAX_NUM_QUESTIONS).map(|n| answer(&format!("missing-{n}"), "A")));
        let payload = SubmitSimulacroDto { session_id: started.session_id.clone(), answers };
        let result = submit_simulacro_handler(State(state.clone()), AuthUser(user.clone()), Json(payload)).await;
        assert!(matches!(result, Err(ApiError::Validation(_))));

        let payload = SubmitSimulacroDto {
            session_id: started.session_id,
            answers: vec![answer(&question.get_id(), "A")],
        };
        let result = submit_simulacro_handler(State(state), AuthUser(user), Json(payload)).await.unwrap().0;
        assert_eq!(result.score, 100.0);
    }

    #[tokio::test]
    async fn test_advanced_answer_uses_stored_explanation() {
        let provider = Arc::new(ScriptedProvider::replying("Generada"));
        let state = test_state_with(provider.clone());
        let user = insert_user(&state.pool, "ana@example.com", UserRole::User);
        let mut draft = sample_draft("¿Qué es el RUT?", "A", 10);
        draft.explanation = Some("Es el Registro Único Tributario.".to_string());
        let question = repo::create_question(&state.pool, Question::new(draft).unwrap()).unwrap();
        let started = begin(&state, &user, StudyMode::Advanced, 1).await;

        let result = answer_advanced_handler(
            State(state.clone()),
            AuthUser(user),
            Query(SessionQuery { session_id: started.session_id }),
            Json(answer(&question.get_id(), "a")),
        )
        .await
        .unwrap()
        .0;

        assert!(result.is_correct);
        assert_eq!(result.explanation, "Es el Registro Único Tributario.");
        assert_eq!(result.xp_earned, 10);
        assert!(result.session_completed);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_advanced_answer_asks_provider_and_falls_back() {
        let state = test_state_with(Arc::new(ScriptedProvider::failing()));
        let user = insert_user(&state.pool, "ana@example.com", UserRole::User);
        let question = insert_question(&state.pool, None, None, "A", 10);
        insert_question(&state.pool, None, None, "A", 10);
        let started = begin(&state, &user, StudyMode::Advanced, 2).await;

        let result = answer_advanced_handler(
            State(state.clone()),
            AuthUser(user.clone()),
            Query(SessionQuery { session_id: started.session_id.clone() }),
            Json(answer(&question.get_id(), "D")),
        )
        .await
        .unwrap()
        .0;

        assert!(!result.is_correct);
        assert_eq!(result.explanation, EXPLANATION_FALLBACK);
        assert_eq!(result.answered, 1);
        assert!(!result.session_completed);

        let finished = finish_advanced_handler(
            State(state.clone()),
            AuthUser(user),
            Query(SessionQuery { session_id: started.session_id }),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(finished.score, Some(0.0));
        assert!(finished.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_sessions_are_private() {
        let state = test_state();
        let owner = insert_user(&state.pool, "ana@example.com", UserRole::User);
        let other = insert_user(&state.pool, "luis@example.com", UserRole::User);
        insert_question(&state.pool, None, None, "A", 10);
        let started = begin(&state, &owner, StudyMode::Simulacro, 1).await;

        let mine = list_sessions_handler(State(state.clone()), AuthUser(owner.clone())).await.unwrap().0;
        assert_eq!(mine.len(), 1);
        let theirs = list_sessions_handler(State(state.clone()), AuthUser(other.clone())).await.unwrap().0;
        assert!(theirs.is_empty());

        let detail = get_session_handler(State(state.clone()), AuthUser(owner), Path(started.session_id.clone()))
            .await
            .unwrap()
            .0;
        assert_eq!(detail.session.score, None);
        assert!(detail.answers.is_empty());

        let denied = get_session_handler(State(state.clone()), AuthUser(other), Path(started.session_id)).await;
        assert!(matches!(denied, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_adventure_map_first_node_available() {
        let state = test_state();
        let user = insert_user(&state.pool, "ana@example.com", UserRole::User);
        let ambiente = insert_topic(&state.pool, "Ambiente");
        let tributario = insert_topic(&state.pool, "Tributario");
        insert_question(&state.pool, None, Some(&tributario.get_id()), "A", 10);
        insert_question(&state.pool, None, Some(&ambiente.get_id()), "A", 10);

        let map = adventure_map_handler(State(state.clone()), AuthUser(user), Query(MapQuery::default()))
            .await
            .unwrap()
            .0;

        let labels: Vec<&str> = map.nodes.iter().map(|n| n.label.as_str()).collect();
        assert_eq!(labels, vec!["Ambiente", "Tributario"]);
        assert_eq!(map.nodes[0].status, NodeStatus::Available);
        assert_eq!(map.nodes[1].status, NodeStatus::Locked);
    }
}
