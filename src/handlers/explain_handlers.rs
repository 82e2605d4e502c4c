use axum::{extract::State, Json};
use axum_extra::extract::Query;
use tracing::{instrument, debug};

use crate::auth::AuthUser;
use crate::dto::{ChatDto, ChatReplyDto, ExplanationDto, ExplanationQuery, GeneratedQuestionDto, QuestionGenerationQuery};
use crate::errors::ApiError;
use crate::explain::{self, ExplanationRequest};
use crate::repo;
use crate::AppState;

/// Handler for an on-demand explanation of one answer
///
/// This function handles POST requests to
/// `/study/ai-explanation?question_id=&selected_option=`. Nothing is stored;
/// the answer is graded only to tailor the explanation.
#[instrument(skip(state, auth), fields(user_id = %auth.id()))]
pub async fn ai_explanation_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ExplanationQuery>,
) -> Result<Json<ExplanationDto>, ApiError> {
    let question = repo::get_question(&state.pool, &query.question_id)?
        .ok_or_else(|| ApiError::NotFound("Question".to_string()))?;
    let grade = question.grade(&query.selected_option);

    let request = ExplanationRequest {
        question_text: question.get_text(),
        correct_answer: question.get_correct_answer(),
        user_answer: query.selected_option.trim().to_uppercase(),
        topic: repo::get_question_topic_name(&state.pool, &question)?,
        is_correct: grade.is_correct,
    };
    debug!("Requesting explanation from {}", state.explainer.name());
    let explanation = explain::explain_answer(state.explainer.as_ref(), &request).await;

    Ok(Json(ExplanationDto {
        explanation,
        is_correct: grade.is_correct,
        correct_answer: question.get_correct_answer(),
    }))
}

/// Handler for a fresh practice question written by the language model
///
/// This function handles POST requests to
/// `/study/ai-question-generate?entity=&topic=&profile=`. The question is
/// validated like a stored one but never saved; on any failure the fixed
/// replacement question is returned with `error` set.
#[instrument(skip(state, auth), fields(user_id = %auth.id()))]
pub async fn generate_question_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<QuestionGenerationQuery>,
) -> Json<GeneratedQuestionDto> {
    let entity = query
        .entity
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .unwrap_or(explain::DEFAULT_QUESTION_ENTITY);

    debug!("Requesting a generated question from {}", state.explainer.name());
    Json(
        explain::generate_question(
            state.explainer.as_ref(),
            entity,
            query.topic.as_deref(),
            query.profile.as_deref(),
        )
        .await,
    )
}

/// Handler for the AI tutor chat
///
/// This function handles POST requests to `/chat`.
#[instrument(skip(state, auth, payload), fields(user_id = %auth.id()))]
pub async fn chat_handler(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<ChatDto>,
) -> Result<Json<ChatReplyDto>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(ApiError::Validation("message cannot be empty".to_string()));
    }

    let context = payload.context.as_deref().filter(|c| !c.trim().is_empty());
    let response = explain::tutor_chat(state.explainer.as_ref(), &payload.message, context).await;
    Ok(Json(ChatReplyDto { response }))
}
