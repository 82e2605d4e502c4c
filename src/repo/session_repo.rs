//! Session ledger
//!
//! Every write path runs in one IMMEDIATE transaction: the session row, its
//! answers and the owner's XP commit together or not at all. Counters are
//! bumped in SQL so two requests for the same session cannot lose updates.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use tracing::{instrument, debug, info, warn};

use super::question_repo::{self, QuestionFilter};
use super::user_repo;
use crate::db::DbPool;
use crate::dto::{AnswerDto, ItemOutcome, ItemResult};
use crate::errors::StudyError;
use crate::models::{Answer, Question, SessionQuestion, StudyMode, StudySession};
use crate::schema::{answers, questions, session_questions, study_sessions};
use crate::scoring::{self, AnswerOption, Grade, Tally};

/// Parameters for starting a session
#[derive(Debug, Clone)]
pub struct NewSession {
    pub mode: StudyMode,
    pub filter: QuestionFilter,
    pub num_questions: usize,
    pub time_limit_minutes: Option<i32>,
}

/// Outcome of a simulacro submission
#[derive(Debug, Clone)]
pub struct SimulacroSubmission {
    /// The completed session
    pub session: StudySession,
    pub results: Vec<ItemResult>,
    /// Number of submitted answers, the score denominator
    pub submitted: usize,
    pub xp_points: i32,
    pub level: i32,
}

/// Outcome of one advanced-mode answer
#[derive(Debug, Clone)]
pub struct AdvancedAnswer {
    pub question: Question,
    pub grade: Grade,
    pub answered: i64,
    pub total_questions: i32,
    pub session_completed: bool,
    pub xp_points: i32,
    pub level: i32,
}

/// Loads a session owned by `user_id`; someone else's session is "not found"
fn owned_session(conn: &mut SqliteConnection, user_id: &str, session_id: &str) -> Result<StudySession, StudyError> {
    study_sessions::table
        .find(session_id)
        .filter(study_sessions::user_id.eq(user_id))
        .select(StudySession::as_select())
        .first(conn)
        .optional()?
        .ok_or(StudyError::NotFound("Session"))
}

fn ensure_open(session: &StudySession) -> Result<(), StudyError> {
    if session.is_completed() {
        return Err(StudyError::InvalidState("Session already completed".to_string()));
    }
    Ok(())
}

fn issued_question_ids(conn: &mut SqliteConnection, session_id: &str) -> QueryResult<HashSet<String>> {
    let ids: Vec<String> = session_questions::table
        .filter(session_questions::session_id.eq(session_id))
        .select(session_questions::question_id)
        .load(conn)?;
    Ok(ids.into_iter().collect())
}

fn answered_question_ids(conn: &mut SqliteConnection, session_id: &str) -> QueryResult<HashSet<String>> {
    let ids: Vec<String> = answers::table
        .filter(answers::session_id.eq(session_id))
        .select(answers::question_id)
        .load(conn)?;
    Ok(ids.into_iter().collect())
}

fn reload(conn: &mut SqliteConnection, session_id: &str) -> QueryResult<StudySession> {
    study_sessions::table
        .find(session_id)
        .select(StudySession::as_select())
        .first(conn)
}

/// Starts a session with randomly drawn questions
///
/// The drawn questions are recorded against the session; only those can be
/// answered later.
///
/// ### Errors
///
/// Returns `NotFound` if no active question matches the filter.
#[instrument(skip(pool, request), fields(mode = %request.mode, num_questions = request.num_questions))]
pub fn start_session(
    pool: &DbPool,
    user_id: &str,
    request: &NewSession,
) -> Result<(StudySession, Vec<Question>), StudyError> {
    let conn = &mut pool.get()?;

    conn.immediate_transaction::<_, StudyError, _>(|conn| {
        let picked = question_repo::select_random_questions(conn, &request.filter, request.num_questions)?;
        if picked.is_empty() {
            warn!("No questions match the requested scope");
            return Err(StudyError::NotFound("Matching questions"));
        }

        let session = StudySession::new(
            user_id.to_string(),
            request.mode,
            request.filter.entity_id.clone(),
            request.time_limit_minutes,
            picked.len() as i32,
        );
        diesel::insert_into(study_sessions::table)
            .values(&session)
            .execute(conn)?;

        let issued: Vec<SessionQuestion> = picked
            .iter()
            .enumerate()
            .map(|(position, question)| SessionQuestion {
                session_id: session.get_id(),
                question_id: question.get_id(),
                position: position as i32,
            })
            .collect();
        diesel::insert_into(session_questions::table)
            .values(&issued)
            .execute(conn)?;

        info!("Started session {} with {} questions", session.get_id(), picked.len());
        Ok((session, picked))
    })
}

/// Scores a whole simulacro and completes it
///
/// Each submitted item gets an outcome. Items naming an unknown question, a
/// question the session did not issue, or a question already answered are
/// rejected: they are not stored and earn nothing, but still count in the
/// score denominator. An option other than A-D is stored as a wrong answer.
///
/// ### Errors
///
/// - `NotFound` if the session does not exist or belongs to someone else
/// - `InvalidState` if it is not a simulacro, is already completed, or the
///   deadline passed while `enforce_deadline` is set
#[instrument(skip(pool, submitted), fields(answers = submitted.len()))]
pub fn submit_simulacro(
    pool: &DbPool,
    user_id: &str,
    session_id: &str,
    submitted: &[AnswerDto],
    enforce_deadline: bool,
    now: DateTime<Utc>,
) -> Result<SimulacroSubmission, StudyError> {
    let conn = &mut pool.get()?;

    conn.immediate_transaction::<_, StudyError, _>(|conn| {
        let session = owned_session(conn, user_id, session_id)?;
        if session.get_mode() != StudyMode::Simulacro {
            return Err(StudyError::InvalidState("Session is not a simulacro".to_string()));
        }
        ensure_open(&session)?;
        if enforce_deadline && session.is_past_deadline(now) {
            warn!("Rejected late submission for session {}", session_id);
            return Err(StudyError::InvalidState("Time limit exceeded".to_string()));
        }

        let issued = issued_question_ids(conn, session_id)?;
        let mut seen = answered_question_ids(conn, session_id)?;

        let wanted: Vec<String> = submitted.iter().map(|a| a.question_id.clone()).collect();
        let by_id: HashMap<String, Question> = question_repo::load_in_order(conn, &wanted)?
            .into_iter()
            .map(|q| (q.get_id(), q))
            .collect();

        let mut tally = Tally::new();
        let mut results = Vec::with_capacity(submitted.len());
        let mut stored = Vec::new();

        for item in submitted {
            let selected = item.selected_option.trim().to_uppercase();
            let rejected = |outcome| ItemResult {
                question_id: item.question_id.clone(),
                outcome,
                selected: selected.clone(),
                is_correct: false,
                correct_answer: None,
                explanation: None,
                page_reference: None,
                xp_earned: 0,
            };

            let Some(question) = by_id.get(&item.question_id) else {
                tally.record_rejected();
                results.push(rejected(ItemOutcome::UnknownQuestion));
                continue;
            };
            if !issued.contains(&item.question_id) {
                tally.record_rejected();
                results.push(rejected(ItemOutcome::NotInSession));
                continue;
            }
            if !seen.insert(item.question_id.clone()) {
                tally.record_rejected();
                results.push(rejected(ItemOutcome::Duplicate));
                continue;
            }

            let grade = question.grade(&selected);
            tally.record(grade);
            stored.push(Answer::new(
                session_id,
                user_id,
                &item.question_id,
                &selected,
                grade.is_correct,
                item.time_spent_seconds,
            ));

            let outcome = if AnswerOption::parse(&selected).is_some() {
                ItemOutcome::Scored
            } else {
                ItemOutcome::InvalidOption
            };
            results.push(ItemResult {
                question_id: item.question_id.clone(),
                outcome,
                selected,
                is_correct: grade.is_correct,
                correct_answer: Some(question.get_correct_answer()),
                explanation: question.get_explanation(),
                page_reference: question.get_page_reference(),
                xp_earned: grade.xp,
            });
        }

        if !stored.is_empty() {
            diesel::insert_into(answers::table)
                .values(&stored)
                .execute(conn)?;
        }

        let correct = tally.correct() as i32;
        let updated = diesel::update(
            study_sessions::table
                .find(session_id)
                .filter(study_sessions::completed_at.is_null()),
        )
        .set((
            study_sessions::correct_answers.eq(study_sessions::correct_answers + correct),
            study_sessions::xp_earned.eq(study_sessions::xp_earned + tally.xp()),
            study_sessions::score.eq(Some(tally.score())),
            study_sessions::completed_at.eq(Some(now.naive_utc())),
        ))
        .execute(conn)?;
        if updated == 0 {
            return Err(StudyError::InvalidState("Session already completed".to_string()));
        }

        let (xp_points, level) = user_repo::award_xp(conn, user_id, tally.xp())?;
        let session = reload(conn, session_id)?;

        info!(
            "Completed simulacro {}: {}/{} correct, {} XP",
            session_id,
            tally.correct(),
            tally.submitted(),
            tally.xp()
        );
        Ok(SimulacroSubmission {
            session,
            results,
            submitted: tally.submitted(),
            xp_points,
            level,
        })
    })
}

/// Scores one answer in an advanced session and rewards it immediately
///
/// The session completes on its own once every issued question has been
/// answered. An option other than A-D is stored as a wrong answer.
///
/// ### Errors
///
/// - `NotFound` if the session (advanced, owned by the user) or the
///   question does not exist
/// - `InvalidState` if the session is completed, did not issue the
///   question, or already has an answer for it
#[instrument(skip(pool, answer), fields(question_id = %answer.question_id))]
pub fn record_advanced_answer(
    pool: &DbPool,
    user_id: &str,
    session_id: &str,
    answer: &AnswerDto,
    now: DateTime<Utc>,
) -> Result<AdvancedAnswer, StudyError> {
    let conn = &mut pool.get()?;

    conn.immediate_transaction::<_, StudyError, _>(|conn| {
        let session = owned_session(conn, user_id, session_id)?;
        if session.get_mode() != StudyMode::Advanced {
            return Err(StudyError::NotFound("Session"));
        }
        ensure_open(&session)?;

        let question = questions::table
            .find(&answer.question_id)
            .select(Question::as_select())
            .first(conn)
            .optional()?
            .ok_or(StudyError::NotFound("Question"))?;

        if !issued_question_ids(conn, session_id)?.contains(&answer.question_id) {
            return Err(StudyError::InvalidState("Question was not issued by this session".to_string()));
        }
        if answered_question_ids(conn, session_id)?.contains(&answer.question_id) {
            return Err(StudyError::InvalidState("Question already answered in this session".to_string()));
        }

        let selected = answer.selected_option.trim().to_uppercase();
        let grade = question.grade(&selected);
        diesel::insert_into(answers::table)
            .values(&Answer::new(
                session_id,
                user_id,
                &answer.question_id,
                &selected,
                grade.is_correct,
                answer.time_spent_seconds,
            ))
            .execute(conn)?;

        diesel::update(study_sessions::table.find(session_id))
            .set((
                study_sessions::correct_answers.eq(study_sessions::correct_answers + i32::from(grade.is_correct)),
                study_sessions::xp_earned.eq(study_sessions::xp_earned + grade.xp),
            ))
            .execute(conn)?;

        let (xp_points, level) = user_repo::award_xp(conn, user_id, grade.xp)?;

        let answered: i64 = answers::table
            .filter(answers::session_id.eq(session_id))
            .count()
            .get_result(conn)?;
        let total = session.get_total_questions();
        let session_completed = answered >= i64::from(total);
        if session_completed {
            complete_advanced(conn, session_id, now)?;
            info!("Advanced session {} completed after its last question", session_id);
        }

        debug!("Recorded advanced answer, correct={}", grade.is_correct);
        Ok(AdvancedAnswer {
            question,
            grade,
            answered,
            total_questions: total,
            session_completed,
            xp_points,
            level,
        })
    })
}

/// Sets the final score of an advanced session from its answers so far
fn complete_advanced(conn: &mut SqliteConnection, session_id: &str, now: DateTime<Utc>) -> QueryResult<()> {
    let graded: Vec<bool> = answers::table
        .filter(answers::session_id.eq(session_id))
        .select(answers::is_correct)
        .load(conn)?;
    let correct = graded.iter().filter(|c| **c).count();
    let score = scoring::score_percentage(correct, graded.len());

    diesel::update(
        study_sessions::table
            .find(session_id)
            .filter(study_sessions::completed_at.is_null()),
    )
    .set((
        study_sessions::score.eq(Some(score)),
        study_sessions::completed_at.eq(Some(now.naive_utc())),
    ))
    .execute(conn)?;
    Ok(())
}

/// Completes an advanced session before all of its questions are answered
///
/// The score is the share of correct answers among those given, 0 when
/// none were.
///
/// ### Errors
///
/// - `NotFound` if the session does not exist or belongs to someone else
/// - `InvalidState` for simulacro sessions or sessions already completed
#[instrument(skip(pool))]
pub fn finish_session(
    pool: &DbPool,
    user_id: &str,
    session_id: &str,
    now: DateTime<Utc>,
) -> Result<StudySession, StudyError> {
    let conn = &mut pool.get()?;

    conn.immediate_transaction::<_, StudyError, _>(|conn| {
        let session = owned_session(conn, user_id, session_id)?;
        if session.get_mode() != StudyMode::Advanced {
            return Err(StudyError::InvalidState(
                "Simulacro sessions are completed by submitting their answers".to_string(),
            ));
        }
        ensure_open(&session)?;

        complete_advanced(conn, session_id, now)?;
        info!("Finished advanced session {}", session_id);
        Ok(reload(conn, session_id)?)
    })
}

/// Lists a user's sessions, newest first
#[instrument(skip(pool))]
pub fn list_sessions(pool: &DbPool, user_id: &str) -> anyhow::Result<Vec<StudySession>> {
    let conn = &mut pool.get()?;

    let sessions = study_sessions::table
        .filter(study_sessions::user_id.eq(user_id))
        .order(study_sessions::started_at.desc())
        .select(StudySession::as_select())
        .load(conn)?;

    Ok(sessions)
}

/// Retrieves one of a user's sessions with its answers in answer order
#[instrument(skip(pool))]
pub fn get_session_with_answers(
    pool: &DbPool,
    user_id: &str,
    session_id: &str,
) -> Result<(StudySession, Vec<Answer>), StudyError> {
    let conn = &mut pool.get()?;

    let session = owned_session(conn, user_id, session_id)?;
    let recorded = answers::table
        .filter(answers::session_id.eq(session_id))
        .order(answers::answered_at.asc())
        .select(Answer::as_select())
        .load(conn)?;

    Ok((session, recorded))
}
