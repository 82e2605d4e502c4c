use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::StudyMode;

/// Lifecycle state of a study session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// Created, still accepting answers
    Started,
    /// Terminal; no further answers are accepted
    Completed,
}

/// One exam attempt, in either study mode
///
/// `score` stays `None` until the session completes and is written exactly
/// once, together with `completed_at`. `correct_answers` never exceeds
/// `total_questions` (enforced by a table CHECK as well).
#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::study_sessions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct StudySession {
    /// Unique identifier for the session (UUID v4 as string)
    id: String,

    /// The user that owns this session
    user_id: String,

    mode: StudyMode,

    /// Entity the questions were drawn from, if the session was scoped
    entity_id: Option<String>,

    started_at: NaiveDateTime,

    completed_at: Option<NaiveDateTime>,

    /// Advisory unless deadline enforcement is switched on
    time_limit_minutes: Option<i32>,

    /// Number of questions issued when the session started
    total_questions: i32,

    correct_answers: i32,

    /// Percentage in [0, 100], set at completion
    score: Option<f64>,

    xp_earned: i32,
}

impl StudySession {
    /// Creates a new, started session
    ///
    /// ### Arguments
    ///
    /// * `user_id` - The owner of the session
    /// * `mode` - Simulacro or advanced
    /// * `entity_id` - Optional entity scope
    /// * `time_limit_minutes` - Optional time limit
    /// * `total_questions` - How many questions were issued
    pub fn new(
        user_id: String,
        mode: StudyMode,
        entity_id: Option<String>,
        time_limit_minutes: Option<i32>,
        total_questions: i32,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            mode,
            entity_id,
            started_at: Utc::now().naive_utc(),
            completed_at: None,
            time_limit_minutes,
            total_questions,
            correct_answers: 0,
            score: None,
            xp_earned: 0,
        }
    }

    pub fn get_id(&self) -> String {
        self.id.clone()
    }

    pub fn get_user_id(&self) -> String {
        self.user_id.clone()
    }

    pub fn get_mode(&self) -> StudyMode {
        self.mode
    }

    pub fn get_entity_id(&self) -> Option<String> {
        self.entity_id.clone()
    }

    pub fn get_started_at(&self) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(self.started_at, Utc)
    }

    /// Overrides the start time, used to replay old sessions
    pub fn set_started_at(&mut self, started_at: DateTime<Utc>) {
        self.started_at = started_at.naive_utc();
    }

    pub fn get_completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc))
    }

    pub fn get_time_limit_minutes(&self) -> Option<i32> {
        self.time_limit_minutes
    }

    pub fn get_total_questions(&self) -> i32 {
        self.total_questions
    }

    pub fn get_correct_answers(&self) -> i32 {
        self.correct_answers
    }

    pub fn get_score(&self) -> Option<f64> {
        self.score
    }

    pub fn get_xp_earned(&self) -> i32 {
        self.xp_earned
    }

    pub fn state(&self) -> SessionState {
        if self.completed_at.is_some() {
            SessionState::Completed
        } else {
            SessionState::Started
        }
    }

    pub fn is_completed(&self) -> bool {
        self.state() == SessionState::Completed
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }

    /// `started_at + time_limit_minutes`, when a limit was set
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.time_limit_minutes
            .map(|minutes| self.get_started_at() + Duration::minutes(i64::from(minutes)))
    }

    /// Whether `now` falls after the deadline; sessions without a limit never expire
    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        self.deadline().is_some_and(|deadline| now > deadline)
    }
}

/// Position of one issued question within a session
#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::session_questions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SessionQuestion {
    pub session_id: String,
    pub question_id: String,
    pub position: i32,
}
