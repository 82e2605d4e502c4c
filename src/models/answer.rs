use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One scored response to one question within one session
///
/// Correctness is decided when the answer is written and never recomputed.
#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::answers)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Answer {
    /// Unique identifier for the answer (UUID v4 as string)
    id: String,

    session_id: String,

    user_id: String,

    question_id: String,

    /// The submitted option, trimmed and upper-cased
    selected_option: String,

    is_correct: bool,

    time_spent_seconds: Option<i32>,

    answered_at: NaiveDateTime,
}

impl Answer {
    /// Creates a new answer record
    ///
    /// ### Arguments
    ///
    /// * `session_id` - The session the answer belongs to
    /// * `user_id` - The user who answered
    /// * `question_id` - The question that was answered
    /// * `selected_option` - The raw submitted option
    /// * `is_correct` - The grade decided by the scoring engine
    /// * `time_spent_seconds` - Optional elapsed time reported by the client
    pub fn new(
        session_id: &str,
        user_id: &str,
        question_id: &str,
        selected_option: &str,
        is_correct: bool,
        time_spent_seconds: Option<i32>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            question_id: question_id.to_string(),
            selected_option: selected_option.trim().to_uppercase(),
            is_correct,
            time_spent_seconds,
            answered_at: Utc::now().naive_utc(),
        }
    }

    pub fn get_id(&self) -> String {
        self.id.clone()
    }

    pub fn get_session_id(&self) -> String {
        self.session_id.clone()
    }

    pub fn get_user_id(&self) -> String {
        self.user_id.clone()
    }

    pub fn get_question_id(&self) -> String {
        self.question_id.clone()
    }

    pub fn get_selected_option(&self) -> String {
        self.selected_option.clone()
    }

    pub fn is_correct(&self) -> bool {
        self.is_correct
    }

    pub fn get_time_spent_seconds(&self) -> Option<i32> {
        self.time_spent_seconds
    }

    pub fn get_answered_at(&self) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(self.answered_at, Utc)
    }

    /// Overrides the answer time, used to replay history
    pub fn set_answered_at(&mut self, answered_at: DateTime<Utc>) {
        self.answered_at = answered_at.naive_utc();
    }
}
