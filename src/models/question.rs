use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::scoring::{self, AnswerOption, Grade};

/// Why a question draft was refused
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidQuestion {
    #[error("question text is empty")]
    EmptyText,
    #[error("option {0} is empty")]
    EmptyOption(AnswerOption),
    #[error("correct answer must be one of A, B, C, D, got {0:?}")]
    BadCorrectAnswer(String),
    #[error("difficulty must be between 1 and 5, got {0}")]
    BadDifficulty(i32),
    #[error("xp reward cannot be negative, got {0}")]
    NegativeReward(i32),
}

/// Everything needed to create a question, before validation
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuestionDraft {
    pub entity_id: Option<String>,
    pub profile_id: Option<String>,
    pub topic_id: Option<String>,
    pub material_id: Option<String>,
    pub text: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    pub correct_answer: String,
    pub explanation: Option<String>,
    pub page_reference: Option<String>,
    pub difficulty: i32,
    pub xp_reward: i32,
}

/// An immutable multiple-choice exam item
///
/// Questions are created by seeding or ingestion and never modified by
/// learners; `is_active` soft-disables one without deleting its answers.
#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::questions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Question {
    /// Unique identifier for the question (UUID v4 as string)
    id: String,

    entity_id: Option<String>,

    profile_id: Option<String>,

    topic_id: Option<String>,

    /// Source document, when the question was derived from one
    material_id: Option<String>,

    /// The question body
    text: String,

    option_a: String,
    option_b: String,
    option_c: String,
    option_d: String,

    /// Upper-case letter of the correct option
    correct_answer: String,

    /// Stored explanation, shown instead of asking the explanation provider
    explanation: Option<String>,

    /// Where in the source material the answer can be found
    page_reference: Option<String>,

    /// 1 (easiest) to 5
    difficulty: i32,

    /// XP granted for a correct answer
    xp_reward: i32,

    is_active: bool,

    created_at: NaiveDateTime,
}

impl Question {
    /// Validates a draft and turns it into a new active question
    ///
    /// ### Errors
    ///
    /// Returns an error if the text or any option is blank, the correct
    /// answer is not a single letter A-D, the difficulty is outside 1-5, or
    /// the XP reward is negative.
    pub fn new(draft: QuestionDraft) -> Result<Self, InvalidQuestion> {
        if draft.text.trim().is_empty() {
            return Err(InvalidQuestion::EmptyText);
        }
        let options = [
            (AnswerOption::A, &draft.option_a),
            (AnswerOption::B, &draft.option_b),
            (AnswerOption::C, &draft.option_c),
            (AnswerOption::D, &draft.option_d),
        ];
        if let Some((label, _)) = options.iter().find(|(_, text)| text.trim().is_empty()) {
            return Err(InvalidQuestion::EmptyOption(*label));
        }
        let correct = AnswerOption::parse(&draft.correct_answer)
            .ok_or_else(|| InvalidQuestion::BadCorrectAnswer(draft.correct_answer.clone()))?;
        if !(1..=5).contains(&draft.difficulty) {
            return Err(InvalidQuestion::BadDifficulty(draft.difficulty));
        }
        if draft.xp_reward < 0 {
            return Err(InvalidQuestion::NegativeReward(draft.xp_reward));
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            entity_id: draft.entity_id,
            profile_id: draft.profile_id,
            topic_id: draft.topic_id,
            material_id: draft.material_id,
            text: draft.text,
            option_a: draft.option_a,
            option_b: draft.option_b,
            option_c: draft.option_c,
            option_d: draft.option_d,
            correct_answer: correct.as_str().to_string(),
            explanation: draft.explanation,
            page_reference: draft.page_reference,
            difficulty: draft.difficulty,
            xp_reward: draft.xp_reward,
            is_active: true,
            created_at: Utc::now().naive_utc(),
        })
    }

    /// Scores a submitted option against this question
    pub fn grade(&self, selected: &str) -> Grade {
        scoring::grade_answer(&self.correct_answer, selected, self.xp_reward)
    }

    pub fn get_id(&self) -> String {
        self.id.clone()
    }

    pub fn get_entity_id(&self) -> Option<String> {
        self.entity_id.clone()
    }

    pub fn get_profile_id(&self) -> Option<String> {
        self.profile_id.clone()
    }

    pub fn get_topic_id(&self) -> Option<String> {
        self.topic_id.clone()
    }

    pub fn get_text(&self) -> String {
        self.text.clone()
    }

    /// The text of one option
    pub fn get_option(&self, option: AnswerOption) -> &str {
        match option {
            AnswerOption::A => &self.option_a,
            AnswerOption::B => &self.option_b,
            AnswerOption::C => &self.option_c,
            AnswerOption::D => &self.option_d,
        }
    }

    pub fn get_correct_answer(&self) -> String {
        self.correct_answer.clone()
    }

    pub fn get_explanation(&self) -> Option<String> {
        self.explanation.clone()
    }

    pub fn get_page_reference(&self) -> Option<String> {
        self.page_reference.clone()
    }

    pub fn get_difficulty(&self) -> i32 {
        self.difficulty
    }

    pub fn get_xp_reward(&self) -> i32 {
        self.xp_reward
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }

    pub fn get_created_at(&self) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(self.created_at, Utc)
    }
}
