use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Answer, Entity, Material, Question, StudyMode, StudySession, Topic, User, UserRole};
use crate::progression::MapNode;

/// Default number of questions per session
pub const DEFAULT_NUM_QUESTIONS: i64 = 20;
/// Upper bound on questions per session or listing
pub const MAX_NUM_QUESTIONS: i64 = 100;

fn default_num_questions() -> i64 {
    DEFAULT_NUM_QUESTIONS
}

fn default_time_limit() -> Option<i32> {
    Some(60)
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// Data transfer object for registering a new account
#[derive(Deserialize, Debug)]
pub struct RegisterDto {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Data transfer object for logging in
#[derive(Deserialize, Debug)]
pub struct LoginDto {
    pub email: String,
    pub password: String,
}

/// OAuth2 password-grant form; `username` carries the email
#[derive(Deserialize, Debug)]
pub struct PasswordFormDto {
    pub username: String,
    pub password: String,
}

/// Bearer token returned by a successful login
#[derive(Serialize, Deserialize, Debug)]
pub struct TokenDto {
    pub access_token: String,
    pub token_type: String,
}

/// Public view of a user account
#[derive(Serialize, Deserialize, Debug)]
pub struct UserDto {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub role: UserRole,
    pub xp_points: i32,
    pub level: i32,
    pub is_active: bool,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.get_id(),
            email: user.get_email(),
            full_name: user.get_full_name(),
            role: user.get_role(),
            xp_points: user.get_xp_points(),
            level: user.get_level(),
            is_active: user.is_active(),
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// An entity together with how many active questions it owns
#[derive(Serialize, Deserialize, Debug)]
pub struct EntityDto {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub question_count: i64,
}

impl EntityDto {
    pub fn new(entity: &Entity, question_count: i64) -> Self {
        Self {
            id: entity.get_id(),
            name: entity.get_name(),
            description: entity.get_description(),
            icon: entity.get_icon(),
            color: entity.get_color(),
            question_count,
        }
    }
}

/// A topic together with how many active questions it holds
#[derive(Serialize, Deserialize, Debug)]
pub struct TopicDto {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub question_count: i64,
}

impl TopicDto {
    pub fn new(topic: &Topic, question_count: i64) -> Self {
        Self {
            id: topic.get_id(),
            name: topic.get_name(),
            description: topic.get_description(),
            question_count,
        }
    }
}

/// Filters for listing questions
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct QuestionQuery {
    pub entity_id: Option<String>,
    pub topic_id: Option<String>,
    pub difficulty: Option<i32>,
    pub limit: Option<i64>,
}

/// A question as shown to a learner, without the correct option
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct QuestionView {
    pub id: String,
    pub text: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    pub entity_id: Option<String>,
    pub topic_id: Option<String>,
    pub difficulty: i32,
    pub xp_reward: i32,
}

impl From<&Question> for QuestionView {
    fn from(question: &Question) -> Self {
        use crate::scoring::AnswerOption;
        Self {
            id: question.get_id(),
            text: question.get_text(),
            option_a: question.get_option(AnswerOption::A).to_string(),
            option_b: question.get_option(AnswerOption::B).to_string(),
            option_c: question.get_option(AnswerOption::C).to_string(),
            option_d: question.get_option(AnswerOption::D).to_string(),
            entity_id: question.get_entity_id(),
            topic_id: question.get_topic_id(),
            difficulty: question.get_difficulty(),
            xp_reward: question.get_xp_reward(),
        }
    }
}

// ---------------------------------------------------------------------------
// Study sessions
// ---------------------------------------------------------------------------

/// Data transfer object for starting a session in either mode
#[derive(Deserialize, Debug)]
pub struct StartSessionDto {
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub profile_id: Option<String>,
    #[serde(default)]
    pub topic_id: Option<String>,
    #[serde(default = "default_num_questions")]
    pub num_questions: i64,
    /// Ignored for advanced sessions
    #[serde(default = "default_time_limit")]
    pub time_limit_minutes: Option<i32>,
    #[serde(default)]
    pub difficulty: Option<i32>,
}

/// Response for a newly started session
#[derive(Serialize, Deserialize, Debug)]
pub struct StartSessionResponse {
    pub session_id: String,
    pub mode: StudyMode,
    pub time_limit_minutes: Option<i32>,
    pub total_questions: i32,
    pub questions: Vec<QuestionView>,
}

/// One submitted answer
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct AnswerDto {
    pub question_id: String,
    pub selected_option: String,
    #[serde(default)]
    pub time_spent_seconds: Option<i32>,
}

/// Data transfer object for submitting a whole simulacro
#[derive(Deserialize, Serialize, Debug)]
pub struct SubmitSimulacroDto {
    pub session_id: String,
    pub answers: Vec<AnswerDto>,
}

/// Query string carrying the target session
#[derive(Deserialize, Debug)]
pub struct SessionQuery {
    pub session_id: String,
}

/// What happened to one item of a simulacro submission
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemOutcome {
    /// Graded and stored
    Scored,
    /// No question with that id exists
    UnknownQuestion,
    /// The question exists but was not issued by this session
    NotInSession,
    /// The question was already answered earlier in this session or batch
    Duplicate,
    /// The selected option is not one of A-D
    InvalidOption,
}

/// Per-item feedback for a simulacro submission
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ItemResult {
    pub question_id: String,
    pub outcome: ItemOutcome,
    pub selected: String,
    pub is_correct: bool,
    /// Only revealed for scored items
    pub correct_answer: Option<String>,
    pub explanation: Option<String>,
    pub page_reference: Option<String>,
    pub xp_earned: i32,
}

/// Result of a simulacro submission
#[derive(Serialize, Deserialize, Debug)]
pub struct SimulacroResult {
    pub session_id: String,
    /// Number of submitted answers, the score denominator
    pub total_questions: i32,
    pub correct_answers: i32,
    pub score: f64,
    pub xp_earned: i32,
    pub new_level: i32,
    pub xp_points: i32,
    pub results: Vec<ItemResult>,
}

/// Immediate feedback for one advanced-mode answer
#[derive(Serialize, Deserialize, Debug)]
pub struct AdvancedAnswerResult {
    pub is_correct: bool,
    pub correct_answer: String,
    pub explanation: String,
    pub page_reference: Option<String>,
    pub xp_earned: i32,
    pub new_level: i32,
    pub answered: i32,
    pub total_questions: i32,
    pub session_completed: bool,
}

/// Summary of a session
#[derive(Serialize, Deserialize, Debug)]
pub struct SessionDto {
    pub id: String,
    pub mode: StudyMode,
    pub entity_id: Option<String>,
    pub total_questions: i32,
    pub correct_answers: i32,
    pub score: Option<f64>,
    pub xp_earned: i32,
    pub time_limit_minutes: Option<i32>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&StudySession> for SessionDto {
    fn from(session: &StudySession) -> Self {
        Self {
            id: session.get_id(),
            mode: session.get_mode(),
            entity_id: session.get_entity_id(),
            total_questions: session.get_total_questions(),
            correct_answers: session.get_correct_answers(),
            score: session.get_score(),
            xp_earned: session.get_xp_earned(),
            time_limit_minutes: session.get_time_limit_minutes(),
            started_at: session.get_started_at(),
            completed_at: session.get_completed_at(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct AnswerRecordDto {
    pub question_id: String,
    pub selected_option: String,
    pub is_correct: bool,
    pub time_spent_seconds: Option<i32>,
    pub answered_at: DateTime<Utc>,
}

impl From<&Answer> for AnswerRecordDto {
    fn from(answer: &Answer) -> Self {
        Self {
            question_id: answer.get_question_id(),
            selected_option: answer.get_selected_option(),
            is_correct: answer.is_correct(),
            time_spent_seconds: answer.get_time_spent_seconds(),
            answered_at: answer.get_answered_at(),
        }
    }
}

/// A session with its answers
#[derive(Serialize, Deserialize, Debug)]
pub struct SessionDetailDto {
    #[serde(flatten)]
    pub session: SessionDto,
    pub answers: Vec<AnswerRecordDto>,
}

/// Scope for the adventure map
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct MapQuery {
    pub entity_id: Option<String>,
    pub profile_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct AdventureMapDto {
    pub nodes: Vec<MapNode>,
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct EntityProgressDto {
    pub entity_id: String,
    pub entity_name: String,
    pub color: Option<String>,
    pub total_answers: i64,
    pub correct_answers: i64,
    pub percentage: f64,
}

/// A learner's aggregate statistics
#[derive(Serialize, Deserialize, Debug)]
pub struct ProgressDto {
    pub total_sessions: i64,
    pub total_questions_answered: i64,
    /// Rounded to one decimal
    pub correct_percentage: f64,
    pub current_streak: i64,
    pub level: i32,
    pub xp_points: i32,
    pub entity_progress: Vec<EntityProgressDto>,
}

// ---------------------------------------------------------------------------
// Explanations and chat
// ---------------------------------------------------------------------------

#[derive(Deserialize, Debug)]
pub struct ExplanationQuery {
    pub question_id: String,
    pub selected_option: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ExplanationDto {
    pub explanation: String,
    pub is_correct: bool,
    pub correct_answer: String,
}

/// Scope of an AI-generated practice question
#[derive(Deserialize, Debug, Default)]
pub struct QuestionGenerationQuery {
    #[serde(default)]
    pub entity: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub profile: Option<String>,
}

/// A practice question proposed by the language model
///
/// Not stored. `error` is set only on the fixed replacement question
/// returned when generation fails.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GeneratedQuestionDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub text: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default = "default_generated_difficulty")]
    pub difficulty: i32,
}

fn default_generated_difficulty() -> i32 {
    1
}

#[derive(Deserialize, Debug)]
pub struct ChatDto {
    pub message: String,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ChatReplyDto {
    pub response: String,
}

// ---------------------------------------------------------------------------
// Materials and admin
// ---------------------------------------------------------------------------

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct MaterialQuery {
    pub entity_id: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct SuggestionQuery {
    pub limit: Option<i64>,
}

/// A material with its entity and profile names resolved
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MaterialDto {
    pub id: String,
    pub filename: String,
    pub filepath: String,
    pub title: Option<String>,
    pub entity: Option<String>,
    pub profile: Option<String>,
    pub file_size: Option<i64>,
    pub indexed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reason: Option<String>,
}

impl MaterialDto {
    pub fn new(material: &Material, entity: Option<String>, profile: Option<String>) -> Self {
        Self {
            id: material.get_id(),
            filename: material.get_filename(),
            filepath: material.get_filepath(),
            title: material.get_title(),
            entity,
            profile,
            file_size: material.get_file_size(),
            indexed_at: material.get_indexed_at(),
            reason: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SuggestionsDto {
    pub suggestions: Vec<MaterialDto>,
}

/// Platform-wide counts
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
pub struct AdminStatsDto {
    pub total_users: i64,
    pub active_users: i64,
    pub total_questions: i64,
    pub total_sessions: i64,
    pub total_answers: i64,
    pub total_materials: i64,
    pub entities: i64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct HealthDto {
    pub status: String,
    pub database: String,
    pub timestamp: DateTime<Utc>,
}
