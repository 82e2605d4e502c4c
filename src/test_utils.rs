use crate::*;
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::{hash_password, TokenKeys};
use crate::explain::{DisabledProvider, ExplainError, ExplanationProvider, Prompt};
use crate::models::{Entity, Question, QuestionDraft, Topic, User, UserRole};
use crate::progression::TopicTally;

/// Password given to every user created by [`insert_user`]
pub const TEST_PASSWORD: &str = "secreto123";

/// Secret used to sign tokens in tests
pub const TEST_SECRET: &str = "test-secret";

/// Sets up a test database with migrations applied
///
/// Each call gets its own shared-cache in-memory database, so every pooled
/// connection sees the same schema while tests stay isolated.
///
/// ### Returns
///
/// An Arc-wrapped database connection pool connected to the in-memory database
pub fn setup_test_db() -> Arc<db::DbPool> {
    let unique_id = uuid::Uuid::new_v4();
    let database_url = format!("file:test_{}?mode=memory&cache=shared", unique_id);
    let pool = db::init_pool(&database_url).expect("Failed to create pool");

    let mut conn = pool.get().expect("Failed to get connection");
    run_migrations(&mut conn).expect("Failed to run migrations");
    drop(conn);

    Arc::new(pool)
}

/// Sets up a migrated SQLite database in a temporary file
///
/// For tests where connections must contend for the write lock; the
/// directory is removed when the returned guard drops.
pub fn setup_file_test_db() -> (tempfile::TempDir, Arc<db::DbPool>) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let database_url = dir.path().join("meritsim-test.db").to_string_lossy().to_string();
    let pool = db::init_pool(&database_url).expect("Failed to create pool");

    let mut conn = pool.get().expect("Failed to get connection");
    run_migrations(&mut conn).expect("Failed to run migrations");
    drop(conn);

    (dir, Arc::new(pool))
}

/// Application state over a fresh database with explanations disabled
pub fn test_state() -> AppState {
    test_state_with(Arc::new(DisabledProvider))
}

/// Application state over a fresh database with the given explanation provider
pub fn test_state_with(explainer: Arc<dyn ExplanationProvider>) -> AppState {
    AppState {
        pool: setup_test_db(),
        tokens: Arc::new(TokenKeys::new(TEST_SECRET, 30)),
        explainer,
        unlock_threshold: progression::DEFAULT_UNLOCK_THRESHOLD,
        enforce_time_limits: false,
        materials_path: std::path::PathBuf::from("materials"),
    }
}

/// `Authorization` header value for a user
pub fn bearer(state: &AppState, user: &User) -> String {
    format!("Bearer {}", state.tokens.sign(user).expect("Failed to sign token"))
}

/// A valid question draft with four options
pub fn sample_draft(text: &str, correct: &str, xp_reward: i32) -> QuestionDraft {
    QuestionDraft {
        entity_id: None,
        profile_id: None,
        topic_id: None,
        material_id: None,
        text: text.to_string(),
        option_a: "Primera opción".to_string(),
        option_b: "Segunda opción".to_string(),
        option_c: "Tercera opción".to_string(),
        option_d: "Cuarta opción".to_string(),
        correct_answer: correct.to_string(),
        explanation: None,
        page_reference: None,
        difficulty: 1,
        xp_reward,
    }
}

pub fn insert_entity(pool: &db::DbPool, name: &str) -> Entity {
    let entity = Entity::new(name.to_string(), None, None, Some("#3B82F6".to_string()));
    repo::create_entity(pool, entity).expect("Failed to create entity")
}

pub fn insert_topic(pool: &db::DbPool, name: &str) -> Topic {
    repo::create_topic(pool, Topic::new(name.to_string(), None)).expect("Failed to create topic")
}

/// Inserts an active question with a unique text
pub fn insert_question(
    pool: &db::DbPool,
    entity_id: Option<&str>,
    topic_id: Option<&str>,
    correct: &str,
    xp_reward: i32,
) -> Question {
    let mut draft = sample_draft(&format!("Pregunta {}", uuid::Uuid::new_v4()), correct, xp_reward);
    draft.entity_id = entity_id.map(str::to_string);
    draft.topic_id = topic_id.map(str::to_string);
    let question = Question::new(draft).expect("Invalid test question");
    repo::create_question(pool, question).expect("Failed to create question")
}

/// Inserts an active user whose password is [`TEST_PASSWORD`]
pub fn insert_user(pool: &db::DbPool, email: &str, role: UserRole) -> User {
    let hashed = hash_password(TEST_PASSWORD).expect("Failed to hash password");
    let user = User::new(email.to_string(), hashed, None, role);
    repo::create_user(pool, user).expect("Failed to create user")
}

/// Explanation provider with a canned answer that counts its calls
pub struct ScriptedProvider {
    reply: Option<String>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn replying(text: &str) -> Self {
        Self { reply: Some(text.to_string()), calls: AtomicUsize::new(0) }
    }

    pub fn failing() -> Self {
        Self { reply: None, calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExplanationProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn generate(&self, _prompt: &Prompt) -> Result<String, ExplainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone().ok_or(ExplainError::Status {
            status: 503,
            body: "unavailable".to_string(),
        })
    }
}

#[test]
fn test_setup_test_db_creates_schema() {
    use diesel::prelude::*;
    use diesel::sql_types::Text;

    #[derive(QueryableByName, Debug)]
    struct TableName {
        #[diesel(sql_type = Text)]
        name: String,
    }

    let pool = setup_test_db();
    let mut conn = pool.get().unwrap();
    let tables: Vec<TableName> = diesel::sql_query("SELECT name FROM sqlite_master WHERE type='table'")
        .load(&mut conn)
        .unwrap();

    for expected in [
        "users", "entities", "profiles", "topics", "materials", "questions",
        "study_sessions", "session_questions", "answers", "__diesel_schema_migrations",
    ] {
        assert!(tables.iter().any(|t| t.name == expected), "Table '{}' not found", expected);
    }
}

/// Generates a non-negative XP amount
pub fn arb_xp() -> impl Strategy<Value = i32> {
    prop_oneof![
        0i32..=100,
        0i32..=1_000_000,
    ]
}

/// Generates a valid option label in upper case
pub fn arb_option_label() -> impl Strategy<Value = String> {
    prop_oneof![Just("A"), Just("B"), Just("C"), Just("D")].prop_map(str::to_string)
}

/// Generates strings with surrounding whitespace, accents and symbols
pub fn arb_messy_string() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9 ]{0,20}",
        "\\s{0,3}[a-záéíóúñ:/._-]{1,20}\\s{0,3}",
        "\\PC{0,30}",
    ]
}

/// Generates topic tallies with distinct ids and `completed <= total`
pub fn arb_topic_tallies() -> impl Strategy<Value = Vec<TopicTally>> {
    let tally = (
        prop::option::of("[a-f0-9]{8}"),
        prop::option::of("[A-Z][a-z]{0,10}"),
        0i64..50,
        0i64..=100,
    );
    prop::collection::vec(tally, 0..12).prop_map(|rows| {
        let mut seen = std::collections::HashSet::new();
        rows.into_iter()
            .filter(|(topic_id, _, _, _)| seen.insert(topic_id.clone()))
            .map(|(topic_id, topic_name, total, completed_pct)| TopicTally {
                topic_name: topic_id.as_ref().and(topic_name),
                topic_id,
                total_questions: total,
                completed_questions: total * completed_pct / 100,
            })
            .collect()
    })
}
