/// Integration tests for the adventure map
///
/// Questions are stored straight through the repository so the correct
/// options are known; everything else goes through the HTTP API.

use axum::http::StatusCode;
use meritsim::models::{Entity, Question, QuestionDraft, Topic};
use meritsim::repo;
use serde_json::{json, Value};

mod common;
use common::*;

fn add_question(app: &TestApp, entity: &Entity, topic: &Topic, n: usize) -> Question {
    let question = Question::new(QuestionDraft {
        entity_id: Some(entity.get_id()),
        profile_id: None,
        topic_id: Some(topic.get_id()),
        material_id: None,
        text: format!("{} pregunta {}", topic.get_name(), n),
        option_a: "Correcta".to_string(),
        option_b: "Incorrecta".to_string(),
        option_c: "Tampoco".to_string(),
        option_d: "Ninguna".to_string(),
        correct_answer: "A".to_string(),
        explanation: None,
        page_reference: None,
        difficulty: 1,
        xp_reward: 10,
    })
    .unwrap();
    repo::create_question(&app.pool, question).unwrap()
}

/// Creates one entity with "Aduanas" (2 questions) and "Renta" (1 question)
fn seed_topics(app: &TestApp) -> (Entity, Topic, Topic) {
    let entity = repo::create_entity(&app.pool, Entity::new("DIAN".to_string(), None, None, None)).unwrap();
    let aduanas = repo::create_topic(&app.pool, Topic::new("Aduanas".to_string(), None)).unwrap();
    let renta = repo::create_topic(&app.pool, Topic::new("Renta".to_string(), None)).unwrap();
    add_question(app, &entity, &aduanas, 1);
    add_question(app, &entity, &aduanas, 2);
    add_question(app, &entity, &renta, 1);
    (entity, aduanas, renta)
}

async fn map(app: &mut TestApp, token: &str, entity: &Entity) -> Vec<Value> {
    let uri = format!("/study/adventure/map?entity_id={}", entity.get_id());
    let (status, body) = send(app, "GET", &uri, Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    body["nodes"].as_array().unwrap().clone()
}

/// Runs a simulacro over one topic, answering every question with `option`
async fn practise_topic(app: &mut TestApp, token: &str, topic: &Topic, count: usize, option: &str) {
    let (status, started) = send(
        app,
        "POST",
        "/study/simulacro/start",
        Some(token),
        Some(json!({ "topic_id": topic.get_id(), "num_questions": count })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let answers: Vec<Value> = started["questions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| json!({ "question_id": q["id"], "selected_option": option }))
        .collect();
    let (status, _) = send(
        app,
        "POST",
        "/study/simulacro/submit",
        Some(token),
        Some(json!({ "session_id": started["session_id"], "answers": answers })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

/// Tests the map of a learner who has not answered anything
///
/// This test verifies:
/// 1. Nodes follow topic name order
/// 2. Only the first node is open
#[tokio::test]
async fn test_new_learner_sees_first_node_open() {
    let mut app = create_test_app();
    let (entity, _, _) = seed_topics(&app);
    let token = register_and_login(&mut app, "nuevo@meritsim.co").await;

    let nodes = map(&mut app, &token, &entity).await;

    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0]["label"], "Aduanas");
    assert_eq!(nodes[0]["status"], "available");
    assert_eq!(nodes[0]["total_questions"], 2);
    assert_eq!(nodes[1]["label"], "Renta");
    assert_eq!(nodes[1]["status"], "locked");
    assert_eq!(nodes[1]["x"], 80);
    assert_eq!(nodes[1]["y"], 40);
}

/// Tests that mastering a topic completes it and unlocks the next one
#[tokio::test]
async fn test_completed_topic_unlocks_next() {
    let mut app = create_test_app();
    let (entity, aduanas, _) = seed_topics(&app);
    let token = register_and_login(&mut app, "constante@meritsim.co").await;

    practise_topic(&mut app, &token, &aduanas, 2, "A").await;
    let nodes = map(&mut app, &token, &entity).await;

    assert_eq!(nodes[0]["status"], "completed");
    assert_eq!(nodes[0]["progress"], 100);
    assert_eq!(nodes[1]["status"], "available");
}

/// Tests that wrong answers do not count toward progress
#[tokio::test]
async fn test_wrong_answers_keep_next_node_locked() {
    let mut app = create_test_app();
    let (entity, aduanas, _) = seed_topics(&app);
    let token = register_and_login(&mut app, "distraido@meritsim.co").await;

    practise_topic(&mut app, &token, &aduanas, 2, "C").await;
    let nodes = map(&mut app, &token, &entity).await;

    assert_eq!(nodes[0]["progress"], 0);
    assert_eq!(nodes[0]["status"], "available");
    assert_eq!(nodes[1]["status"], "locked");
}

/// Tests that progress is tracked per learner
#[tokio::test]
async fn test_map_is_per_learner() {
    let mut app = create_test_app();
    let (entity, aduanas, _) = seed_topics(&app);
    let diligent = register_and_login(&mut app, "aplicada@meritsim.co").await;
    let newcomer = register_and_login(&mut app, "recien@meritsim.co").await;

    practise_topic(&mut app, &diligent, &aduanas, 2, "A").await;

    let nodes = map(&mut app, &newcomer, &entity).await;
    assert_eq!(nodes[0]["progress"], 0);
    assert_eq!(nodes[1]["status"], "locked");
}
