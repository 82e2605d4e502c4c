use super::*;
use crate::test_utils::{insert_entity, insert_question, insert_topic, sample_draft, setup_test_db};
use std::collections::HashSet;

#[test]
fn test_create_and_get_question() {
    let pool = setup_test_db();
    let question = insert_question(&pool, None, None, "D", 30);

    let fetched = get_question(&pool, &question.get_id()).unwrap().unwrap();
    assert_eq!(fetched, question);
    assert!(get_question(&pool, "missing").unwrap().is_none());
}

#[test]
fn test_question_with_unknown_entity_is_rejected() {
    let pool = setup_test_db();
    let mut draft = sample_draft("¿Pregunta huérfana?", "A", 10);
    draft.entity_id = Some("missing".to_string());

    assert!(create_question(&pool, Question::new(draft).unwrap()).is_err());
}

#[test]
fn test_find_by_text() {
    let pool = setup_test_db();
    let question = create_question(&pool, Question::new(sample_draft("¿Qué es el IVA?", "A", 10)).unwrap()).unwrap();

    let found = find_question_by_text(&pool, "¿Qué es el IVA?").unwrap().unwrap();
    assert_eq!(found.get_id(), question.get_id());
    assert!(find_question_by_text(&pool, "otra").unwrap().is_none());
}

#[test]
fn test_random_selection_respects_filter_and_limit() {
    let pool = setup_test_db();
    let dian = insert_entity(&pool, "DIAN");
    let car = insert_entity(&pool, "CAR");
    for _ in 0..5 {
        insert_question(&pool, Some(&dian.get_id()), None, "A", 10);
    }
    let car_question = insert_question(&pool, Some(&car.get_id()), None, "B", 10);

    let filter = QuestionFilter { entity_id: Some(dian.get_id()), ..Default::default() };
    let picked = list_random_questions(&pool, &filter, 3).unwrap();

    assert_eq!(picked.len(), 3);
    let ids: HashSet<String> = picked.iter().map(|q| q.get_id()).collect();
    assert_eq!(ids.len(), 3);
    assert!(!ids.contains(&car_question.get_id()));
    assert!(picked.iter().all(|q| q.get_entity_id() == Some(dian.get_id())));
}

#[test]
fn test_random_selection_skips_inactive_and_filters_difficulty() {
    let pool = setup_test_db();
    let mut hard = sample_draft("¿Difícil?", "A", 50);
    hard.difficulty = 5;
    let hard = create_question(&pool, Question::new(hard).unwrap()).unwrap();
    let mut retired = Question::new(sample_draft("¿Retirada?", "A", 10)).unwrap();
    retired.set_active(false);
    create_question(&pool, retired).unwrap();
    insert_question(&pool, None, None, "A", 10);

    let filter = QuestionFilter { difficulty: Some(5), ..Default::default() };
    let picked = list_random_questions(&pool, &filter, 10).unwrap();
    assert_eq!(picked.len(), 1);
    assert_eq!(picked[0].get_id(), hard.get_id());

    let all = list_random_questions(&pool, &QuestionFilter::default(), 10).unwrap();
    assert_eq!(all.len(), 2);
}

#[test]
fn test_load_in_order_keeps_requested_order() {
    let pool = setup_test_db();
    let a = insert_question(&pool, None, None, "A", 10);
    let b = insert_question(&pool, None, None, "B", 10);
    let conn = &mut pool.get().unwrap();

    let ids = vec![b.get_id(), "missing".to_string(), a.get_id()];
    let loaded: Vec<String> = load_in_order(conn, &ids).unwrap().iter().map(|q| q.get_id()).collect();
    assert_eq!(loaded, vec![b.get_id(), a.get_id()]);
}

#[test]
fn test_load_in_order_handles_more_ids_than_sqlite_binds() {
    let pool = setup_test_db();
    let a = insert_question(&pool, None, None, "A", 10);
    let conn = &mut pool.get().unwrap();

    let mut ids: Vec<String> = (0..40_000).map(|n| format!("unknown-{n}")).collect();
    ids.push(a.get_id());
    ids.push(a.get_id());

    let loaded = load_in_order(conn, &ids).unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].get_id(), a.get_id());
}

#[test]
fn test_topic_name_lookup() {
    let pool = setup_test_db();
    let topic = insert_topic(&pool, "Contratación Estatal");
    let with_topic = insert_question(&pool, None, Some(&topic.get_id()), "A", 10);
    let without = insert_question(&pool, None, None, "A", 10);

    assert_eq!(get_question_topic_name(&pool, &with_topic).unwrap(), Some("Contratación Estatal".to_string()));
    assert_eq!(get_question_topic_name(&pool, &without).unwrap(), None);
}
