use std::collections::{HashMap, HashSet};

use crate::db::DbPool;
use crate::models::Question;
use crate::schema::questions;
use diesel::prelude::*;
use diesel::sqlite::Sqlite;
use anyhow::Result;
use rand::seq::SliceRandom;
use tracing::{instrument, debug, info};

/// Scope used to pick questions for listing or for a new session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionFilter {
    pub entity_id: Option<String>,
    pub profile_id: Option<String>,
    pub topic_id: Option<String>,
    pub difficulty: Option<i32>,
}

impl QuestionFilter {
    /// Active questions matching every set field
    fn query(&self) -> questions::BoxedQuery<'_, Sqlite> {
        let mut query = questions::table
            .filter(questions::is_active.eq(true))
            .into_boxed();

        if let Some(entity_id) = &self.entity_id {
            query = query.filter(questions::entity_id.eq(entity_id));
        }
        if let Some(profile_id) = &self.profile_id {
            query = query.filter(questions::profile_id.eq(profile_id));
        }
        if let Some(topic_id) = &self.topic_id {
            query = query.filter(questions::topic_id.eq(topic_id));
        }
        if let Some(difficulty) = self.difficulty {
            query = query.filter(questions::difficulty.eq(difficulty));
        }
        query
    }
}

/// Inserts a validated question
///
/// ### Errors
///
/// Returns an error if:
/// - Unable to get a connection from the pool
/// - A referenced entity, profile, topic or material does not exist
#[instrument(skip(pool, question), fields(question_id = %question.get_id()))]
pub fn create_question(pool: &DbPool, question: Question) -> Result<Question> {
    let conn = &mut pool.get()?;

    diesel::insert_into(questions::table)
        .values(&question)
        .execute(conn)?;

    info!("Created question");
    Ok(question)
}

/// Retrieves a question by id, active or not
#[instrument(skip(pool))]
pub fn get_question(pool: &DbPool, id: &str) -> Result<Option<Question>> {
    debug!("Retrieving question");
    let conn = &mut pool.get()?;

    let question = questions::table
        .find(id)
        .select(Question::as_select())
        .first(conn)
        .optional()?;

    Ok(question)
}

/// Retrieves a question by its exact text, used to keep seeding idempotent
pub fn find_question_by_text(pool: &DbPool, text: &str) -> Result<Option<Question>> {
    let conn = &mut pool.get()?;

    let question = questions::table
        .filter(questions::text.eq(text))
        .select(Question::as_select())
        .first(conn)
        .optional()?;

    Ok(question)
}

/// Picks up to `limit` random active questions matching the filter
///
/// Matching ids are shuffled in memory, so every matching question is
/// equally likely to be chosen.
pub(crate) fn select_random_questions(
    conn: &mut SqliteConnection,
    filter: &QuestionFilter,
    limit: usize,
) -> QueryResult<Vec<Question>> {
    let mut ids: Vec<String> = filter.query().select(questions::id).load(conn)?;
    ids.shuffle(&mut rand::rng());
    ids.truncate(limit);

    load_in_order(conn, &ids)
}

/// Most ids bound in one `IN` lookup, well under SQLite's variable limit
const LOOKUP_CHUNK: usize = 500;

/// Loads questions by id, returned in the order of `ids`
///
/// Unknown ids are dropped and a repeated id yields its question once.
pub(crate) fn load_in_order(conn: &mut SqliteConnection, ids: &[String]) -> QueryResult<Vec<Question>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut seen = HashSet::new();
    let distinct: Vec<&String> = ids.iter().filter(|id| seen.insert(id.as_str())).collect();

    let mut by_id: HashMap<String, Question> = HashMap::with_capacity(distinct.len());
    for chunk in distinct.chunks(LOOKUP_CHUNK) {
        let keys: Vec<&str> = chunk.iter().map(|id| id.as_str()).collect();
        let found = questions::table
            .filter(questions::id.eq_any(keys))
            .select(Question::as_select())
            .load(conn)?;
        by_id.extend(found.into_iter().map(|q| (q.get_id(), q)));
    }

    Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
}

/// Lists up to `limit` random active questions matching the filter
#[instrument(skip(pool))]
pub fn list_random_questions(pool: &DbPool, filter: &QuestionFilter, limit: usize) -> Result<Vec<Question>> {
    let conn = &mut pool.get()?;
    let found = select_random_questions(conn, filter, limit)?;
    debug!("Selected {} questions", found.len());
    Ok(found)
}

/// Name of the question's topic, if it has one
pub fn get_question_topic_name(pool: &DbPool, question: &Question) -> Result<Option<String>> {
    let Some(topic_id) = question.get_topic_id() else {
        return Ok(None);
    };
    let conn = &mut pool.get()?;
    let names = super::catalog_repo::topic_names(conn, &[topic_id.clone()])?;
    Ok(names.get(&topic_id).cloned())
}

#[cfg(test)]
mod tests;
