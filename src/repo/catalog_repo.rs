use std::collections::HashMap;

use crate::db::DbPool;
use crate::models::{Entity, Profile, Topic};
use crate::schema::{entities, profiles, questions, topics};
use diesel::prelude::*;
use anyhow::Result;
use tracing::{instrument, debug, info};

/// Inserts a new entity
#[instrument(skip(pool, entity), fields(name = %entity.get_name()))]
pub fn create_entity(pool: &DbPool, entity: Entity) -> Result<Entity> {
    let conn = &mut pool.get()?;

    diesel::insert_into(entities::table)
        .values(&entity)
        .execute(conn)?;

    info!("Created entity with id: {}", entity.get_id());
    Ok(entity)
}

/// Retrieves an entity by id
#[instrument(skip(pool))]
pub fn get_entity(pool: &DbPool, id: &str) -> Result<Option<Entity>> {
    let conn = &mut pool.get()?;
    let entity = entities::table
        .find(id)
        .select(Entity::as_select())
        .first(conn)
        .optional()?;
    Ok(entity)
}

/// Retrieves an entity by its exact name
#[instrument(skip(pool))]
pub fn get_entity_by_name(pool: &DbPool, name: &str) -> Result<Option<Entity>> {
    let conn = &mut pool.get()?;
    let entity = entities::table
        .filter(entities::name.eq(name))
        .select(Entity::as_select())
        .first(conn)
        .optional()?;
    Ok(entity)
}

/// Lists all entities ordered by name
pub fn list_entities(pool: &DbPool) -> Result<Vec<Entity>> {
    let conn = &mut pool.get()?;
    let all = entities::table
        .order(entities::name.asc())
        .select(Entity::as_select())
        .load(conn)?;
    Ok(all)
}

/// Finds the entity whose name contains a folder name, ignoring case
///
/// Used by the material indexer to map `DIAN/` or `dian/` onto the DIAN
/// entity. The first match in name order wins.
#[instrument(skip(pool))]
pub fn find_entity_for_folder(pool: &DbPool, folder: &str) -> Result<Option<Entity>> {
    let needle = folder.trim().to_lowercase();
    if needle.is_empty() {
        return Ok(None);
    }

    let found = list_entities(pool)?
        .into_iter()
        .find(|entity| entity.get_name().to_lowercase().contains(&needle));

    debug!("Folder {:?} matched entity {:?}", folder, found.as_ref().map(|e| e.get_name()));
    Ok(found)
}

/// Tallies non-null ids
fn count_ids(ids: Vec<Option<String>>) -> HashMap<String, i64> {
    let mut counts = HashMap::new();
    for id in ids.into_iter().flatten() {
        *counts.entry(id).or_insert(0) += 1;
    }
    counts
}

/// Lists all entities with the number of active questions each owns
#[instrument(skip(pool))]
pub fn list_entities_with_counts(pool: &DbPool) -> Result<Vec<(Entity, i64)>> {
    let all = list_entities(pool)?;
    let conn = &mut pool.get()?;
    let entity_ids: Vec<Option<String>> = questions::table
        .filter(questions::is_active.eq(true))
        .select(questions::entity_id)
        .load(conn)?;
    let counts = count_ids(entity_ids);

    Ok(all
        .into_iter()
        .map(|entity| {
            let count = counts.get(&entity.get_id()).copied().unwrap_or(0);
            (entity, count)
        })
        .collect())
}

/// Lists the profiles of one entity ordered by name
#[instrument(skip(pool))]
pub fn list_profiles(pool: &DbPool, entity_id: &str) -> Result<Vec<Profile>> {
    let conn = &mut pool.get()?;
    let found = profiles::table
        .filter(profiles::entity_id.eq(entity_id))
        .order(profiles::name.asc())
        .select(Profile::as_select())
        .load(conn)?;
    Ok(found)
}

/// Retrieves a profile by id
pub fn get_profile(pool: &DbPool, id: &str) -> Result<Option<Profile>> {
    let conn = &mut pool.get()?;
    let profile = profiles::table
        .find(id)
        .select(Profile::as_select())
        .first(conn)
        .optional()?;
    Ok(profile)
}

/// Returns the named profile of an entity, creating it when missing
///
/// ### Returns
///
/// The profile and whether it was created by this call
#[instrument(skip(pool, description))]
pub fn get_or_create_profile(
    pool: &DbPool,
    entity_id: &str,
    name: &str,
    description: Option<String>,
) -> Result<(Profile, bool)> {
    let conn = &mut pool.get()?;

    conn.immediate_transaction::<_, anyhow::Error, _>(|conn| {
        let existing = profiles::table
            .filter(profiles::entity_id.eq(entity_id))
            .filter(profiles::name.eq(name))
            .select(Profile::as_select())
            .first(conn)
            .optional()?;

        if let Some(profile) = existing {
            return Ok((profile, false));
        }

        let profile = Profile::new(entity_id.to_string(), name.to_string(), description);
        diesel::insert_into(profiles::table)
            .values(&profile)
            .execute(conn)?;

        info!("Created profile {} for entity {}", name, entity_id);
        Ok((profile, true))
    })
}

/// Inserts a new topic
#[instrument(skip(pool, topic), fields(name = %topic.get_name()))]
pub fn create_topic(pool: &DbPool, topic: Topic) -> Result<Topic> {
    let conn = &mut pool.get()?;

    diesel::insert_into(topics::table)
        .values(&topic)
        .execute(conn)?;

    info!("Created topic with id: {}", topic.get_id());
    Ok(topic)
}

/// Retrieves a topic by id
pub fn get_topic(pool: &DbPool, id: &str) -> Result<Option<Topic>> {
    let conn = &mut pool.get()?;
    let topic = topics::table
        .find(id)
        .select(Topic::as_select())
        .first(conn)
        .optional()?;
    Ok(topic)
}

/// Retrieves a topic by its exact name
pub fn get_topic_by_name(pool: &DbPool, name: &str) -> Result<Option<Topic>> {
    let conn = &mut pool.get()?;
    let topic = topics::table
        .filter(topics::name.eq(name))
        .select(Topic::as_select())
        .first(conn)
        .optional()?;
    Ok(topic)
}

/// Lists all topics ordered by name with their active question counts
#[instrument(skip(pool))]
pub fn list_topics_with_counts(pool: &DbPool) -> Result<Vec<(Topic, i64)>> {
    let conn = &mut pool.get()?;

    let all = topics::table
        .order(topics::name.asc())
        .select(Topic::as_select())
        .load(conn)?;
    let topic_ids: Vec<Option<String>> = questions::table
        .filter(questions::is_active.eq(true))
        .select(questions::topic_id)
        .load(conn)?;
    let counts = count_ids(topic_ids);

    Ok(all
        .into_iter()
        .map(|topic| {
            let count = counts.get(&topic.get_id()).copied().unwrap_or(0);
            (topic, count)
        })
        .collect())
}

/// Maps topic ids to names for the given ids
pub(crate) fn topic_names(conn: &mut SqliteConnection, ids: &[String]) -> QueryResult<HashMap<String, String>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(String, String)> = topics::table
        .filter(topics::id.eq_any(ids))
        .select((topics::id, topics::name))
        .load(conn)?;
    Ok(rows.into_iter().collect())
}
