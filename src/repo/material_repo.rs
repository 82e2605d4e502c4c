use std::collections::{HashMap, HashSet};

use crate::db::DbPool;
use crate::dto::MaterialDto;
use crate::models::Material;
use crate::schema::{answers, entities, materials, profiles, questions};
use anyhow::Result;
use diesel::prelude::*;
use tracing::{instrument, debug, info};

/// Reason attached to suggestions derived from the learner's mistakes
pub const WEAK_AREA_REASON: &str = "Bajo rendimiento en esta área";

/// How many recent wrong answers feed the suggestions
const RECENT_MISTAKES: i64 = 20;

/// Inserts a material found by the indexer
#[instrument(skip(pool, material), fields(filepath = %material.get_filepath()))]
pub fn insert_material(pool: &DbPool, material: Material) -> Result<Material> {
    let conn = &mut pool.get()?;

    diesel::insert_into(materials::table)
        .values(&material)
        .execute(conn)?;

    info!("Indexed material with id: {}", material.get_id());
    Ok(material)
}

/// Retrieves a material by its path relative to the materials root
pub fn get_material_by_path(pool: &DbPool, filepath: &str) -> Result<Option<Material>> {
    let conn = &mut pool.get()?;
    let material = materials::table
        .filter(materials::filepath.eq(filepath))
        .select(Material::as_select())
        .first(conn)
        .optional()?;
    Ok(material)
}

/// Resolves entity and profile names for a batch of materials
fn with_names(conn: &mut SqliteConnection, found: Vec<Material>) -> QueryResult<Vec<MaterialDto>> {
    let entity_names: HashMap<String, String> = entities::table
        .select((entities::id, entities::name))
        .load::<(String, String)>(conn)?
        .into_iter()
        .collect();
    let profile_names: HashMap<String, String> = profiles::table
        .select((profiles::id, profiles::name))
        .load::<(String, String)>(conn)?
        .into_iter()
        .collect();

    Ok(found
        .iter()
        .map(|material| {
            let entity = material.get_entity_id().and_then(|id| entity_names.get(&id).cloned());
            let profile = material.get_profile_id().and_then(|id| profile_names.get(&id).cloned());
            MaterialDto::new(material, entity, profile)
        })
        .collect())
}

/// Lists indexed materials ordered by path, optionally for one entity
#[instrument(skip(pool))]
pub fn list_materials(pool: &DbPool, entity_id: Option<&str>) -> Result<Vec<MaterialDto>> {
    let conn = &mut pool.get()?;

    let mut query = materials::table.into_boxed();
    if let Some(entity_id) = entity_id {
        query = query.filter(materials::entity_id.eq(entity_id));
    }
    let found = query
        .order(materials::filepath.asc())
        .select(Material::as_select())
        .load(conn)?;

    debug!("Found {} materials", found.len());
    Ok(with_names(conn, found)?)
}

/// Suggests materials from the entities a learner recently struggled with
///
/// Looks at the learner's most recent wrong answers and returns materials
/// of the entities those questions belong to, tagged with a reason. With
/// no usable mistakes it falls back to any materials, without a reason.
///
/// ### Arguments
///
/// * `pool` - The database connection pool
/// * `user_id` - The learner
/// * `limit` - Maximum number of suggestions
#[instrument(skip(pool))]
pub fn suggest_materials(pool: &DbPool, user_id: &str, limit: i64) -> Result<Vec<MaterialDto>> {
    let conn = &mut pool.get()?;

    let weak_entities: HashSet<String> = answers::table
        .inner_join(questions::table)
        .filter(answers::user_id.eq(user_id))
        .filter(answers::is_correct.eq(false))
        .order(answers::answered_at.desc())
        .limit(RECENT_MISTAKES)
        .select(questions::entity_id)
        .load::<Option<String>>(conn)?
        .into_iter()
        .flatten()
        .collect();

    if weak_entities.is_empty() {
        debug!("No recent mistakes, suggesting any materials");
        let found = materials::table
            .order(materials::indexed_at.desc())
            .limit(limit)
            .select(Material::as_select())
            .load(conn)?;
        return Ok(with_names(conn, found)?);
    }

    let entity_ids: Vec<String> = weak_entities.into_iter().collect();
    let found = materials::table
        .filter(materials::entity_id.eq_any(&entity_ids))
        .order(materials::indexed_at.desc())
        .limit(limit)
        .select(Material::as_select())
        .load(conn)?;

    debug!("Suggesting {} materials from {} weak entities", found.len(), entity_ids.len());
    Ok(with_names(conn, found)?
        .into_iter()
        .map(|mut dto| {
            dto.reason = Some(WEAK_AREA_REASON.to_string());
            dto
        })
        .collect())
}
