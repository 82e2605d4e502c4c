use crate::db::DbPool;
use crate::dto::AdminStatsDto;
use crate::schema::{answers, entities, materials, questions, study_sessions, users};
use anyhow::Result;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use tracing::{instrument, warn};

/// Platform-wide record counts for the admin dashboard
#[instrument(skip(pool))]
pub fn platform_stats(pool: &DbPool) -> Result<AdminStatsDto> {
    let conn = &mut pool.get()?;

    Ok(AdminStatsDto {
        total_users: users::table.count().get_result(conn)?,
        active_users: users::table
            .filter(users::is_active.eq(true))
            .count()
            .get_result(conn)?,
        total_questions: questions::table.count().get_result(conn)?,
        total_sessions: study_sessions::table.count().get_result(conn)?,
        total_answers: answers::table.count().get_result(conn)?,
        total_materials: materials::table.count().get_result(conn)?,
        entities: entities::table.count().get_result(conn)?,
    })
}

/// Checks that a pooled connection can run a trivial statement
pub fn database_is_healthy(pool: &DbPool) -> bool {
    let result = pool
        .get()
        .map_err(anyhow::Error::from)
        .and_then(|mut conn| conn.batch_execute("SELECT 1").map_err(anyhow::Error::from));

    match result {
        Ok(()) => true,
        Err(err) => {
            warn!("Database health check failed: {}", err);
            false
        }
    }
}
