use crate::db::DbPool;
use crate::models::User;
use crate::schema::users;
use diesel::prelude::*;
use anyhow::Result;
use tracing::{instrument, debug, info};

/// Lower-cases and trims an email so lookups are case-insensitive
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Inserts a new user account
///
/// ### Arguments
///
/// * `pool` - A reference to the database connection pool
/// * `user` - The account to store; its email should already be normalized
///
/// ### Returns
///
/// A Result containing the stored user
///
/// ### Errors
///
/// Returns an error if:
/// - Unable to get a connection from the pool
/// - The email is already registered (unique constraint)
#[instrument(skip(pool, user), fields(email = %user.get_email()))]
pub fn create_user(pool: &DbPool, user: User) -> Result<User> {
    let conn = &mut pool.get()?;

    diesel::insert_into(users::table)
        .values(&user)
        .execute(conn)?;

    info!("Created user with id: {}", user.get_id());
    Ok(user)
}

/// Retrieves a user by id
#[instrument(skip(pool))]
pub fn get_user(pool: &DbPool, id: &str) -> Result<Option<User>> {
    debug!("Retrieving user");
    let conn = &mut pool.get()?;

    let user = users::table
        .find(id)
        .select(User::as_select())
        .first(conn)
        .optional()?;

    Ok(user)
}

/// Retrieves a user by email, ignoring case and surrounding whitespace
#[instrument(skip(pool))]
pub fn get_user_by_email(pool: &DbPool, email: &str) -> Result<Option<User>> {
    let conn = &mut pool.get()?;

    let user = users::table
        .filter(users::email.eq(normalize_email(email)))
        .select(User::as_select())
        .first(conn)
        .optional()?;

    Ok(user)
}

/// Activates or deactivates an account
///
/// ### Returns
///
/// `true` if a user with that id existed
#[instrument(skip(pool))]
pub fn set_user_active(pool: &DbPool, id: &str, active: bool) -> Result<bool> {
    let conn = &mut pool.get()?;

    let updated = diesel::update(users::table.find(id))
        .set((
            users::is_active.eq(active),
            users::updated_at.eq(chrono::Utc::now().naive_utc()),
        ))
        .execute(conn)?;

    info!("Set active={} for user {}", active, id);
    Ok(updated > 0)
}

/// Adds earned XP to a user and recomputes the level, on an open connection
///
/// The increment happens in SQL so concurrent writers cannot lose updates.
/// Must run inside the caller's transaction.
///
/// ### Returns
///
/// The user's new `(xp_points, level)`
pub(crate) fn award_xp(conn: &mut SqliteConnection, user_id: &str, earned: i32) -> QueryResult<(i32, i32)> {
    let earned = earned.max(0);
    let now = chrono::Utc::now().naive_utc();

    diesel::update(users::table.find(user_id))
        .set((
            users::xp_points.eq(users::xp_points + earned),
            users::updated_at.eq(now),
        ))
        .execute(conn)?;

    let xp: i32 = users::table.find(user_id).select(users::xp_points).first(conn)?;
    let level = crate::scoring::level_for_xp(xp);

    diesel::update(users::table.find(user_id))
        .set(users::level.eq(level))
        .execute(conn)?;

    Ok((xp, level))
}
