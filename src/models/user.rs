use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UserRole;
use crate::scoring::level_for_xp;

/// A learner or administrator account
#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct User {
    /// Unique identifier for the user (UUID v4 as string)
    id: String,

    /// Login email, unique across accounts
    email: String,

    /// Argon2 PHC string; never leaves the server
    #[serde(skip_serializing, default)]
    hashed_password: String,

    full_name: Option<String>,

    role: UserRole,

    is_active: bool,

    /// Cumulative experience points, never decreases
    xp_points: i32,

    /// Always `level_for_xp(xp_points)`
    level: i32,

    created_at: NaiveDateTime,

    updated_at: NaiveDateTime,
}

impl User {
    /// Creates a new active account with no experience
    ///
    /// ### Arguments
    ///
    /// * `email` - The login email
    /// * `hashed_password` - The already-hashed password
    /// * `full_name` - Optional display name
    /// * `role` - The account's access level
    pub fn new(email: String, hashed_password: String, full_name: Option<String>, role: UserRole) -> Self {
        let now = Utc::now().naive_utc();
        Self {
            id: Uuid::new_v4().to_string(),
            email,
            hashed_password,
            full_name,
            role,
            is_active: true,
            xp_points: 0,
            level: level_for_xp(0),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn get_id(&self) -> String {
        self.id.clone()
    }

    pub fn get_email(&self) -> String {
        self.email.clone()
    }

    pub fn get_hashed_password(&self) -> &str {
        &self.hashed_password
    }

    pub fn get_full_name(&self) -> Option<String> {
        self.full_name.clone()
    }

    pub fn get_role(&self) -> UserRole {
        self.role
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }

    pub fn get_xp_points(&self) -> i32 {
        self.xp_points
    }

    pub fn get_level(&self) -> i32 {
        self.level
    }

    pub fn get_created_at(&self) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(self.created_at, Utc)
    }

    pub fn get_updated_at(&self) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(self.updated_at, Utc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_starts_at_level_one() {
        let user = User::new("ana@example.com".to_string(), "hash".to_string(), None, UserRole::User);

        assert!(Uuid::parse_str(&user.get_id()).is_ok());
        assert_eq!(user.get_xp_points(), 0);
        assert_eq!(user.get_level(), 1);
        assert!(user.is_active());
        assert!(!user.is_admin());
    }

    #[test]
    fn test_password_hash_is_not_serialized() {
        let user = User::new("ana@example.com".to_string(), "secret-hash".to_string(), None, UserRole::Admin);
        let json = serde_json::to_value(&user).unwrap();

        assert!(json.get("hashed_password").is_none());
        assert_eq!(json["role"], "ADMIN");
        assert_eq!(json["level"], 1);
    }
}
