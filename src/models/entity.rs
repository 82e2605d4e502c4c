use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A government body whose entrance exam questions target (DIAN, CAR, ...)
#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::entities)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Entity {
    /// Unique identifier for the entity (UUID v4 as string)
    id: String,

    /// Short name, unique (e.g. "DIAN")
    name: String,

    description: Option<String>,

    /// Material icon name used by the frontend
    icon: Option<String>,

    /// Hex color used by the frontend
    color: Option<String>,

    created_at: NaiveDateTime,
}

impl Entity {
    /// Creates a new entity
    ///
    /// ### Arguments
    ///
    /// * `name` - The unique short name
    /// * `description` - Optional long description
    /// * `icon` - Optional icon name
    /// * `color` - Optional hex color
    pub fn new(name: String, description: Option<String>, icon: Option<String>, color: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            description,
            icon,
            color,
            created_at: Utc::now().naive_utc(),
        }
    }

    pub fn get_id(&self) -> String {
        self.id.clone()
    }

    pub fn get_name(&self) -> String {
        self.name.clone()
    }

    pub fn get_description(&self) -> Option<String> {
        self.description.clone()
    }

    pub fn get_icon(&self) -> Option<String> {
        self.icon.clone()
    }

    pub fn get_color(&self) -> Option<String> {
        self.color.clone()
    }

    pub fn get_created_at(&self) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(self.created_at, Utc)
    }
}
