use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Subject-matter grouping used for progression gating
#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::topics)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Topic {
    id: String,
    name: String,
    description: Option<String>,
    /// Optional parent topic; informational only, the adventure map ignores it
    parent_id: Option<String>,
}

impl Topic {
    pub fn new(name: String, description: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            description,
            parent_id: None,
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

    pub fn get_parent_id(&self) -> Option<String> {
        self.parent_id.clone()
    }

    pub fn set_parent_id(&mut self, parent_id: Option<String>) {
        self.parent_id = parent_id;
    }
}
