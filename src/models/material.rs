use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An indexed study document (PDF) found under the materials folder
#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::materials)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Material {
    /// Unique identifier for the material (UUID v4 as string)
    id: String,

    /// Entity inferred from the first folder level, if it matched one
    entity_id: Option<String>,

    /// Profile inferred from the second folder level
    profile_id: Option<String>,

    filename: String,

    /// Path relative to the materials root; unique
    filepath: String,

    title: Option<String>,

    description: Option<String>,

    /// Size on disk in bytes
    file_size: Option<i64>,

    page_count: Option<i32>,

    indexed_at: NaiveDateTime,
}

impl Material {
    /// Creates a material record for a file found by the indexer
    ///
    /// The title defaults to the file name without its extension.
    pub fn new(
        entity_id: Option<String>,
        profile_id: Option<String>,
        filename: String,
        filepath: String,
        file_size: Option<i64>,
    ) -> Self {
        let title = std::path::Path::new(&filename)
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string());
        Self {
            id: Uuid::new_v4().to_string(),
            entity_id,
            profile_id,
            filename,
            filepath,
            title,
            description: None,
            file_size,
            page_count: None,
            indexed_at: Utc::now().naive_utc(),
        }
    }

    pub fn get_id(&self) -> String {
        self.id.clone()
    }

    pub fn get_entity_id(&self) -> Option<String> {
        self.entity_id.clone()
    }

    pub fn get_profile_id(&self) -> Option<String> {
        self.profile_id.clone()
    }

    pub fn get_filename(&self) -> String {
        self.filename.clone()
    }

    pub fn get_filepath(&self) -> String {
        self.filepath.clone()
    }

    pub fn get_title(&self) -> Option<String> {
        self.title.clone()
    }

    pub fn get_file_size(&self) -> Option<i64> {
        self.file_size
    }

    pub fn get_indexed_at(&self) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(self.indexed_at, Utc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_defaults_to_file_stem() {
        let material = Material::new(
            None,
            None,
            "Estatuto Tributario.pdf".to_string(),
            "DIAN/Gestor I/Estatuto Tributario.pdf".to_string(),
            Some(1024),
        );

        assert_eq!(material.get_title(), Some("Estatuto Tributario".to_string()));
        assert_eq!(material.get_file_size(), Some(1024));
    }
}
