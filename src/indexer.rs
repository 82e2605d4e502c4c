//! Study material indexer
//!
//! Walks the materials folder and records every PDF it finds. The folder
//! layout carries the classification:
//!
//! ```text
//! materials/
//! ├── DIAN/            entity, matched by name
//! │   └── Gestor I/    profile of that entity, created when missing
//! │       └── estatuto.pdf
//! └── guia.pdf         no entity
//! ```
//!
//! Only file metadata is stored; PDF contents are never read.

use std::collections::{BTreeSet, HashMap};
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};
use tracing::{instrument, debug, info, warn};
use walkdir::WalkDir;

use crate::db::DbPool;
use crate::models::{Entity, Material};
use crate::repo;

/// Summary of one indexing run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexReport {
    /// `"success"`, or `"error"` when the folder is missing
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message: Option<String>,
    pub total_files: usize,
    pub indexed: usize,
    pub skipped: usize,
    pub errors: usize,
    /// Names of the entities that received materials, sorted
    pub entities: Vec<String>,
}

impl IndexReport {
    fn missing_root(root: &Path) -> Self {
        Self {
            status: "error".to_string(),
            message: Some(format!("Materials folder not found: {}", root.display())),
            total_files: 0,
            indexed: 0,
            skipped: 0,
            errors: 0,
            entities: Vec::new(),
        }
    }
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Folder names between the root and the file, outermost first
fn folder_parts(relative: &Path) -> Vec<String> {
    relative
        .parent()
        .map(|parent| {
            parent
                .components()
                .filter_map(|c| match c {
                    Component::Normal(name) => Some(name.to_string_lossy().to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Relative path with `/` separators on every platform
fn stored_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Indexes one file, returning the entity it was filed under
fn index_file(
    pool: &DbPool,
    path: &Path,
    relative: &Path,
    entity_cache: &mut HashMap<String, Option<Entity>>,
) -> anyhow::Result<Option<Entity>> {
    let parts = folder_parts(relative);

    let entity = match parts.first() {
        Some(folder) => {
            if !entity_cache.contains_key(folder) {
                let found = repo::find_entity_for_folder(pool, folder)?;
                entity_cache.insert(folder.clone(), found);
            }
            entity_cache.get(folder).cloned().flatten()
        }
        None => None,
    };

    let profile_id = match (&entity, parts.get(1)) {
        (Some(entity), Some(profile_name)) => {
            let description = Some(format!("Perfil {profile_name} creado automáticamente"));
            let (profile, _) = repo::get_or_create_profile(pool, &entity.get_id(), profile_name, description)?;
            Some(profile.get_id())
        }
        _ => None,
    };

    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let file_size = std::fs::metadata(path)?.len();

    repo::insert_material(
        pool,
        Material::new(
            entity.as_ref().map(|e| e.get_id()),
            profile_id,
            filename,
            stored_path(relative),
            i64::try_from(file_size).ok(),
        ),
    )?;
    Ok(entity)
}

/// Scans `root` and records every PDF not indexed yet
///
/// Files already recorded under the same relative path are skipped, so
/// running the indexer twice is harmless. A file that fails to index is
/// counted in `errors` and the scan carries on.
///
/// ### Errors
///
/// Returns an error only if looking up already-indexed paths fails
#[instrument(skip(pool), fields(root = %root.display()))]
pub fn index_materials(pool: &DbPool, root: &Path) -> anyhow::Result<IndexReport> {
    if !root.is_dir() {
        warn!("Materials folder not found");
        return Ok(IndexReport::missing_root(root));
    }

    let mut report = IndexReport {
        status: "success".to_string(),
        message: None,
        total_files: 0,
        indexed: 0,
        skipped: 0,
        errors: 0,
        entities: Vec::new(),
    };
    let mut entities = BTreeSet::new();
    let mut entity_cache = HashMap::new();

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Error walking materials folder: {}", e);
                report.errors += 1;
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file() || !is_pdf(path) {
            continue;
        }
        report.total_files += 1;

        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        if repo::get_material_by_path(pool, &stored_path(relative))?.is_some() {
            debug!("Already indexed: {}", relative.display());
            report.skipped += 1;
            continue;
        }

        match index_file(pool, path, relative, &mut entity_cache) {
            Ok(entity) => {
                if let Some(entity) = entity {
                    entities.insert(entity.get_name());
                }
                report.indexed += 1;
            }
            Err(e) => {
                warn!("Failed to index {}: {}", relative.display(), e);
                report.errors += 1;
            }
        }
    }

    report.entities = entities.into_iter().collect();
    info!(
        "Indexing finished: {} found, {} indexed, {} skipped, {} errors",
        report.total_files, report.indexed, report.skipped, report.errors
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{insert_entity, setup_test_db};
    use std::fs;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"%PDF-1.4 test").unwrap();
    }

    #[test]
    fn test_missing_root_reports_error() {
        let pool = setup_test_db();
        let report = index_materials(&pool, Path::new("/definitely/not/here")).unwrap();
        assert_eq!(report.status, "error");
        assert_eq!(report.indexed, 0);
        assert!(report.message.is_some());
    }

    #[test]
    fn test_indexes_entities_profiles_and_loose_files() {
        let pool = setup_test_db();
        let dian = insert_entity(&pool, "DIAN");
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "dian/Gestor I/estatuto.PDF");
        touch(dir.path(), "Otros/manual.pdf");
        touch(dir.path(), "guia.pdf");
        touch(dir.path(), "notas.txt");

        let report = index_materials(&pool, dir.path()).unwrap();

        assert_eq!(report.status, "success");
        assert_eq!(report.total_files, 3);
        assert_eq!(report.indexed, 3);
        assert_eq!(report.errors, 0);
        assert_eq!(report.entities, vec!["DIAN".to_string()]);

        let stored = repo::get_material_by_path(&pool, "dian/Gestor I/estatuto.PDF").unwrap().unwrap();
        assert_eq!(stored.get_entity_id(), Some(dian.get_id()));
        let profiles = repo::list_profiles(&pool, &dian.get_id()).unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(stored.get_profile_id(), Some(profiles[0].get_id()));

        let loose = repo::get_material_by_path(&pool, "Otros/manual.pdf").unwrap().unwrap();
        assert_eq!(loose.get_entity_id(), None);
    }

    #[test]
    fn test_second_run_skips_known_files() {
        let pool = setup_test_db();
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "guia.pdf");
        index_materials(&pool, dir.path()).unwrap();
        touch(dir.path(), "nueva.pdf");

        let report = index_materials(&pool, dir.path()).unwrap();

        assert_eq!(report.total_files, 2);
        assert_eq!(report.indexed, 1);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_folder_parts_and_stored_path() {
        let relative = Path::new("DIAN").join("Gestor I").join("doc.pdf");
        assert_eq!(folder_parts(&relative), vec!["DIAN".to_string(), "Gestor I".to_string()]);
        assert_eq!(stored_path(&relative), "DIAN/Gestor I/doc.pdf");
        assert!(folder_parts(Path::new("doc.pdf")).is_empty());
    }
}
