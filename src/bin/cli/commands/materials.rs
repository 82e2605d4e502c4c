use std::path::Path;

use meritsim::db::DbPool;
use meritsim::indexer;

use crate::output::{self, OutputConfig};

/// Indexes the PDFs under `root`
///
/// A missing folder is reported like any other run but exits with an error.
pub fn index(pool: &DbPool, root: &Path, config: &OutputConfig) -> Result<(), Box<dyn std::error::Error>> {
    let report = indexer::index_materials(pool, root)?;
    output::print_index_report(&report, config);
    if report.status != "success" {
        return Err(report.message.unwrap_or_else(|| "indexing failed".to_string()).into());
    }
    Ok(())
}
