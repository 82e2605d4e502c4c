use meritsim::db::DbPool;
use meritsim::repo;

use crate::output::{self, OutputConfig};

/// Lists entities with the number of active questions each owns
pub fn entities(pool: &DbPool, config: &OutputConfig) -> Result<(), Box<dyn std::error::Error>> {
    let entities = repo::list_entities_with_counts(pool)?;
    output::print_entities(&entities, config);
    Ok(())
}
