/// Repository module
///
/// This module provides the data access layer for the application.
/// Every function takes the connection pool explicitly; plain lookups
/// return `anyhow::Result`, while the session ledger reports `StudyError`
/// so callers can tell a missing session from a finished one.

mod user_repo;
mod catalog_repo;
mod question_repo;
mod session_repo;
mod progress_repo;
mod material_repo;
mod stats_repo;

// Re-export all repository functions
pub use user_repo::*;
pub use catalog_repo::*;
pub use question_repo::*;
pub use session_repo::*;
pub use progress_repo::*;
pub use material_repo::*;
pub use stats_repo::*;
