/// Web API Handlers
///
/// This module contains the handlers for the HTTP API endpoints.
/// Each handler extracts the request data, checks it, calls the
/// repository or the explanation provider, and returns JSON.

mod auth_handlers;
mod catalog_handlers;
mod study_handlers;
mod explain_handlers;
mod progress_handlers;
mod material_handlers;
mod admin_handlers;

// Re-export all handlers
pub use auth_handlers::*;
pub use catalog_handlers::*;
pub use study_handlers::*;
pub use explain_handlers::*;
pub use progress_handlers::*;
pub use material_handlers::*;
pub use admin_handlers::*;
