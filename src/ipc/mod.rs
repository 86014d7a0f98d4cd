mod error;
mod handlers;
mod router;
mod types;

pub use handlers::draft::{persist_due_draft, persist_staged_draft};
pub use router::handle_request;
pub use types::{AppState, Request};
