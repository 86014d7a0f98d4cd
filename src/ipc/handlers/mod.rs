pub mod core;
pub mod draft;
pub mod rollcall;
pub mod sync;
