mod handler;
mod model;

pub use handler::{list_unresolved, resolve_alert};
