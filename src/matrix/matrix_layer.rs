// Matrix layer - the event loop and its dispatch into the core.

#[path = "sync_listener.rs"]
pub mod sync_listener;

pub use sync_listener::MatrixListener;
