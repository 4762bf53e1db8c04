// Core enforcement module - the cross-platform pipeline and the bridge
// worker that serves its queue.

pub mod bridge_worker;
pub mod enforcement_service;

pub use bridge_worker::*;
pub use enforcement_service::*;
