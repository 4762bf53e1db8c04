// Discord layer - the bridged-network client and its ban worker.

#[path = "ban_worker.rs"]
pub mod ban_worker;

pub use ban_worker::run_bridge_client;
