// Core moderation module - rule evaluation and the burst counter.
// Following the same pattern as the enforcement module.

pub mod moderation_models;
pub mod moderation_service;
pub mod spam_counter;

pub use moderation_models::*;
pub use moderation_service::*;
pub use spam_counter::*;
