// Matrix REST implementation of the core's moderation port.

pub mod matrix_client;
pub mod matrix_models;

pub use matrix_client::*;
pub use matrix_models::*;
