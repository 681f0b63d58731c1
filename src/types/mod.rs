//! Shared types: pipeline records and HTTP request/response bodies.

pub mod api;
pub mod interaction;

pub use api::*;
pub use interaction::*;
