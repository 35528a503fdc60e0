//! Core business logic for social-rs.

pub mod services;

pub use services::*;
