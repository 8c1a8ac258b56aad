//! Database models and DTOs for all domain entities.

pub mod application;
pub mod form;
pub mod pagination;
pub mod user;
