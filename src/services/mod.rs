//! Business logic services.

pub mod application;
pub mod auth;
pub mod crm;
pub mod lifecycle;
pub mod stats;
pub mod user;
