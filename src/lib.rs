pub mod config;
pub mod db;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use db::Storage;
use services::crm::CrmClient;

/// Shared application state passed to all Axum handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub storage: Storage,
    /// `None` when no CRM endpoint or key is configured.
    pub crm: Option<CrmClient>,
    pub config: config::AppConfig,
}
