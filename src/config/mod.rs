use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Absent means the service starts in webhook-only mode.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_expiry_secs: i64,
    pub frontend_url: String,
    pub environment: String,
    pub application_id_prefix: String,
    pub crm: CrmConfig,
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,
}

/// Settings for the CRM adapter.
#[derive(Debug, Clone)]
pub struct CrmConfig {
    /// `None` disables delivery entirely.
    pub webhook_url: Option<String>,
    pub api_base: String,
    pub api_key: Option<String>,
    /// Sub-account the contact lookup searches in.
    pub location_id: Option<String>,
    pub api_version: String,
    pub timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Self {
            database_url: non_empty_var("DATABASE_URL"),
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            host: env::var("BACKEND_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("BACKEND_PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .unwrap_or(5000),
            jwt_secret: env::var("JWT_SECRET")?,
            jwt_expiry_secs: env::var("JWT_EXPIRY_SECS")
                .unwrap_or_else(|_| "604800".to_string())
                .parse()
                .unwrap_or(604800),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            environment: env::var("APP_ENV").unwrap_or_else(|_| "production".to_string()),
            application_id_prefix: non_empty_var("APPLICATION_ID_PREFIX")
                .unwrap_or_else(|| "JRML".to_string()),
            crm: CrmConfig::from_env(),
            tls_cert_path: non_empty_var("TLS_CERT_PATH"),
            tls_key_path: non_empty_var("TLS_KEY_PATH"),
        })
    }

    /// Whether error details may be exposed in 500 responses.
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }
}

impl CrmConfig {
    pub fn from_env() -> Self {
        Self {
            webhook_url: non_empty_var("CRM_WEBHOOK_URL"),
            api_base: env::var("CRM_API_BASE")
                .unwrap_or_else(|_| "https://services.leadconnectorhq.com".to_string()),
            api_key: non_empty_var("CRM_API_KEY"),
            location_id: non_empty_var("CRM_LOCATION_ID"),
            api_version: env::var("CRM_API_VERSION").unwrap_or_else(|_| "2021-07-28".to_string()),
            timeout_secs: env::var("CRM_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
        }
    }
}

/// Read a variable, treating blank values as unset.
fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
