//! User accounts owning driver applications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Driver,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Driver => "driver",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(UserRole::Admin),
            "driver" => Some(UserRole::Driver),
            _ => None,
        }
    }
}

/// Full user row from database (includes password_hash, never serialize to API).
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// User response DTO, excludes password_hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            first_name: u.first_name,
            last_name: u.last_name,
            phone: u.phone,
            role: u.role,
            is_active: u.is_active,
            last_login_at: u.last_login_at,
            created_at: u.created_at,
        }
    }
}

/// Attributes for an account created implicitly on first submission.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: Uuid::nil(),
            email: "driver@test.com".to_string(),
            password_hash: "secret_hash".to_string(),
            first_name: "Dana".to_string(),
            last_name: "Smith".to_string(),
            phone: None,
            role: UserRole::Driver,
            is_active: true,
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn user_role_serialization() {
        let json = serde_json::to_string(&UserRole::Admin).unwrap();
        assert_eq!(json, "\"admin\"");
        assert_eq!(UserRole::parse("driver"), Some(UserRole::Driver));
        assert_eq!(UserRole::parse("root"), None);
    }

    #[test]
    fn user_response_excludes_password() {
        let response: UserResponse = sample_user().into();
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("password"));
        assert!(!json.contains("hash"));
        assert!(json.contains("\"firstName\":\"Dana\""));
    }

    #[test]
    fn display_name_joins_names() {
        assert_eq!(sample_user().display_name(), "Dana Smith");
    }
}
