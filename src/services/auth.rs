//! Authentication service: password hashing, JWT issue/validation, and login.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::db::Storage;
use crate::errors::AppError;
use crate::models::user::{User, UserResponse};

/// JWT claims embedded in access tokens.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Account email.
    pub sub: String,
    pub user_id: String,
    pub role: String,
    pub name: String,
    pub exp: i64,
    pub iat: i64,
}

/// Token returned on successful login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserResponse,
}

/// Hash a plaintext password with argon2id.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {e}")))
}

/// Verify a plaintext password against a stored hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Issue a signed access token for `user`.
pub fn generate_token(user: &User, jwt_secret: &str, expiry_secs: i64) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.email.clone(),
        user_id: user.id.to_string(),
        role: user.role.as_str().to_string(),
        name: user.display_name(),
        exp: (now + Duration::seconds(expiry_secs)).timestamp(),
        iat: now.timestamp(),
    };

    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token generation failed: {e}")))
}

/// Validate a JWT. Expiry maps to 401, any other defect to 403.
pub fn validate_token(token: &str, jwt_secret: &str) -> Result<Claims, AppError> {
    let decoding_key = DecodingKey::from_secret(jwt_secret.as_bytes());

    jsonwebtoken::decode::<Claims>(token, &decoding_key, &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AppError::TokenExpired,
            _ => AppError::InvalidToken,
        })
}

/// Authenticate by email and password.
pub async fn login(
    storage: &Storage,
    email: &str,
    password: &str,
    jwt_secret: &str,
    expiry_secs: i64,
) -> Result<LoginResponse, AppError> {
    let Some(pool) = storage.pool() else {
        return Err(AppError::Internal(
            "Login unavailable without a database".to_string(),
        ));
    };

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email.trim().to_lowercase())
        .fetch_optional(pool)
        .await?
        .ok_or_else(invalid_credentials)?;

    if !user.is_active || !verify_password(password, &user.password_hash)? {
        tracing::info!(user_id = %user.id, "Rejected login");
        return Err(invalid_credentials());
    }

    let user = sqlx::query_as::<_, User>(
        "UPDATE users SET last_login_at = NOW(), updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(user.id)
    .fetch_one(pool)
    .await?;

    let token = generate_token(&user, jwt_secret, expiry_secs)?;
    Ok(LoginResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_in: expiry_secs,
        user: user.into(),
    })
}

fn invalid_credentials() -> AppError {
    AppError::Authentication("Invalid email or password".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::UserRole;
    use uuid::Uuid;

    fn sample_user(role: UserRole) -> User {
        User {
            id: Uuid::new_v4(),
            email: "pat@example.com".to_string(),
            password_hash: "hash".to_string(),
            first_name: "Pat".to_string(),
            last_name: "Admin".to_string(),
            phone: None,
            role,
            is_active: true,
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn password_hash_and_verify() {
        let password = "SecurePassword123!";
        let hash = hash_password(password).unwrap();
        assert_ne!(hash, password);
        assert!(verify_password(password, &hash).unwrap());
        assert!(!verify_password("WrongPassword", &hash).unwrap());
    }

    #[test]
    fn token_generation_and_validation() {
        let user = sample_user(UserRole::Admin);
        let secret = "test-secret-key-for-jwt";
        let token = generate_token(&user, secret, 900).unwrap();

        let claims = validate_token(&token, secret).unwrap();
        assert_eq!(claims.sub, "pat@example.com");
        assert_eq!(claims.role, "admin");
        assert_eq!(claims.name, "Pat Admin");
        assert_eq!(claims.user_id, user.id.to_string());
    }

    #[test]
    fn garbage_token_is_invalid() {
        let err = validate_token("garbage.token.here", "secret").unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let token = generate_token(&sample_user(UserRole::Driver), "one", 900).unwrap();
        let err = validate_token(&token, "two").unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));
    }

    #[test]
    fn expired_token_is_reported() {
        // Expired well beyond the default 60s leeway
        let token = generate_token(&sample_user(UserRole::Driver), "secret", -3600).unwrap();
        let err = validate_token(&token, "secret").unwrap_err();
        assert!(matches!(err, AppError::TokenExpired));
    }
}
