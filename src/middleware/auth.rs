//! JWT authentication extractor for Axum handlers.

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::UserRole;
use crate::services::{auth as auth_service, user as user_service};
use crate::AppState;

/// Authenticated user extracted from a JWT Bearer token.
///
/// With storage available the account is re-read so deactivated users are
/// turned away; without storage the token claims are trusted as issued.
/// ```ignore
/// async fn handler(current_user: CurrentUser) -> impl IntoResponse { ... }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: UserRole,
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::Unauthorized)?;

        let claims = auth_service::validate_token(bearer.token(), &state.config.jwt_secret)?;

        let user_id: Uuid = claims.user_id.parse().map_err(|_| AppError::InvalidToken)?;
        let role = UserRole::parse(&claims.role).ok_or(AppError::InvalidToken)?;

        if state.storage.is_available() {
            let user = user_service::find_user(&state.storage, user_id)
                .await?
                .filter(|u| u.is_active)
                .ok_or_else(|| AppError::Authentication("User not found or inactive".to_string()))?;
            return Ok(CurrentUser {
                id: user.id,
                name: user.display_name(),
                email: user.email,
                role: user.role,
            });
        }

        Ok(CurrentUser {
            id: user_id,
            email: claims.sub,
            name: claims.name,
            role,
        })
    }
}
