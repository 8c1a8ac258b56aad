//! Authentication routes: login and profile.

use axum::{extract::State, Json};
use axum_extra::extract::WithRejection;
use serde::Deserialize;

use crate::errors::{ApiResponse, AppError};
use crate::middleware::auth::CurrentUser;
use crate::models::user::UserResponse;
use crate::services::auth::{self as auth_service, LoginResponse};
use crate::services::user as user_service;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(body), _): WithRejection<Json<LoginRequest>, AppError>,
) -> Result<Json<ApiResponse<LoginResponse>>, AppError> {
    let response = auth_service::login(
        &state.storage,
        &body.email,
        &body.password,
        &state.config.jwt_secret,
        state.config.jwt_expiry_secs,
    )
    .await?;

    Ok(ApiResponse::success(response))
}

/// GET /api/auth/me: current user profile
pub async fn me(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> Result<Json<ApiResponse<UserResponse>>, AppError> {
    let user = user_service::find_user(&state.storage, current_user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(ApiResponse::success(UserResponse::from(user)))
}
