//! Admin review routes. Every handler requires the admin role.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::extract::WithRejection;
use chrono::Utc;

use crate::errors::{ApiResponse, AppError, FieldError};
use crate::middleware::rbac::RequireAdmin;
use crate::models::application::{
    Application, ApplicationDetail, ApplicationStatus, ApplicationSummary, NotesRequest,
    StatusUpdateRequest,
};
use crate::models::pagination::{PagedResult, Pagination};
use crate::models::user::UserResponse;
use crate::services::application::{self as store, ApplicationFilters};
use crate::services::lifecycle::{self, Reviewer};
use crate::services::stats::{self, ApplicationStats};
use crate::services::user::{self as user_service, UserFilters};
use crate::AppState;

/// GET /api/admin/applications: filtered, sorted, paginated list.
pub async fn list_applications(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    WithRejection(Query(pagination), _): WithRejection<Query<Pagination>, AppError>,
    WithRejection(Query(filters), _): WithRejection<Query<ApplicationFilters>, AppError>,
) -> Result<Json<ApiResponse<PagedResult<ApplicationSummary>>>, AppError> {
    let (query, sort) = filters.resolve()?;
    let result = store::query_applications(&state.storage, &query, &pagination, &sort).await?;
    Ok(ApiResponse::success(result))
}

/// GET /api/admin/applications/{id}: one application with its owning account.
pub async fn get_application(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ApplicationDetail>>, AppError> {
    let application = store::find_application(&state.storage, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Application not found".to_string()))?;
    let user = user_service::find_user(&state.storage, application.user_id)
        .await?
        .map(UserResponse::from);

    Ok(ApiResponse::success(ApplicationDetail { application, user }))
}

/// PUT /api/admin/applications/{id}/status: move to a new review status.
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
    WithRejection(Json(body), _): WithRejection<Json<StatusUpdateRequest>, AppError>,
) -> Result<Json<ApiResponse<Application>>, AppError> {
    let status = body
        .status
        .as_deref()
        .and_then(ApplicationStatus::parse)
        .ok_or_else(|| {
            AppError::InvalidInput(vec![FieldError {
                field: "status".to_string(),
                message: "Status must be one of: pending, review, background, approved, rejected"
                    .to_string(),
            }])
        })?;

    let reviewer = Reviewer {
        id: admin.id,
        name: admin.name,
    };
    let updated = lifecycle::set_status(
        &state.storage,
        state.crm.as_ref(),
        &id,
        status,
        &reviewer,
        body.notes.as_deref(),
    )
    .await?;

    Ok(ApiResponse::with_message(updated, "Application status updated"))
}

/// PUT /api/admin/applications/{id}/notes: append an admin note.
pub async fn add_notes(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
    WithRejection(Json(body), _): WithRejection<Json<NotesRequest>, AppError>,
) -> Result<Json<ApiResponse<Application>>, AppError> {
    let notes = body
        .notes
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| {
            AppError::InvalidInput(vec![FieldError {
                field: "notes".to_string(),
                message: "Notes are required".to_string(),
            }])
        })?;

    let updated = lifecycle::append_note(&state.storage, &id, admin.id, &admin.name, notes).await?;
    Ok(ApiResponse::with_message(updated, "Notes added"))
}

/// GET /api/admin/stats: dashboard counts.
pub async fn stats(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<ApiResponse<ApplicationStats>>, AppError> {
    let stats = stats::application_stats(&state.storage, Utc::now()).await?;
    Ok(ApiResponse::success(stats))
}

/// GET /api/admin/users: accounts filtered by role and search.
pub async fn list_users(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    WithRejection(Query(pagination), _): WithRejection<Query<Pagination>, AppError>,
    WithRejection(Query(filters), _): WithRejection<Query<UserFilters>, AppError>,
) -> Result<Json<ApiResponse<PagedResult<UserResponse>>>, AppError> {
    let result = user_service::list_users(&state.storage, &filters, &pagination).await?;
    Ok(ApiResponse::success(result))
}
