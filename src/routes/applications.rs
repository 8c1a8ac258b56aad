//! Public application routes: submission and status lookup.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use crate::errors::{ApiResponse, AppError};
use crate::models::application::{ApplicationStatus, NewApplication, SubmitApplication};
use crate::models::user::NewUser;
use crate::services::application::{self as store, ApplicationPatch};
use crate::services::lifecycle;
use crate::AppState;

/// Who submitted; `id` is absent when the account was not stored.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Applicant {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub application_id: String,
    pub status: ApplicationStatus,
    pub submitted_at: DateTime<Utc>,
    pub user: Applicant,
    pub is_new_user: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusLookup {
    pub application_id: String,
    pub status: ApplicationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// POST /api/applications: submit a driver application.
///
/// The CRM delivery and the store write are both best-effort: only validation
/// failures and a missing password for a new account reach the caller.
pub async fn submit(
    State(state): State<AppState>,
    WithRejection(Json(body), _): WithRejection<Json<SubmitApplication>, AppError>,
) -> Result<(StatusCode, Json<ApiResponse<SubmissionReceipt>>), AppError> {
    body.validate()?;

    let submitted_at = Utc::now();
    let application_id = lifecycle::allocate_application_id(
        &state.storage,
        &state.config.application_id_prefix,
        submitted_at,
    )
    .await;
    let (application, password) = body.into_new_application(application_id, submitted_at)?;

    tracing::info!(
        application_id = %application.application_id,
        position = application.position.code(),
        "Application received"
    );

    let delivered = deliver_to_crm(&state, &application).await;

    let mut applicant = Applicant {
        id: None,
        email: application.email.clone(),
        first_name: application.first_name.clone(),
        last_name: application.last_name.clone(),
    };
    let mut is_new_user = true;

    let new_user = NewUser {
        email: application.email.clone(),
        password,
        first_name: application.first_name.clone(),
        last_name: application.last_name.clone(),
        phone: Some(application.phone.clone()),
    };

    match store::find_or_create_user(&state.storage, &new_user).await {
        Ok(Some((user, created))) => {
            is_new_user = created;
            applicant = Applicant {
                id: Some(user.id),
                email: user.email.clone(),
                first_name: user.first_name.clone(),
                last_name: user.last_name.clone(),
            };
            persist(&state, &application, user.id, delivered).await;
        }
        Ok(None) => {}
        Err(e @ AppError::Validation(_)) => return Err(e),
        Err(e) => {
            tracing::error!(
                application_id = %application.application_id,
                error = %e,
                "Failed to store applicant account"
            );
        }
    }

    let receipt = SubmissionReceipt {
        application_id: application.application_id,
        status: application.status,
        submitted_at: application.submitted_at,
        user: applicant,
        is_new_user,
    };

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message(receipt, "Application submitted successfully"),
    ))
}

/// Returns whether the CRM accepted the application.
async fn deliver_to_crm(state: &AppState, application: &NewApplication) -> bool {
    let Some(crm) = &state.crm else {
        return false;
    };

    match crm.deliver(application).await {
        Ok(receipt) => receipt.is_delivered(),
        Err(e) => {
            tracing::warn!(
                application_id = %application.application_id,
                error = %e,
                "CRM delivery failed"
            );
            false
        }
    }
}

async fn persist(state: &AppState, application: &NewApplication, user_id: Uuid, delivered: bool) {
    let stored = match store::create_application(&state.storage, application, user_id).await {
        Ok(Some(stored)) => stored,
        Ok(None) => return,
        Err(e) => {
            tracing::error!(
                application_id = %application.application_id,
                error = %e,
                "Failed to store application"
            );
            return;
        }
    };

    if delivered {
        let patch = ApplicationPatch {
            crm_synced_at: Some(Utc::now()),
            ..Default::default()
        };
        if let Err(e) = store::update_application(&state.storage, stored.id, &patch).await {
            tracing::warn!(
                application_id = %stored.application_id,
                error = %e,
                "Failed to record CRM sync time"
            );
        }
    }
}

/// GET /api/applications/status/{id}: best-effort status by readable id.
///
/// Never 404s: unknown ids and storage outages yield a synthesized pending status.
pub async fn status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<ApiResponse<StatusLookup>> {
    match store::find_application(&state.storage, &id).await {
        Ok(Some(application)) => {
            return ApiResponse::success(StatusLookup {
                application_id: application.application_id,
                status: application.status,
                submitted_at: Some(application.submitted_at),
                message: None,
            });
        }
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(application_id = %id, error = %e, "Status lookup failed");
        }
    }

    ApiResponse::success(StatusLookup {
        application_id: id,
        status: ApplicationStatus::Pending,
        submitted_at: None,
        message: Some("Application received and awaiting review".to_string()),
    })
}
