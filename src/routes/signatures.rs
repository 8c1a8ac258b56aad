//! Signed-document events forwarded to the CRM.

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::WithRejection;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::{ApiResponse, AppError};
use crate::models::form;
use crate::services::crm::SignatureEvent;
use crate::services::lifecycle;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignatureRequest {
    #[serde(default, deserialize_with = "form::opt_string")]
    #[validate(required(message = "Document ID is required"))]
    pub document_id: Option<String>,
    #[serde(default, deserialize_with = "form::opt_string")]
    #[validate(
        required(message = "Valid driver email is required"),
        email(message = "Valid driver email is required")
    )]
    pub driver_email: Option<String>,
    #[serde(default, deserialize_with = "form::opt_string")]
    #[validate(required(message = "Signature data is required"))]
    pub signature_data: Option<String>,
    #[serde(default, deserialize_with = "form::opt_string")]
    pub driver_name: Option<String>,
    #[serde(default, deserialize_with = "form::opt_string")]
    pub document_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureReceipt {
    pub confirmation_number: String,
    pub document_id: String,
    pub signed_at: String,
}

/// POST /api/signatures: record a signed document and forward it to the CRM.
pub async fn record(
    State(state): State<AppState>,
    WithRejection(Json(body), _): WithRejection<Json<SignatureRequest>, AppError>,
) -> Result<(StatusCode, Json<ApiResponse<SignatureReceipt>>), AppError> {
    body.validate()?;

    let now = Utc::now();
    let event = SignatureEvent {
        confirmation_number: lifecycle::generate_confirmation_number(
            &state.config.application_id_prefix,
            now,
        ),
        document_id: body.document_id.unwrap_or_default(),
        document_name: body.document_name,
        driver_email: body.driver_email.unwrap_or_default().to_lowercase(),
        driver_name: body.driver_name,
        signed_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
    };

    tracing::info!(
        confirmation_number = %event.confirmation_number,
        document_id = %event.document_id,
        "Document signature received"
    );

    if let Some(crm) = &state.crm {
        if let Err(e) = crm.deliver_signature(&event).await {
            tracing::warn!(
                confirmation_number = %event.confirmation_number,
                error = %e,
                "CRM signature delivery failed"
            );
        }
    }

    let receipt = SignatureReceipt {
        confirmation_number: event.confirmation_number,
        document_id: event.document_id,
        signed_at: event.signed_at,
    };
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message(receipt, "Signature recorded"),
    ))
}
