//! Driver application model: review status, position, and the form payload.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::errors::AppError;
use crate::models::form;
use crate::models::user::UserResponse;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "application_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Review,
    Background,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 5] = [
        ApplicationStatus::Pending,
        ApplicationStatus::Review,
        ApplicationStatus::Background,
        ApplicationStatus::Approved,
        ApplicationStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Review => "review",
            ApplicationStatus::Background => "background",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }
}

/// Applicant category. Immutable once the application is stored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "driver_position")]
pub enum Position {
    #[serde(rename = "OO")]
    #[sqlx(rename = "OO")]
    OwnerOperator,
    #[serde(rename = "LO")]
    #[sqlx(rename = "LO")]
    LeaseOperator,
}

impl Position {
    pub fn code(&self) -> &'static str {
        match self {
            Position::OwnerOperator => "OO",
            Position::LeaseOperator => "LO",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Position::OwnerOperator => "Owner Operator",
            Position::LeaseOperator => "Lease Operator",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "OO" => Some(Position::OwnerOperator),
            "LO" => Some(Position::LeaseOperator),
            _ => None,
        }
    }
}

/// Optional form answers shared by the submission body and the stored row.
#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDetails {
    // Personal
    #[serde(default, deserialize_with = "form::opt_date")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default, deserialize_with = "form::opt_date")]
    pub start_date: Option<NaiveDate>,

    // Address
    #[serde(default, deserialize_with = "form::opt_string")]
    pub street_address: Option<String>,
    #[serde(default, deserialize_with = "form::opt_string")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "form::opt_string")]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "form::opt_string")]
    pub zip_code: Option<String>,

    // License
    #[serde(default, deserialize_with = "form::opt_string")]
    pub cdl_number: Option<String>,
    #[serde(default, deserialize_with = "form::opt_string")]
    pub cdl_state: Option<String>,
    #[serde(default, deserialize_with = "form::opt_string")]
    pub cdl_class: Option<String>,
    #[serde(default, deserialize_with = "form::opt_date")]
    pub license_expiration: Option<NaiveDate>,
    #[serde(default, deserialize_with = "form::string_list")]
    pub endorsements: Option<Vec<String>>,
    #[serde(rename = "hasTWIC", default, deserialize_with = "form::yes_no")]
    pub has_twic: bool,
    #[serde(default, deserialize_with = "form::opt_date")]
    pub twic_expiration: Option<NaiveDate>,

    // Driving record
    #[serde(default, deserialize_with = "form::opt_int")]
    pub years_experience: Option<i32>,
    #[serde(default, deserialize_with = "form::yes_no")]
    pub has_accidents: bool,
    #[serde(default, deserialize_with = "form::opt_string")]
    pub accident_details: Option<String>,
    #[serde(default, deserialize_with = "form::yes_no")]
    pub has_violations: bool,
    #[serde(default, deserialize_with = "form::opt_string")]
    pub violation_details: Option<String>,
    #[serde(rename = "hasDUI", default, deserialize_with = "form::yes_no")]
    pub has_dui: bool,
    #[serde(default, deserialize_with = "form::opt_string")]
    pub dui_details: Option<String>,

    // Employment history
    #[serde(default, deserialize_with = "form::opt_string")]
    pub employer1_name: Option<String>,
    #[serde(default, deserialize_with = "form::opt_string")]
    pub employer1_phone: Option<String>,
    #[serde(default, deserialize_with = "form::opt_string")]
    pub employer1_position: Option<String>,
    #[serde(default, deserialize_with = "form::opt_date")]
    pub employer1_start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "form::opt_date")]
    pub employer1_end_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "form::opt_string")]
    pub employer1_reason_leaving: Option<String>,
    #[serde(default, deserialize_with = "form::opt_string")]
    pub employer2_name: Option<String>,
    #[serde(default, deserialize_with = "form::opt_string")]
    pub employer2_phone: Option<String>,
    #[serde(default, deserialize_with = "form::opt_string")]
    pub employer2_position: Option<String>,
    #[serde(default, deserialize_with = "form::opt_date")]
    pub employer2_start_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "form::opt_date")]
    pub employer2_end_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "form::opt_string")]
    pub employer2_reason_leaving: Option<String>,

    // Equipment (owner operators)
    #[serde(default, deserialize_with = "form::yes_no")]
    pub has_own_truck: bool,
    #[serde(default, deserialize_with = "form::opt_string")]
    pub truck_year: Option<String>,
    #[serde(default, deserialize_with = "form::opt_string")]
    pub truck_make: Option<String>,
    #[serde(default, deserialize_with = "form::opt_string")]
    pub truck_model: Option<String>,
    #[serde(rename = "truckVIN", default, deserialize_with = "form::opt_string")]
    pub truck_vin: Option<String>,
    #[serde(default, deserialize_with = "form::yes_no")]
    pub has_trailer: bool,
    #[serde(default, deserialize_with = "form::opt_string")]
    pub trailer_type: Option<String>,
    #[serde(default, deserialize_with = "form::opt_string")]
    pub trailer_length: Option<String>,

    // References
    #[serde(default, deserialize_with = "form::opt_string")]
    pub ref1_name: Option<String>,
    #[serde(default, deserialize_with = "form::opt_string")]
    pub ref1_phone: Option<String>,
    #[serde(default, deserialize_with = "form::opt_string")]
    pub ref1_relationship: Option<String>,
    #[serde(default, deserialize_with = "form::opt_string")]
    pub ref2_name: Option<String>,
    #[serde(default, deserialize_with = "form::opt_string")]
    pub ref2_phone: Option<String>,
    #[serde(default, deserialize_with = "form::opt_string")]
    pub ref2_relationship: Option<String>,

    // Legal
    #[serde(default, deserialize_with = "form::yes_no")]
    pub certify_true: bool,
    #[serde(default, deserialize_with = "form::yes_no")]
    pub authorize_contact: bool,
    #[serde(default, deserialize_with = "form::opt_string")]
    pub electronic_signature: Option<String>,

    #[serde(default, deserialize_with = "form::string_list")]
    pub documents: Option<Vec<String>>,
}

/// Stored application row.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: Uuid,
    pub application_id: String,
    pub user_id: Uuid,
    pub status: ApplicationStatus,
    pub position: Position,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub details: ApplicationDetails,
    pub crm_contact_id: Option<String>,
    pub crm_synced_at: Option<DateTime<Utc>>,
    pub admin_notes: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub submitted_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Summary DTO for list views.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSummary {
    pub id: Uuid,
    pub application_id: String,
    pub user_id: Uuid,
    pub status: ApplicationStatus,
    pub position: Position,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub submitted_at: DateTime<Utc>,
}

/// Single application with its owning account.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationDetail {
    #[serde(flatten)]
    pub application: Application,
    pub user: Option<UserResponse>,
}

fn validate_position(value: &str) -> Result<(), ValidationError> {
    if Position::parse(value).is_some() {
        Ok(())
    } else {
        Err(ValidationError::new("position").with_message("Position must be OO or LO".into()))
    }
}

/// Body of `POST /api/applications`.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitApplication {
    #[serde(default, deserialize_with = "form::opt_string")]
    #[validate(required(message = "First name is required"))]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "form::opt_string")]
    #[validate(required(message = "Last name is required"))]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "form::opt_string")]
    #[validate(
        required(message = "Valid email is required"),
        email(message = "Valid email is required")
    )]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "form::opt_string")]
    #[validate(required(message = "Phone is required"))]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "form::opt_string")]
    #[validate(
        required(message = "Position must be OO or LO"),
        custom(function = "validate_position")
    )]
    pub position: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(flatten)]
    pub details: ApplicationDetails,
}

impl SubmitApplication {
    /// Normalize into a pending application ready for delivery and storage.
    ///
    /// Call after [`Validate::validate`]; only the position is re-checked here.
    pub fn into_new_application(
        self,
        application_id: String,
        submitted_at: DateTime<Utc>,
    ) -> Result<(NewApplication, Option<String>), AppError> {
        let position = self
            .position
            .as_deref()
            .and_then(Position::parse)
            .ok_or_else(|| AppError::Validation("Position must be OO or LO".to_string()))?;

        let app = NewApplication {
            application_id,
            status: ApplicationStatus::Pending,
            submitted_at,
            position,
            first_name: self.first_name.unwrap_or_default(),
            last_name: self.last_name.unwrap_or_default(),
            email: self.email.unwrap_or_default().to_lowercase(),
            phone: self.phone.unwrap_or_default(),
            details: self.details,
        };
        let password = self.password.filter(|p| !p.is_empty());

        Ok((app, password))
    }
}

/// Normalized submission: what the CRM receives and what the store persists.
#[derive(Debug, Clone)]
pub struct NewApplication {
    pub application_id: String,
    pub status: ApplicationStatus,
    pub submitted_at: DateTime<Utc>,
    pub position: Position,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub details: ApplicationDetails,
}

/// Body of `PUT /api/admin/applications/{id}/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: Option<String>,
    pub notes: Option<String>,
}

/// Body of `PUT /api/admin/applications/{id}/notes`.
#[derive(Debug, Clone, Deserialize)]
pub struct NotesRequest {
    pub notes: Option<String>,
}
