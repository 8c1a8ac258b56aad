//! Application store: optional Postgres persistence for users and applications.
//!
//! Every function takes the [`Storage`] handle. When storage is unavailable
//! writes return `Ok(None)` and reads come back empty, so callers can keep
//! serving with only the CRM adapter.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::Storage;
use crate::errors::AppError;
use crate::models::application::{
    Application, ApplicationStatus, ApplicationSummary, NewApplication, Position,
};
use crate::models::pagination::{PagedResult, Pagination};
use crate::models::user::{NewUser, User};
use crate::services::auth;

/// Raw list query parameters.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationFilters {
    pub status: Option<String>,
    pub position: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

/// Validated equality filters plus free-text search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationQuery {
    pub status: Option<ApplicationStatus>,
    pub position: Option<Position>,
    pub search: Option<String>,
}

/// Sort column from the allow-list plus direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub column: &'static str,
    pub descending: bool,
}

impl Default for Sort {
    fn default() -> Self {
        Self {
            column: "submitted_at",
            descending: true,
        }
    }
}

impl Sort {
    pub fn parse(sort_by: Option<&str>, sort_order: Option<&str>) -> Result<Self, AppError> {
        let mut sort = Sort::default();

        if let Some(field) = sort_by.map(str::trim).filter(|f| !f.is_empty()) {
            sort.column = match field {
                "submittedAt" | "submitted_at" => "submitted_at",
                "createdAt" | "created_at" => "created_at",
                "updatedAt" | "updated_at" => "updated_at",
                "reviewedAt" | "reviewed_at" => "reviewed_at",
                "status" => "status",
                "position" => "position",
                "firstName" | "first_name" => "first_name",
                "lastName" | "last_name" => "last_name",
                "email" => "email",
                "applicationId" | "application_id" => "application_id",
                other => {
                    return Err(AppError::Validation(format!(
                        "Unsupported sort field: {other}"
                    )))
                }
            };
        }

        if let Some(order) = sort_order.map(str::trim).filter(|o| !o.is_empty()) {
            sort.descending = if order.eq_ignore_ascii_case("desc") {
                true
            } else if order.eq_ignore_ascii_case("asc") {
                false
            } else {
                return Err(AppError::Validation(format!(
                    "Sort order must be ASC or DESC, got {order}"
                )));
            };
        }

        Ok(sort)
    }

    fn order_by(&self) -> String {
        let direction = if self.descending { "DESC" } else { "ASC" };
        // Secondary key keeps paging stable when the primary column ties.
        format!("{} {direction}, id {direction}", self.column)
    }
}

impl ApplicationFilters {
    /// Resolve query parameters; the literal `all` means no filter.
    pub fn resolve(&self) -> Result<(ApplicationQuery, Sort), AppError> {
        let status = match active_filter(self.status.as_deref()) {
            Some(s) => Some(
                ApplicationStatus::parse(s)
                    .ok_or_else(|| AppError::Validation(format!("Invalid status filter: {s}")))?,
            ),
            None => None,
        };
        let position = match active_filter(self.position.as_deref()) {
            Some(p) => Some(
                Position::parse(p)
                    .ok_or_else(|| AppError::Validation(format!("Invalid position filter: {p}")))?,
            ),
            None => None,
        };
        let search = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let sort = Sort::parse(self.sort_by.as_deref(), self.sort_order.as_deref())?;
        Ok((
            ApplicationQuery {
                status,
                position,
                search,
            },
            sort,
        ))
    }
}

pub(crate) fn active_filter(value: Option<&str>) -> Option<&str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
}

/// Column changes applied by [`update_application`]. `None` leaves a column as is.
#[derive(Debug, Clone, Default)]
pub struct ApplicationPatch {
    pub status: Option<ApplicationStatus>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Appended to `admin_notes` after a blank line.
    pub append_note: Option<String>,
    pub crm_contact_id: Option<String>,
    pub crm_synced_at: Option<DateTime<Utc>>,
}

/// Columns written on insert, in bind order.
const INSERT_COLUMNS: [&str; 59] = [
    "application_id",
    "user_id",
    "status",
    "position",
    "first_name",
    "last_name",
    "email",
    "phone",
    "date_of_birth",
    "start_date",
    "street_address",
    "city",
    "state",
    "zip_code",
    "cdl_number",
    "cdl_state",
    "cdl_class",
    "license_expiration",
    "endorsements",
    "has_twic",
    "twic_expiration",
    "years_experience",
    "has_accidents",
    "accident_details",
    "has_violations",
    "violation_details",
    "has_dui",
    "dui_details",
    "employer1_name",
    "employer1_phone",
    "employer1_position",
    "employer1_start_date",
    "employer1_end_date",
    "employer1_reason_leaving",
    "employer2_name",
    "employer2_phone",
    "employer2_position",
    "employer2_start_date",
    "employer2_end_date",
    "employer2_reason_leaving",
    "has_own_truck",
    "truck_year",
    "truck_make",
    "truck_model",
    "truck_vin",
    "has_trailer",
    "trailer_type",
    "trailer_length",
    "ref1_name",
    "ref1_phone",
    "ref1_relationship",
    "ref2_name",
    "ref2_phone",
    "ref2_relationship",
    "certify_true",
    "authorize_contact",
    "electronic_signature",
    "documents",
    "submitted_at",
];

const SUMMARY_COLUMNS: &str = "id, application_id, user_id, status, position, first_name, \
     last_name, email, phone, reviewed_at, submitted_at";

/// Find the account for `email`, creating a driver account when none exists.
///
/// Returns the user and whether it was created. A new account needs a password.
pub async fn find_or_create_user(
    storage: &Storage,
    input: &NewUser,
) -> Result<Option<(User, bool)>, AppError> {
    let Some(pool) = storage.pool() else {
        return Ok(None);
    };

    let email = input.email.to_lowercase();
    let existing = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(pool)
        .await?;
    if let Some(user) = existing {
        return Ok(Some((user, false)));
    }

    let password = input
        .password
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::Validation("Password is required for new users".to_string()))?;
    let password_hash = auth::hash_password(password)?;

    let inserted = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (email, password_hash, first_name, last_name, phone, role)
        VALUES ($1, $2, $3, $4, $5, 'driver')
        ON CONFLICT (email) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(&email)
    .bind(&password_hash)
    .bind(&input.first_name)
    .bind(&input.last_name)
    .bind(&input.phone)
    .fetch_optional(pool)
    .await?;

    let Some(user) = inserted else {
        // A concurrent first submission created the account in between.
        let winner = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(&email)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| {
                AppError::Conflict("An account with this email already exists".to_string())
            })?;
        return Ok(Some((winner, false)));
    };

    tracing::info!(user_id = %user.id, "Created driver account");
    Ok(Some((user, true)))
}

/// Persist a new application owned by `user_id`.
pub async fn create_application(
    storage: &Storage,
    app: &NewApplication,
    user_id: Uuid,
) -> Result<Option<Application>, AppError> {
    let Some(pool) = storage.pool() else {
        return Ok(None);
    };

    let placeholders: Vec<String> = (1..=INSERT_COLUMNS.len()).map(|i| format!("${i}")).collect();
    let sql = format!(
        "INSERT INTO applications ({}) VALUES ({}) RETURNING *",
        INSERT_COLUMNS.join(", "),
        placeholders.join(", ")
    );

    let d = &app.details;
    let created = sqlx::query_as::<_, Application>(&sql)
        .bind(&app.application_id)
        .bind(user_id)
        .bind(app.status)
        .bind(app.position)
        .bind(&app.first_name)
        .bind(&app.last_name)
        .bind(&app.email)
        .bind(&app.phone)
        .bind(d.date_of_birth)
        .bind(d.start_date)
        .bind(&d.street_address)
        .bind(&d.city)
        .bind(&d.state)
        .bind(&d.zip_code)
        .bind(&d.cdl_number)
        .bind(&d.cdl_state)
        .bind(&d.cdl_class)
        .bind(d.license_expiration)
        .bind(&d.endorsements)
        .bind(d.has_twic)
        .bind(d.twic_expiration)
        .bind(d.years_experience)
        .bind(d.has_accidents)
        .bind(&d.accident_details)
        .bind(d.has_violations)
        .bind(&d.violation_details)
        .bind(d.has_dui)
        .bind(&d.dui_details)
        .bind(&d.employer1_name)
        .bind(&d.employer1_phone)
        .bind(&d.employer1_position)
        .bind(d.employer1_start_date)
        .bind(d.employer1_end_date)
        .bind(&d.employer1_reason_leaving)
        .bind(&d.employer2_name)
        .bind(&d.employer2_phone)
        .bind(&d.employer2_position)
        .bind(d.employer2_start_date)
        .bind(d.employer2_end_date)
        .bind(&d.employer2_reason_leaving)
        .bind(d.has_own_truck)
        .bind(&d.truck_year)
        .bind(&d.truck_make)
        .bind(&d.truck_model)
        .bind(&d.truck_vin)
        .bind(d.has_trailer)
        .bind(&d.trailer_type)
        .bind(&d.trailer_length)
        .bind(&d.ref1_name)
        .bind(&d.ref1_phone)
        .bind(&d.ref1_relationship)
        .bind(&d.ref2_name)
        .bind(&d.ref2_phone)
        .bind(&d.ref2_relationship)
        .bind(d.certify_true)
        .bind(d.authorize_contact)
        .bind(&d.electronic_signature)
        .bind(&d.documents)
        .bind(app.submitted_at)
        .fetch_one(pool)
        .await?;

    Ok(Some(created))
}

/// Look up by surrogate UUID or readable id.
pub async fn find_application(
    storage: &Storage,
    id_or_readable: &str,
) -> Result<Option<Application>, AppError> {
    let Some(pool) = storage.pool() else {
        return Ok(None);
    };

    let application = match Uuid::parse_str(id_or_readable) {
        Ok(id) => {
            sqlx::query_as::<_, Application>(
                "SELECT * FROM applications WHERE id = $1 OR application_id = $2",
            )
            .bind(id)
            .bind(id_or_readable)
            .fetch_optional(pool)
            .await?
        }
        Err(_) => {
            sqlx::query_as::<_, Application>("SELECT * FROM applications WHERE application_id = $1")
                .bind(id_or_readable)
                .fetch_optional(pool)
                .await?
        }
    };

    Ok(application)
}

/// Whether a readable id is already taken. Always false without storage.
pub async fn application_id_exists(storage: &Storage, application_id: &str) -> Result<bool, AppError> {
    let Some(pool) = storage.pool() else {
        return Ok(false);
    };

    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM applications WHERE application_id = $1)",
    )
    .bind(application_id)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

/// Apply a patch and return the updated row, or `None` if the row is absent.
pub async fn update_application(
    storage: &Storage,
    id: Uuid,
    patch: &ApplicationPatch,
) -> Result<Option<Application>, AppError> {
    let Some(pool) = storage.pool() else {
        return Ok(None);
    };

    let updated = sqlx::query_as::<_, Application>(
        r#"
        UPDATE applications SET
            status = COALESCE($2, status),
            reviewed_by = COALESCE($3, reviewed_by),
            reviewed_at = COALESCE($4, reviewed_at),
            admin_notes = CASE
                WHEN $5::text IS NULL THEN admin_notes
                WHEN admin_notes IS NULL OR admin_notes = '' THEN $5::text
                ELSE admin_notes || E'\n\n' || $5::text
            END,
            crm_contact_id = COALESCE($6, crm_contact_id),
            crm_synced_at = COALESCE($7, crm_synced_at),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(patch.status)
    .bind(patch.reviewed_by)
    .bind(patch.reviewed_at)
    .bind(&patch.append_note)
    .bind(&patch.crm_contact_id)
    .bind(patch.crm_synced_at)
    .fetch_optional(pool)
    .await?;

    Ok(updated)
}

/// `%term%` for ILIKE, with `%`, `_` and `\` in the term matched literally.
pub(crate) fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Build the WHERE clause shared by the list and count queries.
fn where_clause(query: &ApplicationQuery) -> String {
    let mut conditions: Vec<String> = Vec::new();
    let mut param_index = 0u32;

    if query.status.is_some() {
        param_index += 1;
        conditions.push(format!("status = ${param_index}"));
    }
    if query.position.is_some() {
        param_index += 1;
        conditions.push(format!("position = ${param_index}"));
    }
    if query.search.is_some() {
        param_index += 1;
        conditions.push(format!(
            "(first_name ILIKE ${param_index} ESCAPE '\\' \
             OR last_name ILIKE ${param_index} ESCAPE '\\' \
             OR email ILIKE ${param_index} ESCAPE '\\' \
             OR application_id ILIKE ${param_index} ESCAPE '\\')"
        ));
    }

    if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    }
}

/// Filtered, sorted page of application summaries.
pub async fn query_applications(
    storage: &Storage,
    query: &ApplicationQuery,
    pagination: &Pagination,
    sort: &Sort,
) -> Result<PagedResult<ApplicationSummary>, AppError> {
    let Some(pool) = storage.pool() else {
        return Ok(PagedResult::empty(pagination));
    };

    let where_clause = where_clause(query);
    let count_sql = format!("SELECT COUNT(*) FROM applications {where_clause}");
    let data_sql = format!(
        "SELECT {SUMMARY_COLUMNS} FROM applications {where_clause} \
         ORDER BY {} LIMIT {} OFFSET {}",
        sort.order_by(),
        pagination.limit(),
        pagination.offset()
    );

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    let mut data_query = sqlx::query_as::<_, ApplicationSummary>(&data_sql);

    // Bind parameters in the same order for both queries
    macro_rules! bind_both {
        ($val:expr) => {
            count_query = count_query.bind($val);
            data_query = data_query.bind($val);
        };
    }

    if let Some(status) = query.status {
        bind_both!(status);
    }
    if let Some(position) = query.position {
        bind_both!(position);
    }
    if let Some(ref search) = query.search {
        let pattern = contains_pattern(search);
        count_query = count_query.bind(pattern.clone());
        data_query = data_query.bind(pattern);
    }

    let total = count_query.fetch_one(pool).await?;
    let items = data_query.fetch_all(pool).await?;

    Ok(PagedResult::new(items, total, pagination))
}

/// Number of applications matching a filter. Zero without storage.
pub async fn count_applications(storage: &Storage, query: &ApplicationQuery) -> Result<i64, AppError> {
    let Some(pool) = storage.pool() else {
        return Ok(0);
    };

    let sql = format!("SELECT COUNT(*) FROM applications {}", where_clause(query));
    let mut count_query = sqlx::query_scalar::<_, i64>(&sql);
    if let Some(status) = query.status {
        count_query = count_query.bind(status);
    }
    if let Some(position) = query.position {
        count_query = count_query.bind(position);
    }
    if let Some(ref search) = query.search {
        count_query = count_query.bind(contains_pattern(search));
    }

    Ok(count_query.fetch_one(pool).await?)
}
