//! Application review lifecycle: readable ids, status changes and admin notes.
//!
//! Every status is reachable from every other. The only audit trail is the
//! append-only notes column, each entry stamped with time and author.

use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use rand::Rng;
use uuid::Uuid;

use crate::db::Storage;
use crate::errors::AppError;
use crate::models::application::{Application, ApplicationStatus};
use crate::services::application::{self as store, ApplicationPatch};
use crate::services::crm::CrmClient;

/// Attempts at drawing an unused readable id before accepting a possible collision.
const ID_ATTEMPTS: usize = 5;

/// Admin performing a review action.
#[derive(Debug, Clone)]
pub struct Reviewer {
    pub id: Uuid,
    pub name: String,
}

/// `{PREFIX}-{year}-{1000..=9999}`.
pub fn generate_application_id(prefix: &str, now: DateTime<Utc>) -> String {
    let suffix: u16 = rand::rng().random_range(1000..=9999);
    format!("{prefix}-{}-{suffix}", now.year())
}

/// Draw a readable id, re-drawing while the store already holds it.
///
/// The store's unique constraint still decides under concurrent submissions.
pub async fn allocate_application_id(
    storage: &Storage,
    prefix: &str,
    now: DateTime<Utc>,
) -> String {
    let mut candidate = generate_application_id(prefix, now);
    for _ in 1..ID_ATTEMPTS {
        match store::application_id_exists(storage, &candidate).await {
            Ok(false) => break,
            Ok(true) => {
                tracing::debug!(application_id = %candidate, "Readable id taken, drawing again");
                candidate = generate_application_id(prefix, now);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Readable id check failed");
                break;
            }
        }
    }
    candidate
}

/// `{PREFIX}-SIG-{epoch millis}`.
pub fn generate_confirmation_number(prefix: &str, now: DateTime<Utc>) -> String {
    format!("{prefix}-SIG-{}", now.timestamp_millis())
}

/// `[ISO-8601] Author: text`.
pub fn format_note(at: DateTime<Utc>, author: &str, text: &str) -> String {
    format!(
        "[{}] {author}: {text}",
        at.to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}

async fn load(storage: &Storage, id: &str) -> Result<Application, AppError> {
    store::find_application(storage, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Application not found".to_string()))
}

/// Move an application to `status`, stamping the reviewer.
///
/// Effects run in order: persist status and reviewer, append the optional note,
/// then notify the CRM. A failed note append or CRM call is logged and does not
/// undo the status change.
pub async fn set_status(
    storage: &Storage,
    crm: Option<&CrmClient>,
    id: &str,
    status: ApplicationStatus,
    reviewer: &Reviewer,
    note: Option<&str>,
) -> Result<Application, AppError> {
    let current = load(storage, id).await?;
    let previous = current.status;

    let patch = ApplicationPatch {
        status: Some(status),
        reviewed_by: Some(reviewer.id),
        reviewed_at: Some(Utc::now()),
        ..Default::default()
    };
    let mut updated = store::update_application(storage, current.id, &patch)
        .await?
        .ok_or_else(|| AppError::NotFound("Application not found".to_string()))?;

    tracing::info!(
        application_id = %updated.application_id,
        from = previous.as_str(),
        to = status.as_str(),
        reviewer_id = %reviewer.id,
        "Application status changed"
    );

    if let Some(text) = note.map(str::trim).filter(|t| !t.is_empty()) {
        let patch = ApplicationPatch {
            append_note: Some(format_note(Utc::now(), &reviewer.name, text)),
            ..Default::default()
        };
        match store::update_application(storage, updated.id, &patch).await {
            Ok(Some(with_note)) => updated = with_note,
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    application_id = %updated.application_id,
                    error = %e,
                    "Failed to append status note"
                );
            }
        }
    }

    if let Some(crm) = crm {
        if updated.crm_contact_id.is_none() {
            link_contact(storage, crm, &mut updated).await;
        }
        if let Err(e) = crm
            .update_contact_status(updated.crm_contact_id.as_deref(), status)
            .await
        {
            tracing::warn!(
                application_id = %updated.application_id,
                error = %e,
                "CRM status update failed"
            );
        }
    }

    Ok(updated)
}

/// Resolve the CRM contact behind an application and remember it.
///
/// Failures are logged; the application is left unlinked.
async fn link_contact(storage: &Storage, crm: &CrmClient, application: &mut Application) {
    let contact_id = match crm.find_contact_id(&application.email).await {
        Ok(Some(id)) => id,
        Ok(None) => return,
        Err(e) => {
            tracing::warn!(
                application_id = %application.application_id,
                error = %e,
                "CRM contact lookup failed"
            );
            return;
        }
    };

    let patch = ApplicationPatch {
        crm_contact_id: Some(contact_id.clone()),
        ..Default::default()
    };
    match store::update_application(storage, application.id, &patch).await {
        Ok(Some(linked)) => *application = linked,
        Ok(None) => application.crm_contact_id = Some(contact_id),
        Err(e) => {
            tracing::warn!(
                application_id = %application.application_id,
                error = %e,
                "Failed to record CRM contact"
            );
            application.crm_contact_id = Some(contact_id);
        }
    }
}

/// Append a timestamped note. Never replaces and never deduplicates.
pub async fn append_note(
    storage: &Storage,
    id: &str,
    author_id: Uuid,
    author_name: &str,
    text: &str,
) -> Result<Application, AppError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::Validation("Notes are required".to_string()));
    }

    let current = load(storage, id).await?;
    let patch = ApplicationPatch {
        append_note: Some(format_note(Utc::now(), author_name, text)),
        ..Default::default()
    };
    let updated = store::update_application(storage, current.id, &patch)
        .await?
        .ok_or_else(|| AppError::NotFound("Application not found".to_string()))?;

    tracing::info!(
        application_id = %updated.application_id,
        author_id = %author_id,
        "Admin note added"
    );
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use regex::Regex;

    #[test]
    fn application_id_format() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap();
        let re = Regex::new(r"^JRML-2026-\d{4}$").unwrap();
        for _ in 0..200 {
            let id = generate_application_id("JRML", now);
            assert!(re.is_match(&id), "bad id {id}");
            let suffix: u16 = id[10..].parse().unwrap();
            assert!((1000..=9999).contains(&suffix));
        }
    }

    #[test]
    fn confirmation_number_uses_millis() {
        let now = Utc.timestamp_millis_opt(1_760_600_000_123).unwrap();
        assert_eq!(
            generate_confirmation_number("JRML", now),
            "JRML-SIG-1760600000123"
        );
    }

    #[test]
    fn note_format() {
        let at = Utc.with_ymd_and_hms(2026, 1, 5, 16, 4, 9).unwrap();
        assert_eq!(
            format_note(at, "Pat Admin", "Called references"),
            "[2026-01-05T16:04:09.000Z] Pat Admin: Called references"
        );
    }

    #[tokio::test]
    async fn allocation_without_storage_draws_once() {
        let now = Utc::now();
        let id = allocate_application_id(&Storage::unavailable(), "ACME", now).await;
        assert!(id.starts_with(&format!("ACME-{}-", now.year())));
    }

    #[tokio::test]
    async fn degraded_mode_reports_not_found() {
        let reviewer = Reviewer {
            id: Uuid::new_v4(),
            name: "Pat Admin".to_string(),
        };
        let storage = Storage::unavailable();

        let err = set_status(
            &storage,
            None,
            "JRML-2026-1000",
            ApplicationStatus::Approved,
            &reviewer,
            None,
        )
        .await
        .unwrap_err();
        assert!(err.is_not_found());

        let err = append_note(&storage, "JRML-2026-1000", reviewer.id, &reviewer.name, "hi")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn blank_note_rejected() {
        let err = append_note(&Storage::unavailable(), "x", Uuid::nil(), "Pat", "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
