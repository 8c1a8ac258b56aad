//! Aggregate application counts for the admin dashboard.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::db::Storage;
use crate::errors::AppError;

/// Window for the "recent applications" count.
const RECENT_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: i64,
    pub review: i64,
    pub background: i64,
    pub approved: i64,
    pub rejected: i64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PositionCounts {
    pub owner_operator: i64,
    pub lease_operator: i64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStats {
    pub total: i64,
    pub by_status: StatusCounts,
    pub by_position: PositionCounts,
    pub recent_applications: i64,
}

#[derive(sqlx::FromRow)]
struct StatsRow {
    total: i64,
    pending: i64,
    review: i64,
    background: i64,
    approved: i64,
    rejected: i64,
    owner_operator: i64,
    lease_operator: i64,
    recent: i64,
}

/// Counts as of `now`; recent means submitted at or after `now - 7 days`.
pub async fn application_stats(
    storage: &Storage,
    now: DateTime<Utc>,
) -> Result<ApplicationStats, AppError> {
    let Some(pool) = storage.pool() else {
        return Ok(ApplicationStats::default());
    };

    let since = now - Duration::days(RECENT_WINDOW_DAYS);
    let row = sqlx::query_as::<_, StatsRow>(
        r#"
        SELECT
            COUNT(*) AS total,
            COUNT(*) FILTER (WHERE status = 'pending') AS pending,
            COUNT(*) FILTER (WHERE status = 'review') AS review,
            COUNT(*) FILTER (WHERE status = 'background') AS background,
            COUNT(*) FILTER (WHERE status = 'approved') AS approved,
            COUNT(*) FILTER (WHERE status = 'rejected') AS rejected,
            COUNT(*) FILTER (WHERE position = 'OO') AS owner_operator,
            COUNT(*) FILTER (WHERE position = 'LO') AS lease_operator,
            COUNT(*) FILTER (WHERE submitted_at >= $1) AS recent
        FROM applications
        "#,
    )
    .bind(since)
    .fetch_one(pool)
    .await?;

    Ok(ApplicationStats {
        total: row.total,
        by_status: StatusCounts {
            pending: row.pending,
            review: row.review,
            background: row.background,
            approved: row.approved,
            rejected: row.rejected,
        },
        by_position: PositionCounts {
            owner_operator: row.owner_operator,
            lease_operator: row.lease_operator,
        },
        recent_applications: row.recent,
    })
}
