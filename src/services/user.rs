//! Account lookups for the admin surface.

use serde::Deserialize;
use uuid::Uuid;

use crate::db::Storage;
use crate::errors::AppError;
use crate::models::pagination::{PagedResult, Pagination};
use crate::models::user::{User, UserResponse, UserRole};
use crate::services::application::{active_filter, contains_pattern};

/// Filters for `GET /api/admin/users`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UserFilters {
    pub role: Option<String>,
    pub search: Option<String>,
}

pub async fn find_user(storage: &Storage, id: Uuid) -> Result<Option<User>, AppError> {
    let Some(pool) = storage.pool() else {
        return Ok(None);
    };

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

/// Newest accounts first; password hashes never leave this function.
pub async fn list_users(
    storage: &Storage,
    filters: &UserFilters,
    pagination: &Pagination,
) -> Result<PagedResult<UserResponse>, AppError> {
    let role = match active_filter(filters.role.as_deref()) {
        Some(r) => Some(
            UserRole::parse(r)
                .ok_or_else(|| AppError::Validation(format!("Invalid role filter: {r}")))?,
        ),
        None => None,
    };
    let search = filters
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let Some(pool) = storage.pool() else {
        return Ok(PagedResult::empty(pagination));
    };

    let mut conditions: Vec<String> = Vec::new();
    let mut param_index = 0u32;
    if role.is_some() {
        param_index += 1;
        conditions.push(format!("role = ${param_index}"));
    }
    if search.is_some() {
        param_index += 1;
        conditions.push(format!(
            "(first_name ILIKE ${param_index} ESCAPE '\\' \
             OR last_name ILIKE ${param_index} ESCAPE '\\' \
             OR email ILIKE ${param_index} ESCAPE '\\')"
        ));
    }
    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM users {where_clause}");
    let data_sql = format!(
        "SELECT * FROM users {where_clause} ORDER BY created_at DESC LIMIT {} OFFSET {}",
        pagination.limit(),
        pagination.offset()
    );

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    let mut data_query = sqlx::query_as::<_, User>(&data_sql);
    if let Some(role) = role {
        count_query = count_query.bind(role);
        data_query = data_query.bind(role);
    }
    if let Some(search) = search {
        let pattern = contains_pattern(search);
        count_query = count_query.bind(pattern.clone());
        data_query = data_query.bind(pattern);
    }

    let total = count_query.fetch_one(pool).await?;
    let items = data_query
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(UserResponse::from)
        .collect();

    Ok(PagedResult::new(items, total, pagination))
}
