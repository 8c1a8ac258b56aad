//! Lenient deserializers for values posted by the public application form.
//!
//! The form sends checkbox answers as `"Yes"`/`"No"` or booleans, numbers as
//! strings, unanswered fields as empty strings, and the endorsement list either
//! as an array or as a JSON-encoded string.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// `true`, `"Yes"`, `"true"` → true; anything else (including absent) → false.
pub fn yes_no<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => b,
        Some(Value::String(s)) => {
            let s = s.trim();
            s.eq_ignore_ascii_case("yes") || s.eq_ignore_ascii_case("true")
        }
        _ => false,
    })
}

/// Trimmed string; blank becomes `None`. Numbers are accepted and stringified.
pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Integer from a number or a numeric string; blank becomes `None`.
///
/// Free-text answers such as `"10+"` keep their leading digits. Anything else
/// unreadable is dropped so an optional field never rejects the submission.
pub fn opt_int<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let parsed = match &value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i32>().ok().or_else(|| {
                let digits: String = s.chars().take_while(char::is_ascii_digit).collect();
                digits.parse().ok()
            })
        }
        Some(_) => None,
    };

    if parsed.is_none() {
        tracing::debug!(value = ?value, "Ignoring unreadable integer answer");
    }
    Ok(parsed)
}

/// Calendar date from `YYYY-MM-DD` (a trailing time component is ignored).
///
/// Month-only answers (`YYYY-MM`) resolve to the first of the month and US
/// `MM/DD/YYYY` answers are accepted. Other values are dropped.
pub fn opt_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let text = match &value {
        Some(Value::String(s)) => s.trim(),
        None | Some(Value::Null) => return Ok(None),
        Some(other) => {
            tracing::debug!(value = %other, "Ignoring non-text date answer");
            return Ok(None);
        }
    };
    if text.is_empty() {
        return Ok(None);
    }

    let parsed = parse_date(text);
    if parsed.is_none() {
        tracing::debug!(value = text, "Ignoring unreadable date answer");
    }
    Ok(parsed)
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    if text.len() == 7 {
        return NaiveDate::parse_from_str(&format!("{text}-01"), "%Y-%m-%d").ok();
    }
    let date_part = text.get(..10).unwrap_or(text);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(text, "%m/%d/%Y"))
        .ok()
}

/// List of strings from an array, a JSON-encoded array, or a comma-separated string.
pub fn string_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let items = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(items)) => items,
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => match serde_json::from_str::<Value>(&s) {
            Ok(Value::Array(items)) => items,
            _ => s.split(',').map(|p| Value::String(p.to_string())).collect(),
        },
        Some(other) => {
            tracing::debug!(value = %other, "Ignoring non-list answer");
            return Ok(None);
        }
    };

    let list: Vec<String> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect();

    Ok(Some(list))
}
