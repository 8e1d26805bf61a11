use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::Period;
use crate::store;
use chrono::NaiveDate;
use rusqlite::Connection;

/// Runs `f` against the open workspace and wraps the outcome in an envelope.
pub fn with_conn<F>(state: &AppState, req: &Request, f: F) -> serde_json::Value
where
    F: FnOnce(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
{
    let Some(conn) = state.db.as_ref() else {
        return HandlerErr::no_workspace().response(&req.id);
    };
    match f(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    get_optional_str(params, key)?.ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// Absent, null and blank strings all read as `None`.
pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => {
            let Some(s) = v.as_str() else {
                return Err(HandlerErr::bad_params(format!(
                    "{} must be a string or null",
                    key
                )));
            };
            let t = s.trim();
            if t.is_empty() {
                Ok(None)
            } else {
                Ok(Some(t.to_string()))
            }
        }
    }
}

pub fn get_required_f64(params: &serde_json::Value, key: &str) -> Result<f64, HandlerErr> {
    let Some(v) = params.get(key).filter(|v| !v.is_null()) else {
        return Err(HandlerErr::bad_params(format!("missing {}", key)));
    };
    match v.as_f64() {
        Some(n) if n.is_finite() => Ok(n),
        _ => Err(HandlerErr::bad_params(format!("{} must be a number", key))),
    }
}

pub fn get_amount(params: &serde_json::Value, key: &str) -> Result<f64, HandlerErr> {
    let amount = get_required_f64(params, key)?;
    if amount < 0.0 {
        return Err(HandlerErr::bad_params(format!("{} must not be negative", key)));
    }
    Ok(amount)
}

/// Validates a `YYYY-MM-DD` date and returns it normalized.
pub fn get_date(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    let raw = get_required_str(params, key)?;
    parse_date(&raw, key)
}

pub fn get_optional_date(params: &serde_json::Value, key: &str) -> Result<Option<String>, HandlerErr> {
    get_optional_str(params, key)?
        .map(|raw| parse_date(&raw, key))
        .transpose()
}

fn parse_date(raw: &str, key: &str) -> Result<String, HandlerErr> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| HandlerErr::bad_params(format!("{} must be YYYY-MM-DD", key)))
}

pub fn get_string_list(params: &serde_json::Value, key: &str) -> Result<Option<Vec<String>>, HandlerErr> {
    let Some(v) = params.get(key).filter(|v| !v.is_null()) else {
        return Ok(None);
    };
    let Some(arr) = v.as_array() else {
        return Err(HandlerErr::bad_params(format!("{} must be an array of strings", key)));
    };
    let mut out: Vec<String> = Vec::with_capacity(arr.len());
    for item in arr {
        let Some(s) = item.as_str() else {
            return Err(HandlerErr::bad_params(format!("{} must be an array of strings", key)));
        };
        let t = s.trim();
        if !t.is_empty() && !out.iter().any(|o| o.eq_ignore_ascii_case(t)) {
            out.push(t.to_string());
        }
    }
    Ok(Some(out))
}

/// `session`/`term` from params, falling back to the workspace's current period.
pub fn resolve_period(conn: &Connection, params: &serde_json::Value) -> Result<Period, HandlerErr> {
    let session = get_optional_str(params, "session")?;
    let term = get_optional_str(params, "term")?;
    match (session, term) {
        (Some(session), Some(term)) => Ok(Period::new(session, term)),
        (None, None) => store::current_period(conn)
            .map_err(HandlerErr::query)?
            .ok_or_else(|| {
                HandlerErr::bad_params("missing session/term and no current period is set")
            }),
        _ => Err(HandlerErr::bad_params("session and term must be given together")),
    }
}

/// Like `resolve_period`, but callers that list everything may pass neither.
pub fn optional_period(
    params: &serde_json::Value,
) -> Result<Option<Period>, HandlerErr> {
    let session = get_optional_str(params, "session")?;
    let term = get_optional_str(params, "term")?;
    match (session, term) {
        (Some(session), Some(term)) => Ok(Some(Period::new(session, term))),
        (None, None) => Ok(None),
        _ => Err(HandlerErr::bad_params("session and term must be given together")),
    }
}
