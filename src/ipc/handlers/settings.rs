use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_required_str, with_conn};
use crate::ipc::types::{AppState, Request};
use crate::model::Period;
use crate::store;
use serde_json::json;

fn handle_period_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, _params| {
        let current = store::current_period(conn).map_err(HandlerErr::query)?;
        Ok(json!({ "currentPeriod": current }))
    })
}

fn handle_period_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let period = Period {
            session: get_required_str(params, "session")?,
            term: get_required_str(params, "term")?,
        };
        store::set_current_period(conn, &period)
            .map_err(|e| HandlerErr::write("db_update_failed", "settings", e))?;
        tracing::info!(session = %period.session, term = %period.term, "current period set");
        Ok(json!({ "currentPeriod": period }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "period.get" => Some(handle_period_get(state, req)),
        "period.set" => Some(handle_period_set(state, req)),
        _ => None,
    }
}
