use crate::calc::attendance::attendance_summary;
use crate::ipc::error::HandlerErr;
use crate::ipc::handlers::classes::load_class;
use crate::ipc::helpers::{get_date, get_required_str, resolve_period, with_conn};
use crate::ipc::types::{AppState, Request};
use crate::model::{Attendance, AttendanceEntry, AttendanceStatus, Student};
use crate::store;
use serde_json::json;
use std::collections::HashSet;

fn parse_status(raw: &str) -> Option<AttendanceStatus> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "present" | "p" => Some(AttendanceStatus::Present),
        "absent" | "a" => Some(AttendanceStatus::Absent),
        "late" | "l" => Some(AttendanceStatus::Late),
        _ => None,
    }
}

fn parse_entries(
    params: &serde_json::Value,
    roster: &[Student],
) -> Result<Vec<AttendanceEntry>, HandlerErr> {
    let Some(items) = params.get("entries").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("missing entries"));
    };
    let on_roster: HashSet<&str> = roster.iter().map(|s| s.id.as_str()).collect();
    let mut seen: HashSet<String> = HashSet::new();
    let mut entries: Vec<AttendanceEntry> = Vec::with_capacity(items.len());
    for item in items {
        let student_id = get_required_str(item, "studentId")?;
        let status_raw = get_required_str(item, "status")?;
        let Some(status) = parse_status(&status_raw) else {
            return Err(
                HandlerErr::bad_params("status must be present, absent or late")
                    .with_details(json!({ "studentId": student_id, "status": status_raw })),
            );
        };
        if !on_roster.contains(student_id.as_str()) {
            return Err(HandlerErr::bad_params("student is not in this class")
                .with_details(json!({ "studentId": student_id })));
        }
        if !seen.insert(student_id.clone()) {
            return Err(HandlerErr::bad_params("duplicate student in entries")
                .with_details(json!({ "studentId": student_id })));
        }
        entries.push(AttendanceEntry { student_id, status });
    }
    Ok(entries)
}

fn handle_attendance_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let class_id = get_required_str(params, "classId")?;
        let date = get_date(params, "date")?;
        let period = resolve_period(conn, params)?;
        load_class(conn, &class_id)?;
        let roster = store::list_students(conn, Some(class_id.as_str())).map_err(HandlerErr::query)?;
        let entries = parse_entries(params, &roster)?;

        let record = Attendance {
            class_id,
            date,
            session: period.session,
            term: period.term,
            entries,
        };
        store::upsert_attendance(conn, &record)
            .map_err(|e| HandlerErr::write("db_insert_failed", "attendance", e))?;
        Ok(json!({ "attendance": record }))
    })
}

fn handle_attendance_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let class_id = get_required_str(params, "classId")?;
        let date = get_date(params, "date")?;
        let period = resolve_period(conn, params)?;
        load_class(conn, &class_id)?;
        let roster = store::list_students(conn, Some(class_id.as_str())).map_err(HandlerErr::query)?;
        let record =
            store::get_attendance(conn, &class_id, &date, &period).map_err(HandlerErr::query)?;
        let students: Vec<serde_json::Value> = roster
            .iter()
            .map(|s| json!({ "id": s.id, "displayName": s.display_name() }))
            .collect();
        Ok(json!({ "students": students, "attendance": record }))
    })
}

fn handle_attendance_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let class_id = get_required_str(params, "classId")?;
        let period = resolve_period(conn, params)?;
        load_class(conn, &class_id)?;
        let roster = store::list_students(conn, Some(class_id.as_str())).map_err(HandlerErr::query)?;
        let records = store::list_attendance(conn, &class_id, &period).map_err(HandlerErr::query)?;
        let tallies = attendance_summary(&class_id, &roster, &records, &period);
        Ok(json!({
            "session": period.session,
            "term": period.term,
            "daysRecorded": records.len(),
            "rows": tallies
        }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.save" => Some(handle_attendance_save(state, req)),
        "attendance.get" => Some(handle_attendance_get(state, req)),
        "attendance.summary" => Some(handle_attendance_summary(state, req)),
        _ => None,
    }
}
