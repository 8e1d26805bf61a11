use crate::ipc::error::HandlerErr;
use crate::ipc::handlers::classes::load_class;
use crate::ipc::helpers::{get_optional_date, get_optional_str, get_required_str, with_conn};
use crate::ipc::types::{AppState, Request};
use crate::model::Student;
use crate::store;
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

/// Overwrites the optional fields that are present in `params`; absent keys
/// leave the current value alone, explicit nulls clear it.
fn apply_optional_fields(
    conn: &Connection,
    s: &mut Student,
    params: &serde_json::Value,
) -> Result<(), HandlerErr> {
    let present = |key: &str| params.get(key).is_some();
    if present("studentNo") {
        s.student_no = get_optional_str(params, "studentNo")?;
    }
    if present("gender") {
        s.gender = get_optional_str(params, "gender")?;
    }
    if present("birthDate") {
        s.birth_date = get_optional_date(params, "birthDate")?;
    }
    if present("guardianName") {
        s.guardian_name = get_optional_str(params, "guardianName")?;
    }
    if present("guardianPhone") {
        s.guardian_phone = get_optional_str(params, "guardianPhone")?;
    }
    if present("guardianEmail") {
        s.guardian_email = get_optional_str(params, "guardianEmail")?;
    }
    if present("classId") {
        s.class_id = get_optional_str(params, "classId")?;
        if let Some(cid) = s.class_id.as_deref() {
            load_class(conn, cid)?;
        }
    }
    Ok(())
}

pub(crate) fn load_student(conn: &Connection, student_id: &str) -> Result<Student, HandlerErr> {
    store::get_student(conn, student_id)
        .map_err(HandlerErr::query)?
        .ok_or_else(|| HandlerErr::not_found("student"))
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let class_id = get_optional_str(params, "classId")?;
        let students = store::list_students(conn, class_id.as_deref()).map_err(HandlerErr::query)?;
        let rows: Vec<serde_json::Value> = students
            .iter()
            .map(|s| {
                let mut v = json!(s);
                v["displayName"] = json!(s.display_name());
                v
            })
            .collect();
        Ok(json!({ "students": rows }))
    })
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let mut student = Student {
            id: Uuid::new_v4().to_string(),
            student_no: None,
            first_name: get_required_str(params, "firstName")?,
            last_name: get_required_str(params, "lastName")?,
            gender: None,
            birth_date: None,
            guardian_name: None,
            guardian_phone: None,
            guardian_email: None,
            class_id: None,
        };
        apply_optional_fields(conn, &mut student, params)?;
        store::insert_student(conn, &student)
            .map_err(|e| HandlerErr::write("db_insert_failed", "students", e))?;
        Ok(json!({ "studentId": student.id }))
    })
}

fn handle_students_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let student_id = get_required_str(params, "studentId")?;
        let mut student = load_student(conn, &student_id)?;
        if let Some(first) = get_optional_str(params, "firstName")? {
            student.first_name = first;
        }
        if let Some(last) = get_optional_str(params, "lastName")? {
            student.last_name = last;
        }
        apply_optional_fields(conn, &mut student, params)?;
        store::update_student(conn, &student)
            .map_err(|e| HandlerErr::write("db_update_failed", "students", e))?;
        Ok(json!({ "student": student }))
    })
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let student_id = get_required_str(params, "studentId")?;
        load_student(conn, &student_id)?;
        // Payment history feeds past finance summaries.
        let payments = store::list_payments(conn, None, Some(student_id.as_str()))
            .map_err(HandlerErr::query)?;
        if !payments.is_empty() {
            return Err(HandlerErr::bad_params("student has recorded payments")
                .with_details(json!({ "studentId": student_id, "paymentCount": payments.len() })));
        }
        let deleted = store::delete_student(conn, &student_id)
            .map_err(|e| HandlerErr::write("db_delete_failed", "students", e))?;
        if !deleted {
            return Err(HandlerErr::not_found("student"));
        }
        Ok(json!({ "ok": true }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.update" => Some(handle_students_update(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        _ => None,
    }
}
