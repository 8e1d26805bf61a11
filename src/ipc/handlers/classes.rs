use crate::calc::subjects::{is_preschool_name, subjects_for};
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{get_optional_str, get_required_str, get_string_list, with_conn};
use crate::ipc::types::{AppState, Request};
use crate::model::Class;
use crate::store;
use rusqlite::Connection;
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;

fn subject_source(class: &Class) -> &'static str {
    if !class.subjects.is_empty() {
        "class"
    } else if is_preschool_name(&class.name) {
        "preschool"
    } else {
        "primary"
    }
}

pub(crate) fn load_class(conn: &Connection, class_id: &str) -> Result<Class, HandlerErr> {
    store::get_class(conn, class_id)
        .map_err(HandlerErr::query)?
        .ok_or_else(|| HandlerErr::not_found("class"))
}

/// Without a workspace the list is simply empty.
fn handle_classes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "classes": [] }));
    };
    match list_classes_with_counts(conn) {
        Ok(rows) => ok(&req.id, json!({ "classes": rows })),
        Err(e) => e.response(&req.id),
    }
}

fn list_classes_with_counts(conn: &Connection) -> Result<Vec<serde_json::Value>, HandlerErr> {
    let classes = store::list_classes(conn).map_err(HandlerErr::query)?;
    let students = store::list_students(conn, None).map_err(HandlerErr::query)?;
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for s in &students {
        if let Some(cid) = s.class_id.as_deref() {
            *counts.entry(cid).or_insert(0) += 1;
        }
    }
    Ok(classes
        .iter()
        .map(|c| {
            json!({
                "id": c.id,
                "name": c.name,
                "subjects": c.subjects,
                "classTeacherId": c.class_teacher_id,
                "studentCount": counts.get(c.id.as_str()).copied().unwrap_or(0)
            })
        })
        .collect())
}

fn handle_classes_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let class = Class {
            id: Uuid::new_v4().to_string(),
            name: get_required_str(params, "name")?,
            subjects: get_string_list(params, "subjects")?.unwrap_or_default(),
            class_teacher_id: get_optional_str(params, "classTeacherId")?,
        };
        store::insert_class(conn, &class)
            .map_err(|e| HandlerErr::write("db_insert_failed", "classes", e))?;
        Ok(json!({ "classId": class.id, "name": class.name }))
    })
}

fn handle_classes_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let class_id = get_required_str(params, "classId")?;
        let mut class = load_class(conn, &class_id)?;
        if let Some(name) = get_optional_str(params, "name")? {
            class.name = name;
        }
        if let Some(subjects) = get_string_list(params, "subjects")? {
            class.subjects = subjects;
        }
        if params.get("classTeacherId").is_some() {
            class.class_teacher_id = get_optional_str(params, "classTeacherId")?;
        }
        store::update_class(conn, &class)
            .map_err(|e| HandlerErr::write("db_update_failed", "classes", e))?;
        Ok(json!({ "class": class }))
    })
}

fn handle_classes_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let class_id = get_required_str(params, "classId")?;
        let deleted = store::delete_class(conn, &class_id)
            .map_err(|e| HandlerErr::write("db_delete_failed", "classes", e))?;
        if !deleted {
            return Err(HandlerErr::not_found("class"));
        }
        Ok(json!({ "ok": true }))
    })
}

fn handle_classes_subjects(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let class_id = get_required_str(params, "classId")?;
        let class = load_class(conn, &class_id)?;
        Ok(json!({
            "subjects": subjects_for(&class),
            "source": subject_source(&class)
        }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.list" => Some(handle_classes_list(state, req)),
        "classes.create" => Some(handle_classes_create(state, req)),
        "classes.update" => Some(handle_classes_update(state, req)),
        "classes.delete" => Some(handle_classes_delete(state, req)),
        "classes.subjects" => Some(handle_classes_subjects(state, req)),
        _ => None,
    }
}
