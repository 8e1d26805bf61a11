use crate::calc::attendance::attendance_summary;
use crate::calc::broadsheet::compile_broadsheet;
use crate::calc::grade::{grade_for_total, term_average, AssessmentPolicy};
use crate::calc::rank::{class_positions, rank_of};
use crate::calc::subjects::subjects_for;
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::handlers::classes::load_class;
use crate::ipc::handlers::students::load_student;
use crate::ipc::helpers::{
    get_optional_str, get_required_f64, get_required_str, resolve_period, with_conn,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Period, Score, ScoreRow, Student};
use crate::store;
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;

const RATING_MIN: i64 = 1;
const RATING_MAX: i64 = 5;

#[derive(Debug, Deserialize)]
struct RawRow {
    subject: String,
    #[serde(default)]
    ca1: f64,
    #[serde(default)]
    ca2: f64,
    #[serde(default)]
    exam: f64,
}

fn parse_rows(
    params: &serde_json::Value,
    policy: &AssessmentPolicy,
) -> Result<Vec<ScoreRow>, HandlerErr> {
    let Some(raw) = params.get("rows").filter(|v| !v.is_null()) else {
        return Err(HandlerErr::bad_params("missing rows"));
    };
    let raw_rows: Vec<RawRow> = serde_json::from_value(raw.clone()).map_err(|e| {
        HandlerErr::bad_params(format!("rows must be [{{subject, ca1, ca2, exam}}]: {}", e))
    })?;

    let mut rows: Vec<ScoreRow> = Vec::with_capacity(raw_rows.len());
    for r in raw_rows {
        let subject = r.subject.trim().to_string();
        if subject.is_empty() {
            return Err(HandlerErr::bad_params("row subject must not be empty"));
        }
        if rows.iter().any(|x| x.subject.eq_ignore_ascii_case(&subject)) {
            return Err(HandlerErr::bad_params("duplicate subject in rows")
                .with_details(json!({ "subject": subject })));
        }
        if let Some(field) = policy.out_of_bounds(r.ca1, r.ca2, r.exam) {
            let max = match field {
                "ca1" => policy.max_ca1,
                "ca2" => policy.max_ca2,
                _ => policy.max_exam,
            };
            return Err(
                HandlerErr::bad_params(format!("{} must be between 0 and {}", field, max))
                    .with_details(json!({ "subject": subject, "field": field })),
            );
        }
        rows.push(ScoreRow::graded(subject, r.ca1, r.ca2, r.exam));
    }
    Ok(rows)
}

fn parse_ratings(params: &serde_json::Value, key: &str) -> Result<BTreeMap<String, u8>, HandlerErr> {
    let Some(raw) = params.get(key).filter(|v| !v.is_null()) else {
        return Ok(BTreeMap::new());
    };
    let Some(obj) = raw.as_object() else {
        return Err(HandlerErr::bad_params(format!("{} must be an object", key)));
    };
    let mut out = BTreeMap::new();
    for (domain, v) in obj {
        let rating = v
            .as_i64()
            .filter(|n| (RATING_MIN..=RATING_MAX).contains(n))
            .ok_or_else(|| {
                HandlerErr::bad_params(format!(
                    "{}.{} must be an integer from {} to {}",
                    key, domain, RATING_MIN, RATING_MAX
                ))
            })?;
        out.insert(domain.clone(), rating as u8);
    }
    Ok(out)
}

/// Live position of `student` among classmates; never read from storage.
fn live_rank(
    conn: &Connection,
    student: &Student,
    period: &Period,
) -> Result<(Option<usize>, usize), HandlerErr> {
    let Some(class_id) = student.class_id.as_deref() else {
        return Ok((None, 0));
    };
    let roster = store::list_students(conn, Some(class_id)).map_err(HandlerErr::query)?;
    let scores = store::list_scores(conn, period, None).map_err(HandlerErr::query)?;
    Ok((rank_of(&student.id, &roster, &scores, period), roster.len()))
}

fn handle_grades_for_total(req: &Request) -> serde_json::Value {
    match get_required_f64(&req.params, "total") {
        Ok(total) => ok(&req.id, json!(grade_for_total(total))),
        Err(e) => e.response(&req.id),
    }
}

fn handle_grades_preview(state: &mut AppState, req: &Request) -> serde_json::Value {
    match parse_rows(&req.params, &state.policy) {
        Ok(rows) => ok(
            &req.id,
            json!({
                "average": term_average(&rows),
                "total": rows.iter().map(|r| r.total).sum::<f64>(),
                "rows": rows
            }),
        ),
        Err(e) => e.response(&req.id),
    }
}

fn handle_scores_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let policy = state.policy;
    with_conn(state, req, |conn, params| {
        let student_id = get_required_str(params, "studentId")?;
        let class_id = get_required_str(params, "classId")?;
        let period = resolve_period(conn, params)?;
        let rows = parse_rows(params, &policy)?;
        let affective = parse_ratings(params, "affective")?;
        let psychomotor = parse_ratings(params, "psychomotor")?;

        let student = load_student(conn, &student_id)?;
        load_class(conn, &class_id)?;
        if student.class_id.as_deref() != Some(class_id.as_str()) {
            return Err(HandlerErr::bad_params("student is not in this class").with_details(
                json!({ "studentId": student_id, "classId": class_id, "studentClassId": student.class_id }),
            ));
        }

        let mut score = Score {
            student_id,
            class_id,
            session: period.session.clone(),
            term: period.term.clone(),
            average: term_average(&rows),
            rows,
            position: None,
            affective,
            psychomotor,
            teacher_remark: get_optional_str(params, "teacherRemark")?,
            principal_remark: get_optional_str(params, "principalRemark")?,
        };
        store::upsert_score(conn, &score)
            .map_err(|e| HandlerErr::write("db_insert_failed", "scores", e))?;

        // Snapshot only; reads recompute.
        let (position, _) = live_rank(conn, &student, &period)?;
        if position.is_some() {
            score.position = position;
            store::upsert_score(conn, &score)
                .map_err(|e| HandlerErr::write("db_update_failed", "scores", e))?;
        }
        tracing::debug!(
            student = %score.student_id,
            session = %score.session,
            term = %score.term,
            "score saved"
        );
        Ok(json!({ "score": score }))
    })
}

fn handle_scores_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let student_id = get_required_str(params, "studentId")?;
        let class_id = get_required_str(params, "classId")?;
        let period = resolve_period(conn, params)?;
        let score = store::get_score(conn, &student_id, &class_id, &period)
            .map_err(HandlerErr::query)?;
        Ok(json!({ "score": score }))
    })
}

fn handle_scores_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let student_id = get_required_str(params, "studentId")?;
        let class_id = get_required_str(params, "classId")?;
        let period = resolve_period(conn, params)?;
        let deleted = store::delete_score(conn, &student_id, &class_id, &period)
            .map_err(|e| HandlerErr::write("db_delete_failed", "scores", e))?;
        if !deleted {
            return Err(HandlerErr::not_found("score"));
        }
        Ok(json!({ "ok": true }))
    })
}

fn handle_grades_rank(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let student_id = get_required_str(params, "studentId")?;
        let period = resolve_period(conn, params)?;
        // An unknown student is a null position, not an error.
        let student = store::get_student(conn, &student_id).map_err(HandlerErr::query)?;
        let (position, class_size) = match student {
            Some(s) => live_rank(conn, &s, &period)?,
            None => (None, 0),
        };
        Ok(json!({
            "studentId": student_id,
            "session": period.session,
            "term": period.term,
            "position": position,
            "classSize": class_size
        }))
    })
}

fn handle_reports_card(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let student_id = get_required_str(params, "studentId")?;
        let period = resolve_period(conn, params)?;
        let student = load_student(conn, &student_id)?;
        let Some(class_id) = student.class_id.clone() else {
            return Err(HandlerErr::bad_params("student is not assigned to a class"));
        };
        let class = load_class(conn, &class_id)?;

        let roster = store::list_students(conn, Some(class_id.as_str())).map_err(HandlerErr::query)?;
        let scores = store::list_scores(conn, &period, None).map_err(HandlerErr::query)?;
        let positions = class_positions(&class_id, &roster, &scores, &period);
        let position = positions
            .iter()
            .find(|p| p.student_id == student.id)
            .map(|p| p.position);

        let mut score = store::get_score(conn, &student.id, &class_id, &period)
            .map_err(HandlerErr::query)?;
        if let Some(s) = score.as_mut() {
            s.position = position;
        }

        let records = store::list_attendance(conn, &class_id, &period).map_err(HandlerErr::query)?;
        let attendance = attendance_summary(&class_id, &roster, &records, &period)
            .into_iter()
            .find(|t| t.student_id == student.id);

        Ok(json!({
            "student": student,
            "displayName": student.display_name(),
            "class": { "id": class.id, "name": class.name },
            "session": period.session,
            "term": period.term,
            "subjects": subjects_for(&class),
            "score": score,
            "position": position,
            "classSize": roster.len(),
            "attendance": attendance,
            "daysRecorded": records.len()
        }))
    })
}

fn handle_reports_broadsheet(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let class_id = get_required_str(params, "classId")?;
        let period = resolve_period(conn, params)?;
        let class = load_class(conn, &class_id)?;
        let roster = store::list_students(conn, Some(class_id.as_str())).map_err(HandlerErr::query)?;
        let scores = store::list_scores(conn, &period, None).map_err(HandlerErr::query)?;
        let sheet = compile_broadsheet(&class, &roster, &scores, &period);
        Ok(json!({ "broadsheet": sheet }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.forTotal" => Some(handle_grades_for_total(req)),
        "grades.preview" => Some(handle_grades_preview(state, req)),
        "grades.rank" => Some(handle_grades_rank(state, req)),
        "scores.save" => Some(handle_scores_save(state, req)),
        "scores.get" => Some(handle_scores_get(state, req)),
        "scores.delete" => Some(handle_scores_delete(state, req)),
        "reports.card" => Some(handle_reports_card(state, req)),
        "reports.broadsheet" => Some(handle_reports_broadsheet(state, req)),
        _ => None,
    }
}
