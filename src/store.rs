//! Typed reads and writes over the workspace database.
//!
//! Loaders return plain `model` values; the pure functions in `calc` never see
//! a `Connection`. Score and attendance saves are whole-record replacements
//! keyed by their composite business key.

use crate::model::{
    Attendance, AttendanceEntry, Class, Expense, FeeStructure, Payment, PaymentMethod, Period,
    Score, ScoreRow, Student,
};
use anyhow::{anyhow, Context};
use rusqlite::{params_from_iter, types::Value, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;

pub const CURRENT_PERIOD_KEY: &str = "period.current";

fn now_stamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

// ---------------------------------------------------------------------------
// Settings

pub fn current_period(conn: &Connection) -> anyhow::Result<Option<Period>> {
    let Some(v) = crate::db::settings_get_json(conn, CURRENT_PERIOD_KEY)? else {
        return Ok(None);
    };
    let period: Period = serde_json::from_value(v).context("stored current period is invalid")?;
    Ok(Some(period))
}

pub fn set_current_period(conn: &Connection, period: &Period) -> anyhow::Result<()> {
    crate::db::settings_set_json(conn, CURRENT_PERIOD_KEY, &serde_json::to_value(period)?)
}

// ---------------------------------------------------------------------------
// Classes

fn class_from_row(r: &Row<'_>) -> rusqlite::Result<(String, String, String, Option<String>)> {
    Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?))
}

fn decode_class(raw: (String, String, String, Option<String>)) -> anyhow::Result<Class> {
    let (id, name, subjects_json, class_teacher_id) = raw;
    let subjects: Vec<String> = serde_json::from_str(&subjects_json)
        .with_context(|| format!("class {} has invalid subjects_json", id))?;
    Ok(Class {
        id,
        name,
        subjects,
        class_teacher_id,
    })
}

pub fn list_classes(conn: &Connection) -> anyhow::Result<Vec<Class>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, subjects_json, class_teacher_id
         FROM classes
         ORDER BY name",
    )?;
    let raw = stmt
        .query_map([], class_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    raw.into_iter().map(decode_class).collect()
}

pub fn get_class(conn: &Connection, class_id: &str) -> anyhow::Result<Option<Class>> {
    let raw = conn
        .query_row(
            "SELECT id, name, subjects_json, class_teacher_id FROM classes WHERE id = ?",
            [class_id],
            class_from_row,
        )
        .optional()?;
    raw.map(decode_class).transpose()
}

pub fn insert_class(conn: &Connection, class: &Class) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO classes(id, name, subjects_json, class_teacher_id) VALUES(?, ?, ?, ?)",
        (
            &class.id,
            &class.name,
            serde_json::to_string(&class.subjects)?,
            &class.class_teacher_id,
        ),
    )?;
    Ok(())
}

pub fn update_class(conn: &Connection, class: &Class) -> anyhow::Result<bool> {
    let changed = conn.execute(
        "UPDATE classes SET name = ?, subjects_json = ?, class_teacher_id = ? WHERE id = ?",
        (
            &class.name,
            serde_json::to_string(&class.subjects)?,
            &class.class_teacher_id,
            &class.id,
        ),
    )?;
    Ok(changed > 0)
}

/// Deletes a class with its scores, attendance and class-scoped fees.
/// Students are kept and become unassigned.
pub fn delete_class(conn: &Connection, class_id: &str) -> anyhow::Result<bool> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM scores WHERE class_id = ?", [class_id])
        .context("delete scores")?;
    tx.execute("DELETE FROM attendance WHERE class_id = ?", [class_id])
        .context("delete attendance")?;
    tx.execute(
        "UPDATE payments SET fee_structure_id = NULL
         WHERE fee_structure_id IN (SELECT id FROM fee_structures WHERE class_id = ?)",
        [class_id],
    )
    .context("unlink payments")?;
    tx.execute("DELETE FROM fee_structures WHERE class_id = ?", [class_id])
        .context("delete fee_structures")?;
    tx.execute(
        "UPDATE students SET class_id = NULL, updated_at = ? WHERE class_id = ?",
        (now_stamp(), class_id),
    )
    .context("unassign students")?;
    let deleted = tx.execute("DELETE FROM classes WHERE id = ?", [class_id])?;
    tx.commit()?;
    Ok(deleted > 0)
}

// ---------------------------------------------------------------------------
// Students

const STUDENT_COLUMNS: &str = "id, student_no, first_name, last_name, gender, birth_date,
    guardian_name, guardian_phone, guardian_email, class_id";

fn student_from_row(r: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        student_no: r.get(1)?,
        first_name: r.get(2)?,
        last_name: r.get(3)?,
        gender: r.get(4)?,
        birth_date: r.get(5)?,
        guardian_name: r.get(6)?,
        guardian_phone: r.get(7)?,
        guardian_email: r.get(8)?,
        class_id: r.get(9)?,
    })
}

/// Students in roster order. `class_id = None` lists everyone.
pub fn list_students(conn: &Connection, class_id: Option<&str>) -> anyhow::Result<Vec<Student>> {
    let (sql, binds): (String, Vec<Value>) = match class_id {
        Some(cid) => (
            format!(
                "SELECT {} FROM students WHERE class_id = ? ORDER BY sort_order, rowid",
                STUDENT_COLUMNS
            ),
            vec![Value::Text(cid.to_string())],
        ),
        None => (
            format!(
                "SELECT {} FROM students ORDER BY class_id, sort_order, rowid",
                STUDENT_COLUMNS
            ),
            Vec::new(),
        ),
    };
    let mut stmt = conn.prepare(&sql)?;
    let students = stmt
        .query_map(params_from_iter(binds), student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(students)
}

pub fn get_student(conn: &Connection, student_id: &str) -> anyhow::Result<Option<Student>> {
    let sql = format!("SELECT {} FROM students WHERE id = ?", STUDENT_COLUMNS);
    Ok(conn
        .query_row(&sql, [student_id], student_from_row)
        .optional()?)
}

/// Next roster slot at the end of `class_id` (or of the unassigned pool).
fn next_sort_order(conn: &Connection, class_id: Option<&str>) -> anyhow::Result<i64> {
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM students WHERE class_id IS ?",
        [class_id],
        |r| r.get(0),
    )?)
}

pub fn insert_student(conn: &Connection, s: &Student) -> anyhow::Result<()> {
    let next_sort = next_sort_order(conn, s.class_id.as_deref())?;
    conn.execute(
        "INSERT INTO students(
            id, student_no, first_name, last_name, gender, birth_date,
            guardian_name, guardian_phone, guardian_email, class_id, sort_order, updated_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            s.id,
            s.student_no,
            s.first_name,
            s.last_name,
            s.gender,
            s.birth_date,
            s.guardian_name,
            s.guardian_phone,
            s.guardian_email,
            s.class_id,
            next_sort,
            now_stamp(),
        ],
    )?;
    Ok(())
}

/// A student moved to another class joins the end of the new roster.
pub fn update_student(conn: &Connection, s: &Student) -> anyhow::Result<bool> {
    let current: Option<Option<String>> = conn
        .query_row(
            "SELECT class_id FROM students WHERE id = ?",
            [&s.id],
            |r| r.get(0),
        )
        .optional()?;
    let Some(current_class) = current else {
        return Ok(false);
    };
    if current_class != s.class_id {
        let next_sort = next_sort_order(conn, s.class_id.as_deref())?;
        conn.execute(
            "UPDATE students SET sort_order = ? WHERE id = ?",
            (next_sort, &s.id),
        )?;
    }
    let changed = conn.execute(
        "UPDATE students SET
            student_no = ?, first_name = ?, last_name = ?, gender = ?, birth_date = ?,
            guardian_name = ?, guardian_phone = ?, guardian_email = ?, class_id = ?,
            updated_at = ?
         WHERE id = ?",
        rusqlite::params![
            s.student_no,
            s.first_name,
            s.last_name,
            s.gender,
            s.birth_date,
            s.guardian_name,
            s.guardian_phone,
            s.guardian_email,
            s.class_id,
            now_stamp(),
            s.id,
        ],
    )?;
    Ok(changed > 0)
}

/// Removes a student and their scores. Payments are never deleted here;
/// callers must refuse to delete a student who has any.
pub fn delete_student(conn: &Connection, student_id: &str) -> anyhow::Result<bool> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM scores WHERE student_id = ?", [student_id])
        .context("delete scores")?;
    let deleted = tx.execute("DELETE FROM students WHERE id = ?", [student_id])?;
    tx.commit()?;
    Ok(deleted > 0)
}

// ---------------------------------------------------------------------------
// Scores

type ScoreRaw = (
    String,
    String,
    String,
    String,
    String,
    f64,
    Option<i64>,
    String,
    String,
    Option<String>,
    Option<String>,
);

const SCORE_COLUMNS: &str = "student_id, class_id, session, term, rows_json, average, position,
    affective_json, psychomotor_json, teacher_remark, principal_remark";

fn score_from_row(r: &Row<'_>) -> rusqlite::Result<ScoreRaw> {
    Ok((
        r.get(0)?,
        r.get(1)?,
        r.get(2)?,
        r.get(3)?,
        r.get(4)?,
        r.get(5)?,
        r.get(6)?,
        r.get(7)?,
        r.get(8)?,
        r.get(9)?,
        r.get(10)?,
    ))
}

fn decode_score(raw: ScoreRaw) -> anyhow::Result<Score> {
    let (
        student_id,
        class_id,
        session,
        term,
        rows_json,
        average,
        position,
        affective_json,
        psychomotor_json,
        teacher_remark,
        principal_remark,
    ) = raw;
    let rows: Vec<ScoreRow> = serde_json::from_str(&rows_json)
        .with_context(|| format!("score for {} has invalid rows_json", student_id))?;
    let affective: BTreeMap<String, u8> = serde_json::from_str(&affective_json)
        .with_context(|| format!("score for {} has invalid affective_json", student_id))?;
    let psychomotor: BTreeMap<String, u8> = serde_json::from_str(&psychomotor_json)
        .with_context(|| format!("score for {} has invalid psychomotor_json", student_id))?;
    Ok(Score {
        student_id,
        class_id,
        session,
        term,
        rows,
        average,
        position: position.and_then(|p| usize::try_from(p).ok()),
        affective,
        psychomotor,
        teacher_remark,
        principal_remark,
    })
}

/// All scores recorded for `period`, optionally limited to one class.
pub fn list_scores(
    conn: &Connection,
    period: &Period,
    class_id: Option<&str>,
) -> anyhow::Result<Vec<Score>> {
    let mut sql = format!(
        "SELECT {} FROM scores WHERE session = ? AND term = ?",
        SCORE_COLUMNS
    );
    let mut binds = vec![
        Value::Text(period.session.clone()),
        Value::Text(period.term.clone()),
    ];
    if let Some(cid) = class_id {
        sql.push_str(" AND class_id = ?");
        binds.push(Value::Text(cid.to_string()));
    }
    let mut stmt = conn.prepare(&sql)?;
    let raw = stmt
        .query_map(params_from_iter(binds), score_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    raw.into_iter().map(decode_score).collect()
}

pub fn get_score(
    conn: &Connection,
    student_id: &str,
    class_id: &str,
    period: &Period,
) -> anyhow::Result<Option<Score>> {
    let sql = format!(
        "SELECT {} FROM scores
         WHERE student_id = ? AND class_id = ? AND session = ? AND term = ?",
        SCORE_COLUMNS
    );
    let raw = conn
        .query_row(
            &sql,
            (student_id, class_id, &period.session, &period.term),
            score_from_row,
        )
        .optional()?;
    raw.map(decode_score).transpose()
}

/// Replace-on-save: every column of the keyed record is overwritten.
pub fn upsert_score(conn: &Connection, score: &Score) -> anyhow::Result<()> {
    let position = score
        .position
        .map(i64::try_from)
        .transpose()
        .map_err(|_| anyhow!("position out of range"))?;
    conn.execute(
        "INSERT INTO scores(
            student_id, class_id, session, term, rows_json, average, position,
            affective_json, psychomotor_json, teacher_remark, principal_remark, updated_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(student_id, class_id, session, term) DO UPDATE SET
           rows_json = excluded.rows_json,
           average = excluded.average,
           position = excluded.position,
           affective_json = excluded.affective_json,
           psychomotor_json = excluded.psychomotor_json,
           teacher_remark = excluded.teacher_remark,
           principal_remark = excluded.principal_remark,
           updated_at = excluded.updated_at",
        rusqlite::params![
            score.student_id,
            score.class_id,
            score.session,
            score.term,
            serde_json::to_string(&score.rows)?,
            score.average,
            position,
            serde_json::to_string(&score.affective)?,
            serde_json::to_string(&score.psychomotor)?,
            score.teacher_remark,
            score.principal_remark,
            now_stamp(),
        ],
    )?;
    Ok(())
}

pub fn delete_score(
    conn: &Connection,
    student_id: &str,
    class_id: &str,
    period: &Period,
) -> anyhow::Result<bool> {
    let deleted = conn.execute(
        "DELETE FROM scores WHERE student_id = ? AND class_id = ? AND session = ? AND term = ?",
        (student_id, class_id, &period.session, &period.term),
    )?;
    Ok(deleted > 0)
}

// ---------------------------------------------------------------------------
// Fees, payments, expenses

fn period_clause(period: Option<&Period>, binds: &mut Vec<Value>) -> &'static str {
    match period {
        Some(p) => {
            binds.push(Value::Text(p.session.clone()));
            binds.push(Value::Text(p.term.clone()));
            " WHERE session = ? AND term = ?"
        }
        None => " WHERE 1 = 1",
    }
}

fn fee_from_row(r: &Row<'_>) -> rusqlite::Result<FeeStructure> {
    Ok(FeeStructure {
        id: r.get(0)?,
        name: r.get(1)?,
        amount: r.get(2)?,
        session: r.get(3)?,
        term: r.get(4)?,
        class_id: r.get(5)?,
    })
}

pub fn list_fees(conn: &Connection, period: Option<&Period>) -> anyhow::Result<Vec<FeeStructure>> {
    let mut binds = Vec::new();
    let sql = format!(
        "SELECT id, name, amount, session, term, class_id FROM fee_structures{} ORDER BY session, term, name",
        period_clause(period, &mut binds)
    );
    let mut stmt = conn.prepare(&sql)?;
    let fees = stmt
        .query_map(params_from_iter(binds), fee_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(fees)
}

pub fn get_fee(conn: &Connection, fee_id: &str) -> anyhow::Result<Option<FeeStructure>> {
    Ok(conn
        .query_row(
            "SELECT id, name, amount, session, term, class_id FROM fee_structures WHERE id = ?",
            [fee_id],
            fee_from_row,
        )
        .optional()?)
}

pub fn insert_fee(conn: &Connection, fee: &FeeStructure) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO fee_structures(id, name, amount, session, term, class_id)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &fee.id,
            &fee.name,
            fee.amount,
            &fee.session,
            &fee.term,
            &fee.class_id,
        ),
    )?;
    Ok(())
}

/// Payments linked to the fee keep their amount but lose the link.
pub fn delete_fee(conn: &Connection, fee_id: &str) -> anyhow::Result<bool> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE payments SET fee_structure_id = NULL WHERE fee_structure_id = ?",
        [fee_id],
    )?;
    let deleted = tx.execute("DELETE FROM fee_structures WHERE id = ?", [fee_id])?;
    tx.commit()?;
    Ok(deleted > 0)
}

pub fn list_payments(
    conn: &Connection,
    period: Option<&Period>,
    student_id: Option<&str>,
) -> anyhow::Result<Vec<Payment>> {
    let mut binds = Vec::new();
    let mut sql = format!(
        "SELECT id, student_id, amount, date, session, term, method, fee_structure_id, reference
         FROM payments{}",
        period_clause(period, &mut binds)
    );
    if let Some(sid) = student_id {
        sql.push_str(" AND student_id = ?");
        binds.push(Value::Text(sid.to_string()));
    }
    sql.push_str(" ORDER BY date, rowid");

    let mut stmt = conn.prepare(&sql)?;
    let raw = stmt
        .query_map(params_from_iter(binds), |r| {
            let method: String = r.get(6)?;
            Ok((
                Payment {
                    id: r.get(0)?,
                    student_id: r.get(1)?,
                    amount: r.get(2)?,
                    date: r.get(3)?,
                    session: r.get(4)?,
                    term: r.get(5)?,
                    method: PaymentMethod::Other,
                    fee_structure_id: r.get(7)?,
                    reference: r.get(8)?,
                },
                method,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    raw.into_iter()
        .map(|(mut p, method)| {
            p.method = PaymentMethod::parse(&method)
                .ok_or_else(|| anyhow!("payment {} has unknown method {}", p.id, method))?;
            Ok(p)
        })
        .collect()
}

pub fn insert_payment(conn: &Connection, p: &Payment) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO payments(id, student_id, amount, date, session, term, method, fee_structure_id, reference)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            p.id,
            p.student_id,
            p.amount,
            p.date,
            p.session,
            p.term,
            p.method.as_str(),
            p.fee_structure_id,
            p.reference,
        ],
    )?;
    Ok(())
}

pub fn delete_payment(conn: &Connection, payment_id: &str) -> anyhow::Result<bool> {
    Ok(conn.execute("DELETE FROM payments WHERE id = ?", [payment_id])? > 0)
}

pub fn list_expenses(conn: &Connection, period: Option<&Period>) -> anyhow::Result<Vec<Expense>> {
    let mut binds = Vec::new();
    let sql = format!(
        "SELECT id, description, amount, date, session, term, category FROM expenses{} ORDER BY date, rowid",
        period_clause(period, &mut binds)
    );
    let mut stmt = conn.prepare(&sql)?;
    let expenses = stmt
        .query_map(params_from_iter(binds), |r| {
            Ok(Expense {
                id: r.get(0)?,
                description: r.get(1)?,
                amount: r.get(2)?,
                date: r.get(3)?,
                session: r.get(4)?,
                term: r.get(5)?,
                category: r.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(expenses)
}

pub fn insert_expense(conn: &Connection, e: &Expense) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO expenses(id, description, amount, date, session, term, category)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![e.id, e.description, e.amount, e.date, e.session, e.term, e.category],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Attendance

type AttendanceRaw = (String, String, String, String, String);

fn attendance_from_row(r: &Row<'_>) -> rusqlite::Result<AttendanceRaw> {
    Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?))
}

fn decode_attendance(raw: AttendanceRaw) -> anyhow::Result<Attendance> {
    let (class_id, date, session, term, entries_json) = raw;
    let entries: Vec<AttendanceEntry> = serde_json::from_str(&entries_json)
        .with_context(|| format!("attendance {} {} has invalid entries_json", class_id, date))?;
    Ok(Attendance {
        class_id,
        date,
        session,
        term,
        entries,
    })
}

pub fn list_attendance(
    conn: &Connection,
    class_id: &str,
    period: &Period,
) -> anyhow::Result<Vec<Attendance>> {
    let mut stmt = conn.prepare(
        "SELECT class_id, date, session, term, entries_json
         FROM attendance
         WHERE class_id = ? AND session = ? AND term = ?
         ORDER BY date",
    )?;
    let raw = stmt
        .query_map((class_id, &period.session, &period.term), attendance_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    raw.into_iter().map(decode_attendance).collect()
}

pub fn get_attendance(
    conn: &Connection,
    class_id: &str,
    date: &str,
    period: &Period,
) -> anyhow::Result<Option<Attendance>> {
    let raw = conn
        .query_row(
            "SELECT class_id, date, session, term, entries_json
             FROM attendance
             WHERE class_id = ? AND date = ? AND session = ? AND term = ?",
            (class_id, date, &period.session, &period.term),
            attendance_from_row,
        )
        .optional()?;
    raw.map(decode_attendance).transpose()
}

/// Replace-on-save for the (class, date, session, term) record.
pub fn upsert_attendance(conn: &Connection, a: &Attendance) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO attendance(class_id, date, session, term, entries_json, updated_at)
         VALUES(?, ?, ?, ?, ?, ?)
         ON CONFLICT(class_id, date, session, term) DO UPDATE SET
           entries_json = excluded.entries_json,
           updated_at = excluded.updated_at",
        (
            &a.class_id,
            &a.date,
            &a.session,
            &a.term,
            serde_json::to_string(&a.entries)?,
            now_stamp(),
        ),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AttendanceStatus;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let p = std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        std::fs::create_dir_all(&p).expect("create temp dir");
        p
    }

    fn seed(conn: &Connection) {
        insert_class(
            conn,
            &Class {
                id: "c1".to_string(),
                name: "Primary 1".to_string(),
                subjects: vec!["English".to_string()],
                class_teacher_id: None,
            },
        )
        .expect("insert class");
        insert_student(
            conn,
            &Student {
                id: "s1".to_string(),
                student_no: Some("ADM/001".to_string()),
                first_name: "Ngozi".to_string(),
                last_name: "Obi".to_string(),
                gender: Some("F".to_string()),
                birth_date: None,
                guardian_name: None,
                guardian_phone: None,
                guardian_email: None,
                class_id: Some("c1".to_string()),
            },
        )
        .expect("insert student");
    }

    fn score(rows: Vec<ScoreRow>, remark: Option<&str>) -> Score {
        Score {
            student_id: "s1".to_string(),
            class_id: "c1".to_string(),
            session: "2025/2026".to_string(),
            term: "First Term".to_string(),
            average: crate::calc::grade::term_average(&rows),
            rows,
            position: None,
            affective: BTreeMap::from([("Punctuality".to_string(), 4)]),
            psychomotor: BTreeMap::new(),
            teacher_remark: remark.map(|s| s.to_string()),
            principal_remark: None,
        }
    }

    #[test]
    fn score_save_replaces_whole_record() {
        let workspace = temp_dir("schoold-store-score");
        let conn = crate::db::open_db(&workspace).expect("open db");
        seed(&conn);
        let period = Period::new("2025/2026", "First Term");

        let first = score(
            vec![
                ScoreRow::graded("English", 10.0, 10.0, 40.0),
                ScoreRow::graded("Mathematics", 10.0, 10.0, 40.0),
            ],
            Some("Good start"),
        );
        upsert_score(&conn, &first).expect("save first");

        let mut second = score(vec![ScoreRow::graded("English", 20.0, 20.0, 55.0)], None);
        second.affective.clear();
        upsert_score(&conn, &second).expect("save second");

        let all = list_scores(&conn, &period, None).expect("list");
        assert_eq!(all.len(), 1);
        let stored = get_score(&conn, "s1", "c1", &period)
            .expect("get")
            .expect("score exists");
        assert_eq!(stored, second);

        let _ = std::fs::remove_dir_all(workspace);
    }

    #[test]
    fn attendance_save_replaces_whole_record() {
        let workspace = temp_dir("schoold-store-attendance");
        let conn = crate::db::open_db(&workspace).expect("open db");
        seed(&conn);
        let period = Period::new("2025/2026", "First Term");

        let mut record = Attendance {
            class_id: "c1".to_string(),
            date: "2025-09-15".to_string(),
            session: period.session.clone(),
            term: period.term.clone(),
            entries: vec![AttendanceEntry {
                student_id: "s1".to_string(),
                status: AttendanceStatus::Absent,
            }],
        };
        upsert_attendance(&conn, &record).expect("save");
        record.entries[0].status = AttendanceStatus::Late;
        upsert_attendance(&conn, &record).expect("save again");

        let listed = list_attendance(&conn, "c1", &period).expect("list");
        assert_eq!(listed, vec![record]);

        let _ = std::fs::remove_dir_all(workspace);
    }

    fn pupil(id: &str, class_id: &str) -> Student {
        Student {
            id: id.to_string(),
            student_no: None,
            first_name: id.to_string(),
            last_name: "Eze".to_string(),
            gender: None,
            birth_date: None,
            guardian_name: None,
            guardian_phone: None,
            guardian_email: None,
            class_id: Some(class_id.to_string()),
        }
    }

    #[test]
    fn moved_student_joins_end_of_new_roster() {
        let workspace = temp_dir("schoold-store-transfer");
        let conn = crate::db::open_db(&workspace).expect("open db");
        seed(&conn);
        insert_class(
            &conn,
            &Class {
                id: "c2".to_string(),
                name: "Primary 2".to_string(),
                subjects: Vec::new(),
                class_teacher_id: None,
            },
        )
        .expect("insert class");
        insert_student(&conn, &pupil("mover", "c1")).expect("insert mover");
        insert_student(&conn, &pupil("b0", "c2")).expect("insert b0");
        insert_student(&conn, &pupil("b1", "c2")).expect("insert b1");

        let mut moved = get_student(&conn, "mover").expect("get").expect("mover");
        moved.class_id = Some("c2".to_string());
        assert!(update_student(&conn, &moved).expect("update"));

        let roster: Vec<String> = list_students(&conn, Some("c2"))
            .expect("list")
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(roster, vec!["b0", "b1", "mover"]);

        // Editing other fields keeps the slot.
        moved.guardian_phone = Some("0801".to_string());
        update_student(&conn, &moved).expect("update again");
        let roster: Vec<String> = list_students(&conn, Some("c2"))
            .expect("list")
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(roster, vec!["b0", "b1", "mover"]);

        let _ = std::fs::remove_dir_all(workspace);
    }

    #[test]
    fn deleting_class_unassigns_students() {
        let workspace = temp_dir("schoold-store-class-delete");
        let conn = crate::db::open_db(&workspace).expect("open db");
        seed(&conn);
        upsert_score(&conn, &score(vec![], None)).expect("save score");

        assert!(delete_class(&conn, "c1").expect("delete"));
        let s = get_student(&conn, "s1").expect("get").expect("student kept");
        assert_eq!(s.class_id, None);
        let period = Period::new("2025/2026", "First Term");
        assert!(list_scores(&conn, &period, None).expect("list").is_empty());

        let _ = std::fs::remove_dir_all(workspace);
    }
}
