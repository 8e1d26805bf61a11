use crate::model::{Attendance, AttendanceStatus, Period, Student};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceTally {
    pub student_id: String,
    pub present: usize,
    pub absent: usize,
    pub late: usize,
}

/// Per-student counts over the class's attendance records for `period`, in
/// roster order. Entries for students not on the roster are dropped.
pub fn attendance_summary(
    class_id: &str,
    students: &[Student],
    records: &[Attendance],
    period: &Period,
) -> Vec<AttendanceTally> {
    let mut counts: HashMap<&str, (usize, usize, usize)> = HashMap::new();
    for record in records
        .iter()
        .filter(|r| r.in_period(period) && r.class_id == class_id)
    {
        for entry in &record.entries {
            let c = counts.entry(entry.student_id.as_str()).or_default();
            match entry.status {
                AttendanceStatus::Present => c.0 += 1,
                AttendanceStatus::Absent => c.1 += 1,
                AttendanceStatus::Late => c.2 += 1,
            }
        }
    }

    students
        .iter()
        .filter(|s| s.class_id.as_deref() == Some(class_id))
        .map(|s| {
            let (present, absent, late) = counts.get(s.id.as_str()).copied().unwrap_or_default();
            AttendanceTally {
                student_id: s.id.clone(),
                present,
                absent,
                late,
            }
        })
        .collect()
}
