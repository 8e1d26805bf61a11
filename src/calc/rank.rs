use crate::model::{Period, Score, Student};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassPosition {
    pub student_id: String,
    pub total: f64,
    pub position: usize,
}

/// Sum of row totals for the student's score filed under `class_id` in
/// `period`, 0 when none exists.
pub fn aggregate_total_for(
    student_id: &str,
    class_id: &str,
    scores: &[Score],
    period: &Period,
) -> f64 {
    scores
        .iter()
        .find(|s| s.is_for(student_id, class_id, period))
        .map(Score::aggregate_total)
        .unwrap_or(0.0)
}

/// Positions for every student on the roster of `class_id`, best first.
///
/// Equal totals keep roster order (stable sort, no secondary key).
pub fn class_positions(
    class_id: &str,
    students: &[Student],
    scores: &[Score],
    period: &Period,
) -> Vec<ClassPosition> {
    let mut totals: Vec<(&str, f64)> = students
        .iter()
        .filter(|s| s.class_id.as_deref() == Some(class_id))
        .map(|s| (s.id.as_str(), aggregate_total_for(&s.id, class_id, scores, period)))
        .collect();
    // `sort_by` is stable.
    totals.sort_by(|a, b| b.1.total_cmp(&a.1));

    totals
        .into_iter()
        .enumerate()
        .map(|(i, (student_id, total))| ClassPosition {
            student_id: student_id.to_string(),
            total,
            position: i + 1,
        })
        .collect()
}

/// 1-based class position of `student_id`, or `None` if the student is unknown.
pub fn rank_of(
    student_id: &str,
    students: &[Student],
    scores: &[Score],
    period: &Period,
) -> Option<usize> {
    let target = students.iter().find(|s| s.id == student_id)?;
    let class_id = target.class_id.as_deref()?;
    class_positions(class_id, students, scores, period)
        .into_iter()
        .find(|p| p.student_id == student_id)
        .map(|p| p.position)
}
