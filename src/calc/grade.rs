use crate::calc::round_off_2_decimals;
use crate::model::ScoreRow;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GradeBand {
    pub grade: &'static str,
    pub comment: &'static str,
}

/// Lower bound (inclusive) for each band, checked top-down.
const BANDS: [(f64, GradeBand); 4] = [
    (
        75.0,
        GradeBand {
            grade: "A",
            comment: "Excellent",
        },
    ),
    (
        65.0,
        GradeBand {
            grade: "B",
            comment: "Very Good",
        },
    ),
    (
        50.0,
        GradeBand {
            grade: "C",
            comment: "Good",
        },
    ),
    (
        40.0,
        GradeBand {
            grade: "D",
            comment: "Fair",
        },
    ),
];

const FAIL: GradeBand = GradeBand {
    grade: "F",
    comment: "Fail",
};

pub fn grade_for_total(total: f64) -> GradeBand {
    BANDS
        .iter()
        .find(|(min, _)| total >= *min)
        .map(|(_, band)| *band)
        .unwrap_or(FAIL)
}

/// Upper bounds for the three raw components of a subject row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssessmentPolicy {
    pub max_ca1: f64,
    pub max_ca2: f64,
    pub max_exam: f64,
}

impl Default for AssessmentPolicy {
    fn default() -> Self {
        Self {
            max_ca1: 20.0,
            max_ca2: 20.0,
            max_exam: 60.0,
        }
    }
}

impl AssessmentPolicy {
    /// Returns the name of the first component outside its bounds.
    pub fn out_of_bounds(&self, ca1: f64, ca2: f64, exam: f64) -> Option<&'static str> {
        let within = |v: f64, max: f64| v.is_finite() && (0.0..=max).contains(&v);
        if !within(ca1, self.max_ca1) {
            Some("ca1")
        } else if !within(ca2, self.max_ca2) {
            Some("ca2")
        } else if !within(exam, self.max_exam) {
            Some("exam")
        } else {
            None
        }
    }
}

impl ScoreRow {
    pub fn graded(subject: impl Into<String>, ca1: f64, ca2: f64, exam: f64) -> Self {
        let total = ca1 + ca2 + exam;
        let band = grade_for_total(total);
        Self {
            subject: subject.into(),
            ca1,
            ca2,
            exam,
            total,
            grade: band.grade.to_string(),
            comment: band.comment.to_string(),
        }
    }
}

/// Mean of the row totals, 0 for an empty sheet.
pub fn term_average(rows: &[ScoreRow]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    let sum: f64 = rows.iter().map(|r| r.total).sum();
    round_off_2_decimals(sum / rows.len() as f64)
}
