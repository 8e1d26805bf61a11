use crate::calc::grade::term_average;
use crate::calc::rank::class_positions;
use crate::calc::round_off_2_decimals;
use crate::calc::subjects::subjects_for;
use crate::model::{Class, Period, Score, Student};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadsheetRow {
    pub student_id: String,
    pub display_name: String,
    /// One cell per subject column; `None` when nothing was entered.
    pub cells: Vec<Option<f64>>,
    pub total: f64,
    pub average: f64,
    pub position: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectColumn {
    pub subject: String,
    pub entered_count: usize,
    pub class_average: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Broadsheet {
    pub class_id: String,
    pub class_name: String,
    pub session: String,
    pub term: String,
    pub subjects: Vec<SubjectColumn>,
    pub rows: Vec<BroadsheetRow>,
}

pub fn compile_broadsheet(
    class: &Class,
    students: &[Student],
    scores: &[Score],
    period: &Period,
) -> Broadsheet {
    let subjects = subjects_for(class);
    let positions: HashMap<String, usize> = class_positions(&class.id, students, scores, period)
        .into_iter()
        .map(|p| (p.student_id, p.position))
        .collect();

    let mut rows: Vec<BroadsheetRow> = Vec::new();
    for s in students
        .iter()
        .filter(|s| s.class_id.as_deref() == Some(class.id.as_str()))
    {
        let score = scores
            .iter()
            .find(|sc| sc.is_for(&s.id, &class.id, period));

        let cells: Vec<Option<f64>> = subjects
            .iter()
            .map(|subject| {
                score.and_then(|sc| {
                    sc.rows
                        .iter()
                        .find(|r| r.subject.eq_ignore_ascii_case(subject))
                        .map(|r| r.total)
                })
            })
            .collect();

        let (total, average) = match score {
            Some(sc) => (sc.aggregate_total(), term_average(&sc.rows)),
            None => (0.0, 0.0),
        };

        rows.push(BroadsheetRow {
            student_id: s.id.clone(),
            display_name: s.display_name(),
            cells,
            total,
            average,
            position: positions.get(&s.id).copied().unwrap_or(0),
        });
    }

    let columns: Vec<SubjectColumn> = subjects
        .iter()
        .enumerate()
        .map(|(i, subject)| {
            let entered: Vec<f64> = rows.iter().filter_map(|r| r.cells[i]).collect();
            let class_average = if entered.is_empty() {
                0.0
            } else {
                round_off_2_decimals(entered.iter().sum::<f64>() / entered.len() as f64)
            };
            SubjectColumn {
                subject: subject.clone(),
                entered_count: entered.len(),
                class_average,
            }
        })
        .collect();

    Broadsheet {
        class_id: class.id.clone(),
        class_name: class.name.clone(),
        session: period.session.clone(),
        term: period.term.clone(),
        subjects: columns,
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScoreRow;
    use std::collections::BTreeMap;

    fn student(id: &str) -> Student {
        Student {
            id: id.to_string(),
            student_no: None,
            first_name: id.to_uppercase(),
            last_name: "Okafor".to_string(),
            gender: None,
            birth_date: None,
            guardian_name: None,
            guardian_phone: None,
            guardian_email: None,
            class_id: Some("p4".to_string()),
        }
    }

    fn score(student_id: &str, rows: Vec<ScoreRow>) -> Score {
        Score {
            student_id: student_id.to_string(),
            class_id: "p4".to_string(),
            session: "2025/2026".to_string(),
            term: "First Term".to_string(),
            rows,
            average: 0.0,
            position: None,
            affective: BTreeMap::new(),
            psychomotor: BTreeMap::new(),
            teacher_remark: None,
            principal_remark: None,
        }
    }

    fn class() -> Class {
        Class {
            id: "p4".to_string(),
            name: "Primary 4".to_string(),
            subjects: vec!["English".to_string(), "Mathematics".to_string()],
            class_teacher_id: None,
        }
    }

    #[test]
    fn partial_entry_renders_blank_cells() {
        let students = vec![student("a"), student("b"), student("c")];
        let scores = vec![
            score(
                "a",
                vec![
                    ScoreRow::graded("English", 10.0, 10.0, 40.0),
                    ScoreRow::graded("Mathematics", 20.0, 20.0, 50.0),
                ],
            ),
            score("b", vec![ScoreRow::graded("mathematics", 15.0, 15.0, 50.0)]),
        ];
        let period = Period::new("2025/2026", "First Term");
        let sheet = compile_broadsheet(&class(), &students, &scores, &period);

        assert_eq!(sheet.rows.len(), 3);
        assert_eq!(sheet.rows[0].cells, vec![Some(60.0), Some(90.0)]);
        assert_eq!(sheet.rows[0].position, 1);
        assert_eq!(sheet.rows[1].cells, vec![None, Some(80.0)]);
        assert_eq!(sheet.rows[2].cells, vec![None, None]);
        assert_eq!(sheet.rows[2].total, 0.0);
        assert_eq!(sheet.rows[2].position, 3);

        assert_eq!(sheet.subjects[0].entered_count, 1);
        assert_eq!(sheet.subjects[1].class_average, 85.0);
    }

    #[test]
    fn scores_from_a_previous_class_stay_out() {
        let students = vec![student("a")];
        let mut earlier = score("a", vec![ScoreRow::graded("English", 20.0, 20.0, 50.0)]);
        earlier.class_id = "p3".to_string();
        let current = score("a", vec![ScoreRow::graded("English", 2.0, 3.0, 5.0)]);
        let sheet = compile_broadsheet(
            &class(),
            &students,
            &[earlier, current],
            &Period::new("2025/2026", "First Term"),
        );
        assert_eq!(sheet.rows[0].cells, vec![Some(10.0), None]);
        assert_eq!(sheet.rows[0].total, 10.0);
    }

    #[test]
    fn other_periods_do_not_leak_in() {
        let students = vec![student("a")];
        let scores = vec![score("a", vec![ScoreRow::graded("English", 1.0, 1.0, 1.0)])];
        let period = Period::new("2025/2026", "Second Term");
        let sheet = compile_broadsheet(&class(), &students, &scores, &period);
        assert_eq!(sheet.rows[0].cells, vec![None, None]);
        assert_eq!(sheet.rows[0].average, 0.0);
    }
}
