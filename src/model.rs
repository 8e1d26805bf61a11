use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Academic session plus term, e.g. `("2025/2026", "First Term")`.
///
/// Every aggregate in `calc` filters on this pair before it sums anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub session: String,
    pub term: String,
}

impl Period {
    pub fn new(session: impl Into<String>, term: impl Into<String>) -> Self {
        Self {
            session: session.into(),
            term: term.into(),
        }
    }

    pub fn matches(&self, session: &str, term: &str) -> bool {
        self.session == session && self.term == term
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub student_no: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub gender: Option<String>,
    pub birth_date: Option<String>,
    pub guardian_name: Option<String>,
    pub guardian_phone: Option<String>,
    pub guardian_email: Option<String>,
    pub class_id: Option<String>,
}

impl Student {
    pub fn display_name(&self) -> String {
        format!("{}, {}", self.last_name, self.first_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub subjects: Vec<String>,
    pub class_teacher_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRow {
    pub subject: String,
    pub ca1: f64,
    pub ca2: f64,
    pub exam: f64,
    pub total: f64,
    pub grade: String,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    pub student_id: String,
    pub class_id: String,
    pub session: String,
    pub term: String,
    pub rows: Vec<ScoreRow>,
    pub average: f64,
    pub position: Option<usize>,
    #[serde(default)]
    pub affective: BTreeMap<String, u8>,
    #[serde(default)]
    pub psychomotor: BTreeMap<String, u8>,
    pub teacher_remark: Option<String>,
    pub principal_remark: Option<String>,
}

impl Score {
    pub fn in_period(&self, period: &Period) -> bool {
        period.matches(&self.session, &self.term)
    }

    /// Matches the record's full key: student, class and period.
    pub fn is_for(&self, student_id: &str, class_id: &str, period: &Period) -> bool {
        self.student_id == student_id && self.class_id == class_id && self.in_period(period)
    }

    pub fn aggregate_total(&self) -> f64 {
        self.rows.iter().map(|r| r.total).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeStructure {
    pub id: String,
    pub name: String,
    pub amount: f64,
    pub session: String,
    pub term: String,
    /// `None` means the charge applies to every class.
    pub class_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Transfer,
    Pos,
    Cheque,
    Other,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Transfer => "transfer",
            PaymentMethod::Pos => "pos",
            PaymentMethod::Cheque => "cheque",
            PaymentMethod::Other => "other",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "cash" => Some(PaymentMethod::Cash),
            "transfer" | "bank_transfer" | "bank transfer" => Some(PaymentMethod::Transfer),
            "pos" | "card" => Some(PaymentMethod::Pos),
            "cheque" | "check" => Some(PaymentMethod::Cheque),
            "other" => Some(PaymentMethod::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub student_id: String,
    pub amount: f64,
    pub date: String,
    pub session: String,
    pub term: String,
    pub method: PaymentMethod,
    pub fee_structure_id: Option<String>,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: String,
    pub description: String,
    pub amount: f64,
    pub date: String,
    pub session: String,
    pub term: String,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEntry {
    pub student_id: String,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
    pub class_id: String,
    pub date: String,
    pub session: String,
    pub term: String,
    pub entries: Vec<AttendanceEntry>,
}

impl Attendance {
    pub fn in_period(&self, period: &Period) -> bool {
        period.matches(&self.session, &self.term)
    }
}
