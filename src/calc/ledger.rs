use crate::calc::{percent_of, round_off_2_decimals};
use crate::model::{Expense, FeeStructure, Payment, Period, Student};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub total_bill: f64,
    pub total_paid: f64,
    /// Signed: negative means the student is in credit.
    pub balance: f64,
}

impl Balance {
    /// What an invoice shows as due; never below zero.
    pub fn amount_due(&self) -> f64 {
        self.balance.max(0.0)
    }

    pub fn credit(&self) -> f64 {
        (-self.balance).max(0.0)
    }
}

/// Global fees plus fees for `class_id`, restricted to `period`.
pub fn applicable_fees<'a>(
    class_id: Option<&'a str>,
    fees: &'a [FeeStructure],
    period: &'a Period,
) -> impl Iterator<Item = &'a FeeStructure> + 'a {
    fees.iter().filter(move |f| {
        period.matches(&f.session, &f.term)
            && match f.class_id.as_deref() {
                None => true,
                Some(fee_class) => class_id == Some(fee_class),
            }
    })
}

pub fn payments_for<'a>(
    student_id: &'a str,
    payments: &'a [Payment],
    period: &'a Period,
) -> impl Iterator<Item = &'a Payment> + 'a {
    payments
        .iter()
        .filter(move |p| p.student_id == student_id && period.matches(&p.session, &p.term))
}

pub fn balance_for(
    student: &Student,
    fees: &[FeeStructure],
    payments: &[Payment],
    period: &Period,
) -> Balance {
    let total_bill: f64 = applicable_fees(student.class_id.as_deref(), fees, period)
        .map(|f| f.amount)
        .sum();
    let total_paid: f64 = payments_for(&student.id, payments, period)
        .map(|p| p.amount)
        .sum();
    Balance {
        total_bill,
        total_paid,
        balance: total_bill - total_paid,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinanceSummary {
    pub session: String,
    pub term: String,
    pub student_count: usize,
    pub total_revenue: f64,
    pub expected_revenue: f64,
    /// Percentage, 0 when nothing is billed.
    pub collection_rate: f64,
    pub outstanding: f64,
    pub debtor_count: usize,
    pub total_expenses: f64,
    pub net_income: f64,
}

pub fn finance_summary(
    students: &[Student],
    fees: &[FeeStructure],
    payments: &[Payment],
    expenses: &[Expense],
    period: &Period,
) -> FinanceSummary {
    let total_revenue: f64 = payments
        .iter()
        .filter(|p| period.matches(&p.session, &p.term))
        .map(|p| p.amount)
        .sum();
    let total_expenses: f64 = expenses
        .iter()
        .filter(|e| period.matches(&e.session, &e.term))
        .map(|e| e.amount)
        .sum();

    let mut expected_revenue = 0.0_f64;
    let mut outstanding = 0.0_f64;
    let mut debtor_count = 0_usize;
    for s in students {
        let b = balance_for(s, fees, payments, period);
        expected_revenue += b.total_bill;
        if b.amount_due() > 0.0 {
            outstanding += b.amount_due();
            debtor_count += 1;
        }
    }

    FinanceSummary {
        session: period.session.clone(),
        term: period.term.clone(),
        student_count: students.len(),
        total_revenue,
        expected_revenue,
        collection_rate: round_off_2_decimals(percent_of(total_revenue, expected_revenue)),
        outstanding,
        debtor_count,
        total_expenses,
        net_income: total_revenue - total_expenses,
    }
}
