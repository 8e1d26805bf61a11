use crate::calc::ledger::{applicable_fees, balance_for, finance_summary, payments_for};
use crate::ipc::error::HandlerErr;
use crate::ipc::handlers::classes::load_class;
use crate::ipc::handlers::students::load_student;
use crate::ipc::helpers::{
    get_amount, get_optional_date, get_optional_str, get_required_str, optional_period,
    resolve_period, with_conn,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Expense, FeeStructure, Payment, PaymentMethod};
use crate::store;
use serde_json::json;
use uuid::Uuid;

fn today() -> String {
    chrono::Local::now().date_naive().format("%Y-%m-%d").to_string()
}

fn handle_fees_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let period = optional_period(params)?;
        let fees = store::list_fees(conn, period.as_ref()).map_err(HandlerErr::query)?;
        Ok(json!({ "fees": fees }))
    })
}

fn handle_fees_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let period = resolve_period(conn, params)?;
        let class_id = get_optional_str(params, "classId")?;
        if let Some(cid) = class_id.as_deref() {
            load_class(conn, cid)?;
        }
        let fee = FeeStructure {
            id: Uuid::new_v4().to_string(),
            name: get_required_str(params, "name")?,
            amount: get_amount(params, "amount")?,
            session: period.session,
            term: period.term,
            class_id,
        };
        store::insert_fee(conn, &fee)
            .map_err(|e| HandlerErr::write("db_insert_failed", "fee_structures", e))?;
        Ok(json!({ "feeId": fee.id, "fee": fee }))
    })
}

fn handle_fees_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let fee_id = get_required_str(params, "feeId")?;
        let deleted = store::delete_fee(conn, &fee_id)
            .map_err(|e| HandlerErr::write("db_delete_failed", "fee_structures", e))?;
        if !deleted {
            return Err(HandlerErr::not_found("fee structure"));
        }
        Ok(json!({ "ok": true }))
    })
}

fn handle_payments_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let period = optional_period(params)?;
        let student_id = get_optional_str(params, "studentId")?;
        let payments = store::list_payments(conn, period.as_ref(), student_id.as_deref())
            .map_err(HandlerErr::query)?;
        Ok(json!({ "payments": payments }))
    })
}

fn handle_payments_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let period = resolve_period(conn, params)?;
        let student_id = get_required_str(params, "studentId")?;
        load_student(conn, &student_id)?;

        let method_raw = get_required_str(params, "method")?;
        let method = PaymentMethod::parse(&method_raw).ok_or_else(|| {
            HandlerErr::bad_params("method must be one of cash, transfer, pos, cheque, other")
        })?;

        let fee_structure_id = get_optional_str(params, "feeStructureId")?;
        if let Some(fid) = fee_structure_id.as_deref() {
            let fee = store::get_fee(conn, fid)
                .map_err(HandlerErr::query)?
                .ok_or_else(|| HandlerErr::not_found("fee structure"))?;
            if !period.matches(&fee.session, &fee.term) {
                return Err(HandlerErr::bad_params("fee structure belongs to another period")
                    .with_details(json!({
                        "feeStructureId": fee.id,
                        "feeSession": fee.session,
                        "feeTerm": fee.term
                    })));
            }
        }

        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            student_id,
            amount: get_amount(params, "amount")?,
            date: get_optional_date(params, "date")?.unwrap_or_else(today),
            session: period.session,
            term: period.term,
            method,
            fee_structure_id,
            reference: get_optional_str(params, "reference")?,
        };
        store::insert_payment(conn, &payment)
            .map_err(|e| HandlerErr::write("db_insert_failed", "payments", e))?;
        tracing::debug!(student = %payment.student_id, amount = payment.amount, "payment recorded");
        Ok(json!({ "paymentId": payment.id, "payment": payment }))
    })
}

fn handle_payments_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let payment_id = get_required_str(params, "paymentId")?;
        let deleted = store::delete_payment(conn, &payment_id)
            .map_err(|e| HandlerErr::write("db_delete_failed", "payments", e))?;
        if !deleted {
            return Err(HandlerErr::not_found("payment"));
        }
        Ok(json!({ "ok": true }))
    })
}

fn handle_expenses_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let period = optional_period(params)?;
        let expenses = store::list_expenses(conn, period.as_ref()).map_err(HandlerErr::query)?;
        Ok(json!({ "expenses": expenses }))
    })
}

fn handle_expenses_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let period = resolve_period(conn, params)?;
        let expense = Expense {
            id: Uuid::new_v4().to_string(),
            description: get_required_str(params, "description")?,
            amount: get_amount(params, "amount")?,
            date: get_optional_date(params, "date")?.unwrap_or_else(today),
            session: period.session,
            term: period.term,
            category: get_optional_str(params, "category")?,
        };
        store::insert_expense(conn, &expense)
            .map_err(|e| HandlerErr::write("db_insert_failed", "expenses", e))?;
        Ok(json!({ "expenseId": expense.id, "expense": expense }))
    })
}

fn handle_ledger_balance(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let student_id = get_required_str(params, "studentId")?;
        let period = resolve_period(conn, params)?;
        let student = load_student(conn, &student_id)?;
        let fees = store::list_fees(conn, Some(&period)).map_err(HandlerErr::query)?;
        let payments = store::list_payments(conn, Some(&period), Some(student.id.as_str()))
            .map_err(HandlerErr::query)?;
        let balance = balance_for(&student, &fees, &payments, &period);
        Ok(json!({
            "studentId": student.id,
            "session": period.session,
            "term": period.term,
            "totalBill": balance.total_bill,
            "totalPaid": balance.total_paid,
            "balance": balance.balance
        }))
    })
}

fn handle_ledger_invoice(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let student_id = get_required_str(params, "studentId")?;
        let period = resolve_period(conn, params)?;
        let student = load_student(conn, &student_id)?;
        let fees = store::list_fees(conn, Some(&period)).map_err(HandlerErr::query)?;
        let payments = store::list_payments(conn, Some(&period), Some(student.id.as_str()))
            .map_err(HandlerErr::query)?;
        let balance = balance_for(&student, &fees, &payments, &period);

        let lines: Vec<&FeeStructure> =
            applicable_fees(student.class_id.as_deref(), &fees, &period).collect();
        let paid: Vec<&Payment> = payments_for(&student.id, &payments, &period).collect();

        // Invoices never show a negative amount due; overpayment is reported as credit.
        Ok(json!({
            "student": student,
            "displayName": student.display_name(),
            "session": period.session,
            "term": period.term,
            "lines": lines,
            "payments": paid,
            "totalBill": balance.total_bill,
            "totalPaid": balance.total_paid,
            "amountDue": balance.amount_due(),
            "credit": balance.credit()
        }))
    })
}

fn handle_finance_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    with_conn(state, req, |conn, params| {
        let period = resolve_period(conn, params)?;
        let students = store::list_students(conn, None).map_err(HandlerErr::query)?;
        let fees = store::list_fees(conn, Some(&period)).map_err(HandlerErr::query)?;
        let payments = store::list_payments(conn, Some(&period), None).map_err(HandlerErr::query)?;
        let expenses = store::list_expenses(conn, Some(&period)).map_err(HandlerErr::query)?;
        let summary = finance_summary(&students, &fees, &payments, &expenses, &period);
        Ok(json!({ "summary": summary }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "fees.list" => Some(handle_fees_list(state, req)),
        "fees.create" => Some(handle_fees_create(state, req)),
        "fees.delete" => Some(handle_fees_delete(state, req)),
        "payments.list" => Some(handle_payments_list(state, req)),
        "payments.create" => Some(handle_payments_create(state, req)),
        "payments.delete" => Some(handle_payments_delete(state, req)),
        "expenses.list" => Some(handle_expenses_list(state, req)),
        "expenses.create" => Some(handle_expenses_create(state, req)),
        "ledger.balance" => Some(handle_ledger_balance(state, req)),
        "ledger.invoice" => Some(handle_ledger_invoice(state, req)),
        "finance.summary" => Some(handle_finance_summary(state, req)),
        _ => None,
    }
}
