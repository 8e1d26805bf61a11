use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
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

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_schoold");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn schoold");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({ "id": id, "method": method, "params": params });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> &str {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

fn create_student(
    i: &mut ChildStdin,
    r: &mut BufReader<ChildStdout>,
    id: &str,
    first: &str,
    class_id: Option<&str>,
) -> String {
    let created = request_ok(
        i,
        r,
        id,
        "students.create",
        json!({ "firstName": first, "lastName": "Okafor", "classId": class_id }),
    );
    created["studentId"].as_str().expect("studentId").to_string()
}

#[test]
fn balance_invoice_and_summary_follow_payments() {
    let workspace = temp_dir("schoold-ledger");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let (i, r) = (&mut stdin, &mut reader);

    request_ok(i, r, "1", "workspace.select", json!({ "path": workspace.to_string_lossy() }));
    request_ok(
        i,
        r,
        "2",
        "period.set",
        json!({ "session": "2025/2026", "term": "First Term" }),
    );
    let class_id = request_ok(i, r, "3", "classes.create", json!({ "name": "Primary 4" }))
        ["classId"]
        .as_str()
        .expect("classId")
        .to_string();
    let ada = create_student(i, r, "4", "Ada", Some(&class_id));
    let tunde = create_student(i, r, "5", "Tunde", None);

    request_ok(
        i,
        r,
        "6",
        "fees.create",
        json!({ "name": "Tuition", "amount": 5000, "classId": class_id }),
    );
    let levy = request_ok(
        i,
        r,
        "7",
        "fees.create",
        json!({ "name": "Development Levy", "amount": 3000 }),
    );
    assert!(levy["fee"]["classId"].is_null());

    let zero = request_ok(i, r, "8", "ledger.balance", json!({ "studentId": ada }));
    assert_eq!(zero["totalBill"].as_f64(), Some(8000.0));
    assert_eq!(zero["balance"].as_f64(), Some(8000.0));

    request_ok(
        i,
        r,
        "9",
        "payments.create",
        json!({ "studentId": ada, "amount": 4000, "method": "cash", "date": "2025-09-15" }),
    );
    let half = request_ok(i, r, "10", "ledger.balance", json!({ "studentId": ada }));
    assert_eq!(half["totalPaid"].as_f64(), Some(4000.0));
    assert_eq!(half["balance"].as_f64(), Some(4000.0));

    let overpaid = request_ok(
        i,
        r,
        "11",
        "payments.create",
        json!({ "studentId": ada, "amount": 5000, "method": "Bank Transfer", "reference": "TRF-991" }),
    );
    assert_eq!(overpaid["payment"]["method"], "transfer");

    let credit = request_ok(i, r, "12", "ledger.balance", json!({ "studentId": ada }));
    assert_eq!(credit["balance"].as_f64(), Some(-1000.0));

    let invoice = request_ok(i, r, "13", "ledger.invoice", json!({ "studentId": ada }));
    assert_eq!(invoice["lines"].as_array().map(|a| a.len()), Some(2));
    assert_eq!(invoice["payments"].as_array().map(|a| a.len()), Some(2));
    assert_eq!(invoice["amountDue"].as_f64(), Some(0.0));
    assert_eq!(invoice["credit"].as_f64(), Some(1000.0));

    // Unassigned students still owe class-independent fees.
    let tunde_bal = request_ok(i, r, "14", "ledger.balance", json!({ "studentId": tunde }));
    assert_eq!(tunde_bal["totalBill"].as_f64(), Some(3000.0));

    request_ok(
        i,
        r,
        "15",
        "expenses.create",
        json!({ "description": "Chalk", "amount": 2000, "category": "supplies" }),
    );

    let summary = request_ok(i, r, "16", "finance.summary", json!({}));
    let s = &summary["summary"];
    assert_eq!(s["studentCount"].as_u64(), Some(2));
    assert_eq!(s["expectedRevenue"].as_f64(), Some(11000.0));
    assert_eq!(s["totalRevenue"].as_f64(), Some(9000.0));
    assert_eq!(s["collectionRate"].as_f64(), Some(81.82));
    assert_eq!(s["outstanding"].as_f64(), Some(3000.0));
    assert_eq!(s["debtorCount"].as_u64(), Some(1));
    assert_eq!(s["totalExpenses"].as_f64(), Some(2000.0));
    assert_eq!(s["netIncome"].as_f64(), Some(7000.0));

    // Nothing billed in another term means a zero rate, not a division error.
    let empty = request_ok(
        i,
        r,
        "17",
        "finance.summary",
        json!({ "session": "2025/2026", "term": "Third Term" }),
    );
    assert_eq!(empty["summary"]["collectionRate"].as_f64(), Some(0.0));
    assert_eq!(empty["summary"]["expectedRevenue"].as_f64(), Some(0.0));

    let listed = request_ok(i, r, "18", "payments.list", json!({ "studentId": ada }));
    assert_eq!(listed["payments"].as_array().map(|a| a.len()), Some(2));
    let pid = listed["payments"][0]["id"].as_str().expect("payment id").to_string();
    request_ok(i, r, "19", "payments.delete", json!({ "paymentId": pid }));
    let after = request_ok(i, r, "20", "ledger.balance", json!({ "studentId": ada }));
    assert_eq!(after["totalPaid"].as_f64().map(|v| v < 9000.0), Some(true));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn payments_validate_inputs() {
    let workspace = temp_dir("schoold-ledger-validate");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let (i, r) = (&mut stdin, &mut reader);

    let before = request(i, r, "0", "ledger.balance", json!({ "studentId": "x" }));
    assert_eq!(error_code(&before), "no_workspace");

    request_ok(i, r, "1", "workspace.select", json!({ "path": workspace.to_string_lossy() }));
    let ada = create_student(i, r, "2", "Ada", None);
    let period = json!({ "session": "2025/2026", "term": "First Term" });

    let mut params = period.clone();
    params["studentId"] = json!(ada);
    params["amount"] = json!(-5);
    params["method"] = json!("cash");
    let negative = request(i, r, "3", "payments.create", params.clone());
    assert_eq!(error_code(&negative), "bad_params");

    params["amount"] = json!(100);
    params["method"] = json!("barter");
    let method = request(i, r, "4", "payments.create", params.clone());
    assert_eq!(error_code(&method), "bad_params");

    params["method"] = json!("pos");
    params["studentId"] = json!("ghost");
    let ghost = request(i, r, "5", "payments.create", params.clone());
    assert_eq!(error_code(&ghost), "not_found");

    params["studentId"] = json!(ada);
    params["date"] = json!("2025-13-40");
    let bad_date = request(i, r, "6", "payments.create", params);
    assert_eq!(error_code(&bad_date), "bad_params");

    let half_period = request(
        i,
        r,
        "7",
        "ledger.balance",
        json!({ "studentId": ada, "session": "2025/2026" }),
    );
    assert_eq!(error_code(&half_period), "bad_params");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn payment_history_outlives_deletion_attempts() {
    let workspace = temp_dir("schoold-ledger-history");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let (i, r) = (&mut stdin, &mut reader);

    request_ok(i, r, "1", "workspace.select", json!({ "path": workspace.to_string_lossy() }));
    request_ok(
        i,
        r,
        "2",
        "period.set",
        json!({ "session": "2025/2026", "term": "First Term" }),
    );
    let ada = create_student(i, r, "3", "Ada", None);
    let old_fee = request_ok(
        i,
        r,
        "4",
        "fees.create",
        json!({ "name": "Tuition", "amount": 3000, "session": "2024/2025", "term": "Third Term" }),
    )["feeId"]
        .as_str()
        .expect("feeId")
        .to_string();

    // A fee from another term cannot be paid against in this one.
    let mismatched = request(
        i,
        r,
        "5",
        "payments.create",
        json!({ "studentId": ada, "amount": 1000, "method": "cash", "feeStructureId": old_fee }),
    );
    assert_eq!(error_code(&mismatched), "bad_params");
    assert_eq!(mismatched["error"]["details"]["feeTerm"], "Third Term");

    let missing_fee = request(
        i,
        r,
        "6",
        "payments.create",
        json!({ "studentId": ada, "amount": 1000, "method": "cash", "feeStructureId": "nope" }),
    );
    assert_eq!(error_code(&missing_fee), "not_found");

    let payment_id = request_ok(
        i,
        r,
        "7",
        "payments.create",
        json!({ "studentId": ada, "amount": 1000, "method": "cash" }),
    )["paymentId"]
        .as_str()
        .expect("paymentId")
        .to_string();

    let refused = request(i, r, "8", "students.delete", json!({ "studentId": ada }));
    assert_eq!(error_code(&refused), "bad_params");
    assert_eq!(refused["error"]["details"]["paymentCount"].as_u64(), Some(1));
    let summary = request_ok(i, r, "9", "finance.summary", json!({}));
    assert_eq!(summary["summary"]["totalRevenue"].as_f64(), Some(1000.0));

    request_ok(i, r, "10", "payments.delete", json!({ "paymentId": payment_id }));
    request_ok(i, r, "11", "students.delete", json!({ "studentId": ada }));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
