use std::fs;

use export_core::{LedgerEntry, LedgerStatus};
use export_engine::{row_fields, Ledger, LEDGER_FILE_NAME, LEDGER_HEADER};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn entry(text: &str, file_name: &str, status: LedgerStatus) -> LedgerEntry {
    LedgerEntry {
        text: text.to_string(),
        file_name: file_name.to_string(),
        status,
    }
}

#[test]
fn header_is_written_exactly_once() {
    for n in [1usize, 2, 7] {
        let temp = TempDir::new().unwrap();
        let ledger = Ledger::in_dir(temp.path());
        for i in 0..n {
            ledger
                .append(&entry(&format!("Item {i}"), &format!("ITEM_{i}.pdf"), LedgerStatus::Success))
                .unwrap();
        }
        let content = fs::read_to_string(temp.path().join(LEDGER_FILE_NAME)).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), n + 1);
        assert_eq!(lines[0], LEDGER_HEADER);
        assert_eq!(lines.iter().filter(|l| **l == LEDGER_HEADER).count(), 1);
    }
}

#[test]
fn reopening_an_existing_ledger_appends() {
    let temp = TempDir::new().unwrap();
    Ledger::in_dir(temp.path())
        .append(&entry("Jan 2024", "JAN_2024.pdf", LedgerStatus::Success))
        .unwrap();
    Ledger::in_dir(temp.path())
        .append(&entry("Feb 2024", "FEB_2024.pdf", LedgerStatus::Failure { reason: None }))
        .unwrap();

    let content = fs::read_to_string(temp.path().join(LEDGER_FILE_NAME)).unwrap();
    assert_eq!(
        content,
        "Text,File Name,Status\nJan 2024,JAN_2024.pdf,success\nFeb 2024,FEB_2024.pdf,failure\n"
    );
}

#[test]
fn empty_existing_file_gets_a_header() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("report.csv");
    fs::write(&path, "").unwrap();

    Ledger::new(&path)
        .append(&entry("A", "A.pdf", LedgerStatus::Success))
        .unwrap();
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "Text,File Name,Status\nA,A.pdf,success\n"
    );
}

fn single_row(entry: &LedgerEntry) -> String {
    let temp = TempDir::new().unwrap();
    let ledger = Ledger::in_dir(temp.path());
    ledger.append(entry).unwrap();
    let content = fs::read_to_string(ledger.path()).unwrap();
    content.lines().nth(1).unwrap().to_string()
}

#[test]
fn rows_keep_three_columns() {
    let row = single_row(&entry(
        "Budget, \"final\"\nversion",
        "BUDGET_FINAL_VERSION.pdf",
        LedgerStatus::Success,
    ));
    assert_eq!(row, "Budget; \"\"final\"\" version,BUDGET_FINAL_VERSION.pdf,success");
    assert_eq!(row.split(',').count(), 3);
}

#[test]
fn fields_with_spaces_are_never_quote_wrapped() {
    let temp = TempDir::new().unwrap();
    let ledger = Ledger::in_dir(temp.path());
    ledger
        .append(&entry("  Annual report ", "ANNUAL_REPORT.pdf", LedgerStatus::Success))
        .unwrap();
    ledger
        .append(&entry("", "PAGE_2.pdf", LedgerStatus::Failure { reason: None }))
        .unwrap();
    assert_eq!(
        fs::read_to_string(ledger.path()).unwrap(),
        "Text,File Name,Status\n  Annual report ,ANNUAL_REPORT.pdf,success\n,PAGE_2.pdf,failure\n"
    );
}

#[test]
fn failure_reason_is_appended_and_truncated() {
    let long = format!("navigation failed: {}", "x".repeat(500));
    let failure = entry("Q1", "Q1.pdf", LedgerStatus::Failure { reason: Some(long) });

    let [text, file_name, status] = row_fields(&failure);
    assert_eq!(text, "Q1");
    assert_eq!(file_name, "Q1.pdf");
    assert!(status.starts_with("failure. navigation failed: xxx"));
    assert_eq!(status.chars().count(), "failure. ".len() + 200);

    let bare = entry("Q1", "Q1.pdf", LedgerStatus::Failure { reason: None });
    assert_eq!(row_fields(&bare)[2], "failure");
}

#[test]
fn commas_in_reasons_do_not_add_columns() {
    let failure = entry(
        "Q2",
        "Q2.pdf",
        LedgerStatus::Failure {
            reason: Some("http status 503: Service Unavailable, retry later".into()),
        },
    );
    let row = single_row(&failure);
    assert_eq!(row.split(',').count(), 3);
    assert!(row.ends_with("failure. http status 503: Service Unavailable; retry later"));
}

#[test]
fn missing_report_dir_is_an_error() {
    let temp = TempDir::new().unwrap();
    let ledger = Ledger::in_dir(&temp.path().join("nope"));
    let err = ledger
        .append(&entry("A", "A.pdf", LedgerStatus::Success))
        .unwrap_err();
    assert!(err.to_string().contains(LEDGER_FILE_NAME));
}
