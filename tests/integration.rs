use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn stockrag_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("stockrag");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let reports_dir = root.join("reports");
    fs::create_dir_all(&reports_dir).unwrap();
    fs::write(
        reports_dir.join("fy2024.txt"),
        "Annual Report FY2024\n\nRevenue for fiscal 2024 was 391 billion dollars, up 2 percent.\n\nGross margin expanded on services growth.",
    )
    .unwrap();
    fs::write(
        reports_dir.join("fy2023.txt"),
        "Annual Report FY2023\n\nRevenue for fiscal 2023 was 383 billion dollars.\n\nOperating expenses grew modestly.",
    )
    .unwrap();

    let config_content = format!(
        r#"[vector_store]
persist_path = "{}/kb"
collection_name = "aapl_kb"

[chunking]
chunk_size = 256
chunk_overlap = 32
"#,
        root.display()
    );
    let config_path = root.join("stockrag.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_stockrag(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = stockrag_binary();
    let output = Command::new(&binary)
        .arg("--ticker")
        .arg("AAPL")
        .arg("--company")
        .arg("Apple Inc.")
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("GROQ_API_KEY", "gsk_test_key")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run stockrag binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_collection() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_stockrag(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("aapl_kb"));
    assert!(tmp.path().join("kb").join("aapl_kb.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_stockrag(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_stockrag(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_missing_api_key_fails_without_creating_collection() {
    let (tmp, config_path) = setup_test_env();

    let output = Command::new(stockrag_binary())
        .arg("--ticker")
        .arg("AAPL")
        .arg("--company")
        .arg("Apple Inc.")
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("init")
        .env_remove("GROQ_API_KEY")
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("GROQ_API_KEY"), "stderr: {}", stderr);
    assert!(!tmp.path().join("kb").exists());
}

#[test]
fn test_empty_ticker_rejected() {
    let (_tmp, config_path) = setup_test_env();

    let output = Command::new(stockrag_binary())
        .arg("--company")
        .arg("Apple Inc.")
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("init")
        .env("GROQ_API_KEY", "gsk_test_key")
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ticker"), "stderr: {}", stderr);
}

#[test]
fn test_load_reports() {
    let (tmp, config_path) = setup_test_env();
    run_stockrag(&config_path, &["init"]);

    let report = tmp.path().join("reports").join("fy2024.txt");
    let (stdout, stderr, success) =
        run_stockrag(&config_path, &["load", "reports", report.to_str().unwrap()]);
    assert!(success, "load failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Loaded 1 document(s)"));
}

#[test]
fn test_reload_unchanged_report_is_skipped() {
    let (tmp, config_path) = setup_test_env();
    run_stockrag(&config_path, &["init"]);

    let report = tmp.path().join("reports").join("fy2024.txt");
    let args = ["load", "reports", report.to_str().unwrap()];

    let (first, _, _) = run_stockrag(&config_path, &args);
    assert!(first.contains("Loaded 1 document(s)"));

    let (second, _, success) = run_stockrag(&config_path, &args);
    assert!(success);
    assert!(second.contains("Loaded 0 document(s) (1 unchanged)"));
}

#[test]
fn test_load_multiple_reports() {
    let (tmp, config_path) = setup_test_env();
    run_stockrag(&config_path, &["init"]);

    let a = tmp.path().join("reports").join("fy2024.txt");
    let b = tmp.path().join("reports").join("fy2023.txt");
    let (stdout, _, success) = run_stockrag(
        &config_path,
        &["load", "reports", a.to_str().unwrap(), b.to_str().unwrap()],
    );
    assert!(success);
    assert!(stdout.contains("Loaded 2 document(s)"));
}

/// Minimal valid PDF containing the text "pdf revenue grew nine percent".
/// Builds body then xref with correct byte offsets so pdf-extract can parse it.
fn minimal_pdf_report() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(b"4 0 obj << /Length 61 >> stream\nBT /F1 12 Tf 100 700 Td (pdf revenue grew nine percent) Tj ET\nendstream endobj\n");
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    out.extend_from_slice(format!("{:010} 00000 n \n", o1).as_bytes());
    out.extend_from_slice(format!("{:010} 00000 n \n", o2).as_bytes());
    out.extend_from_slice(format!("{:010} 00000 n \n", o3).as_bytes());
    out.extend_from_slice(format!("{:010} 00000 n \n", o4).as_bytes());
    out.extend_from_slice(format!("{:010} 00000 n \n", o5).as_bytes());
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

#[test]
fn test_load_pdf_report() {
    let (tmp, config_path) = setup_test_env();
    run_stockrag(&config_path, &["init"]);

    let pdf_path = tmp.path().join("reports").join("fy2024.pdf");
    fs::write(&pdf_path, minimal_pdf_report()).unwrap();

    let (stdout, stderr, success) =
        run_stockrag(&config_path, &["load", "reports", pdf_path.to_str().unwrap()]);
    assert!(success, "pdf load failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Loaded 1 document(s)"));
}

#[test]
fn test_corrupt_pdf_skipped_but_good_files_load() {
    let (tmp, config_path) = setup_test_env();
    run_stockrag(&config_path, &["init"]);

    let bad = tmp.path().join("reports").join("broken.pdf");
    fs::write(&bad, b"not a pdf at all").unwrap();
    let good = tmp.path().join("reports").join("fy2024.txt");

    let (stdout, _, success) = run_stockrag(
        &config_path,
        &["load", "reports", bad.to_str().unwrap(), good.to_str().unwrap()],
    );
    assert!(success);
    assert!(stdout.contains("Loaded 1 document(s)"));
}

#[test]
fn test_index_build_without_documents_fails() {
    let (_tmp, config_path) = setup_test_env();
    run_stockrag(&config_path, &["init"]);

    let (stdout, stderr, success) = run_stockrag(&config_path, &["index", "build"]);
    assert!(!success, "expected failure, got: {}", stdout);
    assert!(
        stderr.to_lowercase().contains("no documents"),
        "stderr: {}",
        stderr
    );
}

#[test]
fn test_index_load_before_build_fails() {
    let (tmp, config_path) = setup_test_env();
    run_stockrag(&config_path, &["init"]);

    let report = tmp.path().join("reports").join("fy2024.txt");
    run_stockrag(&config_path, &["load", "reports", report.to_str().unwrap()]);

    let (_, stderr, success) = run_stockrag(&config_path, &["index", "load"]);
    assert!(!success);
    assert!(
        stderr.to_lowercase().contains("index"),
        "stderr: {}",
        stderr
    );
}

#[test]
fn test_query_before_build_fails() {
    let (_tmp, config_path) = setup_test_env();
    run_stockrag(&config_path, &["init"]);

    let (_, stderr, success) = run_stockrag(&config_path, &["query", "How did revenue change?"]);
    assert!(!success);
    assert!(
        stderr.to_lowercase().contains("index"),
        "stderr: {}",
        stderr
    );
}

#[test]
fn test_stats_output() {
    let (tmp, config_path) = setup_test_env();
    run_stockrag(&config_path, &["init"]);

    let report = tmp.path().join("reports").join("fy2024.txt");
    run_stockrag(&config_path, &["load", "reports", report.to_str().unwrap()]);

    let (stdout, stderr, success) = run_stockrag(&config_path, &["stats"]);
    assert!(success, "stats failed: stderr={}", stderr);
    assert!(stdout.contains("Knowledge base for AAPL"));
    assert!(stdout.contains("Documents: 1"));
    assert!(stdout.contains("annual_report"));
}

#[test]
fn test_stats_on_empty_collection() {
    let (_tmp, config_path) = setup_test_env();
    run_stockrag(&config_path, &["init"]);

    let (stdout, _, success) = run_stockrag(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Documents: 0"));
}

#[test]
fn test_update_with_no_inputs_is_a_no_op() {
    let (_tmp, config_path) = setup_test_env();
    run_stockrag(&config_path, &["init"]);

    let (stdout, _, success) = run_stockrag(&config_path, &["update"]);
    assert!(success);
    assert!(stdout.contains("0 document(s) ingested"));
}

#[test]
fn test_invalid_source_filter_rejected() {
    let (_tmp, config_path) = setup_test_env();
    run_stockrag(&config_path, &["init"]);

    let (_, stderr, success) = run_stockrag(
        &config_path,
        &["query", "anything", "--source", "twitter"],
    );
    assert!(!success);
    assert!(
        stderr.contains("twitter") || stderr.contains("invalid"),
        "stderr: {}",
        stderr
    );
}

#[test]
fn test_default_store_location_derived_from_ticker() {
    let tmp = TempDir::new().unwrap();

    // No config file: defaults resolve relative to the working directory.
    let output = Command::new(stockrag_binary())
        .current_dir(tmp.path())
        .arg("--ticker")
        .arg("MSFT")
        .arg("--company")
        .arg("Microsoft Corporation")
        .arg("init")
        .env("GROQ_API_KEY", "gsk_test_key")
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(tmp
        .path()
        .join("chroma_db_MSFT")
        .join("MSFT_knowledge_base.sqlite")
        .exists());
}
