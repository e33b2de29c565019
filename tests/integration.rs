use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn liftdx_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("liftdx");
    path
}

fn write(path: PathBuf, body: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    // Legacy flat layout for the required categories
    let legacy = root.join("data").join("via").join("v74");
    write(
        legacy.join("error_codes.json"),
        r#"{"metadata": {"manual_version": "VIASerie_v74"},
            "f_codes": [
              {"code": "F01 02", "family": "01", "number": "02",
               "description_de": "Sicherheitskreis geöffnet",
               "cause_solution": "Kontakte 1H und 3C prüfen, XTSS Stecker kontrollieren",
               "manual_page": 113},
              {"code": "F02 01", "description_de": "Türkreis offen", "manual_page": 114}
            ]}"#,
    );
    write(
        legacy.join("parameters.json"),
        r#"{"metadata": {}, "parameters": [
              {"code": "P0001", "description_de": "Fahrtdauer", "manual_page": 141},
              {"code": "P0001", "description_de": "Türöffnungszeit", "manual_page": 150}
            ]}"#,
    );
    write(
        legacy.join("abbreviations.json"),
        r#"{"metadata": {}, "abbreviations": [
              {"code": "XTSS", "description_de": "PCB VS-SM Stecker Sicherheitskreis Spannung"},
              {"code": "SMQ", "description_de": "Safety Monitoring and Control Board"}
            ]}"#,
    );

    // Universal guides and images in the hierarchical layout
    write(
        root.join("data/universal/knowledge/diagnostic_guides.json"),
        r#"{"diagnostic_guides": [
              {"title": "Sicherheitskreis offen", "problem": "Aufzug fährt nicht",
               "related_error_codes": ["F01 02"], "difficulty_level": "mittel",
               "diagnosis_steps": ["Spannung an XTSS messen", {"action": "Kontakte 1H/3C prüfen"}]}
            ]}"#,
    );
    write(
        root.join("data/universal/images/image_index.json"),
        r#"{"buckets": {
              "general": [{"file": "safety_chain.png", "error_codes": ["F01 02"], "caption": "Sicherheitskette"}],
              "via/v74": [{"file": "via/smq_board.jpg", "error_codes": ["F01 02"]}]
            }}"#,
    );

    let config_content = format!(
        r#"[knowledge]
root = "{root}/data"
manufacturer = "via"
version = "v74"

[engine]
provider = "disabled"

[feedback]
dir = "{root}/validation"
"#,
        root = root.display()
    );

    let config_path = root.join("config").join("liftdx.toml");
    write(config_path.clone(), &config_content);

    (tmp, config_path)
}

fn run_liftdx(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = liftdx_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("RUST_LOG", "lift_diagnostics=warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run liftdx binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_summary_counts_loaded_knowledge() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_liftdx(&config_path, &["summary"]);
    assert!(success, "summary failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("via v74"));
    assert!(stdout.contains("Error codes:      2"));
    assert!(stdout.contains("Total:            6"));
    assert!(stdout.contains("Accuracy:    n/a"));
}

#[test]
fn test_lookup_error_code_case_insensitive() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_liftdx(&config_path, &["lookup", " f01 02 "]);
    assert!(success, "lookup failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Sicherheitskreis geöffnet"));
    assert!(stdout.contains("Manual page: 113"));
    assert!(stdout.contains("Sicherheitskreis offen (2 steps)"));
    assert!(stdout.contains("safety_chain.png (Sicherheitskette)"));
    assert!(stdout.contains("via/smq_board.jpg"));
}

#[test]
fn test_lookup_parameter_returns_all_sections() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_liftdx(&config_path, &["lookup", "P0001"]);
    assert!(success);
    assert!(stdout.contains("Fahrtdauer"));
    assert!(stdout.contains("Türöffnungszeit"));
}

#[test]
fn test_lookup_unknown_code() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_liftdx(&config_path, &["lookup", "F99 99"]);
    assert!(success);
    assert!(stdout.contains("No knowledge base entry"));
}

#[test]
fn test_context_for_query() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) =
        run_liftdx(&config_path, &["context", "F01 02 und der XTSS Stecker"]);
    assert!(success, "context failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("## Relevante Fehlercodes"));
    assert!(stdout.contains("**F01 02**: Sicherheitskreis geöffnet"));
    assert!(stdout.contains("## Relevante Komponenten"));
    assert!(!stdout.contains("## Relevante Parameter"));
}

#[test]
fn test_context_full_export() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_liftdx(&config_path, &["context", "--full"]);
    assert!(success);
    assert!(stdout.contains("# via v74 Elevator Control Manual - Knowledge Base"));
    assert!(stdout.contains("## PRACTICAL DIAGNOSTIC GUIDES - 1 guides"));
}

#[test]
fn test_ask_fails_when_engine_disabled() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_liftdx(&config_path, &["ask", "Was ist F01 02?"]);
    assert!(!success);
    assert!(stderr.contains("disabled"), "stderr={}", stderr);
}

#[test]
fn test_missing_required_category_fails() {
    let (tmp, config_path) = setup_test_env();
    fs::remove_file(tmp.path().join("data/via/v74/abbreviations.json")).unwrap();

    let (_, stderr, success) = run_liftdx(&config_path, &["summary"]);
    assert!(!success);
    assert!(stderr.contains("components"), "stderr={}", stderr);
}

#[test]
fn test_hierarchical_layout_overrides_legacy() {
    let (tmp, config_path) = setup_test_env();
    write(
        tmp.path()
            .join("data/manufacturers/via/v74/knowledge/error_codes.json"),
        r#"{"f_codes": [{"code": "F0102", "description": "Safety circuit open", "manual_page": 113}]}"#,
    );

    let (stdout, _, success) = run_liftdx(&config_path, &["summary"]);
    assert!(success);
    assert!(stdout.contains("Error codes:      1"));
    // Parameters and components still come from the legacy files.
    assert!(stdout.contains("Parameters:       2"));

    let (stdout, _, success) = run_liftdx(&config_path, &["lookup", "F01 02"]);
    assert!(success);
    assert!(!stdout.contains("Sicherheitskreis geöffnet"));
}

#[test]
fn test_feedback_add_and_stats() {
    let (_tmp, config_path) = setup_test_env();

    for judgment in ["correct", "correct", "correct", "incorrect", "unsure"] {
        let (stdout, stderr, success) = run_liftdx(
            &config_path,
            &[
                "feedback",
                "add",
                "--query",
                "F01 02",
                "--response",
                "Sicherheitskreis geöffnet",
                "--judgment",
                judgment,
                "--confidence",
                "HIGH",
            ],
        );
        assert!(success, "feedback add failed: stdout={}, stderr={}", stdout, stderr);
    }

    let (stdout, _, success) = run_liftdx(&config_path, &["feedback", "stats"]);
    assert!(success);
    assert!(stdout.contains("Validations:      5"));
    assert!(stdout.contains("Accuracy:    75.0%"));
}

#[test]
fn test_feedback_ids_are_sequential() {
    let (_tmp, config_path) = setup_test_env();

    for expected in 1..=3 {
        let (stdout, _, success) = run_liftdx(
            &config_path,
            &[
                "feedback", "add", "--query", "SMQ", "--response", "Board", "--judgment",
                "correct",
            ],
        );
        assert!(success);
        assert!(stdout.contains(&format!("Recorded feedback #{} ", expected)));
    }
}

#[test]
fn test_feedback_invalid_judgment_rejected() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success) = run_liftdx(
        &config_path,
        &[
            "feedback", "add", "--query", "q", "--response", "r", "--judgment", "maybe",
        ],
    );
    assert!(!success);
}

#[test]
fn test_feedback_list_filters_and_orders() {
    let (_tmp, config_path) = setup_test_env();

    for (query, judgment) in [("erste", "correct"), ("zweite", "incorrect"), ("dritte", "correct")] {
        run_liftdx(
            &config_path,
            &[
                "feedback", "add", "--query", query, "--response", "r", "--judgment", judgment,
            ],
        );
    }

    let (stdout, _, success) =
        run_liftdx(&config_path, &["feedback", "list", "--judgment", "correct"]);
    assert!(success);
    let dritte = stdout.find("dritte").unwrap();
    let erste = stdout.find("erste").unwrap();
    assert!(dritte < erste, "newest first: {}", stdout);
    assert!(!stdout.contains("zweite"));
}

#[test]
fn test_feedback_export_csv() {
    let (tmp, config_path) = setup_test_env();

    run_liftdx(
        &config_path,
        &[
            "feedback",
            "add",
            "--query",
            "Fehler F01 02, Tür offen",
            "--response",
            "r",
            "--judgment",
            "correct",
            "--notes",
            "Kontakte getauscht",
        ],
    );

    let (stdout, _, success) = run_liftdx(&config_path, &["feedback", "export"]);
    assert!(success);
    let mut lines = stdout.lines();
    assert_eq!(
        lines.next(),
        Some("id,timestamp,query,judgment,confidence_tier,notes")
    );
    let row = lines.next().unwrap();
    assert!(row.starts_with("1,"));
    assert!(row.ends_with(",\"Fehler F01 02, Tür offen\",correct,MEDIUM,Kontakte getauscht"));

    let out = tmp.path().join("exports").join("feedback.csv");
    let (_, stderr, success) = run_liftdx(
        &config_path,
        &["feedback", "export", "--output", out.to_str().unwrap()],
    );
    assert!(success, "stderr={}", stderr);
    assert!(stderr.contains("Exported 1 feedback records"));
    assert!(fs::read_to_string(&out).unwrap().contains("Kontakte getauscht"));
}

#[test]
fn test_invalid_config_rejected() {
    let (tmp, _) = setup_test_env();
    let bad = tmp.path().join("config").join("bad.toml");
    fs::write(
        &bad,
        "[knowledge]\nroot = \"/tmp\"\nmanufacturer = \"via\"\nversion = \"v74\"\n\n[engine]\nprovider = \"openai\"\n",
    )
    .unwrap();

    let (_, stderr, success) = run_liftdx(&bad, &["summary"]);
    assert!(!success);
    assert!(stderr.contains("Unknown engine provider"));
}
