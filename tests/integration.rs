use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn corpus_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_corpus"))
}

const SAILING: &str = "We left the harbour before dawn, the sea wind steady on the quarter \
and the sail drawing well. By noon the coast was a grey line behind us and the gulls had \
given up following. ";

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let corpus_dir = root.join("corpus");
    fs::create_dir_all(&corpus_dir).unwrap();
    fs::write(
        corpus_dir.join("a.txt"),
        "Hello world, this is a test document about gardening.",
    )
    .unwrap();
    fs::write(corpus_dir.join("b.txt"), SAILING.repeat(5)).unwrap();
    fs::write(corpus_dir.join("notes.md"), "not part of the corpus").unwrap();

    let config_content = format!(
        r#"[db]
path = "{root}/data/corpus.sqlite"

[corpus]
source_dir = "{root}/corpus"
output_dir = "{root}/processed_corpus"

[retrieval]
collection = "blog_style"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("corpus.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_corpus(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = corpus_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("OPENAI_API_KEY")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run corpus binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_corpus(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/corpus.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_corpus(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_corpus(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_process_writes_records_with_fallback_titles() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_corpus(&config_path, &["process"]);
    assert!(success, "process failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("processed: 2"), "got: {}", stdout);
    assert!(stdout.contains("fallback titles: 2"));
    assert!(stdout.contains("failed: 0"));
    assert!(stdout.ends_with("ok\n"));

    let raw = fs::read_to_string(tmp.path().join("processed_corpus/a.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["title"], "a");
    assert_eq!(json["filename"], "a.txt");
    assert_eq!(json["source_hash"].as_str().unwrap().len(), 64);
    assert!(!tmp.path().join("processed_corpus/notes.json").exists());
}

#[test]
fn test_process_incremental() {
    let (tmp, config_path) = setup_test_env();

    run_corpus(&config_path, &["process"]);

    let (stdout, _, success) = run_corpus(&config_path, &["process"]);
    assert!(success);
    assert!(
        stdout.contains("processed: 0") && stdout.contains("skipped: 2"),
        "Expected nothing reprocessed on unchanged corpus, got: {}",
        stdout
    );

    fs::write(tmp.path().join("corpus/a.txt"), "Hello world, about gardening!").unwrap();

    let (stdout, _, _) = run_corpus(&config_path, &["process"]);
    assert!(
        stdout.contains("processed: 1") && stdout.contains("skipped: 1"),
        "Expected 1 doc reprocessed after modification, got: {}",
        stdout
    );
}

#[test]
fn test_stamp_backfills_legacy_record() {
    let (tmp, config_path) = setup_test_env();

    let out_dir = tmp.path().join("processed_corpus");
    fs::create_dir_all(&out_dir).unwrap();
    fs::write(
        out_dir.join("b.json"),
        r#"{"title": "Sailing", "text": "old", "filename": "b.txt"}"#,
    )
    .unwrap();

    let (stdout, stderr, success) = run_corpus(&config_path, &["stamp"]);
    assert!(success, "stamp failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("updated: 1"));

    // Now current, so process leaves b alone.
    let (stdout, _, _) = run_corpus(&config_path, &["process"]);
    assert!(stdout.contains("processed: 1"), "got: {}", stdout);
    assert!(stdout.contains("skipped: 1"));
}

#[test]
fn test_index_requires_embedding_provider() {
    let (_tmp, config_path) = setup_test_env();

    run_corpus(&config_path, &["process"]);
    let (_, stderr, success) = run_corpus(&config_path, &["index"]);
    assert!(!success);
    assert!(stderr.contains("Embedding provider is disabled"));
}

#[test]
fn test_compose_context_only_samples_corpus() {
    let (_tmp, config_path) = setup_test_env();

    run_corpus(&config_path, &["process"]);
    let (stdout, stderr, success) = run_corpus(
        &config_path,
        &["compose", "a walk by the sea", "--context-only"],
    );
    assert!(success, "compose failed: stdout={}, stderr={}", stdout, stderr);

    let context = stdout.trim_end_matches('\n');
    assert_eq!(context.chars().count(), 200);
    assert!(SAILING.repeat(5).contains(context));
}

#[test]
fn test_compose_without_long_text_fails() {
    let (tmp, config_path) = setup_test_env();
    fs::remove_file(tmp.path().join("corpus/b.txt")).unwrap();

    run_corpus(&config_path, &["process"]);
    let (_, stderr, success) = run_corpus(
        &config_path,
        &["compose", "anything", "--mode", "sampling", "--context-only"],
    );
    assert!(!success);
    assert!(stderr.contains("no context available"));
}

#[test]
fn test_compose_empty_prompt_rejected() {
    let (_tmp, config_path) = setup_test_env();

    run_corpus(&config_path, &["process"]);
    let (_, stderr, success) = run_corpus(&config_path, &["compose", "--context-only"]);
    assert!(!success);
    assert!(stderr.contains("prompt is empty"));
}

#[test]
fn test_unknown_progress_mode_rejected() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_corpus(&config_path, &["--progress", "loud", "process"]);
    assert!(!success);
    assert!(stderr.contains("Unknown progress mode"));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_corpus(&tmp.path().join("nope.toml"), &["process"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}
