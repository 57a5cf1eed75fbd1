use assert_cmd::Command;
use predicates::prelude::*;

fn docsearch() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("docsearch"));
    cmd.env_remove("DOCSEARCH_ENV_FILE")
        .env_remove("DOCSEARCH_REGISTRY_FILE");
    cmd
}

#[test]
fn libraries_json_lists_builtin_registry_in_order() {
    let out = docsearch().args(["libraries"]).output().expect("run");
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json");
    let ids: Vec<&str> = v["libraries"]
        .as_array()
        .expect("libraries array")
        .iter()
        .filter_map(|e| e["id"].as_str())
        .collect();
    assert_eq!(
        ids,
        vec!["langchain", "langgraph", "nextjs", "tailwind", "mcp", "framer"]
    );
    assert_eq!(v["libraries"][2]["url"].as_str(), Some("https://nextjs.org/docs"));
    assert_eq!(v["aliases"]["framer-motion"].as_str(), Some("framer"));
}

#[test]
fn libraries_text_output() {
    docsearch()
        .args(["libraries", "--output", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tailwind\thttps://tailwindcss.com/docs\n"))
        .stdout(predicate::str::contains("tailwindcss -> tailwind\n"));
}

#[test]
fn registry_file_extends_builtin_table() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let path = tmp.path().join("registry.json");
    std::fs::write(
        &path,
        r#"{ "libraries": { "vite": "https://vite.dev/guide" }, "aliases": { "vitejs": "vite" } }"#,
    )
    .expect("write registry");

    let out = docsearch()
        .args(["libraries"])
        .env("DOCSEARCH_REGISTRY_FILE", &path)
        .output()
        .expect("run");
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json");
    let libs = v["libraries"].as_array().expect("libraries array");
    assert_eq!(libs.len(), 7);
    assert_eq!(libs[6]["id"].as_str(), Some("vite"));
    assert_eq!(v["aliases"]["vitejs"].as_str(), Some("vite"));
}

#[test]
fn invalid_registry_file_fails_startup() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let path = tmp.path().join("registry.json");
    std::fs::write(&path, r#"{ "aliases": { "x": "nowhere" } }"#).expect("write registry");
    docsearch()
        .args(["libraries"])
        .env("DOCSEARCH_REGISTRY_FILE", &path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("nowhere"));
}
