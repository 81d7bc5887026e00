//! End-to-end tests that drive the forge-server binary over stdio.

mod common;

use common::{ServerProcess, write_archive, write_source_module};
use serde_json::json;
use std::path::Path;

struct Workspace {
    root: tempfile::TempDir,
}

impl Workspace {
    /// A source forge serving `acme/widget` 2.0.0, federated with an archive
    /// directory holding `acme/widget` 1.0.0 and `acme/base` 1.1.0. Both
    /// widget releases depend on `acme/base`.
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let source = root.path().join("widget");
        let archives = root.path().join("archives");
        std::fs::create_dir(&source).unwrap();
        std::fs::create_dir(&archives).unwrap();

        write_source_module(&source, "acme", "widget", "2.0.0");
        write_archive(&archives, "acme", "widget", "1.0.0", Some("acme-base"));
        write_archive(&archives, "acme", "base", "1.1.0", None);

        let config = json!({
            "forges": [
                { "type": "source", "path": source },
                { "type": "directory", "path": archives },
            ],
            "concurrency": { "dependency_workers": 2 }
        });
        std::fs::write(root.path().join("forge.json"), config.to_string()).unwrap();
        Self { root }
    }

    fn config(&self) -> std::path::PathBuf {
        self.root.path().join("forge.json")
    }

    fn path(&self) -> &Path {
        self.root.path()
    }
}

#[test]
fn test_metadata_merges_forges() {
    let workspace = Workspace::new();
    let mut server = ServerProcess::spawn(&workspace.config());

    let response = server.request(&json!({
        "id": 1,
        "method": "metadata",
        "params": { "author": "acme", "name": "widget" }
    }));

    assert_eq!(response["id"], 1);
    let versions: Vec<&str> = response["result"]["releases"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["version"].as_str().unwrap())
        .collect();
    assert_eq!(versions.len(), 2);
    assert!(versions.contains(&"1.0.0"));
    assert!(versions.contains(&"2.0.0"));

    assert!(server.shutdown().success());
}

#[test]
fn test_dependencies_across_forges() {
    let workspace = Workspace::new();
    let mut server = ServerProcess::spawn(&workspace.config());

    let response = server.request(&json!({
        "id": 2,
        "method": "dependencies",
        "params": { "author": "acme", "name": "widget" }
    }));
    let graph = &response["result"];
    assert_eq!(graph["acme/widget"].as_array().unwrap().len(), 2);
    assert_eq!(graph["acme/base"].as_array().unwrap().len(), 1);
    assert_eq!(graph["acme/base"][0]["version"], "1.1.0");
    assert_eq!(
        graph["acme/base"][0]["file"],
        "/modules/acme-base-1.1.0.tar.gz"
    );

    // Each forge prunes its own graph; only the source forge has 2.0.0.
    let response = server.request(&json!({
        "id": 3,
        "method": "dependencies",
        "params": { "author": "acme", "name": "widget", "version": "2.0.0" }
    }));
    let graph = &response["result"];
    assert_eq!(graph["acme/widget"].as_array().unwrap().len(), 1);
    assert_eq!(graph["acme/widget"][0]["version"], "2.0.0");
    assert_eq!(graph["acme/base"], json!([]));
}

#[test]
fn test_artifact_from_archive_directory() {
    let workspace = Workspace::new();
    let mut server = ServerProcess::spawn(&workspace.config());

    let output = workspace.path().join("download.tar.gz");
    let response = server.request(&json!({
        "id": 3,
        "method": "artifact",
        "params": { "author": "acme", "name": "base", "version": "1.1.0", "output": output }
    }));

    let result = &response["result"];
    assert_eq!(result["file_name"], "acme-base-1.1.0.tar.gz");
    let written = std::fs::read(&output).unwrap();
    let original = std::fs::read(workspace.path().join("archives/acme-base-1.1.0.tar.gz")).unwrap();
    assert_eq!(written, original);
    assert_eq!(result["size"], written.len());
}

#[test]
fn test_error_statuses() {
    let workspace = Workspace::new();
    let mut server = ServerProcess::spawn(&workspace.config());

    let missing = server.request(&json!({
        "id": 4,
        "method": "metadata",
        "params": { "author": "acme", "name": "nothing" }
    }));
    assert_eq!(missing["error"]["status"], 404);
    assert!(missing.get("result").is_none());

    let invalid = server.request(&json!({ "id": 5, "method": "publish" }));
    assert_eq!(invalid["id"], 5);
    assert_eq!(invalid["error"]["status"], 400);
}

#[test]
fn test_bad_configuration_exits() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("forge.json");
    std::fs::write(&config, r#"{"forges": [{"type": "directory", "path": "/nonexistent/forge"}]}"#)
        .unwrap();

    let server = ServerProcess::spawn(&config);
    assert!(!server.shutdown().success());
}
