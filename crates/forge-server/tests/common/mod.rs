//! Common test utilities for integration tests.
//!
//! Provides `ServerProcess`, which runs the forge-server binary against a
//! configuration file and exchanges protocol lines with it.

use serde_json::Value;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

/// A running forge-server binary.
pub(crate) struct ServerProcess {
    process: Child,
    stdin: Option<ChildStdin>,
    reader: BufReader<ChildStdout>,
}

impl ServerProcess {
    /// Spawn the forge-server binary with `config` as its configuration.
    pub(crate) fn spawn(config: &Path) -> Self {
        let mut process = Command::new(env!("CARGO_BIN_EXE_forge-server"))
            .arg(config)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("Failed to spawn forge-server binary");

        let stdin = process.stdin.take().expect("Failed to capture stdin");
        let stdout = process.stdout.take().expect("Failed to capture stdout");

        Self {
            process,
            stdin: Some(stdin),
            reader: BufReader::new(stdout),
        }
    }

    /// Send one request and wait for its response.
    pub(crate) fn request(&mut self, request: &Value) -> Value {
        let stdin = self.stdin.as_mut().expect("stdin already closed");
        writeln!(stdin, "{request}").expect("Failed to write request");
        stdin.flush().expect("Failed to flush request");

        let mut line = String::new();
        self.reader
            .read_line(&mut line)
            .expect("Failed to read response");
        serde_json::from_str(&line).expect("Response is not JSON")
    }

    /// Close stdin and wait for the process to exit.
    pub(crate) fn shutdown(mut self) -> std::process::ExitStatus {
        drop(self.stdin.take());
        self.process.wait().expect("Failed to wait for forge-server")
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        let _ = self.process.kill();
        let _ = self.process.wait();
    }
}

/// Writes a source tree for `author-name` at `version` into `dir`.
pub(crate) fn write_source_module(dir: &Path, author: &str, name: &str, version: &str) {
    std::fs::write(
        dir.join("metadata.json"),
        format!(
            r#"{{"name":"{author}-{name}","version":"{version}","summary":"{name} module",
                "dependencies":[{{"name":"{author}-base","version_requirement":">= 1.0.0"}}]}}"#
        ),
    )
    .expect("Failed to write metadata.json");
    std::fs::write(dir.join("README.md"), format!("# {name}\n")).expect("Failed to write README");
}

/// Packs a release archive for `author-name` into `dir` as a directory forge would hold it.
pub(crate) fn write_archive(
    dir: &Path,
    author: &str,
    name: &str,
    version: &str,
    depends_on: Option<&str>,
) {
    let source = tempfile::tempdir().expect("Failed to create tempdir");
    let dependencies = depends_on
        .map(|dep| format!(r#"[{{"name":"{dep}","version_requirement":">= 1.0.0"}}]"#))
        .unwrap_or_else(|| "[]".to_string());
    let manifest = format!(
        r#"{{"name":"{author}-{name}","version":"{version}","dependencies":{dependencies}}}"#
    );
    let root = format!("{author}-{name}-{version}");
    let data = forge_core::archive::pack(
        source.path(),
        &root,
        &[forge_core::archive::SyntheticEntry::new(
            "metadata.json",
            manifest.into_bytes(),
        )],
    )
    .expect("Failed to pack archive");
    std::fs::write(dir.join(format!("{root}.tar.gz")), data).expect("Failed to write archive");
}
