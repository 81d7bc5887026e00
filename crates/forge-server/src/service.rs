//! Line-delimited JSON protocol over a forge.
//!
//! Each input line is one request, `{"id": .., "method": .., "params": {..}}`,
//! and produces exactly one output line carrying the same `id` with either a
//! `result` or an `error`. Requests are handled concurrently, so responses
//! may arrive out of order.

use crate::error::{ErrorBody, Result, ServiceError};
use forge_core::{Forge, ForgeError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

/// One output line.
#[derive(Debug, Serialize)]
pub struct Response {
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Response {
    fn new(id: Value, outcome: Result<Value>) -> Self {
        match outcome {
            Ok(result) => Self {
                id,
                result: Some(result),
                error: None,
            },
            Err(error) => Self {
                id,
                result: None,
                error: Some(error.to_body()),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchParams {
    #[serde(default)]
    query: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModuleParams {
    author: String,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DependenciesParams {
    author: String,
    name: String,
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ArtifactParams {
    author: String,
    name: String,
    version: String,
    /// Target file, or an existing directory to place the archive in.
    output: PathBuf,
}

/// Dispatches protocol requests to a forge.
pub struct Service {
    forge: Arc<dyn Forge>,
}

impl Service {
    pub fn new(forge: Arc<dyn Forge>) -> Self {
        Self { forge }
    }

    /// Handles one input line and returns its response.
    pub async fn handle_line(&self, line: &str) -> Response {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                let error = ServiceError::InvalidRequest(format!("not JSON: {e}"));
                return Response::new(Value::Null, Err(error));
            }
        };
        let id = value.get("id").cloned().unwrap_or(Value::Null);

        let request: Request = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => return Response::new(id, Err(ServiceError::InvalidRequest(e.to_string()))),
        };

        let outcome = self.dispatch(&request.method, request.params).await;
        match &outcome {
            Ok(_) => tracing::debug!(id = %request.id, method = %request.method, "request served"),
            Err(e) => tracing::warn!(
                id = %request.id,
                method = %request.method,
                status = e.status(),
                error = %e,
                "request failed"
            ),
        }
        Response::new(request.id, outcome)
    }

    /// Runs one method against the forge.
    pub async fn dispatch(&self, method: &str, params: Value) -> Result<Value> {
        match method {
            "search" => {
                let SearchParams { query } = parse(params)?;
                to_result(&self.forge.search_modules(&query).await?)
            }
            "metadata" => {
                let ModuleParams { author, name } = parse(params)?;
                to_result(&self.forge.get_module_metadata(&author, &name).await?)
            }
            "releases" => {
                let ModuleParams { author, name } = parse(params)?;
                to_result(&self.forge.get_releases(&author, &name).await?)
            }
            "dependencies" => {
                let DependenciesParams {
                    author,
                    name,
                    version,
                } = parse(params)?;
                let graph = self
                    .forge
                    .get_module_metadata_with_dependencies(&author, &name, version.as_deref())
                    .await?;
                to_result(&graph)
            }
            "artifact" => self.artifact(parse(params)?).await,
            "clear_caches" => {
                self.forge.clear_caches().await?;
                Ok(json!({ "cleared": true }))
            }
            other => Err(ServiceError::UnknownMethod(other.to_string())),
        }
    }

    async fn artifact(&self, params: ArtifactParams) -> Result<Value> {
        let artifact = self
            .forge
            .get_module_artifact(&params.author, &params.name, &params.version)
            .await?;

        let path = match tokio::fs::metadata(&params.output).await {
            Ok(meta) if meta.is_dir() => params.output.join(&artifact.file_name),
            _ => params.output,
        };
        tokio::fs::write(&path, &artifact.data)
            .await
            .map_err(ForgeError::from)?;

        let digest = Sha256::digest(&artifact.data);
        tracing::info!(path = %path.display(), size = artifact.data.len(), "artifact written");
        Ok(json!({
            "path": path,
            "file_name": artifact.file_name,
            "size": artifact.data.len(),
            "sha256": hex_encode(&digest),
        }))
    }
}

fn parse<T: DeserializeOwned>(params: Value) -> Result<T> {
    let params = if params.is_null() { json!({}) } else { params };
    serde_json::from_value(params).map_err(|e| ServiceError::InvalidRequest(e.to_string()))
}

fn to_result<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value).map_err(ForgeError::from)?)
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Serves requests from `reader` until end of input, writing responses to
/// `writer`.
///
/// Returns once every accepted request has been answered.
pub async fn serve<R, W>(service: Arc<Service>, reader: R, writer: W) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<Response>();

    let output = tokio::spawn(async move {
        let mut writer = writer;
        while let Some(response) = rx.recv().await {
            let mut line = serde_json::to_vec(&response)?;
            line.push(b'\n');
            writer.write_all(&line).await?;
            writer.flush().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let service = Arc::clone(&service);
        let tx = tx.clone();
        tokio::spawn(async move {
            let response = service.handle_line(&line).await;
            // The writer only stops early on an I/O error, reported below.
            let _ = tx.send(response);
        });
    }
    drop(tx);

    output.await.map_err(std::io::Error::other)?
}
