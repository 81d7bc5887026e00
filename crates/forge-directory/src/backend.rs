//! Backend over a flat directory of pre-built module archives.

use async_trait::async_trait;
use bytes::Bytes;
use forge_core::archive::{METADATA_ENTRY, README_ENTRY, read_entry_from_path};
use forge_core::manifest::parse_metadata_json;
use forge_core::{Backend, ForgeError, ModuleIdentity, ReleaseMetadata, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// `author-name-version.tar.gz`; the name part may itself contain dashes.
static ARCHIVE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^-./][^-/]*-[^/]+-[^-/][^/]*\.tar\.gz$").expect("archive name regex is valid")
});

/// Serves every `author-name-version.tar.gz` file in one directory.
///
/// Metadata is read from the `metadata.json` embedded in each archive. The
/// directory is rescanned on every call, so dropped-in archives show up
/// immediately. Archives that cannot be read are skipped with a warning.
///
/// # Examples
///
/// ```no_run
/// use forge_core::{Backend, ForgeAbstract};
/// use forge_directory::ArchiveDirectoryBackend;
///
/// # async fn run() -> forge_core::Result<()> {
/// let backend = ArchiveDirectoryBackend::new("/srv/modules")?;
/// let releases = backend.get_metadata("puppetlabs", "apache").await?;
/// let forge = ForgeAbstract::new(backend);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ArchiveDirectoryBackend {
    root: Arc<PathBuf>,
}

impl ArchiveDirectoryBackend {
    /// Creates a backend over `root`, which must be an existing directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ForgeError::Configuration(format!(
                "module directory does not exist: {}",
                root.display()
            )));
        }
        Ok(Self {
            root: Arc::new(root),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn archive_path(&self, author: &str, name: &str, version: &str) -> PathBuf {
        self.root
            .join(ModuleIdentity::new(author, name).archive_name(version))
    }

    /// Loads metadata from every archive whose file name starts with `prefix`.
    async fn load(&self, prefix: Option<String>) -> Result<Vec<ReleaseMetadata>> {
        let root = Arc::clone(&self.root);
        tokio::task::spawn_blocking(move || load_archives(&root, prefix.as_deref()))
            .await
            .map_err(|e| ForgeError::Io(std::io::Error::other(e)))?
    }
}

fn load_archives(root: &Path, prefix: Option<&str>) -> Result<Vec<ReleaseMetadata>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(root)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| {
                    ARCHIVE_NAME.is_match(n) && prefix.is_none_or(|p| n.starts_with(p))
                })
        })
        .collect();
    paths.sort();

    let mut releases = Vec::with_capacity(paths.len());
    for path in paths {
        match read_release(&path) {
            Ok(release) => releases.push(release),
            Err(e) => {
                tracing::warn!(
                    archive = %path.display(),
                    error = %e,
                    "skipping unreadable module archive"
                );
            }
        }
    }
    Ok(releases)
}

fn read_release(path: &Path) -> Result<ReleaseMetadata> {
    let manifest = read_entry_from_path(path, &METADATA_ENTRY)?;
    let mut release = parse_metadata_json(&manifest, path)?;
    release.readme = read_entry_from_path(path, &README_ENTRY)
        .ok()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned());
    Ok(release)
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[async_trait]
impl Backend for ArchiveDirectoryBackend {
    fn describe(&self) -> String {
        format!("directory:{}", self.root.display())
    }

    async fn get_all_metadata(&self) -> Result<Vec<ReleaseMetadata>> {
        self.load(None).await
    }

    async fn get_metadata(&self, author: &str, name: &str) -> Result<Vec<ReleaseMetadata>> {
        let prefix = format!("{}-", ModuleIdentity::new(author, name).dashed_name());
        let releases = self.load(Some(prefix)).await?;
        Ok(releases
            .into_iter()
            .filter(|r| r.author == author && r.name == name)
            .collect())
    }

    async fn get_module_artifact(
        &self,
        author: &str,
        name: &str,
        version: &str,
    ) -> Result<Option<Bytes>> {
        let path = self.archive_path(author, name, version);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_content_hash(&self, author: &str, name: &str, version: &str) -> Result<String> {
        let data = self
            .get_module_artifact(author, name, version)
            .await?
            .ok_or_else(|| ForgeError::module_not_found(format!("{author}/{name}@{version}")))?;
        Ok(hex_encode(&Sha256::digest(&data)))
    }
}
