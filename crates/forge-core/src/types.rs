//! Data model shared by every backend and forge.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Archive extension used throughout the artifact naming convention.
pub const ARCHIVE_EXTENSION: &str = "tar.gz";

/// URL path prefix under which artifacts are served.
pub const MODULES_PATH: &str = "/modules";

/// `(author, name)` identity of a module.
///
/// # Examples
///
/// ```
/// use forge_core::ModuleIdentity;
///
/// let slash = ModuleIdentity::parse("puppetlabs/apache").unwrap();
/// let dash = ModuleIdentity::parse("puppetlabs-apache").unwrap();
/// assert_eq!(slash, dash);
/// assert_eq!(slash.full_name(), "puppetlabs/apache");
/// assert_eq!(slash.archive_name("1.0.0"), "puppetlabs-apache-1.0.0.tar.gz");
/// assert!(ModuleIdentity::parse("apache").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleIdentity {
    author: String,
    name: String,
}

impl ModuleIdentity {
    pub fn new(author: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            name: name.into(),
        }
    }

    /// Parses `author/name`, falling back to `author-name` (first `-`).
    pub fn parse(full_name: &str) -> Option<Self> {
        let full_name = full_name.trim();
        let (author, name) = full_name
            .split_once('/')
            .or_else(|| full_name.split_once('-'))?;
        if author.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(author, name))
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical `author/name` merge key.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.author, self.name)
    }

    /// `author-name`, the form used in archive names and manifests.
    pub fn dashed_name(&self) -> String {
        format!("{}-{}", self.author, self.name)
    }

    /// `author-name-version.tar.gz`.
    pub fn archive_name(&self, version: &str) -> String {
        format!(
            "{}-{}-{}.{}",
            self.author, self.name, version, ARCHIVE_EXTENSION
        )
    }

    /// Download path advertised for a release.
    pub fn file_uri(&self, version: &str) -> String {
        format!("{}/{}", MODULES_PATH, self.archive_name(version))
    }
}

impl fmt::Display for ModuleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.author, self.name)
    }
}

/// One declared dependency of a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_requirement: Option<String>,
}

impl Dependency {
    pub fn new(name: impl Into<String>, version_requirement: Option<String>) -> Self {
        Self {
            name: name.into(),
            version_requirement,
        }
    }
}

/// Metadata of one version of one module, as produced by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ReleaseMetadata {
    pub author: String,
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_page: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub dependencies: Vec<Dependency>,
    /// Embedded readme, passed through verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readme: Option<String>,
}

impl ReleaseMetadata {
    pub fn identity(&self) -> ModuleIdentity {
        ModuleIdentity::new(&self.author, &self.name)
    }

    pub fn full_name(&self) -> String {
        self.identity().full_name()
    }

    /// Summary, falling back to the description.
    pub fn desc(&self) -> Option<String> {
        self.summary.clone().or_else(|| self.description.clone())
    }

    /// Dependency names normalized to `author/name`.
    ///
    /// Names that do not parse as an identity are kept verbatim.
    pub fn dependency_names(&self) -> Vec<String> {
        self.dependencies
            .iter()
            .map(|d| normalize_full_name(&d.name))
            .collect()
    }

    pub fn to_search_result(&self) -> SearchResult {
        SearchResult {
            author: self.author.clone(),
            full_name: self.full_name(),
            name: self.name.clone(),
            desc: self.desc(),
            project_url: self.project_page.clone(),
            version: self.version.clone(),
            releases: vec![ReleaseRef::new(&self.version)],
            tag_list: vec![self.author.clone(), self.name.clone()],
        }
    }

    pub fn to_info(&self) -> ModuleMetadata {
        ModuleMetadata {
            author: self.author.clone(),
            full_name: self.full_name(),
            name: self.name.clone(),
            desc: self.desc(),
            releases: vec![ReleaseRef::new(&self.version)],
        }
    }

    pub fn to_version(&self) -> DependencyVersion {
        DependencyVersion {
            file: self.identity().file_uri(&self.version),
            version: self.version.clone(),
            dependencies: self
                .dependencies
                .iter()
                .map(|d| {
                    (
                        normalize_full_name(&d.name),
                        d.version_requirement.clone().unwrap_or_default(),
                    )
                })
                .collect(),
        }
    }
}

/// Rewrites `author-name` to `author/name`; other strings are returned as-is.
pub fn normalize_full_name(raw: &str) -> String {
    ModuleIdentity::parse(raw)
        .map(|id| id.full_name())
        .unwrap_or_else(|| raw.trim().to_string())
}

/// `{ "version": ... }` entry in release lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRef {
    pub version: String,
}

impl ReleaseRef {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }
}

/// Search-facing projection of one or more releases of one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub author: String,
    pub full_name: String,
    pub name: String,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub project_url: Option<String>,
    pub version: String,
    #[serde(default)]
    pub releases: Vec<ReleaseRef>,
    #[serde(default)]
    pub tag_list: Vec<String>,
}

/// Merged per-module information, the result of a metadata query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleMetadata {
    pub author: String,
    pub full_name: String,
    pub name: String,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub releases: Vec<ReleaseRef>,
}

/// One version entry of a dependency graph.
///
/// Dependencies serialize as `[["author/name", "requirement"], ...]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyVersion {
    pub file: String,
    pub version: String,
    #[serde(default)]
    pub dependencies: Vec<(String, String)>,
}

impl DependencyVersion {
    pub fn dependency_names(&self) -> impl Iterator<Item = &str> {
        self.dependencies.iter().map(|(name, _)| name.as_str())
    }
}

/// `full_name` → known versions, covering a module and its transitive dependencies.
pub type DependencyGraph = BTreeMap<String, Vec<DependencyVersion>>;

/// Module artifact bytes together with the file name they are served as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub data: bytes::Bytes,
}
