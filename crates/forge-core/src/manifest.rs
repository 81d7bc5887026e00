//! Module manifest formats.
//!
//! Two formats declare a module's metadata:
//!
//! - `metadata.json`, the structured manifest embedded in every archive.
//! - `Modulefile`, a line-oriented declaration script:
//!
//! ```text
//! name    'puppetlabs-apache'
//! version '1.2.0'
//! summary "Installs and configures Apache"
//! dependency 'puppetlabs/stdlib', '>= 2.4.0'
//! ```
//!
//! The script is parsed into a directive list and never evaluated. Unknown
//! directives and malformed lines are logged and skipped.

use crate::error::{ForgeError, Result};
use crate::types::{Dependency, ModuleIdentity, ReleaseMetadata};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File name of the structured manifest.
pub const METADATA_FILE: &str = "metadata.json";

/// File name of the declarative manifest script.
pub const MODULEFILE: &str = "Modulefile";

#[derive(Debug, Deserialize, Serialize)]
struct MetadataJson {
    name: String,
    version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    project_page: Option<String>,
    #[serde(default)]
    dependencies: Vec<Dependency>,
}

/// Parses a `metadata.json` document.
///
/// `origin` is only used in error messages.
///
/// # Errors
///
/// Returns `ForgeError::MalformedArtifact` if the document is not valid
/// JSON, lacks `name` or `version`, or `name` is not `author-name`.
///
/// # Examples
///
/// ```
/// use forge_core::manifest::parse_metadata_json;
///
/// let json = br#"{"name": "puppetlabs-apache", "version": "1.0.0"}"#;
/// let metadata = parse_metadata_json(json, "metadata.json").unwrap();
/// assert_eq!(metadata.author, "puppetlabs");
/// assert_eq!(metadata.name, "apache");
/// ```
pub fn parse_metadata_json(data: &[u8], origin: impl AsRef<Path>) -> Result<ReleaseMetadata> {
    let origin = origin.as_ref();
    let raw: MetadataJson = serde_json::from_slice(data)
        .map_err(|e| ForgeError::malformed(origin, format!("invalid {METADATA_FILE}: {e}")))?;

    let identity = ModuleIdentity::parse(&raw.name).ok_or_else(|| {
        ForgeError::malformed(origin, format!("invalid module name {:?}", raw.name))
    })?;

    Ok(ReleaseMetadata {
        author: identity.author().to_string(),
        name: identity.name().to_string(),
        version: raw.version,
        summary: raw.summary,
        description: raw.description,
        project_page: raw.project_page,
        license: raw.license,
        source: raw.source,
        dependencies: raw.dependencies,
        readme: None,
    })
}

/// Renders release metadata as a `metadata.json` document.
pub fn render_metadata_json(metadata: &ReleaseMetadata) -> Result<Vec<u8>> {
    let raw = MetadataJson {
        name: metadata.identity().dashed_name(),
        version: metadata.version.clone(),
        author: Some(metadata.author.clone()),
        summary: metadata.summary.clone(),
        description: metadata.description.clone(),
        license: metadata.license.clone(),
        source: metadata.source.clone(),
        project_page: metadata.project_page.clone(),
        dependencies: metadata.dependencies.clone(),
    };
    Ok(serde_json::to_vec_pretty(&raw)?)
}

/// One recognized Modulefile directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Name(String),
    Version(String),
    Author(String),
    Source(String),
    Summary(String),
    Description(String),
    ProjectPage(String),
    License(String),
    Dependency {
        name: String,
        requirement: Option<String>,
    },
}

/// Parses a Modulefile into its directive list.
///
/// # Examples
///
/// ```
/// use forge_core::manifest::{Directive, parse_modulefile};
///
/// let directives = parse_modulefile("name 'a-b'\nfrobnicate 'x'\nversion \"0.1.0\"\n");
/// assert_eq!(
///     directives,
///     vec![Directive::Name("a-b".into()), Directive::Version("0.1.0".into())]
/// );
/// ```
pub fn parse_modulefile(content: &str) -> Vec<Directive> {
    content
        .lines()
        .enumerate()
        .filter_map(|(index, line)| parse_line(index + 1, line))
        .collect()
}

fn parse_line(line_number: usize, line: &str) -> Option<Directive> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let (keyword, rest) = line
        .split_once(|c: char| c.is_whitespace() || c == '(')
        .unwrap_or((line, ""));
    let args = match parse_arguments(rest) {
        Some(args) => args,
        None => {
            tracing::warn!(line = line_number, "malformed Modulefile line, skipping");
            return None;
        }
    };

    let single = |args: Vec<String>| -> Option<String> {
        if args.len() == 1 {
            args.into_iter().next()
        } else {
            tracing::warn!(
                line = line_number,
                directive = keyword,
                "expected exactly one argument, skipping"
            );
            None
        }
    };

    match keyword {
        "name" => single(args).map(Directive::Name),
        "version" => single(args).map(Directive::Version),
        "author" => single(args).map(Directive::Author),
        "source" => single(args).map(Directive::Source),
        "summary" => single(args).map(Directive::Summary),
        "description" => single(args).map(Directive::Description),
        "project_page" => single(args).map(Directive::ProjectPage),
        "license" => single(args).map(Directive::License),
        "dependency" => match args.len() {
            1 | 2 => {
                let mut args = args.into_iter();
                Some(Directive::Dependency {
                    name: args.next()?,
                    requirement: args.next(),
                })
            }
            _ => {
                tracing::warn!(
                    line = line_number,
                    "dependency takes a name and an optional requirement"
                );
                None
            }
        },
        other => {
            tracing::warn!(
                line = line_number,
                directive = other,
                "unknown Modulefile directive, ignoring"
            );
            None
        }
    }
}

/// Splits quoted string arguments separated by whitespace and/or commas.
///
/// Returns `None` on an unterminated quote or an unquoted argument.
fn parse_arguments(input: &str) -> Option<Vec<String>> {
    let input = input.trim().trim_end_matches(')').trim();
    let mut args = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace() || *c == ',').is_some() {}

        let quote = match chars.next() {
            None => return Some(args),
            Some('#') => return Some(args),
            Some(c @ ('\'' | '"')) => c,
            Some(_) => return None,
        };

        let mut value = String::new();
        loop {
            match chars.next()? {
                '\\' => value.push(chars.next()?),
                c if c == quote => break,
                c => value.push(c),
            }
        }
        args.push(value);
    }
}

/// Builds release metadata from Modulefile directives.
///
/// # Errors
///
/// Returns `ForgeError::MalformedArtifact` if `name` or `version` is missing
/// or the name is not `author-name`.
pub fn metadata_from_directives(
    directives: &[Directive],
    origin: impl AsRef<Path>,
) -> Result<ReleaseMetadata> {
    let origin = origin.as_ref();
    let mut full_name = None;
    let mut metadata = ReleaseMetadata::default();

    for directive in directives {
        match directive {
            Directive::Name(v) => full_name = Some(v.clone()),
            Directive::Version(v) => metadata.version = v.clone(),
            // The author of record is the name prefix.
            Directive::Author(_) => {}
            Directive::Source(v) => metadata.source = Some(v.clone()),
            Directive::Summary(v) => metadata.summary = Some(v.clone()),
            Directive::Description(v) => metadata.description = Some(v.clone()),
            Directive::ProjectPage(v) => metadata.project_page = Some(v.clone()),
            Directive::License(v) => metadata.license = Some(v.clone()),
            Directive::Dependency { name, requirement } => metadata
                .dependencies
                .push(Dependency::new(name.clone(), requirement.clone())),
        }
    }

    let full_name =
        full_name.ok_or_else(|| ForgeError::malformed(origin, "Modulefile has no name"))?;
    let identity = ModuleIdentity::parse(&full_name).ok_or_else(|| {
        ForgeError::malformed(origin, format!("invalid module name {full_name:?}"))
    })?;
    if metadata.version.is_empty() {
        return Err(ForgeError::malformed(origin, "Modulefile has no version"));
    }

    metadata.author = identity.author().to_string();
    metadata.name = identity.name().to_string();
    Ok(metadata)
}

/// Parses a Modulefile straight to release metadata.
pub fn parse_modulefile_metadata(
    content: &str,
    origin: impl AsRef<Path>,
) -> Result<ReleaseMetadata> {
    metadata_from_directives(&parse_modulefile(content), origin)
}
