//! Merge rules for combining results from several releases or forges.
//!
//! - Search results sharing a `full_name` merge with "first wins" for scalar
//!   fields and union/max for collections.
//! - Module metadata deep-merges: later scalars override earlier ones and
//!   release lists concatenate.
//! - Release and dependency-version lists deduplicate by version, keeping
//!   the first entry seen.

use crate::types::{DependencyGraph, ModuleMetadata, SearchResult};
use crate::version::{TolerantVersion, max_version};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Removes later items whose key was already seen, preserving order.
///
/// # Examples
///
/// ```
/// use forge_core::merge::unique_by;
///
/// let items = vec![("1.0.0", "a"), ("2.0.0", "b"), ("1.0.0", "c")];
/// let unique = unique_by(items, |(version, _)| *version);
/// assert_eq!(unique, vec![("1.0.0", "a"), ("2.0.0", "b")]);
/// ```
pub fn unique_by<T, K, F>(items: Vec<T>, key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(key(item)))
        .collect()
}

/// Merges search results by `full_name`.
///
/// Groups appear in order of their first record. Within a group the first
/// record supplies every scalar field except `version`, which becomes the
/// highest version present. Tags are unioned in first-seen order and
/// releases are unioned, deduplicated by version and sorted descending.
pub fn merge_search_results(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<SearchResult>> = HashMap::new();

    for result in results {
        let group = groups.entry(result.full_name.clone()).or_default();
        if group.is_empty() {
            order.push(result.full_name.clone());
        }
        group.push(result);
    }

    order
        .into_iter()
        .filter_map(|full_name| groups.remove(&full_name))
        .filter_map(combine_search_group)
        .collect()
}

fn combine_search_group(group: Vec<SearchResult>) -> Option<SearchResult> {
    let version = max_version(group.iter().map(|r| r.version.as_str()))?.to_string();

    let tag_list = unique_by(
        group.iter().flat_map(|r| r.tag_list.iter().cloned()).collect(),
        Clone::clone,
    );

    let mut releases = unique_by(
        group.iter().flat_map(|r| r.releases.iter().cloned()).collect(),
        |r| r.version.clone(),
    );
    releases.sort_by_cached_key(|r| std::cmp::Reverse(TolerantVersion::parse(&r.version)));

    let mut merged = group.into_iter().next()?;
    merged.version = version;
    merged.tag_list = tag_list;
    merged.releases = releases;
    Some(merged)
}

/// Deep-merges module metadata records in order.
///
/// Later present scalars override earlier ones; release lists concatenate
/// without deduplication. Returns `None` for an empty input.
pub fn deep_merge_metadata(
    records: impl IntoIterator<Item = ModuleMetadata>,
) -> Option<ModuleMetadata> {
    records.into_iter().reduce(|mut merged, next| {
        merged.author = next.author;
        merged.full_name = next.full_name;
        merged.name = next.name;
        if next.desc.is_some() {
            merged.desc = next.desc;
        }
        merged.releases.extend(next.releases);
        merged
    })
}

/// Deep-merges dependency graphs, keeping the first entry per version.
pub fn merge_dependency_graphs(
    graphs: impl IntoIterator<Item = DependencyGraph>,
) -> DependencyGraph {
    let mut merged = DependencyGraph::new();
    for graph in graphs {
        for (full_name, versions) in graph {
            merged.entry(full_name).or_default().extend(versions);
        }
    }

    merged
        .into_iter()
        .map(|(full_name, versions)| {
            let versions = unique_by(versions, |v| v.version.clone());
            (full_name, versions)
        })
        .collect()
}
