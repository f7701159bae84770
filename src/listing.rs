//! Single-level directory views over the flat key namespace.
//!
//! Folders never exist in the store. One delimiter-bounded listing call
//! partitions a prefix into grouped child prefixes (folders) and direct
//! children (files); everything here is re-derived on every call.

use crate::error::Result;
use crate::folders::PLACEHOLDER_SUFFIX;
use crate::gateway::{ObjectRecord, ObjectStoreGateway, DELIMITER};
use serde::Serialize;
use std::cmp::Ordering;

/// Synthetic folder entry, one per distinct child path segment.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderNode {
    /// Full prefix, ending with the delimiter.
    pub prefix: String,
    /// Child segment with parent path and trailing delimiter stripped.
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DirEntry {
    Folder(FolderNode),
    File(ObjectRecord),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Breadcrumb {
    pub name: String,
    pub prefix: String,
}

/// One directory level: folders first, then files, both sorted by name.
/// Constructed fresh per request and discarded after rendering.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryView {
    pub items: Vec<DirEntry>,
    pub current_prefix: String,
    pub breadcrumbs: Vec<Breadcrumb>,
}

impl DirectoryView {
    /// Total size of the direct-child files, placeholders already excluded.
    pub fn total_file_size(&self) -> u64 {
        self.items
            .iter()
            .map(|item| match item {
                DirEntry::File(record) => record.size,
                DirEntry::Folder(_) => 0,
            })
            .sum()
    }
}

pub async fn list_directory(
    gateway: &dyn ObjectStoreGateway,
    bucket: &str,
    prefix: &str,
) -> Result<DirectoryView> {
    let page = gateway
        .list_objects(bucket, prefix, Some("/"), None, None)
        .await?;

    let mut folders: Vec<FolderNode> = page
        .common_prefixes
        .iter()
        .filter_map(|grouped| {
            let name = grouped
                .strip_prefix(prefix)?
                .trim_end_matches(DELIMITER)
                .to_string();
            (!name.is_empty()).then_some(FolderNode {
                prefix: grouped.clone(),
                name,
            })
        })
        .collect();

    // The gateway's grouping should already guarantee direct children only;
    // re-check so a misbehaving backend cannot leak deeper keys into the view.
    let mut files: Vec<ObjectRecord> = page
        .objects
        .into_iter()
        .filter(|record| match record.key.strip_prefix(prefix) {
            Some(rest) => {
                !rest.is_empty()
                    && !rest.contains(DELIMITER)
                    && !rest.ends_with(PLACEHOLDER_SUFFIX)
            }
            None => false,
        })
        .collect();

    folders.sort_by(|a, b| compare_names(&a.name, &b.name));
    files.sort_by(|a, b| compare_names(&a.key, &b.key));

    let items = folders
        .into_iter()
        .map(DirEntry::Folder)
        .chain(files.into_iter().map(DirEntry::File))
        .collect();

    Ok(DirectoryView {
        items,
        current_prefix: prefix.to_string(),
        breadcrumbs: breadcrumbs(prefix),
    })
}

/// Root crumb plus one crumb per non-empty path segment, each carrying the
/// accumulated prefix with a trailing delimiter.
pub fn breadcrumbs(prefix: &str) -> Vec<Breadcrumb> {
    let mut crumbs = vec![Breadcrumb {
        name: "home".to_string(),
        prefix: String::new(),
    }];

    let mut accumulated = String::new();
    for segment in prefix.split(DELIMITER).filter(|s| !s.is_empty()) {
        accumulated.push_str(segment);
        accumulated.push(DELIMITER);
        crumbs.push(Breadcrumb {
            name: segment.to_string(),
            prefix: accumulated.clone(),
        });
    }

    crumbs
}

/// Case-insensitive total order with a raw tiebreak so equal foldings stay
/// deterministic.
fn compare_names(a: &str, b: &str) -> Ordering {
    let folded = a.to_lowercase().cmp(&b.to_lowercase());
    match folded {
        Ordering::Equal => a.cmp(b),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breadcrumbs_for_root() {
        let crumbs = breadcrumbs("");
        assert_eq!(crumbs.len(), 1);
        assert_eq!(crumbs[0].name, "home");
        assert_eq!(crumbs[0].prefix, "");
    }

    #[test]
    fn breadcrumbs_accumulate_segments() {
        let crumbs = breadcrumbs("img/sub/");
        assert_eq!(crumbs.len(), 3);
        assert_eq!(crumbs[1], Breadcrumb { name: "img".into(), prefix: "img/".into() });
        assert_eq!(crumbs[2], Breadcrumb { name: "sub".into(), prefix: "img/sub/".into() });
    }

    #[test]
    fn breadcrumb_count_matches_segments() {
        for (prefix, segments) in [("", 0), ("a/", 1), ("a/b/", 2), ("a/b/c/", 3)] {
            assert_eq!(breadcrumbs(prefix).len(), segments + 1);
        }
    }

    #[test]
    fn name_ordering_is_case_insensitive_and_total() {
        let mut names = vec!["Zebra", "apple", "Apple", "banana"];
        names.sort_by(|a, b| compare_names(a, b));
        assert_eq!(names, vec!["Apple", "apple", "banana", "Zebra"]);
    }
}
