//! Full-subtree enumeration across continuation-cursor pages.

use crate::error::Result;
use crate::folders::PLACEHOLDER_SUFFIX;
use crate::gateway::{ObjectRecord, ObjectStoreGateway};

/// Continuation state for a paged listing. The token inside `Active` is the
/// opaque cursor from the previous page; `None` means the first page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    Active(Option<String>),
    Done,
}

impl Cursor {
    /// Next state given the token a page reported.
    pub fn advance(next_token: Option<String>) -> Cursor {
        match next_token {
            Some(token) => Cursor::Active(Some(token)),
            None => Cursor::Done,
        }
    }
}

/// Per-key exclusion applied page by page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    None,
    /// Drop the synthetic `.placeholder` markers that keep empty folders
    /// visible. Used wherever folder contents are shown or archived, but
    /// never when deleting.
    PlaceholderMarkers,
}

impl Exclusion {
    fn admits(&self, key: &str) -> bool {
        match self {
            Exclusion::None => true,
            Exclusion::PlaceholderMarkers => !key.ends_with(PLACEHOLDER_SUFFIX),
        }
    }
}

pub struct RecursiveEnumerator<'a> {
    gateway: &'a dyn ObjectStoreGateway,
}

impl<'a> RecursiveEnumerator<'a> {
    pub fn new(gateway: &'a dyn ObjectStoreGateway) -> Self {
        Self { gateway }
    }

    /// Every object under `prefix` at all depths, in cursor order. A failed
    /// page fetch aborts the whole enumeration; callers never see a partial
    /// result.
    pub async fn collect_all(
        &self,
        bucket: &str,
        prefix: &str,
        exclusion: Exclusion,
    ) -> Result<Vec<ObjectRecord>> {
        let mut records = Vec::new();
        let mut cursor = Cursor::Active(None);

        while let Cursor::Active(token) = cursor {
            let page = self
                .gateway
                .list_objects(bucket, prefix, None, token.as_deref(), None)
                .await?;

            records.extend(
                page.objects
                    .into_iter()
                    .filter(|record| exclusion.admits(&record.key)),
            );
            cursor = Cursor::advance(page.next_token);
        }

        Ok(records)
    }

    /// Key-only variant used by the bulk coordinators.
    pub async fn collect_keys(
        &self,
        bucket: &str,
        prefix: &str,
        exclusion: Exclusion,
    ) -> Result<Vec<String>> {
        Ok(self
            .collect_all(bucket, prefix, exclusion)
            .await?
            .into_iter()
            .map(|record| record.key)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_advances_until_exhaustion() {
        let cursor = Cursor::advance(Some("page-2".to_string()));
        assert_eq!(cursor, Cursor::Active(Some("page-2".to_string())));
        assert_eq!(Cursor::advance(None), Cursor::Done);
    }

    #[test]
    fn placeholder_exclusion_only_drops_markers() {
        let exclusion = Exclusion::PlaceholderMarkers;
        assert!(!exclusion.admits("img/.placeholder"));
        assert!(exclusion.admits("img/photo.jpg"));
        assert!(Exclusion::None.admits("img/.placeholder"));
    }
}
