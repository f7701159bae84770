//! Virtual folder creation.
//!
//! A folder only exists as the shared prefix of its keys; an empty one is
//! made visible by a zero-length marker object. The marker is hidden from
//! listings, size totals, and archives, but deleted along with the folder.

use crate::error::{Error, Result};
use crate::gateway::{ObjectStoreGateway, DELIMITER};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Key suffix of the zero-length marker that keeps an empty folder visible.
pub const PLACEHOLDER_SUFFIX: &str = ".placeholder";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderRequest {
    pub bucket_name: String,
    pub folder_name: String,
    #[serde(default)]
    pub current_prefix: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedFolder {
    pub folder_name: String,
    pub folder_prefix: String,
    pub placeholder_key: String,
}

/// Letters, digits, hyphen, underscore, space, and Hangul syllables.
pub fn is_valid_folder_name(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| {
            c.is_ascii_alphanumeric()
                || matches!(c, '-' | '_' | ' ')
                || ('\u{AC00}'..='\u{D7A3}').contains(&c)
        })
}

pub async fn create_folder(
    gateway: &dyn ObjectStoreGateway,
    request: &CreateFolderRequest,
) -> Result<CreatedFolder> {
    if !is_valid_folder_name(&request.folder_name) {
        return Err(Error::InvalidRequest(
            "folder names may only contain letters, digits, hyphen, underscore and space"
                .to_string(),
        ));
    }

    let folder_prefix = format!(
        "{}{}{}",
        request.current_prefix, request.folder_name, DELIMITER
    );

    // Occupied prefix means the folder effectively exists already.
    let existing = gateway
        .list_objects(&request.bucket_name, &folder_prefix, None, None, Some(1))
        .await?;
    if !existing.objects.is_empty() {
        return Err(Error::Conflict(format!(
            "folder \"{}\" already exists",
            request.folder_name
        )));
    }

    let placeholder_key = format!("{}{}", folder_prefix, PLACEHOLDER_SUFFIX);
    gateway
        .put_object(
            &request.bucket_name,
            &placeholder_key,
            Bytes::new(),
            Some("text/plain"),
        )
        .await?;

    info!(
        bucket = %request.bucket_name,
        prefix = %folder_prefix,
        "created virtual folder"
    );

    Ok(CreatedFolder {
        folder_name: request.folder_name.clone(),
        folder_prefix,
        placeholder_key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_names_allow_letters_digits_and_separators() {
        assert!(is_valid_folder_name("My Photos_2026-01"));
        assert!(is_valid_folder_name("사진"));
    }

    #[test]
    fn folder_names_reject_delimiters_and_specials() {
        assert!(!is_valid_folder_name(""));
        assert!(!is_valid_folder_name("a/b"));
        assert!(!is_valid_folder_name("dot.dot"));
        assert!(!is_valid_folder_name("semi;colon"));
    }
}
