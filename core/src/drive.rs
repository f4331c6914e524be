use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::models::Recipe;

pub const DRIVE_API_URL: &str = "https://www.googleapis.com/drive/v3/files";
pub const DRIVE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";

/// The one file holding a user's whole recipe list.
pub const SNAPSHOT_FILE_NAME: &str = "recipes.json";
pub const JSON_MIME: &str = "application/json";
pub const IMAGE_MIME: &str = "image/jpeg";

/// Remote storage used by the store and the sync loop.
///
/// Implementations swallow transport and content failures: they log and hand
/// back `None`, an empty list or `false`. Nothing here retries.
pub trait RemoteStore: Send + Sync + 'static {
    /// Id of the non-trashed snapshot file, if one exists.
    fn locate(&self, token: &str) -> impl Future<Output = Option<String>> + Send;

    /// Create the snapshot file holding an empty list.
    fn create(&self, token: &str) -> impl Future<Output = Option<String>> + Send;

    /// Snapshot contents, or an empty list when anything goes wrong.
    fn download(&self, token: &str, file_id: &str) -> impl Future<Output = Vec<Recipe>> + Send;

    /// Replace the snapshot with `recipes`. True on an HTTP success status.
    fn overwrite(
        &self,
        token: &str,
        file_id: &str,
        recipes: &[Recipe],
    ) -> impl Future<Output = bool> + Send;

    /// Upload a local image, returning the new Drive file id.
    fn upload_blob(
        &self,
        token: &str,
        local_path: &std::path::Path,
    ) -> impl Future<Output = Option<String>> + Send;

    /// Raw bytes of a Drive file.
    fn fetch_blob(
        &self,
        token: &str,
        file_id: &str,
    ) -> impl Future<Output = anyhow::Result<Vec<u8>>> + Send;
}

#[derive(Debug, Deserialize)]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub id: String,
    pub name: Option<String>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub name: String,
    pub mime_type: String,
}

impl FileMetadata {
    #[must_use]
    pub fn snapshot() -> Self {
        Self {
            name: SNAPSHOT_FILE_NAME.to_string(),
            mime_type: JSON_MIME.to_string(),
        }
    }

    /// Metadata for an uploaded photo, named after the upload time.
    #[must_use]
    pub fn photo(now_millis: i64) -> Self {
        Self {
            name: format!("recipe_photo_{now_millis}.jpg"),
            mime_type: IMAGE_MIME.to_string(),
        }
    }
}

/// Drive search expression for the snapshot file.
#[must_use]
pub fn snapshot_query() -> String {
    format!("name = '{SNAPSHOT_FILE_NAME}' and trashed = false")
}

#[must_use]
pub fn first_file_id(list: FileList) -> Option<String> {
    list.files.into_iter().next().map(|f| f.id)
}

#[must_use]
pub fn media_url(api_url: &str, file_id: &str) -> String {
    format!("{api_url}/{file_id}?alt=media")
}

/// Parse snapshot bytes. Anything other than a JSON array of recipes yields an
/// empty list so callers always start from a valid state.
#[must_use]
pub fn parse_snapshot(bytes: &[u8]) -> Vec<Recipe> {
    match serde_json::from_slice::<Vec<Recipe>>(bytes) {
        Ok(recipes) => recipes,
        Err(e) => {
            tracing::warn!(error = %e, "snapshot is not a recipe list, starting empty");
            Vec::new()
        }
    }
}
