mod upload;

#[cfg(test)]
pub(crate) mod fake;

use std::path::Path;

use anyhow::{Context, Result};
use reqwest::header::CONTENT_TYPE;

use recipebox_core::auth::UserInfo;
use recipebox_core::drive::{
    DRIVE_API_URL, DRIVE_UPLOAD_URL, FileList, FileMetadata, JSON_MIME, RemoteStore,
    first_file_id, media_url, parse_snapshot, snapshot_query,
};
use recipebox_core::models::Recipe;

pub use upload::UploadMode;
use upload::BlobUploader;

const USERINFO_URL: &str = "https://www.googleapis.com/userinfo/v2/me";

/// Where the Drive and userinfo APIs live.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub api_url: String,
    pub upload_url: String,
    pub userinfo_url: String,
}

impl Endpoints {
    pub fn google() -> Self {
        Self {
            api_url: DRIVE_API_URL.to_string(),
            upload_url: DRIVE_UPLOAD_URL.to_string(),
            userinfo_url: USERINFO_URL.to_string(),
        }
    }

    /// Same paths as Google, under another host.
    #[cfg(test)]
    pub fn with_base(base: &str) -> Self {
        Self {
            api_url: format!("{base}/drive/v3/files"),
            upload_url: format!("{base}/upload/drive/v3/files"),
            userinfo_url: format!("{base}/userinfo/v2/me"),
        }
    }
}

pub struct DriveClient {
    client: reqwest::Client,
    endpoints: Endpoints,
    uploader: Box<dyn BlobUploader>,
}

impl DriveClient {
    pub fn new(mode: UploadMode) -> Self {
        Self::with_endpoints(Endpoints::google(), mode)
    }

    pub fn with_endpoints(endpoints: Endpoints, mode: UploadMode) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "recipebox/{} (recipe sync)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(std::time::Duration::from_secs(60))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            endpoints,
            uploader: mode.uploader(),
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub async fn user_info(&self, token: &str) -> Result<UserInfo> {
        self.client
            .get(&self.endpoints.userinfo_url)
            .bearer_auth(token)
            .send()
            .await
            .context("Failed to reach Google")?
            .error_for_status()
            .context("Google rejected the access token")?
            .json()
            .await
            .context("Failed to parse Google user info")
    }

    async fn find_snapshot(&self, token: &str) -> Result<Option<String>> {
        let list: FileList = self
            .client
            .get(&self.endpoints.api_url)
            .query(&[("q", snapshot_query().as_str()), ("spaces", "drive")])
            .bearer_auth(token)
            .send()
            .await
            .context("Failed to reach Google Drive")?
            .error_for_status()
            .context("Google Drive rejected the file search")?
            .json()
            .await
            .context("Failed to parse Drive file list")?;
        Ok(first_file_id(list))
    }

    async fn get_media(&self, token: &str, file_id: &str) -> Result<Vec<u8>> {
        let bytes = self
            .client
            .get(media_url(&self.endpoints.api_url, file_id))
            .bearer_auth(token)
            .send()
            .await
            .context("Failed to reach Google Drive")?
            .error_for_status()
            .with_context(|| format!("Google Drive refused file {file_id}"))?
            .bytes()
            .await
            .context("Failed to read Drive file content")?;
        Ok(bytes.to_vec())
    }

    async fn put_snapshot(&self, token: &str, file_id: &str, recipes: &[Recipe]) -> Result<bool> {
        let body = serde_json::to_vec(recipes)?;
        let resp = self
            .client
            .patch(format!("{}/{file_id}", self.endpoints.upload_url))
            .query(&[("uploadType", "media")])
            .bearer_auth(token)
            .header(CONTENT_TYPE, JSON_MIME)
            .body(body)
            .send()
            .await
            .context("Failed to reach Google Drive")?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %text, "Drive rejected recipes update");
        }
        Ok(status.is_success())
    }

    async fn upload_file(&self, token: &str, local_path: &Path) -> Result<String> {
        let content = tokio::fs::read(local_path)
            .await
            .with_context(|| format!("Failed to read image: {}", local_path.display()))?;
        let metadata = FileMetadata::photo(chrono::Utc::now().timestamp_millis());
        self.uploader
            .upload(&self.client, &self.endpoints, token, metadata, content)
            .await
    }
}

impl RemoteStore for DriveClient {
    async fn locate(&self, token: &str) -> Option<String> {
        match self.find_snapshot(token).await {
            Ok(file_id) => file_id,
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "error finding recipes file");
                None
            }
        }
    }

    async fn create(&self, token: &str) -> Option<String> {
        let result = self
            .uploader
            .upload(
                &self.client,
                &self.endpoints,
                token,
                FileMetadata::snapshot(),
                b"[]".to_vec(),
            )
            .await;
        match result {
            Ok(file_id) => {
                tracing::info!(%file_id, "created recipes file");
                Some(file_id)
            }
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "error creating recipes file");
                None
            }
        }
    }

    async fn download(&self, token: &str, file_id: &str) -> Vec<Recipe> {
        match self.get_media(token, file_id).await {
            Ok(bytes) => parse_snapshot(&bytes),
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "error downloading recipes");
                Vec::new()
            }
        }
    }

    async fn overwrite(&self, token: &str, file_id: &str, recipes: &[Recipe]) -> bool {
        match self.put_snapshot(token, file_id, recipes).await {
            Ok(ok) => ok,
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "error updating recipes");
                false
            }
        }
    }

    async fn upload_blob(&self, token: &str, local_path: &Path) -> Option<String> {
        match self.upload_file(token, local_path).await {
            Ok(file_id) => Some(file_id),
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "error uploading image");
                None
            }
        }
    }

    async fn fetch_blob(&self, token: &str, file_id: &str) -> Result<Vec<u8>> {
        self.get_media(token, file_id).await
    }
}
