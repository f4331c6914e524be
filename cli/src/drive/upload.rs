use anyhow::{Context, Result};
use futures::future::BoxFuture;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};

use recipebox_core::drive::{FileEntry, FileMetadata, JSON_MIME};

use super::Endpoints;

/// How new files get their content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum UploadMode {
    /// Create the metadata, then PATCH the content.
    TwoStep,
    /// One multipart request carrying metadata and content.
    #[default]
    Multipart,
}

impl UploadMode {
    pub(crate) fn uploader(self) -> Box<dyn BlobUploader> {
        match self {
            UploadMode::TwoStep => Box::new(TwoStepUploader),
            UploadMode::Multipart => Box::new(MultipartUploader),
        }
    }
}

/// Creates a Drive file with the given metadata and content, returning its id.
pub(crate) trait BlobUploader: Send + Sync {
    fn upload<'a>(
        &'a self,
        http: &'a reqwest::Client,
        endpoints: &'a Endpoints,
        token: &'a str,
        metadata: FileMetadata,
        content: Vec<u8>,
    ) -> BoxFuture<'a, Result<String>>;
}

pub(crate) struct TwoStepUploader;

impl BlobUploader for TwoStepUploader {
    fn upload<'a>(
        &'a self,
        http: &'a reqwest::Client,
        endpoints: &'a Endpoints,
        token: &'a str,
        metadata: FileMetadata,
        content: Vec<u8>,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let created: FileEntry = http
                .post(&endpoints.api_url)
                .bearer_auth(token)
                .json(&metadata)
                .send()
                .await
                .context("Failed to reach Google Drive")?
                .error_for_status()
                .context("Google Drive rejected the file metadata")?
                .json()
                .await
                .context("Failed to parse Drive create response")?;
            tracing::debug!(file_id = %created.id, name = %metadata.name, "created file metadata");

            http.patch(format!("{}/{}", endpoints.upload_url, created.id))
                .query(&[("uploadType", "media")])
                .bearer_auth(token)
                .header(CONTENT_TYPE, &metadata.mime_type)
                .body(content)
                .send()
                .await
                .context("Failed to reach Google Drive")?
                .error_for_status()
                .context("Google Drive rejected the file content")?;

            Ok(created.id)
        })
    }
}

pub(crate) struct MultipartUploader;

impl BlobUploader for MultipartUploader {
    fn upload<'a>(
        &'a self,
        http: &'a reqwest::Client,
        endpoints: &'a Endpoints,
        token: &'a str,
        metadata: FileMetadata,
        content: Vec<u8>,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let form = Form::new()
                .part(
                    "metadata",
                    Part::text(serde_json::to_string(&metadata)?).mime_str(JSON_MIME)?,
                )
                .part(
                    "file",
                    Part::bytes(content)
                        .file_name(metadata.name.clone())
                        .mime_str(&metadata.mime_type)?,
                );

            let created: FileEntry = http
                .post(&endpoints.upload_url)
                .query(&[("uploadType", "multipart")])
                .bearer_auth(token)
                .multipart(form)
                .send()
                .await
                .context("Failed to reach Google Drive")?
                .error_for_status()
                .context("Google Drive rejected the upload")?
                .json()
                .await
                .context("Failed to parse Drive upload response")?;

            Ok(created.id)
        })
    }
}
