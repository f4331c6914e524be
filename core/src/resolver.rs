//! Turning device-local image references into Drive references, and Drive
//! references back into something a front end can show.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::join_all;

use crate::drive::{DRIVE_API_URL, RemoteStore, media_url};
use crate::image_ref::ImageRef;
use crate::models::{Phase, Recipe};

/// How a front end consumes Drive images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    /// The renderer can attach request headers itself.
    #[default]
    AuthorizedUrl,
    /// The renderer only takes plain sources, so bytes are fetched up front.
    FetchedBlob,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplaySource {
    Empty,
    /// Use as-is: a local URI or a public URL.
    Uri(String),
    Authorized { url: String, authorization: String },
    Blob(Arc<[u8]>),
    /// Nothing renderable: no token, or the fetch failed.
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobState {
    Loading,
    Ready(Arc<[u8]>),
    Failed,
}

pub struct ImageResolver<R> {
    remote: Arc<R>,
    mode: DisplayMode,
    api_url: String,
    blobs: Mutex<HashMap<String, BlobState>>,
}

impl<R: RemoteStore> ImageResolver<R> {
    pub fn new(remote: Arc<R>, mode: DisplayMode) -> Self {
        Self {
            remote,
            mode,
            api_url: DRIVE_API_URL.to_string(),
            blobs: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.to_string();
        self
    }

    #[must_use]
    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    /// Upload a local image once. Anything that is not local comes back
    /// untouched, and a failed upload keeps the local reference.
    pub async fn resolve_for_upload(&self, image: &ImageRef, token: &str) -> ImageRef {
        let Some(path) = image.local_path() else {
            return image.clone();
        };
        match self.remote.upload_blob(token, &path).await {
            Some(file_id) => {
                tracing::debug!(path = %path.display(), %file_id, "uploaded image");
                ImageRef::Remote(file_id)
            }
            None => {
                tracing::warn!(path = %path.display(), "image upload failed, keeping local reference");
                image.clone()
            }
        }
    }

    /// Resolve the cover image and every phase photo concurrently. Without a
    /// token the recipe is returned as given.
    pub async fn resolve_recipe(&self, mut recipe: Recipe, token: Option<&str>) -> Recipe {
        let Some(token) = token else {
            return recipe;
        };

        let phases = std::mem::take(&mut recipe.phases);
        let (image, phases) = futures::join!(
            self.resolve_for_upload(&recipe.image, token),
            join_all(phases.into_iter().map(|phase| self.resolve_phase(phase, token)))
        );
        recipe.image = image;
        recipe.phases = phases;
        recipe
    }

    async fn resolve_phase(&self, mut phase: Phase, token: &str) -> Phase {
        if phase.photo_uris.iter().any(ImageRef::needs_upload) {
            phase.photo_uris = join_all(
                phase
                    .photo_uris
                    .iter()
                    .map(|uri| self.resolve_for_upload(uri, token)),
            )
            .await;
        }
        phase
    }

    pub async fn resolve_for_display(&self, image: &ImageRef, token: Option<&str>) -> DisplaySource {
        let file_id = match image {
            ImageRef::Empty => return DisplaySource::Empty,
            ImageRef::Local(s) | ImageRef::Url(s) => return DisplaySource::Uri(s.clone()),
            ImageRef::Remote(id) => id,
        };
        let Some(token) = token else {
            return DisplaySource::Unavailable;
        };

        match self.mode {
            DisplayMode::AuthorizedUrl => DisplaySource::Authorized {
                url: media_url(&self.api_url, file_id),
                authorization: format!("Bearer {token}"),
            },
            DisplayMode::FetchedBlob => self.fetch_blob(file_id, token).await,
        }
    }

    async fn fetch_blob(&self, file_id: &str, token: &str) -> DisplaySource {
        {
            let mut blobs = self.blobs();
            match blobs.get(file_id) {
                Some(BlobState::Ready(bytes)) => return DisplaySource::Blob(bytes.clone()),
                // Another caller is fetching it
                Some(BlobState::Loading) => return DisplaySource::Unavailable,
                Some(BlobState::Failed) | None => {}
            }
            blobs.insert(file_id.to_string(), BlobState::Loading);
        }

        let (state, source) = match self.remote.fetch_blob(token, file_id).await {
            Ok(bytes) => {
                let bytes: Arc<[u8]> = bytes.into();
                (BlobState::Ready(bytes.clone()), DisplaySource::Blob(bytes))
            }
            Err(e) => {
                tracing::warn!(%file_id, error = %e, "failed to fetch Drive image");
                (BlobState::Failed, DisplaySource::Unavailable)
            }
        };
        self.blobs().insert(file_id.to_string(), state);
        source
    }

    #[must_use]
    pub fn blob_state(&self, file_id: &str) -> Option<BlobState> {
        self.blobs().get(file_id).cloned()
    }

    /// Drop a fetched image handle.
    pub fn evict(&self, file_id: &str) -> bool {
        self.blobs().remove(file_id).is_some()
    }

    pub fn clear(&self) {
        self.blobs().clear();
    }

    fn blobs(&self) -> MutexGuard<'_, HashMap<String, BlobState>> {
        self.blobs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
