mod auth;
mod helpers;
mod image;
mod import;
mod ingredient;
mod phase;
mod recipe;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::config::Config;
use crate::drive::{DriveClient, UploadMode};
use recipebox_core::auth::AuthState;
use recipebox_core::drive::SNAPSHOT_FILE_NAME;
use recipebox_core::resolver::{DisplayMode, ImageResolver};
use recipebox_core::store::RecipeStore;
use recipebox_core::sync::{SyncConfig, SyncHandle, SyncOrchestrator, SyncPhase};

pub(crate) use auth::{cmd_login, cmd_logout, cmd_whoami};
pub(crate) use image::cmd_image;
pub(crate) use import::{cmd_export, cmd_import, cmd_restore};
pub(crate) use ingredient::{cmd_ingredient_add, cmd_ingredient_remove};
pub(crate) use phase::{cmd_phase_add, cmd_phase_remove};
pub(crate) use recipe::{
    RecipeFields, cmd_add, cmd_delete, cmd_edit, cmd_list, cmd_show, cmd_units,
};

/// Global flags every Drive-facing command needs.
pub(crate) struct Options {
    pub upload_mode: UploadMode,
    pub quiet_period: Duration,
}

const NOT_SIGNED_IN: &str = "Not signed in. Run `recipebox login --token <TOKEN>` first";

/// The recipe list for one command run: seeded from Drive on open, written
/// back on save.
pub(crate) struct Workspace {
    pub store: RecipeStore<DriveClient>,
    sync: SyncHandle,
}

impl Workspace {
    pub(crate) async fn open(config: &Config, opts: &Options) -> Result<Self> {
        let session = config.load_session()?.context(NOT_SIGNED_IN)?;
        Self::connect(
            DriveClient::new(opts.upload_mode),
            &session.access_token,
            opts.quiet_period,
        )
        .await
    }

    pub(crate) async fn connect(drive: DriveClient, token: &str, quiet: Duration) -> Result<Self> {
        let api_url = drive.endpoints().api_url.clone();
        let remote = Arc::new(drive);
        let resolver = Arc::new(
            ImageResolver::new(remote.clone(), DisplayMode::FetchedBlob).with_api_url(&api_url),
        );
        let auth = AuthState::with_token(token);
        let store = RecipeStore::new(resolver, auth.clone());
        let mut sync = SyncOrchestrator::new(
            remote,
            store.clone(),
            auth,
            SyncConfig {
                quiet_period: quiet,
            },
        )
        .spawn();

        let phase = sync.settled().await;
        if phase == SyncPhase::Unseeded {
            sync.shutdown().await;
            bail!(
                "Could not find or create {SNAPSHOT_FILE_NAME} in Google Drive. \
                 Check your connection, or log in again if the token has expired"
            );
        }
        tracing::debug!(?phase, recipes = store.len(), "recipes loaded");
        Ok(Self { store, sync })
    }

    /// Write any pending change and stop syncing.
    pub(crate) async fn save(self) -> Result<()> {
        match self.sync.shutdown().await {
            Some(false) => bail!("Failed to save recipes to Google Drive"),
            Some(true) => {
                tracing::info!("recipes saved");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// Signed-in Drive client plus token, for commands that skip the recipe list.
pub(super) fn drive_session(config: &Config, opts: &Options) -> Result<(DriveClient, String)> {
    let session = config.load_session()?.context(NOT_SIGNED_IN)?;
    Ok((DriveClient::new(opts.upload_mode), session.access_token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::Endpoints;
    use crate::drive::fake::FakeDrive;
    use recipebox_core::image_ref::ImageRef;
    use recipebox_core::models::Recipe;

    const TOKEN: &str = "test-token";
    const QUIET: Duration = Duration::from_millis(50);

    fn drive(base: &str) -> DriveClient {
        DriveClient::with_endpoints(Endpoints::with_base(base), UploadMode::Multipart)
    }

    fn snapshot(fake: &FakeDrive) -> Vec<Recipe> {
        let (_, file) = fake.files_named(SNAPSHOT_FILE_NAME).remove(0);
        serde_json::from_slice(&file.content).unwrap()
    }

    #[tokio::test]
    async fn test_first_run_creates_file_and_saves() {
        let (base, fake) = FakeDrive::spawn(TOKEN).await;
        let ws = Workspace::connect(drive(&base), TOKEN, QUIET).await.unwrap();
        assert!(ws.store.is_empty());
        assert_eq!(fake.files_named(SNAPSHOT_FILE_NAME).len(), 1);

        ws.store.add_recipe(Recipe::new("Tea")).await;
        ws.save().await.unwrap();

        let saved = snapshot(&fake);
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].title, "Tea");
    }

    #[tokio::test]
    async fn test_second_run_sees_first_run_changes() {
        let (base, fake) = FakeDrive::spawn(TOKEN).await;
        let ws = Workspace::connect(drive(&base), TOKEN, QUIET).await.unwrap();
        let tea = ws.store.add_recipe(Recipe::new("Tea")).await;
        ws.save().await.unwrap();

        let ws = Workspace::connect(drive(&base), TOKEN, QUIET).await.unwrap();
        assert_eq!(ws.store.recipes(), vec![tea.clone()]);
        assert!(ws.store.delete_recipe(&tea.id));
        ws.save().await.unwrap();

        assert!(snapshot(&fake).is_empty());
        assert_eq!(fake.files_named(SNAPSHOT_FILE_NAME).len(), 1);
    }

    #[tokio::test]
    async fn test_read_only_run_does_not_write() {
        let (base, fake) = FakeDrive::spawn(TOKEN).await;
        fake.insert(SNAPSHOT_FILE_NAME, "application/json", br#"[{"id":"1","title":"Tea"}]"#);

        let ws = Workspace::connect(drive(&base), TOKEN, QUIET).await.unwrap();
        assert_eq!(ws.store.len(), 1);
        ws.save().await.unwrap();

        assert!(
            !fake
                .requests()
                .iter()
                .any(|r| r.starts_with("PATCH"))
        );
    }

    #[tokio::test]
    async fn test_local_image_is_uploaded_before_save() {
        let (base, fake) = FakeDrive::spawn(TOKEN).await;
        let dir = tempfile::tempdir().unwrap();
        let photo = dir.path().join("soup.jpg");
        std::fs::write(&photo, b"jpeg").unwrap();

        let ws = Workspace::connect(drive(&base), TOKEN, QUIET).await.unwrap();
        let mut soup = Recipe::new("Soup");
        soup.image = ImageRef::parse(&format!("file://{}", photo.display()));
        let added = ws.store.add_recipe(soup).await;
        ws.save().await.unwrap();

        let file_id = added.image.drive_file_id().unwrap().to_string();
        assert_eq!(fake.file(&file_id).unwrap().content, b"jpeg");
        assert_eq!(snapshot(&fake)[0].image, ImageRef::remote(&file_id));
    }

    #[tokio::test]
    async fn test_expired_token_fails_to_open() {
        let (base, _fake) = FakeDrive::spawn(TOKEN).await;
        let err = Workspace::connect(drive(&base), "expired", QUIET)
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("recipes.json"));
    }

    #[tokio::test]
    async fn test_failed_save_is_reported() {
        let (base, fake) = FakeDrive::spawn(TOKEN).await;
        let ws = Workspace::connect(drive(&base), TOKEN, QUIET).await.unwrap();
        fake.reject_content(true);

        ws.store.add_recipe(Recipe::new("Tea")).await;
        let err = ws.save().await.unwrap_err();
        assert!(err.to_string().contains("Failed to save"));
    }

    #[tokio::test]
    async fn test_open_requires_session() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::at(dir.path()).unwrap();
        let opts = Options {
            upload_mode: UploadMode::Multipart,
            quiet_period: QUIET,
        };
        let err = Workspace::open(&config, &opts).await.err().unwrap();
        assert!(err.to_string().contains("Not signed in"));
    }
}
