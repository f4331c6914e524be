use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};

use crate::config::Config;
use crate::drive::DriveClient;
use recipebox_core::image_ref::ImageRef;
use recipebox_core::resolver::{DisplayMode, DisplaySource, ImageResolver};

use super::{Options, drive_session};

/// Bytes for an image reference, or where it can be read from directly.
pub(crate) enum Fetched {
    Bytes(Arc<[u8]>),
    Elsewhere(String),
}

pub(crate) async fn fetch_image(drive: DriveClient, token: &str, image: &ImageRef) -> Result<Fetched> {
    let api_url = drive.endpoints().api_url.clone();
    let resolver =
        ImageResolver::new(Arc::new(drive), DisplayMode::FetchedBlob).with_api_url(&api_url);
    match resolver.resolve_for_display(image, Some(token)).await {
        DisplaySource::Blob(bytes) => Ok(Fetched::Bytes(bytes)),
        DisplaySource::Uri(uri) => Ok(Fetched::Elsewhere(uri)),
        DisplaySource::Authorized { url, .. } => Ok(Fetched::Elsewhere(url)),
        DisplaySource::Empty => bail!("No image reference given"),
        DisplaySource::Unavailable => bail!("Could not fetch {image} from Google Drive"),
    }
}

pub(crate) async fn cmd_image(
    config: &Config,
    opts: &Options,
    reference: &str,
    output: Option<&Path>,
) -> Result<()> {
    let image = ImageRef::parse(reference.trim());
    let (drive, token) = drive_session(config, opts)?;

    match fetch_image(drive, &token, &image).await? {
        Fetched::Bytes(bytes) => match output {
            Some(path) => {
                std::fs::write(path, &bytes)
                    .with_context(|| format!("Failed to write file: {}", path.display()))?;
                eprintln!("Saved {} bytes to {}", bytes.len(), path.display());
            }
            None => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(&bytes)?;
                stdout.flush()?;
            }
        },
        Fetched::Elsewhere(uri) => {
            eprintln!("Not a Google Drive image; read it from:");
            println!("{uri}");
        }
    }
    Ok(())
}
