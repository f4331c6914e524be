//! Recipe model and Google Drive synchronization for recipebox.
//!
//! The recipe list lives in memory in a [`store::RecipeStore`]. A
//! [`sync::SyncOrchestrator`] seeds it from a single `recipes.json` file in the
//! user's Drive and writes the whole list back after a quiet period. Images
//! picked on the device are uploaded once by the [`resolver::ImageResolver`]
//! and referenced as `google-drive-id:<id>` from then on.
//!
//! Talking to Drive is behind [`drive::RemoteStore`]; the CLI provides the
//! HTTP implementation.

pub mod auth;
pub mod debounce;
pub mod drive;
pub mod image_ref;
pub mod models;
pub mod resolver;
pub mod store;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;
