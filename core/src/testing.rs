//! In-memory `RemoteStore` for unit tests.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Result, bail};
use tokio::time::Instant;

use crate::drive::{RemoteStore, parse_snapshot};
use crate::models::Recipe;

#[derive(Default)]
pub(crate) struct MockDrive {
    state: Mutex<MockState>,
}

#[derive(Default)]
pub(crate) struct MockState {
    pub snapshot_id: Option<String>,
    pub files: HashMap<String, Vec<u8>>,
    pub create_id: Option<String>,
    pub upload_ids: VecDeque<String>,
    pub overwrite_ok: bool,
    pub overwrite_delay: Option<Duration>,
    pub fetch_delay: Option<Duration>,
    pub calls: Calls,
}

#[derive(Default, Clone)]
pub(crate) struct Calls {
    pub locate: usize,
    pub create: usize,
    pub download: usize,
    pub uploads: Vec<PathBuf>,
    pub fetches: Vec<String>,
    pub overwrites: Vec<(Instant, Vec<Recipe>)>,
    pub overwrite_tokens: Vec<String>,
}

impl MockDrive {
    /// Drive with no snapshot yet; `create` will hand out `create_id`.
    pub fn empty(create_id: &str) -> Self {
        let drive = Self::default();
        {
            let mut s = drive.state.lock().unwrap();
            s.create_id = Some(create_id.to_string());
            s.overwrite_ok = true;
        }
        drive
    }

    /// Drive that already holds a snapshot with `recipes`.
    pub fn with_snapshot(file_id: &str, recipes: &[Recipe]) -> Self {
        let drive = Self::default();
        {
            let mut s = drive.state.lock().unwrap();
            s.snapshot_id = Some(file_id.to_string());
            s.files
                .insert(file_id.to_string(), serde_json::to_vec(recipes).unwrap());
            s.overwrite_ok = true;
        }
        drive
    }

    pub fn with_state(self, f: impl FnOnce(&mut MockState)) -> Self {
        f(&mut self.state.lock().unwrap());
        self
    }

    pub fn calls(&self) -> Calls {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn network_calls(&self) -> usize {
        let c = self.calls();
        c.locate + c.create + c.download + c.uploads.len() + c.fetches.len() + c.overwrites.len()
    }

    /// Make `locate` find a different snapshot from now on.
    pub fn retarget(&self, file_id: &str, recipes: &[Recipe]) {
        let mut s = self.state.lock().unwrap();
        s.snapshot_id = Some(file_id.to_string());
        s.files
            .insert(file_id.to_string(), serde_json::to_vec(recipes).unwrap());
    }

    pub fn put_blob(&self, file_id: &str, bytes: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(file_id.to_string(), bytes.to_vec());
    }
}

impl RemoteStore for MockDrive {
    async fn locate(&self, _token: &str) -> Option<String> {
        let mut s = self.state.lock().unwrap();
        s.calls.locate += 1;
        s.snapshot_id.clone()
    }

    async fn create(&self, _token: &str) -> Option<String> {
        let mut s = self.state.lock().unwrap();
        s.calls.create += 1;
        let id = s.create_id.clone()?;
        s.snapshot_id = Some(id.clone());
        s.files.insert(id.clone(), b"[]".to_vec());
        Some(id)
    }

    async fn download(&self, _token: &str, file_id: &str) -> Vec<Recipe> {
        let mut s = self.state.lock().unwrap();
        s.calls.download += 1;
        s.files
            .get(file_id)
            .map(|bytes| parse_snapshot(bytes))
            .unwrap_or_default()
    }

    async fn overwrite(&self, token: &str, file_id: &str, recipes: &[Recipe]) -> bool {
        let delay = self.state.lock().unwrap().overwrite_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut s = self.state.lock().unwrap();
        s.calls.overwrites.push((Instant::now(), recipes.to_vec()));
        s.calls.overwrite_tokens.push(token.to_string());
        if !s.overwrite_ok {
            return false;
        }
        s.files
            .insert(file_id.to_string(), serde_json::to_vec(recipes).unwrap());
        true
    }

    async fn upload_blob(&self, _token: &str, local_path: &Path) -> Option<String> {
        let mut s = self.state.lock().unwrap();
        s.calls.uploads.push(local_path.to_path_buf());
        s.upload_ids.pop_front()
    }

    async fn fetch_blob(&self, _token: &str, file_id: &str) -> Result<Vec<u8>> {
        let delay = self.state.lock().unwrap().fetch_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut s = self.state.lock().unwrap();
        s.calls.fetches.push(file_id.to_string());
        match s.files.get(file_id) {
            Some(bytes) => Ok(bytes.clone()),
            None => bail!("file {file_id} not found"),
        }
    }
}
