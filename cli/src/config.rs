use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

use recipebox_core::auth::Session;

pub struct Config {
    pub data_dir: PathBuf,
    pub session_path: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "recipebox").context("Could not determine home directory")?;
        Self::at(proj_dirs.data_dir())
    }

    pub fn at(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        Ok(Config {
            data_dir: data_dir.to_path_buf(),
            session_path: data_dir.join("session.json"),
        })
    }

    /// The saved session, if someone has logged in.
    pub fn load_session(&self) -> Result<Option<Session>> {
        if !self.session_path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.session_path)
            .context("Failed to read session file")?;
        let session: Session = serde_json::from_str(&raw).with_context(|| {
            format!(
                "Session file is corrupt: {}. Run `recipebox logout` and log in again",
                self.session_path.display()
            )
        })?;
        if session.access_token.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(session))
    }

    /// Persist the session, readable by the owner only. The file is private
    /// before the token is written.
    pub fn save_session(&self, session: &Session) -> Result<()> {
        use std::io::Write;

        let json = serde_json::to_string_pretty(session)?;
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options
            .open(&self.session_path)
            .context("Failed to write session file")?;
        // `mode` only applies on create; tighten a file left by an older run
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .context("Failed to set session file permissions")?;
        }
        file.write_all(json.as_bytes())
            .context("Failed to write session file")?;
        Ok(())
    }

    /// Remove the saved session. Returns whether there was one.
    pub fn clear_session(&self) -> Result<bool> {
        match std::fs::remove_file(&self.session_path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).context("Failed to remove session file"),
        }
    }
}
