use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// The signed-in user's access token, shared with everything that talks to
/// Drive. `None` means offline: remote calls are skipped.
#[derive(Clone)]
pub struct AuthState {
    tx: watch::Sender<Option<String>>,
}

impl AuthState {
    #[must_use]
    pub fn signed_out() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        let (tx, _) = watch::channel(Some(token.into()));
        Self { tx }
    }

    pub fn sign_in(&self, token: impl Into<String>) {
        self.tx.send_replace(Some(token.into()));
    }

    pub fn sign_out(&self) {
        self.tx.send_if_modified(|token| token.take().is_some());
    }

    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.tx.borrow().is_some()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.tx.subscribe()
    }
}

/// Profile returned by Google's userinfo endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub verified_email: bool,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub family_name: String,
    #[serde(default)]
    pub picture: String,
    #[serde(default)]
    pub locale: String,
}

/// What gets persisted between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_token: String,
    pub user: Option<UserInfo>,
}
