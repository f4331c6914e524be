//! Bootstraps the store from Drive when a token shows up, then writes the
//! full list back after every burst of changes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::auth::AuthState;
use crate::debounce::Debounce;
use crate::drive::RemoteStore;
use crate::models::Recipe;
use crate::store::RecipeStore;

pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Unauthenticated,
    Locating,
    Creating,
    Downloading,
    Seeded,
    /// A write is scheduled or in flight.
    Syncing,
    /// Neither locate nor create produced a file. Local edits are not saved.
    Unseeded,
}

impl SyncPhase {
    /// True once bootstrap has finished one way or another.
    #[must_use]
    pub fn is_settled(self) -> bool {
        matches!(
            self,
            SyncPhase::Unauthenticated | SyncPhase::Seeded | SyncPhase::Syncing | SyncPhase::Unseeded
        )
    }
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub quiet_period: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            quiet_period: DEFAULT_QUIET_PERIOD,
        }
    }
}

/// The remote file this session writes to.
#[derive(Debug, Clone)]
struct Binding {
    token: String,
    file_id: String,
}

enum Command {
    Flush(oneshot::Sender<Option<bool>>),
    Shutdown(oneshot::Sender<Option<bool>>),
}

pub struct SyncOrchestrator<R> {
    remote: Arc<R>,
    store: RecipeStore<R>,
    auth: AuthState,
    config: SyncConfig,
}

impl<R: RemoteStore> SyncOrchestrator<R> {
    pub fn new(remote: Arc<R>, store: RecipeStore<R>, auth: AuthState, config: SyncConfig) -> Self {
        Self {
            remote,
            store,
            auth,
            config,
        }
    }

    /// Start the sync loop on the current tokio runtime.
    pub fn spawn(self) -> SyncHandle {
        let initial = if self.auth.is_signed_in() {
            SyncPhase::Locating
        } else {
            SyncPhase::Unauthenticated
        };
        let (phase_tx, phase_rx) = watch::channel(initial);
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let task = tokio::spawn(self.run(cmd_rx, phase_tx));
        SyncHandle {
            phase: phase_rx,
            commands: cmd_tx,
            task,
        }
    }

    async fn run(self, mut commands: mpsc::Receiver<Command>, phase: watch::Sender<SyncPhase>) {
        let mut tokens = self.auth.subscribe();
        let mut changes = self.store.subscribe();
        let mut debounce = Debounce::new(self.config.quiet_period);

        let initial = tokens.borrow_and_update().clone();
        let mut binding = match initial {
            Some(token) => self.bootstrap(&token, &phase, &mut changes).await,
            None => None,
        };

        loop {
            tokio::select! {
                biased;

                Ok(()) = tokens.changed() => {
                    let token = tokens.borrow_and_update().clone();
                    match token {
                        Some(token) if binding.as_ref().is_some_and(|b| b.token == token) => {}
                        Some(token) => {
                            binding = match binding.take() {
                                Some(old) => {
                                    self.rebind(old, &token, &mut debounce, &phase, &mut changes).await
                                }
                                None => self.bootstrap(&token, &phase, &mut changes).await,
                            };
                        }
                        None => {
                            if debounce.cancel() {
                                tracing::info!("signed out with a pending save; it will not be written");
                            }
                            binding = None;
                            phase.send_replace(SyncPhase::Unauthenticated);
                        }
                    }
                }
                Ok(()) = changes.changed() => {
                    changes.mark_unchanged();
                    if binding.is_some() {
                        debounce.arm();
                        phase.send_replace(SyncPhase::Syncing);
                    }
                }
                () = debounce.elapsed() => {
                    if let Some(binding) = &binding {
                        self.write(binding, &phase).await;
                    }
                }
                cmd = commands.recv() => match cmd {
                    Some(Command::Flush(reply)) => {
                        let result = self.flush(&mut debounce, binding.as_ref(), &phase).await;
                        let _ = reply.send(result);
                    }
                    Some(Command::Shutdown(reply)) => {
                        let result = self.flush(&mut debounce, binding.as_ref(), &phase).await;
                        let _ = reply.send(result);
                        break;
                    }
                    None => {
                        self.flush(&mut debounce, binding.as_ref(), &phase).await;
                        break;
                    }
                },
            }
        }
        tracing::debug!("sync loop stopped");
    }

    /// Find or create the snapshot and seed the store from it.
    async fn bootstrap(
        &self,
        token: &str,
        phase: &watch::Sender<SyncPhase>,
        changes: &mut watch::Receiver<Vec<Recipe>>,
    ) -> Option<Binding> {
        phase.send_replace(SyncPhase::Locating);
        let located = self.remote.locate(token).await;
        self.seed(token, located, phase, changes).await
    }

    /// Switch a bound session to a new token. When the token still reaches
    /// the same file the local list and any pending write are kept, and the
    /// write goes out with the new token.
    async fn rebind(
        &self,
        old: Binding,
        token: &str,
        debounce: &mut Debounce,
        phase: &watch::Sender<SyncPhase>,
        changes: &mut watch::Receiver<Vec<Recipe>>,
    ) -> Option<Binding> {
        phase.send_replace(SyncPhase::Locating);
        let located = self.remote.locate(token).await;
        if located.as_deref() == Some(old.file_id.as_str()) {
            tracing::debug!(file_id = %old.file_id, "access token changed, same file");
            phase.send_replace(if debounce.is_armed() {
                SyncPhase::Syncing
            } else {
                SyncPhase::Seeded
            });
            return Some(Binding {
                token: token.to_string(),
                file_id: old.file_id,
            });
        }

        if debounce.cancel() {
            tracing::warn!("token now reaches a different recipes file; pending save dropped");
        }
        self.seed(token, located, phase, changes).await
    }

    async fn seed(
        &self,
        token: &str,
        located: Option<String>,
        phase: &watch::Sender<SyncPhase>,
        changes: &mut watch::Receiver<Vec<Recipe>>,
    ) -> Option<Binding> {
        let (file_id, recipes) = if let Some(file_id) = located {
            phase.send_replace(SyncPhase::Downloading);
            let recipes = self.remote.download(token, &file_id).await;
            (file_id, recipes)
        } else {
            tracing::info!("no recipes file found, creating one");
            phase.send_replace(SyncPhase::Creating);
            let Some(file_id) = self.remote.create(token).await else {
                tracing::warn!("could not locate or create the recipes file; changes will stay local");
                phase.send_replace(SyncPhase::Unseeded);
                return None;
            };
            // A fresh file holds an empty list, no need to read it back
            (file_id, Vec::new())
        };

        tracing::info!(%file_id, count = recipes.len(), "syncing with Drive file");
        self.store.set_recipes(recipes);
        // Seeding mirrors the remote, so it must not echo back as a write
        changes.mark_unchanged();
        phase.send_replace(SyncPhase::Seeded);
        Some(Binding {
            token: token.to_string(),
            file_id,
        })
    }

    async fn write(&self, binding: &Binding, phase: &watch::Sender<SyncPhase>) -> bool {
        let recipes = self.store.recipes();
        tracing::debug!(count = recipes.len(), "saving recipes to Drive");
        let ok = self
            .remote
            .overwrite(&binding.token, &binding.file_id, &recipes)
            .await;
        if !ok {
            tracing::warn!(file_id = %binding.file_id, "saving recipes to Drive failed; change dropped");
        }
        phase.send_replace(SyncPhase::Seeded);
        ok
    }

    async fn flush(
        &self,
        debounce: &mut Debounce,
        binding: Option<&Binding>,
        phase: &watch::Sender<SyncPhase>,
    ) -> Option<bool> {
        if !debounce.cancel() {
            return None;
        }
        Some(self.write(binding?, phase).await)
    }
}

/// Control side of a running sync loop.
pub struct SyncHandle {
    phase: watch::Receiver<SyncPhase>,
    commands: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    #[must_use]
    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    #[must_use]
    pub fn subscribe_phase(&self) -> watch::Receiver<SyncPhase> {
        self.phase.clone()
    }

    /// Wait until bootstrap has finished (or there is nothing to bootstrap).
    pub async fn settled(&mut self) -> SyncPhase {
        if let Ok(phase) = self.phase.wait_for(|p| p.is_settled()).await {
            return *phase;
        }
        *self.phase.borrow()
    }

    /// Write a pending change now. `None` when nothing was pending or there is
    /// no remote file to write to.
    pub async fn flush(&self) -> Option<bool> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(Command::Flush(tx)).await.ok()?;
        rx.await.ok().flatten()
    }

    /// Flush, then stop the loop.
    pub async fn shutdown(self) -> Option<bool> {
        let (tx, rx) = oneshot::channel();
        let result = match self.commands.send(Command::Shutdown(tx)).await {
            Ok(()) => rx.await.ok().flatten(),
            Err(_) => None,
        };
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "sync task ended abnormally");
        }
        result
    }
}
