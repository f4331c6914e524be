use std::time::Duration;

use tokio::time::{Instant, sleep_until};

/// A restartable quiet-period timer.
///
/// Arming while already armed pushes the deadline back; [`Debounce::elapsed`]
/// resolves once the deadline passes and never resolves while disarmed, so it
/// can sit in a `select!` next to the events that re-arm it.
#[derive(Debug, Clone)]
pub struct Debounce {
    quiet: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    #[must_use]
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            deadline: None,
        }
    }

    #[must_use]
    pub fn quiet_period(&self) -> Duration {
        self.quiet
    }

    pub fn arm(&mut self) {
        self.deadline = Some(Instant::now() + self.quiet);
    }

    /// Disarm. Returns whether something was pending.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Wait for the deadline, then disarm. Pending forever when disarmed.
    pub async fn elapsed(&mut self) {
        match self.deadline {
            Some(deadline) => {
                sleep_until(deadline).await;
                self.deadline = None;
            }
            None => std::future::pending().await,
        }
    }
}
