//! Delayed, replaceable attention checks.
//!
//! Only one reminder is pending at a time: scheduling a new one aborts the
//! previous one.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::notifier::{AttentionNotifier, NotifierReport};

type Pending = Option<JoinHandle<Option<NotifierReport>>>;

pub struct ReminderScheduler {
    notifier: Arc<AttentionNotifier>,
    pending: Mutex<Pending>,
}

impl ReminderScheduler {
    pub fn new(notifier: Arc<AttentionNotifier>) -> Self {
        Self {
            notifier,
            pending: Mutex::new(None),
        }
    }

    fn pending(&self) -> MutexGuard<'_, Pending> {
        // The guarded value is just a handle; a poisoned lock is still usable.
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run the notifier once after `delay`, replacing any pending reminder.
    pub fn schedule(&self, delay: Duration) {
        let notifier = Arc::clone(&self.notifier);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match notifier.run_once().await {
                Ok(report) => {
                    info!(raised = report.raised.len(), "reminder fired");
                    Some(report)
                }
                Err(e) => {
                    warn!(error = %e, "reminder pass failed");
                    None
                }
            }
        });

        if let Some(previous) = self.pending().replace(task) {
            previous.abort();
        }
        info!(delay_secs = delay.as_secs(), "reminder scheduled");
    }

    pub fn is_pending(&self) -> bool {
        self.pending()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Wait for the pending reminder and return its report.
    ///
    /// `None` when nothing is pending, the pass failed, or it was aborted.
    pub async fn wait(&self) -> Option<NotifierReport> {
        let task = self.pending().take()?;
        task.await.ok().flatten()
    }

    /// Abort the pending reminder, if any.
    pub fn cancel(&self) {
        if let Some(previous) = self.pending().take() {
            previous.abort();
        }
    }
}

impl Drop for ReminderScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
