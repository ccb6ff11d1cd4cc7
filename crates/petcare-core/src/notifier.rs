//! Attention alerts for adopted pets whose meters hit zero.
//!
//! [`AttentionNotifier::run_once`] is one pass: read the adopted pets, check
//! each pet's `(hunger, happy)` pair in its own task, raise alerts through an
//! [`AlertSink`], and return. Re-arming is up to whoever calls it (the
//! [`ReminderScheduler`](crate::reminder::ReminderScheduler), the CLI, or
//! [`AttentionNotifier::watch`]).
//!
//! The last alert kind raised for a pet is remembered in the store's kv table
//! under `alert:<id>`, so an occurrence is reported once across passes. The
//! marker is cleared when both meters are above zero again.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::pet::Pet;
use crate::storage::pet_store::alert_key;
use crate::storage::{PetQuery, PetStore};

/// Which meters are empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    HungryAndSad,
    Hungry,
    Sad,
}

impl AlertKind {
    /// `None` while both meters are above zero.
    pub fn from_meters(hunger: i64, happy: i64) -> Option<Self> {
        match (hunger <= 0, happy <= 0) {
            (true, true) => Some(AlertKind::HungryAndSad),
            (true, false) => Some(AlertKind::Hungry),
            (false, true) => Some(AlertKind::Sad),
            (false, false) => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            AlertKind::HungryAndSad => "hungry_and_sad",
            AlertKind::Hungry => "hungry",
            AlertKind::Sad => "sad",
        }
    }

    pub fn message(self, name: &str) -> String {
        match self {
            AlertKind::HungryAndSad => format!("{name} is hungry and sad"),
            AlertKind::Hungry => format!("{name} is craving a cinnamon bun!"),
            AlertKind::Sad => format!("{name} is feeling blue"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Default,
    High,
}

/// A user-visible alert handed to the notification collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Pet id the alert is about; replaces any earlier alert with the same key.
    pub recipient: i64,
    pub title: String,
    pub body: String,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<AlertKind>,
    pub at: DateTime<Utc>,
}

impl Alert {
    pub fn for_pet(pet: &Pet, kind: AlertKind) -> Self {
        Self {
            recipient: pet.id,
            title: format!("{} Needs Your Attention", pet.name),
            body: kind.message(&pet.name),
            priority: Priority::High,
            kind: Some(kind),
            at: Utc::now(),
        }
    }

    /// Confirmation shown once the user turns notifications on.
    pub fn notifications_enabled() -> Self {
        Self {
            recipient: 0,
            title: "Notifications".into(),
            body: "You have enabled notifications".into(),
            priority: Priority::High,
            kind: None,
            at: Utc::now(),
        }
    }
}

/// The "raise a user-visible alert" capability.
///
/// Channel setup and permission checks belong to the implementation.
pub trait AlertSink: Send + Sync {
    fn raise(&self, alert: &Alert) -> Result<()>;
}

/// Sink that only logs. Used when no front end is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl AlertSink for LogSink {
    fn raise(&self, alert: &Alert) -> Result<()> {
        info!(
            recipient = alert.recipient,
            title = %alert.title,
            body = %alert.body,
            "pet alert"
        );
        Ok(())
    }
}

/// What a single pass did.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifierReport {
    pub raised: Vec<Alert>,
    /// Pets whose check failed; their siblings were still checked.
    pub failed: usize,
}

pub struct AttentionNotifier {
    store: PetStore,
    sink: Arc<dyn AlertSink>,
    enabled: bool,
}

impl AttentionNotifier {
    pub fn new(store: PetStore, sink: Arc<dyn AlertSink>) -> Self {
        Self {
            store,
            sink,
            enabled: true,
        }
    }

    /// A disabled notifier runs no checks at all.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Check every adopted pet once and raise the alerts that are due.
    ///
    /// # Errors
    /// Fails only if the adopted-pets query itself fails.
    pub async fn run_once(&self) -> Result<NotifierReport> {
        if !self.enabled {
            debug!("notifications disabled, skipping attention check");
            return Ok(NotifierReport::default());
        }

        let mut adopted = self.store.subscribe(PetQuery::ByAdoption(true));
        match adopted.next().await {
            Some(pets) => Ok(self.check_all(pets?).await),
            None => Ok(NotifierReport::default()),
        }
    }

    /// Keep checking on every store change until `cancel` fires.
    pub async fn watch(&self, cancel: CancellationToken) {
        if !self.enabled {
            return;
        }
        info!("attention notifier watching");
        let mut adopted = self.store.subscribe(PetQuery::ByAdoption(true));

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                snapshot = adopted.next() => match snapshot {
                    Some(Ok(pets)) => {
                        let report = self.check_all(pets).await;
                        if !report.raised.is_empty() || report.failed > 0 {
                            debug!(raised = report.raised.len(), failed = report.failed, "attention pass");
                        }
                    }
                    Some(Err(e)) => warn!(error = %e, "adopted pets query failed"),
                    None => break,
                },
            }
        }
        info!("attention notifier stopped");
    }

    async fn check_all(&self, pets: Vec<Pet>) -> NotifierReport {
        let mut tasks = JoinSet::new();
        for pet in pets {
            let store = self.store.clone();
            let sink = Arc::clone(&self.sink);
            tasks.spawn(async move {
                let result = check_pet(&store, sink.as_ref(), &pet).await;
                (pet.id, result)
            });
        }

        let mut report = NotifierReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(Some(alert)))) => report.raised.push(alert),
                Ok((_, Ok(None))) => {}
                Ok((pet_id, Err(e))) => {
                    warn!(pet_id, error = %e, "attention check failed");
                    report.failed += 1;
                }
                Err(e) => {
                    warn!(error = %e, "attention check task aborted");
                    report.failed += 1;
                }
            }
        }
        report.raised.sort_by_key(|alert| alert.recipient);
        report
    }
}

async fn check_pet(store: &PetStore, sink: &dyn AlertSink, pet: &Pet) -> Result<Option<Alert>> {
    let mut meters = store.subscribe_meters(pet.id);
    let Some((hunger, happy)) = meters.next().await.transpose()?.flatten() else {
        return Ok(None);
    };

    let key = alert_key(pet.id);
    let last = store.kv_get(&key)?;

    match AlertKind::from_meters(hunger, happy) {
        None => {
            if last.is_some() {
                store.kv_delete(&key)?;
            }
            Ok(None)
        }
        Some(kind) if last.as_deref() == Some(kind.as_str()) => Ok(None),
        Some(kind) => {
            let alert = Alert::for_pet(pet, kind);
            sink.raise(&alert)?;
            store.kv_set(&key, kind.as_str())?;
            Ok(Some(alert))
        }
    }
}
