//! Attention alert commands for CLI.

use std::sync::Arc;
use std::time::Duration;

use clap::Subcommand;
use petcare_core::{
    Alert, AlertSink, AttentionNotifier, Config, CoreError, PetStore, ReminderScheduler,
};

#[derive(Subcommand)]
pub enum NotifyAction {
    /// Check adopted pets once and print any alerts raised
    Run {
        /// Wait this many seconds before checking
        #[arg(long)]
        delay_secs: Option<u64>,
    },
    /// Turn notifications on
    Enable,
}

/// Writes each alert to stdout as one JSON line.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl AlertSink for StdoutSink {
    fn raise(&self, alert: &Alert) -> petcare_core::error::Result<()> {
        let line = serde_json::to_string(alert)?;
        println!("{line}");
        Ok(())
    }
}

pub async fn run(action: NotifyAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        NotifyAction::Run { delay_secs } => {
            let config = Config::load_or_default();
            let store = PetStore::open()?;
            let notifier = AttentionNotifier::new(store, Arc::new(StdoutSink))
                .with_enabled(config.notifications.enabled);

            let report = match delay_secs {
                Some(secs) => {
                    let reminder = ReminderScheduler::new(Arc::new(notifier));
                    reminder.schedule(Duration::from_secs(secs));
                    reminder
                        .wait()
                        .await
                        .ok_or_else(|| CoreError::Custom("reminder did not complete".into()))?
                }
                None => notifier.run_once().await?,
            };
            if report.failed > 0 {
                tracing::warn!(failed = report.failed, "some pets could not be checked");
            }
        }
        NotifyAction::Enable => {
            let mut config = Config::load()?;
            config.set("notifications.enabled", "true")?;
            StdoutSink.raise(&Alert::notifications_enabled())?;
        }
    }
    Ok(())
}
