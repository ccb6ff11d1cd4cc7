//! Long-running mode: decay worker, view task and attention watch.

use std::sync::Arc;

use petcare_core::{AttentionNotifier, Config, LogSink, PetCoordinator, PetStore};
use tokio_util::sync::CancellationToken;
use tracing::info;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let store = PetStore::open()?;

    let coordinator = PetCoordinator::with_config(store.clone(), &config);
    coordinator.activate().await?;

    let notifier = AttentionNotifier::new(store, Arc::new(LogSink))
        .with_enabled(config.notifications.enabled);
    let cancel = CancellationToken::new();
    let watch = tokio::spawn({
        let cancel = cancel.clone();
        async move { notifier.watch(cancel).await }
    });

    info!(
        decay = config.decay.enabled,
        interval_secs = config.decay.interval_secs,
        "daemon running, press Ctrl-C to stop"
    );
    tokio::signal::ctrl_c().await?;

    info!("shutting down");
    cancel.cancel();
    coordinator.shutdown().await;
    watch.await?;
    Ok(())
}
