pub mod config;
pub mod daemon;
pub mod notify;
pub mod pet;

use petcare_core::{Config, PetCoordinator, PetStore};

/// A coordinator over the on-disk store, seeded and refreshed, with decay off.
///
/// One-shot commands never run the decay worker; `pet decay` and the daemon
/// own that.
pub(crate) async fn open_coordinator(
    config: &Config,
) -> Result<PetCoordinator, Box<dyn std::error::Error>> {
    let store = PetStore::open()?;
    let coordinator = PetCoordinator::with_config(store, config).with_decay_interval(None);
    coordinator.activate().await?;
    Ok(coordinator)
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
