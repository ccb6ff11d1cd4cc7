mod config;
pub mod live;
pub mod migrations;
pub mod pet_store;

pub use config::{Config, DecayConfig, NotificationsConfig, UiConfig};
pub use live::{LiveQuery, PetQuery};
pub use pet_store::PetStore;

use std::path::PathBuf;

/// Returns the directory holding `petcare.db` and `config.toml`.
///
/// `PETCARE_DATA_DIR` wins when set. Otherwise `~/.config/petcare[-dev]/`,
/// with the `-dev` suffix selected by `PETCARE_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let dir = match std::env::var_os("PETCARE_DATA_DIR") {
        Some(explicit) => PathBuf::from(explicit),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("PETCARE_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("petcare-dev")
            } else {
                base_dir.join("petcare")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
