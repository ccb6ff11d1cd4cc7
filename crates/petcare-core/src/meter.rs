//! Meter arithmetic and the periodic decay worker.
//!
//! Every change to a hunger or happiness gauge goes through [`adjust`], which
//! moves the value by one step and clamps it to `[MIN_METER, MAX_METER]`.
//!
//! [`DecayWorker`] applies [`tick`] to the store on a fixed interval. A pet
//! whose write fails is logged and skipped; the loop itself never stops on
//! error, only on cancellation.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::pet::Pet;
use crate::storage::PetStore;

pub const MIN_METER: i64 = 0;
pub const MAX_METER: i64 = 10;

/// Default time between two decay ticks.
pub const DECAY_INTERVAL: Duration = Duration::from_secs(60);

/// Step `value` up or down by one, clamped to the meter range.
pub fn adjust(value: i64, increment: bool) -> i64 {
    let step = if increment { 1 } else { -1 };
    value.saturating_add(step).clamp(MIN_METER, MAX_METER)
}

/// New meter values for one pet after a decay tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterDecay {
    pub pet_id: i64,
    pub hunger: i64,
    pub happy: i64,
}

/// Decay both meters of every adopted pet. Unadopted pets are left out.
pub fn tick(pets: &[Pet]) -> Vec<MeterDecay> {
    pets.iter()
        .filter(|pet| pet.is_adopted)
        .map(|pet| MeterDecay {
            pet_id: pet.id,
            hunger: adjust(pet.hunger_meter, false),
            happy: adjust(pet.happy_meter, false),
        })
        .collect()
}

/// Outcome of one decay pass against the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecayReport {
    pub updated: Vec<MeterDecay>,
    pub failed: Vec<i64>,
    pub at: DateTime<Utc>,
}

/// Run one decay tick against `store`.
///
/// Only reading the adopted list can fail the whole pass; individual pet
/// writes that fail are reported in `failed` and logged.
pub fn apply_decay(store: &PetStore) -> Result<DecayReport> {
    let adopted = store.pets_by_adoption(true)?;
    let mut report = DecayReport {
        updated: Vec::with_capacity(adopted.len()),
        failed: Vec::new(),
        at: Utc::now(),
    };

    for decay in tick(&adopted) {
        match store.update_meters(decay.pet_id, decay.hunger, decay.happy) {
            Ok(()) => {
                debug!(
                    pet_id = decay.pet_id,
                    hunger = decay.hunger,
                    happy = decay.happy,
                    "meters decayed"
                );
                report.updated.push(decay);
            }
            Err(e) => {
                warn!(pet_id = decay.pet_id, error = %e, "skipping pet in decay tick");
                report.failed.push(decay.pet_id);
            }
        }
    }

    Ok(report)
}

/// Background task that decays adopted pets' meters on a fixed interval.
///
/// The first tick runs as soon as [`run`](Self::run) starts, then once per
/// interval.
pub struct DecayWorker {
    store: PetStore,
    cancel: CancellationToken,
    interval: Duration,
}

impl DecayWorker {
    pub fn new(store: PetStore, cancel: CancellationToken) -> Self {
        Self {
            store,
            cancel,
            interval: DECAY_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run until the cancellation token is cancelled.
    ///
    /// ```rust,ignore
    /// let worker = DecayWorker::new(store, cancel.child_token());
    /// tokio::spawn(worker.run());
    /// ```
    pub async fn run(self) {
        info!(interval_secs = self.interval.as_secs(), "decay worker started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("decay worker stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match apply_decay(&self.store) {
                        Ok(report) if !report.failed.is_empty() => {
                            warn!(
                                updated = report.updated.len(),
                                failed = report.failed.len(),
                                "decay tick finished with failures"
                            );
                        }
                        Ok(report) => debug!(updated = report.updated.len(), "decay tick finished"),
                        Err(e) => warn!(error = %e, "decay tick failed, retrying next interval"),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn adjust_stays_in_range(v in -1000i64..=1000, inc in any::<bool>()) {
            let out = adjust(v, inc);
            prop_assert!((MIN_METER..=MAX_METER).contains(&out));
        }

        #[test]
        fn adjust_moves_by_one_inside_range(v in 1i64..=9, inc in any::<bool>()) {
            let expected = if inc { v + 1 } else { v - 1 };
            prop_assert_eq!(adjust(v, inc), expected);
        }
    }

    #[test]
    fn adjust_saturates_at_bounds() {
        assert_eq!(adjust(0, false), 0);
        assert_eq!(adjust(10, true), 10);
        assert_eq!(adjust(0, true), 1);
        assert_eq!(adjust(10, false), 9);
        assert_eq!(adjust(i64::MAX, true), 10);
        assert_eq!(adjust(i64::MIN, false), 0);
    }

    #[test]
    fn tick_only_touches_adopted_pets() {
        let mut owned = Pet::new("Owned", 1).with_meters(1, 0).adopted(true);
        owned.id = 1;
        let mut wild = Pet::new("Wild", 1).with_meters(4, 4);
        wild.id = 2;

        let decays = tick(&[owned, wild]);
        assert_eq!(
            decays,
            vec![MeterDecay {
                pet_id: 1,
                hunger: 0,
                happy: 0
            }]
        );
    }

    #[test]
    fn apply_decay_writes_adopted_pets_only() {
        let store = PetStore::open_memory().unwrap();
        let owned = store
            .upsert(&Pet::new("Owned", 1).with_meters(1, 3).adopted(true))
            .unwrap();
        let wild = store.upsert(&Pet::new("Wild", 1).with_meters(4, 4)).unwrap();

        let report = apply_decay(&store).unwrap();
        assert_eq!(report.updated.len(), 1);
        assert!(report.failed.is_empty());
        assert_eq!(store.meters(owned).unwrap(), Some((0, 2)));
        assert_eq!(store.meters(wild).unwrap(), Some((4, 4)));

        apply_decay(&store).unwrap();
        assert_eq!(store.meters(owned).unwrap(), Some((0, 1)));
    }

    #[test]
    fn apply_decay_skips_pets_whose_write_fails() {
        let store = PetStore::open_memory().unwrap();
        let stuck = store
            .upsert(&Pet::new("Stuck", 1).with_meters(4, 4).adopted(true))
            .unwrap();
        let fine = store
            .upsert(&Pet::new("Fine", 1).with_meters(4, 4).adopted(true))
            .unwrap();
        store
            .execute_batch(&format!(
                "CREATE TRIGGER meters_locked BEFORE UPDATE ON pets WHEN OLD.id = {stuck}
                 BEGIN SELECT RAISE(ABORT, 'meters locked'); END;"
            ))
            .unwrap();

        let report = apply_decay(&store).unwrap();
        assert_eq!(report.failed, vec![stuck]);
        assert_eq!(report.updated.len(), 1);
        assert_eq!(report.updated[0].pet_id, fine);
        assert_eq!(store.meters(fine).unwrap(), Some((3, 3)));
        assert_eq!(store.meters(stuck).unwrap(), Some((4, 4)));
    }

    #[tokio::test(start_paused = true)]
    async fn worker_ticks_on_interval_and_stops_on_cancel() {
        let store = PetStore::open_memory().unwrap();
        let id = store
            .upsert(&Pet::new("Owned", 1).with_meters(5, 5).adopted(true))
            .unwrap();

        let cancel = CancellationToken::new();
        let worker = DecayWorker::new(store.clone(), cancel.clone());
        let handle = tokio::spawn(worker.run());

        // First tick fires on start.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(store.meters(id).unwrap(), Some((4, 4)));

        tokio::time::sleep(Duration::from_secs(58)).await;
        assert_eq!(store.meters(id).unwrap(), Some((4, 4)));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(store.meters(id).unwrap(), Some((3, 3)));

        cancel.cancel();
        handle.await.unwrap();

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(store.meters(id).unwrap(), Some((3, 3)));
    }
}
