//! Pet state coordinator.
//!
//! Owns the observable [`PetState`] and turns [`PetEvent`]s into store and
//! meter-engine calls. In-memory transitions happen synchronously inside
//! [`PetCoordinator::on_event`]; store writes are spawned and their failures
//! are logged, never reported back.
//!
//! ## Tasks
//!
//! ```text
//! activate() -> seed roster if empty
//!            -> view task   (follows the live query of the active sort)
//!            -> decay task  (DecayWorker, one tick per interval)
//! ```
//!
//! Both tasks and any in-flight writes stop at [`PetCoordinator::shutdown`]
//! or when the coordinator is dropped.

mod event;
mod state;

pub use event::PetEvent;
pub use state::PetState;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::error::{Result, ValidationError};
use crate::meter::{self, DecayWorker};
use crate::pet::{starter_roster, MeterKind, Pet, SortType};
use crate::storage::{Config, PetQuery, PetStore};

/// Write the starter roster when the store has no pets at all.
///
/// Returns the number of pets written; 0 means the store was already seeded.
pub fn seed_if_empty(store: &PetStore) -> Result<usize> {
    let seeded = store.insert_if_empty(&starter_roster())?;
    if seeded > 0 {
        info!(count = seeded, "seeded starter roster");
    }
    Ok(seeded)
}

/// A store mutation requested by an event.
#[derive(Debug, Clone)]
enum StoreWrite {
    Adoption { pet_id: i64, adopted: bool },
    Delete(Pet),
    Upsert(Pet),
    Meter { pet_id: i64, kind: MeterKind, increment: bool },
}

impl StoreWrite {
    /// Returns the id of the pet written, `None` when nothing was.
    fn apply(self, store: &PetStore) -> Result<Option<i64>> {
        match self {
            StoreWrite::Adoption { pet_id, adopted } => {
                store.update_adoption(pet_id, adopted)?;
                Ok(Some(pet_id))
            }
            StoreWrite::Delete(pet) => {
                store.delete(&pet)?;
                Ok(Some(pet.id))
            }
            StoreWrite::Upsert(pet) => store.upsert(&pet).map(Some),
            StoreWrite::Meter {
                pet_id,
                kind,
                increment,
            } => {
                // Read from the store rather than the event's copy, which may be stale.
                let Some(current) = store.meter(kind, pet_id)? else {
                    debug!(pet_id, ?kind, "meter update for missing pet ignored");
                    return Ok(None);
                };
                store.update_meter(pet_id, kind, meter::adjust(current, increment))?;
                Ok(Some(pet_id))
            }
        }
    }
}

/// The published view-state and the store revision its pet list was read at.
struct View {
    state: watch::Sender<PetState>,
    revision: AtomicU64,
}

impl View {
    /// Replace the pet list unless the sort moved on while it was being read
    /// or a newer read has already been published.
    fn publish(&self, sort: SortType, revision: u64, pets: Vec<Pet>) {
        self.state.send_if_modified(|current| {
            // The watch lock is held here, so the load/store pair can't interleave.
            if current.sort_type != sort || revision < self.revision.load(Ordering::Relaxed) {
                return false;
            }
            self.revision.store(revision, Ordering::Relaxed);
            if current.pets == pets {
                return false;
            }
            current.pets = pets;
            true
        });
    }
}

pub struct PetCoordinator {
    store: PetStore,
    view: Arc<View>,
    sort: Arc<watch::Sender<SortType>>,
    runtime: OnceLock<Handle>,
    cancel: CancellationToken,
    workers: TaskTracker,
    writes: TaskTracker,
    decay_interval: Option<Duration>,
}

impl PetCoordinator {
    pub fn new(store: PetStore) -> Self {
        let initial = PetState::default();
        let (sort, _) = watch::channel(initial.sort_type);
        let (state, _) = watch::channel(initial);
        let runtime = OnceLock::new();
        if let Ok(handle) = Handle::try_current() {
            let _ = runtime.set(handle);
        }
        Self {
            store,
            view: Arc::new(View {
                state,
                revision: AtomicU64::new(0),
            }),
            sort: Arc::new(sort),
            runtime,
            cancel: CancellationToken::new(),
            workers: TaskTracker::new(),
            writes: TaskTracker::new(),
            decay_interval: Some(meter::DECAY_INTERVAL),
        }
    }

    /// Coordinator with the sort and decay settings from `config`.
    pub fn with_config(store: PetStore, config: &Config) -> Self {
        let decay = config.decay.enabled.then(|| config.decay.interval());
        let coordinator = Self::new(store).with_decay_interval(decay);
        coordinator.set_sort(config.ui.default_sort);
        coordinator
    }

    /// `None` disables the decay task.
    pub fn with_decay_interval(mut self, interval: Option<Duration>) -> Self {
        self.decay_interval = interval;
        self
    }

    pub fn store(&self) -> &PetStore {
        &self.store
    }

    /// Seed the store, publish the first pet list and start background tasks.
    ///
    /// Returns how many starter pets were written.
    pub async fn activate(&self) -> Result<usize> {
        self.runtime.get_or_init(Handle::current);
        let seeded = seed_if_empty(&self.store)?;
        match self.store.pets_ordered_by_name() {
            Ok(pets) => debug!(?pets, "store content"),
            Err(e) => warn!(error = %e, "could not dump store content"),
        }

        self.refresh()?;

        self.workers.spawn(follow_sort(
            self.store.clone(),
            Arc::clone(&self.view),
            self.sort.subscribe(),
            self.cancel.child_token(),
        ));

        if let Some(interval) = self.decay_interval {
            let worker = DecayWorker::new(self.store.clone(), self.cancel.child_token())
                .with_interval(interval);
            self.workers.spawn(worker.run());
        }

        info!(seeded, "pet coordinator active");
        Ok(seeded)
    }

    /// Current view-state.
    pub fn state(&self) -> PetState {
        self.view.state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<PetState> {
        self.view.state.subscribe()
    }

    /// Pets from the current list with the given adoption flag.
    pub fn pets_by_adoption(&self, is_adopted: bool) -> Vec<Pet> {
        self.view
            .state
            .borrow()
            .pets
            .iter()
            .filter(|pet| pet.is_adopted == is_adopted)
            .cloned()
            .collect()
    }

    pub fn pet(&self, id: i64) -> Result<Option<Pet>> {
        self.store.pet_by_id(id)
    }

    /// Apply an event. Store writes run in the background.
    ///
    /// Safe to call from any thread. Writes go to the runtime the coordinator
    /// was created or activated on; with neither, the write is logged and
    /// dropped.
    ///
    /// # Errors
    /// Only rejected form input is reported; write failures are logged.
    pub fn on_event(&self, event: PetEvent) -> Result<()> {
        let Some(write) = self.transition(event)? else {
            return Ok(());
        };
        if self.cancel.is_cancelled() {
            debug!(?write, "coordinator shut down, dropping write");
            return Ok(());
        }
        let Some(runtime) = self.runtime.get() else {
            warn!(?write, "no tokio runtime to run the write on, dropping it");
            return Ok(());
        };

        let store = self.store.clone();
        let cancel = self.cancel.clone();
        self.writes.spawn_blocking_on(
            move || {
                if cancel.is_cancelled() {
                    return;
                }
                if let Err(e) = write.apply(&store) {
                    warn!(error = %e, "store write failed");
                }
            },
            runtime,
        );
        Ok(())
    }

    /// Apply an event and wait for its store write.
    ///
    /// Returns the id of the pet written, so a saved form yields the new
    /// row's id. The pet list is refreshed before returning, so
    /// [`state`](Self::state) already reflects the write.
    pub async fn handle_event(&self, event: PetEvent) -> Result<Option<i64>> {
        let Some(write) = self.transition(event)? else {
            return Ok(None);
        };
        let written = write.apply(&self.store)?;
        self.refresh()?;
        Ok(written)
    }

    /// Wait until every write spawned by [`on_event`](Self::on_event) has finished.
    pub async fn settle(&self) {
        self.writes.close();
        self.writes.wait().await;
        self.writes.reopen();
    }

    /// Stop the view and decay tasks and wait for in-flight writes.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.workers.close();
        self.writes.close();
        self.workers.wait().await;
        self.writes.wait().await;
        info!("pet coordinator stopped");
    }

    /// Re-run the active query and publish it.
    fn refresh(&self) -> Result<()> {
        let sort = *self.sort.borrow();
        let revision = self.store.revision();
        let pets = PetQuery::from(sort).run(&self.store)?;
        self.view.publish(sort, revision, pets);
        Ok(())
    }

    fn set_sort(&self, sort: SortType) {
        self.sort.send_replace(sort);
        self.view.state.send_modify(|state| state.sort_type = sort);
    }

    /// The synchronous half of event handling.
    fn transition(&self, event: PetEvent) -> Result<Option<StoreWrite>> {
        let write = match event {
            PetEvent::AdoptPet(pet) => Some(StoreWrite::Adoption {
                pet_id: pet.id,
                adopted: true,
            }),
            PetEvent::ReleasePet(pet) => Some(StoreWrite::Adoption {
                pet_id: pet.id,
                adopted: false,
            }),
            PetEvent::DeletePet(pet) => Some(StoreWrite::Delete(pet)),
            PetEvent::SortPets(sort) => {
                self.set_sort(sort);
                if let Err(e) = self.refresh() {
                    warn!(error = %e, ?sort, "could not load pets for new sort");
                }
                None
            }
            PetEvent::ShowDialog => {
                self.view.state.send_modify(|state| state.is_adding_pet = true);
                None
            }
            PetEvent::HideDialog => {
                self.view.state.send_modify(|state| {
                    state.is_adding_pet = false;
                    state.reset_form();
                });
                None
            }
            PetEvent::SetName(name) => {
                self.view.state.send_modify(|state| state.name = name);
                None
            }
            PetEvent::SetAge(raw) => {
                let age = parse_age(&raw)?;
                self.view.state.send_modify(|state| state.age = age);
                None
            }
            PetEvent::SavePet => {
                let pet = {
                    let state = self.view.state.borrow();
                    if state.name.trim().is_empty() {
                        debug!("save ignored: blank name");
                        return Ok(None);
                    }
                    state.form_pet()
                };
                self.view.state.send_modify(|state| {
                    state.reset_form();
                    state.is_adding_pet = false;
                });
                Some(StoreWrite::Upsert(pet))
            }
            PetEvent::UpdateHungerMeter { pet, increment } => Some(StoreWrite::Meter {
                pet_id: pet.id,
                kind: MeterKind::Hunger,
                increment,
            }),
            PetEvent::UpdateHappyMeter { pet, increment } => Some(StoreWrite::Meter {
                pet_id: pet.id,
                kind: MeterKind::Happy,
                increment,
            }),
        };
        Ok(write)
    }
}

impl Drop for PetCoordinator {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn parse_age(raw: &str) -> Result<i64> {
    let invalid = |message: String| ValidationError::InvalidInput {
        field: "age".into(),
        message,
    };
    let age: i64 = raw
        .trim()
        .parse()
        .map_err(|_| invalid(format!("'{raw}' is not a number")))?;
    if age < 0 {
        return Err(invalid(format!("{age} is negative")).into());
    }
    Ok(age)
}

/// Keep the pet list in step with the live query of the active sort.
///
/// A sort change drops the old subscription and opens a new one.
async fn follow_sort(
    store: PetStore,
    view: Arc<View>,
    mut sort_rx: watch::Receiver<SortType>,
    cancel: CancellationToken,
) {
    loop {
        let sort = *sort_rx.borrow_and_update();
        let mut live = store.subscribe(PetQuery::from(sort));

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                changed = sort_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    debug!("sort changed, switching query");
                    break;
                }
                snapshot = live.next_stamped() => match snapshot {
                    Some(Ok((revision, pets))) => view.publish(sort, revision, pets),
                    Some(Err(e)) => warn!(error = %e, "pet list query failed"),
                    None => return,
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    fn coordinator() -> PetCoordinator {
        PetCoordinator::new(PetStore::open_memory().unwrap()).with_decay_interval(None)
    }

    #[test]
    fn parse_age_rejects_text_and_negatives() {
        assert_eq!(parse_age(" 4 ").unwrap(), 4);
        assert!(matches!(
            parse_age("four"),
            Err(CoreError::Validation(ValidationError::InvalidInput { .. }))
        ));
        assert!(parse_age("-1").is_err());
        assert!(parse_age("").is_err());
    }

    #[tokio::test]
    async fn set_age_error_leaves_form_untouched() {
        let coordinator = coordinator();
        coordinator.on_event(PetEvent::SetAge("3".into())).unwrap();
        assert!(coordinator.on_event(PetEvent::SetAge("abc".into())).is_err());
        assert_eq!(coordinator.state().age, 3);
    }

    #[tokio::test]
    async fn hide_dialog_discards_form_edits() {
        let coordinator = coordinator();
        coordinator.on_event(PetEvent::ShowDialog).unwrap();
        coordinator.on_event(PetEvent::SetName("Draft".into())).unwrap();
        coordinator.on_event(PetEvent::SetAge("9".into())).unwrap();
        assert!(coordinator.state().is_adding_pet);

        coordinator.on_event(PetEvent::HideDialog).unwrap();
        let state = coordinator.state();
        assert!(!state.is_adding_pet);
        assert_eq!(state.name, "");
        assert_eq!(state.age, 1);
    }

    #[tokio::test]
    async fn blank_save_writes_nothing_and_keeps_dialog_open() {
        let coordinator = coordinator();
        coordinator.on_event(PetEvent::ShowDialog).unwrap();
        coordinator.on_event(PetEvent::SetName("   ".into())).unwrap();
        coordinator.on_event(PetEvent::SavePet).unwrap();
        coordinator.settle().await;

        assert_eq!(coordinator.store().count().unwrap(), 0);
        assert!(coordinator.state().is_adding_pet);
    }

    #[tokio::test]
    async fn save_writes_pet_and_clears_form() {
        let coordinator = coordinator();
        coordinator.on_event(PetEvent::ShowDialog).unwrap();
        coordinator.on_event(PetEvent::SetName("Kuchipatchi".into())).unwrap();
        coordinator.on_event(PetEvent::SetAge("4".into())).unwrap();
        coordinator.on_event(PetEvent::SavePet).unwrap();

        let state = coordinator.state();
        assert!(!state.is_adding_pet);
        assert_eq!(state.name, "");

        coordinator.settle().await;
        let stored = coordinator.store().pets_ordered_by_name().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].name, "Kuchipatchi");
        assert_eq!(stored[0].age, 4);
        assert!(!stored[0].is_adopted);
    }

    #[tokio::test]
    async fn meter_update_for_missing_pet_is_noop() {
        let coordinator = coordinator();
        let mut ghost = Pet::new("Ghost", 1);
        ghost.id = 77;
        coordinator
            .handle_event(PetEvent::UpdateHungerMeter {
                pet: ghost,
                increment: true,
            })
            .await
            .unwrap();
        assert_eq!(coordinator.store().count().unwrap(), 0);
    }

    #[tokio::test]
    async fn meter_update_reads_current_store_value() {
        let coordinator = coordinator();
        let id = coordinator.store().upsert(&Pet::new("Rex", 1)).unwrap();
        let stale = coordinator.store().pet_by_id(id).unwrap().unwrap();
        coordinator
            .store()
            .update_meter(id, MeterKind::Hunger, 9)
            .unwrap();

        coordinator
            .handle_event(PetEvent::UpdateHungerMeter {
                pet: stale,
                increment: true,
            })
            .await
            .unwrap();
        assert_eq!(
            coordinator.store().meter(MeterKind::Hunger, id).unwrap(),
            Some(10)
        );
    }

    #[test]
    fn on_event_without_runtime_drops_write() {
        let store = PetStore::open_memory().unwrap();
        let id = store.upsert(&Pet::new("Rex", 1)).unwrap();
        let pet = store.pet_by_id(id).unwrap().unwrap();
        let coordinator = PetCoordinator::new(store.clone()).with_decay_interval(None);

        coordinator.on_event(PetEvent::ShowDialog).unwrap();
        coordinator.on_event(PetEvent::AdoptPet(pet)).unwrap();
        assert!(coordinator.state().is_adding_pet);
        assert!(!store.pet_by_id(id).unwrap().unwrap().is_adopted);
    }

    #[test]
    fn on_event_from_plain_thread_uses_activation_runtime() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        let store = PetStore::open_memory().unwrap();
        let coordinator = PetCoordinator::new(store.clone()).with_decay_interval(None);
        runtime.block_on(coordinator.activate()).unwrap();

        let pet = coordinator.state().pets[0].clone();
        coordinator.on_event(PetEvent::AdoptPet(pet.clone())).unwrap();
        runtime.block_on(coordinator.settle());
        assert!(store.pet_by_id(pet.id).unwrap().unwrap().is_adopted);

        runtime.block_on(coordinator.shutdown());
    }

    #[tokio::test]
    async fn late_older_snapshot_is_not_published() {
        let coordinator = coordinator();
        coordinator.store().upsert(&Pet::new("Rex", 1)).unwrap();
        let stale_revision = coordinator.store().revision();
        let stale = coordinator.store().pets_ordered_by_name().unwrap();

        coordinator
            .handle_event(PetEvent::AdoptPet(stale[0].clone()))
            .await
            .unwrap();
        assert!(coordinator.state().pets[0].is_adopted);

        // A read that started before the adoption finishes after it.
        coordinator.view.publish(SortType::Name, stale_revision, stale);
        assert!(coordinator.state().pets[0].is_adopted);
    }

    #[tokio::test]
    async fn save_returns_new_pet_id() {
        let coordinator = coordinator();
        coordinator.on_event(PetEvent::SetName("Kuchipatchi".into())).unwrap();
        let id = coordinator
            .handle_event(PetEvent::SavePet)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(coordinator.pet(id).unwrap().unwrap().name, "Kuchipatchi");
        assert_eq!(coordinator.handle_event(PetEvent::ShowDialog).await.unwrap(), None);
    }

    #[tokio::test]
    async fn writes_after_shutdown_are_dropped() {
        let coordinator = coordinator();
        coordinator.activate().await.unwrap();
        let pet = coordinator.store().pets_ordered_by_name().unwrap()[0].clone();
        coordinator.shutdown().await;

        coordinator.on_event(PetEvent::AdoptPet(pet.clone())).unwrap();
        tokio::task::yield_now().await;
        assert!(!coordinator.store().pet_by_id(pet.id).unwrap().unwrap().is_adopted);
    }
}
