//! Live queries over the pet store.
//!
//! A [`LiveQuery`] pairs a read closure with the store's revision channel.
//! The first `next()` yields the current result; every later `next()` waits
//! for at least one write and then re-runs the read. Intermediate writes may
//! be coalesced, but a snapshot is never older than one already returned,
//! because the revision is marked seen *before* the read runs.
//!
//! Dropping the handle is the cancellation.

use tokio::sync::watch;

use super::pet_store::PetStore;
use crate::error::Result;
use crate::pet::{Pet, SortType};

/// Descriptor for the list-shaped pet queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PetQuery {
    OrderedByName,
    OrderedByAge,
    ByAdoption(bool),
}

impl PetQuery {
    /// Run the query once against `store`.
    pub fn run(self, store: &PetStore) -> Result<Vec<Pet>> {
        match self {
            PetQuery::OrderedByName => store.pets_ordered_by_name(),
            PetQuery::OrderedByAge => store.pets_ordered_by_age(),
            PetQuery::ByAdoption(flag) => store.pets_by_adoption(flag),
        }
    }
}

impl From<SortType> for PetQuery {
    fn from(sort: SortType) -> Self {
        match sort {
            SortType::Adopted => PetQuery::ByAdoption(true),
            SortType::Name => PetQuery::OrderedByName,
            SortType::Age => PetQuery::OrderedByAge,
        }
    }
}

type Fetch<T> = Box<dyn Fn(&PetStore) -> Result<T> + Send + Sync>;

/// A store read that keeps emitting fresh results as the data changes.
pub struct LiveQuery<T> {
    store: PetStore,
    changes: watch::Receiver<u64>,
    fetch: Fetch<T>,
    primed: bool,
}

impl<T> LiveQuery<T> {
    pub(crate) fn new<F>(store: PetStore, fetch: F) -> Self
    where
        F: Fn(&PetStore) -> Result<T> + Send + Sync + 'static,
    {
        let changes = store.changes();
        Self {
            store,
            changes,
            fetch: Box::new(fetch),
            primed: false,
        }
    }

    /// Wait for the next snapshot.
    ///
    /// Returns `None` once the store can no longer signal changes.
    pub async fn next(&mut self) -> Option<Result<T>> {
        self.next_stamped()
            .await
            .map(|snapshot| snapshot.map(|(_, value)| value))
    }

    /// Like [`next`](Self::next), paired with the store revision observed
    /// just before the read. The snapshot reflects at least that revision.
    pub async fn next_stamped(&mut self) -> Option<Result<(u64, T)>> {
        if self.primed {
            self.changes.changed().await.ok()?;
        }
        self.primed = true;
        let revision = *self.changes.borrow_and_update();
        Some((self.fetch)(&self.store).map(|value| (revision, value)))
    }

    /// Run the read now without waiting or consuming a change.
    pub fn current(&self) -> Result<T> {
        (self.fetch)(&self.store)
    }
}

impl<T> std::fmt::Debug for LiveQuery<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveQuery")
            .field("primed", &self.primed)
            .finish_non_exhaustive()
    }
}
