//! SQLite-backed pet storage.
//!
//! Provides persistent storage for:
//! - Pet records (CRUD plus direct field writes for meters and adoption)
//! - Live queries that re-emit whenever a write lands
//! - Key-value store for small pieces of application state
//!
//! One connection is shared behind a mutex, so writes are serialized. Every
//! successful mutation bumps a revision counter that wakes live queries.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::watch;

use super::data_dir;
use super::live::{LiveQuery, PetQuery};
use super::migrations;
use crate::error::{DatabaseError, Result};
use crate::pet::{MeterKind, Pet};

const PET_COLUMNS: &str = "id, name, age, hunger_meter, happy_meter, image, is_adopted";

/// Kv key of the last alert raised for a pet.
pub(crate) fn alert_key(pet_id: i64) -> String {
    format!("alert:{pet_id}")
}

/// Build a Pet from a row selected with [`PET_COLUMNS`].
fn row_to_pet(row: &rusqlite::Row) -> Result<Pet, rusqlite::Error> {
    Ok(Pet {
        id: row.get(0)?,
        name: row.get(1)?,
        age: row.get(2)?,
        hunger_meter: row.get(3)?,
        happy_meter: row.get(4)?,
        image: row.get(5)?,
        is_adopted: row.get(6)?,
    })
}

struct Inner {
    conn: Mutex<Connection>,
    revision: watch::Sender<u64>,
}

/// Handle to the pet database. Cheap to clone; clones share one connection.
#[derive(Clone)]
pub struct PetStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for PetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PetStore")
            .field("revision", &*self.inner.revision.borrow())
            .finish_non_exhaustive()
    }
}

impl PetStore {
    /// Open the store at `<data_dir>/petcare.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("petcare.db");
        Self::open_at(&path)
    }

    /// Open the store at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory store (for tests and dry runs).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        migrations::migrate(&conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        let (revision, _) = watch::channel(0);
        Ok(Self {
            inner: Arc::new(Inner {
                conn: Mutex::new(conn),
                revision,
            }),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.inner
            .conn
            .lock()
            .map_err(|_| DatabaseError::Poisoned.into())
    }

    /// Wake every live query. Called after each successful write.
    fn notify(&self) {
        self.inner.revision.send_modify(|rev| *rev = rev.wrapping_add(1));
    }

    /// Number of writes observed since the store was opened.
    pub fn revision(&self) -> u64 {
        *self.inner.revision.borrow()
    }

    pub(crate) fn changes(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Insert `pet` when its id is 0, otherwise replace the row with that id.
    ///
    /// Returns the id of the written row.
    pub fn upsert(&self, pet: &Pet) -> Result<i64> {
        let id = {
            let conn = self.conn()?;
            if pet.id == 0 {
                conn.execute(
                    "INSERT INTO pets (name, age, hunger_meter, happy_meter, image, is_adopted)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        pet.name,
                        pet.age,
                        pet.hunger_meter,
                        pet.happy_meter,
                        pet.image,
                        pet.is_adopted,
                    ],
                )?;
                conn.last_insert_rowid()
            } else {
                conn.execute(
                    "INSERT INTO pets (id, name, age, hunger_meter, happy_meter, image, is_adopted)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(id) DO UPDATE SET
                        name = excluded.name,
                        age = excluded.age,
                        hunger_meter = excluded.hunger_meter,
                        happy_meter = excluded.happy_meter,
                        image = excluded.image,
                        is_adopted = excluded.is_adopted",
                    params![
                        pet.id,
                        pet.name,
                        pet.age,
                        pet.hunger_meter,
                        pet.happy_meter,
                        pet.image,
                        pet.is_adopted,
                    ],
                )?;
                pet.id
            }
        };
        self.notify();
        Ok(id)
    }

    /// Insert `pets` only if the table is empty, in one transaction.
    ///
    /// Returns how many rows were written (0 when the table already had rows).
    pub fn insert_if_empty(&self, pets: &[Pet]) -> Result<usize> {
        let inserted = {
            let mut conn = self.conn()?;
            let tx = conn.transaction()?;
            let count: i64 = tx.query_row("SELECT COUNT(*) FROM pets", [], |row| row.get(0))?;
            if count > 0 {
                return Ok(0);
            }
            for pet in pets {
                tx.execute(
                    "INSERT INTO pets (name, age, hunger_meter, happy_meter, image, is_adopted)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        pet.name,
                        pet.age,
                        pet.hunger_meter,
                        pet.happy_meter,
                        pet.image,
                        pet.is_adopted,
                    ],
                )?;
            }
            tx.commit()?;
            pets.len()
        };
        if inserted > 0 {
            self.notify();
        }
        Ok(inserted)
    }

    /// Remove the row matching `pet.id`, along with its alert marker.
    /// A missing row is not an error.
    pub fn delete(&self, pet: &Pet) -> Result<()> {
        {
            let mut conn = self.conn()?;
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM pets WHERE id = ?1", params![pet.id])?;
            tx.execute("DELETE FROM kv WHERE key = ?1", params![alert_key(pet.id)])?;
            tx.commit()?;
        }
        self.notify();
        Ok(())
    }

    /// Write one meter directly. The caller is expected to have clamped `value`.
    pub fn update_meter(&self, pet_id: i64, kind: MeterKind, value: i64) -> Result<()> {
        let sql = format!("UPDATE pets SET {} = ?1 WHERE id = ?2", kind.column());
        self.conn()?.execute(&sql, params![value, pet_id])?;
        self.notify();
        Ok(())
    }

    /// Write both meters in one statement, so readers never see half a tick.
    pub fn update_meters(&self, pet_id: i64, hunger: i64, happy: i64) -> Result<()> {
        self.conn()?.execute(
            "UPDATE pets SET hunger_meter = ?1, happy_meter = ?2 WHERE id = ?3",
            params![hunger, happy, pet_id],
        )?;
        self.notify();
        Ok(())
    }

    /// Set the adoption flag. Releasing a pet also forgets its last alert,
    /// so a later adoption starts a fresh occurrence.
    pub fn update_adoption(&self, pet_id: i64, is_adopted: bool) -> Result<()> {
        {
            let mut conn = self.conn()?;
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE pets SET is_adopted = ?1 WHERE id = ?2",
                params![is_adopted, pet_id],
            )?;
            if !is_adopted {
                tx.execute("DELETE FROM kv WHERE key = ?1", params![alert_key(pet_id)])?;
            }
            tx.commit()?;
        }
        self.notify();
        Ok(())
    }

    // ── Reads ────────────────────────────────────────────────────────

    fn query_pets(&self, sql: &str, args: impl rusqlite::Params) -> Result<Vec<Pet>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let pets = stmt
            .query_map(args, row_to_pet)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pets)
    }

    pub fn pets_ordered_by_name(&self) -> Result<Vec<Pet>> {
        self.query_pets(
            &format!("SELECT {PET_COLUMNS} FROM pets ORDER BY name ASC, id ASC"),
            [],
        )
    }

    pub fn pets_ordered_by_age(&self) -> Result<Vec<Pet>> {
        self.query_pets(
            &format!("SELECT {PET_COLUMNS} FROM pets ORDER BY age ASC, id ASC"),
            [],
        )
    }

    /// Pets partitioned by adoption flag, in store (id) order.
    pub fn pets_by_adoption(&self, is_adopted: bool) -> Result<Vec<Pet>> {
        self.query_pets(
            &format!("SELECT {PET_COLUMNS} FROM pets WHERE is_adopted = ?1 ORDER BY id ASC"),
            params![is_adopted],
        )
    }

    pub fn pet_by_id(&self, id: i64) -> Result<Option<Pet>> {
        let pet = self
            .conn()?
            .query_row(
                &format!("SELECT {PET_COLUMNS} FROM pets WHERE id = ?1"),
                params![id],
                row_to_pet,
            )
            .optional()?;
        Ok(pet)
    }

    /// Current value of one meter, or `None` when the pet doesn't exist.
    pub fn meter(&self, kind: MeterKind, pet_id: i64) -> Result<Option<i64>> {
        let sql = format!("SELECT {} FROM pets WHERE id = ?1", kind.column());
        let value = self
            .conn()?
            .query_row(&sql, params![pet_id], |row| row.get::<_, i64>(0))
            .optional()?;
        Ok(value)
    }

    /// `(hunger, happy)` read together.
    pub fn meters(&self, pet_id: i64) -> Result<Option<(i64, i64)>> {
        let value = self
            .conn()?
            .query_row(
                "SELECT hunger_meter, happy_meter FROM pets WHERE id = ?1",
                params![pet_id],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;
        Ok(value)
    }

    pub fn count(&self) -> Result<i64> {
        let count = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM pets", [], |row| row.get(0))?;
        Ok(count)
    }

    // ── Live queries ─────────────────────────────────────────────────

    /// Subscribe to a pet list query.
    pub fn subscribe(&self, query: PetQuery) -> LiveQuery<Vec<Pet>> {
        LiveQuery::new(self.clone(), move |store| query.run(store))
    }

    /// Subscribe to one pet's `(hunger, happy)` pair.
    pub fn subscribe_meters(&self, pet_id: i64) -> LiveQuery<Option<(i64, i64)>> {
        LiveQuery::new(self.clone(), move |store| store.meters(pet_id))
    }

    /// Subscribe to one meter.
    pub fn subscribe_meter(&self, kind: MeterKind, pet_id: i64) -> LiveQuery<Option<i64>> {
        LiveQuery::new(self.clone(), move |store| store.meter(kind, pet_id))
    }

    pub fn subscribe_pet(&self, id: i64) -> LiveQuery<Option<Pet>> {
        LiveQuery::new(self.clone(), move |store| store.pet_by_id(id))
    }

    // ── Key-value ────────────────────────────────────────────────────

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn()?
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Set a value in the kv store.
    ///
    /// Kv writes don't touch pet rows, so they don't wake live queries.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<()> {
        self.conn()?
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn()?.execute_batch(sql)?;
        Ok(())
    }
}
