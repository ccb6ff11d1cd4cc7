//! # Petcare Core Library
//!
//! This library provides the core logic for the Petcare virtual-pet app:
//! adopt pets, feed and play with them, and watch their meters drain over
//! time. The `petcare-cli` binary is a thin front end over the same core.
//!
//! ## Architecture
//!
//! - **Pet Store**: SQLite-backed CRUD with live queries that re-emit on
//!   every write
//! - **Meter Engine**: the clamp-to-`[0, 10]` arithmetic and the periodic
//!   decay worker
//! - **Coordinator**: an observable view-state driven by discrete events
//! - **Notifier**: a one-shot attention pass that alerts when a meter is empty
//!
//! ## Key Components
//!
//! - [`PetStore`]: persistence and live queries
//! - [`PetCoordinator`]: view-state and event handling
//! - [`AttentionNotifier`]: zero-meter alerts
//! - [`Config`]: application configuration management

pub mod coordinator;
pub mod error;
pub mod meter;
pub mod notifier;
pub mod pet;
pub mod reminder;
pub mod storage;

pub use coordinator::{seed_if_empty, PetCoordinator, PetEvent, PetState};
pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use meter::{adjust, apply_decay, tick, DecayReport, DecayWorker, MeterDecay};
pub use notifier::{Alert, AlertKind, AlertSink, AttentionNotifier, LogSink, NotifierReport, Priority};
pub use pet::{starter_roster, MeterKind, Pet, SortType};
pub use reminder::ReminderScheduler;
pub use storage::{Config, LiveQuery, PetQuery, PetStore};
