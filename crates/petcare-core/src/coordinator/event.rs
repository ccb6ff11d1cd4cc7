use serde::{Deserialize, Serialize};

use crate::pet::{Pet, SortType};

/// Every user intent the coordinator understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PetEvent {
    SavePet,
    SetName(String),
    /// Raw text from the age field; parsed by the coordinator.
    SetAge(String),
    AdoptPet(Pet),
    ReleasePet(Pet),
    DeletePet(Pet),
    ShowDialog,
    /// Cancel path of the add-pet dialog. Discards unsaved form edits.
    HideDialog,
    SortPets(SortType),
    UpdateHungerMeter { pet: Pet, increment: bool },
    UpdateHappyMeter { pet: Pet, increment: bool },
}
