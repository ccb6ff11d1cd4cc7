//! Pet commands for CLI.

use clap::Subcommand;
use petcare_core::{apply_decay, Config, MeterKind, Pet, PetCoordinator, PetEvent, SortType};

use super::{open_coordinator, print_json};

#[derive(Subcommand)]
pub enum PetAction {
    /// List pets
    List {
        /// Sort order: name, age or adopted (default from config)
        #[arg(long)]
        sort: Option<SortType>,
        /// Only pets that are up for adoption
        #[arg(long, conflicts_with = "adopted")]
        available: bool,
        /// Only adopted pets
        #[arg(long)]
        adopted: bool,
    },
    /// Show one pet
    Show {
        /// Pet ID
        id: i64,
    },
    /// Add a pet to the adoption list
    Add {
        /// Pet name
        name: String,
        /// Age in years
        #[arg(long, default_value = "1")]
        age: String,
    },
    /// Adopt a pet
    Adopt { id: i64 },
    /// Put a pet back up for adoption
    Release { id: i64 },
    /// Delete a pet
    Delete { id: i64 },
    /// Raise the hunger meter by one
    Feed { id: i64 },
    /// Lower the hunger meter by one
    Starve { id: i64 },
    /// Raise the happiness meter by one
    Play { id: i64 },
    /// Lower the happiness meter by one
    Upset { id: i64 },
    /// Apply one decay tick to every adopted pet
    Decay,
}

pub async fn run(action: PetAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let coordinator = open_coordinator(&config).await?;
    let result = dispatch(&coordinator, action).await;
    coordinator.shutdown().await;
    result
}

async fn dispatch(
    coordinator: &PetCoordinator,
    action: PetAction,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        PetAction::List {
            sort,
            available,
            adopted,
        } => {
            if let Some(sort) = sort {
                coordinator.on_event(PetEvent::SortPets(sort))?;
            }
            let pets = if available {
                coordinator.pets_by_adoption(false)
            } else if adopted {
                coordinator.pets_by_adoption(true)
            } else {
                coordinator.state().pets
            };
            print_json(&pets)?;
        }
        PetAction::Show { id } => {
            let pet = find(coordinator, id)?;
            print_json(&pet)?;
        }
        PetAction::Add { name, age } => {
            if name.trim().is_empty() {
                return Err("pet name must not be blank".into());
            }
            coordinator.on_event(PetEvent::ShowDialog)?;
            coordinator.on_event(PetEvent::SetName(name.clone()))?;
            coordinator.on_event(PetEvent::SetAge(age))?;
            let id = coordinator
                .handle_event(PetEvent::SavePet)
                .await?
                .ok_or("pet was not saved")?;
            print_json(&find(coordinator, id)?)?;
        }
        PetAction::Adopt { id } => {
            let pet = find(coordinator, id)?;
            apply(coordinator, PetEvent::AdoptPet(pet), id).await?;
        }
        PetAction::Release { id } => {
            let pet = find(coordinator, id)?;
            apply(coordinator, PetEvent::ReleasePet(pet), id).await?;
        }
        PetAction::Delete { id } => {
            let pet = find(coordinator, id)?;
            coordinator.handle_event(PetEvent::DeletePet(pet.clone())).await?;
            print_json(&pet)?;
        }
        PetAction::Feed { id } => adjust(coordinator, id, MeterKind::Hunger, true).await?,
        PetAction::Starve { id } => adjust(coordinator, id, MeterKind::Hunger, false).await?,
        PetAction::Play { id } => adjust(coordinator, id, MeterKind::Happy, true).await?,
        PetAction::Upset { id } => adjust(coordinator, id, MeterKind::Happy, false).await?,
        PetAction::Decay => {
            let report = apply_decay(coordinator.store())?;
            print_json(&report)?;
        }
    }
    Ok(())
}

fn find(coordinator: &PetCoordinator, id: i64) -> Result<Pet, Box<dyn std::error::Error>> {
    coordinator
        .pet(id)?
        .ok_or_else(|| format!("pet not found: {id}").into())
}

/// Apply `event` and print the pet as stored afterwards.
async fn apply(
    coordinator: &PetCoordinator,
    event: PetEvent,
    id: i64,
) -> Result<(), Box<dyn std::error::Error>> {
    coordinator.handle_event(event).await?;
    print_json(&find(coordinator, id)?)
}

async fn adjust(
    coordinator: &PetCoordinator,
    id: i64,
    kind: MeterKind,
    increment: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let pet = find(coordinator, id)?;
    let event = match kind {
        MeterKind::Hunger => PetEvent::UpdateHungerMeter { pet, increment },
        MeterKind::Happy => PetEvent::UpdateHappyMeter { pet, increment },
    };
    apply(coordinator, event, id).await
}
