//! The pet record and the small enums that describe how it is viewed.

use serde::{Deserialize, Serialize};

use crate::meter::{MAX_METER, MIN_METER};

/// A pet, as persisted in the `pets` table.
///
/// `id == 0` means "not yet stored"; the store assigns the real id on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pet {
    pub id: i64,
    pub name: String,
    pub age: i64,
    pub hunger_meter: i64,
    pub happy_meter: i64,
    /// Presentation asset key. Opaque to the core.
    pub image: String,
    pub is_adopted: bool,
}

impl Pet {
    /// A new, unstored pet with both meters at the midpoint.
    pub fn new(name: impl Into<String>, age: i64) -> Self {
        Self {
            id: 0,
            name: name.into(),
            age,
            hunger_meter: 5,
            happy_meter: 5,
            image: String::new(),
            is_adopted: false,
        }
    }

    pub fn with_meters(mut self, hunger: i64, happy: i64) -> Self {
        self.hunger_meter = hunger.clamp(MIN_METER, MAX_METER);
        self.happy_meter = happy.clamp(MIN_METER, MAX_METER);
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    pub fn adopted(mut self, is_adopted: bool) -> Self {
        self.is_adopted = is_adopted;
        self
    }

    pub fn meter(&self, kind: MeterKind) -> i64 {
        match kind {
            MeterKind::Hunger => self.hunger_meter,
            MeterKind::Happy => self.happy_meter,
        }
    }
}

/// Which of the two gauges an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeterKind {
    Hunger,
    Happy,
}

impl MeterKind {
    /// Column name in the `pets` table.
    pub(crate) fn column(self) -> &'static str {
        match self {
            MeterKind::Hunger => "hunger_meter",
            MeterKind::Happy => "happy_meter",
        }
    }
}

/// How the coordinator's pet list is sourced.
///
/// `Adopted` is not an ordering: it filters to owned pets and keeps the
/// store's own order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortType {
    Adopted,
    #[default]
    Name,
    Age,
}

impl SortType {
    pub fn as_str(self) -> &'static str {
        match self {
            SortType::Adopted => "adopted",
            SortType::Name => "name",
            SortType::Age => "age",
        }
    }
}

impl std::str::FromStr for SortType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "adopted" => Ok(SortType::Adopted),
            "name" => Ok(SortType::Name),
            "age" => Ok(SortType::Age),
            other => Err(format!("unknown sort type: {other}")),
        }
    }
}

/// The roster written on first launch.
pub fn starter_roster() -> Vec<Pet> {
    [
        ("Mametchi", 2, 5, 5, "mametchi"),
        ("Melodytchi", 3, 4, 4, "melodytchi"),
        ("Mimitchi", 1, 7, 8, "mimitchi"),
        ("Lovelitchi", 4, 6, 6, "lovelitchi"),
        ("Pianitchi", 6, 4, 5, "pianitchi"),
        ("Kikitchi", 5, 6, 3, "kikitchi"),
        ("Chamametchi", 3, 8, 9, "chamametchi"),
        ("Hapihapitchi", 4, 2, 7, "hapihapitchi"),
        ("Hoops", 20, 7, 8, "hoops"),
        ("Yoyo", 20, 7, 8, "yoyo"),
        ("Piddles", 21, 4, 4, "piddles"),
    ]
    .into_iter()
    .map(|(name, age, hunger, happy, image)| {
        Pet::new(name, age)
            .with_meters(hunger, happy)
            .with_image(image)
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_is_eleven_unadopted_pets() {
        let roster = starter_roster();
        assert_eq!(roster.len(), 11);
        assert!(roster.iter().all(|p| !p.is_adopted && p.id == 0));
        let mametchi = roster.iter().find(|p| p.name == "Mametchi").unwrap();
        assert_eq!((mametchi.hunger_meter, mametchi.happy_meter), (5, 5));
    }

    #[test]
    fn with_meters_clamps() {
        let pet = Pet::new("Rex", 1).with_meters(42, -3);
        assert_eq!(pet.hunger_meter, 10);
        assert_eq!(pet.happy_meter, 0);
    }

    #[test]
    fn sort_type_parses_case_insensitively() {
        assert_eq!("ADOPTED".parse::<SortType>(), Ok(SortType::Adopted));
        assert_eq!(" age ".parse::<SortType>(), Ok(SortType::Age));
        assert!("weight".parse::<SortType>().is_err());
    }
}
