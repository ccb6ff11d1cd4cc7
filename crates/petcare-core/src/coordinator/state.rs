use serde::{Deserialize, Serialize};

use crate::pet::{Pet, SortType};

/// Everything the presentation layer needs to render the pet screens.
///
/// `pets` follows the active sort; the remaining fields are the add-pet form
/// and dialog flag, which only live here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetState {
    pub pets: Vec<Pet>,
    pub name: String,
    pub age: i64,
    pub hunger_meter: i64,
    pub happy_meter: i64,
    pub image: String,
    pub id: i64,
    pub is_adopted: bool,
    pub is_adding_pet: bool,
    pub sort_type: SortType,
}

impl Default for PetState {
    fn default() -> Self {
        Self {
            pets: Vec::new(),
            name: String::new(),
            age: 1,
            hunger_meter: 5,
            happy_meter: 5,
            image: String::new(),
            id: 0,
            is_adopted: false,
            is_adding_pet: false,
            sort_type: SortType::Name,
        }
    }
}

impl PetState {
    /// The pet the form currently describes.
    pub fn form_pet(&self) -> Pet {
        Pet {
            id: self.id,
            name: self.name.clone(),
            age: self.age,
            hunger_meter: self.hunger_meter,
            happy_meter: self.happy_meter,
            image: self.image.clone(),
            is_adopted: self.is_adopted,
        }
    }

    /// Put every form field back to its default. List and sort are kept.
    pub fn reset_form(&mut self) {
        let blank = Self::default();
        self.name = blank.name;
        self.age = blank.age;
        self.hunger_meter = blank.hunger_meter;
        self.happy_meter = blank.happy_meter;
        self.image = blank.image;
        self.id = blank.id;
        self.is_adopted = blank.is_adopted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_form_keeps_list_and_sort() {
        let mut state = PetState {
            pets: vec![Pet::new("Rex", 1)],
            name: "Draft".into(),
            age: 7,
            sort_type: SortType::Age,
            is_adding_pet: true,
            ..Default::default()
        };
        state.reset_form();
        assert_eq!(state.name, "");
        assert_eq!(state.age, 1);
        assert_eq!(state.pets.len(), 1);
        assert_eq!(state.sort_type, SortType::Age);
        assert!(state.is_adding_pet);
    }
}
