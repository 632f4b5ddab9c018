//! Form binding and validation.
//!
//! Every field arrives as a string so a rejected submission can be echoed
//! back into the form unchanged. `clean` turns the raw fields into typed
//! values or a map of per-field errors.

use std::collections::BTreeMap;

use axum::http::Uri;
use serde::{Deserialize, Serialize};

use crate::game::{
    AccountConfig, BaseItem, CharacterId, Container, GameError, GameStore, Gender, Item,
    ItemCategory, ItemId, PlayerCharacter, SlotBonus, Species, SLOT_COUNT,
};
use crate::validation::{sanitize_notes, validate_character_name};

/// Field name to error message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors(BTreeMap<&'static str, String>);

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

}

/// Either cleaned data or field errors. Storage failures are kept apart so
/// they surface as real errors rather than form messages.
#[derive(Debug)]
pub enum Cleaned<T> {
    Valid(T),
    Invalid(FormErrors),
}

fn parse_id(raw: &str) -> Result<Option<u64>, ()> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<u64>().map(Some).map_err(|_| ())
}

fn clean_gender(
    store: &GameStore,
    raw: &str,
    errors: &mut FormErrors,
) -> Result<Option<Gender>, GameError> {
    match parse_id(raw) {
        Ok(None) => Ok(None),
        Ok(Some(id)) => match store.find::<Gender>(id)? {
            Some(gender) if gender.playable => Ok(Some(gender)),
            _ => {
                errors.add("gender", "Select a valid gender.");
                Ok(None)
            }
        },
        Err(()) => {
            errors.add("gender", "Select a valid gender.");
            Ok(None)
        }
    }
}

// ----------------------------------------------------------------------
// Character creation
// ----------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateCharacterForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub species: String,
    #[serde(default)]
    pub gender: String,
}

#[derive(Debug, Clone)]
pub struct NewCharacter {
    pub name: String,
    pub species: Species,
    pub gender: Option<Gender>,
}

impl CreateCharacterForm {
    pub fn clean(&self, store: &GameStore, owner: &str) -> Result<Cleaned<NewCharacter>, GameError> {
        let mut errors = FormErrors::new();

        let name = match validate_character_name(&self.name) {
            Ok(name) => {
                if store.character_name_taken(owner, &name, None)? {
                    errors.add("name", "You already have a character with this name.");
                }
                name
            }
            Err(e) => {
                errors.add("name", e.to_string());
                String::new()
            }
        };

        let species = match parse_id(&self.species) {
            Ok(Some(id)) => match store.find::<Species>(id)? {
                Some(species) if species.playable => Some(species),
                _ => None,
            },
            _ => None,
        };
        if species.is_none() {
            errors.add("species", "Select a playable species.");
        }

        let gender = clean_gender(store, &self.gender, &mut errors)?;

        match species {
            Some(species) if errors.is_empty() => Ok(Cleaned::Valid(NewCharacter {
                name,
                species,
                gender,
            })),
            _ => Ok(Cleaned::Invalid(errors)),
        }
    }
}

// ----------------------------------------------------------------------
// Character update
// ----------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCharacterForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub equip_offense: String,
    #[serde(default)]
    pub equip_defense: String,
    #[serde(default)]
    pub slot_1: String,
    #[serde(default)]
    pub slot_2: String,
    #[serde(default)]
    pub slot_3: String,
    #[serde(default)]
    pub slot_4: String,
    #[serde(default)]
    pub slot_5: String,
    #[serde(default)]
    pub slot_6: String,
    #[serde(default)]
    pub slot_7: String,
    #[serde(default)]
    pub slot_8: String,
}

const SLOT_FIELDS: [&str; SLOT_COUNT] = [
    "slot_1", "slot_2", "slot_3", "slot_4", "slot_5", "slot_6", "slot_7", "slot_8",
];

fn id_field(id: Option<u64>) -> String {
    id.map(|v| v.to_string()).unwrap_or_default()
}

impl UpdateCharacterForm {
    /// Prefill the form from the stored character.
    pub fn from_character(character: &PlayerCharacter) -> Self {
        let slot = |i: usize| character.slots[i].key().to_string();
        Self {
            name: character.name.clone(),
            notes: character.meta.notes.clone().unwrap_or_default(),
            gender: id_field(character.gender),
            equip_offense: id_field(character.equip_offense),
            equip_defense: id_field(character.equip_defense),
            slot_1: slot(0),
            slot_2: slot(1),
            slot_3: slot(2),
            slot_4: slot(3),
            slot_5: slot(4),
            slot_6: slot(5),
            slot_7: slot(6),
            slot_8: slot(7),
        }
    }

    pub fn slot_values(&self) -> [&str; SLOT_COUNT] {
        [
            self.slot_1.as_str(),
            self.slot_2.as_str(),
            self.slot_3.as_str(),
            self.slot_4.as_str(),
            self.slot_5.as_str(),
            self.slot_6.as_str(),
            self.slot_7.as_str(),
            self.slot_8.as_str(),
        ]
    }

    fn clean_equipment(
        store: &GameStore,
        storage: &Container,
        raw: &str,
        field: &'static str,
        wanted: ItemCategory,
        errors: &mut FormErrors,
    ) -> Result<Option<ItemId>, GameError> {
        let id = match parse_id(raw) {
            Ok(None) => return Ok(None),
            Ok(Some(id)) => id,
            Err(()) => {
                errors.add(field, "Select an item from your storage.");
                return Ok(None);
            }
        };
        if !storage.contains(id) {
            errors.add(field, "Select an item from your storage.");
            return Ok(None);
        }
        let item: Item = store.get(id)?;
        let base: BaseItem = store.get(item.base)?;
        if base.category != wanted {
            errors.add(
                field,
                format!("{} is not a {} item.", item.name, wanted.label()),
            );
            return Ok(None);
        }
        Ok(Some(id))
    }

    /// Apply the submitted fields to a copy of `character`.
    pub fn clean(
        &self,
        store: &GameStore,
        character: &PlayerCharacter,
    ) -> Result<Cleaned<PlayerCharacter>, GameError> {
        let mut errors = FormErrors::new();
        let mut updated = character.clone();

        match validate_character_name(&self.name) {
            Ok(name) => {
                if store.character_name_taken(&character.owner, &name, Some(character.id))? {
                    errors.add("name", "You already have a character with this name.");
                }
                updated.name = name;
            }
            Err(e) => errors.add("name", e.to_string()),
        }

        updated.meta.notes = sanitize_notes(&self.notes);
        updated.gender = clean_gender(store, &self.gender, &mut errors)?.map(|g| g.id);

        let storage: Container = store.get(character.storage)?;
        updated.equip_offense = Self::clean_equipment(
            store,
            &storage,
            &self.equip_offense,
            "equip_offense",
            ItemCategory::Offense,
            &mut errors,
        )?;
        updated.equip_defense = Self::clean_equipment(
            store,
            &storage,
            &self.equip_defense,
            "equip_defense",
            ItemCategory::Defense,
            &mut errors,
        )?;

        for (index, raw) in self.slot_values().iter().enumerate() {
            let raw = raw.trim();
            if raw.is_empty() {
                updated.slots[index] = SlotBonus::None;
                continue;
            }
            match SlotBonus::from_key(raw) {
                Some(slot) => updated.slots[index] = slot,
                None => errors.add(SLOT_FIELDS[index], "Select a valid bonus."),
            }
        }

        if !updated.stats.within_limits() {
            errors.add("stats", "Life and mana cannot exceed their maximums.");
        }

        if errors.is_empty() {
            Ok(Cleaned::Valid(updated))
        } else {
            Ok(Cleaned::Invalid(errors))
        }
    }
}

// ----------------------------------------------------------------------
// Account settings
// ----------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsForm {
    #[serde(default)]
    pub notes: String,
    /// HTML checkbox: present ("on") when ticked, absent otherwise.
    #[serde(default)]
    pub compact_inventory: Option<String>,
    #[serde(default)]
    pub playing: String,
}

impl SettingsForm {
    pub fn from_config(config: &AccountConfig) -> Self {
        Self {
            notes: config.meta.notes.clone().unwrap_or_default(),
            compact_inventory: config.compact_inventory.then(|| "on".to_string()),
            playing: id_field(config.playing),
        }
    }

    pub fn clean(
        &self,
        store: &GameStore,
        config: &AccountConfig,
    ) -> Result<Cleaned<AccountConfig>, GameError> {
        let mut errors = FormErrors::new();
        let mut updated = config.clone();
        updated.meta.notes = sanitize_notes(&self.notes);
        updated.compact_inventory = self.compact_inventory.is_some();
        updated.playing = match parse_id(&self.playing) {
            Ok(None) => None,
            Ok(Some(id)) => match store.character_for_user(&config.username, id) {
                Ok(character) => Some(character.id),
                Err(GameError::NotFound(_)) => {
                    errors.add("playing", "Select one of your characters.");
                    None
                }
                Err(e) => return Err(e),
            },
            Err(()) => {
                errors.add("playing", "Select one of your characters.");
                None
            }
        };
        if errors.is_empty() {
            Ok(Cleaned::Valid(updated))
        } else {
            Ok(Cleaned::Invalid(errors))
        }
    }
}

// ----------------------------------------------------------------------
// Login
// ----------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

/// Only follow `next` when it is a local absolute path. Browsers drop tabs
/// and newlines from URLs, so any whitespace or control character is refused.
pub fn safe_next(next: Option<&str>) -> Option<String> {
    let next = next?.trim();
    if !next.starts_with('/') || next.starts_with("//") {
        return None;
    }
    if next
        .chars()
        .any(|c| c == '\\' || c.is_whitespace() || c.is_control())
    {
        return None;
    }
    let uri = next.parse::<Uri>().ok()?;
    if uri.scheme().is_some() || uri.authority().is_some() {
        return None;
    }
    Some(next.to_string())
}

/// Characters the user may pick as the one they are playing.
pub fn playing_choices(characters: &[PlayerCharacter]) -> Vec<(CharacterId, String)> {
    characters.iter().map(|c| (c.id, c.name.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{GameStoreBuilder, Species};
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> GameStore {
        GameStoreBuilder::new(dir.path()).open().expect("store")
    }

    fn human(store: &GameStore) -> Species {
        store
            .list::<Species>()
            .expect("species")
            .into_iter()
            .find(|s| s.name == "Human")
            .expect("seeded human")
    }

    #[test]
    fn create_form_requires_playable_species() {
        let dir = TempDir::new().expect("tempdir");
        let store = store(&dir);
        let npc_only = store.put(Species::new("Goblin")).expect("goblin");
        let form = CreateCharacterForm {
            name: "Brak".into(),
            species: npc_only.id.to_string(),
            gender: String::new(),
        };
        match form.clean(&store, "alice").expect("clean") {
            Cleaned::Invalid(errors) => assert!(errors.get("species").is_some()),
            Cleaned::Valid(_) => panic!("unplayable species accepted"),
        }
    }

    #[test]
    fn create_form_rejects_duplicate_names_per_owner() {
        let dir = TempDir::new().expect("tempdir");
        let store = store(&dir);
        store.put(PlayerCharacter::new("Brak", "alice")).expect("existing");
        let species = human(&store);
        let form = CreateCharacterForm {
            name: "brak".into(),
            species: species.id.to_string(),
            gender: String::new(),
        };
        assert!(matches!(
            form.clean(&store, "alice").expect("clean"),
            Cleaned::Invalid(_)
        ));
        assert!(matches!(
            form.clean(&store, "bob").expect("clean"),
            Cleaned::Valid(_)
        ));
    }

    #[test]
    fn update_form_checks_equipment_category() {
        let dir = TempDir::new().expect("tempdir");
        let store = store(&dir);
        let bag = store.put(Container::new("Brak", 4)).expect("bag");
        let shield = store
            .create_base_item(BaseItem::new("Shield", ItemCategory::Defense))
            .expect("shield");
        let buckler = store.spawn_item_into(bag.id, shield.id, "Buckler").expect("item");
        let mut toon = PlayerCharacter::new("Brak", "alice");
        toon.storage = bag.id;
        let toon = store.put(toon).expect("toon");

        let mut form = UpdateCharacterForm::from_character(&toon);
        form.equip_offense = buckler.id.to_string();
        match form.clean(&store, &toon).expect("clean") {
            Cleaned::Invalid(errors) => assert!(errors.get("equip_offense").is_some()),
            Cleaned::Valid(_) => panic!("defense item equipped as offense"),
        }

        form.equip_offense = String::new();
        form.equip_defense = buckler.id.to_string();
        form.slot_3 = "dbleheal".into();
        match form.clean(&store, &toon).expect("clean") {
            Cleaned::Valid(updated) => {
                assert_eq!(updated.equip_defense, Some(buckler.id));
                assert_eq!(updated.slots[2], SlotBonus::DoubleHeal);
            }
            Cleaned::Invalid(errors) => panic!("unexpected errors {:?}", errors),
        }
    }

    #[test]
    fn update_form_rejects_unknown_slot() {
        let dir = TempDir::new().expect("tempdir");
        let store = store(&dir);
        let bag = store.put(Container::new("Brak", 4)).expect("bag");
        let mut toon = PlayerCharacter::new("Brak", "alice");
        toon.storage = bag.id;
        let toon = store.put(toon).expect("toon");
        let mut form = UpdateCharacterForm::from_character(&toon);
        form.slot_8 = "superpower".into();
        match form.clean(&store, &toon).expect("clean") {
            Cleaned::Invalid(errors) => assert!(errors.get("slot_8").is_some()),
            Cleaned::Valid(_) => panic!("bogus slot accepted"),
        }
    }

    #[test]
    fn settings_form_only_accepts_own_characters() {
        let dir = TempDir::new().expect("tempdir");
        let store = store(&dir);
        let theirs = store.put(PlayerCharacter::new("Zed", "bob")).expect("bob's");
        let config = AccountConfig::new("alice");
        let form = SettingsForm {
            notes: String::new(),
            compact_inventory: Some("on".into()),
            playing: theirs.id.to_string(),
        };
        match form.clean(&store, &config).expect("clean") {
            Cleaned::Invalid(errors) => assert!(errors.get("playing").is_some()),
            Cleaned::Valid(_) => panic!("foreign character accepted"),
        }
    }

    #[test]
    fn next_must_be_local() {
        assert_eq!(safe_next(Some("/characters/3")).as_deref(), Some("/characters/3"));
        assert_eq!(safe_next(Some("//evil.example")), None);
        assert_eq!(safe_next(Some("https://evil.example")), None);
        assert_eq!(safe_next(None), None);
        assert_eq!(safe_next(Some("/\t/evil.example")), None);
        assert_eq!(safe_next(Some("/\n/evil.example")), None);
        assert_eq!(safe_next(Some("/\r\n/evil.example")), None);
        assert_eq!(safe_next(Some("/\\evil.example")), None);
        assert_eq!(safe_next(Some("/a b")), None);
        assert_eq!(
            safe_next(Some("/characters?page=2")).as_deref(),
            Some("/characters?page=2")
        );
    }
}
