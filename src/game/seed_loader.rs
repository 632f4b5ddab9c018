//! Seed data loader for data-driven world content.
//!
//! Admins can describe extra locations, species, NPCs and item templates in a
//! JSON file and load it with `roster seed --file <path>` without recompiling.

use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::game::errors::GameError;
use crate::game::storage::GameStore;
use crate::game::types::{
    Attitude, BaseItem, Gender, ItemCategory, Location, LocationId, MobStats, NonPlayerCharacter,
    Quality, Species,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub locations: Vec<LocationSeed>,
    #[serde(default)]
    pub species: Vec<SpeciesSeed>,
    #[serde(default)]
    pub genders: Vec<GenderSeed>,
    #[serde(default)]
    pub npcs: Vec<NpcSeed>,
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default)]
    pub base_items: Vec<BaseItemSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationSeed {
    /// Explicit id so other seed entries can reference it.
    pub id: Option<LocationId>,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesSeed {
    pub name: String,
    #[serde(default)]
    pub playable: bool,
    #[serde(default)]
    pub starting_zone: Option<LocationId>,
    #[serde(default = "default_pool")]
    pub starting_hp: u16,
    #[serde(default = "default_pool")]
    pub starting_mp: u16,
}

fn default_pool() -> u16 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenderSeed {
    pub name: String,
    #[serde(default)]
    pub playable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpcSeed {
    pub name: String,
    /// Either a legacy code ("30") or a name ("hostile").
    #[serde(default)]
    pub attitude: Option<String>,
    #[serde(default)]
    pub spawns: Vec<LocationId>,
    #[serde(default)]
    pub level: Option<i32>,
    #[serde(default)]
    pub life_max: Option<i32>,
    #[serde(default)]
    pub mana_max: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseItemSeed {
    pub name: String,
    #[serde(default)]
    pub cost: u32,
    #[serde(default)]
    pub power: Option<i32>,
    #[serde(default)]
    pub quality: Quality,
    #[serde(default)]
    pub category: ItemCategory,
}

fn parse_attitude(raw: &str) -> Option<Attitude> {
    Attitude::from_code(raw).or_else(|| match raw.to_ascii_lowercase().as_str() {
        "friendly" => Some(Attitude::Friendly),
        "neutral" => Some(Attitude::Neutral),
        "hostile" => Some(Attitude::Hostile),
        "invulnerable" => Some(Attitude::Invulnerable),
        _ => None,
    })
}

/// Parse a seed file from disk.
pub fn load_seed_file<P: AsRef<Path>>(path: P) -> Result<SeedFile, GameError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| {
        GameError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Failed to parse {}: {}", path.display(), e),
        ))
    })
}

/// Insert everything in `seed`. Templates whose names already exist are
/// skipped with a warning. Returns the number of records written.
pub fn apply_seed(store: &GameStore, seed: SeedFile) -> Result<usize, GameError> {
    let mut written = 0usize;

    for entry in seed.locations {
        let mut location = Location::new(&entry.name, &entry.description);
        location.id = entry.id.unwrap_or(0);
        store.put(location)?;
        written += 1;
    }

    for entry in seed.species {
        if let Some(zone) = entry.starting_zone {
            if store.find::<Location>(zone)?.is_none() {
                warn!(
                    "Species {} references missing starting zone {}; new characters will use the default location",
                    entry.name, zone
                );
            }
        }
        let mut species = Species::new(&entry.name).with_pools(entry.starting_hp, entry.starting_mp);
        species.playable = entry.playable;
        species.starting_zone = entry.starting_zone;
        store.put(species)?;
        written += 1;
    }

    for entry in seed.genders {
        store.put(Gender::new(&entry.name, entry.playable))?;
        written += 1;
    }

    for entry in seed.npcs {
        let attitude = match entry.attitude.as_deref() {
            Some(raw) => parse_attitude(raw).unwrap_or_else(|| {
                warn!("NPC {} has unknown attitude '{}'; using friendly", entry.name, raw);
                Attitude::Friendly
            }),
            None => Attitude::Friendly,
        };
        let mut npc = NonPlayerCharacter::new(&entry.name).with_attitude(attitude);
        npc.spawns = entry.spawns;
        let mut stats = MobStats::default();
        if let Some(level) = entry.level {
            stats.level = level;
        }
        if let Some(life) = entry.life_max {
            stats.life = life;
            stats.life_max = life;
        }
        if let Some(mana) = entry.mana_max {
            stats.mana = mana;
            stats.mana_max = mana;
        }
        npc.stats = stats;
        store.put(npc)?;
        written += 1;
    }

    for name in seed.attributes {
        match store.create_attribute(&name) {
            Ok(_) => written += 1,
            Err(GameError::Duplicate(what)) => warn!("Skipping seed {}", what),
            Err(e) => return Err(e),
        }
    }

    for entry in seed.base_items {
        let mut base = BaseItem::new(&entry.name, entry.category);
        base.cost = entry.cost;
        base.quality = entry.quality;
        if let Some(power) = entry.power {
            base.power = power;
        }
        match store.create_base_item(base) {
            Ok(_) => written += 1,
            Err(GameError::Duplicate(what)) => warn!("Skipping seed {}", what),
            Err(e) => return Err(e),
        }
    }

    info!("Applied seed file ({} records)", written);
    Ok(written)
}
