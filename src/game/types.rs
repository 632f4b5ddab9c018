use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type LocationId = u64;
pub type SpeciesId = u64;
pub type GenderId = u64;
pub type CharacterId = u64;
pub type NpcId = u64;
pub type ContainerId = u64;
pub type AttributeId = u64;
pub type EnchantId = u64;
pub type BaseItemId = u64;
pub type ItemId = u64;
pub type BattleId = u64;

/// Number of bonus slots every player character carries.
pub const SLOT_COUNT: usize = 8;

/// Bookkeeping shared by every stored record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Meta {
    pub notes: Option<String>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Meta {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            notes: None,
            created: now,
            modified: now,
        }
    }

    pub fn touch(&mut self) {
        self.modified = Utc::now();
    }
}

impl Default for Meta {
    fn default() -> Self {
        Self::new()
    }
}

/// Stats shared by every living entity, player or not.
///
/// `life <= life_max` and `mana <= mana_max` are expected to hold; forms
/// enforce it, the store does not.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MobStats {
    pub level: i32,
    pub life: i32,
    pub life_max: i32,
    pub mana: i32,
    pub mana_max: i32,
    pub base_offense: i32,
    pub base_defense: i32,
}

impl Default for MobStats {
    fn default() -> Self {
        Self {
            level: 1,
            life: 1,
            life_max: 1,
            mana: 1,
            mana_max: 1,
            base_offense: 1,
            base_defense: 1,
        }
    }
}

impl MobStats {
    /// True when the current pools do not exceed their maximums.
    pub fn within_limits(&self) -> bool {
        self.life <= self.life_max && self.mana <= self.mana_max
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    pub description: String,
    pub meta: Meta,
}

impl Location {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            description: description.to_string(),
            meta: Meta::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Species {
    pub id: SpeciesId,
    pub name: String,
    pub playable: bool,
    pub starting_zone: Option<LocationId>,
    pub starting_hp: u16,
    pub starting_mp: u16,
    pub meta: Meta,
}

impl Species {
    pub fn new(name: &str) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            playable: false,
            starting_zone: None,
            starting_hp: 1,
            starting_mp: 1,
            meta: Meta::new(),
        }
    }

    pub fn playable(mut self) -> Self {
        self.playable = true;
        self
    }

    pub fn with_pools(mut self, hp: u16, mp: u16) -> Self {
        self.starting_hp = hp;
        self.starting_mp = mp;
        self
    }

    pub fn with_starting_zone(mut self, zone: LocationId) -> Self {
        self.starting_zone = Some(zone);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Gender {
    pub id: GenderId,
    pub name: String,
    pub playable: bool,
    pub meta: Meta,
}

impl Gender {
    pub fn new(name: &str, playable: bool) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            playable,
            meta: Meta::new(),
        }
    }
}

/// Named bonus a character slot can hold. Each variant maps to one of the
/// counters shown on the character sheet.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum SlotBonus {
    #[default]
    None,
    ExtraDodge,
    DoubleDamage,
    FunkRegen,
    MagicHeal,
    HitSteal,
    DoubleAttack,
    DoubleHeal,
}

impl SlotBonus {
    pub const ALL: [SlotBonus; 8] = [
        SlotBonus::None,
        SlotBonus::ExtraDodge,
        SlotBonus::DoubleDamage,
        SlotBonus::FunkRegen,
        SlotBonus::MagicHeal,
        SlotBonus::HitSteal,
        SlotBonus::DoubleAttack,
        SlotBonus::DoubleHeal,
    ];

    /// Counter key used on the character sheet.
    pub fn key(self) -> &'static str {
        match self {
            SlotBonus::None => "nonenone",
            SlotBonus::ExtraDodge => "xtradodg",
            SlotBonus::DoubleDamage => "dbledamg",
            SlotBonus::FunkRegen => "funkregn",
            SlotBonus::MagicHeal => "magiheal",
            SlotBonus::HitSteal => "hitsteal",
            SlotBonus::DoubleAttack => "dbleatta",
            SlotBonus::DoubleHeal => "dbleheal",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SlotBonus::None => "None",
            SlotBonus::ExtraDodge => "Extra dodge",
            SlotBonus::DoubleDamage => "Double damage",
            SlotBonus::FunkRegen => "Funk regen",
            SlotBonus::MagicHeal => "Magic heal",
            SlotBonus::HitSteal => "Hit steal",
            SlotBonus::DoubleAttack => "Double attack",
            SlotBonus::DoubleHeal => "Double heal",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.key() == key)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerCharacter {
    pub id: CharacterId,
    pub name: String,
    /// Username of the owning account.
    pub owner: String,
    pub stats: MobStats,
    pub species: Option<SpeciesId>,
    pub gender: Option<GenderId>,
    pub location: LocationId,
    pub storage: ContainerId,
    pub equip_offense: Option<ItemId>,
    pub equip_defense: Option<ItemId>,
    pub slots: [SlotBonus; SLOT_COUNT],
    pub meta: Meta,
}

impl PlayerCharacter {
    pub fn new(name: &str, owner: &str) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            owner: owner.to_string(),
            stats: MobStats::default(),
            species: None,
            gender: None,
            location: 0,
            storage: 0,
            equip_offense: None,
            equip_defense: None,
            slots: [SlotBonus::None; SLOT_COUNT],
            meta: Meta::new(),
        }
    }

    pub fn is_owned_by(&self, username: &str) -> bool {
        self.owner.eq_ignore_ascii_case(username)
    }

    /// Character sheet counters: every named counter starts at zero and each
    /// slot adds `bonus` to the counter its bonus names.
    pub fn slot_counters(&self, bonus: i32) -> Vec<(SlotBonus, i32)> {
        SlotBonus::ALL
            .iter()
            .map(|counter| {
                let hits = self.slots.iter().filter(|slot| *slot == counter).count() as i32;
                (*counter, hits * bonus)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Attitude {
    #[default]
    Friendly,
    Neutral,
    Hostile,
    Invulnerable,
}

impl Attitude {
    pub fn code(self) -> &'static str {
        match self {
            Attitude::Friendly => "10",
            Attitude::Neutral => "20",
            Attitude::Hostile => "30",
            Attitude::Invulnerable => "40",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "10" => Some(Attitude::Friendly),
            "20" => Some(Attitude::Neutral),
            "30" => Some(Attitude::Hostile),
            "40" => Some(Attitude::Invulnerable),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NonPlayerCharacter {
    pub id: NpcId,
    pub name: String,
    pub stats: MobStats,
    pub species: Option<SpeciesId>,
    pub gender: Option<GenderId>,
    pub spawns: Vec<LocationId>,
    pub attitude: Attitude,
    pub meta: Meta,
}

impl NonPlayerCharacter {
    pub fn new(name: &str) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            stats: MobStats::default(),
            species: None,
            gender: None,
            spawns: Vec::new(),
            attitude: Attitude::default(),
            meta: Meta::new(),
        }
    }

    pub fn with_attitude(mut self, attitude: Attitude) -> Self {
        self.attitude = attitude;
        self
    }
}

/// Named inventory holding a bounded set of items.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Container {
    pub id: ContainerId,
    pub name: String,
    pub size: i16,
    pub contents: Vec<ItemId>,
    pub meta: Meta,
}

impl Container {
    pub fn new(name: &str, size: i16) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            size,
            contents: Vec::new(),
            meta: Meta::new(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.contents.len() >= self.size.max(0) as usize
    }

    pub fn contains(&self, item: ItemId) -> bool {
        self.contents.contains(&item)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attribute {
    pub id: AttributeId,
    pub name: String,
    pub meta: Meta,
}

impl Attribute {
    pub fn new(name: &str) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            meta: Meta::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Enchant {
    pub id: EnchantId,
    pub attribute: AttributeId,
    pub value: i32,
    pub meta: Meta,
}

impl Enchant {
    pub fn new(attribute: AttributeId, value: i32) -> Self {
        Self {
            id: 0,
            attribute,
            value,
            meta: Meta::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    #[default]
    Junk,
    Regular,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl Quality {
    pub fn code(self) -> &'static str {
        match self {
            Quality::Junk => "20",
            Quality::Regular => "30",
            Quality::Uncommon => "40",
            Quality::Rare => "50",
            Quality::Epic => "60",
            Quality::Legendary => "70",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Quality::Junk => "Junk",
            Quality::Regular => "Regular",
            Quality::Uncommon => "Uncommon",
            Quality::Rare => "Rare",
            Quality::Epic => "Epic",
            Quality::Legendary => "Legendary",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    #[default]
    NotApplicable,
    Offense,
    Defense,
    Special,
}

impl ItemCategory {
    pub fn code(self) -> &'static str {
        match self {
            ItemCategory::NotApplicable => "20",
            ItemCategory::Offense => "30",
            ItemCategory::Defense => "40",
            ItemCategory::Special => "50",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ItemCategory::NotApplicable => "N/A",
            ItemCategory::Offense => "offense",
            ItemCategory::Defense => "defense",
            ItemCategory::Special => "special",
        }
    }
}

/// Global item template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BaseItem {
    pub id: BaseItemId,
    pub name: String,
    pub cost: u32,
    pub power: i32,
    pub quality: Quality,
    pub category: ItemCategory,
    pub enchants: Vec<EnchantId>,
    pub meta: Meta,
}

impl BaseItem {
    pub fn new(name: &str, category: ItemCategory) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            cost: 0,
            power: 1,
            quality: Quality::default(),
            category,
            enchants: Vec::new(),
            meta: Meta::new(),
        }
    }
}

/// A concrete instance of a [`BaseItem`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub base: BaseItemId,
    pub enchants: Vec<EnchantId>,
    pub durability: i16,
    pub meta: Meta,
}

impl Item {
    pub fn new(base: BaseItemId) -> Self {
        Self {
            id: 0,
            name: "DEFAULT".to_string(),
            base,
            enchants: Vec::new(),
            durability: 100,
            meta: Meta::new(),
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }
}

/// Active fight between one player character and a set of NPCs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Battle {
    pub id: BattleId,
    pub character: CharacterId,
    pub npcs: Vec<NpcId>,
    pub meta: Meta,
}

impl Battle {
    pub fn new(character: CharacterId, npcs: Vec<NpcId>) -> Self {
        Self {
            id: 0,
            character,
            npcs,
            meta: Meta::new(),
        }
    }
}

/// Per-account settings, including the character currently being played.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountConfig {
    pub username: String,
    pub playing: Option<CharacterId>,
    pub compact_inventory: bool,
    pub meta: Meta,
}

impl AccountConfig {
    pub fn new(username: &str) -> Self {
        Self {
            username: username.to_string(),
            playing: None,
            compact_inventory: false,
            meta: Meta::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_keys_round_trip_through_from_key() {
        for slot in SlotBonus::ALL {
            assert_eq!(SlotBonus::from_key(slot.key()), Some(slot));
        }
        assert_eq!(SlotBonus::from_key("bogus"), None);
    }

    #[test]
    fn container_reports_full_at_size() {
        let mut bag = Container::new("bag", 2);
        assert!(!bag.is_full());
        bag.contents.push(1);
        bag.contents.push(2);
        assert!(bag.is_full());

        let broken = Container::new("broken", -3);
        assert!(broken.is_full(), "negative sizes hold nothing");
    }

    #[test]
    fn attitude_codes_match_legacy_values() {
        assert_eq!(Attitude::default(), Attitude::Friendly);
        assert_eq!(Attitude::from_code(Attitude::Hostile.code()), Some(Attitude::Hostile));
        assert_eq!(Attitude::from_code("99"), None);
    }

    #[test]
    fn item_defaults() {
        let item = Item::new(7);
        assert_eq!(item.name, "DEFAULT");
        assert_eq!(item.durability, 100);
        assert_eq!(Quality::default(), Quality::Junk);
        assert_eq!(ItemCategory::default().label(), "N/A");
        assert!(Quality::Legendary > Quality::Rare);
    }

    #[test]
    fn slot_counters_sum_to_eight_bonuses() {
        let mut toon = PlayerCharacter::new("Brak", "alice");
        toon.slots[0] = SlotBonus::DoubleDamage;
        toon.slots[1] = SlotBonus::DoubleDamage;
        toon.slots[2] = SlotBonus::HitSteal;
        let counters = toon.slot_counters(10);
        let lookup = |slot: SlotBonus| counters.iter().find(|(s, _)| *s == slot).map(|(_, v)| *v);
        assert_eq!(lookup(SlotBonus::DoubleDamage), Some(20));
        assert_eq!(lookup(SlotBonus::HitSteal), Some(10));
        assert_eq!(lookup(SlotBonus::None), Some(50));
        assert_eq!(lookup(SlotBonus::MagicHeal), Some(0));
        assert_eq!(counters.iter().map(|(_, v)| v).sum::<i32>(), 80);
    }

    #[test]
    fn ownership_check_ignores_case() {
        let toon = PlayerCharacter::new("Brak", "Alice");
        assert!(toon.is_owned_by("alice"));
        assert!(!toon.is_owned_by("bob"));
    }
}
