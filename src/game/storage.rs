use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use argon2::Params;
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::IVec;

use crate::accounts::AccountStore;
use crate::game::errors::GameError;
use crate::game::state::canonical_world_seed;
use crate::game::types::{
    AccountConfig, Attribute, BaseItem, BaseItemId, Battle, BattleId, CharacterId, Container,
    ContainerId, Enchant, Gender, Item, ItemId, Location, Meta, NonPlayerCharacter, NpcId,
    PlayerCharacter, Species,
};

const TREE_RECORDS: &str = "roster_records";
const TREE_CONFIGS: &str = "roster_configs";
const TREE_SEQUENCES: &str = "roster_sequences";

pub const LOCATION_SCHEMA_VERSION: u8 = 1;
pub const SPECIES_SCHEMA_VERSION: u8 = 1;
pub const GENDER_SCHEMA_VERSION: u8 = 1;
pub const CHARACTER_SCHEMA_VERSION: u8 = 1;
pub const NPC_SCHEMA_VERSION: u8 = 1;
pub const CONTAINER_SCHEMA_VERSION: u8 = 1;
pub const ATTRIBUTE_SCHEMA_VERSION: u8 = 1;
pub const ENCHANT_SCHEMA_VERSION: u8 = 1;
pub const BASE_ITEM_SCHEMA_VERSION: u8 = 1;
pub const ITEM_SCHEMA_VERSION: u8 = 1;
pub const BATTLE_SCHEMA_VERSION: u8 = 1;
pub const CONFIG_SCHEMA_VERSION: u8 = 1;

/// A game entity with a numeric id that lives in the records tree.
pub trait Record: Serialize + DeserializeOwned {
    /// Key prefix and human-readable entity name.
    const ENTITY: &'static str;
    const SCHEMA_VERSION: u8;

    fn id(&self) -> u64;
    fn set_id(&mut self, id: u64);
    fn meta_mut(&mut self) -> &mut Meta;
}

macro_rules! impl_record {
    ($ty:ty, $entity:literal, $version:expr) => {
        impl Record for $ty {
            const ENTITY: &'static str = $entity;
            const SCHEMA_VERSION: u8 = $version;

            fn id(&self) -> u64 {
                self.id
            }

            fn set_id(&mut self, id: u64) {
                self.id = id;
            }

            fn meta_mut(&mut self) -> &mut Meta {
                &mut self.meta
            }
        }
    };
}

impl_record!(Location, "location", LOCATION_SCHEMA_VERSION);
impl_record!(Species, "species", SPECIES_SCHEMA_VERSION);
impl_record!(Gender, "gender", GENDER_SCHEMA_VERSION);
impl_record!(PlayerCharacter, "character", CHARACTER_SCHEMA_VERSION);
impl_record!(NonPlayerCharacter, "npc", NPC_SCHEMA_VERSION);
impl_record!(Container, "container", CONTAINER_SCHEMA_VERSION);
impl_record!(Attribute, "attribute", ATTRIBUTE_SCHEMA_VERSION);
impl_record!(Enchant, "enchant", ENCHANT_SCHEMA_VERSION);
impl_record!(BaseItem, "base_item", BASE_ITEM_SCHEMA_VERSION);
impl_record!(Item, "item", ITEM_SCHEMA_VERSION);
impl_record!(Battle, "battle", BATTLE_SCHEMA_VERSION);

/// Record counts reported by `roster status`.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StoreStatistics {
    pub users: usize,
    pub characters: usize,
    pub npcs: usize,
    pub locations: usize,
    pub items: usize,
    pub battles: usize,
}

/// Helper builder so tests can easily create throwaway stores with custom paths.
pub struct GameStoreBuilder {
    path: PathBuf,
    ensure_world_seed: bool,
    argon2_params: Option<Params>,
}

impl GameStoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ensure_world_seed: true,
            argon2_params: None,
        }
    }

    /// Opt out of seeding the canonical world during initialization (useful for targeted tests).
    pub fn without_world_seed(mut self) -> Self {
        self.ensure_world_seed = false;
        self
    }

    pub fn with_argon2_params(mut self, params: Option<Params>) -> Self {
        self.argon2_params = params;
        self
    }

    pub fn open(self) -> Result<GameStore, GameError> {
        GameStore::open_with_options(self.path, self.ensure_world_seed, self.argon2_params)
    }
}

/// Sled-backed persistence for world data, characters, inventories and accounts.
pub struct GameStore {
    _db: sled::Db,
    records: sled::Tree,
    configs: sled::Tree,
    sequences: sled::Tree,
    accounts: AccountStore,
    owner_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl GameStore {
    /// Open (or create) the store rooted at `path`, seeding the canonical world
    /// if no locations exist yet.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GameError> {
        Self::open_with_options(path, true, None)
    }

    fn open_with_options<P: AsRef<Path>>(
        path: P,
        seed_world: bool,
        argon2_params: Option<Params>,
    ) -> Result<Self, GameError> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::open(path_ref)?;
        let records = db.open_tree(TREE_RECORDS)?;
        let configs = db.open_tree(TREE_CONFIGS)?;
        let sequences = db.open_tree(TREE_SEQUENCES)?;
        let accounts = AccountStore::open(&db, argon2_params)?;
        let store = Self {
            _db: db,
            records,
            configs,
            sequences,
            accounts,
            owner_locks: Mutex::new(HashMap::new()),
        };

        if seed_world {
            let inserted = store.seed_world_if_needed()?;
            if inserted > 0 {
                info!("Seeded canonical world ({} records)", inserted);
            }
        }

        Ok(store)
    }

    pub fn accounts(&self) -> &AccountStore {
        &self.accounts
    }

    /// Lock serialising changes to the set of characters `owner` holds.
    /// Hold the returned mutex across any count-then-insert sequence.
    pub fn owner_lock(&self, owner: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .owner_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(owner.to_ascii_lowercase())
            .or_default()
            .clone()
    }

    fn record_key(entity: &str, id: u64) -> Vec<u8> {
        format!("{}:{:020}", entity, id).into_bytes()
    }

    fn record_prefix(entity: &str) -> Vec<u8> {
        format!("{}:", entity).into_bytes()
    }

    fn config_key(username: &str) -> Vec<u8> {
        format!("config:{}", username.to_ascii_lowercase()).into_bytes()
    }

    fn decode_sequence(bytes: &[u8]) -> u64 {
        <[u8; 8]>::try_from(bytes)
            .map(u64::from_be_bytes)
            .unwrap_or(0)
    }

    /// Allocate the next id for `entity`. Ids start at 1.
    fn allocate_id(&self, entity: &str) -> Result<u64, GameError> {
        let next = self
            .sequences
            .update_and_fetch(entity.as_bytes(), |old| {
                let current = old.map(Self::decode_sequence).unwrap_or(0);
                Some((current + 1).to_be_bytes().to_vec())
            })?;
        Ok(next.map(|v| Self::decode_sequence(&v)).unwrap_or(1))
    }

    /// Make sure later allocations never hand out an explicitly chosen id.
    fn reserve_id(&self, entity: &str, id: u64) -> Result<(), GameError> {
        self.sequences.update_and_fetch(entity.as_bytes(), |old| {
            let current = old.map(Self::decode_sequence).unwrap_or(0);
            Some(current.max(id).to_be_bytes().to_vec())
        })?;
        Ok(())
    }

    pub(crate) fn serialize<T: Serialize>(version: u8, value: &T) -> Result<Vec<u8>, GameError> {
        let mut bytes = vec![version];
        bytes.extend(bincode::serialize(value)?);
        Ok(bytes)
    }

    pub(crate) fn deserialize<T: DeserializeOwned>(
        entity: &'static str,
        expected: u8,
        bytes: IVec,
    ) -> Result<T, GameError> {
        let Some((&found, body)) = bytes.split_first() else {
            return Err(GameError::Internal(format!("empty {} record", entity)));
        };
        if found != expected {
            return Err(GameError::SchemaMismatch {
                entity,
                expected,
                found,
            });
        }
        Ok(bincode::deserialize::<T>(body)?)
    }

    /// Insert or update a record. A zero id allocates a fresh one; the stored
    /// copy is returned with its id and `modified` stamp filled in.
    pub fn put<R: Record>(&self, mut record: R) -> Result<R, GameError> {
        if record.id() == 0 {
            let id = self.allocate_id(R::ENTITY)?;
            record.set_id(id);
        } else {
            self.reserve_id(R::ENTITY, record.id())?;
        }
        record.meta_mut().touch();
        let key = Self::record_key(R::ENTITY, record.id());
        let bytes = Self::serialize(R::SCHEMA_VERSION, &record)?;
        self.records.insert(key, bytes)?;
        self.records.flush()?;
        debug!("stored {} {}", R::ENTITY, record.id());
        Ok(record)
    }

    pub fn find<R: Record>(&self, id: u64) -> Result<Option<R>, GameError> {
        let key = Self::record_key(R::ENTITY, id);
        match self.records.get(key)? {
            Some(bytes) => Ok(Some(Self::deserialize(
                R::ENTITY,
                R::SCHEMA_VERSION,
                bytes,
            )?)),
            None => Ok(None),
        }
    }

    /// Fetch a record by id, failing with `NotFound` when absent.
    pub fn get<R: Record>(&self, id: u64) -> Result<R, GameError> {
        self.find(id)?
            .ok_or_else(|| GameError::not_found(R::ENTITY, id))
    }

    /// All records of one kind in id order.
    pub fn list<R: Record>(&self) -> Result<Vec<R>, GameError> {
        self.records
            .scan_prefix(Self::record_prefix(R::ENTITY))
            .map(|entry| {
                entry
                    .map_err(GameError::from)
                    .and_then(|(_key, value)| Self::deserialize(R::ENTITY, R::SCHEMA_VERSION, value))
            })
            .collect()
    }

    pub fn count<R: Record>(&self) -> Result<usize, GameError> {
        Ok(self
            .records
            .scan_prefix(Self::record_prefix(R::ENTITY))
            .count())
    }

    /// Remove a record. Returns whether anything was deleted.
    pub fn delete<R: Record>(&self, id: u64) -> Result<bool, GameError> {
        let removed = self.records.remove(Self::record_key(R::ENTITY, id))?;
        self.records.flush()?;
        Ok(removed.is_some())
    }

    // ------------------------------------------------------------------
    // Characters
    // ------------------------------------------------------------------

    /// Characters owned by `username`, oldest first.
    pub fn characters_for_user(&self, username: &str) -> Result<Vec<PlayerCharacter>, GameError> {
        let mut characters: Vec<PlayerCharacter> = self
            .list::<PlayerCharacter>()?
            .into_iter()
            .filter(|c| c.is_owned_by(username))
            .collect();
        characters.sort_by(|a, b| a.meta.created.cmp(&b.meta.created).then(a.id.cmp(&b.id)));
        Ok(characters)
    }

    pub fn count_characters_for_user(&self, username: &str) -> Result<usize, GameError> {
        Ok(self
            .list::<PlayerCharacter>()?
            .iter()
            .filter(|c| c.is_owned_by(username))
            .count())
    }

    /// Fetch a character restricted to those `username` owns. A character that
    /// exists but belongs to someone else is reported as missing.
    pub fn character_for_user(
        &self,
        username: &str,
        id: CharacterId,
    ) -> Result<PlayerCharacter, GameError> {
        match self.find::<PlayerCharacter>(id)? {
            Some(character) if character.is_owned_by(username) => Ok(character),
            _ => Err(GameError::not_found("character", id)),
        }
    }

    /// Whether `owner` already has a character called `name`, ignoring `except`.
    pub fn character_name_taken(
        &self,
        owner: &str,
        name: &str,
        except: Option<CharacterId>,
    ) -> Result<bool, GameError> {
        Ok(self.list::<PlayerCharacter>()?.iter().any(|c| {
            c.is_owned_by(owner) && c.name.eq_ignore_ascii_case(name) && Some(c.id) != except
        }))
    }

    // ------------------------------------------------------------------
    // Items and containers
    // ------------------------------------------------------------------

    /// Create an attribute, refusing duplicate names.
    pub fn create_attribute(&self, name: &str) -> Result<Attribute, GameError> {
        if self
            .list::<Attribute>()?
            .iter()
            .any(|a| a.name.eq_ignore_ascii_case(name))
        {
            return Err(GameError::Duplicate(format!("attribute: {}", name)));
        }
        self.put(Attribute::new(name))
    }

    /// Create an item template, refusing duplicate names.
    pub fn create_base_item(&self, base: BaseItem) -> Result<BaseItem, GameError> {
        if self
            .list::<BaseItem>()?
            .iter()
            .any(|b| b.name.eq_ignore_ascii_case(&base.name))
        {
            return Err(GameError::Duplicate(format!("base item: {}", base.name)));
        }
        self.put(base)
    }

    /// Place an existing item into a container, respecting its size limit.
    pub fn add_item_to_container(
        &self,
        container_id: ContainerId,
        item_id: ItemId,
    ) -> Result<Container, GameError> {
        let mut container: Container = self.get(container_id)?;
        self.get::<Item>(item_id)?;
        if container.contains(item_id) {
            return Ok(container);
        }
        if container.is_full() {
            return Err(GameError::CapacityExceeded(format!(
                "container {} holds at most {} items",
                container.name, container.size
            )));
        }
        container.contents.push(item_id);
        self.put(container)
    }

    /// Instantiate `base` and store the new item in `container_id`.
    pub fn spawn_item_into(
        &self,
        container_id: ContainerId,
        base: BaseItemId,
        name: &str,
    ) -> Result<Item, GameError> {
        let template: BaseItem = self.get(base)?;
        let container: Container = self.get(container_id)?;
        if container.is_full() {
            return Err(GameError::CapacityExceeded(format!(
                "container {} holds at most {} items",
                container.name, container.size
            )));
        }
        let mut item = Item::new(template.id).named(name);
        item.enchants = template.enchants.clone();
        let item = self.put(item)?;
        self.add_item_to_container(container_id, item.id)?;
        Ok(item)
    }

    /// Items in a container paired with their templates, in container order.
    pub fn container_items(
        &self,
        container_id: ContainerId,
    ) -> Result<Vec<(Item, BaseItem)>, GameError> {
        let container: Container = self.get(container_id)?;
        container
            .contents
            .iter()
            .map(|id| {
                let item: Item = self.get(*id)?;
                let base: BaseItem = self.get(item.base)?;
                Ok((item, base))
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Battles
    // ------------------------------------------------------------------

    pub fn battle_for_character(
        &self,
        character: CharacterId,
    ) -> Result<Option<Battle>, GameError> {
        Ok(self
            .list::<Battle>()?
            .into_iter()
            .find(|b| b.character == character))
    }

    /// Start (or join) the character's battle against `npcs`.
    pub fn start_battle(
        &self,
        character: CharacterId,
        npcs: &[NpcId],
    ) -> Result<Battle, GameError> {
        self.get::<PlayerCharacter>(character)?;
        for npc in npcs {
            self.get::<NonPlayerCharacter>(*npc)?;
        }
        let mut battle = self
            .battle_for_character(character)?
            .unwrap_or_else(|| Battle::new(character, Vec::new()));
        for npc in npcs {
            if !battle.npcs.contains(npc) {
                battle.npcs.push(*npc);
            }
        }
        self.put(battle)
    }

    /// Drop one opposing NPC from a battle. An emptied battle is left in place;
    /// the next combat check removes it.
    pub fn remove_battle_npc(&self, battle: BattleId, npc: NpcId) -> Result<Battle, GameError> {
        let mut record: Battle = self.get(battle)?;
        record.npcs.retain(|id| *id != npc);
        self.put(record)
    }

    // ------------------------------------------------------------------
    // Account settings
    // ------------------------------------------------------------------

    pub fn get_config(&self, username: &str) -> Result<Option<AccountConfig>, GameError> {
        match self.configs.get(Self::config_key(username))? {
            Some(bytes) => Ok(Some(Self::deserialize(
                "config",
                CONFIG_SCHEMA_VERSION,
                bytes,
            )?)),
            None => Ok(None),
        }
    }

    pub fn put_config(&self, mut config: AccountConfig) -> Result<AccountConfig, GameError> {
        config.meta.touch();
        let bytes = Self::serialize(CONFIG_SCHEMA_VERSION, &config)?;
        self.configs.insert(Self::config_key(&config.username), bytes)?;
        self.configs.flush()?;
        Ok(config)
    }

    /// Fetch the settings record for `username`, creating it when absent.
    /// The flag reports whether it was just created.
    pub fn get_or_create_config(
        &self,
        username: &str,
    ) -> Result<(AccountConfig, bool), GameError> {
        if let Some(config) = self.get_config(username)? {
            return Ok((config, false));
        }
        let config = self.put_config(AccountConfig::new(username))?;
        Ok((config, true))
    }

    // ------------------------------------------------------------------
    // World
    // ------------------------------------------------------------------

    pub fn seed_world_if_needed(&self) -> Result<usize, GameError> {
        if self.count::<Location>()? > 0 {
            return Ok(0);
        }
        let seed = canonical_world_seed();
        let mut inserted = 0usize;
        for location in seed.locations {
            self.put(location)?;
            inserted += 1;
        }
        for species in seed.species {
            self.put(species)?;
            inserted += 1;
        }
        for gender in seed.genders {
            self.put(gender)?;
            inserted += 1;
        }
        Ok(inserted)
    }

    pub fn statistics(&self) -> Result<StoreStatistics, GameError> {
        Ok(StoreStatistics {
            users: self.accounts.count_users()?,
            characters: self.count::<PlayerCharacter>()?,
            npcs: self.count::<NonPlayerCharacter>()?,
            locations: self.count::<Location>()?,
            items: self.count::<Item>()?,
            battles: self.count::<Battle>()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::DEFAULT_LOCATION_ID;
    use crate::game::types::ItemCategory;
    use tempfile::TempDir;

    fn bare_store(dir: &TempDir) -> GameStore {
        GameStoreBuilder::new(dir.path())
            .without_world_seed()
            .open()
            .expect("store")
    }

    #[test]
    fn put_allocates_sequential_ids() {
        let dir = TempDir::new().expect("tempdir");
        let store = bare_store(&dir);
        let a = store.put(Location::new("A", "")).expect("put a");
        let b = store.put(Location::new("B", "")).expect("put b");
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        let fetched: Location = store.get(2).expect("get");
        assert_eq!(fetched.name, "B");
    }

    #[test]
    fn explicit_ids_are_reserved() {
        let dir = TempDir::new().expect("tempdir");
        let store = bare_store(&dir);
        let mut fixed = Location::new("Fixed", "");
        fixed.id = 10;
        store.put(fixed).expect("put fixed");
        let next = store.put(Location::new("Next", "")).expect("put next");
        assert_eq!(next.id, 11);
    }

    #[test]
    fn missing_record_is_not_found() {
        let dir = TempDir::new().expect("tempdir");
        let store = bare_store(&dir);
        let err = store.get::<Species>(42).unwrap_err();
        assert!(err.is_not_found());
        assert!(store.find::<Species>(42).expect("find").is_none());
    }

    #[test]
    fn schema_mismatch_is_reported() {
        let dir = TempDir::new().expect("tempdir");
        let store = bare_store(&dir);
        let gender = store.put(Gender::new("Other", true)).expect("put");
        let key = GameStore::record_key(Gender::ENTITY, gender.id);
        let mut bytes = store.records.get(&key).expect("get").expect("present").to_vec();
        bytes[0] = GENDER_SCHEMA_VERSION + 1;
        store.records.insert(key, bytes).expect("overwrite");
        match store.get::<Gender>(gender.id) {
            Err(GameError::SchemaMismatch { entity, found, .. }) => {
                assert_eq!(entity, "gender");
                assert_eq!(found, GENDER_SCHEMA_VERSION + 1);
            }
            other => panic!("expected schema mismatch, got {:?}", other),
        }
    }

    #[test]
    fn seeding_world_only_happens_once() {
        let dir = TempDir::new().expect("tempdir");
        {
            let store = GameStoreBuilder::new(dir.path()).open().expect("store");
            let home: Location = store.get(DEFAULT_LOCATION_ID).expect("default location");
            assert_eq!(home.name, "Town Square");
        }
        let store = bare_store(&dir);
        assert_eq!(store.seed_world_if_needed().expect("seed check"), 0);
    }

    #[test]
    fn container_respects_size() {
        let dir = TempDir::new().expect("tempdir");
        let store = bare_store(&dir);
        let sword = store
            .create_base_item(BaseItem::new("Sword", ItemCategory::Offense))
            .expect("base");
        let pouch = store.put(Container::new("pouch", 1)).expect("container");
        store.spawn_item_into(pouch.id, sword.id, "Rusty Sword").expect("first");
        let err = store
            .spawn_item_into(pouch.id, sword.id, "Second Sword")
            .unwrap_err();
        assert!(matches!(err, GameError::CapacityExceeded(_)));
        let items = store.container_items(pouch.id).expect("items");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].0.name, "Rusty Sword");
        assert_eq!(items[0].1.name, "Sword");
    }

    #[test]
    fn duplicate_template_names_are_rejected() {
        let dir = TempDir::new().expect("tempdir");
        let store = bare_store(&dir);
        store.create_attribute("Strength").expect("first");
        assert!(matches!(
            store.create_attribute("strength"),
            Err(GameError::Duplicate(_))
        ));
        store
            .create_base_item(BaseItem::new("Shield", ItemCategory::Defense))
            .expect("first");
        assert!(matches!(
            store.create_base_item(BaseItem::new("Shield", ItemCategory::Defense)),
            Err(GameError::Duplicate(_))
        ));
    }

    #[test]
    fn config_created_on_demand_once() {
        let dir = TempDir::new().expect("tempdir");
        let store = bare_store(&dir);
        let (first, created) = store.get_or_create_config("Alice").expect("create");
        assert!(created);
        assert_eq!(first.username, "Alice");
        let (_, created_again) = store.get_or_create_config("alice").expect("fetch");
        assert!(!created_again, "lookup is case-insensitive");
    }
}
