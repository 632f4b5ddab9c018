//! Test utilities & fixtures shared by the integration tests.

use argon2::Params;
use tempfile::TempDir;

use roster::config::GameConfig;
use roster::game::{CharacterId, GameStore, GameStoreBuilder, Species};
use roster::web::forms::CreateCharacterForm;
use roster::web::{RequestContext, Views};

/// Argon2 costs low enough to keep tests fast.
#[allow(dead_code)]
pub fn cheap_params() -> Params {
    Params::new(1024, 1, 1, None).expect("params")
}

/// Store in a temp dir, seeded with the canonical world.
pub fn open_store(dir: &TempDir) -> GameStore {
    GameStoreBuilder::new(dir.path().join("db"))
        .with_argon2_params(Some(cheap_params()))
        .open()
        .expect("store")
}

#[allow(dead_code)]
pub fn human(store: &GameStore) -> Species {
    store
        .list::<Species>()
        .expect("species")
        .into_iter()
        .find(|s| s.name == "Human")
        .expect("seeded human")
}

/// Create a Human through the view and return its id.
#[allow(dead_code)]
pub fn create_character(store: &GameStore, game: &GameConfig, owner: &str, name: &str) -> CharacterId {
    let views = Views::new(store, game);
    let mut ctx = RequestContext::for_user(owner, "/characters/new");
    let form = CreateCharacterForm {
        name: name.to_string(),
        species: human(store).id.to_string(),
        gender: String::new(),
    };
    views.create(&mut ctx, form).expect("create");
    store
        .characters_for_user(owner)
        .expect("characters")
        .into_iter()
        .find(|c| c.name == name)
        .map(|c| c.id)
        .expect("created character")
}
