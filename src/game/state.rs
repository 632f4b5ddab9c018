//! Canonical starter world inserted the first time a store is opened.

use crate::game::types::{Gender, Location, LocationId, Species};

/// Location new characters land in when their species has no starting zone.
pub const DEFAULT_LOCATION_ID: LocationId = 1;

/// Records making up the canonical starter world.
#[derive(Debug, Clone)]
pub struct WorldSeed {
    pub locations: Vec<Location>,
    pub species: Vec<Species>,
    pub genders: Vec<Gender>,
}

/// Build the starter world: the default location, one playable species
/// without a starting zone, and the playable genders.
pub fn canonical_world_seed() -> WorldSeed {
    let mut town_square = Location::new(
        "Town Square",
        "A cobbled plaza where every adventurer first opens their eyes.",
    );
    town_square.id = DEFAULT_LOCATION_ID;

    let human = Species::new("Human").playable().with_pools(50, 20);

    let genders = vec![
        Gender::new("Female", true),
        Gender::new("Male", true),
        Gender::new("Other", true),
    ];

    WorldSeed {
        locations: vec![town_square],
        species: vec![human],
        genders,
    }
}
