//! Derived combat status for player characters.
//!
//! A character is in combat while a battle record references it and still
//! lists at least one opposing NPC. A battle with no NPCs left is over: it is
//! deleted the first time anyone asks.

use log::info;

use crate::game::errors::GameError;
use crate::game::storage::GameStore;
use crate::game::types::{Battle, CharacterId};

/// Return the character's live battle, or `None` when it is not fighting.
/// Emptied battles are removed as a side effect.
pub fn in_combat(store: &GameStore, character: CharacterId) -> Result<Option<Battle>, GameError> {
    let Some(battle) = store.battle_for_character(character)? else {
        return Ok(None);
    };
    if battle.npcs.is_empty() {
        store.delete::<Battle>(battle.id)?;
        info!(
            "Battle {} for character {} ended (no opponents left)",
            battle.id, character
        );
        return Ok(None);
    }
    Ok(Some(battle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::storage::GameStoreBuilder;
    use crate::game::types::{Attitude, NonPlayerCharacter, PlayerCharacter};
    use tempfile::TempDir;

    #[test]
    fn battle_ends_when_last_npc_leaves() {
        let dir = TempDir::new().expect("tempdir");
        let store = GameStoreBuilder::new(dir.path()).open().expect("store");
        let toon = store.put(PlayerCharacter::new("Brak", "alice")).expect("toon");
        let rat = store
            .put(NonPlayerCharacter::new("Rat").with_attitude(Attitude::Hostile))
            .expect("rat");
        let bat = store.put(NonPlayerCharacter::new("Bat")).expect("bat");

        assert!(in_combat(&store, toon.id).expect("check").is_none());

        let battle = store.start_battle(toon.id, &[rat.id, bat.id]).expect("battle");
        assert!(in_combat(&store, toon.id).expect("check").is_some());

        store.remove_battle_npc(battle.id, rat.id).expect("remove rat");
        assert!(in_combat(&store, toon.id).expect("check").is_some());

        store.remove_battle_npc(battle.id, bat.id).expect("remove bat");
        assert!(
            store.find::<Battle>(battle.id).expect("find").is_some(),
            "removal alone keeps the record"
        );
        assert!(in_combat(&store, toon.id).expect("check").is_none());
        assert!(store.find::<Battle>(battle.id).expect("find").is_none());
    }

    #[test]
    fn starting_twice_joins_the_same_battle() {
        let dir = TempDir::new().expect("tempdir");
        let store = GameStoreBuilder::new(dir.path()).open().expect("store");
        let toon = store.put(PlayerCharacter::new("Brak", "alice")).expect("toon");
        let rat = store.put(NonPlayerCharacter::new("Rat")).expect("rat");
        let first = store.start_battle(toon.id, &[rat.id]).expect("first");
        let second = store.start_battle(toon.id, &[rat.id]).expect("second");
        assert_eq!(first.id, second.id);
        assert_eq!(second.npcs, vec![rat.id]);
    }
}
