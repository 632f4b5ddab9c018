//! Request handlers for the character roster.
//!
//! Each view is a plain method taking the explicit [`RequestContext`] and the
//! bound form input. It returns either a page to render or a route to redirect
//! to, so the views can be exercised without an HTTP server.

use std::sync::PoisonError;

use log::{info, warn};

use crate::accounts::FlashLevel;
use crate::config::GameConfig;
use crate::game::{
    in_combat, AccountConfig, BaseItem, CharacterId, Container, GameError, GameStore, Gender,
    Item, Location, LocationId, PlayerCharacter, SlotBonus, Species,
};
use crate::logutil::escape_log;

use super::context::{require_owner, require_user, RequestContext, ViewError};
use super::forms::{
    safe_next, Cleaned, CreateCharacterForm, FormErrors, LoginForm, NewCharacter, SettingsForm,
    UpdateCharacterForm,
};

pub const MSG_AT_MAX: &str = "Already at max.";
pub const MSG_IN_COMBAT: &str = "Sorry, cannot save while character is in combat.";
pub const MSG_SETTINGS_SAVED: &str = "Changes saved!";
pub const MSG_BAD_LOGIN: &str = "Invalid username or password.";

/// Places a view can send the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Entry point of the game itself.
    GameEntry,
    Login { next: Option<String> },
    Roster,
    CreateCharacter,
    CharacterDetail(CharacterId),
    EditCharacter(CharacterId),
    Inventory,
    Settings,
    /// A local path supplied by the client, already checked by [`safe_next`].
    Local(String),
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::GameEntry => "/".to_string(),
            Route::Login { next: None } => "/login".to_string(),
            Route::Login { next: Some(next) } => {
                format!("/login?next={}", urlencoding::encode(next))
            }
            Route::Roster => "/characters".to_string(),
            Route::CreateCharacter => "/characters/new".to_string(),
            Route::CharacterDetail(id) => format!("/characters/{}", id),
            Route::EditCharacter(id) => format!("/characters/{}/edit", id),
            Route::Inventory => "/inventory".to_string(),
            Route::Settings => "/settings".to_string(),
            Route::Local(path) => path.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoginPage {
    pub username: String,
    pub next: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RosterPage {
    pub characters: Vec<PlayerCharacter>,
    pub config: AccountConfig,
    pub max_characters: usize,
}

#[derive(Debug, Clone)]
pub struct CreatePage {
    pub form: CreateCharacterForm,
    pub errors: FormErrors,
    pub species: Vec<Species>,
    pub genders: Vec<Gender>,
}

#[derive(Debug, Clone)]
pub struct DetailPage {
    pub character: PlayerCharacter,
    pub species: Option<Species>,
    pub gender: Option<Gender>,
    pub location: Option<Location>,
    /// Named counters in display order.
    pub counters: Vec<(SlotBonus, i32)>,
    pub in_combat: bool,
}

impl DetailPage {
    pub fn counter(&self, key: &str) -> Option<i32> {
        self.counters
            .iter()
            .find(|(slot, _)| slot.key() == key)
            .map(|(_, value)| *value)
    }
}

#[derive(Debug, Clone)]
pub struct EditPage {
    pub character: PlayerCharacter,
    pub form: UpdateCharacterForm,
    pub errors: FormErrors,
    pub genders: Vec<Gender>,
    pub items: Vec<(Item, BaseItem)>,
}

#[derive(Debug, Clone)]
pub struct InventoryPage {
    pub character: PlayerCharacter,
    pub container: Container,
    pub items: Vec<(Item, BaseItem)>,
    pub compact: bool,
}

#[derive(Debug, Clone)]
pub struct SettingsPage {
    pub config: AccountConfig,
    pub form: SettingsForm,
    pub errors: FormErrors,
    pub characters: Vec<PlayerCharacter>,
}

#[derive(Debug, Clone)]
pub enum Page {
    Login(LoginPage),
    Roster(RosterPage),
    CreateCharacter(CreatePage),
    CharacterDetail(DetailPage),
    EditCharacter(EditPage),
    Inventory(InventoryPage),
    Settings(SettingsPage),
}

#[derive(Debug, Clone)]
pub enum ViewResponse {
    Render(Page),
    Redirect(Route),
}

impl ViewResponse {
    pub fn redirect_path(&self) -> Option<String> {
        match self {
            ViewResponse::Redirect(route) => Some(route.path()),
            ViewResponse::Render(_) => None,
        }
    }
}

pub type ViewResult = Result<ViewResponse, ViewError>;

/// The roster views bound to a store and the game limits.
pub struct Views<'a> {
    store: &'a GameStore,
    game: &'a GameConfig,
}

impl<'a> Views<'a> {
    pub fn new(store: &'a GameStore, game: &'a GameConfig) -> Self {
        Self { store, game }
    }

    fn playable_species(&self) -> Result<Vec<Species>, GameError> {
        Ok(self
            .store
            .list::<Species>()?
            .into_iter()
            .filter(|s| s.playable)
            .collect())
    }

    fn playable_genders(&self) -> Result<Vec<Gender>, GameError> {
        Ok(self
            .store
            .list::<Gender>()?
            .into_iter()
            .filter(|g| g.playable)
            .collect())
    }

    fn at_character_cap(&self, username: &str) -> Result<bool, GameError> {
        Ok(self.store.count_characters_for_user(username)? >= self.game.max_characters)
    }

    /// Species starting zone if it exists, otherwise the configured default.
    fn starting_location(&self, species: &Species) -> Result<LocationId, GameError> {
        if let Some(zone) = species.starting_zone {
            if self.store.find::<Location>(zone)?.is_some() {
                return Ok(zone);
            }
            warn!(
                "Species {} has missing starting zone {}; using default location",
                escape_log(&species.name),
                zone
            );
        }
        let fallback: Location = self.store.get(self.game.default_location_id)?;
        Ok(fallback.id)
    }

    /// `/` sends players to their roster.
    pub fn home(&self, ctx: &mut RequestContext) -> ViewResult {
        require_user(ctx)?;
        Ok(ViewResponse::Redirect(Route::Roster))
    }

    pub fn login_form(&self, ctx: &mut RequestContext, next: Option<String>) -> ViewResult {
        let next = safe_next(next.as_deref());
        if ctx.user().is_some() {
            return Ok(ViewResponse::Redirect(
                next.map(Route::Local).unwrap_or(Route::Roster),
            ));
        }
        Ok(ViewResponse::Render(Page::Login(LoginPage {
            username: String::new(),
            next,
        })))
    }

    pub fn login(&self, ctx: &mut RequestContext, form: LoginForm) -> ViewResult {
        let next = safe_next(form.next.as_deref());
        let accounts = self.store.accounts();
        let (user, ok) = accounts.verify_user_password(form.username.trim(), &form.password)?;
        match user {
            Some(user) if ok => {
                accounts.record_user_login(&user.username)?;
                ctx.log_in(&user.username);
                info!(target: "security", "User {} logged in", escape_log(&user.username));
                Ok(ViewResponse::Redirect(
                    next.map(Route::Local).unwrap_or(Route::Roster),
                ))
            }
            _ => {
                warn!(
                    target: "security",
                    "Failed login for {}",
                    escape_log(form.username.trim())
                );
                ctx.flash(FlashLevel::Error, MSG_BAD_LOGIN);
                Ok(ViewResponse::Render(Page::Login(LoginPage {
                    username: form.username,
                    next,
                })))
            }
        }
    }

    pub fn logout(&self, ctx: &mut RequestContext) -> ViewResult {
        if let Some(username) = ctx.user() {
            info!(target: "security", "User {} logged out", escape_log(username));
        }
        ctx.log_out();
        Ok(ViewResponse::Redirect(Route::Login { next: None }))
    }

    /// List the requester's characters, oldest first.
    pub fn index(&self, ctx: &mut RequestContext) -> ViewResult {
        let username = require_user(ctx)?;
        let characters = self.store.characters_for_user(&username)?;
        let (config, _) = self.store.get_or_create_config(&username)?;
        Ok(ViewResponse::Render(Page::Roster(RosterPage {
            characters,
            config,
            max_characters: self.game.max_characters,
        })))
    }

    fn create_page(
        &self,
        form: CreateCharacterForm,
        errors: FormErrors,
    ) -> Result<ViewResponse, GameError> {
        Ok(ViewResponse::Render(Page::CreateCharacter(CreatePage {
            form,
            errors,
            species: self.playable_species()?,
            genders: self.playable_genders()?,
        })))
    }

    pub fn create_form(&self, ctx: &mut RequestContext) -> ViewResult {
        let username = require_user(ctx)?;
        if self.at_character_cap(&username)? {
            ctx.flash(FlashLevel::Error, MSG_AT_MAX);
            return Ok(ViewResponse::Redirect(Route::Roster));
        }
        Ok(self.create_page(CreateCharacterForm::default(), FormErrors::new())?)
    }

    pub fn create(&self, ctx: &mut RequestContext, form: CreateCharacterForm) -> ViewResult {
        let username = require_user(ctx)?;
        let owner_lock = self.store.owner_lock(&username);
        let _guard = owner_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.at_character_cap(&username)? {
            ctx.flash(FlashLevel::Error, MSG_AT_MAX);
            return Ok(self.create_page(form, FormErrors::new())?);
        }

        let NewCharacter {
            name,
            species,
            gender,
        } = match form.clean(self.store, &username)? {
            Cleaned::Valid(new) => new,
            Cleaned::Invalid(errors) => return Ok(self.create_page(form, errors)?),
        };

        let location = self.starting_location(&species)?;
        let storage = self
            .store
            .put(Container::new(&name, self.game.character_storage))?;

        let mut character = PlayerCharacter::new(&name, &username);
        character.species = Some(species.id);
        character.gender = gender.map(|g| g.id);
        character.stats.life = species.starting_hp as i32;
        character.stats.life_max = species.starting_hp as i32;
        character.stats.mana = species.starting_mp as i32;
        character.stats.mana_max = species.starting_mp as i32;
        character.location = location;
        character.storage = storage.id;
        let character = self.store.put(character)?;

        info!(
            "User {} created character {} ({}) at location {}",
            escape_log(&username),
            character.id,
            escape_log(&character.name),
            character.location
        );
        Ok(ViewResponse::Redirect(Route::Roster))
    }

    pub fn detail(&self, ctx: &mut RequestContext, id: CharacterId) -> ViewResult {
        let character = require_owner(ctx, self.store, id)?;
        let species = match character.species {
            Some(sid) => self.store.find::<Species>(sid)?,
            None => None,
        };
        let gender = match character.gender {
            Some(gid) => self.store.find::<Gender>(gid)?,
            None => None,
        };
        let location = self.store.find::<Location>(character.location)?;
        let in_combat = in_combat(self.store, character.id)?.is_some();
        let counters = character.slot_counters(self.game.slot_bonus);
        Ok(ViewResponse::Render(Page::CharacterDetail(DetailPage {
            character,
            species,
            gender,
            location,
            counters,
            in_combat,
        })))
    }

    fn edit_page(
        &self,
        character: PlayerCharacter,
        form: UpdateCharacterForm,
        errors: FormErrors,
    ) -> Result<ViewResponse, GameError> {
        let items = self.store.container_items(character.storage)?;
        Ok(ViewResponse::Render(Page::EditCharacter(EditPage {
            character,
            form,
            errors,
            genders: self.playable_genders()?,
            items,
        })))
    }

    pub fn update_form(&self, ctx: &mut RequestContext, id: CharacterId) -> ViewResult {
        let character = require_owner(ctx, self.store, id)?;
        let form = UpdateCharacterForm::from_character(&character);
        Ok(self.edit_page(character, form, FormErrors::new())?)
    }

    pub fn update(
        &self,
        ctx: &mut RequestContext,
        id: CharacterId,
        form: UpdateCharacterForm,
    ) -> ViewResult {
        let character = require_owner(ctx, self.store, id)?;
        if let Some(battle) = in_combat(self.store, character.id)? {
            info!(
                "Refused save of character {} during battle {}",
                character.id, battle.id
            );
            ctx.flash(FlashLevel::Warning, MSG_IN_COMBAT);
            return Ok(self.edit_page(character, form, FormErrors::new())?);
        }
        match form.clean(self.store, &character)? {
            Cleaned::Valid(updated) => {
                let saved = self.store.put(updated)?;
                Ok(ViewResponse::Redirect(Route::CharacterDetail(saved.id)))
            }
            Cleaned::Invalid(errors) => Ok(self.edit_page(character, form, errors)?),
        }
    }

    /// Make `id` the character the requester is playing, then enter the game.
    pub fn select(&self, ctx: &mut RequestContext, id: CharacterId) -> ViewResult {
        let username = require_user(ctx)?;
        let (mut config, _) = self.store.get_or_create_config(&username)?;
        let character = self.store.character_for_user(&username, id)?;
        config.playing = Some(character.id);
        self.store.put_config(config)?;
        info!(
            "User {} is now playing {}",
            escape_log(&username),
            escape_log(&character.name)
        );
        Ok(ViewResponse::Redirect(Route::GameEntry))
    }

    pub fn inventory(&self, ctx: &mut RequestContext) -> ViewResult {
        let username = require_user(ctx)?;
        let (config, _) = self.store.get_or_create_config(&username)?;
        let mut characters = self.store.characters_for_user(&username)?;
        let selected = config
            .playing
            .and_then(|id| characters.iter().position(|c| c.id == id));
        let character = match (selected, characters.len()) {
            (Some(index), _) => characters.swap_remove(index),
            (None, 1) => characters.swap_remove(0),
            _ => {
                return Err(GameError::NotFound(format!(
                    "no active character for {}",
                    username
                ))
                .into())
            }
        };
        let container: Container = self.store.get(character.storage)?;
        let items = self.store.container_items(container.id)?;
        Ok(ViewResponse::Render(Page::Inventory(InventoryPage {
            character,
            container,
            items,
            compact: config.compact_inventory,
        })))
    }

    fn settings_page(
        &self,
        username: &str,
        config: AccountConfig,
        form: SettingsForm,
        errors: FormErrors,
    ) -> Result<ViewResponse, GameError> {
        Ok(ViewResponse::Render(Page::Settings(SettingsPage {
            config,
            form,
            errors,
            characters: self.store.characters_for_user(username)?,
        })))
    }

    pub fn settings_form(&self, ctx: &mut RequestContext) -> ViewResult {
        let username = require_user(ctx)?;
        let (config, _) = self.store.get_or_create_config(&username)?;
        let form = SettingsForm::from_config(&config);
        Ok(self.settings_page(&username, config, form, FormErrors::new())?)
    }

    pub fn settings(&self, ctx: &mut RequestContext, form: SettingsForm) -> ViewResult {
        let username = require_user(ctx)?;
        let (config, _) = self.store.get_or_create_config(&username)?;
        match form.clean(self.store, &config)? {
            Cleaned::Valid(updated) => {
                self.store.put_config(updated)?;
                ctx.flash(FlashLevel::Success, MSG_SETTINGS_SAVED);
                Ok(ViewResponse::Redirect(Route::Settings))
            }
            Cleaned::Invalid(errors) => Ok(self.settings_page(&username, config, form, errors)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_render_paths() {
        assert_eq!(Route::GameEntry.path(), "/");
        assert_eq!(Route::CharacterDetail(4).path(), "/characters/4");
        assert_eq!(Route::EditCharacter(4).path(), "/characters/4/edit");
        assert_eq!(
            Route::Login {
                next: Some("/characters/4?x=1".into())
            }
            .path(),
            "/login?next=%2Fcharacters%2F4%3Fx%3D1"
        );
    }
}
