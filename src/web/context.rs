//! Per-request state handed explicitly to every view, and the guards views
//! compose to authorize a request.

use log::warn;
use thiserror::Error;

use crate::accounts::{Flash, FlashLevel};
use crate::game::{CharacterId, GameError, GameStore, PlayerCharacter};
use crate::logutil::escape_log;

/// Login state change a view asks the HTTP layer to apply to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthChange {
    LoggedIn(String),
    LoggedOut,
}

/// What a view knows about the request it is serving.
#[derive(Debug, Clone)]
pub struct RequestContext {
    user: Option<String>,
    path: String,
    flash: Vec<Flash>,
    auth_change: Option<AuthChange>,
}

impl RequestContext {
    pub fn new(user: Option<String>, path: impl Into<String>) -> Self {
        Self {
            user,
            path: path.into(),
            flash: Vec::new(),
            auth_change: None,
        }
    }

    pub fn anonymous(path: impl Into<String>) -> Self {
        Self::new(None, path)
    }

    pub fn for_user(username: &str, path: impl Into<String>) -> Self {
        Self::new(Some(username.to_string()), path)
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Queue a one-shot message for the next rendered page.
    pub fn flash(&mut self, level: FlashLevel, message: impl Into<String>) {
        self.flash.push(Flash::new(level, message));
    }

    pub fn flashes(&self) -> &[Flash] {
        &self.flash
    }

    pub fn take_flash(&mut self) -> Vec<Flash> {
        std::mem::take(&mut self.flash)
    }

    pub fn log_in(&mut self, username: &str) {
        self.user = Some(username.to_string());
        self.auth_change = Some(AuthChange::LoggedIn(username.to_string()));
    }

    pub fn log_out(&mut self) {
        self.user = None;
        self.auth_change = Some(AuthChange::LoggedOut);
    }

    pub fn take_auth_change(&mut self) -> Option<AuthChange> {
        self.auth_change.take()
    }
}

/// Why a view did not produce a page or redirect.
#[derive(Debug, Error)]
pub enum ViewError {
    /// The requester is not logged in; `next` is where to return afterwards.
    #[error("login required for {next}")]
    LoginRequired { next: String },

    #[error(transparent)]
    Game(#[from] GameError),
}

impl ViewError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ViewError::Game(GameError::NotFound(_)))
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, ViewError::Game(GameError::Forbidden(_)))
    }
}

/// Require a logged-in user and return their username.
pub fn require_user(ctx: &RequestContext) -> Result<String, ViewError> {
    match ctx.user() {
        Some(username) => Ok(username.to_string()),
        None => Err(ViewError::LoginRequired {
            next: ctx.path().to_string(),
        }),
    }
}

/// Require that the logged-in user owns character `id`, returning it.
/// Missing characters are `NotFound`; someone else's are `Forbidden`.
pub fn require_owner(
    ctx: &RequestContext,
    store: &GameStore,
    id: CharacterId,
) -> Result<PlayerCharacter, ViewError> {
    let username = require_user(ctx)?;
    let character: PlayerCharacter = store.get(id)?;
    if !character.is_owned_by(&username) {
        warn!(
            target: "security",
            "User {} denied access to character {} owned by {}",
            escape_log(&username),
            id,
            escape_log(&character.owner)
        );
        return Err(GameError::Forbidden(format!("character {}", id)).into());
    }
    Ok(character)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameStoreBuilder;
    use tempfile::TempDir;

    #[test]
    fn anonymous_requests_need_login() {
        let ctx = RequestContext::anonymous("/characters");
        match require_user(&ctx) {
            Err(ViewError::LoginRequired { next }) => assert_eq!(next, "/characters"),
            other => panic!("expected login redirect, got {:?}", other),
        }
    }

    #[test]
    fn owner_guard_distinguishes_missing_and_foreign() {
        let dir = TempDir::new().expect("tempdir");
        let store = GameStoreBuilder::new(dir.path()).open().expect("store");
        let toon = store.put(PlayerCharacter::new("Brak", "alice")).expect("put");

        let alice = RequestContext::for_user("alice", "/");
        assert_eq!(require_owner(&alice, &store, toon.id).expect("owner").name, "Brak");

        let bob = RequestContext::for_user("bob", "/");
        assert!(require_owner(&bob, &store, toon.id).unwrap_err().is_forbidden());
        assert!(require_owner(&alice, &store, 999).unwrap_err().is_not_found());
    }

    #[test]
    fn flashes_drain_once() {
        let mut ctx = RequestContext::for_user("alice", "/");
        ctx.flash(FlashLevel::Info, "hello");
        assert_eq!(ctx.flashes().len(), 1);
        assert_eq!(ctx.take_flash().len(), 1);
        assert!(ctx.flashes().is_empty());
    }

    #[test]
    fn auth_changes_are_recorded() {
        let mut ctx = RequestContext::anonymous("/login");
        ctx.log_in("alice");
        assert_eq!(ctx.user(), Some("alice"));
        assert_eq!(ctx.take_auth_change(), Some(AuthChange::LoggedIn("alice".into())));
        assert_eq!(ctx.take_auth_change(), None);
    }
}
