//! # Accounts - users and browser sessions
//!
//! Account records live in their own sled trees next to the game records.
//! Passwords are stored as Argon2id PHC strings; the cost parameters come
//! from `[security.argon2]` in the configuration.
//!
//! ```rust,no_run
//! use roster::game::GameStoreBuilder;
//!
//! let store = GameStoreBuilder::new("./data/db").open()?;
//! store.accounts().register_user("alice", "correct horse")?;
//! let (_user, ok) = store.accounts().verify_user_password("alice", "correct horse")?;
//! assert!(ok);
//! # Ok::<(), roster::game::GameError>(())
//! ```

pub mod session;

use argon2::{Algorithm, Argon2, Params, Version};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use password_hash::{PasswordHasher, PasswordVerifier};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::errors::GameError;
use crate::game::storage::GameStore;
use crate::validation::{validate_password, validate_user_name};

pub use session::{Flash, FlashLevel, Session};

const TREE_USERS: &str = "roster_users";
const TREE_SESSIONS: &str = "roster_sessions";

pub const USER_SCHEMA_VERSION: u8 = 1;
pub const SESSION_SCHEMA_VERSION: u8 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub username: String,
    pub password_hash: String,
    pub created: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Sled-backed user and session storage.
pub struct AccountStore {
    users: sled::Tree,
    sessions: sled::Tree,
    argon2: Argon2<'static>,
}

impl AccountStore {
    pub(crate) fn open(db: &sled::Db, params: Option<Params>) -> Result<Self, GameError> {
        let argon2 = match params {
            Some(p) => Argon2::new(Algorithm::Argon2id, Version::V0x13, p),
            None => Argon2::default(),
        };
        Ok(Self {
            users: db.open_tree(TREE_USERS)?,
            sessions: db.open_tree(TREE_SESSIONS)?,
            argon2,
        })
    }

    fn user_key(username: &str) -> Vec<u8> {
        format!("users:{}", username.to_ascii_lowercase()).into_bytes()
    }

    fn session_key(id: &Uuid) -> Vec<u8> {
        format!("sessions:{}", id).into_bytes()
    }

    fn hash_password(&self, password: &str) -> Result<String, GameError> {
        let salt = password_hash::SaltString::generate(&mut rand::thread_rng());
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| GameError::PasswordHash(e.to_string()))?;
        Ok(hash.to_string())
    }

    fn put_user(&self, user: &User) -> Result<(), GameError> {
        let bytes = GameStore::serialize(USER_SCHEMA_VERSION, user)?;
        self.users.insert(Self::user_key(&user.username), bytes)?;
        self.users.flush()?;
        Ok(())
    }

    /// Register a new user with password; fails if the name is taken.
    pub fn register_user(&self, username: &str, password: &str) -> Result<User, GameError> {
        let username =
            validate_user_name(username).map_err(|e| GameError::Validation(e.to_string()))?;
        validate_password(password).map_err(|e| GameError::Validation(e.to_string()))?;
        if self.get_user(&username)?.is_some() {
            return Err(GameError::Duplicate(format!(
                "Username '{}' is already taken",
                username
            )));
        }
        let user = User {
            username,
            password_hash: self.hash_password(password)?,
            created: Utc::now(),
            last_login: None,
        };
        self.put_user(&user)?;
        info!("Registered user {}", user.username);
        Ok(user)
    }

    pub fn get_user(&self, username: &str) -> Result<Option<User>, GameError> {
        match self.users.get(Self::user_key(username))? {
            Some(bytes) => Ok(Some(GameStore::deserialize(
                "user",
                USER_SCHEMA_VERSION,
                bytes,
            )?)),
            None => Ok(None),
        }
    }

    /// Verify user password; returns (user, bool match)
    pub fn verify_user_password(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(Option<User>, bool), GameError> {
        let Some(user) = self.get_user(username)? else {
            return Ok((None, false));
        };
        let parsed = password_hash::PasswordHash::new(&user.password_hash)
            .map_err(|e| GameError::PasswordHash(format!("corrupt hash for {}: {}", username, e)))?;
        let ok = self
            .argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok();
        Ok((Some(user), ok))
    }

    /// Record a successful login and return the updated user.
    pub fn record_user_login(&self, username: &str) -> Result<User, GameError> {
        let mut user = self
            .get_user(username)?
            .ok_or_else(|| GameError::not_found("user", username))?;
        user.last_login = Some(Utc::now());
        self.put_user(&user)?;
        Ok(user)
    }

    pub fn count_users(&self) -> Result<usize, GameError> {
        Ok(self.users.scan_prefix(b"users:").count())
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    pub fn get_session(&self, id: &Uuid) -> Result<Option<Session>, GameError> {
        match self.sessions.get(Self::session_key(id))? {
            Some(bytes) => Ok(Some(GameStore::deserialize(
                "session",
                SESSION_SCHEMA_VERSION,
                bytes,
            )?)),
            None => Ok(None),
        }
    }

    pub fn save_session(&self, session: &Session) -> Result<(), GameError> {
        let bytes = GameStore::serialize(SESSION_SCHEMA_VERSION, session)?;
        self.sessions.insert(Self::session_key(&session.id), bytes)?;
        self.sessions.flush()?;
        Ok(())
    }

    pub fn delete_session(&self, id: &Uuid) -> Result<bool, GameError> {
        let removed = self.sessions.remove(Self::session_key(id))?;
        if removed.is_some() {
            self.sessions.flush()?;
        }
        Ok(removed.is_some())
    }

    pub fn count_sessions(&self) -> usize {
        self.sessions.scan_prefix(b"sessions:").count()
    }

    /// Drop sessions idle past `timeout_minutes`, anonymous ones with nothing
    /// left to show, and any that no longer decode. Returns how many went.
    pub fn purge_expired_sessions(&self, timeout_minutes: u32) -> Result<usize, GameError> {
        let mut purged = 0;
        for entry in self.sessions.scan_prefix(b"sessions:") {
            let (key, bytes) = entry?;
            let stale = match GameStore::deserialize::<Session>(
                "session",
                SESSION_SCHEMA_VERSION,
                bytes,
            ) {
                Ok(session) => session.is_expired(timeout_minutes) || !session.needs_storage(),
                Err(e) => {
                    warn!("Dropping unreadable session record: {}", e);
                    true
                }
            };
            if stale {
                self.sessions.remove(key)?;
                purged += 1;
            }
        }
        if purged > 0 {
            self.sessions.flush()?;
            debug!("Purged {} sessions", purged);
        }
        Ok(purged)
    }
}
