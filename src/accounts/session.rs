use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity of a one-shot message shown on the next rendered page.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FlashLevel {
    Success,
    Info,
    Warning,
    Error,
}

impl FlashLevel {
    /// CSS class used by the page templates.
    pub fn css_class(self) -> &'static str {
        match self {
            FlashLevel::Success => "success",
            FlashLevel::Info => "info",
            FlashLevel::Warning => "warning",
            FlashLevel::Error => "danger",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

impl Flash {
    pub fn new(level: FlashLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// # Browser session
///
/// Created on the first request that carries no valid session cookie. A
/// session starts anonymous; a successful login binds `username`. Anonymous
/// sessions are only stored while they hold a flash. Flash
/// messages queued while handling one request are stored here and drained by
/// the next page render, which is what lets a redirect carry a notice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: Uuid,
    pub username: Option<String>,
    pub flash: Vec<Flash>,
    pub created: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username: None,
            flash: Vec::new(),
            created: now,
            last_seen: now,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.username.is_some()
    }

    /// Whether the session carries anything worth storing.
    pub fn needs_storage(&self) -> bool {
        self.is_authenticated() || !self.flash.is_empty()
    }

    pub fn touch(&mut self) {
        self.last_seen = Utc::now();
    }

    /// Whether the session has been idle for longer than `timeout_minutes`.
    pub fn is_expired(&self, timeout_minutes: u32) -> bool {
        if timeout_minutes == 0 {
            return false;
        }
        Utc::now() - self.last_seen > chrono::Duration::minutes(timeout_minutes as i64)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
