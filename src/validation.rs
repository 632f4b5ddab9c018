//! Name and free-text validation for accounts, characters and form input.

use std::collections::HashSet;

/// Name validation errors with helpful messages
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("Name is too short (minimum {min} characters)")]
    TooShort { min: usize },

    #[error("Name is too long (maximum {max} characters)")]
    TooLong { max: usize },

    #[error("Name cannot start or end with whitespace")]
    InvalidWhitespace,

    #[error("Name contains invalid characters: {chars}")]
    InvalidCharacters { chars: String },

    #[error("Name contains path separators (/ or \\)")]
    PathTraversal,

    #[error("Name is reserved")]
    Reserved,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PasswordError {
    #[error("Password too short (minimum {min} characters)")]
    TooShort { min: usize },

    #[error("Password too long (maximum {max} characters)")]
    TooLong { max: usize },
}

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;
pub const MAX_NOTES_LEN: usize = 2000;

/// Name validation rules configuration
#[derive(Debug, Clone)]
pub struct NameRules {
    pub min_length: usize,
    pub max_length: usize,
    pub allow_spaces: bool,
    pub allow_unicode: bool,
    /// Extra ASCII punctuation accepted on top of `_`, `-` and `.`.
    pub extra_punctuation: &'static str,
    pub check_reserved: bool,
}

impl NameRules {
    /// Account names end up in URLs and log lines.
    pub fn user() -> Self {
        NameRules {
            min_length: 2,
            max_length: 30,
            allow_spaces: false,
            allow_unicode: true,
            extra_punctuation: "",
            check_reserved: true,
        }
    }

    /// Character names are shown in game text, so a little more punctuation is fine.
    pub fn character() -> Self {
        NameRules {
            min_length: 2,
            max_length: 32,
            allow_spaces: true,
            allow_unicode: true,
            extra_punctuation: "'",
            check_reserved: false,
        }
    }
}

fn reserved_names() -> HashSet<&'static str> {
    [
        "admin", "administrator", "root", "system", "sysop", "operator", "guest", "anonymous",
        "login", "logout", "register", "settings", "inventory", "characters", "static", "api",
    ]
    .iter()
    .copied()
    .collect()
}

/// Validate a name according to the given rules, returning the accepted form.
pub fn validate_name(name: &str, rules: &NameRules) -> Result<String, NameError> {
    let trimmed = name.trim();

    let length = trimmed.chars().count();
    if length < rules.min_length {
        return Err(NameError::TooShort {
            min: rules.min_length,
        });
    }
    if length > rules.max_length {
        return Err(NameError::TooLong {
            max: rules.max_length,
        });
    }

    if trimmed != name {
        return Err(NameError::InvalidWhitespace);
    }

    if rules.check_reserved && reserved_names().contains(trimmed.to_lowercase().as_str()) {
        return Err(NameError::Reserved);
    }

    if trimmed.contains("..") || trimmed.contains('/') || trimmed.contains('\\') {
        return Err(NameError::PathTraversal);
    }

    let mut invalid_chars = Vec::new();
    for ch in trimmed.chars() {
        let valid = if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' || ch == '.' {
            true
        } else if ch == ' ' {
            rules.allow_spaces
        } else if ch.is_control() {
            false
        } else if ch.is_ascii() {
            rules.extra_punctuation.contains(ch)
        } else {
            rules.allow_unicode && ch.is_alphanumeric()
        };
        if !valid {
            invalid_chars.push(ch);
        }
    }

    if !invalid_chars.is_empty() {
        let unique: HashSet<char> = invalid_chars.into_iter().collect();
        let mut chars: Vec<char> = unique.into_iter().collect();
        chars.sort_unstable();
        let chars = chars
            .into_iter()
            .map(|c| {
                if c.is_control() {
                    format!("\\u{{{:04x}}}", c as u32)
                } else {
                    c.to_string()
                }
            })
            .collect::<String>();
        return Err(NameError::InvalidCharacters { chars });
    }

    Ok(trimmed.to_string())
}

/// Validate an account name with the user rules.
pub fn validate_user_name(name: &str) -> Result<String, NameError> {
    validate_name(name, &NameRules::user())
}

/// Validate a character name with the character rules.
pub fn validate_character_name(name: &str) -> Result<String, NameError> {
    validate_name(name, &NameRules::character())
}

pub fn validate_password(password: &str) -> Result<(), PasswordError> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LEN {
        return Err(PasswordError::TooShort {
            min: MIN_PASSWORD_LEN,
        });
    }
    if length > MAX_PASSWORD_LEN {
        return Err(PasswordError::TooLong {
            max: MAX_PASSWORD_LEN,
        });
    }
    Ok(())
}

/// Normalize free-text notes: strip control characters other than newlines,
/// cap the length, and map blank input to `None`.
pub fn sanitize_notes(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .replace("\r\n", "\n")
        .chars()
        .filter(|c| *c == '\n' || !c.is_control())
        .take(MAX_NOTES_LEN)
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// Parse a session id, which must be a UUID.
pub fn parse_session_id(raw: &str) -> Option<uuid::Uuid> {
    uuid::Uuid::parse_str(raw.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_names() {
        assert_eq!(validate_user_name("alice").unwrap(), "alice");
        assert_eq!(validate_user_name("a"), Err(NameError::TooShort { min: 2 }));
        assert_eq!(validate_user_name("Admin"), Err(NameError::Reserved));
        assert_eq!(validate_user_name(" bob"), Err(NameError::InvalidWhitespace));
        assert_eq!(validate_user_name("../etc"), Err(NameError::PathTraversal));
        assert!(matches!(
            validate_user_name("bob smith"),
            Err(NameError::InvalidCharacters { .. })
        ));
    }

    #[test]
    fn character_names_allow_spaces_and_apostrophes() {
        assert_eq!(validate_character_name("Brak O'Hare").unwrap(), "Brak O'Hare");
        assert_eq!(validate_character_name("Zoë").unwrap(), "Zoë");
        assert_eq!(validate_character_name("Admin").unwrap(), "Admin");
        assert!(matches!(
            validate_character_name("<script>"),
            Err(NameError::InvalidCharacters { .. })
        ));
        assert!(matches!(
            validate_character_name("tab\there"),
            Err(NameError::InvalidCharacters { .. })
        ));
        let long = "x".repeat(33);
        assert_eq!(validate_character_name(&long), Err(NameError::TooLong { max: 32 }));
    }

    #[test]
    fn passwords() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("longenough").is_ok());
        assert!(validate_password(&"p".repeat(129)).is_err());
    }

    #[test]
    fn notes_are_sanitized() {
        assert_eq!(sanitize_notes("   "), None);
        assert_eq!(
            sanitize_notes("line one\r\nline\u{7} two").as_deref(),
            Some("line one\nline two")
        );
        assert_eq!(sanitize_notes(&"n".repeat(5000)).unwrap().len(), MAX_NOTES_LEN);
    }

    #[test]
    fn session_ids_must_be_uuids() {
        assert!(parse_session_id("not-a-uuid").is_none());
        let id = uuid::Uuid::new_v4();
        assert_eq!(parse_session_id(&id.to_string()), Some(id));
    }
}
