//! Helpers that keep user-supplied text from breaking single-line log records.

use std::fmt::Write;

const MAX_PREVIEW: usize = 120;

/// Escape a user-supplied value (character names, usernames, form input) so
/// it stays on one log line. Newlines, tabs and other control characters are
/// escaped; anything longer than the preview limit is cut with an ellipsis.
pub fn escape_log(s: &str) -> String {
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Short form of a session id for logs; the full id is a bearer credential.
pub fn session_tag(id: &uuid::Uuid) -> String {
    let text = id.simple().to_string();
    format!("{}…", &text[..8])
}
