//! Helpers for putting user-supplied text (commands, card names, rendered
//! replies) into log lines without breaking them across lines.

use std::fmt::Write;

/// Characters kept before a logged string is cut with `…`.
pub const LOG_PREVIEW_CHARS: usize = 300;

/// Escape `s` for a single log line, keeping at most [`LOG_PREVIEW_CHARS`] characters.
pub fn escape_log(s: &str) -> String {
    escape_log_limited(s, LOG_PREVIEW_CHARS)
}

/// Like [`escape_log`] with an explicit character limit.
///
/// Newline, carriage return, tab and backslash get their usual escapes; any
/// other control character becomes `\xNN`.
pub fn escape_log_limited(s: &str, limit: usize) -> String {
    let mut out = String::with_capacity(s.len().min(limit) + 4);
    for (i, ch) in s.chars().enumerate() {
        if i == limit {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_line_reply_stays_on_one_line() {
        assert_eq!(escape_log("Alice rolls\n1d20 = 7\t(ok)"), "Alice rolls\\n1d20 = 7\\t(ok)");
        assert_eq!(escape_log("a\\b\u{7}"), "a\\\\b\\x07");
    }

    #[test]
    fn long_input_is_cut() {
        assert_eq!(escape_log_limited("abcdef", 3), "abc…");
        assert_eq!(escape_log_limited("abc", 3), "abc");
        assert_eq!(escape_log(&"x".repeat(400)).chars().count(), LOG_PREVIEW_CHARS + 1);
    }
}
