//! Normalizes raw pane captures into plain text.

use std::sync::OnceLock;

use regex::Regex;

/// CSI, OSC, charset selection and any other two-byte escape
fn escape_sequence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)?|\x1b[()*+][0-~]|\x1b[@-_]|\x1b",
        )
        .expect("valid escape sequence pattern")
    })
}

/// C0 and C1 control characters other than newline and tab
fn control_char_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[\x00-\x08\x0b-\x1f\x7f\u{80}-\u{9f}]")
            .expect("valid control char pattern")
    })
}

/// tmux status line: `"hostname" 14:32 05-Mar-25`
fn status_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#""[^"]*"\s+\d{1,2}:\d{2}\s+\d{1,2}-[A-Za-z]{3}-\d{2}\s*$"#)
            .expect("valid status line pattern")
    })
}

/// Banner tmux draws over a pane kept by `remain-on-exit`
fn dead_pane_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*Pane is dead(?:\s*\(.*\))?\s*$").expect("valid dead pane pattern")
    })
}

/// Strip terminal escapes, control characters and tmux's status line,
/// then trim trailing whitespace and collapse runs of blank lines.
///
/// Idempotent: sanitizing sanitized text returns it unchanged.
pub fn sanitize(raw: &str) -> String {
    let without_escapes = escape_sequence_re().replace_all(raw, "");
    let normalized = without_escapes.replace("\r\n", "\n");
    let plain = control_char_re().replace_all(&normalized, "");

    let mut lines: Vec<&str> = Vec::new();
    let mut blank_run = 0;
    for line in plain.lines() {
        if status_line_re().is_match(line) || dead_pane_re().is_match(line) {
            continue;
        }
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 2 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        lines.push(line);
    }

    lines.join("\n").trim().to_string()
}

/// Keep at most `max_chars` characters from the end of `text`.
///
/// Returns the possibly shortened text and whether anything was dropped.
pub fn truncate_output(text: &str, max_chars: usize) -> (String, bool) {
    let count = text.chars().count();
    if count <= max_chars {
        return (text.to_string(), false);
    }
    let tail: String = text.chars().skip(count - max_chars).collect();
    (tail, true)
}
