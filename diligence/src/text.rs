//! Small text helpers shared by the transcript renderers.

use std::sync::LazyLock;

use regex::Regex;

static SYSTEM_REMINDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<system-reminder>.*?</system-reminder>").expect("static regex is valid")
});

/// Remove `<system-reminder>` blocks, leaving the surrounding text untouched.
pub fn strip_reminders(text: &str) -> String {
    SYSTEM_REMINDER.replace_all(text, "").into_owned()
}

/// Strip system reminders and surrounding whitespace, for one-line summaries.
pub fn strip_noise(text: &str) -> String {
    strip_reminders(text).trim().to_string()
}

/// Shorten `text` to at most `max` characters, marking the cut with "...".
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

/// First non-empty line of `text`, trimmed.
pub fn first_line(text: &str) -> &str {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_reminders_across_lines() {
        let text = "before <system-reminder>\nhidden\n</system-reminder> after";
        assert_eq!(strip_noise(text), "before  after");
    }

    #[test]
    fn reminder_stripping_keeps_layout() {
        let text = "First paragraph.\n\n<system-reminder>x</system-reminder>";
        assert_eq!(strip_reminders(text), "First paragraph.\n\n");
        assert_eq!(strip_noise(text), "First paragraph.");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééééééééé", 6), "ééé...");
    }

    #[test]
    fn first_line_skips_blank_lines() {
        assert_eq!(first_line("\n\n  Review Q3 numbers \nmore"), "Review Q3 numbers");
        assert_eq!(first_line(""), "");
    }
}
