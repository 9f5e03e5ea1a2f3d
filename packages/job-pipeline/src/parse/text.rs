//! Text helpers shared by the parsers.

use std::sync::LazyLock;

use regex::Regex;
use scraper::ElementRef;

static RE_LINE_BREAKS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\n\t\r]+").unwrap());

/// Collapse newlines, tabs and carriage returns into single spaces.
///
/// Applied to descriptions before storage and before any LLM call.
pub fn normalize_description(text: &str) -> String {
    RE_LINE_BREAKS.replace_all(text, " ").trim().to_string()
}

/// Visible text of an element: each text node trimmed, empty ones
/// dropped, the rest joined by `separator`.
pub fn joined_text(element: ElementRef<'_>, separator: &str) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

/// Whitespace-trimmed text content of an element.
pub fn trimmed_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    #[test]
    fn test_normalize_collapses_breaks() {
        assert_eq!(
            normalize_description("Build things.\n\nShip them.\r\n\tRepeat."),
            "Build things. Ship them. Repeat."
        );
        assert_eq!(normalize_description("\n  \n"), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_description("a\nb\tc\rd");
        assert_eq!(normalize_description(&once), once);
    }

    #[test]
    fn test_joined_text_skips_blank_nodes() {
        let html = Html::parse_fragment("<div><p> One </p>\n  <p>Two</p><ul><li>Three</li></ul></div>");
        let selector = Selector::parse("div").unwrap();
        let div = html.select(&selector).next().unwrap();
        assert_eq!(joined_text(div, "\n"), "One\nTwo\nThree");
    }
}
