//! Job detail page parser.

use std::sync::LazyLock;

use scraper::{Html, Selector};

use crate::parse::text::{joined_text, trimmed_text};
use crate::types::job::LOCATION_NOT_FOUND;

static DESCRIPTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".show-more-less-html__markup").unwrap());
static LOCATION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".topcard__flavor--bullet").unwrap());
static COMPANY_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".topcard__flavor--black-link").unwrap());
static COMPANY: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".topcard__flavor").unwrap());

/// Fields read from a detail page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDetail {
    /// Visible description text, nodes joined by newlines; empty when absent
    pub description: String,

    /// Location, or [`LOCATION_NOT_FOUND`]
    pub location: String,

    /// Company name, when the top card shows one
    pub company: Option<String>,
}

impl JobDetail {
    pub fn has_description(&self) -> bool {
        !self.description.trim().is_empty()
    }
}

/// Parse a detail page. Never fails: missing nodes become empty or
/// sentinel values.
pub fn parse_detail(html: &str) -> JobDetail {
    let document = Html::parse_document(html);

    let description = document
        .select(&DESCRIPTION)
        .next()
        .map(|el| joined_text(el, "\n"))
        .unwrap_or_default();

    let location = document
        .select(&LOCATION)
        .next()
        .map(trimmed_text)
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| LOCATION_NOT_FOUND.to_string());

    let company = document
        .select(&COMPANY_LINK)
        .next()
        .or_else(|| document.select(&COMPANY).next())
        .map(trimmed_text)
        .filter(|c| !c.is_empty());

    JobDetail {
        description,
        location,
        company,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::detail_page_html;

    #[test]
    fn test_full_page() {
        let html = detail_page_html(
            "Acme",
            "Berlin, Germany",
            &["We build tools.", "You write Rust."],
        );

        let detail = parse_detail(&html);

        assert_eq!(detail.description, "We build tools.\nYou write Rust.");
        assert_eq!(detail.location, "Berlin, Germany");
        assert_eq!(detail.company.as_deref(), Some("Acme"));
        assert!(detail.has_description());
    }

    #[test]
    fn test_missing_nodes_use_fallbacks() {
        let detail = parse_detail("<html><body><h1>Sign in</h1></body></html>");

        assert_eq!(detail.description, "");
        assert_eq!(detail.location, LOCATION_NOT_FOUND);
        assert_eq!(detail.company, None);
        assert!(!detail.has_description());
    }

    #[test]
    fn test_company_falls_back_to_plain_flavor() {
        let html = r#"<html><body>
            <div class="topcard"><span class="topcard__flavor"> Initech </span></div>
        </body></html>"#;

        assert_eq!(parse_detail(html).company.as_deref(), Some("Initech"));
    }
}
