//! Search-result page parser.
//!
//! A page is parsed eagerly into owned cards, so the HTML tree is dropped
//! before any `.await`. Records are then yielded lazily: blacklisted
//! companies and ids already known to the store are skipped, and cards that
//! could not be parsed are yielded as [`ParseError`]s for the caller to log.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::error::ParseError;
use crate::parse::text::trimmed_text;
use crate::types::job::JobRecord;
use crate::types::snapshot::RunSnapshot;

const CARD: &str = ".job-search-card";
const TITLE: &str = ".base-search-card__title";
const COMPANY: &str = ".base-search-card__subtitle";
const ENTITY_URN: &str = "data-entity-urn";

static CARD_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse(CARD).unwrap());
static TITLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse(TITLE).unwrap());
static COMPANY_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(COMPANY).unwrap());
static RE_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// Search context stamped onto every record from a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingContext {
    pub keyword: String,
    pub location: String,
    pub task_id: String,
}

impl ListingContext {
    pub fn new(
        keyword: impl Into<String>,
        location: impl Into<String>,
        task_id: impl Into<String>,
    ) -> Self {
        Self {
            keyword: keyword.into(),
            location: location.into(),
            task_id: task_id.into(),
        }
    }
}

/// One result card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingCard {
    pub job_id: i64,
    pub title: String,
    pub company: String,
}

/// All cards of one result page, in page order.
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    cards: Vec<Result<ListingCard, ParseError>>,
}

impl ListingPage {
    pub fn parse(html: &str) -> Self {
        let document = Html::parse_document(html);
        let cards = document.select(&CARD_SELECTOR).map(parse_card).collect();
        Self { cards }
    }

    /// Number of cards on the page, including malformed ones.
    ///
    /// Zero means the crawl has run past the last page.
    pub fn card_count(&self) -> usize {
        self.cards.len()
    }

    pub fn cards(&self) -> &[Result<ListingCard, ParseError>] {
        &self.cards
    }

    /// New records from this page, as seen by `snapshot`.
    pub fn records<'a>(
        &'a self,
        ctx: &'a ListingContext,
        snapshot: &'a RunSnapshot,
    ) -> impl Iterator<Item = Result<JobRecord, ParseError>> + 'a {
        self.cards
            .iter()
            .cloned()
            .filter_map(move |card| admit(card, ctx, snapshot))
    }

    /// Owning variant of [`ListingPage::records`].
    pub fn into_records<'a>(
        self,
        ctx: &'a ListingContext,
        snapshot: &'a RunSnapshot,
    ) -> impl Iterator<Item = Result<JobRecord, ParseError>> + 'a {
        self.cards
            .into_iter()
            .filter_map(move |card| admit(card, ctx, snapshot))
    }
}

/// Parse one listing page and yield the records worth ingesting.
pub fn parse_listing<'a>(
    html: &str,
    ctx: &'a ListingContext,
    snapshot: &'a RunSnapshot,
) -> impl Iterator<Item = Result<JobRecord, ParseError>> + 'a {
    ListingPage::parse(html).into_records(ctx, snapshot)
}

/// Numeric id from an entity URN such as `urn:li:jobPosting:3812345678`.
///
/// The first run of digits is the id.
pub fn parse_job_id(urn: &str) -> Result<i64, ParseError> {
    RE_DIGITS
        .find(urn)
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .ok_or_else(|| ParseError::MalformedId {
            value: urn.to_string(),
        })
}

fn admit(
    card: Result<ListingCard, ParseError>,
    ctx: &ListingContext,
    snapshot: &RunSnapshot,
) -> Option<Result<JobRecord, ParseError>> {
    let card = match card {
        Ok(card) => card,
        Err(e) => return Some(Err(e)),
    };

    if snapshot.is_blacklisted(&card.company) {
        debug!(job_id = card.job_id, company = %card.company, "Skipping blacklisted company");
        return None;
    }
    if snapshot.is_known(card.job_id) {
        debug!(job_id = card.job_id, "Skipping known job");
        return None;
    }

    Some(Ok(JobRecord::new(card.job_id, card.title, card.company)
        .with_task(ctx.task_id.as_str())
        .with_search(ctx.keyword.as_str(), ctx.location.as_str())))
}

fn parse_card(card: ElementRef<'_>) -> Result<ListingCard, ParseError> {
    let urn = card
        .value()
        .attr(ENTITY_URN)
        .ok_or_else(|| ParseError::MissingAttribute {
            attribute: ENTITY_URN.to_string(),
        })?;
    let job_id = parse_job_id(urn)?;

    let title = card
        .select(&TITLE_SELECTOR)
        .next()
        .map(trimmed_text)
        .ok_or_else(|| ParseError::MissingNode {
            selector: TITLE.to_string(),
        })?;
    let company = card
        .select(&COMPANY_SELECTOR)
        .next()
        .map(trimmed_text)
        .ok_or_else(|| ParseError::MissingNode {
            selector: COMPANY.to_string(),
        })?;

    Ok(ListingCard {
        job_id,
        title,
        company,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{listing_card_html, listing_page_html};
    use crate::types::snapshot::Blacklist;
    use std::collections::HashSet;

    fn ctx() -> ListingContext {
        ListingContext::new("rust engineer", "Berlin", "task-1")
    }

    #[test]
    fn test_parse_job_id() {
        assert_eq!(parse_job_id("urn:li:jobPosting:3812345678"), Ok(3812345678));
        assert!(matches!(
            parse_job_id("urn:li:jobPosting:"),
            Err(ParseError::MalformedId { .. })
        ));
    }

    #[test]
    fn test_blacklisted_and_known_are_skipped() {
        let html = listing_page_html(&[
            listing_card_html(101, "Rust Engineer", "Acme"),
            listing_card_html(102, "Java Engineer", "SynergisticIT"),
            listing_card_html(103, "Go Engineer", "Initech"),
        ]);
        let snapshot = RunSnapshot::new(
            HashSet::from([103]),
            Blacklist::new(["synergisticit"]),
        );
        let ctx = ctx();

        let records: Vec<JobRecord> = parse_listing(&html, &ctx, &snapshot)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.job_id, 101);
        assert_eq!(record.title, "Rust Engineer");
        assert_eq!(record.company, "Acme");
        assert_eq!(record.keyword, "rust engineer");
        assert_eq!(record.location, "Berlin");
        assert_eq!(record.task_id, "task-1");
        assert!(record.description.is_none());
    }

    #[test]
    fn test_blacklist_ignores_input_casing() {
        let html = listing_page_html(&[
            listing_card_html(1, "A", "SynergisticIT"),
            listing_card_html(2, "B", "synergisticit"),
            listing_card_html(3, "C", "SYNERGISTICIT"),
            listing_card_html(4, "D", "  SynergisticIT "),
        ]);
        let snapshot = RunSnapshot::new(HashSet::new(), Blacklist::new(["SynergisticIT"]));
        let ctx = ctx();

        assert_eq!(parse_listing(&html, &ctx, &snapshot).count(), 0);
    }

    #[test]
    fn test_malformed_card_does_not_abort_page() {
        let html = listing_page_html(&[
            r#"<li><div class="base-card job-search-card"><h3 class="base-search-card__title">No urn</h3></div></li>"#.to_string(),
            r#"<li><div class="base-card job-search-card" data-entity-urn="urn:li:jobPosting:abc"></div></li>"#.to_string(),
            listing_card_html(7, "Fine", "Globex"),
        ]);
        let snapshot = RunSnapshot::default();
        let ctx = ctx();

        let results: Vec<_> = parse_listing(&html, &ctx, &snapshot).collect();

        assert_eq!(results.len(), 3);
        assert!(matches!(results[0], Err(ParseError::MissingAttribute { .. })));
        assert!(matches!(results[1], Err(ParseError::MalformedId { .. })));
        assert_eq!(results[2].as_ref().unwrap().job_id, 7);
    }

    #[test]
    fn test_empty_page_has_no_cards() {
        let page = ListingPage::parse("<html><body></body></html>");
        assert_eq!(page.card_count(), 0);
        assert_eq!(page.records(&ctx(), &RunSnapshot::default()).count(), 0);
    }
}
