//! HTML parsers for listing and detail pages.

pub mod detail;
pub mod listing;
pub mod text;

pub use detail::{parse_detail, JobDetail};
pub use listing::{parse_job_id, parse_listing, ListingCard, ListingContext, ListingPage};
pub use text::normalize_description;
