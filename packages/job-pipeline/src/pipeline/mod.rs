//! Stage drivers.
//!
//! - `collect` - listing crawl into the raw table
//! - `enrich` - detail pages for records never enriched
//! - `dedup` - windowed dedup passes over raw and extracted
//! - `extract` - LLM extraction with dead-lettering
//! - `locate` - location refresh for extracted jobs

pub mod collect;
pub mod dedup;
pub mod enrich;
pub mod extract;
pub mod locate;
pub mod prompts;
pub mod schema;

pub use collect::{collect_listings, listing_url, CollectReport};
pub use dedup::{run_dedup, DedupReport};
pub use enrich::{enrich_details, EnrichReport};
pub use extract::{ExtractReport, ExtractionDispatcher, RecordOutcome, BLACKLISTED_ERROR};
pub use locate::{refresh_locations, LocationReport};
pub use prompts::EXTRACTION_SYSTEM_PROMPT;
pub use schema::validate_extraction;
