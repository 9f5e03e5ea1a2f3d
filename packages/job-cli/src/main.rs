//! Command-line entry points for the job pipeline.
//!
//! Every stage reads and writes the SQLite database named by `DATABASE_URL`.

mod config;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use job_pipeline::{
    build_report, collect_listings, enrich_details, refresh_locations, run_dedup, BlacklistStore,
    CrawlConfig, EnrichConfig, ExtractConfig, ExtractedJobStore, ExtractionDispatcher,
    HttpTransport, JobFilter, ListField, OpenAiLlm, RateLimitedFetcher, RetryPolicy, RunSnapshot,
    SqliteStore,
};
use openai_client::OpenAIClient;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "jobs")]
#[command(about = "Scrape job postings and extract structured fields")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl listing pages into the raw table
    Collect(CollectArgs),

    /// Fetch detail pages for records never enriched
    Enrich(EnrichArgs),

    /// Deduplicate the raw and extracted tables
    Dedup,

    /// Extract structured fields with the LLM
    Extract(ExtractArgs),

    /// Collect, enrich, dedup and extract in sequence
    Run {
        #[command(flatten)]
        collect: CollectArgs,
        #[command(flatten)]
        enrich: EnrichArgs,
        #[command(flatten)]
        extract: ExtractArgs,
    },

    /// Refetch locations of extracted jobs that have none
    Locate(LocateArgs),

    /// Manage the company blacklist
    Blacklist {
        #[command(subcommand)]
        action: BlacklistAction,
    },

    /// Term frequencies over extracted jobs
    Report(ReportArgs),
}

#[derive(Args)]
struct CollectArgs {
    /// Search keyword (repeatable)
    #[arg(short, long = "keyword", required = true)]
    keywords: Vec<String>,

    /// Search location (repeatable)
    #[arg(short, long = "location", required = true)]
    locations: Vec<String>,

    /// Geographic id passed with every search
    #[arg(long)]
    geo_id: Option<String>,

    /// Last result offset to request
    #[arg(long, default_value_t = 990)]
    max_offset: u32,

    /// Pause between listing pages
    #[arg(long, default_value_t = 1200)]
    page_delay_ms: u64,
}

#[derive(Args)]
struct EnrichArgs {
    /// Detail fetches in flight
    #[arg(long, default_value_t = 2)]
    concurrency: usize,

    /// Records per merge write
    #[arg(long, default_value_t = 50)]
    enrich_batch_size: usize,

    /// Enrich at most this many records
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(Args)]
struct ExtractArgs {
    /// Records per extraction batch
    #[arg(long, default_value_t = 100)]
    extract_batch_size: usize,

    /// Stop after this many batches
    #[arg(long)]
    max_batches: Option<usize>,
}

#[derive(Args)]
struct LocateArgs {
    /// Only these job ids (repeatable); default is every unresolved job
    #[arg(long = "job-id")]
    job_ids: Vec<i64>,

    /// Detail fetches in flight
    #[arg(long, default_value_t = 2)]
    concurrency: usize,

    /// Check at most this many jobs
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(Subcommand)]
enum BlacklistAction {
    /// Add companies
    Add {
        #[arg(required = true)]
        companies: Vec<String>,
    },

    /// Remove companies
    Remove {
        #[arg(required = true)]
        companies: Vec<String>,
    },

    /// List blacklisted companies
    List,
}

#[derive(Args)]
struct ReportArgs {
    /// List field to count
    #[arg(long, value_enum, default_value_t = ReportField::TechStack)]
    field: ReportField,

    /// Only jobs crawled for this keyword (repeatable)
    #[arg(short, long = "keyword")]
    keywords: Vec<String>,

    /// Only jobs from this company (repeatable)
    #[arg(short, long = "company")]
    companies: Vec<String>,

    /// Number of terms to show
    #[arg(long, default_value_t = 10)]
    top: usize,
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportField {
    Industries,
    SoftSkills,
    HardSkills,
    TechStack,
    ProgrammingLanguages,
    Benefits,
    EducationFields,
}

impl From<ReportField> for ListField {
    fn from(field: ReportField) -> Self {
        match field {
            ReportField::Industries => ListField::Industries,
            ReportField::SoftSkills => ListField::SoftSkills,
            ReportField::HardSkills => ListField::HardSkills,
            ReportField::TechStack => ListField::TechStack,
            ReportField::ProgrammingLanguages => ListField::ProgrammingLanguages,
            ReportField::Benefits => ListField::Benefits,
            ReportField::EducationFields => ListField::EducationFields,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,job_pipeline=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let store = SqliteStore::new(&config.database_url)
        .await
        .with_context(|| format!("Failed to open database at {}", config.database_url))?;

    match cli.command {
        Commands::Collect(args) => {
            let snapshot = load_snapshot(&store).await?;
            cmd_collect(&config, &store, &snapshot, &args).await
        }
        Commands::Enrich(args) => {
            let snapshot = load_snapshot(&store).await?;
            cmd_enrich(&config, &store, &snapshot, &args).await
        }
        Commands::Dedup => cmd_dedup(&store).await,
        Commands::Extract(args) => {
            let llm = build_llm(&config)?;
            let snapshot = load_snapshot(&store).await?;
            cmd_extract(&llm, &store, &snapshot, &args).await
        }
        Commands::Run {
            collect,
            enrich,
            extract,
        } => {
            // Fail before crawling if the LLM cannot be reached later.
            let llm = build_llm(&config)?;
            let snapshot = load_snapshot(&store).await?;
            info!(stage = "collect", "Starting stage");
            cmd_collect(&config, &store, &snapshot, &collect).await?;
            info!(stage = "enrich", "Starting stage");
            cmd_enrich(&config, &store, &snapshot, &enrich).await?;
            info!(stage = "dedup", "Starting stage");
            cmd_dedup(&store).await?;
            info!(stage = "extract", "Starting stage");
            cmd_extract(&llm, &store, &snapshot, &extract).await
        }
        Commands::Locate(args) => cmd_locate(&config, &store, &args).await,
        Commands::Blacklist { action } => cmd_blacklist(&store, action).await,
        Commands::Report(args) => cmd_report(&store, &args).await,
    }
}

fn build_fetcher(config: &Config) -> Result<RateLimitedFetcher<HttpTransport>> {
    let policy = RetryPolicy::new();
    let transport = HttpTransport::new(policy.timeout).context("Failed to build HTTP client")?;
    let fetcher = RateLimitedFetcher::new(transport, policy);
    Ok(match config.requests_per_second {
        Some(rps) => fetcher.with_rate_limit(rps),
        None => fetcher,
    })
}

fn build_llm(config: &Config) -> Result<OpenAiLlm> {
    let mut client = OpenAIClient::new(config.require_openai_key()?)
        .with_timeout(config.openai_timeout)
        .context("Failed to build OpenAI client")?;
    if let Some(url) = &config.openai_base_url {
        client = client.with_base_url(url.as_str());
    }
    Ok(OpenAiLlm::new(client).with_model(config.openai_model.as_str()))
}

async fn load_snapshot(store: &SqliteStore) -> Result<RunSnapshot> {
    RunSnapshot::load(store)
        .await
        .context("Failed to load known ids and blacklist")
}

async fn cmd_collect(
    config: &Config,
    store: &SqliteStore,
    snapshot: &RunSnapshot,
    args: &CollectArgs,
) -> Result<()> {
    let mut crawl = CrawlConfig::new(args.keywords.iter(), args.locations.iter())
        .with_max_offset(args.max_offset)
        .with_page_delay(Duration::from_millis(args.page_delay_ms));
    if let Some(geo_id) = &args.geo_id {
        crawl = crawl.with_geo_id(geo_id.as_str());
    }

    let report = collect_listings(&crawl, &build_fetcher(config)?, store, snapshot)
        .await
        .context("Collect failed")?;
    println!(
        "Collected {} new jobs from {} pages ({} skipped, {} failed pages)",
        report.records_written, report.pages, report.skipped, report.failed_pages
    );
    Ok(())
}

async fn cmd_enrich(
    config: &Config,
    store: &SqliteStore,
    snapshot: &RunSnapshot,
    args: &EnrichArgs,
) -> Result<()> {
    let mut enrich = EnrichConfig::new()
        .with_concurrency(args.concurrency)
        .with_batch_size(args.enrich_batch_size);
    if let Some(limit) = args.limit {
        enrich = enrich.with_limit(limit);
    }

    let report = enrich_details(&enrich, &build_fetcher(config)?, store, snapshot)
        .await
        .context("Enrich failed")?;
    println!(
        "Enriched {} of {} jobs ({} not found, {} blacklisted, {} left for next run)",
        report.enriched, report.pending, report.not_found, report.blacklisted, report.failed
    );
    Ok(())
}

async fn cmd_dedup(store: &SqliteStore) -> Result<()> {
    let report = run_dedup(store).await.context("Dedup failed")?;
    println!(
        "Removed {} duplicate rows; {} raw and {} extracted remain",
        report.removed(),
        report.raw_remaining,
        report.extracted_remaining
    );
    Ok(())
}

async fn cmd_extract(
    llm: &OpenAiLlm,
    store: &SqliteStore,
    snapshot: &RunSnapshot,
    args: &ExtractArgs,
) -> Result<()> {
    let mut extract = ExtractConfig::new().with_batch_size(args.extract_batch_size);
    if let Some(max) = args.max_batches {
        extract = extract.with_max_batches(max);
    }

    let report = ExtractionDispatcher::new(store, llm, snapshot)
        .with_config(extract)
        .run()
        .await
        .context("Extract failed")?;
    println!(
        "Extracted {} jobs in {} batches ({} moved to bad jobs)",
        report.extracted, report.batches, report.dead_lettered
    );
    Ok(())
}

async fn cmd_locate(config: &Config, store: &SqliteStore, args: &LocateArgs) -> Result<()> {
    let mut enrich = EnrichConfig::new().with_concurrency(args.concurrency);
    if let Some(limit) = args.limit {
        enrich = enrich.with_limit(limit);
    }

    let report = refresh_locations(&enrich, &build_fetcher(config)?, store, &args.job_ids)
        .await
        .context("Location refresh failed")?;
    println!(
        "Updated {} of {} locations ({} unchanged, {} not found, {} failed)",
        report.updated, report.checked, report.unchanged, report.not_found, report.failed
    );
    Ok(())
}

async fn cmd_blacklist(store: &SqliteStore, action: BlacklistAction) -> Result<()> {
    match action {
        BlacklistAction::Add { companies } => {
            for company in companies {
                if store.add_to_blacklist(&company).await? {
                    println!("Added {}", company.trim());
                } else {
                    println!("Already blacklisted: {}", company.trim());
                }
            }
        }
        BlacklistAction::Remove { companies } => {
            for company in companies {
                if store.remove_from_blacklist(&company).await? {
                    println!("Removed {}", company.trim());
                } else {
                    println!("Not blacklisted: {}", company.trim());
                }
            }
        }
        BlacklistAction::List => {
            let blacklist = store.blacklist().await?;
            for company in blacklist.sorted() {
                println!("{company}");
            }
            println!("{} companies", blacklist.len());
        }
    }
    Ok(())
}

async fn cmd_report(store: &SqliteStore, args: &ReportArgs) -> Result<()> {
    let jobs = store
        .extracted_jobs()
        .await
        .context("Failed to read extracted jobs")?;
    let filter = JobFilter {
        keywords: args.keywords.clone(),
        companies: args.companies.clone(),
    };

    let report = build_report(&jobs, &filter, args.field.into(), args.top);
    if report.is_empty() {
        println!("No data for the selected filters.");
        return Ok(());
    }

    println!("{} jobs", report.jobs);
    for (term, count) in &report.terms {
        println!("{count:>6}  {term}");
    }
    if let Some((min, max)) = report.mean_salary {
        println!("Mean salary: {min:.0} - {max:.0}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_takes_every_stage_argument() {
        let cli = Cli::try_parse_from([
            "jobs",
            "run",
            "-k",
            "data engineer",
            "-l",
            "United States",
            "--concurrency",
            "4",
            "--max-batches",
            "2",
        ])
        .unwrap();

        let Commands::Run {
            collect,
            enrich,
            extract,
        } = cli.command
        else {
            panic!("expected run");
        };
        assert_eq!(collect.keywords, vec!["data engineer"]);
        assert_eq!(collect.max_offset, 990);
        assert_eq!(enrich.concurrency, 4);
        assert_eq!(extract.max_batches, Some(2));
    }

    #[test]
    fn test_locate_job_ids() {
        let cli = Cli::try_parse_from(["jobs", "locate", "--job-id", "7", "--job-id", "8"]).unwrap();

        let Commands::Locate(args) = cli.command else {
            panic!("expected locate");
        };
        assert_eq!(args.job_ids, vec![7, 8]);
        assert_eq!(args.limit, None);
    }
}
