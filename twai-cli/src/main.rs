mod browser;
mod config;
mod cookies;
mod error;
mod llm;
mod output;
mod parse;
mod scrape;

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use twai_core::{
    DEFAULT_ELO_PROMPT, DEFAULT_SCORE_PROMPT, EloOptions, Post, ScoreOptions, run_tournament, score_posts,
};

use crate::browser::{BrowserConfig, BrowserSession};
use crate::config::{LlmSection, RankSection, TwaiConfig};
use crate::cookies::FileCookieStore;
use crate::error::CliError;
use crate::llm::{LlmClient, LlmConfig};
use crate::output::{emit_rows, read_rows};
use crate::scrape::{PostSource, sort_by_views};

const DEFAULT_MODEL: &str = "llama3";
const DEFAULT_HOST: &str = "http://localhost:11434/v1";

pub fn bail(msg: impl std::fmt::Display) -> ! {
    eprintln!("Error: {msg}");
    std::process::exit(1);
}

#[derive(Parser)]
#[command(name = "twai", version, about = "Scrape posts and rank them with an LLM")]
struct Cli {
    /// Path to config file (default: ~/.config/twai/config.toml)
    #[arg(long, global = true, env = "TWAI_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging, including full LLM requests and responses
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Fetch posts from a timeline or profile into CSV
    Scrape(ScrapeArgs),
    /// Score each post from 1 to 10 with the LLM
    Score(RankArgs),
    /// Rank posts with an Elo tournament of pairwise LLM comparisons
    Elo(EloArgs),
    /// Print the version
    Version,
    /// Create a default config file at ~/.config/twai/config.toml
    Init,
}

#[derive(clap::Args)]
struct ScrapeArgs {
    /// Page to fetch: "home" or a user handle
    #[arg(long, env = "TWAI_PAGE")]
    page: Option<String>,

    /// Number of posts to fetch
    #[arg(short = 'n', long = "count", env = "TWAI_COUNT")]
    count: Option<usize>,

    /// Also fetch each author's follower count
    #[arg(long)]
    followers: bool,

    /// Output file (csv). Prints to stdout when omitted
    #[arg(long, env = "TWAI_OUTPUT")]
    output: Option<PathBuf>,

    /// File holding the session cookie string
    #[arg(long, env = "TWAI_COOKIE_FILE")]
    cookie_file: Option<PathBuf>,

    /// Browserless base URL
    #[arg(long, env = "TWAI_BROWSERLESS_URL")]
    browserless_url: Option<String>,

    /// Browserless API token
    #[arg(long, env = "TWAI_BROWSERLESS_TOKEN")]
    browserless_token: Option<String>,

    /// Minimum milliseconds between two page renders
    #[arg(long, env = "TWAI_WAIT_MS")]
    wait_ms: Option<u64>,
}

#[derive(clap::Args)]
struct RankArgs {
    /// Number of concurrent LLM requests
    #[arg(long, env = "TWAI_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Input file (generated by the scrape command)
    #[arg(long, env = "TWAI_INPUT")]
    input: PathBuf,

    /// Output file (csv). Prints to stdout when omitted
    #[arg(long, env = "TWAI_OUTPUT")]
    output: Option<PathBuf>,

    /// Instruction sent to the LLM
    #[arg(long, env = "TWAI_PROMPT")]
    prompt: Option<String>,

    /// AI model (llama3, gpt-3.5-turbo, etc)
    #[arg(long, env = "TWAI_MODEL")]
    model: Option<String>,

    /// AI endpoint host, including the API version path
    #[arg(long, env = "TWAI_HOST")]
    host: Option<String>,

    /// Authorization token (required for OpenAI)
    #[arg(long, env = "TWAI_TOKEN")]
    token: Option<String>,
}

#[derive(clap::Args)]
struct EloArgs {
    #[command(flatten)]
    rank: RankArgs,

    /// Number of passes over all posts
    #[arg(long, env = "TWAI_ITERATIONS")]
    iterations: Option<usize>,

    /// Seed for opponent selection, for reproducible pairings
    #[arg(long, env = "TWAI_SEED")]
    seed: Option<u64>,
}

fn init_tracing(debug: bool) {
    let default = if debug { "twai=debug,twai_core=debug" } else { "twai=info,twai_core=info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .init();
}

/// Cancel `token` on Ctrl-C. In-flight work finishes; nothing new starts.
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, waiting for in-flight requests");
            token.cancel();
        }
    });
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let config_path = match cli.config.clone() {
        Some(path) => path,
        None => config::config_path().unwrap_or_else(|e| bail(e)),
    };

    let result = match cli.command {
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Init => config::create_default_config(&config_path)
            .map(|()| {
                println!("Created config at {}", config_path.display());
                println!("Edit it to set your default model, host, etc.");
            })
            .map_err(CliError::from),
        command => {
            let cfg = config::load_config(&config_path).unwrap_or_else(|e| bail(e));
            let cancel = CancellationToken::new();
            cancel_on_interrupt(cancel.clone());

            info!("running");
            let result = match command {
                Commands::Scrape(args) => run_scrape(args, &cfg, &cancel).await,
                Commands::Score(args) => run_score(args, &cfg, cli.debug, &cancel).await,
                Commands::Elo(args) => run_elo(args, &cfg, cli.debug, &cancel).await,
                Commands::Version | Commands::Init => Ok(()),
            };
            info!("finished");
            result
        }
    };

    if let Err(e) = result {
        bail(e);
    }
}

/// Resolve LLM settings: CLI/env first, then the config section, then defaults.
fn llm_config(args: &RankArgs, llm: LlmSection, debug: bool) -> LlmConfig {
    LlmConfig {
        host: args.host.clone().or(llm.host).unwrap_or_else(|| DEFAULT_HOST.to_string()),
        model: args.model.clone().or(llm.model).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        token: args.token.clone().or(llm.token),
        debug,
    }
}

/// Zero is passed through; the pool runs it as 1.
fn concurrency(args: &RankArgs, section: &RankSection) -> usize {
    args.concurrency.or(section.concurrency).unwrap_or(1)
}

async fn run_scrape(args: ScrapeArgs, cfg: &TwaiConfig, cancel: &CancellationToken) -> Result<(), CliError> {
    let section = &cfg.scrape;
    let page = args.page.or_else(|| section.page.clone()).unwrap_or_else(|| "home".to_string());
    let count = args.count.or(section.count).unwrap_or(50);
    let cookie_file = args
        .cookie_file
        .or_else(|| section.cookie_file.clone().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("cookie.txt"));

    let defaults = BrowserConfig::default();
    let browser_config = BrowserConfig {
        base_url: args
            .browserless_url
            .or_else(|| section.browserless_url.clone())
            .unwrap_or(defaults.base_url),
        token: args.browserless_token.or_else(|| section.browserless_token.clone()),
        wait: args
            .wait_ms
            .or(section.wait_ms)
            .map(Duration::from_millis)
            .unwrap_or(defaults.wait),
        scroll_wait: defaults.scroll_wait,
        timeout: defaults.timeout,
    };

    let session = BrowserSession::start(&browser_config, Arc::new(FileCookieStore::new(cookie_file))).await?;

    let fetched = tokio::select! {
        _ = cancel.cancelled() => {
            warn!("scrape cancelled");
            Ok(Vec::new())
        }
        posts = session.fetch_posts(&page, count, args.followers) => posts,
    };
    let stopped = session.stop().await;
    let mut posts = fetched?;
    stopped?;

    sort_by_views(&mut posts);
    emit_rows(&posts, args.output.as_deref())
}

async fn run_score(args: RankArgs, cfg: &TwaiConfig, debug: bool, cancel: &CancellationToken) -> Result<(), CliError> {
    let section = &cfg.score;
    let posts: Vec<Post> = read_rows(&args.input)?;

    let options = ScoreOptions {
        concurrency: concurrency(&args, section),
        prompt: args
            .prompt
            .clone()
            .or_else(|| section.prompt.clone())
            .unwrap_or_else(|| DEFAULT_SCORE_PROMPT.to_string()),
    };
    let client = LlmClient::new(&llm_config(&args, cfg.llm_for(section), debug), cancel.clone());

    let records = score_posts(Arc::new(client), posts, &options, cancel).await?;
    emit_rows(&records, args.output.as_deref())
}

async fn run_elo(args: EloArgs, cfg: &TwaiConfig, debug: bool, cancel: &CancellationToken) -> Result<(), CliError> {
    let section = &cfg.elo;
    let rank = &args.rank;
    let posts: Vec<Post> = read_rows(&rank.input)?;

    let options = EloOptions {
        concurrency: concurrency(rank, section),
        iterations: args.iterations.or(section.iterations).unwrap_or(10),
        prompt: rank
            .prompt
            .clone()
            .or_else(|| section.prompt.clone())
            .unwrap_or_else(|| DEFAULT_ELO_PROMPT.to_string()),
        seed: args.seed,
    };
    let client = LlmClient::new(&llm_config(rank, cfg.llm_for(section), debug), cancel.clone());

    let records = run_tournament(Arc::new(client), posts, &options, cancel).await?;
    emit_rows(&records, rank.output.as_deref())
}
