//! Command-line surface of the `populus` binary.
use clap::{Args, Parser, Subcommand};
use populus_common::{DEFAULT_COUNTRY, ProviderKind};
use populus_render::DEFAULT_OUTPUT;
use std::path::PathBuf;

/// Find related searches for a query and their Google Trends peaks.
#[derive(Debug, Parser)]
#[command(name = "populus", version, about, subcommand_negates_reqs = true)]
pub struct Cli {
    #[command(flatten)]
    pub search: SearchArgs,

    /// YAML configuration file (defaults to ./populus.yaml when present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Duplicate logs to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Search query.
    #[arg(short, long, required = true)]
    pub query: Option<String>,

    /// Two-letter country code.
    #[arg(short, long, default_value = DEFAULT_COUNTRY)]
    pub country: String,

    /// Also render a word cloud PNG at this path.
    #[arg(short, long)]
    pub wordcloud: Option<PathBuf>,

    /// Google Trends time window, e.g. "today 5-y" or "today 12-m".
    #[arg(short, long)]
    pub timeframe: Option<String>,

    /// CSV output path.
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Comma-separated providers: google, bing, duckduckgo.
    #[arg(short, long, value_delimiter = ',')]
    pub providers: Option<Vec<ProviderKind>>,

    /// Search results requested per provider (1-10).
    #[arg(short = 'n', long)]
    pub max_results: Option<u32>,

    /// Print the search results of each provider.
    #[arg(long)]
    pub show_results: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the web dashboard.
    Serve(ServeArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,
}
