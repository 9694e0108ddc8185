//! One invocation of the binary: load config, then search or serve.
//!
//! Exit codes: `0` success, `2` configuration or request error, `3` every
//! provider failed, `4` CSV write failure, `5` word-cloud failure. An empty
//! word cloud is reported but keeps the run successful since the CSV is
//! already on disk.
use anyhow::Context;
use populus_aggregate::{Aggregation, Aggregator};
use populus_common::observability::init_logging;
use populus_common::{PopulusError, ProviderKind, QueryRequest, RelatedTerm, SearchResult};
use populus_config::{DEFAULT_CONFIG_FILE, PopulusConfig, PopulusConfigLoader, WordcloudSettings};
use populus_dashboard::{AppState, DashboardServer};
use populus_providers::{TrendsLookup, build_providers, build_trends};
use populus_render::{RenderError, WordCloudOptions, WordCloudRenderer, export_csv};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use crate::cli::{Cli, Command, SearchArgs, ServeArgs};

pub const EXIT_OK: u8 = 0;
pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_ALL_PROVIDERS_FAILED: u8 = 3;
pub const EXIT_CSV: u8 = 4;
pub const EXIT_WORDCLOUD: u8 = 5;
const EXIT_OTHER: u8 = 1;

/// Map an error that ended the run to its exit code.
pub fn exit_code(err: &PopulusError) -> u8 {
    match err {
        PopulusError::Config(_) | PopulusError::InvalidRequest(_) => EXIT_CONFIG,
        PopulusError::AllProvidersFailed(_) => EXIT_ALL_PROVIDERS_FAILED,
        PopulusError::Io { .. } => EXIT_CSV,
        PopulusError::Render(_) => EXIT_WORDCLOUD,
        PopulusError::Provider { .. } | PopulusError::TrendsLookup { .. } => EXIT_OTHER,
    }
}

/// Run the parsed command line, writing the listing to `out`.
pub async fn execute<W: Write>(cli: Cli, out: &mut W) -> u8 {
    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            return EXIT_CONFIG;
        }
    };
    if let Err(e) = init_logging(config.logging.to_log_config(cli.verbose)) {
        eprintln!("warning: logging disabled: {e:#}");
    }

    let result = match &cli.command {
        Some(Command::Serve(args)) => serve(&config, &cli.search, args).await,
        None => search(&config, &cli.search, out).await,
    };
    match result {
        Ok(()) => EXIT_OK,
        Err(e) => {
            tracing::error!(error = %e, "populus.run.failed");
            eprintln!("error: {e}");
            exit_code(&e)
        }
    }
}

fn load_config(explicit: Option<&Path>) -> anyhow::Result<PopulusConfig> {
    let loader = match explicit {
        Some(path) => PopulusConfigLoader::new().with_file(path),
        None => PopulusConfigLoader::new().with_optional_file(DEFAULT_CONFIG_FILE),
    };
    let shown = explicit.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
    loader
        .load()
        .with_context(|| format!("failed to load configuration from {}", shown.display()))
}

pub fn wordcloud_options(settings: &WordcloudSettings) -> WordCloudOptions {
    WordCloudOptions {
        width: settings.width,
        height: settings.height,
        font_path: settings.font_path.clone(),
        max_words: settings.max_words,
        min_font_size: settings.min_font_size,
        max_font_size: settings.max_font_size,
        theme: settings.theme,
    }
}

/// Validate credentials and wire the clients for the selected providers.
fn build_aggregator(
    config: &PopulusConfig,
    explicit: Option<&[ProviderKind]>,
) -> Result<Aggregator, PopulusError> {
    let selected = config.selected_providers(explicit);
    config.check_credentials(&selected)?;

    let trends = build_trends(config).map_err(|e| PopulusError::Config(e.to_string()))?;
    let trends: Arc<dyn TrendsLookup> = trends;
    let providers = build_providers(config, &selected, trends.clone())
        .map_err(|e| PopulusError::Config(e.to_string()))?;
    Ok(Aggregator::new(providers, trends).with_max_terms(config.trends.max_terms))
}

async fn search<W: Write>(
    config: &PopulusConfig,
    args: &SearchArgs,
    out: &mut W,
) -> Result<(), PopulusError> {
    let query = args
        .query
        .as_deref()
        .ok_or_else(|| PopulusError::InvalidRequest("--query is required".into()))?;
    let request = QueryRequest::new(query, &args.country)?
        .with_timeframe_or(args.timeframe.clone(), &config.trends.timeframe)
        .with_max_results(args.max_results.unwrap_or(config.search.max_results))
        .with_wordcloud(args.wordcloud.clone());

    let aggregator = build_aggregator(config, args.providers.as_deref())?;
    let Aggregation {
        terms,
        results,
        outcomes,
    } = aggregator.run(&request).await?;

    for outcome in outcomes.iter().filter(|o| !o.succeeded()) {
        eprintln!(
            "warning: {} skipped: {}",
            outcome.provider,
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }
    if let Err(e) = print_listing(out, &terms, args.show_results.then_some(results.as_slice())) {
        tracing::warn!(error = %e, "populus.stdout.write_failed");
    }

    export_csv(&args.output, &terms)?;

    if let Some(path) = request.wordcloud_path() {
        let renderer = WordCloudRenderer::new(wordcloud_options(&config.wordcloud));
        match renderer.render_to_path(&terms, path) {
            Ok(()) => {}
            Err(RenderError::Empty) => {
                eprintln!("warning: no related terms, word cloud not created");
            }
            Err(e) => return Err(PopulusError::Render(e.to_string())),
        }
    }
    Ok(())
}

/// `term<TAB>peak_date<TAB>score` per term, `-` for a missing date.
fn print_listing<W: Write>(
    out: &mut W,
    terms: &[RelatedTerm],
    results: Option<&[SearchResult]>,
) -> io::Result<()> {
    for term in terms {
        let date = term
            .peak_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        writeln!(out, "{}\t{}\t{}", term.term, date, term.popularity_score)?;
    }
    if let Some(results) = results {
        for kind in ProviderKind::ALL {
            let mine: Vec<&SearchResult> = results.iter().filter(|r| r.source == kind).collect();
            if mine.is_empty() {
                continue;
            }
            writeln!(out, "\n{kind} results:")?;
            for r in mine {
                writeln!(out, "  {} <{}>", r.title, r.url)?;
            }
        }
    }
    out.flush()
}

async fn serve(
    config: &PopulusConfig,
    search_args: &SearchArgs,
    args: &ServeArgs,
) -> Result<(), PopulusError> {
    let aggregator = build_aggregator(config, search_args.providers.as_deref())?;
    let renderer = WordCloudRenderer::new(wordcloud_options(&config.wordcloud));
    if !renderer.has_font() {
        tracing::warn!(target: "app", "app.wordcloud.no_font");
        eprintln!("warning: no usable font found, word cloud downloads will fail");
    }
    let state = AppState::new(
        aggregator,
        renderer,
        config.trends.timeframe.clone(),
        config.search.max_results,
    );
    let host = args.host.as_deref().unwrap_or(&config.dashboard.host);
    let port = args.port.unwrap_or(config.dashboard.port);

    let server = DashboardServer::start(state, host, port).await?;
    println!("Populus dashboard running at http://{}", server.addr());
    server.wait().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(text: &str, score: u32) -> RelatedTerm {
        RelatedTerm {
            popularity_score: score,
            ..RelatedTerm::unscored(text, ProviderKind::Google)
        }
    }

    #[test]
    fn listing_uses_dash_for_missing_dates() {
        let mut out = Vec::new();
        print_listing(&mut out, &[term("eclipse glasses", 0)], None).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "eclipse glasses\t-\t0\n");
    }

    #[test]
    fn listing_groups_results_by_provider() {
        let results = vec![SearchResult {
            title: "NASA".into(),
            url: "https://nasa.gov".into(),
            snippet: String::new(),
            source: ProviderKind::Bing,
        }];
        let mut out = Vec::new();
        print_listing(&mut out, &[term("a", 3)], Some(&results)).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Bing results:"));
        assert!(text.contains("  NASA <https://nasa.gov>"));
    }

    #[test]
    fn exit_codes_follow_error_kind() {
        assert_eq!(exit_code(&PopulusError::Config("x".into())), EXIT_CONFIG);
        assert_eq!(exit_code(&PopulusError::InvalidRequest("x".into())), EXIT_CONFIG);
        assert_eq!(exit_code(&PopulusError::AllProvidersFailed(vec![])), EXIT_ALL_PROVIDERS_FAILED);
        assert_eq!(
            exit_code(&PopulusError::io("results.csv", io::Error::other("denied"))),
            EXIT_CSV
        );
        assert_eq!(exit_code(&PopulusError::Render("x".into())), EXIT_WORDCLOUD);
    }
}
