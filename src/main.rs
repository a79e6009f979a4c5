//! StatusQuest - Main Application
//!
//! Browse, search and try out HTTP status codes from the terminal or over HTTP.

use status_quest::{
    activity::create_shared_activity,
    catalog::{load_shared_catalog, SharedCatalog},
    config::{AppConfig, SharedConfig},
    search::{search, SearchOutcome, Segment},
    server::start_server,
    simulator::{create_shared_cards, MockSimulator},
    tui::BrowserApp,
    verify::ReplayVerifier,
    view::{marked, render_json_lines, CardView},
};
use clap::{Parser, Subcommand};
use std::time::Duration;
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Same names the config layer reads for server.host and server.port
const HOST_ENV: &str = "STATUS_QUEST_SERVER__HOST";
const PORT_ENV: &str = "STATUS_QUEST_SERVER__PORT";

/// Log file used while the terminal browser is open
const BROWSE_LOG_FILE: &str = "status-quest.log";

/// StatusQuest - an interactive HTTP status code reference
#[derive(Parser)]
#[command(name = "status-quest")]
#[command(about = "Browse, search and try out HTTP status codes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Server host
    #[arg(long, env = HOST_ENV)]
    host: Option<String>,

    /// Server port
    #[arg(short, long, env = PORT_ENV)]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Server,
    /// Browse the catalog in the terminal
    Browse,
    /// Print the cards matching a query
    Search {
        /// Case-insensitive text to look for
        query: String,
    },
    /// Show one status code and try its mock request
    Show {
        /// Status code, e.g. 404
        code: String,
        /// Skip the simulated request
        #[arg(long)]
        no_try: bool,
    },
    /// Replay every mock against a running server
    Verify {
        /// Server base URL
        #[arg(short, long)]
        target: Option<String>,
    },
    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; the browser owns the terminal, so its logs go to a file
    let log_level = if cli.verbose { "debug" } else { "info" };
    let browsing = matches!(cli.command, Some(Commands::Browse));
    let writer = if browsing {
        file_log_writer(std::path::Path::new(BROWSE_LOG_FILE))
    } else {
        BoxMakeWriter::new(std::io::stderr)
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("status_quest={}", log_level).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(!browsing),
        )
        .init();

    // Load configuration
    let mut config = if std::path::Path::new(&cli.config).exists() {
        AppConfig::load_from_file(&cli.config).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to load config file, using defaults");
            AppConfig::default()
        })
    } else {
        AppConfig::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to load config, using defaults");
            AppConfig::default()
        })
    };

    // Override with CLI args
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let catalog = load_shared_catalog(config.catalog.path.as_deref())?;
    let shared_config = SharedConfig::new(config.clone());

    let activity = create_shared_activity(config.activity.max_entries);
    let cards = create_shared_cards(catalog.clone(), shared_config.clone(), activity.clone());

    match cli.command {
        Some(Commands::Server) | None => {
            start_server(catalog, shared_config, activity, cards).await?;
        }
        Some(Commands::Browse) => {
            // Start server in background
            let server_catalog = catalog.clone();
            let server_config = shared_config.clone();
            tokio::spawn(async move {
                if let Err(e) = start_server(server_catalog, server_config, activity, cards).await {
                    tracing::error!(error = %e, "Server error");
                }
            });

            let mut app = BrowserApp::new(catalog, shared_config);
            app.run().await?;
        }
        Some(Commands::Search { query }) => print_search(&catalog, &query),
        Some(Commands::Show { code, no_try }) => {
            let entry = catalog.lookup_segment(&code)?;
            print_card(&CardView::render(entry, ""));

            if !no_try {
                let simulator = MockSimulator::new(entry, config.simulator.delay_range());
                let delay = simulator.trigger();
                println!("\nLoading response... ({} ms)", delay.as_millis());
                let response = simulator.wait_for_response().await?;
                println!("Response {}:", entry.mock.status);
                for line in render_json_lines(&response, "") {
                    println!("  {}", marked(&line, "", ""));
                }
            }
        }
        Some(Commands::Verify { target }) => {
            let base_url = target
                .or_else(|| config.verify.target_url.clone())
                .unwrap_or_else(|| config.server_url());
            let verifier = ReplayVerifier::new(Duration::from_secs(config.verify.timeout_secs))?;
            let report = verifier.run(&catalog, &base_url).await?;

            println!("\n=== Replay Verification ===");
            for result in report.results.iter().filter(|r| !r.passed) {
                println!(
                    "FAIL {} {} {} -> {}{}",
                    result.code,
                    result.method,
                    result.url,
                    result
                        .actual_status
                        .map_or("-".to_string(), |s| s.to_string()),
                    result
                        .error
                        .as_deref()
                        .map_or(String::new(), |e| format!(" ({})", e)),
                );
            }
            println!("Total: {}", report.total);
            println!("Passed: {}", report.passed);
            println!("Failed: {}", report.failed);
            println!("Total duration: {:.2} ms", report.total_duration_ms);

            if !report.all_passed() {
                anyhow::bail!("{} mock(s) did not replay as cataloged", report.failed);
            }
        }
        Some(Commands::Config) => {
            // Show current configuration
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

/// Append to `path`, or drop logs if it cannot be opened
fn file_log_writer(path: &std::path::Path) -> BoxMakeWriter {
    match std::fs::OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => BoxMakeWriter::new(Mutex::new(file)),
        Err(_) => BoxMakeWriter::new(std::io::sink),
    }
}

fn print_search(catalog: &SharedCatalog, query: &str) {
    match search(catalog, query) {
        SearchOutcome::Grouped { groups } => {
            for group in groups {
                println!("\n{} {}", group.series, group.title);
                for entry in &group.codes {
                    println!("  {} {} {}", entry.code, entry.emoji, entry.title);
                }
            }
        }
        SearchOutcome::Matches { query, entries } => {
            if entries.is_empty() {
                println!("No status codes match \"{}\"", query);
                return;
            }
            for entry in entries {
                print_card(&CardView::render(entry, &query));
                println!();
            }
        }
    }
}

/// Matches wrapped in square brackets
fn bracketed(segments: &[Segment]) -> String {
    marked(segments, "[", "]")
}

fn print_card(card: &CardView) {
    println!("{} {}", card.emoji, bracketed(&card.heading));
    println!("{}", bracketed(&card.category_label));
    println!("{}", bracketed(&card.description));
    println!("Tip: {}", bracketed(&card.tip));
    println!("Example: {}", bracketed(&card.example));
    println!("{}", card.request_line);
    for (name, value) in &card.headers {
        println!("{}: {}", name, value);
    }
    if let Some(body) = &card.body_lines {
        for line in body {
            println!("{}", bracketed(line));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write;
    use tracing_subscriber::fmt::MakeWriter;

    fn env_name(id: &str) -> Option<String> {
        Cli::command()
            .get_arguments()
            .find(|arg| arg.get_id().as_str() == id)
            .and_then(|arg| arg.get_env())
            .map(|name| name.to_string_lossy().into_owned())
    }

    #[test]
    fn test_flags_and_config_share_env_vars() {
        assert_eq!(env_name("host").as_deref(), Some("STATUS_QUEST_SERVER__HOST"));
        assert_eq!(env_name("port").as_deref(), Some("STATUS_QUEST_SERVER__PORT"));

        std::env::set_var(PORT_ENV, "4321");
        let cli = Cli::try_parse_from(["status-quest"]).unwrap();
        let config = AppConfig::load().unwrap();
        std::env::remove_var(PORT_ENV);

        assert_eq!(cli.port, Some(4321));
        assert_eq!(config.server.port, 4321);
    }

    #[test]
    fn test_file_log_writer_appends() {
        let path = std::env::temp_dir().join(format!("status-quest-{}.log", uuid::Uuid::new_v4()));

        let writer = file_log_writer(&path);
        writer.make_writer().write_all(b"first\n").unwrap();
        writer.make_writer().write_all(b"second\n").unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(contents, "first\nsecond\n");
    }

    #[test]
    fn test_browse_is_detected() {
        let cli = Cli::try_parse_from(["status-quest", "browse"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Browse)));
    }
}
