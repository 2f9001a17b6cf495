//! TubeGuard CLI
//!
//! Developer tool for checking the selector catalog and running the engine
//! against page fixtures without a browser.

mod live;
mod timeline;

use std::fs;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use tg_core::dom::memory::PageFixture;
use tg_core::{Category, EngineConfig, Feature, PassReport, SelectorCatalog, SettingsSnapshot, Simulation};

#[derive(Parser)]
#[command(name = "tg-cli")]
#[command(about = "TubeGuard engine tools")]
struct Cli {
    /// Log engine activity (same as RUST_LOG=debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and list the selector catalog
    Catalog {
        /// Engine config (JSON) with selector overrides
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Run the engine over a page fixture
    Simulate {
        /// Page fixture (JSON)
        #[arg(short, long)]
        page: String,

        /// Engine config (JSON)
        #[arg(short, long)]
        config: Option<String>,

        /// Stored settings snapshot (JSON)
        #[arg(short, long)]
        settings: Option<String>,

        /// Control-surface messages to deliver after start, in order
        #[arg(short, long)]
        message: Vec<String>,

        /// Print the resulting page outline
        #[arg(long)]
        outline: bool,

        /// Print a JSON summary instead of text
        #[arg(long)]
        json: bool,
    },

    /// Replay a watch session and print reminder transitions
    Reminder {
        /// Reminder interval in minutes
        #[arg(short, long, default_value_t = 15)]
        interval: i64,

        /// Session length in minutes
        #[arg(short, long, default_value_t = 60)]
        minutes: u64,

        /// Pause the video at this minute
        #[arg(long)]
        pause_at: Option<u64>,

        /// How long the pause lasts, in seconds
        #[arg(long, default_value_t = 3)]
        pause_secs: u64,

        /// What the viewer does when prompted
        #[arg(long, value_enum, default_value_t = PromptChoice::Continue)]
        on_prompt: PromptChoice,
    },

    /// Drive a page fixture in real time
    Live {
        /// Page fixture (JSON)
        #[arg(short, long)]
        page: String,

        /// Engine config (JSON)
        #[arg(short, long)]
        config: Option<String>,

        /// Wall-clock run time in seconds
        #[arg(short, long, default_value_t = 10)]
        seconds: u64,

        /// Virtual-time multiplier
        #[arg(long, default_value_t = 1.0)]
        speed: f64,
    },
}

/// Viewer response to the reminder prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PromptChoice {
    Continue,
    Close,
    Break,
    Ignore,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Commands::Catalog { config } => cmd_catalog(config.as_deref()),
        Commands::Simulate {
            page,
            config,
            settings,
            message,
            outline,
            json,
        } => cmd_simulate(&page, config.as_deref(), settings.as_deref(), &message, outline, json),
        Commands::Reminder {
            interval,
            minutes,
            pause_at,
            pause_secs,
            on_prompt,
        } => timeline::cmd_reminder(interval, minutes, pause_at, pause_secs, on_prompt),
        Commands::Live {
            page,
            config,
            seconds,
            speed,
        } => live::cmd_live(&page, config.as_deref(), seconds, speed).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

pub(crate) fn load_config(path: Option<&str>) -> Result<EngineConfig, String> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let text = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    EngineConfig::from_json(&text).map_err(|e| format!("Invalid config '{}': {}", path, e))
}

pub(crate) fn load_fixture(path: &str) -> Result<PageFixture, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    PageFixture::from_json(&text).map_err(|e| format!("Invalid fixture '{}': {}", path, e))
}

fn cmd_catalog(config: Option<&str>) -> Result<(), String> {
    let config = load_config(config)?;
    let catalog =
        SelectorCatalog::with_overrides(&config.selector_overrides).map_err(|e| format!("Invalid selector: {}", e))?;

    println!("Selector catalog ({} categories)", Category::ALL.len());
    for category in Category::ALL {
        let selector = catalog.get(category);
        let source = if config.selector_overrides.contains_key(&category) {
            "override"
        } else {
            "built-in"
        };
        println!();
        println!("  {} ({} rule(s), {})", category.name(), selector.len(), source);
        for rule in selector.css().split(", ") {
            println!("    {}", rule);
        }
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateSummary {
    location: String,
    start: PassReport,
    enabled: Vec<&'static str>,
    reminder_interval_minutes: u32,
    reminder_state: String,
    blurred_thumbnails: usize,
    hidden_shorts: usize,
    hover_bound_videos: usize,
    passes: u64,
}

fn cmd_simulate(
    page: &str,
    config: Option<&str>,
    settings: Option<&str>,
    messages: &[String],
    outline: bool,
    json: bool,
) -> Result<(), String> {
    let fixture = load_fixture(page)?;
    let config = load_config(config)?;
    let mut sim = Simulation::from_fixture(&fixture, config).map_err(|e| e.to_string())?;

    let start = sim.start();

    if let Some(path) = settings {
        let text = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
        sim.load_settings(SettingsSnapshot::from_json(&text));
    }

    for message in messages {
        let ack = sim.send(message);
        log::debug!("{} -> {}", message, ack.response);
    }

    let flags = sim.engine().flags();
    let summary = SimulateSummary {
        location: fixture.location.clone(),
        start,
        enabled: Feature::ALL
            .into_iter()
            .filter(|feature| flags.is_enabled(*feature))
            .map(Feature::storage_key)
            .collect(),
        reminder_interval_minutes: flags.reminder_interval_minutes(),
        reminder_state: format!("{:?}", sim.engine().reminder_state()),
        blurred_thumbnails: sim.dom().select(".tg-blurred-thumbnail").len(),
        hidden_shorts: sim.dom().select(".tg-shorts-hidden").len(),
        hover_bound_videos: sim.dom().select("[data-tg-hover-bound]").len(),
        passes: sim.engine().passes(),
    };

    if json {
        let text = serde_json::to_string_pretty(&summary).map_err(|e| e.to_string())?;
        println!("{}", text);
    } else {
        println!("Simulated '{}' at {}", page, summary.location);
        println!("  Start pass:      {:?}", summary.start);
        println!("  Enabled:         {}", summary.enabled.join(", "));
        println!("  Reminder:        {} ({} min)", summary.reminder_state, summary.reminder_interval_minutes);
        println!("  Blurred:         {}", summary.blurred_thumbnails);
        println!("  Shorts hidden:   {}", summary.hidden_shorts);
        println!("  Hover-bound:     {}", summary.hover_bound_videos);
        println!("  Passes:          {}", summary.passes);
    }

    if outline {
        println!();
        print!("{}", sim.dom().outline());
    }
    Ok(())
}
