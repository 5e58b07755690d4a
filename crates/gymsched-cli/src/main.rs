use std::path::PathBuf;
use std::process;
use std::time::Duration;

use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use gymsched::scraper::{ScrapeConfig, scrape};
use gymsched::utils::{ScrapeStats, ScrapeWindow};
use log::LevelFilter;

#[derive(Parser)]
#[command(name = "gymsched")]
#[command(
    about = "Scrapes an embedded weekly schedule widget into a JSON event dataset",
    long_about = None
)]
struct Cli {
    #[arg(
        short = 'l',
        long = "log-level",
        value_enum,
        default_value = "info",
        help = "Set the logging level"
    )]
    log_level: LogLevel,

    #[arg(long, default_value = gymsched::DEFAULT_URL, help = "Page hosting the schedule widget")]
    url: String,

    #[arg(
        long,
        value_name = "YYYY-MM-DD",
        default_value = "2025-09-01",
        help = "First date to scrape",
        value_parser = parse_date,
    )]
    start_date: NaiveDate,

    #[arg(
        long,
        value_name = "YYYY-MM-DD",
        default_value = "2026-01-01",
        help = "Last date to scrape (the week containing it is included)",
        value_parser = parse_date,
    )]
    end_date: NaiveDate,

    #[arg(
        long,
        default_value_t = 15000,
        help = "Timeout in milliseconds for each page action",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    timeout_ms: u64,

    #[arg(
        short = 'o',
        long = "output",
        value_enum,
        default_value = "json",
        help = "Output format"
    )]
    format: OutputFormat,

    #[arg(long, help = "Show the browser window instead of running headless")]
    headful: bool,

    #[arg(long, value_name = "PATH", help = "Chrome/Chromium executable to launch")]
    chrome_path: Option<PathBuf>,
}

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| e.to_string())
}

fn serialize_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            log::error!("Error serializing to JSON: {}", e);
            process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.clone().into())
        .init();

    let window = ScrapeWindow {
        start: cli.start_date,
        end: cli.end_date,
    }
    .validate()
    .unwrap_or_else(|e| {
        log::error!("Invalid args: {e}");
        process::exit(1);
    });

    let config = ScrapeConfig {
        url: cli.url,
        window,
        timeout: Duration::from_millis(cli.timeout_ms),
        headless: !cli.headful,
        chrome_executable: cli.chrome_path,
    };

    let events = scrape(&config).await.unwrap_or_else(|e| {
        log::error!("Execution failed: {}", e);
        process::exit(1);
    });

    match cli.format {
        OutputFormat::Json => serialize_json(&events),
        OutputFormat::Text => {
            if events.is_empty() {
                println!("No events found.");
            } else {
                for (i, event) in events.iter().enumerate() {
                    println!("{:>3}. {}", i + 1, event);
                }
                print!("{}", ScrapeStats::from_events(&events));
            }
        }
    }
}
