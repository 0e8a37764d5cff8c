use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

use structopt::StructOpt;

use bayanihub::config::Config;
use bayanihub::output::{OutputFormat, OutputHandler};
use bayanihub::{AlertSubmission, HubService, SqliteAlertStore};

/// BayaniHub command line interface
#[derive(StructOpt, Debug)]
#[structopt(name = "bayanihub", about = "BayaniHub alert hub CLI")]
pub enum Cli {
    /// Generate a default configuration file
    Config {
        /// Output path for the configuration file
        #[structopt(short, long, default_value = "config.toml")]
        output: PathBuf,
    },
    /// List stored alerts, most recent first
    List {
        /// Path to configuration file
        #[structopt(short, long, default_value = "config.toml")]
        config: PathBuf,
        /// Only show this many alerts
        #[structopt(short, long)]
        limit: Option<usize>,
        /// Output format: json, jsonl or console
        #[structopt(short, long, default_value = "console")]
        format: String,
    },
    /// Show aggregate alert metrics
    Metrics {
        /// Path to configuration file
        #[structopt(short, long, default_value = "config.toml")]
        config: PathBuf,
        /// Output format: json, jsonl or console
        #[structopt(short, long, default_value = "console")]
        format: String,
    },
    /// Ingest a single event into the local store
    Submit {
        /// Path to configuration file
        #[structopt(short, long, default_value = "config.toml")]
        config: PathBuf,
        /// Reporting site identifier
        #[structopt(long)]
        site_id: String,
        /// Event type, e.g. login_attempts
        #[structopt(long)]
        event_type: String,
        /// Event time (RFC 3339); defaults to now
        #[structopt(long)]
        timestamp: Option<String>,
        /// Anomaly score in [0, 1]
        #[structopt(long)]
        score: Option<f64>,
        /// Raw details as a JSON object
        #[structopt(long)]
        details: Option<String>,
    },
    /// Ingest a file of JSON submissions, one per line
    Replay {
        /// Path to configuration file
        #[structopt(short, long, default_value = "config.toml")]
        config: PathBuf,
        /// Path to the JSONL file
        #[structopt(short, long)]
        file: PathBuf,
    },
}

fn open_hub(config_path: &PathBuf) -> Result<HubService, Box<dyn std::error::Error>> {
    let config = Config::load_or_default(config_path)?;
    let store = Arc::new(SqliteAlertStore::new(&config.storage.db_path)?);
    Ok(HubService::from_config(store, &config))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .init();

    let cli = Cli::from_args();

    match cli {
        Cli::Config { output } => {
            let config = Config::default();
            config.to_file(&output)?;
            println!("Default configuration written to: {:?}", output);
        }
        Cli::List { config, limit, format } => {
            let hub = open_hub(&config)?;
            let alerts = match limit {
                Some(limit) => hub.recent_alerts(limit),
                None => hub.list_alerts(),
            };
            let mut output = OutputHandler::new(OutputFormat::from_str(&format), None)?;
            output.write_alerts(&alerts)?;
        }
        Cli::Metrics { config, format } => {
            let hub = open_hub(&config)?;
            let mut output = OutputHandler::new(OutputFormat::from_str(&format), None)?;
            output.write_metrics(&hub.get_metrics())?;
        }
        Cli::Submit {
            config,
            site_id,
            event_type,
            timestamp,
            score,
            details,
        } => {
            let hub = open_hub(&config)?;
            let mut submission = AlertSubmission::new(site_id, event_type);
            submission.timestamp = timestamp;
            if let Some(score) = score {
                submission = submission.with_score(score);
            }
            if let Some(details) = details {
                submission = submission.with_details(serde_json::from_str(&details)?);
            }

            let receipt = hub.submit(&submission)?;
            println!(
                "Alert #{} stored (severity: {}): {}",
                receipt.id, receipt.severity, receipt.summary
            );
        }
        Cli::Replay { config, file } => {
            if !file.exists() {
                eprintln!("File not found: {:?}", file);
                std::process::exit(1);
            }

            let hub = open_hub(&config)?;
            let reader = BufReader::new(File::open(&file)?);
            let (mut accepted, mut rejected) = (0usize, 0usize);

            for (line_no, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let result = serde_json::from_str::<AlertSubmission>(&line)
                    .map_err(|e| e.to_string())
                    .and_then(|submission| hub.submit(&submission).map_err(|e| e.to_string()));
                match result {
                    Ok(receipt) => {
                        accepted += 1;
                        println!("  line {}: #{} {} - {}", line_no + 1, receipt.id, receipt.severity, receipt.summary);
                    }
                    Err(e) => {
                        rejected += 1;
                        eprintln!("  line {}: rejected ({})", line_no + 1, e);
                    }
                }
            }

            println!("Replayed {} event(s), {} rejected", accepted, rejected);
        }
    }

    Ok(())
}
