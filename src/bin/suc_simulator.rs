use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use structopt::StructOpt;

use bayanihub::config::Config;
use bayanihub::simulator::{generate_event, HubClient, SiteProfile, SimulatorError};
use bayanihub::BaselineScorer;

/// Simulated reporting site posting telemetry to a BayaniHub hub
#[derive(StructOpt, Debug)]
#[structopt(name = "suc_simulator", about = "Simulated reporting site")]
struct Args {
    /// Site identifier reported with every event
    #[structopt(long, default_value = "SUC_A")]
    site_id: String,
    /// Traffic profile: login or portscan
    #[structopt(long, default_value = "login")]
    profile: String,
    /// Path to configuration file
    #[structopt(short, long, default_value = "config.toml")]
    config: PathBuf,
    /// Stop after sending this many events
    #[structopt(long)]
    count: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Args::from_args();
    let profile = SiteProfile::from_str(&args.profile)
        .ok_or_else(|| format!("Unknown profile: {}", args.profile))?;
    let config = Config::load_or_default(&args.config)?;
    let scorer = BaselineScorer::from_config(&config.scoring)?;
    let client = HubClient::new(config.simulator.hub_url.clone());

    // Setup graceful shutdown signal handling
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    log::info!(
        "[{}] Starting simulator, sending alerts to {}",
        args.site_id,
        config.simulator.hub_url
    );
    log::info!("[{}] Press Ctrl+C to stop", args.site_id);

    let min_interval = config.simulator.min_interval_secs.max(0.0);
    let max_interval = config.simulator.max_interval_secs.max(min_interval);
    let mut sent = 0usize;

    while running.load(Ordering::SeqCst) && args.count.map_or(true, |count| sent < count) {
        let event = generate_event(profile, &args.site_id, &scorer, &mut rand::thread_rng());

        match client.send(&event).await {
            Ok(response) => log::info!(
                "[{}] Sent {} -> #{} {} ({})",
                args.site_id,
                event.event_type.as_deref().unwrap_or_default(),
                response.id,
                response.severity,
                response.summary
            ),
            Err(SimulatorError::Http(e)) if e.is_connect() => {
                log::warn!("[{}] Connection error - is the hub running?", args.site_id)
            }
            Err(e) => log::error!("[{}] Error sending: {}", args.site_id, e),
        }
        sent += 1;

        // Sleep in short slices so Ctrl+C is noticed promptly
        let pause = if max_interval > min_interval {
            rand::thread_rng().gen_range(min_interval..max_interval)
        } else {
            min_interval
        };
        let deadline = tokio::time::Instant::now() + Duration::from_secs_f64(pause);
        while running.load(Ordering::SeqCst) && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    log::info!("[{}] Stopped after {} event(s)", args.site_id, sent);
    Ok(())
}
