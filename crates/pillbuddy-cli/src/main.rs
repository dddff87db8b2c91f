//! Command-line interface for PillBuddy pill holders.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use pillbuddy_core::config::{env_vars, TrackerConfig};
use pillbuddy_core::EventBus;
use pillbuddy_devices::{
    CommandPublisher, EventProcessor, MemoryCommandPublisher, ProcessOutcome, SetupService,
    TimeoutScanner,
};
use pillbuddy_messages::Notifier;
use pillbuddy_storage::PillStore;

/// Database file kept under `--data-dir`.
const DB_FILE: &str = "pillbuddy.redb";

/// PillBuddy - medication tracking for smart pill holders.
#[derive(Parser, Debug)]
#[command(name = "pillbuddy")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Directory holding the database. State is kept in memory when unset.
    #[arg(long, global = true, env = env_vars::DATA_DIR)]
    data_dir: Option<PathBuf>,

    /// MQTT broker host.
    #[arg(long, global = true, env = env_vars::MQTT_BROKER, default_value = "localhost")]
    broker: String,

    /// MQTT broker port.
    #[arg(long, global = true, env = env_vars::MQTT_PORT, default_value_t = 1883)]
    port: u16,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest holder events over MQTT and run the bottle-out scanner.
    Serve {
        /// Seconds between scans. Defaults to PILLBUDDY_SCAN_INTERVAL_SECS or 300.
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        scan_interval: Option<u64>,
    },
    /// Process one JSON event envelope and print the outcome.
    Ingest {
        /// Envelope file, or `-` for stdin.
        input: String,
        /// Device id to use when the envelope has none.
        #[arg(long)]
        device: Option<String>,
    },
    /// Check every bottle that is out of its holder once.
    Scan,
    /// Configure the prescription for one slot.
    Setup {
        /// Holder device id.
        device: String,
        /// Slot number (1-3).
        slot: i64,
        /// Prescription name.
        name: String,
        /// Pills in the bottle.
        count: i64,
        /// The prescription can be refilled.
        #[arg(long)]
        refills: bool,
    },
    /// Show what is configured on a holder.
    Status {
        /// Holder device id.
        device: String,
        /// Print the full status as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Delete expired event-log records.
    Purge,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Set up panic hook to catch panics before they abort
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("\n=== PANIC ===");
        if let Some(location) = panic_info.location() {
            eprintln!("Location: {}:{}:{}", location.file(), location.line(), location.column());
        } else {
            eprintln!("Location: <unknown>");
        }
        eprintln!("Message: {}", panic_info);
        eprintln!("==============\n");
    }));

    let args = Args::parse();
    init_tracing();

    let config = TrackerConfig::from_env();
    let store = open_store(args.data_dir.as_deref(), &config)?;

    match args.command {
        Command::Serve { scan_interval } => {
            run_serve(store, config, &args.broker, args.port, scan_interval).await
        }
        Command::Ingest { input, device } => run_ingest(store, config, &input, device).await,
        Command::Scan => run_scan(store, config).await,
        Command::Setup {
            device,
            slot,
            name,
            count,
            refills,
        } => run_setup(store, &device, slot, &name, count, refills).await,
        Command::Status { device, json } => run_status(store, &device, json).await,
        Command::Purge => run_purge(store).await,
    }
}

/// Logs go to stderr so command output on stdout stays machine-readable.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pillbuddy=info,warn"));

    if env_vars::log_json() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_writer(std::io::stderr)
            .init();
    }
}

fn open_store(data_dir: Option<&std::path::Path>, config: &TrackerConfig) -> Result<PillStore> {
    let store = match data_dir {
        Some(dir) => {
            let path = dir.join(DB_FILE);
            PillStore::open_redb(&path)
                .with_context(|| format!("Failed to open database at {}", path.display()))?
        }
        None => {
            warn!("no data dir set, state will not outlive this process");
            PillStore::memory()
        }
    };
    Ok(store.with_timeout(config.store_timeout()))
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Notifier printing to stdout, plus a webhook when one is configured.
async fn build_notifier() -> Notifier {
    let notifier = Notifier::console().await;
    if let Ok(url) = std::env::var(env_vars::WEBHOOK_URL) {
        if !url.trim().is_empty() {
            info!(url = %url, "webhook notifications enabled");
            notifier
                .register(Arc::new(pillbuddy_messages::WebhookChannel::new(
                    "webhook".to_string(),
                    url,
                )))
                .await;
        }
    }
    notifier
}

/// Print the light commands an offline run would have sent.
fn print_queued_commands(commands: &MemoryCommandPublisher) -> Result<()> {
    for (device_id, command) in commands.sent() {
        println!(
            "command {} {}",
            device_id,
            serde_json::to_string(&command).context("Failed to encode command")?
        );
    }
    Ok(())
}

async fn run_serve(
    store: PillStore,
    config: TrackerConfig,
    broker: &str,
    port: u16,
    scan_interval: Option<u64>,
) -> Result<()> {
    use pillbuddy_devices::{MqttCommandPublisher, MqttConfig};

    if !store.is_persistent() {
        warn!("serving without --data-dir, nothing will be kept across restarts");
    }

    let mqtt = MqttConfig::new(broker, port);
    let (client, eventloop) = pillbuddy_devices::connect(&mqtt);
    info!(broker, port, client_id = %mqtt.client_id, "connecting to MQTT broker");

    let notifier = build_notifier().await;
    let event_bus = Arc::new(EventBus::with_name("pillbuddy"));
    let commands: Arc<dyn CommandPublisher> = Arc::new(MqttCommandPublisher::new(client.clone()));

    let processor = EventProcessor::new(store.clone(), notifier.clone(), commands, config.clone())
        .with_event_bus(event_bus.clone());
    let scanner = TimeoutScanner::new(store, notifier, config.timeout_threshold_ms)
        .with_event_bus(event_bus.clone());

    let mut events = event_bus.subscribe();
    let log_task = tokio::spawn(async move {
        while let Some((event, metadata)) = events.recv().await {
            info!(
                event = event.type_name(),
                device_id = event.device_id(),
                source = %metadata.source,
                "tracker event"
            );
        }
    });

    let period = scan_interval
        .map(std::time::Duration::from_secs)
        .unwrap_or_else(|| config.scan_interval());
    let mut scan_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match scanner.scan(now_millis()).await {
                Ok(report) => info!(
                    checked = report.checked,
                    notified = report.notified,
                    errors = report.errors,
                    "timeout scan finished"
                ),
                Err(e) => warn!(error = %e, "timeout scan failed"),
            }
        }
    });
    info!(every_secs = period.as_secs(), "bottle-out scanner started");

    let result = tokio::select! {
        result = pillbuddy_devices::run_ingest(processor, client, eventloop, mqtt.max_errors) => {
            result.context("MQTT ingestion stopped")
        }
        joined = &mut scan_task => {
            match joined {
                Err(e) if e.is_panic() => Err(anyhow::anyhow!("timeout scanner panicked: {}", e)),
                _ => Err(anyhow::anyhow!("timeout scanner stopped")),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            Ok(())
        }
    };
    scan_task.abort();
    log_task.abort();
    result
}

async fn run_ingest(
    store: PillStore,
    config: TrackerConfig,
    input: &str,
    device: Option<String>,
) -> Result<()> {
    let payload = if input == "-" {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("Failed to read envelope from stdin")?;
        buf
    } else {
        std::fs::read(input).with_context(|| format!("Failed to read {}", input))?
    };

    let commands = Arc::new(MemoryCommandPublisher::new());
    let processor = EventProcessor::new(
        store,
        build_notifier().await,
        commands.clone(),
        config,
    );

    let outcome = processor
        .handle_payload(&payload, device.as_deref(), now_millis())
        .await?;
    print_queued_commands(&commands)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&outcome).context("Failed to encode outcome")?
    );

    if let ProcessOutcome::Rejected { reason } = outcome {
        anyhow::bail!("event rejected: {}", reason);
    }
    Ok(())
}

async fn run_scan(store: PillStore, config: TrackerConfig) -> Result<()> {
    let scanner = TimeoutScanner::new(store, build_notifier().await, config.timeout_threshold_ms);
    let report = scanner.scan(now_millis()).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to encode scan report")?
    );
    Ok(())
}

async fn run_setup(
    store: PillStore,
    device: &str,
    slot: i64,
    name: &str,
    count: i64,
    refills: bool,
) -> Result<()> {
    let commands = Arc::new(MemoryCommandPublisher::new());
    let setup = SetupService::new(store, commands.clone());
    let prescription = setup
        .configure_slot(device, slot, name, count, refills, now_millis())
        .await?;

    println!(
        "Slot {} of {} is set up for {} with {} pills.",
        prescription.slot, device, prescription.prescription_name, prescription.pill_count
    );
    print_queued_commands(&commands)?;
    Ok(())
}

async fn run_status(store: PillStore, device: &str, json: bool) -> Result<()> {
    let setup = SetupService::new(store, Arc::new(MemoryCommandPublisher::new()));
    let status = setup.status(device).await?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&status).context("Failed to encode status")?
        );
    } else {
        println!("{}", status.summary());
    }
    Ok(())
}

async fn run_purge(store: PillStore) -> Result<()> {
    let removed = store.purge_expired(now_millis() / 1000).await?;
    println!("Purged {} expired event records.", removed);
    Ok(())
}
