use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use host_telemetry::{Monitor, MonitorConfig, config::read_config_file};
use tokio::sync::mpsc::unbounded_channel;
use tracing::{debug, error, info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
#[command(version, about = "Periodically writes host telemetry documents")]
struct Args {
    /// Config file
    #[arg(short)]
    file: Option<String>,

    /// Update interval in milliseconds, overrides the config file
    #[arg(short, long)]
    interval: Option<i32>,

    /// Directory for system_info_<n>.json files; documents go to stdout otherwise
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Stop after this many documents
    #[arg(short = 'n', long)]
    count: Option<usize>,
}

fn init() {
    dotenv::dotenv().ok();

    let filter = filter::Targets::new().with_targets(vec![
        ("host_telemetry", LevelFilter::DEBUG),
        ("telemetry_agent", LevelFilter::TRACE),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

fn resolve_config(args: &Args) -> anyhow::Result<MonitorConfig> {
    let config = match &args.file {
        Some(path) => read_config_file(path)?,
        None => MonitorConfig::default(),
    };
    let mut config = config.with_env_overrides();
    if let Some(interval_ms) = args.interval {
        config.interval_ms = interval_ms;
    }
    config.validate()?;
    Ok(config)
}

async fn write_document(dir: &Path, index: usize, document: &str) -> anyhow::Result<PathBuf> {
    let path = dir.join(format!("system_info_{index}.json"));
    tokio::fs::write(&path, document)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = resolve_config(&args)?;
    if let Some(dir) = &args.output {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let monitor = Arc::new(Monitor::new(&config));
    let (document_tx, mut document_rx) = unbounded_channel::<String>();
    monitor.set_callback(move |document: &str| -> anyhow::Result<()> {
        document_tx
            .send(document.to_string())
            .context("agent no longer receives documents")
    });

    monitor.start(config.interval_ms)?;
    info!(interval_ms = config.interval_ms, "telemetry agent running, press Ctrl-C to stop");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut received = 0usize;
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                debug!("received Ctrl-C");
                break;
            }

            Some(document) = document_rx.recv() => {
                received += 1;
                match &args.output {
                    Some(dir) => match write_document(dir, received, &document).await {
                        Ok(path) => info!("wrote {}", path.display()),
                        Err(e) => error!("{e:#}"),
                    },
                    None => println!("{document}"),
                }

                if args.count.is_some_and(|count| received >= count) {
                    break;
                }
            }

            else => break,
        }
    }

    let uptime = monitor.uptime();
    let stopper = monitor.clone();
    tokio::task::spawn_blocking(move || stopper.stop())
        .await
        .context("failed to stop monitor")?;

    eprintln!("documents received: {received}");
    eprintln!("uptime: {:.1}s", uptime.as_secs_f64());
    eprintln!("final state: {}", monitor.last_error());

    Ok(())
}
