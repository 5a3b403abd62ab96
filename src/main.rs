//! Tickwire - Entry Point
//!
//! Runs the engine with a set of builtin generators until ctrl-c, then
//! prints the final diagnostics.

use std::path::PathBuf;

use clap::Parser;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

use tickwire::core::config::EngineConfig;
use tickwire::core::error::Result;
use tickwire::core::types::GeneratorId;
use tickwire::engine::{Engine, EngineEvent, PropertyKey};
use tickwire::generator::builtin::{Oscillator, Relay};
use tickwire::generator::GeneratorRegistry;

/// Tickwire engine daemon
#[derive(Parser, Debug)]
#[command(name = "tickwire")]
#[command(about = "Drive generators at a fixed rate and stream their outputs over UDP")]
struct Args {
    /// TOML config file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ticks per second
    #[arg(long)]
    frequency: Option<f64>,

    /// Telemetry destination host
    #[arg(long)]
    dest_host: Option<String>,

    /// Telemetry destination port
    #[arg(long)]
    dest_port: Option<u16>,

    /// Port for inbound input messages
    #[arg(long)]
    listen_port: Option<u16>,

    /// Emit random values instead of computed ones
    #[arg(long, default_value_t = false)]
    monitor: bool,

    /// Send float64 instead of narrowing to float32
    #[arg(long, default_value_t = false)]
    wide_floats: bool,

    /// Number of builtin generators to run
    #[arg(long, default_value_t = 2)]
    generators: u32,

    /// Seed for monitor-mode randomness
    #[arg(long)]
    seed: Option<u64>,

    /// Log every history update
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tickwire=info")),
        )
        .init();

    let args = Args::parse();
    let config = build_config(&args)?;

    let rt = Runtime::new()?;
    rt.block_on(run(config, &args))
}

fn build_config(args: &Args) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    if let Some(frequency) = args.frequency {
        config.frequency = frequency;
    }
    if let Some(host) = &args.dest_host {
        config.destination_host = host.clone();
    }
    if let Some(port) = args.dest_port {
        config.destination_port = port;
    }
    if let Some(port) = args.listen_port {
        config.listen_port = port;
    }
    if args.monitor {
        config.monitor_output = true;
    }
    if args.wide_floats {
        config.narrow_to_f32 = false;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    config
        .validate()
        .map_err(tickwire::core::error::TickwireError::Config)?;
    Ok(config)
}

/// Alternate relays and oscillators, ids starting at 1
fn demo_registry(count: u32) -> Result<GeneratorRegistry> {
    let mut registry = GeneratorRegistry::new();
    for n in 1..=count {
        let id = GeneratorId(n);
        if n % 2 == 1 {
            registry.add(Box::new(Relay::new(id, &format!("relay{}", n), 2, 2)))?;
        } else {
            let base_hz = 0.25 * n as f64;
            registry.add(Box::new(Oscillator::new(id, &format!("osc{}", n), 1, 4, base_hz)))?;
        }
    }
    Ok(registry)
}

async fn run(config: EngineConfig, args: &Args) -> Result<()> {
    let registry = demo_registry(args.generators)?;
    for (id, name) in registry.iter().map(|g| (g.id(), g.name().to_string())) {
        tracing::info!(generator = %id, name = %name, "Registered generator");
    }

    let engine = Engine::start(config, registry).await?;
    println!("\n=== TICKWIRE ===");
    println!("Listening for input on {}", engine.listen_addr());
    println!("Sending telemetry to {}", engine.destination());
    println!("Press ctrl-c to stop");

    let mut events = engine.subscribe();
    let verbose = args.verbose;
    let observer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(EngineEvent::ComputeFault { generator, reason }) => {
                    tracing::warn!(generator = %generator, reason = %reason, "Generator fault");
                }
                Ok(EngineEvent::InputApplied {
                    generator,
                    valid,
                    total,
                }) => {
                    tracing::info!(generator = %generator, valid, total, "Input applied");
                }
                Ok(EngineEvent::Property(change)) => {
                    if verbose && change.key == PropertyKey::HistoryLatest {
                        tracing::info!(generator = %change.generator, value = ?change.value, "History");
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Observer lagging");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    let snapshot = engine.shutdown().await;
    observer.abort();

    println!("\n=== DIAGNOSTICS ===");
    println!("{}", snapshot.summary());
    Ok(())
}
