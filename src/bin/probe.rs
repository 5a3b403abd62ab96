//! Tickwire probe
//!
//! Sends one inbound message to an engine and/or prints the telemetry
//! frames arriving on a port.

use clap::Parser;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

use tickwire::core::error::Result;
use tickwire::transport::{FrameSink, UdpReceiver, UdpSender};
use tickwire::wire::{Argument, Codec, WireMessage};

/// Send input to a tickwire engine and watch its output
#[derive(Parser, Debug)]
#[command(name = "tickwire-probe")]
#[command(about = "Send an input message and/or print received telemetry")]
struct Args {
    /// Engine input endpoint as host:port
    #[arg(long, default_value = "127.0.0.1:9000")]
    target: String,

    /// Address of the message to send (nothing is sent when absent)
    #[arg(long)]
    address: Option<String>,

    /// Comma-separated values; numbers become float32, anything else a string
    #[arg(long, default_value = "")]
    values: String,

    /// Listen on this port and print decoded frames
    #[arg(long)]
    listen: Option<u16>,

    /// Stop after printing this many frames
    #[arg(long)]
    count: Option<usize>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tickwire=warn")),
        )
        .init();

    let args = Args::parse();
    let rt = Runtime::new()?;
    rt.block_on(run(args))
}

fn parse_values(values: &str) -> Vec<Argument> {
    values
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| match v.parse::<f32>() {
            Ok(number) => Argument::Float(number),
            Err(_) => Argument::Str(v.to_string()),
        })
        .collect()
}

async fn run(args: Args) -> Result<()> {
    let codec = Codec::default();

    if let Some(address) = &args.address {
        let (host, port) = split_target(&args.target)?;
        let message = WireMessage::with_args(address.as_str(), parse_values(&args.values))?;
        let encoded = codec.encode(&message)?;
        let sender = UdpSender::connect(host, port).await?;
        sender.send_frame(&encoded.frame)?;
        println!("sent {} -> {}", message, sender.destination());
    }

    if let Some(port) = args.listen {
        let receiver = UdpReceiver::bind("0.0.0.0", port, codec.max_frame() + 1).await?;
        println!("listening on {}", receiver.local_addr()?);
        let mut printed = 0;
        while args.count.map_or(true, |max| printed < max) {
            let (frame, from) = receiver.recv().await?;
            match codec.decode(&frame) {
                Ok(message) => println!("{} {}", from, message),
                Err(e) => println!("{} <{}>", from, e),
            }
            printed += 1;
        }
    }

    Ok(())
}

fn split_target(target: &str) -> Result<(&str, u16)> {
    let (host, port) = target.rsplit_once(':').ok_or_else(|| {
        tickwire::core::error::TickwireError::Config(format!(
            "target {:?} must be host:port",
            target
        ))
    })?;
    let port = port.parse().map_err(|_| {
        tickwire::core::error::TickwireError::Config(format!("invalid port in {:?}", target))
    })?;
    Ok((host, port))
}
