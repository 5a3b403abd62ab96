//! Tick engine: scheduler, input latch, history and emission
//!
//! [`Engine::start`] is the composition root. It binds the sockets,
//! moves the registry into the scheduler task, spawns the receive task
//! and hands back an [`EngineHandle`] for control and observation.

pub mod emitter;
pub mod events;
pub mod history;
pub mod inbound;
pub mod latch;
pub mod scheduler;
pub mod tick;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::core::config::{tick_period, EngineConfig};
use crate::core::diagnostics::{Diagnostics, DiagnosticsSnapshot};
use crate::core::error::{Result, TickwireError};
use crate::core::types::GeneratorId;
use crate::generator::{Generator, GeneratorRegistry, RegistryDirectory};
use crate::transport::{UdpReceiver, UdpSender};
use crate::wire::{Codec, InboundPattern};

pub use emitter::OutputEmitter;
pub use events::{EngineEvent, PropertyChange, PropertyKey, PropertyValue};
pub use history::{saturate, HistoryAggregator, HistoryBoard, HistoryMode, HistoryRecord};
pub use inbound::{run_receiver, InboundRouter};
pub use latch::{InputLatch, InputValues};
pub use scheduler::{ControlCommand, SchedulerState, TickScheduler, TickTiming};
pub use tick::{TickPipeline, TickReport};

const CONTROL_CAPACITY: usize = 64;

pub struct Engine;

impl Engine {
    /// Bind sockets and start the scheduler and receiver tasks
    ///
    /// Socket bind and destination resolution failures are returned;
    /// everything after startup is counted and logged instead.
    pub async fn start(config: EngineConfig, registry: GeneratorRegistry) -> Result<EngineHandle> {
        config.validate().map_err(TickwireError::Config)?;
        let pattern = InboundPattern::parse(&config.inbound_address)?;
        let codec = Codec::new(config.max_frame_size);

        let receiver = UdpReceiver::bind(
            &config.listen_host,
            config.listen_port,
            config.max_frame_size + 1,
        )
        .await?;
        let listen_addr = receiver.local_addr()?;
        let sender =
            Arc::new(UdpSender::connect(&config.destination_host, config.destination_port).await?);

        let latch = Arc::new(InputLatch::new());
        let directory = registry.directory();
        let scheduler = TickScheduler::new(&config, registry, Arc::clone(&latch), sender.clone());
        let history = scheduler.history_board();
        let diagnostics = scheduler.diagnostics();
        let events = scheduler.event_sender();

        let router = InboundRouter::new(
            codec,
            pattern,
            directory.clone(),
            latch,
            Arc::clone(&diagnostics),
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (control_tx, control_rx) = mpsc::channel(CONTROL_CAPACITY);

        let scheduler_task = tokio::spawn(scheduler.run(control_rx, shutdown_rx.clone()));
        let receiver_task = tokio::spawn(run_receiver(receiver, router, shutdown_rx));

        tracing::info!(
            listen = %listen_addr,
            destination = %sender.destination(),
            frequency = config.frequency,
            "Engine started"
        );

        Ok(EngineHandle {
            control: control_tx,
            shutdown: shutdown_tx,
            sender,
            listen_addr,
            history,
            diagnostics,
            directory,
            events,
            scheduler_task,
            receiver_task,
        })
    }
}

/// Control and observation surface of a running engine
pub struct EngineHandle {
    control: mpsc::Sender<ControlCommand>,
    shutdown: watch::Sender<bool>,
    sender: Arc<UdpSender>,
    listen_addr: SocketAddr,
    history: HistoryBoard,
    diagnostics: Arc<Diagnostics>,
    directory: RegistryDirectory,
    events: broadcast::Sender<EngineEvent>,
    scheduler_task: JoinHandle<GeneratorRegistry>,
    receiver_task: JoinHandle<()>,
}

impl EngineHandle {
    pub async fn add_generator(&self, generator: Box<dyn Generator>) -> Result<GeneratorId> {
        let (reply, rx) = oneshot::channel();
        self.send(ControlCommand::AddGenerator { generator, reply })
            .await?;
        rx.await.map_err(|_| stopped())?
    }

    /// Remove a generator; returns whether it existed
    pub async fn remove_generator(&self, id: GeneratorId) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(ControlCommand::RemoveGenerator { id, reply })
            .await?;
        rx.await.map_err(|_| stopped())
    }

    pub async fn rename_generator(&self, id: GeneratorId, name: impl Into<String>) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(ControlCommand::RenameGenerator {
            id,
            name: name.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| stopped())?
    }

    pub async fn set_processing(&self, enabled: bool) -> Result<()> {
        self.send(ControlCommand::SetProcessing(enabled)).await
    }

    pub async fn set_monitor(&self, enabled: bool) -> Result<()> {
        self.send(ControlCommand::SetMonitor(enabled)).await
    }

    pub async fn set_narrow_floats(&self, enabled: bool) -> Result<()> {
        self.send(ControlCommand::SetNarrowFloats(enabled)).await
    }

    pub async fn set_frequency(&self, frequency: f64) -> Result<()> {
        tick_period(frequency).map_err(TickwireError::Config)?;
        self.send(ControlCommand::SetFrequency(frequency)).await
    }

    /// Point outbound telemetry at a new peer
    ///
    /// Takes effect for the next frame sent; the listening socket is
    /// untouched.
    pub async fn configure_destination(&self, host: &str, port: u16) -> Result<SocketAddr> {
        self.sender.configure(host, port).await
    }

    pub fn destination(&self) -> SocketAddr {
        self.sender.destination()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn history(&self) -> HistoryBoard {
        self.history.clone()
    }

    pub fn directory(&self) -> RegistryDirectory {
        self.directory.clone()
    }

    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    pub fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }

    /// Stop both tasks and return the final counters
    pub async fn shutdown(self) -> DiagnosticsSnapshot {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.scheduler_task.await {
            tracing::warn!(error = %e, "Scheduler task ended abnormally");
        }
        if let Err(e) = self.receiver_task.await {
            tracing::warn!(error = %e, "Receiver task ended abnormally");
        }
        let snapshot = self.diagnostics.snapshot();
        tracing::info!(ticks = snapshot.ticks, "Engine stopped");
        snapshot
    }

    async fn send(&self, command: ControlCommand) -> Result<()> {
        self.control.send(command).await.map_err(|_| stopped())
    }
}

fn stopped() -> TickwireError {
    TickwireError::Transport("engine is not running".into())
}
