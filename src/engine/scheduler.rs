//! Self-pacing tick scheduler
//!
//! The scheduler owns the generator registry and runs every tick on its
//! own task. After each tick it sleeps for `period - compute`, clamped to
//! `[0, period]`: an overrun shortens the next gap to zero but never
//! lengthens it, so timing errors do not accumulate.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::core::config::{tick_period, EngineConfig};
use crate::core::diagnostics::Diagnostics;
use crate::core::error::Result;
use crate::core::types::{GeneratorId, Tick};
use crate::engine::events::EngineEvent;
use crate::engine::history::HistoryBoard;
use crate::engine::latch::InputLatch;
use crate::engine::tick::{TickPipeline, TickReport};
use crate::generator::{Generator, GeneratorRegistry};
use crate::transport::FrameSink;

/// Queued control commands applied right after a tick
const CONTROL_BATCH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Not started, or shut down
    Idle,
    /// Waiting for the next tick to fire
    Scheduled,
    /// Inside the tick pipeline
    Running,
}

/// Elapsed-time and reschedule-delay arithmetic
#[derive(Debug, Clone, Copy)]
pub struct TickTiming {
    period: Duration,
    last_start: Option<Instant>,
}

impl TickTiming {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last_start: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn set_period(&mut self, period: Duration) {
        self.period = period;
    }

    /// Mark the start of a tick and return the time since the previous one
    ///
    /// The first tick reports the nominal period.
    pub fn begin_tick(&mut self, now: Instant) -> Duration {
        let elapsed = match self.last_start {
            Some(last) => now.saturating_duration_since(last),
            None => self.period,
        };
        self.last_start = Some(now);
        elapsed
    }

    /// Delay before the next tick given this tick's compute time
    pub fn next_delay(&self, compute: Duration) -> Duration {
        self.period.saturating_sub(compute).min(self.period)
    }

    /// Forget the previous tick so the next one counts as the first
    pub fn reset(&mut self) {
        self.last_start = None;
    }
}

/// Requests applied by the scheduler between ticks
pub enum ControlCommand {
    AddGenerator {
        generator: Box<dyn Generator>,
        reply: oneshot::Sender<Result<GeneratorId>>,
    },
    RemoveGenerator {
        id: GeneratorId,
        reply: oneshot::Sender<bool>,
    },
    RenameGenerator {
        id: GeneratorId,
        name: String,
        reply: oneshot::Sender<Result<()>>,
    },
    SetProcessing(bool),
    SetMonitor(bool),
    SetNarrowFloats(bool),
    SetFrequency(f64),
    Shutdown,
}

pub struct TickScheduler {
    state: SchedulerState,
    timing: TickTiming,
    processing: bool,
    tick: Tick,
    registry: GeneratorRegistry,
    pipeline: TickPipeline,
    sink: Arc<dyn FrameSink>,
    history: HistoryBoard,
    diagnostics: Arc<Diagnostics>,
    events: broadcast::Sender<EngineEvent>,
}

impl TickScheduler {
    pub fn new(
        config: &EngineConfig,
        registry: GeneratorRegistry,
        latch: Arc<InputLatch>,
        sink: Arc<dyn FrameSink>,
    ) -> Self {
        let history = HistoryBoard::new();
        let diagnostics = Arc::new(Diagnostics::new());
        let (events, _) = broadcast::channel(config.event_capacity);
        let pipeline = TickPipeline::new(
            config,
            latch,
            history.clone(),
            Arc::clone(&diagnostics),
            events.clone(),
        );

        Self {
            state: SchedulerState::Idle,
            timing: TickTiming::new(config.period()),
            processing: config.processing_enabled,
            tick: 0,
            registry,
            pipeline,
            sink,
            history,
            diagnostics,
            events,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn registry(&self) -> &GeneratorRegistry {
        &self.registry
    }

    pub fn history_board(&self) -> HistoryBoard {
        self.history.clone()
    }

    pub fn diagnostics(&self) -> Arc<Diagnostics> {
        Arc::clone(&self.diagnostics)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Sender side of the observer stream, for subscribing later
    pub fn event_sender(&self) -> broadcast::Sender<EngineEvent> {
        self.events.clone()
    }

    /// `Idle -> Scheduled`; the first tick fires without delay
    pub fn start(&mut self) -> Duration {
        self.timing.reset();
        self.state = SchedulerState::Scheduled;
        Duration::ZERO
    }

    /// Run one tick and return the delay before the next
    ///
    /// Returns `None` when the scheduler is idle.
    pub fn fire(&mut self) -> Option<Duration> {
        self.fire_with_report().map(|(delay, _)| delay)
    }

    /// Like [`fire`](Self::fire), also returning the pipeline report
    /// (`None` in place of a report when processing is disabled)
    pub fn fire_with_report(&mut self) -> Option<(Duration, Option<TickReport>)> {
        if self.state != SchedulerState::Scheduled {
            return None;
        }
        self.state = SchedulerState::Running;

        let started = Instant::now();
        let refresh = self.timing.begin_tick(started);

        if !self.processing {
            self.state = SchedulerState::Scheduled;
            return Some((self.timing.period(), None));
        }

        let report = self
            .pipeline
            .run(self.tick, &mut self.registry, self.sink.as_ref());
        self.tick += 1;

        let compute = started.elapsed();
        let delay = self.timing.next_delay(compute);

        tracing::debug!(
            tick = report.tick,
            generators = report.generators,
            refresh_ms = refresh.as_secs_f64() * 1000.0,
            compute_ms = compute.as_secs_f64() * 1000.0,
            "Tick complete"
        );

        self.state = SchedulerState::Scheduled;
        Some((delay, Some(report)))
    }

    /// Stop rescheduling
    pub fn shutdown(&mut self) {
        self.state = SchedulerState::Idle;
    }

    /// Apply one control command; returns false once shut down
    pub fn apply_control(&mut self, command: ControlCommand) -> bool {
        match command {
            ControlCommand::AddGenerator { generator, reply } => {
                let name = generator.name().to_string();
                let result = self.registry.add(generator);
                match &result {
                    Ok(id) => tracing::info!(generator = %id, name = %name, "Generator added"),
                    Err(e) => tracing::warn!(name = %name, error = %e, "Generator rejected"),
                }
                let _ = reply.send(result);
            }
            ControlCommand::RemoveGenerator { id, reply } => {
                let removed = self.registry.remove(id).is_some();
                self.pipeline.forget(id);
                if removed {
                    tracing::info!(generator = %id, "Generator removed");
                }
                let _ = reply.send(removed);
            }
            ControlCommand::RenameGenerator { id, name, reply } => {
                let _ = reply.send(self.registry.rename(id, name));
            }
            ControlCommand::SetProcessing(enabled) => {
                tracing::info!(enabled, "Processing toggled");
                self.processing = enabled;
            }
            ControlCommand::SetMonitor(enabled) => self.pipeline.set_monitor(enabled),
            ControlCommand::SetNarrowFloats(enabled) => self.pipeline.set_narrow_floats(enabled),
            ControlCommand::SetFrequency(frequency) => {
                match tick_period(frequency) {
                    Ok(period) => {
                        self.timing.set_period(period);
                        self.pipeline.set_frequency(frequency);
                        tracing::info!(frequency, "Frequency changed");
                    }
                    Err(reason) => tracing::warn!(%reason, "Ignoring invalid frequency"),
                }
            }
            ControlCommand::Shutdown => self.shutdown(),
        }
        self.state != SchedulerState::Idle
    }

    /// Drive ticks until shut down, applying control commands between them
    ///
    /// Returns the registry so the caller gets its generators back.
    pub async fn run(
        mut self,
        mut control: mpsc::Receiver<ControlCommand>,
        mut shutdown: watch::Receiver<bool>,
    ) -> GeneratorRegistry {
        let mut deadline = tokio::time::Instant::now() + self.start();
        tracing::info!(
            period_ms = self.timing.period().as_secs_f64() * 1000.0,
            generators = self.registry.len(),
            "Scheduler started"
        );

        // A due tick wins over queued commands; commands already queued are
        // applied after each tick, up to a batch, so neither side starves
        'ticking: while !*shutdown.borrow() {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep_until(deadline) => {
                    match self.fire() {
                        Some(delay) => deadline = tokio::time::Instant::now() + delay,
                        None => break,
                    }
                    for _ in 0..CONTROL_BATCH {
                        let Ok(command) = control.try_recv() else {
                            break;
                        };
                        if !self.apply_control(command) {
                            break 'ticking;
                        }
                    }
                }
                command = control.recv() => match command {
                    Some(command) => {
                        if !self.apply_control(command) {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }

        self.shutdown();
        tracing::info!(ticks = self.tick, "Scheduler stopped");
        self.registry
    }
}
