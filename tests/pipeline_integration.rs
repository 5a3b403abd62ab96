//! Tick pipeline integration tests
//!
//! Drives the scheduler and pipeline directly against an in-memory sink,
//! covering latching, history, emission order and fault isolation.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;

use tickwire::core::config::EngineConfig;
use tickwire::core::diagnostics::Diagnostics;
use tickwire::core::error::TickwireError;
use tickwire::core::types::GeneratorId;
use tickwire::engine::{
    EngineEvent, HistoryBoard, InboundRouter, InputLatch, PropertyKey, PropertyValue,
    SchedulerState, TickPipeline, TickScheduler, TickTiming,
};
use tickwire::generator::builtin::Relay;
use tickwire::generator::{Generator, GeneratorFault, GeneratorRegistry, RegionSet};
use tickwire::transport::MemorySink;
use tickwire::wire::{Argument, Codec, InboundPattern, WireMessage};

/// What a scripted generator does on one tick
#[derive(Debug, Clone, Copy)]
enum Step {
    Value(f64),
    Fault,
    Panic,
}

/// Generator whose outputs follow a fixed script, one step per tick
struct Scripted {
    id: GeneratorId,
    name: String,
    inputs: RegionSet,
    outputs: RegionSet,
    steps: VecDeque<Step>,
    next: f64,
}

impl Scripted {
    fn new(id: u32, name: &str, inputs: usize, outputs: usize, steps: &[Step]) -> Box<Self> {
        Box::new(Self {
            id: GeneratorId(id),
            name: name.to_string(),
            inputs: RegionSet::with_count(inputs),
            outputs: RegionSet::with_count(outputs),
            steps: steps.iter().copied().collect(),
            next: 0.0,
        })
    }
}

impl Generator for Scripted {
    fn id(&self) -> GeneratorId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn input_regions(&self) -> &RegionSet {
        &self.inputs
    }

    fn input_regions_mut(&mut self) -> &mut RegionSet {
        &mut self.inputs
    }

    fn output_regions(&self) -> &RegionSet {
        &self.outputs
    }

    fn apply_input_region(&mut self) {}

    fn compute_iteration(&mut self, _dt: f64) -> Result<(), GeneratorFault> {
        let step = if self.steps.len() > 1 {
            self.steps.pop_front()
        } else {
            self.steps.front().copied()
        };
        match step {
            Some(Step::Value(v)) => {
                self.next = v;
                Ok(())
            }
            Some(Step::Fault) => Err(GeneratorFault::new("scripted fault")),
            Some(Step::Panic) => panic!("scripted panic"),
            None => Ok(()),
        }
    }

    fn apply_output_region(&mut self) {
        let next = self.next;
        for region in self.outputs.iter_mut() {
            region.write_intensity(next);
        }
    }
}

/// Side effect a hooked generator performs from its region calls
enum Hook {
    PanicOnInput,
    PanicOnOutput,
    /// Offer values to another generator once, from `apply_input_region`
    OfferOnInput(Arc<InputLatch>, GeneratorId, f64),
}

/// Generator with empty computation whose region calls run a hook
struct Hooked {
    id: GeneratorId,
    name: String,
    inputs: RegionSet,
    outputs: RegionSet,
    hook: Option<Hook>,
}

impl Hooked {
    fn new(id: u32, name: &str, hook: Hook) -> Box<Self> {
        Box::new(Self {
            id: GeneratorId(id),
            name: name.to_string(),
            inputs: RegionSet::with_count(1),
            outputs: RegionSet::with_count(1),
            hook: Some(hook),
        })
    }
}

impl Generator for Hooked {
    fn id(&self) -> GeneratorId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn input_regions(&self) -> &RegionSet {
        &self.inputs
    }

    fn input_regions_mut(&mut self) -> &mut RegionSet {
        &mut self.inputs
    }

    fn output_regions(&self) -> &RegionSet {
        &self.outputs
    }

    fn apply_input_region(&mut self) {
        if let Some(Hook::PanicOnInput) = self.hook {
            panic!("input hook");
        }
        if matches!(self.hook, Some(Hook::OfferOnInput(..))) {
            if let Some(Hook::OfferOnInput(latch, target, value)) = self.hook.take() {
                latch.offer(target, vec![Some(value)]);
            }
        }
    }

    fn compute_iteration(&mut self, _dt: f64) -> Result<(), GeneratorFault> {
        Ok(())
    }

    fn apply_output_region(&mut self) {
        if let Some(Hook::PanicOnOutput) = self.hook {
            panic!("output hook");
        }
        for region in self.outputs.iter_mut() {
            region.write_intensity(0.1);
        }
    }
}

struct Harness {
    pipeline: TickPipeline,
    latch: Arc<InputLatch>,
    history: HistoryBoard,
    diagnostics: Arc<Diagnostics>,
    events: broadcast::Receiver<EngineEvent>,
    sink: MemorySink,
    tick: u64,
}

impl Harness {
    fn new(config: EngineConfig) -> Self {
        let latch = Arc::new(InputLatch::new());
        let history = HistoryBoard::new();
        let diagnostics = Arc::new(Diagnostics::new());
        let (tx, events) = broadcast::channel(256);
        let pipeline = TickPipeline::new(
            &config,
            Arc::clone(&latch),
            history.clone(),
            Arc::clone(&diagnostics),
            tx,
        );
        Self {
            pipeline,
            latch,
            history,
            diagnostics,
            events,
            sink: MemorySink::new(),
            tick: 0,
        }
    }

    fn wide() -> Self {
        Self::new(EngineConfig {
            narrow_to_f32: false,
            seed: Some(3),
            ..Default::default()
        })
    }

    fn run(&mut self, registry: &mut GeneratorRegistry) {
        self.pipeline.run(self.tick, registry, &self.sink);
        self.tick += 1;
    }

    fn router(&self, registry: &GeneratorRegistry) -> InboundRouter {
        InboundRouter::new(
            Codec::default(),
            InboundPattern::default(),
            registry.directory(),
            Arc::clone(&self.latch),
            Arc::clone(&self.diagnostics),
        )
    }

    fn sent(&self) -> Vec<WireMessage> {
        let codec = Codec::default();
        self.sink
            .take_frames()
            .iter()
            .map(|f| codec.decode(f).unwrap())
            .collect()
    }

    fn drain_events(&mut self) -> Vec<EngineEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}

fn frame(address: &str, args: Vec<Argument>) -> Vec<u8> {
    Codec::default()
        .encode(&WireMessage::with_args(address, args).unwrap())
        .unwrap()
        .frame
}

fn inputs_of(registry: &GeneratorRegistry, id: u32) -> Vec<f64> {
    registry
        .get(GeneratorId(id))
        .unwrap()
        .input_regions()
        .intensities()
}

#[test]
fn test_empty_registry_tick_still_reschedules() {
    let config = EngineConfig::default();
    let period = config.period();
    let mut scheduler = TickScheduler::new(
        &config,
        GeneratorRegistry::new(),
        Arc::new(InputLatch::new()),
        Arc::new(MemorySink::new()),
    );
    scheduler.start();

    for _ in 0..3 {
        let delay = scheduler.fire().unwrap();
        assert!(delay <= period);
    }
    assert_eq!(scheduler.tick(), 3);
    assert_eq!(scheduler.diagnostics().snapshot().frames_sent, 0);
}

#[test]
fn test_repeated_offer_applies_once() {
    let mut h = Harness::wide();
    let mut registry = GeneratorRegistry::new();
    registry.add(Scripted::new(1, "wave", 2, 1, &[])).unwrap();

    h.latch.offer(GeneratorId(1), vec![Some(0.3), Some(0.6)]);
    h.latch.offer(GeneratorId(1), vec![Some(0.3), Some(0.6)]);
    h.run(&mut registry);

    assert_eq!(inputs_of(&registry, 1), vec![0.3, 0.6]);
    let applied: Vec<_> = h
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, EngineEvent::InputApplied { .. }))
        .collect();
    assert_eq!(applied.len(), 1);

    let snap = h.diagnostics.snapshot();
    assert_eq!((snap.input_args_valid, snap.input_args_total), (2, 2));
}

#[test]
fn test_latest_offer_wins_never_summed() {
    let mut h = Harness::wide();
    let mut registry = GeneratorRegistry::new();
    registry.add(Scripted::new(1, "wave", 1, 1, &[])).unwrap();

    h.latch.offer(GeneratorId(1), vec![Some(0.2)]);
    h.latch.offer(GeneratorId(1), vec![Some(0.7)]);
    h.run(&mut registry);
    assert_eq!(inputs_of(&registry, 1), vec![0.7]);

    // Nothing new offered: the next tick leaves inputs alone
    h.run(&mut registry);
    assert_eq!(inputs_of(&registry, 1), vec![0.7]);
    assert_eq!(h.diagnostics.snapshot().input_args_total, 1);
}

#[test]
fn test_history_saturation_curve() {
    let mut h = Harness::wide();
    let mut registry = GeneratorRegistry::new();
    registry.add(Scripted::new(1, "zero", 0, 2, &[Step::Value(0.0)])).unwrap();
    registry.add(Scripted::new(2, "full", 0, 2, &[Step::Value(1.0)])).unwrap();
    registry.add(Scripted::new(3, "half", 0, 2, &[Step::Value(0.5)])).unwrap();
    registry.add(Scripted::new(4, "none", 0, 0, &[Step::Value(0.5)])).unwrap();
    h.run(&mut registry);

    assert_eq!(h.history.get(GeneratorId(1)).unwrap().latest, 0.0);
    assert_eq!(h.history.get(GeneratorId(2)).unwrap().latest, 1.0);
    assert!((h.history.get(GeneratorId(3)).unwrap().latest - 0.875).abs() < 1e-12);
    assert_eq!(h.history.get(GeneratorId(4)).unwrap().latest, 0.0);
}

#[test]
fn test_refresher_flips_every_tick() {
    let mut h = Harness::wide();
    let mut registry = GeneratorRegistry::new();
    registry.add(Scripted::new(1, "wave", 0, 1, &[Step::Value(0.5)])).unwrap();

    h.run(&mut registry);
    let first = h.history.get(GeneratorId(1)).unwrap();
    h.run(&mut registry);
    let second = h.history.get(GeneratorId(1)).unwrap();

    assert_eq!(first.latest, second.latest);
    assert_ne!(first.fresh, second.fresh);

    let refreshers: Vec<bool> = h
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            EngineEvent::Property(change) if change.key == PropertyKey::HistoryRefresher => {
                match change.value {
                    PropertyValue::Bool(b) => Some(b),
                    _ => None,
                }
            }
            _ => None,
        })
        .collect();
    assert_eq!(refreshers, vec![first.fresh, second.fresh]);
}

#[test]
fn test_overrun_delay_then_recovers() {
    let period = Duration::from_millis(33);
    let mut timing = TickTiming::new(period);
    let t0 = Instant::now();

    assert_eq!(timing.begin_tick(t0), period);
    assert_eq!(timing.next_delay(Duration::from_millis(120)), Duration::ZERO);

    let t1 = t0 + Duration::from_millis(120);
    assert_eq!(timing.begin_tick(t1), Duration::from_millis(120));
    assert_eq!(timing.next_delay(Duration::ZERO), period);
}

#[test]
fn test_inbound_mixed_arguments_scenario() {
    let mut h = Harness::wide();
    let mut registry = GeneratorRegistry::new();
    registry
        .add(Box::new(Relay::new(GeneratorId(1), "wave", 2, 1)))
        .unwrap();
    let router = h.router(&registry);

    router
        .route(&frame("/1", vec![Argument::Double(0.4), Argument::from("bad")]))
        .unwrap();
    h.run(&mut registry);

    assert_eq!(inputs_of(&registry, 1), vec![0.4, 0.0]);
    let snap = h.diagnostics.snapshot();
    assert_eq!(snap.input_args_valid, 1);
    assert_eq!(snap.input_args_total, 2);
    assert!(h.drain_events().contains(&EngineEvent::InputApplied {
        generator: GeneratorId(1),
        valid: 1,
        total: 2,
    }));
}

#[test]
fn test_emission_scenario() {
    let mut h = Harness::wide();
    let mut registry = GeneratorRegistry::new();
    registry.add(Scripted::new(1, "wave", 2, 1, &[Step::Value(0.6)])).unwrap();
    h.run(&mut registry);

    let sent = h.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].address(), "/wave/output/1/float");
    assert_eq!(sent[0].args, vec![Argument::Double(0.6)]);
    assert_eq!(sent[1].address(), "/wave/output");
    assert_eq!(sent[1].args, vec![Argument::Double(0.6)]);
}

#[test]
fn test_emission_follows_registry_order() {
    let mut h = Harness::new(EngineConfig::default());
    let mut registry = GeneratorRegistry::new();
    registry.add(Scripted::new(7, "b", 0, 1, &[Step::Value(0.1)])).unwrap();
    registry.add(Scripted::new(3, "a", 0, 2, &[Step::Value(0.2)])).unwrap();
    h.run(&mut registry);

    let addresses: Vec<String> = h.sent().iter().map(|m| m.address().to_string()).collect();
    assert_eq!(
        addresses,
        vec![
            "/b/output/1/float",
            "/b/output",
            "/a/output/1/float",
            "/a/output/2/float",
            "/a/output",
        ]
    );
}

#[test]
fn test_unknown_generator_discarded() {
    let mut h = Harness::wide();
    let mut registry = GeneratorRegistry::new();
    registry.add(Scripted::new(1, "wave", 1, 1, &[Step::Value(0.5)])).unwrap();
    let router = h.router(&registry);

    let result = router.route(&frame("/99", vec![Argument::Float(0.5)]));
    assert!(matches!(result, Err(TickwireError::UnknownGenerator(_))));
    assert_eq!(h.diagnostics.snapshot().unknown_generator, 1);

    h.run(&mut registry);
    assert_eq!(h.sent().len(), 2);
    assert_eq!(inputs_of(&registry, 1), vec![0.0]);
}

#[test]
fn test_removed_generator_input_skipped() {
    let mut h = Harness::wide();
    let mut registry = GeneratorRegistry::new();
    registry.add(Scripted::new(1, "wave", 1, 1, &[])).unwrap();
    registry.add(Scripted::new(2, "tide", 1, 1, &[])).unwrap();

    h.latch.offer(GeneratorId(1), vec![Some(0.9)]);
    h.latch.offer(GeneratorId(2), vec![Some(0.4)]);
    registry.remove(GeneratorId(1));
    h.run(&mut registry);

    assert_eq!(inputs_of(&registry, 2), vec![0.4]);
    assert_eq!(h.diagnostics.snapshot().input_args_total, 1);
}

#[test]
fn test_compute_fault_holds_previous_output() {
    let mut h = Harness::wide();
    let mut registry = GeneratorRegistry::new();
    registry
        .add(Scripted::new(1, "flaky", 0, 1, &[Step::Value(0.3), Step::Fault, Step::Value(0.9)]))
        .unwrap();
    registry.add(Scripted::new(2, "steady", 0, 1, &[Step::Value(0.5)])).unwrap();

    h.run(&mut registry);
    h.sent();
    h.drain_events();

    h.run(&mut registry);
    let sent = h.sent();
    assert_eq!(sent.len(), 4);
    assert_eq!(sent[0].address(), "/flaky/output/1/float");
    assert_eq!(sent[0].args, vec![Argument::Double(0.3)]);
    assert_eq!(sent[2].address(), "/steady/output/1/float");
    assert_eq!(h.diagnostics.snapshot().compute_faults, 1);
    assert!(h.drain_events().contains(&EngineEvent::ComputeFault {
        generator: GeneratorId(1),
        reason: "scripted fault".into(),
    }));

    h.run(&mut registry);
    assert_eq!(h.sent()[0].args, vec![Argument::Double(0.9)]);
}

#[test]
fn test_compute_panic_is_isolated() {
    let mut h = Harness::wide();
    let mut registry = GeneratorRegistry::new();
    registry
        .add(Scripted::new(1, "broken", 0, 1, &[Step::Value(0.25), Step::Panic, Step::Value(0.5)]))
        .unwrap();
    registry.add(Scripted::new(2, "steady", 0, 1, &[Step::Value(0.5)])).unwrap();

    h.run(&mut registry);
    h.sent();
    h.run(&mut registry);

    let sent = h.sent();
    assert_eq!(sent.len(), 4);
    assert_eq!(sent[0].args, vec![Argument::Double(0.25)]);
    assert_eq!(h.diagnostics.snapshot().compute_faults, 1);
}

#[test]
fn test_disabled_processing_skips_pipeline() {
    let config = EngineConfig {
        processing_enabled: false,
        ..Default::default()
    };
    let period = config.period();
    let sink = Arc::new(MemorySink::new());
    let latch = Arc::new(InputLatch::new());
    let mut registry = GeneratorRegistry::new();
    registry.add(Scripted::new(1, "wave", 1, 1, &[Step::Value(0.5)])).unwrap();

    let mut scheduler = TickScheduler::new(&config, registry, Arc::clone(&latch), sink.clone());
    latch.offer(GeneratorId(1), vec![Some(1.0)]);
    scheduler.start();

    assert_eq!(scheduler.fire(), Some(period));
    assert!(sink.is_empty());
    assert_eq!(latch.pending_count(), 1);
    assert!(scheduler.history_board().is_empty());
}

#[test]
fn test_transport_failure_does_not_stop_tick() {
    let mut h = Harness::wide();
    let mut registry = GeneratorRegistry::new();
    registry.add(Scripted::new(1, "wave", 0, 2, &[Step::Value(0.5)])).unwrap();

    h.sink.set_failing(true);
    h.run(&mut registry);
    h.sink.set_failing(false);
    h.run(&mut registry);

    let snap = h.diagnostics.snapshot();
    assert_eq!(snap.transport_errors, 3);
    assert_eq!(snap.frames_sent, 3);
    assert_eq!(snap.ticks, 2);
}

#[test]
fn test_output_region_panic_is_isolated() {
    let mut h = Harness::wide();
    let mut registry = GeneratorRegistry::new();
    registry.add(Hooked::new(1, "broken", Hook::PanicOnOutput)).unwrap();
    registry.add(Scripted::new(2, "steady", 0, 1, &[Step::Value(0.5)])).unwrap();

    h.run(&mut registry);

    let sent = h.sent();
    assert_eq!(sent.len(), 4);
    // Never written, so the held output is still zero
    assert_eq!(sent[0].address(), "/broken/output/1/float");
    assert_eq!(sent[0].args, vec![Argument::Double(0.0)]);
    assert_eq!(sent[2].address(), "/steady/output/1/float");
    assert_eq!(sent[2].args, vec![Argument::Double(0.5)]);

    let snap = h.diagnostics.snapshot();
    assert_eq!(snap.compute_faults, 1);
    assert_eq!(snap.ticks, 1);
    assert!(h.drain_events().iter().any(|e| matches!(
        e,
        EngineEvent::ComputeFault { generator, reason }
            if *generator == GeneratorId(1) && reason.starts_with("apply_output_region panicked")
    )));
}

#[test]
fn test_input_region_panic_is_isolated() {
    let mut h = Harness::wide();
    let mut registry = GeneratorRegistry::new();
    registry.add(Hooked::new(1, "broken", Hook::PanicOnInput)).unwrap();
    registry.add(Scripted::new(2, "steady", 1, 1, &[Step::Value(0.5)])).unwrap();

    h.latch.offer(GeneratorId(1), vec![Some(0.3)]);
    h.latch.offer(GeneratorId(2), vec![Some(0.6)]);
    h.run(&mut registry);

    assert_eq!(inputs_of(&registry, 2), vec![0.6]);
    let sent = h.sent();
    assert_eq!(sent.len(), 4);
    assert_eq!(sent[2].args, vec![Argument::Double(0.5)]);
    assert_eq!(h.diagnostics.snapshot().compute_faults, 1);
    assert!(h.drain_events().iter().any(|e| matches!(
        e,
        EngineEvent::ComputeFault { generator, reason }
            if *generator == GeneratorId(1) && reason.starts_with("apply_input_region panicked")
    )));
}

#[test]
fn test_region_panic_keeps_scheduler_running() {
    let config = EngineConfig::default();
    let sink = Arc::new(MemorySink::new());
    let mut registry = GeneratorRegistry::new();
    registry.add(Hooked::new(1, "broken", Hook::PanicOnOutput)).unwrap();
    registry.add(Scripted::new(2, "steady", 0, 1, &[Step::Value(0.5)])).unwrap();

    let mut scheduler =
        TickScheduler::new(&config, registry, Arc::new(InputLatch::new()), sink.clone());
    scheduler.start();

    assert!(scheduler.fire().is_some());
    assert!(scheduler.fire().is_some());
    assert_eq!(scheduler.state(), SchedulerState::Scheduled);
    assert_eq!(scheduler.tick(), 2);
    assert_eq!(scheduler.diagnostics().snapshot().compute_faults, 2);
    assert_eq!(sink.len(), 8);
}

#[test]
fn test_offer_during_input_pass_applies_next_tick_once() {
    let mut h = Harness::wide();
    let mut registry = GeneratorRegistry::new();
    registry.add(Scripted::new(1, "wave", 1, 1, &[])).unwrap();
    registry
        .add(Hooked::new(
            2,
            "hook",
            Hook::OfferOnInput(Arc::clone(&h.latch), GeneratorId(1), 0.8),
        ))
        .unwrap();

    h.latch.offer(GeneratorId(1), vec![Some(0.2)]);
    h.run(&mut registry);
    // Offered after this pass drained generator 1
    assert_eq!(inputs_of(&registry, 1), vec![0.2]);
    assert!(h.latch.is_dirty());

    h.run(&mut registry);
    assert_eq!(inputs_of(&registry, 1), vec![0.8]);
    assert!(!h.latch.is_dirty());

    h.run(&mut registry);
    let applied = h
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, EngineEvent::InputApplied { .. }))
        .count();
    assert_eq!(applied, 2);
    assert_eq!(h.diagnostics.snapshot().input_args_total, 2);
}

#[test]
fn test_input_for_removed_generator_is_pruned() {
    let mut h = Harness::wide();
    let mut registry = GeneratorRegistry::new();
    registry.add(Scripted::new(1, "wave", 1, 1, &[])).unwrap();

    // Routed after the removal already ran
    h.latch.offer(GeneratorId(5), vec![Some(0.9)]);
    h.run(&mut registry);

    assert_eq!(h.latch.pending_count(), 0);
    assert_eq!(h.diagnostics.snapshot().input_args_total, 0);
}
