use std::sync::Arc;

use clap_sys::process::CLAP_PROCESS_CONTINUE;

use gantry_core::processor::DirectProcessor;
use gantry_core::{
    state, Block, EventBuffer, NativeEvent, ParameterInfo, ParameterSet, ProcessContext,
    StateError, TimedEvent,
};

use super::*;
use crate::registry::external_id_for;
use crate::testing::{
    midi_event, note_off_event, note_on_event, param_mod_event, param_value_event, sysex_event,
    transport_event, transport_position_event, transport_struct, unknown_space_event, AudioFixture,
    CollectedEvent, EventListFixture, FakeEvent, HostFixture, OutEventsFixture, TestProcessor,
};

/// Everything an engine call borrows, kept alive together.
struct Rig {
    host: HostFixture,
    handle: HostHandle,
    bridge: MainThreadBridge,
    ui: SpscQueue<UiChange>,
    registry: ParamRegistry,
    params: Arc<ParameterSet>,
}

impl Rig {
    fn new(params: &Arc<ParameterSet>) -> Self {
        let host = HostFixture::new();
        // SAFETY: The fixture's clap_host is heap-allocated and outlives the
        // handle for the duration of the test.
        let handle = unsafe { HostHandle::new(host.raw()) };
        Self {
            host,
            handle,
            bridge: MainThreadBridge::new(),
            ui: SpscQueue::with_capacity(64),
            registry: ParamRegistry::build(params).expect("test parameter IDs collide"),
            params: Arc::clone(params),
        }
    }

    fn ctx(&self) -> EngineContext<'_> {
        EngineContext {
            params: &self.params,
            registry: &self.registry,
            bridge: &self.bridge,
            host: &self.handle,
            ui_changes: &self.ui,
        }
    }
}

fn engine(resolution: u32) -> ProcessEngine {
    let config = Config::new("Engine Test", "test.engine").with_event_resolution(resolution);
    let mut engine = ProcessEngine::new(&config);
    engine.set_sample_rate(48_000.0);
    engine
}

fn run<P: Processor>(
    engine: &mut ProcessEngine,
    processor: &mut P,
    rig: &Rig,
    audio: &mut AudioFixture,
    events: Vec<FakeEvent>,
) -> Vec<CollectedEvent> {
    let in_events = EventListFixture::new(events);
    let out_events = OutEventsFixture::new();
    let process = audio.process_struct(None, &in_events, &out_events);
    // SAFETY: All fixture pointers stay alive across the call.
    let status = unsafe { engine.process(processor, &rig.ctx(), &process, true) };
    assert_eq!(status, CLAP_PROCESS_CONTINUE);
    out_events.collected()
}

fn gain_id() -> u32 {
    external_id_for("gain")
}

// =============================================================================
// Block splitting
// =============================================================================

#[test]
fn test_whole_block_single_call() {
    let mut processor = TestProcessor::default();
    let rig = Rig::new(processor.parameters());
    let mut engine = engine(16);
    let mut audio = AudioFixture::new(2, 64, true);

    run(&mut engine, &mut processor, &rig, &mut audio, vec![]);

    assert_eq!(processor.recorded.len(), 1);
    assert_eq!(processor.recorded[0].frames, 64);
    assert_eq!(processor.recorded[0].channels, 2);
}

#[test]
fn test_split_rounds_up_to_resolution() {
    let mut processor = TestProcessor::default();
    processor.stamp_param0 = true;
    let rig = Rig::new(processor.parameters());
    let mut engine = engine(16);
    let mut audio = AudioFixture::new(1, 64, true);

    // An event inside a resolution slot bounds its sub-range at the slot
    // edges: [0,16) before the slot, [16,32) containing the event (applied
    // at 16, four samples early), [32,64) after.
    run(
        &mut engine,
        &mut processor,
        &rig,
        &mut audio,
        vec![param_value_event(20, gain_id(), 1.0)],
    );

    let frames: Vec<usize> = processor.recorded.iter().map(|c| c.frames).collect();
    assert_eq!(frames, [16, 16, 32]);
    let values: Vec<f64> = processor.recorded.iter().map(|c| c.param0).collect();
    assert_eq!(values, [0.5, 1.0, 1.0]);

    assert!(audio.output(0)[..16].iter().all(|&s| s == 0.5));
    assert!(audio.output(0)[16..].iter().all(|&s| s == 1.0));
}

#[test]
fn test_event_on_subblock_edge() {
    let mut processor = TestProcessor::default();
    let rig = Rig::new(processor.parameters());
    let mut engine = engine(16);
    let mut audio = AudioFixture::new(1, 64, true);

    // A timestamp already on a slot boundary splits exactly there and is
    // applied before the sub-range it starts.
    run(
        &mut engine,
        &mut processor,
        &rig,
        &mut audio,
        vec![param_value_event(32, gain_id(), 1.0)],
    );

    let frames: Vec<usize> = processor.recorded.iter().map(|c| c.frames).collect();
    assert_eq!(frames, [32, 32]);
    let values: Vec<f64> = processor.recorded.iter().map(|c| c.param0).collect();
    assert_eq!(values, [0.5, 1.0]);
}

#[test]
fn test_resolution_zero_applies_events_up_front() {
    let mut processor = TestProcessor::default();
    let rig = Rig::new(processor.parameters());
    let mut engine = engine(0);
    let mut audio = AudioFixture::new(1, 512, true);

    run(
        &mut engine,
        &mut processor,
        &rig,
        &mut audio,
        vec![param_value_event(100, gain_id(), 0.25)],
    );

    assert_eq!(processor.recorded.len(), 1);
    assert_eq!(processor.recorded[0].frames, 512);
    assert_eq!(processor.recorded[0].param0, 0.25);
}

#[test]
fn test_events_applied_before_output_samples() {
    let mut processor = TestProcessor::default();
    processor.stamp_param0 = true;
    let rig = Rig::new(processor.parameters());
    let mut engine = engine(1);
    let mut audio = AudioFixture::new(1, 64, true);

    // Sample-accurate splitting: each change takes effect exactly at its
    // timestamp, never after.
    run(
        &mut engine,
        &mut processor,
        &rig,
        &mut audio,
        vec![
            param_value_event(10, gain_id(), 0.1),
            param_value_event(20, gain_id(), 0.2),
            param_value_event(30, gain_id(), 0.3),
        ],
    );

    let out = audio.output(0);
    assert_eq!(out[9], 0.5);
    assert_eq!(out[10], 0.1f64 as f32);
    assert_eq!(out[19], 0.1f64 as f32);
    assert_eq!(out[20], 0.2f64 as f32);
    assert_eq!(out[29], 0.2f64 as f32);
    assert_eq!(out[30], 0.3f64 as f32);
    assert_eq!(out[63], 0.3f64 as f32);
}

#[test]
fn test_late_events_still_applied() {
    let mut processor = TestProcessor::default();
    let rig = Rig::new(processor.parameters());
    let mut engine = engine(16);
    let mut audio = AudioFixture::new(1, 64, true);

    // Malformed host timing: the event timestamp is past the block end. The
    // sample loop never reaches it, but it must still take effect.
    run(
        &mut engine,
        &mut processor,
        &rig,
        &mut audio,
        vec![param_value_event(74, gain_id(), 0.75)],
    );

    assert_eq!(processor.recorded.len(), 1);
    assert_eq!(processor.recorded[0].param0, 0.5);
    assert_eq!(rig.params.get(0).unwrap().normalized(), 0.75);
}

// =============================================================================
// UI drain and outbound events
// =============================================================================

#[test]
fn test_ui_drain_count_matches_outbound() {
    let mut processor = TestProcessor::default();
    let rig = Rig::new(processor.parameters());
    let mut engine = engine(16);
    let mut audio = AudioFixture::new(1, 64, true);

    // "mode" is index 1: stepped 0..3, so normalized 2/3 is declared 2.0.
    let mode_id = external_id_for("mode");
    assert!(rig.ui.push(UiChange {
        kind: UiChangeKind::GestureBegin,
        index: 1,
        normalized: 0.0,
    }));
    assert!(rig.ui.push(UiChange {
        kind: UiChangeKind::Value,
        index: 1,
        normalized: 2.0 / 3.0,
    }));
    assert!(rig.ui.push(UiChange {
        kind: UiChangeKind::GestureEnd,
        index: 1,
        normalized: 0.0,
    }));

    let collected = run(&mut engine, &mut processor, &rig, &mut audio, vec![]);

    // One outbound event per drained queue entry, in order, translated to
    // the declared space.
    assert_eq!(collected.len(), 3);
    assert_eq!(
        collected[0],
        CollectedEvent::Gesture {
            time: 0,
            id: mode_id,
            begin: true
        }
    );
    assert_eq!(
        collected[1],
        CollectedEvent::ParamValue {
            time: 0,
            id: mode_id,
            value: 2.0
        }
    );
    assert_eq!(
        collected[2],
        CollectedEvent::Gesture {
            time: 0,
            id: mode_id,
            begin: false
        }
    );
    assert!(rig.ui.is_empty());
}

#[test]
fn test_out_events_rebased_to_block() {
    let mut processor = TestProcessor::default();
    processor.emit = vec![TimedEvent {
        time: 1,
        event: NativeEvent::NoteEnd {
            key: 60,
            channel: 0,
            voice_id: 9,
        },
    }];
    let rig = Rig::new(processor.parameters());
    let mut engine = engine(16);
    let mut audio = AudioFixture::new(1, 64, true);

    // The split at 32 produces two sub-ranges; the per-sub-range offset 1
    // lands at 1 and 33 in block time.
    let collected = run(
        &mut engine,
        &mut processor,
        &rig,
        &mut audio,
        vec![param_value_event(32, gain_id(), 1.0)],
    );

    let note_ends: Vec<u32> = collected
        .iter()
        .filter_map(|e| match e {
            CollectedEvent::NoteEnd { time, voice_id: 9, .. } => Some(*time),
            _ => None,
        })
        .collect();
    assert_eq!(note_ends, [1, 33]);
}

#[test]
fn test_host_rejecting_outbound_queue_is_tolerated() {
    let mut processor = TestProcessor::default();
    processor.emit = vec![TimedEvent {
        time: 0,
        event: NativeEvent::Midi {
            data: [0x90, 60, 100],
        },
    }];
    let rig = Rig::new(processor.parameters());
    let mut engine = engine(16);
    let mut audio = AudioFixture::new(1, 32, true);

    assert!(rig.ui.push(UiChange {
        kind: UiChangeKind::Value,
        index: 0,
        normalized: 0.9,
    }));

    // A host that refuses every push loses the events; processing itself
    // must carry on unbothered.
    let in_events = EventListFixture::new(vec![]);
    let out_events = OutEventsFixture::with_reject(true);
    let process = audio.process_struct(None, &in_events, &out_events);
    // SAFETY: All fixture pointers stay alive across the call.
    let status = unsafe { engine.process(&mut processor, &rig.ctx(), &process, true) };
    assert_eq!(status, CLAP_PROCESS_CONTINUE);

    assert!(out_events.collected().is_empty());
    assert_eq!(processor.recorded.len(), 1);
    assert!(rig.ui.is_empty());
}

// =============================================================================
// Buffer unification
// =============================================================================

#[test]
fn test_in_place_input_not_copied() {
    let mut processor = TestProcessor::default();
    let rig = Rig::new(processor.parameters());
    let mut engine = engine(0);
    let mut audio = AudioFixture::new(1, 32, true);

    let ramp: Vec<f32> = (0..32).map(|i| i as f32).collect();
    audio.input_mut(0).copy_from_slice(&ramp);

    run(&mut engine, &mut processor, &rig, &mut audio, vec![]);

    // Aliased storage passes through untouched: the processor saw the ramp
    // and nothing overwrote it.
    assert_eq!(processor.recorded[0].entry_samples, ramp);
    assert_eq!(audio.output(0), &ramp[..]);
}

#[test]
fn test_distinct_buffers_copied_before_processing() {
    let mut processor = TestProcessor::default();
    let rig = Rig::new(processor.parameters());
    let mut engine = engine(0);
    let mut audio = AudioFixture::new(2, 32, false);

    let ramp: Vec<f32> = (0..32).map(|i| 1.0 + i as f32).collect();
    audio.input_mut(0).copy_from_slice(&ramp);

    run(&mut engine, &mut processor, &rig, &mut audio, vec![]);

    // The wrapped model reads and writes the same storage, so distinct input
    // buffers must land in the unified (output) channels first.
    assert_eq!(processor.recorded[0].entry_samples, ramp);
    assert_eq!(audio.output(0), &ramp[..]);
}

#[test]
fn test_suspended_emits_silence() {
    let mut processor = TestProcessor::default();
    processor.suspended = true;
    let rig = Rig::new(processor.parameters());
    let mut engine = engine(16);
    let mut audio = AudioFixture::new(2, 512, true);

    audio.input_mut(0).fill(0.8);
    audio.input_mut(1).fill(-0.8);

    run(
        &mut engine,
        &mut processor,
        &rig,
        &mut audio,
        vec![param_value_event(0, gain_id(), 0.75)],
    );

    // The processor was never called, the output is a valid silent block,
    // and automation still landed in the parameter slots.
    assert!(processor.recorded.is_empty());
    assert!(audio.output(0).iter().all(|&s| s == 0.0));
    assert!(audio.output(1).iter().all(|&s| s == 0.0));
    assert_eq!(rig.params.get(0).unwrap().normalized(), 0.75);
}

// =============================================================================
// Event translation
// =============================================================================

#[test]
fn test_note_and_midi_translation() {
    let mut processor = TestProcessor::default();
    let rig = Rig::new(processor.parameters());
    let mut engine = engine(16);
    let mut audio = AudioFixture::new(1, 64, true);

    let payload = [0xF0u8, 0x41, 0x10, 0xF7];
    run(
        &mut engine,
        &mut processor,
        &rig,
        &mut audio,
        vec![
            note_on_event(3, 60, 0, 0.8),
            note_off_event(4, 60, 0, 0.5),
            midi_event(5, [0xB0, 1, 64]),
            sysex_event(7, &payload),
        ],
    );

    assert_eq!(processor.recorded.len(), 1);
    let events = &processor.recorded[0].events;
    assert_eq!(events.len(), 4);
    assert_eq!(
        events[0],
        TimedEvent {
            time: 3,
            event: NativeEvent::NoteOn {
                key: 60,
                channel: 0,
                velocity: 0.8f64 as f32,
                voice_id: -1,
            },
        }
    );
    assert_eq!(
        events[1],
        TimedEvent {
            time: 4,
            event: NativeEvent::NoteOff {
                key: 60,
                channel: 0,
                velocity: 0.5f64 as f32,
                voice_id: -1,
            },
        }
    );
    assert_eq!(
        events[2],
        TimedEvent {
            time: 5,
            event: NativeEvent::Midi {
                data: [0xB0, 1, 64]
            },
        }
    );
    match events[3] {
        TimedEvent {
            time: 7,
            event: NativeEvent::SysEx { len, .. },
        } => assert_eq!(len as usize, payload.len()),
        ref other => panic!("unexpected event: {other:?}"),
    }
}

#[test]
fn test_transport_event_updates_snapshot() {
    let mut processor = TestProcessor::default();
    let rig = Rig::new(processor.parameters());
    let mut engine = engine(16);
    let mut audio = AudioFixture::new(1, 64, true);

    run(
        &mut engine,
        &mut processor,
        &rig,
        &mut audio,
        vec![transport_event(32, 140.0)],
    );

    // No transport pointer on the call itself; the mid-block transport event
    // splits and retempos the second sub-range.
    assert_eq!(processor.recorded.len(), 2);
    assert_eq!(processor.recorded[0].tempo, None);
    assert_eq!(processor.recorded[1].tempo, Some(140.0));
}

#[test]
fn test_call_transport_advances_across_subranges() {
    let mut processor = TestProcessor::default();
    let rig = Rig::new(processor.parameters());
    let mut engine = engine(16);
    let mut audio = AudioFixture::new(1, 64, true);

    let transport = transport_struct(120.0, 2.0);
    let in_events = EventListFixture::new(vec![param_value_event(32, gain_id(), 1.0)]);
    let out_events = OutEventsFixture::new();
    let process = audio.process_struct(Some(&transport as *const _), &in_events, &out_events);
    // SAFETY: All fixture pointers stay alive across the call.
    let status = unsafe { engine.process(&mut processor, &rig.ctx(), &process, true) };
    assert_eq!(status, CLAP_PROCESS_CONTINUE);

    // The call-level snapshot is valid at sample 0; the second sub-range
    // starts 32 samples later.
    assert_eq!(processor.recorded.len(), 2);
    assert_eq!(processor.recorded[0].pos_seconds, Some(2.0));
    assert_eq!(
        processor.recorded[1].pos_seconds,
        Some(2.0 + 32.0 / 48_000.0)
    );
}

#[test]
fn test_transport_event_resets_advance_origin() {
    let mut processor = TestProcessor::default();
    let rig = Rig::new(processor.parameters());
    let mut engine = engine(16);
    let mut audio = AudioFixture::new(1, 64, true);

    // The event repositions the timeline at sample 32; the sub-range it
    // starts must see exactly that position, with no extra advance.
    run(
        &mut engine,
        &mut processor,
        &rig,
        &mut audio,
        vec![transport_position_event(32, 120.0, 10.0)],
    );

    assert_eq!(processor.recorded.len(), 2);
    assert_eq!(processor.recorded[0].pos_seconds, None);
    assert_eq!(processor.recorded[1].pos_seconds, Some(10.0));
}

#[test]
fn test_unknown_namespace_ignored() {
    let mut processor = TestProcessor::default();
    let rig = Rig::new(processor.parameters());
    let mut engine = engine(16);
    let mut audio = AudioFixture::new(1, 64, true);

    run(
        &mut engine,
        &mut processor,
        &rig,
        &mut audio,
        vec![unknown_space_event(4)],
    );

    // Forward compatibility: the event changes nothing and splits nothing.
    assert_eq!(processor.recorded.len(), 1);
    assert!(processor.recorded[0].events.is_empty());
    assert_eq!(rig.params.get(0).unwrap().normalized(), 0.5);
}

// =============================================================================
// Modulation
// =============================================================================

#[test]
fn test_mono_modulation_offsets_effective_value() {
    let mut processor = TestProcessor::default();
    let rig = Rig::new(processor.parameters());
    let mut engine = engine(16);
    let mut audio = AudioFixture::new(1, 64, true);

    // "depth" is index 3, monophonic-modulatable, continuous.
    let depth_id = external_id_for("depth");
    run(
        &mut engine,
        &mut processor,
        &rig,
        &mut audio,
        vec![param_mod_event(0, depth_id, 0.25, -1)],
    );

    let depth = rig.params.get(3).unwrap();
    assert_eq!(depth.modulation(), 0.25);
    assert_eq!(depth.effective(), 0.75);
    // The base value is untouched by modulation.
    assert_eq!(depth.normalized(), 0.5);
}

#[test]
fn test_poly_modulation_forwarded_as_native_event() {
    let mut processor = TestProcessor::default();
    let rig = Rig::new(processor.parameters());
    let mut engine = engine(16);
    let mut audio = AudioFixture::new(1, 64, true);

    // "cutoff" is index 2, poly-modulatable. Per-voice offsets become native
    // events and do not bound sub-ranges.
    let cutoff_id = external_id_for("cutoff");
    run(
        &mut engine,
        &mut processor,
        &rig,
        &mut audio,
        vec![param_mod_event(8, cutoff_id, 0.1, 7)],
    );

    assert_eq!(processor.recorded.len(), 1);
    assert_eq!(
        processor.recorded[0].events,
        [TimedEvent {
            time: 8,
            event: NativeEvent::PolyModulation {
                index: 2,
                voice_id: 7,
                offset: 0.1,
            },
        }]
    );
    // The monophonic slot stays clear.
    assert_eq!(rig.params.get(2).unwrap().modulation(), 0.0);
}

// =============================================================================
// Direct processing
// =============================================================================

struct DirectTestProcessor {
    params: Arc<ParameterSet>,
    calls: Vec<(usize, Vec<TimedEvent>)>,
}

impl Default for DirectTestProcessor {
    fn default() -> Self {
        Self {
            params: Arc::new(ParameterSet::new(vec![ParameterInfo::new("gain", "Gain")])),
            calls: Vec::new(),
        }
    }
}

impl Processor for DirectTestProcessor {
    fn parameters(&self) -> &Arc<ParameterSet> {
        &self.params
    }

    fn wants_notes(&self) -> bool {
        true
    }

    fn process(
        &mut self,
        _block: &mut Block<'_>,
        _events: &EventBuffer,
        _out: &mut EventBuffer,
        _ctx: &ProcessContext<'_>,
    ) {
        panic!("direct processors bypass the split loop");
    }

    fn save_state(&mut self, out: &mut Vec<u8>) -> Result<(), StateError> {
        state::save_parameters(&self.params, out)
    }

    fn load_state(&mut self, bytes: &[u8]) -> Result<(), StateError> {
        state::load_parameters(&self.params, bytes)
    }

    fn direct(&mut self) -> Option<&mut dyn DirectProcessor> {
        Some(self)
    }
}

impl DirectProcessor for DirectTestProcessor {
    fn process_direct(
        &mut self,
        block: &mut Block<'_>,
        events: &EventBuffer,
        _out: &mut EventBuffer,
        _ctx: &ProcessContext<'_>,
    ) {
        self.calls.push((block.frames(), events.events().to_vec()));
    }
}

#[test]
fn test_direct_processor_takes_whole_block() {
    let mut processor = DirectTestProcessor::default();
    let rig = Rig::new(processor.parameters());
    let mut engine = engine(16);
    let mut audio = AudioFixture::new(1, 64, true);

    run(
        &mut engine,
        &mut processor,
        &rig,
        &mut audio,
        vec![
            param_value_event(10, gain_id(), 0.9),
            note_on_event(20, 64, 0, 1.0),
        ],
    );

    // One call over the full block; parameter values arrive both as slot
    // writes and as native events.
    assert_eq!(processor.calls.len(), 1);
    let (frames, events) = &processor.calls[0];
    assert_eq!(*frames, 64);
    assert_eq!(
        events[0],
        TimedEvent {
            time: 10,
            event: NativeEvent::ParamValue {
                index: 0,
                normalized: 0.9,
            },
        }
    );
    assert!(matches!(
        events[1],
        TimedEvent {
            time: 20,
            event: NativeEvent::NoteOn { key: 64, .. },
        }
    ));
    assert_eq!(rig.params.get(0).unwrap().normalized(), 0.9);
    // The slot change was relayed for main-thread listener replay.
    assert!(rig.host.callback_requests() >= 1);
}

// =============================================================================
// Flush
// =============================================================================

#[test]
fn test_flush_applies_param_events() {
    let mut processor = TestProcessor::default();
    let rig = Rig::new(processor.parameters());
    let mut engine = engine(16);

    assert!(rig.ui.push(UiChange {
        kind: UiChangeKind::Value,
        index: 0,
        normalized: 0.3,
    }));

    let in_events = EventListFixture::new(vec![param_value_event(0, gain_id(), 0.25)]);
    let out_events = OutEventsFixture::new();
    // SAFETY: Fixture pointers stay alive across the call.
    unsafe {
        engine.flush(
            &mut processor,
            &rig.ctx(),
            in_events.raw(),
            out_events.raw(),
        );
    }

    // Host-driven values land without any audio; pending UI edits go out.
    assert_eq!(rig.params.get(0).unwrap().normalized(), 0.25);
    let collected = out_events.collected();
    assert_eq!(collected.len(), 1);
    assert_eq!(
        collected[0],
        CollectedEvent::ParamValue {
            time: 0,
            id: gain_id(),
            value: 0.3,
        }
    );
}
