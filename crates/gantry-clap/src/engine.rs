//! The per-block real-time process engine.
//!
//! One call to [`ProcessEngine::process`] handles one host audio block:
//!
//! 1. snapshot the transport (a transient host pointer, valid only for this
//!    call),
//! 2. drain the UI→audio queue into the host's outbound event queue,
//! 3. hand the whole block to a direct processor if that capability is
//!    present,
//! 4. otherwise walk the block in sub-ranges bounded by the configured
//!    resolution and the timestamps of parameter/transport events,
//! 5. apply the events that fall into each sub-range, then run the
//!    processor over it,
//! 6. relay processor output events with offsets rebased to the full block,
//! 7. apply any events with out-of-range timestamps after the loop.
//!
//! Sub-block policy: with resolution `R > 0`, sub-ranges are aligned to
//! multiples of `R`. An event inside the current `R` slot extends the
//! sub-range to the event's timestamp rounded up to the next multiple and is
//! applied at the sub-range start, at most `R - 1` samples early; an event
//! on a later slot boundary splits exactly at that boundary. `R == 0`
//! processes the whole block with every event applied up front.

use std::slice;

use clap_sys::audio_buffer::clap_audio_buffer;
use clap_sys::events::{
    clap_event_header, clap_event_midi, clap_event_midi_sysex, clap_event_note,
    clap_event_param_mod, clap_event_param_value, clap_event_transport,
    CLAP_CORE_EVENT_SPACE_ID, CLAP_EVENT_MIDI, CLAP_EVENT_MIDI_SYSEX, CLAP_EVENT_NOTE_CHOKE,
    CLAP_EVENT_NOTE_OFF, CLAP_EVENT_NOTE_ON, CLAP_EVENT_PARAM_MOD, CLAP_EVENT_PARAM_VALUE,
    CLAP_EVENT_TRANSPORT, CLAP_TRANSPORT_HAS_BEATS_TIMELINE, CLAP_TRANSPORT_HAS_SECONDS_TIMELINE,
    CLAP_TRANSPORT_HAS_TEMPO, CLAP_TRANSPORT_HAS_TIME_SIGNATURE, CLAP_TRANSPORT_IS_LOOP_ACTIVE,
    CLAP_TRANSPORT_IS_PLAYING, CLAP_TRANSPORT_IS_RECORDING,
};
use clap_sys::fixedpoint::{CLAP_BEATTIME_FACTOR, CLAP_SECTIME_FACTOR};
use clap_sys::process::{clap_process, clap_process_status, CLAP_PROCESS_CONTINUE};

use gantry_core::{
    Block, Config, EventBuffer, NativeEvent, ParameterSet, ProcessContext, Processor, Transport,
    MAX_CHANNELS,
};

use crate::bridge::{MainThreadBridge, Task};
use crate::events::{cast_event, InEvents, OutSink};
use crate::host::HostHandle;
use crate::queue::SpscQueue;
use crate::registry::ParamRegistry;
use crate::translate;

/// What a UI-side parameter edit queued for the audio thread.
#[derive(Debug, Clone, Copy)]
pub struct UiChange {
    /// The kind of edit.
    pub kind: UiChangeKind,
    /// Index into the parameter set.
    pub index: u32,
    /// Normalized value for [`UiChangeKind::Value`]; unused otherwise.
    pub normalized: f64,
}

/// Kind of UI-side parameter edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiChangeKind {
    /// The value changed.
    Value,
    /// An automation gesture started.
    GestureBegin,
    /// An automation gesture ended.
    GestureEnd,
}

/// Shared references the engine needs per call.
pub struct EngineContext<'a> {
    /// The processor's parameter slots.
    pub params: &'a ParameterSet,
    /// The identity registry.
    pub registry: &'a ParamRegistry,
    /// The audio→main notification bridge.
    pub bridge: &'a MainThreadBridge,
    /// The host handle.
    pub host: &'a HostHandle,
    /// Pending UI-side parameter edits.
    pub ui_changes: &'a SpscQueue<UiChange>,
}

/// Per-instance engine state: the split policy plus every pre-allocated
/// buffer the audio path reuses.
pub struct ProcessEngine {
    resolution: u32,
    sample_rate: f64,
    /// Unified in/out channel pointers, rebuilt every call. Valid only for
    /// the duration of one `process` call.
    channel_ptrs: Vec<*mut f32>,
    events_in: EventBuffer,
    events_out: EventBuffer,
}

impl ProcessEngine {
    /// Create an engine from the plugin configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            resolution: config.event_resolution,
            sample_rate: 0.0,
            channel_ptrs: Vec::with_capacity(MAX_CHANNELS),
            events_in: EventBuffer::with_capacity_and_sysex(
                config.event_capacity,
                config.sysex_slots,
                config.sysex_buffer_size,
            ),
            events_out: EventBuffer::with_capacity_and_sysex(
                config.event_capacity,
                config.sysex_slots,
                config.sysex_buffer_size,
            ),
        }
    }

    /// Record the sample rate from activation.
    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
    }

    /// Drive one host audio block.
    ///
    /// # Safety
    ///
    /// `process` must be a valid `clap_process` for the duration of the
    /// call, with buffers valid for `frames_count` samples. Must only be
    /// called from the host's audio thread.
    pub unsafe fn process<P: Processor>(
        &mut self,
        processor: &mut P,
        ctx: &EngineContext<'_>,
        process: &clap_process,
        active: bool,
    ) -> clap_process_status {
        let frames = process.frames_count;

        // SAFETY: The caller guarantees the event list pointers are valid
        // for this call.
        let in_events = unsafe { InEvents::new(process.in_events) };
        // SAFETY: As above for the output queue.
        let out = unsafe { OutSink::new(process.out_events) };

        // The transport pointer is a transient reference from the host; the
        // snapshot must not outlive this call. Transport events inside the
        // block replace it, and `transport_base` tracks the sample offset the
        // current snapshot is valid at so later sub-ranges advance from
        // there, not from the block start.
        let mut transport = if process.transport.is_null() {
            Transport::UNAVAILABLE
        } else {
            // SAFETY: Non-null transport is valid for this call per the
            // process contract.
            convert_transport(unsafe { &*process.transport })
        };
        let mut transport_base = 0u32;

        // UI-driven changes go out first so the host learns about them this
        // block, ahead of any processor-produced events.
        self.drain_ui_changes(ctx, &out);

        // SAFETY: Caller guarantees buffer validity; unification may copy
        // input samples into output storage.
        unsafe { self.unify_buffers(process, frames) };

        let suspended = !active || processor.is_suspended();
        if suspended {
            // A suspended processor still must produce a valid (silent)
            // block, and parameter state still tracks automation.
            // SAFETY: Output pointers collected by unify_buffers are valid
            // for `frames` samples.
            unsafe { self.silence_outputs(process, frames) };
            let mut event_idx = 0u32;
            while let Some(header) = in_events.get(event_idx) {
                self.apply_event(
                    header,
                    0,
                    ctx,
                    &mut transport,
                    &mut transport_base,
                    false,
                    false,
                );
                event_idx += 1;
            }
            self.events_in.clear();
            return CLAP_PROCESS_CONTINUE;
        }

        let wants_notes = processor.wants_notes();
        let produces_notes = processor.produces_notes();
        let steady_time = process.steady_time;

        // Direct processing: the processor opted out of our interleaving and
        // takes the whole block with the full translated event stream.
        if processor.direct().is_some() {
            let mut event_idx = 0u32;
            while let Some(header) = in_events.get(event_idx) {
                self.apply_event(
                    header,
                    0,
                    ctx,
                    &mut transport,
                    &mut transport_base,
                    wants_notes,
                    true,
                );
                event_idx += 1;
            }

            let process_ctx = ProcessContext {
                transport: &transport,
                steady_time,
                sample_rate: self.sample_rate,
            };
            // SAFETY: channel_ptrs was just built from host pointers valid
            // for `frames` samples.
            let mut block =
                unsafe { Block::from_raw(&self.channel_ptrs, frames as usize) };
            if let Some(direct) = processor.direct() {
                direct.process_direct(
                    &mut block,
                    &self.events_in,
                    &mut self.events_out,
                    &process_ctx,
                );
            }

            self.flush_out_events(&out, 0, frames, produces_notes);
            self.events_in.clear();
            self.events_out.clear();
            return CLAP_PROCESS_CONTINUE;
        }

        // Sub-block interleaving loop.
        let num_events = in_events.len();
        let mut event_idx = 0u32;
        let mut block_start = 0u32;

        while block_start < frames {
            // Apply events at or before the sub-range start.
            while let Some(header) = in_events.get(event_idx) {
                if header.time > block_start {
                    break;
                }
                self.apply_event(
                    header,
                    block_start,
                    ctx,
                    &mut transport,
                    &mut transport_base,
                    wants_notes,
                    false,
                );
                event_idx += 1;
            }

            // Find the next event of interest to bound this sub-range.
            let mut next_interesting = None;
            for i in event_idx..num_events {
                if let Some(header) = in_events.get(i) {
                    if header.time > block_start && self.splits_block(header, ctx) {
                        next_interesting = Some(header.time);
                        break;
                    }
                }
            }
            let block_end = self.split_point(block_start, next_interesting, frames);

            // Apply the remaining events that fall inside the sub-range.
            while let Some(header) = in_events.get(event_idx) {
                if header.time >= block_end {
                    break;
                }
                self.apply_event(
                    header,
                    block_start,
                    ctx,
                    &mut transport,
                    &mut transport_base,
                    wants_notes,
                    false,
                );
                event_idx += 1;
            }

            // Run the processor over [block_start, block_end).
            let sub_frames = (block_end - block_start) as usize;
            let sub_transport =
                transport.advanced_by(block_start - transport_base, self.sample_rate);
            let process_ctx = ProcessContext {
                transport: &sub_transport,
                steady_time: if steady_time >= 0 {
                    steady_time + block_start as i64
                } else {
                    steady_time
                },
                sample_rate: self.sample_rate,
            };

            debug_assert!(self.channel_ptrs.len() <= MAX_CHANNELS);
            let base = block_start as usize;
            // Shift each unified channel pointer to the sub-range start. The
            // storage is reused across iterations.
            let mut sub_ptrs = [std::ptr::null_mut::<f32>(); MAX_CHANNELS];
            for (slot, &ptr) in sub_ptrs.iter_mut().zip(self.channel_ptrs.iter()) {
                // SAFETY: `ptr` is valid for `frames` samples and
                // `base + sub_frames <= frames`, so the offset stays in
                // bounds.
                *slot = unsafe { ptr.add(base) };
            }
            let channel_count = self.channel_ptrs.len();
            // SAFETY: Each shifted pointer is valid for `sub_frames`
            // samples as established above.
            let mut block =
                unsafe { Block::from_raw(&sub_ptrs[..channel_count], sub_frames) };

            processor.process(&mut block, &self.events_in, &mut self.events_out, &process_ctx);

            self.flush_out_events(&out, block_start, frames, produces_notes);
            self.events_in.clear();
            self.events_out.clear();

            block_start = block_end;
        }

        // Events stamped at or past the end of the block never enter the
        // sample loop but must still take effect, in order. Note events have
        // no audio left to land in and are dropped.
        while let Some(header) = in_events.get(event_idx) {
            debug_assert!(
                header.time >= frames,
                "in-range event survived the sample loop"
            );
            self.apply_event(
                header,
                frames,
                ctx,
                &mut transport,
                &mut transport_base,
                false,
                false,
            );
            event_idx += 1;
        }
        self.events_in.clear();

        CLAP_PROCESS_CONTINUE
    }

    /// Apply parameter events outside the audio path (the params `flush`
    /// entry point). Also drains pending UI changes to the host.
    ///
    /// # Safety
    ///
    /// The raw event list pointers must be valid for the duration of the
    /// call.
    pub unsafe fn flush<P: Processor>(
        &mut self,
        _processor: &mut P,
        ctx: &EngineContext<'_>,
        in_events_raw: *const clap_sys::events::clap_input_events,
        out_events_raw: *const clap_sys::events::clap_output_events,
    ) {
        // SAFETY: Caller guarantees list validity.
        let in_events = unsafe { InEvents::new(in_events_raw) };
        // SAFETY: As above.
        let out = unsafe { OutSink::new(out_events_raw) };

        let mut transport = Transport::UNAVAILABLE;
        let mut transport_base = 0u32;
        let mut event_idx = 0u32;
        while let Some(header) = in_events.get(event_idx) {
            self.apply_event(
                header,
                0,
                ctx,
                &mut transport,
                &mut transport_base,
                false,
                false,
            );
            event_idx += 1;
        }
        self.events_in.clear();

        self.drain_ui_changes(ctx, &out);
    }

    // =========================================================================
    // Event application
    // =========================================================================

    /// Translate and apply one inbound event.
    ///
    /// Parameter and transport payloads take effect immediately; note/MIDI
    /// payloads are buffered for the processor with `block_start`-relative
    /// offsets (when `wants_notes`). With `include_param_events`, parameter
    /// values are additionally buffered as native events for direct
    /// processors.
    #[allow(clippy::too_many_arguments)]
    fn apply_event(
        &mut self,
        header: &clap_event_header,
        block_start: u32,
        ctx: &EngineContext<'_>,
        transport: &mut Transport,
        transport_base: &mut u32,
        wants_notes: bool,
        include_param_events: bool,
    ) {
        // Events from unrecognized namespaces are ignored for forward
        // compatibility.
        if header.space_id != CLAP_CORE_EVENT_SPACE_ID {
            return;
        }

        let rel_time = header.time.saturating_sub(block_start);

        match header.type_ {
            CLAP_EVENT_NOTE_ON => {
                // SAFETY: Header comes from the host's event list; cast_event
                // checks the declared size.
                if let Some(event) = unsafe { cast_event::<clap_event_note>(header) } {
                    if wants_notes {
                        self.events_in.push(
                            rel_time,
                            NativeEvent::NoteOn {
                                key: event.key.clamp(0, 127) as u8,
                                channel: event.channel.clamp(0, 15) as u8,
                                velocity: event.velocity as f32,
                                voice_id: event.note_id,
                            },
                        );
                    }
                }
            }
            CLAP_EVENT_NOTE_OFF | CLAP_EVENT_NOTE_CHOKE => {
                // SAFETY: As above.
                if let Some(event) = unsafe { cast_event::<clap_event_note>(header) } {
                    if wants_notes {
                        let velocity = if header.type_ == CLAP_EVENT_NOTE_CHOKE {
                            0.0
                        } else {
                            event.velocity as f32
                        };
                        self.events_in.push(
                            rel_time,
                            NativeEvent::NoteOff {
                                key: event.key.clamp(0, 127) as u8,
                                channel: event.channel.clamp(0, 15) as u8,
                                velocity,
                                voice_id: event.note_id,
                            },
                        );
                    }
                }
            }
            CLAP_EVENT_MIDI => {
                // SAFETY: As above.
                if let Some(event) = unsafe { cast_event::<clap_event_midi>(header) } {
                    if wants_notes {
                        self.events_in.push(rel_time, NativeEvent::Midi { data: event.data });
                    }
                }
            }
            CLAP_EVENT_MIDI_SYSEX => {
                // SAFETY: As above; the payload pointer is valid for this
                // call per the process contract.
                if let Some(event) = unsafe { cast_event::<clap_event_midi_sysex>(header) } {
                    if wants_notes && !event.buffer.is_null() {
                        // SAFETY: Host guarantees `buffer` valid for `size`
                        // bytes during this call; push_sysex copies.
                        let payload = unsafe {
                            slice::from_raw_parts(event.buffer, event.size as usize)
                        };
                        self.events_in.push_sysex(rel_time, payload);
                    }
                }
            }
            CLAP_EVENT_PARAM_VALUE => {
                // SAFETY: As above.
                if let Some(event) = unsafe { cast_event::<clap_event_param_value>(header) } {
                    self.apply_param_value(event, rel_time, ctx, include_param_events);
                }
            }
            CLAP_EVENT_PARAM_MOD => {
                // SAFETY: As above.
                if let Some(event) = unsafe { cast_event::<clap_event_param_mod>(header) } {
                    self.apply_param_mod(event, rel_time, ctx);
                }
            }
            CLAP_EVENT_TRANSPORT => {
                // SAFETY: As above.
                if let Some(event) = unsafe { cast_event::<clap_event_transport>(header) } {
                    // The new snapshot describes the sub-range it is applied
                    // at, so later sub-ranges advance relative to here.
                    *transport = convert_transport(event);
                    *transport_base = block_start;
                }
            }
            // Gesture echoes and any future core event types are not ours to
            // act on.
            _ => {}
        }
    }

    fn apply_param_value(
        &mut self,
        event: &clap_event_param_value,
        rel_time: u32,
        ctx: &EngineContext<'_>,
        include_param_events: bool,
    ) {
        // The ID is re-resolved through the registry on every event; a
        // stale or foreign ID is a host protocol violation and the event is
        // dropped.
        let Some(entry) = ctx.registry.by_external_id(event.param_id) else {
            debug_assert!(false, "param value event for unknown ID {:#x}", event.param_id);
            log::warn!("dropping param value event for unknown ID {:#x}", event.param_id);
            return;
        };

        let normalized = translate::to_normalized(entry, event.value);
        let Some(param) = ctx.params.get(entry.index) else {
            return;
        };
        if param.set_normalized(normalized) {
            // Listener notification is deferred to the main thread.
            ctx.bridge.post(
                ctx.host,
                Task::ParamValueChanged {
                    index: entry.index as u32,
                    normalized,
                },
            );
        }

        if include_param_events {
            self.events_in.push(
                rel_time,
                NativeEvent::ParamValue {
                    index: entry.index as u32,
                    normalized,
                },
            );
        }
    }

    fn apply_param_mod(
        &mut self,
        event: &clap_event_param_mod,
        rel_time: u32,
        ctx: &EngineContext<'_>,
    ) {
        let Some(entry) = ctx.registry.by_external_id(event.param_id) else {
            debug_assert!(false, "param mod event for unknown ID {:#x}", event.param_id);
            log::warn!("dropping param mod event for unknown ID {:#x}", event.param_id);
            return;
        };

        let offset = translate::offset_to_normalized(entry, event.amount);

        if event.note_id != -1 {
            if entry.poly_modulatable {
                self.events_in.push(
                    rel_time,
                    NativeEvent::PolyModulation {
                        index: entry.index as u32,
                        voice_id: event.note_id,
                        offset,
                    },
                );
                return;
            }
            debug_assert!(
                false,
                "per-voice modulation for parameter without poly support"
            );
            // Fall through and treat it as monophonic if the parameter at
            // least supports that.
        }

        if entry.modulatable {
            if let Some(param) = ctx.params.get(entry.index) {
                param.set_modulation(offset);
            }
        } else {
            debug_assert!(false, "modulation event for non-modulatable parameter");
            log::warn!(
                "dropping modulation event for non-modulatable param {:#x}",
                event.param_id
            );
        }
    }

    // =========================================================================
    // Outbound events
    // =========================================================================

    /// Forward UI-originated parameter edits to the host, translated to the
    /// declared value space. One outbound event per drained queue entry.
    fn drain_ui_changes(&self, ctx: &EngineContext<'_>, out: &OutSink) {
        while let Some(change) = ctx.ui_changes.pop() {
            let Some(entry) = ctx.registry.entry_at(change.index as usize) else {
                debug_assert!(false, "UI change for unknown parameter index");
                continue;
            };
            match change.kind {
                UiChangeKind::Value => {
                    let declared = translate::to_declared(entry, change.normalized);
                    out.push_param_value(0, entry.external_id, declared, true);
                }
                UiChangeKind::GestureBegin => {
                    out.push_param_gesture(0, entry.external_id, true);
                }
                UiChangeKind::GestureEnd => {
                    out.push_param_gesture(0, entry.external_id, false);
                }
            }
        }
    }

    /// Relay processor-produced events to the host, rebasing sub-block
    /// offsets to the full block and preserving emission order.
    fn flush_out_events(&self, out: &OutSink, block_start: u32, frames: u32, produces_notes: bool) {
        let last = frames.saturating_sub(1);
        for timed in self.events_out.events() {
            let time = (block_start + timed.time).min(last);
            let pushed = match timed.event {
                NativeEvent::NoteEnd {
                    key,
                    channel,
                    voice_id,
                } => out.push_note_end(time, key, channel, voice_id),
                NativeEvent::NoteOn {
                    key,
                    channel,
                    velocity,
                    voice_id,
                } if produces_notes => {
                    out.push_note_on(time, key, channel, velocity as f64, voice_id)
                }
                NativeEvent::NoteOff {
                    key,
                    channel,
                    velocity,
                    voice_id,
                } if produces_notes => {
                    out.push_note_off(time, key, channel, velocity as f64, voice_id)
                }
                NativeEvent::Midi { data } if produces_notes => out.push_midi(time, data),
                NativeEvent::SysEx { slot, len } if produces_notes => {
                    out.push_midi_sysex(time, self.events_out.sysex(slot, len))
                }
                ref other => {
                    debug_assert!(false, "invalid outbound event: {other:?}");
                    continue;
                }
            };
            if !pushed {
                log::debug!("host rejected outbound event at {time}");
            }
        }
    }

    // =========================================================================
    // Block splitting
    // =========================================================================

    /// `true` when the event should bound a sub-range: parameter values,
    /// monophonic modulation, and transport changes. Per-voice modulation
    /// becomes a native event instead and does not split.
    fn splits_block(&self, header: &clap_event_header, ctx: &EngineContext<'_>) -> bool {
        if header.space_id != CLAP_CORE_EVENT_SPACE_ID {
            return false;
        }
        match header.type_ {
            CLAP_EVENT_PARAM_VALUE | CLAP_EVENT_TRANSPORT => true,
            CLAP_EVENT_PARAM_MOD => {
                // SAFETY: Header from the host's event list; size-checked.
                match unsafe { cast_event::<clap_event_param_mod>(header) } {
                    Some(event) if event.note_id != -1 => ctx
                        .registry
                        .by_external_id(event.param_id)
                        .map(|e| !e.poly_modulatable)
                        .unwrap_or(false),
                    Some(_) => true,
                    None => false,
                }
            }
            _ => false,
        }
    }

    /// End of the sub-range starting at `block_start`, given the next
    /// interesting event timestamp.
    fn split_point(&self, block_start: u32, next_interesting: Option<u32>, frames: u32) -> u32 {
        let Some(t) = next_interesting else {
            return frames;
        };
        if self.resolution == 0 {
            return frames;
        }
        debug_assert!(t > block_start);

        let aligned = (t / self.resolution) * self.resolution;
        let end = if aligned > block_start {
            // The event sits on or after a later slot boundary; split there
            // so it lands at the start of its own sub-range.
            aligned
        } else {
            // The event is inside the current slot; extend to the next
            // multiple (its timestamp rounded up) and apply it early.
            aligned.saturating_add(self.resolution)
        };
        end.min(frames).max(block_start + 1)
    }

    // =========================================================================
    // Buffer unification
    // =========================================================================

    /// Build the unified channel pointer set.
    ///
    /// The wrapped model always processes in place, so output channels come
    /// first: every input channel either aliases its unified slot (no copy)
    /// or is copied into it before processing. Inputs beyond the output
    /// count join the set as extra read-write channels.
    ///
    /// # Safety
    ///
    /// The process buffers must be valid for `frames` samples.
    unsafe fn unify_buffers(&mut self, process: &clap_process, frames: u32) {
        self.channel_ptrs.clear();

        // SAFETY: Counts and pointers come from the host's process struct,
        // valid for this call. Null bus arrays and null channels are
        // skipped.
        unsafe {
            if !process.audio_outputs.is_null() {
                let outputs: &[clap_audio_buffer] = slice::from_raw_parts(
                    process.audio_outputs,
                    process.audio_outputs_count as usize,
                );
                for bus in outputs {
                    let data = bus.data32 as *const *mut f32;
                    if data.is_null() {
                        continue;
                    }
                    for ch in 0..bus.channel_count as usize {
                        if self.channel_ptrs.len() >= MAX_CHANNELS {
                            break;
                        }
                        let ptr = *data.add(ch);
                        if !ptr.is_null() {
                            self.channel_ptrs.push(ptr);
                        }
                    }
                }
            }

            let out_channels = self.channel_ptrs.len();
            let mut in_index = 0usize;

            if !process.audio_inputs.is_null() {
                let inputs: &[clap_audio_buffer] = slice::from_raw_parts(
                    process.audio_inputs,
                    process.audio_inputs_count as usize,
                );
                for bus in inputs {
                    let data = bus.data32 as *const *mut f32;
                    if data.is_null() {
                        continue;
                    }
                    for ch in 0..bus.channel_count as usize {
                        let input = *data.add(ch);
                        if input.is_null() {
                            in_index += 1;
                            continue;
                        }
                        if in_index < out_channels {
                            let output = self.channel_ptrs[in_index];
                            if input != output {
                                // Distinct storage: the in-place model needs
                                // the input samples in the unified channel.
                                std::ptr::copy(input, output, frames as usize);
                            }
                            // Aliased storage needs no copy.
                        } else if self.channel_ptrs.len() < MAX_CHANNELS {
                            self.channel_ptrs.push(input);
                        }
                        in_index += 1;
                    }
                }
            }
        }
    }

    /// Zero every output channel.
    ///
    /// # Safety
    ///
    /// The process buffers must be valid for `frames` samples.
    unsafe fn silence_outputs(&mut self, process: &clap_process, frames: u32) {
        // SAFETY: As for unify_buffers.
        unsafe {
            if process.audio_outputs.is_null() {
                return;
            }
            let outputs: &[clap_audio_buffer] = slice::from_raw_parts(
                process.audio_outputs,
                process.audio_outputs_count as usize,
            );
            for bus in outputs {
                let data = bus.data32 as *const *mut f32;
                if data.is_null() {
                    continue;
                }
                for ch in 0..bus.channel_count as usize {
                    let ptr = *data.add(ch);
                    if !ptr.is_null() {
                        std::ptr::write_bytes(ptr, 0, frames as usize);
                    }
                }
            }
        }
    }
}

/// Convert a host transport record into the processor's snapshot type,
/// mapping validity flags to `Option` fields.
fn convert_transport(event: &clap_event_transport) -> Transport {
    let flags = event.flags;
    let has = |flag: u32| flags & flag != 0;

    Transport {
        available: true,
        tempo: has(CLAP_TRANSPORT_HAS_TEMPO).then_some(event.tempo),
        time_signature: has(CLAP_TRANSPORT_HAS_TIME_SIGNATURE)
            .then_some((event.tsig_num, event.tsig_denom)),
        pos_beats: has(CLAP_TRANSPORT_HAS_BEATS_TIMELINE)
            .then(|| event.song_pos_beats as f64 / CLAP_BEATTIME_FACTOR as f64),
        pos_seconds: has(CLAP_TRANSPORT_HAS_SECONDS_TIMELINE)
            .then(|| event.song_pos_seconds as f64 / CLAP_SECTIME_FACTOR as f64),
        bar_start_beats: has(CLAP_TRANSPORT_HAS_BEATS_TIMELINE)
            .then(|| event.bar_start as f64 / CLAP_BEATTIME_FACTOR as f64),
        bar_number: has(CLAP_TRANSPORT_HAS_BEATS_TIMELINE).then_some(event.bar_number),
        loop_range_beats: (has(CLAP_TRANSPORT_IS_LOOP_ACTIVE)
            && has(CLAP_TRANSPORT_HAS_BEATS_TIMELINE))
        .then(|| {
            (
                event.loop_start_beats as f64 / CLAP_BEATTIME_FACTOR as f64,
                event.loop_end_beats as f64 / CLAP_BEATTIME_FACTOR as f64,
            )
        }),
        loop_range_seconds: (has(CLAP_TRANSPORT_IS_LOOP_ACTIVE)
            && has(CLAP_TRANSPORT_HAS_SECONDS_TIMELINE))
        .then(|| {
            (
                event.loop_start_seconds as f64 / CLAP_SECTIME_FACTOR as f64,
                event.loop_end_seconds as f64 / CLAP_SECTIME_FACTOR as f64,
            )
        }),
        is_playing: has(CLAP_TRANSPORT_IS_PLAYING),
        is_recording: has(CLAP_TRANSPORT_IS_RECORDING),
        is_loop_active: has(CLAP_TRANSPORT_IS_LOOP_ACTIVE),
    }
}

#[cfg(test)]
mod tests;
