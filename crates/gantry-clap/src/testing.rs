//! Test fixtures: fake host objects built directly over the C ABI structs so
//! unit tests drive the same vtable surface a real host would.

use std::cell::RefCell;
use std::ffi::c_void;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use clap_sys::audio_buffer::clap_audio_buffer;
use clap_sys::events::{
    clap_event_header, clap_event_midi, clap_event_midi_sysex, clap_event_note,
    clap_event_param_gesture, clap_event_param_mod, clap_event_param_value, clap_event_transport,
    clap_input_events, clap_output_events, CLAP_CORE_EVENT_SPACE_ID, CLAP_EVENT_MIDI,
    CLAP_EVENT_MIDI_SYSEX, CLAP_EVENT_NOTE_END, CLAP_EVENT_NOTE_OFF, CLAP_EVENT_NOTE_ON,
    CLAP_EVENT_PARAM_GESTURE_BEGIN, CLAP_EVENT_PARAM_GESTURE_END, CLAP_EVENT_PARAM_MOD,
    CLAP_EVENT_PARAM_VALUE, CLAP_EVENT_TRANSPORT, CLAP_TRANSPORT_HAS_SECONDS_TIMELINE,
    CLAP_TRANSPORT_HAS_TEMPO,
};
use clap_sys::fixedpoint::CLAP_SECTIME_FACTOR;
use clap_sys::host::clap_host;
use clap_sys::process::clap_process;
use clap_sys::stream::{clap_istream, clap_ostream};
use clap_sys::version::CLAP_VERSION;

use gantry_core::{
    state, Block, EventBuffer, ParameterInfo, ParameterSet, ProcessContext, Processor, StateError,
    TimedEvent,
};

// =============================================================================
// Inbound event list fixture
// =============================================================================

/// One host event, stored as its concrete C struct so a pointer to it is a
/// valid `clap_event_header` pointer.
pub enum FakeEvent {
    ParamValue(clap_event_param_value),
    ParamMod(clap_event_param_mod),
    Note(clap_event_note),
    Midi(clap_event_midi),
    Sysex(clap_event_midi_sysex, Box<[u8]>),
    Transport(clap_event_transport),
    /// A bare header, for unknown-namespace/unknown-type events.
    Raw(clap_event_header),
}

impl FakeEvent {
    fn header_ptr(&self) -> *const clap_event_header {
        match self {
            FakeEvent::ParamValue(e) => &e.header,
            FakeEvent::ParamMod(e) => &e.header,
            FakeEvent::Note(e) => &e.header,
            FakeEvent::Midi(e) => &e.header,
            FakeEvent::Sysex(e, _) => &e.header,
            FakeEvent::Transport(e) => &e.header,
            FakeEvent::Raw(h) => h,
        }
    }
}

fn header(time: u32, type_: u16, size: usize) -> clap_event_header {
    clap_event_header {
        size: size as u32,
        time,
        space_id: CLAP_CORE_EVENT_SPACE_ID,
        type_,
        flags: 0,
    }
}

/// A parameter value event addressed by external ID, in declared space.
pub fn param_value_event(time: u32, external_id: u32, value: f64) -> FakeEvent {
    FakeEvent::ParamValue(clap_event_param_value {
        header: header(
            time,
            CLAP_EVENT_PARAM_VALUE,
            std::mem::size_of::<clap_event_param_value>(),
        ),
        param_id: external_id,
        cookie: std::ptr::null_mut(),
        note_id: -1,
        port_index: -1,
        channel: -1,
        key: -1,
        value,
    })
}

/// A modulation event; `note_id` of -1 means monophonic.
pub fn param_mod_event(time: u32, external_id: u32, amount: f64, note_id: i32) -> FakeEvent {
    FakeEvent::ParamMod(clap_event_param_mod {
        header: header(
            time,
            CLAP_EVENT_PARAM_MOD,
            std::mem::size_of::<clap_event_param_mod>(),
        ),
        param_id: external_id,
        cookie: std::ptr::null_mut(),
        note_id,
        port_index: -1,
        channel: -1,
        key: -1,
        amount,
    })
}

fn note_event(time: u32, type_: u16, key: i16, channel: i16, velocity: f64) -> FakeEvent {
    FakeEvent::Note(clap_event_note {
        header: header(time, type_, std::mem::size_of::<clap_event_note>()),
        note_id: -1,
        port_index: 0,
        channel,
        key,
        velocity,
    })
}

pub fn note_on_event(time: u32, key: i16, channel: i16, velocity: f64) -> FakeEvent {
    note_event(time, CLAP_EVENT_NOTE_ON, key, channel, velocity)
}

pub fn note_off_event(time: u32, key: i16, channel: i16, velocity: f64) -> FakeEvent {
    note_event(time, CLAP_EVENT_NOTE_OFF, key, channel, velocity)
}

pub fn midi_event(time: u32, data: [u8; 3]) -> FakeEvent {
    FakeEvent::Midi(clap_event_midi {
        header: header(time, CLAP_EVENT_MIDI, std::mem::size_of::<clap_event_midi>()),
        port_index: 0,
        data,
    })
}

pub fn sysex_event(time: u32, payload: &[u8]) -> FakeEvent {
    let payload: Box<[u8]> = payload.into();
    FakeEvent::Sysex(
        clap_event_midi_sysex {
            header: header(
                time,
                CLAP_EVENT_MIDI_SYSEX,
                std::mem::size_of::<clap_event_midi_sysex>(),
            ),
            port_index: 0,
            buffer: payload.as_ptr(),
            size: payload.len() as u32,
        },
        payload,
    )
}

/// A transport event carrying only a tempo.
pub fn transport_event(time: u32, tempo: f64) -> FakeEvent {
    // SAFETY: clap_event_transport is a plain C struct; all-zero bytes is a
    // valid (if meaningless) value that the flags field below qualifies.
    let mut event: clap_event_transport = unsafe { std::mem::zeroed() };
    event.header = header(
        time,
        CLAP_EVENT_TRANSPORT,
        std::mem::size_of::<clap_event_transport>(),
    );
    event.flags = CLAP_TRANSPORT_HAS_TEMPO;
    event.tempo = tempo;
    FakeEvent::Transport(event)
}

/// A transport event with tempo and a wall-clock position.
pub fn transport_position_event(time: u32, tempo: f64, pos_seconds: f64) -> FakeEvent {
    let FakeEvent::Transport(mut event) = transport_event(time, tempo) else {
        unreachable!()
    };
    event.flags |= CLAP_TRANSPORT_HAS_SECONDS_TIMELINE;
    event.song_pos_seconds = (pos_seconds * CLAP_SECTIME_FACTOR as f64) as i64;
    FakeEvent::Transport(event)
}

/// The raw transport record for `clap_process.transport`.
pub fn transport_struct(tempo: f64, pos_seconds: f64) -> clap_event_transport {
    let FakeEvent::Transport(event) = transport_position_event(0, tempo, pos_seconds) else {
        unreachable!()
    };
    event
}

/// An event from a foreign event namespace; adapters must ignore it.
pub fn unknown_space_event(time: u32) -> FakeEvent {
    let mut h = header(time, CLAP_EVENT_PARAM_VALUE, std::mem::size_of::<clap_event_header>());
    h.space_id = 0x6666;
    FakeEvent::Raw(h)
}

struct InListData {
    events: Vec<FakeEvent>,
}

/// Owns a `clap_input_events` backed by a Rust vector.
pub struct EventListFixture {
    data: Box<InListData>,
    raw: Box<clap_input_events>,
}

impl EventListFixture {
    pub fn new(events: Vec<FakeEvent>) -> Self {
        let data = Box::new(InListData { events });
        let raw = Box::new(clap_input_events {
            ctx: &*data as *const InListData as *mut c_void,
            size: Some(Self::size),
            get: Some(Self::get),
        });
        Self { data, raw }
    }

    pub fn raw(&self) -> *const clap_input_events {
        &*self.raw
    }

    unsafe extern "C" fn size(list: *const clap_input_events) -> u32 {
        // SAFETY: ctx points at the fixture's InListData for its lifetime.
        let data = unsafe { &*((*list).ctx as *const InListData) };
        data.events.len() as u32
    }

    unsafe extern "C" fn get(
        list: *const clap_input_events,
        index: u32,
    ) -> *const clap_event_header {
        // SAFETY: As above.
        let data = unsafe { &*((*list).ctx as *const InListData) };
        data.events
            .get(index as usize)
            .map(FakeEvent::header_ptr)
            .unwrap_or(std::ptr::null())
    }
}

// =============================================================================
// Outbound event queue fixture
// =============================================================================

/// A decoded event the adapter pushed to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectedEvent {
    ParamValue { time: u32, id: u32, value: f64 },
    Gesture { time: u32, id: u32, begin: bool },
    NoteOn { time: u32, key: i16, channel: i16 },
    NoteOff { time: u32, key: i16, channel: i16 },
    NoteEnd { time: u32, key: i16, channel: i16, voice_id: i32 },
    Midi { time: u32, data: [u8; 3] },
    Sysex { time: u32, data: Vec<u8> },
    Other { time: u32, type_: u16 },
}

struct OutListData {
    collected: RefCell<Vec<CollectedEvent>>,
    reject: bool,
}

/// Owns a `clap_output_events` that decodes pushed events into Rust enums.
pub struct OutEventsFixture {
    data: Box<OutListData>,
    raw: Box<clap_output_events>,
}

impl OutEventsFixture {
    pub fn new() -> Self {
        Self::with_reject(false)
    }

    /// A queue that refuses every push, for overflow-path tests.
    pub fn with_reject(reject: bool) -> Self {
        let data = Box::new(OutListData {
            collected: RefCell::new(Vec::new()),
            reject,
        });
        let raw = Box::new(clap_output_events {
            ctx: &*data as *const OutListData as *mut c_void,
            try_push: Some(Self::try_push),
        });
        Self { data, raw }
    }

    pub fn raw(&self) -> *const clap_output_events {
        &*self.raw
    }

    pub fn collected(&self) -> Vec<CollectedEvent> {
        self.data.collected.borrow().clone()
    }

    unsafe extern "C" fn try_push(
        list: *const clap_output_events,
        event: *const clap_event_header,
    ) -> bool {
        // SAFETY: ctx points at the fixture's OutListData; the event is
        // valid for its declared size during this call.
        unsafe {
            let data = &*((*list).ctx as *const OutListData);
            if data.reject {
                return false;
            }
            let h = &*event;
            let time = h.time;
            let decoded = match h.type_ {
                CLAP_EVENT_PARAM_VALUE => {
                    let e = &*(event as *const clap_event_param_value);
                    CollectedEvent::ParamValue {
                        time,
                        id: e.param_id,
                        value: e.value,
                    }
                }
                CLAP_EVENT_PARAM_GESTURE_BEGIN | CLAP_EVENT_PARAM_GESTURE_END => {
                    let e = &*(event as *const clap_event_param_gesture);
                    CollectedEvent::Gesture {
                        time,
                        id: e.param_id,
                        begin: h.type_ == CLAP_EVENT_PARAM_GESTURE_BEGIN,
                    }
                }
                CLAP_EVENT_NOTE_ON => {
                    let e = &*(event as *const clap_event_note);
                    CollectedEvent::NoteOn {
                        time,
                        key: e.key,
                        channel: e.channel,
                    }
                }
                CLAP_EVENT_NOTE_OFF => {
                    let e = &*(event as *const clap_event_note);
                    CollectedEvent::NoteOff {
                        time,
                        key: e.key,
                        channel: e.channel,
                    }
                }
                CLAP_EVENT_NOTE_END => {
                    let e = &*(event as *const clap_event_note);
                    CollectedEvent::NoteEnd {
                        time,
                        key: e.key,
                        channel: e.channel,
                        voice_id: e.note_id,
                    }
                }
                CLAP_EVENT_MIDI => {
                    let e = &*(event as *const clap_event_midi);
                    CollectedEvent::Midi { time, data: e.data }
                }
                CLAP_EVENT_MIDI_SYSEX => {
                    let e = &*(event as *const clap_event_midi_sysex);
                    let payload = std::slice::from_raw_parts(e.buffer, e.size as usize);
                    CollectedEvent::Sysex {
                        time,
                        data: payload.to_vec(),
                    }
                }
                other => CollectedEvent::Other { time, type_: other },
            };
            data.collected.borrow_mut().push(decoded);
            true
        }
    }
}

// =============================================================================
// Audio buffer fixture
// =============================================================================

/// One input bus and one output bus of equal channel count, with optional
/// in-place aliasing.
pub struct AudioFixture {
    _in_data: Vec<Vec<f32>>,
    out_data: Vec<Vec<f32>>,
    in_ptrs: Vec<*mut f32>,
    out_ptrs: Vec<*mut f32>,
    in_bus: Box<clap_audio_buffer>,
    out_bus: Box<clap_audio_buffer>,
    frames: u32,
    in_place: bool,
}

impl AudioFixture {
    pub fn new(channels: usize, frames: usize, in_place: bool) -> Self {
        let mut out_data: Vec<Vec<f32>> = (0..channels).map(|_| vec![0.0; frames]).collect();
        let mut in_data: Vec<Vec<f32>> = if in_place {
            Vec::new()
        } else {
            (0..channels).map(|_| vec![0.0; frames]).collect()
        };

        let out_ptrs: Vec<*mut f32> = out_data.iter_mut().map(|c| c.as_mut_ptr()).collect();
        let in_ptrs: Vec<*mut f32> = if in_place {
            out_ptrs.clone()
        } else {
            in_data.iter_mut().map(|c| c.as_mut_ptr()).collect()
        };

        let in_bus = Box::new(clap_audio_buffer {
            data32: in_ptrs.as_ptr() as _,
            data64: std::ptr::null::<*const f64>() as _,
            channel_count: channels as u32,
            latency: 0,
            constant_mask: 0,
        });
        let out_bus = Box::new(clap_audio_buffer {
            data32: out_ptrs.as_ptr() as _,
            data64: std::ptr::null::<*const f64>() as _,
            channel_count: channels as u32,
            latency: 0,
            constant_mask: 0,
        });

        Self {
            _in_data: in_data,
            out_data,
            in_ptrs,
            out_ptrs,
            in_bus,
            out_bus,
            frames: frames as u32,
            in_place,
        }
    }

    /// Writable input samples (the shared buffer when in-place).
    pub fn input_mut(&mut self, channel: usize) -> &mut [f32] {
        if self.in_place {
            &mut self.out_data[channel]
        } else {
            &mut self._in_data[channel]
        }
    }

    /// Output samples after processing.
    pub fn output(&self, channel: usize) -> &[f32] {
        &self.out_data[channel]
    }

    /// Assemble the `clap_process` for one call.
    pub fn process_struct(
        &mut self,
        transport: Option<*const clap_event_transport>,
        in_events: &EventListFixture,
        out_events: &OutEventsFixture,
    ) -> clap_process {
        // Keep the pointer vectors alive through the struct.
        let _ = (&self.in_ptrs, &self.out_ptrs);
        clap_process {
            steady_time: 0,
            frames_count: self.frames,
            transport: transport.unwrap_or(std::ptr::null()),
            audio_inputs: &*self.in_bus,
            audio_outputs: &*self.out_bus as *const clap_audio_buffer as *mut clap_audio_buffer,
            audio_inputs_count: 1,
            audio_outputs_count: 1,
            in_events: in_events.raw(),
            out_events: out_events.raw(),
        }
    }
}

// =============================================================================
// State stream fixtures
// =============================================================================

struct OStreamData {
    written: RefCell<Vec<u8>>,
    /// Largest number of bytes accepted per write call, to exercise the
    /// adapter's short-write retry loop.
    max_chunk: usize,
    /// Start failing once this many bytes were accepted.
    fail_after: Option<usize>,
}

/// A `clap_ostream` that collects written bytes into a Rust vector.
pub struct OStreamFixture {
    data: Box<OStreamData>,
    raw: Box<clap_ostream>,
}

impl OStreamFixture {
    pub fn new() -> Self {
        Self::with_limits(usize::MAX, None)
    }

    /// A stream that accepts at most `max_chunk` bytes per call and starts
    /// returning errors after `fail_after` total bytes.
    pub fn with_limits(max_chunk: usize, fail_after: Option<usize>) -> Self {
        let data = Box::new(OStreamData {
            written: RefCell::new(Vec::new()),
            max_chunk,
            fail_after,
        });
        let raw = Box::new(clap_ostream {
            ctx: &*data as *const OStreamData as *mut c_void,
            write: Some(Self::write),
        });
        Self { data, raw }
    }

    pub fn raw(&self) -> *const clap_ostream {
        &*self.raw
    }

    pub fn written(&self) -> Vec<u8> {
        self.data.written.borrow().clone()
    }

    unsafe extern "C" fn write(
        stream: *const clap_ostream,
        buffer: *const c_void,
        size: u64,
    ) -> i64 {
        // SAFETY: ctx points at the fixture's OStreamData; the buffer is
        // valid for `size` bytes during this call.
        unsafe {
            let data = &*((*stream).ctx as *const OStreamData);
            let mut written = data.written.borrow_mut();
            if data.fail_after.is_some_and(|limit| written.len() >= limit) {
                return -1;
            }
            let take = (size as usize).min(data.max_chunk);
            let bytes = std::slice::from_raw_parts(buffer as *const u8, take);
            written.extend_from_slice(bytes);
            take as i64
        }
    }
}

struct IStreamData {
    bytes: Vec<u8>,
    cursor: RefCell<usize>,
    max_chunk: usize,
}

/// A `clap_istream` serving a byte vector, in chunks.
pub struct IStreamFixture {
    data: Box<IStreamData>,
    raw: Box<clap_istream>,
}

impl IStreamFixture {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self::with_chunk(bytes, usize::MAX)
    }

    /// A stream that serves at most `max_chunk` bytes per read call.
    pub fn with_chunk(bytes: Vec<u8>, max_chunk: usize) -> Self {
        let data = Box::new(IStreamData {
            bytes,
            cursor: RefCell::new(0),
            max_chunk,
        });
        let raw = Box::new(clap_istream {
            ctx: &*data as *const IStreamData as *mut c_void,
            read: Some(Self::read),
        });
        Self { data, raw }
    }

    pub fn raw(&self) -> *const clap_istream {
        &*self.raw
    }

    unsafe extern "C" fn read(
        stream: *const clap_istream,
        buffer: *mut c_void,
        size: u64,
    ) -> i64 {
        // SAFETY: ctx points at the fixture's IStreamData; the buffer is
        // writable for `size` bytes during this call.
        unsafe {
            let data = &*((*stream).ctx as *const IStreamData);
            let mut cursor = data.cursor.borrow_mut();
            let remaining = data.bytes.len() - *cursor;
            let take = remaining.min(size as usize).min(data.max_chunk);
            std::ptr::copy_nonoverlapping(
                data.bytes.as_ptr().add(*cursor),
                buffer as *mut u8,
                take,
            );
            *cursor += take;
            take as i64
        }
    }
}

// =============================================================================
// Host fixture
// =============================================================================

struct HostData {
    callback_requests: AtomicUsize,
}

/// A minimal host with no extensions that counts callback requests.
pub struct HostFixture {
    data: Box<HostData>,
    raw: Box<clap_host>,
}

impl HostFixture {
    pub fn new() -> Self {
        let data = Box::new(HostData {
            callback_requests: AtomicUsize::new(0),
        });
        let raw = Box::new(clap_host {
            clap_version: CLAP_VERSION,
            host_data: &*data as *const HostData as *mut c_void,
            name: c"Gantry Test Host".as_ptr(),
            vendor: c"Gantry".as_ptr(),
            url: c"".as_ptr(),
            version: c"1.0".as_ptr(),
            get_extension: Some(Self::get_extension),
            request_restart: Some(Self::request_restart),
            request_process: Some(Self::request_process),
            request_callback: Some(Self::request_callback),
        });
        Self { data, raw }
    }

    pub fn raw(&self) -> *const clap_host {
        &*self.raw
    }

    pub fn callback_requests(&self) -> usize {
        self.data.callback_requests.load(Ordering::SeqCst)
    }

    unsafe extern "C" fn get_extension(
        _host: *const clap_host,
        _id: *const std::ffi::c_char,
    ) -> *const c_void {
        std::ptr::null()
    }

    unsafe extern "C" fn request_restart(_host: *const clap_host) {}

    unsafe extern "C" fn request_process(_host: *const clap_host) {}

    unsafe extern "C" fn request_callback(host: *const clap_host) {
        // SAFETY: host_data points at the fixture's HostData.
        let data = unsafe { &*((*host).host_data as *const HostData) };
        data.callback_requests.fetch_add(1, Ordering::SeqCst);
    }
}

// =============================================================================
// Recording processor
// =============================================================================

/// What the mock processor saw in one `process` call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub frames: usize,
    pub channels: usize,
    /// Effective value of parameter 0 at the start of the call.
    pub param0: f64,
    /// Transport tempo visible to this call.
    pub tempo: Option<f64>,
    /// Transport wall-clock position visible to this call.
    pub pos_seconds: Option<f64>,
    pub events: Vec<TimedEvent>,
    /// Channel 0 contents at entry.
    pub entry_samples: Vec<f32>,
}

/// A processor that records every call and optionally stamps parameter 0's
/// value into channel 0.
pub struct TestProcessor {
    params: Arc<ParameterSet>,
    pub recorded: Vec<RecordedCall>,
    pub suspended: bool,
    /// When set, every output sample of channel 0 becomes param 0's value.
    pub stamp_param0: bool,
    /// Events pushed into `out` on every call.
    pub emit: Vec<TimedEvent>,
    pub activations: usize,
}

impl TestProcessor {
    /// The standard test parameter set.
    pub fn make_params() -> Arc<ParameterSet> {
        Arc::new(ParameterSet::new(vec![
            ParameterInfo::new("gain", "Gain").with_default(0.5),
            ParameterInfo::new("mode", "Mode")
                .with_range(0.0, 3.0)
                .with_steps(3),
            ParameterInfo::new("cutoff", "Cutoff").poly_modulatable(),
            ParameterInfo::new("depth", "Depth").modulatable(),
        ]))
    }
}

impl Default for TestProcessor {
    fn default() -> Self {
        Self {
            params: Self::make_params(),
            recorded: Vec::new(),
            suspended: false,
            stamp_param0: false,
            emit: Vec::new(),
            activations: 0,
        }
    }
}

impl Processor for TestProcessor {
    fn parameters(&self) -> &Arc<ParameterSet> {
        &self.params
    }

    fn wants_notes(&self) -> bool {
        true
    }

    fn produces_notes(&self) -> bool {
        true
    }

    fn activate(&mut self, _setup: &gantry_core::ProcessorSetup) {
        self.activations += 1;
    }

    fn is_suspended(&self) -> bool {
        self.suspended
    }

    fn latency_samples(&self) -> u32 {
        7
    }

    fn process(
        &mut self,
        block: &mut Block<'_>,
        events: &EventBuffer,
        out: &mut EventBuffer,
        ctx: &ProcessContext<'_>,
    ) {
        let param0 = self.params.get(0).map(|p| p.effective()).unwrap_or(-1.0);
        self.recorded.push(RecordedCall {
            frames: block.frames(),
            channels: block.channels(),
            param0,
            tempo: ctx.transport.tempo,
            pos_seconds: ctx.transport.pos_seconds,
            events: events.events().to_vec(),
            entry_samples: if block.channels() > 0 {
                block.channel(0).to_vec()
            } else {
                Vec::new()
            },
        });

        if self.stamp_param0 && block.channels() > 0 {
            let value = param0 as f32;
            block.channel_mut(0).fill(value);
        }

        for timed in &self.emit {
            out.push(timed.time, timed.event);
        }
    }

    fn save_state(&mut self, out: &mut Vec<u8>) -> Result<(), StateError> {
        state::save_parameters(&self.params, out)
    }

    fn load_state(&mut self, bytes: &[u8]) -> Result<(), StateError> {
        state::load_parameters(&self.params, bytes)
    }
}
