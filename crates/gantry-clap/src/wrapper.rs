//! The generic CLAP plugin wrapper.
//!
//! [`ClapWrapper`] owns one wrapped [`Processor`] instance and exposes it to
//! the host through the `clap_plugin` vtable plus every extension vtable the
//! processor's capabilities justify. One wrapper instance is created per
//! `create_plugin` factory call and destroyed by the host through
//! `clap_plugin.destroy`.
//!
//! # Thread Safety
//!
//! CLAP partitions the plugin API into `[main-thread]` and `[audio-thread]`
//! functions and guarantees neither set is called concurrently with itself.
//! The wrapper leans on that contract the same way the audio-thread code
//! does everywhere else in this crate: single-thread-guaranteed mutable
//! state (the processor, the engine, the editor) lives in `UnsafeCell`s, and
//! everything crossing between the two thread families goes through atomics,
//! the lock-free queues, or the [`MainThreadBridge`]. The one lock in the
//! wrapper is the advisory mutex around the state chunk buffer, which only
//! `save`/`load` touch and which the host documents as non-real-time.

use std::cell::{Cell, UnsafeCell};
use std::ffi::{c_char, c_void, CStr};
use std::slice;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use clap_sys::ext::audio_ports::{
    clap_audio_port_info, clap_plugin_audio_ports, CLAP_AUDIO_PORT_IS_MAIN, CLAP_EXT_AUDIO_PORTS,
    CLAP_PORT_MONO, CLAP_PORT_STEREO,
};
use clap_sys::ext::remote_controls::{
    clap_plugin_remote_controls, clap_remote_controls_page, CLAP_EXT_REMOTE_CONTROLS,
    CLAP_REMOTE_CONTROLS_COUNT,
};
use clap_sys::ext::gui::{
    clap_gui_resize_hints, clap_plugin_gui, clap_window, CLAP_EXT_GUI, CLAP_WINDOW_API_COCOA,
    CLAP_WINDOW_API_WIN32, CLAP_WINDOW_API_X11,
};
use clap_sys::ext::latency::{clap_plugin_latency, CLAP_EXT_LATENCY};
use clap_sys::ext::note_name::{clap_note_name, clap_plugin_note_name, CLAP_EXT_NOTE_NAME};
use clap_sys::ext::note_ports::{
    clap_note_port_info, clap_plugin_note_ports, CLAP_EXT_NOTE_PORTS, CLAP_NOTE_DIALECT_CLAP,
    CLAP_NOTE_DIALECT_MIDI,
};
use clap_sys::ext::params::{
    clap_param_info, clap_param_info_flags, clap_plugin_params, CLAP_EXT_PARAMS,
    CLAP_PARAM_IS_AUTOMATABLE, CLAP_PARAM_IS_BYPASS, CLAP_PARAM_IS_HIDDEN,
    CLAP_PARAM_IS_MODULATABLE, CLAP_PARAM_IS_MODULATABLE_PER_NOTE_ID, CLAP_PARAM_IS_READONLY,
    CLAP_PARAM_IS_STEPPED, CLAP_PARAM_RESCAN_VALUES,
};
use clap_sys::ext::render::{
    clap_plugin_render, clap_plugin_render_mode, CLAP_EXT_RENDER, CLAP_RENDER_OFFLINE,
    CLAP_RENDER_REALTIME,
};
use clap_sys::ext::state::{clap_plugin_state, CLAP_EXT_STATE};
use clap_sys::ext::tail::{clap_plugin_tail, CLAP_EXT_TAIL};
use clap_sys::ext::voice_info::{
    clap_plugin_voice_info, clap_voice_info, CLAP_EXT_VOICE_INFO,
    CLAP_VOICE_INFO_SUPPORTS_OVERLAPPING_NOTES,
};
use clap_sys::host::clap_host;
use clap_sys::id::CLAP_INVALID_ID;
use clap_sys::plugin::{clap_plugin, clap_plugin_descriptor};
use clap_sys::process::{clap_process, clap_process_status, CLAP_PROCESS_ERROR};
use clap_sys::stream::{clap_istream, clap_ostream};

use parking_lot::Mutex;

use gantry_core::bus::{validate_buses, BusType};
use gantry_core::{
    BusInfo, Config, Editor, ParameterNotification, ParameterSet, ParentWindow, Processor,
    ProcessorSetup, RenderMode,
};

use crate::bridge::{MainThreadBridge, Task};
use crate::engine::{EngineContext, ProcessEngine, UiChange, UiChangeKind};
use crate::host::HostHandle;
use crate::queue::SpscQueue;
use crate::registry::{external_id_for, ParamRegistry};
use crate::translate;
use crate::util::copy_cstr;

/// Capacity of the UI→audio parameter edit queue.
const UI_QUEUE_CAPACITY: usize = 65536;

/// The GUI API this build attaches to.
#[cfg(target_os = "macos")]
const WINDOW_API: &CStr = CLAP_WINDOW_API_COCOA;
#[cfg(target_os = "windows")]
const WINDOW_API: &CStr = CLAP_WINDOW_API_WIN32;
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const WINDOW_API: &CStr = CLAP_WINDOW_API_X11;

/// Optional-capability probe results, resolved once at construction.
///
/// The host asks for extensions repeatedly; the processor is asked exactly
/// once. A capability the processor does not implement results in the
/// matching extension never being published.
#[derive(Debug, Clone, Copy, Default)]
struct Capabilities {
    note_names: bool,
    voice_info: bool,
    remote_controls: bool,
    editor: bool,
    wants_notes: bool,
    produces_notes: bool,
}

// =============================================================================
// ClapWrapper
// =============================================================================

/// Generic CLAP plugin wrapping any [`Processor`] implementation.
///
/// The instance is heap-allocated by [`ClapWrapper::create`]; the embedded
/// `clap_plugin` is what the host holds, and its `plugin_data` points back at
/// the wrapper. `clap_plugin.destroy` drops the whole allocation.
pub struct ClapWrapper<P: Processor> {
    /// The vtable handed to the host. First contact point of every call.
    raw: clap_plugin,
    config: &'static Config,
    host: HostHandle,

    /// The wrapped processor. Accessed mutably from both CLAP thread
    /// families, never concurrently per the CLAP threading contract.
    processor: UnsafeCell<P>,
    /// Shared handle to the processor's parameter slots.
    params: Arc<ParameterSet>,
    /// Identity map between parameter indices and host-visible IDs.
    registry: ParamRegistry,
    /// Audio→main deferred notification bridge.
    bridge: Arc<MainThreadBridge>,
    /// UI→audio pending parameter edits.
    ui_changes: Arc<SpscQueue<UiChange>>,
    /// Per-block interleaving engine. Audio thread only.
    engine: UnsafeCell<ProcessEngine>,

    caps: Capabilities,
    input_buses: Vec<BusInfo>,
    output_buses: Vec<BusInfo>,

    active: AtomicBool,
    processing: AtomicBool,
    /// Render mode requested by the host, applied at the next activation.
    render_mode: Cell<RenderMode>,
    /// Last latency value reported to the host, for change detection on the
    /// audio thread.
    reported_latency: AtomicU32,
    /// A state load requested a parameter rescan. Latched here rather than
    /// queued on the bridge so the bridge queue keeps a single producer
    /// thread.
    rescan_pending: AtomicBool,
    /// Packed voice configuration last reported, for change detection.
    reported_voices: AtomicU64,

    /// Advisory lock around the state chunk buffer. Save/load are documented
    /// non-real-time, so a lock is acceptable here and only here.
    state_buffer: Mutex<Vec<u8>>,
    /// The attached editor, if the GUI extension created one. Main thread
    /// only.
    editor: UnsafeCell<Option<Box<dyn Editor>>>,

    // Extension vtables returned by `get_extension`. Stored in the instance
    // so their addresses are stable for the plugin's lifetime.
    ext_params: clap_plugin_params,
    ext_state: clap_plugin_state,
    ext_audio_ports: clap_plugin_audio_ports,
    ext_note_ports: clap_plugin_note_ports,
    ext_latency: clap_plugin_latency,
    ext_tail: clap_plugin_tail,
    ext_render: clap_plugin_render,
    ext_gui: clap_plugin_gui,
    ext_note_name: clap_plugin_note_name,
    ext_voice_info: clap_plugin_voice_info,
    ext_remote_controls: clap_plugin_remote_controls,
}

impl<P: Processor + Default> ClapWrapper<P> {
    /// Construct a wrapper and hand ownership to the host.
    ///
    /// Returns null when construction fails; the only fatal failure is a
    /// parameter ID collision, which would corrupt all subsequent parameter
    /// addressing.
    ///
    /// # Safety
    ///
    /// `descriptor` must stay valid for the life of the process and `host`
    /// must be a valid `clap_host` outliving the instance. Must be called
    /// from the main thread.
    pub unsafe fn create(
        config: &'static Config,
        descriptor: *const clap_plugin_descriptor,
        host: *const clap_host,
    ) -> *const clap_plugin {
        // SAFETY: Caller guarantees host validity and main-thread context.
        let host = unsafe { HostHandle::new(host) };

        let processor = P::default();
        let params = Arc::clone(processor.parameters());

        let registry = match ParamRegistry::build(&params) {
            Ok(registry) => registry,
            Err(err) => {
                log::error!("refusing to create \"{}\": {err}", config.id);
                return std::ptr::null();
            }
        };

        let input_buses = processor.input_buses().to_vec();
        let output_buses = processor.output_buses().to_vec();
        for buses in [&input_buses, &output_buses] {
            if let Err(msg) = validate_buses(buses) {
                log::error!("refusing to create \"{}\": {msg}", config.id);
                return std::ptr::null();
            }
        }

        let caps = Capabilities {
            note_names: processor.note_names().is_some(),
            voice_info: processor.voice_info().is_some(),
            remote_controls: processor.remote_controls().is_some(),
            editor: processor.has_editor(),
            wants_notes: processor.wants_notes(),
            produces_notes: processor.produces_notes(),
        };
        let initial_voices = processor
            .voice_info()
            .map(|src| pack_voice_info(&src.voice_info()))
            .unwrap_or(0);
        let initial_latency = processor.latency_samples();

        let bridge = Arc::new(MainThreadBridge::new());
        let ui_changes = Arc::new(SpscQueue::with_capacity(UI_QUEUE_CAPACITY));

        // The adapter's own parameter observer: editor-side edits become
        // queue entries for the audio thread plus a host flush request. The
        // replay guard keeps main-thread drains from echoing host-driven
        // changes straight back into this queue.
        {
            let bridge = Arc::clone(&bridge);
            let ui_changes = Arc::clone(&ui_changes);
            params.add_observer(Box::new(move |notification| {
                if bridge.is_replaying() {
                    return;
                }
                let change = match notification {
                    ParameterNotification::ValueChanged { index, normalized } => UiChange {
                        kind: UiChangeKind::Value,
                        index: index as u32,
                        normalized,
                    },
                    ParameterNotification::GestureBegin { index } => UiChange {
                        kind: UiChangeKind::GestureBegin,
                        index: index as u32,
                        normalized: 0.0,
                    },
                    ParameterNotification::GestureEnd { index } => UiChange {
                        kind: UiChangeKind::GestureEnd,
                        index: index as u32,
                        normalized: 0.0,
                    },
                };
                if !ui_changes.push(change) {
                    log::debug!("UI parameter queue full, dropping edit");
                }
                host.request_param_flush();
            }));
        }

        let wrapper = Box::new(Self {
            raw: clap_plugin {
                desc: descriptor,
                plugin_data: std::ptr::null_mut(),
                init: Some(Self::plugin_init),
                destroy: Some(Self::plugin_destroy),
                activate: Some(Self::plugin_activate),
                deactivate: Some(Self::plugin_deactivate),
                start_processing: Some(Self::plugin_start_processing),
                stop_processing: Some(Self::plugin_stop_processing),
                reset: Some(Self::plugin_reset),
                process: Some(Self::plugin_process),
                get_extension: Some(Self::plugin_get_extension),
                on_main_thread: Some(Self::plugin_on_main_thread),
            },
            config,
            host,
            processor: UnsafeCell::new(processor),
            params,
            registry,
            bridge,
            ui_changes,
            engine: UnsafeCell::new(ProcessEngine::new(config)),
            caps,
            input_buses,
            output_buses,
            active: AtomicBool::new(false),
            processing: AtomicBool::new(false),
            render_mode: Cell::new(RenderMode::Realtime),
            reported_latency: AtomicU32::new(initial_latency),
            rescan_pending: AtomicBool::new(false),
            reported_voices: AtomicU64::new(initial_voices),
            state_buffer: Mutex::new(Vec::new()),
            editor: UnsafeCell::new(None),
            ext_params: clap_plugin_params {
                count: Some(Self::ext_params_count),
                get_info: Some(Self::ext_params_get_info),
                get_value: Some(Self::ext_params_get_value),
                value_to_text: Some(Self::ext_params_value_to_text),
                text_to_value: Some(Self::ext_params_text_to_value),
                flush: Some(Self::ext_params_flush),
            },
            ext_state: clap_plugin_state {
                save: Some(Self::ext_state_save),
                load: Some(Self::ext_state_load),
            },
            ext_audio_ports: clap_plugin_audio_ports {
                count: Some(Self::ext_audio_ports_count),
                get: Some(Self::ext_audio_ports_get),
            },
            ext_note_ports: clap_plugin_note_ports {
                count: Some(Self::ext_note_ports_count),
                get: Some(Self::ext_note_ports_get),
            },
            ext_latency: clap_plugin_latency {
                get: Some(Self::ext_latency_get),
            },
            ext_tail: clap_plugin_tail {
                get: Some(Self::ext_tail_get),
            },
            ext_render: clap_plugin_render {
                has_hard_realtime_requirement: Some(Self::ext_render_has_hard_realtime_requirement),
                set: Some(Self::ext_render_set),
            },
            ext_gui: clap_plugin_gui {
                is_api_supported: Some(Self::ext_gui_is_api_supported),
                get_preferred_api: Some(Self::ext_gui_get_preferred_api),
                create: Some(Self::ext_gui_create),
                destroy: Some(Self::ext_gui_destroy),
                set_scale: Some(Self::ext_gui_set_scale),
                get_size: Some(Self::ext_gui_get_size),
                can_resize: Some(Self::ext_gui_can_resize),
                get_resize_hints: Some(Self::ext_gui_get_resize_hints),
                adjust_size: Some(Self::ext_gui_adjust_size),
                set_size: Some(Self::ext_gui_set_size),
                set_parent: Some(Self::ext_gui_set_parent),
                set_transient: Some(Self::ext_gui_set_transient),
                suggest_title: Some(Self::ext_gui_suggest_title),
                show: Some(Self::ext_gui_show),
                hide: Some(Self::ext_gui_hide),
            },
            ext_note_name: clap_plugin_note_name {
                count: Some(Self::ext_note_name_count),
                get: Some(Self::ext_note_name_get),
            },
            ext_voice_info: clap_plugin_voice_info {
                get: Some(Self::ext_voice_info_get),
            },
            ext_remote_controls: clap_plugin_remote_controls {
                count: Some(Self::ext_remote_controls_count),
                get: Some(Self::ext_remote_controls_get),
            },
        });

        let wrapper = Box::into_raw(wrapper);
        // SAFETY: `wrapper` was just produced by Box::into_raw and is valid.
        unsafe {
            (*wrapper).raw.plugin_data = wrapper as *mut c_void;
            &(*wrapper).raw
        }
    }
}

impl<P: Processor> ClapWrapper<P> {
    /// Recover the wrapper from the host's plugin pointer.
    ///
    /// # Safety
    ///
    /// `plugin` must be a pointer previously returned by
    /// [`ClapWrapper::create`] and not yet destroyed.
    unsafe fn from_plugin<'a>(plugin: *const clap_plugin) -> &'a Self {
        // SAFETY: `plugin_data` was set to the wrapper allocation at
        // creation and stays valid until `destroy`.
        unsafe { &*((*plugin).plugin_data as *const Self) }
    }

    fn engine_context(&self) -> EngineContext<'_> {
        EngineContext {
            params: &self.params,
            registry: &self.registry,
            bridge: &self.bridge,
            host: &self.host,
            ui_changes: &self.ui_changes,
        }
    }

    /// Plugin configuration this wrapper was built from.
    pub fn config(&self) -> &'static Config {
        self.config
    }

    // =========================================================================
    // clap_plugin lifecycle
    // =========================================================================

    unsafe extern "C" fn plugin_init(_plugin: *const clap_plugin) -> bool {
        // Construction already happened in the factory; host extensions were
        // cached when the host handle was built.
        true
    }

    unsafe extern "C" fn plugin_destroy(plugin: *const clap_plugin) {
        if plugin.is_null() {
            return;
        }
        // SAFETY: The host promises no further calls through this pointer;
        // plugin_data is the Box allocation made in `create`.
        unsafe {
            let wrapper = (*plugin).plugin_data as *mut Self;
            if !wrapper.is_null() {
                drop(Box::from_raw(wrapper));
            }
        }
    }

    unsafe extern "C" fn plugin_activate(
        plugin: *const clap_plugin,
        sample_rate: f64,
        min_frames_count: u32,
        max_frames_count: u32,
    ) -> bool {
        // SAFETY: Valid plugin pointer per `from_plugin` contract.
        let wrapper = unsafe { Self::from_plugin(plugin) };
        if wrapper.active.load(Ordering::Relaxed) {
            debug_assert!(false, "activate called while active");
            return false;
        }

        let setup = ProcessorSetup {
            sample_rate,
            min_block_size: min_frames_count,
            max_block_size: max_frames_count,
            render_mode: wrapper.render_mode.get(),
        };
        // SAFETY: Main-thread call on an inactive plugin; nothing else holds
        // the processor or the engine.
        unsafe {
            (*wrapper.processor.get()).activate(&setup);
            (*wrapper.engine.get()).set_sample_rate(sample_rate);
            wrapper
                .reported_latency
                .store((*wrapper.processor.get()).latency_samples(), Ordering::Relaxed);
        }
        wrapper.active.store(true, Ordering::Release);
        true
    }

    unsafe extern "C" fn plugin_deactivate(plugin: *const clap_plugin) {
        // SAFETY: Valid plugin pointer per `from_plugin` contract.
        let wrapper = unsafe { Self::from_plugin(plugin) };
        wrapper.active.store(false, Ordering::Release);
        // SAFETY: Main-thread call; the host has stopped the audio thread
        // before deactivating.
        unsafe { (*wrapper.processor.get()).deactivate() };
    }

    unsafe extern "C" fn plugin_start_processing(plugin: *const clap_plugin) -> bool {
        // SAFETY: Valid plugin pointer per `from_plugin` contract.
        let wrapper = unsafe { Self::from_plugin(plugin) };
        wrapper.processing.store(true, Ordering::Release);
        true
    }

    unsafe extern "C" fn plugin_stop_processing(plugin: *const clap_plugin) {
        // SAFETY: Valid plugin pointer per `from_plugin` contract.
        let wrapper = unsafe { Self::from_plugin(plugin) };
        wrapper.processing.store(false, Ordering::Release);
    }

    unsafe extern "C" fn plugin_reset(plugin: *const clap_plugin) {
        // SAFETY: Valid plugin pointer; reset is audio-thread and never
        // concurrent with process.
        let wrapper = unsafe { Self::from_plugin(plugin) };
        unsafe { (*wrapper.processor.get()).reset() };
    }

    unsafe extern "C" fn plugin_process(
        plugin: *const clap_plugin,
        process: *const clap_process,
    ) -> clap_process_status {
        // SAFETY: Valid plugin pointer per `from_plugin` contract.
        let wrapper = unsafe { Self::from_plugin(plugin) };
        if process.is_null() {
            return CLAP_PROCESS_ERROR;
        }

        let active = wrapper.active.load(Ordering::Acquire)
            && wrapper.processing.load(Ordering::Acquire);
        let ctx = wrapper.engine_context();

        // SAFETY: Audio-thread call; the engine and processor cells are only
        // touched from this thread family while active. The process struct is
        // valid for this call per the host contract.
        let status = unsafe {
            let engine = &mut *wrapper.engine.get();
            let processor = &mut *wrapper.processor.get();
            engine.process(processor, &ctx, &*process, active)
        };

        // Latency and voice configuration changes detected here are relayed
        // through the bridge; the host may only be told on the main thread.
        // SAFETY: Shared processor read on the audio thread.
        let latency = unsafe { (*wrapper.processor.get()).latency_samples() };
        if wrapper.reported_latency.swap(latency, Ordering::Relaxed) != latency {
            wrapper.bridge.post(&wrapper.host, Task::LatencyChanged);
        }
        if wrapper.caps.voice_info {
            // SAFETY: As above.
            if let Some(src) = unsafe { (*wrapper.processor.get()).voice_info() } {
                let packed = pack_voice_info(&src.voice_info());
                if wrapper.reported_voices.swap(packed, Ordering::Relaxed) != packed {
                    wrapper.bridge.post(&wrapper.host, Task::VoiceInfoChanged);
                }
            }
        }

        status
    }

    unsafe extern "C" fn plugin_get_extension(
        plugin: *const clap_plugin,
        id: *const c_char,
    ) -> *const c_void {
        if id.is_null() {
            return std::ptr::null();
        }
        // SAFETY: Valid plugin pointer; `id` is a NUL-terminated string per
        // the CLAP contract.
        let wrapper = unsafe { Self::from_plugin(plugin) };
        let id = unsafe { CStr::from_ptr(id) };

        if id == CLAP_EXT_PARAMS {
            return &wrapper.ext_params as *const _ as *const c_void;
        }
        if id == CLAP_EXT_STATE {
            return &wrapper.ext_state as *const _ as *const c_void;
        }
        if id == CLAP_EXT_AUDIO_PORTS {
            return &wrapper.ext_audio_ports as *const _ as *const c_void;
        }
        if id == CLAP_EXT_NOTE_PORTS && (wrapper.caps.wants_notes || wrapper.caps.produces_notes) {
            return &wrapper.ext_note_ports as *const _ as *const c_void;
        }
        if id == CLAP_EXT_LATENCY {
            return &wrapper.ext_latency as *const _ as *const c_void;
        }
        if id == CLAP_EXT_TAIL {
            return &wrapper.ext_tail as *const _ as *const c_void;
        }
        if id == CLAP_EXT_RENDER {
            return &wrapper.ext_render as *const _ as *const c_void;
        }
        if id == CLAP_EXT_GUI && wrapper.caps.editor {
            return &wrapper.ext_gui as *const _ as *const c_void;
        }
        if id == CLAP_EXT_NOTE_NAME && wrapper.caps.note_names {
            return &wrapper.ext_note_name as *const _ as *const c_void;
        }
        if id == CLAP_EXT_VOICE_INFO && wrapper.caps.voice_info {
            return &wrapper.ext_voice_info as *const _ as *const c_void;
        }
        if id == CLAP_EXT_REMOTE_CONTROLS && wrapper.caps.remote_controls {
            return &wrapper.ext_remote_controls as *const _ as *const c_void;
        }
        std::ptr::null()
    }

    unsafe extern "C" fn plugin_on_main_thread(plugin: *const clap_plugin) {
        // SAFETY: Valid plugin pointer; the host schedules this on the main
        // thread in response to `request_callback`.
        let wrapper = unsafe { Self::from_plugin(plugin) };
        debug_assert!(
            wrapper.host.is_main_thread() != Some(false),
            "on_main_thread delivered off the main thread"
        );
        wrapper.bridge.drain(|task| match task {
            Task::ParamValueChanged { index, normalized } => {
                wrapper.params.notify(ParameterNotification::ValueChanged {
                    index: index as usize,
                    normalized,
                });
            }
            Task::LatencyChanged => wrapper.host.latency_changed(),
            Task::VoiceInfoChanged => wrapper.host.voice_info_changed(),
        });
        if wrapper.rescan_pending.swap(false, Ordering::AcqRel) {
            wrapper.host.rescan_params(CLAP_PARAM_RESCAN_VALUES);
        }
    }

    // =========================================================================
    // Params extension
    // =========================================================================

    unsafe extern "C" fn ext_params_count(plugin: *const clap_plugin) -> u32 {
        // SAFETY: Valid plugin pointer per `from_plugin` contract.
        let wrapper = unsafe { Self::from_plugin(plugin) };
        wrapper.registry.len() as u32
    }

    unsafe extern "C" fn ext_params_get_info(
        plugin: *const clap_plugin,
        param_index: u32,
        param_info: *mut clap_param_info,
    ) -> bool {
        if param_info.is_null() {
            return false;
        }
        // SAFETY: Valid plugin pointer; `param_info` points at a writable
        // struct per the extension contract.
        let wrapper = unsafe { Self::from_plugin(plugin) };
        let Some(entry) = wrapper.registry.entry_at(param_index as usize) else {
            return false;
        };
        let Some(param) = wrapper.params.get(entry.index) else {
            return false;
        };
        let info = param.info();

        let mut flags: clap_param_info_flags = 0;
        if info.flags.automatable {
            flags |= CLAP_PARAM_IS_AUTOMATABLE;
        }
        if info.flags.modulatable {
            flags |= CLAP_PARAM_IS_MODULATABLE;
        }
        if info.flags.poly_modulatable {
            flags |= CLAP_PARAM_IS_MODULATABLE_PER_NOTE_ID;
        }
        if info.flags.is_bypass {
            flags |= CLAP_PARAM_IS_BYPASS;
        }
        if info.flags.is_hidden {
            flags |= CLAP_PARAM_IS_HIDDEN;
        }
        if info.flags.is_readonly {
            flags |= CLAP_PARAM_IS_READONLY;
        }
        if info.step_count > 0 {
            flags |= CLAP_PARAM_IS_STEPPED;
        }

        // SAFETY: As above.
        let out = unsafe { &mut *param_info };
        out.id = entry.external_id;
        out.flags = flags;
        // Events are always resolved through the registry; a host-roundtripped
        // pointer buys nothing here.
        out.cookie = std::ptr::null_mut();
        copy_cstr(info.name, &mut out.name);
        copy_cstr(info.group, &mut out.module);
        out.min_value = translate::declared_min(entry);
        out.max_value = translate::declared_max(entry);
        out.default_value = translate::to_declared(entry, info.default_normalized);
        true
    }

    unsafe extern "C" fn ext_params_get_value(
        plugin: *const clap_plugin,
        param_id: u32,
        out_value: *mut f64,
    ) -> bool {
        if out_value.is_null() {
            return false;
        }
        // SAFETY: Valid plugin pointer; `out_value` is writable.
        let wrapper = unsafe { Self::from_plugin(plugin) };
        let Some(entry) = wrapper.registry.by_external_id(param_id) else {
            return false;
        };
        let Some(param) = wrapper.params.get(entry.index) else {
            return false;
        };
        // SAFETY: As above.
        unsafe { *out_value = translate::to_declared(entry, param.normalized()) };
        true
    }

    unsafe extern "C" fn ext_params_value_to_text(
        plugin: *const clap_plugin,
        param_id: u32,
        value: f64,
        out_buffer: *mut c_char,
        out_buffer_capacity: u32,
    ) -> bool {
        if out_buffer.is_null() || out_buffer_capacity == 0 {
            return false;
        }
        // SAFETY: Valid plugin pointer per `from_plugin` contract.
        let wrapper = unsafe { Self::from_plugin(plugin) };
        let Some(entry) = wrapper.registry.by_external_id(param_id) else {
            return false;
        };
        let Some(param) = wrapper.params.get(entry.index) else {
            return false;
        };
        let info = param.info();

        let normalized = translate::to_normalized(entry, value);
        let plain = info.to_plain(normalized);
        let text = info.formatter.text(plain);
        let unit = info.formatter.unit();
        let display = if unit.is_empty() {
            text
        } else {
            format!("{text} {unit}")
        };

        // SAFETY: The host provides a buffer of `out_buffer_capacity` chars.
        let dst = unsafe { slice::from_raw_parts_mut(out_buffer, out_buffer_capacity as usize) };
        copy_cstr(&display, dst);
        true
    }

    unsafe extern "C" fn ext_params_text_to_value(
        plugin: *const clap_plugin,
        param_id: u32,
        param_value_text: *const c_char,
        out_value: *mut f64,
    ) -> bool {
        if param_value_text.is_null() || out_value.is_null() {
            return false;
        }
        // SAFETY: Valid plugin pointer; `param_value_text` is NUL-terminated.
        let wrapper = unsafe { Self::from_plugin(plugin) };
        let Some(entry) = wrapper.registry.by_external_id(param_id) else {
            return false;
        };
        let Some(param) = wrapper.params.get(entry.index) else {
            return false;
        };
        let info = param.info();

        // SAFETY: As above.
        let text = unsafe { CStr::from_ptr(param_value_text) };
        let Ok(text) = text.to_str() else {
            return false;
        };
        let Some(plain) = info.formatter.parse(text) else {
            return false;
        };
        let normalized = info.to_normalized(plain);
        // SAFETY: `out_value` is writable per the extension contract.
        unsafe { *out_value = translate::to_declared(entry, normalized) };
        true
    }

    unsafe extern "C" fn ext_params_flush(
        plugin: *const clap_plugin,
        in_: *const clap_sys::events::clap_input_events,
        out: *const clap_sys::events::clap_output_events,
    ) {
        // SAFETY: Valid plugin pointer. Flush runs on the audio thread while
        // active and on the main thread otherwise, never concurrently with
        // process, so the engine/processor cells are safe to take.
        let wrapper = unsafe { Self::from_plugin(plugin) };
        let ctx = wrapper.engine_context();
        // SAFETY: As above; the event list pointers are valid for this call.
        unsafe {
            let engine = &mut *wrapper.engine.get();
            let processor = &mut *wrapper.processor.get();
            engine.flush(processor, &ctx, in_, out);
        }
    }

    // =========================================================================
    // State extension
    // =========================================================================

    unsafe extern "C" fn ext_state_save(
        plugin: *const clap_plugin,
        stream: *const clap_ostream,
    ) -> bool {
        if stream.is_null() {
            return false;
        }
        // SAFETY: Valid plugin pointer; main-thread call.
        let wrapper = unsafe { Self::from_plugin(plugin) };
        let mut buffer = wrapper.state_buffer.lock();
        buffer.clear();

        // SAFETY: State calls are main-thread and never concurrent with each
        // other; the processor's parameter slots stay readable from the audio
        // thread throughout.
        if let Err(err) = unsafe { (*wrapper.processor.get()).save_state(&mut buffer) } {
            log::error!("state save failed: {err}");
            return false;
        }

        // SAFETY: The stream is valid for this call; short writes retry with
        // the remainder, a non-positive result aborts.
        unsafe {
            let Some(write) = (*stream).write else {
                return false;
            };
            let mut written = 0usize;
            while written < buffer.len() {
                let result = write(
                    stream,
                    buffer.as_ptr().add(written) as *const c_void,
                    (buffer.len() - written) as u64,
                );
                if result <= 0 {
                    log::error!("state stream write failed after {written} bytes");
                    return false;
                }
                written += result as usize;
            }
        }
        true
    }

    unsafe extern "C" fn ext_state_load(
        plugin: *const clap_plugin,
        stream: *const clap_istream,
    ) -> bool {
        if stream.is_null() {
            return false;
        }
        // SAFETY: Valid plugin pointer; main-thread call.
        let wrapper = unsafe { Self::from_plugin(plugin) };
        let mut buffer = wrapper.state_buffer.lock();
        buffer.clear();

        // SAFETY: The stream is valid for this call; zero marks end of
        // stream, negative is an error.
        unsafe {
            let Some(read) = (*stream).read else {
                return false;
            };
            let mut chunk = [0u8; 4096];
            loop {
                let result = read(stream, chunk.as_mut_ptr() as *mut c_void, chunk.len() as u64);
                if result < 0 {
                    log::error!("state stream read failed after {} bytes", buffer.len());
                    return false;
                }
                if result == 0 {
                    break;
                }
                buffer.extend_from_slice(&chunk[..result as usize]);
            }
        }

        // SAFETY: As for save.
        match unsafe { (*wrapper.processor.get()).load_state(&buffer) } {
            Ok(()) => {
                // Deferred so the host is not re-entered from inside its own
                // load call.
                wrapper.rescan_pending.store(true, Ordering::Release);
                wrapper.host.request_callback();
                true
            }
            Err(err) => {
                log::error!("state load failed: {err}");
                false
            }
        }
    }

    // =========================================================================
    // Audio ports extension
    // =========================================================================

    unsafe extern "C" fn ext_audio_ports_count(plugin: *const clap_plugin, is_input: bool) -> u32 {
        // SAFETY: Valid plugin pointer per `from_plugin` contract.
        let wrapper = unsafe { Self::from_plugin(plugin) };
        if is_input {
            wrapper.input_buses.len() as u32
        } else {
            wrapper.output_buses.len() as u32
        }
    }

    unsafe extern "C" fn ext_audio_ports_get(
        plugin: *const clap_plugin,
        index: u32,
        is_input: bool,
        info: *mut clap_audio_port_info,
    ) -> bool {
        if info.is_null() {
            return false;
        }
        // SAFETY: Valid plugin pointer; `info` is writable.
        let wrapper = unsafe { Self::from_plugin(plugin) };
        let (buses, paired) = if is_input {
            (&wrapper.input_buses, &wrapper.output_buses)
        } else {
            (&wrapper.output_buses, &wrapper.input_buses)
        };
        let Some(bus) = buses.get(index as usize) else {
            return false;
        };

        // SAFETY: As above.
        let out = unsafe { &mut *info };
        out.id = index;
        copy_cstr(bus.name, &mut out.name);
        out.flags = if matches!(bus.bus_type, BusType::Main) && index == 0 {
            CLAP_AUDIO_PORT_IS_MAIN
        } else {
            0
        };
        out.channel_count = bus.channel_count;
        out.port_type = match bus.channel_count {
            1 => CLAP_PORT_MONO.as_ptr(),
            2 => CLAP_PORT_STEREO.as_ptr(),
            _ => std::ptr::null(),
        };
        // The unified-buffer model processes in place, so a same-shaped port
        // on the other side is its in-place pair.
        out.in_place_pair = match paired.get(index as usize) {
            Some(other) if other.channel_count == bus.channel_count => index,
            _ => CLAP_INVALID_ID,
        };
        true
    }

    // =========================================================================
    // Note ports extension
    // =========================================================================

    unsafe extern "C" fn ext_note_ports_count(plugin: *const clap_plugin, is_input: bool) -> u32 {
        // SAFETY: Valid plugin pointer per `from_plugin` contract.
        let wrapper = unsafe { Self::from_plugin(plugin) };
        let present = if is_input {
            wrapper.caps.wants_notes
        } else {
            wrapper.caps.produces_notes
        };
        present as u32
    }

    unsafe extern "C" fn ext_note_ports_get(
        plugin: *const clap_plugin,
        index: u32,
        is_input: bool,
        info: *mut clap_note_port_info,
    ) -> bool {
        if info.is_null() || index != 0 {
            return false;
        }
        // SAFETY: Valid plugin pointer; `info` is writable.
        let wrapper = unsafe { Self::from_plugin(plugin) };
        let present = if is_input {
            wrapper.caps.wants_notes
        } else {
            wrapper.caps.produces_notes
        };
        if !present {
            return false;
        }

        // SAFETY: As above.
        let out = unsafe { &mut *info };
        out.id = 0;
        out.supported_dialects = CLAP_NOTE_DIALECT_CLAP | CLAP_NOTE_DIALECT_MIDI;
        out.preferred_dialect = CLAP_NOTE_DIALECT_CLAP;
        copy_cstr(if is_input { "Notes In" } else { "Notes Out" }, &mut out.name);
        true
    }

    // =========================================================================
    // Latency / tail / render extensions
    // =========================================================================

    unsafe extern "C" fn ext_latency_get(plugin: *const clap_plugin) -> u32 {
        // SAFETY: Valid plugin pointer; main-thread read of the processor.
        let wrapper = unsafe { Self::from_plugin(plugin) };
        unsafe { (*wrapper.processor.get()).latency_samples() }
    }

    unsafe extern "C" fn ext_tail_get(plugin: *const clap_plugin) -> u32 {
        // SAFETY: Valid plugin pointer; read from either thread family, never
        // concurrent with a mutation.
        let wrapper = unsafe { Self::from_plugin(plugin) };
        unsafe { (*wrapper.processor.get()).tail_samples() }
    }

    unsafe extern "C" fn ext_render_has_hard_realtime_requirement(
        _plugin: *const clap_plugin,
    ) -> bool {
        false
    }

    unsafe extern "C" fn ext_render_set(
        plugin: *const clap_plugin,
        mode: clap_plugin_render_mode,
    ) -> bool {
        // SAFETY: Valid plugin pointer; main-thread call.
        let wrapper = unsafe { Self::from_plugin(plugin) };
        let mode = match mode {
            CLAP_RENDER_REALTIME => RenderMode::Realtime,
            CLAP_RENDER_OFFLINE => RenderMode::Offline,
            _ => return false,
        };
        // Takes effect at the next activation; the host sets the render mode
        // while the plugin is inactive.
        wrapper.render_mode.set(mode);
        true
    }

    // =========================================================================
    // GUI attachment shim
    // =========================================================================

    /// Editor slot access, main thread only.
    ///
    /// # Safety
    ///
    /// Must only be called from GUI extension entry points (main thread).
    #[allow(clippy::mut_from_ref)]
    unsafe fn editor_slot(&self) -> &mut Option<Box<dyn Editor>> {
        // SAFETY: All GUI extension calls are main-thread per the CLAP
        // contract, so the cell is never aliased.
        unsafe { &mut *self.editor.get() }
    }

    unsafe extern "C" fn ext_gui_is_api_supported(
        _plugin: *const clap_plugin,
        api: *const c_char,
        is_floating: bool,
    ) -> bool {
        if api.is_null() || is_floating {
            return false;
        }
        // SAFETY: `api` is NUL-terminated per the extension contract.
        unsafe { CStr::from_ptr(api) == WINDOW_API }
    }

    unsafe extern "C" fn ext_gui_get_preferred_api(
        _plugin: *const clap_plugin,
        api: *mut *const c_char,
        is_floating: *mut bool,
    ) -> bool {
        if api.is_null() || is_floating.is_null() {
            return false;
        }
        // SAFETY: Both out pointers are writable per the extension contract.
        unsafe {
            *api = WINDOW_API.as_ptr();
            *is_floating = false;
        }
        true
    }

    unsafe extern "C" fn ext_gui_create(
        plugin: *const clap_plugin,
        api: *const c_char,
        is_floating: bool,
    ) -> bool {
        // SAFETY: As for is_api_supported.
        if !unsafe { Self::ext_gui_is_api_supported(plugin, api, is_floating) } {
            return false;
        }
        // SAFETY: Valid plugin pointer; GUI calls are main-thread.
        let wrapper = unsafe { Self::from_plugin(plugin) };
        let slot = unsafe { wrapper.editor_slot() };
        if slot.is_some() {
            debug_assert!(false, "gui.create called twice");
            return false;
        }
        // SAFETY: Main-thread processor access, never concurrent with state
        // or lifecycle calls.
        *slot = unsafe { (*wrapper.processor.get()).create_editor() };
        slot.is_some()
    }

    unsafe extern "C" fn ext_gui_destroy(plugin: *const clap_plugin) {
        // SAFETY: Valid plugin pointer; main-thread call.
        let wrapper = unsafe { Self::from_plugin(plugin) };
        if let Some(mut editor) = unsafe { wrapper.editor_slot() }.take() {
            editor.detach();
        }
    }

    unsafe extern "C" fn ext_gui_set_scale(plugin: *const clap_plugin, scale: f64) -> bool {
        // SAFETY: Valid plugin pointer; main-thread call.
        let wrapper = unsafe { Self::from_plugin(plugin) };
        match unsafe { wrapper.editor_slot() } {
            Some(editor) => editor.set_scale(scale),
            None => false,
        }
    }

    unsafe extern "C" fn ext_gui_get_size(
        plugin: *const clap_plugin,
        width: *mut u32,
        height: *mut u32,
    ) -> bool {
        if width.is_null() || height.is_null() {
            return false;
        }
        // SAFETY: Valid plugin pointer; out pointers are writable.
        let wrapper = unsafe { Self::from_plugin(plugin) };
        match unsafe { wrapper.editor_slot() } {
            Some(editor) => {
                let (w, h) = editor.size();
                // SAFETY: As above.
                unsafe {
                    *width = w;
                    *height = h;
                }
                true
            }
            None => false,
        }
    }

    unsafe extern "C" fn ext_gui_can_resize(plugin: *const clap_plugin) -> bool {
        // SAFETY: Valid plugin pointer; main-thread call.
        let wrapper = unsafe { Self::from_plugin(plugin) };
        match unsafe { wrapper.editor_slot() } {
            Some(editor) => editor.can_resize(),
            None => false,
        }
    }

    unsafe extern "C" fn ext_gui_get_resize_hints(
        _plugin: *const clap_plugin,
        _hints: *mut clap_gui_resize_hints,
    ) -> bool {
        false
    }

    unsafe extern "C" fn ext_gui_adjust_size(
        plugin: *const clap_plugin,
        _width: *mut u32,
        _height: *mut u32,
    ) -> bool {
        // A resizable editor accepts the host's proposal as-is; a fixed-size
        // editor rejects, and the host falls back to get_size.
        // SAFETY: Valid plugin pointer; main-thread call.
        unsafe { Self::ext_gui_can_resize(plugin) }
    }

    unsafe extern "C" fn ext_gui_set_size(
        plugin: *const clap_plugin,
        width: u32,
        height: u32,
    ) -> bool {
        // SAFETY: Valid plugin pointer; main-thread call.
        let wrapper = unsafe { Self::from_plugin(plugin) };
        match unsafe { wrapper.editor_slot() } {
            Some(editor) => editor.set_size(width, height),
            None => false,
        }
    }

    unsafe extern "C" fn ext_gui_set_parent(
        plugin: *const clap_plugin,
        window: *const clap_window,
    ) -> bool {
        if window.is_null() {
            return false;
        }
        // SAFETY: Valid plugin pointer; the window struct is valid for this
        // call and its union is qualified by the api string.
        let wrapper = unsafe { Self::from_plugin(plugin) };
        let parent = unsafe {
            let window = &*window;
            if window.api.is_null() {
                return false;
            }
            let api = CStr::from_ptr(window.api);
            if api == CLAP_WINDOW_API_COCOA {
                ParentWindow::Cocoa(window.specific.cocoa)
            } else if api == CLAP_WINDOW_API_X11 {
                ParentWindow::X11(window.specific.x11 as u64)
            } else if api == CLAP_WINDOW_API_WIN32 {
                ParentWindow::Win32(window.specific.win32)
            } else {
                return false;
            }
        };
        // SAFETY: Main-thread GUI call.
        match unsafe { wrapper.editor_slot() } {
            Some(editor) => editor.attach(parent),
            None => false,
        }
    }

    unsafe extern "C" fn ext_gui_set_transient(
        _plugin: *const clap_plugin,
        _window: *const clap_window,
    ) -> bool {
        // Floating windows are not supported, so there is nothing to parent.
        false
    }

    unsafe extern "C" fn ext_gui_suggest_title(
        _plugin: *const clap_plugin,
        _title: *const c_char,
    ) {
    }

    unsafe extern "C" fn ext_gui_show(plugin: *const clap_plugin) -> bool {
        // SAFETY: Valid plugin pointer; main-thread call.
        let wrapper = unsafe { Self::from_plugin(plugin) };
        match unsafe { wrapper.editor_slot() } {
            Some(editor) => {
                editor.show();
                true
            }
            None => false,
        }
    }

    unsafe extern "C" fn ext_gui_hide(plugin: *const clap_plugin) -> bool {
        // SAFETY: Valid plugin pointer; main-thread call.
        let wrapper = unsafe { Self::from_plugin(plugin) };
        match unsafe { wrapper.editor_slot() } {
            Some(editor) => {
                editor.hide();
                true
            }
            None => false,
        }
    }

    // =========================================================================
    // Note name extension
    // =========================================================================

    unsafe extern "C" fn ext_note_name_count(plugin: *const clap_plugin) -> u32 {
        // SAFETY: Valid plugin pointer; main-thread processor read.
        let wrapper = unsafe { Self::from_plugin(plugin) };
        unsafe { (*wrapper.processor.get()).note_names() }
            .map(|src| src.count() as u32)
            .unwrap_or(0)
    }

    unsafe extern "C" fn ext_note_name_get(
        plugin: *const clap_plugin,
        index: u32,
        note_name: *mut clap_note_name,
    ) -> bool {
        if note_name.is_null() {
            return false;
        }
        // SAFETY: Valid plugin pointer; `note_name` is writable.
        let wrapper = unsafe { Self::from_plugin(plugin) };
        let Some(src) = (unsafe { (*wrapper.processor.get()).note_names() }) else {
            return false;
        };
        let Some(entry) = src.get(index as usize) else {
            return false;
        };

        // SAFETY: As above.
        let out = unsafe { &mut *note_name };
        copy_cstr(&entry.name, &mut out.name);
        out.port = -1;
        out.key = entry.key;
        out.channel = entry.channel;
        true
    }

    // =========================================================================
    // Voice info extension
    // =========================================================================

    unsafe extern "C" fn ext_voice_info_get(
        plugin: *const clap_plugin,
        info: *mut clap_voice_info,
    ) -> bool {
        if info.is_null() {
            return false;
        }
        // SAFETY: Valid plugin pointer; `info` is writable.
        let wrapper = unsafe { Self::from_plugin(plugin) };
        let Some(src) = (unsafe { (*wrapper.processor.get()).voice_info() }) else {
            return false;
        };
        let voices = src.voice_info();

        // SAFETY: As above.
        let out = unsafe { &mut *info };
        out.voice_count = voices.voice_count;
        out.voice_capacity = voices.voice_capacity;
        out.flags = if voices.overlapping_notes {
            CLAP_VOICE_INFO_SUPPORTS_OVERLAPPING_NOTES
        } else {
            0
        };
        true
    }

    // =========================================================================
    // Remote controls extension
    // =========================================================================

    unsafe extern "C" fn ext_remote_controls_count(plugin: *const clap_plugin) -> u32 {
        // SAFETY: Valid plugin pointer; main-thread processor read.
        let wrapper = unsafe { Self::from_plugin(plugin) };
        unsafe { (*wrapper.processor.get()).remote_controls() }
            .map(|src| src.page_count() as u32)
            .unwrap_or(0)
    }

    unsafe extern "C" fn ext_remote_controls_get(
        plugin: *const clap_plugin,
        page_index: u32,
        page: *mut clap_remote_controls_page,
    ) -> bool {
        if page.is_null() {
            return false;
        }
        // SAFETY: Valid plugin pointer; `page` is writable.
        let wrapper = unsafe { Self::from_plugin(plugin) };
        let Some(src) = (unsafe { (*wrapper.processor.get()).remote_controls() }) else {
            return false;
        };
        let Some(entry) = src.page(page_index as usize) else {
            return false;
        };

        // SAFETY: As above.
        let out = unsafe { &mut *page };
        copy_cstr(entry.section, &mut out.section_name);
        copy_cstr(entry.name, &mut out.page_name);
        out.page_id = entry.page_id;
        out.is_for_preset = false;
        debug_assert_eq!(
            gantry_core::REMOTE_CONTROLS_PER_PAGE,
            CLAP_REMOTE_CONTROLS_COUNT as usize
        );
        for (slot, param) in out.param_ids.iter_mut().zip(entry.params.iter()) {
            *slot = match param {
                // The page maps slots by string ID; resolve to external IDs
                // the same way the registry did and drop unknown ones.
                Some(string_id) => {
                    let external_id = external_id_for(string_id);
                    if wrapper.registry.is_valid(external_id) {
                        external_id
                    } else {
                        debug_assert!(false, "remote control page names unknown parameter");
                        CLAP_INVALID_ID
                    }
                }
                None => CLAP_INVALID_ID,
            };
        }
        true
    }
}

/// Pack a voice configuration into one word for cheap change detection.
fn pack_voice_info(info: &gantry_core::VoiceInfo) -> u64 {
    ((info.voice_count as u64) << 33)
        | ((info.voice_capacity as u64) << 1)
        | info.overlapping_notes as u64
}
