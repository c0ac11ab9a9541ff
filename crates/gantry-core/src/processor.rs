//! The wrapped processor contract and its optional capability interfaces.
//!
//! A [`Processor`] is the object the adapter constructs, owns, and drives.
//! Required surface: a stable parameter set, bus topology, a block process
//! entry point, and state-as-bytes serialization. Everything optional is an
//! explicit capability interface the adapter probes once at construction
//! (`direct()`, `note_names()`, `voice_info()`, `remote_controls()`); a
//! processor advertises a capability by returning `Some` from the matching
//! accessor. There is no downcasting and no privileged access: capability
//! objects receive their callbacks through plain setter/accessor methods.

use std::ffi::c_void;
use std::fmt;
use std::sync::Arc;

use crate::buffer::Block;
use crate::bus::BusInfo;
use crate::events::EventBuffer;
use crate::params::ParameterSet;
use crate::transport::Transport;

/// Number of parameter slots on one remote-control page.
pub const REMOTE_CONTROLS_PER_PAGE: usize = 8;

/// Realtime or offline rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Live processing with hard deadlines.
    #[default]
    Realtime,
    /// Offline render; the processor may trade latency for quality.
    Offline,
}

/// Audio configuration passed to [`Processor::activate`].
#[derive(Debug, Clone, Copy)]
pub struct ProcessorSetup {
    /// Sample rate in Hz.
    pub sample_rate: f64,
    /// Smallest block size the host will send.
    pub min_block_size: u32,
    /// Largest block size the host will send.
    pub max_block_size: u32,
    /// Rendering mode at activation time.
    pub render_mode: RenderMode,
}

/// Per-call context handed to the process entry points.
pub struct ProcessContext<'a> {
    /// Transport snapshot, valid only for this call.
    pub transport: &'a Transport,
    /// Host steady-time counter in samples, or -1 when unavailable.
    pub steady_time: i64,
    /// Sample rate in Hz.
    pub sample_rate: f64,
}

/// State serialization failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    /// The byte stream is not a state this processor understands.
    Malformed,
    /// The stream ended early.
    Truncated,
    /// The state version is not supported.
    VersionMismatch,
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateError::Malformed => write!(f, "malformed state data"),
            StateError::Truncated => write!(f, "truncated state data"),
            StateError::VersionMismatch => write!(f, "unsupported state version"),
        }
    }
}

impl std::error::Error for StateError {}

/// The wrapped audio processor.
///
/// Construction happens through `Default` in the adapter's factory. The
/// parameter set must be created once at construction and shared as an
/// `Arc`; the adapter keeps a clone and requires the set to stay static for
/// the life of the instance.
pub trait Processor: Send + 'static {
    /// The processor's parameter set, in stable declaration order.
    fn parameters(&self) -> &Arc<ParameterSet>;

    /// Input bus topology, main bus first.
    fn input_buses(&self) -> &[BusInfo] {
        const STEREO: [BusInfo; 1] = [BusInfo::STEREO_MAIN];
        &STEREO
    }

    /// Output bus topology, main bus first.
    fn output_buses(&self) -> &[BusInfo] {
        const STEREO: [BusInfo; 1] = [BusInfo::STEREO_MAIN];
        &STEREO
    }

    /// `true` when the processor consumes note/MIDI input.
    fn wants_notes(&self) -> bool {
        false
    }

    /// `true` when the processor produces note/MIDI output.
    fn produces_notes(&self) -> bool {
        false
    }

    /// Called with the audio configuration before processing starts.
    fn activate(&mut self, _setup: &ProcessorSetup) {}

    /// Called when the host tears the audio configuration down.
    fn deactivate(&mut self) {}

    /// Drop all voices, clear tails and delay lines.
    fn reset(&mut self) {}

    /// A suspended processor produces silence; the adapter zeroes the output
    /// without calling [`Processor::process`]. Bypass switches typically
    /// report `true` here.
    fn is_suspended(&self) -> bool {
        false
    }

    /// Processing latency in samples.
    fn latency_samples(&self) -> u32 {
        0
    }

    /// Tail length in samples after input stops.
    fn tail_samples(&self) -> u32 {
        0
    }

    /// Process one sub-block of unified channels.
    ///
    /// `events` holds the inbound events for this sub-block with offsets
    /// relative to its start; output events go into `out` with offsets
    /// relative to the same origin. Called on the real-time thread: no
    /// locks, no allocation.
    fn process(
        &mut self,
        block: &mut Block<'_>,
        events: &EventBuffer,
        out: &mut EventBuffer,
        ctx: &ProcessContext<'_>,
    );

    /// Serialize state into `out`. The adapter relays the bytes to the host
    /// unmodified.
    fn save_state(&mut self, out: &mut Vec<u8>) -> Result<(), StateError>;

    /// Restore state from bytes previously produced by
    /// [`Processor::save_state`].
    fn load_state(&mut self, bytes: &[u8]) -> Result<(), StateError>;

    /// Direct-processing capability: the processor takes over the whole
    /// block instead of the adapter's sub-block interleaving.
    fn direct(&mut self) -> Option<&mut dyn DirectProcessor> {
        None
    }

    /// Note-name table capability.
    fn note_names(&self) -> Option<&dyn NoteNameSource> {
        None
    }

    /// Voice-info capability for polyphonic modulation hosts.
    fn voice_info(&self) -> Option<&dyn VoiceInfoSource> {
        None
    }

    /// Remote-control page capability.
    fn remote_controls(&self) -> Option<&dyn RemoteControlSource> {
        None
    }

    /// `true` when [`Processor::create_editor`] returns an editor.
    fn has_editor(&self) -> bool {
        false
    }

    /// Create the editor for the GUI attachment shim.
    fn create_editor(&mut self) -> Option<Box<dyn Editor>> {
        None
    }
}

/// Opt-in whole-block processing.
///
/// A direct processor receives the full block, every translated inbound
/// event (including parameter values, which the adapter otherwise applies
/// itself), and the outbound buffer. The adapter skips its own block
/// splitting entirely.
pub trait DirectProcessor {
    /// Process one full block.
    fn process_direct(
        &mut self,
        block: &mut Block<'_>,
        events: &EventBuffer,
        out: &mut EventBuffer,
        ctx: &ProcessContext<'_>,
    );
}

/// One named key, as shown in a host's piano-roll lane.
#[derive(Debug, Clone)]
pub struct NoteName {
    /// Display name, e.g. "Kick".
    pub name: String,
    /// MIDI key, or -1 for every key.
    pub key: i16,
    /// MIDI channel, or -1 for every channel.
    pub channel: i16,
}

/// Note-name table capability.
pub trait NoteNameSource {
    /// Number of named keys.
    fn count(&self) -> usize;
    /// Entry at `index`, or `None` past the end.
    fn get(&self, index: usize) -> Option<NoteName>;
}

/// Voice configuration reported to the host.
#[derive(Debug, Clone, Copy)]
pub struct VoiceInfo {
    /// Currently configured voice count.
    pub voice_count: u32,
    /// Upper bound the host should allocate modulation state for.
    pub voice_capacity: u32,
    /// The same key may sound on overlapping voices.
    pub overlapping_notes: bool,
}

/// Voice-info capability.
pub trait VoiceInfoSource {
    /// Current voice configuration.
    fn voice_info(&self) -> VoiceInfo;
}

/// One page of hardware remote-control mappings.
#[derive(Debug, Clone, Copy)]
pub struct RemoteControlPage {
    /// Section this page belongs to, e.g. "Oscillators".
    pub section: &'static str,
    /// Page display name.
    pub name: &'static str,
    /// Stable page ID.
    pub page_id: u32,
    /// Parameter string IDs per slot; `None` leaves the slot empty.
    pub params: [Option<&'static str>; REMOTE_CONTROLS_PER_PAGE],
}

/// Remote-control page capability.
pub trait RemoteControlSource {
    /// Number of pages.
    fn page_count(&self) -> usize;
    /// Page at `index`, or `None` past the end.
    fn page(&self, index: usize) -> Option<RemoteControlPage>;
}

/// Platform parent window handle for [`Editor::attach`].
#[derive(Debug, Clone, Copy)]
pub enum ParentWindow {
    /// An `NSView *` on macOS.
    Cocoa(*mut c_void),
    /// An X11 window ID.
    X11(u64),
    /// An `HWND` on Windows.
    Win32(*mut c_void),
}

/// The editor side of the GUI attachment shim.
///
/// Only lifecycle and geometry negotiation cross this trait; how the editor
/// draws is its own business. All methods are called from the host's main
/// thread.
pub trait Editor {
    /// Current size in physical pixels.
    fn size(&self) -> (u32, u32);

    /// `true` when the host may resize the editor.
    fn can_resize(&self) -> bool {
        false
    }

    /// Apply the host's DPI scale factor. Returns `false` when unsupported.
    fn set_scale(&mut self, _factor: f64) -> bool {
        false
    }

    /// Resize to the given size. Returns `false` to reject.
    fn set_size(&mut self, width: u32, height: u32) -> bool;

    /// Attach to the host-provided parent window.
    fn attach(&mut self, parent: ParentWindow) -> bool;

    /// Detach from the parent window. Must be callable repeatedly.
    fn detach(&mut self);

    /// Make the view visible.
    fn show(&mut self) {}

    /// Hide the view without detaching.
    fn hide(&mut self) {}
}
