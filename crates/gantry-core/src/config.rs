//! Plugin metadata and adapter policy configuration.
//!
//! [`Config`] carries the descriptor strings the host sees plus the knobs the
//! adapter reads at construction time. It is meant to live in a `static` and
//! be built with the const builder methods:
//!
//! ```ignore
//! use gantry_core::{Config, PluginKind};
//!
//! pub static CONFIG: Config = Config::new("Gantry Gain", "media.helper.gantry.gain")
//!     .with_vendor("Helper Media")
//!     .with_version(env!("CARGO_PKG_VERSION"))
//!     .with_kind(PluginKind::AudioEffect)
//!     .with_event_resolution(64);
//! ```

/// Broad plugin category, mapped to the host-visible feature list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginKind {
    /// Processes audio in place (gain, EQ, dynamics).
    AudioEffect,
    /// Produces audio from note input.
    Instrument,
    /// Transforms note streams without touching audio.
    NoteEffect,
}

/// Static plugin configuration.
pub struct Config {
    /// Display name shown by the host.
    pub name: &'static str,
    /// Stable reverse-DNS identifier. Changing this orphans saved sessions.
    pub id: &'static str,
    /// Vendor display name.
    pub vendor: &'static str,
    /// Version string, usually `env!("CARGO_PKG_VERSION")`.
    pub version: &'static str,
    /// Product URL.
    pub url: &'static str,
    /// Manual URL.
    pub manual_url: &'static str,
    /// Support URL.
    pub support_url: &'static str,
    /// One-line description.
    pub description: &'static str,
    /// Plugin category.
    pub kind: PluginKind,
    /// Sub-block resolution for sample-accurate automation, in samples.
    ///
    /// Parameter and transport events split the audio block into sub-ranges
    /// aligned to multiples of this value. `0` disables splitting: the whole
    /// block is processed in one piece with all events applied up front.
    pub event_resolution: u32,
    /// Capacity of the native event buffer handed to the processor per block.
    pub event_capacity: usize,
    /// Number of SysEx slots available per process block.
    pub sysex_slots: usize,
    /// Maximum size of one SysEx message in bytes.
    pub sysex_buffer_size: usize,
}

impl Config {
    /// Default sub-block resolution (samples).
    pub const DEFAULT_EVENT_RESOLUTION: u32 = 64;
    /// Default native event buffer capacity per block.
    pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

    /// Create a configuration with the given display name and stable ID.
    pub const fn new(name: &'static str, id: &'static str) -> Self {
        Self {
            name,
            id,
            vendor: "",
            version: "0.0.0",
            url: "",
            manual_url: "",
            support_url: "",
            description: "",
            kind: PluginKind::AudioEffect,
            event_resolution: Self::DEFAULT_EVENT_RESOLUTION,
            event_capacity: Self::DEFAULT_EVENT_CAPACITY,
            sysex_slots: crate::events::SysExPool::DEFAULT_SLOTS,
            sysex_buffer_size: crate::events::SysExPool::DEFAULT_BUFFER_SIZE,
        }
    }

    /// Set the vendor name.
    pub const fn with_vendor(mut self, vendor: &'static str) -> Self {
        self.vendor = vendor;
        self
    }

    /// Set the version string.
    pub const fn with_version(mut self, version: &'static str) -> Self {
        self.version = version;
        self
    }

    /// Set the product URL.
    pub const fn with_url(mut self, url: &'static str) -> Self {
        self.url = url;
        self
    }

    /// Set the manual URL.
    pub const fn with_manual_url(mut self, url: &'static str) -> Self {
        self.manual_url = url;
        self
    }

    /// Set the support URL.
    pub const fn with_support_url(mut self, url: &'static str) -> Self {
        self.support_url = url;
        self
    }

    /// Set the one-line description.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Set the plugin category.
    pub const fn with_kind(mut self, kind: PluginKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the sub-block event resolution. `0` processes whole blocks.
    pub const fn with_event_resolution(mut self, resolution: u32) -> Self {
        self.event_resolution = resolution;
        self
    }

    /// Set the per-block native event buffer capacity.
    pub const fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Set the number of SysEx slots per process block.
    pub const fn with_sysex_slots(mut self, slots: usize) -> Self {
        self.sysex_slots = slots;
        self
    }

    /// Set the maximum SysEx message size in bytes.
    pub const fn with_sysex_buffer_size(mut self, size: usize) -> Self {
        self.sysex_buffer_size = size;
        self
    }
}
