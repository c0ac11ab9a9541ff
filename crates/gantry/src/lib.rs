//! # Gantry
//!
//! CLAP adapter framework for Rust audio processors.
//!
//! Gantry bridges a processor object model (the [`Processor`](gantry_core::Processor)
//! trait family in `gantry-core`) to the CLAP plugin ABI that a host
//! application loads and drives. The adapter owns the hard parts of that
//! boundary: lock-free queues between the host's audio and main threads, a
//! stable parameter identity registry, value-space translation, and a
//! block-splitting engine that interleaves timed events with sub-block audio
//! processing.
//!
//! ## Architecture
//!
//! ```text
//! Your Processor (implements gantry_core::Processor)
//!        ↓
//! ClapWrapper<P> (generic CLAP wrapper)
//!        ↓
//! CLAP C ABI (clap_plugin + extensions)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use gantry::prelude::*;
//!
//! struct MyGain { params: std::sync::Arc<ParameterSet> }
//!
//! impl Processor for MyGain {
//!     fn parameters(&self) -> &std::sync::Arc<ParameterSet> { &self.params }
//!     fn process(&mut self, block: &mut Block, events: &EventBuffer,
//!                out: &mut EventBuffer, ctx: &ProcessContext) {
//!         // Your DSP here
//!     }
//!     // state, buses, capabilities...
//! }
//!
//! // Export
//! static CONFIG: Config = Config::new("My Gain", "com.example.my-gain");
//! export_clap!(CONFIG, MyGain);
//! ```

// Re-export sub-crates
pub use gantry_core as core;

#[cfg(feature = "clap")]
pub use gantry_clap as clap_impl;

/// Re-export of the raw CLAP bindings for plugins that need direct ABI
/// access, without adding their own dependency on the `clap-sys` crate.
#[cfg(feature = "clap")]
pub mod clap_sys {
    pub use ::clap_sys::*;
}

/// Prelude module for convenient imports.
///
/// Import everything you need to build a plugin:
/// ```rust,ignore
/// use gantry::prelude::*;
/// ```
pub mod prelude {
    // Core traits and types
    pub use gantry_core::{
        // Audio block view
        Block,
        // Bus configuration
        BusInfo, BusType,
        // Plugin metadata and engine policy
        Config, PluginKind,
        // Native event model
        EventBuffer, NativeEvent, SysExPool, TimedEvent,
        // Value display
        Formatter,
        // Parameter metadata and storage
        Parameter, ParameterFlags, ParameterInfo, ParameterNotification, ParameterRange,
        ParameterSet,
        // The processor contract and capability interfaces
        DirectProcessor, Editor, NoteName, NoteNameSource, ParentWindow, ProcessContext,
        Processor, ProcessorSetup, RemoteControlPage, RemoteControlSource, RenderMode,
        StateError, VoiceInfo, VoiceInfoSource,
        // Transport snapshot
        Transport,
    };

    // Default parameter-state helpers
    pub use gantry_core::state::{load_parameters, save_parameters};

    // CLAP implementation (only when feature enabled)
    #[cfg(feature = "clap")]
    pub use gantry_clap::{export_clap, ClapWrapper};
}
