//! # gantry-core
//!
//! The processor object model wrapped by the Gantry CLAP adapter.
//!
//! This crate defines the contract between a wrapped audio processor and the
//! format adapter in `gantry-clap`:
//!
//! - [`Processor`] - the block-processing object with a stable parameter list,
//!   bus topology, and state-as-bytes serialization
//! - [`ParameterSet`] - atomic parameter value slots plus listener
//!   (observer) registration
//! - [`EventBuffer`] - the processor's native timed-event model
//! - [`Block`] - the unified in/out channel buffer view handed to
//!   [`Processor::process`]
//! - Optional capability interfaces ([`DirectProcessor`], [`NoteNameSource`],
//!   [`VoiceInfoSource`], [`RemoteControlSource`], [`Editor`]) probed once by
//!   the adapter at construction
//!
//! ```text
//! User Processor (implements gantry_core::Processor)
//!        ↓
//! ClapWrapper<P> (gantry-clap)
//!        ↓
//! CLAP C ABI (clap_plugin + extensions)
//! ```

pub mod buffer;
pub mod bus;
pub mod config;
pub mod events;
pub mod format;
pub mod params;
pub mod processor;
pub mod state;
pub mod transport;

pub use buffer::Block;
pub use bus::{BusInfo, BusType};
pub use config::{Config, PluginKind};
pub use events::{EventBuffer, NativeEvent, SysExPool, TimedEvent};
pub use format::Formatter;
pub use params::{
    Parameter, ParameterFlags, ParameterInfo, ParameterNotification, ParameterRange, ParameterSet,
};
pub use processor::{
    DirectProcessor, Editor, NoteName, NoteNameSource, ParentWindow, ProcessContext, Processor,
    ProcessorSetup, RemoteControlPage, RemoteControlSource, RenderMode, StateError, VoiceInfo,
    VoiceInfoSource, REMOTE_CONTROLS_PER_PAGE,
};
pub use transport::Transport;

/// Maximum number of unified audio channels the adapter will address.
pub const MAX_CHANNELS: usize = 64;

/// Maximum number of audio buses per direction.
pub const MAX_BUSES: usize = 8;
