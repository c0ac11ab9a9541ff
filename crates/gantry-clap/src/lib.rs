//! # gantry-clap
//!
//! CLAP adapter layer for the Gantry framework.
//!
//! This crate bridges a [`gantry_core::Processor`] to the CLAP C ABI. The
//! host loads the shared library, resolves `clap_entry`, and drives the
//! plugin through `clap_plugin` and its extension vtables; everything the
//! host calls lands in [`ClapWrapper`].
//!
//! ```text
//! User Processor (implements gantry_core::Processor)
//!        ↓
//! ClapWrapper<P> (this crate)
//!        ↓
//! CLAP C ABI (clap_plugin, clap_plugin_params, clap_plugin_state, ...)
//! ```
//!
//! The interesting machinery lives in a handful of modules:
//!
//! - [`queue`] - lock-free single-producer/single-consumer rings carrying
//!   fixed-size records between the host's threads
//! - [`registry`] - the stable parameter-identity map between processor
//!   parameters and host-visible 32-bit IDs
//! - [`translate`] - conversion between the host's declared value space and
//!   the processor's normalized space
//! - [`engine`] - the per-block event/audio interleaving engine with
//!   sub-block splitting
//! - [`bridge`] - deferred main-thread notification via the host's
//!   `request_callback` mechanism
//!
//! Use [`export_clap!`] to generate the `clap_entry` symbol.

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]

pub mod bridge;
pub mod engine;
pub mod events;
pub mod factory;
pub mod host;
pub mod queue;
pub mod registry;
pub mod translate;
pub mod util;
pub mod wrapper;

mod export;

// Re-exports
pub use factory::{DescriptorStorage, Factory};
pub use registry::{external_id_for, ParamRegistry};
pub use wrapper::ClapWrapper;

// Re-export shared types from gantry-core
pub use gantry_core::Config;

// Re-export clap-sys for use in the export macro
pub use clap_sys;

#[cfg(test)]
pub(crate) mod testing;
