//! Plugin descriptor and factory.
//!
//! The host resolves `clap_entry`, asks it for the plugin factory, reads the
//! descriptor, and calls `create_plugin` with the ID it wants. The
//! [`export_clap!`](crate::export_clap) macro generates the entry and the
//! factory vtable in the plugin crate; the reusable pieces live here:
//! [`DescriptorStorage`] owns the C strings behind a `clap_plugin_descriptor`
//! and [`Factory`] matches IDs and constructs [`ClapWrapper`] instances.

use std::ffi::{c_char, CStr, CString};
use std::marker::PhantomData;

use clap_sys::host::clap_host;
use clap_sys::plugin::{clap_plugin, clap_plugin_descriptor};
use clap_sys::plugin_features::{
    CLAP_PLUGIN_FEATURE_AUDIO_EFFECT, CLAP_PLUGIN_FEATURE_INSTRUMENT,
    CLAP_PLUGIN_FEATURE_NOTE_EFFECT, CLAP_PLUGIN_FEATURE_STEREO,
};
use clap_sys::version::CLAP_VERSION;

use gantry_core::{Config, PluginKind, Processor};

use crate::wrapper::ClapWrapper;

/// Owns every allocation a `clap_plugin_descriptor` points into.
///
/// The descriptor holds raw `*const c_char` fields; this struct keeps the
/// backing `CString`s and the NUL-terminated feature array alive for as long
/// as the descriptor is visible to the host. The pointers target heap data,
/// so the storage itself may move (e.g. into a `OnceLock`) without
/// invalidating them; it must simply not be dropped or mutated.
pub struct DescriptorStorage {
    _strings: Vec<CString>,
    _features: Vec<*const c_char>,
    raw: clap_plugin_descriptor,
}

// SAFETY: The storage is immutable after construction and all pointers
// reference heap allocations it owns, so sharing references across threads
// cannot race.
unsafe impl Send for DescriptorStorage {}
// SAFETY: See above.
unsafe impl Sync for DescriptorStorage {}

impl DescriptorStorage {
    /// Build descriptor storage from the plugin configuration.
    pub fn from_config(config: &'static Config) -> Self {
        let mut strings = Vec::with_capacity(8);
        let mut intern = |s: &str| -> *const c_char {
            // Interior NULs cannot come from well-formed metadata; truncate
            // rather than refuse to build a descriptor.
            let cstring = CString::new(s).unwrap_or_else(|err| {
                let position = err.nul_position();
                let mut bytes = err.into_vec();
                bytes.truncate(position);
                CString::new(bytes).expect("truncated string still holds a NUL")
            });
            let ptr = cstring.as_ptr();
            strings.push(cstring);
            ptr
        };

        let id = intern(config.id);
        let name = intern(config.name);
        let vendor = intern(config.vendor);
        let url = intern(config.url);
        let manual_url = intern(config.manual_url);
        let support_url = intern(config.support_url);
        let version = intern(config.version);
        let description = intern(config.description);

        let kind_feature = match config.kind {
            PluginKind::AudioEffect => CLAP_PLUGIN_FEATURE_AUDIO_EFFECT,
            PluginKind::Instrument => CLAP_PLUGIN_FEATURE_INSTRUMENT,
            PluginKind::NoteEffect => CLAP_PLUGIN_FEATURE_NOTE_EFFECT,
        };
        let features: Vec<*const c_char> = vec![
            kind_feature.as_ptr(),
            CLAP_PLUGIN_FEATURE_STEREO.as_ptr(),
            std::ptr::null(),
        ];

        Self {
            raw: clap_plugin_descriptor {
                clap_version: CLAP_VERSION,
                id,
                name,
                vendor,
                url,
                manual_url,
                support_url,
                version,
                description,
                features: features.as_ptr(),
            },
            _strings: strings,
            _features: features,
        }
    }

    /// The raw descriptor. Valid for as long as the storage lives.
    pub fn raw(&self) -> *const clap_plugin_descriptor {
        &self.raw
    }
}

/// Factory for one wrapped processor type.
///
/// The generated factory vtable delegates here. One factory instance lives in
/// a `static` cell in the plugin crate and services every `create_plugin`
/// call for the process's lifetime.
pub struct Factory<P: Processor> {
    config: &'static Config,
    descriptor: DescriptorStorage,
    _marker: PhantomData<fn() -> P>,
}

impl<P: Processor + Default> Factory<P> {
    /// Build the factory and its descriptor.
    pub fn new(config: &'static Config) -> Self {
        Self {
            config,
            descriptor: DescriptorStorage::from_config(config),
            _marker: PhantomData,
        }
    }

    /// Number of plugin types this factory offers.
    pub fn plugin_count(&self) -> u32 {
        1
    }

    /// Descriptor at `index`, or null past the end.
    pub fn descriptor(&self, index: u32) -> *const clap_plugin_descriptor {
        if index == 0 {
            self.descriptor.raw()
        } else {
            std::ptr::null()
        }
    }

    /// Create a plugin instance for `plugin_id`.
    ///
    /// Returns null when the ID does not match this factory's plugin or when
    /// construction fails.
    ///
    /// # Safety
    ///
    /// `host` must be a valid `clap_host` outliving the created instance and
    /// `plugin_id` must be null or NUL-terminated. Main-thread only.
    pub unsafe fn create(
        &'static self,
        host: *const clap_host,
        plugin_id: *const c_char,
    ) -> *const clap_plugin {
        if host.is_null() || plugin_id.is_null() {
            return std::ptr::null();
        }
        // SAFETY: `plugin_id` is NUL-terminated per the factory contract.
        let requested = unsafe { CStr::from_ptr(plugin_id) };
        match requested.to_str() {
            Ok(id) if id == self.config.id => {}
            Ok(id) => {
                log::debug!("factory asked for unknown plugin ID \"{id}\"");
                return std::ptr::null();
            }
            Err(_) => return std::ptr::null(),
        }

        // SAFETY: The descriptor lives in this static factory; host validity
        // is the caller's guarantee.
        unsafe { ClapWrapper::<P>::create(self.config, self.descriptor.raw(), host) }
    }
}
