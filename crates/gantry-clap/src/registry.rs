//! Parameter identity registry.
//!
//! The host addresses parameters by a 32-bit ID that must stay stable across
//! sessions and plugin versions. The registry derives each ID
//! deterministically from the parameter's string identifier, builds the
//! forward and reverse maps once at construction, and never mutates them
//! afterwards, which is what makes concurrent lookups from the real-time
//! and main threads safe without locks.
//!
//! An ID collision inside one plugin's parameter set would corrupt all
//! subsequent parameter addressing, so construction fails fatally instead of
//! picking a winner.

use std::collections::HashMap;
use std::fmt;

use gantry_core::{ParameterRange, ParameterSet};

/// Derive the host-visible ID for a parameter string identifier.
///
/// 31-multiplier accumulation over the UTF-8 bytes. The constant matters:
/// sessions saved by earlier builds address parameters by exactly these
/// values.
pub fn external_id_for(string_id: &str) -> u32 {
    let mut hash: u32 = 0;
    for &byte in string_id.as_bytes() {
        hash = hash.wrapping_mul(31).wrapping_add(byte as u32);
    }
    hash
}

/// Cached per-parameter record: the external ID plus everything the
/// real-time path needs without touching `ParameterInfo` again.
#[derive(Debug, Clone, Copy)]
pub struct RegistryEntry {
    /// Host-visible 32-bit ID.
    pub external_id: u32,
    /// Index into the processor's parameter set (the internal handle).
    pub index: usize,
    /// Declared range cached from the parameter metadata.
    pub range: ParameterRange,
    /// Step count cached from the parameter metadata (0 = continuous).
    pub step_count: u32,
    /// The host may automate this parameter.
    pub automatable: bool,
    /// The host may send monophonic modulation.
    pub modulatable: bool,
    /// The host may send per-voice modulation.
    pub poly_modulatable: bool,
}

/// Registry construction failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Two parameter string IDs hash to the same external ID.
    Collision {
        /// The colliding external ID.
        external_id: u32,
        /// String ID registered first.
        first: &'static str,
        /// String ID that collided with it.
        second: &'static str,
    },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::Collision {
                external_id,
                first,
                second,
            } => write!(
                f,
                "parameter ID collision: \"{first}\" and \"{second}\" both hash to {external_id:#010x}"
            ),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Immutable bidirectional map between parameter indices and external IDs.
pub struct ParamRegistry {
    /// Entries in declaration order; position == parameter index.
    entries: Vec<RegistryEntry>,
    /// external ID → parameter index.
    by_external: HashMap<u32, usize>,
}

impl ParamRegistry {
    /// Enumerate the parameter set and build both maps.
    ///
    /// Fails on an external-ID collision; the adapter treats that as a fatal
    /// construction error.
    pub fn build(params: &ParameterSet) -> Result<Self, RegistryError> {
        let mut entries = Vec::with_capacity(params.len());
        let mut by_external = HashMap::with_capacity(params.len());

        for (index, param) in params.iter().enumerate() {
            let info = param.info();
            let external_id = external_id_for(info.string_id);

            if let Some(&existing) = by_external.get(&external_id) {
                let first: &RegistryEntry = &entries[existing];
                let first_id = params
                    .get(first.index)
                    .map(|p| p.info().string_id)
                    .unwrap_or("");
                return Err(RegistryError::Collision {
                    external_id,
                    first: first_id,
                    second: info.string_id,
                });
            }

            by_external.insert(external_id, index);
            entries.push(RegistryEntry {
                external_id,
                index,
                range: info.range,
                step_count: info.step_count,
                automatable: info.flags.automatable,
                modulatable: info.flags.modulatable,
                poly_modulatable: info.flags.poly_modulatable,
            });
        }

        Ok(Self {
            entries,
            by_external,
        })
    }

    /// Number of registered parameters.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when no parameters are registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry by declaration-order position (what the host's `param_info`
    /// index means).
    #[inline]
    pub fn entry_at(&self, position: usize) -> Option<&RegistryEntry> {
        self.entries.get(position)
    }

    /// Resolve a host-supplied external ID. O(1) average.
    #[inline]
    pub fn by_external_id(&self, external_id: u32) -> Option<&RegistryEntry> {
        self.by_external
            .get(&external_id)
            .and_then(|&index| self.entries.get(index))
    }

    /// Reverse lookup: external ID for a parameter index. O(1).
    #[inline]
    pub fn external_id_of(&self, index: usize) -> Option<u32> {
        self.entries.get(index).map(|e| e.external_id)
    }

    /// `true` when the ID belongs to this registry.
    #[inline]
    pub fn is_valid(&self, external_id: u32) -> bool {
        self.by_external.contains_key(&external_id)
    }
}
