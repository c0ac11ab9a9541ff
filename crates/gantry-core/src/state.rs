//! Default parameter state container.
//!
//! Processors with no custom state format can implement
//! [`Processor::save_state`](crate::Processor::save_state) /
//! [`load_state`](crate::Processor::load_state) by delegating to these
//! helpers, which serialize the parameter set as a small versioned JSON
//! document keyed by parameter string IDs. Unknown keys in a loaded document
//! are ignored, so parameter additions stay backward compatible; parameters
//! missing from the document keep their current values.
//!
//! The adapter never interprets these bytes. Whatever the processor writes
//! is what the host gets, byte for byte.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::params::ParameterSet;
use crate::processor::StateError;

const STATE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct StateDocument {
    version: u32,
    params: BTreeMap<String, f64>,
}

/// Serialize every parameter's normalized base value into `out`.
pub fn save_parameters(params: &ParameterSet, out: &mut Vec<u8>) -> Result<(), StateError> {
    let doc = StateDocument {
        version: STATE_VERSION,
        params: params
            .iter()
            .map(|p| (p.info().string_id.to_string(), p.normalized()))
            .collect(),
    };
    serde_json::to_writer(&mut *out, &doc).map_err(|err| {
        log::error!("failed to serialize parameter state: {err}");
        StateError::Malformed
    })
}

/// Restore parameter values from a document written by [`save_parameters`].
pub fn load_parameters(params: &ParameterSet, bytes: &[u8]) -> Result<(), StateError> {
    let doc: StateDocument = serde_json::from_slice(bytes).map_err(|err| {
        log::warn!("failed to parse parameter state: {err}");
        StateError::Malformed
    })?;
    if doc.version > STATE_VERSION {
        return Err(StateError::VersionMismatch);
    }

    for (string_id, normalized) in &doc.params {
        match params.index_of(string_id) {
            Some(index) => {
                if let Some(param) = params.get(index) {
                    param.set_normalized(*normalized);
                }
            }
            None => log::debug!("ignoring unknown parameter \"{string_id}\" in state"),
        }
    }
    Ok(())
}
