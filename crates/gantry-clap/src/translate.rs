//! Value-space translation between host and processor.
//!
//! The processor stores every value normalized in `[0, 1]`. The host works
//! in the *declared* space: for continuous parameters that is the same unit
//! range, for stepped parameters it is the true integer range `[min, max]`
//! so a host can display "3 of 0..7" instead of a fraction.
//!
//! Both directions are pure and deterministic, and round-trip stable:
//! `to_normalized(e, to_declared(e, v)) == v` for every value `v` on the
//! parameter's grid.

use crate::registry::RegistryEntry;

/// Convert a normalized value to the host's declared space.
pub fn to_declared(entry: &RegistryEntry, normalized: f64) -> f64 {
    let normalized = normalized.clamp(0.0, 1.0);
    if entry.step_count > 0 {
        let step = (normalized * entry.step_count as f64).round();
        entry.range.min + step * entry.range.span() / entry.step_count as f64
    } else {
        normalized
    }
}

/// Convert a host declared value back to normalized space.
pub fn to_normalized(entry: &RegistryEntry, declared: f64) -> f64 {
    if entry.step_count > 0 {
        let span = entry.range.span();
        if span == 0.0 {
            return 0.0;
        }
        let fraction = ((declared - entry.range.min) / span).clamp(0.0, 1.0);
        (fraction * entry.step_count as f64).round() / entry.step_count as f64
    } else {
        declared.clamp(0.0, 1.0)
    }
}

/// Convert a host declared *offset* (modulation amount) to a normalized
/// offset. Offsets scale by the range width but have no origin shift.
pub fn offset_to_normalized(entry: &RegistryEntry, declared_offset: f64) -> f64 {
    if entry.step_count > 0 {
        let span = entry.range.span();
        if span == 0.0 {
            return 0.0;
        }
        declared_offset / span
    } else {
        declared_offset
    }
}

/// Declared minimum reported in the host's parameter info.
pub fn declared_min(entry: &RegistryEntry) -> f64 {
    if entry.step_count > 0 {
        entry.range.min
    } else {
        0.0
    }
}

/// Declared maximum reported in the host's parameter info.
pub fn declared_max(entry: &RegistryEntry) -> f64 {
    if entry.step_count > 0 {
        entry.range.max
    } else {
        1.0
    }
}
