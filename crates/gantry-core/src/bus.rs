//! Audio bus topology.
//!
//! The wrapped processor declares its bus layout once; the adapter reports
//! it to the host through the audio-ports extension and sizes its unified
//! channel storage from it. Topology is static for the life of the instance.

use crate::{MAX_BUSES, MAX_CHANNELS};

/// Main or auxiliary bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusType {
    /// The primary signal path.
    #[default]
    Main,
    /// Sidechain or auxiliary path.
    Aux,
}

/// One audio bus.
#[derive(Debug, Clone, Copy)]
pub struct BusInfo {
    /// Display name.
    pub name: &'static str,
    /// Number of channels.
    pub channel_count: u32,
    /// Main or auxiliary.
    pub bus_type: BusType,
}

impl BusInfo {
    /// A stereo main bus.
    pub const STEREO_MAIN: Self = Self {
        name: "Main",
        channel_count: 2,
        bus_type: BusType::Main,
    };

    /// Create a bus description.
    pub const fn new(name: &'static str, channel_count: u32, bus_type: BusType) -> Self {
        Self {
            name,
            channel_count,
            bus_type,
        }
    }
}

/// Validate a bus list against the adapter's limits.
///
/// Returns `Err` with a descriptive message when the list exceeds
/// [`MAX_BUSES`] or any bus exceeds [`MAX_CHANNELS`].
pub fn validate_buses(buses: &[BusInfo]) -> Result<(), String> {
    if buses.len() > MAX_BUSES {
        return Err(format!(
            "{} buses declared, but MAX_BUSES is {}",
            buses.len(),
            MAX_BUSES
        ));
    }
    for (i, bus) in buses.iter().enumerate() {
        if bus.channel_count as usize > MAX_CHANNELS {
            return Err(format!(
                "bus {} declares {} channels, but MAX_CHANNELS is {}",
                i, bus.channel_count, MAX_CHANNELS
            ));
        }
    }
    Ok(())
}

/// Total channel count across a bus list.
pub fn total_channels(buses: &[BusInfo]) -> usize {
    buses.iter().map(|b| b.channel_count as usize).sum()
}
