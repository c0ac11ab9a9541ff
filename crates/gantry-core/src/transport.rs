//! Transport and timeline information.
//!
//! Hosts report timeline state with validity flags; fields the host did not
//! fill are `None` here. The snapshot handed to [`crate::Processor::process`]
//! is only valid for the duration of that call.

/// A per-block transport snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Transport {
    /// `false` when the host supplied no transport this block. All optional
    /// fields are `None` in that case.
    pub available: bool,

    /// Tempo in beats per minute.
    pub tempo: Option<f64>,
    /// Time signature as (numerator, denominator).
    pub time_signature: Option<(u16, u16)>,

    /// Playback position on the musical timeline, in quarter notes.
    pub pos_beats: Option<f64>,
    /// Playback position on the wall-clock timeline, in seconds.
    pub pos_seconds: Option<f64>,
    /// Start of the current bar, in quarter notes.
    pub bar_start_beats: Option<f64>,
    /// Index of the current bar.
    pub bar_number: Option<i32>,

    /// Loop range on the musical timeline, in quarter notes.
    pub loop_range_beats: Option<(f64, f64)>,
    /// Loop range on the wall-clock timeline, in seconds.
    pub loop_range_seconds: Option<(f64, f64)>,

    /// The host transport is rolling.
    pub is_playing: bool,
    /// The host is recording.
    pub is_recording: bool,
    /// The loop is engaged.
    pub is_loop_active: bool,
}

impl Transport {
    /// A snapshot marking transport information as unavailable.
    pub const UNAVAILABLE: Self = Self {
        available: false,
        tempo: None,
        time_signature: None,
        pos_beats: None,
        pos_seconds: None,
        bar_start_beats: None,
        bar_number: None,
        loop_range_beats: None,
        loop_range_seconds: None,
        is_playing: false,
        is_recording: false,
        is_loop_active: false,
    };

    /// Shift the musical/wall-clock positions forward by `samples` at the
    /// given sample rate, for sub-block processing after a split. Positions
    /// the host did not supply stay `None`.
    pub fn advanced_by(&self, samples: u32, sample_rate: f64) -> Self {
        if !self.available || samples == 0 || sample_rate <= 0.0 {
            return *self;
        }
        let seconds = samples as f64 / sample_rate;
        let mut advanced = *self;
        advanced.pos_seconds = self.pos_seconds.map(|s| s + seconds);
        if let (Some(beats), Some(tempo)) = (self.pos_beats, self.tempo) {
            advanced.pos_beats = Some(beats + seconds * tempo / 60.0);
        }
        advanced
    }
}
