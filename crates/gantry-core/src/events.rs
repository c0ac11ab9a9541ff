//! The wrapped processor's native timed-event model.
//!
//! The adapter translates host events into [`NativeEvent`]s and hands the
//! processor one [`EventBuffer`] per sub-block. The processor pushes its own
//! output (note ends, MIDI out, SysEx) into a second buffer the adapter
//! relays back to the host. Both buffers are pre-allocated and reused every
//! block; pushing into a full buffer drops the event and latches a flag
//! instead of allocating.

/// One event in the processor's native model.
///
/// Sample offsets live on [`TimedEvent`], relative to the start of the
/// sub-block being processed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NativeEvent {
    /// A note starts.
    NoteOn {
        /// MIDI key number, 0-127.
        key: u8,
        /// MIDI channel, 0-15.
        channel: u8,
        /// Velocity, 0.0-1.0.
        velocity: f32,
        /// Host voice ID, or -1 when the host did not assign one.
        voice_id: i32,
    },
    /// A note is released.
    NoteOff {
        /// MIDI key number, 0-127.
        key: u8,
        /// MIDI channel, 0-15.
        channel: u8,
        /// Release velocity, 0.0-1.0.
        velocity: f32,
        /// Host voice ID, or -1.
        voice_id: i32,
    },
    /// A voice finished on its own. Outbound only: the processor reports it
    /// so the host can retire per-voice modulation state.
    NoteEnd {
        /// MIDI key number, 0-127.
        key: u8,
        /// MIDI channel, 0-15.
        channel: u8,
        /// Host voice ID, or -1.
        voice_id: i32,
    },
    /// A raw short MIDI message.
    Midi {
        /// Status byte plus up to two data bytes.
        data: [u8; 3],
    },
    /// A SysEx message. The payload lives in the buffer's [`SysExPool`];
    /// resolve it with [`EventBuffer::sysex`].
    SysEx {
        /// Pool slot index.
        slot: u16,
        /// Payload length in bytes.
        len: u16,
    },
    /// A parameter value in normalized space. Only delivered to direct
    /// processors; in the standard path the adapter applies values to the
    /// parameter slots itself.
    ParamValue {
        /// Index into the processor's parameter set.
        index: u32,
        /// New normalized value.
        normalized: f64,
    },
    /// A per-voice modulation offset for a poly-modulatable parameter.
    PolyModulation {
        /// Index into the processor's parameter set.
        index: u32,
        /// Target voice ID.
        voice_id: i32,
        /// Normalized additive offset.
        offset: f64,
    },
}

/// A [`NativeEvent`] with its sample offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedEvent {
    /// Offset in samples, relative to the current sub-block start.
    pub time: u32,
    /// The event payload.
    pub event: NativeEvent,
}

/// Pre-allocated SysEx payload pool.
///
/// Fixed slot count and slot size; allocation after exhaustion drops the
/// payload and latches an overflow flag. Slot contents are stable until
/// [`SysExPool::clear`].
pub struct SysExPool {
    buffers: Vec<Vec<u8>>,
    lengths: Vec<usize>,
    next_slot: usize,
    overflowed: bool,
}

impl SysExPool {
    /// Default number of slots per process block.
    pub const DEFAULT_SLOTS: usize = 16;
    /// Default maximum size per message.
    pub const DEFAULT_BUFFER_SIZE: usize = 512;

    /// Create a pool with the given slot count and per-slot size.
    pub fn with_capacity(slots: usize, buffer_size: usize) -> Self {
        Self {
            buffers: (0..slots).map(|_| vec![0u8; buffer_size]).collect(),
            lengths: vec![0; slots],
            next_slot: 0,
            overflowed: false,
        }
    }

    /// Reset for reuse. O(1).
    #[inline]
    pub fn clear(&mut self) {
        self.next_slot = 0;
        self.overflowed = false;
    }

    /// Copy `data` into the next free slot, truncating to the slot size.
    /// Returns the slot index, or `None` when the pool is exhausted.
    pub fn allocate(&mut self, data: &[u8]) -> Option<usize> {
        if self.next_slot >= self.buffers.len() {
            self.overflowed = true;
            return None;
        }
        let slot = self.next_slot;
        self.next_slot += 1;

        let copy_len = data.len().min(self.buffers[slot].len());
        self.buffers[slot][..copy_len].copy_from_slice(&data[..copy_len]);
        self.lengths[slot] = copy_len;
        Some(slot)
    }

    /// Payload bytes of a slot.
    pub fn get(&self, slot: usize) -> Option<&[u8]> {
        let len = *self.lengths.get(slot)?;
        Some(&self.buffers.get(slot)?[..len])
    }

    /// `true` when an allocation was dropped since the last clear.
    #[inline]
    pub fn has_overflowed(&self) -> bool {
        self.overflowed
    }
}

/// Fixed-capacity event list handed to and produced by the processor.
pub struct EventBuffer {
    events: Vec<TimedEvent>,
    capacity: usize,
    dropped: bool,
    sysex: SysExPool,
}

impl EventBuffer {
    /// Create a buffer with the given event capacity and default SysEx pool.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_sysex(
            capacity,
            SysExPool::DEFAULT_SLOTS,
            SysExPool::DEFAULT_BUFFER_SIZE,
        )
    }

    /// Create a buffer with explicit event and SysEx capacities.
    pub fn with_capacity_and_sysex(
        capacity: usize,
        sysex_slots: usize,
        sysex_buffer_size: usize,
    ) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
            capacity,
            dropped: false,
            sysex: SysExPool::with_capacity(sysex_slots, sysex_buffer_size),
        }
    }

    /// Append an event. Returns `false` and drops it when full.
    pub fn push(&mut self, time: u32, event: NativeEvent) -> bool {
        if self.events.len() >= self.capacity {
            self.dropped = true;
            return false;
        }
        self.events.push(TimedEvent { time, event });
        true
    }

    /// Append a SysEx message, copying the payload into the pool. Drops the
    /// event when either the event list or the pool is full.
    pub fn push_sysex(&mut self, time: u32, data: &[u8]) -> bool {
        if self.events.len() >= self.capacity {
            self.dropped = true;
            return false;
        }
        match self.sysex.allocate(data) {
            Some(slot) => {
                let len = data.len().min(u16::MAX as usize) as u16;
                self.events.push(TimedEvent {
                    time,
                    event: NativeEvent::SysEx {
                        slot: slot as u16,
                        len,
                    },
                });
                true
            }
            None => {
                self.dropped = true;
                false
            }
        }
    }

    /// Resolve the payload of a [`NativeEvent::SysEx`].
    pub fn sysex(&self, slot: u16, len: u16) -> &[u8] {
        match self.sysex.get(slot as usize) {
            Some(bytes) => &bytes[..(len as usize).min(bytes.len())],
            None => &[],
        }
    }

    /// Events in push order.
    #[inline]
    pub fn events(&self) -> &[TimedEvent] {
        &self.events
    }

    /// Number of buffered events.
    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// `true` when no events are buffered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// `true` when any event was dropped since the last clear.
    #[inline]
    pub fn has_dropped(&self) -> bool {
        self.dropped
    }

    /// Reset for reuse without freeing storage.
    pub fn clear(&mut self) {
        self.events.clear();
        self.dropped = false;
        self.sysex.clear();
    }
}
