//! Safe-ish views over the host's event lists.
//!
//! [`InEvents`] wraps the host's `clap_input_events` for ordered iteration;
//! [`OutSink`] wraps `clap_output_events` with typed push helpers for every
//! outbound event the adapter produces. Both are transient views valid only
//! inside the host callback that provided the raw pointers.

use clap_sys::events::{
    clap_event_header, clap_event_midi, clap_event_midi_sysex, clap_event_note,
    clap_event_param_gesture, clap_event_param_value, clap_input_events, clap_output_events,
    CLAP_CORE_EVENT_SPACE_ID, CLAP_EVENT_IS_LIVE, CLAP_EVENT_MIDI, CLAP_EVENT_MIDI_SYSEX,
    CLAP_EVENT_NOTE_END, CLAP_EVENT_NOTE_OFF, CLAP_EVENT_NOTE_ON, CLAP_EVENT_PARAM_GESTURE_BEGIN,
    CLAP_EVENT_PARAM_GESTURE_END, CLAP_EVENT_PARAM_VALUE,
};

/// Ordered view over the host's inbound event list.
pub struct InEvents {
    raw: *const clap_input_events,
    len: u32,
}

impl InEvents {
    /// Wrap the host's list.
    ///
    /// # Safety
    ///
    /// `raw` must be null or a valid `clap_input_events` for the duration of
    /// the current host callback.
    pub unsafe fn new(raw: *const clap_input_events) -> Self {
        // SAFETY: Caller guarantees validity; a null list reads as empty.
        let len = unsafe {
            if raw.is_null() {
                0
            } else {
                match (*raw).size {
                    Some(size) => size(raw),
                    None => 0,
                }
            }
        };
        Self { raw, len }
    }

    /// Number of events this block.
    #[inline]
    pub fn len(&self) -> u32 {
        self.len
    }

    /// `true` when the list is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Header of the event at `index`, or `None` when out of range or the
    /// host returns a null/truncated record.
    pub fn get(&self, index: u32) -> Option<&clap_event_header> {
        if index >= self.len {
            return None;
        }
        // SAFETY: The constructor contract guarantees the list is valid for
        // this callback; the host guarantees `get` returns a pointer to an
        // event with at least a full header for indices < size().
        unsafe {
            let get = (*self.raw).get?;
            let header = get(self.raw, index);
            if header.is_null() || (*header).size < std::mem::size_of::<clap_event_header>() as u32
            {
                return None;
            }
            Some(&*header)
        }
    }
}

/// Read an event header as a concrete event struct, checking the declared
/// size first so malformed events are skipped rather than over-read.
///
/// # Safety
///
/// `header` must point into an event record valid for `header.size` bytes.
pub unsafe fn cast_event<T>(header: &clap_event_header) -> Option<&T> {
    if (header.size as usize) < std::mem::size_of::<T>() {
        return None;
    }
    // SAFETY: The size check above plus the caller's validity guarantee make
    // the reinterpretation in-bounds; CLAP events embed the header first.
    Some(unsafe { &*(header as *const clap_event_header as *const T) })
}

/// Typed push helpers over the host's outbound event queue.
pub struct OutSink {
    raw: *const clap_output_events,
}

impl OutSink {
    /// Wrap the host's queue.
    ///
    /// # Safety
    ///
    /// `raw` must be null or a valid `clap_output_events` for the duration
    /// of the current host callback.
    pub unsafe fn new(raw: *const clap_output_events) -> Self {
        Self { raw }
    }

    fn try_push(&self, header: *const clap_event_header) -> bool {
        // SAFETY: The constructor contract guarantees the queue is valid for
        // this callback; the event is fully initialized by the callers below
        // and the host copies it during try_push.
        unsafe {
            if self.raw.is_null() {
                return false;
            }
            match (*self.raw).try_push {
                Some(try_push) => try_push(self.raw, header),
                None => false,
            }
        }
    }

    fn header(time: u32, type_: u16, size: usize, live: bool) -> clap_event_header {
        clap_event_header {
            size: size as u32,
            time,
            space_id: CLAP_CORE_EVENT_SPACE_ID,
            type_,
            flags: if live { CLAP_EVENT_IS_LIVE } else { 0 },
        }
    }

    /// Report a parameter value in the declared space.
    pub fn push_param_value(&self, time: u32, external_id: u32, declared: f64, live: bool) -> bool {
        let event = clap_event_param_value {
            header: Self::header(
                time,
                CLAP_EVENT_PARAM_VALUE,
                std::mem::size_of::<clap_event_param_value>(),
                live,
            ),
            param_id: external_id,
            cookie: std::ptr::null_mut(),
            note_id: -1,
            port_index: -1,
            channel: -1,
            key: -1,
            value: declared,
        };
        self.try_push(&event.header)
    }

    /// Report a gesture begin/end for a parameter.
    pub fn push_param_gesture(&self, time: u32, external_id: u32, begin: bool) -> bool {
        let event = clap_event_param_gesture {
            header: Self::header(
                time,
                if begin {
                    CLAP_EVENT_PARAM_GESTURE_BEGIN
                } else {
                    CLAP_EVENT_PARAM_GESTURE_END
                },
                std::mem::size_of::<clap_event_param_gesture>(),
                true,
            ),
            param_id: external_id,
        };
        self.try_push(&event.header)
    }

    fn push_note(
        &self,
        type_: u16,
        time: u32,
        key: u8,
        channel: u8,
        velocity: f64,
        voice_id: i32,
    ) -> bool {
        let event = clap_event_note {
            header: Self::header(time, type_, std::mem::size_of::<clap_event_note>(), false),
            note_id: voice_id,
            port_index: 0,
            channel: channel as i16,
            key: key as i16,
            velocity,
        };
        self.try_push(&event.header)
    }

    /// Report a note-on produced by the processor.
    pub fn push_note_on(&self, time: u32, key: u8, channel: u8, velocity: f64, voice_id: i32) -> bool {
        self.push_note(CLAP_EVENT_NOTE_ON, time, key, channel, velocity, voice_id)
    }

    /// Report a note-off produced by the processor.
    pub fn push_note_off(&self, time: u32, key: u8, channel: u8, velocity: f64, voice_id: i32) -> bool {
        self.push_note(CLAP_EVENT_NOTE_OFF, time, key, channel, velocity, voice_id)
    }

    /// Tell the host a voice ended so it can retire per-voice modulation.
    pub fn push_note_end(&self, time: u32, key: u8, channel: u8, voice_id: i32) -> bool {
        self.push_note(CLAP_EVENT_NOTE_END, time, key, channel, 0.0, voice_id)
    }

    /// Report a short MIDI message produced by the processor.
    pub fn push_midi(&self, time: u32, data: [u8; 3]) -> bool {
        let event = clap_event_midi {
            header: Self::header(time, CLAP_EVENT_MIDI, std::mem::size_of::<clap_event_midi>(), false),
            port_index: 0,
            data,
        };
        self.try_push(&event.header)
    }

    /// Report a SysEx message. `buffer` must stay valid for the duration of
    /// the `try_push` call; the host copies it.
    pub fn push_midi_sysex(&self, time: u32, buffer: &[u8]) -> bool {
        let event = clap_event_midi_sysex {
            header: Self::header(
                time,
                CLAP_EVENT_MIDI_SYSEX,
                std::mem::size_of::<clap_event_midi_sysex>(),
                false,
            ),
            port_index: 0,
            buffer: buffer.as_ptr(),
            size: buffer.len() as u32,
        };
        self.try_push(&event.header)
    }
}
