//! Parameter metadata, atomic value storage, and change listeners.
//!
//! Parameters live in a [`ParameterSet`] owned by the wrapped processor and
//! shared with the adapter behind an `Arc`. Values are stored normalized in
//! `[0, 1]` as `f64` bit patterns inside atomics, so both the real-time and
//! the main thread can read them without locks. The set is built once and
//! never grows or shrinks afterwards; only the values change.
//!
//! Change notification uses registered observer closures. The editor (or any
//! non-real-time caller) goes through [`ParameterSet::set_from_ui`] /
//! [`ParameterSet::begin_gesture`] / [`ParameterSet::end_gesture`], which
//! update the slot and fan the change out to every observer. The adapter
//! registers its own observer once during construction and forwards changes
//! to the host; host-driven changes are applied directly to the slots on the
//! audio thread and replayed to observers later from the main thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::format::Formatter;

/// Declared (native) value range of a parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterRange {
    /// Smallest declared value.
    pub min: f64,
    /// Largest declared value.
    pub max: f64,
}

impl ParameterRange {
    /// The normalized unit range.
    pub const UNIT: Self = Self { min: 0.0, max: 1.0 };

    /// Create a range from `min` to `max`.
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Width of the range.
    #[inline]
    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// Behavioral flags for a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterFlags {
    /// The host may automate this parameter.
    pub automatable: bool,
    /// The host may apply monophonic modulation offsets.
    pub modulatable: bool,
    /// The host may apply per-voice modulation offsets.
    pub poly_modulatable: bool,
    /// This parameter is the bypass switch.
    pub is_bypass: bool,
    /// Hidden from the host's parameter list.
    pub is_hidden: bool,
    /// Display only; rejects host writes.
    pub is_readonly: bool,
}

impl Default for ParameterFlags {
    fn default() -> Self {
        Self {
            automatable: true,
            modulatable: false,
            poly_modulatable: false,
            is_bypass: false,
            is_hidden: false,
            is_readonly: false,
        }
    }
}

/// Static metadata describing one parameter.
///
/// The string identifier is the parameter's stable identity: the adapter
/// derives the host-visible 32-bit ID from it, and the default state format
/// keys values by it. Renaming a `string_id` orphans automation and saved
/// state, just like changing a plugin ID would.
#[derive(Debug, Clone)]
pub struct ParameterInfo {
    /// Stable string identifier, e.g. `"gain"`.
    pub string_id: &'static str,
    /// Display name, e.g. `"Gain"`.
    pub name: &'static str,
    /// Unit label, e.g. `"dB"`. Purely informational; the formatter decides
    /// the displayed unit.
    pub units: &'static str,
    /// Group path with `/` separators, or `""` for ungrouped.
    pub group: &'static str,
    /// Declared (native) range, used when the host wants the true range of a
    /// stepped parameter instead of a fraction.
    pub range: ParameterRange,
    /// Number of discrete steps. `0` = continuous, `1` = toggle.
    pub step_count: u32,
    /// Default value, normalized.
    pub default_normalized: f64,
    /// Value display formatter.
    pub formatter: Formatter,
    /// Behavioral flags.
    pub flags: ParameterFlags,
}

impl ParameterInfo {
    /// Create a continuous parameter with the unit range and default flags.
    pub const fn new(string_id: &'static str, name: &'static str) -> Self {
        Self {
            string_id,
            name,
            units: "",
            group: "",
            range: ParameterRange::UNIT,
            step_count: 0,
            default_normalized: 0.5,
            formatter: Formatter::Float { precision: 2 },
            flags: ParameterFlags {
                automatable: true,
                modulatable: false,
                poly_modulatable: false,
                is_bypass: false,
                is_hidden: false,
                is_readonly: false,
            },
        }
    }

    /// Create a standard bypass toggle.
    pub const fn bypass(string_id: &'static str) -> Self {
        let mut info = Self::new(string_id, "Bypass");
        info.step_count = 1;
        info.default_normalized = 0.0;
        info.formatter = Formatter::Boolean;
        info.flags.is_bypass = true;
        info
    }

    /// Set the unit label.
    pub const fn with_units(mut self, units: &'static str) -> Self {
        self.units = units;
        self
    }

    /// Set the group path.
    pub const fn with_group(mut self, group: &'static str) -> Self {
        self.group = group;
        self
    }

    /// Set the declared range.
    pub const fn with_range(mut self, min: f64, max: f64) -> Self {
        self.range = ParameterRange::new(min, max);
        self
    }

    /// Set the step count (`0` = continuous).
    pub const fn with_steps(mut self, steps: u32) -> Self {
        self.step_count = steps;
        self
    }

    /// Set the normalized default value.
    pub const fn with_default(mut self, default: f64) -> Self {
        self.default_normalized = default;
        self
    }

    /// Set the display formatter.
    pub const fn with_formatter(mut self, formatter: Formatter) -> Self {
        self.formatter = formatter;
        self
    }

    /// Allow monophonic modulation.
    pub const fn modulatable(mut self) -> Self {
        self.flags.modulatable = true;
        self
    }

    /// Allow per-voice modulation (implies monophonic modulation).
    pub const fn poly_modulatable(mut self) -> Self {
        self.flags.modulatable = true;
        self.flags.poly_modulatable = true;
        self
    }

    /// Hide from the host's parameter list.
    pub const fn hidden(mut self) -> Self {
        self.flags.is_hidden = true;
        self
    }

    /// Convert a normalized value to the declared (plain) space, snapping to
    /// the step grid for discrete parameters.
    pub fn to_plain(&self, normalized: f64) -> f64 {
        let normalized = normalized.clamp(0.0, 1.0);
        if self.step_count > 0 {
            let step = (normalized * self.step_count as f64).round();
            self.range.min + step * self.range.span() / self.step_count as f64
        } else {
            self.range.min + normalized * self.range.span()
        }
    }

    /// Convert a declared (plain) value back to normalized space.
    pub fn to_normalized(&self, plain: f64) -> f64 {
        if self.range.span() == 0.0 {
            return 0.0;
        }
        let normalized = (plain - self.range.min) / self.range.span();
        let normalized = normalized.clamp(0.0, 1.0);
        if self.step_count > 0 {
            (normalized * self.step_count as f64).round() / self.step_count as f64
        } else {
            normalized
        }
    }
}

/// One parameter: static metadata plus lock-free value storage.
///
/// The base value and the monophonic modulation offset live in separate
/// atomics; [`Parameter::effective`] combines them. Per-voice modulation
/// never lands here, it is forwarded to the processor as native events.
pub struct Parameter {
    info: ParameterInfo,
    value: AtomicU64,
    modulation: AtomicU64,
}

impl Parameter {
    fn new(info: ParameterInfo) -> Self {
        let default = info.default_normalized.clamp(0.0, 1.0);
        Self {
            info,
            value: AtomicU64::new(default.to_bits()),
            modulation: AtomicU64::new(0.0f64.to_bits()),
        }
    }

    /// Static metadata.
    #[inline]
    pub fn info(&self) -> &ParameterInfo {
        &self.info
    }

    /// Current base value, normalized.
    #[inline]
    pub fn normalized(&self) -> f64 {
        f64::from_bits(self.value.load(Ordering::Relaxed))
    }

    /// Set the base value. Returns `false` when the clamped value is
    /// bit-identical to the stored one.
    pub fn set_normalized(&self, normalized: f64) -> bool {
        let clamped = normalized.clamp(0.0, 1.0);
        let old = self.value.swap(clamped.to_bits(), Ordering::Relaxed);
        old != clamped.to_bits()
    }

    /// Current monophonic modulation offset, normalized.
    #[inline]
    pub fn modulation(&self) -> f64 {
        f64::from_bits(self.modulation.load(Ordering::Relaxed))
    }

    /// Set the monophonic modulation offset. Subsequent offsets replace the
    /// previous one; they do not accumulate.
    pub fn set_modulation(&self, offset: f64) -> bool {
        let old = self.modulation.swap(offset.to_bits(), Ordering::Relaxed);
        old != offset.to_bits()
    }

    /// Base value plus modulation, clamped to `[0, 1]`.
    #[inline]
    pub fn effective(&self) -> f64 {
        (self.normalized() + self.modulation()).clamp(0.0, 1.0)
    }

    /// Effective value in the declared space. Convenience for DSP code that
    /// works in natural units.
    #[inline]
    pub fn plain(&self) -> f64 {
        self.info.to_plain(self.effective())
    }

    /// Reset base value to the default and clear modulation.
    pub fn reset(&self) {
        self.value
            .store(self.info.default_normalized.to_bits(), Ordering::Relaxed);
        self.modulation.store(0.0f64.to_bits(), Ordering::Relaxed);
    }
}

/// A change event fanned out to parameter observers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterNotification {
    /// The base value changed.
    ValueChanged {
        /// Index into the parameter set.
        index: usize,
        /// New normalized base value.
        normalized: f64,
    },
    /// An edit gesture started (e.g. mouse down on a knob).
    GestureBegin {
        /// Index into the parameter set.
        index: usize,
    },
    /// An edit gesture ended.
    GestureEnd {
        /// Index into the parameter set.
        index: usize,
    },
}

/// Observer callback invoked on parameter changes. Never called from the
/// real-time thread.
pub type ParameterObserver = Box<dyn Fn(ParameterNotification) + Send + Sync>;

/// The wrapped processor's full, immutable parameter list.
///
/// Declaration order is stable and is the order the host sees. Indices into
/// the set are therefore stable handles for the lifetime of the instance.
pub struct ParameterSet {
    params: Vec<Parameter>,
    observers: RwLock<Vec<ParameterObserver>>,
}

impl ParameterSet {
    /// Build a set from parameter metadata, in declaration order.
    pub fn new(infos: Vec<ParameterInfo>) -> Self {
        Self {
            params: infos.into_iter().map(Parameter::new).collect(),
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Number of parameters.
    #[inline]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// `true` when the set has no parameters.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Parameter by stable index.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Parameter> {
        self.params.get(index)
    }

    /// Iterate parameters in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    /// Find a parameter index by its string identifier. O(n); intended for
    /// construction-time lookups, not the audio path.
    pub fn index_of(&self, string_id: &str) -> Option<usize> {
        self.params.iter().position(|p| p.info.string_id == string_id)
    }

    /// Register a change observer. Called once per interested party during
    /// construction; there is no unregister.
    pub fn add_observer(&self, observer: ParameterObserver) {
        self.observers
            .write()
            .expect("parameter observer list poisoned")
            .push(observer);
    }

    /// Replay a notification to every observer without touching any value.
    /// Used by the adapter's main-thread bridge to deliver host-driven
    /// changes to listeners.
    pub fn notify(&self, notification: ParameterNotification) {
        let observers = self
            .observers
            .read()
            .expect("parameter observer list poisoned");
        for observer in observers.iter() {
            observer(notification);
        }
    }

    /// Set a value from the UI/main thread and notify observers.
    ///
    /// Returns `false` for an out-of-range index or an unchanged value.
    pub fn set_from_ui(&self, index: usize, normalized: f64) -> bool {
        let Some(param) = self.params.get(index) else {
            log::warn!("set_from_ui: no parameter at index {index}");
            return false;
        };
        if !param.set_normalized(normalized) {
            return false;
        }
        self.notify(ParameterNotification::ValueChanged {
            index,
            normalized: param.normalized(),
        });
        true
    }

    /// Begin an edit gesture and notify observers.
    pub fn begin_gesture(&self, index: usize) {
        if index < self.params.len() {
            self.notify(ParameterNotification::GestureBegin { index });
        }
    }

    /// End an edit gesture and notify observers.
    pub fn end_gesture(&self, index: usize) {
        if index < self.params.len() {
            self.notify(ParameterNotification::GestureEnd { index });
        }
    }

    /// Reset every parameter to its default value.
    pub fn reset_all(&self) {
        for param in &self.params {
            param.reset();
        }
    }
}
