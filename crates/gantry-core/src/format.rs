//! Parameter value formatting and parsing.
//!
//! Converts between plain (declared-space) parameter values and display
//! strings. `text()` returns the bare value, `unit()` the unit string; the
//! adapter joins them when the host asks for parameter text, and `parse()`
//! accepts user input with or without the unit suffix.

/// Parameter value formatter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Formatter {
    /// Generic float with configurable precision.
    Float {
        /// Number of decimal places.
        precision: usize,
    },

    /// Decibel formatter; the plain value is already in dB.
    ///
    /// Values below `min_db` display as "-inf".
    Decibel {
        /// Number of decimal places.
        precision: usize,
        /// Floor below which the value displays as "-inf".
        min_db: f64,
    },

    /// Frequency formatter with automatic Hz/kHz scaling.
    Frequency,

    /// Percentage formatter; plain value 0.0-1.0 displays as 0-100.
    Percent {
        /// Number of decimal places.
        precision: usize,
    },

    /// Milliseconds formatter.
    Milliseconds {
        /// Number of decimal places.
        precision: usize,
    },

    /// Integer formatter for stepped parameters.
    Integer,

    /// Named choices for stepped parameters; the plain value indexes the
    /// label list.
    Enumeration {
        /// One label per step, in step order.
        labels: &'static [&'static str],
    },

    /// Boolean formatter: "On" / "Off".
    Boolean,
}

impl Formatter {
    /// Convert a plain value to a display string (without unit).
    pub fn text(&self, value: f64) -> String {
        match self {
            Formatter::Float { precision } => format!("{:.prec$}", value, prec = *precision),

            Formatter::Decibel { precision, min_db } => {
                if value < *min_db {
                    "-inf".to_string()
                } else if value >= 0.0 {
                    format!("+{:.prec$}", value, prec = *precision)
                } else {
                    format!("{:.prec$}", value, prec = *precision)
                }
            }

            Formatter::Frequency => {
                if value >= 1000.0 {
                    format!("{:.2}k", value / 1000.0)
                } else if value >= 100.0 {
                    format!("{:.0}", value)
                } else {
                    format!("{:.1}", value)
                }
            }

            Formatter::Percent { precision } => {
                format!("{:.prec$}", value * 100.0, prec = *precision)
            }

            Formatter::Milliseconds { precision } => {
                format!("{:.prec$}", value, prec = *precision)
            }

            Formatter::Integer => format!("{}", value.round() as i64),

            Formatter::Enumeration { labels } => {
                let index = value.round().max(0.0) as usize;
                labels
                    .get(index)
                    .copied()
                    .unwrap_or("(invalid)")
                    .to_string()
            }

            Formatter::Boolean => {
                if value > 0.5 {
                    "On".to_string()
                } else {
                    "Off".to_string()
                }
            }
        }
    }

    /// Parse a display string back to a plain value.
    ///
    /// Returns `None` if the string cannot be parsed.
    pub fn parse(&self, s: &str) -> Option<f64> {
        let s = s.trim();

        match self {
            Formatter::Float { .. } => s.parse().ok(),

            Formatter::Decibel { min_db, .. } => {
                let trimmed = s.trim_end_matches(" dB").trim_end_matches("dB").trim();
                if trimmed.eq_ignore_ascii_case("-inf") || trimmed == "-∞" {
                    return Some(*min_db);
                }
                trimmed.parse().ok()
            }

            Formatter::Frequency => {
                if let Some(khz) = s
                    .strip_suffix(" kHz")
                    .or_else(|| s.strip_suffix("kHz"))
                    .or_else(|| s.strip_suffix("k"))
                {
                    return khz.trim().parse::<f64>().ok().map(|v| v * 1000.0);
                }
                let hz = s.trim_end_matches(" Hz").trim_end_matches("Hz").trim();
                hz.parse().ok()
            }

            Formatter::Percent { .. } => {
                let trimmed = s.trim_end_matches('%').trim();
                trimmed.parse::<f64>().ok().map(|v| v / 100.0)
            }

            Formatter::Milliseconds { .. } => {
                let trimmed = s
                    .strip_suffix(" ms")
                    .or_else(|| s.strip_suffix("ms"))
                    .unwrap_or(s)
                    .trim();
                trimmed.parse().ok()
            }

            Formatter::Integer => s.parse::<f64>().ok().map(|v| v.round()),

            Formatter::Enumeration { labels } => labels
                .iter()
                .position(|l| l.eq_ignore_ascii_case(s))
                .map(|i| i as f64)
                .or_else(|| s.parse::<f64>().ok().map(|v| v.round())),

            Formatter::Boolean => match s.to_lowercase().as_str() {
                "on" | "true" | "yes" | "1" => Some(1.0),
                "off" | "false" | "no" | "0" => Some(0.0),
                _ => None,
            },
        }
    }

    /// Unit string for this formatter.
    pub fn unit(&self) -> &'static str {
        match self {
            Formatter::Float { .. } => "",
            Formatter::Decibel { .. } => "dB",
            Formatter::Frequency => "Hz",
            Formatter::Percent { .. } => "%",
            Formatter::Milliseconds { .. } => "ms",
            Formatter::Integer => "",
            Formatter::Enumeration { .. } => "",
            Formatter::Boolean => "",
        }
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Formatter::Float { precision: 2 }
    }
}
