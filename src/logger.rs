//! Per-pen sampling.
//!
//! Each pen owns a [`PenLogger`] that remembers whether its last emission was a
//! position sample. A pen that stays on produces a continuous stream of samples;
//! switching it off produces exactly one pen-up marker, after which nothing is
//! written until the pen is switched on again.

use std::io;

use crate::registry::Toggle;
use crate::sink::PenSink;

/// Text written for an axis with no motor attached.
pub const UNATTACHED: &str = "00";

/// Pen state at one logging tick. `None` axes have no motor attached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PenRecord {
    pub time: f64,
    pub x: Option<f64>,
    pub y: Option<f64>,
}

/// Layout of the pen-up marker line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecordFormat {
    /// `<time>;--;--`
    #[default]
    Separated,
    /// `<time>--;--`, as older log consumers expect.
    Legacy,
}

/// What a logger does on one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emission {
    Sample,
    PenUp,
    Nothing,
}

/// Transition over (last emission was a sample, current pen toggle).
/// Returns the emission and the new `is_on` value.
pub fn transition(is_on: bool, toggle: Toggle) -> (Emission, bool) {
    match (is_on, toggle) {
        (true, Toggle::On) => (Emission::Sample, true),
        (true, Toggle::Off) => (Emission::PenUp, false),
        (false, Toggle::On) => (Emission::Sample, true),
        (false, Toggle::Off) => (Emission::Nothing, false),
    }
}

/// Formats with up to six decimals and no trailing zeros: `0.005`, `10`, `-1.25`.
pub fn format_number(value: f64) -> String {
    let s = format!("{:.6}", value);
    let s = if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s.as_str()
    };
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

impl PenRecord {
    pub fn sample_line(&self) -> String {
        let axis = |v: Option<f64>| v.map(format_number).unwrap_or_else(|| UNATTACHED.to_string());
        format!("{};{};{}", format_number(self.time), axis(self.x), axis(self.y))
    }

    pub fn pen_up_line(&self, format: RecordFormat) -> String {
        match format {
            RecordFormat::Separated => format!("{};--;--", format_number(self.time)),
            RecordFormat::Legacy => format!("{}--;--", format_number(self.time)),
        }
    }
}

pub struct PenLogger {
    sink: Box<dyn PenSink>,
    is_on: bool,
    format: RecordFormat,
}

impl PenLogger {
    pub fn new(sink: Box<dyn PenSink>, format: RecordFormat) -> Self {
        Self {
            sink,
            is_on: true,
            format,
        }
    }

    pub fn is_on(&self) -> bool {
        self.is_on
    }

    /// Runs one tick. The state only advances once the line has been written.
    pub fn sample(&mut self, toggle: Toggle, record: &PenRecord) -> io::Result<Emission> {
        let (emission, next) = transition(self.is_on, toggle);
        match emission {
            Emission::Sample => self.sink.append(&record.sample_line())?,
            Emission::PenUp => self.sink.append(&record.pen_up_line(self.format))?,
            Emission::Nothing => {}
        }
        tracing::trace!("Pen sample at {}: {:?}", record.time, emission);
        self.is_on = next;
        Ok(emission)
    }
}
