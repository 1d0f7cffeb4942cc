// src/registry.rs - Named motors and pens, and which motor drives which pen axis
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::config::MotorDefaults;
use crate::logger::{PenLogger, PenRecord, RecordFormat, format_number};
use crate::sink::SinkFactory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Motor,
    Pen,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Motor => write!(f, "motor"),
            EntityKind::Pen => write!(f, "pen"),
        }
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("a {kind} with name '{name}' already exists")]
    DuplicateName { kind: EntityKind, name: String },
    #[error("no {kind} named '{name}'")]
    NotFound { kind: EntityKind, name: String },
    #[error("cannot open log for pen '{pen}': {source}")]
    Sink {
        pen: String,
        #[source]
        source: std::io::Error,
    },
}

impl RegistryError {
    fn not_found(kind: EntityKind, name: &str) -> Self {
        RegistryError::NotFound { kind, name: name.to_string() }
    }
}

/// Pen attachment axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl FromStr for Axis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "x" | "X" => Ok(Axis::X),
            "y" | "Y" => Ok(Axis::Y),
            other => Err(format!("unknown axis '{}', expected x or y", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Off,
    On,
}

impl FromStr for Toggle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" => Ok(Toggle::On),
            "off" => Ok(Toggle::Off),
            other => Err(format!("unknown pen state '{}', expected on or off", other)),
        }
    }
}

/// One simulated axis motor. Units are abstract (au, au/s, au/s²).
#[derive(Debug, Clone, PartialEq)]
pub struct Motor {
    /// Maximum speed. Stored and reported, not enforced by the kinematics step.
    pub max_speed: f64,
    /// Acceleration magnitude, never negative.
    pub acceleration: f64,
    pub position: f64,
    pub target: f64,
    pub velocity: f64,
}

impl Motor {
    pub fn new(defaults: &MotorDefaults) -> Self {
        Self {
            max_speed: defaults.max_speed,
            acceleration: defaults.acceleration,
            position: 0.0,
            target: defaults.target,
            velocity: 0.0,
        }
    }
}

impl Default for Motor {
    fn default() -> Self {
        Self::new(&MotorDefaults::default())
    }
}

impl fmt::Display for Motor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}; {}; {}; {}; {}",
            format_number(self.max_speed),
            format_number(self.acceleration),
            format_number(self.position),
            format_number(self.target),
            format_number(self.velocity)
        )
    }
}

/// A pen. Axis references name motors in the same registry; motors are never removed.
#[derive(Debug, Clone, PartialEq)]
pub struct Pen {
    pub toggle: Toggle,
    pub x: Option<String>,
    pub y: Option<String>,
}

impl Default for Pen {
    fn default() -> Self {
        Self {
            toggle: Toggle::On,
            x: None,
            y: None,
        }
    }
}

impl Pen {
    pub fn motor_on(&self, axis: Axis) -> Option<&str> {
        match axis {
            Axis::X => self.x.as_deref(),
            Axis::Y => self.y.as_deref(),
        }
    }
}

/// Owns every motor, pen and pen logger of a run.
pub struct Registry {
    motors: BTreeMap<String, Motor>,
    pens: BTreeMap<String, Pen>,
    loggers: BTreeMap<String, PenLogger>,
    sinks: Arc<dyn SinkFactory>,
    motor_defaults: MotorDefaults,
    record_format: RecordFormat,
}

impl Registry {
    pub fn new(sinks: Arc<dyn SinkFactory>) -> Self {
        Self {
            motors: BTreeMap::new(),
            pens: BTreeMap::new(),
            loggers: BTreeMap::new(),
            sinks,
            motor_defaults: MotorDefaults::default(),
            record_format: RecordFormat::default(),
        }
    }

    pub fn with_motor_defaults(mut self, defaults: MotorDefaults) -> Self {
        self.motor_defaults = defaults;
        self
    }

    pub fn with_record_format(mut self, format: RecordFormat) -> Self {
        self.record_format = format;
        self
    }

    pub fn create_motor(&mut self, name: &str) -> Result<(), RegistryError> {
        if self.motors.contains_key(name) {
            return Err(RegistryError::DuplicateName {
                kind: EntityKind::Motor,
                name: name.to_string(),
            });
        }
        self.motors.insert(name.to_string(), Motor::new(&self.motor_defaults));
        tracing::info!("Created motor '{}'", name);
        Ok(())
    }

    /// Creates the pen together with its logger. Nothing is inserted if the sink cannot be opened.
    pub fn create_pen(&mut self, name: &str) -> Result<(), RegistryError> {
        if self.pens.contains_key(name) {
            return Err(RegistryError::DuplicateName {
                kind: EntityKind::Pen,
                name: name.to_string(),
            });
        }
        let sink = self.sinks.open(name).map_err(|source| RegistryError::Sink {
            pen: name.to_string(),
            source,
        })?;
        self.pens.insert(name.to_string(), Pen::default());
        self.loggers
            .insert(name.to_string(), PenLogger::new(sink, self.record_format));
        tracing::info!("Created pen '{}'", name);
        Ok(())
    }

    /// Points `axis` of the pen at the motor, replacing any earlier motor on that axis.
    pub fn attach(&mut self, pen: &str, motor: &str, axis: Axis) -> Result<(), RegistryError> {
        if !self.motors.contains_key(motor) {
            return Err(RegistryError::not_found(EntityKind::Motor, motor));
        }
        let entry = self
            .pens
            .get_mut(pen)
            .ok_or_else(|| RegistryError::not_found(EntityKind::Pen, pen))?;
        let slot = match axis {
            Axis::X => &mut entry.x,
            Axis::Y => &mut entry.y,
        };
        if let Some(previous) = slot.replace(motor.to_string()) {
            tracing::debug!("Pen '{}' axis {:?}: replacing motor '{}'", pen, axis, previous);
        }
        tracing::info!("Attached motor '{}' to pen '{}' on axis {:?}", motor, pen, axis);
        Ok(())
    }

    pub fn set_max_speed(&mut self, motor: &str, value: f64) -> Result<(), RegistryError> {
        self.motor_mut(motor)?.max_speed = value;
        Ok(())
    }

    pub fn set_acceleration(&mut self, motor: &str, value: f64) -> Result<(), RegistryError> {
        self.motor_mut(motor)?.acceleration = value;
        Ok(())
    }

    pub fn set_target(&mut self, motor: &str, value: f64) -> Result<(), RegistryError> {
        self.motor_mut(motor)?.target = value;
        Ok(())
    }

    pub fn toggle(&mut self, pen: &str, toggle: Toggle) -> Result<(), RegistryError> {
        self.pens
            .get_mut(pen)
            .ok_or_else(|| RegistryError::not_found(EntityKind::Pen, pen))?
            .toggle = toggle;
        Ok(())
    }

    pub fn motor(&self, name: &str) -> Option<&Motor> {
        self.motors.get(name)
    }

    pub fn pen(&self, name: &str) -> Option<&Pen> {
        self.pens.get(name)
    }

    pub fn motor_count(&self) -> usize {
        self.motors.len()
    }

    pub fn pen_count(&self) -> usize {
        self.pens.len()
    }

    pub(crate) fn motors_mut(&mut self) -> impl Iterator<Item = (&String, &mut Motor)> {
        self.motors.iter_mut()
    }

    /// Position of the motor driving `axis` of the pen, `None` when no motor is attached.
    pub fn pen_axis_position(&self, pen: &Pen, axis: Axis) -> Option<f64> {
        pen.motor_on(axis)
            .and_then(|name| self.motors.get(name))
            .map(|m| m.position)
    }

    /// Runs every pen logger once at simulation time `time`.
    pub fn sample_pens(&mut self, time: f64) {
        for (name, pen) in &self.pens {
            let Some(logger) = self.loggers.get_mut(name) else {
                tracing::warn!("Pen '{}' has no logger", name);
                continue;
            };
            let record = PenRecord {
                time,
                x: pen
                    .x
                    .as_deref()
                    .and_then(|m| self.motors.get(m))
                    .map(|m| m.position),
                y: pen
                    .y
                    .as_deref()
                    .and_then(|m| self.motors.get(m))
                    .map(|m| m.position),
            };
            if let Err(e) = logger.sample(pen.toggle, &record) {
                tracing::error!("Failed to write log for pen '{}': {}", name, e);
            }
        }
    }

    /// Human readable listing of all motors and pens.
    pub fn dump(&self) -> String {
        let mut out = String::from("-----MOTORS-------\n");
        for (name, motor) in &self.motors {
            out.push_str(&format!("{}: {}\n", name, motor));
        }
        out.push_str("-----PENS-------\n");
        for (name, pen) in &self.pens {
            let axis = |a| {
                self.pen_axis_position(pen, a)
                    .map(format_number)
                    .unwrap_or_else(|| "00".to_string())
            };
            out.push_str(&format!("{}: {};{}\n", name, axis(Axis::X), axis(Axis::Y)));
        }
        out
    }

    fn motor_mut(&mut self, name: &str) -> Result<&mut Motor, RegistryError> {
        self.motors
            .get_mut(name)
            .ok_or_else(|| RegistryError::not_found(EntityKind::Motor, name))
    }
}
