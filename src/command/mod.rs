// src/command/mod.rs
//! Plotter command language: typed commands, the phase table and the interpreter.

pub mod interpreter;
pub mod parser;


use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::registry::{Axis, RegistryError, Toggle};

pub use interpreter::{BatchError, Flow, Interpreter};
pub use parser::parse;

/// Lifecycle phase of a plotter session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Building the topology; workers not running.
    Configuring,
    /// Workers running; only pen toggles and motor parameters may change.
    Running,
    /// `stop` was issued; nothing further is accepted.
    Stopped,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Configuring => write!(f, "configuring"),
            Phase::Running => write!(f, "running"),
            Phase::Stopped => write!(f, "stopped"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Create,
    Attach,
    Set,
    Start,
    Stop,
}

impl Verb {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "create" => Some(Verb::Create),
            "attach" => Some(Verb::Attach),
            "set" => Some(Verb::Set),
            "start" => Some(Verb::Start),
            "stop" => Some(Verb::Stop),
            _ => None,
        }
    }

    /// Whether any form of this verb is accepted in `phase`.
    pub fn allowed_in(self, phase: Phase) -> bool {
        match (self, phase) {
            (Verb::Create | Verb::Attach | Verb::Start, Phase::Configuring) => true,
            (Verb::Set, Phase::Configuring | Phase::Running) => true,
            (Verb::Stop, Phase::Running) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verb::Create => "create",
            Verb::Attach => "attach",
            Verb::Set => "set",
            Verb::Start => "start",
            Verb::Stop => "stop",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorParam {
    /// `S`, maximum speed
    MaxSpeed,
    /// `A`, acceleration magnitude
    Acceleration,
    /// `TP`, target position
    Target,
}

/// A parsed command line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateMotor(String),
    CreatePen(String),
    Attach { motor: String, axis: Axis, pen: String },
    SetMotor { motor: String, param: MotorParam, value: f64 },
    SetPen { pen: String, toggle: Toggle },
    SetSimulationPeriod(Duration),
    SetLoggingPeriod(Duration),
    Start,
    Stop,
}

impl Command {
    pub fn verb(&self) -> Verb {
        match self {
            Command::CreateMotor(_) | Command::CreatePen(_) => Verb::Create,
            Command::Attach { .. } => Verb::Attach,
            Command::SetMotor { .. }
            | Command::SetPen { .. }
            | Command::SetSimulationPeriod(_)
            | Command::SetLoggingPeriod(_) => Verb::Set,
            Command::Start => Verb::Start,
            Command::Stop => Verb::Stop,
        }
    }

    /// Phase legality of this exact command. Tick periods are fixed once running.
    pub fn allowed_in(&self, phase: Phase) -> bool {
        match self {
            Command::SetSimulationPeriod(_) | Command::SetLoggingPeriod(_) => {
                phase == Phase::Configuring
            }
            other => other.verb().allowed_in(phase),
        }
    }
}

/// Failure kinds a command can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DuplicateName,
    NotFound,
    Syntax,
    UnknownCommand,
    PhaseViolation,
    /// A pen's log could not be opened.
    Sink,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("malformed command: {0}")]
    Syntax(String),
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("'{command}' is not allowed while {phase}")]
    PhaseViolation { command: String, phase: Phase },
}

impl CommandError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CommandError::Registry(RegistryError::DuplicateName { .. }) => ErrorKind::DuplicateName,
            CommandError::Registry(RegistryError::NotFound { .. }) => ErrorKind::NotFound,
            CommandError::Registry(RegistryError::Sink { .. }) => ErrorKind::Sink,
            CommandError::Syntax(_) => ErrorKind::Syntax,
            CommandError::UnknownCommand(_) => ErrorKind::UnknownCommand,
            CommandError::PhaseViolation { .. } => ErrorKind::PhaseViolation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verb_phase_table() {
        use Phase::*;
        let table = [
            (Verb::Create, [true, false, false]),
            (Verb::Attach, [true, false, false]),
            (Verb::Set, [true, true, false]),
            (Verb::Start, [true, false, false]),
            (Verb::Stop, [false, true, false]),
        ];
        for (verb, allowed) in table {
            for (phase, expected) in [Configuring, Running, Stopped].into_iter().zip(allowed) {
                assert_eq!(verb.allowed_in(phase), expected, "{} in {}", verb, phase);
            }
        }
    }

    #[test]
    fn test_periods_only_while_configuring() {
        let cmd = Command::SetLoggingPeriod(Duration::from_millis(500));
        assert!(cmd.allowed_in(Phase::Configuring));
        assert!(!cmd.allowed_in(Phase::Running));
        let cmd = Command::SetPen { pen: "p".into(), toggle: Toggle::Off };
        assert!(cmd.allowed_in(Phase::Running));
    }

    #[test]
    fn test_error_kinds() {
        let err = CommandError::from(RegistryError::NotFound {
            kind: crate::registry::EntityKind::Motor,
            name: "ghost".into(),
        });
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "no motor named 'ghost'");
        let err = CommandError::PhaseViolation { command: "start".into(), phase: Phase::Running };
        assert_eq!(err.kind(), ErrorKind::PhaseViolation);
        assert_eq!(err.to_string(), "'start' is not allowed while running");
    }
}
