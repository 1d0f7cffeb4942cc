// src/command/interpreter.rs - Phase-aware command dispatch
use thiserror::Error;

use super::{Command, CommandError, MotorParam, Phase, parser};
use crate::simulation::{Simulation, SimulationHandle};

/// What the caller should do after a successful command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// The session ended (`stop`); read no further commands.
    Terminate,
}

/// First failing line of a batch. Lines are 1-based.
#[derive(Debug, Error)]
#[error("line {line}: {source}")]
pub struct BatchError {
    pub line: usize,
    #[source]
    pub source: CommandError,
}

pub struct Interpreter {
    simulation: Simulation,
    phase: Phase,
    handle: Option<SimulationHandle>,
}

impl Interpreter {
    pub fn new(simulation: Simulation) -> Self {
        Self {
            simulation,
            phase: Phase::Configuring,
            handle: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    /// Executes one command line.
    ///
    /// Blank lines are accepted and do nothing. A command that exists but is not
    /// allowed in the current phase fails with `PhaseViolation` and leaves all
    /// state untouched.
    pub async fn execute(&mut self, line: &str) -> Result<Flow, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Flow::Continue);
        }

        let verb = parser::verb_of(line)?;
        if !verb.allowed_in(self.phase) {
            return Err(self.phase_violation(line));
        }
        let command = parser::parse(line)?;
        if !command.allowed_in(self.phase) {
            return Err(self.phase_violation(line));
        }

        tracing::debug!("Executing {:?} while {}", command, self.phase);
        self.dispatch(command).await
    }

    /// Executes `script` line by line, stopping at the first error. Blank lines
    /// and lines starting with `#` are skipped. Returns `Terminate` if the script
    /// issued `stop`; any lines after it are ignored.
    pub async fn run_batch(&mut self, script: &str) -> Result<Flow, BatchError> {
        for (index, line) in script.lines().enumerate() {
            if line.trim_start().starts_with('#') {
                continue;
            }
            match self.execute(line).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Terminate) => return Ok(Flow::Terminate),
                Err(source) => {
                    tracing::warn!("Batch aborted at line {}: {}", index + 1, source);
                    return Err(BatchError {
                        line: index + 1,
                        source,
                    });
                }
            }
        }
        Ok(Flow::Continue)
    }

    /// Stops the workers if they are running. Used when input ends without `stop`.
    pub async fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop().await;
        }
        self.phase = Phase::Stopped;
    }

    fn phase_violation(&self, line: &str) -> CommandError {
        tracing::warn!("Rejected '{}' while {}", line, self.phase);
        CommandError::PhaseViolation {
            command: line.to_string(),
            phase: self.phase,
        }
    }

    async fn dispatch(&mut self, command: Command) -> Result<Flow, CommandError> {
        match command {
            Command::CreateMotor(name) => self.simulation.create_motor(&name).await?,
            Command::CreatePen(name) => self.simulation.create_pen(&name).await?,
            Command::Attach { motor, axis, pen } => self.simulation.attach(&pen, &motor, axis).await?,
            Command::SetMotor { motor, param, value } => match param {
                MotorParam::MaxSpeed => self.simulation.set_motor_max_speed(&motor, value).await?,
                MotorParam::Acceleration => self.simulation.set_motor_acceleration(&motor, value).await?,
                MotorParam::Target => self.simulation.set_motor_target(&motor, value).await?,
            },
            Command::SetPen { pen, toggle } => self.simulation.toggle(&pen, toggle).await?,
            Command::SetSimulationPeriod(period) => self.simulation.set_simulation_period(period).await,
            Command::SetLoggingPeriod(period) => self.simulation.set_logging_period(period),
            Command::Start => {
                self.handle = Some(self.simulation.start());
                self.phase = Phase::Running;
                tracing::info!("Entered running phase");
            }
            Command::Stop => {
                self.shutdown().await;
                tracing::info!("End of session");
                return Ok(Flow::Terminate);
            }
        }
        Ok(Flow::Continue)
    }
}
