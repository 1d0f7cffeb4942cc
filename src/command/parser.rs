//! Line parser for the plotter command language.
//!
//! ```text
//! create motor <name>
//! create pen <name>
//! attach <motor> with <x|y> of <pen>
//! set motor <name> <S|A|TP> = <decimal>
//! set pen <name> <on|off>
//! set sim dT = <seconds>
//! set log dT = <seconds>
//! start
//! stop
//! ```
//!
//! Lines are split on whitespace and the verb must be the first token exactly.

use super::{Command, CommandError, MotorParam, Verb};
use crate::config::{MAX_TICK_PERIOD, tick_period};
use crate::registry::{Axis, Toggle};

/// Looks up the verb of a non-empty line without checking the rest of it.
pub fn verb_of(line: &str) -> Result<Verb, CommandError> {
    let first = line.split_whitespace().next().unwrap_or("");
    Verb::from_token(first).ok_or_else(|| CommandError::UnknownCommand(line.trim().to_string()))
}

pub fn parse(line: &str) -> Result<Command, CommandError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let verb = verb_of(line)?;
    match verb {
        Verb::Create => parse_create(&tokens),
        Verb::Attach => parse_attach(&tokens),
        Verb::Set => parse_set(&tokens),
        Verb::Start => bare(&tokens, Command::Start),
        Verb::Stop => bare(&tokens, Command::Stop),
    }
}

fn syntax(expected: &str, tokens: &[&str]) -> CommandError {
    CommandError::Syntax(format!("'{}', expected: {}", tokens.join(" "), expected))
}

fn bare(tokens: &[&str], command: Command) -> Result<Command, CommandError> {
    if tokens.len() == 1 {
        Ok(command)
    } else {
        Err(syntax(tokens[0], tokens))
    }
}

fn parse_create(tokens: &[&str]) -> Result<Command, CommandError> {
    const USAGE: &str = "create motor|pen <name>";
    match tokens {
        [_, "motor", name] => Ok(Command::CreateMotor(name.to_string())),
        [_, "pen", name] => Ok(Command::CreatePen(name.to_string())),
        _ => Err(syntax(USAGE, tokens)),
    }
}

fn parse_attach(tokens: &[&str]) -> Result<Command, CommandError> {
    const USAGE: &str = "attach <motor> with <x|y> of <pen>";
    match tokens {
        [_, motor, "with", axis, "of", pen] => {
            let axis = axis.parse::<Axis>().map_err(CommandError::Syntax)?;
            Ok(Command::Attach {
                motor: motor.to_string(),
                axis,
                pen: pen.to_string(),
            })
        }
        _ => Err(syntax(USAGE, tokens)),
    }
}

fn parse_set(tokens: &[&str]) -> Result<Command, CommandError> {
    const MOTOR_USAGE: &str = "set motor <name> <S|A|TP> = <decimal>";
    const PEN_USAGE: &str = "set pen <name> <on|off>";
    match tokens {
        [_, "motor", name, rest @ ..] if !rest.is_empty() => {
            let (key, value) = assignment(rest).ok_or_else(|| syntax(MOTOR_USAGE, tokens))?;
            let param = match key.as_str() {
                "S" => MotorParam::MaxSpeed,
                "A" => MotorParam::Acceleration,
                "TP" => MotorParam::Target,
                other => {
                    return Err(CommandError::Syntax(format!(
                        "unknown motor parameter '{}', expected S, A or TP",
                        other
                    )));
                }
            };
            let value = decimal(&value)?;
            if param == MotorParam::Acceleration && value < 0.0 {
                return Err(CommandError::Syntax(format!(
                    "acceleration must not be negative, got {}",
                    value
                )));
            }
            Ok(Command::SetMotor {
                motor: name.to_string(),
                param,
                value,
            })
        }
        [_, "motor", ..] => Err(syntax(MOTOR_USAGE, tokens)),
        [_, "pen", name, state] => {
            let toggle = state.parse::<Toggle>().map_err(CommandError::Syntax)?;
            Ok(Command::SetPen {
                pen: name.to_string(),
                toggle,
            })
        }
        [_, "pen", ..] => Err(syntax(PEN_USAGE, tokens)),
        [_, clock @ ("sim" | "log"), rest @ ..] => {
            let usage = format!("set {} dT = <seconds>", clock);
            let (key, value) = assignment(rest).ok_or_else(|| syntax(&usage, tokens))?;
            if key != "dT" {
                return Err(syntax(&usage, tokens));
            }
            let period = tick_period(decimal(&value)?).ok_or_else(|| {
                CommandError::Syntax(format!(
                    "period must be between 0 and {} seconds, got {}",
                    MAX_TICK_PERIOD.as_secs(),
                    value
                ))
            })?;
            Ok(if *clock == "sim" {
                Command::SetSimulationPeriod(period)
            } else {
                Command::SetLoggingPeriod(period)
            })
        }
        _ => Err(syntax("set motor|pen|sim|log ...", tokens)),
    }
}

/// Splits `KEY = VALUE` (spacing around `=` optional) into trimmed halves.
fn assignment(tokens: &[&str]) -> Option<(String, String)> {
    let joined = tokens.join(" ");
    let (key, value) = joined.split_once('=')?;
    let (key, value) = (key.trim(), value.trim());
    if key.is_empty() || value.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    Some((key.to_string(), value.to_string()))
}

fn decimal(text: &str) -> Result<f64, CommandError> {
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(CommandError::Syntax(format!("invalid decimal '{}'", text))),
    }
}
