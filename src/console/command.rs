//! Operator commands typed at the console prompt.
//!
//! Setpoint indices are 0-based, matching the order `list` prints.

use std::fmt;
use std::str::FromStr;

use crate::error::ConsoleError;
use crate::setpoints::DEFAULT_SETPOINT;

/// One line of operator input.
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorCommand {
    /// `add [value]`
    AddSetpoint(f64),
    /// `rm <index>`
    RemoveSetpoint(usize),
    /// `set <index> <value>`
    SetSetpoint(usize, f64),
    /// `update <index>`: copy the current motor position into a setpoint
    RecordPosition(usize),
    /// `list`
    ListSetpoints,
    /// `stop`
    Stop,
    /// `inc <delta>`
    Increment(f64),
    /// `abs <target>`
    Absolute(f64),
    /// `sp`: move through all setpoints without shooting
    MoveThroughSetpoints,
    /// `shoot`: capture and classify
    Shoot,
    /// `capture`: capture and show the batch without classifying
    Capture,
    /// `classify`: re-run classification of the last capture
    Classify,
    /// `label <text>`
    Label(String),
    /// `connect <address>`
    Connect(String),
    /// `status`
    Status,
    /// `quit`
    Quit,
}

/// Help text printed for unknown input.
pub const USAGE: &str = "commands: add [v] | rm <i> | set <i> <v> | update <i> | list | \
stop | inc <d> | abs <p> | sp | shoot | capture | classify | label <text> | connect <addr> | \
status | quit";

fn parse_number(word: Option<&str>, what: &str) -> Result<f64, ConsoleError> {
    let word = word.ok_or_else(|| ConsoleError::Validation(format!("missing {what}")))?;
    word.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ConsoleError::Validation(format!("{what} must be a number, got '{word}'")))
}

fn parse_index(word: Option<&str>) -> Result<usize, ConsoleError> {
    let word = word.ok_or_else(|| ConsoleError::Validation("missing setpoint index".into()))?;
    word.parse().map_err(|_| {
        ConsoleError::Validation(format!("setpoint index must be 0 or more, got '{word}'"))
    })
}

impl FromStr for OperatorCommand {
    type Err = ConsoleError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        let mut args = rest.split_whitespace();

        let command = match verb.to_lowercase().as_str() {
            "add" => match args.next() {
                Some(value) => Self::AddSetpoint(parse_number(Some(value), "setpoint value")?),
                None => Self::AddSetpoint(DEFAULT_SETPOINT),
            },
            "rm" => Self::RemoveSetpoint(parse_index(args.next())?),
            "set" => {
                let index = parse_index(args.next())?;
                Self::SetSetpoint(index, parse_number(args.next(), "setpoint value")?)
            }
            "update" => Self::RecordPosition(parse_index(args.next())?),
            "list" => Self::ListSetpoints,
            "stop" => Self::Stop,
            "inc" => Self::Increment(parse_number(args.next(), "increment")?),
            "abs" => Self::Absolute(parse_number(args.next(), "target position")?),
            "sp" => Self::MoveThroughSetpoints,
            "shoot" => Self::Shoot,
            "capture" => Self::Capture,
            "classify" => Self::Classify,
            // Validated when run so an empty label reaches the status line.
            "label" => Self::Label(rest.to_string()),
            "connect" => {
                if rest.is_empty() {
                    return Err(ConsoleError::Validation("missing server address".into()));
                }
                Self::Connect(rest.to_string())
            }
            "status" => Self::Status,
            "quit" | "exit" => Self::Quit,
            "" => return Err(ConsoleError::Validation("empty command".into())),
            other => {
                return Err(ConsoleError::Validation(format!("unknown command '{other}'; {USAGE}")))
            }
        };
        Ok(command)
    }
}

impl fmt::Display for OperatorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddSetpoint(v) => write!(f, "add {v}"),
            Self::RemoveSetpoint(i) => write!(f, "rm {i}"),
            Self::SetSetpoint(i, v) => write!(f, "set {i} {v}"),
            Self::RecordPosition(i) => write!(f, "update {i}"),
            Self::ListSetpoints => write!(f, "list"),
            Self::Stop => write!(f, "stop"),
            Self::Increment(d) => write!(f, "inc {d}"),
            Self::Absolute(p) => write!(f, "abs {p}"),
            Self::MoveThroughSetpoints => write!(f, "sp"),
            Self::Shoot => write!(f, "shoot"),
            Self::Capture => write!(f, "capture"),
            Self::Classify => write!(f, "classify"),
            Self::Label(text) => write!(f, "label {text}"),
            Self::Connect(addr) => write!(f, "connect {addr}"),
            Self::Status => write!(f, "status"),
            Self::Quit => write!(f, "quit"),
        }
    }
}
