//! Subscription command protocol
//!
//! Clients send newline-terminated ASCII commands:
//!
//! ```text
//! add port <N>
//! add all
//! ```
//!
//! Errors are answered inline with a short text reply; the connection
//! stays open.

use crate::port_filter::{PortFilter, PortNumber};

/// A parsed subscription command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `add port <N>`
    AddPort(PortNumber),
    /// `add all`
    AddAll,
}

/// Protocol error reported back to the client
///
/// `Display` renders the exact reply text without the trailing newline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    UnknownCommand,
    ExpectedArguments { count: usize },
    InvalidPortNumber,
    UnexpectedFilterType,
}

impl CommandError {
    /// Newline-terminated reply written to the client
    pub fn reply(&self) -> String {
        format!("{}\n", self)
    }
}

impl core::fmt::Display for CommandError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CommandError::UnknownCommand => write!(f, "unknown command"),
            CommandError::ExpectedArguments { count: 1 } => write!(f, "expected 1 argument"),
            CommandError::ExpectedArguments { count } => {
                write!(f, "expected {} arguments", count)
            }
            CommandError::InvalidPortNumber => write!(f, "invalid port number"),
            CommandError::UnexpectedFilterType => write!(f, "unexpected filter type"),
        }
    }
}

impl core::error::Error for CommandError {}

/// Parse one line (without its newline)
///
/// Returns `Ok(None)` for a blank line.
pub fn parse_command(line: &str, max_ports: usize) -> Result<Option<Command>, CommandError> {
    let mut tokens = line.split_ascii_whitespace();
    let Some(name) = tokens.next() else {
        return Ok(None);
    };

    match name {
        "add" => parse_add(tokens.collect(), max_ports).map(Some),
        _ => Err(CommandError::UnknownCommand),
    }
}

fn parse_add(args: Vec<&str>, max_ports: usize) -> Result<Command, CommandError> {
    match args.first().copied() {
        Some("port") => {
            if args.len() != 2 {
                return Err(CommandError::ExpectedArguments { count: 2 });
            }
            let port = parse_port(args[1], max_ports)?;
            Ok(Command::AddPort(port))
        }
        Some("all") => {
            if args.len() != 1 {
                return Err(CommandError::ExpectedArguments { count: 1 });
            }
            Ok(Command::AddAll)
        }
        _ => Err(CommandError::UnexpectedFilterType),
    }
}

fn parse_port(arg: &str, max_ports: usize) -> Result<PortNumber, CommandError> {
    if arg.is_empty() || !arg.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CommandError::InvalidPortNumber);
    }
    let port: PortNumber = arg.parse().map_err(|_| CommandError::InvalidPortNumber)?;
    if port as usize >= max_ports {
        return Err(CommandError::InvalidPortNumber);
    }
    Ok(port)
}

/// Parse a raw line and apply it to `filter`
///
/// Returns the reply to send back, if any.
pub fn process_line(line: &[u8], filter: &mut PortFilter) -> Option<CommandError> {
    let Ok(line) = core::str::from_utf8(line) else {
        return Some(CommandError::UnknownCommand);
    };

    match parse_command(line, filter.max_ports()) {
        Ok(None) => None,
        Ok(Some(Command::AddPort(port))) => match filter.add(port) {
            Ok(()) => None,
            Err(_) => Some(CommandError::InvalidPortNumber),
        },
        Ok(Some(Command::AddAll)) => {
            filter.add_all();
            None
        }
        Err(e) => Some(e),
    }
}
