use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use plotbridge_protocol::ProtocolRevision;

use crate::exit::{CliError, CliResult};
use crate::output::OutputFormat;

pub mod send;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the consumer: accept producers and dispatch their commands.
    Serve(ServeArgs),
    /// Act as a producer for one command cycle.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Version(args) => version::run(args, format),
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Protocol {
    /// Five-field headers; the mode field is optional.
    Legacy,
    /// Six-field headers with a mandatory mode field.
    ReturnValues,
}

impl From<Protocol> for ProtocolRevision {
    fn from(protocol: Protocol) -> Self {
        match protocol {
            Protocol::Legacy => ProtocolRevision::Legacy,
            Protocol::ReturnValues => ProtocolRevision::ReturnValues,
        }
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// How often the loops check for shutdown (e.g. 50ms, 1s).
    #[arg(long, default_value = "50ms", env = "PLOTBRIDGE_POLL_INTERVAL")]
    pub poll_interval: String,
    /// Header layout spoken by producers.
    #[arg(long, value_enum, default_value = "return-values", env = "PLOTBRIDGE_PROTOCOL")]
    pub protocol: Protocol,
    /// Largest accepted frame, in bytes.
    #[arg(long, value_name = "BYTES")]
    pub max_payload: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Command text for the cycle.
    #[arg(long, short = 'c')]
    pub command: String,
    /// Bind a 1-D array: NAME:CODE:V1,V2,... (character codes take text).
    #[arg(long = "var", value_name = "NAME:CODE:VALUES")]
    pub vars: Vec<String>,
    /// Bind a scalar: NAME:CODE:VALUE.
    #[arg(long = "scalar", value_name = "NAME:CODE:VALUE")]
    pub scalars: Vec<String>,
    /// Declare a return value: NAME:CODE:SHAPE, e.g. y:d:(2,3) or k:i:().
    #[arg(long = "send-back", value_name = "NAME:CODE:SHAPE")]
    pub send_backs: Vec<String>,
    /// How long to wait for the bridge and for return values (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
    /// Send `exit` after the cycle.
    #[arg(long)]
    pub exit: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::usage(format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::usage("duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
