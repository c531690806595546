use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use fakebus_mux::FailurePolicy;
use fakebus_transport::pty::DEFAULT_PREFIX;
use fakebus_transport::SerialLine;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod run;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Share a serial device between virtual serial ports.
    Run(RunArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Number of virtual endpoints to create.
    #[arg(
        long,
        short = 'c',
        default_value_t = 2,
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub client_count: u16,
    /// Physical serial device to share.
    #[arg(long, short = 't', default_value = "/dev/ttyAMA0")]
    pub target_device: PathBuf,
    /// Endpoint name prefix; endpoints are named PREFIX0, PREFIX1, ...
    #[arg(long, short = 'f', default_value = DEFAULT_PREFIX)]
    pub fake_bus_prefix: String,
    /// Physical line baud rate.
    #[arg(long, short = 'b', default_value_t = SerialLine::DEFAULT_BAUD)]
    pub baud: u32,
    /// How often shutdown is checked (e.g. 500ms, 1s).
    #[arg(long, default_value = "500ms")]
    pub poll_interval: String,
    /// How long readers get to stop during shutdown (e.g. 2s).
    #[arg(long, default_value = "2s")]
    pub shutdown_grace: String,
    /// How long an endpoint may block a frame from the line before it
    /// counts as failed (e.g. 1s).
    #[arg(long, default_value = "1s")]
    pub endpoint_write_timeout: String,
    /// What an endpoint failure brings down.
    #[arg(long, value_enum, default_value = "fail-fast")]
    pub failure_policy: PolicyArg,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    /// Any failure stops the multiplexer.
    FailFast,
    /// Drop a failed endpoint and keep serving the rest.
    Isolate,
}

impl PolicyArg {
    pub fn as_str(self) -> &'static str {
        match self {
            PolicyArg::FailFast => "fail-fast",
            PolicyArg::Isolate => "isolate",
        }
    }
}

impl From<PolicyArg> for FailurePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::FailFast => FailurePolicy::FailFast,
            PolicyArg::Isolate => FailurePolicy::Isolate,
        }
    }
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
