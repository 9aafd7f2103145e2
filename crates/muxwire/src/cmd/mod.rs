use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Args, Subcommand};
use muxwire_mux::RequestEncoding;
use muxwire_transport::Endpoint;

use crate::exit::{CliError, CliResult, INTERNAL};
use crate::output::OutputFormat;

pub mod decode;
pub mod echo;
pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Accept connections and echo every stream back to its sender.
    Echo(EchoArgs),
    /// Open one stream, write to it, and optionally print the reply.
    Send(SendArgs),
    /// Accept connections and print every packet received.
    Listen(ListenArgs),
    /// Decode packets from a captured byte file.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Echo(args) => echo::run(args),
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Endpoint to bind (`unix:/path`, `tcp:host:port`, or a socket path).
    pub endpoint: Endpoint,
    /// Exit after serving N connections.
    #[arg(long)]
    pub connections: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Endpoint to connect to.
    pub endpoint: Endpoint,
    /// Request id for the stream.
    #[arg(long, default_value = "1", allow_negative_numbers = true, value_parser = parse_request_id)]
    pub req: i32,
    /// Send as an open-ended stream and end it with an end packet.
    #[arg(long)]
    pub stream: bool,
    /// Body encoding.
    #[arg(long, default_value = "binary", value_parser = parse_encoding)]
    pub encoding: RequestEncoding,
    /// Body of one packet; repeat for several packets.
    #[arg(long)]
    pub data: Vec<String>,
    /// End the stream with this error message instead of gracefully.
    #[arg(long, requires = "stream")]
    pub error: Option<String>,
    /// Wait for the reply and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for each reply packet (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Endpoint to bind.
    pub endpoint: Endpoint,
    /// Only print packets for these request ids (comma-separated).
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    pub req: Option<Vec<i32>>,
    /// Exit after printing N packets.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// File holding raw wire bytes. Reads stdin when omitted.
    pub file: Option<PathBuf>,
    /// Largest body accepted, in bytes.
    #[arg(long)]
    pub max_body: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

fn parse_request_id(input: &str) -> Result<i32, String> {
    match input.parse::<i32>() {
        Ok(0) => Err("request id 0 is reserved".to_string()),
        Ok(req) => Ok(req),
        Err(err) => Err(err.to_string()),
    }
}

fn parse_encoding(input: &str) -> Result<RequestEncoding, String> {
    input.parse().map_err(|err: muxwire_mux::MuxError| err.to_string())
}

pub(crate) fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
