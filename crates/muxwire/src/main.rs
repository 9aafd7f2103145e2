mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "muxwire", version, about = "muxrpc packet framing CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr). `RUST_LOG` takes precedence when set.
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    match cmd::run(cli.command, format) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_with_repeated_data() {
        let cli = Cli::try_parse_from([
            "muxwire",
            "send",
            "/tmp/test.sock",
            "--req",
            "3",
            "--stream",
            "--data",
            "ab",
            "--data",
            "c",
        ])
        .expect("send args should parse");

        match cli.command {
            Command::Send(args) => {
                assert_eq!(args.req, 3);
                assert!(args.stream);
                assert_eq!(args.data, vec!["ab", "c"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_encoding() {
        let err = Cli::try_parse_from([
            "muxwire",
            "send",
            "/tmp/test.sock",
            "--encoding",
            "msgpack",
        ])
        .expect_err("unknown encoding should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn rejects_zero_request_id() {
        let err = Cli::try_parse_from(["muxwire", "send", "/tmp/test.sock", "--req", "0"])
            .expect_err("zero request id should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn decode_reads_stdin_without_path() {
        let cli = Cli::try_parse_from(["muxwire", "decode"]).expect("decode args should parse");
        assert!(matches!(cli.command, Command::Decode(ref args) if args.file.is_none()));
    }
}
