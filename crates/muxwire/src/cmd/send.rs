use std::io::{Read, Write};
use std::time::Duration;

use muxwire_codec::{CodecConfig, Packet};
use muxwire_mux::{end_reason, CallError, CancellationToken, MuxError, Packer, RequestEncoding};

use crate::cmd::SendArgs;
use crate::exit::{mux_error, transport_error, CliError, CliResult, FAILURE, SUCCESS, USAGE};
use crate::output::{print_packet, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    validate_bodies(&args)?;

    let conn = args
        .endpoint
        .connect()
        .map_err(|err| transport_error("connect failed", err))?;
    let config = CodecConfig {
        read_timeout: Some(wait_timeout),
        ..CodecConfig::default()
    };
    let packer =
        Packer::with_config(conn, config).map_err(|err| transport_error("connect failed", err))?;

    let sink = packer.sink();
    sink.bind(args.req, args.stream)
        .and_then(|()| sink.set_encoding(args.encoding))
        .map_err(|err| mux_error("stream setup failed", err))?;

    if args.data.is_empty() && !args.stream {
        sink.write(&[]).map_err(|err| mux_error("send failed", err))?;
    }
    for body in &args.data {
        sink.write(body.as_bytes())
            .map_err(|err| mux_error("send failed", err))?;
    }
    if args.stream {
        let reason = args.error.clone().map(|msg| CallError::new(msg).into());
        sink.close_with_error(reason)
            .map_err(|err| mux_error("ending stream failed", err))?;
    }

    let result = if args.wait {
        wait_for_reply(&packer, &args, format)
    } else {
        Ok(())
    };

    if let Err(err) = packer.write_goodbye() {
        tracing::debug!(error = %err, "goodbye not delivered");
    }
    if let Err(err) = packer.close() {
        tracing::warn!(error = %err, "closing connection failed");
    }

    result.map(|()| SUCCESS)
}

/// Print reply packets for our request id until the reply is complete.
fn wait_for_reply<R: Read, W: Write>(
    packer: &Packer<R, W>,
    args: &SendArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let cancel = CancellationToken::new();
    loop {
        let packet = match packer.next_packet(&cancel) {
            Ok(Some(packet)) => packet,
            Ok(None) => {
                return Err(CliError::new(FAILURE, "connection closed before reply"));
            }
            Err(err) => return Err(mux_error("receive failed", err)),
        };
        if packet.req != args.req {
            tracing::debug!(req = packet.req, "skipping packet for another stream");
            continue;
        }

        print_packet(&packet, format);
        if let Some(done) = reply_complete(&packet, args.stream) {
            return done.map_err(|err| mux_error("stream ended", err));
        }
    }
}

/// `Some` once `packet` finishes the reply, carrying how it ended.
fn reply_complete(packet: &Packet, stream: bool) -> Option<Result<(), MuxError>> {
    if packet.flags.is_end_err() {
        return Some(end_reason(packet));
    }
    if stream {
        None
    } else {
        Some(Ok(()))
    }
}

fn validate_bodies(args: &SendArgs) -> CliResult<()> {
    if args.encoding != RequestEncoding::Json {
        return Ok(());
    }
    for body in &args.data {
        serde_json::from_str::<serde_json::Value>(body)
            .map_err(|err| CliError::new(USAGE, format!("--data is not valid JSON: {err}")))?;
    }
    Ok(())
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
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
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use muxwire_codec::{Encoding, Flags};
    use muxwire_mux::{end_err_packet, end_okay_packet};

    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn single_reply_completes_on_first_packet() {
        let packet = Packet::new(1, Flags::from(Encoding::String), "pong");
        assert!(matches!(reply_complete(&packet, false), Some(Ok(()))));
    }

    #[test]
    fn stream_reply_completes_on_end_packet() {
        let data = Packet::new(1, Flags::STREAM, "chunk");
        assert!(reply_complete(&data, true).is_none());
        assert!(matches!(
            reply_complete(&end_okay_packet(1, true), true),
            Some(Ok(()))
        ));

        let failed = end_err_packet(1, true, &CallError::new("boom").into()).unwrap();
        assert!(matches!(
            reply_complete(&failed, true),
            Some(Err(MuxError::Call(_)))
        ));
    }
}
