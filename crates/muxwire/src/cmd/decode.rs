use std::fs;
use std::io::Read;

use bytes::BytesMut;
use muxwire_codec::{decode_packet, Packet, DEFAULT_MAX_BODY};

use crate::cmd::DecodeArgs;
use crate::exit::{codec_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_packet, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let raw = match &args.file {
        Some(path) => fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?,
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .map_err(|err| io_error("failed reading stdin", err))?;
            buf
        }
    };

    let packets = decode_all(&raw, args.max_body.unwrap_or(DEFAULT_MAX_BODY))?;
    for packet in &packets {
        print_packet(packet, format);
    }
    tracing::debug!(count = packets.len(), "decoded packets");

    Ok(SUCCESS)
}

/// Split captured wire bytes into packets, as they appear on the wire.
fn decode_all(raw: &[u8], max_body: usize) -> CliResult<Vec<Packet>> {
    let mut buf = BytesMut::from(raw);
    let mut packets = Vec::new();
    while let Some(packet) =
        decode_packet(&mut buf, max_body).map_err(|err| codec_error("decode failed", &err))?
    {
        packets.push(packet);
    }
    if !buf.is_empty() {
        return Err(CliError::new(
            DATA_INVALID,
            format!(
                "decode failed: {} trailing bytes after {} packets",
                buf.len(),
                packets.len()
            ),
        ));
    }
    Ok(packets)
}
