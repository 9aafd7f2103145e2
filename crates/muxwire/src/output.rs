use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use muxwire_codec::{Encoding, Packet};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct PacketOutput<'a> {
    req: i32,
    flags: String,
    stream: bool,
    end: bool,
    encoding: &'a str,
    body_size: usize,
    body: serde_json::Value,
    timestamp: String,
}

pub fn print_packet(packet: &Packet, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = PacketOutput {
                req: packet.req,
                flags: packet.flags.to_string(),
                stream: packet.flags.is_stream(),
                end: packet.flags.is_end_err(),
                encoding: packet.flags.encoding().name(),
                body_size: packet.body.len(),
                body: body_value(packet),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["REQ", "FLAGS", "SIZE", "BODY"])
                .add_row(vec![
                    packet.req.to_string(),
                    packet.flags.to_string(),
                    packet.body.len().to_string(),
                    body_preview(packet.body.as_ref()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "req={} flags={} size={} body={}",
                packet.req,
                packet.flags,
                packet.body.len(),
                body_preview(packet.body.as_ref())
            );
        }
        OutputFormat::Raw => {
            print_raw(packet.body.as_ref());
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// JSON bodies are embedded as JSON; everything else as a string preview.
fn body_value(packet: &Packet) -> serde_json::Value {
    if packet.flags.encoding() == Encoding::Json {
        if let Ok(value) = serde_json::from_slice(&packet.body) {
            return value;
        }
    }
    serde_json::Value::String(body_preview(packet.body.as_ref()))
}

fn body_preview(body: &[u8]) -> String {
    match std::str::from_utf8(body) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", body.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use muxwire_codec::Flags;

    use super::*;

    #[test]
    fn json_bodies_are_embedded() {
        let packet = Packet::new(1, Flags::from(Encoding::Json), r#"{"a":1}"#);
        assert_eq!(body_value(&packet), serde_json::json!({"a": 1}));

        let broken = Packet::new(1, Flags::from(Encoding::Json), "{not json");
        assert_eq!(body_value(&broken), serde_json::json!("{not json"));
    }

    #[test]
    fn binary_bodies_are_summarized() {
        assert_eq!(body_preview(&[0xff, 0x00, 0xfe]), "<binary 3 bytes>");
        assert_eq!(body_preview(b"hi"), "hi");
    }
}
