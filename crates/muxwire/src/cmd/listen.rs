use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use muxwire_mux::{CancellationToken, Packer};

use crate::cmd::{install_ctrlc_handler, ListenArgs};
use crate::exit::{mux_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_packet, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let listener = args
        .endpoint
        .bind()
        .map_err(|err| transport_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;
    let cancel = CancellationToken::new();

    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        let conn = listener
            .accept()
            .map_err(|err| transport_error("accept failed", err))?;
        let packer = Packer::new(conn).map_err(|err| transport_error("accept failed", err))?;

        while running.load(Ordering::SeqCst) {
            let packet = match packer.next_packet(&cancel) {
                Ok(Some(packet)) => packet,
                Ok(None) => break,
                Err(err) if err.is_closed() => {
                    tracing::debug!(error = %err, "peer hung up mid-packet");
                    break;
                }
                Err(err) => return Err(mux_error("receive failed", err)),
            };
            if packet.is_goodbye() {
                tracing::debug!("peer said goodbye");
                break;
            }

            if let Some(reqs) = &args.req {
                if !reqs.contains(&packet.req) {
                    continue;
                }
            }

            print_packet(&packet, format);
            printed = printed.saturating_add(1);

            if let Some(count) = args.count {
                if printed >= count {
                    if let Err(err) = packer.close() {
                        tracing::warn!(error = %err, "closing connection failed");
                    }
                    return Ok(SUCCESS);
                }
            }
        }
        if let Err(err) = packer.close() {
            tracing::warn!(error = %err, "closing connection failed");
        }
    }

    Ok(SUCCESS)
}
