//! Two ends of one socket pair: the client streams three chunks, the server
//! prints what arrives and answers with a single reply.
//!
//! Run with:
//!   cargo run --example loopback

#[cfg(unix)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::thread;

    use muxwire::codec::{Flags, Packet};
    use muxwire::mux::{end_reason, CancellationToken, Packer};
    use muxwire::transport::Connection;

    let (client_conn, server_conn) = Connection::pair()?;
    let client = Packer::new(client_conn)?;
    let server = Packer::new(server_conn)?;

    let server_thread = thread::spawn(move || -> Result<(), muxwire::mux::MuxError> {
        let cancel = CancellationToken::new();
        while let Some(packet) = server.next_packet(&cancel)? {
            if packet.flags.is_end_err() {
                eprintln!("server: stream {} ended: {:?}", packet.req, end_reason(&packet));
                server
                    .writer()
                    .write_packet(&Packet::new(packet.req, Flags::empty(), "thanks"))
                    .map_err(|err| muxwire::mux::MuxError::Write(std::sync::Arc::new(err)))?;
                continue;
            }
            eprintln!(
                "server: stream {} sent {:?}",
                packet.req,
                String::from_utf8_lossy(&packet.body)
            );
        }
        server.close()
    });

    let sink = client.sink();
    sink.bind(1, true)?;
    for chunk in ["alpha", "beta", "gamma"] {
        sink.write(chunk.as_bytes())?;
    }
    sink.close()?;

    if let Some(reply) = client.next_packet(&CancellationToken::new())? {
        println!(
            "client: reply on stream {}: {}",
            reply.req,
            String::from_utf8_lossy(&reply.body)
        );
    }
    client.close()?;

    match server_thread.join() {
        Ok(result) => result?,
        Err(_) => return Err("server thread panicked".into()),
    }
    Ok(())
}

#[cfg(not(unix))]
fn main() {
    eprintln!("this example needs unix domain sockets");
}
