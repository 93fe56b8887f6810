use crate::utils::escape;

use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender, TrySendError};
use log::{error, info, warn};
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};

use r8250_core::periph::ByteSink;

// Guest output held while no client is attached
pub const OUTBOUND_DEPTH: usize = 4096;

/// Serial line exposed on a TCP socket, one client at a time.
///
/// Bytes the guest transmits are queued while nobody is connected and
/// delivered to the next client. Bytes a client sends come out of
/// [`TcpBridge::incoming`]. When a client goes away the next one is accepted.
pub struct TcpBridge {
    tx: Sender<u8>,
    incoming: Receiver<u8>,
    local_addr: SocketAddr,
}

// Copies client input into the guest-bound channel, then reports the hangup
fn client_reader(mut stream: TcpStream, inbound: Sender<u8>, hangup: Sender<()>) {
    let mut buf = [0u8; 256];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if buf[..n].iter().any(|&b| inbound.send(b).is_err()) {
                    break; // Bridge dropped
                }
            }
            Err(e) => {
                warn!("Client read failed: {}", e);
                break;
            }
        }
    }
    let _hangup_result = hangup.send(());
}

// Writes one byte, handing it back if the client is gone
fn send_to_client(client: &mut TcpStream, byte: u8) -> Result<(), u8> {
    client.write_all(&[byte]).map_err(|e| {
        warn!("Client write of {} failed: {}", escape(byte), e);
        byte
    })
}

// Accepts clients and forwards transmitted bytes to the current one
fn bridge_thread(listener: TcpListener, outbound: Receiver<u8>, inbound: Sender<u8>) {
    let mut pending: Option<u8> = None;

    for stream in listener.incoming() {
        let mut client = match stream {
            Ok(s) => s,
            Err(e) => {
                warn!("Accept failed: {}", e);
                continue;
            }
        };
        info!("Serial client connected from {:?}", client.peer_addr().ok());

        let (hangup_tx, hangup) = bounded(1);
        match client.try_clone() {
            Ok(reader) => {
                let inbound = inbound.clone();
                std::thread::spawn(move || client_reader(reader, inbound, hangup_tx));
            }
            Err(e) => {
                error!("Could not split client stream: {}", e);
                continue;
            }
        }

        if let Some(byte) = pending.take() {
            pending = send_to_client(&mut client, byte).err();
        }

        let mut bridge_open = true;
        let mut connected = true;
        while bridge_open && connected && pending.is_none() {
            select! {
                recv(outbound) -> msg => match msg {
                    Ok(byte) => pending = send_to_client(&mut client, byte).err(),
                    Err(_) => bridge_open = false,
                },
                recv(hangup) -> _ => connected = false,
            }
        }

        // Unblocks the reader if the write side failed first
        let _shutdown_result = client.shutdown(Shutdown::Both);
        if !bridge_open {
            return;
        }
        info!("Serial client disconnected");
    }
}

impl TcpBridge {
    /// Binds `addr` and starts serving clients in the background
    pub fn bind(addr: &str) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        let local_addr = listener.local_addr()?;
        let (tx, outbound) = bounded(OUTBOUND_DEPTH);
        let (inbound, incoming) = unbounded();

        std::thread::spawn(move || bridge_thread(listener, outbound, inbound));
        info!("Serial bridge listening on {}", local_addr);
        Ok(TcpBridge {
            tx,
            incoming,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Bytes received from clients, in arrival order
    pub fn incoming(&self) -> &Receiver<u8> {
        &self.incoming
    }
}

impl ByteSink for TcpBridge {
    fn put_char(&mut self, byte: u8) {
        match self.tx.try_send(byte) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Outbound queue full, dropping {}", escape(byte));
            }
            Err(TrySendError::Disconnected(_)) => {
                error!("Bridge thread gone, dropping {}", escape(byte));
            }
        }
    }
}
