use crate::utils::{escape, host_to_guest};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error};
use std::io::{Read, Write};

use r8250_core::periph::ByteSink;

/// Writes every transmitted byte straight to a host stream
pub struct ConsoleSink<W: Write> {
    out: W,
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        ConsoleSink { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ByteSink for ConsoleSink<W> {
    fn put_char(&mut self, byte: u8) {
        // The port cannot observe a failed write, so only log it
        if let Err(e) = self.out.write_all(&[byte]).and_then(|_| self.out.flush()) {
            error!("Console write of {} failed: {}", escape(byte), e);
        }
    }
}

// Reads the host stream byte by byte until EOF or error
fn reader_thread<R: Read>(input: R, tx: Sender<u8>) {
    for byte in input.bytes() {
        match byte {
            Ok(b) => {
                debug!("Host input {}", escape(b));
                if tx.send(host_to_guest(b)).is_err() {
                    break;
                }
            }
            Err(e) => {
                error!("Host input read failed: {}", e);
                break;
            }
        }
    }
}

/// Spawns a thread feeding `input` into the returned channel
pub fn spawn_reader<R: Read + Send + 'static>(input: R) -> Receiver<u8> {
    let (tx, rx) = unbounded();
    std::thread::spawn(move || reader_thread(input, tx));
    rx
}

/// Bytes typed on this process's stdin, newline-translated for the guest
pub fn stdin_reader() -> Receiver<u8> {
    spawn_reader(std::io::stdin())
}
