use crate::error::UartError;
use alloc::vec::Vec;
use heapless::spsc::Producer;
use log::warn;

/// Interrupt controller input driven by a device.
///
/// Both operations must be idempotent: the port re-raises an already raised
/// line whenever it re-arbitrates.
pub trait InterruptSink {
    fn raise(&mut self, line: u32);
    fn clear(&mut self, line: u32);
}

/// Destination for bytes the guest transmits; never blocks, never fails
pub trait ByteSink {
    fn put_char(&mut self, byte: u8);
}

/// Register-level interface used by a bus dispatcher
pub trait IoPeriph {
    /// Read and write a register at `offset` from the device base
    fn read(&mut self, offset: usize) -> Result<u32, UartError>;
    fn write(&mut self, offset: usize, value: u32) -> Result<(), UartError>;

    /// Check whether the device currently reports an interrupt
    fn is_interrupt(&self) -> bool;
}

impl<T: InterruptSink + ?Sized> InterruptSink for &mut T {
    fn raise(&mut self, line: u32) {
        (**self).raise(line)
    }

    fn clear(&mut self, line: u32) {
        (**self).clear(line)
    }
}

impl<T: ByteSink + ?Sized> ByteSink for &mut T {
    fn put_char(&mut self, byte: u8) {
        (**self).put_char(byte)
    }
}

impl ByteSink for Vec<u8> {
    fn put_char(&mut self, byte: u8) {
        self.push(byte);
    }
}

/// Line transition forwarded to an interrupt controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqEvent {
    Raise(u32),
    Clear(u32),
}

/// Queues line transitions for a consumer on the other side of an spsc queue
impl<'a, const N: usize> InterruptSink for Producer<'a, IrqEvent, N> {
    fn raise(&mut self, line: u32) {
        if self.enqueue(IrqEvent::Raise(line)).is_err() {
            warn!("Interrupt queue full, dropping raise of line {}", line);
        }
    }

    fn clear(&mut self, line: u32) {
        if self.enqueue(IrqEvent::Clear(line)).is_err() {
            warn!("Interrupt queue full, dropping clear of line {}", line);
        }
    }
}
