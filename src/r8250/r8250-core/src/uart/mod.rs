//! 8250/16450 UART emulation.
//!
//! One [`SerialPort`] models one port. Guest register traffic arrives through
//! [`SerialPort::read`] and [`SerialPort::write`], host input through
//! [`SerialPort::receive_byte`]. The port raises and clears its interrupt
//! line through an [`InterruptSink`] and hands transmitted bytes to a
//! [`ByteSink`].
//!
//! | Offset | DLAB=0 Read | DLAB=0 Write | DLAB=1 Read | DLAB=1 Write |
//! |--------|-------------|--------------|-------------|--------------|
//! | +0     | RBR         | THR          | DLL         | DLL          |
//! | +1     | IER         | IER          | DLH         | DLH          |
//! | +2     | IIR         | FCR          | IIR         | FCR          |
//! | +3     | LCR         | LCR          | LCR         | LCR          |
//! | +4     | —           | MCR          | —           | MCR          |
//! | +5     | LSR         | —            | LSR         | —            |
//! | +6     | MSR         | —            | MSR         | —            |
//!
//! There is no receive trigger level: every received byte behaves as if the
//! character timeout had expired, so the guest is told about it at once.

mod interrupts;
mod registers;

pub use interrupts::{InterruptCause, PendingCauses};
pub use registers::Registers;

use crate::constants::{interrupt_enable, line_status, ports, IDLE_RECEIVE_VALUE};
use crate::error::{Access, UartError};
use crate::periph::{ByteSink, InterruptSink, IoPeriph};
use crate::queue::CircularQueue;
use core::convert::TryFrom;
use log::{debug, error, trace};

/// Emulated serial port wired to an interrupt line and a byte sink
pub struct SerialPort<I, B> {
    regs: Registers,
    ints: PendingCauses,              // Pending causes, masked or not
    receive_fifo: CircularQueue<u8>,  // Bytes awaiting an RBR read
    irq_line: u32,
    irq: I,                           // Interrupt controller input
    tx: B,                            // Transmitted bytes go here
}

impl<I: InterruptSink, B: ByteSink> SerialPort<I, B> {
    /// Creates a port in its power-on state
    pub fn new(irq_line: u32, irq: I, tx: B) -> Self {
        Self {
            regs: Registers::new(),
            ints: PendingCauses::empty(),
            receive_fifo: CircularQueue::new(),
            irq_line,
            irq,
            tx,
        }
    }

    /// Returns registers to power-on values and drops the line.
    /// Bytes already in the receive FIFO are kept.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.ints = PendingCauses::empty();
        self.irq.clear(self.irq_line);
    }

    /// Host side delivery of one incoming byte
    pub fn receive_byte(&mut self, byte: u8) {
        trace!("Received byte 0x{:02x}", byte);
        self.receive_fifo.push_back(byte);
        self.regs.lsr |= line_status::DATA_READY;
        self.signal_character_timeout();
    }

    pub fn receive_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.receive_byte(byte);
        }
    }

    pub fn signal_character_timeout(&mut self) {
        self.ints.insert(InterruptCause::CharacterTimeout);
        if self.regs.ier & interrupt_enable::RDI == 0 {
            return;
        }
        match self.regs.iir {
            Some(InterruptCause::ReceiverLineStatus) | Some(InterruptCause::ReceiveData) => {}
            _ => {
                self.regs.iir = Some(InterruptCause::CharacterTimeout);
                self.irq.raise(self.irq_line);
            }
        }
    }

    pub fn signal_transmit_empty(&mut self) {
        self.ints.insert(InterruptCause::TransmitHoldingEmpty);
        if self.regs.ier & interrupt_enable::THRI == 0 {
            return;
        }
        match self.regs.iir {
            None
            | Some(InterruptCause::ModemStatus)
            | Some(InterruptCause::TransmitHoldingEmpty) => {
                self.regs.iir = Some(InterruptCause::TransmitHoldingEmpty);
                self.irq.raise(self.irq_line);
            }
            _ => {}
        }
    }

    /// Re-arbitrates pending causes in priority order
    pub fn resolve_next_interrupt(&mut self) {
        let ier = self.regs.ier;
        if self.ints.contains(InterruptCause::CharacterTimeout) && ier & interrupt_enable::RDI != 0
        {
            self.signal_character_timeout();
        } else if self.ints.contains(InterruptCause::TransmitHoldingEmpty)
            && ier & interrupt_enable::THRI != 0
        {
            self.signal_transmit_empty();
        } else {
            self.regs.iir = None;
            self.irq.clear(self.irq_line);
        }
    }

    /// Clears `cause`; re-arbitrates only if it was the one being reported
    pub fn acknowledge(&mut self, cause: InterruptCause) {
        let reported = self.regs.iir.take();
        self.ints.remove(cause);
        if reported == Some(cause) {
            self.resolve_next_interrupt();
        }
    }

    pub fn read(&mut self, offset: u8) -> Result<u8, UartError> {
        if self.regs.dlab() {
            match offset {
                ports::UART_DLL => return Ok(self.regs.dll),
                ports::UART_DLH => return Ok(self.regs.dlh),
                _ => {}
            }
        }

        let value = match offset {
            ports::UART_RXBUF => self.read_receive_buffer(),
            ports::UART_IER => self.regs.ier & interrupt_enable::WRITABLE,
            ports::UART_IIR => {
                let value = self.regs.iir_value();
                // Reading IIR clears a pending THRE interrupt
                if self.regs.iir == Some(InterruptCause::TransmitHoldingEmpty) {
                    self.acknowledge(InterruptCause::TransmitHoldingEmpty);
                }
                value
            }
            ports::UART_LCR => self.regs.lcr,
            ports::UART_LSR => self.regs.lsr,
            ports::UART_MSR => self.regs.msr,
            _ => {
                error!("Unsupported UART register read at offset {}", offset);
                return Err(UartError::UnsupportedRegister {
                    offset: offset as usize,
                    access: Access::Read,
                });
            }
        };
        debug!("UART read offset {} -> 0x{:02x}", offset, value);
        Ok(value)
    }

    fn read_receive_buffer(&mut self) -> u8 {
        // CTI first: it is the cause normally reported, so its ack re-arbitrates
        self.acknowledge(InterruptCause::CharacterTimeout);
        self.acknowledge(InterruptCause::ReceiveData);

        let value = self.receive_fifo.pop_front().unwrap_or(IDLE_RECEIVE_VALUE);
        if self.receive_fifo.is_empty() {
            self.regs.lsr &= !line_status::DATA_READY;
        } else {
            // More to read: tell the guest now rather than on the next byte
            self.regs.lsr |= line_status::DATA_READY;
            self.signal_character_timeout();
        }
        value
    }

    pub fn write(&mut self, offset: u8, value: u8) -> Result<(), UartError> {
        debug!("UART write offset {} <- 0x{:02x}", offset, value);
        if self.regs.dlab() {
            match offset {
                ports::UART_DLL => {
                    self.regs.dll = value;
                    return Ok(());
                }
                ports::UART_DLH => {
                    self.regs.dlh = value;
                    return Ok(());
                }
                _ => {}
            }
        }

        match offset {
            ports::UART_TXBUF => {
                // Zero transmit latency: the holding register drains at once
                self.regs.lsr &= !line_status::FIFO_EMPTY;
                self.tx.put_char(value);
                self.regs.lsr |= line_status::FIFO_EMPTY;
                self.signal_transmit_empty();
            }
            ports::UART_IER => {
                self.regs.ier = value & interrupt_enable::WRITABLE;
                self.resolve_next_interrupt();
            }
            ports::UART_FCR => {
                // CLEAR_RCVR is accepted but the receive FIFO is left intact
                self.regs.fcr = value;
            }
            ports::UART_LCR => self.regs.lcr = value,
            ports::UART_MCR => self.regs.mcr = value,
            _ => {
                error!("Unsupported UART register write at offset {}", offset);
                return Err(UartError::UnsupportedRegister {
                    offset: offset as usize,
                    access: Access::Write,
                });
            }
        }
        Ok(())
    }

    pub fn line_status(&self) -> u8 {
        self.regs.lsr
    }

    pub fn line_control(&self) -> u8 {
        self.regs.lcr
    }

    pub fn modem_control(&self) -> u8 {
        self.regs.mcr
    }

    pub fn fifo_control(&self) -> u8 {
        self.regs.fcr
    }

    pub fn divisor(&self) -> u16 {
        self.regs.divisor()
    }

    /// Cause currently reported through IIR
    pub fn interrupt_ident(&self) -> Option<InterruptCause> {
        self.regs.iir
    }

    pub fn pending_causes(&self) -> PendingCauses {
        self.ints
    }

    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    pub fn receive_fifo(&self) -> &CircularQueue<u8> {
        &self.receive_fifo
    }

    pub fn irq_line(&self) -> u32 {
        self.irq_line
    }

    pub fn interrupt_sink(&self) -> &I {
        &self.irq
    }

    pub fn byte_sink(&self) -> &B {
        &self.tx
    }

    pub fn into_parts(self) -> (I, B) {
        (self.irq, self.tx)
    }
}

impl<I: InterruptSink, B: ByteSink> IoPeriph for SerialPort<I, B> {
    fn read(&mut self, offset: usize) -> Result<u32, UartError> {
        let reg = u8::try_from(offset).map_err(|_| {
            error!("Unsupported UART register read at offset {}", offset);
            UartError::UnsupportedRegister {
                offset,
                access: Access::Read,
            }
        })?;
        SerialPort::read(self, reg).map(u32::from)
    }

    fn write(&mut self, offset: usize, value: u32) -> Result<(), UartError> {
        let reg = u8::try_from(offset).map_err(|_| {
            error!("Unsupported UART register write at offset {}", offset);
            UartError::UnsupportedRegister {
                offset,
                access: Access::Write,
            }
        })?;
        SerialPort::write(self, reg, (value & 0xFF) as u8)
    }

    fn is_interrupt(&self) -> bool {
        self.regs.iir.is_some()
    }
}

#[cfg(test)]
mod uart_tests {
    use super::*;
    use crate::constants::{interrupt_ident, line_control};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Line {
        Raise(u32),
        Clear(u32),
    }

    /// Records every call so tests can check exact sink traffic
    #[derive(Default)]
    struct Recorder {
        calls: Vec<Line>,
    }

    impl Recorder {
        fn raises(&self) -> usize {
            self.calls.iter().filter(|c| matches!(c, Line::Raise(_))).count()
        }

        fn last(&self) -> Option<Line> {
            self.calls.last().copied()
        }
    }

    impl InterruptSink for Recorder {
        fn raise(&mut self, line: u32) {
            self.calls.push(Line::Raise(line));
        }

        fn clear(&mut self, line: u32) {
            self.calls.push(Line::Clear(line));
        }
    }

    const IRQ: u32 = 4;

    fn port() -> SerialPort<Recorder, Vec<u8>> {
        SerialPort::new(IRQ, Recorder::default(), Vec::new())
    }

    fn enable(port: &mut SerialPort<Recorder, Vec<u8>>, ier: u8) {
        port.write(ports::UART_IER, ier).unwrap();
    }

    #[test]
    fn transmit_forwards_byte_and_leaves_fifo_empty() {
        let mut port = port();
        port.write(ports::UART_TXBUF, 0x42).unwrap();
        assert_eq!(port.byte_sink(), &vec![0x42]);
        assert_ne!(port.line_status() & line_status::FIFO_EMPTY, 0);
        assert!(port.pending_causes().contains(InterruptCause::TransmitHoldingEmpty));
        // THRI masked: nothing raised
        assert_eq!(port.interrupt_sink().raises(), 0);
    }

    #[test]
    fn transmit_raises_thre_before_returning() {
        let mut port = port();
        enable(&mut port, interrupt_enable::THRI);
        port.write(ports::UART_TXBUF, b'x').unwrap();
        assert_eq!(port.interrupt_ident(), Some(InterruptCause::TransmitHoldingEmpty));
        assert_eq!(port.interrupt_sink().last(), Some(Line::Raise(IRQ)));
    }

    #[test]
    fn single_byte_round_trip_clears_data_ready() {
        let mut port = port();
        enable(&mut port, interrupt_enable::RDI);
        port.receive_byte(0x41);
        assert_ne!(port.line_status() & line_status::DATA_READY, 0);
        assert_eq!(port.interrupt_ident(), Some(InterruptCause::CharacterTimeout));
        assert_eq!(port.interrupt_sink().last(), Some(Line::Raise(IRQ)));

        assert_eq!(port.read(ports::UART_RXBUF), Ok(0x41));
        assert_eq!(port.line_status() & line_status::DATA_READY, 0);
        assert_eq!(port.interrupt_ident(), None);
        assert_eq!(port.interrupt_sink().last(), Some(Line::Clear(IRQ)));
    }

    #[test]
    fn remaining_bytes_re_signal_timeout() {
        let mut port = port();
        enable(&mut port, interrupt_enable::RDI);
        port.receive_bytes(&[0x10, 0x20]);
        let raises = port.interrupt_sink().raises();

        assert_eq!(port.read(ports::UART_RXBUF), Ok(0x10));
        assert_ne!(port.line_status() & line_status::DATA_READY, 0);
        assert_eq!(port.interrupt_sink().raises(), raises + 1);
        assert_eq!(port.interrupt_sink().last(), Some(Line::Raise(IRQ)));
        assert_eq!(port.interrupt_ident(), Some(InterruptCause::CharacterTimeout));

        assert_eq!(port.read(ports::UART_RXBUF), Ok(0x20));
        assert_eq!(port.line_status() & line_status::DATA_READY, 0);
    }

    #[test]
    fn masked_receive_never_raises() {
        let mut port = port();
        port.receive_byte(0x41);
        port.receive_byte(0x42);
        assert_eq!(port.interrupt_sink().raises(), 0);
        assert_ne!(port.line_status() & line_status::DATA_READY, 0);
        assert!(port.pending_causes().contains(InterruptCause::CharacterTimeout));
        assert_eq!(port.read(ports::UART_IIR), Ok(0xC1));
    }

    #[test]
    fn empty_receive_buffer_reads_idle_value() {
        let mut port = port();
        assert_eq!(port.read(ports::UART_RXBUF), Ok(IDLE_RECEIVE_VALUE));
        assert_eq!(port.line_status() & line_status::DATA_READY, 0);
    }

    #[test]
    fn iir_read_acknowledges_thre() {
        let mut port = port();
        enable(&mut port, interrupt_enable::THRI);
        port.write(ports::UART_TXBUF, b'a').unwrap();

        let iir = port.read(ports::UART_IIR).unwrap();
        assert_eq!(iir, interrupt_ident::FIFO_BITS | interrupt_ident::THRI);
        assert!(!port.pending_causes().contains(InterruptCause::TransmitHoldingEmpty));
        assert_eq!(port.interrupt_ident(), None);
        assert_eq!(port.interrupt_sink().last(), Some(Line::Clear(IRQ)));

        port.resolve_next_interrupt();
        assert_eq!(port.interrupt_ident(), None);
        assert_eq!(port.read(ports::UART_IIR), Ok(0xC1));
    }

    #[test]
    fn iir_read_leaves_receive_interrupt_alone() {
        let mut port = port();
        enable(&mut port, interrupt_enable::RDI);
        port.receive_byte(b'q');
        assert_eq!(port.read(ports::UART_IIR), Ok(0xCC));
        assert_eq!(port.read(ports::UART_IIR), Ok(0xCC));
        assert_eq!(port.interrupt_ident(), Some(InterruptCause::CharacterTimeout));
    }

    #[test]
    fn timeout_outranks_transmit_empty() {
        let mut port = port();
        enable(&mut port, interrupt_enable::RDI | interrupt_enable::THRI);
        port.write(ports::UART_TXBUF, b'o').unwrap();
        assert_eq!(port.interrupt_ident(), Some(InterruptCause::TransmitHoldingEmpty));

        port.receive_byte(b'i');
        assert_eq!(port.interrupt_ident(), Some(InterruptCause::CharacterTimeout));

        // THRE does not displace a reported timeout
        port.write(ports::UART_TXBUF, b'p').unwrap();
        assert_eq!(port.interrupt_ident(), Some(InterruptCause::CharacterTimeout));

        // Draining the byte hands the line over to THRE
        assert_eq!(port.read(ports::UART_RXBUF), Ok(b'i'));
        assert!(port.pending_causes().contains(InterruptCause::TransmitHoldingEmpty));
        port.resolve_next_interrupt();
        assert_eq!(port.interrupt_ident(), Some(InterruptCause::TransmitHoldingEmpty));
    }

    #[test]
    fn enabling_ier_fires_pending_cause() {
        let mut port = port();
        port.receive_byte(0x55);
        assert_eq!(port.interrupt_sink().raises(), 0);

        enable(&mut port, interrupt_enable::RDI);
        assert_eq!(port.interrupt_ident(), Some(InterruptCause::CharacterTimeout));
        assert_eq!(port.interrupt_sink().last(), Some(Line::Raise(IRQ)));

        enable(&mut port, 0);
        assert_eq!(port.interrupt_ident(), None);
        assert_eq!(port.interrupt_sink().last(), Some(Line::Clear(IRQ)));
    }

    #[test]
    fn ier_keeps_low_nibble_only() {
        let mut port = port();
        enable(&mut port, 0xFF);
        assert_eq!(port.read(ports::UART_IER), Ok(0x0F));
    }

    #[test]
    fn acknowledge_of_unreported_cause_skips_rearbitration() {
        let mut port = port();
        enable(&mut port, interrupt_enable::RDI | interrupt_enable::THRI);
        port.write(ports::UART_TXBUF, b'z').unwrap();
        let calls = port.interrupt_sink().calls.len();

        port.acknowledge(InterruptCause::ReceiveData);
        assert_eq!(port.interrupt_ident(), None);
        assert_eq!(port.interrupt_sink().calls.len(), calls);
        assert!(port.pending_causes().contains(InterruptCause::TransmitHoldingEmpty));

        port.resolve_next_interrupt();
        assert_eq!(port.interrupt_ident(), Some(InterruptCause::TransmitHoldingEmpty));
    }

    #[test]
    fn dlab_redirects_to_divisor_latch() {
        let mut port = port();
        port.write(ports::UART_LCR, line_control::DLAB | line_control::WORD_LENGTH_8)
            .unwrap();
        port.write(ports::UART_DLL, 0x0C).unwrap();
        port.write(ports::UART_DLH, 0x00).unwrap();
        assert!(port.byte_sink().is_empty());
        assert_eq!(port.read(ports::UART_DLL), Ok(0x0C));
        assert_eq!(port.read(ports::UART_DLH), Ok(0x00));
        assert_eq!(port.divisor(), 12);

        // IER untouched while DLAB was set
        port.write(ports::UART_LCR, line_control::WORD_LENGTH_8).unwrap();
        assert_eq!(port.read(ports::UART_IER), Ok(0));
    }

    #[test]
    fn plain_registers_store_verbatim() {
        let mut port = port();
        port.write(ports::UART_LCR, 0x1B).unwrap();
        port.write(ports::UART_MCR, 0x0B).unwrap();
        assert_eq!(port.read(ports::UART_LCR), Ok(0x1B));
        assert_eq!(port.modem_control(), 0x0B);
        assert_eq!(port.read(ports::UART_MSR), Ok(0));
        assert_eq!(port.read(ports::UART_LSR), Ok(0x60));
    }

    #[test]
    fn fifo_reset_bit_keeps_received_bytes() {
        let mut port = port();
        port.receive_bytes(b"ab");
        port.write(ports::UART_FCR, 0x07).unwrap();
        assert_eq!(port.fifo_control(), 0x07);
        assert_eq!(port.receive_fifo().len(), 2);
        assert_eq!(port.read(ports::UART_RXBUF), Ok(b'a'));
    }

    #[test]
    fn unsupported_offsets_change_nothing() {
        let mut port = port();
        let before = port.registers().clone();
        assert_eq!(
            port.read(ports::UART_MCR),
            Err(UartError::UnsupportedRegister {
                offset: 4,
                access: Access::Read
            })
        );
        assert_eq!(
            port.write(ports::UART_LSR, 0xFF),
            Err(UartError::UnsupportedRegister {
                offset: 5,
                access: Access::Write
            })
        );
        assert!(port.write(7, 0).is_err());
        assert!(port.read(7).is_err());
        assert_eq!(port.registers(), &before);
        assert!(port.interrupt_sink().calls.is_empty());
    }

    #[test]
    fn reset_keeps_fifo_contents() {
        let mut port = port();
        enable(&mut port, interrupt_enable::RDI);
        port.write(ports::UART_LCR, 0x9B).unwrap();
        port.receive_byte(b'k');

        port.reset();
        assert_eq!(port.registers(), &Registers::new());
        assert!(port.pending_causes().is_empty());
        assert_eq!(port.interrupt_sink().last(), Some(Line::Clear(IRQ)));
        assert_eq!(port.receive_fifo().len(), 1);
        assert_eq!(port.read(ports::UART_RXBUF), Ok(b'k'));
    }

    #[test]
    fn bus_interface_masks_values() {
        let mut port = port();
        IoPeriph::write(&mut port, ports::UART_TXBUF as usize, 0x1234).unwrap();
        assert_eq!(port.byte_sink(), &vec![0x34]);
        assert!(!port.is_interrupt());

        // The masked THRE from the write above fires once unmasked
        IoPeriph::write(&mut port, ports::UART_IER as usize, 0x102).unwrap();
        assert_eq!(IoPeriph::read(&mut port, ports::UART_IER as usize), Ok(0x02));
        assert!(port.is_interrupt());

        assert_eq!(IoPeriph::read(&mut port, ports::UART_IIR as usize), Ok(0xC2));
        assert!(!port.is_interrupt());

        assert_eq!(
            IoPeriph::read(&mut port, 0x3F8),
            Err(UartError::UnsupportedRegister {
                offset: 0x3F8,
                access: Access::Read
            })
        );
    }

    #[test]
    fn borrowed_sinks_stay_with_caller() {
        let mut irq = Recorder::default();
        let mut out = Vec::new();
        {
            let mut port = SerialPort::new(IRQ, &mut irq, &mut out);
            port.write(ports::UART_IER, interrupt_enable::THRI).unwrap();
            port.write(ports::UART_TXBUF, b'h').unwrap();
            port.write(ports::UART_TXBUF, b'i').unwrap();
        }
        assert_eq!(out, b"hi");
        assert_eq!(irq.raises(), 2);
    }

    #[test]
    fn owned_sinks_come_back_from_into_parts() {
        let mut port = port();
        enable(&mut port, interrupt_enable::RDI);
        port.receive_byte(b'q');
        assert_eq!(port.read(ports::UART_RXBUF), Ok(b'q'));
        port.write(ports::UART_TXBUF, b'q').unwrap();

        let (irq, out) = port.into_parts();
        assert_eq!(out, b"q");
        // IER write, received byte, RBR read
        assert_eq!(
            irq.calls,
            vec![Line::Clear(IRQ), Line::Raise(IRQ), Line::Clear(IRQ)]
        );
    }
}
