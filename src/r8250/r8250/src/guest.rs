use log::{debug, warn};
use r8250_core::constants::{
    fifo_control, interrupt_enable, interrupt_ident, line_control, line_status, ports,
};
use r8250_core::periph::{ByteSink, InterruptSink};
use r8250_core::{SerialPort, UartError};

/// Divisor for 115200 baud off the standard 1.8432 MHz crystal
pub const DIVISOR_115200: u16 = 1;

// Modem control: DTR | RTS | OUT2 (OUT2 gates the IRQ on PCs)
const MCR_DTR_RTS_OUT2: u8 = 0x0B;

// Interrupt handler bails out after this many IIR passes
const PASS_LIMIT: usize = 256;

/// Register-level model of a guest driver that echoes everything it receives
pub struct EchoDriver {
    divisor: u16,
    pub total_echoed: usize,
}

impl EchoDriver {
    pub fn new(divisor: u16) -> Self {
        EchoDriver {
            divisor,
            total_echoed: 0,
        }
    }

    /// Programs the port the way an early console driver does
    pub fn init<I: InterruptSink, B: ByteSink>(
        &mut self,
        port: &mut SerialPort<I, B>,
    ) -> Result<(), UartError> {
        let [low, high] = self.divisor.to_le_bytes();

        port.write(ports::UART_IER, 0)?;
        port.write(ports::UART_LCR, line_control::DLAB)?;
        port.write(ports::UART_DLL, low)?;
        port.write(ports::UART_DLH, high)?;
        port.write(ports::UART_LCR, line_control::WORD_LENGTH_8)?;
        port.write(
            ports::UART_FCR,
            fifo_control::ENABLE | fifo_control::CLEAR_RCVR | fifo_control::CLEAR_XMIT,
        )?;
        port.write(ports::UART_MCR, MCR_DTR_RTS_OUT2)?;
        port.write(
            ports::UART_IER,
            interrupt_enable::RDI | interrupt_enable::THRI,
        )?;
        debug!("Guest driver programmed divisor {}", self.divisor);
        Ok(())
    }

    /// Interrupt handler body, returns how many bytes were echoed
    pub fn service<I: InterruptSink, B: ByteSink>(
        &mut self,
        port: &mut SerialPort<I, B>,
    ) -> Result<usize, UartError> {
        let mut echoed = 0;
        for _ in 0..PASS_LIMIT {
            let iir = port.read(ports::UART_IIR)?;
            if iir & interrupt_ident::NO_INT != 0 {
                self.total_echoed += echoed;
                return Ok(echoed);
            }

            match iir & interrupt_ident::ID_MASK {
                interrupt_ident::CTI | interrupt_ident::RDI => echoed += self.drain(port)?,
                interrupt_ident::THRI => {} // The IIR read above acknowledged it
                other => debug!("Ignoring interrupt ident 0x{:x}", other),
            }
        }

        warn!("Too much work for serial interrupt handler");
        self.total_echoed += echoed;
        Ok(echoed)
    }

    // Reads every byte flagged by Data-Ready and writes it straight back
    fn drain<I: InterruptSink, B: ByteSink>(
        &mut self,
        port: &mut SerialPort<I, B>,
    ) -> Result<usize, UartError> {
        let mut count = 0;
        while port.read(ports::UART_LSR)? & line_status::DATA_READY != 0 {
            let byte = port.read(ports::UART_RXBUF)?;
            port.write(ports::UART_TXBUF, byte)?;
            count += 1;
        }
        Ok(count)
    }
}
