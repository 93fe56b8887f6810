/// Interrupt line of the first PC/AT serial port
pub const COM1_IRQ: u32 = 4;

/// Value returned by a receive-buffer read while the FIFO is empty
pub const IDLE_RECEIVE_VALUE: u8 = 0x21;

pub mod ports {
    // Register offsets relative to the port base
    pub const UART_RXBUF: u8 = 0x0; // Receive buffer (read)
    pub const UART_TXBUF: u8 = 0x0; // Transmit holding (write)
    pub const UART_DLL: u8 = 0x0; // Divisor latch low (DLAB set)
    pub const UART_IER: u8 = 0x1;
    pub const UART_DLH: u8 = 0x1; // Divisor latch high (DLAB set)
    pub const UART_IIR: u8 = 0x2; // Interrupt identification (read)
    pub const UART_FCR: u8 = 0x2; // FIFO control (write)
    pub const UART_LCR: u8 = 0x3;
    pub const UART_MCR: u8 = 0x4;
    pub const UART_LSR: u8 = 0x5;
    pub const UART_MSR: u8 = 0x6;
}

pub mod line_status {
    pub const DATA_READY: u8 = 0x01;
    pub const FIFO_EMPTY: u8 = 0x20; // Transmit holding register empty
    pub const TRANSMITTER_EMPTY: u8 = 0x40;

    pub const POWER_ON: u8 = FIFO_EMPTY | TRANSMITTER_EMPTY;
}

pub mod line_control {
    pub const WORD_LENGTH_8: u8 = 0x03;
    pub const DLAB: u8 = 0x80; // Divisor latch access

    pub const POWER_ON: u8 = WORD_LENGTH_8;
}

pub mod interrupt_enable {
    pub const RDI: u8 = 0x01; // Receive data available (and character timeout)
    pub const THRI: u8 = 0x02; // Transmit holding register empty
    pub const RLSI: u8 = 0x04; // Receiver line status
    pub const MSI: u8 = 0x08; // Modem status

    pub const WRITABLE: u8 = 0x0F;
}

pub mod interrupt_ident {
    // Values reported in the low nibble of IIR
    pub const NO_INT: u8 = 0x01;
    pub const MSI: u8 = 0x00;
    pub const THRI: u8 = 0x02;
    pub const RDI: u8 = 0x04;
    pub const RLSI: u8 = 0x06;
    pub const CTI: u8 = 0x0C;

    pub const ID_MASK: u8 = 0x0F;
    pub const FIFO_BITS: u8 = 0xC0; // Always reported set on read
}

pub mod fifo_control {
    pub const ENABLE: u8 = 0x01;
    pub const CLEAR_RCVR: u8 = 0x02;
    pub const CLEAR_XMIT: u8 = 0x04;
}

pub mod queue {
    pub const INITIAL_CAPACITY: usize = 16;
    pub const DEFAULT_MIN_CAPACITY: usize = 128;
}
