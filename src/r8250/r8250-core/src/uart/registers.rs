use super::interrupts::{ident_of, InterruptCause};
use crate::constants::{interrupt_ident, line_control, line_status};

/// 8250 register file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registers {
    pub lcr: u8,                        // Line control
    pub lsr: u8,                        // Line status
    pub msr: u8,                        // Modem status
    pub mcr: u8,                        // Modem control, stored only
    pub ier: u8,                        // Interrupt enable, low nibble
    pub iir: Option<InterruptCause>,    // Reported cause, None is "no interrupt"
    pub fcr: u8,                        // FIFO control, stored only
    pub dll: u8,                        // Divisor latch low
    pub dlh: u8,                        // Divisor latch high
}

impl Registers {
    /// Power-on values
    pub const fn new() -> Self {
        Self {
            lcr: line_control::POWER_ON,
            lsr: line_status::POWER_ON,
            msr: 0,
            mcr: 0,
            ier: 0,
            iir: None,
            fcr: 0,
            dll: 0,
            dlh: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Divisor latch access bit in LCR
    #[inline]
    pub fn dlab(&self) -> bool {
        self.lcr & line_control::DLAB != 0
    }

    /// IIR as the guest reads it: identification bits always set
    pub fn iir_value(&self) -> u8 {
        (ident_of(self.iir) & interrupt_ident::ID_MASK) | interrupt_ident::FIFO_BITS
    }

    pub fn divisor(&self) -> u16 {
        u16::from_le_bytes([self.dll, self.dlh])
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}
