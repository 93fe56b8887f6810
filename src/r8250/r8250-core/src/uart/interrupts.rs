use crate::constants::interrupt_ident;

/// Interrupt sources of the 8250, highest priority first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptCause {
    ReceiverLineStatus, // Never generated, holds its priority slot
    ReceiveData,
    CharacterTimeout,
    TransmitHoldingEmpty,
    ModemStatus,
}

impl InterruptCause {
    /// Identification code reported in the low nibble of IIR
    pub const fn ident(self) -> u8 {
        match self {
            InterruptCause::ReceiverLineStatus => interrupt_ident::RLSI,
            InterruptCause::ReceiveData => interrupt_ident::RDI,
            InterruptCause::CharacterTimeout => interrupt_ident::CTI,
            InterruptCause::TransmitHoldingEmpty => interrupt_ident::THRI,
            InterruptCause::ModemStatus => interrupt_ident::MSI,
        }
    }

    const fn bit(self) -> u8 {
        match self {
            InterruptCause::ReceiverLineStatus => 1 << 0,
            InterruptCause::ReceiveData => 1 << 1,
            InterruptCause::CharacterTimeout => 1 << 2,
            InterruptCause::TransmitHoldingEmpty => 1 << 3,
            InterruptCause::ModemStatus => 1 << 4,
        }
    }
}

/// IIR low nibble for an optional reported cause
pub const fn ident_of(reported: Option<InterruptCause>) -> u8 {
    match reported {
        Some(cause) => cause.ident(),
        None => interrupt_ident::NO_INT,
    }
}

/// Causes that are pending whether or not IER lets them through
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PendingCauses(u8);

impl PendingCauses {
    pub const fn empty() -> Self {
        PendingCauses(0)
    }

    pub fn insert(&mut self, cause: InterruptCause) {
        self.0 |= cause.bit();
    }

    pub fn remove(&mut self, cause: InterruptCause) {
        self.0 &= !cause.bit();
    }

    pub const fn contains(self, cause: InterruptCause) -> bool {
        self.0 & cause.bit() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}
