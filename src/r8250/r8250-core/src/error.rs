use core::fmt;
use thiserror::Error;

/// Direction of a register access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Read => f.write_str("read"),
            Access::Write => f.write_str("write"),
        }
    }
}

/// Errors raised by the serial port register interface.
///
/// Real hardware decodes every offset, so any of these means the bus
/// dispatcher routed an access the port never claimed. An empty receive FIFO
/// is not an error: reads return the idle value and `pop_*` returns `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UartError {
    #[error("unsupported UART register {access} at offset {offset:#x}")]
    UnsupportedRegister { offset: usize, access: Access },
}
