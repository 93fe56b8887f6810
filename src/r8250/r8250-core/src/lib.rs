#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

pub mod constants;
pub mod error;
pub mod periph;
pub mod queue;
pub mod uart;

pub use error::{Access, UartError};
pub use queue::CircularQueue;
pub use uart::{InterruptCause, SerialPort};
