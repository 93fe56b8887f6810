pub mod utils;

#[cfg(feature = "host-peripherals")]
mod host;
#[cfg(feature = "host-peripherals")]
pub use host::{console, tcp};
