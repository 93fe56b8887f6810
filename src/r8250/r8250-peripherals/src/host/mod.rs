pub mod console;
pub mod tcp;
