// Host terminals send LF for the enter key, guest line disciplines expect CR
pub fn host_to_guest(byte: u8) -> u8 {
    match byte {
        b'\n' => b'\r',
        _ => byte,
    }
}

// Printable rendering of a byte for log lines
pub fn escape(byte: u8) -> String {
    core::ascii::escape_default(byte).map(char::from).collect()
}
