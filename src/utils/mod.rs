/// Privileged CPU instructions
pub mod cpu;

/// Serial port logging
pub mod debug;

/// Port I/O
pub mod io;
