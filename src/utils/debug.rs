//! # Serial Port Debugging Module
//!
//! Log sink on the first serial port. Every line written with [`log!`] goes
//! out as `LEVEL: message`, which QEMU can forward to the host terminal with
//! `-serial stdio`.

use crate::utils::io::{PortIo, Ports};
use core::fmt;
use lazy_static::lazy_static;
use spin::Mutex;

const SERIAL_PORT: u16 = 0x3f8;

/// Line status bit set when the transmit holding register is empty.
const TRANSMIT_EMPTY: u8 = 0x20;

#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
	Panic,
	Critical,
	Error,
	Warning,
	Info,
	Debug,
}

impl LogLevel {
	pub fn as_str(self) -> &'static str {
		match self {
			LogLevel::Panic => "PANIC",
			LogLevel::Critical => "CRITICAL",
			LogLevel::Error => "ERROR",
			LogLevel::Warning => "WARNING",
			LogLevel::Info => "INFO",
			LogLevel::Debug => "DEBUG",
		}
	}
}

lazy_static! {
	pub static ref DEBUG: Mutex<Debug<Ports>> = Mutex::new(Debug::new(Ports));
}

/// A 16550 UART used write-only.
pub struct Debug<P: PortIo> {
	ports: P,
}

impl<P: PortIo> Debug<P> {
	pub const fn new(ports: P) -> Self {
		Self { ports }
	}

	/// 38400 baud, 8N1, FIFO enabled, interrupts off.
	pub fn init(&mut self) {
		self.ports.write_byte(SERIAL_PORT + 1, 0x00);
		self.ports.write_byte(SERIAL_PORT + 3, 0x80);
		self.ports.write_byte(SERIAL_PORT, 0x03);
		self.ports.write_byte(SERIAL_PORT + 1, 0x00);
		self.ports.write_byte(SERIAL_PORT + 3, 0x03);
		self.ports.write_byte(SERIAL_PORT + 2, 0xc7);
		self.ports.write_byte(SERIAL_PORT + 4, 0x0b);
	}

	fn is_transmit_empty(&mut self) -> bool {
		self.ports.read_byte(SERIAL_PORT + 5) & TRANSMIT_EMPTY != 0
	}

	fn write_byte_serial(&mut self, byte: u8) {
		while !self.is_transmit_empty() {}
		self.ports.write_byte(SERIAL_PORT, byte);
	}

	pub fn write_string_serial(&mut self, s: &str) {
		for byte in s.bytes() {
			self.write_byte_serial(byte);
			if byte == b'\n' {
				self.write_byte_serial(b'\r');
			}
		}
	}
}

impl<P: PortIo> fmt::Write for Debug<P> {
	fn write_str(&mut self, s: &str) -> fmt::Result {
		self.write_string_serial(s);
		Ok(())
	}
}

pub fn init_serial_port() {
	DEBUG.lock().init();
	log!(LogLevel::Info, "Serial port initialized");
}

/// Writes one log line to the serial port.
#[cfg(not(test))]
pub fn log(level: LogLevel, args: fmt::Arguments) {
	use core::fmt::Write;
	crate::exceptions::interrupts::without_interrupts(|| {
		let mut debug = DEBUG.lock();
		let _ = write!(debug, "{}: {}\n", level.as_str(), args);
	});
}

/// Host test builds have no serial port.
#[cfg(test)]
pub fn log(_level: LogLevel, _args: fmt::Arguments) {}
