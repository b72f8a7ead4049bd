//! # Port I/O
//!
//! Byte and word access to the x86 I/O address space. None of the
//! instructions declare `nomem`, so the compiler treats every access as a
//! memory barrier and keeps hardware accesses in program order.

use core::arch::asm;

/// Port used to give slow devices time to settle between writes.
const WAIT_PORT: u16 = 0x80;

/// Read a byte from a port.
#[inline]
pub unsafe fn inb(port: u16) -> u8 {
	let value: u8;
	asm!("in al, dx", out("al") value, in("dx") port, options(nostack, preserves_flags));
	value
}

/// Read a word from a port.
#[inline]
pub unsafe fn inw(port: u16) -> u16 {
	let value: u16;
	asm!("in ax, dx", out("ax") value, in("dx") port, options(nostack, preserves_flags));
	value
}

/// Write a byte to a port.
#[inline]
pub unsafe fn outb(port: u16, value: u8) {
	asm!("out dx, al", in("dx") port, in("al") value, options(nostack, preserves_flags));
}

/// Write a word to a port.
#[inline]
pub unsafe fn outw(port: u16, value: u16) {
	asm!("out dx, ax", in("dx") port, in("ax") value, options(nostack, preserves_flags));
}

/// Access to the I/O address space.
///
/// Drivers are written against this trait so the kernel can hand them the
/// real [`Ports`] while tests hand them a simulated bus. No address is
/// validated: reading a port nothing answers on returns garbage, it never
/// fails.
pub trait PortIo {
	fn read_byte(&mut self, port: u16) -> u8;
	fn write_byte(&mut self, port: u16, value: u8);
	fn read_word(&mut self, port: u16) -> u16;
	fn write_word(&mut self, port: u16, value: u16);

	/// Burn roughly one I/O cycle.
	fn io_wait(&mut self) {
		self.write_byte(WAIT_PORT, 0);
	}
}

/// The machine's real I/O ports.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ports;

impl PortIo for Ports {
	fn read_byte(&mut self, port: u16) -> u8 {
		unsafe { inb(port) }
	}

	fn write_byte(&mut self, port: u16, value: u8) {
		unsafe { outb(port, value) }
	}

	fn read_word(&mut self, port: u16) -> u16 {
		unsafe { inw(port) }
	}

	fn write_word(&mut self, port: u16, value: u16) {
		unsafe { outw(port, value) }
	}
}
