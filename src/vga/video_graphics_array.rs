//! Module for VGA text mode buffer manipulation.
//!
//! ## Overview
//!
//! The VGA text mode buffer is a region of memory that is mapped to the
//! display hardware, located at physical address `0xb8000`. It is 25 lines
//! high and 80 columns wide. Each character cell consists of two bytes: one
//! for the ASCII character, and one for the color. The hardware cursor is
//! driven through the CRT controller registers.

use crate::utils::io::{PortIo, Ports};
use core::fmt;
use core::ptr;
use lazy_static::lazy_static;
use spin::Mutex;

const VGA_BUFFER_ADDRESS: usize = 0xb8000;
pub const VGA_COLUMNS: usize = 80;
pub const VGA_ROWS: usize = 25;

const VGA_CTRL_REGISTER: u16 = 0x3d4;
const VGA_DATA_REGISTER: u16 = 0x3d5;
const CURSOR_HIGH: u8 = 0x0e;
const CURSOR_LOW: u8 = 0x0f;

lazy_static! {
	/// Global writer instance for the VGA buffer.
	pub static ref WRITER: Mutex<Writer<Ports>> = Mutex::new(Writer::new(
		unsafe { &mut *(VGA_BUFFER_ADDRESS as *mut VgaBuffer) },
		Ports,
	));
}

#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ColorCode {
	Black = 0x0,
	Blue = 0x1,
	Green = 0x2,
	Cyan = 0x3,
	Red = 0x4,
	Magenta = 0x5,
	Brown = 0x6,
	LightGray = 0x7,
	DarkGray = 0x8,
	LightBlue = 0x9,
	LightGreen = 0xa,
	LightCyan = 0xb,
	LightRed = 0xc,
	Pink = 0xd,
	Yellow = 0xe,
	White = 0xf,
}

/// Attribute byte: background in the high nibble, foreground in the low one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Color(u8);

impl Color {
	pub const fn new(foreground: ColorCode, background: ColorCode) -> Color {
		Color(((background as u8) << 4) | (foreground as u8))
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct ScreenChar {
	pub ascii_character: u8,
	pub color: Color,
}

/// The VGA text buffer.
#[repr(transparent)]
pub struct VgaBuffer {
	chars: [[ScreenChar; VGA_COLUMNS]; VGA_ROWS],
}

impl VgaBuffer {
	pub const fn blank(color: Color) -> Self {
		Self {
			chars: [[ScreenChar {
				ascii_character: b' ',
				color,
			}; VGA_COLUMNS]; VGA_ROWS],
		}
	}

	pub fn read(&self, row: usize, column: usize) -> ScreenChar {
		unsafe { ptr::read_volatile(&self.chars[row][column]) }
	}

	fn write(&mut self, character: ScreenChar, row: usize, column: usize) {
		unsafe { ptr::write_volatile(&mut self.chars[row][column], character) }
	}
}

/// Writer for the VGA text buffer.
pub struct Writer<P: PortIo> {
	column_position: usize,
	row_position: usize,
	color: Color,
	buffer: &'static mut VgaBuffer,
	ports: P,
}

impl<P: PortIo> Writer<P> {
	pub fn new(buffer: &'static mut VgaBuffer, ports: P) -> Self {
		Self {
			column_position: 0,
			row_position: 0,
			color: Color::new(ColorCode::White, ColorCode::Black),
			buffer,
			ports,
		}
	}

	pub fn position(&self) -> (usize, usize) {
		(self.row_position, self.column_position)
	}

	pub fn buffer(&self) -> &VgaBuffer {
		&*self.buffer
	}

	pub fn write_byte(&mut self, byte: u8) {
		match byte {
			b'\n' => self.new_line(),
			b'\r' => self.column_position = 0,
			0x08 => self.backspace(),
			byte => {
				if self.column_position >= VGA_COLUMNS {
					self.new_line();
				}
				self.buffer.write(
					ScreenChar {
						ascii_character: byte,
						color: self.color,
					},
					self.row_position,
					self.column_position,
				);
				self.column_position += 1;
			}
		}
	}

	/// ASCII bytes, control characters included, are stored as they are and
	/// show their code page 437 glyph. Bytes of multi-byte UTF-8 sequences
	/// become `0xfe`.
	pub fn write_string(&mut self, s: &str) {
		for byte in s.bytes() {
			match byte {
				0x00..=0x7f => self.write_byte(byte),
				_ => self.write_byte(0xfe),
			}
		}
		self.update_cursor();
	}

	pub fn clear_screen(&mut self) {
		for row in 0..VGA_ROWS {
			self.clear_row(row);
		}
		self.row_position = 0;
		self.column_position = 0;
		self.update_cursor();
	}

	fn backspace(&mut self) {
		if self.column_position == 0 {
			if self.row_position == 0 {
				return;
			}
			self.row_position -= 1;
			self.column_position = VGA_COLUMNS;
		}
		self.column_position -= 1;
		let blank = ScreenChar {
			ascii_character: b' ',
			color: self.color,
		};
		self.buffer.write(blank, self.row_position, self.column_position);
	}

	fn new_line(&mut self) {
		self.column_position = 0;
		if self.row_position < VGA_ROWS - 1 {
			self.row_position += 1;
			return;
		}
		for row in 1..VGA_ROWS {
			for column in 0..VGA_COLUMNS {
				let character = self.buffer.read(row, column);
				self.buffer.write(character, row - 1, column);
			}
		}
		self.clear_row(VGA_ROWS - 1);
	}

	fn clear_row(&mut self, row: usize) {
		let blank = ScreenChar {
			ascii_character: b' ',
			color: self.color,
		};
		for column in 0..VGA_COLUMNS {
			self.buffer.write(blank, row, column);
		}
	}

	fn update_cursor(&mut self) {
		let position = (self.row_position * VGA_COLUMNS + self.column_position.min(VGA_COLUMNS - 1)) as u16;
		self.ports.write_byte(VGA_CTRL_REGISTER, CURSOR_HIGH);
		self.ports.write_byte(VGA_DATA_REGISTER, (position >> 8) as u8);
		self.ports.write_byte(VGA_CTRL_REGISTER, CURSOR_LOW);
		self.ports.write_byte(VGA_DATA_REGISTER, (position & 0xff) as u8);
	}
}

impl<P: PortIo> fmt::Write for Writer<P> {
	fn write_str(&mut self, s: &str) -> fmt::Result {
		self.write_string(s);
		Ok(())
	}
}

pub fn clear_screen() {
	crate::exceptions::interrupts::without_interrupts(|| WRITER.lock().clear_screen());
}
