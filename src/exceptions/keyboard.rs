//! # PS/2 keyboard
//!
//! Turns the scan code waiting in the keyboard controller into a character.
//! Only make codes of scan code set 1 are decoded, without any modifier
//! state: every key produces its unshifted character.
//!
//! The `0xe0` prefix of extended keys is dropped, and the byte after it is
//! decoded on the next interrupt as if it were an ordinary key. Keypad `/`
//! therefore prints `/`, and the arrow keys print keypad digits.

use crate::exceptions::pic8259::{ChainedPics, IrqLine};
use crate::utils::debug::LogLevel;
use crate::utils::io::PortIo;
use core::fmt::Write;

const KEYBOARD_DATA: u16 = 0x60;
const KEYBOARD_STATUS: u16 = 0x64;

/// Status bit set while the controller holds a byte for us.
const OUTPUT_BUFFER_FULL: u8 = 0x01;

const ESCAPE_PREFIX: u8 = 0xe0;
const RELEASE_BIT: u8 = 0x80;

/// Upper bound on stale bytes discarded before the line is unmasked.
const MAX_STALE_BYTES: usize = 16;

/// Scan code set 1 make codes to characters, 0 when nothing is printed.
#[rustfmt::skip]
static SCANCODE_SET1: [u8; 128] = [
	0,    0x1b, b'1', b'2', b'3', b'4', b'5', b'6',  // 0x00
	b'7', b'8', b'9', b'0', b'-', b'=', 0x08, b'\t', // 0x08
	b'q', b'w', b'e', b'r', b't', b'y', b'u', b'i',  // 0x10
	b'o', b'p', b'[', b']', b'\n', 0,   b'a', b's',  // 0x18
	b'd', b'f', b'g', b'h', b'j', b'k', b'l', b';',  // 0x20
	b'\'', b'`', 0,   b'\\', b'z', b'x', b'c', b'v', // 0x28
	b'b', b'n', b'm', b',', b'.', b'/', 0,    b'*',  // 0x30
	0,    b' ', 0,    0,    0,    0,    0,    0,     // 0x38
	0,    0,    0,    0,    0,    0,    0,    b'7',  // 0x40
	b'8', b'9', b'-', b'4', b'5', b'6', b'+', b'1',  // 0x48
	b'2', b'3', b'0', b'.', 0,    0,    0,    0,     // 0x50
	0,    0,    0,    0,    0,    0,    0,    0,     // 0x58
	0,    0,    0,    0,    0,    0,    0,    0,     // 0x60
	0,    0,    0,    0,    0,    0,    0,    0,     // 0x68
	0,    0,    0,    0,    0,    0,    0,    0,     // 0x70
	0,    0,    0,    0,    0,    0,    0,    0,     // 0x78
];

/// What a single byte from the controller means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scancode {
	ExtendedPrefix,
	Release(u8),
	Make(u8),
}

impl From<u8> for Scancode {
	fn from(byte: u8) -> Self {
		if byte == ESCAPE_PREFIX {
			Scancode::ExtendedPrefix
		} else if byte & RELEASE_BIT != 0 {
			Scancode::Release(byte & !RELEASE_BIT)
		} else {
			Scancode::Make(byte)
		}
	}
}

/// Character printed for `scancode`, if any.
pub fn decode(scancode: u8) -> Option<char> {
	match Scancode::from(scancode) {
		Scancode::ExtendedPrefix | Scancode::Release(_) => None,
		Scancode::Make(code) => match SCANCODE_SET1[usize::from(code)] {
			0 => None,
			c => Some(char::from(c)),
		},
	}
}

/// Reads exactly one byte from the controller and forwards its character,
/// if it has one, to `console`.
pub fn handle_interrupt<P: PortIo, W: Write>(ports: &mut P, console: &mut W) -> Option<char> {
	let scancode = ports.read_byte(KEYBOARD_DATA);
	let c = decode(scancode)?;
	let _ = console.write_char(c);
	Some(c)
}

/// Discards anything left in the controller and unmasks the keyboard line.
///
/// A byte already sitting in the output buffer keeps IRQ 1 asserted without
/// a new edge, so it is drained first.
pub fn init<P: PortIo>(ports: &mut P, pics: &mut ChainedPics) {
	let mut discarded = 0;
	while discarded < MAX_STALE_BYTES
		&& ports.read_byte(KEYBOARD_STATUS) & OUTPUT_BUFFER_FULL != 0
	{
		ports.read_byte(KEYBOARD_DATA);
		discarded += 1;
	}
	pics.clear_mask(ports, IrqLine::Keyboard);
	log!(
		LogLevel::Info,
		"Keyboard enabled on IRQ {} ({} stale bytes dropped)",
		IrqLine::Keyboard.as_u8(),
		discarded
	);
}
