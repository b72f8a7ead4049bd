//! # Macros and Printing Utilities
//!
//! Printing to the VGA text buffer (`print!`, `println!`), logging to the
//! serial port (`log!`), and the generator for the interrupt trampolines.

use crate::exceptions::interrupts;
use crate::vga::video_graphics_array::WRITER;
use core::fmt;

/// Macro for printing formatted text to the VGA buffer.
#[macro_export]
macro_rules! print {
	($($arg:tt)*) => ($crate::macros::print(format_args!($($arg)*)));
}

/// Macro for printing formatted text with a newline to the VGA buffer.
#[macro_export]
macro_rules! println {
	() => ($crate::print!("\n"));
	($($arg:tt)*) => ($crate::print!("{}\n", format_args!($($arg)*)));
}

/// Macro for writing a leveled line to the serial log.
#[macro_export]
macro_rules! log {
	($level:expr, $($arg:tt)*) => {
		$crate::utils::debug::log($level, format_args!($($arg)*))
	};
}

/// Generates the entry stub for one vector.
///
/// The stub leaves the stack as `[vector, error_code, eip, cs, eflags]`,
/// pushing a zero error code when the CPU did not supply one, and jumps to
/// the shared tail which calls the dispatcher and returns with `iretd`.
#[cfg(target_arch = "x86")]
macro_rules! trampoline {
	($name:ident, $vector:literal) => {
		#[unsafe(naked)]
		extern "C" fn $name() {
			core::arch::naked_asm!(
				"push 0",
				"push {vector}",
				"jmp {common}",
				vector = const $vector,
				common = sym common_trampoline,
			);
		}
	};
	($name:ident, $vector:literal, error_code) => {
		#[unsafe(naked)]
		extern "C" fn $name() {
			core::arch::naked_asm!(
				"push {vector}",
				"jmp {common}",
				vector = const $vector,
				common = sym common_trampoline,
			);
		}
	};
}

/// Prints formatted text to the VGA buffer.
///
/// Interrupts stay off while the writer is held so the keyboard handler
/// never finds it locked.
pub fn print(args: fmt::Arguments) {
	use core::fmt::Write;
	interrupts::without_interrupts(|| {
		let _ = WRITER.lock().write_fmt(args);
	});
}
