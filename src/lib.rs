//! Liburn kernel: interrupt handling for 32-bit x86.
//!
//! The boot stub calls [`kmain`] in protected mode with a flat GDT whose
//! kernel code selector is `0x08`. From there the kernel brings up the
//! serial log and the VGA console, remaps the PICs, loads the IDT and echoes
//! keystrokes until a CPU exception halts the machine.

#![cfg_attr(not(test), no_std)]

#[macro_use]
pub mod macros;

pub mod errors;
pub mod exceptions;
pub mod structures;
pub mod utils;
pub mod vga;

#[cfg(test)]
mod testing;

#[cfg(not(test))]
use core::panic::PanicInfo;

#[cfg(target_arch = "x86")]
#[no_mangle]
pub extern "C" fn kmain() -> ! {
	use crate::utils::cpu::{halt_forever, hlt};
	use crate::utils::debug::{init_serial_port, LogLevel};

	const VERSION: u32 = 1;
	const REVISION: u32 = 0;

	init_serial_port();
	vga::video_graphics_array::clear_screen();
	println!("Hello Welcome to LiburnOS revision {}.{}", VERSION, REVISION);

	if let Err(error) = exceptions::interrupts::init() {
		log!(LogLevel::Critical, "Interrupt setup failed: {}", error);
		println!("Interrupt setup failed: {}", error);
		halt_forever();
	}
	println!("PIC remapped. IDT initialized. Interrupts enabled.");

	loop {
		hlt();
	}
}

#[cfg(not(test))]
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
	exceptions::panic::handle_panic(info)
}
