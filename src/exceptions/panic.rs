use crate::utils::cpu::halt_forever;
use crate::utils::debug::LogLevel;
use core::fmt::Display;

/// Reports `info` on both the screen and the serial log, then stops the
/// machine.
pub fn handle_panic<D: Display>(info: &D) -> ! {
	crate::exceptions::interrupts::disable();
	log!(LogLevel::Panic, "{}", info);
	println!("\n{}", info);
	println!("See serial output for more information.");
	halt_forever()
}
