//! # CPU control
//!
//! Privileged instructions the interrupt subsystem depends on, behind the
//! [`Cpu`] trait so the subsystem can be driven without a real processor.

use crate::structures::idt::{IdtRegister, InterruptDescriptorTable};
use core::arch::asm;

/// Processor operations used while building and servicing the IDT.
pub trait Cpu {
	/// Point the IDT register at `table`.
	///
	/// The processor keeps using `table` in place after this returns, so it
	/// must never move or be freed while loaded.
	fn load_idt(&mut self, table: &InterruptDescriptorTable);

	/// Linear address that caused the last page fault.
	fn fault_address(&self) -> u32;
}

/// The processor the kernel runs on.
#[derive(Debug, Default, Clone, Copy)]
pub struct X86Cpu;

impl Cpu for X86Cpu {
	fn load_idt(&mut self, table: &InterruptDescriptorTable) {
		let register: IdtRegister = table.register();
		unsafe {
			asm!("lidt [{}]", in(reg) &register, options(readonly, nostack, preserves_flags));
		}
	}

	fn fault_address(&self) -> u32 {
		let cr2: usize;
		unsafe {
			asm!("mov {}, cr2", out(reg) cr2, options(nomem, nostack, preserves_flags));
		}
		cr2 as u32
	}
}

/// Halts the CPU until the next external interrupt.
#[inline]
pub fn hlt() {
	unsafe {
		asm!("hlt", options(nomem, nostack, preserves_flags));
	}
}

/// Stops the machine for good.
pub fn halt_forever() -> ! {
	loop {
		unsafe {
			asm!("cli", "hlt", options(nomem, nostack));
		}
	}
}
