//! # Interrupt trampolines
//!
//! One naked entry stub per populated vector. A stub only records which
//! vector fired, normalizes the error code, and hands both to
//! [`interrupt_dispatch`]; every decision is made there.

use crate::exceptions::dispatch::{DispatchOutcome, InterruptKind};
use crate::exceptions::interrupts::{seize, INTERRUPTS};
use crate::structures::idt::POPULATED_VECTORS;
use crate::utils::cpu::halt_forever;
use crate::utils::debug::DEBUG;
use crate::vga::video_graphics_array::WRITER;

/// Shared tail of every stub.
///
/// Stack on entry: `vector`, `error_code`, then the CPU frame.
#[unsafe(naked)]
extern "C" fn common_trampoline() {
	core::arch::naked_asm!(
		"pushad",
		"cld",
		"mov eax, [esp + 32]",
		"mov edx, [esp + 36]",
		"push eax",
		"push edx",
		"call {dispatch}",
		"add esp, 8",
		"popad",
		"add esp, 8",
		"iretd",
		dispatch = sym interrupt_dispatch,
	);
}

/// Called by the trampolines with interrupts disabled by the gate.
///
/// Faults and NMIs can arrive while the interrupted code holds the console,
/// the log or the subsystem itself; they seize those locks instead of
/// spinning on them.
extern "C" fn interrupt_dispatch(error_code: u32, vector: u32) {
	let outcome = if InterruptKind::classify(vector).is_fatal() {
		drop(seize(&*DEBUG));
		let mut writer = seize(&*WRITER);
		seize(&*INTERRUPTS).dispatch(error_code, vector, &mut *writer)
	} else {
		let mut writer = WRITER.lock();
		INTERRUPTS.lock().dispatch(error_code, vector, &mut *writer)
	};
	if outcome == DispatchOutcome::Halted {
		halt_forever();
	}
}

trampoline!(isr0, 0);
trampoline!(isr1, 1);
trampoline!(isr2, 2);
trampoline!(isr3, 3);
trampoline!(isr4, 4);
trampoline!(isr5, 5);
trampoline!(isr6, 6);
trampoline!(isr7, 7);
trampoline!(isr8, 8, error_code);
trampoline!(isr9, 9);
trampoline!(isr10, 10, error_code);
trampoline!(isr11, 11, error_code);
trampoline!(isr12, 12, error_code);
trampoline!(isr13, 13, error_code);
trampoline!(isr14, 14, error_code);
trampoline!(isr15, 15);
trampoline!(isr16, 16);
trampoline!(isr17, 17, error_code);
trampoline!(isr18, 18);
trampoline!(isr19, 19);
trampoline!(isr20, 20);
trampoline!(isr21, 21, error_code);
trampoline!(isr22, 22);
trampoline!(isr23, 23);
trampoline!(isr24, 24);
trampoline!(isr25, 25);
trampoline!(isr26, 26);
trampoline!(isr27, 27);
trampoline!(isr28, 28);
trampoline!(isr29, 29, error_code);
trampoline!(isr30, 30, error_code);
trampoline!(isr31, 31);
trampoline!(irq0, 32);
trampoline!(irq1, 33);
trampoline!(irq2, 34);
trampoline!(irq3, 35);
trampoline!(irq4, 36);
trampoline!(irq5, 37);
trampoline!(irq6, 38);
trampoline!(irq7, 39);
trampoline!(irq8, 40);
trampoline!(irq9, 41);
trampoline!(irq10, 42);
trampoline!(irq11, 43);
trampoline!(irq12, 44);
trampoline!(irq13, 45);
trampoline!(irq14, 46);
trampoline!(irq15, 47);

/// Entry stubs indexed by vector.
static TRAMPOLINES: [extern "C" fn(); POPULATED_VECTORS] = [
	isr0, isr1, isr2, isr3, isr4, isr5, isr6, isr7, isr8, isr9, isr10, isr11, isr12, isr13,
	isr14, isr15, isr16, isr17, isr18, isr19, isr20, isr21, isr22, isr23, isr24, isr25, isr26,
	isr27, isr28, isr29, isr30, isr31, irq0, irq1, irq2, irq3, irq4, irq5, irq6, irq7, irq8,
	irq9, irq10, irq11, irq12, irq13, irq14, irq15,
];

/// Linear addresses of the stubs, ready for the descriptor table.
pub fn addresses() -> [u32; POPULATED_VECTORS] {
	TRAMPOLINES.map(|stub| stub as usize as u32)
}
