//! # Interrupt dispatch
//!
//! Every vector the trampolines receive is classified exactly once into an
//! [`InterruptKind`]: CPU exceptions and stray vectors are fatal, PIC lines
//! are acknowledged, and the keyboard line additionally goes through the
//! scan code decoder.

use crate::exceptions::pic8259::{IrqLine, PIC_1_OFFSET};
use core::fmt::{self, Write};

/// Vector the CPU raises on a page fault.
pub const PAGE_FAULT_VECTOR: u32 = 14;

/// Number of PIC lines mapped above [`PIC_1_OFFSET`].
const IRQ_LINES: u32 = 16;

/// Diagnostic names of the CPU exceptions, indexed by vector.
pub static EXCEPTION_NAMES: [&str; 32] = [
	"Division By Zero",
	"Debug",
	"Non Maskable Interrupt",
	"Breakpoint",
	"Overflow",
	"Bound Range Exceeded",
	"Invalid Opcode",
	"Device Not Available",
	"Double Fault",
	"Coprocessor Segment Overrun",
	"Invalid TSS",
	"Segment Not Present",
	"Stack-Segment Fault",
	"General Protection Fault",
	"Page Fault",
	"Reserved",
	"x87 Floating-Point Exception",
	"Alignment Check",
	"Machine Check",
	"SIMD Floating-Point Exception",
	"Virtualization Exception",
	"Reserved",
	"Reserved",
	"Reserved",
	"Reserved",
	"Reserved",
	"Reserved",
	"Reserved",
	"Reserved",
	"Reserved",
	"Security Exception",
	"Reserved",
];

/// Name of exception `vector`, or `None` past the end of the table.
pub fn exception_name(vector: u32) -> Option<&'static str> {
	usize::try_from(vector)
		.ok()
		.and_then(|index| EXCEPTION_NAMES.get(index))
		.copied()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptKind {
	/// Anything that is not a PIC line.
	CpuFault(u32),
	KeyboardIrq,
	OtherIrq(IrqLine),
}

impl InterruptKind {
	pub fn classify(vector: u32) -> Self {
		let line = vector
			.checked_sub(u32::from(PIC_1_OFFSET))
			.filter(|&line| line < IRQ_LINES)
			.and_then(|line| IrqLine::try_from(line as u8).ok());

		match line {
			Some(IrqLine::Keyboard) => InterruptKind::KeyboardIrq,
			Some(line) => InterruptKind::OtherIrq(line),
			None => InterruptKind::CpuFault(vector),
		}
	}

	/// Whether servicing this kind ends with the machine halted.
	pub fn is_fatal(self) -> bool {
		matches!(self, InterruptKind::CpuFault(_))
	}
}

/// Result of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
	/// The interrupt was serviced; return to the interrupted code.
	Handled,
	/// A fatal fault was reported; the machine must never resume.
	Halted,
}

/// Everything printed about a fatal fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultReport {
	pub vector: u32,
	pub error_code: u32,
	/// CR2, present for page faults only.
	pub fault_address: Option<u32>,
}

impl fmt::Display for FaultReport {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = exception_name(self.vector).unwrap_or("Unknown Interrupt");
		write!(f, "\n\n=== KERNEL PANIC ===\n")?;
		write!(f, "Exception: {} (#{})\n", name, self.vector)?;
		write!(f, "Error Code: {:#x}\n", self.error_code)?;
		if let Some(address) = self.fault_address {
			write!(f, "Faulting Address (CR2): {:#x}\n", address)?;
		}
		write!(f, "\nSystem Halted.\n")
	}
}

/// Renders `report` on `console`.
pub fn render_fault<W: Write>(console: &mut W, report: &FaultReport) -> fmt::Result {
	write!(console, "{}", report)
}
