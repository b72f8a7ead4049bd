//! # Interrupt Descriptor Table (IDT)
//!
//! Builds the 256-entry gate table the CPU consults on every interrupt and
//! exception, and the register image handed to `lidt`.
//!
//! ## Overview
//!
//! Each gate is eight bytes laid out by the architecture: the low half of
//! the handler address, the code segment selector, a reserved zero byte,
//! the attribute byte and the high half of the handler address. Only the
//! first 48 vectors (CPU exceptions and the remapped PIC lines) are filled
//! in; every other gate stays zeroed, so the processor raises a general
//! protection fault if one of them is ever hit.

use crate::errors::InterruptError;
use bitflags::bitflags;

/// Number of gates in the table.
pub const IDT_ENTRIES: usize = 256;

/// Vectors `0..POPULATED_VECTORS` get a trampoline at boot.
pub const POPULATED_VECTORS: usize = 48;

/// Kernel code segment selector (second GDT entry).
pub const KERNEL_CODE_SELECTOR: u16 = 0x08;

bitflags! {
	/// Attribute byte of a gate descriptor.
	///
	/// See Intel 3a, Section 6.11 "IDT Descriptors".
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub struct GateAttributes: u8 {
		/// Set if the gate is in use.
		const PRESENT = 1 << 7;
		/// Lowest privilege level allowed to trigger the gate with `int`.
		const DPL_RING_3 = 0b11 << 5;
		/// 32-bit interrupt gate. Clears IF on entry.
		const INTERRUPT_GATE_32 = 0x0e;
		/// 32-bit trap gate. Leaves IF untouched.
		const TRAP_GATE_32 = 0x0f;
	}
}

impl GateAttributes {
	/// Present, ring 0, 32-bit interrupt gate (`0x8e`).
	pub const KERNEL_INTERRUPT: Self =
		Self::PRESENT.union(Self::INTERRUPT_GATE_32);
}

/// One gate of the IDT.
#[derive(Debug, Clone, Copy, Default)]
#[repr(C, packed)]
pub struct IdtDescriptor {
	offset_low: u16,
	selector: u16,
	reserved: u8,
	type_attributes: u8,
	offset_high: u16,
}

impl IdtDescriptor {
	/// An unused gate.
	pub const MISSING: Self = Self {
		offset_low: 0,
		selector: 0,
		reserved: 0,
		type_attributes: 0,
		offset_high: 0,
	};

	pub const fn new(handler: u32, selector: u16, attributes: GateAttributes) -> Self {
		Self {
			offset_low: (handler & 0xffff) as u16,
			selector,
			reserved: 0,
			type_attributes: attributes.bits(),
			offset_high: ((handler >> 16) & 0xffff) as u16,
		}
	}

	/// Handler address reassembled from both halves.
	pub fn handler_address(&self) -> u32 {
		let low = self.offset_low;
		let high = self.offset_high;
		(u32::from(high) << 16) | u32::from(low)
	}

	pub fn selector(&self) -> u16 {
		self.selector
	}

	pub fn attributes(&self) -> GateAttributes {
		GateAttributes::from_bits_retain(self.type_attributes)
	}

	pub fn is_present(&self) -> bool {
		self.attributes().contains(GateAttributes::PRESENT)
	}
}

/// Operand of the `lidt` instruction.
#[derive(Debug, Clone, Copy)]
#[repr(C, packed)]
pub struct IdtRegister {
	limit: u16,
	base: u32,
}

impl IdtRegister {
	pub fn limit(&self) -> u16 {
		self.limit
	}

	pub fn base(&self) -> u32 {
		self.base
	}
}

/// The gate table together with the record of which vectors were set.
#[repr(C, align(16))]
pub struct InterruptDescriptorTable {
	entries: [IdtDescriptor; IDT_ENTRIES],
	installed: [bool; IDT_ENTRIES],
}

impl InterruptDescriptorTable {
	pub const fn new() -> Self {
		Self {
			entries: [IdtDescriptor::MISSING; IDT_ENTRIES],
			installed: [false; IDT_ENTRIES],
		}
	}

	/// Writes the whole gate for `vector`, replacing whatever was there.
	pub fn set_descriptor(
		&mut self,
		vector: usize,
		handler: u32,
		attributes: GateAttributes,
	) -> Result<(), InterruptError> {
		let entry = self
			.entries
			.get_mut(vector)
			.ok_or(InterruptError::VectorOutOfRange(vector))?;
		*entry = IdtDescriptor::new(handler, KERNEL_CODE_SELECTOR, attributes);
		self.installed[vector] = true;
		Ok(())
	}

	/// Installs `handlers[v]` as a kernel interrupt gate for every vector `v`
	/// in `0..POPULATED_VECTORS`.
	pub fn populate(&mut self, handlers: &[u32; POPULATED_VECTORS]) -> Result<(), InterruptError> {
		for (vector, &handler) in handlers.iter().enumerate() {
			self.set_descriptor(vector, handler, GateAttributes::KERNEL_INTERRUPT)?;
		}
		Ok(())
	}

	pub fn descriptor(&self, vector: usize) -> Option<&IdtDescriptor> {
		self.entries.get(vector)
	}

	pub fn is_installed(&self, vector: usize) -> bool {
		self.installed.get(vector).copied().unwrap_or(false)
	}

	pub fn installed_count(&self) -> usize {
		self.installed.iter().filter(|&&set| set).count()
	}

	/// Register image describing this table: base address and size in bytes
	/// minus one.
	pub fn register(&self) -> IdtRegister {
		IdtRegister {
			limit: (core::mem::size_of::<[IdtDescriptor; IDT_ENTRIES]>() - 1) as u16,
			base: self.entries.as_ptr() as usize as u32,
		}
	}
}

impl Default for InterruptDescriptorTable {
	fn default() -> Self {
		Self::new()
	}
}
