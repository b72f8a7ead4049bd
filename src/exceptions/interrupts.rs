//! # Interrupt subsystem
//!
//! [`InterruptSubsystem`] owns everything interrupt handling touches: the
//! port bus, the processor, the PIC pair and the descriptor table. The kernel
//! keeps one of them in [`INTERRUPTS`]; the trampolines reach it there and
//! hand every vector to [`InterruptSubsystem::dispatch`].
//!
//! ## Reentrancy
//!
//! Every vector is installed as an interrupt gate, so the CPU clears IF on
//! entry and dispatch always runs with interrupts off; nothing in here turns
//! them back on. Code outside an interrupt that locks [`INTERRUPTS`] or the
//! VGA writer does so inside [`without_interrupts`].

use crate::errors::InterruptError;
use crate::exceptions::dispatch::{
	render_fault, DispatchOutcome, FaultReport, InterruptKind, PAGE_FAULT_VECTOR,
};
use crate::exceptions::keyboard;
use crate::exceptions::pic8259::{ChainedPics, IrqLine};
use crate::structures::idt::{GateAttributes, InterruptDescriptorTable, POPULATED_VECTORS};
use crate::utils::cpu::{Cpu, X86Cpu};
use crate::utils::debug::LogLevel;
use crate::utils::io::{PortIo, Ports};
use core::arch::asm;
use core::fmt::Write;
use lazy_static::lazy_static;
use spin::{Mutex, MutexGuard};

/// Interrupt flag in EFLAGS.
const EFLAGS_IF: usize = 1 << 9;

/// Backing storage of the loaded table. Only [`INTERRUPTS`] borrows it.
static mut IDT: InterruptDescriptorTable = InterruptDescriptorTable::new();

lazy_static! {
	/// The machine's interrupt subsystem.
	pub static ref INTERRUPTS: Mutex<InterruptSubsystem<Ports, X86Cpu>> = Mutex::new(
		InterruptSubsystem::new(Ports, X86Cpu, unsafe { &mut *core::ptr::addr_of_mut!(IDT) })
	);
}

/// Lifecycle of the subsystem. `Halted` has no way out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
	/// Built, descriptor table not loaded yet.
	Booting,
	/// Descriptor table loaded.
	Running,
	/// A fatal fault was reported.
	Halted,
}

/// The table is borrowed from static storage: once loaded the CPU reads it in
/// place, so it has to stay put wherever the subsystem itself is moved.
pub struct InterruptSubsystem<P: PortIo, C: Cpu> {
	ports: P,
	cpu: C,
	pics: ChainedPics,
	idt: &'static mut InterruptDescriptorTable,
	remapped: bool,
	state: State,
}

impl<P: PortIo, C: Cpu> InterruptSubsystem<P, C> {
	pub fn new(ports: P, cpu: C, idt: &'static mut InterruptDescriptorTable) -> Self {
		Self {
			ports,
			cpu,
			pics: ChainedPics::new(),
			idt,
			remapped: false,
			state: State::Booting,
		}
	}

	pub fn state(&self) -> State {
		self.state
	}

	pub fn idt(&self) -> &InterruptDescriptorTable {
		&*self.idt
	}

	pub fn ports(&self) -> &P {
		&self.ports
	}

	pub fn ports_mut(&mut self) -> &mut P {
		&mut self.ports
	}

	pub fn cpu(&self) -> &C {
		&self.cpu
	}

	/// Moves the PIC lines to `offset1` and `offset2`. Must run before
	/// [`init`](Self::init).
	pub fn remap(&mut self, offset1: u8, offset2: u8) -> Result<(), InterruptError> {
		self.pics.remap(&mut self.ports, offset1, offset2)?;
		self.remapped = true;
		log!(
			LogLevel::Info,
			"PIC remapped to {:#04x}/{:#04x}",
			offset1,
			offset2
		);
		Ok(())
	}

	pub fn set_mask(&mut self, line: IrqLine) {
		self.pics.set_mask(&mut self.ports, line);
	}

	pub fn clear_mask(&mut self, line: IrqLine) {
		self.pics.clear_mask(&mut self.ports, line);
	}

	pub fn send_eoi(&mut self, line: IrqLine) {
		self.pics.send_eoi(&mut self.ports, line);
	}

	pub fn read_request_register(&mut self) -> u16 {
		self.pics.read_request_register(&mut self.ports)
	}

	pub fn read_service_register(&mut self) -> u16 {
		self.pics.read_service_register(&mut self.ports)
	}

	/// Masks every PIC line.
	pub fn disable_pics(&mut self) {
		self.pics.disable(&mut self.ports);
	}

	/// Rewrites one gate. Allowed after the table is loaded.
	pub fn set_descriptor(
		&mut self,
		vector: usize,
		handler: u32,
		attributes: GateAttributes,
	) -> Result<(), InterruptError> {
		self.idt.set_descriptor(vector, handler, attributes)
	}

	/// Installs `trampolines` on vectors 0-47 and loads the table.
	///
	/// The table is loaded once; the caller enables interrupts after this
	/// returns and the subsystem lock is released.
	pub fn init(&mut self, trampolines: &[u32; POPULATED_VECTORS]) -> Result<(), InterruptError> {
		if !self.remapped {
			return Err(InterruptError::PicsNotRemapped);
		}
		if self.state != State::Booting {
			return Err(InterruptError::AlreadyLoaded);
		}

		self.idt.populate(trampolines)?;
		self.cpu.load_idt(&*self.idt);
		self.state = State::Running;

		log!(
			LogLevel::Info,
			"IDT loaded at {:#010x} with {} gates",
			self.idt.register().base(),
			self.idt.installed_count()
		);
		Ok(())
	}

	/// Drains the keyboard controller and unmasks IRQ 1.
	pub fn enable_keyboard(&mut self) {
		keyboard::init(&mut self.ports, &mut self.pics);
	}

	/// Services one interrupt.
	///
	/// Once a fault has been reported the subsystem stays halted: later calls
	/// neither print nor touch any port.
	pub fn dispatch<W: Write>(&mut self, error_code: u32, vector: u32, console: &mut W) -> DispatchOutcome {
		if self.state == State::Halted {
			return DispatchOutcome::Halted;
		}

		match InterruptKind::classify(vector) {
			InterruptKind::KeyboardIrq => {
				keyboard::handle_interrupt(&mut self.ports, console);
				self.pics.send_eoi(&mut self.ports, IrqLine::Keyboard);
				DispatchOutcome::Handled
			}
			InterruptKind::OtherIrq(line) => {
				self.pics.send_eoi(&mut self.ports, line);
				DispatchOutcome::Handled
			}
			InterruptKind::CpuFault(vector) => self.fault(error_code, vector, console),
		}
	}

	fn fault<W: Write>(&mut self, error_code: u32, vector: u32, console: &mut W) -> DispatchOutcome {
		let report = FaultReport {
			vector,
			error_code,
			fault_address: (vector == PAGE_FAULT_VECTOR).then(|| self.cpu.fault_address()),
		};
		log!(LogLevel::Panic, "{}", report);
		let _ = render_fault(console, &report);
		self.state = State::Halted;
		DispatchOutcome::Halted
	}
}

/// Brings interrupt handling up: remap the PICs, load the descriptor table
/// with the trampolines, unmask the keyboard, then enable interrupts.
#[cfg(target_arch = "x86")]
pub fn init() -> Result<(), InterruptError> {
	use crate::exceptions::pic8259::{PIC_1_OFFSET, PIC_2_OFFSET};
	use crate::exceptions::trampolines;

	{
		let mut subsystem = INTERRUPTS.lock();
		subsystem.remap(PIC_1_OFFSET, PIC_2_OFFSET)?;
		subsystem.init(&trampolines::addresses())?;
		subsystem.enable_keyboard();
	}
	enable();
	log!(LogLevel::Info, "Interrupts enabled");
	Ok(())
}

/// Locks `lock` on the fatal route.
///
/// A fault or NMI can land while the interrupted code holds the lock, and that
/// code never resumes, so a held lock is taken over instead of waited on.
pub fn seize<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
	if let Some(guard) = lock.try_lock() {
		return guard;
	}
	// SAFETY: the only holder is the interrupted context, which is halted.
	unsafe { lock.force_unlock() };
	lock.lock()
}

pub fn enable() {
	unsafe {
		asm!("sti", options(nostack));
	}
}

pub fn disable() {
	unsafe {
		asm!("cli", options(nostack));
	}
}

pub fn are_enabled() -> bool {
	let flags: usize;
	unsafe {
		asm!("pushf", "pop {}", out(reg) flags, options(nomem, preserves_flags));
	}
	flags & EFLAGS_IF != 0
}

/// Runs `f` with interrupts disabled, restoring the previous state after.
pub fn without_interrupts<F, R>(f: F) -> R
where
	F: FnOnce() -> R,
{
	let were_enabled = are_enabled();
	if were_enabled {
		disable();
	}
	let result = f();
	if were_enabled {
		enable();
	}
	result
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::exceptions::pic8259::{PIC_1_OFFSET, PIC_2_OFFSET};
	use crate::testing::{MockCpu, MockPorts, PortAccess};
	use std::boxed::Box;
	use std::string::String;

	const EOI: u8 = 0x20;

	fn table() -> &'static mut InterruptDescriptorTable {
		Box::leak(Box::new(InterruptDescriptorTable::new()))
	}

	fn stubs() -> [u32; POPULATED_VECTORS] {
		let mut stubs = [0; POPULATED_VECTORS];
		for (vector, stub) in stubs.iter_mut().enumerate() {
			*stub = 0x0010_1000 + vector as u32 * 0x10;
		}
		stubs
	}

	fn running(fault_address: u32) -> InterruptSubsystem<MockPorts, MockCpu> {
		let mut subsystem = InterruptSubsystem::new(
			MockPorts::new(),
			MockCpu::with_fault_address(fault_address),
			table(),
		);
		subsystem.remap(PIC_1_OFFSET, PIC_2_OFFSET).unwrap();
		subsystem.init(&stubs()).unwrap();
		subsystem.ports_mut().clear_log();
		subsystem
	}

	#[test]
	fn init_requires_remapped_pics() {
		let mut subsystem = InterruptSubsystem::new(MockPorts::new(), MockCpu::default(), table());
		assert_eq!(subsystem.init(&stubs()), Err(InterruptError::PicsNotRemapped));
		assert!(subsystem.cpu().loads.is_empty());
		assert_eq!(subsystem.state(), State::Booting);
	}

	#[test]
	fn init_populates_everything_before_loading_once() {
		let mut subsystem = running(0);

		assert_eq!(subsystem.state(), State::Running);
		assert_eq!(subsystem.cpu().installed_at_load, [POPULATED_VECTORS]);
		let register = subsystem.cpu().loads[0];
		assert_eq!(register.limit(), 2047);
		assert_eq!(register.base(), subsystem.idt().register().base());
		assert_eq!(subsystem.idt().descriptor(47).unwrap().handler_address(), 0x0010_12f0);

		assert_eq!(subsystem.init(&stubs()), Err(InterruptError::AlreadyLoaded));
		assert_eq!(subsystem.cpu().loads.len(), 1);
	}

	#[test]
	fn loaded_table_stays_put_when_the_subsystem_moves() {
		let subsystem = running(0);
		let loaded = subsystem.cpu().loads[0].base();

		let moved = Box::new(subsystem);
		assert_eq!(moved.idt().register().base(), loaded);
		assert_eq!(moved.idt().descriptor(0).unwrap().handler_address(), 0x0010_1000);
	}

	#[test]
	fn gates_can_be_rewritten_after_load() {
		let mut subsystem = running(0);
		subsystem
			.set_descriptor(3, 0xc000_1234, GateAttributes::KERNEL_INTERRUPT)
			.unwrap();

		assert_eq!(subsystem.idt().descriptor(3).unwrap().handler_address(), 0xc000_1234);
		assert_eq!(subsystem.cpu().loads.len(), 1);
	}

	#[test]
	fn diagnostic_registers_read_zero_after_remap() {
		let mut subsystem = InterruptSubsystem::new(MockPorts::new(), MockCpu::default(), table());
		subsystem.ports_mut().raise(IrqLine::Floppy);
		subsystem.remap(PIC_1_OFFSET, PIC_2_OFFSET).unwrap();

		assert_eq!(subsystem.read_request_register(), 0);
		assert_eq!(subsystem.read_service_register(), 0);
	}

	#[test]
	fn keyboard_vector_decodes_then_acknowledges_line_1() {
		let mut subsystem = running(0);
		let mut console = String::new();
		subsystem.ports_mut().push_scancode(0x1e);
		subsystem.ports_mut().deliver(IrqLine::Keyboard);

		assert_eq!(subsystem.dispatch(0, 33, &mut console), DispatchOutcome::Handled);

		assert_eq!(console, "a");
		assert_eq!(
			subsystem.ports().log(),
			[PortAccess::Read(0x60, 0x1e), PortAccess::Write(0x20, EOI)]
		);
		assert_eq!(subsystem.read_service_register(), 0);
	}

	#[test]
	fn keyboard_release_is_still_acknowledged() {
		let mut subsystem = running(0);
		let mut console = String::new();
		subsystem.ports_mut().push_scancode(0x9e);

		assert_eq!(subsystem.dispatch(0, 33, &mut console), DispatchOutcome::Handled);

		assert!(console.is_empty());
		assert_eq!(
			subsystem.ports().log(),
			[PortAccess::Read(0x60, 0x9e), PortAccess::Write(0x20, EOI)]
		);
	}

	#[test]
	fn other_pic_vectors_are_only_acknowledged() {
		for vector in (32..=47).filter(|&vector| vector != 33) {
			let mut subsystem = running(0);
			let mut console = String::new();
			subsystem.ports_mut().push_scancode(0x1e);

			assert_eq!(subsystem.dispatch(0, vector, &mut console), DispatchOutcome::Handled);

			let line = vector - 32;
			let expected: &[PortAccess] = if line >= 8 {
				&[PortAccess::Write(0xa0, EOI), PortAccess::Write(0x20, EOI)]
			} else {
				&[PortAccess::Write(0x20, EOI)]
			};
			assert_eq!(subsystem.ports().log(), expected, "vector {}", vector);
			assert_eq!(subsystem.ports().pending_scancodes(), 1);
			assert!(console.is_empty());
		}
	}

	#[test]
	fn page_fault_reports_and_halts_for_good() {
		let mut subsystem = running(0xdead_b000);
		let mut console = String::new();

		assert_eq!(subsystem.dispatch(0x6, 14, &mut console), DispatchOutcome::Halted);

		assert!(console.contains("Page Fault (#14)"));
		assert!(console.contains("Error Code: 0x6"));
		assert!(console.contains("Faulting Address (CR2): 0xdeadb000"));
		assert_eq!(subsystem.state(), State::Halted);
		assert!(subsystem.ports().log().is_empty());

		let printed = console.len();
		subsystem.ports_mut().push_scancode(0x1e);
		for vector in [33, 40, 14, 0] {
			assert_eq!(subsystem.dispatch(0, vector, &mut console), DispatchOutcome::Halted);
		}
		assert_eq!(console.len(), printed);
		assert!(subsystem.ports().log().is_empty());
		assert_eq!(subsystem.state(), State::Halted);
	}

	#[test]
	fn other_exceptions_do_not_read_cr2() {
		let mut subsystem = running(0xdead_b000);
		let mut console = String::new();

		assert_eq!(subsystem.dispatch(0x18, 13, &mut console), DispatchOutcome::Halted);

		assert!(console.contains("General Protection Fault (#13)"));
		assert!(console.contains("Error Code: 0x18"));
		assert!(!console.contains("CR2"));
	}

	#[test]
	fn stray_vectors_are_fatal_without_a_name() {
		let mut subsystem = running(0);
		let mut console = String::new();

		assert_eq!(subsystem.dispatch(0, 0x80, &mut console), DispatchOutcome::Halted);

		assert!(console.contains("Unknown Interrupt (#128)"));
		assert_eq!(subsystem.state(), State::Halted);
	}

	#[test]
	fn fatal_route_takes_over_a_console_held_by_the_interrupted_code() {
		let mut subsystem = running(0);
		let console = Mutex::new(String::new());
		core::mem::forget(console.lock());
		assert!(console.is_locked());

		let mut writer = seize(&console);
		assert_eq!(subsystem.dispatch(0, 2, &mut *writer), DispatchOutcome::Halted);

		assert!(writer.contains("Exception: Non Maskable Interrupt (#2)"));
		assert!(writer.ends_with("System Halted.\n"));
	}

	#[test]
	fn seize_on_a_free_lock_just_locks_it() {
		let lock = Mutex::new(7);
		{
			let mut guard = seize(&lock);
			*guard += 1;
			assert!(lock.is_locked());
		}
		assert!(!lock.is_locked());
		assert_eq!(*lock.lock(), 8);
	}

	#[test]
	fn mask_round_trip_through_the_subsystem() {
		let mut subsystem = running(0);
		subsystem.set_mask(IrqLine::Timer);
		assert_eq!(subsystem.ports().pic(0).mask(), 0x01);
		subsystem.clear_mask(IrqLine::Timer);
		assert_eq!(subsystem.ports().pic(0).mask(), 0x00);

		subsystem.disable_pics();
		assert_eq!(subsystem.ports().pic(0).mask(), 0xff);
		assert_eq!(subsystem.ports().pic(1).mask(), 0xff);
	}

	#[test]
	fn enabling_the_keyboard_unmasks_line_1() {
		let mut subsystem = running(0);
		subsystem.set_mask(IrqLine::Keyboard);
		subsystem.enable_keyboard();
		assert_eq!(subsystem.ports().pic(0).mask() & 0x02, 0);
	}
}
