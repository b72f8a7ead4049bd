//! # Programmable Interrupt Controller (PIC)
//!
//! Driver for the pair of cascaded 8259 controllers that multiplex the 16
//! legacy IRQ lines onto CPU vectors.
//!
//! ## Overview
//!
//! The secondary controller is wired to line 2 of the primary one. Out of
//! reset both controllers deliver their lines on vectors 0-15, right on top
//! of the CPU exceptions, so the pair is reinitialized with [`ChainedPics::remap`]
//! before the descriptor table is loaded. Every delivered IRQ must then be
//! acknowledged with an end-of-interrupt command, secondary first when the
//! line belongs to it, or the controller stops delivering that line.

use crate::errors::InterruptError;
use crate::utils::io::PortIo;
use bitflags::bitflags;

/// Vector of IRQ 0 on the primary controller.
pub const PIC_1_OFFSET: u8 = 32;
/// Vector of IRQ 8 on the secondary controller.
pub const PIC_2_OFFSET: u8 = PIC_1_OFFSET + 8;

const PIC1_COMMAND: u16 = 0x20;
const PIC1_DATA: u16 = 0x21;
const PIC2_COMMAND: u16 = 0xa0;
const PIC2_DATA: u16 = 0xa1;

const CMD_END_OF_INTERRUPT: u8 = 0x20;

/// Primary line the secondary controller is chained to.
const CASCADE_LINE: u8 = 2;

/// First vector not reserved for CPU exceptions.
const FIRST_FREE_VECTOR: u8 = 32;

bitflags! {
	/// Initialization command word 1.
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	struct Icw1: u8 {
		const ICW4 = 0x01;
		const INIT = 0x10;
	}

	/// Initialization command word 4.
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	struct Icw4: u8 {
		const MODE_8086 = 0x01;
	}

	/// Operation command word 3, register selection only.
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	struct Ocw3: u8 {
		const READ_REGISTER = 0x02;
		const SELECT_ISR = 0x01;
		const FIXED = 0x08;
	}
}

impl Ocw3 {
	const READ_IRR: Self = Self::FIXED.union(Self::READ_REGISTER);
	const READ_ISR: Self = Self::READ_IRR.union(Self::SELECT_ISR);
}

/// The 16 legacy IRQ lines, numbered as the PIC pair sees them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IrqLine {
	Timer,
	Keyboard,
	Cascade,
	Com2,
	Com1,
	Lpt2,
	Floppy,
	Lpt1,
	Rtc,
	Free1,
	Free2,
	Free3,
	Ps2Mouse,
	Fpu,
	PrimaryAtaHardDisk,
	SecondaryAtaHardDisk,
}

impl IrqLine {
	const ALL: [IrqLine; 16] = [
		IrqLine::Timer,
		IrqLine::Keyboard,
		IrqLine::Cascade,
		IrqLine::Com2,
		IrqLine::Com1,
		IrqLine::Lpt2,
		IrqLine::Floppy,
		IrqLine::Lpt1,
		IrqLine::Rtc,
		IrqLine::Free1,
		IrqLine::Free2,
		IrqLine::Free3,
		IrqLine::Ps2Mouse,
		IrqLine::Fpu,
		IrqLine::PrimaryAtaHardDisk,
		IrqLine::SecondaryAtaHardDisk,
	];

	pub fn as_u8(self) -> u8 {
		self as u8
	}

	/// Vector this line is delivered on once the PICs are remapped.
	pub fn vector(self) -> u8 {
		PIC_1_OFFSET + self.as_u8()
	}

	fn on_secondary(self) -> bool {
		self.as_u8() >= 8
	}

	/// Bit of this line inside its controller's registers.
	fn bit(self) -> u8 {
		1 << (self.as_u8() & 7)
	}
}

impl TryFrom<u8> for IrqLine {
	type Error = InterruptError;

	fn try_from(line: u8) -> Result<Self, Self::Error> {
		IrqLine::ALL
			.get(usize::from(line))
			.copied()
			.ok_or(InterruptError::InvalidIrqLine(line))
	}
}

struct Pic {
	offset: u8,
	command: u16,
	data: u16,
}

impl Pic {
	fn end_of_interrupt<P: PortIo>(&self, ports: &mut P) {
		ports.write_byte(self.command, CMD_END_OF_INTERRUPT);
	}

	fn read_mask<P: PortIo>(&self, ports: &mut P) -> u8 {
		ports.read_byte(self.data)
	}

	fn write_mask<P: PortIo>(&self, ports: &mut P, mask: u8) {
		ports.write_byte(self.data, mask);
	}
}

/// Represents a pair of chained PICs.
pub struct ChainedPics {
	pics: [Pic; 2],
}

impl ChainedPics {
	pub const fn new() -> ChainedPics {
		ChainedPics {
			pics: [
				Pic {
					offset: 0x08,
					command: PIC1_COMMAND,
					data: PIC1_DATA,
				},
				Pic {
					offset: 0x70,
					command: PIC2_COMMAND,
					data: PIC2_DATA,
				},
			],
		}
	}

	/// Vector offsets currently programmed into the primary and secondary
	/// controllers.
	pub fn offsets(&self) -> (u8, u8) {
		(self.pics[0].offset, self.pics[1].offset)
	}

	/// Reinitializes both controllers in cascade mode, moves their lines to
	/// `offset1..offset1 + 8` and `offset2..offset2 + 8`, and unmasks every
	/// line.
	pub fn remap<P: PortIo>(
		&mut self,
		ports: &mut P,
		offset1: u8,
		offset2: u8,
	) -> Result<(), InterruptError> {
		for offset in [offset1, offset2] {
			if offset % 8 != 0 {
				return Err(InterruptError::MisalignedOffset(offset));
			}
			if offset < FIRST_FREE_VECTOR {
				return Err(InterruptError::OffsetOverlapsExceptions(offset));
			}
		}
		if offset1 == offset2 {
			return Err(InterruptError::OverlappingOffsets(offset1, offset2));
		}

		let init = (Icw1::INIT | Icw1::ICW4).bits();
		let mode = Icw4::MODE_8086.bits();

		ports.write_byte(PIC1_COMMAND, init);
		ports.io_wait();
		ports.write_byte(PIC2_COMMAND, init);
		ports.io_wait();

		ports.write_byte(PIC1_DATA, offset1);
		ports.io_wait();
		ports.write_byte(PIC2_DATA, offset2);
		ports.io_wait();

		ports.write_byte(PIC1_DATA, 1 << CASCADE_LINE);
		ports.io_wait();
		ports.write_byte(PIC2_DATA, CASCADE_LINE);
		ports.io_wait();

		ports.write_byte(PIC1_DATA, mode);
		ports.io_wait();
		ports.write_byte(PIC2_DATA, mode);
		ports.io_wait();

		self.write_masks(ports, 0, 0);

		self.pics[0].offset = offset1;
		self.pics[1].offset = offset2;
		Ok(())
	}

	/// Masks every line on both controllers.
	pub fn disable<P: PortIo>(&mut self, ports: &mut P) {
		self.write_masks(ports, 0xff, 0xff);
	}

	/// Both mask registers, primary in the low byte.
	pub fn read_masks<P: PortIo>(&self, ports: &mut P) -> u16 {
		let primary = self.pics[0].read_mask(ports);
		let secondary = self.pics[1].read_mask(ports);
		(u16::from(secondary) << 8) | u16::from(primary)
	}

	pub fn write_masks<P: PortIo>(&mut self, ports: &mut P, mask1: u8, mask2: u8) {
		self.pics[0].write_mask(ports, mask1);
		self.pics[1].write_mask(ports, mask2);
	}

	/// Stops `line` from being delivered.
	pub fn set_mask<P: PortIo>(&mut self, ports: &mut P, line: IrqLine) {
		let pic = self.owner(line);
		let mask = pic.read_mask(ports) | line.bit();
		pic.write_mask(ports, mask);
	}

	/// Lets `line` through again.
	pub fn clear_mask<P: PortIo>(&mut self, ports: &mut P, line: IrqLine) {
		let pic = self.owner(line);
		let mask = pic.read_mask(ports) & !line.bit();
		pic.write_mask(ports, mask);
	}

	/// Acknowledges `line`. Lines on the secondary controller are
	/// acknowledged there before the primary sees its cascade EOI.
	pub fn send_eoi<P: PortIo>(&mut self, ports: &mut P, line: IrqLine) {
		if line.on_secondary() {
			self.pics[1].end_of_interrupt(ports);
		}
		self.pics[0].end_of_interrupt(ports);
	}

	/// Interrupt request register of both controllers: lines raised but not
	/// yet delivered.
	pub fn read_request_register<P: PortIo>(&self, ports: &mut P) -> u16 {
		self.read_register(ports, Ocw3::READ_IRR)
	}

	/// In-service register of both controllers: lines delivered but not yet
	/// acknowledged.
	pub fn read_service_register<P: PortIo>(&self, ports: &mut P) -> u16 {
		self.read_register(ports, Ocw3::READ_ISR)
	}

	fn read_register<P: PortIo>(&self, ports: &mut P, ocw3: Ocw3) -> u16 {
		ports.write_byte(PIC1_COMMAND, ocw3.bits());
		ports.write_byte(PIC2_COMMAND, ocw3.bits());
		let secondary = ports.read_byte(PIC2_COMMAND);
		let primary = ports.read_byte(PIC1_COMMAND);
		(u16::from(secondary) << 8) | u16::from(primary)
	}

	fn owner(&self, line: IrqLine) -> &Pic {
		&self.pics[usize::from(line.on_secondary())]
	}
}

impl Default for ChainedPics {
	fn default() -> Self {
		Self::new()
	}
}
