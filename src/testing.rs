//! Simulated hardware for host tests: an 8259 pair, the keyboard controller
//! and a CPU that records what it was asked to do.

use crate::exceptions::pic8259::IrqLine;
use crate::structures::idt::{IdtRegister, InterruptDescriptorTable};
use crate::utils::cpu::Cpu;
use crate::utils::io::PortIo;
use std::collections::VecDeque;
use std::vec::Vec;

const WAIT_PORT: u16 = 0x80;
const KEYBOARD_DATA: u16 = 0x60;
const KEYBOARD_STATUS: u16 = 0x64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortAccess {
	Read(u16, u8),
	Write(u16, u8),
	ReadWord(u16, u16),
	WriteWord(u16, u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selected {
	Request,
	Service,
}

/// One 8259, modelled closely enough for the driver's command sequences.
#[derive(Debug, Clone)]
pub struct SimPic {
	mask: u8,
	request: u8,
	service: u8,
	offset: u8,
	selected: Selected,
	init_word: Option<u8>,
}

impl SimPic {
	fn new(offset: u8) -> Self {
		Self {
			mask: 0,
			request: 0,
			service: 0,
			offset,
			selected: Selected::Request,
			init_word: None,
		}
	}

	pub fn mask(&self) -> u8 {
		self.mask
	}

	pub fn set_mask(&mut self, mask: u8) {
		self.mask = mask;
	}

	pub fn offset(&self) -> u8 {
		self.offset
	}

	fn command(&mut self, value: u8) {
		if value & 0x10 != 0 {
			self.mask = 0;
			self.request = 0;
			self.service = 0;
			self.selected = Selected::Request;
			self.init_word = Some(2);
		} else if value == 0x20 {
			// Non-specific EOI retires the highest priority line in service.
			self.service &= self.service.wrapping_sub(1);
		} else if value & 0x18 == 0x08 && value & 0x02 != 0 {
			self.selected = if value & 0x01 != 0 {
				Selected::Service
			} else {
				Selected::Request
			};
		}
	}

	fn data(&mut self, value: u8) {
		self.init_word = match self.init_word {
			Some(2) => {
				self.offset = value;
				Some(3)
			}
			Some(3) => Some(4),
			Some(_) => None,
			None => {
				self.mask = value;
				None
			}
		};
	}

	fn read_command(&self) -> u8 {
		match self.selected {
			Selected::Request => self.request,
			Selected::Service => self.service,
		}
	}
}

/// Port bus with two PICs and a keyboard controller attached. Every access
/// is recorded in order.
pub struct MockPorts {
	log: Vec<PortAccess>,
	pics: [SimPic; 2],
	keyboard: VecDeque<u8>,
}

impl MockPorts {
	pub fn new() -> Self {
		Self {
			log: Vec::new(),
			pics: [SimPic::new(0x08), SimPic::new(0x70)],
			keyboard: VecDeque::new(),
		}
	}

	pub fn log(&self) -> &[PortAccess] {
		&self.log
	}

	pub fn clear_log(&mut self) {
		self.log.clear();
	}

	/// Byte writes in order, without the `0x80` settle writes.
	pub fn writes_excluding_wait(&self) -> Vec<(u16, u8)> {
		self.log
			.iter()
			.filter_map(|access| match *access {
				PortAccess::Write(port, value) if port != WAIT_PORT => Some((port, value)),
				_ => None,
			})
			.collect()
	}

	pub fn count(&self, wanted: PortAccess) -> usize {
		self.log.iter().filter(|&&access| access == wanted).count()
	}

	pub fn pic(&self, index: usize) -> &SimPic {
		&self.pics[index]
	}

	pub fn pic_mut(&mut self, index: usize) -> &mut SimPic {
		&mut self.pics[index]
	}

	/// Queue a byte in the keyboard controller's output buffer.
	pub fn push_scancode(&mut self, scancode: u8) {
		self.keyboard.push_back(scancode);
	}

	pub fn pending_scancodes(&self) -> usize {
		self.keyboard.len()
	}

	/// Assert `line` without delivering it.
	pub fn raise(&mut self, line: IrqLine) {
		let (pic, bit) = Self::locate(line);
		self.pics[pic].request |= bit;
		if pic == 1 {
			self.pics[0].request |= 1 << 2;
		}
	}

	/// Put `line` in service, as if the CPU had just taken it.
	pub fn deliver(&mut self, line: IrqLine) {
		let (pic, bit) = Self::locate(line);
		self.pics[pic].service |= bit;
		if pic == 1 {
			self.pics[0].service |= 1 << 2;
		}
	}

	fn locate(line: IrqLine) -> (usize, u8) {
		let line = line.as_u8();
		(usize::from(line >= 8), 1 << (line & 7))
	}
}

impl Default for MockPorts {
	fn default() -> Self {
		Self::new()
	}
}

impl PortIo for MockPorts {
	fn read_byte(&mut self, port: u16) -> u8 {
		let value = match port {
			0x20 => self.pics[0].read_command(),
			0x21 => self.pics[0].mask,
			0xa0 => self.pics[1].read_command(),
			0xa1 => self.pics[1].mask,
			KEYBOARD_DATA => self.keyboard.pop_front().unwrap_or(0),
			KEYBOARD_STATUS => u8::from(!self.keyboard.is_empty()),
			_ => 0xff,
		};
		self.log.push(PortAccess::Read(port, value));
		value
	}

	fn write_byte(&mut self, port: u16, value: u8) {
		self.log.push(PortAccess::Write(port, value));
		match port {
			0x20 => self.pics[0].command(value),
			0x21 => self.pics[0].data(value),
			0xa0 => self.pics[1].command(value),
			0xa1 => self.pics[1].data(value),
			_ => {}
		}
	}

	fn read_word(&mut self, port: u16) -> u16 {
		self.log.push(PortAccess::ReadWord(port, 0xffff));
		0xffff
	}

	fn write_word(&mut self, port: u16, value: u16) {
		self.log.push(PortAccess::WriteWord(port, value));
	}
}

/// CPU stand-in.
#[derive(Debug, Default)]
pub struct MockCpu {
	pub fault_address: u32,
	pub loads: Vec<IdtRegister>,
	/// Gates already installed each time `lidt` ran.
	pub installed_at_load: Vec<usize>,
}

impl MockCpu {
	pub fn with_fault_address(fault_address: u32) -> Self {
		Self {
			fault_address,
			..Self::default()
		}
	}
}

impl Cpu for MockCpu {
	fn load_idt(&mut self, table: &InterruptDescriptorTable) {
		self.loads.push(table.register());
		self.installed_at_load.push(table.installed_count());
	}

	fn fault_address(&self) -> u32 {
		self.fault_address
	}
}
