//! Errors raised when the interrupt subsystem is configured incorrectly.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InterruptError {
	#[error("vector {0} is outside the 256-entry descriptor table")]
	VectorOutOfRange(usize),

	#[error("PIC offset {0:#04x} is not a multiple of 8")]
	MisalignedOffset(u8),

	#[error("PIC offset {0:#04x} overlaps the CPU exception vectors")]
	OffsetOverlapsExceptions(u8),

	#[error("PIC offsets {0:#04x} and {1:#04x} overlap each other")]
	OverlappingOffsets(u8, u8),

	#[error("the PICs must be remapped before the descriptor table is loaded")]
	PicsNotRemapped,

	#[error("the descriptor table has already been loaded")]
	AlreadyLoaded,

	#[error("IRQ line {0} does not exist")]
	InvalidIrqLine(u8),
}
