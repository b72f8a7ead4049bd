//! Structures for the x86 architecture

/// Interrupt Descriptor Table
pub mod idt;
