/// Vector classification and the fatal fault report
pub mod dispatch;

/// Interrupt subsystem context and interrupt flag control
pub mod interrupts;

/// Keyboard driver
pub mod keyboard;

/// Panic handling
pub mod panic;

/// Programmable Interrupt Controller (PIC)
pub mod pic8259;

/// Entry stubs installed in the IDT
#[cfg(target_arch = "x86")]
pub mod trampolines;
