//! A CHIP-8 virtual machine.
//!
//! 16 8-bit data registers named V0 to VF
//! I -> address register (12 bits)
//! 16 level call stack
//! Delay & sound timers count down at 60Hz, driven by the host
//! Display: 64 width, 32 height, monochrome
//!
//! 35 opcodes, each 2 bytes (big-endian)
//!      NNN: address
//!      KK: 8-bit constant
//!      N: 4-bit constant
//!      X and Y: 4-bit register identifier

pub mod config;
pub mod decode;
pub mod display;
pub mod emulator;
pub mod error;
pub mod keyboard;
pub mod memory;
pub mod registers;
pub mod timer;

pub use config::{Config, ShiftSource};
pub use display::{Display, FrameBuffer};
pub use emulator::{Emulator, Snapshot, StepOutcome};
pub use error::VmError;
pub use keyboard::{Keypad, KeypadState};
