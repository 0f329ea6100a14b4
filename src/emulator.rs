use std::path::Path;

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    config::{Config, ShiftSource},
    decode::Instruction,
    display::{self, Display, FrameBuffer},
    error::VmError,
    keyboard::{Keypad, KeypadState},
    memory::{Memory, Stack, TypeAddr},
    registers::{IndexRegister, ProgramCounter, Registers},
    timer::Timers,
};

/// What a single `step` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Executed,
    /// FX0A ran with no key held; it runs again on the next step
    AwaitingKey,
    /// Nothing left to execute, either PC ran off the end of memory or a
    /// fatal error was already reported
    Halted,
}

/// Copy of the machine registers for debuggers and tests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub v: [u8; 16],
    pub pc: TypeAddr,
    pub index: TypeAddr,
    pub stack: Vec<TypeAddr>,
    pub delay_timer: u8,
    pub sound_timer: u8,
    pub opcode: u16,
}

pub struct Emulator<D = FrameBuffer, K = KeypadState> {
    fb: D,
    keypad: K,
    config: Config,
    regs: Registers,
    mem: Memory,
    pc: ProgramCounter,
    index: IndexRegister,
    stack: Stack,
    timers: Timers,
    opcode: u16,
    halted: bool,
    rng: StdRng,
}

impl Emulator {
    pub fn with_defaults() -> Self {
        Self::new(Config::default(), FrameBuffer::new(), KeypadState::new())
    }
}

impl<D: Display, K: Keypad> Emulator<D, K> {
    pub fn new(config: Config, fb: D, keypad: K) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            mem: Memory::new(config.font_base),
            regs: Registers::new(),
            pc: ProgramCounter::default(),
            index: IndexRegister::default(),
            stack: Stack::new(),
            timers: Timers::default(),
            opcode: 0,
            halted: false,
            fb,
            keypad,
            config,
            rng,
        }
    }

    /// Reset the machine and copy `program` in at 0x200.
    ///
    /// A program that doesn't fit is rejected and the machine is left as it
    /// was.
    pub fn load(&mut self, program: &[u8]) -> Result<(), VmError> {
        let mut mem = Memory::new(self.config.font_base);
        mem.load_rom(program)?;

        self.mem = mem;
        self.regs = Registers::new();
        self.pc = ProgramCounter::default();
        self.index = IndexRegister::default();
        self.stack = Stack::new();
        self.timers = Timers::default();
        self.opcode = 0;
        self.halted = false;
        self.fb.clear();

        log::info!("loaded {} byte program", program.len());
        Ok(())
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<(), VmError> {
        let path = path.as_ref();
        let program = std::fs::read(path).map_err(|source| VmError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        self.load(&program)
    }

    /// Fetch, decode and execute one instruction.
    ///
    /// A fatal error halts the machine; it is returned once and every later
    /// step reports `Halted`.
    pub fn step(&mut self) -> Result<StepOutcome, VmError> {
        if self.halted {
            return Ok(StepOutcome::Halted);
        }

        let Some(ins) = self.mem.instruction_at(self.pc.0) else {
            log::warn!("pc {:#06X} ran past the end of memory, halting", self.pc.0);
            self.halted = true;
            return Ok(StepOutcome::Halted);
        };
        log::trace!("{:#06X}: {:04X}", self.pc.0, ins);

        self.opcode = ins;
        self.pc.increment();

        let operation = Instruction::decode_raw(ins);
        self.execute_ins(operation).map_err(|err| {
            log::error!("{err}, halting");
            self.halted = true;
            err
        })
    }

    fn execute_ins(&mut self, ins: Instruction) -> Result<StepOutcome, VmError> {
        match ins {
            Instruction::ClearScreen => self.fb.clear(),
            Instruction::PopSubroutine => {
                let addr = self
                    .stack
                    .pop()
                    .ok_or(VmError::StackUnderflow { pc: self.pc.0 - 2 })?;
                self.pc.set_addr(addr);
            }
            Instruction::Jump(addr) => self.pc.set_addr(addr),
            Instruction::PushSubroutine(addr) => {
                // return to the instruction after the call
                self.stack
                    .push(self.pc.0)
                    .ok_or(VmError::StackOverflow { pc: self.pc.0 - 2 })?;
                self.pc.set_addr(addr);
            }

            Instruction::SkipEqualConstant(vx, kk) => self.skip_if(self.regs.get(vx) == kk),
            Instruction::SkipNotEqualConstant(vx, kk) => self.skip_if(self.regs.get(vx) != kk),
            Instruction::SkipEqualRegister(vx, vy) => {
                self.skip_if(self.regs.get(vx) == self.regs.get(vy))
            }
            Instruction::SkipNotEqualRegister(vx, vy) => {
                self.skip_if(self.regs.get(vx) != self.regs.get(vy))
            }

            Instruction::SetRegister(vx, kk) => self.regs.set_register(vx, kk),
            Instruction::AddToRegister(vx, kk) => self.regs.add_to_register(vx, kk),

            Instruction::CopyRegister(vx, vy) => self.regs.set_register(vx, self.regs.get(vy)),
            Instruction::Or(vx, vy) => {
                self.regs
                    .set_register(vx, self.regs.get(vx) | self.regs.get(vy));
            }
            Instruction::And(vx, vy) => {
                self.regs
                    .set_register(vx, self.regs.get(vx) & self.regs.get(vy));
            }
            Instruction::XOr(vx, vy) => {
                self.regs
                    .set_register(vx, self.regs.get(vx) ^ self.regs.get(vy));
            }
            // The flag is computed from the operands, then the result is
            // stored, then VF. With X == F the flag wins.
            Instruction::Add(vx, vy) => {
                let (x, y) = (self.regs.get(vx), self.regs.get(vy));
                let (sum, carry) = x.overflowing_add(y);
                self.regs.set_register(vx, sum);
                self.regs.set_flag(carry);
            }
            Instruction::SubtractForward(vx, vy) => {
                let (x, y) = (self.regs.get(vx), self.regs.get(vy));
                self.regs.set_register(vx, x.wrapping_sub(y));
                self.regs.set_flag(x >= y);
            }
            Instruction::SubtractBackward(vx, vy) => {
                let (x, y) = (self.regs.get(vx), self.regs.get(vy));
                self.regs.set_register(vx, y.wrapping_sub(x));
                self.regs.set_flag(y >= x);
            }
            Instruction::RightShift(vx, vy) => {
                let value = self.shift_operand(vx, vy);
                self.regs.set_register(vx, value >> 1);
                self.regs.set_flag(value & 1 == 1);
            }
            Instruction::LeftShift(vx, vy) => {
                let value = self.shift_operand(vx, vy);
                self.regs.set_register(vx, value << 1);
                self.regs.set_flag((value >> 7) & 1 == 1);
            }

            Instruction::SetIndexRegister(addr) => self.index.set_addr(addr),
            Instruction::JumpWithOffset(addr) => {
                self.pc.set_addr(addr + self.regs.get(0) as TypeAddr);
            }
            Instruction::Random(vx, kk) => {
                let byte: u8 = self.rng.gen();
                self.regs.set_register(vx, byte & kk);
            }
            Instruction::Display(reg_x, reg_y, height) => {
                let (x, y) = (self.regs.get(reg_x), self.regs.get(reg_y));
                let sprite = self.mem.slice(self.index.0 as usize, height as usize)?;
                self.regs.set_flag(false);
                let collision = display::draw_sprite(&mut self.fb, x, y, sprite);
                if collision {
                    self.regs.set_flag(true);
                }
            }

            Instruction::SkipIfPressed(vx) => {
                self.skip_if(self.keypad.is_pressed(self.regs.get(vx)))
            }
            Instruction::SkipIfNotPressed(vx) => {
                self.skip_if(!self.keypad.is_pressed(self.regs.get(vx)))
            }

            Instruction::CopyDelayToRegister(vx) => {
                self.regs.set_register(vx, self.timers.delay.count)
            }
            Instruction::GetKey(vx) => match self.keypad.pressed_key() {
                Some(key) => self.regs.set_register(vx, key),
                None => {
                    // run this instruction again until a key shows up
                    self.pc.decrement();
                    log::debug!("waiting for key into V{vx:X}");
                    return Ok(StepOutcome::AwaitingKey);
                }
            },
            Instruction::CopyRegisterToDelay(vx) => self.timers.delay.set(self.regs.get(vx)),
            Instruction::CopyRegisterToSound(vx) => self.timers.sound.set(self.regs.get(vx)),
            Instruction::AddToIndex(vx) => {
                self.index
                    .set_addr(self.index.0.wrapping_add(self.regs.get(vx) as TypeAddr));
            }
            Instruction::PointChar(vx) => {
                let addr = self.mem.glyph_addr(self.regs.get(vx));
                self.index.set_addr(addr);
            }
            // the whole range is checked before anything is written
            Instruction::ToDecimal(vx) => {
                let value = self.regs.get(vx);
                let digits = self.mem.slice_mut(self.index.0 as usize, 3)?;
                digits.copy_from_slice(&[value / 100, (value / 10) % 10, value % 10]);
            }
            Instruction::StoreRegisterToMemory(vx) => {
                let count = vx as usize + 1;
                let dest = self.mem.slice_mut(self.index.0 as usize, count)?;
                dest.copy_from_slice(&self.regs.as_array()[..count]);
            }
            Instruction::LoadRegisterFromMemory(vx) => {
                let src = self.mem.slice(self.index.0 as usize, vx as usize + 1)?;
                for (reg, &reg_val) in src.iter().enumerate() {
                    self.regs.set_register(reg as u8, reg_val);
                }
            }

            Instruction::Unmapped(ins) => log::debug!("ignoring unmapped opcode {ins:04X}"),
        }
        Ok(StepOutcome::Executed)
    }

    fn skip_if(&mut self, condition: bool) {
        if condition {
            self.pc.increment();
        }
    }

    fn shift_operand(&mut self, vx: u8, vy: u8) -> u8 {
        if self.config.shift_source == ShiftSource::Vy {
            self.regs.set_register(vx, self.regs.get(vy));
        }
        self.regs.get(vx)
    }

    /// One 60Hz period: both timers count down. Called by the host, never by
    /// `step`.
    pub fn tick_timers(&mut self) {
        self.timers.tick();
    }

    pub fn framebuffer(&self) -> &D {
        &self.fb
    }

    pub fn keypad(&self) -> &K {
        &self.keypad
    }

    pub fn keypad_mut(&mut self) -> &mut K {
        &mut self.keypad
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn register(&self, reg_num: u8) -> u8 {
        self.regs.get(reg_num)
    }

    pub fn pc(&self) -> TypeAddr {
        self.pc.0
    }

    pub fn index(&self) -> TypeAddr {
        self.index.0
    }

    pub fn delay_timer(&self) -> u8 {
        self.timers.delay.count
    }

    pub fn sound_timer(&self) -> u8 {
        self.timers.sound.count
    }

    /// The host should be beeping
    pub fn sound_active(&self) -> bool {
        self.timers.sound.count > 0
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn memory(&self) -> &Memory {
        &self.mem
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            v: self.regs.as_array(),
            pc: self.pc.0,
            index: self.index.0,
            stack: self.stack.addresses().to_vec(),
            delay_timer: self.timers.delay.count,
            sound_timer: self.timers.sound.count,
            opcode: self.opcode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{FONT_START, PROGRAM_START};

    fn emulator(program: &[u8]) -> Emulator {
        let config = Config {
            rng_seed: Some(8),
            ..Config::default()
        };
        let mut emu = Emulator::new(config, FrameBuffer::new(), KeypadState::new());
        emu.load(program).unwrap();
        emu
    }

    fn run(emu: &mut Emulator, steps: usize) {
        for _ in 0..steps {
            assert_eq!(emu.step().unwrap(), StepOutcome::Executed);
        }
    }

    fn lit(emu: &Emulator) -> usize {
        emu.framebuffer().cells().iter().filter(|&&b| b).count()
    }

    #[test]
    fn test_add_without_carry() {
        let mut emu = emulator(&[0x60, 0x0A, 0x61, 0x05, 0x80, 0x14]);
        run(&mut emu, 3);
        assert_eq!(emu.register(0x0), 15);
        assert_eq!(emu.register(0x1), 5);
        assert_eq!(emu.register(0xF), 0);
    }

    #[test]
    fn test_add_with_carry() {
        let mut emu = emulator(&[0x60, 0xFF, 0x61, 0x03, 0x80, 0x14]);
        run(&mut emu, 3);
        assert_eq!(emu.register(0x0), 0x02);
        assert_eq!(emu.register(0xF), 1);
    }

    #[test]
    fn test_add_into_flag_register_keeps_flag() {
        // VF = 255, VE = 1, ADD VF, VE
        let mut emu = emulator(&[0x6F, 0xFF, 0x6E, 0x01, 0x8F, 0xE4]);
        run(&mut emu, 3);
        assert_eq!(emu.register(0xF), 1);
        assert_eq!(emu.register(0xE), 1);
    }

    #[test]
    fn test_add_and_subtract_every_operand_pair() {
        for x in 0..=255u8 {
            for y in 0..=255u8 {
                let mut emu = emulator(&[0x60, x, 0x61, y, 0x80, 0x14]);
                run(&mut emu, 3);
                assert_eq!(emu.register(0x0), x.wrapping_add(y));
                assert_eq!(emu.register(0xF), (x as u16 + y as u16 > 255) as u8);

                emu.load(&[0x60, x, 0x61, y, 0x80, 0x15]).unwrap();
                run(&mut emu, 3);
                assert_eq!(emu.register(0x0), x.wrapping_sub(y));
                assert_eq!(emu.register(0xF), (x >= y) as u8);
            }
        }
    }

    #[test]
    fn test_subtract_forward() {
        let mut emu = emulator(&[
            0x60, 0x05, 0x61, 0x05, 0x80, 0x15, // 5 - 5
            0x62, 0x03, 0x63, 0x04, 0x82, 0x35, // 3 - 4
        ]);
        run(&mut emu, 3);
        assert_eq!(emu.register(0x0), 0);
        assert_eq!(emu.register(0xF), 1);
        run(&mut emu, 3);
        assert_eq!(emu.register(0x2), 0xFF);
        assert_eq!(emu.register(0xF), 0);
    }

    #[test]
    fn test_subtract_backward() {
        let mut emu = emulator(&[
            0x60, 0x03, 0x61, 0x0A, 0x80, 0x17, // 10 - 3
            0x62, 0x04, 0x63, 0x01, 0x82, 0x37, // 1 - 4
        ]);
        run(&mut emu, 3);
        assert_eq!(emu.register(0x0), 7);
        assert_eq!(emu.register(0xF), 1);
        run(&mut emu, 3);
        assert_eq!(emu.register(0x2), 0xFD);
        assert_eq!(emu.register(0xF), 0);
    }

    #[test]
    fn test_subtract_into_flag_register() {
        // VF = 1, V0 = 2, SUB VF, V0 -> borrow, flag overwrites result
        let mut emu = emulator(&[0x6F, 0x01, 0x60, 0x02, 0x8F, 0x05]);
        run(&mut emu, 3);
        assert_eq!(emu.register(0xF), 0);
    }

    #[test]
    fn test_bitwise() {
        let mut emu = emulator(&[
            0x60, 0b1100, 0x61, 0b1010, // V0, V1
            0x82, 0x00, 0x82, 0x11, // V2 = V0 | V1
            0x83, 0x00, 0x83, 0x12, // V3 = V0 & V1
            0x84, 0x00, 0x84, 0x13, // V4 = V0 ^ V1
        ]);
        run(&mut emu, 8);
        assert_eq!(emu.register(0x2), 0b1110);
        assert_eq!(emu.register(0x3), 0b1000);
        assert_eq!(emu.register(0x4), 0b0110);
    }

    #[test]
    fn test_shifts_in_place() {
        let mut emu = emulator(&[
            0x60, 0b1000_0011, 0x61, 0x00, // V0, V1
            0x80, 0x16, // SHR V0
            0x82, 0x00, 0x82, 0x0E, 0x82, 0x0E, // V2 = V0, SHL V2 twice
        ]);
        run(&mut emu, 3);
        assert_eq!(emu.register(0x0), 0b0100_0001);
        assert_eq!(emu.register(0xF), 1);
        run(&mut emu, 2);
        assert_eq!(emu.register(0x2), 0b1000_0010);
        assert_eq!(emu.register(0xF), 0);
        run(&mut emu, 1);
        assert_eq!(emu.register(0x2), 0b0000_0100);
        assert_eq!(emu.register(0xF), 1);
    }

    #[test]
    fn test_shifts_from_vy() {
        let config = Config {
            shift_source: ShiftSource::Vy,
            ..Config::default()
        };
        let mut emu = Emulator::new(config, FrameBuffer::new(), KeypadState::new());
        emu.load(&[0x60, 0xFF, 0x61, 0b0000_0010, 0x80, 0x16, 0x82, 0x1E])
            .unwrap();
        run(&mut emu, 3);
        assert_eq!(emu.register(0x0), 0b0000_0001);
        assert_eq!(emu.register(0x1), 0b0000_0010);
        assert_eq!(emu.register(0xF), 0);
        run(&mut emu, 1);
        assert_eq!(emu.register(0x2), 0b0000_0100);
        assert_eq!(emu.register(0xF), 0);
    }

    #[test]
    fn test_add_constant_wraps_without_flag() {
        let mut emu = emulator(&[0x60, 0xFE, 0x70, 0x05]);
        run(&mut emu, 2);
        assert_eq!(emu.register(0x0), 0x03);
        assert_eq!(emu.register(0xF), 0);
    }

    #[test]
    fn test_jump() {
        let mut emu = emulator(&[0x13, 0x45]);
        run(&mut emu, 1);
        assert_eq!(emu.pc(), 0x345);
    }

    #[test]
    fn test_jump_with_offset() {
        let mut emu = emulator(&[0x61, 0x05, 0xB2, 0x00]);
        emu.regs.set_register(0x0, 0x10);
        run(&mut emu, 2);
        assert_eq!(emu.pc(), 0x210);
        assert_eq!(emu.register(0x1), 0x05);
    }

    #[test]
    fn test_call_and_return() {
        // 0x200 CALL 0x206, 0x202 LD V0, 1, 0x204 JP 0x204, 0x206 RET
        let mut emu = emulator(&[0x22, 0x06, 0x60, 0x01, 0x12, 0x04, 0x00, 0xEE]);
        run(&mut emu, 1);
        assert_eq!(emu.pc(), 0x206);
        assert_eq!(emu.snapshot().stack, vec![0x202]);
        run(&mut emu, 1);
        assert_eq!(emu.pc(), 0x202);
        assert!(emu.snapshot().stack.is_empty());
        run(&mut emu, 1);
        assert_eq!(emu.register(0x0), 1);
    }

    #[test]
    fn test_return_with_empty_stack_halts() {
        let mut emu = emulator(&[0x00, 0xEE]);
        assert!(matches!(
            emu.step(),
            Err(VmError::StackUnderflow { pc: 0x200 })
        ));
        assert!(emu.is_halted());
        assert_eq!(emu.step().unwrap(), StepOutcome::Halted);
    }

    #[test]
    fn test_stack_overflow_halts_without_corruption() {
        // recursive call to itself
        let mut emu = emulator(&[0x22, 0x00]);
        let before = emu.memory().slice(0, 4096).unwrap().to_vec();
        run(&mut emu, 16);
        assert!(matches!(
            emu.step(),
            Err(VmError::StackOverflow { pc: 0x200 })
        ));
        assert_eq!(emu.snapshot().stack.len(), 16);
        assert_eq!(emu.memory().slice(0, 4096).unwrap(), &before[..]);
        assert_eq!(emu.step().unwrap(), StepOutcome::Halted);
    }

    #[test]
    fn test_skips() {
        let mut emu = emulator(&[
            0x60, 0x07, 0x61, 0x07, // V0 = V1 = 7
            0x30, 0x07, // skip
            0x00, 0x00, //
            0x40, 0x07, // no skip
            0x50, 0x10, // skip
            0x00, 0x00, //
            0x90, 0x10, // no skip
            0x30, 0x08, // no skip
        ]);
        run(&mut emu, 3);
        assert_eq!(emu.pc(), 0x208);
        run(&mut emu, 1);
        assert_eq!(emu.pc(), 0x20A);
        run(&mut emu, 1);
        assert_eq!(emu.pc(), 0x20E);
        run(&mut emu, 1);
        assert_eq!(emu.pc(), 0x210);
        run(&mut emu, 1);
        assert_eq!(emu.pc(), 0x212);
    }

    #[test]
    fn test_set_and_add_index() {
        let mut emu = emulator(&[0xA1, 0x23, 0x60, 0x10, 0xF0, 0x1E]);
        run(&mut emu, 1);
        assert_eq!(emu.index(), 0x123);
        run(&mut emu, 2);
        assert_eq!(emu.index(), 0x133);
    }

    #[test]
    fn test_random_is_masked() {
        let mut emu = emulator(&[0xC0, 0x00, 0xC1, 0x0F, 0xC2, 0xFF]);
        run(&mut emu, 3);
        assert_eq!(emu.register(0x0), 0);
        assert_eq!(emu.register(0x1) & 0xF0, 0);

        // same seed, same bytes
        let mut other = emulator(&[0xC0, 0x00, 0xC1, 0x0F, 0xC2, 0xFF]);
        run(&mut other, 3);
        assert_eq!(other.register(0x2), emu.register(0x2));
    }

    #[test]
    fn test_clear_screen() {
        let mut emu = emulator(&[0x60, 0x05, 0xF0, 0x29, 0xD1, 0x15, 0x00, 0xE0]);
        run(&mut emu, 3);
        assert!(lit(&emu) > 0);
        run(&mut emu, 1);
        assert_eq!(lit(&emu), 0);
    }

    #[test]
    fn test_draw_twice_restores_display() {
        // I = glyph 0, draw at (V1, V2) twice
        let mut emu = emulator(&[
            0xF0, 0x29, 0x61, 0x3C, 0x62, 0x1E, 0xD1, 0x25, 0xD1, 0x25,
        ]);
        run(&mut emu, 4);
        assert_eq!(emu.register(0xF), 0);
        // "0" glyph has 14 lit pixels, some wrapped around the corner
        assert_eq!(lit(&emu), 14);
        assert!(emu.framebuffer().get_pixel(60, 30));
        assert!(emu.framebuffer().get_pixel(60, 0));

        run(&mut emu, 1);
        assert_eq!(emu.register(0xF), 1);
        assert_eq!(lit(&emu), 0);
    }

    #[test]
    fn test_draw_clears_stale_flag() {
        let mut emu = emulator(&[0x6F, 0x09, 0xF0, 0x29, 0xD0, 0x05]);
        run(&mut emu, 3);
        assert_eq!(emu.register(0xF), 0);
    }

    #[test]
    fn test_draw_past_end_of_memory_is_fatal() {
        let mut emu = emulator(&[0xAF, 0xFE, 0xD0, 0x05]);
        run(&mut emu, 1);
        assert!(matches!(
            emu.step(),
            Err(VmError::AddressOutOfRange { address: 0x1000 })
        ));
        assert!(emu.is_halted());
    }

    #[test]
    fn test_store_past_end_of_memory_writes_nothing() {
        let mut emu = emulator(&[
            0x60, 0x11, 0x61, 0x22, 0x62, 0x33, 0x63, 0x44, // V0..V3
            0xAF, 0xFE, 0xF3, 0x55, // store V0..V3 at 0xFFE
        ]);
        run(&mut emu, 5);
        assert!(matches!(
            emu.step(),
            Err(VmError::AddressOutOfRange { address: 0x1000 })
        ));
        assert_eq!(emu.memory().slice(0xFFE, 2).unwrap(), &[0x00, 0x00]);
        assert!(emu.is_halted());
    }

    #[test]
    fn test_bcd_past_end_of_memory_writes_nothing() {
        let mut emu = emulator(&[0x60, 0xFF, 0xAF, 0xFF, 0xF0, 0x33]);
        run(&mut emu, 2);
        assert!(matches!(
            emu.step(),
            Err(VmError::AddressOutOfRange { address: 0x1000 })
        ));
        assert_eq!(emu.memory().slice(0xFFF, 1).unwrap(), &[0x00]);
    }

    #[test]
    fn test_load_past_end_of_memory_keeps_registers() {
        let mut emu = emulator(&[0x60, 0x11, 0x61, 0x22, 0xAF, 0xFE, 0xF3, 0x65]);
        run(&mut emu, 3);
        assert!(emu.step().is_err());
        assert_eq!(emu.register(0x0), 0x11);
        assert_eq!(emu.register(0x1), 0x22);
    }

    #[test]
    fn test_key_skips() {
        let mut emu = emulator(&[0x60, 0x0A, 0xE0, 0x9E, 0x00, 0x00, 0xE0, 0xA1, 0xE0, 0xA1]);
        emu.keypad_mut().press(0xA);
        run(&mut emu, 2);
        assert_eq!(emu.pc(), 0x206);
        run(&mut emu, 1);
        assert_eq!(emu.pc(), 0x208);
        emu.keypad_mut().release(0xA);
        run(&mut emu, 1);
        assert_eq!(emu.pc(), 0x20C);
    }

    #[test]
    fn test_wait_for_key() {
        let mut emu = emulator(&[0xF3, 0x0A, 0x60, 0x01]);
        assert_eq!(emu.step().unwrap(), StepOutcome::AwaitingKey);
        assert_eq!(emu.pc(), PROGRAM_START);
        assert_eq!(emu.step().unwrap(), StepOutcome::AwaitingKey);

        emu.keypad_mut().press(0xC);
        run(&mut emu, 1);
        assert_eq!(emu.register(0x3), 0xC);
        assert_eq!(emu.pc(), 0x202);
    }

    #[test]
    fn test_timers_only_move_on_tick() {
        let mut emu = emulator(&[0x60, 0x03, 0xF0, 0x15, 0xF0, 0x18, 0xF1, 0x07]);
        run(&mut emu, 3);
        assert_eq!(emu.delay_timer(), 3);
        assert_eq!(emu.sound_timer(), 3);
        assert!(emu.sound_active());

        emu.tick_timers();
        run(&mut emu, 1);
        assert_eq!(emu.register(0x1), 2);
        emu.tick_timers();
        emu.tick_timers();
        emu.tick_timers();
        assert_eq!(emu.delay_timer(), 0);
        assert!(!emu.sound_active());
    }

    #[test]
    fn test_point_char() {
        let mut emu = emulator(&[0x60, 0x0F, 0xF0, 0x29]);
        run(&mut emu, 2);
        assert_eq!(emu.index(), FONT_START + 5 * 0xF);
        assert_eq!(emu.memory().slice(emu.index() as usize, 1).unwrap(), &[0xF0]);
    }

    #[test]
    fn test_bcd() {
        let mut emu = emulator(&[0x60, 193, 0xA3, 0x00, 0xF0, 0x33]);
        run(&mut emu, 3);
        assert_eq!(emu.memory().slice(0x300, 3).unwrap(), &[1, 9, 3]);
    }

    #[test]
    fn test_store_and_load_registers() {
        let mut emu = emulator(&[
            0x60, 0x11, 0x61, 0x22, 0x62, 0x33, 0x63, 0x44, // V0..V3
            0xA4, 0x00, 0xF2, 0x55, // store V0..V2 at 0x400
            0x60, 0x00, 0x61, 0x00, 0x62, 0x00, // clear
            0xF1, 0x65, // load V0..V1
        ]);
        run(&mut emu, 6);
        assert_eq!(emu.memory().slice(0x400, 4).unwrap(), &[0x11, 0x22, 0x33, 0x00]);
        assert_eq!(emu.index(), 0x400);
        run(&mut emu, 4);
        assert_eq!(emu.register(0x0), 0x11);
        assert_eq!(emu.register(0x1), 0x22);
        assert_eq!(emu.register(0x2), 0x00);
        assert_eq!(emu.register(0x3), 0x44);
    }

    #[test]
    fn test_unmapped_opcodes_are_noops() {
        let mut emu = emulator(&[0x01, 0x23, 0x80, 0x08, 0xE0, 0x00, 0xF0, 0xFF]);
        let before = emu.snapshot();
        run(&mut emu, 4);
        let after = emu.snapshot();
        assert_eq!(after.pc, 0x208);
        assert_eq!(after.v, before.v);
        assert_eq!(after.index, before.index);
    }

    #[test]
    fn test_halts_at_end_of_memory() {
        let mut emu = emulator(&[0x1F, 0xFE]);
        run(&mut emu, 2);
        assert_eq!(emu.pc(), 0x1000);
        assert_eq!(emu.step().unwrap(), StepOutcome::Halted);
        assert!(emu.is_halted());
    }

    #[test]
    fn test_oversized_load_keeps_state() {
        let mut emu = emulator(&[0x60, 0x42]);
        run(&mut emu, 1);
        assert!(matches!(
            emu.load(&vec![0; 4000]),
            Err(VmError::ProgramTooLarge { size: 4000, .. })
        ));
        assert_eq!(emu.register(0x0), 0x42);
        assert_eq!(emu.pc(), 0x202);
    }

    #[test]
    fn test_missing_file_is_reported() {
        let mut emu = emulator(&[0x60, 0x42]);
        assert!(matches!(
            emu.load_file("/nonexistent/rom.ch8"),
            Err(VmError::Load { .. })
        ));
        assert_eq!(emu.pc(), PROGRAM_START);
    }

    #[test]
    fn test_reload_resets_machine() {
        let mut emu = emulator(&[0x60, 0x42, 0x22, 0x00]);
        run(&mut emu, 2);
        emu.load(&[0x61, 0x01]).unwrap();
        let snapshot = emu.snapshot();
        assert_eq!(snapshot.v, [0; 16]);
        assert_eq!(snapshot.pc, PROGRAM_START);
        assert!(snapshot.stack.is_empty());
        run(&mut emu, 1);
        assert_eq!(emu.register(0x1), 1);
    }
}
