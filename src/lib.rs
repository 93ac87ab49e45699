//! A CHIP-8 virtual machine: fetch/decode/execute, a deterministic cycle and
//! timer scheduler, and the sprite blitter. Windowing, audio and ROM file
//! dialogs are left to the host, which reads the pixel buffer and sound
//! timer between ticks and feeds key state in through [`AsKeyboard`].

// # Interpreter
// * 4096 (0x1000) bytes of memory
// * the built-in font lives at 0x000, programs are loaded at 0x200
// * 16 8-bit registers: V0 - VF
// * VF if used is the carry flag in addition operations, "no borrow" flag in subtraction, in draw
// operation the VF flag is set to denote pixel collision
// * the address register I is 16 bits wide, but only 12 bits are ever used
// * the stack is only used to store return addresses when subroutines are called

// # Timers
// * two timers running at 60 hertz
//  - delay timer is used for events, it can be set and read
//  - sound timer beeps when its value is nonzero

// # Input
// there is a 16 symbol hex keyboard with values 0 - F. There are 3 opcode that deal with handling input
//  - one skips an instruction if a specific key is pressed
//  - one skips an instruction if a specific key is NOT pressed
//  - waits for a key press and stores it in a register once it detects it

// # Graphics
// 64x32 pixels

use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use slog::{debug, info, o, trace, Logger};

pub mod config;
pub mod error;
pub mod graphics;
pub mod keyboard;
pub mod logging;
pub mod memory;
pub mod op;
pub mod scheduler;


pub use config::{Config, FaultPolicy};
pub use error::Error;
pub use graphics::{Graphics, HEIGHT, WIDTH};
pub use keyboard::{AsKeyboard, Key, KeyWait, Keyboard, NoKeys};
pub use memory::{CallStack, Memory, FONT_BASE, MEMORY_SIZE, PROGRAM_START};
pub use op::{disassemble, Op};
pub use scheduler::{Scheduler, TickReport};

use memory::NUM_BYTES_IN_FONT_CHAR;

pub const NUM_REGISTERS: usize = 16;
const FLAG_REGISTER: usize = 0xF;
const INSTRUCTION_SIZE: u16 = 2;
const SKIP_NEXT: u16 = 2 * INSTRUCTION_SIZE;
const PC_ALREADY_SET: u16 = 0;
const ADDRESS_MASK: u16 = 0x0FFF;

/// What a single call to [`Emulator::step`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cycle {
    Executed(Op),
    /// Parked on FX0A with no key down. The program counter didn't move.
    AwaitingKey,
    /// The instruction at the program counter jumps to itself, the usual
    /// way a ROM says it is done. Nothing was executed.
    Halted,
}

pub struct Emulator {
    pub(crate) memory: Memory, // 4k of RAM
    pub(crate) stack: CallStack,

    pub(crate) v: [u8; NUM_REGISTERS], // VF doubles as the flag register (see @Op)
    pub(crate) addr: u16,              // the I register
    pub(crate) pc: u16,

    pub(crate) delay_timer: u8,
    pub(crate) sound_timer: u8,

    pub(crate) graphics: Graphics,
    pub(crate) keyboard: Keyboard,

    rng: StdRng,
    logger: Logger,
}

impl Emulator {
    /// A powered-on machine with no program loaded. `CXKK` draws from an
    /// entropy-seeded generator.
    pub fn new(logger: Option<Logger>) -> Self {
        Self::with_rng(StdRng::from_entropy(), logger)
    }

    /// Like [`Emulator::new`], but `CXKK` is reproducible from `seed`.
    pub fn with_seed(seed: u64, logger: Option<Logger>) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), logger)
    }

    pub fn from_config(config: &Config, logger: Option<Logger>) -> Self {
        match config.seed {
            Some(seed) => Self::with_seed(seed, logger),
            None => Self::new(logger),
        }
    }

    fn with_rng(rng: StdRng, logger: Option<Logger>) -> Self {
        let logger = logger
            .unwrap_or_else(logging::discard_logger)
            .new(o!("component" => "cpu"));

        Emulator {
            memory: Memory::new(),
            stack: CallStack::new(),
            v: [0; NUM_REGISTERS],
            addr: 0,
            pc: PROGRAM_START as u16,
            delay_timer: 0,
            sound_timer: 0,
            graphics: Graphics::new(),
            keyboard: Keyboard::new(),
            rng,
            logger,
        }
    }

    /// Create an emulator and load the ROM at `path` into it.
    pub fn with_game_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let mut emulator = Self::new(None);
        emulator.load_rom(path)?;
        Ok(emulator)
    }

    pub fn load_rom<P: AsRef<Path>>(&mut self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        let rom = std::fs::read(path).map_err(|source| Error::RomRead {
            path: path.to_path_buf(),
            source,
        })?;
        self.load_program(&rom)
    }

    /// Power-cycle the machine with a raw program image at 0x200. Registers,
    /// timers, stack, keypad wait and display start from zero again. A
    /// rejected image leaves the current machine as it was.
    pub fn load_program(&mut self, rom: &[u8]) -> Result<(), Error> {
        let mut memory = Memory::new();
        memory.load_program(rom)?;

        self.memory = memory;
        self.stack = CallStack::new();
        self.v = [0; NUM_REGISTERS];
        self.addr = 0;
        self.pc = PROGRAM_START as u16;
        self.delay_timer = 0;
        self.sound_timer = 0;
        self.graphics.clear();
        self.keyboard = Keyboard::new();
        info!(self.logger, "loaded program";
            "bytes" => rom.len(),
            "end" => format!("{:#05x}", self.memory.program_end()));
        Ok(())
    }

    /// Fetch, decode and execute the instruction at the program counter.
    ///
    /// A faulting instruction changes nothing but the program counter, which
    /// moves past it so a caller that tolerates the fault can carry on. A
    /// failed fetch leaves the program counter where it is.
    pub fn step(&mut self) -> Result<Cycle, Error> {
        if self.keyboard.is_blocking() {
            return match self.keyboard.unblock() {
                Some((register, code)) => {
                    self.v[register as usize] = code;
                    self.pc = self.pc.wrapping_add(INSTRUCTION_SIZE);
                    debug!(self.logger, "key wait satisfied"; "register" => register, "key" => code);
                    Ok(Cycle::Executed(Op::KeyOpGet(register)))
                }
                None => Ok(Cycle::AwaitingKey),
            };
        }

        let word = self.memory.fetch(self.pc)?;
        let op = Op::from(word);
        trace!(self.logger, "execute";
            "pc" => format!("{:#05x}", self.pc),
            "word" => format!("{:#06x}", word),
            "op" => %op);

        if op == Op::Goto(self.pc) {
            debug!(self.logger, "self-jump"; "pc" => format!("{:#05x}", self.pc));
            return Ok(Cycle::Halted);
        }

        match self.execute(op) {
            Ok(_) if self.keyboard.is_blocking() => Ok(Cycle::AwaitingKey),
            Ok(advance) => {
                if op.sets_flag() {
                    trace!(self.logger, "flag"; "vf" => self.v[FLAG_REGISTER]);
                }
                self.pc = self.pc.wrapping_add(advance);
                Ok(Cycle::Executed(op))
            }
            Err(e) => {
                self.pc = self.pc.wrapping_add(INSTRUCTION_SIZE);
                Err(e)
            }
        }
    }

    /// Apply `op` to the machine state. Returns how far the program counter
    /// should move: 0 when the op set it itself, 4 when it skips the next
    /// instruction, 2 otherwise. On error nothing has been changed.
    pub fn execute(&mut self, op: Op) -> Result<u16, Error> {
        match op {
            Op::CallRca(nnn) => Err(Error::UnknownOpcode { opcode: nnn }),
            Op::Unknown(word) => Err(Error::UnknownOpcode { opcode: word }),
            Op::DispClear => {
                self.graphics.clear();
                Ok(INSTRUCTION_SIZE)
            }
            Op::Return => {
                self.pc = self.stack.pop()?;
                Ok(PC_ALREADY_SET)
            }
            Op::Goto(nnn) => {
                self.pc = nnn;
                Ok(PC_ALREADY_SET)
            }
            Op::GotoSubRtn(nnn) => {
                self.stack.push(self.pc.wrapping_add(INSTRUCTION_SIZE))?;
                self.pc = nnn;
                Ok(PC_ALREADY_SET)
            }
            Op::CondVxEq(x, kk) => Ok(skip_if(self.v[x as usize] == kk)),
            Op::CondVxNe(x, kk) => Ok(skip_if(self.v[x as usize] != kk)),
            Op::CondVxVyEq(x, y) => Ok(skip_if(self.v[x as usize] == self.v[y as usize])),
            Op::ConstSetVx(x, kk) => {
                self.v[x as usize] = kk;
                Ok(INSTRUCTION_SIZE)
            }
            Op::ConstAddVx(x, kk) => {
                self.v[x as usize] = self.v[x as usize].wrapping_add(kk);
                Ok(INSTRUCTION_SIZE)
            }
            Op::AssignVyToVx(x, y) => {
                self.v[x as usize] = self.v[y as usize];
                Ok(INSTRUCTION_SIZE)
            }
            Op::BitOpOr(x, y) => {
                self.v[x as usize] |= self.v[y as usize];
                Ok(INSTRUCTION_SIZE)
            }
            Op::BitOpAnd(x, y) => {
                self.v[x as usize] &= self.v[y as usize];
                Ok(INSTRUCTION_SIZE)
            }
            Op::BitOpXor(x, y) => {
                self.v[x as usize] ^= self.v[y as usize];
                Ok(INSTRUCTION_SIZE)
            }
            Op::MathVxAddVy(x, y) => {
                let out = add_with_carry(self.v[x as usize], self.v[y as usize]);
                self.write_flagged(x, out);
                Ok(INSTRUCTION_SIZE)
            }
            Op::MathVxMinusVy(x, y) => {
                let out = sub_no_borrow(self.v[x as usize], self.v[y as usize]);
                self.write_flagged(x, out);
                Ok(INSTRUCTION_SIZE)
            }
            Op::BitOpRtShift(x) => {
                let out = shift_right(self.v[x as usize]);
                self.write_flagged(x, out);
                Ok(INSTRUCTION_SIZE)
            }
            Op::MathVyMinusVx(x, y) => {
                let out = sub_no_borrow(self.v[y as usize], self.v[x as usize]);
                self.write_flagged(x, out);
                Ok(INSTRUCTION_SIZE)
            }
            Op::BitOpLftShift(x) => {
                let out = shift_left(self.v[x as usize]);
                self.write_flagged(x, out);
                Ok(INSTRUCTION_SIZE)
            }
            Op::CondVxVyNe(x, y) => Ok(skip_if(self.v[x as usize] != self.v[y as usize])),
            Op::MemSetI(nnn) => {
                self.addr = nnn;
                Ok(INSTRUCTION_SIZE)
            }
            Op::GotoPlusV0(nnn) => {
                self.pc = nnn + self.v[0] as u16;
                Ok(PC_ALREADY_SET)
            }
            Op::Rand(x, kk) => {
                self.v[x as usize] = self.rng.gen::<u8>() & kk;
                Ok(INSTRUCTION_SIZE)
            }
            Op::DispDraw(x, y, n) => {
                let (origin_x, origin_y) = (self.v[x as usize], self.v[y as usize]);
                let rows = self.memory.read(self.addr as usize, n as usize)?;
                let collision = self.graphics.draw_sprite(origin_x, origin_y, rows);
                self.v[FLAG_REGISTER] = collision as u8;
                Ok(INSTRUCTION_SIZE)
            }
            Op::KeyOpEqVx(x) => Ok(skip_if(self.keyboard.get_key_state(self.v[x as usize]))),
            Op::KeyOpNeVx(x) => Ok(skip_if(!self.keyboard.get_key_state(self.v[x as usize]))),
            Op::DelayGet(x) => {
                self.v[x as usize] = self.delay_timer;
                Ok(INSTRUCTION_SIZE)
            }
            Op::KeyOpGet(x) => match self.keyboard.first_pressed() {
                Some(code) => {
                    self.v[x as usize] = code;
                    Ok(INSTRUCTION_SIZE)
                }
                None => {
                    self.keyboard.block(x);
                    debug!(self.logger, "waiting for key"; "register" => x);
                    Ok(PC_ALREADY_SET)
                }
            },
            Op::DelaySet(x) => {
                self.delay_timer = self.v[x as usize];
                Ok(INSTRUCTION_SIZE)
            }
            Op::SoundSet(x) => {
                self.sound_timer = self.v[x as usize];
                Ok(INSTRUCTION_SIZE)
            }
            Op::MemIPlusEqVx(x) => {
                let sum = self.addr as u32 + self.v[x as usize] as u32;
                self.addr = (sum & ADDRESS_MASK as u32) as u16;
                self.write_flag(sum > ADDRESS_MASK as u32);
                Ok(INSTRUCTION_SIZE)
            }
            Op::MemISetSprite(x) => {
                let glyph = (self.v[x as usize] & 0xF) as u16;
                self.addr = FONT_BASE as u16 + glyph * NUM_BYTES_IN_FONT_CHAR as u16;
                Ok(INSTRUCTION_SIZE)
            }
            Op::Bcd(x) => {
                let value = self.v[x as usize];
                let digits = [value / 100, (value / 10) % 10, value % 10];
                self.memory.write(self.addr as usize, &digits)?;
                Ok(INSTRUCTION_SIZE)
            }
            Op::RegDump(x) => {
                self.memory
                    .write(self.addr as usize, &self.v[..=x as usize])?;
                Ok(INSTRUCTION_SIZE)
            }
            Op::RegLoad(x) => {
                let bytes = self.memory.read(self.addr as usize, x as usize + 1)?;
                self.v[..=x as usize].copy_from_slice(bytes);
                Ok(INSTRUCTION_SIZE)
            }
        }
    }

    /// Store an ALU result and its flag. The flag is written last, so when
    /// the destination is VF itself it ends up holding the flag.
    fn write_flagged(&mut self, x: u8, (value, flag): (u8, bool)) {
        self.v[x as usize] = value;
        self.write_flag(flag);
    }

    fn write_flag(&mut self, flag: bool) {
        self.v[FLAG_REGISTER] = flag as u8;
    }

    /// Count both timers down by one, stopping at zero.
    pub fn decrement_timers(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
    }

    /// Refresh the keypad snapshot from the host's input source.
    pub fn handle_key_input<K: AsKeyboard + ?Sized>(&mut self, keyboard: &K) {
        self.keyboard.update(&keyboard.keys_down());
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    /// The I register.
    pub fn index(&self) -> u16 {
        self.addr
    }

    pub fn register(&self, x: u8) -> u8 {
        self.v[(x & 0xF) as usize]
    }

    pub fn registers(&self) -> &[u8; NUM_REGISTERS] {
        &self.v
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer
    }

    pub fn sound_timer(&self) -> u8 {
        self.sound_timer
    }

    /// True while the tone should play.
    pub fn is_sound_active(&self) -> bool {
        self.sound_timer > 0
    }

    pub fn graphics(&self) -> &Graphics {
        &self.graphics
    }

    /// The display as 0RGB pixels, ready for a framebuffer window.
    pub fn get_pixels(&self) -> Vec<u32> {
        self.graphics.to_rgb()
    }

    pub fn keyboard(&self) -> &Keyboard {
        &self.keyboard
    }

    pub fn stack(&self) -> &CallStack {
        &self.stack
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }
}

fn skip_if(condition: bool) -> u16 {
    if condition {
        SKIP_NEXT
    } else {
        INSTRUCTION_SIZE
    }
}

/// Vx + Vy, with the carry as flag.
pub(crate) fn add_with_carry(a: u8, b: u8) -> (u8, bool) {
    a.overflowing_add(b)
}

/// a - b, with "no borrow" (a >= b) as flag.
pub(crate) fn sub_no_borrow(a: u8, b: u8) -> (u8, bool) {
    let (value, borrow) = a.overflowing_sub(b);
    (value, !borrow)
}

/// Shift out the low bit.
pub(crate) fn shift_right(a: u8) -> (u8, bool) {
    (a >> 1, a & 1 == 1)
}

/// Shift out the high bit.
pub(crate) fn shift_left(a: u8) -> (u8, bool) {
    (a << 1, a >> 7 == 1)
}
