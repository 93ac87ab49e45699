use std::fmt;

/// The 35 CHIP 8 op codes, plus a catch-all for words that aren't one.
///
/// Register operands (`x`, `y`) are guaranteed to be between 0x0 and 0xF,
/// addresses to fit in 12 bits.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Op {
    // 0NNN 	Call 		Calls RCA 1802 program at address NNN. Not necessary for most ROMs.
    CallRca(u16),
    // 00E0 	Display 	disp_clear() 	Clears the screen.
    DispClear,
    // 00EE 	Flow 	return; 	Returns from a subroutine.
    Return,

    // 1NNN 	Flow 	goto NNN; 	Jumps to address NNN.
    Goto(u16),
    // 2NNN 	Flow 	*(0xNNN)() 	Calls subroutine at NNN.
    GotoSubRtn(u16),

    // 3XNN 	Cond 	if(Vx==NN) 	Skips the next instruction if VX equals NN.
    CondVxEq(u8, u8),
    // 4XNN 	Cond 	if(Vx!=NN)
    CondVxNe(u8, u8),
    // 5XY0 	Cond 	if(Vx==Vy)
    CondVxVyEq(u8, u8),

    // 6XNN 	Const 	Vx = NN
    ConstSetVx(u8, u8),
    // 7XNN 	Const 	Vx += NN 	Carry flag is not changed.
    ConstAddVx(u8, u8),

    // 8XY_ 	Assign, BitOp and Math on Vx and Vy
    AssignVyToVx(u8, u8),
    BitOpOr(u8, u8),
    BitOpAnd(u8, u8),
    BitOpXor(u8, u8),
    MathVxAddVy(u8, u8),
    MathVxMinusVy(u8, u8),
    BitOpRtShift(u8),
    MathVyMinusVx(u8, u8),
    BitOpLftShift(u8),

    // 9XY0 	Cond 	if(Vx!=Vy)
    CondVxVyNe(u8, u8),

    // ANNN 	MEM 	I = NNN
    MemSetI(u16),
    // BNNN 	Flow 	PC=V0+NNN
    GotoPlusV0(u16),
    // CXNN 	Rand 	Vx=rand()&NN
    Rand(u8, u8),
    // DXYN 	Disp 	draw(Vx,Vy,N)
    DispDraw(u8, u8, u8),

    // EX9E / EXA1 	KeyOp 	skip if key()==Vx / key()!=Vx
    KeyOpEqVx(u8),
    KeyOpNeVx(u8),

    // FX__ 	Timers, KeyOp, MEM, BCD
    DelayGet(u8),
    KeyOpGet(u8),
    DelaySet(u8),
    SoundSet(u8),
    MemIPlusEqVx(u8),
    MemISetSprite(u8),
    Bcd(u8),
    RegDump(u8),
    RegLoad(u8),

    /// Not part of the instruction set. Carries the raw word.
    Unknown(u16),
}

impl Op {
    /// True for the two ops that change the display.
    pub fn is_display_op(&self) -> bool {
        matches!(self, Op::DispClear | Op::DispDraw(..))
    }

    /// True for ops that write VF as a carry, borrow, shift-out or
    /// collision flag.
    pub fn sets_flag(&self) -> bool {
        matches!(
            self,
            Op::MathVxAddVy(..)
                | Op::MathVxMinusVy(..)
                | Op::BitOpRtShift(_)
                | Op::MathVyMinusVx(..)
                | Op::BitOpLftShift(_)
                | Op::DispDraw(..)
                | Op::MemIPlusEqVx(_)
        )
    }
}

impl From<u16> for Op {
    fn from(item: u16) -> Self {
        let mask = 0xF;

        // these are the 4 nibbles of item, where nibb_1 is the MSB and nibb_4 is the LSB
        let nibb_1 = ((item >> 12) & mask) as u8;
        let nibb_2 = ((item >> 8) & mask) as u8;
        let nibb_3 = ((item >> 4) & mask) as u8;
        let nibb_4 = (item & mask) as u8;
        let nibbles = [nibb_1, nibb_2, nibb_3, nibb_4];

        let addr = item & 0x0FFF;
        let byte = (item & 0x00FF) as u8;

        match nibbles {
            [0x0, ..] => match item {
                0x00E0 => Op::DispClear,
                0x00EE => Op::Return,
                _ => Op::CallRca(addr),
            },
            [0x1, ..] => Op::Goto(addr),
            [0x2, ..] => Op::GotoSubRtn(addr),
            [0x3, x, _, _] => Op::CondVxEq(x, byte),
            [0x4, x, _, _] => Op::CondVxNe(x, byte),
            [0x5, x, y, 0x0] => Op::CondVxVyEq(x, y),
            [0x6, x, _, _] => Op::ConstSetVx(x, byte),
            [0x7, x, _, _] => Op::ConstAddVx(x, byte),
            [0x8, x, y, n] => match n {
                0x0 => Op::AssignVyToVx(x, y),
                0x1 => Op::BitOpOr(x, y),
                0x2 => Op::BitOpAnd(x, y),
                0x3 => Op::BitOpXor(x, y),
                0x4 => Op::MathVxAddVy(x, y),
                0x5 => Op::MathVxMinusVy(x, y),
                0x6 => Op::BitOpRtShift(x),
                0x7 => Op::MathVyMinusVx(x, y),
                0xE => Op::BitOpLftShift(x),
                _ => Op::Unknown(item),
            },
            [0x9, x, y, 0x0] => Op::CondVxVyNe(x, y),
            [0xA, ..] => Op::MemSetI(addr),
            [0xB, ..] => Op::GotoPlusV0(addr),
            [0xC, x, _, _] => Op::Rand(x, byte),
            [0xD, x, y, n] => Op::DispDraw(x, y, n),
            [0xE, x, _, _] => match byte {
                0x9E => Op::KeyOpEqVx(x),
                0xA1 => Op::KeyOpNeVx(x),
                _ => Op::Unknown(item),
            },
            [0xF, x, _, _] => match byte {
                0x07 => Op::DelayGet(x),
                0x0A => Op::KeyOpGet(x),
                0x15 => Op::DelaySet(x),
                0x18 => Op::SoundSet(x),
                0x1E => Op::MemIPlusEqVx(x),
                0x29 => Op::MemISetSprite(x),
                0x33 => Op::Bcd(x),
                0x55 => Op::RegDump(x),
                0x65 => Op::RegLoad(x),
                _ => Op::Unknown(item),
            },
            _ => Op::Unknown(item),
        }
    }
}

/// Conventional CHIP-8 assembler mnemonics.
impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Op::CallRca(a) => write!(f, "SYS 0x{:03x}", a),
            Op::DispClear => write!(f, "CLS"),
            Op::Return => write!(f, "RET"),
            Op::Goto(a) => write!(f, "JP 0x{:03x}", a),
            Op::GotoSubRtn(a) => write!(f, "CALL 0x{:03x}", a),
            Op::CondVxEq(x, kk) => write!(f, "SE V{:x}, 0x{:02x}", x, kk),
            Op::CondVxNe(x, kk) => write!(f, "SNE V{:x}, 0x{:02x}", x, kk),
            Op::CondVxVyEq(x, y) => write!(f, "SE V{:x}, V{:x}", x, y),
            Op::ConstSetVx(x, kk) => write!(f, "LD V{:x}, 0x{:02x}", x, kk),
            Op::ConstAddVx(x, kk) => write!(f, "ADD V{:x}, 0x{:02x}", x, kk),
            Op::AssignVyToVx(x, y) => write!(f, "LD V{:x}, V{:x}", x, y),
            Op::BitOpOr(x, y) => write!(f, "OR V{:x}, V{:x}", x, y),
            Op::BitOpAnd(x, y) => write!(f, "AND V{:x}, V{:x}", x, y),
            Op::BitOpXor(x, y) => write!(f, "XOR V{:x}, V{:x}", x, y),
            Op::MathVxAddVy(x, y) => write!(f, "ADD V{:x}, V{:x}", x, y),
            Op::MathVxMinusVy(x, y) => write!(f, "SUB V{:x}, V{:x}", x, y),
            Op::BitOpRtShift(x) => write!(f, "SHR V{:x}", x),
            Op::MathVyMinusVx(x, y) => write!(f, "SUBN V{:x}, V{:x}", x, y),
            Op::BitOpLftShift(x) => write!(f, "SHL V{:x}", x),
            Op::CondVxVyNe(x, y) => write!(f, "SNE V{:x}, V{:x}", x, y),
            Op::MemSetI(a) => write!(f, "LD I, 0x{:03x}", a),
            Op::GotoPlusV0(a) => write!(f, "JP V0, 0x{:03x}", a),
            Op::Rand(x, kk) => write!(f, "RND V{:x}, 0x{:02x}", x, kk),
            Op::DispDraw(x, y, n) => write!(f, "DRW V{:x}, V{:x}, {}", x, y, n),
            Op::KeyOpEqVx(x) => write!(f, "SKP V{:x}", x),
            Op::KeyOpNeVx(x) => write!(f, "SKNP V{:x}", x),
            Op::DelayGet(x) => write!(f, "LD V{:x}, DT", x),
            Op::KeyOpGet(x) => write!(f, "LD V{:x}, K", x),
            Op::DelaySet(x) => write!(f, "LD DT, V{:x}", x),
            Op::SoundSet(x) => write!(f, "LD ST, V{:x}", x),
            Op::MemIPlusEqVx(x) => write!(f, "ADD I, V{:x}", x),
            Op::MemISetSprite(x) => write!(f, "LD F, V{:x}", x),
            Op::Bcd(x) => write!(f, "LD B, V{:x}", x),
            Op::RegDump(x) => write!(f, "LD [I], V{:x}", x),
            Op::RegLoad(x) => write!(f, "LD V{:x}, [I]", x),
            Op::Unknown(w) => write!(f, "UNKNOWN 0x{:04x}", w),
        }
    }
}

/// Decode a raw program image word by word. `origin` is the address the
/// first byte would be loaded at. A trailing odd byte is not decoded.
pub fn disassemble(bytes: &[u8], origin: u16) -> impl Iterator<Item = (u16, u16, Op)> + '_ {
    bytes.chunks_exact(2).enumerate().map(move |(i, pair)| {
        let word = u16::from_be_bytes([pair[0], pair[1]]);
        let addr = origin.wrapping_add((i * 2) as u16);
        (addr, word, Op::from(word))
    })
}
