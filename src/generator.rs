//! Constrained-random program generator
//!
//! Emits fully legal RV32I programs that terminate through the halt
//! protocol within a bounded number of steps, for differential testing
//! of the reference hart against an RTL core. Determinism matters more
//! than entropy here: a seed fully determines the program, so any
//! failing test can be replayed from its seed alone.

use crate::encode;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Base address of the data region (loaded into x1 by the preamble)
pub const DATA_BASE: u32 = 0x2000;

/// Size of the data region targeted by generated loads and stores
pub const DATA_SIZE: u32 = 0x2000;

/// Constants seeded into x2..x9 before the random body: zero, one,
/// all-ones, the signed 12-bit extremes, two bit patterns and a plain
/// small value, so early instructions have varied operands to chew on.
const SEED_CONSTANTS: [i32; 8] = [0, 1, -1, 2047, -2048, 0x555, -0x556, 42];

/// Instruction classes drawn by the weighted mix
#[derive(Debug, Clone, Copy)]
enum Kind {
    RegReg,
    RegImm,
    Shift,
    Load,
    Store,
    Lui,
    Auipc,
    Branch,
}

const MIX: [(Kind, u32); 8] = [
    (Kind::RegReg, 30),
    (Kind::RegImm, 20),
    (Kind::Shift, 10),
    (Kind::Load, 12),
    (Kind::Store, 10),
    (Kind::Lui, 5),
    (Kind::Auipc, 3),
    (Kind::Branch, 10),
];

/// Deterministic random program generator
#[derive(Debug)]
pub struct ProgramGenerator {
    rng: StdRng,
}

impl ProgramGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Generate a complete program: preamble, register seeding,
    /// num_instrs random instructions, halt epilogue
    pub fn generate(&mut self, num_instrs: usize) -> Vec<u32> {
        let mut words = Vec::with_capacity(num_instrs + SEED_CONSTANTS.len() + 5);

        // Preamble: x1 = DATA_BASE, the base register for every
        // generated load and store
        words.push(encode::lui(1, DATA_BASE >> 12));

        // Seed x2..x9 with interesting constants
        for (n, constant) in SEED_CONSTANTS.iter().enumerate() {
            words.push(encode::addi(2 + n as u32, 0, *constant));
        }

        for index in 0..num_instrs {
            words.push(self.random_instr(num_instrs - index));
        }

        // Halt epilogue: store x30 at the halt sentinel, then spin in
        // place in case the store is not honoured
        words.push(encode::addi(31, 0, -16));
        words.push(encode::addi(30, 0, 1));
        words.push(encode::sw(30, 31, 0));
        words.push(encode::jal(0, 0));

        debug!("generated program of {} words", words.len());
        words
    }

    /// A source or destination register for the random body; never x0
    /// (immutable), x1 (the data base) or x31 (the halt epilogue's)
    fn reg(&mut self) -> u32 {
        self.rng.gen_range(2..=30)
    }

    fn random_instr(&mut self, remaining: usize) -> u32 {
        let total: u32 = MIX.iter().map(|(_, weight)| weight).sum();
        let mut pick = self.rng.gen_range(0..total);
        for (kind, weight) in MIX {
            if pick < weight {
                return self.emit(kind, remaining);
            }
            pick -= weight;
        }
        unreachable!("mix weights are exhaustive")
    }

    /// A load/store offset on the natural alignment grid of the access
    /// width, within [0, DATA_SIZE)
    fn aligned_offset(&mut self, width: u32) -> i32 {
        (self.rng.gen_range(0..DATA_SIZE / width) * width) as i32
    }

    fn emit(&mut self, kind: Kind, remaining: usize) -> u32 {
        match kind {
            Kind::RegReg => {
                let (rd, rs1, rs2) = (self.reg(), self.reg(), self.reg());
                let ops = [
                    encode::add,
                    encode::sub,
                    encode::sll,
                    encode::slt,
                    encode::sltu,
                    encode::xor,
                    encode::srl,
                    encode::sra,
                    encode::or,
                    encode::and,
                ];
                ops[self.rng.gen_range(0..ops.len())](rd, rs1, rs2)
            }
            Kind::RegImm => {
                let (rd, rs1) = (self.reg(), self.reg());
                let imm = self.rng.gen_range(-2048..=2047);
                let ops = [
                    encode::addi,
                    encode::slti,
                    encode::sltiu,
                    encode::xori,
                    encode::ori,
                    encode::andi,
                ];
                ops[self.rng.gen_range(0..ops.len())](rd, rs1, imm)
            }
            Kind::Shift => {
                let (rd, rs1) = (self.reg(), self.reg());
                let shamt = self.rng.gen_range(0..=31);
                let ops = [encode::slli, encode::srli, encode::srai];
                ops[self.rng.gen_range(0..ops.len())](rd, rs1, shamt)
            }
            Kind::Load => {
                let rd = self.reg();
                let ops: [(fn(u32, u32, i32) -> u32, u32); 5] = [
                    (encode::lb, 1),
                    (encode::lh, 2),
                    (encode::lw, 4),
                    (encode::lbu, 1),
                    (encode::lhu, 2),
                ];
                let (op, width) = ops[self.rng.gen_range(0..ops.len())];
                op(rd, 1, self.aligned_offset(width))
            }
            Kind::Store => {
                let src = self.reg();
                let ops: [(fn(u32, u32, i32) -> u32, u32); 3] =
                    [(encode::sb, 1), (encode::sh, 2), (encode::sw, 4)];
                let (op, width) = ops[self.rng.gen_range(0..ops.len())];
                op(src, 1, self.aligned_offset(width))
            }
            Kind::Lui => encode::lui(self.reg(), self.rng.gen_range(0..=0xfffff)),
            Kind::Auipc => encode::auipc(self.reg(), self.rng.gen_range(0..=0xfffff)),
            Kind::Branch => {
                // Bounded forward skip only, staying clear of the
                // epilogue; fall back to an ALU op when the remaining
                // window is empty
                let window = remaining.saturating_sub(2).min(5);
                if window < 1 {
                    return self.emit(Kind::RegReg, remaining);
                }
                let skip = self.rng.gen_range(1..=window) as i32;
                let (rs1, rs2) = (self.reg(), self.reg());
                let ops = [
                    encode::beq,
                    encode::bne,
                    encode::blt,
                    encode::bge,
                    encode::bltu,
                    encode::bgeu,
                ];
                ops[self.rng.gen_range(0..ops.len())](rs1, rs2, 4 * skip)
            }
        }
    }
}
