//! RV32I instruction encoders
//!
//! The six format packers are total functions: every field is masked to
//! its width, so out-of-range inputs are truncated rather than raised.
//! Range checking belongs to the callers (the assembler checks, the
//! random generator only draws in-range values).

use crate::opcodes::*;
use crate::utils::{extract_field, interpret_i32_as_unsigned, mask};

/// Mask value to width bits and shift it into position
fn field(value: u32, width: u32, shift: u32) -> u32 {
    (value & mask(width)) << shift
}

/// Make an R-type instruction
pub fn rtype(funct7: u32, rs2: u32, rs1: u32, funct3: u32, rd: u32, opcode: u32) -> u32 {
    field(funct7, 7, 25)
        | field(rs2, 5, 20)
        | field(rs1, 5, 15)
        | field(funct3, 3, 12)
        | field(rd, 5, 7)
        | field(opcode, 7, 0)
}

/// Make an I-type instruction. The immediate is signed; its low 12 bits
/// are placed in the instruction.
pub fn itype(imm: i32, rs1: u32, funct3: u32, rd: u32, opcode: u32) -> u32 {
    let imm = interpret_i32_as_unsigned(imm);
    field(imm, 12, 20)
        | field(rs1, 5, 15)
        | field(funct3, 3, 12)
        | field(rd, 5, 7)
        | field(opcode, 7, 0)
}

/// Make an S-type instruction (imm[11:5] and imm[4:0] split around rs1/rs2)
pub fn stype(imm: i32, rs2: u32, rs1: u32, funct3: u32, opcode: u32) -> u32 {
    let imm = interpret_i32_as_unsigned(imm);
    field(extract_field(imm, 11, 5), 7, 25)
        | field(rs2, 5, 20)
        | field(rs1, 5, 15)
        | field(funct3, 3, 12)
        | field(extract_field(imm, 4, 0), 5, 7)
        | field(opcode, 7, 0)
}

/// Make a B-type instruction. The immediate is a 13-bit signed branch
/// offset whose bit 0 is implicitly zero and is dropped.
pub fn btype(imm: i32, rs2: u32, rs1: u32, funct3: u32, opcode: u32) -> u32 {
    let imm = interpret_i32_as_unsigned(imm);
    let hi = (extract_field(imm, 12, 12) << 6) | extract_field(imm, 10, 5);
    let lo = (extract_field(imm, 4, 1) << 1) | extract_field(imm, 11, 11);
    field(hi, 7, 25)
        | field(rs2, 5, 20)
        | field(rs1, 5, 15)
        | field(funct3, 3, 12)
        | field(lo, 5, 7)
        | field(opcode, 7, 0)
}

/// Make a U-type instruction. The immediate is the 20-bit upper field
/// (already shifted down; it lands in instr[31:12]).
pub fn utype(imm: u32, rd: u32, opcode: u32) -> u32 {
    field(imm, 20, 12) | field(rd, 5, 7) | field(opcode, 7, 0)
}

/// Make a J-type instruction. The immediate is a 21-bit signed jump
/// offset whose bit 0 is implicitly zero and is dropped.
pub fn jtype(imm: i32, rd: u32, opcode: u32) -> u32 {
    let imm = interpret_i32_as_unsigned(imm);
    let shuffled = (extract_field(imm, 20, 20) << 19)
        | (extract_field(imm, 10, 1) << 9)
        | (extract_field(imm, 11, 11) << 8)
        | extract_field(imm, 19, 12);
    field(shuffled, 20, 12) | field(rd, 5, 7) | field(opcode, 7, 0)
}

macro_rules! rtype_instr {
    ($name:ident, $funct7:expr, $funct3:expr) => {
        pub fn $name(rd: u32, rs1: u32, rs2: u32) -> u32 {
            rtype($funct7, rs2, rs1, $funct3, rd, OP)
        }
    };
}

macro_rules! itype_instr {
    ($name:ident, $funct3:expr, $opcode:expr) => {
        pub fn $name(rd: u32, rs1: u32, imm: i32) -> u32 {
            itype(imm, rs1, $funct3, rd, $opcode)
        }
    };
}

/// The shift-by-immediate instructions use I-type, but with the lower 5
/// bits of the immediate holding the shift amount (shamt) and the upper
/// 7 bits distinguishing arithmetical from logical right shift.
macro_rules! shift_instr {
    ($name:ident, $upper:expr, $funct3:expr) => {
        pub fn $name(rd: u32, rs1: u32, shamt: u32) -> u32 {
            let imm = ($upper << 5) | (shamt & 0x1f);
            itype(imm as i32, rs1, $funct3, rd, OP_IMM)
        }
    };
}

macro_rules! stype_instr {
    ($name:ident, $funct3:expr) => {
        pub fn $name(rs2: u32, rs1: u32, imm: i32) -> u32 {
            stype(imm, rs2, rs1, $funct3, OP_STORE)
        }
    };
}

macro_rules! btype_instr {
    ($name:ident, $funct3:expr) => {
        pub fn $name(rs1: u32, rs2: u32, imm: i32) -> u32 {
            btype(imm, rs2, rs1, $funct3, OP_BRANCH)
        }
    };
}

/// Note: in LUI and AUIPC, the immediate is already the upper 20 bits
/// that will be loaded -- it will not be shifted up here.
macro_rules! utype_instr {
    ($name:ident, $opcode:expr) => {
        pub fn $name(rd: u32, imm: u32) -> u32 {
            utype(imm, rd, $opcode)
        }
    };
}

utype_instr!(lui, OP_LUI);
utype_instr!(auipc, OP_AUIPC);

pub fn jal(rd: u32, imm: i32) -> u32 {
    jtype(imm, rd, OP_JAL)
}

itype_instr!(jalr, 0b000, OP_JALR);

// Conditional branches
btype_instr!(beq, FUNCT3_BEQ);
btype_instr!(bne, FUNCT3_BNE);
btype_instr!(blt, FUNCT3_BLT);
btype_instr!(bge, FUNCT3_BGE);
btype_instr!(bltu, FUNCT3_BLTU);
btype_instr!(bgeu, FUNCT3_BGEU);

// Loads
itype_instr!(lb, FUNCT3_B, OP_LOAD);
itype_instr!(lh, FUNCT3_H, OP_LOAD);
itype_instr!(lw, FUNCT3_W, OP_LOAD);
itype_instr!(lbu, FUNCT3_BU, OP_LOAD);
itype_instr!(lhu, FUNCT3_HU, OP_LOAD);

// Stores
stype_instr!(sb, FUNCT3_B);
stype_instr!(sh, FUNCT3_H);
stype_instr!(sw, FUNCT3_W);

// Integer register-immediate instructions
itype_instr!(addi, FUNCT3_ADDI, OP_IMM);
itype_instr!(slti, FUNCT3_SLTI, OP_IMM);
itype_instr!(sltiu, FUNCT3_SLTIU, OP_IMM);
itype_instr!(xori, FUNCT3_XORI, OP_IMM);
itype_instr!(ori, FUNCT3_ORI, OP_IMM);
itype_instr!(andi, FUNCT3_ANDI, OP_IMM);

// Shift-by-immediate instructions
shift_instr!(slli, FUNCT7_BASE, FUNCT3_SLLI);
shift_instr!(srli, FUNCT7_BASE, FUNCT3_SRLI);
shift_instr!(srai, FUNCT7_SRA, FUNCT3_SRLI);

// Integer register-register instructions
rtype_instr!(add, FUNCT7_BASE, FUNCT3_ADD);
rtype_instr!(sub, FUNCT7_SUB, FUNCT3_ADD);
rtype_instr!(sll, FUNCT7_BASE, FUNCT3_SLL);
rtype_instr!(slt, FUNCT7_BASE, FUNCT3_SLT);
rtype_instr!(sltu, FUNCT7_BASE, FUNCT3_SLTU);
rtype_instr!(xor, FUNCT7_BASE, FUNCT3_XOR);
rtype_instr!(srl, FUNCT7_BASE, FUNCT3_SRL);
rtype_instr!(sra, FUNCT7_SRA, FUNCT3_SRL);
rtype_instr!(or, FUNCT7_BASE, FUNCT3_OR);
rtype_instr!(and, FUNCT7_BASE, FUNCT3_AND);

/// The canonical fence (fence iorw, iorw)
pub fn fence() -> u32 {
    itype(0x0ff, 0, 0b000, 0, OP_MISC_MEM)
}

pub fn ecall() -> u32 {
    itype(0, 0, 0b000, 0, OP_SYSTEM)
}

pub fn ebreak() -> u32 {
    itype(1, 0, 0b000, 0, OP_SYSTEM)
}
