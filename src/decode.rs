//! Strict decoder from 32-bit words to RV32I instructions
//!
//! The decoder itself rejects words that are not valid RV32I base
//! encodings; the interpreter maps those rejections to the permissive
//! no-operation semantics, so guest programs can never raise.

use crate::opcodes::*;
use crate::utils::{extract_field, interpret_u32_as_signed, sign_extend};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid or unimplemented opcode 0b{0:07b}")]
    InvalidOpcode(u32),
    #[error("invalid funct3 0b{funct3:03b} for opcode 0b{opcode:07b}")]
    InvalidFunct3 { opcode: u32, funct3: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Beq,
    Bne,
    Blt,
    Bge,
    Bltu,
    Bgeu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Load {
    Lb,
    Lh,
    Lw,
    Lbu,
    Lhu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Store {
    Sb,
    Sh,
    Sw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegImm {
    Addi,
    Slti,
    Sltiu,
    Xori,
    Ori,
    Andi,
    Slli,
    Srli,
    Srai,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegReg {
    Add,
    Sub,
    Sll,
    Slt,
    Sltu,
    Xor,
    Srl,
    Sra,
    Or,
    And,
}

/// RV32I instructions
///
/// Register fields hold the index of the register, not its value.
/// Immediates are stored already sign-extended, so execution never
/// needs to re-derive signs from raw fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instr {
    /// Load u_immediate into bits [31:12] of dest, low bits zero
    Lui { dest: u8, u_immediate: u32 },
    /// dest = pc + (u_immediate << 12)
    Auipc { dest: u8, u_immediate: u32 },
    /// dest = pc + 4; pc = pc + offset (offset is a multiple of 2)
    Jal { dest: u8, offset: i32 },
    /// dest = pc + 4; pc = (base + offset) with bit 0 cleared
    Jalr { dest: u8, base: u8, offset: i32 },
    /// If the comparison selected by mnemonic holds between src1 and
    /// src2, pc = pc + offset; else fall through
    Branch {
        mnemonic: Branch,
        src1: u8,
        src2: u8,
        offset: i32,
    },
    /// dest = memory[base + offset], width and extension per mnemonic
    Load {
        mnemonic: Load,
        dest: u8,
        base: u8,
        offset: i32,
    },
    /// memory[base + offset] = src, width per mnemonic
    Store {
        mnemonic: Store,
        src: u8,
        base: u8,
        offset: i32,
    },
    /// dest = src op i_immediate. For the shift mnemonics the low five
    /// bits of i_immediate are the shift amount.
    RegImm {
        mnemonic: RegImm,
        dest: u8,
        src: u8,
        i_immediate: i32,
    },
    /// dest = src1 op src2
    RegReg {
        mnemonic: RegReg,
        dest: u8,
        src1: u8,
        src2: u8,
    },
    /// Memory ordering fence; a no-op on this single-hart model
    Fence,
    /// ECALL/EBREAK; no-ops here (no execution environment services)
    System,
}

/// Makes a function called $name which gets that field from a 32-bit
/// instruction (bits instr[$end:$start] in verilog notation).
macro_rules! field_getter {
    ($name:ident, $ty:ty, $end:expr, $start:expr) => {
        fn $name(instr: u32) -> $ty {
            extract_field(instr, $end, $start) as $ty
        }
    };
}

field_getter!(rd, u8, 11, 7);
field_getter!(rs1, u8, 19, 15);
field_getter!(rs2, u8, 24, 20);
field_getter!(funct3, u32, 14, 12);
field_getter!(u_immediate, u32, 31, 12);

/// In RV32I the funct7 field only selects the second operation of a
/// funct3 pair (sub/sra/srai), and only through bit 5 (instruction
/// bit 30).
fn funct7_bit5(instr: u32) -> bool {
    extract_field(instr, 30, 30) == 1
}

fn imm_itype(instr: u32) -> i32 {
    interpret_u32_as_signed(sign_extend(extract_field(instr, 31, 20), 11))
}

fn imm_stype(instr: u32) -> i32 {
    let imm = (extract_field(instr, 31, 25) << 5) | extract_field(instr, 11, 7);
    interpret_u32_as_signed(sign_extend(imm, 11))
}

fn imm_btype(instr: u32) -> i32 {
    let imm = (extract_field(instr, 31, 31) << 12)
        | (extract_field(instr, 7, 7) << 11)
        | (extract_field(instr, 30, 25) << 5)
        | (extract_field(instr, 11, 8) << 1);
    interpret_u32_as_signed(sign_extend(imm, 12))
}

fn imm_jtype(instr: u32) -> i32 {
    let imm = (extract_field(instr, 31, 31) << 20)
        | (extract_field(instr, 19, 12) << 12)
        | (extract_field(instr, 20, 20) << 11)
        | (extract_field(instr, 30, 21) << 1);
    interpret_u32_as_signed(sign_extend(imm, 20))
}

impl Instr {
    pub fn decode(instr: u32) -> Result<Self, DecodeError> {
        let op = extract_field(instr, 6, 0);
        match op {
            OP_LUI => Ok(Self::Lui {
                dest: rd(instr),
                u_immediate: u_immediate(instr),
            }),
            OP_AUIPC => Ok(Self::Auipc {
                dest: rd(instr),
                u_immediate: u_immediate(instr),
            }),
            OP_JAL => Ok(Self::Jal {
                dest: rd(instr),
                offset: imm_jtype(instr),
            }),
            OP_JALR => {
                if funct3(instr) != 0b000 {
                    return Err(DecodeError::InvalidFunct3 {
                        opcode: op,
                        funct3: funct3(instr),
                    });
                }
                Ok(Self::Jalr {
                    dest: rd(instr),
                    base: rs1(instr),
                    offset: imm_itype(instr),
                })
            }
            OP_BRANCH => {
                let mnemonic = match funct3(instr) {
                    FUNCT3_BEQ => Branch::Beq,
                    FUNCT3_BNE => Branch::Bne,
                    FUNCT3_BLT => Branch::Blt,
                    FUNCT3_BGE => Branch::Bge,
                    FUNCT3_BLTU => Branch::Bltu,
                    FUNCT3_BGEU => Branch::Bgeu,
                    funct3 => return Err(DecodeError::InvalidFunct3 { opcode: op, funct3 }),
                };
                Ok(Self::Branch {
                    mnemonic,
                    src1: rs1(instr),
                    src2: rs2(instr),
                    offset: imm_btype(instr),
                })
            }
            OP_LOAD => {
                let mnemonic = match funct3(instr) {
                    FUNCT3_B => Load::Lb,
                    FUNCT3_H => Load::Lh,
                    FUNCT3_W => Load::Lw,
                    FUNCT3_BU => Load::Lbu,
                    FUNCT3_HU => Load::Lhu,
                    funct3 => return Err(DecodeError::InvalidFunct3 { opcode: op, funct3 }),
                };
                Ok(Self::Load {
                    mnemonic,
                    dest: rd(instr),
                    base: rs1(instr),
                    offset: imm_itype(instr),
                })
            }
            OP_STORE => {
                let mnemonic = match funct3(instr) {
                    FUNCT3_B => Store::Sb,
                    FUNCT3_H => Store::Sh,
                    FUNCT3_W => Store::Sw,
                    funct3 => return Err(DecodeError::InvalidFunct3 { opcode: op, funct3 }),
                };
                Ok(Self::Store {
                    mnemonic,
                    src: rs2(instr),
                    base: rs1(instr),
                    offset: imm_stype(instr),
                })
            }
            OP_IMM => {
                let mnemonic = match funct3(instr) {
                    FUNCT3_ADDI => RegImm::Addi,
                    FUNCT3_SLTI => RegImm::Slti,
                    FUNCT3_SLTIU => RegImm::Sltiu,
                    FUNCT3_XORI => RegImm::Xori,
                    FUNCT3_ORI => RegImm::Ori,
                    FUNCT3_ANDI => RegImm::Andi,
                    FUNCT3_SLLI => RegImm::Slli,
                    FUNCT3_SRLI => {
                        if funct7_bit5(instr) {
                            RegImm::Srai
                        } else {
                            RegImm::Srli
                        }
                    }
                    funct3 => return Err(DecodeError::InvalidFunct3 { opcode: op, funct3 }),
                };
                Ok(Self::RegImm {
                    mnemonic,
                    dest: rd(instr),
                    src: rs1(instr),
                    i_immediate: imm_itype(instr),
                })
            }
            OP => {
                let mnemonic = match funct3(instr) {
                    FUNCT3_ADD => {
                        if funct7_bit5(instr) {
                            RegReg::Sub
                        } else {
                            RegReg::Add
                        }
                    }
                    FUNCT3_SLL => RegReg::Sll,
                    FUNCT3_SLT => RegReg::Slt,
                    FUNCT3_SLTU => RegReg::Sltu,
                    FUNCT3_XOR => RegReg::Xor,
                    FUNCT3_SRL => {
                        if funct7_bit5(instr) {
                            RegReg::Sra
                        } else {
                            RegReg::Srl
                        }
                    }
                    FUNCT3_OR => RegReg::Or,
                    FUNCT3_AND => RegReg::And,
                    funct3 => return Err(DecodeError::InvalidFunct3 { opcode: op, funct3 }),
                };
                Ok(Self::RegReg {
                    mnemonic,
                    dest: rd(instr),
                    src1: rs1(instr),
                    src2: rs2(instr),
                })
            }
            OP_MISC_MEM => Ok(Self::Fence),
            OP_SYSTEM => Ok(Self::System),
            _ => Err(DecodeError::InvalidOpcode(op)),
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lui { dest, u_immediate } => write!(f, "lui x{dest}, 0x{u_immediate:x}"),
            Self::Auipc { dest, u_immediate } => write!(f, "auipc x{dest}, 0x{u_immediate:x}"),
            Self::Jal { dest, offset } => write!(f, "jal x{dest}, {offset}"),
            Self::Jalr { dest, base, offset } => write!(f, "jalr x{dest}, x{base}, {offset}"),
            Self::Branch {
                mnemonic,
                src1,
                src2,
                offset,
            } => {
                let m = match mnemonic {
                    Branch::Beq => "beq",
                    Branch::Bne => "bne",
                    Branch::Blt => "blt",
                    Branch::Bge => "bge",
                    Branch::Bltu => "bltu",
                    Branch::Bgeu => "bgeu",
                };
                write!(f, "{m} x{src1}, x{src2}, {offset}")
            }
            Self::Load {
                mnemonic,
                dest,
                base,
                offset,
            } => {
                let m = match mnemonic {
                    Load::Lb => "lb",
                    Load::Lh => "lh",
                    Load::Lw => "lw",
                    Load::Lbu => "lbu",
                    Load::Lhu => "lhu",
                };
                write!(f, "{m} x{dest}, {offset}(x{base})")
            }
            Self::Store {
                mnemonic,
                src,
                base,
                offset,
            } => {
                let m = match mnemonic {
                    Store::Sb => "sb",
                    Store::Sh => "sh",
                    Store::Sw => "sw",
                };
                write!(f, "{m} x{src}, {offset}(x{base})")
            }
            Self::RegImm {
                mnemonic,
                dest,
                src,
                i_immediate,
            } => {
                let m = match mnemonic {
                    RegImm::Addi => "addi",
                    RegImm::Slti => "slti",
                    RegImm::Sltiu => "sltiu",
                    RegImm::Xori => "xori",
                    RegImm::Ori => "ori",
                    RegImm::Andi => "andi",
                    RegImm::Slli => "slli",
                    RegImm::Srli => "srli",
                    RegImm::Srai => "srai",
                };
                match mnemonic {
                    RegImm::Slli | RegImm::Srli | RegImm::Srai => {
                        write!(f, "{m} x{dest}, x{src}, {}", i_immediate & 0x1f)
                    }
                    _ => write!(f, "{m} x{dest}, x{src}, {i_immediate}"),
                }
            }
            Self::RegReg {
                mnemonic,
                dest,
                src1,
                src2,
            } => {
                let m = match mnemonic {
                    RegReg::Add => "add",
                    RegReg::Sub => "sub",
                    RegReg::Sll => "sll",
                    RegReg::Slt => "slt",
                    RegReg::Sltu => "sltu",
                    RegReg::Xor => "xor",
                    RegReg::Srl => "srl",
                    RegReg::Sra => "sra",
                    RegReg::Or => "or",
                    RegReg::And => "and",
                };
                write!(f, "{m} x{dest}, x{src1}, x{src2}")
            }
            Self::Fence => write!(f, "fence"),
            Self::System => write!(f, "ecall/ebreak"),
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::encode;

    #[test]
    fn check_rtype_roundtrip() {
        let instr = Instr::decode(encode::sub(3, 4, 1)).unwrap();
        assert_eq!(
            instr,
            Instr::RegReg {
                mnemonic: RegReg::Sub,
                dest: 3,
                src1: 4,
                src2: 1
            }
        );
    }

    #[test]
    fn check_itype_roundtrip_negative() {
        let instr = Instr::decode(encode::addi(1, 2, -23)).unwrap();
        assert_eq!(
            instr,
            Instr::RegImm {
                mnemonic: RegImm::Addi,
                dest: 1,
                src: 2,
                i_immediate: -23
            }
        );
    }

    #[test]
    fn check_shift_decode() {
        let instr = Instr::decode(encode::srai(2, 1, 31)).unwrap();
        match instr {
            Instr::RegImm {
                mnemonic: RegImm::Srai,
                i_immediate,
                ..
            } => assert_eq!(i_immediate & 0x1f, 31),
            other => panic!("decoded {other:?}"),
        }
        let instr = Instr::decode(encode::srli(2, 1, 31)).unwrap();
        assert!(matches!(
            instr,
            Instr::RegImm {
                mnemonic: RegImm::Srli,
                ..
            }
        ));
    }

    #[test]
    fn check_stype_roundtrip() {
        let instr = Instr::decode(encode::sw(30, 31, -16)).unwrap();
        assert_eq!(
            instr,
            Instr::Store {
                mnemonic: Store::Sw,
                src: 30,
                base: 31,
                offset: -16
            }
        );
    }

    #[test]
    fn check_btype_roundtrip() {
        for offset in [-4096, -2048, -4, 4, 64, 4094] {
            let instr = Instr::decode(encode::beq(1, 2, offset)).unwrap();
            assert_eq!(
                instr,
                Instr::Branch {
                    mnemonic: Branch::Beq,
                    src1: 1,
                    src2: 2,
                    offset
                }
            );
        }
    }

    #[test]
    fn check_jtype_roundtrip() {
        for offset in [-1048576, -4, 0, 2, 4, 1048574] {
            let instr = Instr::decode(encode::jal(5, offset)).unwrap();
            // Bit 0 of the offset is implicitly zero
            let expected = offset & !1;
            assert_eq!(
                instr,
                Instr::Jal {
                    dest: 5,
                    offset: expected
                }
            );
        }
    }

    #[test]
    fn check_utype_roundtrip() {
        let instr = Instr::decode(encode::lui(6, 0xfffff)).unwrap();
        assert_eq!(
            instr,
            Instr::Lui {
                dest: 6,
                u_immediate: 0xfffff
            }
        );
    }

    #[test]
    fn check_fence_and_system() {
        assert_eq!(Instr::decode(encode::fence()).unwrap(), Instr::Fence);
        assert_eq!(Instr::decode(encode::ecall()).unwrap(), Instr::System);
        assert_eq!(Instr::decode(encode::ebreak()).unwrap(), Instr::System);
    }

    #[test]
    fn check_invalid_opcode() {
        assert_eq!(
            Instr::decode(0xffff_ffff),
            Err(DecodeError::InvalidOpcode(0b1111111))
        );
        assert_eq!(Instr::decode(0), Err(DecodeError::InvalidOpcode(0)));
    }

    #[test]
    fn check_invalid_funct3() {
        // Branch funct3 0b010 does not exist
        let word = encode::btype(8, 2, 1, 0b010, crate::opcodes::OP_BRANCH);
        assert_eq!(
            Instr::decode(word),
            Err(DecodeError::InvalidFunct3 {
                opcode: crate::opcodes::OP_BRANCH,
                funct3: 0b010
            })
        );
    }
}
