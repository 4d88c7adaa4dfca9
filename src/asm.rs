//! Two-pass RV32I assembler
//!
//! Pass 1 strips comments, collects labels and expands
//! pseudo-instructions, assigning each real instruction a 4-byte slot
//! starting from address 0. Pass 2 encodes every pending instruction,
//! resolving labels PC-relative for branches and jumps and absolute
//! everywhere else.
//!
//! In contrast to the permissive interpreter, the assembler is strict:
//! every malformed register, mnemonic, immediate or label is a hard
//! error, so user mistakes surface instead of assembling to garbage.

use crate::encode;
use itertools::Itertools;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AsmError {
    #[error("line {line}: unknown register name '{name}'")]
    UnknownRegister { line: usize, name: String },
    #[error("line {line}: unknown mnemonic '{name}'")]
    UnknownMnemonic { line: usize, name: String },
    #[error("line {line}: immediate {value} does not fit in a {width}-bit field")]
    ImmediateOutOfRange { line: usize, value: i64, width: u32 },
    #[error("line {line}: undefined label '{name}'")]
    UndefinedLabel { line: usize, name: String },
    #[error("line {line}: label '{name}' defined more than once")]
    DuplicateLabel { line: usize, name: String },
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
}

/// Assemble a source listing into instruction words
pub fn assemble(source: &str) -> Result<Vec<u32>, AsmError> {
    let (pending, labels) = first_pass(source)?;
    pending
        .iter()
        .map(|instr| encode_instruction(&instr.text, instr.addr, &labels, instr.line))
        .collect()
}

/// Assemble straight to $readmemh text
pub fn assemble_to_hex(source: &str) -> Result<String, AsmError> {
    Ok(crate::image::to_hex(&assemble(source)?))
}

/// A real (post-expansion) instruction waiting for pass 2, tagged with
/// its byte address and originating source line
#[derive(Debug)]
struct PendingInstr {
    addr: u32,
    line: usize,
    text: String,
}

fn first_pass(source: &str) -> Result<(Vec<PendingInstr>, HashMap<String, u32>), AsmError> {
    let mut pending = Vec::new();
    let mut labels = HashMap::new();
    let mut addr: u32 = 0;
    for (index, raw) in source.lines().enumerate() {
        let line = index + 1;
        let mut text = strip_comment(raw).trim();
        while let Some((label, rest)) = split_label(text) {
            if labels.insert(label.to_string(), addr).is_some() {
                return Err(AsmError::DuplicateLabel {
                    line,
                    name: label.to_string(),
                });
            }
            text = rest.trim();
        }
        if text.is_empty() {
            continue;
        }
        for expanded in expand_pseudo(text, line)? {
            pending.push(PendingInstr {
                addr,
                line,
                text: expanded,
            });
            addr += 4;
        }
    }
    Ok((pending, labels))
}

/// Cut the line at the first '#' or '//'
fn strip_comment(line: &str) -> &str {
    let end = line.find('#').unwrap_or(line.len());
    let end = line.find("//").map_or(end, |i| i.min(end));
    &line[..end]
}

/// If the line starts with 'name:' where name is a valid label, split
/// it off (an instruction may follow on the same line)
fn split_label(text: &str) -> Option<(&str, &str)> {
    let colon = text.find(':')?;
    let label = text[..colon].trim();
    if is_label(label) {
        Some((label, &text[colon + 1..]))
    } else {
        None
    }
}

fn is_label(token: &str) -> bool {
    let mut chars = token.chars();
    chars
        .next()
        .map_or(false, |c| c.is_ascii_alphabetic() || c == '_' || c == '.')
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn split_mnemonic(text: &str) -> (&str, &str) {
    let text = text.trim();
    match text.find(char::is_whitespace) {
        Some(i) => (&text[..i], &text[i..]),
        None => (text, ""),
    }
}

/// Split an operand list on commas and whitespace
fn operand_list(rest: &str) -> Vec<&str> {
    rest.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .collect()
}

fn arity_error(ops: &[&str], expected: usize, line: usize) -> AsmError {
    AsmError::Syntax {
        line,
        message: format!("expected {expected} operand(s), got {}", ops.len()),
    }
}

fn one<'a>(ops: &[&'a str], line: usize) -> Result<&'a str, AsmError> {
    ops.iter()
        .copied()
        .collect_tuple()
        .map(|(a,)| a)
        .ok_or_else(|| arity_error(ops, 1, line))
}

fn two<'a>(ops: &[&'a str], line: usize) -> Result<(&'a str, &'a str), AsmError> {
    ops.iter()
        .copied()
        .collect_tuple()
        .ok_or_else(|| arity_error(ops, 2, line))
}

fn three<'a>(ops: &[&'a str], line: usize) -> Result<(&'a str, &'a str, &'a str), AsmError> {
    ops.iter()
        .copied()
        .collect_tuple()
        .ok_or_else(|| arity_error(ops, 3, line))
}

fn none(ops: &[&str], line: usize) -> Result<(), AsmError> {
    if ops.is_empty() {
        Ok(())
    } else {
        Err(arity_error(ops, 0, line))
    }
}

/// Rewrite a pseudo-instruction into one or more real instructions.
/// Anything that is not a recognised pseudo-op passes through for
/// pass 2 to encode (or reject).
fn expand_pseudo(text: &str, line: usize) -> Result<Vec<String>, AsmError> {
    let (mnemonic, rest) = split_mnemonic(text);
    let ops = operand_list(rest);
    let expansion = match mnemonic {
        "nop" => {
            none(&ops, line)?;
            vec!["addi x0, x0, 0".to_string()]
        }
        "mv" => {
            let (rd, rs) = two(&ops, line)?;
            vec![format!("addi {rd}, {rs}, 0")]
        }
        "li" => {
            let (rd, imm) = two(&ops, line)?;
            return expand_li(rd, imm, line);
        }
        "j" => {
            let target = one(&ops, line)?;
            vec![format!("jal x0, {target}")]
        }
        "jr" => {
            let rs = one(&ops, line)?;
            vec![format!("jalr x0, {rs}, 0")]
        }
        "ret" => {
            none(&ops, line)?;
            vec!["jalr x0, ra, 0".to_string()]
        }
        "call" => {
            let target = one(&ops, line)?;
            vec![format!("jal ra, {target}")]
        }
        "not" => {
            let (rd, rs) = two(&ops, line)?;
            vec![format!("xori {rd}, {rs}, -1")]
        }
        "neg" => {
            let (rd, rs) = two(&ops, line)?;
            vec![format!("sub {rd}, x0, {rs}")]
        }
        "beqz" => {
            let (rs, target) = two(&ops, line)?;
            vec![format!("beq {rs}, x0, {target}")]
        }
        "bnez" => {
            let (rs, target) = two(&ops, line)?;
            vec![format!("bne {rs}, x0, {target}")]
        }
        "blez" => {
            let (rs, target) = two(&ops, line)?;
            vec![format!("bge x0, {rs}, {target}")]
        }
        "bgez" => {
            let (rs, target) = two(&ops, line)?;
            vec![format!("bge {rs}, x0, {target}")]
        }
        "bltz" => {
            let (rs, target) = two(&ops, line)?;
            vec![format!("blt {rs}, x0, {target}")]
        }
        "bgtz" => {
            let (rs, target) = two(&ops, line)?;
            vec![format!("blt x0, {rs}, {target}")]
        }
        "seqz" => {
            let (rd, rs) = two(&ops, line)?;
            vec![format!("sltiu {rd}, {rs}, 1")]
        }
        "snez" => {
            let (rd, rs) = two(&ops, line)?;
            vec![format!("sltu {rd}, x0, {rs}")]
        }
        _ => vec![text.to_string()],
    };
    Ok(expansion)
}

/// Load-immediate expansion
///
/// Small immediates become a single addi from x0. Anything wider is
/// split into lui + addi: upper = (imm + 0x800) >> 12 compensates for
/// the sign extension of the 12-bit lower part, so the pair always
/// reconstructs the full value.
fn expand_li(rd: &str, imm_token: &str, line: usize) -> Result<Vec<String>, AsmError> {
    let wide = parse_integer(imm_token).ok_or_else(|| AsmError::Syntax {
        line,
        message: format!("malformed immediate '{imm_token}'"),
    })?;
    if wide < -(1i64 << 31) || wide >= (1i64 << 32) {
        return Err(AsmError::ImmediateOutOfRange {
            line,
            value: wide,
            width: 32,
        });
    }
    let imm = wide as i32;
    if (-2048..=2047).contains(&imm) {
        return Ok(vec![format!("addi {rd}, x0, {imm}")]);
    }
    let upper = imm.wrapping_add(0x800) >> 12;
    let lower = imm.wrapping_sub(upper.wrapping_shl(12));
    let mut seq = vec![format!("lui {rd}, 0x{:x}", (upper as u32) & 0xfffff)];
    if lower != 0 {
        seq.push(format!("addi {rd}, {rd}, {lower}"));
    }
    Ok(seq)
}

/// Parse a signed decimal, 0x-hex or 0b-binary integer
fn parse_integer(token: &str) -> Option<i64> {
    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    let value = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else if let Some(bin) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
        i64::from_str_radix(bin, 2).ok()?
    } else {
        digits.parse::<i64>().ok()?
    };
    Some(if negative { -value } else { value })
}

/// Convert a register name (x0..x31 or ABI alias) to its index
fn register_number(name: &str, line: usize) -> Result<u32, AsmError> {
    let number = match name {
        "zero" => 0,
        "ra" => 1,
        "sp" => 2,
        "gp" => 3,
        "tp" => 4,
        "t0" => 5,
        "t1" => 6,
        "t2" => 7,
        "s0" | "fp" => 8,
        "s1" => 9,
        "a0" => 10,
        "a1" => 11,
        "a2" => 12,
        "a3" => 13,
        "a4" => 14,
        "a5" => 15,
        "a6" => 16,
        "a7" => 17,
        "s2" => 18,
        "s3" => 19,
        "s4" => 20,
        "s5" => 21,
        "s6" => 22,
        "s7" => 23,
        "s8" => 24,
        "s9" => 25,
        "s10" => 26,
        "s11" => 27,
        "t3" => 28,
        "t4" => 29,
        "t5" => 30,
        "t6" => 31,
        _ => {
            return name
                .strip_prefix('x')
                .and_then(|digits| digits.parse::<u32>().ok())
                .filter(|n| *n < 32)
                .ok_or_else(|| AsmError::UnknownRegister {
                    line,
                    name: name.to_string(),
                })
        }
    };
    Ok(number)
}

/// A token in immediate position: a known label resolves to its
/// absolute byte address, otherwise it must parse as an integer
fn resolve_value(token: &str, labels: &HashMap<String, u32>, line: usize) -> Result<i64, AsmError> {
    if let Some(&addr) = labels.get(token) {
        return Ok(i64::from(addr));
    }
    parse_integer(token).ok_or_else(|| immediate_error(token, line))
}

/// A branch or jump target: a known label resolves PC-relative
fn resolve_target(
    token: &str,
    labels: &HashMap<String, u32>,
    addr: u32,
    line: usize,
) -> Result<i64, AsmError> {
    if let Some(&dest) = labels.get(token) {
        return Ok(i64::from(dest) - i64::from(addr));
    }
    parse_integer(token).ok_or_else(|| immediate_error(token, line))
}

fn immediate_error(token: &str, line: usize) -> AsmError {
    if is_label(token) {
        AsmError::UndefinedLabel {
            line,
            name: token.to_string(),
        }
    } else {
        AsmError::Syntax {
            line,
            message: format!("malformed immediate '{token}'"),
        }
    }
}

fn check_signed(value: i64, width: u32, line: usize) -> Result<i32, AsmError> {
    let min = -(1i64 << (width - 1));
    let max = (1i64 << (width - 1)) - 1;
    if (min..=max).contains(&value) {
        Ok(value as i32)
    } else {
        Err(AsmError::ImmediateOutOfRange { line, value, width })
    }
}

fn check_unsigned(value: i64, width: u32, line: usize) -> Result<u32, AsmError> {
    if (0..1i64 << width).contains(&value) {
        Ok(value as u32)
    } else {
        Err(AsmError::ImmediateOutOfRange { line, value, width })
    }
}

/// Split 'offset(base)'; the offset part may be empty (meaning 0)
fn split_mem_operand(token: &str) -> Option<(&str, &str)> {
    let open = token.find('(')?;
    let base = token[open + 1..].strip_suffix(')')?;
    Some((&token[..open], base))
}

/// Memory operands come as 'reg, offset(base)' or 'reg, base, offset'
fn mem_operands<'a>(ops: &[&'a str], line: usize) -> Result<(&'a str, &'a str, &'a str), AsmError> {
    if let Some((reg, mem)) = ops.iter().copied().collect_tuple() {
        let (offset, base) = split_mem_operand(mem).ok_or_else(|| AsmError::Syntax {
            line,
            message: format!("expected offset(base), got '{mem}'"),
        })?;
        let offset = if offset.is_empty() { "0" } else { offset };
        Ok((reg, offset, base))
    } else if let Some((reg, base, offset)) = ops.iter().copied().collect_tuple() {
        Ok((reg, offset, base))
    } else {
        Err(arity_error(ops, 2, line))
    }
}

type RtypeFn = fn(u32, u32, u32) -> u32;
type ItypeFn = fn(u32, u32, i32) -> u32;
type ShiftFn = fn(u32, u32, u32) -> u32;
type BtypeFn = fn(u32, u32, i32) -> u32;
type UtypeFn = fn(u32, u32) -> u32;

fn rtype_op(f: RtypeFn, ops: &[&str], line: usize) -> Result<u32, AsmError> {
    let (rd, rs1, rs2) = three(ops, line)?;
    Ok(f(
        register_number(rd, line)?,
        register_number(rs1, line)?,
        register_number(rs2, line)?,
    ))
}

fn itype_op(
    f: ItypeFn,
    ops: &[&str],
    labels: &HashMap<String, u32>,
    line: usize,
) -> Result<u32, AsmError> {
    let (rd, rs1, imm) = three(ops, line)?;
    let value = check_signed(resolve_value(imm, labels, line)?, 12, line)?;
    Ok(f(
        register_number(rd, line)?,
        register_number(rs1, line)?,
        value,
    ))
}

fn shift_op(
    f: ShiftFn,
    ops: &[&str],
    labels: &HashMap<String, u32>,
    line: usize,
) -> Result<u32, AsmError> {
    let (rd, rs1, imm) = three(ops, line)?;
    let shamt = check_unsigned(resolve_value(imm, labels, line)?, 5, line)?;
    Ok(f(
        register_number(rd, line)?,
        register_number(rs1, line)?,
        shamt,
    ))
}

fn load_op(
    f: ItypeFn,
    ops: &[&str],
    labels: &HashMap<String, u32>,
    line: usize,
) -> Result<u32, AsmError> {
    let (rd, offset, base) = mem_operands(ops, line)?;
    let value = check_signed(resolve_value(offset, labels, line)?, 12, line)?;
    Ok(f(
        register_number(rd, line)?,
        register_number(base, line)?,
        value,
    ))
}

fn store_op(
    f: ItypeFn,
    ops: &[&str],
    labels: &HashMap<String, u32>,
    line: usize,
) -> Result<u32, AsmError> {
    let (src, offset, base) = mem_operands(ops, line)?;
    let value = check_signed(resolve_value(offset, labels, line)?, 12, line)?;
    Ok(f(
        register_number(src, line)?,
        register_number(base, line)?,
        value,
    ))
}

fn branch_op(
    f: BtypeFn,
    ops: &[&str],
    labels: &HashMap<String, u32>,
    addr: u32,
    line: usize,
) -> Result<u32, AsmError> {
    let (rs1, rs2, target) = three(ops, line)?;
    let offset = check_signed(resolve_target(target, labels, addr, line)?, 13, line)?;
    Ok(f(
        register_number(rs1, line)?,
        register_number(rs2, line)?,
        offset,
    ))
}

fn jal_op(
    ops: &[&str],
    labels: &HashMap<String, u32>,
    addr: u32,
    line: usize,
) -> Result<u32, AsmError> {
    // 'jal target' is shorthand for 'jal ra, target'
    let (rd, target) = match ops.len() {
        1 => ("ra", one(ops, line)?),
        _ => two(ops, line)?,
    };
    let offset = check_signed(resolve_target(target, labels, addr, line)?, 21, line)?;
    Ok(encode::jal(register_number(rd, line)?, offset))
}

fn jalr_op(
    ops: &[&str],
    labels: &HashMap<String, u32>,
    line: usize,
) -> Result<u32, AsmError> {
    if ops.len() == 2 {
        let (rd, offset, base) = mem_operands(ops, line)?;
        let value = check_signed(resolve_value(offset, labels, line)?, 12, line)?;
        return Ok(encode::jalr(
            register_number(rd, line)?,
            register_number(base, line)?,
            value,
        ));
    }
    let (rd, rs1, imm) = three(ops, line)?;
    let value = check_signed(resolve_value(imm, labels, line)?, 12, line)?;
    Ok(encode::jalr(
        register_number(rd, line)?,
        register_number(rs1, line)?,
        value,
    ))
}

fn utype_op(
    f: UtypeFn,
    ops: &[&str],
    labels: &HashMap<String, u32>,
    line: usize,
) -> Result<u32, AsmError> {
    let (rd, imm) = two(ops, line)?;
    let value = check_unsigned(resolve_value(imm, labels, line)?, 20, line)?;
    Ok(f(register_number(rd, line)?, value))
}

fn encode_instruction(
    text: &str,
    addr: u32,
    labels: &HashMap<String, u32>,
    line: usize,
) -> Result<u32, AsmError> {
    let (mnemonic, rest) = split_mnemonic(text);
    let ops = operand_list(rest);
    match mnemonic {
        "add" => rtype_op(encode::add, &ops, line),
        "sub" => rtype_op(encode::sub, &ops, line),
        "sll" => rtype_op(encode::sll, &ops, line),
        "slt" => rtype_op(encode::slt, &ops, line),
        "sltu" => rtype_op(encode::sltu, &ops, line),
        "xor" => rtype_op(encode::xor, &ops, line),
        "srl" => rtype_op(encode::srl, &ops, line),
        "sra" => rtype_op(encode::sra, &ops, line),
        "or" => rtype_op(encode::or, &ops, line),
        "and" => rtype_op(encode::and, &ops, line),
        "addi" => itype_op(encode::addi, &ops, labels, line),
        "slti" => itype_op(encode::slti, &ops, labels, line),
        "sltiu" => itype_op(encode::sltiu, &ops, labels, line),
        "xori" => itype_op(encode::xori, &ops, labels, line),
        "ori" => itype_op(encode::ori, &ops, labels, line),
        "andi" => itype_op(encode::andi, &ops, labels, line),
        "slli" => shift_op(encode::slli, &ops, labels, line),
        "srli" => shift_op(encode::srli, &ops, labels, line),
        "srai" => shift_op(encode::srai, &ops, labels, line),
        "lb" => load_op(encode::lb, &ops, labels, line),
        "lh" => load_op(encode::lh, &ops, labels, line),
        "lw" => load_op(encode::lw, &ops, labels, line),
        "lbu" => load_op(encode::lbu, &ops, labels, line),
        "lhu" => load_op(encode::lhu, &ops, labels, line),
        "sb" => store_op(encode::sb, &ops, labels, line),
        "sh" => store_op(encode::sh, &ops, labels, line),
        "sw" => store_op(encode::sw, &ops, labels, line),
        "beq" => branch_op(encode::beq, &ops, labels, addr, line),
        "bne" => branch_op(encode::bne, &ops, labels, addr, line),
        "blt" => branch_op(encode::blt, &ops, labels, addr, line),
        "bge" => branch_op(encode::bge, &ops, labels, addr, line),
        "bltu" => branch_op(encode::bltu, &ops, labels, addr, line),
        "bgeu" => branch_op(encode::bgeu, &ops, labels, addr, line),
        "jal" => jal_op(&ops, labels, addr, line),
        "jalr" => jalr_op(&ops, labels, line),
        "lui" => utype_op(encode::lui, &ops, labels, line),
        "auipc" => utype_op(encode::auipc, &ops, labels, line),
        "fence" => {
            none(&ops, line)?;
            Ok(encode::fence())
        }
        "ecall" => {
            none(&ops, line)?;
            Ok(encode::ecall())
        }
        "ebreak" => {
            none(&ops, line)?;
            Ok(encode::ebreak())
        }
        _ => Err(AsmError::UnknownMnemonic {
            line,
            name: mnemonic.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::hart::{Hart, RunOutcome, DEFAULT_MAX_CYCLES};

    /// Assemble, run to the halt sentinel, and hand back the hart
    fn assemble_and_run(source: &str) -> Hart {
        let words = assemble(source).unwrap();
        let mut hart = Hart::default();
        hart.load_image(&words);
        match hart.run(DEFAULT_MAX_CYCLES) {
            RunOutcome::Halted { .. } => hart,
            RunOutcome::Timeout => panic!("program did not halt"),
        }
    }

    const HALT: &str = "addi x28, x0, -16\nsw x0, 0(x28)\n";

    #[test]
    fn check_basic_encoding() {
        let words = assemble("add x4, x1, x2\nsub x3, x4, x1\n").unwrap();
        assert_eq!(words, vec![encode::add(4, 1, 2), encode::sub(3, 4, 1)]);
    }

    #[test]
    fn check_comments_and_blank_lines() {
        let source = "# leading comment\n\naddi x1, x0, 1 // trailing\n   \n";
        let words = assemble(source).unwrap();
        assert_eq!(words, vec![encode::addi(1, 0, 1)]);
    }

    #[test]
    fn check_abi_register_names() {
        let words = assemble("add a0, sp, t6\nadd fp, s0, zero\n").unwrap();
        assert_eq!(words, vec![encode::add(10, 2, 31), encode::add(8, 8, 0)]);
    }

    #[test]
    fn check_mem_operand_styles() {
        let words = assemble("lw x5, 8(x1)\nlw x6, x1, 8\nsw x5, (x1)\n").unwrap();
        assert_eq!(
            words,
            vec![
                encode::lw(5, 1, 8),
                encode::lw(6, 1, 8),
                encode::sw(5, 1, 0)
            ]
        );
    }

    #[test]
    fn check_numeric_bases() {
        let words = assemble("addi x1, x0, 0x10\naddi x2, x0, 0b101\naddi x3, x0, -16\n").unwrap();
        assert_eq!(
            words,
            vec![
                encode::addi(1, 0, 16),
                encode::addi(2, 0, 5),
                encode::addi(3, 0, -16)
            ]
        );
    }

    #[test]
    fn check_forward_and_backward_labels() {
        let source = "start: beq x1, x2, done\njal x0, start\ndone: nop\n";
        let words = assemble(source).unwrap();
        assert_eq!(words[0], encode::beq(1, 2, 8));
        // Backward jal must produce a negative, sign-extended offset
        assert_eq!(words[1], encode::jal(0, -4));
        assert_eq!(words[2], encode::addi(0, 0, 0));
    }

    #[test]
    fn check_label_on_same_line_as_instruction() {
        let source = "loop: addi x1, x1, 1\nj loop\n";
        let words = assemble(source).unwrap();
        assert_eq!(words[1], encode::jal(0, -4));
    }

    #[test]
    fn check_pseudo_ops() {
        let cases = [
            ("nop", encode::addi(0, 0, 0)),
            ("mv x5, x6", encode::addi(5, 6, 0)),
            ("jr x5", encode::jalr(0, 5, 0)),
            ("ret", encode::jalr(0, 1, 0)),
            ("not x5, x6", encode::xori(5, 6, -1)),
            ("neg x5, x6", encode::sub(5, 0, 6)),
            ("seqz x5, x6", encode::sltiu(5, 6, 1)),
            ("snez x5, x6", encode::sltu(5, 0, 6)),
        ];
        for (source, expected) in cases {
            assert_eq!(assemble(source).unwrap(), vec![expected], "{source}");
        }
    }

    #[test]
    fn check_branch_pseudo_ops() {
        let source = "target: beqz x5, target\nbnez x5, target\nblez x5, target\n\
                      bgez x5, target\nbltz x5, target\nbgtz x5, target\n";
        let words = assemble(source).unwrap();
        assert_eq!(words[0], encode::beq(5, 0, 0));
        assert_eq!(words[1], encode::bne(5, 0, -4));
        assert_eq!(words[2], encode::bge(0, 5, -8));
        assert_eq!(words[3], encode::bge(5, 0, -12));
        assert_eq!(words[4], encode::blt(5, 0, -16));
        assert_eq!(words[5], encode::blt(0, 5, -20));
    }

    #[test]
    fn check_call_and_j() {
        let source = "j skip\nskip: call skip\n";
        let words = assemble(source).unwrap();
        assert_eq!(words[0], encode::jal(0, 4));
        assert_eq!(words[1], encode::jal(1, 0));
    }

    #[test]
    fn check_li_small() {
        assert_eq!(assemble("li x5, 42").unwrap(), vec![encode::addi(5, 0, 42)]);
        assert_eq!(
            assemble("li x5, -2048").unwrap(),
            vec![encode::addi(5, 0, -2048)]
        );
        assert_eq!(
            assemble("li x5, 2047").unwrap(),
            vec![encode::addi(5, 0, 2047)]
        );
    }

    #[test]
    fn check_li_split() {
        // 0x12345678 = lui 0x12345 + addi 0x678
        assert_eq!(
            assemble("li x6, 0x12345678").unwrap(),
            vec![encode::lui(6, 0x12345), encode::addi(6, 6, 0x678)]
        );
        // A multiple of 0x1000 needs no addi
        assert_eq!(
            assemble("li x6, 0x2000").unwrap(),
            vec![encode::lui(6, 0x2)]
        );
    }

    #[test]
    fn check_li_executes_to_value() {
        for imm in [
            0i64,
            1,
            -1,
            42,
            2047,
            -2048,
            2048,
            -2049,
            0x7fffffff,
            -0x80000000,
            0xdeadbeef,
            0x80000000,
            0xffffffff,
        ] {
            let source = format!("li x5, {imm}\n{HALT}");
            let hart = assemble_and_run(&source);
            assert_eq!(hart.x(5), imm as u32, "li x5, {imm}");
        }
    }

    #[test]
    fn check_scenario_addi_store_halt() {
        let hart = assemble_and_run(&format!("addi x5, x0, 42\n{HALT}"));
        assert_eq!(hart.x(5), 0x0000_002a);
    }

    #[test]
    fn check_scenario_lui_addi() {
        let source = format!("lui x6, 0x12345\naddi x6, x6, 0x678\n{HALT}");
        let hart = assemble_and_run(&source);
        assert_eq!(hart.x(6), 0x1234_5678);
    }

    #[test]
    fn check_scenario_srai() {
        let source = format!("addi x1, x0, -1\nsrai x2, x1, 4\n{HALT}");
        let hart = assemble_and_run(&source);
        assert_eq!(hart.x(2), 0xffff_ffff);
    }

    #[test]
    fn check_scenario_forward_branch() {
        let body = "bne x1, x2, skip\naddi x3, x0, 1\nskip: addi x4, x0, 2\n";
        // x1 == x2: fall through, x3 = 1, x4 = 2
        let hart = assemble_and_run(&format!("{body}{HALT}"));
        assert_eq!((hart.x(3), hart.x(4)), (1, 2));
        // x1 != x2: branch taken, x3 = 0, x4 = 2
        let hart = assemble_and_run(&format!("addi x1, x0, 7\n{body}{HALT}"));
        assert_eq!((hart.x(3), hart.x(4)), (0, 2));
    }

    #[test]
    fn check_scenario_store_load_bytes() {
        let source = format!(
            "li x1, 0x2000\nli x2, 0xdeadbeef\nsw x2, 0(x1)\nlw x5, 0(x1)\n\
             lbu x6, 0(x1)\nlbu x7, 1(x1)\nlbu x8, 2(x1)\nlbu x9, 3(x1)\nlb x10, 3(x1)\n{HALT}"
        );
        let hart = assemble_and_run(&source);
        assert_eq!(hart.x(5), 0xdead_beef);
        assert_eq!(hart.x(6), 0xef);
        assert_eq!(hart.x(7), 0xbe);
        assert_eq!(hart.x(8), 0xad);
        assert_eq!(hart.x(9), 0xde);
        assert_eq!(hart.x(10), 0xffff_ffde);
    }

    #[test]
    fn check_hex_output_format() {
        let hex = assemble_to_hex("addi x5, x0, 42\n").unwrap();
        assert_eq!(hex, "02a00293\n");
    }

    #[test]
    fn check_unknown_register() {
        assert_eq!(
            assemble("add x1, x2, q7"),
            Err(AsmError::UnknownRegister {
                line: 1,
                name: "q7".to_string()
            })
        );
        assert!(matches!(
            assemble("add x1, x2, x32"),
            Err(AsmError::UnknownRegister { .. })
        ));
    }

    #[test]
    fn check_unknown_mnemonic() {
        assert_eq!(
            assemble("mul x1, x2, x3"),
            Err(AsmError::UnknownMnemonic {
                line: 1,
                name: "mul".to_string()
            })
        );
    }

    #[test]
    fn check_immediate_out_of_range() {
        assert!(matches!(
            assemble("addi x1, x0, 2048"),
            Err(AsmError::ImmediateOutOfRange { width: 12, .. })
        ));
        assert!(matches!(
            assemble("slli x1, x1, 32"),
            Err(AsmError::ImmediateOutOfRange { width: 5, .. })
        ));
        assert!(matches!(
            assemble("lui x1, 0x100000"),
            Err(AsmError::ImmediateOutOfRange { width: 20, .. })
        ));
        assert!(matches!(
            assemble("lw x1, 4096(x2)"),
            Err(AsmError::ImmediateOutOfRange { width: 12, .. })
        ));
    }

    #[test]
    fn check_undefined_label() {
        assert_eq!(
            assemble("beq x1, x2, nowhere"),
            Err(AsmError::UndefinedLabel {
                line: 1,
                name: "nowhere".to_string()
            })
        );
    }

    #[test]
    fn check_duplicate_label() {
        assert_eq!(
            assemble("here: nop\nhere: nop\n"),
            Err(AsmError::DuplicateLabel {
                line: 2,
                name: "here".to_string()
            })
        );
    }

    #[test]
    fn check_arity_errors() {
        assert!(matches!(
            assemble("add x1, x2"),
            Err(AsmError::Syntax { line: 1, .. })
        ));
        assert!(matches!(
            assemble("lw x1, 0(x2"),
            Err(AsmError::Syntax { line: 1, .. })
        ));
    }

    #[test]
    fn check_error_line_numbers() {
        let source = "nop\nnop\naddi x1, x0, 99999\n";
        assert!(matches!(
            assemble(source),
            Err(AsmError::ImmediateOutOfRange { line: 3, .. })
        ));
    }
}
