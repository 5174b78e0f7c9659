use std::io::{Cursor, Seek, SeekFrom};

use binrw::BinReaderExt;
use thiserror::Error;

use super::types::*;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unknown opcode 0x{opcode:02x} at pc {pc}")]
    UnknownOpcode { pc: u32, opcode: u8 },
    #[error("opcode 0x{opcode:02x} cannot follow wide at pc {pc}")]
    BadWide { pc: u32, opcode: u8 },
    #[error("instruction at pc {pc} runs past the end of the code array")]
    Truncated { pc: u32 },
    #[error("branch at pc {pc} targets {target}, which is not an instruction boundary")]
    BadTarget { pc: u32, target: i64 },
    #[error("tableswitch at pc {pc} has high {high} below low {low}")]
    BadSwitchRange { pc: u32, low: i32, high: i32 },
    #[error("empty code array")]
    Empty,
}

/// Decodes a method's code array into instructions with absolute branch
/// targets.
pub fn decode_code(code: &[u8]) -> Result<Vec<AddressedInstruction>, DecodeError> {
    if code.is_empty() {
        return Err(DecodeError::Empty);
    }
    let mut reader = Cursor::new(code);
    let mut out = Vec::new();
    while (reader.position() as usize) < code.len() {
        let pc = reader.position() as u32;
        let instruction = decode_one(&mut reader, pc).map_err(|e| match e {
            Step::Fail(err) => err,
            Step::Eof => DecodeError::Truncated { pc },
        })?;
        out.push(AddressedInstruction {
            address: pc,
            instruction,
        });
    }

    let boundaries: std::collections::BTreeSet<u32> = out.iter().map(|i| i.address).collect();
    for addressed in &out {
        for target in addressed.instruction.branch_targets() {
            if !boundaries.contains(&target) {
                return Err(DecodeError::BadTarget {
                    pc: addressed.address,
                    target: target as i64,
                });
            }
        }
    }
    Ok(out)
}

enum Step {
    Fail(DecodeError),
    Eof,
}

impl From<binrw::Error> for Step {
    fn from(_: binrw::Error) -> Self {
        Step::Eof
    }
}

impl From<std::io::Error> for Step {
    fn from(_: std::io::Error) -> Self {
        Step::Eof
    }
}

fn target(pc: u32, offset: i32, len: usize) -> Result<u32, Step> {
    let t = pc as i64 + offset as i64;
    if t < 0 || t >= len as i64 {
        return Err(Step::Fail(DecodeError::BadTarget { pc, target: t }));
    }
    Ok(t as u32)
}

fn decode_one(r: &mut Cursor<&[u8]>, pc: u32) -> Result<Instruction, Step> {
    use Instruction as I;

    let len = r.get_ref().len();
    let opcode: u8 = r.read_be()?;
    let insn = match opcode {
        // ============================================================
        // Constants
        // ============================================================
        0x00 => I::Nop,
        0x01 => I::Push(Push::Null),
        0x02..=0x08 => I::Push(Push::Int(opcode as i32 - 0x03)),
        0x09 | 0x0a => I::Push(Push::Long((opcode - 0x09) as i64)),
        0x0b..=0x0d => I::Push(Push::Float((opcode - 0x0b) as f32)),
        0x0e | 0x0f => I::Push(Push::Double((opcode - 0x0e) as f64)),
        0x10 => I::Push(Push::Int(r.read_be::<i8>()? as i32)),
        0x11 => I::Push(Push::Int(r.read_be::<i16>()? as i32)),
        0x12 => I::Ldc(r.read_be::<u8>()? as u16),
        0x13 | 0x14 => I::Ldc(r.read_be()?),

        // ============================================================
        // Locals
        // ============================================================
        0x15..=0x19 => I::Load(Kind::from_index(opcode - 0x15), r.read_be::<u8>()? as u16),
        0x1a..=0x2d => {
            let n = opcode - 0x1a;
            I::Load(Kind::from_index(n / 4), (n % 4) as u16)
        }
        0x36..=0x3a => I::Store(Kind::from_index(opcode - 0x36), r.read_be::<u8>()? as u16),
        0x3b..=0x4e => {
            let n = opcode - 0x3b;
            I::Store(Kind::from_index(n / 4), (n % 4) as u16)
        }
        0x84 => {
            let index = r.read_be::<u8>()? as u16;
            let delta = r.read_be::<i8>()? as i16;
            I::Iinc { index, delta }
        }
        0xc4 => decode_wide(r, pc)?,

        // ============================================================
        // Arrays
        // ============================================================
        0x2e..=0x35 => I::ArrayLoad(array_kind_of(opcode - 0x2e)),
        0x4f..=0x56 => I::ArrayStore(array_kind_of(opcode - 0x4f)),
        0xbc => {
            let atype: u8 = r.read_be()?;
            let kind = match atype {
                4 => ArrayKind::Boolean,
                5 => ArrayKind::Char,
                6 => ArrayKind::Float,
                7 => ArrayKind::Double,
                8 => ArrayKind::Byte,
                9 => ArrayKind::Short,
                10 => ArrayKind::Int,
                11 => ArrayKind::Long,
                _ => return Err(Step::Fail(DecodeError::UnknownOpcode { pc, opcode: atype })),
            };
            I::NewArray(kind)
        }
        0xbd => I::ANewArray(r.read_be()?),
        0xbe => I::ArrayLength,
        0xc5 => {
            let index = r.read_be()?;
            let dimensions = r.read_be()?;
            I::MultiANewArray { index, dimensions }
        }

        // ============================================================
        // Stack
        // ============================================================
        0x57 => I::Pop,
        0x58 => I::Pop2,
        0x59 => I::Dup,
        0x5a => I::DupX1,
        0x5b => I::DupX2,
        0x5c => I::Dup2,
        0x5d => I::Dup2X1,
        0x5e => I::Dup2X2,
        0x5f => I::Swap,

        // ============================================================
        // Arithmetic
        // ============================================================
        0x60..=0x73 => {
            let n = opcode - 0x60;
            let op = match n / 4 {
                0 => ArithOp::Add,
                1 => ArithOp::Sub,
                2 => ArithOp::Mul,
                3 => ArithOp::Div,
                _ => ArithOp::Rem,
            };
            I::Arith(op, Kind::from_index(n % 4))
        }
        0x74..=0x77 => I::Neg(Kind::from_index(opcode - 0x74)),
        0x78..=0x7d => {
            let n = opcode - 0x78;
            let op = match n / 2 {
                0 => ShiftOp::Shl,
                1 => ShiftOp::Shr,
                _ => ShiftOp::Ushr,
            };
            I::Shift(op, if n % 2 == 0 { Kind::Int } else { Kind::Long })
        }
        0x7e..=0x83 => {
            let n = opcode - 0x7e;
            let op = match n / 2 {
                0 => LogicOp::And,
                1 => LogicOp::Or,
                _ => LogicOp::Xor,
            };
            I::Logic(op, if n % 2 == 0 { Kind::Int } else { Kind::Long })
        }
        0x85..=0x93 => I::Convert(
            [
                Conversion::I2L,
                Conversion::I2F,
                Conversion::I2D,
                Conversion::L2I,
                Conversion::L2F,
                Conversion::L2D,
                Conversion::F2I,
                Conversion::F2L,
                Conversion::F2D,
                Conversion::D2I,
                Conversion::D2L,
                Conversion::D2F,
                Conversion::I2B,
                Conversion::I2C,
                Conversion::I2S,
            ][(opcode - 0x85) as usize],
        ),
        0x94 => I::Lcmp,
        0x95 => I::Cmp { kind: Kind::Float, nan_greater: false },
        0x96 => I::Cmp { kind: Kind::Float, nan_greater: true },
        0x97 => I::Cmp { kind: Kind::Double, nan_greater: false },
        0x98 => I::Cmp { kind: Kind::Double, nan_greater: true },

        // ============================================================
        // Control flow
        // ============================================================
        0x99..=0x9e => {
            let cond = cond_of(opcode - 0x99);
            let off = r.read_be::<i16>()? as i32;
            I::If { cond, target: target(pc, off, len)? }
        }
        0x9f..=0xa4 => {
            let cond = cond_of(opcode - 0x9f);
            let off = r.read_be::<i16>()? as i32;
            I::IfIcmp { cond, target: target(pc, off, len)? }
        }
        0xa5 | 0xa6 => {
            let off = r.read_be::<i16>()? as i32;
            I::IfAcmp { equal: opcode == 0xa5, target: target(pc, off, len)? }
        }
        0xc6 | 0xc7 => {
            let off = r.read_be::<i16>()? as i32;
            I::IfNull { null: opcode == 0xc6, target: target(pc, off, len)? }
        }
        0xa7 => I::Goto(target(pc, r.read_be::<i16>()? as i32, len)?),
        0xc8 => I::Goto(target(pc, r.read_be::<i32>()?, len)?),
        0xa8 => I::Jsr(target(pc, r.read_be::<i16>()? as i32, len)?),
        0xc9 => I::Jsr(target(pc, r.read_be::<i32>()?, len)?),
        0xa9 => I::Ret(r.read_be::<u8>()? as u16),
        0xaa => {
            skip_padding(r, pc)?;
            let default = target(pc, r.read_be()?, len)?;
            let low: i32 = r.read_be()?;
            let high: i32 = r.read_be()?;
            if high < low {
                return Err(Step::Fail(DecodeError::BadSwitchRange { pc, low, high }));
            }
            let mut targets = Vec::with_capacity(((high as i64 - low as i64 + 1) as usize).min(len));
            for _ in low as i64..=high as i64 {
                targets.push(target(pc, r.read_be()?, len)?);
            }
            I::TableSwitch { default, low, targets }
        }
        0xab => {
            skip_padding(r, pc)?;
            let default = target(pc, r.read_be()?, len)?;
            let npairs: i32 = r.read_be()?;
            let mut pairs = Vec::with_capacity((npairs.max(0) as usize).min(len));
            for _ in 0..npairs {
                let key: i32 = r.read_be()?;
                pairs.push((key, target(pc, r.read_be()?, len)?));
            }
            I::LookupSwitch { default, pairs }
        }
        0xac..=0xb0 => I::Return(Some(Kind::from_index(opcode - 0xac))),
        0xb1 => I::Return(None),
        0xbf => I::Athrow,

        // ============================================================
        // Objects, fields and calls
        // ============================================================
        0xb2 => I::GetStatic(r.read_be()?),
        0xb3 => I::PutStatic(r.read_be()?),
        0xb4 => I::GetField(r.read_be()?),
        0xb5 => I::PutField(r.read_be()?),
        0xb6 => I::Invoke(InvokeKind::Virtual, r.read_be()?),
        0xb7 => I::Invoke(InvokeKind::Special, r.read_be()?),
        0xb8 => I::Invoke(InvokeKind::Static, r.read_be()?),
        0xb9 => {
            let index = r.read_be()?;
            let _count: u8 = r.read_be()?;
            let _zero: u8 = r.read_be()?;
            I::Invoke(InvokeKind::Interface, index)
        }
        0xba => {
            let index = r.read_be()?;
            let _zero: u16 = r.read_be()?;
            I::InvokeDynamic(index)
        }
        0xbb => I::New(r.read_be()?),
        0xc0 => I::CheckCast(r.read_be()?),
        0xc1 => I::InstanceOf(r.read_be()?),
        0xc2 => I::MonitorEnter,
        0xc3 => I::MonitorExit,

        _ => return Err(Step::Fail(DecodeError::UnknownOpcode { pc, opcode })),
    };
    Ok(insn)
}

fn decode_wide(r: &mut Cursor<&[u8]>, pc: u32) -> Result<Instruction, Step> {
    let opcode: u8 = r.read_be()?;
    let index: u16 = r.read_be()?;
    let insn = match opcode {
        0x15..=0x19 => Instruction::Load(Kind::from_index(opcode - 0x15), index),
        0x36..=0x3a => Instruction::Store(Kind::from_index(opcode - 0x36), index),
        0xa9 => Instruction::Ret(index),
        0x84 => Instruction::Iinc {
            index,
            delta: r.read_be()?,
        },
        _ => return Err(Step::Fail(DecodeError::BadWide { pc, opcode })),
    };
    Ok(insn)
}

/// Switch operands start at the next multiple of four after the opcode.
fn skip_padding(r: &mut Cursor<&[u8]>, pc: u32) -> Result<(), Step> {
    let pad = (4 - (pc + 1) % 4) % 4;
    r.seek(SeekFrom::Current(pad as i64))?;
    Ok(())
}

fn array_kind_of(n: u8) -> ArrayKind {
    match n {
        0 => ArrayKind::Int,
        1 => ArrayKind::Long,
        2 => ArrayKind::Float,
        3 => ArrayKind::Double,
        4 => ArrayKind::Ref,
        5 => ArrayKind::Byte,
        6 => ArrayKind::Char,
        _ => ArrayKind::Short,
    }
}

fn cond_of(n: u8) -> Cond {
    match n {
        0 => Cond::Eq,
        1 => Cond::Ne,
        2 => Cond::Lt,
        3 => Cond::Ge,
        4 => Cond::Gt,
        _ => Cond::Le,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(code: &[u8]) -> Vec<(u32, Instruction)> {
        decode_code(code)
            .unwrap()
            .into_iter()
            .map(|a| (a.address, a.instruction))
            .collect()
    }

    #[test]
    fn short_forms_fold_into_families() {
        // iconst_m1, iload_2, lstore_3, bipush -5, ireturn
        let got = decode(&[0x02, 0x1c, 0x42, 0x10, 0xfb, 0xac]);
        assert_eq!(
            got,
            vec![
                (0, Instruction::Push(Push::Int(-1))),
                (1, Instruction::Load(Kind::Int, 2)),
                (2, Instruction::Store(Kind::Long, 3)),
                (3, Instruction::Push(Push::Int(-5))),
                (5, Instruction::Return(Some(Kind::Int))),
            ]
        );
    }

    #[test]
    fn branches_become_absolute() {
        // 0: iload_0, 1: ifeq +5 -> 6, 4: iconst_1, 5: ireturn, 6: iconst_0, 7: ireturn
        let got = decode(&[0x1a, 0x99, 0x00, 0x05, 0x04, 0xac, 0x03, 0xac]);
        assert_eq!(got[1], (1, Instruction::If { cond: Cond::Eq, target: 6 }));
    }

    #[test]
    fn tableswitch_skips_alignment_padding() {
        // 0: iload_0, 1: tableswitch, pad 2 bytes, default=+23, low=0, high=1, +23, +24
        let mut code = vec![0x1a, 0xaa, 0x00, 0x00];
        for v in [23i32, 0, 1, 23, 24] {
            code.extend_from_slice(&v.to_be_bytes());
        }
        // 24: return, 25: return
        code.extend_from_slice(&[0xb1, 0xb1]);
        let got = decode(&code);
        assert_eq!(
            got[1],
            (1, Instruction::TableSwitch { default: 24, low: 0, targets: vec![24, 25] })
        );
        assert_eq!(got[2].0, 24);
    }

    #[test]
    fn wide_iinc_reads_sixteen_bit_operands() {
        let got = decode(&[0xc4, 0x84, 0x01, 0x00, 0xff, 0x38, 0xb1]);
        assert_eq!(got[0], (0, Instruction::Iinc { index: 256, delta: -200 }));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(decode_code(&[0xa7, 0x00, 0x10]), Err(DecodeError::BadTarget { pc: 0, .. })));
        assert!(matches!(decode_code(&[0x11, 0x00]), Err(DecodeError::Truncated { pc: 0 })));
        assert!(matches!(decode_code(&[0xfe]), Err(DecodeError::UnknownOpcode { opcode: 0xfe, .. })));
        // goto into the middle of sipush
        assert!(matches!(
            decode_code(&[0x11, 0x00, 0x01, 0xa7, 0xff, 0xfe, 0xb1]),
            Err(DecodeError::BadTarget { pc: 3, target: 1 })
        ));
    }

    #[test]
    fn tableswitch_range_must_not_be_inverted() {
        // 0: iload_0, 1: tableswitch, pad 2 bytes, default=+7, low=5, high=4
        let mut code = vec![0x1a, 0xaa, 0x00, 0x00];
        for v in [7i32, 5, 4] {
            code.extend_from_slice(&v.to_be_bytes());
        }
        code.push(0xb1);
        assert!(matches!(
            decode_code(&code),
            Err(DecodeError::BadSwitchRange { pc: 1, low: 5, high: 4 })
        ));
    }
}
