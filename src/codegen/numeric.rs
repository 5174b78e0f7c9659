//! JVM integer semantics used when folding constant operands at
//! translation time. Each function matches the runtime helper of the same
//! name, so folded and unfolded code agree.

use crate::code_attribute::{ArithOp, Conversion, LogicOp, ShiftOp};

pub fn add32(a: i32, b: i32) -> i32 {
    a.wrapping_add(b)
}

pub fn sub32(a: i32, b: i32) -> i32 {
    a.wrapping_sub(b)
}

pub fn mul32(a: i32, b: i32) -> i32 {
    a.wrapping_mul(b)
}

/// `None` for division by zero, which must throw at run time.
pub fn div32(a: i32, b: i32) -> Option<i32> {
    (b != 0).then(|| a.wrapping_div(b))
}

pub fn mod32(a: i32, b: i32) -> Option<i32> {
    (b != 0).then(|| a.wrapping_rem(b))
}

pub fn arith32(op: ArithOp, a: i32, b: i32) -> Option<i32> {
    match op {
        ArithOp::Add => Some(add32(a, b)),
        ArithOp::Sub => Some(sub32(a, b)),
        ArithOp::Mul => Some(mul32(a, b)),
        ArithOp::Div => div32(a, b),
        ArithOp::Rem => mod32(a, b),
    }
}

pub fn arith64(op: ArithOp, a: i64, b: i64) -> Option<i64> {
    match op {
        ArithOp::Add => Some(a.wrapping_add(b)),
        ArithOp::Sub => Some(a.wrapping_sub(b)),
        ArithOp::Mul => Some(a.wrapping_mul(b)),
        ArithOp::Div => (b != 0).then(|| a.wrapping_div(b)),
        ArithOp::Rem => (b != 0).then(|| a.wrapping_rem(b)),
    }
}

/// Shift distance is masked to five bits.
pub fn shift32(op: ShiftOp, a: i32, b: i32) -> i32 {
    let n = (b & 0x1f) as u32;
    match op {
        ShiftOp::Shl => a.wrapping_shl(n),
        ShiftOp::Shr => a.wrapping_shr(n),
        ShiftOp::Ushr => ((a as u32) >> n) as i32,
    }
}

/// Shift distance is masked to six bits.
pub fn shift64(op: ShiftOp, a: i64, b: i32) -> i64 {
    let n = (b & 0x3f) as u32;
    match op {
        ShiftOp::Shl => a.wrapping_shl(n),
        ShiftOp::Shr => a.wrapping_shr(n),
        ShiftOp::Ushr => ((a as u64) >> n) as i64,
    }
}

pub fn logic32(op: LogicOp, a: i32, b: i32) -> i32 {
    match op {
        LogicOp::And => a & b,
        LogicOp::Or => a | b,
        LogicOp::Xor => a ^ b,
    }
}

pub fn logic64(op: LogicOp, a: i64, b: i64) -> i64 {
    match op {
        LogicOp::And => a & b,
        LogicOp::Or => a | b,
        LogicOp::Xor => a ^ b,
    }
}

pub fn compare64(a: i64, b: i64) -> i32 {
    a.cmp(&b) as i32
}

/// Result of a constant conversion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Converted {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

/// Float to integer conversions saturate and map NaN to zero, which is
/// what Rust's `as` does.
pub fn convert_int(conv: Conversion, v: i32) -> Option<Converted> {
    Some(match conv {
        Conversion::I2L => Converted::Long(v as i64),
        Conversion::I2F => Converted::Float(v as f32),
        Conversion::I2D => Converted::Double(v as f64),
        Conversion::I2B => Converted::Int(v as i8 as i32),
        Conversion::I2C => Converted::Int(v as u16 as i32),
        Conversion::I2S => Converted::Int(v as i16 as i32),
        _ => return None,
    })
}

pub fn convert_long(conv: Conversion, v: i64) -> Option<Converted> {
    Some(match conv {
        Conversion::L2I => Converted::Int(v as i32),
        Conversion::L2F => Converted::Float(v as f32),
        Conversion::L2D => Converted::Double(v as f64),
        _ => return None,
    })
}

pub fn convert_double(conv: Conversion, v: f64) -> Option<Converted> {
    Some(match conv {
        Conversion::F2I | Conversion::D2I => Converted::Int(v as i32),
        Conversion::F2L | Conversion::D2L => Converted::Long(v as i64),
        Conversion::F2D => Converted::Double(v),
        Conversion::D2F => Converted::Float(v as f32),
        _ => return None,
    })
}

/// High and low words of a long, as the runtime stores them.
pub fn split64(v: i64) -> (i32, u32) {
    ((v >> 32) as i32, v as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_arithmetic_wraps() {
        assert_eq!(add32(2147483647, 1), -2147483648);
        assert_eq!(sub32(-2147483648, 1), 2147483647);
        assert_eq!(mul32(65536, 65536), 0);
        assert_eq!(div32(-2147483648, -1), Some(-2147483648));
        assert_eq!(mod32(-7, 2), Some(-1));
        assert_eq!(div32(1, 0), None);
    }

    #[test]
    fn shifts_mask_their_distance() {
        assert_eq!(shift32(ShiftOp::Shl, 1, 33), 2);
        assert_eq!(shift32(ShiftOp::Ushr, -1, 28), 15);
        assert_eq!(shift32(ShiftOp::Shr, -16, 2), -4);
        assert_eq!(shift64(ShiftOp::Shl, 1, 64), 1);
        assert_eq!(shift64(ShiftOp::Ushr, -1, 60), 15);
    }

    #[test]
    fn long_arithmetic_wraps() {
        assert_eq!(arith64(ArithOp::Add, i64::MAX, 1), Some(i64::MIN));
        assert_eq!(arith64(ArithOp::Div, i64::MIN, -1), Some(i64::MIN));
        assert_eq!(arith64(ArithOp::Rem, 5, 0), None);
        assert_eq!(compare64(-1, 1), -1);
        assert_eq!(compare64(3, 3), 0);
    }

    #[test]
    fn conversions_follow_jvm_rules() {
        assert_eq!(convert_int(Conversion::I2B, 200), Some(Converted::Int(-56)));
        assert_eq!(convert_int(Conversion::I2C, -1), Some(Converted::Int(65535)));
        assert_eq!(convert_long(Conversion::L2I, 0x1_0000_0005), Some(Converted::Int(5)));
        assert_eq!(convert_double(Conversion::D2I, f64::NAN), Some(Converted::Int(0)));
        assert_eq!(convert_double(Conversion::D2I, 1e20), Some(Converted::Int(i32::MAX)));
        assert_eq!(convert_double(Conversion::D2L, -1e30), Some(Converted::Long(i64::MIN)));
        assert_eq!(convert_double(Conversion::D2I, -2.9), Some(Converted::Int(-2)));
    }

    #[test]
    fn splits_longs_into_words() {
        assert_eq!(split64(-1), (-1, 0xffff_ffff));
        assert_eq!(split64(0x1_0000_0002), (1, 2));
    }
}
