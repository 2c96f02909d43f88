// reinterpret.rs — Bit-pattern reinterpretation of interval endpoints
//
// Models the type-pun pattern: a value written through one typed view of an
// address and read back through another. Each endpoint is encoded as the
// source type's bit pattern and decoded as the target type independently,
// then the pair is re-ordered. This is exact for singleton intervals and an
// approximation otherwise.
//
// Preconditions: endpoints are representable in the source kind.
// Postconditions: a returned Interval is ordered and finite.
// Failure modes: `None` for target lanes that do not fit inside the source
//   pattern, and for non-finite decoded values.
// Side effects: none.

use std::fmt;

use crate::interval::Interval;
use crate::ir::Type;

/// Scalar kinds supported by reinterpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl ScalarKind {
    pub fn bits(self) -> u32 {
        match self {
            ScalarKind::I8 => 8,
            ScalarKind::I16 => 16,
            ScalarKind::I32 | ScalarKind::F32 => 32,
            ScalarKind::I64 | ScalarKind::F64 => 64,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, ScalarKind::F32 | ScalarKind::F64)
    }

    /// Map an IR type to a supported scalar kind. `i1` and aggregates are
    /// not reinterpretable.
    pub fn of(ty: &Type) -> Option<ScalarKind> {
        match ty {
            Type::Int(8) => Some(ScalarKind::I8),
            Type::Int(16) => Some(ScalarKind::I16),
            Type::Int(32) => Some(ScalarKind::I32),
            Type::Int(64) => Some(ScalarKind::I64),
            Type::Float => Some(ScalarKind::F32),
            Type::Double => Some(ScalarKind::F64),
            _ => None,
        }
    }

    fn encode(self, v: f64) -> u64 {
        match self {
            ScalarKind::F32 => (v as f32).to_bits() as u64,
            ScalarKind::F64 => v.to_bits(),
            _ => (v as i64 as u64) & mask(self.bits()),
        }
    }

    fn decode(self, bits: u64) -> f64 {
        let bits = bits & mask(self.bits());
        match self {
            ScalarKind::F32 => f32::from_bits(bits as u32) as f64,
            ScalarKind::F64 => f64::from_bits(bits),
            ScalarKind::I8 => bits as u8 as i8 as f64,
            ScalarKind::I16 => bits as u16 as i16 as f64,
            ScalarKind::I32 => bits as u32 as i32 as f64,
            ScalarKind::I64 => bits as i64 as f64,
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScalarKind::I8 => "i8",
            ScalarKind::I16 => "i16",
            ScalarKind::I32 => "i32",
            ScalarKind::I64 => "i64",
            ScalarKind::F32 => "float",
            ScalarKind::F64 => "double",
        };
        write!(f, "{s}")
    }
}

fn mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Reinterpret the interval's endpoints, stored as `from`, as the low bits
/// of a `to` value.
pub fn reinterpret(iv: Interval, from: ScalarKind, to: ScalarKind) -> Option<Interval> {
    if from == to {
        return Some(iv);
    }
    extract_lane(iv, from, 0, to)
}

/// Read a `to`-typed lane starting at `bit_offset` inside the bit pattern of
/// a value stored as `from` (little-endian lane order).
pub fn extract_lane(
    iv: Interval,
    from: ScalarKind,
    bit_offset: u32,
    to: ScalarKind,
) -> Option<Interval> {
    if bit_offset + to.bits() > from.bits() {
        return None;
    }
    let lane = |v: f64| to.decode(from.encode(v) >> bit_offset);
    let lo = lane(iv.lo);
    let hi = lane(iv.hi);
    if !lo.is_finite() || !hi.is_finite() {
        return None;
    }
    Some(Interval::ordered(lo, hi))
}

/// Two's-complement wrap of an integer value into a signed `bits`-wide type.
pub fn wrap_signed(v: f64, bits: u32) -> f64 {
    let raw = (v as i64 as u64) & mask(bits);
    if bits >= 64 {
        return raw as i64 as f64;
    }
    let sign = 1u64 << (bits - 1);
    if raw & sign != 0 {
        (raw as i128 - (1i128 << bits)) as f64
    } else {
        raw as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_kind_is_identity() {
        let iv = Interval::new(-3.5, 9.0).unwrap();
        assert_eq!(reinterpret(iv, ScalarKind::F64, ScalarKind::F64), Some(iv));
    }

    #[test]
    fn double_splits_into_32_bit_lanes() {
        let one = Interval::singleton(1.0);
        let low = extract_lane(one, ScalarKind::F64, 0, ScalarKind::I32).unwrap();
        let high = extract_lane(one, ScalarKind::F64, 32, ScalarKind::I32).unwrap();
        assert_eq!(low, Interval::singleton(0.0));
        assert_eq!(high, Interval::singleton(0x3FF0_0000 as f64));
    }

    #[test]
    fn float_bits_as_i32() {
        let iv = Interval::singleton(1.0);
        let r = reinterpret(iv, ScalarKind::F32, ScalarKind::I32).unwrap();
        assert_eq!(r, Interval::singleton(0x3F80_0000 as f64));
        let back = reinterpret(r, ScalarKind::I32, ScalarKind::F32).unwrap();
        assert_eq!(back, iv);
    }

    #[test]
    fn wider_target_fails_closed() {
        let iv = Interval::singleton(1.0);
        assert!(reinterpret(iv, ScalarKind::I32, ScalarKind::F64).is_none());
        assert!(extract_lane(iv, ScalarKind::F64, 48, ScalarKind::I32).is_none());
    }

    #[test]
    fn non_finite_decode_fails_closed() {
        // 0x7F800000 is +inf as f32.
        let iv = Interval::singleton(0x7F80_0000 as f64);
        assert!(reinterpret(iv, ScalarKind::I32, ScalarKind::F32).is_none());
    }

    #[test]
    fn endpoints_are_reordered() {
        let iv = Interval::new(-1.0, 1.0).unwrap();
        let r = reinterpret(iv, ScalarKind::I32, ScalarKind::I8).unwrap();
        assert_eq!(r, Interval::new(-1.0, 1.0).unwrap());
        let iv = Interval::new(100.0, 200.0).unwrap();
        let r = reinterpret(iv, ScalarKind::I32, ScalarKind::I8).unwrap();
        assert_eq!(r, Interval::new(-56.0, 100.0).unwrap());
    }

    #[test]
    fn wrap_signed_matches_twos_complement() {
        assert_eq!(wrap_signed(200.0, 8), -56.0);
        assert_eq!(wrap_signed(-1.0, 8), -1.0);
        assert_eq!(wrap_signed(127.0, 8), 127.0);
        assert_eq!(wrap_signed(65536.0 + 5.0, 16), 5.0);
    }
}
