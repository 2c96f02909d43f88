// interval.rs — Closed numeric intervals and their transfer arithmetic
//
// Preconditions: endpoints are finite or infinite f64, never NaN.
// Postconditions: every constructed Interval satisfies `lo <= hi`.
// Failure modes: operations that cannot produce a sound result return `None`
//   (division by an interval containing zero, bitwise ops on negative values,
//   shifts that overflow the operand width).
// Side effects: none.

use std::fmt;

use serde::Serialize;

/// A closed interval `[lo, hi]` of the values a quantity can take under its
/// current interpreted type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Interval {
    pub lo: f64,
    pub hi: f64,
}

impl Interval {
    /// Checked constructor: `None` when `lo > hi` or either endpoint is NaN.
    pub fn new(lo: f64, hi: f64) -> Option<Self> {
        if lo.is_nan() || hi.is_nan() || lo > hi {
            None
        } else {
            Some(Interval { lo, hi })
        }
    }

    /// Interval spanned by two endpoints in either order.
    pub fn ordered(a: f64, b: f64) -> Self {
        Interval {
            lo: a.min(b),
            hi: a.max(b),
        }
    }

    pub fn singleton(v: f64) -> Self {
        Interval { lo: v, hi: v }
    }

    pub fn is_singleton(&self) -> bool {
        self.lo == self.hi
    }

    pub fn contains(&self, v: f64) -> bool {
        self.lo <= v && v <= self.hi
    }

    pub fn is_non_negative(&self) -> bool {
        self.lo >= 0.0
    }

    /// Smallest interval containing both operands.
    pub fn hull(&self, other: &Interval) -> Interval {
        Interval {
            lo: self.lo.min(other.lo),
            hi: self.hi.max(other.hi),
        }
    }

    fn from_corners(corners: [f64; 4]) -> Option<Interval> {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for c in corners {
            if c.is_nan() {
                return None;
            }
            lo = lo.min(c);
            hi = hi.max(c);
        }
        Some(Interval { lo, hi })
    }

    /// Apply a monotonically non-decreasing function to both endpoints.
    pub fn map_monotone(&self, f: impl Fn(f64) -> f64) -> Option<Interval> {
        Interval::new(f(self.lo), f(self.hi))
    }

    pub fn add(&self, rhs: &Interval) -> Interval {
        Interval {
            lo: self.lo + rhs.lo,
            hi: self.hi + rhs.hi,
        }
    }

    pub fn sub(&self, rhs: &Interval) -> Interval {
        Interval {
            lo: self.lo - rhs.hi,
            hi: self.hi - rhs.lo,
        }
    }

    pub fn neg(&self) -> Interval {
        Interval {
            lo: -self.hi,
            hi: -self.lo,
        }
    }

    /// Four-corner product; a negative factor reorders the bounds.
    pub fn mul(&self, rhs: &Interval) -> Option<Interval> {
        Interval::from_corners([
            self.lo * rhs.lo,
            self.lo * rhs.hi,
            self.hi * rhs.lo,
            self.hi * rhs.hi,
        ])
    }

    /// Real-valued quotient. `None` when the divisor may be zero.
    pub fn div(&self, rhs: &Interval) -> Option<Interval> {
        if rhs.contains(0.0) {
            return None;
        }
        Interval::from_corners([
            self.lo / rhs.lo,
            self.lo / rhs.hi,
            self.hi / rhs.lo,
            self.hi / rhs.hi,
        ])
    }

    /// Remainder with the sign of the dividend (C `%` / `fmod`).
    ///
    /// Singleton operands are exact. Otherwise the magnitude is bounded by
    /// the largest divisor magnitude (minus one for integers), and a dividend
    /// entirely below the smallest divisor magnitude passes through unchanged.
    pub fn rem(&self, rhs: &Interval, integral: bool) -> Option<Interval> {
        if rhs.lo == 0.0 && rhs.hi == 0.0 {
            return None;
        }
        if self.is_singleton() && rhs.is_singleton() {
            let r = self.lo % rhs.lo;
            return Interval::new(r, r);
        }

        let max_mag = rhs.lo.abs().max(rhs.hi.abs());
        let min_mag = if rhs.contains(0.0) {
            if integral {
                1.0
            } else {
                0.0
            }
        } else {
            rhs.lo.abs().min(rhs.hi.abs())
        };
        let dividend_mag = self.lo.abs().max(self.hi.abs());
        if dividend_mag < min_mag {
            return Some(*self);
        }

        let bound = if integral { max_mag - 1.0 } else { max_mag };
        let lo = if self.lo < 0.0 { self.lo.max(-bound) } else { 0.0 };
        let hi = if self.hi > 0.0 { self.hi.min(bound) } else { 0.0 };
        Interval::new(lo, hi)
    }

    /// Left shift within an unsigned `bits`-wide value.
    pub fn shl(&self, rhs: &Interval, bits: u32) -> Option<Interval> {
        if !self.is_non_negative() || !rhs.is_non_negative() || rhs.hi >= bits as f64 {
            return None;
        }
        let lo = self.lo * 2f64.powf(rhs.lo.floor());
        let hi = self.hi * 2f64.powf(rhs.hi.floor());
        if hi > unsigned_max(bits) {
            return None;
        }
        Interval::new(lo, hi)
    }

    /// Right shift (logical and arithmetic coincide for non-negative values).
    pub fn shr(&self, rhs: &Interval, bits: u32) -> Option<Interval> {
        if !self.is_non_negative() || !rhs.is_non_negative() || rhs.hi >= bits as f64 {
            return None;
        }
        let lo = (self.lo / 2f64.powf(rhs.hi.floor())).floor();
        let hi = (self.hi / 2f64.powf(rhs.lo.floor())).floor();
        Interval::new(lo, hi)
    }

    pub fn and(&self, rhs: &Interval) -> Option<Interval> {
        if !self.is_non_negative() || !rhs.is_non_negative() {
            return None;
        }
        if self.is_singleton() && rhs.is_singleton() {
            return Some(Interval::singleton(
                ((self.lo as u64) & (rhs.lo as u64)) as f64,
            ));
        }
        Interval::new(0.0, self.hi.min(rhs.hi))
    }

    pub fn or(&self, rhs: &Interval) -> Option<Interval> {
        if !self.is_non_negative() || !rhs.is_non_negative() {
            return None;
        }
        if self.is_singleton() && rhs.is_singleton() {
            return Some(Interval::singleton(
                ((self.lo as u64) | (rhs.lo as u64)) as f64,
            ));
        }
        Interval::new(self.lo.max(rhs.lo), envelope(self.hi.max(rhs.hi)))
    }

    pub fn xor(&self, rhs: &Interval) -> Option<Interval> {
        if !self.is_non_negative() || !rhs.is_non_negative() {
            return None;
        }
        if self.is_singleton() && rhs.is_singleton() {
            return Some(Interval::singleton(
                ((self.lo as u64) ^ (rhs.lo as u64)) as f64,
            ));
        }
        Interval::new(0.0, envelope(self.hi.max(rhs.hi)))
    }
}

/// Largest value of the form `2^k - 1` that is `>= v`.
fn envelope(v: f64) -> f64 {
    if v >= u64::MAX as f64 {
        return u64::MAX as f64;
    }
    let n = v as u64;
    match n.checked_add(1).and_then(u64::checked_next_power_of_two) {
        Some(p) => (p - 1) as f64,
        None => u64::MAX as f64,
    }
}

pub fn unsigned_max(bits: u32) -> f64 {
    2f64.powi(bits as i32) - 1.0
}

pub fn signed_min(bits: u32) -> f64 {
    -(2f64.powi(bits as i32 - 1))
}

pub fn signed_max(bits: u32) -> f64 {
    2f64.powi(bits as i32 - 1) - 1.0
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lo, self.hi)
    }
}
