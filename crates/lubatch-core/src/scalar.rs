//! Numeric element types supported by the factorization.
//!
//! The algorithm is written once over [`Scalar`]; the four LAPACK precisions
//! (`s`, `d`, `c`, `z`) are the implementations below. Every precision is
//! also a faer field, so backends can hand blocks straight to faer kernels.

use bytemuck::Pod;
use faer::traits::ComplexField;
use num_complex::Complex;
use num_traits::{Float, One, ToPrimitive, Zero};
use std::fmt::Debug;
use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign};

/// Element type of a matrix in the batch.
pub trait Scalar:
    ComplexField
    + Copy
    + Debug
    + PartialEq
    + Send
    + Sync
    + Pod
    + Zero
    + One
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
    + 'static
{
    /// Real type of magnitudes (and of the components of complex values).
    type Magnitude: Float + Debug + Send + Sync + Pod + 'static;

    /// LAPACK precision letter.
    const PREFIX: char;

    /// Absolute value for real types, modulus for complex types.
    fn modulus(self) -> Self::Magnitude;

    /// Embed a real value.
    fn from_real(re: Self::Magnitude) -> Self;

    /// Build a value from `f64` parts; the imaginary part is dropped for real types.
    fn from_f64_parts(re: f64, im: f64) -> Self;

    /// Reciprocal used to scale multipliers. An exactly-zero pivot yields one,
    /// which leaves the column unscaled.
    #[inline]
    fn pivot_reciprocal(self) -> Self {
        if self == Self::zero() {
            Self::one()
        } else {
            Self::one() / self
        }
    }

    /// Machine epsilon of the real type, as `f64`.
    fn epsilon_f64() -> f64 {
        <Self::Magnitude as Float>::epsilon().to_f64().unwrap_or(f64::EPSILON)
    }

    /// Magnitude as `f64`, for residual reporting.
    fn modulus_f64(self) -> f64 {
        self.modulus().to_f64().unwrap_or(f64::NAN)
    }
}

impl Scalar for f32 {
    type Magnitude = f32;
    const PREFIX: char = 's';

    #[inline]
    fn modulus(self) -> f32 {
        self.abs()
    }

    #[inline]
    fn from_real(re: f32) -> Self {
        re
    }

    fn from_f64_parts(re: f64, _im: f64) -> Self {
        re as f32
    }
}

impl Scalar for f64 {
    type Magnitude = f64;
    const PREFIX: char = 'd';

    #[inline]
    fn modulus(self) -> f64 {
        self.abs()
    }

    #[inline]
    fn from_real(re: f64) -> Self {
        re
    }

    fn from_f64_parts(re: f64, _im: f64) -> Self {
        re
    }
}

impl Scalar for Complex<f32> {
    type Magnitude = f32;
    const PREFIX: char = 'c';

    #[inline]
    fn modulus(self) -> f32 {
        self.norm()
    }

    #[inline]
    fn from_real(re: f32) -> Self {
        Complex::new(re, 0.0)
    }

    fn from_f64_parts(re: f64, im: f64) -> Self {
        Complex::new(re as f32, im as f32)
    }
}

impl Scalar for Complex<f64> {
    type Magnitude = f64;
    const PREFIX: char = 'z';

    #[inline]
    fn modulus(self) -> f64 {
        self.norm()
    }

    #[inline]
    fn from_real(re: f64) -> Self {
        Complex::new(re, 0.0)
    }

    fn from_f64_parts(re: f64, im: f64) -> Self {
        Complex::new(re, im)
    }
}
