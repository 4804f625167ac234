//! `std::ops` overloads.
//!
//! Every operator runs an operation, so every operator can fail and the
//! output is `Result<VImage>`. Operands are borrowed; a constant may be a
//! single `f64` for all bands or a `&[f64]` with one value per band.
//!
//! ```no_run
//! # fn main() -> vimage::Result<()> {
//! use vimage::VImage;
//!
//! let a = VImage::new_from_file("a.png", None)?;
//! let b = VImage::new_from_file("b.png", None)?;
//! let mean = (&(&a + &b)? / 2.0)?;
//! let brighter = (&mean * &[1.2, 1.0, 0.8][..])?;
//! # Ok(())
//! # }
//! ```
//!
//! Comparisons produce images, which `PartialOrd` can't express; use
//! [`VImage::less`] and friends instead.

use super::VImage;
use crate::enums::OperationBoolean;
use crate::error::Result;
use std::ops::{Add, BitAnd, BitOr, BitXor, Div, Mul, Neg, Rem, Shl, Shr, Sub};

macro_rules! image_ops {
    ($($trait:ident, $method:ident, $call:expr;)+) => {
        $(
            impl $trait<&VImage> for &VImage {
                type Output = Result<VImage>;

                fn $method(self, rhs: &VImage) -> Result<VImage> {
                    let call: fn(&VImage, &VImage) -> Result<VImage> = $call;
                    call(self, rhs)
                }
            }
        )+
    };
}

image_ops! {
    Add, add, |l, r| VImage::add(l, r, None);
    Sub, sub, |l, r| l.subtract(r, None);
    Mul, mul, |l, r| l.multiply(r, None);
    Div, div, |l, r| l.divide(r, None);
    Rem, rem, |l, r| l.remainder(r, None);
    BitAnd, bitand, |l, r| l.boolean(r, OperationBoolean::And, None);
    BitOr, bitor, |l, r| l.boolean(r, OperationBoolean::Or, None);
    BitXor, bitxor, |l, r| l.boolean(r, OperationBoolean::Eor, None);
    Shl, shl, |l, r| l.boolean(r, OperationBoolean::LShift, None);
    Shr, shr, |l, r| l.boolean(r, OperationBoolean::RShift, None);
}

fn ones(n: usize) -> Vec<f64> {
    vec![1.0; n]
}

fn add_const(image: &VImage, c: &[f64]) -> Result<VImage> {
    image.linear(&[1.0], c, None)
}

fn sub_const(image: &VImage, c: &[f64]) -> Result<VImage> {
    let negated: Vec<f64> = c.iter().map(|v| -v).collect();
    image.linear(&[1.0], &negated, None)
}

fn mul_const(image: &VImage, c: &[f64]) -> Result<VImage> {
    image.linear(c, &[0.0], None)
}

/// Division by a zero constant gives zero, like image division.
fn div_const(image: &VImage, c: &[f64]) -> Result<VImage> {
    let reciprocal: Vec<f64> = c
        .iter()
        .map(|&v| if v == 0.0 { 0.0 } else { 1.0 / v })
        .collect();
    image.linear(&reciprocal, &[0.0], None)
}

macro_rules! const_ops {
    ($($trait:ident, $method:ident, $call:expr;)+) => {
        $(
            impl $trait<&[f64]> for &VImage {
                type Output = Result<VImage>;

                fn $method(self, rhs: &[f64]) -> Result<VImage> {
                    let call: fn(&VImage, &[f64]) -> Result<VImage> = $call;
                    call(self, rhs)
                }
            }

            impl $trait<f64> for &VImage {
                type Output = Result<VImage>;

                fn $method(self, rhs: f64) -> Result<VImage> {
                    let call: fn(&VImage, &[f64]) -> Result<VImage> = $call;
                    call(self, &[rhs])
                }
            }
        )+
    };
}

const_ops! {
    Add, add, add_const;
    Sub, sub, sub_const;
    Mul, mul, mul_const;
    Div, div, div_const;
    Rem, rem, |image, c| image.remainder_const(c, None);
    BitAnd, bitand, |image, c| image.boolean_const(OperationBoolean::And, c, None);
    BitOr, bitor, |image, c| image.boolean_const(OperationBoolean::Or, c, None);
    BitXor, bitxor, |image, c| image.boolean_const(OperationBoolean::Eor, c, None);
    Shl, shl, |image, c| image.boolean_const(OperationBoolean::LShift, c, None);
    Shr, shr, |image, c| image.boolean_const(OperationBoolean::RShift, c, None);
}

// constant on the left

impl Add<&VImage> for f64 {
    type Output = Result<VImage>;

    fn add(self, rhs: &VImage) -> Result<VImage> {
        add_const(rhs, &[self])
    }
}

impl Sub<&VImage> for f64 {
    type Output = Result<VImage>;

    fn sub(self, rhs: &VImage) -> Result<VImage> {
        rhs.linear(&[-1.0], &[self], None)
    }
}

impl Mul<&VImage> for f64 {
    type Output = Result<VImage>;

    fn mul(self, rhs: &VImage) -> Result<VImage> {
        mul_const(rhs, &[self])
    }
}

impl Div<&VImage> for f64 {
    type Output = Result<VImage>;

    /// `c / image`; zero pixels give zero.
    fn div(self, rhs: &VImage) -> Result<VImage> {
        let numerator = rhs.new_from_image(&ones(rhs.bands() as usize))?.linear(&[self], &[0.0], None)?;
        numerator.divide(rhs, None)
    }
}

impl Neg for &VImage {
    type Output = Result<VImage>;

    fn neg(self) -> Result<VImage> {
        self.linear(&[-1.0], &[0.0], None)
    }
}

#[cfg(test)]
mod tests {
    use crate::enums::BandFormat;
    use crate::test_helpers::image_from;

    #[test]
    fn image_with_image() {
        let a = image_from(3, 1, BandFormat::UChar, &[10.0, 20.0, 30.0]);
        let b = image_from(3, 1, BandFormat::UChar, &[1.0, 2.0, 3.0]);
        assert_eq!((&a + &b).unwrap().pixels(), &[11.0, 22.0, 33.0]);
        assert_eq!((&a - &b).unwrap().pixels(), &[9.0, 18.0, 27.0]);
        assert_eq!((&a * &b).unwrap().pixels(), &[10.0, 40.0, 90.0]);
        assert_eq!((&a / &b).unwrap().pixels(), &[10.0, 10.0, 10.0]);
        assert_eq!((&a % &b).unwrap().pixels(), &[0.0, 0.0, 0.0]);
        assert_eq!((&a & &b).unwrap().pixels(), &[0.0, 0.0, 2.0]);
        assert_eq!((&b << &b).unwrap().pixels(), &[2.0, 8.0, 24.0]);
    }

    #[test]
    fn image_with_constants() {
        let a = image_from(2, 1, BandFormat::UChar, &[10.0, 20.0]);
        assert_eq!((&a + 5.0).unwrap().pixels(), &[15.0, 25.0]);
        assert_eq!((&a - 5.0).unwrap().pixels(), &[5.0, 15.0]);
        assert_eq!((&a * 0.5).unwrap().pixels(), &[5.0, 10.0]);
        assert_eq!((&a / 4.0).unwrap().pixels(), &[2.5, 5.0]);
        assert_eq!((&a / 0.0).unwrap().pixels(), &[0.0, 0.0]);
        assert_eq!((&a % 3.0).unwrap().pixels(), &[1.0, 2.0]);
        assert_eq!((&a | 1.0).unwrap().pixels(), &[11.0, 21.0]);
        assert_eq!((&a >> 1.0).unwrap().pixels(), &[5.0, 10.0]);

        let per_band = (&a * &[1.0, 2.0, 3.0][..]).unwrap();
        assert_eq!(per_band.bands(), 3);
        assert_eq!(per_band.pixels(), &[10.0, 20.0, 30.0, 20.0, 40.0, 60.0]);
    }

    #[test]
    fn constant_on_the_left_and_negation() {
        let a = image_from(2, 1, BandFormat::UChar, &[10.0, 0.0]);
        assert_eq!((100.0 - &a).unwrap().pixels(), &[90.0, 100.0]);
        assert_eq!((2.0 * &a).unwrap().pixels(), &[20.0, 0.0]);
        assert_eq!((1.0 + &a).unwrap().pixels(), &[11.0, 1.0]);
        assert_eq!((50.0 / &a).unwrap().pixels(), &[5.0, 0.0]);
        assert_eq!((-&a).unwrap().pixels(), &[-10.0, 0.0]);
    }

    #[test]
    fn mismatched_sizes_are_errors() {
        let a = image_from(2, 1, BandFormat::UChar, &[1.0, 2.0]);
        let b = image_from(1, 2, BandFormat::UChar, &[1.0, 2.0]);
        assert!((&a + &b).is_err());
    }
}
