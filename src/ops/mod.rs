//! Built-in operations.
//!
//! Each submodule registers a family of operations. An operation is a
//! [`Builtin`]: a name, a description, its argument declarations and a plain
//! function doing the work. The helpers below hold the pixel loops shared by
//! most of them; every loop runs on the rayon pool sized by
//! [`crate::init`].
//!
//! | Module | Operations |
//! |---|---|
//! | [`arithmetic`] | `add`, `linear`, `math`, `relational`, `avg`, `getpoint`, ... |
//! | [`conversion`] | `copy`, `cast`, `extract_area`, `bandjoin`, `flip`, `rot`, `embed`, `ifthenelse` |
//! | [`create`] | `black`, `xyz`, `gaussmat` |
//! | [`convolution`] | `conv`, `gaussblur` |
//! | [`resample`] | `resize`, `affine` |
//! | [`foreign`] | per-format loaders and savers |

pub mod arithmetic;
pub mod conversion;
pub mod convolution;
pub mod create;
pub mod foreign;
pub mod resample;

use crate::enums::BandFormat;
use crate::image::{Header, VImage};
use crate::operation::{ArgSpec, Arguments, Operation, OperationError};
use crate::registry::Registry;
use rayon::prelude::*;
use std::sync::Arc;

pub(crate) type OpResult<T> = std::result::Result<T, OperationError>;

/// An operation implemented by a function.
pub struct Builtin {
    name: &'static str,
    description: &'static str,
    args: Vec<ArgSpec>,
    run: fn(&mut Arguments) -> OpResult<()>,
}

impl Builtin {
    pub fn new(
        name: &'static str,
        description: &'static str,
        args: Vec<ArgSpec>,
        run: fn(&mut Arguments) -> OpResult<()>,
    ) -> Self {
        Self {
            name,
            description,
            args,
            run,
        }
    }
}

impl Operation for Builtin {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn args(&self) -> &[ArgSpec] {
        &self.args
    }

    fn build(&self, args: &mut Arguments) -> OpResult<()> {
        (self.run)(args)
    }
}

/// Register every built-in operation.
pub fn register_builtins(registry: &mut Registry) {
    let families = [
        arithmetic::operations(),
        conversion::operations(),
        create::operations(),
        convolution::operations(),
        resample::operations(),
    ];
    for builtin in families.into_iter().flatten() {
        registry.insert(Arc::new(builtin));
    }
    for codec in foreign::operations() {
        registry.insert(codec);
    }
}

// =========================================================================
// Pixel helpers
// =========================================================================

/// A new image like `image` with `format` and samples `f(sample, band)`.
pub(crate) fn map_bands(
    image: &VImage,
    format: BandFormat,
    f: impl Fn(f64, usize) -> f64 + Sync,
) -> OpResult<VImage> {
    let bands = image.bands() as usize;
    let pixels = image
        .pixels()
        .par_iter()
        .enumerate()
        .map(|(i, &v)| f(v, i % bands))
        .collect();
    let header = reshape(image, image.width(), image.height(), image.bands(), format);
    Ok(image.derive(header, pixels)?)
}

/// A new image like `image` with `format` and samples `f(sample)`.
pub(crate) fn map_samples(
    image: &VImage,
    format: BandFormat,
    f: impl Fn(f64) -> f64 + Sync,
) -> OpResult<VImage> {
    map_bands(image, format, |v, _| f(v))
}

/// Header of `image` with new geometry and format.
pub(crate) fn reshape(
    image: &VImage,
    width: u32,
    height: u32,
    bands: u32,
    format: BandFormat,
) -> Header {
    image.header().with_shape(width, height, bands, format)
}

/// Band count after pairing `a` bands with `b` bands. One side may have a
/// single band, which is repeated across the other.
pub(crate) fn broadcast_bands(a: usize, b: usize) -> OpResult<usize> {
    if a == b || b == 1 {
        Ok(a)
    } else if a == 1 {
        Ok(b)
    } else {
        Err(OperationError::Failed(format!(
            "band counts {a} and {b} don't match"
        )))
    }
}

/// Combine two images sample by sample.
///
/// The images must be the same size. Band counts must match or one image
/// must have a single band.
pub(crate) fn binary(
    left: &VImage,
    right: &VImage,
    format: BandFormat,
    f: impl Fn(f64, f64) -> f64 + Sync,
) -> OpResult<VImage> {
    if (left.width(), left.height()) != (right.width(), right.height()) {
        return Err(OperationError::Failed(format!(
            "images are {}x{} and {}x{}, sizes must match",
            left.width(),
            left.height(),
            right.width(),
            right.height()
        )));
    }
    let (lb, rb) = (left.bands() as usize, right.bands() as usize);
    let bands = broadcast_bands(lb, rb)?;
    let count = left.width() as usize * left.height() as usize * bands;
    let (lp, rp) = (left.pixels(), right.pixels());
    let pixels = (0..count)
        .into_par_iter()
        .map(|i| {
            let (pixel, band) = (i / bands, i % bands);
            let l = lp[pixel * lb + if lb == 1 { 0 } else { band }];
            let r = rp[pixel * rb + if rb == 1 { 0 } else { band }];
            f(l, r)
        })
        .collect();
    let header = reshape(left, left.width(), left.height(), bands as u32, format);
    Ok(left.derive(header, pixels)?)
}

/// Combine each pixel with a vector of constants, one per band.
///
/// A single constant applies to every band; several constants against a
/// one-band image make a many-band result.
pub(crate) fn with_constants(
    image: &VImage,
    constants: &[f64],
    format: BandFormat,
    f: impl Fn(f64, f64) -> f64 + Sync,
) -> OpResult<VImage> {
    if constants.is_empty() {
        return Err(OperationError::argument("c", "needs at least one constant"));
    }
    let ib = image.bands() as usize;
    let cb = constants.len();
    let bands = broadcast_bands(ib, cb)?;
    let count = image.width() as usize * image.height() as usize * bands;
    let pixels = image.pixels();
    let out = (0..count)
        .into_par_iter()
        .map(|i| {
            let (pixel, band) = (i / bands, i % bands);
            let v = pixels[pixel * ib + if ib == 1 { 0 } else { band }];
            f(v, constants[if cb == 1 { 0 } else { band }])
        })
        .collect();
    let header = reshape(image, image.width(), image.height(), bands as u32, format);
    Ok(image.derive(header, out)?)
}

/// The single input image most operations declare.
pub(crate) fn image_in() -> ArgSpec {
    ArgSpec::input("in", "Input image", crate::value::ValueType::Image)
}

/// The single output image most operations declare.
pub(crate) fn image_out() -> ArgSpec {
    ArgSpec::output("out", "Output image", crate::value::ValueType::Image)
}

/// Fail on an image with no pixels, for operations that sample their input.
pub(crate) fn require_pixels(image: &VImage, operation: &str) -> OpResult<()> {
    if image.width() == 0 || image.height() == 0 {
        return Err(OperationError::Failed(format!(
            "{operation} needs a non-empty image, got {}x{}",
            image.width(),
            image.height()
        )));
    }
    Ok(())
}

/// Read an integer argument that must be positive, as a pixel dimension.
pub(crate) fn dimension(args: &Arguments, name: &str) -> OpResult<u32> {
    let value = args.int(name)?;
    u32::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| OperationError::argument(name, format!("{value} is not a positive size")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{gradient, image_from};

    #[test]
    fn declarations_are_well_formed() {
        let registry = Registry::with_builtins();
        for name in ["add", "copy", "black", "conv", "affine", "pngsave_buffer", "matrixload"] {
            assert!(registry.get(name).is_some(), "{name} missing");
        }
        for name in registry.names() {
            let Some(operation) = registry.get(name) else {
                panic!("{name} listed but not found");
            };
            let args = operation.args();
            let mut seen = std::collections::HashSet::new();
            for spec in args {
                assert!(seen.insert(spec.name), "{name}: {} declared twice", spec.name);
                if let Some(default) = &spec.default {
                    assert_eq!(default.value_type(), spec.value_type, "{name}.{}", spec.name);
                }
            }
            // required arguments come first, in positional order
            let first_optional = args.iter().position(|a| !a.required).unwrap_or(args.len());
            assert!(
                args[first_optional..].iter().all(|a| !a.required),
                "{name}: required argument after an optional one"
            );
        }
    }

    #[test]
    fn binary_broadcasts_single_band() {
        let rgb = gradient(3, 2, 3);
        let mono = image_from(3, 2, BandFormat::UChar, &[1.0; 6]);
        let sum = binary(&rgb, &mono, BandFormat::UShort, |a, b| a + b).unwrap();
        assert_eq!(sum.bands(), 3);
        assert_eq!(sum.data().pixel(1, 0), &[2.0, 12.0, 22.0]);
    }

    #[test]
    fn binary_rejects_size_mismatch() {
        let a = gradient(3, 2, 1);
        let b = gradient(2, 3, 1);
        assert!(binary(&a, &b, BandFormat::UChar, |a, _| a).is_err());
    }

    #[test]
    fn constants_expand_one_band_image() {
        let mono = image_from(2, 1, BandFormat::UChar, &[10.0, 20.0]);
        let out = with_constants(&mono, &[1.0, 2.0, 3.0], BandFormat::UChar, |v, c| v + c).unwrap();
        assert_eq!(out.bands(), 3);
        assert_eq!(out.pixels(), &[11.0, 12.0, 13.0, 21.0, 22.0, 23.0]);
    }

    #[test]
    fn constants_mismatching_bands_fail() {
        let rgb = gradient(2, 2, 3);
        assert!(with_constants(&rgb, &[1.0, 2.0], BandFormat::UChar, |v, _| v).is_err());
    }
}
