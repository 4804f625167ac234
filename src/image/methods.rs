//! One typed method per built-in operation.
//!
//! Every method here has the same shape: put its required arguments in a
//! [`VOption`], append the caller's optional `VOption`, [`call`] the
//! operation by name and hand back the single output. Optional arguments
//! and extra outputs go through `options`:
//!
//! ```no_run
//! use vimage::{VImage, VOption};
//!
//! # fn main() -> vimage::Result<()> {
//! let image = VImage::new_from_file("photo.png", None)?;
//! let (mut x, mut y) = (0, 0);
//! let darkest = image.min(Some(VOption::new().set_output("x", &mut x).set_output("y", &mut y)))?;
//! println!("{darkest} at ({x}, {y})");
//! # Ok(())
//! # }
//! ```
//!
//! Scalar convenience forms (`sin`, `fliphor`, `rot90`, `less_const`, ...)
//! take no options.

use super::VImage;
use crate::call::call;
use crate::connection::{VSource, VTarget};
use crate::enums::{
    Angle, BandFormat, Direction, OperationBoolean, OperationMath, OperationMath2,
    OperationRelational, OperationRound,
};
use crate::error::Result;
use crate::option::VOption;
use crate::value::Blob;

fn merged<'a>(args: VOption<'a>, options: Option<VOption<'a>>) -> VOption<'a> {
    match options {
        Some(options) => args.extend(options),
        None => args,
    }
}

fn image_output(operation: &str, args: VOption<'_>, options: Option<VOption<'_>>) -> Result<VImage> {
    let mut out = VImage::default();
    call(operation, Some(merged(args, options).set_output("out", &mut out)))?;
    Ok(out)
}

fn double_output(operation: &str, args: VOption<'_>, options: Option<VOption<'_>>) -> Result<f64> {
    let mut out = 0.0;
    call(operation, Some(merged(args, options).set_output("out", &mut out)))?;
    Ok(out)
}

fn blob_output(operation: &str, args: VOption<'_>, options: Option<VOption<'_>>) -> Result<Blob> {
    let mut buffer = Blob::default();
    call(operation, Some(merged(args, options).set_output("buffer", &mut buffer)))?;
    Ok(buffer)
}

fn no_output(operation: &str, args: VOption<'_>, options: Option<VOption<'_>>) -> Result<()> {
    call(operation, Some(merged(args, options)))
}

// =========================================================================
// Arithmetic
// =========================================================================

impl VImage {
    pub fn copy(&self, options: Option<VOption<'_>>) -> Result<VImage> {
        image_output("copy", VOption::new().set("in", self), options)
    }

    pub fn cast(&self, format: BandFormat, options: Option<VOption<'_>>) -> Result<VImage> {
        image_output("cast", VOption::new().set("in", self).set("format", format), options)
    }

    pub fn invert(&self, options: Option<VOption<'_>>) -> Result<VImage> {
        image_output("invert", VOption::new().set("in", self), options)
    }

    /// `a * in + b`, one `a` and `b` per band (or one for all bands).
    pub fn linear(&self, a: &[f64], b: &[f64], options: Option<VOption<'_>>) -> Result<VImage> {
        image_output(
            "linear",
            VOption::new().set("in", self).set("a", a).set("b", b),
            options,
        )
    }

    pub fn linear1(&self, a: f64, b: f64) -> Result<VImage> {
        self.linear(&[a], &[b], None)
    }

    pub fn add(&self, right: &VImage, options: Option<VOption<'_>>) -> Result<VImage> {
        image_output("add", VOption::new().set("left", self).set("right", right), options)
    }

    pub fn subtract(&self, right: &VImage, options: Option<VOption<'_>>) -> Result<VImage> {
        image_output("subtract", VOption::new().set("left", self).set("right", right), options)
    }

    pub fn multiply(&self, right: &VImage, options: Option<VOption<'_>>) -> Result<VImage> {
        image_output("multiply", VOption::new().set("left", self).set("right", right), options)
    }

    pub fn divide(&self, right: &VImage, options: Option<VOption<'_>>) -> Result<VImage> {
        image_output("divide", VOption::new().set("left", self).set("right", right), options)
    }

    pub fn remainder(&self, right: &VImage, options: Option<VOption<'_>>) -> Result<VImage> {
        image_output("remainder", VOption::new().set("left", self).set("right", right), options)
    }

    pub fn remainder_const(&self, c: &[f64], options: Option<VOption<'_>>) -> Result<VImage> {
        image_output("remainder_const", VOption::new().set("in", self).set("c", c), options)
    }

    pub fn abs(&self, options: Option<VOption<'_>>) -> Result<VImage> {
        image_output("abs", VOption::new().set("in", self), options)
    }

    pub fn sign(&self, options: Option<VOption<'_>>) -> Result<VImage> {
        image_output("sign", VOption::new().set("in", self), options)
    }

    /// Trigonometry works in degrees.
    pub fn math(&self, math: OperationMath, options: Option<VOption<'_>>) -> Result<VImage> {
        image_output("math", VOption::new().set("in", self).set("math", math), options)
    }

    pub fn sin(&self) -> Result<VImage> {
        self.math(OperationMath::Sin, None)
    }

    pub fn cos(&self) -> Result<VImage> {
        self.math(OperationMath::Cos, None)
    }

    pub fn tan(&self) -> Result<VImage> {
        self.math(OperationMath::Tan, None)
    }

    pub fn asin(&self) -> Result<VImage> {
        self.math(OperationMath::Asin, None)
    }

    pub fn acos(&self) -> Result<VImage> {
        self.math(OperationMath::Acos, None)
    }

    pub fn atan(&self) -> Result<VImage> {
        self.math(OperationMath::Atan, None)
    }

    pub fn log(&self) -> Result<VImage> {
        self.math(OperationMath::Log, None)
    }

    pub fn log10(&self) -> Result<VImage> {
        self.math(OperationMath::Log10, None)
    }

    pub fn exp(&self) -> Result<VImage> {
        self.math(OperationMath::Exp, None)
    }

    pub fn exp10(&self) -> Result<VImage> {
        self.math(OperationMath::Exp10, None)
    }

    pub fn math2(
        &self,
        right: &VImage,
        math2: OperationMath2,
        options: Option<VOption<'_>>,
    ) -> Result<VImage> {
        image_output(
            "math2",
            VOption::new()
                .set("left", self)
                .set("right", right)
                .set("math2", math2),
            options,
        )
    }

    pub fn math2_const(
        &self,
        math2: OperationMath2,
        c: &[f64],
        options: Option<VOption<'_>>,
    ) -> Result<VImage> {
        image_output(
            "math2_const",
            VOption::new().set("in", self).set("math2", math2).set("c", c),
            options,
        )
    }

    pub fn pow(&self, right: &VImage) -> Result<VImage> {
        self.math2(right, OperationMath2::Pow, None)
    }

    /// `right` to the power of `self`.
    pub fn wop(&self, right: &VImage) -> Result<VImage> {
        self.math2(right, OperationMath2::Wop, None)
    }

    pub fn atan2(&self, right: &VImage) -> Result<VImage> {
        self.math2(right, OperationMath2::Atan2, None)
    }

    pub fn pow_const(&self, c: &[f64]) -> Result<VImage> {
        self.math2_const(OperationMath2::Pow, c, None)
    }

    pub fn wop_const(&self, c: &[f64]) -> Result<VImage> {
        self.math2_const(OperationMath2::Wop, c, None)
    }

    /// A `uchar` mask: 255 where the comparison holds, 0 elsewhere.
    pub fn relational(
        &self,
        right: &VImage,
        relational: OperationRelational,
        options: Option<VOption<'_>>,
    ) -> Result<VImage> {
        image_output(
            "relational",
            VOption::new()
                .set("left", self)
                .set("right", right)
                .set("relational", relational),
            options,
        )
    }

    pub fn relational_const(
        &self,
        relational: OperationRelational,
        c: &[f64],
        options: Option<VOption<'_>>,
    ) -> Result<VImage> {
        image_output(
            "relational_const",
            VOption::new()
                .set("in", self)
                .set("relational", relational)
                .set("c", c),
            options,
        )
    }

    pub fn less(&self, right: &VImage) -> Result<VImage> {
        self.relational(right, OperationRelational::Less, None)
    }

    pub fn lesseq(&self, right: &VImage) -> Result<VImage> {
        self.relational(right, OperationRelational::LessEq, None)
    }

    pub fn more(&self, right: &VImage) -> Result<VImage> {
        self.relational(right, OperationRelational::More, None)
    }

    pub fn moreeq(&self, right: &VImage) -> Result<VImage> {
        self.relational(right, OperationRelational::MoreEq, None)
    }

    pub fn equal(&self, right: &VImage) -> Result<VImage> {
        self.relational(right, OperationRelational::Equal, None)
    }

    pub fn notequal(&self, right: &VImage) -> Result<VImage> {
        self.relational(right, OperationRelational::NotEq, None)
    }

    pub fn less_const(&self, c: &[f64]) -> Result<VImage> {
        self.relational_const(OperationRelational::Less, c, None)
    }

    pub fn lesseq_const(&self, c: &[f64]) -> Result<VImage> {
        self.relational_const(OperationRelational::LessEq, c, None)
    }

    pub fn more_const(&self, c: &[f64]) -> Result<VImage> {
        self.relational_const(OperationRelational::More, c, None)
    }

    pub fn moreeq_const(&self, c: &[f64]) -> Result<VImage> {
        self.relational_const(OperationRelational::MoreEq, c, None)
    }

    pub fn equal_const(&self, c: &[f64]) -> Result<VImage> {
        self.relational_const(OperationRelational::Equal, c, None)
    }

    pub fn notequal_const(&self, c: &[f64]) -> Result<VImage> {
        self.relational_const(OperationRelational::NotEq, c, None)
    }

    /// Bitwise operations; float images are cast to `int` first.
    pub fn boolean(
        &self,
        right: &VImage,
        boolean: OperationBoolean,
        options: Option<VOption<'_>>,
    ) -> Result<VImage> {
        image_output(
            "boolean",
            VOption::new()
                .set("left", self)
                .set("right", right)
                .set("boolean", boolean),
            options,
        )
    }

    pub fn boolean_const(
        &self,
        boolean: OperationBoolean,
        c: &[f64],
        options: Option<VOption<'_>>,
    ) -> Result<VImage> {
        image_output(
            "boolean_const",
            VOption::new().set("in", self).set("boolean", boolean).set("c", c),
            options,
        )
    }

    pub fn round(&self, round: OperationRound, options: Option<VOption<'_>>) -> Result<VImage> {
        image_output("round", VOption::new().set("in", self).set("round", round), options)
    }

    pub fn floor(&self) -> Result<VImage> {
        self.round(OperationRound::Floor, None)
    }

    pub fn ceil(&self) -> Result<VImage> {
        self.round(OperationRound::Ceil, None)
    }

    pub fn rint(&self) -> Result<VImage> {
        self.round(OperationRound::Rint, None)
    }

    pub fn avg(&self, options: Option<VOption<'_>>) -> Result<f64> {
        double_output("avg", VOption::new().set("in", self), options)
    }

    /// Smallest sample. Ask for the `x` and `y` outputs to find where it is.
    pub fn min(&self, options: Option<VOption<'_>>) -> Result<f64> {
        double_output("min", VOption::new().set("in", self), options)
    }

    /// Largest sample. Ask for the `x` and `y` outputs to find where it is.
    pub fn max(&self, options: Option<VOption<'_>>) -> Result<f64> {
        double_output("max", VOption::new().set("in", self), options)
    }

    pub fn deviate(&self, options: Option<VOption<'_>>) -> Result<f64> {
        double_output("deviate", VOption::new().set("in", self), options)
    }

    /// Every band of the pixel at `(x, y)`.
    pub fn getpoint(&self, x: i32, y: i32, options: Option<VOption<'_>>) -> Result<Vec<f64>> {
        let mut out = Vec::new();
        call(
            "getpoint",
            Some(merged(
                VOption::new().set("in", self).set("x", x).set("y", y),
                options,
            )
            .set_output("out_array", &mut out)),
        )?;
        Ok(out)
    }
}

// =========================================================================
// Conversion
// =========================================================================

impl VImage {
    pub fn extract_area(
        &self,
        left: i32,
        top: i32,
        width: i32,
        height: i32,
        options: Option<VOption<'_>>,
    ) -> Result<VImage> {
        image_output(
            "extract_area",
            VOption::new()
                .set("input", self)
                .set("left", left)
                .set("top", top)
                .set("width", width)
                .set("height", height),
            options,
        )
    }

    pub fn crop(
        &self,
        left: i32,
        top: i32,
        width: i32,
        height: i32,
        options: Option<VOption<'_>>,
    ) -> Result<VImage> {
        image_output(
            "crop",
            VOption::new()
                .set("input", self)
                .set("left", left)
                .set("top", top)
                .set("width", width)
                .set("height", height),
            options,
        )
    }

    /// Take `n` bands (option, default 1) starting at `band`.
    pub fn extract_band(&self, band: i32, options: Option<VOption<'_>>) -> Result<VImage> {
        image_output(
            "extract_band",
            VOption::new().set("in", self).set("band", band),
            options,
        )
    }

    /// One band as a new image.
    pub fn band(&self, i: i32) -> Result<VImage> {
        self.extract_band(i, None)
    }

    /// Every band as a separate one-band image.
    pub fn bandsplit(&self) -> Result<Vec<VImage>> {
        (0..self.bands() as i32).map(|i| self.band(i)).collect()
    }

    /// Join images band-wise. One-band images are repeated to the size of
    /// the others.
    pub fn bandjoin(images: &[VImage], options: Option<VOption<'_>>) -> Result<VImage> {
        image_output("bandjoin", VOption::new().set("in", images), options)
    }

    pub fn bandjoin_with(&self, other: &VImage) -> Result<VImage> {
        Self::bandjoin(&[self.clone(), other.clone()], None)
    }

    pub fn bandjoin_const(&self, c: &[f64], options: Option<VOption<'_>>) -> Result<VImage> {
        image_output("bandjoin_const", VOption::new().set("in", self).set("c", c), options)
    }

    pub fn flip(&self, direction: Direction, options: Option<VOption<'_>>) -> Result<VImage> {
        image_output(
            "flip",
            VOption::new().set("in", self).set("direction", direction),
            options,
        )
    }

    pub fn fliphor(&self) -> Result<VImage> {
        self.flip(Direction::Horizontal, None)
    }

    pub fn flipver(&self) -> Result<VImage> {
        self.flip(Direction::Vertical, None)
    }

    pub fn rot(&self, angle: Angle, options: Option<VOption<'_>>) -> Result<VImage> {
        image_output("rot", VOption::new().set("in", self).set("angle", angle), options)
    }

    pub fn rot90(&self) -> Result<VImage> {
        self.rot(Angle::D90, None)
    }

    pub fn rot180(&self) -> Result<VImage> {
        self.rot(Angle::D180, None)
    }

    pub fn rot270(&self) -> Result<VImage> {
        self.rot(Angle::D270, None)
    }

    pub fn embed(
        &self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        options: Option<VOption<'_>>,
    ) -> Result<VImage> {
        image_output(
            "embed",
            VOption::new()
                .set("in", self)
                .set("x", x)
                .set("y", y)
                .set("width", width)
                .set("height", height),
            options,
        )
    }

    /// Use `self` as a condition: non-zero pixels take `then`, zero pixels
    /// take `otherwise`.
    pub fn ifthenelse(
        &self,
        then: &VImage,
        otherwise: &VImage,
        options: Option<VOption<'_>>,
    ) -> Result<VImage> {
        image_output(
            "ifthenelse",
            VOption::new()
                .set("cond", self)
                .set("in1", then)
                .set("in2", otherwise),
            options,
        )
    }

    /// `ifthenelse` with constant pixels on both sides. The constants take
    /// the condition's format.
    pub fn ifthenelse_const(
        &self,
        then: &[f64],
        otherwise: &[f64],
        options: Option<VOption<'_>>,
    ) -> Result<VImage> {
        self.ifthenelse(&self.new_from_image(then)?, &self.new_from_image(otherwise)?, options)
    }

    /// `ifthenelse` with a constant for the false pixels, in the format of
    /// `then`.
    pub fn ifthenelse_else_const(
        &self,
        then: &VImage,
        otherwise: &[f64],
        options: Option<VOption<'_>>,
    ) -> Result<VImage> {
        self.ifthenelse(then, &then.new_from_image(otherwise)?, options)
    }
}

// =========================================================================
// Create, convolution, resample
// =========================================================================

impl VImage {
    /// A `uchar` image of zeros; `bands` is an option.
    pub fn black(width: i32, height: i32, options: Option<VOption<'_>>) -> Result<VImage> {
        image_output(
            "black",
            VOption::new().set("width", width).set("height", height),
            options,
        )
    }

    /// A two-band image holding each pixel's coordinates.
    pub fn xyz(width: i32, height: i32, options: Option<VOption<'_>>) -> Result<VImage> {
        image_output(
            "xyz",
            VOption::new().set("width", width).set("height", height),
            options,
        )
    }

    pub fn gaussmat(sigma: f64, min_ampl: f64, options: Option<VOption<'_>>) -> Result<VImage> {
        image_output(
            "gaussmat",
            VOption::new().set("sigma", sigma).set("min_ampl", min_ampl),
            options,
        )
    }

    pub fn conv(&self, mask: &VImage, options: Option<VOption<'_>>) -> Result<VImage> {
        image_output("conv", VOption::new().set("in", self).set("mask", mask), options)
    }

    pub fn gaussblur(&self, sigma: f64, options: Option<VOption<'_>>) -> Result<VImage> {
        image_output("gaussblur", VOption::new().set("in", self).set("sigma", sigma), options)
    }

    pub fn shrink(&self, hshrink: i32, vshrink: i32, options: Option<VOption<'_>>) -> Result<VImage> {
        image_output(
            "shrink",
            VOption::new()
                .set("in", self)
                .set("hshrink", hshrink)
                .set("vshrink", vshrink),
            options,
        )
    }

    pub fn resize(&self, scale: f64, options: Option<VOption<'_>>) -> Result<VImage> {
        image_output("resize", VOption::new().set("in", self).set("scale", scale), options)
    }

    /// Transform by the 2x2 matrix `[a, b, c, d]`.
    pub fn affine(&self, matrix: &[f64], options: Option<VOption<'_>>) -> Result<VImage> {
        image_output("affine", VOption::new().set("in", self).set("matrix", matrix), options)
    }
}

// =========================================================================
// Load and save
// =========================================================================

macro_rules! codec_methods {
    ($(
        $load:ident, $load_buffer:ident, $load_source:ident,
        $save:ident, $save_buffer:ident, $save_target:ident;
    )+) => {
        impl VImage {
            $(
                pub fn $load(filename: &str, options: Option<VOption<'_>>) -> Result<VImage> {
                    image_output(stringify!($load), VOption::new().set("filename", filename), options)
                }

                pub fn $load_buffer(buffer: &[u8], options: Option<VOption<'_>>) -> Result<VImage> {
                    image_output(
                        stringify!($load_buffer),
                        VOption::new().set("buffer", Blob::from(buffer)),
                        options,
                    )
                }

                pub fn $load_source(source: &VSource, options: Option<VOption<'_>>) -> Result<VImage> {
                    image_output(stringify!($load_source), VOption::new().set("source", source), options)
                }

                pub fn $save(&self, filename: &str, options: Option<VOption<'_>>) -> Result<()> {
                    no_output(
                        stringify!($save),
                        VOption::new().set("in", self).set("filename", filename),
                        options,
                    )
                }

                pub fn $save_buffer(&self, options: Option<VOption<'_>>) -> Result<Blob> {
                    blob_output(stringify!($save_buffer), VOption::new().set("in", self), options)
                }

                pub fn $save_target(&self, target: &VTarget, options: Option<VOption<'_>>) -> Result<()> {
                    no_output(
                        stringify!($save_target),
                        VOption::new().set("in", self).set("target", target),
                        options,
                    )
                }
            )+
        }
    };
}

codec_methods! {
    pngload, pngload_buffer, pngload_source, pngsave, pngsave_buffer, pngsave_target;
    jpegload, jpegload_buffer, jpegload_source, jpegsave, jpegsave_buffer, jpegsave_target;
    tiffload, tiffload_buffer, tiffload_source, tiffsave, tiffsave_buffer, tiffsave_target;
    webpload, webpload_buffer, webpload_source, webpsave, webpsave_buffer, webpsave_target;
}

impl VImage {
    pub fn matrixload(filename: &str, options: Option<VOption<'_>>) -> Result<VImage> {
        image_output("matrixload", VOption::new().set("filename", filename), options)
    }

    pub fn matrixload_source(source: &VSource, options: Option<VOption<'_>>) -> Result<VImage> {
        image_output("matrixload_source", VOption::new().set("source", source), options)
    }

    pub fn matrixsave(&self, filename: &str, options: Option<VOption<'_>>) -> Result<()> {
        no_output(
            "matrixsave",
            VOption::new().set("in", self).set("filename", filename),
            options,
        )
    }

    pub fn matrixsave_target(&self, target: &VTarget, options: Option<VOption<'_>>) -> Result<()> {
        no_output(
            "matrixsave_target",
            VOption::new().set("in", self).set("target", target),
            options,
        )
    }
}
