//! Per-pixel arithmetic and whole-image statistics.
//!
//! Result formats follow the usual widening rules: `add` and `multiply`
//! widen one step so sums don't wrap, `subtract` goes signed, `divide` and
//! the maths functions go float, relational operations produce 0/255
//! `uchar` masks. Angles are in degrees.

use super::{Builtin, OpResult, binary, image_in, image_out, map_bands, map_samples, with_constants};
use crate::enums::{
    BandFormat, EnumType, OperationBoolean, OperationMath, OperationMath2, OperationRelational,
    OperationRound,
};
use crate::image::VImage;
use crate::operation::{ArgSpec, Arguments, OperationError};
use crate::value::ValueType;
use rayon::prelude::*;

pub fn operations() -> Vec<Builtin> {
    let left = || ArgSpec::input("left", "Left-hand image", ValueType::Image);
    let right = || ArgSpec::input("right", "Right-hand image", ValueType::Image);
    let constants = || ArgSpec::input("c", "Constants, one per band", ValueType::ArrayDouble);
    let binary_args = || vec![left(), right(), image_out()];

    vec![
        Builtin::new("add", "add two images", binary_args(), add),
        Builtin::new("subtract", "subtract two images", binary_args(), subtract),
        Builtin::new("multiply", "multiply two images", binary_args(), multiply),
        Builtin::new("divide", "divide two images", binary_args(), divide),
        Builtin::new(
            "remainder",
            "remainder after integer division of two images",
            binary_args(),
            remainder,
        ),
        Builtin::new(
            "remainder_const",
            "remainder after integer division of an image and a constant",
            vec![image_in(), image_out(), constants()],
            remainder_const,
        ),
        Builtin::new(
            "linear",
            "calculate (a * in + b)",
            vec![
                image_in(),
                image_out(),
                ArgSpec::input("a", "Multiply by this", ValueType::ArrayDouble),
                ArgSpec::input("b", "Add this", ValueType::ArrayDouble),
                ArgSpec::input("uchar", "Output should be uchar", ValueType::Bool)
                    .default_value(false),
            ],
            linear,
        ),
        Builtin::new(
            "invert",
            "invert an image",
            vec![image_in(), image_out()],
            invert,
        ),
        Builtin::new(
            "abs",
            "absolute value of an image",
            vec![image_in(), image_out()],
            abs,
        ),
        Builtin::new(
            "sign",
            "unit vector of pixel",
            vec![image_in(), image_out()],
            sign,
        ),
        Builtin::new(
            "math",
            "apply a math operation to an image",
            vec![
                image_in(),
                image_out(),
                ArgSpec::input("math", "Math to perform", ValueType::Enum(OperationMath::spec())),
            ],
            math,
        ),
        Builtin::new(
            "math2",
            "binary math operations",
            vec![
                left(),
                right(),
                image_out(),
                ArgSpec::input("math2", "Math to perform", ValueType::Enum(OperationMath2::spec())),
            ],
            math2,
        ),
        Builtin::new(
            "math2_const",
            "binary math operations with a constant",
            vec![
                image_in(),
                image_out(),
                ArgSpec::input("math2", "Math to perform", ValueType::Enum(OperationMath2::spec())),
                constants(),
            ],
            math2_const,
        ),
        Builtin::new(
            "relational",
            "relational operation on two images",
            vec![
                left(),
                right(),
                image_out(),
                ArgSpec::input(
                    "relational",
                    "Relational to perform",
                    ValueType::Enum(OperationRelational::spec()),
                ),
            ],
            relational,
        ),
        Builtin::new(
            "relational_const",
            "relational operations against a constant",
            vec![
                image_in(),
                image_out(),
                ArgSpec::input(
                    "relational",
                    "Relational to perform",
                    ValueType::Enum(OperationRelational::spec()),
                ),
                constants(),
            ],
            relational_const,
        ),
        Builtin::new(
            "boolean",
            "boolean operation on two images",
            vec![
                left(),
                right(),
                image_out(),
                ArgSpec::input(
                    "boolean",
                    "Boolean to perform",
                    ValueType::Enum(OperationBoolean::spec()),
                ),
            ],
            boolean,
        ),
        Builtin::new(
            "boolean_const",
            "boolean operations against a constant",
            vec![
                image_in(),
                image_out(),
                ArgSpec::input(
                    "boolean",
                    "Boolean to perform",
                    ValueType::Enum(OperationBoolean::spec()),
                ),
                constants(),
            ],
            boolean_const,
        ),
        Builtin::new(
            "round",
            "perform a round function on an image",
            vec![
                image_in(),
                image_out(),
                ArgSpec::input("round", "Rounding operation", ValueType::Enum(OperationRound::spec())),
            ],
            round,
        ),
        Builtin::new(
            "avg",
            "find image average",
            vec![image_in(), ArgSpec::output("out", "Average of all samples", ValueType::Double)],
            avg,
        ),
        Builtin::new("min", "find image minimum", extremum_args("Smallest sample"), min),
        Builtin::new("max", "find image maximum", extremum_args("Largest sample"), max),
        Builtin::new(
            "deviate",
            "find image standard deviation",
            vec![image_in(), ArgSpec::output("out", "Standard deviation", ValueType::Double)],
            deviate,
        ),
        Builtin::new(
            "getpoint",
            "read a point from an image",
            vec![
                image_in(),
                ArgSpec::output("out_array", "Band values at the point", ValueType::ArrayDouble),
                ArgSpec::input("x", "Point to read", ValueType::Int).range(0.0, 1e7),
                ArgSpec::input("y", "Point to read", ValueType::Int).range(0.0, 1e7),
            ],
            getpoint,
        ),
    ]
}

fn extremum_args(description: &'static str) -> Vec<ArgSpec> {
    vec![
        image_in(),
        ArgSpec::output("out", description, ValueType::Double),
        ArgSpec::output("x", "Horizontal position of the sample", ValueType::Int).optional(),
        ArgSpec::output("y", "Vertical position of the sample", ValueType::Int).optional(),
    ]
}

fn pair(args: &Arguments) -> OpResult<(&VImage, &VImage)> {
    Ok((args.image("left")?, args.image("right")?))
}

fn add(args: &mut Arguments) -> OpResult<()> {
    let (left, right) = pair(args)?;
    let format = left.format().common(right.format()).widened();
    let out = binary(left, right, format, |a, b| a + b)?;
    args.set_output("out", out);
    Ok(())
}

fn subtract(args: &mut Arguments) -> OpResult<()> {
    let (left, right) = pair(args)?;
    let format = left.format().common(right.format()).signed_widened();
    let out = binary(left, right, format, |a, b| a - b)?;
    args.set_output("out", out);
    Ok(())
}

fn multiply(args: &mut Arguments) -> OpResult<()> {
    let (left, right) = pair(args)?;
    let format = left.format().common(right.format()).widened();
    let out = binary(left, right, format, |a, b| a * b)?;
    args.set_output("out", out);
    Ok(())
}

/// Division by zero gives zero.
fn divide(args: &mut Arguments) -> OpResult<()> {
    let (left, right) = pair(args)?;
    let format = left.format().common(right.format()).float_of();
    let out = binary(left, right, format, |a, b| if b == 0.0 { 0.0 } else { a / b })?;
    args.set_output("out", out);
    Ok(())
}

fn remainder_of(a: f64, b: f64) -> f64 {
    if b == 0.0 { 0.0 } else { a % b }
}

fn remainder(args: &mut Arguments) -> OpResult<()> {
    let (left, right) = pair(args)?;
    let format = left.format().common(right.format());
    let out = binary(left, right, format, remainder_of)?;
    args.set_output("out", out);
    Ok(())
}

fn remainder_const(args: &mut Arguments) -> OpResult<()> {
    let image = args.image("in")?;
    let out = with_constants(image, args.array_double("c")?, image.format(), remainder_of)?;
    args.set_output("out", out);
    Ok(())
}

fn linear(args: &mut Arguments) -> OpResult<()> {
    let image = args.image("in")?;
    let format = if args.bool("uchar")? {
        BandFormat::UChar
    } else {
        image.format().float_of()
    };
    let scaled = with_constants(image, args.array_double("a")?, BandFormat::Double, |v, a| v * a)
        .map_err(|e| rename_constant(e, "a"))?;
    let out = with_constants(&scaled, args.array_double("b")?, format, |v, b| v + b)
        .map_err(|e| rename_constant(e, "b"))?;
    args.set_output("out", out);
    Ok(())
}

fn rename_constant(error: OperationError, name: &str) -> OperationError {
    match error {
        OperationError::Argument { reason, .. } => OperationError::argument(name, reason),
        other => other,
    }
}

fn invert(args: &mut Arguments) -> OpResult<()> {
    let image = args.image("in")?;
    let format = image.format();
    let out = match format {
        BandFormat::UChar | BandFormat::UShort | BandFormat::UInt => {
            let max = format.range().1;
            map_samples(image, format, |v| max - v)?
        }
        _ => map_samples(image, format, |v| -v)?,
    };
    args.set_output("out", out);
    Ok(())
}

fn abs(args: &mut Arguments) -> OpResult<()> {
    let image = args.image("in")?;
    let out = map_samples(image, image.format(), f64::abs)?;
    args.set_output("out", out);
    Ok(())
}

fn sign(args: &mut Arguments) -> OpResult<()> {
    let image = args.image("in")?;
    let out = map_samples(image, image.format(), |v| {
        if v > 0.0 {
            1.0
        } else if v < 0.0 {
            -1.0
        } else {
            0.0
        }
    })?;
    args.set_output("out", out);
    Ok(())
}

/// Non-finite results (log of zero, asin out of domain) become zero.
fn finite(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

fn apply_math(op: OperationMath, v: f64) -> f64 {
    let r = match op {
        OperationMath::Sin => v.to_radians().sin(),
        OperationMath::Cos => v.to_radians().cos(),
        OperationMath::Tan => v.to_radians().tan(),
        OperationMath::Asin => v.asin().to_degrees(),
        OperationMath::Acos => v.acos().to_degrees(),
        OperationMath::Atan => v.atan().to_degrees(),
        OperationMath::Log => v.ln(),
        OperationMath::Log10 => v.log10(),
        OperationMath::Exp => v.exp(),
        OperationMath::Exp10 => 10f64.powf(v),
    };
    finite(r)
}

fn math(args: &mut Arguments) -> OpResult<()> {
    let image = args.image("in")?;
    let op = args.enum_value::<OperationMath>("math")?;
    let out = map_samples(image, image.format().float_of(), |v| apply_math(op, v))?;
    args.set_output("out", out);
    Ok(())
}

fn apply_math2(op: OperationMath2, a: f64, b: f64) -> f64 {
    let r = match op {
        OperationMath2::Pow => a.powf(b),
        OperationMath2::Wop => b.powf(a),
        OperationMath2::Atan2 => a.atan2(b).to_degrees(),
    };
    finite(r)
}

fn math2(args: &mut Arguments) -> OpResult<()> {
    let (left, right) = pair(args)?;
    let op = args.enum_value::<OperationMath2>("math2")?;
    let format = left.format().common(right.format()).float_of();
    let out = binary(left, right, format, |a, b| apply_math2(op, a, b))?;
    args.set_output("out", out);
    Ok(())
}

fn math2_const(args: &mut Arguments) -> OpResult<()> {
    let image = args.image("in")?;
    let op = args.enum_value::<OperationMath2>("math2")?;
    let out = with_constants(image, args.array_double("c")?, image.format().float_of(), |a, b| {
        apply_math2(op, a, b)
    })?;
    args.set_output("out", out);
    Ok(())
}

fn compare(op: OperationRelational, a: f64, b: f64) -> f64 {
    let holds = match op {
        OperationRelational::Equal => a == b,
        OperationRelational::NotEq => a != b,
        OperationRelational::Less => a < b,
        OperationRelational::LessEq => a <= b,
        OperationRelational::More => a > b,
        OperationRelational::MoreEq => a >= b,
    };
    if holds { 255.0 } else { 0.0 }
}

fn relational(args: &mut Arguments) -> OpResult<()> {
    let (left, right) = pair(args)?;
    let op = args.enum_value::<OperationRelational>("relational")?;
    let out = binary(left, right, BandFormat::UChar, |a, b| compare(op, a, b))?;
    args.set_output("out", out);
    Ok(())
}

fn relational_const(args: &mut Arguments) -> OpResult<()> {
    let image = args.image("in")?;
    let op = args.enum_value::<OperationRelational>("relational")?;
    let out = with_constants(image, args.array_double("c")?, BandFormat::UChar, |a, b| {
        compare(op, a, b)
    })?;
    args.set_output("out", out);
    Ok(())
}

fn bitwise(op: OperationBoolean, a: f64, b: f64) -> f64 {
    let (a, b) = (a as i64, b as i64);
    let r = match op {
        OperationBoolean::And => a & b,
        OperationBoolean::Or => a | b,
        OperationBoolean::Eor => a ^ b,
        OperationBoolean::LShift => a.checked_shl(b.clamp(0, 63) as u32).unwrap_or(0),
        OperationBoolean::RShift => a >> b.clamp(0, 63),
    };
    r as f64
}

fn boolean(args: &mut Arguments) -> OpResult<()> {
    let (left, right) = pair(args)?;
    let op = args.enum_value::<OperationBoolean>("boolean")?;
    let format = left.format().common(right.format()).int_of();
    let out = binary(left, right, format, |a, b| bitwise(op, a, b))?;
    args.set_output("out", out);
    Ok(())
}

fn boolean_const(args: &mut Arguments) -> OpResult<()> {
    let image = args.image("in")?;
    let op = args.enum_value::<OperationBoolean>("boolean")?;
    let out = with_constants(image, args.array_double("c")?, image.format().int_of(), |a, b| {
        bitwise(op, a, b)
    })?;
    args.set_output("out", out);
    Ok(())
}

fn round(args: &mut Arguments) -> OpResult<()> {
    let image = args.image("in")?;
    let op = args.enum_value::<OperationRound>("round")?;
    let out = map_bands(image, image.format(), |v, _| match op {
        OperationRound::Rint => v.round_ties_even(),
        OperationRound::Ceil => v.ceil(),
        OperationRound::Floor => v.floor(),
    })?;
    args.set_output("out", out);
    Ok(())
}

fn avg(args: &mut Arguments) -> OpResult<()> {
    let image = args.image("in")?;
    let pixels = image.pixels();
    let sum: f64 = pixels.par_iter().sum();
    let mean = sum / pixels.len().max(1) as f64;
    args.set_output("out", mean);
    Ok(())
}

/// Position and value of the first sample `better` than every other.
fn extremum(image: &VImage, better: fn(f64, f64) -> bool) -> OpResult<(f64, u32, u32)> {
    let bands = image.bands() as usize;
    let found = image
        .pixels()
        .par_iter()
        .enumerate()
        .map(|(i, &v)| (v, i))
        .reduce_with(|a, b| {
            if better(b.0, a.0) || (b.0 == a.0 && b.1 < a.1) {
                b
            } else {
                a
            }
        });
    let (value, index) = found.ok_or_else(|| OperationError::Failed("image has no pixels".into()))?;
    let pixel = index / bands;
    let width = image.width() as usize;
    Ok((value, (pixel % width) as u32, (pixel / width) as u32))
}

fn set_extremum(args: &mut Arguments, found: (f64, u32, u32)) {
    let (value, x, y) = found;
    args.set_output("out", value);
    args.set_output("x", x as i32);
    args.set_output("y", y as i32);
}

fn min(args: &mut Arguments) -> OpResult<()> {
    let found = extremum(args.image("in")?, |a, b| a < b)?;
    set_extremum(args, found);
    Ok(())
}

fn max(args: &mut Arguments) -> OpResult<()> {
    let found = extremum(args.image("in")?, |a, b| a > b)?;
    set_extremum(args, found);
    Ok(())
}

/// Sample standard deviation over every band of every pixel.
fn deviate(args: &mut Arguments) -> OpResult<()> {
    let pixels = args.image("in")?.pixels();
    let n = pixels.len() as f64;
    let (sum, sum2) = pixels
        .par_iter()
        .map(|&v| (v, v * v))
        .reduce(|| (0.0, 0.0), |a, b| (a.0 + b.0, a.1 + b.1));
    let deviation = if n > 1.0 {
        ((sum2 - sum * sum / n) / (n - 1.0)).max(0.0).sqrt()
    } else {
        0.0
    };
    args.set_output("out", deviation);
    Ok(())
}

fn getpoint(args: &mut Arguments) -> OpResult<()> {
    let image = args.image("in")?;
    let (x, y) = (args.int("x")?, args.int("y")?);
    if x as u32 >= image.width() {
        return Err(OperationError::argument("x", format!("{x} is outside the image")));
    }
    if y as u32 >= image.height() {
        return Err(OperationError::argument("y", format!("{y} is outside the image")));
    }
    let point = image.data().pixel(x as u32, y as u32).to_vec();
    args.set_output("out_array", point);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::call;
    use crate::error::Error;
    use crate::option::VOption;
    use crate::test_helpers::{gradient, image_from};
    use approx::assert_abs_diff_eq;

    fn run_binary(name: &str, left: &VImage, right: &VImage) -> VImage {
        let mut out = VImage::default();
        call(
            name,
            Some(
                VOption::new()
                    .set("left", left)
                    .set("right", right)
                    .set_output("out", &mut out),
            ),
        )
        .unwrap();
        out
    }

    #[test]
    fn add_widens_uchar() {
        let a = image_from(2, 1, BandFormat::UChar, &[200.0, 10.0]);
        let out = run_binary("add", &a, &a);
        assert_eq!(out.format(), BandFormat::UShort);
        assert_eq!(out.pixels(), &[400.0, 20.0]);
    }

    #[test]
    fn subtract_goes_signed() {
        let a = image_from(2, 1, BandFormat::UChar, &[1.0, 10.0]);
        let b = image_from(2, 1, BandFormat::UChar, &[5.0, 3.0]);
        let out = run_binary("subtract", &a, &b);
        assert_eq!(out.format(), BandFormat::Short);
        assert_eq!(out.pixels(), &[-4.0, 7.0]);
    }

    #[test]
    fn divide_by_zero_gives_zero() {
        let a = image_from(2, 1, BandFormat::UChar, &[6.0, 6.0]);
        let b = image_from(2, 1, BandFormat::UChar, &[4.0, 0.0]);
        let out = run_binary("divide", &a, &b);
        assert_eq!(out.format(), BandFormat::Float);
        assert_eq!(out.pixels(), &[1.5, 0.0]);
    }

    #[test]
    fn invert_uchar_and_signed() {
        let mut out = VImage::default();
        let image = image_from(2, 1, BandFormat::UChar, &[0.0, 55.0]);
        call("invert", Some(VOption::new().set("in", &image).set_output("out", &mut out)))
            .unwrap();
        assert_eq!(out.pixels(), &[255.0, 200.0]);

        let image = image_from(1, 1, BandFormat::Short, &[12.0]);
        call("invert", Some(VOption::new().set("in", &image).set_output("out", &mut out)))
            .unwrap();
        assert_eq!(out.pixels(), &[-12.0]);
    }

    #[test]
    fn math_uses_degrees() {
        let image = image_from(2, 1, BandFormat::Float, &[90.0, 0.0]);
        let mut out = VImage::default();
        call(
            "math",
            Some(
                VOption::new()
                    .set("in", &image)
                    .set("math", "sin")
                    .set_output("out", &mut out),
            ),
        )
        .unwrap();
        assert_abs_diff_eq!(out.pixels()[0], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(out.pixels()[1], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn relational_const_makes_mask() {
        let image = image_from(3, 1, BandFormat::UChar, &[1.0, 5.0, 9.0]);
        let mut out = VImage::default();
        call(
            "relational_const",
            Some(
                VOption::new()
                    .set("in", &image)
                    .set("relational", OperationRelational::More)
                    .set("c", 4)
                    .set_output("out", &mut out),
            ),
        )
        .unwrap();
        assert_eq!(out.format(), BandFormat::UChar);
        assert_eq!(out.pixels(), &[0.0, 255.0, 255.0]);
    }

    #[test]
    fn boolean_const_on_float_goes_int() {
        let image = image_from(2, 1, BandFormat::Float, &[6.0, 5.0]);
        let mut out = VImage::default();
        call(
            "boolean_const",
            Some(
                VOption::new()
                    .set("in", &image)
                    .set("boolean", "and")
                    .set("c", 4.0)
                    .set_output("out", &mut out),
            ),
        )
        .unwrap();
        assert_eq!(out.format(), BandFormat::Int);
        assert_eq!(out.pixels(), &[4.0, 4.0]);
    }

    #[test]
    fn statistics() {
        let image = image_from(2, 2, BandFormat::UChar, &[2.0, 4.0, 4.0, 6.0]);
        let (mut mean, mut low, mut high, mut sd) = (0.0, 0.0, 0.0, 0.0);
        let (mut x, mut y) = (-1, -1);
        call("avg", Some(VOption::new().set("in", &image).set_output("out", &mut mean))).unwrap();
        call(
            "min",
            Some(
                VOption::new()
                    .set("in", &image)
                    .set_output("out", &mut low)
                    .set_output("x", &mut x)
                    .set_output("y", &mut y),
            ),
        )
        .unwrap();
        assert_eq!((low, x, y), (2.0, 0, 0));
        call(
            "max",
            Some(
                VOption::new()
                    .set("in", &image)
                    .set_output("out", &mut high)
                    .set_output("x", &mut x)
                    .set_output("y", &mut y),
            ),
        )
        .unwrap();
        assert_eq!((high, x, y), (6.0, 1, 1));
        call("deviate", Some(VOption::new().set("in", &image).set_output("out", &mut sd)))
            .unwrap();
        assert_eq!(mean, 4.0);
        assert_abs_diff_eq!(sd, (8.0f64 / 3.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn getpoint_reads_all_bands() {
        let image = gradient(4, 4, 3);
        let mut point: Vec<f64> = Vec::new();
        call(
            "getpoint",
            Some(
                VOption::new()
                    .set("in", &image)
                    .set("x", 2)
                    .set("y", 1)
                    .set_output("out_array", &mut point),
            ),
        )
        .unwrap();
        assert_eq!(point, vec![3.0, 13.0, 23.0]);
    }

    #[test]
    fn getpoint_outside_image_fails() {
        let image = gradient(4, 4, 1);
        let mut point: Vec<f64> = Vec::new();
        let err = call(
            "getpoint",
            Some(
                VOption::new()
                    .set("in", &image)
                    .set("x", 4)
                    .set("y", 0)
                    .set_output("out_array", &mut point),
            ),
        )
        .unwrap_err();
        assert!(matches!(err, Error::OperationFailed { .. }));
        assert!(point.is_empty());
    }

    #[test]
    fn linear_broadcasts_per_band_constants() {
        let image = image_from(1, 1, BandFormat::UChar, &[10.0]);
        let mut out = VImage::default();
        call(
            "linear",
            Some(
                VOption::new()
                    .set("in", &image)
                    .set("a", vec![1.0, 2.0, 3.0])
                    .set("b", 1.0)
                    .set_output("out", &mut out),
            ),
        )
        .unwrap();
        assert_eq!(out.bands(), 3);
        assert_eq!(out.pixels(), &[11.0, 21.0, 31.0]);
    }
}
