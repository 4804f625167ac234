//! Resampling: box shrink, resize and affine transforms.

use super::{Builtin, OpResult, image_in, image_out, require_pixels, reshape};
use crate::enums::{EnumType, Kernel};
use crate::image::VImage;
use crate::interpolate::Interpolator;
use crate::operation::{ArgSpec, Arguments, OperationError};
use crate::value::ValueType;
use rayon::prelude::*;
use tracing::debug;

pub fn operations() -> Vec<Builtin> {
    vec![
        Builtin::new(
            "shrink",
            "shrink an image by integer factors",
            vec![
                image_in(),
                image_out(),
                ArgSpec::input("hshrink", "Horizontal shrink factor", ValueType::Int).range(1.0, 1e6),
                ArgSpec::input("vshrink", "Vertical shrink factor", ValueType::Int).range(1.0, 1e6),
            ],
            shrink,
        ),
        Builtin::new(
            "resize",
            "resize an image",
            vec![
                image_in(),
                image_out(),
                ArgSpec::input("scale", "Scale image by this factor", ValueType::Double)
                    .range(1e-6, 1e6),
                ArgSpec::input("vscale", "Vertical scale image by this factor", ValueType::Double)
                    .optional()
                    .range(1e-6, 1e6),
                ArgSpec::input("kernel", "Resampling kernel", ValueType::Enum(Kernel::spec()))
                    .default_value(Kernel::Linear),
            ],
            resize,
        ),
        Builtin::new(
            "affine",
            "affine transform of an image",
            vec![
                image_in(),
                image_out(),
                ArgSpec::input("matrix", "Transformation matrix [a, b, c, d]", ValueType::ArrayDouble),
                ArgSpec::input("interpolate", "Interpolate pixels with this", ValueType::Interpolate)
                    .optional(),
            ],
            affine,
        ),
    ]
}

/// Average `hshrink` x `vshrink` blocks. Blocks cut by the right or bottom
/// edge average the pixels they have.
pub(crate) fn shrink_box(image: &VImage, hshrink: u32, vshrink: u32) -> OpResult<VImage> {
    if hshrink == 1 && vshrink == 1 {
        return Ok(image.derive(image.header().clone(), image.pixels().to_vec())?);
    }
    let (w, h, bands) = (image.width(), image.height(), image.bands() as usize);
    let out_w = (w / hshrink).max(1);
    let out_h = (h / vshrink).max(1);
    let data = image.data();
    let rows: Vec<Vec<f64>> = (0..out_h)
        .into_par_iter()
        .map(|oy| {
            let mut row = Vec::with_capacity(out_w as usize * bands);
            let ys = oy * vshrink..((oy + 1) * vshrink).min(h);
            for ox in 0..out_w {
                let xs = ox * hshrink..((ox + 1) * hshrink).min(w);
                let mut sums = vec![0.0; bands];
                let mut n = 0.0;
                for y in ys.clone() {
                    for x in xs.clone() {
                        for (sum, v) in sums.iter_mut().zip(data.pixel(x, y)) {
                            *sum += v;
                        }
                        n += 1.0;
                    }
                }
                row.extend(sums.into_iter().map(|s| s / n));
            }
            row
        })
        .collect();
    let header = reshape(image, out_w, out_h, image.bands(), image.format());
    Ok(image.derive(header, rows.concat())?)
}

fn shrink(args: &mut Arguments) -> OpResult<()> {
    let image = args.image("in")?;
    require_pixels(image, "shrink")?;
    let out = shrink_box(image, args.int("hshrink")? as u32, args.int("vshrink")? as u32)?;
    args.set_output("out", out);
    Ok(())
}

/// Resample to exactly `width` x `height`.
fn resample_to(
    image: &VImage,
    width: u32,
    height: u32,
    interpolator: Interpolator,
) -> OpResult<VImage> {
    let (w, h, bands) = (image.width(), image.height(), image.bands());
    let (xs, ys) = (w as f64 / width as f64, h as f64 / height as f64);
    let pixels = image.pixels();
    let count = width as usize * height as usize * bands as usize;
    let out = (0..count)
        .into_par_iter()
        .map(|i| {
            let band = (i % bands as usize) as u32;
            let pixel = i / bands as usize;
            let (x, y) = ((pixel % width as usize) as f64, (pixel / width as usize) as f64);
            let sx = ((x + 0.5) * xs).clamp(0.0, w as f64 - 1e-9);
            let sy = ((y + 0.5) * ys).clamp(0.0, h as f64 - 1e-9);
            interpolator.sample(pixels, w, h, bands, sx, sy, band)
        })
        .collect();
    let header = reshape(image, width, height, bands, image.format());
    Ok(image.derive(header, out)?)
}

fn resize(args: &mut Arguments) -> OpResult<()> {
    let image = args.image("in")?;
    require_pixels(image, "resize")?;
    let hscale = args.double("scale")?;
    let vscale = if args.has("vscale") {
        args.double("vscale")?
    } else {
        hscale
    };
    let kernel = args.enum_value::<Kernel>("kernel")?;
    let width = ((image.width() as f64 * hscale).round() as u32).max(1);
    let height = ((image.height() as f64 * vscale).round() as u32).max(1);
    debug!(
        from_width = image.width(),
        from_height = image.height(),
        width,
        height,
        kernel = kernel.nick(),
        "resize"
    );

    let out = match kernel {
        Kernel::Nearest => resample_to(image, width, height, Interpolator::Nearest)?,
        Kernel::Linear => {
            // box-shrink by the integer part of large reductions first
            let hshrink = (1.0 / hscale).floor().max(1.0) as u32;
            let vshrink = (1.0 / vscale).floor().max(1.0) as u32;
            let shrunk = shrink_box(image, hshrink, vshrink)?;
            resample_to(&shrunk, width, height, Interpolator::Bilinear)?
        }
    };
    args.set_output("out", out);
    Ok(())
}

fn affine(args: &mut Arguments) -> OpResult<()> {
    let image = args.image("in")?;
    require_pixels(image, "affine")?;
    let matrix = args.array_double("matrix")?;
    let [a, b, c, d] = <[f64; 4]>::try_from(matrix)
        .map_err(|_| OperationError::argument("matrix", "needs exactly four values"))?;
    let det = a * d - b * c;
    if det.abs() < 1e-12 {
        return Err(OperationError::argument("matrix", "matrix is singular"));
    }
    let interpolator = if args.has("interpolate") {
        args.interpolate("interpolate")?
            .get()
            .ok_or_else(|| OperationError::argument("interpolate", "null interpolator"))?
    } else {
        Interpolator::Bilinear
    };

    let (w, h, bands) = (image.width(), image.height(), image.bands());
    let corners = [(0.0, 0.0), (w as f64, 0.0), (0.0, h as f64), (w as f64, h as f64)]
        .map(|(x, y)| (a * x + b * y, c * x + d * y));
    let min_x = corners.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let max_x = corners.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
    let min_y = corners.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let max_y = corners.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
    let out_w = ((max_x - min_x - 1e-9).ceil() as u32).max(1);
    let out_h = ((max_y - min_y - 1e-9).ceil() as u32).max(1);

    let pixels = image.pixels();
    let count = out_w as usize * out_h as usize * bands as usize;
    let out = (0..count)
        .into_par_iter()
        .map(|i| {
            let band = (i % bands as usize) as u32;
            let pixel = i / bands as usize;
            let u = (pixel % out_w as usize) as f64 + 0.5 + min_x;
            let v = (pixel / out_w as usize) as f64 + 0.5 + min_y;
            let x = (d * u - b * v) / det;
            let y = (a * v - c * u) / det;
            interpolator.sample(pixels, w, h, bands, x, y, band)
        })
        .collect();
    let header = reshape(image, out_w, out_h, bands, image.format());
    let out = image.derive(header, out)?;
    args.set_output("out", out);
    Ok(())
}
