//! Format conversion and geometric rearrangement.

use super::{
    Builtin, OpResult, broadcast_bands, dimension, image_in, image_out, require_pixels, reshape,
};
use crate::enums::{Angle, BandFormat, Direction, EnumType, Extend, Interpretation};
use crate::image::VImage;
use crate::operation::{ArgSpec, Arguments, OperationError};
use crate::value::ValueType;
use rayon::prelude::*;

pub fn operations() -> Vec<Builtin> {
    let area = || {
        vec![
            ArgSpec::input("input", "Input image", ValueType::Image),
            image_out(),
            ArgSpec::input("left", "Left edge of extract area", ValueType::Int).range(0.0, 1e7),
            ArgSpec::input("top", "Top edge of extract area", ValueType::Int).range(0.0, 1e7),
            ArgSpec::input("width", "Width of extract area", ValueType::Int).range(1.0, 1e7),
            ArgSpec::input("height", "Height of extract area", ValueType::Int).range(1.0, 1e7),
        ]
    };
    vec![
        Builtin::new(
            "copy",
            "copy an image",
            vec![
                image_in(),
                image_out(),
                ArgSpec::input(
                    "interpretation",
                    "Pixel interpretation",
                    ValueType::Enum(Interpretation::spec()),
                )
                .optional(),
                ArgSpec::input("xres", "Horizontal resolution in pixels/mm", ValueType::Double)
                    .optional()
                    .range(0.0, 1e6),
                ArgSpec::input("yres", "Vertical resolution in pixels/mm", ValueType::Double)
                    .optional()
                    .range(0.0, 1e6),
                ArgSpec::input("xoffset", "Horizontal offset of origin", ValueType::Int).optional(),
                ArgSpec::input("yoffset", "Vertical offset of origin", ValueType::Int).optional(),
            ],
            copy,
        ),
        Builtin::new(
            "cast",
            "cast an image",
            vec![
                image_in(),
                image_out(),
                ArgSpec::input("format", "Format to cast to", ValueType::Enum(BandFormat::spec())),
            ],
            cast,
        ),
        Builtin::new("extract_area", "extract an area from an image", area(), extract_area),
        Builtin::new("crop", "extract an area from an image", area(), extract_area),
        Builtin::new(
            "extract_band",
            "extract band from an image",
            vec![
                image_in(),
                image_out(),
                ArgSpec::input("band", "Band to extract", ValueType::Int).range(0.0, 1e6),
                ArgSpec::input("n", "Number of bands to extract", ValueType::Int)
                    .range(1.0, 1e6)
                    .default_value(1),
            ],
            extract_band,
        ),
        Builtin::new(
            "bandjoin",
            "bandwise join a set of images",
            vec![
                ArgSpec::input("in", "Array of input images", ValueType::ArrayImage),
                image_out(),
            ],
            bandjoin,
        ),
        Builtin::new(
            "bandjoin_const",
            "append a constant band to an image",
            vec![
                image_in(),
                image_out(),
                ArgSpec::input("c", "Array of constants to add", ValueType::ArrayDouble),
            ],
            bandjoin_const,
        ),
        Builtin::new(
            "flip",
            "flip an image",
            vec![
                image_in(),
                image_out(),
                ArgSpec::input("direction", "Direction to flip image", ValueType::Enum(Direction::spec())),
            ],
            flip,
        ),
        Builtin::new(
            "rot",
            "rotate an image",
            vec![
                image_in(),
                image_out(),
                ArgSpec::input("angle", "Angle to rotate image", ValueType::Enum(Angle::spec())),
            ],
            rot,
        ),
        Builtin::new(
            "embed",
            "embed an image in a larger image",
            vec![
                image_in(),
                image_out(),
                ArgSpec::input("x", "Left edge of input in output", ValueType::Int),
                ArgSpec::input("y", "Top edge of input in output", ValueType::Int),
                ArgSpec::input("width", "Image width in pixels", ValueType::Int).range(1.0, 1e7),
                ArgSpec::input("height", "Image height in pixels", ValueType::Int).range(1.0, 1e7),
                ArgSpec::input("extend", "How to generate the extra pixels", ValueType::Enum(Extend::spec()))
                    .default_value(Extend::Black),
                ArgSpec::input("background", "Color for background pixels", ValueType::ArrayDouble)
                    .default_value(vec![0.0]),
            ],
            embed,
        ),
        Builtin::new(
            "ifthenelse",
            "ifthenelse an image",
            vec![
                ArgSpec::input("cond", "Condition input image", ValueType::Image),
                ArgSpec::input("in1", "Source for TRUE pixels", ValueType::Image),
                ArgSpec::input("in2", "Source for FALSE pixels", ValueType::Image),
                image_out(),
                ArgSpec::input("blend", "Blend smoothly between then and else parts", ValueType::Bool)
                    .default_value(false),
            ],
            ifthenelse,
        ),
    ]
}

/// Build an output image by looking each output pixel up in `image`.
/// `source` returns `None` for pixels taken from `fill`.
fn remap(
    image: &VImage,
    width: u32,
    height: u32,
    fill: &[f64],
    source: impl Fn(i64, i64) -> Option<(u32, u32)> + Sync,
) -> OpResult<VImage> {
    let data = image.data();
    let rows: Vec<Vec<f64>> = (0..height as i64)
        .into_par_iter()
        .map(|y| {
            let mut row = Vec::with_capacity(width as usize * fill.len());
            for x in 0..width as i64 {
                match source(x, y) {
                    Some((sx, sy)) => row.extend_from_slice(data.pixel(sx, sy)),
                    None => row.extend_from_slice(fill),
                }
            }
            row
        })
        .collect();
    let header = reshape(image, width, height, image.bands(), image.format());
    Ok(image.derive(header, rows.concat())?)
}

fn copy(args: &mut Arguments) -> OpResult<()> {
    let image = args.image("in")?;
    let mut header = image.header().clone();
    if args.has("interpretation") {
        header.interpretation = args.enum_value::<Interpretation>("interpretation")?;
    }
    if args.has("xres") {
        header.xres = args.double("xres")?;
    }
    if args.has("yres") {
        header.yres = args.double("yres")?;
    }
    if args.has("xoffset") {
        header.xoffset = args.int("xoffset")?;
    }
    if args.has("yoffset") {
        header.yoffset = args.int("yoffset")?;
    }
    let out = image.derive(header, image.pixels().to_vec())?;
    args.set_output("out", out);
    Ok(())
}

fn cast(args: &mut Arguments) -> OpResult<()> {
    let image = args.image("in")?;
    let format = args.enum_value::<BandFormat>("format")?;
    let header = reshape(image, image.width(), image.height(), image.bands(), format);
    let out = image.derive(header, image.pixels().to_vec())?;
    args.set_output("out", out);
    Ok(())
}

fn extract_area(args: &mut Arguments) -> OpResult<()> {
    let image = args.image("input")?;
    let (left, top) = (args.int("left")? as u32, args.int("top")? as u32);
    let (width, height) = (dimension(args, "width")?, dimension(args, "height")?);
    if left as u64 + width as u64 > image.width() as u64
        || top as u64 + height as u64 > image.height() as u64
    {
        return Err(OperationError::Failed(format!(
            "area {width}x{height}+{left}+{top} is outside the {}x{} image",
            image.width(),
            image.height()
        )));
    }
    let out = remap(image, width, height, &[], |x, y| {
        Some((x as u32 + left, y as u32 + top))
    })?;
    args.set_output("out", out);
    Ok(())
}

/// Keep `n` bands starting at `first`.
fn select_bands(image: &VImage, first: usize, n: usize) -> OpResult<VImage> {
    let bands = image.bands() as usize;
    let pixels = image
        .pixels()
        .par_chunks(bands)
        .flat_map_iter(|pixel| pixel[first..first + n].iter().copied())
        .collect();
    let header = reshape(image, image.width(), image.height(), n as u32, image.format());
    Ok(image.derive(header, pixels)?)
}

fn extract_band(args: &mut Arguments) -> OpResult<()> {
    let image = args.image("in")?;
    let (band, n) = (args.int("band")? as usize, args.int("n")? as usize);
    if band + n > image.bands() as usize {
        return Err(OperationError::argument(
            "band",
            format!("bands {band}..{} don't exist in a {}-band image", band + n, image.bands()),
        ));
    }
    let out = select_bands(image, band, n)?;
    args.set_output("out", out);
    Ok(())
}

/// Interleave the bands of same-sized images.
pub(crate) fn join(images: &[VImage]) -> OpResult<VImage> {
    let first = images
        .first()
        .ok_or_else(|| OperationError::argument("in", "no images to join"))?;
    let (width, height) = (first.width(), first.height());
    if let Some(odd) = images.iter().find(|i| (i.width(), i.height()) != (width, height)) {
        return Err(OperationError::Failed(format!(
            "images are {width}x{height} and {}x{}, sizes must match",
            odd.width(),
            odd.height()
        )));
    }
    let format = images
        .iter()
        .map(VImage::format)
        .reduce(BandFormat::common)
        .unwrap_or(first.format());
    let bands: u32 = images.iter().map(VImage::bands).sum();
    let pixel_count = width as usize * height as usize;
    let pixels: Vec<f64> = (0..pixel_count)
        .into_par_iter()
        .flat_map_iter(|p| {
            images.iter().flat_map(move |image| {
                let b = image.bands() as usize;
                image.pixels()[p * b..(p + 1) * b].iter().copied()
            })
        })
        .collect();
    let header = reshape(first, width, height, bands, format);
    Ok(first.derive(header, pixels)?)
}

fn bandjoin(args: &mut Arguments) -> OpResult<()> {
    let out = join(args.images("in")?)?;
    args.set_output("out", out);
    Ok(())
}

fn bandjoin_const(args: &mut Arguments) -> OpResult<()> {
    let image = args.image("in")?;
    let constants = args.array_double("c")?;
    if constants.is_empty() {
        return Err(OperationError::argument("c", "needs at least one constant"));
    }
    let header = reshape(
        image,
        image.width(),
        image.height(),
        constants.len() as u32,
        image.format(),
    );
    let pixel_count = image.width() as usize * image.height() as usize;
    let extra = VImage::from_pixels(header, constants.repeat(pixel_count))?;
    let out = join(&[image.clone(), extra])?;
    args.set_output("out", out);
    Ok(())
}

fn flip(args: &mut Arguments) -> OpResult<()> {
    let image = args.image("in")?;
    let (w, h) = (image.width() as i64, image.height() as i64);
    let out = match args.enum_value::<Direction>("direction")? {
        Direction::Horizontal => {
            remap(image, w as u32, h as u32, &[], |x, y| Some(((w - 1 - x) as u32, y as u32)))?
        }
        Direction::Vertical => {
            remap(image, w as u32, h as u32, &[], |x, y| Some((x as u32, (h - 1 - y) as u32)))?
        }
    };
    args.set_output("out", out);
    Ok(())
}

/// Rotate by a multiple of 90 degrees clockwise.
fn rot(args: &mut Arguments) -> OpResult<()> {
    let image = args.image("in")?;
    let (w, h) = (image.width() as i64, image.height() as i64);
    let out = match args.enum_value::<Angle>("angle")? {
        Angle::D0 => image.derive(image.header().clone(), image.pixels().to_vec())?,
        Angle::D90 => remap(image, h as u32, w as u32, &[], |x, y| {
            Some((y as u32, (h - 1 - x) as u32))
        })?,
        Angle::D180 => remap(image, w as u32, h as u32, &[], |x, y| {
            Some(((w - 1 - x) as u32, (h - 1 - y) as u32))
        })?,
        Angle::D270 => remap(image, h as u32, w as u32, &[], |x, y| {
            Some(((w - 1 - y) as u32, x as u32))
        })?,
    };
    args.set_output("out", out);
    Ok(())
}

/// Fold a coordinate back into `0..size` for the edge-extending modes.
fn fold(v: i64, size: i64, extend: Extend) -> Option<i64> {
    if (0..size).contains(&v) {
        return Some(v);
    }
    match extend {
        Extend::Copy => Some(v.clamp(0, size - 1)),
        Extend::Repeat => Some(v.rem_euclid(size)),
        Extend::Mirror => {
            let m = v.rem_euclid(2 * size);
            Some(if m < size { m } else { 2 * size - 1 - m })
        }
        Extend::Black | Extend::White | Extend::Background => None,
    }
}

fn embed(args: &mut Arguments) -> OpResult<()> {
    let image = args.image("in")?;
    require_pixels(image, "embed")?;
    let (x0, y0) = (args.int("x")? as i64, args.int("y")? as i64);
    let (width, height) = (dimension(args, "width")?, dimension(args, "height")?);
    let extend = args.enum_value::<Extend>("extend")?;
    let bands = image.bands() as usize;
    let fill = match extend {
        Extend::White => {
            let white = if image.format().is_float() {
                255.0
            } else {
                image.format().range().1
            };
            vec![white; bands]
        }
        Extend::Background => {
            let background = args.array_double("background")?;
            match background.len() {
                1 => vec![background[0]; bands],
                n if n == bands => background.to_vec(),
                n => {
                    return Err(OperationError::argument(
                        "background",
                        format!("{n} values for a {bands}-band image"),
                    ));
                }
            }
        }
        _ => vec![0.0; bands],
    };
    let (w, h) = (image.width() as i64, image.height() as i64);
    let out = remap(image, width, height, &fill, |x, y| {
        let sx = fold(x - x0, w, extend)?;
        let sy = fold(y - y0, h, extend)?;
        Some((sx as u32, sy as u32))
    })?;
    args.set_output("out", out);
    Ok(())
}

fn ifthenelse(args: &mut Arguments) -> OpResult<()> {
    let cond = args.image("cond")?;
    let (then, otherwise) = (args.image("in1")?, args.image("in2")?);
    let blend = args.bool("blend")?;
    let size = (cond.width(), cond.height());
    for image in [then, otherwise] {
        if (image.width(), image.height()) != size {
            return Err(OperationError::Failed(format!(
                "condition is {}x{} but a source image is {}x{}",
                size.0,
                size.1,
                image.width(),
                image.height()
            )));
        }
    }
    let (cb, tb, eb) = (
        cond.bands() as usize,
        then.bands() as usize,
        otherwise.bands() as usize,
    );
    let bands = broadcast_bands(broadcast_bands(tb, eb)?, cb)?;
    let format = then.format().common(otherwise.format());
    let at = |image: &VImage, b: usize, pixel: usize, band: usize| -> f64 {
        image.pixels()[pixel * b + if b == 1 { 0 } else { band }]
    };
    let count = size.0 as usize * size.1 as usize * bands;
    let pixels = (0..count)
        .into_par_iter()
        .map(|i| {
            let (pixel, band) = (i / bands, i % bands);
            let c = at(cond, cb, pixel, band);
            let (a, b) = (at(then, tb, pixel, band), at(otherwise, eb, pixel, band));
            if blend {
                let t = c.clamp(0.0, 255.0) / 255.0;
                t * a + (1.0 - t) * b
            } else if c != 0.0 {
                a
            } else {
                b
            }
        })
        .collect();
    let header = reshape(then, size.0, size.1, bands as u32, format);
    let out = then.derive(header, pixels)?;
    args.set_output("out", out);
    Ok(())
}
