//! Operations that make images from nothing.

use super::{Builtin, OpResult, dimension, image_out};
use crate::enums::{BandFormat, Interpretation};
use crate::image::{Header, VImage};
use crate::operation::{ArgSpec, Arguments, OperationError};
use crate::value::ValueType;
use rayon::prelude::*;

/// Widest mask `gaussmat` will make.
const GAUSS_WIDTH_MAX: usize = 5000;

pub fn operations() -> Vec<Builtin> {
    let size = || {
        [
            ArgSpec::input("width", "Image width in pixels", ValueType::Int).range(1.0, 1e7),
            ArgSpec::input("height", "Image height in pixels", ValueType::Int).range(1.0, 1e7),
        ]
    };
    vec![
        Builtin::new(
            "black",
            "make a black image",
            [
                vec![image_out()],
                size().to_vec(),
                vec![
                    ArgSpec::input("bands", "Number of bands in image", ValueType::Int)
                        .range(1.0, 1e6)
                        .default_value(1),
                ],
            ]
            .concat(),
            black,
        ),
        Builtin::new(
            "xyz",
            "make an image where pixel values are coordinates",
            [vec![image_out()], size().to_vec()].concat(),
            xyz,
        ),
        Builtin::new(
            "gaussmat",
            "make a gaussian image",
            vec![
                image_out(),
                ArgSpec::input("sigma", "Sigma of Gaussian", ValueType::Double).range(1e-6, 1e4),
                ArgSpec::input("min_ampl", "Minimum amplitude of Gaussian", ValueType::Double)
                    .range(1e-6, 1e4),
                ArgSpec::input("separable", "Generate separable Gaussian", ValueType::Bool)
                    .default_value(false),
                ArgSpec::input("integer", "Generate integer Gaussian", ValueType::Bool)
                    .default_value(false),
            ],
            gaussmat,
        ),
    ]
}

fn black(args: &mut Arguments) -> OpResult<()> {
    let (width, height) = (dimension(args, "width")?, dimension(args, "height")?);
    let bands = dimension(args, "bands")?;
    let header = Header::new(width, height, bands, BandFormat::UChar);
    let pixels = vec![0.0; header.sample_count()];
    args.set_output("out", VImage::from_pixels(header, pixels)?);
    Ok(())
}

fn xyz(args: &mut Arguments) -> OpResult<()> {
    let (width, height) = (dimension(args, "width")?, dimension(args, "height")?);
    let mut header = Header::new(width, height, 2, BandFormat::UInt);
    header.interpretation = Interpretation::Multiband;
    let pixels = (0..height as usize * width as usize)
        .into_par_iter()
        .flat_map_iter(|p| {
            let (x, y) = (p % width as usize, p / width as usize);
            [x as f64, y as f64]
        })
        .collect();
    args.set_output("out", VImage::from_pixels(header, pixels)?);
    Ok(())
}

/// Half-width (exclusive) of a gaussian whose tail drops below `min_ampl`.
fn gauss_radius(sigma: f64, min_ampl: f64) -> OpResult<usize> {
    let sig2 = 2.0 * sigma * sigma;
    let max_x = (8.0 * sigma).clamp(0.0, GAUSS_WIDTH_MAX as f64) as usize;
    let radius = (0..max_x)
        .find(|&x| (-((x * x) as f64) / sig2).exp() < min_ampl)
        .unwrap_or(max_x);
    if radius >= GAUSS_WIDTH_MAX {
        return Err(OperationError::Failed("mask too large".into()));
    }
    Ok(radius.max(1))
}

fn gaussmat(args: &mut Arguments) -> OpResult<()> {
    let (sigma, min_ampl) = (args.double("sigma")?, args.double("min_ampl")?);
    let separable = args.bool("separable")?;
    let integer = args.bool("integer")?;

    let radius = gauss_radius(sigma, min_ampl)?;
    let width = radius * 2 - 1;
    let height = if separable { 1 } else { width };
    let centre = (width / 2) as f64;
    let sig2 = 2.0 * sigma * sigma;

    let mut coefficients = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let xo = x as f64 - centre;
            let yo = if separable { 0.0 } else { y as f64 - centre };
            let v = (-(xo * xo + yo * yo) / sig2).exp();
            coefficients.push(if integer { (20.0 * v).round() } else { v });
        }
    }
    let scale: f64 = coefficients.iter().sum();

    let out = VImage::new_matrix_from_array(width as u32, height as u32, &coefficients)?;
    out.set("scale", scale)?;
    args.set_output("out", out);
    Ok(())
}
