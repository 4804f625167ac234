//! Convolution with a matrix mask.
//!
//! Masks are one-band matrix images. A mask's `scale` and `offset`
//! metadata (default 1 and 0) are applied to every weighted sum:
//! `out = sum / scale + offset`. Pixels past the image edge repeat the
//! nearest edge pixel.

use super::{Builtin, OpResult, image_in, image_out};
use crate::image::{Header, VImage};
use crate::operation::{ArgSpec, Arguments, OperationError};
use crate::value::ValueType;
use rayon::prelude::*;
use tracing::trace;

pub fn operations() -> Vec<Builtin> {
    vec![
        Builtin::new(
            "conv",
            "convolution operation",
            vec![
                image_in(),
                image_out(),
                ArgSpec::input("mask", "Input matrix image", ValueType::Image),
            ],
            conv,
        ),
        Builtin::new(
            "gaussblur",
            "gaussian blur",
            vec![
                image_in(),
                image_out(),
                ArgSpec::input("sigma", "Sigma of Gaussian", ValueType::Double).range(0.0, 1000.0),
                ArgSpec::input("min_ampl", "Minimum amplitude of Gaussian", ValueType::Double)
                    .range(1e-3, 1.0)
                    .default_value(0.2),
            ],
            gaussblur,
        ),
    ]
}

/// A convolution kernel read out of a mask image.
struct Mask {
    width: usize,
    height: usize,
    weights: Vec<f64>,
    scale: f64,
    offset: f64,
}

impl Mask {
    fn from_image(mask: &VImage) -> OpResult<Self> {
        if mask.bands() != 1 {
            return Err(OperationError::argument("mask", "mask must have one band"));
        }
        let scale = mask.get_double("scale").unwrap_or(1.0);
        if scale == 0.0 {
            return Err(OperationError::argument("mask", "mask scale is zero"));
        }
        Ok(Self {
            width: mask.width() as usize,
            height: mask.height() as usize,
            weights: mask.pixels().to_vec(),
            scale,
            offset: mask.get_double("offset").unwrap_or(0.0),
        })
    }

    fn row(weights: Vec<f64>, scale: f64) -> Self {
        Self {
            width: weights.len(),
            height: 1,
            weights,
            scale,
            offset: 0.0,
        }
    }

    fn transposed(&self) -> Self {
        let mut weights = Vec::with_capacity(self.weights.len());
        for x in 0..self.width {
            for y in 0..self.height {
                weights.push(self.weights[y * self.width + x]);
            }
        }
        Self {
            width: self.height,
            height: self.width,
            weights,
            scale: self.scale,
            offset: self.offset,
        }
    }
}

/// Convolve a band-interleaved buffer, returning unclipped sums.
fn convolve(pixels: &[f64], header: &Header, mask: &Mask) -> Vec<f64> {
    let (w, h, bands) = (
        header.width as i64,
        header.height as i64,
        header.bands as usize,
    );
    let (cx, cy) = ((mask.width / 2) as i64, (mask.height / 2) as i64);
    let rows: Vec<Vec<f64>> = (0..h)
        .into_par_iter()
        .map(|y| {
            let mut row = vec![0.0; w as usize * bands];
            for x in 0..w {
                for b in 0..bands {
                    let mut sum = 0.0;
                    for j in 0..mask.height {
                        let sy = (y + j as i64 - cy).clamp(0, h - 1) as usize;
                        for i in 0..mask.width {
                            let weight = mask.weights[j * mask.width + i];
                            if weight == 0.0 {
                                continue;
                            }
                            let sx = (x + i as i64 - cx).clamp(0, w - 1) as usize;
                            sum += weight * pixels[(sy * w as usize + sx) * bands + b];
                        }
                    }
                    row[x as usize * bands + b] = sum / mask.scale + mask.offset;
                }
            }
            row
        })
        .collect();
    rows.concat()
}

/// Result is float (or double for double input).
fn conv(args: &mut Arguments) -> OpResult<()> {
    let image = args.image("in")?;
    let mask = Mask::from_image(args.image("mask")?)?;
    trace!(width = mask.width, height = mask.height, "conv mask");
    let pixels = convolve(image.pixels(), image.header(), &mask);
    let header = image.header().with_shape(
        image.width(),
        image.height(),
        image.bands(),
        image.format().float_of(),
    );
    let out = image.derive(header, pixels)?;
    args.set_output("out", out);
    Ok(())
}

/// Blur with a separable gaussian: rows, then columns. The result keeps the
/// input's format.
fn gaussblur(args: &mut Arguments) -> OpResult<()> {
    let image = args.image("in")?;
    let (sigma, min_ampl) = (args.double("sigma")?, args.double("min_ampl")?);
    if sigma < 0.2 {
        let out = image.derive(image.header().clone(), image.pixels().to_vec())?;
        args.set_output("out", out);
        return Ok(());
    }

    let mut kernel = VImage::default();
    crate::call::call(
        "gaussmat",
        Some(
            crate::option::VOption::new()
                .set("sigma", sigma)
                .set("min_ampl", min_ampl)
                .set("separable", true)
                .set_output("out", &mut kernel),
        ),
    )?;
    let horizontal = Mask::row(kernel.pixels().to_vec(), kernel.get_double("scale")?);
    let vertical = horizontal.transposed();
    trace!(sigma, taps = horizontal.width, "gaussblur kernel");

    let header = image.header();
    let pass = convolve(image.pixels(), header, &horizontal);
    let pixels = convolve(&pass, header, &vertical);
    let out = image.derive(header.clone(), pixels)?;
    args.set_output("out", out);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::call;
    use crate::enums::BandFormat;
    use crate::option::VOption;
    use crate::test_helpers::image_from;
    use approx::assert_abs_diff_eq;

    #[test]
    fn box_mask_averages_neighbours() {
        let image = image_from(3, 1, BandFormat::UChar, &[0.0, 30.0, 60.0]);
        let mask = VImage::new_matrix_from_array(3, 1, &[1.0, 1.0, 1.0]).unwrap();
        mask.set("scale", 3.0).unwrap();
        let mut out = VImage::default();
        call(
            "conv",
            Some(
                VOption::new()
                    .set("in", &image)
                    .set("mask", &mask)
                    .set_output("out", &mut out),
            ),
        )
        .unwrap();
        assert_eq!(out.format(), BandFormat::Float);
        // edges repeat: (0+0+30)/3, (0+30+60)/3, (30+60+60)/3
        assert_eq!(out.pixels(), &[10.0, 30.0, 50.0]);
    }

    #[test]
    fn multi_band_mask_is_rejected() {
        let image = image_from(2, 1, BandFormat::UChar, &[0.0, 1.0]);
        let mask = crate::test_helpers::gradient(3, 3, 2);
        let mut out = VImage::default();
        let result = call(
            "conv",
            Some(
                VOption::new()
                    .set("in", &image)
                    .set("mask", &mask)
                    .set_output("out", &mut out),
            ),
        );
        assert!(result.is_err());
    }

    #[test]
    fn gaussblur_keeps_flat_images_flat() {
        let image = image_from(4, 4, BandFormat::UChar, &[100.0; 16]);
        let mut out = VImage::default();
        call(
            "gaussblur",
            Some(
                VOption::new()
                    .set("in", &image)
                    .set("sigma", 1.5)
                    .set_output("out", &mut out),
            ),
        )
        .unwrap();
        assert_eq!(out.format(), BandFormat::UChar);
        assert!(out.pixels().iter().all(|&v| v == 100.0));
    }

    #[test]
    fn gaussblur_spreads_a_spike() {
        let mut values = vec![0.0; 25];
        values[12] = 255.0;
        let image = image_from(5, 5, BandFormat::Float, &values);
        let mut out = VImage::default();
        call(
            "gaussblur",
            Some(
                VOption::new()
                    .set("in", &image)
                    .set("sigma", 1.0)
                    .set_output("out", &mut out),
            ),
        )
        .unwrap();
        let p = out.pixels();
        assert!(p[12] < 255.0);
        assert!(p[11] > 0.0);
        assert_abs_diff_eq!(p[11], p[13], epsilon = 1e-4);
        assert_abs_diff_eq!(p.iter().sum::<f64>(), 255.0, epsilon = 1e-2);
    }
}
