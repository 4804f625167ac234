//! Interpolators for resampling operations.
//!
//! `affine` (and anything else that maps output pixels back to fractional
//! input positions) takes a [`VInterpolate`] argument choosing how those
//! positions are sampled.

use crate::error::{Error, Result};
use crate::object::Handle;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolator {
    Nearest,
    Bilinear,
}

impl Interpolator {
    pub fn nickname(self) -> &'static str {
        match self {
            Interpolator::Nearest => "nearest",
            Interpolator::Bilinear => "bilinear",
        }
    }

    /// Sample band `band` of a `width`x`height` interleaved buffer at
    /// `(x, y)`. Positions outside the image read as 0.
    pub fn sample(
        self,
        pixels: &[f64],
        width: u32,
        height: u32,
        bands: u32,
        x: f64,
        y: f64,
        band: u32,
    ) -> f64 {
        let at = |px: i64, py: i64| -> f64 {
            if px < 0 || py < 0 || px >= width as i64 || py >= height as i64 {
                0.0
            } else {
                pixels[((py as usize * width as usize) + px as usize) * bands as usize
                    + band as usize]
            }
        };
        match self {
            Interpolator::Nearest => at(x.floor() as i64, y.floor() as i64),
            Interpolator::Bilinear => {
                // pixel centres sit at +0.5
                let fx = x - 0.5;
                let fy = y - 0.5;
                let x0 = fx.floor();
                let y0 = fy.floor();
                let tx = fx - x0;
                let ty = fy - y0;
                let (x0, y0) = (x0 as i64, y0 as i64);
                let clamp_x = |v: i64| v.clamp(0, width as i64 - 1);
                let clamp_y = |v: i64| v.clamp(0, height as i64 - 1);
                if x < 0.0 || y < 0.0 || x > width as f64 || y > height as f64 {
                    return 0.0;
                }
                let p00 = at(clamp_x(x0), clamp_y(y0));
                let p10 = at(clamp_x(x0 + 1), clamp_y(y0));
                let p01 = at(clamp_x(x0), clamp_y(y0 + 1));
                let p11 = at(clamp_x(x0 + 1), clamp_y(y0 + 1));
                let top = p00 + (p10 - p00) * tx;
                let bottom = p01 + (p11 - p01) * tx;
                top + (bottom - top) * ty
            }
        }
    }
}

/// A reference-counted interpolator handle.
#[derive(Clone, Default)]
pub struct VInterpolate(Handle<Interpolator>);

impl VInterpolate {
    /// Look an interpolator up by nickname (`"nearest"`, `"bilinear"`).
    pub fn new_from_name(name: &str) -> Result<Self> {
        let interpolator = match name.trim() {
            "nearest" => Interpolator::Nearest,
            "bilinear" => Interpolator::Bilinear,
            other => {
                return Err(Error::Construction(format!(
                    "no interpolator named \"{other}\""
                )));
            }
        };
        Ok(Self(Handle::from_object(interpolator)))
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    /// The interpolator, `None` on a null handle.
    pub fn get(&self) -> Option<Interpolator> {
        self.0.get_object().map(|i| **i)
    }

    pub fn nickname(&self) -> &'static str {
        self.get().map_or("null", Interpolator::nickname)
    }
}

impl PartialEq for VInterpolate {
    fn eq(&self, other: &Self) -> bool {
        self.0.ptr_eq(&other.0)
    }
}

impl fmt::Debug for VInterpolate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VInterpolate({})", self.nickname())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn lookup_by_name() {
        assert_eq!(
            VInterpolate::new_from_name("bilinear").unwrap().get(),
            Some(Interpolator::Bilinear)
        );
        assert!(VInterpolate::new_from_name("lanczos9").is_err());
        assert_eq!(VInterpolate::default().nickname(), "null");
    }

    #[test]
    fn bilinear_blends_neighbours() {
        // 2x1 image: 0, 100
        let pixels = [0.0, 100.0];
        let mid = Interpolator::Bilinear.sample(&pixels, 2, 1, 1, 1.0, 0.5, 0);
        assert_abs_diff_eq!(mid, 50.0, epsilon = 1e-9);
        let centre = Interpolator::Bilinear.sample(&pixels, 2, 1, 1, 0.5, 0.5, 0);
        assert_abs_diff_eq!(centre, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn nearest_reads_zero_outside() {
        let pixels = [7.0];
        assert_eq!(Interpolator::Nearest.sample(&pixels, 1, 1, 1, 0.2, 0.9, 0), 7.0);
        assert_eq!(Interpolator::Nearest.sample(&pixels, 1, 1, 1, -0.1, 0.0, 0), 0.0);
    }
}
