//! Shared test utilities: synthetic images and encoded fixtures.
//!
//! ```text
//! use crate::test_helpers::*;
//!
//! let image = gradient(16, 8, 3);
//! let png = encode_png(&image);
//! assert_pixels_eq(&image, &VImage::new_from_buffer(&png, "", None).unwrap());
//! ```

use crate::enums::BandFormat;
use crate::image::{Header, VImage};

// =========================================================================
// Synthetic images
// =========================================================================

/// An 8-bit image whose sample at `(x, y, band)` is `(x + y + 10 * band) % 256`.
pub fn gradient(width: u32, height: u32, bands: u32) -> VImage {
    let header = Header::new(width, height, bands, BandFormat::UChar);
    let mut pixels = Vec::with_capacity(header.sample_count());
    for y in 0..height {
        for x in 0..width {
            for b in 0..bands {
                pixels.push(((x + y + 10 * b) % 256) as f64);
            }
        }
    }
    VImage::from_pixels(header, pixels).unwrap()
}

/// A single-band image of the given format filled from `values`, row-major.
pub fn image_from(width: u32, height: u32, format: BandFormat, values: &[f64]) -> VImage {
    VImage::from_pixels(Header::new(width, height, 1, format), values.to_vec()).unwrap()
}

/// A 16-bit image with samples spread over the full range.
pub fn gradient16(width: u32, height: u32, bands: u32) -> VImage {
    let header = Header::new(width, height, bands, BandFormat::UShort);
    let count = header.sample_count();
    let pixels = (0..count)
        .map(|i| ((i * 65535) / count.max(1)) as f64)
        .collect();
    VImage::from_pixels(header, pixels).unwrap()
}

// =========================================================================
// Encoded fixtures
// =========================================================================

/// Encode with the built-in PNG saver.
pub fn encode_png(image: &VImage) -> Vec<u8> {
    image.write_to_buffer(".png", None).unwrap().to_vec()
}

// =========================================================================
// Assertions
// =========================================================================

/// Assert two images have the same geometry, format and samples.
pub fn assert_pixels_eq(expected: &VImage, actual: &VImage) {
    assert_eq!(
        (expected.width(), expected.height(), expected.bands()),
        (actual.width(), actual.height(), actual.bands()),
        "geometry mismatch"
    );
    assert_eq!(expected.format(), actual.format(), "format mismatch");
    if let Some(i) = expected
        .pixels()
        .iter()
        .zip(actual.pixels())
        .position(|(a, b)| a != b)
    {
        panic!(
            "sample {i} differs: expected {}, got {}",
            expected.pixels()[i],
            actual.pixels()[i]
        );
    }
}
