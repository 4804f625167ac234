//! Loaders and savers.
//!
//! Every supported [`Format`] gets a family of operations named after its
//! nickname:
//!
//! | Operation | Reads | Writes |
//! |---|---|---|
//! | `{nick}load` | `filename` | `out` |
//! | `{nick}load_buffer` | `buffer` | `out` |
//! | `{nick}load_source` | `source` | `out` |
//! | `{nick}save` | `in`, `filename` | |
//! | `{nick}save_buffer` | `in` | `buffer` |
//! | `{nick}save_target` | `in`, `target` | |
//!
//! PNG, JPEG, TIFF and WebP go through the `image` crate. The matrix format
//! is plain text: a `width height [scale [offset]]` line followed by the
//! values row by row; it has no buffer loader or saver.
//!
//! 8-bit savers (JPEG, WebP) take the high byte of 16-bit images; every other
//! format is clipped to `uchar`. JPEG drops alpha.

use super::OpResult;
use super::resample::shrink_box;
use crate::config;
use crate::enums::BandFormat;
use crate::image::{Header, VImage};
use crate::operation::{ArgSpec, Arguments, Operation, OperationError};
use crate::value::{Blob, ValueType};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::codecs::tiff::TiffEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ImageBuffer, ImageFormat, ImageReader};
use std::io::Cursor;
use std::sync::Arc;
use tracing::debug;

/// A file format with a loader and saver family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Png,
    Jpeg,
    Tiff,
    Webp,
    Matrix,
}

impl Format {
    pub const ALL: [Format; 5] = [
        Format::Png,
        Format::Jpeg,
        Format::Tiff,
        Format::Webp,
        Format::Matrix,
    ];

    /// Prefix of this format's operation names.
    pub fn nick(self) -> &'static str {
        match self {
            Format::Png => "png",
            Format::Jpeg => "jpeg",
            Format::Tiff => "tiff",
            Format::Webp => "webp",
            Format::Matrix => "matrix",
        }
    }

    /// Pick a format from a filename or a bare suffix like `".png"`.
    pub fn from_suffix(name: &str) -> Option<Self> {
        let extension = name.rsplit('.').next()?.to_ascii_lowercase();
        match extension.as_str() {
            "png" => Some(Format::Png),
            "jpg" | "jpeg" | "jpe" => Some(Format::Jpeg),
            "tif" | "tiff" => Some(Format::Tiff),
            "webp" => Some(Format::Webp),
            "mat" => Some(Format::Matrix),
            _ => None,
        }
    }

    /// Identify encoded bytes by their signature.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match image::guess_format(bytes) {
            Ok(ImageFormat::Png) => Some(Format::Png),
            Ok(ImageFormat::Jpeg) => Some(Format::Jpeg),
            Ok(ImageFormat::Tiff) => Some(Format::Tiff),
            Ok(ImageFormat::WebP) => Some(Format::Webp),
            _ if parse_matrix_header(bytes).is_some() => Some(Format::Matrix),
            _ => None,
        }
    }

    fn image_format(self) -> Option<ImageFormat> {
        match self {
            Format::Png => Some(ImageFormat::Png),
            Format::Jpeg => Some(ImageFormat::Jpeg),
            Format::Tiff => Some(ImageFormat::Tiff),
            Format::Webp => Some(ImageFormat::WebP),
            Format::Matrix => None,
        }
    }

    /// Whether in-memory buffers are supported.
    pub fn has_buffer(self) -> bool {
        self != Format::Matrix
    }

    pub fn loader(self) -> String {
        format!("{}load", self.nick())
    }

    pub fn saver(self) -> String {
        format!("{}save", self.nick())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    File,
    Buffer,
    Stream,
}

/// Every loader and saver.
pub fn operations() -> Vec<Arc<dyn Operation>> {
    let mut operations: Vec<Arc<dyn Operation>> = Vec::new();
    for format in Format::ALL {
        for endpoint in [Endpoint::File, Endpoint::Buffer, Endpoint::Stream] {
            if endpoint == Endpoint::Buffer && !format.has_buffer() {
                continue;
            }
            operations.push(Arc::new(Load::new(format, endpoint)));
            operations.push(Arc::new(Save::new(format, endpoint)));
        }
    }
    operations
}

struct Load {
    name: String,
    description: String,
    format: Format,
    endpoint: Endpoint,
    args: Vec<ArgSpec>,
}

impl Load {
    fn new(format: Format, endpoint: Endpoint) -> Self {
        let (name, input) = match endpoint {
            Endpoint::File => (
                format.loader(),
                ArgSpec::input("filename", "Filename to load from", ValueType::String),
            ),
            Endpoint::Buffer => (
                format!("{}_buffer", format.loader()),
                ArgSpec::input("buffer", "Buffer to load from", ValueType::Blob),
            ),
            Endpoint::Stream => (
                format!("{}_source", format.loader()),
                ArgSpec::input("source", "Source to load from", ValueType::Source),
            ),
        };
        let mut args = vec![input, ArgSpec::output("out", "Output image", ValueType::Image)];
        if format == Format::Jpeg {
            args.push(
                ArgSpec::input("shrink", "Shrink factor on load", ValueType::Int)
                    .range(1.0, 16.0)
                    .default_value(1),
            );
        }
        Self {
            description: format!("load {} image", format.nick()),
            name,
            format,
            endpoint,
            args,
        }
    }
}

impl Operation for Load {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn args(&self) -> &[ArgSpec] {
        &self.args
    }

    fn build(&self, args: &mut Arguments) -> OpResult<()> {
        let (bytes, filename) = match self.endpoint {
            Endpoint::File => {
                let filename = args.string("filename")?.to_string();
                (Blob::new(std::fs::read(&filename)?), Some(filename))
            }
            Endpoint::Buffer => (args.blob("buffer")?.clone(), None),
            Endpoint::Stream => {
                let source = args.source("source")?;
                let filename = source.filename().map(|p| p.display().to_string());
                (source.read_all()?, filename)
            }
        };
        debug!(loader = %self.name, bytes = bytes.len(), "decoding");
        let mut image = decode(self.format, &bytes, filename)?;
        if self.format == Format::Jpeg {
            let shrink = args.int("shrink")? as u32;
            if shrink > 1 {
                image = shrink_box(&image, shrink, shrink)?;
            }
        }
        args.set_output("out", image);
        Ok(())
    }
}

struct Save {
    name: String,
    description: String,
    format: Format,
    endpoint: Endpoint,
    args: Vec<ArgSpec>,
}

impl Save {
    fn new(format: Format, endpoint: Endpoint) -> Self {
        let (name, endpoint_arg) = match endpoint {
            Endpoint::File => (
                format.saver(),
                ArgSpec::input("filename", "Filename to save to", ValueType::String),
            ),
            Endpoint::Buffer => (
                format!("{}_buffer", format.saver()),
                ArgSpec::output("buffer", "Buffer to save to", ValueType::Blob),
            ),
            Endpoint::Stream => (
                format!("{}_target", format.saver()),
                ArgSpec::input("target", "Target to save to", ValueType::Target),
            ),
        };
        let mut args = vec![
            ArgSpec::input("in", "Image to save", ValueType::Image),
            endpoint_arg,
        ];
        match format {
            Format::Png => args.push(
                ArgSpec::input("compression", "Compression factor", ValueType::Int)
                    .optional()
                    .range(0.0, 9.0),
            ),
            Format::Jpeg => args.push(
                ArgSpec::input("Q", "Q factor", ValueType::Int)
                    .optional()
                    .range(1.0, 100.0),
            ),
            _ => {}
        }
        Self {
            description: format!("save image to {} {}", format.nick(), match endpoint {
                Endpoint::File => "file",
                Endpoint::Buffer => "buffer",
                Endpoint::Stream => "target",
            }),
            name,
            format,
            endpoint,
            args,
        }
    }
}

impl Operation for Save {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn args(&self) -> &[ArgSpec] {
        &self.args
    }

    fn build(&self, args: &mut Arguments) -> OpResult<()> {
        let bytes = encode(self.format, args.image("in")?, args)?;
        debug!(saver = %self.name, bytes = bytes.len(), "encoded");
        match self.endpoint {
            Endpoint::File => std::fs::write(args.string("filename")?, &bytes)?,
            Endpoint::Buffer => args.set_output("buffer", Blob::new(bytes)),
            Endpoint::Stream => args.target("target")?.write_all(&bytes)?,
        }
        Ok(())
    }
}

fn check_size(width: u32, height: u32) -> OpResult<()> {
    let limit = config::current().limits.max_pixels;
    if width as u64 * height as u64 > limit {
        return Err(OperationError::TooLarge {
            width,
            height,
            limit,
        });
    }
    Ok(())
}

fn decode(format: Format, bytes: &[u8], filename: Option<String>) -> OpResult<VImage> {
    let Some(image_format) = format.image_format() else {
        return decode_matrix(bytes, filename);
    };
    let (width, height) = ImageReader::with_format(Cursor::new(bytes), image_format).into_dimensions()?;
    check_size(width, height)?;
    let decoded = ImageReader::with_format(Cursor::new(bytes), image_format).decode()?;
    from_dynamic(decoded, filename)
}

fn widen<T: Copy + Into<f64>>(raw: Vec<T>) -> Vec<f64> {
    raw.into_iter().map(Into::into).collect()
}

fn from_dynamic(decoded: DynamicImage, filename: Option<String>) -> OpResult<VImage> {
    let (width, height) = (decoded.width(), decoded.height());
    let (bands, format, samples) = match decoded {
        DynamicImage::ImageLuma8(b) => (1, BandFormat::UChar, widen(b.into_raw())),
        DynamicImage::ImageLumaA8(b) => (2, BandFormat::UChar, widen(b.into_raw())),
        DynamicImage::ImageRgb8(b) => (3, BandFormat::UChar, widen(b.into_raw())),
        DynamicImage::ImageRgba8(b) => (4, BandFormat::UChar, widen(b.into_raw())),
        DynamicImage::ImageLuma16(b) => (1, BandFormat::UShort, widen(b.into_raw())),
        DynamicImage::ImageLumaA16(b) => (2, BandFormat::UShort, widen(b.into_raw())),
        DynamicImage::ImageRgb16(b) => (3, BandFormat::UShort, widen(b.into_raw())),
        DynamicImage::ImageRgba16(b) => (4, BandFormat::UShort, widen(b.into_raw())),
        DynamicImage::ImageRgb32F(b) => (3, BandFormat::Float, widen(b.into_raw())),
        DynamicImage::ImageRgba32F(b) => (4, BandFormat::Float, widen(b.into_raw())),
        other => (4, BandFormat::UChar, widen(other.to_rgba8().into_raw())),
    };
    let mut header = Header::new(width, height, bands, format);
    header.filename = filename;
    Ok(VImage::from_pixels(header, samples)?)
}

/// Convert to an `image` crate buffer. `sixteen_bit` keeps `ushort` images
/// 16-bit; `alpha` keeps the alpha band of 2- and 4-band images.
fn to_dynamic(image: &VImage, sixteen_bit: bool, alpha: bool) -> OpResult<DynamicImage> {
    let (width, height, bands) = (image.width(), image.height(), image.bands() as usize);
    if bands > 4 {
        return Err(OperationError::Failed(format!(
            "can't save a {bands}-band image in this format"
        )));
    }
    let keep = if !alpha && (bands == 2 || bands == 4) {
        bands - 1
    } else {
        bands
    };
    let samples: Vec<f64> = if keep == bands {
        image.pixels().to_vec()
    } else {
        image
            .pixels()
            .chunks(bands)
            .flat_map(|pixel| pixel[..keep].iter().copied())
            .collect()
    };
    let mismatch = || OperationError::Failed("pixel buffer doesn't match image size".into());

    if sixteen_bit && image.format() == BandFormat::UShort {
        let raw: Vec<u16> = samples.iter().map(|&v| v as u16).collect();
        return Ok(match keep {
            1 => DynamicImage::ImageLuma16(ImageBuffer::from_raw(width, height, raw).ok_or_else(mismatch)?),
            2 => DynamicImage::ImageLumaA16(ImageBuffer::from_raw(width, height, raw).ok_or_else(mismatch)?),
            3 => DynamicImage::ImageRgb16(ImageBuffer::from_raw(width, height, raw).ok_or_else(mismatch)?),
            _ => DynamicImage::ImageRgba16(ImageBuffer::from_raw(width, height, raw).ok_or_else(mismatch)?),
        });
    }

    let raw: Vec<u8> = match image.format() {
        BandFormat::UShort => samples.iter().map(|&v| ((v as u16) >> 8) as u8).collect(),
        _ => samples
            .iter()
            .map(|&v| BandFormat::UChar.clip(v) as u8)
            .collect(),
    };
    Ok(match keep {
        1 => DynamicImage::ImageLuma8(ImageBuffer::from_raw(width, height, raw).ok_or_else(mismatch)?),
        2 => DynamicImage::ImageLumaA8(ImageBuffer::from_raw(width, height, raw).ok_or_else(mismatch)?),
        3 => DynamicImage::ImageRgb8(ImageBuffer::from_raw(width, height, raw).ok_or_else(mismatch)?),
        _ => DynamicImage::ImageRgba8(ImageBuffer::from_raw(width, height, raw).ok_or_else(mismatch)?),
    })
}

fn png_compression(level: i32) -> CompressionType {
    match level {
        0..=2 => CompressionType::Fast,
        3..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

fn encode(format: Format, image: &VImage, args: &Arguments) -> OpResult<Vec<u8>> {
    let defaults = config::current().foreign;
    let mut bytes = Vec::new();
    match format {
        Format::Png => {
            let level = if args.has("compression") {
                args.int("compression")?
            } else {
                defaults.png_compression as i32
            };
            let encoder =
                PngEncoder::new_with_quality(&mut bytes, png_compression(level), FilterType::Adaptive);
            to_dynamic(image, true, true)?.write_with_encoder(encoder)?;
        }
        Format::Jpeg => {
            let quality = if args.has("Q") {
                args.int("Q")? as u8
            } else {
                defaults.jpeg_quality
            };
            let encoder = JpegEncoder::new_with_quality(&mut bytes, quality);
            to_dynamic(image, false, false)?.write_with_encoder(encoder)?;
        }
        Format::Tiff => {
            // the TIFF encoder has no grey + alpha layout
            let dynamic = match to_dynamic(image, true, true)? {
                grey @ DynamicImage::ImageLumaA8(_) => DynamicImage::ImageRgba8(grey.to_rgba8()),
                grey @ DynamicImage::ImageLumaA16(_) => DynamicImage::ImageRgba16(grey.to_rgba16()),
                other => other,
            };
            let mut cursor = Cursor::new(Vec::new());
            dynamic.write_with_encoder(TiffEncoder::new(&mut cursor))?;
            bytes = cursor.into_inner();
        }
        Format::Webp => {
            let encoder = WebPEncoder::new_lossless(&mut bytes);
            to_dynamic(image, false, true)?.write_with_encoder(encoder)?;
        }
        Format::Matrix => bytes = encode_matrix(image)?.into_bytes(),
    }
    Ok(bytes)
}

// =========================================================================
// Matrix text format
// =========================================================================

/// `(width, height, scale, offset)` from the first line, if it looks like a
/// matrix header.
fn parse_matrix_header(bytes: &[u8]) -> Option<(u32, u32, f64, f64)> {
    let head = &bytes[..bytes.len().min(256)];
    // the cut may land inside a multi-byte character
    let text = match std::str::from_utf8(head) {
        Ok(text) => text,
        Err(e) => std::str::from_utf8(&head[..e.valid_up_to()]).ok()?,
    };
    let line = text.lines().next()?;
    let fields: Vec<&str> = line.split_whitespace().collect();
    if !(2..=4).contains(&fields.len()) {
        return None;
    }
    let width = fields[0].parse::<u32>().ok().filter(|w| *w > 0)?;
    let height = fields[1].parse::<u32>().ok().filter(|h| *h > 0)?;
    let scale = fields.get(2).map_or(Some(1.0), |s| s.parse().ok())?;
    let offset = fields.get(3).map_or(Some(0.0), |s| s.parse().ok())?;
    Some((width, height, scale, offset))
}

fn decode_matrix(bytes: &[u8], filename: Option<String>) -> OpResult<VImage> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| OperationError::Failed(format!("matrix file is not text: {e}")))?;
    let (header_line, body) = text.split_once('\n').unwrap_or((text, ""));
    let (width, height, scale, offset) = parse_matrix_header(header_line.as_bytes())
        .ok_or_else(|| OperationError::Failed(format!("bad matrix header \"{header_line}\"")))?;
    check_size(width, height)?;
    let values = body
        .split_whitespace()
        .map(|s| {
            s.parse::<f64>()
                .map_err(|e| OperationError::Failed(format!("bad matrix value \"{s}\": {e}")))
        })
        .collect::<OpResult<Vec<f64>>>()?;
    if values.len() != width as usize * height as usize {
        return Err(OperationError::Failed(format!(
            "{width}x{height} matrix needs {} values, found {}",
            width as usize * height as usize,
            values.len()
        )));
    }
    let image = VImage::new_matrix_from_array(width, height, &values)?;
    let image = match filename {
        Some(filename) => {
            let mut header = image.header().clone();
            header.filename = Some(filename);
            image.derive(header, values)?
        }
        None => image,
    };
    image.set("scale", scale)?;
    image.set("offset", offset)?;
    Ok(image)
}

fn encode_matrix(image: &VImage) -> OpResult<String> {
    if image.bands() != 1 {
        return Err(OperationError::Failed(
            "matrix files hold one-band images".into(),
        ));
    }
    let scale = image.get_double("scale").unwrap_or(1.0);
    let offset = image.get_double("offset").unwrap_or(0.0);
    let mut text = format!("{} {} {scale} {offset}\n", image.width(), image.height());
    for y in 0..image.height() {
        let row: Vec<String> = image.data().row(y).iter().map(f64::to_string).collect();
        text.push_str(&row.join(" "));
        text.push('\n');
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::call;
    use crate::connection::{VSource, VTarget};
    use crate::option::VOption;
    use crate::test_helpers::{assert_pixels_eq, gradient, gradient16};

    fn save_buffer(saver: &str, image: &VImage, options: VOption<'_>) -> Blob {
        let mut buffer = Blob::default();
        call(
            saver,
            Some(
                VOption::new()
                    .set("in", image)
                    .set_output("buffer", &mut buffer)
                    .extend(options),
            ),
        )
        .unwrap();
        buffer
    }

    fn load_buffer(loader: &str, buffer: &Blob) -> VImage {
        let mut out = VImage::default();
        call(
            loader,
            Some(VOption::new().set("buffer", buffer.clone()).set_output("out", &mut out)),
        )
        .unwrap();
        out
    }

    #[test]
    fn suffix_and_sniffing() {
        assert_eq!(Format::from_suffix("photo.JPG"), Some(Format::Jpeg));
        assert_eq!(Format::from_suffix(".tif"), Some(Format::Tiff));
        assert_eq!(Format::from_suffix("mask.mat"), Some(Format::Matrix));
        assert_eq!(Format::from_suffix("notes.txt"), None);
        assert_eq!(Format::sniff(b"\x89PNG\r\n\x1a\n...."), Some(Format::Png));
        assert_eq!(Format::sniff(b"3 3 9 0\n1 1 1\n"), Some(Format::Matrix));
        assert_eq!(Format::sniff(b"hello world"), None);
    }

    #[test]
    fn every_format_has_a_full_family() {
        let registry = crate::registry::Registry::with_builtins();
        for name in [
            "pngload",
            "pngload_buffer",
            "pngload_source",
            "pngsave",
            "pngsave_buffer",
            "pngsave_target",
            "jpegload_buffer",
            "tiffsave_buffer",
            "webpload_source",
            "matrixload",
            "matrixload_source",
            "matrixsave",
            "matrixsave_target",
        ] {
            assert!(registry.get(name).is_some(), "{name} missing");
        }
        assert!(registry.get("matrixload_buffer").is_none());
    }

    #[test]
    fn png_round_trip_is_lossless() {
        for bands in [1, 2, 3, 4] {
            let image = gradient(9, 7, bands);
            let buffer = save_buffer("pngsave_buffer", &image, VOption::new().set("compression", 9));
            assert_pixels_eq(&image, &load_buffer("pngload_buffer", &buffer));
        }
    }

    #[test]
    fn png_keeps_sixteen_bits() {
        let image = gradient16(6, 5, 3);
        let buffer = save_buffer("pngsave_buffer", &image, VOption::new());
        let back = load_buffer("pngload_buffer", &buffer);
        assert_eq!(back.format(), BandFormat::UShort);
        assert_pixels_eq(&image, &back);
    }

    #[test]
    fn tiff_round_trip_is_lossless() {
        let image = gradient(8, 8, 3);
        let buffer = save_buffer("tiffsave_buffer", &image, VOption::new());
        assert_pixels_eq(&image, &load_buffer("tiffload_buffer", &buffer));
    }

    #[test]
    fn webp_lossless_round_trip() {
        let image = gradient(8, 8, 3);
        let buffer = save_buffer("webpsave_buffer", &image, VOption::new());
        assert_pixels_eq(&image, &load_buffer("webpload_buffer", &buffer));
    }

    #[test]
    fn jpeg_drops_alpha_and_honours_shrink() {
        let image = gradient(16, 16, 4);
        let buffer = save_buffer("jpegsave_buffer", &image, VOption::new().set("Q", 90));
        let back = load_buffer("jpegload_buffer", &buffer);
        assert_eq!((back.width(), back.height(), back.bands()), (16, 16, 3));

        let mut small = VImage::default();
        call(
            "jpegload_buffer",
            Some(
                VOption::new()
                    .set("buffer", buffer)
                    .set("shrink", 2)
                    .set_output("out", &mut small),
            ),
        )
        .unwrap();
        assert_eq!((small.width(), small.height()), (8, 8));
    }

    #[test]
    fn jpeg_quality_out_of_range_is_rejected() {
        let image = gradient(4, 4, 3);
        let mut buffer = Blob::default();
        let err = call(
            "jpegsave_buffer",
            Some(
                VOption::new()
                    .set("in", &image)
                    .set("Q", 101)
                    .set_output("buffer", &mut buffer),
            ),
        )
        .unwrap_err();
        assert!(matches!(err, crate::Error::ArgumentRange { .. }));
    }

    #[test]
    fn garbage_buffer_fails_to_load() {
        let mut out = VImage::default();
        let err = call(
            "pngload_buffer",
            Some(
                VOption::new()
                    .set("buffer", Blob::new(b"not a png".to_vec()))
                    .set_output("out", &mut out),
            ),
        )
        .unwrap_err();
        assert!(matches!(err, crate::Error::OperationFailed { .. }));
        assert!(out.is_null());
    }

    #[test]
    fn source_and_target_round_trip() {
        let image = gradient(5, 5, 1);
        let target = VTarget::new_to_memory();
        call(
            "pngsave_target",
            Some(VOption::new().set("in", &image).set("target", &target)),
        )
        .unwrap();
        let source = VSource::new_from_memory(target.contents().unwrap());
        let mut out = VImage::default();
        call(
            "pngload_source",
            Some(VOption::new().set("source", &source).set_output("out", &mut out)),
        )
        .unwrap();
        assert_pixels_eq(&image, &out);
    }

    #[test]
    fn matrix_file_round_trip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("mask.mat");
        let path = path.to_str().unwrap();
        let mask = VImage::new_matrix_from_array(3, 2, &[1.0, -2.5, 3.0, 0.0, 4.0, 5.0]).unwrap();
        mask.set("scale", 8.0).unwrap();
        call(
            "matrixsave",
            Some(VOption::new().set("in", &mask).set("filename", path)),
        )
        .unwrap();
        assert!(std::fs::read_to_string(path).unwrap().starts_with("3 2 8 0\n"));

        let mut back = VImage::default();
        call(
            "matrixload",
            Some(VOption::new().set("filename", path).set_output("out", &mut back)),
        )
        .unwrap();
        assert_eq!(back.pixels(), mask.pixels());
        assert_eq!(back.get_double("scale").unwrap(), 8.0);
        assert_eq!(back.filename(), Some(path));
    }

    #[test]
    fn matrix_header_survives_a_cut_character() {
        let mut bytes = b"2 1\n1 2\n".to_vec();
        bytes.resize(255, b' ');
        bytes.extend("é".as_bytes());
        assert_eq!(parse_matrix_header(&bytes), Some((2, 1, 1.0, 0.0)));
        assert_eq!(Format::sniff(&bytes), Some(Format::Matrix));
    }

    #[test]
    fn matrix_with_wrong_value_count_fails() {
        assert!(decode_matrix(b"2 2\n1 2 3\n", None).is_err());
    }

    #[test]
    fn oversized_images_are_refused() {
        assert!(matches!(
            check_size(20000, 20000),
            Err(OperationError::TooLarge { .. })
        ));
        assert!(check_size(100, 100).is_ok());
    }
}
