//! Constructors and writers.
//!
//! Loaders are picked by sniffing the first bytes of a file, buffer or
//! source, falling back to the filename suffix. Savers are picked by suffix.
//! Either way the work is done by a `{format}load*` / `{format}save*`
//! operation, so filename options (`"out.png[compression=9]"`) and the
//! caller's `VOption` reach the codec the same way they reach any operation.

use super::{Header, ImageData, VImage};
use crate::call::call_option_string;
use crate::connection::{VSource, VTarget};
use crate::enums::{BandFormat, Interpretation};
use crate::error::{Error, Result};
use crate::ops::foreign::Format;
use crate::option::VOption;
use crate::option_string::split_filename;
use crate::value::Blob;
use std::fs::File;
use std::io::Read;
use tracing::debug;

fn non_empty(option_string: &str) -> Option<&str> {
    Some(option_string).filter(|s| !s.trim().is_empty())
}

fn sniff_file(path: &str) -> Result<Option<Format>> {
    let mut head = Vec::with_capacity(512);
    File::open(path)?.take(512).read_to_end(&mut head)?;
    Ok(Format::sniff(&head))
}

fn saver_format(name: &str) -> Result<Format> {
    Format::from_suffix(name).ok_or_else(|| Error::UnknownFormat(name.to_string()))
}

fn buffer_format(format: Format, name: &str) -> Result<Format> {
    if format.has_buffer() {
        Ok(format)
    } else {
        Err(Error::UnknownFormat(format!("{name} (no buffer support)")))
    }
}

macro_rules! decode_as {
    ($bytes:expr, $t:ty) => {
        $bytes
            .chunks_exact(std::mem::size_of::<$t>())
            .map(|chunk| {
                let mut raw = [0u8; std::mem::size_of::<$t>()];
                raw.copy_from_slice(chunk);
                <$t>::from_ne_bytes(raw) as f64
            })
            .collect::<Vec<f64>>()
    };
}

macro_rules! encode_as {
    ($pixels:expr, $t:ty) => {
        $pixels
            .iter()
            .flat_map(|&v| (v as $t).to_ne_bytes())
            .collect::<Vec<u8>>()
    };
}

impl VImage {
    /// An empty 0x0 image, a placeholder for code that wants a non-null handle.
    pub fn new_memory() -> Self {
        let header = Header::new(0, 0, 1, BandFormat::UChar);
        match ImageData::new(header, Vec::new()) {
            Ok(data) => Self::from_data(data),
            Err(_) => Self::default(),
        }
    }

    /// Load a file. `name` may carry load options: `"photo.jpg[shrink=2]"`.
    pub fn new_from_file(name: &str, options: Option<VOption<'_>>) -> Result<VImage> {
        let (filename, option_string) = split_filename(name);
        let format = match sniff_file(filename)? {
            Some(format) => format,
            None => saver_format(filename)?,
        };
        debug!(filename, loader = %format.loader(), "new_from_file");

        let mut out = VImage::default();
        call_option_string(
            &format.loader(),
            option_string,
            Some(
                VOption::new()
                    .set("filename", filename)
                    .set_output("out", &mut out)
                    .extend(options.unwrap_or_default()),
            ),
        )?;
        Ok(out)
    }

    /// Decode an image held in memory. The format is sniffed from the bytes.
    pub fn new_from_buffer(
        buffer: &[u8],
        option_string: &str,
        options: Option<VOption<'_>>,
    ) -> Result<VImage> {
        let format = Format::sniff(buffer)
            .ok_or_else(|| Error::UnknownFormat(format!("buffer of {} bytes", buffer.len())))?;
        let format = buffer_format(format, "buffer")?;

        let mut out = VImage::default();
        call_option_string(
            &format!("{}_buffer", format.loader()),
            non_empty(option_string),
            Some(
                VOption::new()
                    .set("buffer", Blob::from(buffer))
                    .set_output("out", &mut out)
                    .extend(options.unwrap_or_default()),
            ),
        )?;
        Ok(out)
    }

    /// Decode an image from a source.
    pub fn new_from_source(
        source: &VSource,
        option_string: &str,
        options: Option<VOption<'_>>,
    ) -> Result<VImage> {
        let head = source.read_all()?;
        let format = match Format::sniff(&head) {
            Some(format) => format,
            None => source
                .filename()
                .and_then(|path| path.to_str())
                .and_then(Format::from_suffix)
                .ok_or_else(|| Error::UnknownFormat("source".to_string()))?,
        };

        let mut out = VImage::default();
        call_option_string(
            &format!("{}_source", format.loader()),
            non_empty(option_string),
            Some(
                VOption::new()
                    .set("source", source)
                    .set_output("out", &mut out)
                    .extend(options.unwrap_or_default()),
            ),
        )?;
        Ok(out)
    }

    /// Wrap raw samples: native-endian elements of `format`, band-interleaved,
    /// row after row.
    pub fn new_from_memory(
        data: &[u8],
        width: u32,
        height: u32,
        bands: u32,
        format: BandFormat,
    ) -> Result<VImage> {
        let header = Header::new(width, height, bands, format);
        let expected = header.sample_count() * format.size_of();
        if data.len() != expected {
            return Err(Error::Construction(format!(
                "{width}x{height}x{bands} {format} needs {expected} bytes, got {}",
                data.len()
            )));
        }
        let pixels = match format {
            BandFormat::UChar => decode_as!(data, u8),
            BandFormat::Char => decode_as!(data, i8),
            BandFormat::UShort => decode_as!(data, u16),
            BandFormat::Short => decode_as!(data, i16),
            BandFormat::UInt => decode_as!(data, u32),
            BandFormat::Int => decode_as!(data, i32),
            BandFormat::Float => decode_as!(data, f32),
            BandFormat::Double => decode_as!(data, f64),
        };
        VImage::from_pixels(header, pixels)
    }

    /// An all-zero one-band double matrix.
    pub fn new_matrix(width: u32, height: u32) -> Result<VImage> {
        Self::new_matrix_from_array(width, height, &vec![0.0; width as usize * height as usize])
    }

    /// A one-band double matrix, filled row by row, with `scale` 1 and
    /// `offset` 0.
    pub fn new_matrix_from_array(width: u32, height: u32, values: &[f64]) -> Result<VImage> {
        let mut header = Header::new(width, height, 1, BandFormat::Double);
        header.interpretation = Interpretation::Matrix;
        if values.len() != header.sample_count() {
            return Err(Error::Construction(format!(
                "{width}x{height} matrix needs {} values, got {}",
                header.sample_count(),
                values.len()
            )));
        }
        let matrix = VImage::from_pixels(header, values.to_vec())?;
        matrix.set("scale", 1.0)?;
        matrix.set("offset", 0.0)?;
        Ok(matrix)
    }

    /// An image the size and format of this one where every pixel is `pixel`.
    /// The band count is `pixel.len()`.
    pub fn new_from_image(&self, pixel: &[f64]) -> Result<VImage> {
        if pixel.is_empty() {
            return Err(Error::Construction("new_from_image needs at least one band".into()));
        }
        let header = self
            .header()
            .with_shape(self.width(), self.height(), pixel.len() as u32, self.format());
        let count = self.width() as usize * self.height() as usize;
        let pixels = pixel.repeat(count);
        self.derive(header, pixels)
    }

    /// A private copy of the pixels and metadata.
    pub fn copy_memory(&self) -> Result<VImage> {
        self.derive(self.header().clone(), self.pixels().to_vec())
    }

    /// Save to a file; the saver is picked by suffix. `name` may carry save
    /// options: `"out.jpg[Q=90]"`.
    pub fn write_to_file(&self, name: &str, options: Option<VOption<'_>>) -> Result<()> {
        let (filename, option_string) = split_filename(name);
        let format = saver_format(filename)?;
        debug!(filename, saver = %format.saver(), "write_to_file");
        call_option_string(
            &format.saver(),
            option_string,
            Some(
                VOption::new()
                    .set("in", self)
                    .set("filename", filename)
                    .extend(options.unwrap_or_default()),
            ),
        )
    }

    /// Encode to memory in the format named by `suffix`, e.g. `".png"` or
    /// `".jpg[Q=85]"`.
    pub fn write_to_buffer(&self, suffix: &str, options: Option<VOption<'_>>) -> Result<Blob> {
        let (suffix, option_string) = split_filename(suffix);
        let format = buffer_format(saver_format(suffix)?, suffix)?;
        let mut buffer = Blob::default();
        call_option_string(
            &format!("{}_buffer", format.saver()),
            option_string,
            Some(
                VOption::new()
                    .set("in", self)
                    .set_output("buffer", &mut buffer)
                    .extend(options.unwrap_or_default()),
            ),
        )?;
        Ok(buffer)
    }

    /// Encode to a target in the format named by `suffix`.
    pub fn write_to_target(
        &self,
        suffix: &str,
        target: &VTarget,
        options: Option<VOption<'_>>,
    ) -> Result<()> {
        let (suffix, option_string) = split_filename(suffix);
        let format = saver_format(suffix)?;
        call_option_string(
            &format!("{}_target", format.saver()),
            option_string,
            Some(
                VOption::new()
                    .set("in", self)
                    .set("target", target)
                    .extend(options.unwrap_or_default()),
            ),
        )
    }

    /// Raw samples in the image's format, native-endian, band-interleaved.
    pub fn write_to_memory(&self) -> Vec<u8> {
        let pixels = self.pixels();
        match self.format() {
            BandFormat::UChar => encode_as!(pixels, u8),
            BandFormat::Char => encode_as!(pixels, i8),
            BandFormat::UShort => encode_as!(pixels, u16),
            BandFormat::Short => encode_as!(pixels, i16),
            BandFormat::UInt => encode_as!(pixels, u32),
            BandFormat::Int => encode_as!(pixels, i32),
            BandFormat::Float => encode_as!(pixels, f32),
            BandFormat::Double => encode_as!(pixels, f64),
        }
    }
}
