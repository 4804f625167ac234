//! The image handle.
//!
//! [`VImage`] is a reference-counted handle on an [`ImageData`]: a header
//! (size, band count, band format, interpretation, resolution, offsets,
//! filename), the pixel samples, and a metadata store of named [`Value`]s.
//!
//! Images are immutable once built. Operations never modify their inputs;
//! they return new images. The metadata store is the one exception and is
//! guarded by a lock, so `set` works through a shared handle.
//!
//! | File | Contents |
//! |---|---|
//! | `mod.rs` | handle, header accessors, metadata |
//! | [`create`] | constructors and writers (`new_from_file`, `write_to_buffer`, ...) |
//! | [`methods`] | one typed method per operation |
//! | [`operators`] | `std::ops` overloads |

pub mod create;
pub mod methods;
pub mod operators;

use crate::enums::{BandFormat, EnumType, Interpretation};
use crate::error::{Error, Result};
use crate::object::Handle;
use crate::option::VOption;
use crate::value::{Blob, Value, ValueType};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Header fields readable through the metadata getters. They can't be `set`.
pub const HEADER_FIELDS: &[&str] = &[
    "width",
    "height",
    "bands",
    "format",
    "interpretation",
    "xres",
    "yres",
    "xoffset",
    "yoffset",
    "filename",
];

/// Image geometry and pixel description.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub width: u32,
    pub height: u32,
    pub bands: u32,
    pub format: BandFormat,
    pub interpretation: Interpretation,
    /// Horizontal resolution in pixels per millimetre.
    pub xres: f64,
    /// Vertical resolution in pixels per millimetre.
    pub yres: f64,
    pub xoffset: i32,
    pub yoffset: i32,
    pub filename: Option<String>,
}

impl Header {
    /// A header with the interpretation guessed from bands and format.
    pub fn new(width: u32, height: u32, bands: u32, format: BandFormat) -> Self {
        Self {
            width,
            height,
            bands,
            format,
            interpretation: default_interpretation(bands, format),
            xres: 1.0,
            yres: 1.0,
            xoffset: 0,
            yoffset: 0,
            filename: None,
        }
    }

    /// Same image description with different geometry or format; the
    /// interpretation is re-guessed if it no longer fits.
    pub fn with_shape(&self, width: u32, height: u32, bands: u32, format: BandFormat) -> Self {
        let mut header = Self {
            width,
            height,
            bands,
            format,
            ..self.clone()
        };
        if !interpretation_fits(header.interpretation, bands) {
            header.interpretation = default_interpretation(bands, format);
        }
        header
    }

    pub fn sample_count(&self) -> usize {
        self.width as usize * self.height as usize * self.bands as usize
    }

    /// Samples per row.
    pub fn row_len(&self) -> usize {
        self.width as usize * self.bands as usize
    }
}

fn default_interpretation(bands: u32, format: BandFormat) -> Interpretation {
    match (bands, format) {
        (1 | 2, BandFormat::UShort) => Interpretation::Grey16,
        (1 | 2, _) => Interpretation::Bw,
        (3 | 4, BandFormat::UShort) => Interpretation::Rgb16,
        (3 | 4, BandFormat::Float | BandFormat::Double) => Interpretation::Scrgb,
        (3 | 4, _) => Interpretation::Srgb,
        _ => Interpretation::Multiband,
    }
}

fn interpretation_fits(interpretation: Interpretation, bands: u32) -> bool {
    match interpretation {
        Interpretation::Bw | Interpretation::Grey16 => bands == 1 || bands == 2,
        Interpretation::Srgb
        | Interpretation::Rgb
        | Interpretation::Rgb16
        | Interpretation::Scrgb
        | Interpretation::Lab
        | Interpretation::Xyz => bands == 3 || bands == 4,
        Interpretation::Cmyk => bands == 4 || bands == 5,
        Interpretation::Matrix | Interpretation::Histogram | Interpretation::Fourier => bands >= 1,
        Interpretation::Multiband => true,
    }
}

/// The object behind a [`VImage`] handle.
pub struct ImageData {
    header: Header,
    pixels: Vec<f64>,
    meta: RwLock<BTreeMap<String, Value>>,
}

impl ImageData {
    /// Build an image, clipping every sample to the header's band format.
    pub fn new(header: Header, mut pixels: Vec<f64>) -> Result<Self> {
        if header.bands == 0 {
            return Err(Error::Construction("images need at least one band".into()));
        }
        if pixels.len() != header.sample_count() {
            return Err(Error::Construction(format!(
                "{}x{}x{} image needs {} samples, got {}",
                header.width,
                header.height,
                header.bands,
                header.sample_count(),
                pixels.len()
            )));
        }
        let format = header.format;
        if format != BandFormat::Double {
            pixels.par_iter_mut().for_each(|v| *v = format.clip(*v));
        }
        Ok(Self {
            header,
            pixels,
            meta: RwLock::new(BTreeMap::new()),
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// All samples, band-interleaved, row after row.
    pub fn pixels(&self) -> &[f64] {
        &self.pixels
    }

    /// The bands of one pixel. Panics outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> &[f64] {
        let bands = self.header.bands as usize;
        let start = (y as usize * self.header.width as usize + x as usize) * bands;
        &self.pixels[start..start + bands]
    }

    /// One row of samples.
    pub fn row(&self, y: u32) -> &[f64] {
        let len = self.header.row_len();
        let start = y as usize * len;
        &self.pixels[start..start + len]
    }

    fn meta(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Value>> {
        self.meta.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn meta_mut(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, Value>> {
        self.meta.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ImageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageData")
            .field("header", &self.header)
            .field("fields", &self.meta().keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// A reference-counted image handle.
///
/// `VImage::default()` is the null image, used as the destination for an
/// operation output. Header accessors panic on a null image; check
/// [`is_null`](Self::is_null) first when in doubt. Metadata access returns
/// [`Error::NullImage`] instead.
#[derive(Clone, Default)]
pub struct VImage(Handle<ImageData>);

impl VImage {
    /// Wrap freshly built image data.
    pub fn from_data(data: ImageData) -> Self {
        Self(Handle::from_object(data))
    }

    /// Build an image from a header and samples.
    pub fn from_pixels(header: Header, pixels: Vec<f64>) -> Result<Self> {
        ImageData::new(header, pixels).map(Self::from_data)
    }

    /// A new image carrying this image's metadata but new header and pixels.
    /// This is how operations propagate metadata from input to output.
    pub fn derive(&self, header: Header, pixels: Vec<f64>) -> Result<Self> {
        let meta = self.live_data()?.meta().clone();
        let data = ImageData::new(header, pixels)?;
        *data.meta_mut() = meta;
        Ok(Self::from_data(data))
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    /// References held on the underlying image, 0 for null.
    pub fn ref_count(&self) -> usize {
        self.0.ref_count()
    }

    /// The underlying shared image object.
    pub fn get_image(&self) -> Option<&Arc<ImageData>> {
        self.0.get_object()
    }

    pub fn handle(&self) -> &Handle<ImageData> {
        &self.0
    }

    fn live_data(&self) -> Result<&ImageData> {
        self.0
            .get_object()
            .map(Arc::as_ref)
            .ok_or(Error::NullImage)
    }

    pub(crate) fn data(&self) -> &ImageData {
        match self.0.get_object() {
            Some(data) => data,
            None => panic!("header access on a null VImage"),
        }
    }

    pub fn header(&self) -> &Header {
        &self.data().header
    }

    pub fn pixels(&self) -> &[f64] {
        &self.data().pixels
    }

    pub fn width(&self) -> u32 {
        self.header().width
    }

    pub fn height(&self) -> u32 {
        self.header().height
    }

    pub fn bands(&self) -> u32 {
        self.header().bands
    }

    pub fn format(&self) -> BandFormat {
        self.header().format
    }

    pub fn interpretation(&self) -> Interpretation {
        self.header().interpretation
    }

    /// The declared interpretation if it is plausible for the band count,
    /// otherwise a guess from bands and format.
    pub fn guess_interpretation(&self) -> Interpretation {
        let header = self.header();
        if interpretation_fits(header.interpretation, header.bands) {
            header.interpretation
        } else {
            default_interpretation(header.bands, header.format)
        }
    }

    pub fn xres(&self) -> f64 {
        self.header().xres
    }

    pub fn yres(&self) -> f64 {
        self.header().yres
    }

    pub fn xoffset(&self) -> i32 {
        self.header().xoffset
    }

    pub fn yoffset(&self) -> i32 {
        self.header().yoffset
    }

    pub fn has_alpha(&self) -> bool {
        let header = self.header();
        match header.bands {
            2 => matches!(
                header.interpretation,
                Interpretation::Bw | Interpretation::Grey16
            ),
            4 => header.interpretation != Interpretation::Cmyk,
            n => n > 4,
        }
    }

    pub fn filename(&self) -> Option<&str> {
        self.header().filename.as_deref()
    }

    fn header_value(&self, field: &str) -> Option<Value> {
        let h = self.header();
        let value = match field {
            "width" => Value::Int(h.width as i32),
            "height" => Value::Int(h.height as i32),
            "bands" => Value::Int(h.bands as i32),
            "format" => Value::from(h.format),
            "interpretation" => Value::from(h.interpretation),
            "xres" => Value::Double(h.xres),
            "yres" => Value::Double(h.yres),
            "xoffset" => Value::Int(h.xoffset),
            "yoffset" => Value::Int(h.yoffset),
            "filename" => Value::String(h.filename.clone()?),
            _ => return None,
        };
        Some(value)
    }

    /// Attach a metadata field, replacing any previous value.
    pub fn set(&self, field: &str, value: impl Into<Value>) -> Result<()> {
        if HEADER_FIELDS.contains(&field) {
            return Err(Error::ReadOnlyField(field.to_string()));
        }
        self.live_data()?
            .meta_mut()
            .insert(field.to_string(), value.into());
        Ok(())
    }

    /// Read any field, header or metadata.
    pub fn get(&self, field: &str) -> Result<Value> {
        let data = self.live_data()?;
        if let Some(value) = self.header_value(field) {
            return Ok(value);
        }
        data.meta()
            .get(field)
            .cloned()
            .ok_or_else(|| Error::MissingField(field.to_string()))
    }

    /// Type of a field, `None` if there is no such field.
    pub fn get_typeof(&self, field: &str) -> Option<ValueType> {
        self.get(field).ok().map(|v| v.value_type())
    }

    fn field_type_error(field: &str, expected: ValueType, found: &Value) -> Error {
        Error::FieldType {
            field: field.to_string(),
            expected,
            found: found.value_type(),
        }
    }

    /// An int field. Enum fields read as their integer value.
    pub fn get_int(&self, field: &str) -> Result<i32> {
        match self.get(field)? {
            Value::Int(i) => Ok(i),
            Value::Enum(e) => Ok(e.value),
            other => Err(Self::field_type_error(field, ValueType::Int, &other)),
        }
    }

    pub fn get_double(&self, field: &str) -> Result<f64> {
        match self.get(field)? {
            Value::Double(d) => Ok(d),
            other => Err(Self::field_type_error(field, ValueType::Double, &other)),
        }
    }

    pub fn get_string(&self, field: &str) -> Result<String> {
        match self.get(field)? {
            Value::String(s) => Ok(s),
            other => Err(Self::field_type_error(field, ValueType::String, &other)),
        }
    }

    pub fn get_blob(&self, field: &str) -> Result<Blob> {
        match self.get(field)? {
            Value::Blob(b) => Ok(b),
            other => Err(Self::field_type_error(field, ValueType::Blob, &other)),
        }
    }

    pub fn get_array_int(&self, field: &str) -> Result<Vec<i32>> {
        match self.get(field)? {
            Value::ArrayInt(a) => Ok(a),
            other => Err(Self::field_type_error(field, ValueType::ArrayInt, &other)),
        }
    }

    pub fn get_array_double(&self, field: &str) -> Result<Vec<f64>> {
        match self.get(field)? {
            Value::ArrayDouble(a) => Ok(a),
            other => Err(Self::field_type_error(field, ValueType::ArrayDouble, &other)),
        }
    }

    /// An enum field as its Rust type.
    pub fn get_enum<E: EnumType>(&self, field: &str) -> Result<E> {
        match self.get(field)? {
            Value::Enum(e) => e.get::<E>().ok_or_else(|| Error::FieldType {
                field: field.to_string(),
                expected: ValueType::Enum(E::spec()),
                found: ValueType::Enum(e.spec),
            }),
            other => Err(Self::field_type_error(field, ValueType::Enum(E::spec()), &other)),
        }
    }

    /// Drop a metadata field. Returns whether it existed.
    pub fn remove(&self, field: &str) -> bool {
        self.data().meta_mut().remove(field).is_some()
    }

    /// Names of every field: header fields first, then metadata sorted by name.
    pub fn get_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = HEADER_FIELDS
            .iter()
            .filter(|f| self.header_value(f).is_some())
            .map(|f| f.to_string())
            .collect();
        fields.extend(self.data().meta().keys().cloned());
        fields
    }

    /// An empty argument list, for the `options` parameter of methods.
    pub fn option<'a>() -> VOption<'a> {
        VOption::new()
    }

    /// Run an operation by name. See [`call`](crate::call::call).
    pub fn call(operation_name: &str, options: Option<VOption<'_>>) -> Result<()> {
        crate::call::call(operation_name, options)
    }

    /// Run an operation by name with an option string applied first.
    pub fn call_option_string(
        operation_name: &str,
        option_string: Option<&str>,
        options: Option<VOption<'_>>,
    ) -> Result<()> {
        crate::call::call_option_string(operation_name, option_string, options)
    }
}

impl PartialEq for VImage {
    /// Handles are equal when they share the underlying image.
    fn eq(&self, other: &Self) -> bool {
        self.0.ptr_eq(&other.0)
    }
}

impl fmt::Debug for VImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get_image() {
            Some(data) => write!(
                f,
                "VImage({}x{}x{} {}, refs={})",
                data.header.width,
                data.header.height,
                data.header.bands,
                data.header.format,
                self.ref_count()
            ),
            None => f.write_str("VImage(null)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::gradient;

    #[test]
    fn accessors_read_header() {
        let image = gradient(20, 10, 3);
        assert_eq!(image.width(), 20);
        assert_eq!(image.height(), 10);
        assert_eq!(image.bands(), 3);
        assert_eq!(image.format(), BandFormat::UChar);
        assert_eq!(image.interpretation(), Interpretation::Srgb);
        assert_eq!(image.xres(), 1.0);
        assert_eq!(image.xoffset(), 0);
        assert!(!image.has_alpha());
        assert_eq!(image.filename(), None);
    }

    #[test]
    fn alpha_detection_follows_band_count() {
        assert!(gradient(2, 2, 2).has_alpha());
        assert!(gradient(2, 2, 4).has_alpha());
        assert!(!gradient(2, 2, 1).has_alpha());
    }

    #[test]
    fn construction_rejects_wrong_sample_count() {
        let err = VImage::from_pixels(Header::new(2, 2, 1, BandFormat::UChar), vec![0.0; 3])
            .unwrap_err();
        assert!(matches!(err, Error::Construction(_)));
    }

    #[test]
    fn construction_clips_to_format() {
        let image =
            VImage::from_pixels(Header::new(2, 1, 1, BandFormat::UChar), vec![-5.0, 300.7])
                .unwrap();
        assert_eq!(image.pixels(), &[0.0, 255.0]);
    }

    #[test]
    fn metadata_round_trips_exactly() {
        let image = gradient(4, 4, 1);
        image.set("title", "dawn").unwrap();
        image.set("count", 7).unwrap();
        image.set("gamma", 2.2).unwrap();
        image.set("levels", vec![1.5, 2.5]).unwrap();
        image.set("icc", Blob::new(vec![1, 2, 3])).unwrap();

        assert_eq!(image.get_string("title").unwrap(), "dawn");
        assert_eq!(image.get_int("count").unwrap(), 7);
        assert_eq!(image.get_double("gamma").unwrap(), 2.2);
        assert_eq!(image.get_array_double("levels").unwrap(), vec![1.5, 2.5]);
        assert_eq!(image.get_blob("icc").unwrap().as_bytes(), &[1, 2, 3]);
        assert_eq!(image.get_typeof("gamma"), Some(ValueType::Double));
    }

    #[test]
    fn metadata_is_visible_through_every_handle() {
        let image = gradient(4, 4, 1);
        let alias = image.clone();
        alias.set("note", "shared").unwrap();
        assert_eq!(image.get_string("note").unwrap(), "shared");
    }

    #[test]
    fn missing_and_mistyped_fields_error() {
        let image = gradient(4, 4, 1);
        image.set("count", 7).unwrap();
        assert!(matches!(
            image.get_double("count").unwrap_err(),
            Error::FieldType {
                expected: ValueType::Double,
                found: ValueType::Int,
                ..
            }
        ));
        assert!(matches!(
            image.get_int("nothing").unwrap_err(),
            Error::MissingField(_)
        ));
        assert_eq!(image.get_typeof("nothing"), None);
    }

    #[test]
    fn header_fields_are_readable_and_read_only() {
        let image = gradient(6, 5, 3);
        assert_eq!(image.get_int("width").unwrap(), 6);
        assert_eq!(image.get_int("bands").unwrap(), 3);
        assert_eq!(
            image.get_enum::<BandFormat>("format").unwrap(),
            BandFormat::UChar
        );
        assert!(matches!(
            image.set("width", 10).unwrap_err(),
            Error::ReadOnlyField(_)
        ));
    }

    #[test]
    fn remove_and_list_fields() {
        let image = gradient(2, 2, 1);
        image.set("b-field", 1).unwrap();
        image.set("a-field", 2).unwrap();
        let fields = image.get_fields();
        assert_eq!(fields.first().map(String::as_str), Some("width"));
        assert!(!fields.contains(&"filename".to_string()));
        assert_eq!(&fields[fields.len() - 2..], ["a-field", "b-field"]);

        assert!(image.remove("a-field"));
        assert!(!image.remove("a-field"));
    }

    #[test]
    fn derive_copies_metadata() {
        let image = gradient(2, 2, 1);
        image.set("author", "me").unwrap();
        let derived = image
            .derive(image.header().clone(), image.pixels().to_vec())
            .unwrap();
        assert_eq!(derived.get_string("author").unwrap(), "me");
        derived.set("author", "you").unwrap();
        assert_eq!(image.get_string("author").unwrap(), "me");
    }

    #[test]
    fn equality_is_identity() {
        let a = gradient(2, 2, 1);
        let b = gradient(2, 2, 1);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(VImage::default(), VImage::default());
    }

    #[test]
    #[should_panic(expected = "null VImage")]
    fn accessor_on_null_panics() {
        VImage::default().width();
    }

    #[test]
    fn metadata_on_null_is_an_error() {
        let null = VImage::default();
        assert!(matches!(null.get("width"), Err(Error::NullImage)));
        assert!(matches!(null.get_int("anything"), Err(Error::NullImage)));
        assert!(matches!(null.set("title", "x"), Err(Error::NullImage)));
        let header = Header::new(1, 1, 1, BandFormat::UChar);
        assert!(matches!(null.derive(header, vec![0.0]), Err(Error::NullImage)));
        assert_eq!(null.get_typeof("width"), None);
    }
}
