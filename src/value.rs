//! Dynamically-typed argument and metadata values.
//!
//! [`Value`] is the one currency between callers and operations: argument
//! lists hold them, operation instances store them per property, and image
//! metadata fields are values too. [`ValueType`] is the matching type tag an
//! operation declares for each of its properties.
//!
//! When an input is applied to a property, [`Value::coerce`] bridges the few
//! lossless gaps (an `Int` where a `Double` is declared, a nickname string
//! where an enum is declared, a scalar where an array is declared). Anything
//! else is a type mismatch and the invocation fails.

use crate::connection::{VSource, VTarget};
use crate::enums::{EnumSpec, EnumValue};
use crate::image::VImage;
use crate::interpolate::VInterpolate;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Type tag for a [`Value`], as declared by an operation property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Bool,
    Int,
    Double,
    String,
    Enum(EnumSpec),
    ArrayInt,
    ArrayDouble,
    Image,
    ArrayImage,
    Blob,
    Interpolate,
    Source,
    Target,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Bool => f.write_str("bool"),
            ValueType::Int => f.write_str("int"),
            ValueType::Double => f.write_str("double"),
            ValueType::String => f.write_str("string"),
            ValueType::Enum(spec) => write!(f, "enum {}", spec.name),
            ValueType::ArrayInt => f.write_str("array of int"),
            ValueType::ArrayDouble => f.write_str("array of double"),
            ValueType::Image => f.write_str("image"),
            ValueType::ArrayImage => f.write_str("array of image"),
            ValueType::Blob => f.write_str("blob"),
            ValueType::Interpolate => f.write_str("interpolate"),
            ValueType::Source => f.write_str("source"),
            ValueType::Target => f.write_str("target"),
        }
    }
}

/// An immutable, reference-counted byte area.
#[derive(Clone, PartialEq, Eq)]
pub struct Blob(Arc<[u8]>);

impl Blob {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Arc::from(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl Default for Blob {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Deref for Blob {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Blob {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for Blob {
    fn from(bytes: &[u8]) -> Self {
        Self(Arc::from(bytes))
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blob({} bytes)", self.0.len())
    }
}

/// A tagged, dynamically-typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i32),
    Double(f64),
    String(String),
    Enum(EnumValue),
    ArrayInt(Vec<i32>),
    ArrayDouble(Vec<f64>),
    Image(VImage),
    ArrayImage(Vec<VImage>),
    Blob(Blob),
    Interpolate(VInterpolate),
    Source(VSource),
    Target(VTarget),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Double(_) => ValueType::Double,
            Value::String(_) => ValueType::String,
            Value::Enum(e) => ValueType::Enum(e.spec),
            Value::ArrayInt(_) => ValueType::ArrayInt,
            Value::ArrayDouble(_) => ValueType::ArrayDouble,
            Value::Image(_) => ValueType::Image,
            Value::ArrayImage(_) => ValueType::ArrayImage,
            Value::Blob(_) => ValueType::Blob,
            Value::Interpolate(_) => ValueType::Interpolate,
            Value::Source(_) => ValueType::Source,
            Value::Target(_) => ValueType::Target,
        }
    }

    /// Convert to the declared type if that can be done without loss.
    ///
    /// Returns `None` on a mismatch. An enum given by integer or nickname
    /// must name a member of the declared enum.
    pub fn coerce(self, to: ValueType) -> Option<Value> {
        if self.value_type() == to {
            return Some(self);
        }
        match (self, to) {
            (Value::Int(i), ValueType::Double) => Some(Value::Double(i as f64)),
            (Value::Int(i), ValueType::Enum(spec)) if spec.contains(i) => {
                Some(Value::Enum(EnumValue { spec, value: i }))
            }
            (Value::String(s), ValueType::Enum(spec)) => spec
                .value_of(&s)
                .map(|value| Value::Enum(EnumValue { spec, value })),
            (Value::Int(i), ValueType::ArrayInt) => Some(Value::ArrayInt(vec![i])),
            (Value::Int(i), ValueType::ArrayDouble) => Some(Value::ArrayDouble(vec![i as f64])),
            (Value::Double(d), ValueType::ArrayDouble) => Some(Value::ArrayDouble(vec![d])),
            (Value::ArrayInt(a), ValueType::ArrayDouble) => Some(Value::ArrayDouble(
                a.into_iter().map(f64::from).collect(),
            )),
            (Value::Image(image), ValueType::ArrayImage) => Some(Value::ArrayImage(vec![image])),
            _ => None,
        }
    }

    /// Numeric scalar view, used for range checks.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Parse command-line or option-string text as a value of type `ty`.
    ///
    /// Images, sources and targets are named by filename; arrays are
    /// separated by spaces or commas.
    pub fn parse(ty: ValueType, text: &str) -> std::result::Result<Value, String> {
        let text = text.trim();
        match ty {
            ValueType::Bool => match text.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(Value::Bool(true)),
                "false" | "no" | "off" | "0" => Ok(Value::Bool(false)),
                _ => Err(format!("\"{text}\" is not a boolean")),
            },
            ValueType::Int => text
                .parse::<i32>()
                .map(Value::Int)
                .map_err(|e| format!("\"{text}\" is not an int: {e}")),
            ValueType::Double => text
                .parse::<f64>()
                .map(Value::Double)
                .map_err(|e| format!("\"{text}\" is not a number: {e}")),
            ValueType::String => Ok(Value::String(text.to_string())),
            ValueType::Enum(spec) => {
                if let Some(value) = spec.value_of(text) {
                    return Ok(Value::Enum(EnumValue { spec, value }));
                }
                match text.parse::<i32>() {
                    Ok(value) if spec.contains(value) => Ok(Value::Enum(EnumValue { spec, value })),
                    _ => Err(format!(
                        "\"{text}\" is not one of {} ({})",
                        spec.name,
                        spec.nicks.join(", ")
                    )),
                }
            }
            ValueType::ArrayInt => split_list(text)
                .map(|s| s.parse::<i32>().map_err(|e| format!("\"{s}\": {e}")))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Value::ArrayInt),
            ValueType::ArrayDouble => split_list(text)
                .map(|s| s.parse::<f64>().map_err(|e| format!("\"{s}\": {e}")))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Value::ArrayDouble),
            ValueType::Image => VImage::new_from_file(text, None)
                .map(Value::Image)
                .map_err(|e| e.to_string()),
            ValueType::ArrayImage => split_list(text)
                .map(|s| VImage::new_from_file(s, None).map_err(|e| e.to_string()))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Value::ArrayImage),
            ValueType::Blob => std::fs::read(text)
                .map(|bytes| Value::Blob(Blob::new(bytes)))
                .map_err(|e| format!("{text}: {e}")),
            ValueType::Interpolate => VInterpolate::new_from_name(text)
                .map(Value::Interpolate)
                .map_err(|e| e.to_string()),
            ValueType::Source => VSource::new_from_file(text)
                .map(Value::Source)
                .map_err(|e| e.to_string()),
            ValueType::Target => VTarget::new_to_file(text)
                .map(Value::Target)
                .map_err(|e| e.to_string()),
        }
    }
}

fn split_list(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join<T: fmt::Display>(items: &[T]) -> String {
            items
                .iter()
                .map(|i| i.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        }

        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Double(d) => write!(f, "{d}"),
            Value::String(s) => f.write_str(s),
            Value::Enum(e) => write!(f, "{e}"),
            Value::ArrayInt(a) => f.write_str(&join(a)),
            Value::ArrayDouble(a) => f.write_str(&join(a)),
            Value::Image(image) if image.is_null() => f.write_str("<null image>"),
            Value::Image(image) => write!(
                f,
                "<image {}x{} {} bands, {}>",
                image.width(),
                image.height(),
                image.bands(),
                image.format()
            ),
            Value::ArrayImage(images) => write!(f, "<{} images>", images.len()),
            Value::Blob(blob) => write!(f, "<{} bytes>", blob.len()),
            Value::Interpolate(i) => write!(f, "<interpolate {}>", i.nickname()),
            Value::Source(_) => f.write_str("<source>"),
            Value::Target(_) => f.write_str("<target>"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<i32>> for Value {
    fn from(v: Vec<i32>) -> Self {
        Value::ArrayInt(v)
    }
}

impl From<&[i32]> for Value {
    fn from(v: &[i32]) -> Self {
        Value::ArrayInt(v.to_vec())
    }
}

impl<const N: usize> From<[i32; N]> for Value {
    fn from(v: [i32; N]) -> Self {
        Value::ArrayInt(v.to_vec())
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::ArrayDouble(v)
    }
}

impl From<&[f64]> for Value {
    fn from(v: &[f64]) -> Self {
        Value::ArrayDouble(v.to_vec())
    }
}

impl<const N: usize> From<[f64; N]> for Value {
    fn from(v: [f64; N]) -> Self {
        Value::ArrayDouble(v.to_vec())
    }
}

impl From<VImage> for Value {
    fn from(v: VImage) -> Self {
        Value::Image(v)
    }
}

impl From<&VImage> for Value {
    fn from(v: &VImage) -> Self {
        Value::Image(v.clone())
    }
}

impl From<Vec<VImage>> for Value {
    fn from(v: Vec<VImage>) -> Self {
        Value::ArrayImage(v)
    }
}

impl From<&[VImage]> for Value {
    fn from(v: &[VImage]) -> Self {
        Value::ArrayImage(v.to_vec())
    }
}

impl From<Blob> for Value {
    fn from(v: Blob) -> Self {
        Value::Blob(v)
    }
}

impl From<VInterpolate> for Value {
    fn from(v: VInterpolate) -> Self {
        Value::Interpolate(v)
    }
}

impl From<&VInterpolate> for Value {
    fn from(v: &VInterpolate) -> Self {
        Value::Interpolate(v.clone())
    }
}

impl From<VSource> for Value {
    fn from(v: VSource) -> Self {
        Value::Source(v)
    }
}

impl From<&VSource> for Value {
    fn from(v: &VSource) -> Self {
        Value::Source(v.clone())
    }
}

impl From<VTarget> for Value {
    fn from(v: VTarget) -> Self {
        Value::Target(v)
    }
}

impl From<&VTarget> for Value {
    fn from(v: &VTarget) -> Self {
        Value::Target(v.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::{Direction, EnumType};

    #[test]
    fn int_widens_to_double_and_arrays() {
        assert_eq!(Value::Int(3).coerce(ValueType::Double), Some(Value::Double(3.0)));
        assert_eq!(
            Value::Int(3).coerce(ValueType::ArrayDouble),
            Some(Value::ArrayDouble(vec![3.0]))
        );
        assert_eq!(
            Value::ArrayInt(vec![1, 2]).coerce(ValueType::ArrayDouble),
            Some(Value::ArrayDouble(vec![1.0, 2.0]))
        );
    }

    #[test]
    fn lossy_or_unrelated_coercions_are_refused() {
        assert_eq!(Value::Double(1.5).coerce(ValueType::Int), None);
        assert_eq!(Value::String("3".into()).coerce(ValueType::Int), None);
        assert_eq!(Value::Bool(true).coerce(ValueType::Double), None);
        assert_eq!(Value::Double(1.0).coerce(ValueType::Image), None);
    }

    #[test]
    fn enum_coercion_validates_membership() {
        let ty = ValueType::Enum(Direction::spec());
        assert_eq!(
            Value::String("vertical".into()).coerce(ty),
            Some(Value::from(Direction::Vertical))
        );
        assert_eq!(Value::Int(0).coerce(ty), Some(Value::from(Direction::Horizontal)));
        assert_eq!(Value::Int(9).coerce(ty), None);
        assert_eq!(Value::String("sideways".into()).coerce(ty), None);
    }

    #[test]
    fn parse_scalars_and_arrays() {
        assert_eq!(Value::parse(ValueType::Bool, "yes"), Ok(Value::Bool(true)));
        assert_eq!(Value::parse(ValueType::Int, " 42 "), Ok(Value::Int(42)));
        assert_eq!(Value::parse(ValueType::Double, "0.5"), Ok(Value::Double(0.5)));
        assert_eq!(
            Value::parse(ValueType::ArrayDouble, "1, 2 3"),
            Ok(Value::ArrayDouble(vec![1.0, 2.0, 3.0]))
        );
        assert!(Value::parse(ValueType::Int, "4.5").is_err());
        assert!(Value::parse(ValueType::Bool, "maybe").is_err());
    }

    #[test]
    fn parse_enum_by_nick_or_number() {
        let ty = ValueType::Enum(Direction::spec());
        assert_eq!(Value::parse(ty, "vertical"), Ok(Value::from(Direction::Vertical)));
        assert_eq!(Value::parse(ty, "0"), Ok(Value::from(Direction::Horizontal)));
        let err = Value::parse(ty, "diagonal").unwrap_err();
        assert!(err.contains("horizontal, vertical"), "{err}");
    }

    #[test]
    fn blob_is_shared_not_copied() {
        let blob = Blob::new(vec![1, 2, 3]);
        let alias = blob.clone();
        assert_eq!(alias.as_bytes(), &[1, 2, 3]);
        assert_eq!(blob, alias);
        assert_eq!(Blob::default().len(), 0);
    }

    #[test]
    fn display_arrays_space_separated() {
        assert_eq!(Value::ArrayDouble(vec![1.0, 2.5]).to_string(), "1 2.5");
        assert_eq!(Value::from(Direction::Horizontal).to_string(), "horizontal");
    }
}
