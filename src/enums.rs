//! Enumerated argument types.
//!
//! Operations declare enum-typed properties by [`EnumSpec`]; callers pass
//! either the Rust enum, its nickname (`"horizontal"`), or its integer value.
//! Every enum here implements [`EnumType`] so the three forms convert into
//! each other.

use std::fmt;

/// A closed set of named values usable as an operation argument.
///
/// Values are numbered contiguously from zero in declaration order.
pub trait EnumType: Copy + Sized + 'static {
    const TYPE_NAME: &'static str;
    const NICKS: &'static [&'static str];

    fn to_i32(self) -> i32;
    fn from_i32(value: i32) -> Option<Self>;

    fn nick(self) -> &'static str {
        Self::NICKS[self.to_i32() as usize]
    }

    fn from_nick(nick: &str) -> Option<Self> {
        Self::NICKS
            .iter()
            .position(|n| n.eq_ignore_ascii_case(nick))
            .and_then(|i| Self::from_i32(i as i32))
    }

    fn spec() -> EnumSpec {
        EnumSpec {
            name: Self::TYPE_NAME,
            nicks: Self::NICKS,
        }
    }
}

/// Type-level description of an enum, as stored in an argument declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumSpec {
    pub name: &'static str,
    pub nicks: &'static [&'static str],
}

impl EnumSpec {
    pub fn contains(&self, value: i32) -> bool {
        value >= 0 && (value as usize) < self.nicks.len()
    }

    pub fn value_of(&self, nick: &str) -> Option<i32> {
        self.nicks
            .iter()
            .position(|n| n.eq_ignore_ascii_case(nick))
            .map(|i| i as i32)
    }
}

/// A concrete enum value carried in a [`Value`](crate::Value).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumValue {
    pub spec: EnumSpec,
    pub value: i32,
}

impl EnumValue {
    pub fn of<E: EnumType>(e: E) -> Self {
        Self {
            spec: E::spec(),
            value: e.to_i32(),
        }
    }

    /// The nickname, `None` if `value` is outside the enum.
    pub fn nick(&self) -> Option<&'static str> {
        usize::try_from(self.value)
            .ok()
            .and_then(|i| self.spec.nicks.get(i))
            .copied()
    }

    /// Convert back to the Rust enum, `None` if the value belongs to another enum type.
    pub fn get<E: EnumType>(&self) -> Option<E> {
        if self.spec.name != E::TYPE_NAME {
            return None;
        }
        E::from_i32(self.value)
    }
}

impl fmt::Display for EnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.nick() {
            Some(nick) => f.write_str(nick),
            None => write!(f, "{}", self.value),
        }
    }
}

macro_rules! enum_type {
    (
        $(#[$meta:meta])*
        $name:ident, $type_name:literal {
            $( $(#[$vmeta:meta])* $variant:ident = $nick:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl EnumType for $name {
            const TYPE_NAME: &'static str = $type_name;
            const NICKS: &'static [&'static str] = &[$($nick),+];

            fn to_i32(self) -> i32 {
                self as i32
            }

            fn from_i32(value: i32) -> Option<Self> {
                const ALL: &[$name] = &[$($name::$variant),+];
                usize::try_from(value).ok().and_then(|i| ALL.get(i).copied())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.nick())
            }
        }

        impl From<$name> for crate::value::Value {
            fn from(e: $name) -> Self {
                crate::value::Value::Enum(EnumValue::of(e))
            }
        }
    };
}

enum_type! {
    /// Numeric type of each band element.
    BandFormat, "BandFormat" {
        UChar = "uchar",
        Char = "char",
        UShort = "ushort",
        Short = "short",
        UInt = "uint",
        Int = "int",
        Float = "float",
        Double = "double",
    }
}

impl BandFormat {
    /// Size of one band element in bytes.
    pub fn size_of(self) -> usize {
        match self {
            BandFormat::UChar | BandFormat::Char => 1,
            BandFormat::UShort | BandFormat::Short => 2,
            BandFormat::UInt | BandFormat::Int | BandFormat::Float => 4,
            BandFormat::Double => 8,
        }
    }

    pub fn is_int(self) -> bool {
        !self.is_float()
    }

    pub fn is_float(self) -> bool {
        matches!(self, BandFormat::Float | BandFormat::Double)
    }

    pub fn is_unsigned(self) -> bool {
        matches!(self, BandFormat::UChar | BandFormat::UShort | BandFormat::UInt)
    }

    /// Representable range of the format.
    pub fn range(self) -> (f64, f64) {
        match self {
            BandFormat::UChar => (0.0, u8::MAX as f64),
            BandFormat::Char => (i8::MIN as f64, i8::MAX as f64),
            BandFormat::UShort => (0.0, u16::MAX as f64),
            BandFormat::Short => (i16::MIN as f64, i16::MAX as f64),
            BandFormat::UInt => (0.0, u32::MAX as f64),
            BandFormat::Int => (i32::MIN as f64, i32::MAX as f64),
            BandFormat::Float => (f32::MIN as f64, f32::MAX as f64),
            BandFormat::Double => (f64::MIN, f64::MAX),
        }
    }

    /// Bring a sample into this format: integer formats round to nearest
    /// and clamp, float rounds through `f32`.
    pub fn clip(self, v: f64) -> f64 {
        match self {
            BandFormat::Float => v as f32 as f64,
            BandFormat::Double => v,
            _ => {
                let (lo, hi) = self.range();
                if v.is_nan() { 0.0 } else { v.round().clamp(lo, hi) }
            }
        }
    }

    /// Format able to hold values of both operands.
    pub fn common(self, other: BandFormat) -> BandFormat {
        use BandFormat::*;
        if self == other {
            return self;
        }
        if self == Double || other == Double {
            return Double;
        }
        if self == Float || other == Float {
            return Float;
        }
        let signed = !self.is_unsigned() || !other.is_unsigned();
        let size = self.size_of().max(other.size_of());
        match (signed, size) {
            (false, 1) => UChar,
            (false, 2) => UShort,
            (false, _) => UInt,
            (true, 1) => Short,
            (true, 2) => Int,
            (true, _) => Int,
        }
    }

    /// Result format of `+` and `*`: one step wider so sums don't wrap.
    pub fn widened(self) -> BandFormat {
        use BandFormat::*;
        match self {
            UChar => UShort,
            Char => Short,
            UShort => UInt,
            Short => Int,
            UInt => UInt,
            Int => Int,
            Float => Float,
            Double => Double,
        }
    }

    /// Result format of `-`: always signed.
    pub fn signed_widened(self) -> BandFormat {
        use BandFormat::*;
        match self {
            UChar | Char => Short,
            UShort | Short | UInt | Int => Int,
            Float => Float,
            Double => Double,
        }
    }

    /// Float result format of maths ops: `Double` stays `Double`.
    pub fn float_of(self) -> BandFormat {
        if self == BandFormat::Double {
            BandFormat::Double
        } else {
            BandFormat::Float
        }
    }

    /// Integer format used when a float image meets a bitwise operation.
    pub fn int_of(self) -> BandFormat {
        if self.is_float() { BandFormat::Int } else { self }
    }
}

enum_type! {
    /// How band values should be understood.
    Interpretation, "Interpretation" {
        Multiband = "multiband",
        Bw = "b-w",
        Histogram = "histogram",
        Xyz = "xyz",
        Lab = "lab",
        Cmyk = "cmyk",
        Rgb = "rgb",
        Srgb = "srgb",
        Rgb16 = "rgb16",
        Grey16 = "grey16",
        Matrix = "matrix",
        Scrgb = "scrgb",
        Fourier = "fourier",
    }
}

enum_type! {
    Direction, "Direction" {
        Horizontal = "horizontal",
        Vertical = "vertical",
    }
}

enum_type! {
    Angle, "Angle" {
        D0 = "d0",
        D90 = "d90",
        D180 = "d180",
        D270 = "d270",
    }
}

enum_type! {
    OperationMath, "OperationMath" {
        Sin = "sin",
        Cos = "cos",
        Tan = "tan",
        Asin = "asin",
        Acos = "acos",
        Atan = "atan",
        Log = "log",
        Log10 = "log10",
        Exp = "exp",
        Exp10 = "exp10",
    }
}

enum_type! {
    OperationMath2, "OperationMath2" {
        Pow = "pow",
        Wop = "wop",
        Atan2 = "atan2",
    }
}

enum_type! {
    OperationRelational, "OperationRelational" {
        Equal = "equal",
        NotEq = "noteq",
        Less = "less",
        LessEq = "lesseq",
        More = "more",
        MoreEq = "moreeq",
    }
}

enum_type! {
    OperationBoolean, "OperationBoolean" {
        And = "and",
        Or = "or",
        Eor = "eor",
        LShift = "lshift",
        RShift = "rshift",
    }
}

enum_type! {
    OperationRound, "OperationRound" {
        Rint = "rint",
        Ceil = "ceil",
        Floor = "floor",
    }
}

enum_type! {
    /// Resampling kernel for `resize`.
    Kernel, "Kernel" {
        Nearest = "nearest",
        Linear = "linear",
    }
}

enum_type! {
    /// How `embed` fills the new border.
    Extend, "Extend" {
        Black = "black",
        Copy = "copy",
        Repeat = "repeat",
        Mirror = "mirror",
        White = "white",
        Background = "background",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nick_round_trip() {
        assert_eq!(Direction::Vertical.nick(), "vertical");
        assert_eq!(Direction::from_nick("HORIZONTAL"), Some(Direction::Horizontal));
        assert_eq!(Angle::from_i32(2), Some(Angle::D180));
        assert_eq!(Angle::from_i32(4), None);
        assert_eq!(Angle::from_i32(-1), None);
    }

    #[test]
    fn enum_value_rejects_other_type() {
        let v = EnumValue::of(Direction::Vertical);
        assert_eq!(v.get::<Direction>(), Some(Direction::Vertical));
        assert_eq!(v.get::<Angle>(), None);
        assert_eq!(v.to_string(), "vertical");
    }

    #[test]
    fn clip_rounds_and_clamps() {
        assert_eq!(BandFormat::UChar.clip(300.0), 255.0);
        assert_eq!(BandFormat::UChar.clip(-4.0), 0.0);
        assert_eq!(BandFormat::UChar.clip(1.6), 2.0);
        assert_eq!(BandFormat::Char.clip(-200.0), -128.0);
        assert_eq!(BandFormat::Double.clip(1.25), 1.25);
    }

    #[test]
    fn common_format_widens() {
        assert_eq!(BandFormat::UChar.common(BandFormat::UChar), BandFormat::UChar);
        assert_eq!(BandFormat::UChar.common(BandFormat::Char), BandFormat::Short);
        assert_eq!(BandFormat::UShort.common(BandFormat::Float), BandFormat::Float);
        assert_eq!(BandFormat::Int.common(BandFormat::Double), BandFormat::Double);
        assert_eq!(BandFormat::UChar.widened(), BandFormat::UShort);
        assert_eq!(BandFormat::UChar.signed_widened(), BandFormat::Short);
    }

    #[test]
    fn out_of_range_enum_value_displays_its_number() {
        let stray = EnumValue {
            spec: Direction::spec(),
            value: 9,
        };
        assert_eq!(stray.nick(), None);
        assert_eq!(stray.to_string(), "9");
        assert_eq!(EnumValue { value: -1, ..stray }.to_string(), "-1");
        assert_eq!(EnumValue::of(Direction::Vertical).nick(), Some("vertical"));
    }
}
