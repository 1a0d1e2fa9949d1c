use std::error;
use std::fmt;

/// The kind of value held by a `MetricValue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Signed 32-bit integer.
    Int,
    /// Unsigned 32-bit integer.
    UInt,
    /// Unsigned 64-bit integer.
    ULong,
    /// Double precision float.
    Double,
    /// Free-form text.
    Text,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match *self {
            ValueKind::Int => "int",
            ValueKind::UInt => "uint",
            ValueKind::ULong => "ulong",
            ValueKind::Double => "double",
            ValueKind::Text => "text",
        };
        f.write_str(name)
    }
}

/// A typed metric value.
///
/// The kind is fixed when the value is built and every consumer matches on
/// it exhaustively. There is no implicit coercion between kinds: asking an
/// `Int` for a `u64` is a `TypeMismatch`, not a widening.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    /// See `ValueKind::Int`.
    Int(i32),
    /// See `ValueKind::UInt`.
    UInt(u32),
    /// See `ValueKind::ULong`.
    ULong(u64),
    /// See `ValueKind::Double`.
    Double(f64),
    /// See `ValueKind::Text`.
    Text(String),
}

/// Errors from typed access to a `MetricValue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The held kind is not the requested kind.
    TypeMismatch {
        /// The kind the caller asked for.
        expected: ValueKind,
        /// The kind actually held.
        found: ValueKind,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {}, found {}", expected, found)
            }
        }
    }
}

impl error::Error for Error {}

/// Rust types a `MetricValue` can be read back into.
pub trait Primitive: Sized {
    /// The `ValueKind` this type corresponds to.
    const KIND: ValueKind;

    /// Extract `Self` from `value` when the kinds agree.
    fn extract(value: &MetricValue) -> Option<Self>;
}

macro_rules! primitive {
    ($t:ty, $variant:ident) => {
        impl Primitive for $t {
            const KIND: ValueKind = ValueKind::$variant;

            fn extract(value: &MetricValue) -> Option<$t> {
                match *value {
                    MetricValue::$variant(ref v) => Some(v.clone()),
                    _ => None,
                }
            }
        }

        impl From<$t> for MetricValue {
            fn from(v: $t) -> MetricValue {
                MetricValue::$variant(v)
            }
        }
    };
}

primitive!(i32, Int);
primitive!(u32, UInt);
primitive!(u64, ULong);
primitive!(f64, Double);
primitive!(String, Text);

impl<'a> From<&'a str> for MetricValue {
    fn from(v: &'a str) -> MetricValue {
        MetricValue::Text(v.to_string())
    }
}

impl MetricValue {
    /// The active kind.
    pub fn kind(&self) -> ValueKind {
        match *self {
            MetricValue::Int(_) => ValueKind::Int,
            MetricValue::UInt(_) => ValueKind::UInt,
            MetricValue::ULong(_) => ValueKind::ULong,
            MetricValue::Double(_) => ValueKind::Double,
            MetricValue::Text(_) => ValueKind::Text,
        }
    }

    /// Read the held value as `T`.
    ///
    /// Fails with `Error::TypeMismatch` if `T` is not the held kind.
    pub fn get<T: Primitive>(&self) -> Result<T, Error> {
        T::extract(self).ok_or(Error::TypeMismatch {
            expected: T::KIND,
            found: self.kind(),
        })
    }

    /// True for every kind except `Text`.
    pub fn is_numeric(&self) -> bool {
        match *self {
            MetricValue::Text(_) => false,
            _ => true,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            MetricValue::Int(v) => write!(f, "{}", v),
            MetricValue::UInt(v) => write!(f, "{}", v),
            MetricValue::ULong(v) => write!(f, "{}", v),
            MetricValue::Double(v) => write!(f, "{}", v),
            MetricValue::Text(ref v) => f.write_str(v),
        }
    }
}
