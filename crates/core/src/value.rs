//! Attribute values
//!
//! `Value` is the only value model an entry attribute can carry. Equality is
//! what template matching uses: there is no type coercion and floats follow
//! IEEE-754 equality. The index keys its value nodes by [`ValueKey`] instead,
//! because a map needs a reflexive equality and IEEE-754 is not one.
//!
//! ## Equality Rules
//!
//! - Different variants are NEVER equal
//! - `Int(1)` != `Float(1.0)`
//! - `String("abc")` != `Bytes([97, 98, 99])`
//! - Float uses IEEE-754 equality: `NaN != NaN`, `-0.0 == 0.0`
//!
//! `Null` marks a declared attribute without a value. A template attribute
//! that is `Null` is a wildcard; a stored entry whose attribute is `Null` is
//! indexed under the `Null` key so wildcard queries still reach it.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Attribute value of an entry
///
/// The derived `PartialEq` compares variant first, then payload, which gives
/// exactly the rules above (f64 `==` is IEEE-754).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Declared attribute without a value
    Null,
    /// Boolean
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit float
    Float(f64),
    /// UTF-8 text
    String(String),
    /// Raw bytes, never equal to a `String`
    Bytes(Vec<u8>),
    /// Sequence of values
    Array(Vec<Value>),
    /// Map of values, ordered by key so equal maps hash equal
    Object(BTreeMap<String, Value>),
}

macro_rules! accessor {
    ($(#[$doc:meta])* $name:ident, $variant:ident, $ty:ty, |$v:ident| $out:expr) => {
        $(#[$doc])*
        pub fn $name(&self) -> Option<$ty> {
            match self {
                Value::$variant($v) => Some($out),
                _ => None,
            }
        }
    };
}

impl Value {
    /// Variant name, for logs and error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::Bytes(_) => "Bytes",
            Value::Array(_) => "Array",
            Value::Object(_) => "Object",
        }
    }

    /// True for [`Value::Null`]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    accessor!(
        /// Payload of a `Bool`
        as_bool, Bool, bool, |b| *b
    );
    accessor!(
        /// Payload of an `Int`
        as_int, Int, i64, |i| *i
    );
    accessor!(
        /// Payload of a `Float`
        as_float, Float, f64, |x| *x
    );
    accessor!(
        /// Payload of a `String`
        as_str, String, &str, |s| s.as_str()
    );
    accessor!(
        /// Payload of a `Bytes`
        as_bytes, Bytes, &[u8], |b| b.as_slice()
    );
    accessor!(
        /// Payload of an `Array`
        as_array, Array, &[Value], |a| a.as_slice()
    );
}

/// Bits of `x` with every NaN folded into one pattern and `-0.0` into `0.0`
fn canonical_bits(x: f64) -> u64 {
    if x.is_nan() {
        f64::NAN.to_bits()
    } else if x == 0.0 {
        0
    } else {
        x.to_bits()
    }
}

// Consistent with both `PartialEq for Value` and `Eq for ValueKey`: values
// equal under either relation hash the same.
impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(x) => canonical_bits(*x).hash(state),
            Value::String(s) => s.hash(state),
            Value::Bytes(b) => b.hash(state),
            Value::Array(items) => items.hash(state),
            Value::Object(fields) => fields.iter().for_each(|(k, v)| {
                k.hash(state);
                v.hash(state);
            }),
        }
    }
}

/// A [`Value`] usable as a hash-map key
///
/// Same as `Value` equality except that floats compare by canonical bits:
/// every NaN is one key and both zeroes are one key. A NaN attribute thus
/// lands in a single value node that compaction can find again, while
/// [`correlates`](crate::correlates) still never matches a NaN template.
#[derive(Debug, Clone)]
pub struct ValueKey(Value);

impl ValueKey {
    /// Key for `value`
    pub fn new(value: impl Into<Value>) -> Self {
        Self(value.into())
    }

    /// The wrapped value
    pub fn value(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for ValueKey {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

fn key_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Float(x), Value::Float(y)) => canonical_bits(*x) == canonical_bits(*y),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| key_eq(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .zip(ys)
                    .all(|((kx, vx), (ky, vy))| kx == ky && key_eq(vx, vy))
        }
        _ => a == b,
    }
}

impl PartialEq for ValueKey {
    fn eq(&self, other: &Self) -> bool {
        key_eq(&self.0, &other.0)
    }
}

impl Eq for ValueKey {}

impl Hash for ValueKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl fmt::Display for ValueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => fmt::Display::fmt(b, f),
            Value::Int(i) => fmt::Display::fmt(i, f),
            Value::Float(x) => fmt::Display::fmt(x, f),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Array(items) => write!(f, "[{} items]", items.len()),
            Value::Object(fields) => write!(f, "{{{} fields}}", fields.len()),
        }
    }
}

macro_rules! from_impl {
    ($($ty:ty => |$v:ident| $out:expr;)*) => {
        $(
            impl From<$ty> for Value {
                fn from($v: $ty) -> Self {
                    $out
                }
            }
        )*
    };
}

from_impl! {
    bool => |b| Value::Bool(b);
    i64 => |i| Value::Int(i);
    i32 => |i| Value::Int(i64::from(i));
    u32 => |i| Value::Int(i64::from(i));
    f64 => |x| Value::Float(x);
    &str => |s| Value::String(s.to_owned());
    String => |s| Value::String(s);
    Vec<u8> => |b| Value::Bytes(b);
    Vec<Value> => |items| Value::Array(items);
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
