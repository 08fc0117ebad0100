//! Structured values fed into the converter.
//!
//! [`Value`] mirrors `serde_json::Value` with one extra variant for raw byte
//! sequences. Split 64-bit integers travel as plain three-key objects, the
//! way wire-level `Long` encodings arrive from upstream decoders, and are
//! recognized by [`Value::shape`].

use bytes::Bytes;
use serde_json::Number;
use std::collections::BTreeMap;
use std::fmt;

/// Key holding the low 32-bit word of a split integer
pub const LOW_KEY: &str = "low";
/// Key holding the high 32-bit word of a split integer
pub const HIGH_KEY: &str = "high";
/// Key holding the signedness flag of a split integer
pub const UNSIGNED_KEY: &str = "unsigned";

/// Type tag of a Node.js `Buffer` serialized with `JSON.stringify`
const NODE_BUFFER_TYPE: &str = "Buffer";

/// A decoded event value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Null or absent value
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Integer or floating point number
    Number(Number),
    /// UTF-8 string
    String(String),
    /// Raw bytes with no implied encoding
    Bytes(Bytes),
    /// Ordered sequence
    Array(Vec<Value>),
    /// String-keyed mapping; key order carries no meaning
    Object(BTreeMap<String, Value>),
}

/// What a single node looks like to the converter.
///
/// Variants are listed in dispatch priority order: a three-key object that
/// reads as a split integer is never treated as a plain mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape<'a> {
    /// Object with exactly the `low`/`high`/`unsigned` keys and valid types
    SplitInteger(SplitInteger),
    /// Raw byte sequence
    Bytes(&'a [u8]),
    /// Ordered sequence
    Array(&'a [Value]),
    /// Any other object
    Object(&'a BTreeMap<String, Value>),
    /// String, number, boolean or null
    Scalar(&'a Value),
}

impl Value {
    /// Creates a byte sequence value
    pub fn bytes(data: impl Into<Bytes>) -> Self {
        Self::Bytes(data.into())
    }

    /// Classifies this node for dispatch
    pub fn shape(&self) -> Shape<'_> {
        match self {
            Value::Object(map) => match SplitInteger::from_object(map) {
                Some(split) => Shape::SplitInteger(split),
                None => Shape::Object(map),
            },
            Value::Bytes(data) => Shape::Bytes(data),
            Value::Array(items) => Shape::Array(items),
            other => Shape::Scalar(other),
        }
    }

    /// Returns the raw bytes if this is a byte sequence
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(data) => Some(data),
            _ => None,
        }
    }

    /// Builds a value from JSON, lifting Node.js `Buffer` objects
    /// (`{"type": "Buffer", "data": [..]}`) into [`Value::Bytes`]
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => match node_buffer(&map) {
                Some(data) => Value::Bytes(data),
                None => Value::Object(
                    map.into_iter()
                        .map(|(key, value)| (key, Value::from_json(value)))
                        .collect(),
                ),
            },
        }
    }
}

/// Extracts the payload of a serialized Node.js `Buffer`
fn node_buffer(map: &serde_json::Map<String, serde_json::Value>) -> Option<Bytes> {
    if map.len() != 2 {
        return None;
    }
    if map.get("type").and_then(|t| t.as_str()) != Some(NODE_BUFFER_TYPE) {
        return None;
    }

    let data = map.get("data")?.as_array()?;
    data.iter()
        .map(|b| b.as_u64().and_then(|b| u8::try_from(b).ok()))
        .collect::<Option<Vec<u8>>>()
        .map(Bytes::from)
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from_json(json)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

macro_rules! from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Number(Number::from(n))
                }
            }
        )*
    };
}

from_integer!(i8, i16, i32, i64, u8, u16, u32, u64);

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

impl From<Bytes> for Value {
    fn from(data: Bytes) -> Self {
        Value::Bytes(data)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Object(map)
    }
}

impl From<SplitInteger> for Value {
    fn from(split: SplitInteger) -> Self {
        split.to_value()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Value::Object(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// A 64-bit integer carried as two 32-bit words plus a signedness flag.
///
/// The value is `high * 2^32 + low` over the raw word bits, read as two's
/// complement unless `unsigned` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SplitInteger {
    /// Low 32 bits
    pub low: u32,
    /// High 32 bits
    pub high: u32,
    /// Whether the combined value is unsigned
    pub unsigned: bool,
}

impl SplitInteger {
    /// Creates a split integer from its words
    pub fn new(low: u32, high: u32, unsigned: bool) -> Self {
        Self {
            low,
            high,
            unsigned,
        }
    }

    /// Splits a signed 64-bit integer
    pub fn from_i64(n: i64) -> Self {
        let bits = n as u64;
        Self::new(bits as u32, (bits >> 32) as u32, false)
    }

    /// Splits an unsigned 64-bit integer
    pub fn from_u64(n: u64) -> Self {
        Self::new(n as u32, (n >> 32) as u32, true)
    }

    /// Returns the combined 64 bits
    pub fn bits(&self) -> u64 {
        (u64::from(self.high) << 32) | u64::from(self.low)
    }

    /// Returns the reconstructed value, wide enough for either signedness
    pub fn as_i128(&self) -> i128 {
        if self.unsigned {
            i128::from(self.bits())
        } else {
            i128::from(self.bits() as i64)
        }
    }

    /// Recognizes the three-key object form.
    ///
    /// Returns `None` unless the object has exactly `low`, `high` and
    /// `unsigned`, both words are integral and fit in 32 bits (signed or
    /// unsigned), and the flag is a boolean.
    pub fn from_object(map: &BTreeMap<String, Value>) -> Option<Self> {
        if map.len() != 3 {
            return None;
        }
        let low = word(map.get(LOW_KEY)?)?;
        let high = word(map.get(HIGH_KEY)?)?;
        let unsigned = match map.get(UNSIGNED_KEY)? {
            Value::Bool(b) => *b,
            _ => return None,
        };
        Some(Self::new(low, high, unsigned))
    }

    /// Returns the three-key object form
    pub fn to_value(&self) -> Value {
        let mut map = BTreeMap::new();
        map.insert(LOW_KEY.to_string(), Value::from(self.low));
        map.insert(HIGH_KEY.to_string(), Value::from(self.high));
        map.insert(UNSIGNED_KEY.to_string(), Value::Bool(self.unsigned));
        Value::Object(map)
    }
}

impl fmt::Display for SplitInteger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unsigned {
            write!(f, "{}", self.bits())
        } else {
            write!(f, "{}", self.bits() as i64)
        }
    }
}

/// Reads a 32-bit word, accepting both signed and unsigned spellings
fn word(value: &Value) -> Option<u32> {
    let Value::Number(n) = value else {
        return None;
    };

    let n = match n.as_i64() {
        Some(i) => i,
        None => {
            let f = n.as_f64()?;
            if f.fract() != 0.0 || f < f64::from(i32::MIN) || f > f64::from(u32::MAX) {
                return None;
            }
            f as i64
        }
    };

    if n < i64::from(i32::MIN) || n > i64::from(u32::MAX) {
        return None;
    }
    Some(n as u32)
}
