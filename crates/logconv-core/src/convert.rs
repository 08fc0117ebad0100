//! Conversion of decoded values into log-ready JSON.
//!
//! The [`Converter`] walks a [`Value`] depth-first and rewrites every node
//! according to its [`Shape`], in priority order:
//!
//! 1. Split integers become decimal strings, including at the root
//! 2. Byte sequences become text or hex, placed according to context
//! 3. Arrays are converted element by element
//! 4. Objects are converted value by value
//! 5. Scalars pass through
//!
//! ## Byte placement
//!
//! | Context         | Likely text             | Likely binary                 |
//! |-----------------|-------------------------|-------------------------------|
//! | Array element   | `{"string": text}`      | `{"hex": hex}`                |
//! | Root value      | `{"string": text}`      | `{"hex": hex}`                |
//! | Object property | `key_string: text`      | see [`BinaryKeyPolicy`]       |
//!
//! Buffers that classify as text but are not valid UTF-8 fall back to hex.

use crate::classify::{PrintableRatio, TextDetector};
use crate::error::{Error, Result};
use crate::value::{Shape, Value};
use serde_json::{Map, Value as Json};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Key used when wrapping decoded text outside of an object property
pub const TEXT_KEY: &str = "string";

/// Key used when wrapping hex-encoded binary data
pub const HEX_KEY: &str = "hex";

/// Default suffix appended to object keys whose bytes decoded as text
pub const DEFAULT_TEXT_SUFFIX: &str = "_string";

/// Default suffix appended to object keys under [`BinaryKeyPolicy::Suffix`]
pub const DEFAULT_HEX_SUFFIX: &str = "_hex";

/// Default maximum container nesting depth
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// How an object property holding binary data is rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BinaryKeyPolicy {
    /// Keep the key; the value becomes `{"hex": "..."}`
    #[default]
    Annotate,
    /// Re-key to `<key><hex_suffix>`; the value is the bare hex string
    Suffix,
}

/// Configuration for the converter
#[derive(Debug, Clone)]
pub struct ConverterConfig {
    /// Maximum number of nested arrays/objects
    pub max_depth: usize,
    /// Suffix for object keys whose bytes decoded as text
    pub text_suffix: String,
    /// Suffix for object keys under [`BinaryKeyPolicy::Suffix`]
    pub hex_suffix: String,
    /// Placement of binary object properties
    pub binary_keys: BinaryKeyPolicy,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            text_suffix: DEFAULT_TEXT_SUFFIX.to_string(),
            hex_suffix: DEFAULT_HEX_SUFFIX.to_string(),
            binary_keys: BinaryKeyPolicy::default(),
        }
    }
}

impl ConverterConfig {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum nesting depth
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Sets the suffix for text properties
    pub fn text_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.text_suffix = suffix.into();
        self
    }

    /// Sets the suffix for binary properties under [`BinaryKeyPolicy::Suffix`]
    pub fn hex_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.hex_suffix = suffix.into();
        self
    }

    /// Sets the binary property policy
    pub fn binary_keys(mut self, policy: BinaryKeyPolicy) -> Self {
        self.binary_keys = policy;
        self
    }
}

/// Rewrites byte sequences and split integers into readable JSON
#[derive(Debug, Clone, Default)]
pub struct Converter<D = PrintableRatio> {
    config: ConverterConfig,
    detector: D,
}

impl Converter {
    /// Creates a converter with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a converter with custom configuration
    pub fn with_config(config: ConverterConfig) -> Self {
        Self {
            config,
            detector: PrintableRatio::default(),
        }
    }
}

impl<D: TextDetector> Converter<D> {
    /// Creates a converter with a custom text detector
    pub fn with_detector(config: ConverterConfig, detector: D) -> Self {
        Self { config, detector }
    }

    /// Returns the active configuration
    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Converts `value` into JSON free of raw bytes and split integers.
    ///
    /// Fails only when containers nest deeper than
    /// [`ConverterConfig::max_depth`].
    pub fn convert(&self, value: &Value) -> Result<Json> {
        self.convert_node(value, 0)
    }

    fn convert_node(&self, value: &Value, depth: usize) -> Result<Json> {
        match value.shape() {
            Shape::SplitInteger(split) => Ok(Json::String(split.to_string())),
            Shape::Bytes(data) => Ok(self.annotate(data)),
            Shape::Array(items) => {
                let level = self.enter(depth)?;
                items
                    .iter()
                    .map(|item| self.convert_node(item, level))
                    .collect::<Result<Vec<_>>>()
                    .map(Json::Array)
            }
            Shape::Object(map) => {
                let level = self.enter(depth)?;
                self.convert_object(map, level).map(Json::Object)
            }
            Shape::Scalar(scalar) => Ok(scalar_to_json(scalar)),
        }
    }

    fn enter(&self, depth: usize) -> Result<usize> {
        let level = depth + 1;
        if level > self.config.max_depth {
            return Err(Error::depth_limit(level, self.config.max_depth));
        }
        Ok(level)
    }

    fn convert_object(&self, map: &BTreeMap<String, Value>, level: usize) -> Result<Map<String, Json>> {
        let mut out = Map::new();
        let mut rekeyed = Vec::new();

        for (key, value) in map {
            match value.as_bytes() {
                Some(data) => {
                    let (new_key, converted) = self.convert_property(key, data);
                    if new_key == *key {
                        out.insert(new_key, converted);
                    } else {
                        rekeyed.push((new_key, converted));
                    }
                }
                None => {
                    out.insert(key.clone(), self.convert_node(value, level)?);
                }
            }
        }

        // Entries under their original key are placed first; a re-keyed
        // entry never overwrites one
        for (key, converted) in rekeyed {
            let key = free_key(&out, key);
            out.insert(key, converted);
        }

        Ok(out)
    }

    fn convert_property(&self, key: &str, data: &[u8]) -> (String, Json) {
        if let Some(text) = self.decode_text(data) {
            return (format!("{}{}", key, self.config.text_suffix), Json::String(text));
        }

        let hex = hex::encode(data);
        match self.config.binary_keys {
            BinaryKeyPolicy::Annotate => (key.to_string(), wrap(HEX_KEY, hex)),
            BinaryKeyPolicy::Suffix => (
                format!("{}{}", key, self.config.hex_suffix),
                Json::String(hex),
            ),
        }
    }

    fn annotate(&self, data: &[u8]) -> Json {
        match self.decode_text(data) {
            Some(text) => wrap(TEXT_KEY, text),
            None => wrap(HEX_KEY, hex::encode(data)),
        }
    }

    fn decode_text(&self, data: &[u8]) -> Option<String> {
        if !self.detector.is_likely_text(data) {
            return None;
        }
        match std::str::from_utf8(data) {
            Ok(text) => Some(text.to_string()),
            Err(e) => {
                trace!(
                    "Buffer of {} bytes invalid UTF-8 at offset {}, using hex",
                    data.len(),
                    e.valid_up_to()
                );
                None
            }
        }
    }
}

/// Returns `key`, or the first `<key>_<n>` (n >= 2) not yet in `out`
fn free_key(out: &Map<String, Json>, key: String) -> String {
    if !out.contains_key(&key) {
        return key;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}_{}", key, n);
        if !out.contains_key(&candidate) {
            debug!("Key '{}' already taken, using '{}'", key, candidate);
            return candidate;
        }
        n += 1;
    }
}

fn wrap(key: &str, value: String) -> Json {
    let mut map = Map::new();
    map.insert(key.to_string(), Json::String(value));
    Json::Object(map)
}

fn scalar_to_json(value: &Value) -> Json {
    match value {
        Value::Bool(b) => Json::Bool(*b),
        Value::Number(n) => Json::Number(n.clone()),
        Value::String(s) => Json::String(s.clone()),
        _ => Json::Null,
    }
}

/// Converts `value` with the default [`Converter`]
pub fn convert_buffers(value: &Value) -> Result<Json> {
    Converter::new().convert(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::SplitInteger;
    use bytes::Bytes;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn convert(json: Json) -> Json {
        convert_buffers(&Value::from_json(json)).unwrap()
    }

    fn object<const N: usize>(entries: [(&str, Value); N]) -> Value {
        entries.into_iter().collect()
    }

    #[test]
    fn test_object_without_buffers_as_is() {
        let input = json!({"foo": "bar", "some": "thing", "anumber": 3, "so": true});
        assert_eq!(convert(input.clone()), input);
    }

    #[test]
    fn test_object_property_containing_buffer() {
        let value = object([("some", Value::bytes("foobar"))]);
        assert_eq!(convert_buffers(&value).unwrap(), json!({"some_string": "foobar"}));
    }

    #[test]
    fn test_array_of_buffers() {
        let value = object([(
            "args",
            Value::Array(vec![
                Value::bytes("foobar"),
                Value::bytes("hello"),
                Value::bytes("world"),
            ]),
        )]);
        assert_eq!(
            convert_buffers(&value).unwrap(),
            json!({"args": [{"string": "foobar"}, {"string": "hello"}, {"string": "world"}]})
        );
    }

    #[test]
    fn test_longs_to_strings() {
        assert_eq!(convert(json!({"low": 4, "high": 0, "unsigned": false})), json!("4"));
        assert_eq!(
            convert(json!({"low": 4, "high": 32, "unsigned": false})),
            json!("137438953476")
        );
    }

    #[test]
    fn test_longs_signedness() {
        assert_eq!(
            convert_buffers(&SplitInteger::from_i64(-5).to_value()).unwrap(),
            json!("-5")
        );
        assert_eq!(
            convert(json!({"low": -1, "high": -1, "unsigned": true})),
            json!("18446744073709551615")
        );
        assert_eq!(
            convert(json!({"low": 0, "high": -2147483648i64, "unsigned": false})),
            json!(i64::MIN.to_string())
        );
    }

    #[test]
    fn test_nested_longs() {
        assert_eq!(
            convert(json!({
                "header": {"timestamp": {"seconds": {"low": 4, "high": 32, "unsigned": false}}},
                "heights": [{"low": 1, "high": 0, "unsigned": true}, 7],
            })),
            json!({
                "header": {"timestamp": {"seconds": "137438953476"}},
                "heights": ["1", 7],
            })
        );
    }

    #[test]
    fn test_malformed_long_falls_through() {
        let input = json!({"low": "4", "high": 0, "unsigned": false});
        assert_eq!(convert(input.clone()), input);

        let input = json!({"low": 4, "high": 0, "unsigned": false, "note": "x"});
        assert_eq!(convert(input.clone()), input);
    }

    #[test]
    fn test_binary_property_annotated() {
        let value = object([("payload", Value::bytes(vec![0u8, 1, 2]))]);
        assert_eq!(
            convert_buffers(&value).unwrap(),
            json!({"payload": {"hex": "000102"}})
        );
    }

    #[test]
    fn test_binary_property_suffix_policy() {
        let converter =
            Converter::with_config(ConverterConfig::new().binary_keys(BinaryKeyPolicy::Suffix));
        let value = object([
            ("payload", Value::bytes(vec![0u8, 1, 2])),
            ("name", Value::bytes("mycc")),
        ]);
        assert_eq!(
            converter.convert(&value).unwrap(),
            json!({"payload_hex": "000102", "name_string": "mycc"})
        );
    }

    #[test]
    fn test_custom_suffixes() {
        let converter = Converter::with_config(
            ConverterConfig::new()
                .text_suffix("_text")
                .hex_suffix("_raw")
                .binary_keys(BinaryKeyPolicy::Suffix),
        );
        let value = object([
            ("a", Value::bytes("deploy")),
            ("b", Value::bytes(vec![0xFFu8])),
        ]);
        assert_eq!(
            converter.convert(&value).unwrap(),
            json!({"a_text": "deploy", "b_raw": "ff"})
        );
    }

    #[test]
    fn test_root_buffers() {
        assert_eq!(
            convert_buffers(&Value::bytes("deploy")).unwrap(),
            json!({"string": "deploy"})
        );
        assert_eq!(
            convert_buffers(&Value::bytes(Bytes::new())).unwrap(),
            json!({"string": ""})
        );
        let frame = hex::decode("0a1e08011216120f686967682d7468726f7567687075741a03312e301a020a00")
            .unwrap();
        assert_eq!(
            convert_buffers(&Value::bytes(frame)).unwrap(),
            json!({"hex": "0a1e08011216120f686967682d7468726f7567687075741a03312e301a020a00"})
        );
    }

    #[test]
    fn test_nested_buffers() {
        let value = object([
            ("outer", object([("inner", Value::bytes("common"))])),
            (
                "list",
                Value::Array(vec![Value::Array(vec![Value::bytes(vec![0x0Au8, 0x00])])]),
            ),
        ]);
        assert_eq!(
            convert_buffers(&value).unwrap(),
            json!({"outer": {"inner_string": "common"}, "list": [[{"hex": "0a00"}]]})
        );
    }

    #[test]
    fn test_invalid_utf8_falls_back_to_hex() {
        let mut data = vec![b'a'; 20];
        data.push(0xFF);
        assert!(crate::classify::is_likely_text(&data));

        let value = object([("blob", Value::bytes(data))]);
        assert_eq!(
            convert_buffers(&value).unwrap(),
            json!({"blob": {"hex": format!("{}ff", "61".repeat(20))}})
        );
    }

    #[test]
    fn test_rekeyed_property_keeps_existing_key() {
        let value = object([
            ("a", Value::bytes("x")),
            ("a_string", Value::from("original")),
        ]);
        assert_eq!(
            convert_buffers(&value).unwrap(),
            json!({"a_string": "original", "a_string_2": "x"})
        );
    }

    #[test]
    fn test_rekeyed_property_never_drops_binary_sibling() {
        let value = object([
            ("a", Value::bytes("x")),
            ("a_string", Value::bytes(vec![0u8, 1, 2])),
        ]);
        assert_eq!(
            convert_buffers(&value).unwrap(),
            json!({"a_string": {"hex": "000102"}, "a_string_2": "x"})
        );
    }

    #[test]
    fn test_rekeyed_collisions_pick_next_free_key() {
        let converter =
            Converter::with_config(ConverterConfig::new().binary_keys(BinaryKeyPolicy::Suffix));
        let value = object([
            ("a", Value::bytes(vec![0u8])),
            ("a_hex", Value::from("plain")),
            ("a_hex_2", Value::from("taken")),
        ]);
        assert_eq!(
            converter.convert(&value).unwrap(),
            json!({"a_hex": "plain", "a_hex_2": "taken", "a_hex_3": "00"})
        );
    }

    #[test]
    fn test_idempotent_on_converted_output() {
        let value = object([
            ("channel", Value::from("mychannel")),
            ("payload", Value::bytes(vec![0u8, 1, 2, 3])),
            ("name", Value::bytes("escc")),
            ("args", Value::Array(vec![Value::bytes("vscc"), Value::Null])),
            ("height", SplitInteger::from_u64(42).to_value()),
        ]);
        let once = convert_buffers(&value).unwrap();
        let twice = convert_buffers(&Value::from_json(once.clone())).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_scalars_pass_through() {
        for input in [json!(null), json!(true), json!(1.5), json!(-3), json!("text")] {
            assert_eq!(convert(input.clone()), input);
        }
    }

    #[test]
    fn test_depth_limit() {
        let converter = Converter::with_config(ConverterConfig::new().max_depth(2));
        let ok = Value::from_json(json!([["x"]]));
        assert_eq!(converter.convert(&ok).unwrap(), json!([["x"]]));

        let deep = Value::from_json(json!([[["x"]]]));
        let err = converter.convert(&deep).unwrap_err();
        assert!(matches!(err, Error::DepthLimitExceeded { depth: 3, max: 2 }));

        // Leaves never count toward the limit
        let root = Converter::with_config(ConverterConfig::new().max_depth(0));
        assert_eq!(root.convert(&Value::bytes("hi")).unwrap(), json!({"string": "hi"}));
    }

    #[test]
    fn test_default_depth_handles_adversarial_nesting() {
        let mut value = Value::from("leaf");
        for _ in 0..1_000 {
            value = Value::Array(vec![value]);
        }
        assert!(matches!(
            convert_buffers(&value),
            Err(Error::DepthLimitExceeded { max: DEFAULT_MAX_DEPTH, .. })
        ));
    }

    #[test]
    fn test_custom_detector() {
        struct AlwaysBinary;
        impl TextDetector for AlwaysBinary {
            fn is_likely_text(&self, _data: &[u8]) -> bool {
                false
            }
        }

        let converter = Converter::with_detector(ConverterConfig::default(), AlwaysBinary);
        let value = object([("name", Value::bytes("hi"))]);
        assert_eq!(converter.convert(&value).unwrap(), json!({"name": {"hex": "6869"}}));
    }

    #[test]
    fn test_converter_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Converter>();
    }
}
