//! Adapter from decoded protobuf messages to [`Value`].
//!
//! Messages are walked with `prost-reflect`, so no generated types are
//! needed. Field values map onto the converter's input model:
//!
//! - `bytes` fields become [`Value::Bytes`]
//! - 64-bit integers become [`SplitInteger`] objects, so they reach the log
//!   as exact decimal strings
//! - enums use the value name when the descriptor knows it
//! - map fields become objects with stringified keys

use crate::error::{Error, Result};
use crate::value::{SplitInteger, Value};
use prost::Message;
use prost_reflect::{DescriptorPool, DynamicMessage, Kind, MapKey, Value as ReflectValue};
use prost_types::{FileDescriptorProto, FileDescriptorSet};
use serde_json::Number;
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Decodes a serialized `FileDescriptorSet` into a descriptor pool
pub fn load_descriptor_pool(data: &[u8]) -> Result<DescriptorPool> {
    let pool = DescriptorPool::decode(data).map_err(|e| {
        Error::descriptor_build(format!("failed to decode descriptor pool: {}", e))
    })?;
    debug!("Loaded descriptor pool with {} files", pool.files().count());
    Ok(pool)
}

/// Builds a descriptor pool from individual file descriptors
pub fn descriptor_pool_from_files(files: Vec<FileDescriptorProto>) -> Result<DescriptorPool> {
    let fds = FileDescriptorSet { file: files };

    let mut fds_bytes = Vec::new();
    fds.encode(&mut fds_bytes).map_err(|e| {
        Error::descriptor_build(format!("failed to encode descriptor set: {}", e))
    })?;

    load_descriptor_pool(&fds_bytes)
}

/// Decodes `data` as the message type `name` and lifts it into a [`Value`]
pub fn decode_message(pool: &DescriptorPool, name: &str, data: &[u8]) -> Result<Value> {
    let descriptor = pool
        .get_message_by_name(name)
        .ok_or_else(|| Error::message_not_found(name))?;

    trace!("Decoding {} bytes as {}", data.len(), name);
    let message = DynamicMessage::decode(descriptor, data)?;
    Ok(from_dynamic_message(&message))
}

/// Lifts the populated fields of `message` into an object keyed by field name
pub fn from_dynamic_message(message: &DynamicMessage) -> Value {
    let map: BTreeMap<String, Value> = message
        .fields()
        .map(|(field, value)| (field.name().to_string(), from_reflect_value(value, &field.kind())))
        .collect();
    Value::Object(map)
}

fn from_reflect_value(value: &ReflectValue, kind: &Kind) -> Value {
    match value {
        ReflectValue::Bool(b) => Value::Bool(*b),
        ReflectValue::I32(n) => Value::from(*n),
        ReflectValue::U32(n) => Value::from(*n),
        ReflectValue::I64(n) => SplitInteger::from_i64(*n).to_value(),
        ReflectValue::U64(n) => SplitInteger::from_u64(*n).to_value(),
        ReflectValue::F32(n) => float(f64::from(*n)),
        ReflectValue::F64(n) => float(*n),
        ReflectValue::String(s) => Value::String(s.clone()),
        ReflectValue::Bytes(data) => Value::Bytes(data.clone()),
        ReflectValue::EnumNumber(n) => kind
            .as_enum()
            .and_then(|e| e.get_value(*n))
            .map_or_else(|| Value::from(*n), |v| Value::from(v.name())),
        ReflectValue::Message(message) => from_dynamic_message(message),
        ReflectValue::List(items) => Value::Array(
            items
                .iter()
                .map(|item| from_reflect_value(item, kind))
                .collect(),
        ),
        ReflectValue::Map(entries) => {
            let value_kind = kind
                .as_message()
                .map(|entry| entry.map_entry_value_field().kind());
            let map: BTreeMap<String, Value> = entries
                .iter()
                .map(|(key, value)| {
                    let converted = match &value_kind {
                        Some(k) => from_reflect_value(value, k),
                        None => from_reflect_value(value, kind),
                    };
                    (map_key(key), converted)
                })
                .collect();
            Value::Object(map)
        }
    }
}

fn float(n: f64) -> Value {
    match Number::from_f64(n) {
        Some(n) => Value::Number(n),
        None => Value::String(n.to_string()),
    }
}

fn map_key(key: &MapKey) -> String {
    match key {
        MapKey::Bool(b) => b.to_string(),
        MapKey::I32(n) => n.to_string(),
        MapKey::I64(n) => n.to_string(),
        MapKey::U32(n) => n.to_string(),
        MapKey::U64(n) => n.to_string(),
        MapKey::String(s) => s.clone(),
    }
}
