//! Conversions between variants and JSON.
//!
//! Fetched payloads arrive as JSON text and are decoded into variants
//! before binding; cross-instance transport serializes variants back out.
//! Dynamic and native values have no JSON reading and serialize as null.

use purc_core::error::{CoreError, CoreResult};
use serde_json::Value;

use crate::variant::Variant;
use crate::variant::VariantType;

impl Variant {
    /// Decodes a JSON document into a variant tree.
    pub fn from_json_str(input: &str) -> CoreResult<Variant> {
        let value: Value = serde_json::from_str(input)
            .map_err(|e| CoreError::invalid_value(format!("bad JSON payload: {e}")))?;
        Ok(Variant::from_json_value(&value))
    }

    /// Converts a parsed JSON value into a variant tree.
    pub fn from_json_value(value: &Value) -> Variant {
        match value {
            Value::Null => Variant::null(),
            Value::Bool(b) => Variant::boolean(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Variant::longint(i)
                } else if let Some(u) = n.as_u64() {
                    Variant::ulongint(u)
                } else {
                    Variant::number(n.as_f64().unwrap_or(0.0))
                }
            }
            Value::String(s) => Variant::string(s),
            Value::Array(items) => {
                Variant::array(items.iter().map(Variant::from_json_value).collect())
            }
            Value::Object(map) => Variant::object_from(
                map.iter()
                    .map(|(k, v)| (k.clone(), Variant::from_json_value(v))),
            ),
        }
    }

    /// Converts the variant into a JSON value. Byte sequences become
    /// arrays of numbers; dynamic and native values become null.
    pub fn to_json_value(&self) -> Value {
        match self.variant_type() {
            VariantType::Undefined | VariantType::Null => Value::Null,
            VariantType::Boolean => Value::Bool(self.as_boolean().unwrap_or(false)),
            VariantType::Number | VariantType::LongDouble => serde_json::Number::from_f64(
                self.as_number().unwrap_or(0.0),
            )
            .map(Value::Number)
            .unwrap_or(Value::Null),
            VariantType::LongInt => Value::Number(self.as_longint().unwrap_or(0).into()),
            VariantType::ULongInt => Value::Number(self.as_ulongint().unwrap_or(0).into()),
            VariantType::String | VariantType::AtomString | VariantType::Exception => {
                Value::String(self.get_string().unwrap_or_default().to_string())
            }
            VariantType::ByteSeq => Value::Array(
                self.get_bytes()
                    .unwrap_or_default()
                    .iter()
                    .map(|&b| Value::Number(b.into()))
                    .collect(),
            ),
            VariantType::Dynamic | VariantType::Native => Value::Null,
            VariantType::Array | VariantType::Tuple | VariantType::Set => Value::Array(
                self.members()
                    .unwrap_or_default()
                    .iter()
                    .map(Variant::to_json_value)
                    .collect(),
            ),
            VariantType::Object => {
                let mut map = serde_json::Map::new();
                if let Ok(entries) = self.object_entries() {
                    for (key, member) in entries {
                        map.insert(key, member.to_json_value());
                    }
                }
                Value::Object(map)
            }
        }
    }

    /// Serializes the variant as compact JSON text.
    pub fn to_json_string(&self) -> String {
        self.to_json_value().to_string()
    }
}
