//! # Value Binder
//!
//! Writes raw string values (route values, query string values) into a request
//! message at a resolved [`FieldPath`], coercing them to the leaf field's kind.
//!
//! ## Coercion rules
//!
//! | Kind | Rule |
//! |---|---|
//! | numeric | decimal text parsed with `str::parse` |
//! | bool | `true` / `false`, ASCII case-insensitive |
//! | string | as is |
//! | bytes | standard base64 |
//! | enum | integer value first, then the exact (case-sensitive) value name |
//! | wrapper message | the wrapped `value` field, coerced by the rules above |
//! | `Timestamp`, `Duration`, `FieldMask` | their proto3 JSON string form |
//!
//! Any other message field, and any map field, cannot receive a raw value.
use crate::schema::{FieldPath, WellKnownType, kind_name, wrapped_value_field};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use prost_reflect::{DynamicMessage, FieldDescriptor, Kind, SetFieldError, Value};

#[derive(Debug, thiserror::Error)]
pub enum BindError {
    #[error("Multiple values specified for non-repeated field '{0}'")]
    MultipleValues(String),
    #[error("Invalid value '{value}' for field '{field}' of type {kind}")]
    InvalidValue {
        field: String,
        value: String,
        kind: String,
    },
    #[error("Invalid base64 value for bytes field '{field}': {source}")]
    InvalidBase64 {
        field: String,
        #[source]
        source: base64::DecodeError,
    },
    #[error("'{value}' is not a value of enum '{enum_name}' (field '{field}')")]
    UnknownEnumValue {
        field: String,
        value: String,
        enum_name: String,
    },
    #[error("Field '{field}' of message type '{message}' cannot be set from a single value")]
    UnsupportedMessage { field: String, message: String },
    #[error("Map field '{0}' cannot be set from a single value")]
    MapField(String),
    #[error("Invalid value '{value}' for field '{field}': {reason}")]
    WellKnownType {
        field: String,
        value: String,
        reason: String,
    },
    #[error("Field '{0}' cannot be written")]
    SetField(String, #[source] SetFieldError),
}

/// Binds `values` at `path` inside `root`.
///
/// Intermediate messages are created when unset. A repeated leaf receives every
/// value, appended in order; a singular leaf accepts exactly one value and is
/// overwritten by it. An empty `values` slice is a no-op.
pub fn bind<S: AsRef<str>>(
    root: &mut DynamicMessage,
    path: &FieldPath,
    values: &[S],
) -> Result<(), BindError> {
    if values.is_empty() {
        return Ok(());
    }

    let leaf = path.leaf();
    if leaf.is_map() {
        return Err(BindError::MapField(path.to_string()));
    }
    if !leaf.is_list() && values.len() > 1 {
        return Err(BindError::MultipleValues(path.to_string()));
    }

    let coerced = values
        .iter()
        .map(|raw| coerce(leaf, raw.as_ref(), path))
        .collect::<Result<Vec<_>, _>>()?;

    let parent = message_at(root, path)?;
    if leaf.is_list() {
        append(parent, leaf, coerced, path)
    } else {
        // Exactly one value here.
        for value in coerced {
            set(parent, leaf, value, path)?;
        }
        Ok(())
    }
}

/// Writes an already typed `value` at `path`, creating intermediate messages.
///
/// For a repeated leaf, `value` must be a [`Value::List`] and its items are
/// appended to whatever the field already holds.
pub fn graft(root: &mut DynamicMessage, path: &FieldPath, value: Value) -> Result<(), BindError> {
    let leaf = path.leaf();
    let parent = message_at(root, path)?;

    match value {
        Value::List(items) if leaf.is_list() => append(parent, leaf, items, path),
        value => set(parent, leaf, value, path),
    }
}

/// Walks the non-leaf fields of `path`, constructing empty sub-messages as needed,
/// and returns the message that owns the leaf.
fn message_at<'a>(
    root: &'a mut DynamicMessage,
    path: &FieldPath,
) -> Result<&'a mut DynamicMessage, BindError> {
    let mut current = root;
    for field in path.parents() {
        current = match current.get_field_mut(field) {
            Value::Message(message) => message,
            _ => {
                return Err(BindError::UnsupportedMessage {
                    field: path.to_string(),
                    message: kind_name(field),
                });
            }
        };
    }
    Ok(current)
}

fn append(
    parent: &mut DynamicMessage,
    leaf: &FieldDescriptor,
    items: Vec<Value>,
    path: &FieldPath,
) -> Result<(), BindError> {
    match parent.get_field_mut(leaf) {
        Value::List(list) => {
            list.extend(items);
            Ok(())
        }
        _ => Err(BindError::MapField(path.to_string())),
    }
}

fn set(
    parent: &mut DynamicMessage,
    leaf: &FieldDescriptor,
    value: Value,
    path: &FieldPath,
) -> Result<(), BindError> {
    parent
        .try_set_field(leaf, value)
        .map_err(|err| BindError::SetField(path.to_string(), err))
}

/// Converts one raw string into a value of the leaf field's kind.
fn coerce(field: &FieldDescriptor, raw: &str, path: &FieldPath) -> Result<Value, BindError> {
    let invalid = || BindError::InvalidValue {
        field: path.to_string(),
        value: raw.to_string(),
        kind: kind_name(field),
    };

    let value = match field.kind() {
        Kind::Double => Value::F64(raw.parse().map_err(|_| invalid())?),
        Kind::Float => Value::F32(raw.parse().map_err(|_| invalid())?),
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => {
            Value::I32(raw.parse().map_err(|_| invalid())?)
        }
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => {
            Value::I64(raw.parse().map_err(|_| invalid())?)
        }
        Kind::Uint32 | Kind::Fixed32 => Value::U32(raw.parse().map_err(|_| invalid())?),
        Kind::Uint64 | Kind::Fixed64 => Value::U64(raw.parse().map_err(|_| invalid())?),
        Kind::Bool => Value::Bool(parse_bool(raw).ok_or_else(invalid)?),
        Kind::String => Value::String(raw.to_string()),
        Kind::Bytes => {
            let bytes = BASE64
                .decode(raw)
                .map_err(|source| BindError::InvalidBase64 {
                    field: path.to_string(),
                    source,
                })?;
            Value::Bytes(bytes.into())
        }
        Kind::Enum(descriptor) => {
            let number = match raw.parse::<i32>() {
                Ok(number) => number,
                Err(_) => descriptor
                    .get_value_by_name(raw)
                    .map(|value| value.number())
                    .ok_or_else(|| BindError::UnknownEnumValue {
                        field: path.to_string(),
                        value: raw.to_string(),
                        enum_name: descriptor.full_name().to_string(),
                    })?,
            };
            Value::EnumNumber(number)
        }
        Kind::Message(message) => match WellKnownType::of(&message) {
            Some(WellKnownType::Wrapper) => {
                let inner = wrapped_value_field(&message).ok_or_else(invalid)?;
                let mut wrapper = DynamicMessage::new(message);
                let value = coerce(&inner, raw, path)?;
                set(&mut wrapper, &inner, value, path)?;
                Value::Message(wrapper)
            }
            Some(WellKnownType::StringEncoded) => {
                let json = serde_json::Value::String(raw.to_string());
                let parsed = DynamicMessage::deserialize(message, json).map_err(|err| {
                    BindError::WellKnownType {
                        field: path.to_string(),
                        value: raw.to_string(),
                        reason: err.to_string(),
                    }
                })?;
                Value::Message(parsed)
            }
            None => {
                return Err(BindError::UnsupportedMessage {
                    field: path.to_string(),
                    message: message.full_name().to_string(),
                });
            }
        },
    };

    Ok(value)
}

fn parse_bool(raw: &str) -> Option<bool> {
    if raw.eq_ignore_ascii_case("true") {
        Some(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}
