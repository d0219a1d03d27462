//! # Schema Model
//!
//! The transcoder never sees generated Rust structs. Message types, fields and
//! enums are described by `prost_reflect` descriptors and message instances are
//! [`DynamicMessage`](prost_reflect::DynamicMessage)s, read and written through
//! their [`FieldDescriptor`] handles.
//!
//! This module adds the two pieces the descriptors do not provide on their own:
//!
//! * [`FieldPath`]: an immutable, resolved chain of fields from a root message to
//!   a (possibly nested) target field.
//! * [`WellKnownType`]: the classification of the `google.protobuf` message types
//!   that may receive a plain string value from a route or query string.
use prost_reflect::{FieldDescriptor, MessageDescriptor};
use std::{fmt, sync::Arc};

/// An ordered list of field descriptors from a root message type to a target field.
///
/// Paths are only produced by [`crate::path::resolve_field_path`], so a `FieldPath`
/// always has at least one element and every element but the last is a singular
/// message field.
#[derive(Clone, PartialEq, Eq)]
pub struct FieldPath {
    fields: Arc<[FieldDescriptor]>,
    dotted: Arc<str>,
}

impl FieldPath {
    pub(crate) fn new(fields: Vec<FieldDescriptor>, dotted: &str) -> Self {
        debug_assert!(!fields.is_empty());
        Self {
            fields: fields.into(),
            dotted: dotted.into(),
        }
    }

    /// All fields of the path, root first.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// The fields that must be walked (and created if unset) before reaching the leaf.
    pub fn parents(&self) -> &[FieldDescriptor] {
        &self.fields[..self.fields.len() - 1]
    }

    /// The target field.
    pub fn leaf(&self) -> &FieldDescriptor {
        &self.fields[self.fields.len() - 1]
    }

    /// The dotted string this path was resolved from (e.g. `book.author.display_name`).
    pub fn as_str(&self) -> &str {
        &self.dotted
    }
}

impl fmt::Debug for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FieldPath").field(&self.as_str()).finish()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message types from `google.protobuf` that accept a raw string value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WellKnownType {
    /// One of the `google/protobuf/wrappers.proto` types. The string is bound to
    /// their single `value` field.
    Wrapper,
    /// `Timestamp`, `Duration` or `FieldMask`: parsed from their canonical
    /// proto3 JSON string form.
    StringEncoded,
}

const WRAPPER_TYPES: &[&str] = &[
    "google.protobuf.DoubleValue",
    "google.protobuf.FloatValue",
    "google.protobuf.Int64Value",
    "google.protobuf.UInt64Value",
    "google.protobuf.Int32Value",
    "google.protobuf.UInt32Value",
    "google.protobuf.BoolValue",
    "google.protobuf.StringValue",
    "google.protobuf.BytesValue",
];

const STRING_ENCODED_TYPES: &[&str] = &[
    "google.protobuf.Timestamp",
    "google.protobuf.Duration",
    "google.protobuf.FieldMask",
];

impl WellKnownType {
    pub fn of(message: &MessageDescriptor) -> Option<Self> {
        let name = message.full_name();
        if WRAPPER_TYPES.contains(&name) {
            Some(WellKnownType::Wrapper)
        } else if STRING_ENCODED_TYPES.contains(&name) {
            Some(WellKnownType::StringEncoded)
        } else {
            None
        }
    }
}

/// The `value` field carried by a wrapper type.
pub(crate) fn wrapped_value_field(wrapper: &MessageDescriptor) -> Option<FieldDescriptor> {
    wrapper.get_field(1)
}

/// Human readable name of a field's kind, used in binding error messages.
pub(crate) fn kind_name(field: &FieldDescriptor) -> String {
    use prost_reflect::Kind;

    match field.kind() {
        Kind::Double => "double".to_string(),
        Kind::Float => "float".to_string(),
        Kind::Int32 => "int32".to_string(),
        Kind::Int64 => "int64".to_string(),
        Kind::Uint32 => "uint32".to_string(),
        Kind::Uint64 => "uint64".to_string(),
        Kind::Sint32 => "sint32".to_string(),
        Kind::Sint64 => "sint64".to_string(),
        Kind::Fixed32 => "fixed32".to_string(),
        Kind::Fixed64 => "fixed64".to_string(),
        Kind::Sfixed32 => "sfixed32".to_string(),
        Kind::Sfixed64 => "sfixed64".to_string(),
        Kind::Bool => "bool".to_string(),
        Kind::String => "string".to_string(),
        Kind::Bytes => "bytes".to_string(),
        Kind::Message(m) => m.full_name().to_string(),
        Kind::Enum(e) => e.full_name().to_string(),
    }
}
