//! # Transcoding Options
//!
//! JSON formatting knobs shared by every call a transcoder handles. They map
//! onto the serializer and deserializer options of `prost_reflect` and can be
//! loaded from any serde format; omitted keys keep their default.
//!
//! ```rust
//! use grate_core::options::TranscodingOptions;
//!
//! let options: TranscodingOptions =
//!     serde_json::from_str(r#"{ "write_indented": true }"#).unwrap();
//!
//! assert!(options.write_indented);
//! assert!(options.deny_unknown_fields);
//! ```
use prost_reflect::{DeserializeOptions, SerializeOptions};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodingOptions {
    /// Pretty-print response documents.
    pub write_indented: bool,
    /// Omit fields holding their default value from responses.
    pub skip_default_fields: bool,
    /// Write enum values as numbers instead of value names.
    pub use_enum_numbers: bool,
    /// Write 64-bit integers as JSON strings, as proto3 JSON mandates.
    pub stringify_64_bit_integers: bool,
    /// Write proto field names instead of their JSON names.
    pub use_proto_field_name: bool,
    /// Reject request bodies carrying fields unknown to the schema.
    pub deny_unknown_fields: bool,
}

impl Default for TranscodingOptions {
    fn default() -> Self {
        Self {
            write_indented: false,
            skip_default_fields: true,
            use_enum_numbers: false,
            stringify_64_bit_integers: true,
            use_proto_field_name: false,
            deny_unknown_fields: true,
        }
    }
}

impl TranscodingOptions {
    pub fn serialize_options(&self) -> SerializeOptions {
        SerializeOptions::new()
            .skip_default_fields(self.skip_default_fields)
            .use_enum_numbers(self.use_enum_numbers)
            .stringify_64_bit_integers(self.stringify_64_bit_integers)
            .use_proto_field_name(self.use_proto_field_name)
    }

    pub fn deserialize_options(&self) -> DeserializeOptions {
        DeserializeOptions::new().deny_unknown_fields(self.deny_unknown_fields)
    }
}
