//! # Route Annotations
//!
//! An [`HttpRule`] is the declarative description of how one RPC method is
//! exposed over HTTP: a verb, a path template, which part of the request the
//! HTTP body fills and which part of the response is sent back.
//!
//! Rules are normally attached to methods with the `google.api.http` option and
//! compiled into the `FileDescriptorSet`; [`HttpRule::for_method`] reads them from
//! there. They can also be built in code with the constructors below.
//!
//! ```rust
//! use grate_core::route::HttpRule;
//!
//! let rule = HttpRule::post("/v1/{parent=shelves/*}/books")
//!     .with_body("book")
//!     .with_additional_binding(HttpRule::put("/v1/shelves/{parent}/books").with_body("book"));
//!
//! assert_eq!(rule.bindings().count(), 2);
//! ```
pub mod template;

pub use template::{InvalidRouteValue, RouteTemplate, TemplateError};

use http::Method;
use prost_reflect::{DynamicMessage, MethodDescriptor, Value};

/// Fully qualified name of the method option carrying HTTP rules.
pub const HTTP_EXTENSION: &str = "google.api.http";

/// The verb fields of `google.api.HttpRule.pattern`, in declaration order.
const PATTERNS: [(&str, Method); 5] = [
    ("get", Method::GET),
    ("put", Method::PUT),
    ("post", Method::POST),
    ("delete", Method::DELETE),
    ("patch", Method::PATCH),
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("HTTP rule does not set a pattern (get, put, post, delete, patch or custom)")]
    MissingPattern,
    #[error("Invalid HTTP verb '{0}' in custom pattern")]
    InvalidVerb(String),
}

/// A route annotation for one RPC method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRule {
    pub method: Method,
    /// Path template, see [`RouteTemplate`].
    pub path: String,
    /// Empty for no body, `*` for the whole request message, or a dotted field path.
    pub body: String,
    /// Empty for the whole response message, or the name of a top-level response field.
    pub response_body: String,
    /// Extra routes for the same method. Bindings nested below these are ignored.
    pub additional_bindings: Vec<HttpRule>,
}

impl HttpRule {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: String::new(),
            response_body: String::new(),
            additional_bindings: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_response_body(mut self, response_body: impl Into<String>) -> Self {
        self.response_body = response_body.into();
        self
    }

    pub fn with_additional_binding(mut self, mut binding: HttpRule) -> Self {
        binding.additional_bindings.clear();
        self.additional_bindings.push(binding);
        self
    }

    /// This rule followed by its additional bindings.
    pub fn bindings(&self) -> impl Iterator<Item = &HttpRule> {
        std::iter::once(self).chain(self.additional_bindings.iter())
    }

    /// Reads the `google.api.http` option of `method`.
    ///
    /// # Returns
    ///
    /// * `None` - The method has no HTTP rule, or the descriptor pool does not
    ///   know the `google.api.http` extension at all.
    /// * `Some(Ok(rule))` - The parsed rule.
    /// * `Some(Err(_))` - The option is present but malformed.
    pub fn for_method(method: &MethodDescriptor) -> Option<Result<Self, RuleError>> {
        let extension = method.parent_pool().get_extension_by_name(HTTP_EXTENSION)?;
        let options = method.options();

        if !options.has_extension(&extension) {
            return None;
        }

        let value = options.get_extension(&extension);
        Some(match value.as_message() {
            Some(rule) => Self::from_message(rule),
            None => Err(RuleError::MissingPattern),
        })
    }

    /// Converts a `google.api.HttpRule` message into an [`HttpRule`].
    pub fn from_message(rule: &DynamicMessage) -> Result<Self, RuleError> {
        let (method, path) = pattern(rule)?;

        let additional_bindings = match rule.get_field_by_name("additional_bindings").as_deref() {
            Some(Value::List(bindings)) => bindings
                .iter()
                .filter_map(Value::as_message)
                .map(|binding| {
                    let mut binding = Self::from_message(binding)?;
                    binding.additional_bindings.clear();
                    Ok(binding)
                })
                .collect::<Result<Vec<_>, RuleError>>()?,
            _ => Vec::new(),
        };

        Ok(Self {
            method,
            path,
            body: string_field(rule, "body"),
            response_body: string_field(rule, "response_body"),
            additional_bindings,
        })
    }
}

fn pattern(rule: &DynamicMessage) -> Result<(Method, String), RuleError> {
    for (field, method) in PATTERNS {
        if rule.has_field_by_name(field) {
            return Ok((method, string_field(rule, field)));
        }
    }

    if rule.has_field_by_name("custom") {
        let custom = rule.get_field_by_name("custom");
        if let Some(custom) = custom.as_deref().and_then(Value::as_message) {
            let kind = string_field(custom, "kind");
            let method = Method::from_bytes(kind.as_bytes())
                .map_err(|_| RuleError::InvalidVerb(kind.clone()))?;
            return Ok((method, string_field(custom, "path")));
        }
    }

    Err(RuleError::MissingPattern)
}

fn string_field(message: &DynamicMessage, name: &str) -> String {
    message
        .get_field_by_name(name)
        .and_then(|value| value.as_str().map(str::to_owned))
        .unwrap_or_default()
}
