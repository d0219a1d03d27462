//! # Path Resolver
//!
//! Turns the dotted names found in route annotations, route templates and query
//! strings into [`FieldPath`]s against a message schema.
//!
//! Resolution is a pure function of the root descriptor and the dotted string,
//! which is what lets the catalog memoize query-key lookups forever.
use crate::schema::FieldPath;
use prost_reflect::{FieldDescriptor, Kind, MessageDescriptor};

/// Resolves `dotted` (e.g. `book.author.display_name`) against `root`.
///
/// Each segment is looked up by its proto field name first and by its JSON name
/// second. Every segment except the last must name a singular message field.
/// The last segment may have any kind.
///
/// Returns `None` if any segment fails to resolve; partial paths are never returned.
pub fn resolve_field_path(root: &MessageDescriptor, dotted: &str) -> Option<FieldPath> {
    if dotted.is_empty() {
        return None;
    }

    let mut current = root.clone();
    let mut fields = Vec::new();
    let mut segments = dotted.split('.').peekable();

    while let Some(segment) = segments.next() {
        let field = find_field(&current, segment)?;

        if segments.peek().is_some() {
            current = match field.kind() {
                Kind::Message(message) if !field.is_list() && !field.is_map() => message,
                _ => return None,
            };
        }

        fields.push(field);
    }

    Some(FieldPath::new(fields, dotted))
}

fn find_field(message: &MessageDescriptor, name: &str) -> Option<FieldDescriptor> {
    message
        .get_field_by_name(name)
        .or_else(|| message.get_field_by_json_name(name))
}

/// A dotted path that names no field of the message it was resolved against.
#[derive(Debug, Clone, thiserror::Error)]
#[error("'{0}' does not name a field")]
pub struct UnresolvedPath(pub String);

/// How the HTTP body maps onto the request message.
#[derive(Debug, Clone)]
pub enum BodyBinding {
    /// `body: "*"`: the JSON body is the whole request message.
    WholeMessage,
    /// `body: "<path>"`: the JSON body is the value of one (possibly nested) field.
    Field {
        path: FieldPath,
        /// The leaf is a repeated field: the body is a JSON array whose elements
        /// are appended to it.
        list: bool,
    },
}

impl BodyBinding {
    /// Resolves the `body` value of an HTTP rule.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - The rule has no body.
    /// * `Ok(Some(binding))` - The body value resolved.
    /// * `Err(UnresolvedPath)` - The body value names a field that does not exist.
    pub fn resolve(request: &MessageDescriptor, body: &str) -> Result<Option<Self>, UnresolvedPath> {
        match body {
            "" => Ok(None),
            "*" => Ok(Some(BodyBinding::WholeMessage)),
            dotted => {
                let path = resolve_field_path(request, dotted)
                    .ok_or_else(|| UnresolvedPath(dotted.to_string()))?;
                let list = path.leaf().is_list();
                Ok(Some(BodyBinding::Field { path, list }))
            }
        }
    }
}

/// Resolves the `response_body` value of an HTTP rule.
///
/// Only a single, non-nested field name is accepted.
pub fn resolve_response_body(response: &MessageDescriptor, name: &str) -> Option<FieldDescriptor> {
    if name.contains('.') {
        return None;
    }
    find_field(response, name)
}

/// Whether `key` is the body path itself or a field nested below it.
///
/// Matching happens on whole segments: with a body path of `book`, the keys
/// `book` and `book.name` match while `booklet` does not.
pub fn is_within_body_path(body_path: &str, key: &str) -> bool {
    match key.strip_prefix(body_path) {
        Some("") => true,
        Some(rest) => rest.starts_with('.'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::is_within_body_path;

    #[test]
    fn body_path_matching_is_segment_aware() {
        assert!(is_within_body_path("a.b", "a.b"));
        assert!(is_within_body_path("a.b", "a.b.c"));
        assert!(!is_within_body_path("a.b", "a"));
        assert!(!is_within_body_path("a.b", "a.bc"));
        assert!(!is_within_body_path("item", "itemization"));
        assert!(is_within_body_path("item", "item.name"));
    }
}
