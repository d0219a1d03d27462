//! # Route Templates
//!
//! Parser and matcher for the path template grammar of `google.api.http`:
//!
//! ```text
//! Template = "/" Segments [ ":" Verb ] ;
//! Segments = Segment { "/" Segment } ;
//! Segment  = "*" | "**" | LITERAL | Variable ;
//! Variable = "{" FieldPath [ "=" Segments ] "}" ;
//! ```
//!
//! A variable without an explicit pattern (`{name}`) matches a single segment.
//! `**` matches the remainder of the path and may only appear last.
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("template must start with '/'")]
    MissingLeadingSlash,
    #[error("empty path segment")]
    EmptySegment,
    #[error("unterminated variable starting at byte {0}")]
    UnterminatedVariable(usize),
    #[error("variable '{0}' is nested inside another variable")]
    NestedVariable(String),
    #[error("variable has an empty field path")]
    EmptyVariable,
    #[error("variable '{0}' appears more than once")]
    DuplicateVariable(String),
    #[error("'**' may only be the last segment")]
    CatchAllNotLast,
    #[error("invalid character in literal segment '{0}'")]
    InvalidLiteral(String),
    #[error("empty custom verb")]
    EmptyVerb,
    #[error("invalid custom verb '{0}'")]
    InvalidVerb(String),
}

/// A captured route value whose percent-decoded bytes are not UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Route value '{value}' for '{variable}' is not valid UTF-8 once percent-decoded")]
pub struct InvalidRouteValue {
    pub variable: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Matcher {
    Literal(String),
    /// `*`: exactly one segment.
    Single,
    /// `**`: zero or more trailing segments.
    CatchAll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    matcher: Matcher,
    /// Index into [`RouteTemplate::variables`] when the segment is captured.
    variable: Option<usize>,
}

/// A parsed path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTemplate {
    source: String,
    segments: Vec<Segment>,
    variables: Vec<String>,
    verb: Option<String>,
}

impl RouteTemplate {
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let rest = template
            .strip_prefix('/')
            .ok_or(TemplateError::MissingLeadingSlash)?;

        let (path, verb) = split_verb(rest)?;

        let mut segments = Vec::new();
        let mut variables: Vec<String> = Vec::new();
        // Offset of `path` inside `template`, for error positions.
        let base = 1;
        let mut cursor = 0;
        let bytes = path.as_bytes();

        while cursor < bytes.len() || segments.is_empty() {
            if bytes.get(cursor) == Some(&b'{') {
                let close = path[cursor..]
                    .find('}')
                    .map(|i| cursor + i)
                    .ok_or(TemplateError::UnterminatedVariable(base + cursor))?;
                let inner = &path[cursor + 1..close];

                let (name, pattern) = match inner.split_once('=') {
                    Some((name, pattern)) => (name, pattern),
                    None => (inner, "*"),
                };
                if name.is_empty() {
                    return Err(TemplateError::EmptyVariable);
                }
                if pattern.contains('{') || name.contains('{') {
                    return Err(TemplateError::NestedVariable(name.to_string()));
                }
                if variables.iter().any(|v| v == name) {
                    return Err(TemplateError::DuplicateVariable(name.to_string()));
                }

                let index = variables.len();
                variables.push(name.to_string());
                for raw in pattern.split('/') {
                    segments.push(Segment {
                        matcher: parse_matcher(raw)?,
                        variable: Some(index),
                    });
                }
                cursor = close + 1;
            } else {
                let end = path[cursor..]
                    .find('/')
                    .map(|i| cursor + i)
                    .unwrap_or(path.len());
                segments.push(Segment {
                    matcher: parse_matcher(&path[cursor..end])?,
                    variable: None,
                });
                cursor = end;
            }

            match bytes.get(cursor) {
                Some(b'/') => {
                    cursor += 1;
                    if cursor == bytes.len() {
                        return Err(TemplateError::EmptySegment);
                    }
                }
                Some(_) => {
                    return Err(TemplateError::InvalidLiteral(path[cursor..].to_string()));
                }
                None => break,
            }
        }

        let last = segments.len() - 1;
        if segments[..last]
            .iter()
            .any(|s| s.matcher == Matcher::CatchAll)
        {
            return Err(TemplateError::CatchAllNotLast);
        }

        Ok(Self {
            source: template.to_string(),
            segments,
            variables,
            verb,
        })
    }

    /// The template text this was parsed from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The field paths named by the template's variables, in order of appearance.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// The custom verb suffix (`:verb`), if any.
    pub fn verb(&self) -> Option<&str> {
        self.verb.as_deref()
    }

    /// Matches a request path (without query string) and extracts the route values.
    ///
    /// Captured values are percent-decoded; a variable spanning several segments
    /// yields them joined with `/`. A path that matches but carries a value that
    /// does not decode to UTF-8 yields `Some(Err(_))`.
    pub fn matches(
        &self,
        path: &str,
    ) -> Option<Result<HashMap<String, String>, InvalidRouteValue>> {
        let rest = path.strip_prefix('/')?;

        let rest = match &self.verb {
            Some(verb) => {
                let (head, tail) = rest.rsplit_once(':')?;
                if tail != verb.as_str() {
                    return None;
                }
                head
            }
            None => rest,
        };

        let parts: Vec<&str> = rest.split('/').collect();
        let mut captured: Vec<Vec<&str>> = vec![Vec::new(); self.variables.len()];
        let mut position = 0;

        for segment in &self.segments {
            let consumed: &[&str] = match &segment.matcher {
                Matcher::Literal(literal) => {
                    let part = parts.get(position)?;
                    if *part != literal.as_str() {
                        return None;
                    }
                    std::slice::from_ref(part)
                }
                Matcher::Single => {
                    let part = parts.get(position)?;
                    if part.is_empty() {
                        return None;
                    }
                    std::slice::from_ref(part)
                }
                Matcher::CatchAll => parts.get(position..).unwrap_or_default(),
            };

            position += consumed.len();
            if let Some(index) = segment.variable {
                captured[index].extend_from_slice(consumed);
            }
        }

        if position != parts.len() {
            return None;
        }

        let values = self
            .variables
            .iter()
            .zip(captured)
            .map(|(name, parts)| {
                let joined = parts.join("/");
                let decoded = urlencoding::decode(&joined).map(|value| value.into_owned());
                match decoded {
                    Ok(value) => Ok((name.clone(), value)),
                    Err(_) => Err(InvalidRouteValue {
                        variable: name.clone(),
                        value: joined,
                    }),
                }
            })
            .collect();
        Some(values)
    }
}

fn split_verb(path: &str) -> Result<(&str, Option<String>), TemplateError> {
    // A ':' inside a variable pattern is not a verb separator.
    let last_close = path.rfind('}').map(|i| i + 1).unwrap_or(0);
    match path[last_close..].rfind(':') {
        Some(i) => {
            let at = last_close + i;
            let verb = &path[at + 1..];
            if verb.is_empty() {
                return Err(TemplateError::EmptyVerb);
            }
            if verb.contains(['/', '*', '{', '=']) {
                return Err(TemplateError::InvalidVerb(verb.to_string()));
            }
            Ok((&path[..at], Some(verb.to_string())))
        }
        None => Ok((path, None)),
    }
}

fn parse_matcher(raw: &str) -> Result<Matcher, TemplateError> {
    match raw {
        "" => Err(TemplateError::EmptySegment),
        "*" => Ok(Matcher::Single),
        "**" => Ok(Matcher::CatchAll),
        literal if literal.contains(['*', '{', '}', '=']) => {
            Err(TemplateError::InvalidLiteral(literal.to_string()))
        }
        literal => Ok(Matcher::Literal(literal.to_string())),
    }
}
