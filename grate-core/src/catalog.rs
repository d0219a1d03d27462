//! # Descriptor Catalog
//!
//! Everything the transcoder needs to know about a route is resolved once, when
//! the catalog is built, and kept in an immutable [`CatalogEntry`]:
//!
//! * the request factory (the input `MessageDescriptor`),
//! * the parsed route template and the field path of each of its variables,
//! * how the HTTP body binds to the request and which response field is returned.
//!
//! Any annotation that does not resolve against the schema is a [`CatalogError`].
//! These are configuration errors: they abort catalog construction and never
//! surface while serving requests.
//!
//! The only state that changes after construction is each entry's query-key
//! cache. Query keys are client controlled and unbounded, so they are resolved
//! on first use and memoized (misses included) in a sharded concurrent map.
use crate::{
    path::{BodyBinding, is_within_body_path, resolve_field_path, resolve_response_body},
    route::{HttpRule, InvalidRouteValue, RouteTemplate, RuleError, TemplateError},
    schema::FieldPath,
};
use dashmap::DashMap;
use http::Method;
use prost_reflect::{DescriptorPool, DynamicMessage, FieldDescriptor, MethodDescriptor};
use std::{collections::HashMap, sync::Arc};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Malformed HTTP rule on method '{method}': {source}")]
    Rule {
        method: String,
        #[source]
        source: RuleError,
    },
    #[error("Invalid route template '{template}' on method '{method}': {source}")]
    Template {
        method: String,
        template: String,
        #[source]
        source: TemplateError,
    },
    #[error("Route parameter '{parameter}' on method '{method}' does not resolve to a field of '{message}'")]
    RouteParameter {
        method: String,
        parameter: String,
        message: String,
    },
    #[error("Body '{body}' on method '{method}' does not resolve to a field of '{message}'")]
    Body {
        method: String,
        body: String,
        message: String,
    },
    #[error("Response body '{response_body}' on method '{method}' does not resolve to a field of '{message}'")]
    ResponseBody {
        method: String,
        response_body: String,
        message: String,
    },
    #[error("Method '{0}' uses client streaming, which cannot be exposed over HTTP")]
    ClientStreaming(String),
}

/// One HTTP binding of one RPC method.
#[derive(Debug)]
pub struct CatalogEntry {
    method: MethodDescriptor,
    verb: Method,
    template: RouteTemplate,
    body: Option<BodyBinding>,
    response_body: Option<FieldDescriptor>,
    route_parameters: Vec<(String, FieldPath)>,
    query_keys: DashMap<String, Option<FieldPath>>,
}

impl CatalogEntry {
    /// Resolves `rule` against the schema of `method`.
    ///
    /// Additional bindings of `rule` are ignored; see [`Catalog::insert`].
    pub fn new(method: MethodDescriptor, rule: &HttpRule) -> Result<Self, CatalogError> {
        let name = method.full_name().to_string();

        if method.is_client_streaming() {
            return Err(CatalogError::ClientStreaming(name));
        }

        let input = method.input();
        let output = method.output();

        let template =
            RouteTemplate::parse(&rule.path).map_err(|source| CatalogError::Template {
                method: name.clone(),
                template: rule.path.clone(),
                source,
            })?;

        let route_parameters = template
            .variables()
            .iter()
            .map(|parameter| {
                resolve_field_path(&input, parameter)
                    .map(|path| (parameter.clone(), path))
                    .ok_or_else(|| CatalogError::RouteParameter {
                        method: name.clone(),
                        parameter: parameter.clone(),
                        message: input.full_name().to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let body = BodyBinding::resolve(&input, &rule.body).map_err(|_| CatalogError::Body {
            method: name.clone(),
            body: rule.body.clone(),
            message: input.full_name().to_string(),
        })?;

        let response_body = match rule.response_body.as_str() {
            "" => None,
            field => Some(resolve_response_body(&output, field).ok_or_else(|| {
                CatalogError::ResponseBody {
                    method: name.clone(),
                    response_body: field.to_string(),
                    message: output.full_name().to_string(),
                }
            })?),
        };

        Ok(Self {
            method,
            verb: rule.method.clone(),
            template,
            body,
            response_body,
            route_parameters,
            query_keys: DashMap::new(),
        })
    }

    pub fn method(&self) -> &MethodDescriptor {
        &self.method
    }

    pub fn verb(&self) -> &Method {
        &self.verb
    }

    pub fn template(&self) -> &RouteTemplate {
        &self.template
    }

    pub fn body(&self) -> Option<&BodyBinding> {
        self.body.as_ref()
    }

    pub fn response_body(&self) -> Option<&FieldDescriptor> {
        self.response_body.as_ref()
    }

    /// Route variable names with their resolved field paths, in template order.
    pub fn route_parameters(&self) -> &[(String, FieldPath)] {
        &self.route_parameters
    }

    pub fn is_server_streaming(&self) -> bool {
        self.method.is_server_streaming()
    }

    /// A new, empty request message for this method.
    pub fn new_request(&self) -> DynamicMessage {
        DynamicMessage::new(self.method.input())
    }

    /// Whether a query string key may bind a request field.
    ///
    /// Fields owned by the body or by a route variable take precedence over the
    /// query string. With a `*` body, the query string binds nothing.
    ///
    /// Keys are compared as written first, then by the fields they resolve to,
    /// so `pageSize` is shadowed by a `{page_size}` route variable.
    pub fn accepts_query_key(&self, key: &str) -> bool {
        match &self.body {
            Some(BodyBinding::WholeMessage) => return false,
            Some(BodyBinding::Field { path, .. }) if is_within_body_path(path.as_str(), key) => {
                return false;
            }
            _ => {}
        }

        if self.route_parameters.iter().any(|(name, _)| name == key) {
            return false;
        }

        match self.resolve_query_key(key) {
            Some(path) => !self.is_bound_by_body_or_route(&path),
            // Unknown keys are accepted here and ignored once resolved.
            None => true,
        }
    }

    fn is_bound_by_body_or_route(&self, path: &FieldPath) -> bool {
        let fields = path.fields();

        if let Some(BodyBinding::Field { path: body, .. }) = &self.body {
            if fields.starts_with(body.fields()) {
                return true;
            }
        }

        self.route_parameters
            .iter()
            .any(|(_, route)| route.fields() == fields)
    }

    /// Resolves a query string key against the request type, memoizing the outcome.
    ///
    /// Concurrent first lookups of the same key may both resolve it; only the
    /// first insertion is kept and every caller returns the stored value.
    pub fn resolve_query_key(&self, key: &str) -> Option<FieldPath> {
        if let Some(cached) = self.query_keys.get(key) {
            return cached.value().clone();
        }

        let resolved = resolve_field_path(&self.method.input(), key);
        tracing::trace!(
            method = self.method.full_name(),
            key,
            resolved = resolved.is_some(),
            "Resolved query key"
        );

        self.query_keys
            .entry(key.to_string())
            .or_insert(resolved)
            .value()
            .clone()
    }

    /// Number of distinct query keys resolved so far, misses included.
    pub fn cached_query_keys(&self) -> usize {
        self.query_keys.len()
    }
}

/// All HTTP bindings known to a transcoder.
#[derive(Debug, Default)]
pub struct Catalog {
    entries: Vec<Arc<CatalogEntry>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from every `google.api.http` annotated method in `pool`.
    ///
    /// Methods without an annotation are not exposed. Annotated client streaming
    /// methods are skipped with a warning.
    pub fn from_pool(pool: &DescriptorPool) -> Result<Self, CatalogError> {
        let mut catalog = Self::new();

        for service in pool.services() {
            for method in service.methods() {
                let rule = match HttpRule::for_method(&method) {
                    None => continue,
                    Some(rule) => rule.map_err(|source| CatalogError::Rule {
                        method: method.full_name().to_string(),
                        source,
                    })?,
                };

                if method.is_client_streaming() {
                    tracing::warn!(
                        method = method.full_name(),
                        "Skipping client streaming method, it cannot be exposed over HTTP"
                    );
                    continue;
                }

                catalog.insert(method, &rule)?;
            }
        }

        Ok(catalog)
    }

    /// Adds `rule` and each of its additional bindings for `method`.
    pub fn insert(&mut self, method: MethodDescriptor, rule: &HttpRule) -> Result<(), CatalogError> {
        for binding in rule.bindings() {
            let entry = CatalogEntry::new(method.clone(), binding)?;
            tracing::debug!(
                method = method.full_name(),
                verb = %entry.verb,
                template = entry.template.as_str(),
                "Registered route"
            );
            self.entries.push(Arc::new(entry));
        }
        Ok(())
    }

    /// Finds the first entry whose verb and template match, along with its route values.
    ///
    /// Fails when the first matching template captures a value that does not
    /// percent-decode to UTF-8; later entries are not tried.
    pub fn find(
        &self,
        verb: &Method,
        path: &str,
    ) -> Result<Option<(Arc<CatalogEntry>, HashMap<String, String>)>, InvalidRouteValue> {
        for entry in self.entries.iter().filter(|entry| &entry.verb == verb) {
            if let Some(values) = entry.template.matches(path) {
                return values.map(|values| Some((entry.clone(), values)));
            }
        }
        Ok(None)
    }

    pub fn entries(&self) -> impl Iterator<Item = &Arc<CatalogEntry>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
