//! # Call Handler
//!
//! The [`Transcoder`] turns one matched HTTP request into one RPC call and the
//! call's outcome back into an HTTP response:
//!
//! 1. **Decoding**: the JSON body (if the route declares one) becomes the request
//!    message, or the part of it named by the body path.
//! 2. **Binding**: route values, then query string values, are written into the
//!    request. Body and route fields take precedence over the query string.
//! 3. **Invoking**: the request is dispatched through an [`RpcInvoker`].
//! 4. **Encoding**: the response message, or only its response-body field, is
//!    serialized as JSON.
//!
//! A failure in any step short-circuits into a JSON error response (see
//! [`TranscodeError`]). The transcoder holds no per-call state, so one instance
//! serves any number of concurrent requests.
pub mod body;
pub mod error;

pub use body::{JSON_CONTENT_TYPE, ResponseBody};
pub use error::{TranscodeError, http_status};

use crate::{
    binder,
    catalog::CatalogEntry,
    grpc::RpcInvoker,
    options::TranscodingOptions,
    path::BodyBinding,
};
use bytes::Bytes;
use futures_util::{StreamExt, future, stream};
use http::{HeaderMap, HeaderValue, Response, StatusCode, header::CONTENT_TYPE};
use prost_reflect::{DynamicMessage, FieldDescriptor, Value};
use std::collections::HashMap;

/// HTTP headers that describe the HTTP exchange itself and are never forwarded
/// as call metadata.
const RESERVED_HEADERS: &[&str] = &[
    "accept",
    "accept-encoding",
    "connection",
    "content-encoding",
    "content-length",
    "content-type",
    "host",
    "keep-alive",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "user-agent",
];

/// The parts of an HTTP request the transcoder reads.
#[derive(Debug, Clone, Default)]
pub struct TranscodeRequest {
    /// Values captured by the route template, keyed by variable name.
    pub route_values: HashMap<String, String>,
    /// Query string keys in order of first appearance, each with all of its values.
    pub query: Vec<(String, Vec<String>)>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TranscodeRequest {
    /// Parses an `application/x-www-form-urlencoded` query string, grouping
    /// repeated keys.
    pub fn parse_query(query: &str) -> Vec<(String, Vec<String>)> {
        let mut grouped: Vec<(String, Vec<String>)> = Vec::new();

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match grouped.iter_mut().find(|(k, _)| *k == key) {
                Some((_, values)) => values.push(value.into_owned()),
                None => grouped.push((key.into_owned(), vec![value.into_owned()])),
            }
        }

        grouped
    }
}

/// Transcodes HTTP/JSON requests into RPC calls made through `I`.
#[derive(Debug, Clone)]
pub struct Transcoder<I> {
    invoker: I,
    options: TranscodingOptions,
}

impl<I> Transcoder<I> {
    pub fn new(invoker: I) -> Self {
        Self {
            invoker,
            options: TranscodingOptions::default(),
        }
    }

    pub fn with_options(mut self, options: TranscodingOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &TranscodingOptions {
        &self.options
    }

    pub fn invoker(&self) -> &I {
        &self.invoker
    }

    /// Builds the request message for `entry` from `request`: decodes the body,
    /// then binds route values and query string values.
    pub fn build_request(
        &self,
        entry: &CatalogEntry,
        request: &TranscodeRequest,
    ) -> Result<DynamicMessage, TranscodeError> {
        let mut message = self.decode(entry, request)?;

        for (name, path) in entry.route_parameters() {
            if let Some(value) = request.route_values.get(name) {
                binder::bind(&mut message, path, std::slice::from_ref(value))?;
            }
        }

        for (key, values) in &request.query {
            if !entry.accepts_query_key(key) {
                tracing::trace!(key = key.as_str(), "Query key shadowed by body or route");
                continue;
            }
            match entry.resolve_query_key(key) {
                Some(path) => binder::bind(&mut message, &path, values)?,
                None => tracing::trace!(key = key.as_str(), "Ignoring unknown query key"),
            }
        }

        Ok(message)
    }

    fn decode(
        &self,
        entry: &CatalogEntry,
        request: &TranscodeRequest,
    ) -> Result<DynamicMessage, TranscodeError> {
        let Some(body) = entry.body() else {
            return Ok(entry.new_request());
        };

        check_content_type(&request.headers)?;
        if request.body.is_empty() {
            return Ok(entry.new_request());
        }

        let options = self.options.deserialize_options();

        match body {
            BodyBinding::WholeMessage => {
                let mut deserializer = serde_json::Deserializer::from_slice(&request.body);
                let message = DynamicMessage::deserialize_with_options(
                    entry.method().input(),
                    &mut deserializer,
                    &options,
                )
                .map_err(TranscodeError::InvalidJson)?;
                deserializer.end().map_err(TranscodeError::InvalidJson)?;
                Ok(message)
            }
            BodyBinding::Field { path, .. } => {
                let payload: serde_json::Value =
                    serde_json::from_slice(&request.body).map_err(TranscodeError::InvalidJson)?;
                let value = decode_field(path.leaf(), payload, &options)?;

                let mut message = entry.new_request();
                binder::graft(&mut message, path, value)?;
                Ok(message)
            }
        }
    }
}

impl<I: RpcInvoker> Transcoder<I> {
    /// Runs the whole call for a request already matched to `entry`.
    ///
    /// Never fails: every error is converted into a JSON error response.
    pub async fn handle(
        &self,
        entry: &CatalogEntry,
        request: TranscodeRequest,
    ) -> Response<ResponseBody> {
        tracing::debug!(
            method = entry.method().full_name(),
            verb = %entry.verb(),
            template = entry.template().as_str(),
            "Transcoding request"
        );

        match self.call(entry, request).await {
            Ok(response) => response,
            Err(err) => error::fault_response(&err),
        }
    }

    async fn call(
        &self,
        entry: &CatalogEntry,
        request: TranscodeRequest,
    ) -> Result<Response<ResponseBody>, TranscodeError> {
        let message = self.build_request(entry, &request)?;
        let headers = forwarded_headers(&request.headers);

        if entry.is_server_streaming() {
            self.server_streaming(entry, message, headers).await
        } else {
            self.unary(entry, message, headers).await
        }
    }

    async fn unary(
        &self,
        entry: &CatalogEntry,
        message: DynamicMessage,
        headers: Vec<(String, String)>,
    ) -> Result<Response<ResponseBody>, TranscodeError> {
        let response = self
            .invoker
            .unary(entry.method(), message, headers)
            .await
            .map_err(TranscodeError::Call)?
            .ok_or(TranscodeError::MissingResponse)?;

        let document = self.encoder(entry).encode(&response)?;
        Ok(json_response(ResponseBody::Full(document)))
    }

    async fn server_streaming(
        &self,
        entry: &CatalogEntry,
        message: DynamicMessage,
        headers: Vec<(String, String)>,
    ) -> Result<Response<ResponseBody>, TranscodeError> {
        let mut responses = self
            .invoker
            .server_streaming(entry.method(), message, headers)
            .await
            .map_err(TranscodeError::Call)?;

        let encoder = self.encoder(entry);

        // The status line is only committed once the first message arrives, so a
        // call failing before producing anything still gets its own status code.
        let first = match responses.next().await {
            None => return Ok(json_response(ResponseBody::empty())),
            Some(Err(status)) => return Err(TranscodeError::Call(status)),
            Some(Ok(message)) => encoder.encode_document(&message)?,
        };

        let rest = stream::unfold(Some(responses), move |state| {
            let encoder = encoder.clone();
            async move {
                let mut responses = state?;
                let err = match responses.next().await? {
                    Ok(message) => match encoder.encode_document(&message) {
                        Ok(document) => return Some((document, Some(responses))),
                        Err(err) => err,
                    },
                    Err(status) => TranscodeError::Call(status),
                };
                // The head is already sent: report the failure in-band and end the body.
                Some((error::error_document(&err), None))
            }
        });

        let body = stream::once(future::ready(first)).chain(rest).boxed();
        Ok(json_response(ResponseBody::Streaming(body)))
    }

    fn encoder(&self, entry: &CatalogEntry) -> ResponseEncoder {
        ResponseEncoder {
            response_body: entry.response_body().cloned(),
            options: self.options.clone(),
        }
    }
}

/// Serializes response messages for one route.
#[derive(Clone)]
struct ResponseEncoder {
    response_body: Option<FieldDescriptor>,
    options: TranscodingOptions,
}

impl ResponseEncoder {
    fn encode(&self, message: &DynamicMessage) -> Result<Bytes, TranscodeError> {
        let value = self.to_json(message).map_err(TranscodeError::Encode)?;
        let document = if self.options.write_indented {
            serde_json::to_vec_pretty(&value)
        } else {
            serde_json::to_vec(&value)
        }
        .map_err(TranscodeError::Encode)?;

        Ok(Bytes::from(document))
    }

    fn encode_document(&self, message: &DynamicMessage) -> Result<Bytes, TranscodeError> {
        let mut document = self.encode(message)?.to_vec();
        document.push(b'\n');
        Ok(Bytes::from(document))
    }

    fn to_json(&self, message: &DynamicMessage) -> Result<serde_json::Value, serde_json::Error> {
        let options = self.options.serialize_options();

        let Some(field) = &self.response_body else {
            return message.serialize_with_options(serde_json::value::Serializer, &options);
        };

        let key = if self.options.use_proto_field_name {
            field.name()
        } else {
            field.json_name()
        };

        let json = message.serialize_with_options(serde_json::value::Serializer, &options)?;
        if let Some(value) = json.get(key) {
            return Ok(value.clone());
        }

        // The field holds its default value and was skipped; it is still written.
        let json = message.serialize_with_options(
            serde_json::value::Serializer,
            &options.skip_default_fields(false),
        )?;
        Ok(json.get(key).cloned().unwrap_or(serde_json::Value::Null))
    }
}

/// Parses `payload` as the JSON value of `field`.
///
/// The payload is wrapped in a single-member object of the field's parent type,
/// so any field kind (message, scalar, repeated) is parsed by the regular JSON
/// mapping rules.
fn decode_field(
    field: &FieldDescriptor,
    payload: serde_json::Value,
    options: &prost_reflect::DeserializeOptions,
) -> Result<Value, TranscodeError> {
    let mut wrapper = serde_json::Map::new();
    wrapper.insert(field.json_name().to_string(), payload);

    let parent = DynamicMessage::deserialize_with_options(
        field.parent_message().clone(),
        serde_json::Value::Object(wrapper),
        options,
    )
    .map_err(TranscodeError::InvalidJson)?;

    Ok(parent.get_field(field).into_owned())
}

fn check_content_type(headers: &HeaderMap) -> Result<(), TranscodeError> {
    let raw = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let mut parts = raw.split(';');
    let media_type = parts.next().unwrap_or_default().trim();
    if !media_type.eq_ignore_ascii_case("application/json") {
        return Err(TranscodeError::UnsupportedMediaType(raw.to_string()));
    }

    for parameter in parts {
        let Some((name, value)) = parameter.split_once('=') else {
            continue;
        };
        if !name.trim().eq_ignore_ascii_case("charset") {
            continue;
        }
        let charset = value.trim().trim_matches('"');
        if !charset.eq_ignore_ascii_case("utf-8") && !charset.eq_ignore_ascii_case("utf8") {
            return Err(TranscodeError::UnsupportedCharset(charset.to_string()));
        }
    }

    Ok(())
}

fn forwarded_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter(|(name, _)| {
            let name = name.as_str();
            !RESERVED_HEADERS.contains(&name) && !name.starts_with("grpc-") && !name.ends_with("-bin")
        })
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}

fn json_response(body: ResponseBody) -> Response<ResponseBody> {
    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    response
}
