//! # Call Errors
//!
//! Every way a transcoded call can fail, and how each failure is reported to the
//! HTTP client: a status code derived from the gRPC status code and a JSON body
//! shaped like `google.rpc.Status`:
//!
//! ```json
//! { "code": 3, "message": "Invalid value 'abc' for field 'page_size' of type int32", "details": [] }
//! ```
use super::body::{JSON_CONTENT_TYPE, ResponseBody};
use crate::{binder::BindError, route::InvalidRouteValue};
use bytes::Bytes;
use http::{HeaderValue, Response, StatusCode, header::CONTENT_TYPE};
use tonic::{Code, Status};

/// Message returned in place of the details of an internal failure.
const INTERNAL_ERROR_MESSAGE: &str = "Internal server error.";

#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    #[error("No route matches '{method} {path}'")]
    RouteNotFound { method: String, path: String },
    #[error(transparent)]
    InvalidRouteValue(#[from] InvalidRouteValue),
    #[error("Unsupported content type '{0}', the request body must be 'application/json'")]
    UnsupportedMediaType(String),
    #[error("Unsupported charset '{0}', the request body must be UTF-8")]
    UnsupportedCharset(String),
    #[error("Request JSON payload is not correctly formatted: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error(transparent)]
    Bind(#[from] BindError),
    #[error("{}", .0.message())]
    Call(Status),
    #[error("No message returned from method.")]
    MissingResponse,
    #[error("Failed to serialize the response message: {0}")]
    Encode(#[source] serde_json::Error),
}

impl TranscodeError {
    /// The gRPC status code describing this error.
    pub fn code(&self) -> Code {
        match self {
            TranscodeError::RouteNotFound { .. } => Code::NotFound,
            TranscodeError::InvalidRouteValue(_)
            | TranscodeError::UnsupportedMediaType(_)
            | TranscodeError::UnsupportedCharset(_)
            | TranscodeError::InvalidJson(_)
            | TranscodeError::Bind(_) => Code::InvalidArgument,
            // An `Ok` status in error position is malformed; never report it as a success.
            TranscodeError::Call(status) if status.code() == Code::Ok => Code::Unknown,
            TranscodeError::Call(status) => status.code(),
            TranscodeError::MissingResponse => Code::Cancelled,
            TranscodeError::Encode(_) => Code::Internal,
        }
    }

    /// Whether the error is a fault of the transcoder itself rather than of the
    /// client request or the called method.
    pub fn is_internal(&self) -> bool {
        matches!(self, TranscodeError::Encode(_))
    }

    /// The message sent to the client. Never empty, and free of internal details.
    pub fn public_message(&self) -> String {
        match self {
            TranscodeError::Encode(_) => INTERNAL_ERROR_MESSAGE.to_string(),
            TranscodeError::Call(status) if status.message().is_empty() => {
                self.code().description().to_string()
            }
            err => err.to_string(),
        }
    }

    /// The `google.rpc.Status` JSON document for this error.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "code": i32::from(self.code()),
            "message": self.public_message(),
            "details": [],
        })
    }
}

/// Maps a gRPC status code onto an HTTP status code.
pub fn http_status(code: Code) -> StatusCode {
    match code {
        Code::Ok => StatusCode::OK,
        Code::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
        Code::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        Code::InvalidArgument => StatusCode::BAD_REQUEST,
        Code::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        Code::NotFound => StatusCode::NOT_FOUND,
        Code::AlreadyExists => StatusCode::CONFLICT,
        Code::PermissionDenied => StatusCode::FORBIDDEN,
        Code::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
        Code::FailedPrecondition => StatusCode::BAD_REQUEST,
        Code::Aborted => StatusCode::CONFLICT,
        Code::OutOfRange => StatusCode::BAD_REQUEST,
        Code::Unimplemented => StatusCode::NOT_IMPLEMENTED,
        Code::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        Code::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        Code::DataLoss => StatusCode::INTERNAL_SERVER_ERROR,
        Code::Unauthenticated => StatusCode::UNAUTHORIZED,
    }
}

/// Serializes the error document, followed by a newline so it can terminate a
/// stream of documents.
pub(crate) fn error_document(err: &TranscodeError) -> Bytes {
    log_fault(err);
    let mut document = serde_json::to_vec(&err.to_json()).unwrap_or_default();
    document.push(b'\n');
    Bytes::from(document)
}

/// Builds the complete HTTP response reporting `err`.
pub(crate) fn fault_response(err: &TranscodeError) -> Response<ResponseBody> {
    log_fault(err);
    let document = serde_json::to_vec(&err.to_json()).unwrap_or_default();

    let mut response = Response::new(ResponseBody::Full(Bytes::from(document)));
    *response.status_mut() = http_status(err.code());
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    response
}

fn log_fault(err: &TranscodeError) {
    if err.is_internal() {
        tracing::error!(error = %err, "Transcoding failed");
    } else {
        tracing::debug!(code = ?err.code(), error = %err, "Call faulted");
    }
}
