//! # Generic gRPC Client
//!
//! This module wraps a standard `tonic` client so the transcoder can call any
//! method of any gRPC server, using [`super::codec::DynamicCodec`] for the messages.
//!
//! ## Features
//!
//! * **Dynamic Pathing**: Constructs the HTTP/2 path (e.g., `/package.Service/Method`) at runtime.
//! * **Metadata Handling**: Converts `(name, value)` string pairs into Tonic's `MetadataMap`.
//! * **Shared use**: every call works on its own clone of the underlying service, so
//!   one client serves any number of concurrent HTTP requests.
use super::{ResponseStream, RpcInvoker, codec::DynamicCodec};
use crate::BoxError;
use futures_util::StreamExt;
use http_body::Body as HttpBody;
use prost_reflect::{DynamicMessage, MethodDescriptor};
use std::str::FromStr;
use tonic::{
    Status,
    client::GrpcService,
    metadata::{
        MetadataKey, MetadataValue,
        errors::{InvalidMetadataKey, InvalidMetadataValue},
    },
    transport::{Channel, Endpoint},
};

#[derive(thiserror::Error, Debug)]
pub enum GrpcRequestError {
    #[error("Internal error, the client was not ready: '{0}'")]
    ClientNotReady(#[source] BoxError),
    #[error("Invalid metadata (header) key '{key}': '{source}'")]
    InvalidMetadataKey {
        key: String,
        source: InvalidMetadataKey,
    },
    #[error("Invalid metadata (header) value for key '{key}': '{source}'")]
    InvalidMetadataValue {
        key: String,
        source: InvalidMetadataValue,
    },
}

impl From<GrpcRequestError> for Status {
    fn from(err: GrpcRequestError) -> Self {
        match err {
            GrpcRequestError::ClientNotReady(_) => Status::unavailable(err.to_string()),
            GrpcRequestError::InvalidMetadataKey { .. }
            | GrpcRequestError::InvalidMetadataValue { .. } => {
                Status::invalid_argument(err.to_string())
            }
        }
    }
}

/// Errors that can occur when connecting to a gRPC server.
#[derive(Debug, thiserror::Error)]
pub enum ClientConnectError {
    #[error("Invalid URL '{0}': {1}")]
    InvalidUrl(String, #[source] tonic::transport::Error),
    #[error("Failed to connect to '{0}': {1}")]
    ConnectionFailed(String, #[source] tonic::transport::Error),
}

/// A gRPC client for methods described at runtime.
#[derive(Debug, Clone)]
pub struct GrpcClient<S = Channel> {
    client: tonic::client::Grpc<S>,
}

impl GrpcClient<Channel> {
    /// Connects to a gRPC server.
    ///
    /// # Arguments
    ///
    /// * `addr` - The server URI (e.g., `http://localhost:50051`).
    pub async fn connect(addr: &str) -> Result<Self, ClientConnectError> {
        let endpoint = Endpoint::new(addr.to_string())
            .map_err(|e| ClientConnectError::InvalidUrl(addr.to_string(), e))?;

        let channel = endpoint
            .connect()
            .await
            .map_err(|e| ClientConnectError::ConnectionFailed(addr.to_string(), e))?;

        Ok(Self::new(channel))
    }
}

impl<S> GrpcClient<S> {
    pub fn new(service: S) -> Self {
        let client = tonic::client::Grpc::new(service);
        Self { client }
    }
}

impl<S> RpcInvoker for GrpcClient<S>
where
    S: GrpcService<tonic::body::Body> + Clone + Send + 'static,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    async fn unary(
        &self,
        method: &MethodDescriptor,
        request: DynamicMessage,
        headers: Vec<(String, String)>,
    ) -> Result<Option<DynamicMessage>, Status> {
        let mut client = self.client.clone();
        client
            .ready()
            .await
            .map_err(|e| GrpcRequestError::ClientNotReady(e.into()))?;

        let codec = DynamicCodec::new(method.output());
        let path = http_path(method)?;
        let request = build_request(request, headers)?;

        let response = client.unary(request, path, codec).await?;
        Ok(Some(response.into_inner()))
    }

    async fn server_streaming(
        &self,
        method: &MethodDescriptor,
        request: DynamicMessage,
        headers: Vec<(String, String)>,
    ) -> Result<ResponseStream, Status> {
        let mut client = self.client.clone();
        client
            .ready()
            .await
            .map_err(|e| GrpcRequestError::ClientNotReady(e.into()))?;

        let codec = DynamicCodec::new(method.output());
        let path = http_path(method)?;
        let request = build_request(request, headers)?;

        let response = client.server_streaming(request, path, codec).await?;
        Ok(response.into_inner().boxed())
    }
}

fn http_path(method: &MethodDescriptor) -> Result<http::uri::PathAndQuery, Status> {
    let path = format!("/{}/{}", method.parent_service().full_name(), method.name());
    http::uri::PathAndQuery::from_str(&path)
        .map_err(|e| Status::internal(format!("Invalid gRPC path '{path}': {e}")))
}

fn build_request<T>(
    payload: T,
    headers: Vec<(String, String)>,
) -> Result<tonic::Request<T>, GrpcRequestError> {
    let mut request = tonic::Request::new(payload);
    for (k, v) in headers {
        let key =
            MetadataKey::from_str(&k).map_err(|source| GrpcRequestError::InvalidMetadataKey {
                key: k.clone(),
                source,
            })?;
        let val = MetadataValue::from_str(&v)
            .map_err(|source| GrpcRequestError::InvalidMetadataValue { key: k, source })?;
        request.metadata_mut().append(key, val);
    }
    Ok(request)
}
