//! # Gateway
//!
//! The [`Gateway`] is the HTTP facing entry point: it owns a [`Catalog`] and a
//! [`Transcoder`], routes each incoming `http::Request` to its catalog entry and
//! hands it over for transcoding.
//!
//! It works on plain `http` types and leaves the choice of HTTP server to the
//! caller.
use crate::{
    catalog::{Catalog, CatalogEntry},
    grpc::RpcInvoker,
    handler::{ResponseBody, TranscodeError, TranscodeRequest, Transcoder, error},
};
use bytes::Bytes;
use http::{Request, Response};
use prost_reflect::DynamicMessage;
use std::sync::Arc;

#[derive(Debug)]
pub struct Gateway<I> {
    catalog: Catalog,
    transcoder: Transcoder<I>,
}

impl<I> Gateway<I> {
    pub fn new(catalog: Catalog, transcoder: Transcoder<I>) -> Self {
        Self {
            catalog,
            transcoder,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn transcoder(&self) -> &Transcoder<I> {
        &self.transcoder
    }

    /// Matches `request` against the catalog and extracts everything the
    /// transcoder reads from it.
    pub fn route(
        &self,
        request: Request<Bytes>,
    ) -> Result<(Arc<CatalogEntry>, TranscodeRequest), TranscodeError> {
        let (parts, body) = request.into_parts();
        let path = parts.uri.path();

        let (entry, route_values) =
            self.catalog
                .find(&parts.method, path)?
                .ok_or_else(|| TranscodeError::RouteNotFound {
                    method: parts.method.to_string(),
                    path: path.to_string(),
                })?;

        let query = parts
            .uri
            .query()
            .map(TranscodeRequest::parse_query)
            .unwrap_or_default();

        Ok((
            entry,
            TranscodeRequest {
                route_values,
                query,
                headers: parts.headers,
                body,
            },
        ))
    }

    /// Builds the request message `request` would be transcoded into, without
    /// calling anything.
    pub fn build_request(&self, request: Request<Bytes>) -> Result<DynamicMessage, TranscodeError> {
        let (entry, request) = self.route(request)?;
        self.transcoder.build_request(&entry, &request)
    }
}

impl<I: RpcInvoker> Gateway<I> {
    /// Serves one HTTP request.
    ///
    /// Requests matching no route get a `404` JSON error response.
    pub async fn handle(&self, request: Request<Bytes>) -> Response<ResponseBody> {
        match self.route(request) {
            Ok((entry, request)) => self.transcoder.handle(&entry, request).await,
            Err(err) => error::fault_response(&err),
        }
    }
}
