#![allow(dead_code)]

//! An in-process `library.v1.Library` gRPC server answering with `DynamicMessage`s.
//!
//! * `GetBook` returns a book named after the request. The book's author is the
//!   `x-user` metadata value. `books/missing` fails with `NOT_FOUND`.
//! * `WatchBooks` streams `page_size` books, then fails with `UNAVAILABLE` if the
//!   filter has the `fail` tag.
//! * Every other method is unimplemented.
use futures_util::{StreamExt, stream::{self, BoxStream}};
use grate_core::{
    grpc::codec::DynamicCodec,
    prost_reflect::{DescriptorPool, DynamicMessage, MethodDescriptor, Value},
    tonic::{
        self, Status,
        codegen::{Body, BoxFuture, Service, StdError, http},
        server::{Grpc, ServerStreamingService, UnaryService},
    },
};
use std::{
    convert::Infallible,
    task::{Context, Poll},
};

#[derive(Clone)]
pub struct LibraryService {
    pool: DescriptorPool,
}

impl LibraryService {
    pub fn new(pool: DescriptorPool) -> Self {
        Self { pool }
    }

    fn method(&self, path: &str) -> Option<MethodDescriptor> {
        let (service, method) = path.strip_prefix('/')?.split_once('/')?;
        self.pool
            .get_service_by_name(service)?
            .methods()
            .find(|m| m.name() == method)
    }
}

impl<B> Service<http::Request<B>> for LibraryService
where
    B: Body + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
{
    type Response = http::Response<tonic::body::Body>;
    type Error = Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<B>) -> Self::Future {
        let method = self.method(req.uri().path());

        Box::pin(async move {
            let response = match method {
                Some(method) if method.name() == "GetBook" => {
                    let mut grpc = Grpc::new(DynamicCodec::new(method.input()));
                    grpc.unary(GetBook(method), req).await
                }
                Some(method) if method.name() == "WatchBooks" => {
                    let mut grpc = Grpc::new(DynamicCodec::new(method.input()));
                    grpc.server_streaming(WatchBooks(method), req).await
                }
                _ => Status::unimplemented("Not served by the test library").into_http(),
            };
            Ok(response)
        })
    }
}

fn string_field(message: &DynamicMessage, name: &str) -> String {
    message
        .get_field_by_name(name)
        .and_then(|value| value.as_str().map(str::to_owned))
        .unwrap_or_default()
}

struct GetBook(MethodDescriptor);

impl UnaryService<DynamicMessage> for GetBook {
    type Response = DynamicMessage;
    type Future = BoxFuture<tonic::Response<DynamicMessage>, Status>;

    fn call(&mut self, request: tonic::Request<DynamicMessage>) -> Self::Future {
        let output = self.0.output();

        Box::pin(async move {
            let user = request
                .metadata()
                .get("x-user")
                .and_then(|value| value.to_str().ok())
                .unwrap_or("anonymous")
                .to_string();
            let name = string_field(request.get_ref(), "name");

            if name == "books/missing" {
                return Err(Status::not_found(format!("Book '{name}' not found")));
            }

            let book = DynamicMessage::deserialize(
                output,
                serde_json::json!({ "name": name, "author": { "displayName": user } }),
            )
            .map_err(|e| Status::internal(e.to_string()))?;

            Ok(tonic::Response::new(book))
        })
    }
}

struct WatchBooks(MethodDescriptor);

impl ServerStreamingService<DynamicMessage> for WatchBooks {
    type Response = DynamicMessage;
    type ResponseStream = BoxStream<'static, Result<DynamicMessage, Status>>;
    type Future = BoxFuture<tonic::Response<Self::ResponseStream>, Status>;

    fn call(&mut self, request: tonic::Request<DynamicMessage>) -> Self::Future {
        let output = self.0.output();

        Box::pin(async move {
            let request = request.into_inner();
            let count = request
                .get_field_by_name("page_size")
                .and_then(|value| value.as_i32())
                .unwrap_or_default();
            let fail = request
                .get_field_by_name("filter")
                .and_then(|filter| {
                    filter.as_message().and_then(|filter| {
                        filter.get_field_by_name("tags").map(|tags| {
                            tags.as_list()
                                .unwrap_or_default()
                                .contains(&Value::String("fail".to_string()))
                        })
                    })
                })
                .unwrap_or_default();

            let mut items = Vec::new();
            for i in 0..count {
                let mut book = DynamicMessage::new(output.clone());
                book.set_field_by_name("name", Value::String(format!("books/{i}")));
                items.push(Ok(book));
            }
            if fail {
                items.push(Err(Status::unavailable("Shelf closed")));
            }

            Ok(tonic::Response::new(stream::iter(items).boxed()))
        })
    }
}
