//! # Grate Core
//!
//! `grate-core` is an HTTP/JSON to gRPC transcoding engine. Given the descriptors
//! of one or more services annotated with `google.api.http` rules, it accepts
//! plain HTTP requests with JSON bodies, turns them into protobuf request messages,
//! calls the matching RPC method and writes the result back as JSON.
//!
//! Nothing is generated at compile time: schemas are `prost_reflect` descriptor
//! pools and messages are `DynamicMessage`s.
//!
//! ## Key Components
//!
//! * **[`Gateway`](gateway::Gateway):** The entry point. Routes `http::Request`s
//!   and returns `http::Response`s.
//! * **[`Catalog`](catalog::Catalog):** The routes, resolved once against the schema.
//! * **[`Transcoder`](handler::Transcoder):** Decodes, binds, invokes and encodes
//!   one call.
//! * **[`RpcInvoker`](grpc::RpcInvoker):** How calls are dispatched. The provided
//!   [`GrpcClient`](grpc::client::GrpcClient) calls any `tonic` service.
//!
//! ## Example
//!
//! ```rust,no_run
//! use grate_core::{
//!     catalog::Catalog, gateway::Gateway, grpc::client::GrpcClient, handler::Transcoder,
//!     prost_reflect::DescriptorPool,
//! };
//!
//! # async fn run(descriptors: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
//! let pool = DescriptorPool::decode(descriptors)?;
//! let catalog = Catalog::from_pool(&pool)?;
//! let client = GrpcClient::connect("http://localhost:50051").await?;
//! let gateway = Gateway::new(catalog, Transcoder::new(client));
//!
//! let request = http::Request::get("/v1/shelves/1/books/2").body(bytes::Bytes::new())?;
//! let response = gateway.handle(request).await;
//! println!("{}", response.status());
//! # Ok(())
//! # }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports `prost`, `prost-reflect`, and `tonic` to ensure that consumers
//! use compatible versions of these underlying dependencies.
pub mod binder;
pub mod catalog;
pub mod gateway;
pub mod grpc;
pub mod handler;
pub mod options;
pub mod path;
pub mod route;
pub mod schema;

// Re-exports
pub use prost;
pub use prost_reflect;
pub use tonic;

/// Type alias for the standard boxed error used in generic bounds.
type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
