//! # RPC Invocation
//!
//! The transcoder does not care how a method is reached, only that something can
//! take a request message for a [`MethodDescriptor`] and produce a response or a
//! stream of responses. That seam is the [`RpcInvoker`] trait.
//!
//! [`client::GrpcClient`] implements it over any `tonic` service (a `Channel` to a
//! remote server, or an in-process generated server), using the dynamic codec in
//! [`codec`] to move `DynamicMessage`s over the wire.
pub mod client;
pub mod codec;

use futures_util::stream::BoxStream;
use prost_reflect::{DynamicMessage, MethodDescriptor};
use tonic::Status;

/// Messages produced by a server streaming call, in production order.
pub type ResponseStream = BoxStream<'static, Result<DynamicMessage, Status>>;

/// Dispatches a request message to an RPC method.
///
/// `headers` are forwarded as call metadata.
#[allow(async_fn_in_trait)]
pub trait RpcInvoker {
    /// Performs a unary call.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(message))` - The method produced a response.
    /// * `Ok(None)` - The method completed without producing a response message.
    /// * `Err(status)` - The method failed.
    async fn unary(
        &self,
        method: &MethodDescriptor,
        request: DynamicMessage,
        headers: Vec<(String, String)>,
    ) -> Result<Option<DynamicMessage>, Status>;

    /// Starts a server streaming call.
    ///
    /// An error returned here means the call failed before any message was produced;
    /// later failures are items of the stream.
    async fn server_streaming(
        &self,
        method: &MethodDescriptor,
        request: DynamicMessage,
        headers: Vec<(String, String)>,
    ) -> Result<ResponseStream, Status>;
}
