use bytes::Bytes;
use futures_util::{StreamExt, stream::BoxStream};
use http_body::{Body as HttpBody, Frame, SizeHint};
use std::{
    convert::Infallible,
    fmt,
    pin::Pin,
    task::{Context, Poll},
};

/// Content type of every response written by the transcoder.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// The body of a transcoded HTTP response.
///
/// Unary calls and faults produce a single JSON document. Server streaming calls
/// produce newline-terminated JSON documents, each serialized only when the body
/// is polled for it. Dropping a streaming body cancels the underlying call.
pub enum ResponseBody {
    Full(Bytes),
    Streaming(BoxStream<'static, Bytes>),
}

impl ResponseBody {
    pub fn empty() -> Self {
        ResponseBody::Full(Bytes::new())
    }

    /// Drains the body into a single buffer.
    pub async fn collect(self) -> Bytes {
        match self {
            ResponseBody::Full(bytes) => bytes,
            ResponseBody::Streaming(stream) => {
                let chunks: Vec<Bytes> = stream.collect().await;
                Bytes::from(chunks.concat())
            }
        }
    }

    /// Drains the body and parses every JSON document it contains.
    pub async fn collect_json(self) -> Result<Vec<serde_json::Value>, serde_json::Error> {
        let bytes = self.collect().await;
        serde_json::Deserializer::from_slice(&bytes)
            .into_iter::<serde_json::Value>()
            .collect()
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Full(bytes) => f.debug_tuple("Full").field(bytes).finish(),
            ResponseBody::Streaming(_) => f.write_str("Streaming(..)"),
        }
    }
}

impl HttpBody for ResponseBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.get_mut() {
            ResponseBody::Full(bytes) if bytes.is_empty() => Poll::Ready(None),
            ResponseBody::Full(bytes) => {
                Poll::Ready(Some(Ok(Frame::data(std::mem::take(bytes)))))
            }
            ResponseBody::Streaming(stream) => stream
                .poll_next_unpin(cx)
                .map(|chunk| chunk.map(|bytes| Ok(Frame::data(bytes)))),
        }
    }

    fn is_end_stream(&self) -> bool {
        matches!(self, ResponseBody::Full(bytes) if bytes.is_empty())
    }

    fn size_hint(&self) -> SizeHint {
        match self {
            ResponseBody::Full(bytes) => SizeHint::with_exact(bytes.len() as u64),
            ResponseBody::Streaming(_) => SizeHint::default(),
        }
    }
}
