//! Cancellable text streams.

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::invocation::AttemptRecord;
use crate::providers::TextStream;

/// A handle that stops the stream it was issued with.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    /// Request cancellation. The stream ends at its next poll and drops
    /// the underlying connection.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// An opened stream plus where it came from.
pub struct StreamHandle {
    pub stream: TextStream,
    pub cancel: CancelHandle,
    pub provider_id: String,
    pub model_id: String,

    /// Attempts made while opening the stream, the last one being the success
    pub attempts: Vec<AttemptRecord>,
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("provider_id", &self.provider_id)
            .field("model_id", &self.model_id)
            .field("attempts", &self.attempts.len())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// Wrap `stream` so that it stops as soon as the returned handle is
/// cancelled, including while it is waiting for the next chunk.
pub fn make_cancellable(stream: TextStream) -> (TextStream, CancelHandle) {
    let token = CancellationToken::new();
    let handle = CancelHandle {
        token: token.clone(),
    };

    let mut inner = stream;
    let wrapped = async_stream::stream! {
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                item = inner.next() => item,
            };
            match next {
                Some(item) => yield item,
                None => break,
            }
        }
    };

    (Box::pin(wrapped), handle)
}
