use std::future::Future;

use bytes::Bytes;

use crate::error::{Result, TransportError};

/// A publish-capable connection to a message broker.
pub trait Transport {
    /// Hand one serialized payload to the transport.
    ///
    /// Success means the transport accepted the message for delivery, not
    /// that the broker acknowledged it.
    fn send(&self, topic: &str, payload: Bytes) -> impl Future<Output = Result<()>> + Send;

    /// Resolves once the broker connection is permanently lost.
    fn closed(&self) -> impl Future<Output = TransportError> + Send;
}
