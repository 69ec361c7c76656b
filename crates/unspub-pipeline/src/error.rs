use std::time::Duration;

use unspub_transport::TransportError;

/// Errors that stop the publish loop.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The cycle interval cannot drive a timer.
    #[error("invalid publish interval {0:?}")]
    InvalidInterval(Duration),

    /// The transport gave up on the broker connection.
    #[error("publish loop stopped: {0}")]
    ConnectionLost(#[source] TransportError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
