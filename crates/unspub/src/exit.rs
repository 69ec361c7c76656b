use std::fmt;
use std::io;

use unspub_pipeline::PipelineError;
use unspub_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::NotFound => USAGE,
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Tls { path, source } => io_error(
            &format!("{context}: failed to read TLS material {}", path.display()),
            source,
        ),
        TransportError::InvalidQos(_) | TransportError::InvalidConfig(_) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        TransportError::Timeout { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        TransportError::Connect { .. }
        | TransportError::Rejected { .. }
        | TransportError::ConnectionLost(_)
        | TransportError::Publish { .. } => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        TransportError::Shutdown => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn pipeline_error(err: PipelineError) -> CliError {
    match err {
        PipelineError::InvalidInterval(_) => CliError::new(USAGE, err.to_string()),
        PipelineError::ConnectionLost(err) => transport_error("publish loop stopped", err),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn connect_failures_map_to_transport_code() {
        let err = transport_error(
            "connect failed",
            TransportError::ConnectionLost("network unreachable".to_string()),
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
        assert!(err.message.starts_with("connect failed: "));
    }

    #[test]
    fn connect_timeout_maps_to_timeout_code() {
        let err = transport_error(
            "connect failed",
            TransportError::Timeout {
                address: "localhost:1883".to_string(),
                timeout: Duration::from_secs(10),
            },
        );
        assert_eq!(err.code, TIMEOUT);
    }

    #[test]
    fn missing_tls_material_is_a_usage_error() {
        let err = transport_error(
            "connect failed",
            TransportError::Tls {
                path: "/nonexistent/ca.pem".into(),
                source: io::Error::from(io::ErrorKind::NotFound),
            },
        );
        assert_eq!(err.code, USAGE);
        assert!(err.message.contains("/nonexistent/ca.pem"));
    }

    #[test]
    fn lost_connection_keeps_transport_code() {
        let err = pipeline_error(PipelineError::ConnectionLost(
            TransportError::ConnectionLost("reset".to_string()),
        ));
        assert_eq!(err.code, TRANSPORT_ERROR);
    }
}
