use thiserror::Error;

/// Errors that may surface from the gateway's public API.
///
/// `Timeout` and a correlation miss are not represented here — per the
/// protocol they are normal outcomes (an `Option::None` or a silently
/// dropped frame), not faults.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("cannot connect to {host}:{port}: {source}")]
    TransportUnavailable {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("transport broken: {0}")]
    TransportBroken(#[source] std::io::Error),
    #[error("malformed frame: {0}")]
    DecodeFault(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("gateway is closed")]
    Closed,
}
