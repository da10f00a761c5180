/// Faults that terminate a pipeline run
///
/// Every variant is coarse by design: the supervisor has exactly one
/// recovery mechanism (tear the run down and reconnect), so errors carry a
/// description for the logs rather than structured retry hints. Item-local
/// decode faults are not represented here; they are logged and skipped at
/// the decode site (see `message::DecodeError`).
#[derive(Debug)]
pub enum RelayError {
    /// Upstream connection could not be established (or was refused).
    Connect(String),
    /// The established upstream stream errored mid-read.
    Stream(String),
    /// An outbound webhook delivery failed.
    Delivery(String),
    /// A pipeline task panicked or was cancelled.
    Task(String),
}

impl std::fmt::Display for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayError::Connect(msg) => write!(f, "upstream connect failed: {}", msg),
            RelayError::Stream(msg) => write!(f, "upstream stream error: {}", msg),
            RelayError::Delivery(msg) => write!(f, "delivery failed: {}", msg),
            RelayError::Task(msg) => write!(f, "pipeline task failed: {}", msg),
        }
    }
}

impl std::error::Error for RelayError {}

impl From<tokio::task::JoinError> for RelayError {
    fn from(err: tokio::task::JoinError) -> Self {
        RelayError::Task(err.to_string())
    }
}
