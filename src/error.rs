use std::io;


/// Failures of a verified transfer.
///
/// `Setup` aborts a run. Everything else is collected into the run's
/// [`Report`](crate::Report).
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("setup failed: {0}")]
    Setup(#[source] io::Error),

    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),

    #[error("copy failed: {0}")]
    Copy(#[source] io::Error),

    #[error("receive failed: {0}")]
    Receive(#[source] io::Error),

    #[error("sent {sent} bytes; expected {expected}")]
    ShortTransfer { sent: u64, expected: u64 },

    #[error("received {received} bytes; expected {expected}")]
    ByteCountMismatch { received: u64, expected: u64 },

    #[error("retrieved data hash did not match: got {actual}, expected {expected}")]
    DigestMismatch { actual: String, expected: String },
}

impl TransferError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransferError::Setup(_))
    }
}
