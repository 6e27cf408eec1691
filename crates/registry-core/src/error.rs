use thiserror::Error;

/// The stored body of a block could not be turned back into structured data.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("block body is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("block body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Sealing a block failed before it reached the chain.
#[derive(Debug, Error)]
pub enum AppendError {
    #[error("could not encode block payload: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Reasons a star submission is turned away. Gates are checked in the order
/// the variants are declared, so the first failing one is reported.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("ownership message is malformed: {0}")]
    MalformedMessage(String),
    #[error("ownership message was issued for {expected}, not {got}")]
    AddressMismatch { expected: String, got: String },
    #[error("ownership message timestamp {timestamp} is ahead of the clock ({now})")]
    FromTheFuture { timestamp: u64, now: u64 },
    #[error("ownership message expired: {elapsed}s elapsed, window is {window}s")]
    Expired { elapsed: u64, window: u64 },
    #[error("invalid signature for address {0}")]
    InvalidSignature(String),
    #[error(transparent)]
    Append(#[from] AppendError),
}
