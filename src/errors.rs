//! User-facing error taxonomy and message classification
//!
//! Wallet and RPC libraries report failures as free-form text. The table
//! below maps known fragments of that text onto an [`ErrorKind`]; rows are
//! checked in order against the lower-cased message.

/// Categories of failure shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    #[error("The request was rejected in your wallet.")]
    ConnectionRejected,
    #[error("No wallet found. Install a browser wallet or pick another connector.")]
    ConnectionNotFound,
    #[error("The wallet session expired. Please try connecting again.")]
    SessionExpired,
    #[error("Connection lost. Check your network and try again.")]
    NetworkUnreachable,
    #[error("The contract call failed.")]
    ContractCallFailed,
    #[error("The oracle is silent. Image or text generation failed.")]
    AiServiceError,
    #[error("Something went wrong. Please try again.")]
    UnknownError,
}

/// Ordered substring → kind rules
pub const CLASSIFICATION_TABLE: &[(&str, ErrorKind)] = &[
    ("user rejected", ErrorKind::ConnectionRejected),
    ("user denied", ErrorKind::ConnectionRejected),
    ("rejected the request", ErrorKind::ConnectionRejected),
    ("request rejected", ErrorKind::ConnectionRejected),
    ("connector not found", ErrorKind::ConnectionNotFound),
    ("provider not found", ErrorKind::ConnectionNotFound),
    ("no provider", ErrorKind::ConnectionNotFound),
    ("no injected", ErrorKind::ConnectionNotFound),
    ("not installed", ErrorKind::ConnectionNotFound),
    ("proposal expired", ErrorKind::SessionExpired),
    ("session expired", ErrorKind::SessionExpired),
    ("stale session", ErrorKind::SessionExpired),
    ("no matching key", ErrorKind::SessionExpired),
    ("execution reverted", ErrorKind::ContractCallFailed),
    ("revert", ErrorKind::ContractCallFailed),
    ("insufficient funds", ErrorKind::ContractCallFailed),
    ("call exception", ErrorKind::ContractCallFailed),
    ("transaction failed", ErrorKind::ContractCallFailed),
    ("disconnected", ErrorKind::NetworkUnreachable),
    ("connection refused", ErrorKind::NetworkUnreachable),
    ("connection closed", ErrorKind::NetworkUnreachable),
    ("timed out", ErrorKind::NetworkUnreachable),
    ("network", ErrorKind::NetworkUnreachable),
    ("unreachable", ErrorKind::NetworkUnreachable),
    ("error sending request", ErrorKind::NetworkUnreachable),
];

/// Classify a free-form error message
pub fn classify(message: &str) -> ErrorKind {
    let lowered = message.to_lowercase();
    CLASSIFICATION_TABLE
        .iter()
        .find(|(needle, _)| lowered.contains(needle))
        .map(|(_, kind)| *kind)
        .unwrap_or(ErrorKind::UnknownError)
}

/// Classify an error, looking through its whole context chain
pub fn classify_error(err: &anyhow::Error) -> ErrorKind {
    if let Some(kind) = err.downcast_ref::<ErrorKind>() {
        return *kind;
    }
    classify(&format!("{:#}", err))
}

/// Error returned when an AI request fails, carried through `anyhow`
#[derive(Debug, thiserror::Error)]
#[error("ai service: {0}")]
pub struct AiServiceFailure(pub String);

/// Same as [`classify_error`] but AI failures always map to the AI kind
pub fn classify_ai_error(err: &anyhow::Error) -> ErrorKind {
    if err.downcast_ref::<AiServiceFailure>().is_some() {
        return ErrorKind::AiServiceError;
    }
    match classify_error(err) {
        ErrorKind::UnknownError => ErrorKind::AiServiceError,
        kind => kind,
    }
}
