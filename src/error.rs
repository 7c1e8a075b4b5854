use thiserror::Error;

use crate::chain::Chain;
use crate::layout::LayoutError;
use crate::transfer::TransferState;

#[derive(Error, Debug)]
pub enum VaaError {
    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),

    #[error("Guardian signatures out of order: index {index} follows {previous}")]
    SignatureOrder { previous: u8, index: u8 },

    #[error("Unsupported VAA version: {0}")]
    UnsupportedVersion(u8),

    #[error("Payload type already registered: {literal}")]
    PayloadAlreadyRegistered { literal: String },

    #[error("Payload type not registered: {literal}")]
    PayloadNotRegistered { literal: String },

    #[error("Payload matches multiple registered types: {}", candidates.join(", "))]
    AmbiguousPayload { candidates: Vec<String> },

    #[error("Payload matches none of the candidate types")]
    NoMatchingPayload,

    #[error("Invalid payload literal: {0}")]
    InvalidPayloadLiteral(String),

    #[error("Native address constructor already registered for {platform}")]
    PlatformAlreadyRegistered { platform: String },

    #[error("Platform not supported: {platform}")]
    UnsupportedPlatform { platform: String },

    #[error("Chain not supported: {chain}")]
    ChainNotSupported { chain: String },

    #[error("Protocol {protocol} not supported on {chain}")]
    ProtocolNotSupported { protocol: String, chain: Chain },

    #[error("Invalid address: {reason}")]
    InvalidAddress { reason: String },

    #[error("Invalid state transition: cannot {operation} from {state}")]
    InvalidStateTransition {
        operation: &'static str,
        state: TransferState,
    },

    #[error("Wrong payload for {operation}: {literal}")]
    WrongPayload {
        operation: &'static str,
        literal: String,
    },

    #[error("Invalid transfer: {0}")]
    InvalidTransfer(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Attestation failed: {reason}")]
    AttestationFailed { reason: String },

    #[error("Rate limit exceeded, retry after {retry_after_seconds} seconds")]
    RateLimitExceeded { retry_after_seconds: u64 },

    #[error("Attestation not found (will retry)")]
    AttestationNotFound,

    #[error("Timeout waiting for attestation after {attempts} attempts")]
    AttestationTimeout { attempts: u32 },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("RPC error: {0}")]
    Rpc(#[from] alloy_json_rpc::RpcError<alloy_transport::TransportErrorKind>),

    #[error("ABI encoding/decoding error: {0}")]
    Abi(#[from] alloy_sol_types::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Hex conversion error: {0}")]
    Hex(#[from] alloy_primitives::hex::FromHexError),

    #[error("Base64 decoding error: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl VaaError {
    /// Whether the error means "not available yet" rather than a hard failure.
    ///
    /// The attestation polling loop keeps going on these and gives up on
    /// everything else.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VaaError::AttestationNotFound | VaaError::RateLimitExceeded { .. }
        )
    }

    pub(crate) fn invalid_address(reason: impl Into<String>) -> Self {
        VaaError::InvalidAddress {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, VaaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(VaaError::AttestationNotFound.is_retryable());
        assert!(VaaError::RateLimitExceeded {
            retry_after_seconds: 10
        }
        .is_retryable());
        assert!(!VaaError::AttestationTimeout { attempts: 5 }.is_retryable());
        assert!(!VaaError::NoMatchingPayload.is_retryable());
        assert!(!VaaError::Cancelled.is_retryable());
    }

    #[test]
    fn test_ambiguous_payload_message() {
        let err = VaaError::AmbiguousPayload {
            candidates: vec![
                "TokenBridge:TransferWithPayload".to_string(),
                "AutomaticTokenBridge:TransferWithRelay".to_string(),
            ],
        };
        insta::assert_snapshot!(err.to_string(), @"Payload matches multiple registered types: TokenBridge:TransferWithPayload, AutomaticTokenBridge:TransferWithRelay");
    }
}
