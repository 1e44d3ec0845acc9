/// The error taxonomy shared by every crate in the workspace.
///
/// Variants mirror the boundary error codes named in the spec's external
/// interfaces section one-to-one (`HANDSHAKE_*`, `MESSAGE_*`, ...), so an
/// embedding application can match on a stable set of cases regardless of
/// which crate raised the error.
#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    #[error("initialization failed: {0}")]
    InitFailed(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("handshake timed out")]
    HandshakeTimeout,

    #[error("handshake message received in an invalid state: {0}")]
    HandshakeInvalidState(String),

    #[error("a handshake with this peer is already in progress")]
    HandshakeAlreadyInProgress,

    /// AEAD/Noise decryption failure. Never carries plaintext or key
    /// material — see the spec's authentication-failure error class.
    #[error("decryption failed")]
    DecryptionFailed,

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid nonce: {0}")]
    InvalidNonce(String),

    #[error("authentication tag mismatch")]
    AuthTagMismatch,

    #[error("nonce space exhausted")]
    NonceExhausted,

    #[error("message too large: {0}")]
    MessageTooLarge(String),

    #[error("invalid message format: {0}")]
    MessageInvalidFormat(String),

    #[error("duplicate message")]
    MessageDuplicate,

    #[error("failed to send message: {0}")]
    MessageSendFailed(String),

    #[error("validation failed: {0}")]
    Validation(String),
}

impl MeshError {
    /// Authentication failures are never fatal to the process — callers
    /// use this to distinguish "drop this message" from "tear down state".
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, MeshError::DecryptionFailed | MeshError::AuthTagMismatch)
    }
}
