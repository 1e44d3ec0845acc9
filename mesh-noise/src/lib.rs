//! Noise_XX_25519_ChaChaPoly_SHA256: the handshake state machine and the
//! bidirectional transport session it produces, built on `mesh-crypto`'s
//! AEAD/HKDF/X25519 primitives.

pub mod handshake_core;
pub mod session;
pub mod symmetric_state;

pub use handshake_core::{HandshakeCore, MESSAGE_1_LEN, MESSAGE_2_LEN, MESSAGE_3_LEN};
pub use session::{ExportedSessionState, Session};
pub use symmetric_state::{SymmetricState, PROTOCOL_NAME};
