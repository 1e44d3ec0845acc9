//! Shared identifiers and the `MeshError` taxonomy used across every crate
//! in the mesh networking workspace (crypto core, handshake orchestrator,
//! realtime delivery engine, and the `meshnet` facade).

mod error;
mod peer_id;

pub use error::MeshError;
pub use peer_id::PeerId;

/// Result alias used throughout the workspace.
pub type MeshResult<T> = Result<T, MeshError>;

/// Which side of a handshake a peer played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Role {
    Initiator,
    Responder,
}

impl Role {
    pub fn is_initiator(self) -> bool {
        matches!(self, Role::Initiator)
    }
}
